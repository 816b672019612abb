#![deny(rust_2018_idioms)]
//! Values, names and errors shared by every sqltk crate.

mod datum;
mod error;
mod name;

pub use anyhow;

pub use self::datum::{Datum, Number};
pub use self::error::{ErrClass, Error, ErrorCode, Result, SqlError, SqlWarning, WarnLevel};
pub use self::name::Name;
