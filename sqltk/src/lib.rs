#![deny(rust_2018_idioms)]
//! A test kit that drives a SQL session: execute statements, collect their rows as strings and
//! assert on errors, plans and affected rows.
//!
//! ```ignore
//! let ctx = TestContext::mock();
//! let mut tk = TestKit::new(&ctx);
//! tk.must_exec("create table t (a int primary key, b varchar(10))");
//! tk.must_exec("insert into t values (1, 'a'), (2, 'b')");
//! tk.must_query("select * from t where a > ?", &args![1]).check(rows(&["2 b"]));
//! ```

mod context;
mod error;
mod prepared;
mod result;
mod testkit;

pub use sqltk_core::{Datum, ErrorCode, SqlError, SqlWarning, WarnLevel};
pub use sqltk_memstore::{MemSession, MemStore, StoreOptions};
pub use sqltk_session::{RecordSet, Session, Storage};

pub use self::context::{init_logging, ConnectionIds, TestContext};
pub use self::error::{ExecError, Result};
pub use self::result::{rows, QueryResult};
pub use self::testkit::TestKit;

/// Build a parameter slice for the `*_with` methods of [`TestKit`].
///
/// Each argument is converted with `Datum::from`, so `args![1, "a", None::<i64>]` binds an
/// integer, a string and a `NULL`.
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Datum>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Datum::from($arg)),+]
    };
}
