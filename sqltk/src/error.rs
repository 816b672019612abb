use std::error::Error as _;
use std::fmt::Write;

use sqltk_core::{Datum, Error, ErrorCode, SqlError};
use thiserror::Error;

pub type Result<T, E = ExecError> = std::result::Result<T, E>;

/// A failed statement together with the sql and arguments it was run with.
///
/// Displays as the underlying error so messages can be compared exactly.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ExecError {
    sql: String,
    args: Vec<Datum>,
    source: Error,
}

impl ExecError {
    pub(crate) fn new(sql: &str, args: &[Datum], source: Error) -> Self {
        Self { sql: sql.to_owned(), args: args.to_vec(), source }
    }

    #[inline]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[inline]
    pub fn args(&self) -> &[Datum] {
        &self.args
    }

    #[inline]
    pub fn cause(&self) -> &Error {
        &self.source
    }

    #[inline]
    pub fn into_cause(self) -> Error {
        self.source
    }

    /// The SQL error carried by the cause, if it has one.
    pub fn sql_error(&self) -> Option<&SqlError> {
        match &self.source {
            Error::Sql(err) => Some(err),
            Error::Internal(_) => None,
        }
    }

    #[inline]
    pub fn code(&self) -> Option<ErrorCode> {
        self.source.code()
    }

    /// The error, where it was raised and everything that caused it, one per line.
    pub fn stack(&self) -> String {
        let mut stack = format!("{}\n    sql: {}\n    args: {:?}", self.source, self.sql, self.args);
        let mut cause = self.source.source();
        while let Some(err) = cause {
            // `Error` is transparent, its source is the error it wraps
            let _ = write!(stack, "\ncaused by: {err}");
            cause = err.source();
        }
        stack
    }
}
