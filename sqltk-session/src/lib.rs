#![deny(rust_2018_idioms)]
//! This crate defines the session interfaces the test kit drives

use std::fmt;

pub use fallible_iterator::{self, FallibleIterator};
use sqltk_core::{Datum, Error, Result, SqlWarning};

pub type Row = Vec<Datum>;

/// How a `NULL` is rendered in string rows.
pub const NULL_TEXT: &str = "<nil>";

/// A column of a record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
}

impl Field {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Handle of a prepared statement, only meaningful to the session that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(u32);

impl StmtId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedStmt {
    pub id: StmtId,
    pub param_count: usize,
}

/// A possibly lazy stream of result rows.
///
/// Producing a row may fail even though the statement that created the record set succeeded.
/// Dropping a record set releases its cursor, `close` does the same but reports failures.
pub trait RecordSet: FallibleIterator<Item = Row, Error = Error> {
    fn fields(&self) -> &[Field];

    /// Release the cursor. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// A shared handle to a database that sessions are opened against.
pub trait Storage: Clone + Send + Sync + 'static {
    type Session: Session;

    fn create_session(&self) -> Result<Self::Session>;
}

pub trait Session {
    /// A parsed statement, ready to be executed.
    type Stmt;

    type RecordSet: RecordSet;

    /// Parse `sql` into zero or more statements. Parser warnings are appended to the warning list.
    fn parse(&mut self, sql: &str) -> Result<Vec<Self::Stmt>>;

    /// Execute a single statement, returning a record set if the statement produces rows.
    fn execute_stmt(&mut self, stmt: Self::Stmt) -> Result<Option<Self::RecordSet>>;

    fn prepare_stmt(&mut self, sql: &str) -> Result<PreparedStmt>;

    fn execute_prepared_stmt(
        &mut self,
        id: StmtId,
        params: &[Datum],
    ) -> Result<Option<Self::RecordSet>>;

    fn drop_prepared_stmt(&mut self, id: StmtId) -> Result<()>;

    fn connection_id(&self) -> u64;

    fn set_connection_id(&mut self, id: u64);

    /// Rows affected by the last statement.
    fn affected_rows(&self) -> u64;

    /// The first auto generated id of the last statement, or zero.
    fn last_insert_id(&self) -> u64;

    fn warnings(&self) -> Vec<SqlWarning>;

    fn append_warnings(&mut self, warnings: Vec<SqlWarning>);

    /// Record a failed statement in the warning list at error level.
    fn append_error(&mut self, err: &Error);
}

/// Render a value the way the engine's text protocol would, with [`NULL_TEXT`] for `NULL`.
pub fn datum_to_string(datum: &Datum) -> String {
    datum.to_text().unwrap_or_else(|| NULL_TEXT.to_owned())
}

/// Drain a record set into string rows. The record set is left open.
pub fn rows_to_strings(rs: &mut impl RecordSet) -> Result<Vec<Vec<String>>> {
    let mut rows = vec![];
    while let Some(row) = rs.next()? {
        rows.push(row.iter().map(datum_to_string).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use sqltk_core::{ErrClass, ErrorCode, SqlError};

    use super::*;

    struct VecRecordSet {
        fields: Vec<Field>,
        rows: std::vec::IntoIter<Result<Row>>,
    }

    impl FallibleIterator for VecRecordSet {
        type Item = Row;
        type Error = Error;

        fn next(&mut self) -> Result<Option<Row>> {
            self.rows.next().transpose()
        }
    }

    impl RecordSet for VecRecordSet {
        fn fields(&self) -> &[Field] {
            &self.fields
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn renders_nulls_and_numbers() -> Result<()> {
        let mut rs = VecRecordSet {
            fields: vec![Field::new("a"), Field::new("b")],
            rows: vec![
                Ok(vec![Datum::from(1), Datum::Null]),
                Ok(vec![Datum::from(1.5), Datum::from("x")]),
            ]
            .into_iter(),
        };
        assert_eq!(rs.fields()[1].name(), "b");
        assert_eq!(rows_to_strings(&mut rs)?, vec![vec!["1", "<nil>"], vec!["1.5", "x"]]);
        Ok(())
    }

    #[test]
    fn streaming_errors_are_returned() {
        let err = SqlError::new(ErrClass::Types, ErrorCode::DATA_OUT_OF_RANGE, "out of range");
        let mut rs = VecRecordSet {
            fields: vec![Field::new("a")],
            rows: vec![Ok(vec![Datum::from(1)]), Err(err.into())].into_iter(),
        };
        let err = rows_to_strings(&mut rs).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DATA_OUT_OF_RANGE));
    }
}
