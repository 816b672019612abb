use std::fmt;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A MySQL compatible error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode(u16);

impl ErrorCode {
    pub const BAD_NULL: Self = Self(1048);
    pub const TABLE_EXISTS: Self = Self(1050);
    pub const BAD_TABLE: Self = Self(1051);
    pub const BAD_FIELD: Self = Self(1054);
    pub const DUP_FIELD_NAME: Self = Self(1060);
    pub const DUP_KEY_NAME: Self = Self(1061);
    pub const DUP_ENTRY: Self = Self(1062);
    pub const PARSE: Self = Self(1064);
    pub const INVALID_DEFAULT: Self = Self(1067);
    pub const MULTIPLE_PRI_KEY: Self = Self(1068);
    pub const KEY_COLUMN_DOES_NOT_EXIST: Self = Self(1072);
    pub const CANT_DROP_FIELD_OR_KEY: Self = Self(1091);
    pub const NO_TABLES_USED: Self = Self(1096);
    pub const UNKNOWN: Self = Self(1105);
    pub const WRONG_VALUE_COUNT_ON_ROW: Self = Self(1136);
    pub const NO_SUCH_TABLE: Self = Self(1146);
    pub const KEY_DOES_NOT_EXIST: Self = Self(1176);
    pub const UNKNOWN_SYSTEM_VARIABLE: Self = Self(1193);
    pub const WRONG_ARGUMENTS: Self = Self(1210);
    pub const WRONG_VALUE_FOR_VAR: Self = Self(1231);
    pub const NOT_SUPPORTED_YET: Self = Self(1235);
    pub const UNKNOWN_STMT_HANDLER: Self = Self(1243);
    pub const WARN_DATA_OUT_OF_RANGE: Self = Self(1264);
    pub const WARN_DATA_TRUNCATED: Self = Self(1265);
    pub const TRUNCATED_WRONG_VALUE: Self = Self(1292);
    pub const FUNCTION_NOT_DEFINED: Self = Self(1305);
    pub const NO_DEFAULT_FOR_FIELD: Self = Self(1364);
    pub const DIVISION_BY_ZERO: Self = Self(1365);
    pub const TRUNCATED_WRONG_VALUE_FOR_FIELD: Self = Self(1366);
    pub const DATA_TOO_LONG: Self = Self(1406);
    pub const WRONG_PARAM_COUNT_TO_NATIVE_FCT: Self = Self(1582);
    pub const DEPRECATED_SYNTAX_NO_REPLACEMENT: Self = Self(1681);
    pub const DATA_OUT_OF_RANGE: Self = Self(1690);

    #[inline]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<u16> for ErrorCode {
    #[inline]
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.0
    }
}

impl PartialEq<u16> for ErrorCode {
    #[inline]
    fn eq(&self, other: &u16) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The layer of the engine that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrClass {
    Parser,
    Schema,
    Planner,
    Executor,
    Expression,
    Types,
    Variable,
    Session,
    Table,
}

impl fmt::Display for ErrClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrClass::Parser => "parser",
            ErrClass::Schema => "schema",
            ErrClass::Planner => "planner",
            ErrClass::Executor => "executor",
            ErrClass::Expression => "expression",
            ErrClass::Types => "types",
            ErrClass::Variable => "variable",
            ErrClass::Session => "session",
            ErrClass::Table => "table",
        };
        f.write_str(s)
    }
}

/// An error carrying a SQL error code, displayed as `[class:code]message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{class}:{code}]{message}")]
pub struct SqlError {
    class: ErrClass,
    code: ErrorCode,
    message: String,
}

impl SqlError {
    pub fn new(class: ErrClass, code: ErrorCode, message: impl Into<String>) -> Self {
        Self { class, code, message: message.into() }
    }

    #[inline]
    pub fn class(&self) -> ErrClass {
        self.class
    }

    #[inline]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The message without the `[class:code]` prefix.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sql(#[from] SqlError),

    /// A failure with no SQL error code attached.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Sql(err) => Some(err.code()),
            Error::Internal(_) => None,
        }
    }

    /// The structured form of this error. Uncoded errors report [`ErrorCode::UNKNOWN`].
    pub fn to_sql_error(&self) -> SqlError {
        match self {
            Error::Sql(err) => err.clone(),
            Error::Internal(err) => SqlError::new(ErrClass::Session, ErrorCode::UNKNOWN, err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarnLevel {
    Note,
    Warning,
    Error,
}

impl fmt::Display for WarnLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarnLevel::Note => f.write_str("Note"),
            WarnLevel::Warning => f.write_str("Warning"),
            WarnLevel::Error => f.write_str("Error"),
        }
    }
}

/// An entry of a session's warning list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlWarning {
    pub level: WarnLevel,
    pub error: SqlError,
}

impl SqlWarning {
    #[inline]
    pub fn warning(error: SqlError) -> Self {
        Self { level: WarnLevel::Warning, error }
    }

    #[inline]
    pub fn note(error: SqlError) -> Self {
        Self { level: WarnLevel::Note, error }
    }

    #[inline]
    pub fn error(error: SqlError) -> Self {
        Self { level: WarnLevel::Error, error }
    }
}

impl fmt::Display for SqlWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.level, self.error.code(), self.error.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_error_display() {
        let err = SqlError::new(ErrClass::Schema, ErrorCode::NO_SUCH_TABLE, "Table 'test.t' doesn't exist");
        assert_eq!(err.to_string(), "[schema:1146]Table 'test.t' doesn't exist");

        let err = Error::from(err);
        assert_eq!(err.code(), Some(ErrorCode::NO_SUCH_TABLE));
        assert_eq!(err.to_string(), "[schema:1146]Table 'test.t' doesn't exist");
    }

    #[test]
    fn internal_errors_have_no_code() {
        let err = Error::from(anyhow::anyhow!("boom"));
        assert_eq!(err.code(), None);
        assert_eq!(err.to_sql_error().code(), ErrorCode::UNKNOWN);
        assert_eq!(err.to_string(), "boom");
    }
}
