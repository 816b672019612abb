//! Constructors for the errors raised by the store, with MySQL compatible codes and messages.

use std::fmt::Display;

use sqltk_core::{Datum, ErrClass, ErrorCode, Name, SqlError};

use crate::DATABASE;

pub(crate) fn table_exists(table: &Name) -> SqlError {
    SqlError::new(
        ErrClass::Schema,
        ErrorCode::TABLE_EXISTS,
        format!("Table '{DATABASE}.{table}' already exists"),
    )
}

pub(crate) fn no_such_table(table: &Name) -> SqlError {
    SqlError::new(
        ErrClass::Schema,
        ErrorCode::NO_SUCH_TABLE,
        format!("Table '{DATABASE}.{table}' doesn't exist"),
    )
}

pub(crate) fn bad_tables(tables: &[&Name]) -> SqlError {
    let tables = itertools::join(tables.iter().map(|t| format!("{DATABASE}.{t}")), ",");
    SqlError::new(ErrClass::Schema, ErrorCode::BAD_TABLE, format!("Unknown table '{tables}'"))
}

pub(crate) fn bad_field(column: impl Display, clause: &str) -> SqlError {
    SqlError::new(
        ErrClass::Planner,
        ErrorCode::BAD_FIELD,
        format!("Unknown column '{column}' in '{clause}'"),
    )
}

pub(crate) fn no_tables_used() -> SqlError {
    SqlError::new(ErrClass::Planner, ErrorCode::NO_TABLES_USED, "No tables used")
}

pub(crate) fn dup_field_name(column: &Name) -> SqlError {
    SqlError::new(
        ErrClass::Schema,
        ErrorCode::DUP_FIELD_NAME,
        format!("Duplicate column name '{column}'"),
    )
}

pub(crate) fn dup_key_name(index: &Name) -> SqlError {
    SqlError::new(ErrClass::Schema, ErrorCode::DUP_KEY_NAME, format!("Duplicate key name '{index}'"))
}

pub(crate) fn multiple_pri_key() -> SqlError {
    SqlError::new(ErrClass::Schema, ErrorCode::MULTIPLE_PRI_KEY, "Multiple primary key defined")
}

pub(crate) fn key_column_does_not_exist(column: &Name) -> SqlError {
    SqlError::new(
        ErrClass::Schema,
        ErrorCode::KEY_COLUMN_DOES_NOT_EXIST,
        format!("Key column '{column}' doesn't exist in table"),
    )
}

pub(crate) fn key_does_not_exist(index: &Name, table: &Name) -> SqlError {
    SqlError::new(
        ErrClass::Planner,
        ErrorCode::KEY_DOES_NOT_EXIST,
        format!("Key '{index}' doesn't exist in table '{table}'"),
    )
}

pub(crate) fn cant_drop_key(index: &Name) -> SqlError {
    SqlError::new(
        ErrClass::Schema,
        ErrorCode::CANT_DROP_FIELD_OR_KEY,
        format!("Can't DROP '{index}'; check that column/key exists"),
    )
}

pub(crate) fn dup_entry(values: &[Datum], table: &Name, index: &Name) -> SqlError {
    let entry = itertools::join(values.iter().map(|v| v.to_text().unwrap_or_default()), "-");
    let index = if index == &"primary" { "PRIMARY" } else { index.as_str() };
    SqlError::new(
        ErrClass::Table,
        ErrorCode::DUP_ENTRY,
        format!("Duplicate entry '{entry}' for key '{table}.{index}'"),
    )
}

pub(crate) fn bad_null(column: &Name) -> SqlError {
    SqlError::new(ErrClass::Table, ErrorCode::BAD_NULL, format!("Column '{column}' cannot be null"))
}

pub(crate) fn no_default_for_field(column: &Name) -> SqlError {
    SqlError::new(
        ErrClass::Table,
        ErrorCode::NO_DEFAULT_FOR_FIELD,
        format!("Field '{column}' doesn't have a default value"),
    )
}

pub(crate) fn wrong_value_count_on_row(row: usize) -> SqlError {
    SqlError::new(
        ErrClass::Planner,
        ErrorCode::WRONG_VALUE_COUNT_ON_ROW,
        format!("Column count doesn't match value count at row {row}"),
    )
}

pub(crate) fn out_of_range_for_column(column: &Name, row: usize) -> SqlError {
    SqlError::new(
        ErrClass::Types,
        ErrorCode::WARN_DATA_OUT_OF_RANGE,
        format!("Out of range value for column '{column}' at row {row}"),
    )
}

pub(crate) fn incorrect_value_for_column(ty: &str, value: &str, column: &Name, row: usize) -> SqlError {
    SqlError::new(
        ErrClass::Types,
        ErrorCode::TRUNCATED_WRONG_VALUE_FOR_FIELD,
        format!("Incorrect {ty} value: '{value}' for column '{column}' at row {row}"),
    )
}

pub(crate) fn data_too_long(column: &Name, row: usize) -> SqlError {
    SqlError::new(
        ErrClass::Types,
        ErrorCode::DATA_TOO_LONG,
        format!("Data too long for column '{column}' at row {row}"),
    )
}

pub(crate) fn data_truncated(column: &Name, row: usize) -> SqlError {
    SqlError::new(
        ErrClass::Types,
        ErrorCode::WARN_DATA_TRUNCATED,
        format!("Data truncated for column '{column}' at row {row}"),
    )
}

pub(crate) fn data_out_of_range(ty: &str, expr: impl Display) -> SqlError {
    SqlError::new(
        ErrClass::Types,
        ErrorCode::DATA_OUT_OF_RANGE,
        format!("{ty} value is out of range in '{expr}'"),
    )
}

pub(crate) fn division_by_zero() -> SqlError {
    SqlError::new(ErrClass::Expression, ErrorCode::DIVISION_BY_ZERO, "Division by 0")
}

pub(crate) fn truncated_wrong_value(ty: &str, value: &str) -> SqlError {
    SqlError::new(
        ErrClass::Types,
        ErrorCode::TRUNCATED_WRONG_VALUE,
        format!("Truncated incorrect {ty} value: '{value}'"),
    )
}

pub(crate) fn function_not_defined(name: &Name) -> SqlError {
    SqlError::new(
        ErrClass::Expression,
        ErrorCode::FUNCTION_NOT_DEFINED,
        format!("FUNCTION {DATABASE}.{name} does not exist"),
    )
}

pub(crate) fn wrong_param_count(name: &Name) -> SqlError {
    SqlError::new(
        ErrClass::Expression,
        ErrorCode::WRONG_PARAM_COUNT_TO_NATIVE_FCT,
        format!("Incorrect parameter count in the call to native function '{name}'"),
    )
}

pub(crate) fn unknown_system_variable(name: &str) -> SqlError {
    SqlError::new(
        ErrClass::Variable,
        ErrorCode::UNKNOWN_SYSTEM_VARIABLE,
        format!("Unknown system variable '{name}'"),
    )
}

pub(crate) fn wrong_value_for_var(name: &str, value: impl Display) -> SqlError {
    SqlError::new(
        ErrClass::Variable,
        ErrorCode::WRONG_VALUE_FOR_VAR,
        format!("Variable '{name}' can't be set to the value of '{value}'"),
    )
}

pub(crate) fn wrong_arguments(to: &str) -> SqlError {
    SqlError::new(ErrClass::Session, ErrorCode::WRONG_ARGUMENTS, format!("Incorrect arguments to {to}"))
}

pub(crate) fn unknown_stmt_handler(id: impl Display, to: &str) -> SqlError {
    SqlError::new(
        ErrClass::Session,
        ErrorCode::UNKNOWN_STMT_HANDLER,
        format!("Unknown prepared statement handler ({id}) given to {to}"),
    )
}

pub(crate) fn not_supported(what: impl Display) -> SqlError {
    SqlError::new(
        ErrClass::Planner,
        ErrorCode::NOT_SUPPORTED_YET,
        format!("This version of MySQL doesn't yet support '{what}'"),
    )
}

pub(crate) fn invalid_default(column: &Name) -> SqlError {
    SqlError::new(
        ErrClass::Schema,
        ErrorCode::INVALID_DEFAULT,
        format!("Invalid default value for '{column}'"),
    )
}
