use std::str::FromStr;

use sqltk_core::{Datum, SqlError};

use crate::errors;

/// Modes accepted by `sql_mode`.
const SQL_MODES: &[&str] = &[
    "ALLOW_INVALID_DATES",
    "ANSI_QUOTES",
    "ERROR_FOR_DIVISION_BY_ZERO",
    "HIGH_NOT_PRECEDENCE",
    "IGNORE_SPACE",
    "NO_AUTO_CREATE_USER",
    "NO_AUTO_VALUE_ON_ZERO",
    "NO_BACKSLASH_ESCAPES",
    "NO_ENGINE_SUBSTITUTION",
    "NO_UNSIGNED_SUBTRACTION",
    "NO_ZERO_DATE",
    "NO_ZERO_IN_DATE",
    "ONLY_FULL_GROUP_BY",
    "PAD_CHAR_TO_FULL_LENGTH",
    "PIPES_AS_CONCAT",
    "REAL_AS_FLOAT",
    "STRICT_ALL_TABLES",
    "STRICT_TRANS_TABLES",
];

pub const DEFAULT_SQL_MODE: &str = "ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES,NO_ZERO_IN_DATE,NO_ZERO_DATE,ERROR_FOR_DIVISION_BY_ZERO,NO_AUTO_CREATE_USER,NO_ENGINE_SUBSTITUTION";

/// Options a [`MemStore`](crate::MemStore) is created with. They seed the global system variables.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub sql_mode: String,
    pub autocommit: bool,
    pub auto_increment_increment: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            sql_mode: DEFAULT_SQL_MODE.to_owned(),
            autocommit: true,
            auto_increment_increment: 1,
        }
    }
}

/// The system variables of a session, or the global defaults new sessions copy.
#[derive(Debug, Clone)]
pub struct SystemVars {
    autocommit: bool,
    sql_mode: String,
    sql_select_limit: u64,
    auto_increment_increment: u64,
}

impl SystemVars {
    pub(crate) fn new(options: &StoreOptions) -> Self {
        Self {
            autocommit: options.autocommit,
            sql_mode: options.sql_mode.to_uppercase(),
            sql_select_limit: u64::MAX,
            auto_increment_increment: options.auto_increment_increment.max(1),
        }
    }

    #[inline]
    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    #[inline]
    pub fn sql_mode(&self) -> &str {
        &self.sql_mode
    }

    /// Whether invalid data is rejected by DML instead of being adjusted with a warning.
    pub fn strict(&self) -> bool {
        self.sql_mode
            .split(',')
            .any(|mode| mode == "STRICT_TRANS_TABLES" || mode == "STRICT_ALL_TABLES")
    }

    #[inline]
    pub fn sql_select_limit(&self) -> u64 {
        self.sql_select_limit
    }

    #[inline]
    pub fn auto_increment_increment(&self) -> u64 {
        self.auto_increment_increment
    }

    pub fn get(&self, name: &str) -> Result<Datum, SqlError> {
        let value = match SystemVariable::from_str(name)? {
            SystemVariable::Autocommit => Datum::from(self.autocommit),
            SystemVariable::SqlMode => Datum::from(&self.sql_mode),
            SystemVariable::SqlSelectLimit => Datum::from(self.sql_select_limit),
            SystemVariable::AutoIncrementIncrement => Datum::from(self.auto_increment_increment),
        };
        Ok(value)
    }

    pub fn set(&mut self, name: &str, value: &Datum) -> Result<(), SqlError> {
        match SystemVariable::from_str(name)? {
            SystemVariable::Autocommit => self.autocommit = parse_bool(name, value)?,
            SystemVariable::SqlMode => self.sql_mode = parse_sql_mode(name, value)?,
            SystemVariable::SqlSelectLimit => {
                self.sql_select_limit = parse_uint(name, value, 0..=u64::MAX)?
            }
            SystemVariable::AutoIncrementIncrement => {
                self.auto_increment_increment = parse_uint(name, value, 1..=65535)?
            }
        }
        Ok(())
    }
}

fn display(value: &Datum) -> String {
    value.to_text().unwrap_or_else(|| "NULL".to_owned())
}

fn parse_bool(name: &str, value: &Datum) -> Result<bool, SqlError> {
    if let Datum::Text(s) = value {
        return match s.to_uppercase().as_str() {
            "ON" | "TRUE" | "1" => Ok(true),
            "OFF" | "FALSE" | "0" => Ok(false),
            _ => Err(errors::wrong_value_for_var(name, s)),
        };
    }
    match value.to_number() {
        Some((n, _)) if n.as_i64() == Some(1) => Ok(true),
        Some((n, _)) if n.as_i64() == Some(0) => Ok(false),
        _ => Err(errors::wrong_value_for_var(name, display(value))),
    }
}

fn parse_uint(
    name: &str,
    value: &Datum,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64, SqlError> {
    let n = match value {
        Datum::Int(i) => u64::try_from(*i).ok(),
        Datum::UInt(u) => Some(*u),
        Datum::Text(s) => s.trim().parse::<u64>().ok(),
        Datum::Float(_) | Datum::Null => None,
    };
    match n {
        Some(n) if range.contains(&n) => Ok(n),
        _ => Err(errors::wrong_value_for_var(name, display(value))),
    }
}

fn parse_sql_mode(name: &str, value: &Datum) -> Result<String, SqlError> {
    let Datum::Text(s) = value else { return Err(errors::wrong_value_for_var(name, display(value))) };
    let modes = s
        .split(',')
        .map(|mode| mode.trim().to_uppercase())
        .filter(|mode| !mode.is_empty())
        .collect::<Vec<_>>();
    if let Some(invalid) = modes.iter().find(|mode| !SQL_MODES.contains(&mode.as_str())) {
        return Err(errors::wrong_value_for_var(name, invalid));
    }
    Ok(modes.join(","))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SystemVariable {
    Autocommit,
    SqlMode,
    SqlSelectLimit,
    AutoIncrementIncrement,
}

impl FromStr for SystemVariable {
    type Err = SqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "autocommit" => Ok(SystemVariable::Autocommit),
            "sql_mode" => Ok(SystemVariable::SqlMode),
            "sql_select_limit" => Ok(SystemVariable::SqlSelectLimit),
            "auto_increment_increment" => Ok(SystemVariable::AutoIncrementIncrement),
            _ => Err(errors::unknown_system_variable(s)),
        }
    }
}
