#![deny(rust_2018_idioms)]
//! Parsing with `sqlparser`'s MySQL dialect.
//!
//! A few MySQL forms the dialect rejects are handled around it. Index hints are lifted out of
//! the token stream before parsing, and `SET` and `DROP INDEX .. ON` are parsed here with the
//! parser's own primitives. `?` placeholders are numbered in the token stream so their position
//! survives into the tree.

mod mysql;

pub use sqlparser::ast;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Location, Token, TokenWithLocation, Tokenizer};
use sqltk_core::{ErrClass, ErrorCode, Name, SqlError, SqlWarning};

pub use self::mysql::system_variable;

pub type Result<T, E = SqlError> = std::result::Result<T, E>;

static DIALECT: MySqlDialect = MySqlDialect {};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarScope {
    Session,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintKind {
    /// `USE INDEX` or `FORCE INDEX`
    Use,
    Ignore,
}

/// `USE INDEX (a, b)` and friends following a table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHint {
    pub kind: HintKind,
    pub indexes: Vec<Name>,
}

/// One `name = value` of a `SET` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub scope: VarScope,
    pub name: Name,
    pub value: ast::Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A statement `sqlparser` parsed itself, with the index hints of its table.
    Sql { stmt: Box<ast::Statement>, hints: Vec<IndexHint> },
    Set(Vec<Assignment>),
    DropIndex { name: ast::Ident, table: ast::ObjectName },
}

impl Statement {
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Sql { stmt, .. } => statement_kind(stmt),
            Statement::Set(_) => "SET",
            Statement::DropIndex { .. } => "DROP INDEX",
        }
    }
}

/// The name of a statement as used in messages, `CREATE TABLE`.
pub fn statement_kind(stmt: &ast::Statement) -> &'static str {
    match stmt {
        ast::Statement::CreateTable { .. } => "CREATE TABLE",
        ast::Statement::CreateIndex { .. } => "CREATE INDEX",
        ast::Statement::Drop { object_type: ast::ObjectType::Table, .. } => "DROP TABLE",
        ast::Statement::Drop { .. } => "DROP",
        ast::Statement::Truncate { .. } => "TRUNCATE",
        ast::Statement::Insert { .. } => "INSERT",
        ast::Statement::Query(_) => "SELECT",
        ast::Statement::Update { .. } => "UPDATE",
        ast::Statement::Delete { .. } => "DELETE",
        ast::Statement::ShowTables { .. } => "SHOW TABLES",
        ast::Statement::ShowVariable { .. } | ast::Statement::ShowVariables { .. } => "SHOW",
        ast::Statement::Explain { .. } | ast::Statement::ExplainTable { .. } => "EXPLAIN",
        ast::Statement::SetVariable { .. } => "SET",
        _ => "STATEMENT",
    }
}

#[derive(Debug)]
pub struct Parsed {
    pub stmts: Vec<Statement>,
    pub warnings: Vec<SqlWarning>,
}

/// A single statement that may contain `?` placeholders.
#[derive(Debug)]
pub struct ParsedPrepared {
    pub stmt: Statement,
    pub param_count: usize,
    pub warnings: Vec<SqlWarning>,
}

/// Parse a `;` separated batch of statements. Placeholders are rejected.
pub fn parse_statements(sql: &str) -> Result<Parsed> {
    let tokens = tokenize(sql)?;
    if let Some(placeholder) = tokens.iter().find(|tok| matches!(tok.token, Token::Placeholder(_))) {
        return Err(syntax_error(sql, placeholder.location));
    }

    let mut parsed = Parsed { stmts: vec![], warnings: vec![] };
    for tokens in split_statements(tokens) {
        let stmt = parse_statement(sql, tokens)?;
        parsed.warnings.extend(mysql::deprecation_warnings(&stmt));
        parsed.stmts.push(stmt);
    }
    Ok(parsed)
}

/// Parse exactly one statement for preparation.
pub fn parse_prepared(sql: &str) -> Result<ParsedPrepared> {
    let mut tokens = tokenize(sql)?;
    let param_count = mysql::number_placeholders(&mut tokens);
    let mut stmts = split_statements(tokens);
    let tokens = match stmts.len() {
        0 => return Err(syntax_error(sql, Location { line: 0, column: 0 })),
        1 => stmts.remove(0),
        _ => {
            return Err(SqlError::new(
                ErrClass::Parser,
                ErrorCode::UNKNOWN,
                "Can not prepare multiple statements",
            ))
        }
    };

    let stmt = parse_statement(sql, tokens)?;
    let warnings = mysql::deprecation_warnings(&stmt).collect();
    Ok(ParsedPrepared { stmt, param_count, warnings })
}

fn tokenize(sql: &str) -> Result<Vec<TokenWithLocation>> {
    Tokenizer::new(&DIALECT, sql)
        .tokenize_with_location()
        .map_err(|err| syntax_error(sql, err.location))
}

/// Splits on `;`, dropping empty statements.
fn split_statements(tokens: Vec<TokenWithLocation>) -> Vec<Vec<TokenWithLocation>> {
    tokens
        .split(|tok| tok.token == Token::SemiColon)
        .filter(|stmt| stmt.iter().any(|tok| !matches!(tok.token, Token::Whitespace(_))))
        .map(<[_]>::to_vec)
        .collect()
}

fn parse_statement(sql: &str, mut tokens: Vec<TokenWithLocation>) -> Result<Statement> {
    let hints = mysql::take_index_hints(&mut tokens);
    let mut parser = Parser::new(&DIALECT).with_tokens_with_locations(tokens);
    let stmt = match mysql::parse_statement(&mut parser, hints) {
        Ok(stmt) => stmt,
        Err(err) => {
            tracing::trace!(%err, "failed to parse statement");
            let location = error_location(&err).unwrap_or_else(|| parser.peek_token().location);
            return Err(syntax_error(sql, location));
        }
    };

    let next = parser.peek_token();
    if next.token != Token::EOF {
        return Err(syntax_error(sql, next.location));
    }
    Ok(stmt)
}

/// `sqlparser` reports where it failed only as part of the message, `.. at Line: 1, Column 10`.
fn error_location(err: &ParserError) -> Option<Location> {
    let ParserError::ParserError(msg) = err else { return None };
    let (_, at) = msg.rsplit_once(" at Line: ")?;
    let (line, column) = at.split_once(", Column ")?;
    Some(Location { line: line.parse().ok()?, column: column.parse().ok()? })
}

/// The MySQL syntax error quoting the statement from `location` on. An unknown location, such as
/// the end of input, quotes nothing.
fn syntax_error(sql: &str, location: Location) -> SqlError {
    let (near, line) = match location.line {
        0 => ("", sql.split('\n').count()),
        line => (remainder(sql, location), line as usize),
    };
    SqlError::new(
        ErrClass::Parser,
        ErrorCode::PARSE,
        format!(
            "You have an error in your SQL syntax; check the manual that corresponds to your MySQL server version for the right syntax to use near '{near}' at line {line}"
        ),
    )
}

fn remainder(sql: &str, location: Location) -> &str {
    let line_start = sql
        .split_inclusive('\n')
        .take(location.line.saturating_sub(1) as usize)
        .map(str::len)
        .sum::<usize>();
    let rest = &sql[line_start.min(sql.len())..];
    match rest.char_indices().nth(location.column.saturating_sub(1) as usize) {
        Some((offset, _)) => &rest[offset..],
        None => "",
    }
}
