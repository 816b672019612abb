//! The MySQL forms `sqlparser` does not accept.

use sqlparser::ast;
use sqlparser::keywords::Keyword;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Token, TokenWithLocation};
use sqltk_core::{ErrClass, ErrorCode, Name, SqlError, SqlWarning};

use crate::{Assignment, HintKind, IndexHint, Statement, VarScope};

pub(crate) fn parse_statement(
    parser: &mut Parser<'_>,
    hints: Vec<IndexHint>,
) -> Result<Statement, ParserError> {
    if parser.parse_keyword(Keyword::SET) {
        return Ok(Statement::Set(parser.parse_comma_separated(parse_assignment)?));
    }

    if parser.parse_keywords(&[Keyword::DROP, Keyword::INDEX]) {
        let name = parser.parse_identifier()?;
        parser.expect_keyword(Keyword::ON)?;
        let table = parser.parse_object_name()?;
        return Ok(Statement::DropIndex { name, table });
    }

    let stmt = parser.parse_statement()?;
    Ok(Statement::Sql { stmt: Box::new(stmt), hints })
}

/// `[GLOBAL | SESSION | LOCAL] name = expr` or `@@[global. | session.]name = expr`
fn parse_assignment(parser: &mut Parser<'_>) -> Result<Assignment, ParserError> {
    let (scope, name) =
        match parser.parse_one_of_keywords(&[Keyword::GLOBAL, Keyword::SESSION, Keyword::LOCAL]) {
            Some(Keyword::GLOBAL) => (VarScope::Global, parser.parse_identifier()?.value),
            Some(_) => (VarScope::Session, parser.parse_identifier()?.value),
            None => {
                let name = parser.parse_object_name()?;
                match (system_variable(&name.0), &name.0[..]) {
                    (Some((scope, name)), _) => (scope, name.to_owned()),
                    (None, [ident]) if !ident.value.starts_with('@') => {
                        (VarScope::Session, ident.value.clone())
                    }
                    _ => return parser.expected("a system variable", parser.peek_token()),
                }
            }
        };
    parser.expect_token(&Token::Eq)?;
    let value = parser.parse_expr()?;
    Ok(Assignment { scope, name: Name::from(name), value })
}

/// Splits a `@@name`, `@@global.name` or `@@session.name` reference.
pub fn system_variable(parts: &[ast::Ident]) -> Option<(VarScope, &str)> {
    match parts {
        [var] if var.quote_style.is_none() => {
            let name = var.value.strip_prefix("@@")?;
            (!name.is_empty() && !name.starts_with('@')).then_some((VarScope::Session, name))
        }
        [scope, name] if scope.quote_style.is_none() => {
            let scope = match scope.value.strip_prefix("@@")?.to_ascii_lowercase().as_str() {
                "global" => VarScope::Global,
                "session" | "local" => VarScope::Session,
                _ => return None,
            };
            Some((scope, name.value.as_str()))
        }
        _ => None,
    }
}

/// Gives every `?` its 1-based position, `?1`, `?2`, .. and returns how many there are.
pub(crate) fn number_placeholders(tokens: &mut [TokenWithLocation]) -> usize {
    let mut count = 0;
    for tok in tokens {
        if let Token::Placeholder(placeholder) = &mut tok.token {
            count += 1;
            *placeholder = format!("?{count}");
        }
    }
    count
}

/// Removes `{USE | FORCE | IGNORE} {INDEX | KEY} (name, ..)` from the tokens of a statement.
pub(crate) fn take_index_hints(tokens: &mut Vec<TokenWithLocation>) -> Vec<IndexHint> {
    let mut hints = vec![];
    let mut start = 0;
    while start < tokens.len() {
        match index_hint_at(tokens, start) {
            Some((hint, end)) => {
                tokens.drain(start..end);
                hints.push(hint);
            }
            None => start += 1,
        }
    }
    hints
}

fn index_hint_at(tokens: &[TokenWithLocation], start: usize) -> Option<(IndexHint, usize)> {
    let mut significant = tokens
        .iter()
        .enumerate()
        .skip(start)
        .filter(|(_, tok)| !matches!(tok.token, Token::Whitespace(_)));

    let (first, tok) = significant.next()?;
    if first != start {
        return None;
    }
    let kind = match bare_word(&tok.token)? {
        "USE" | "FORCE" => HintKind::Use,
        "IGNORE" => HintKind::Ignore,
        _ => return None,
    };
    if !matches!(bare_word(&significant.next()?.1.token)?, "INDEX" | "KEY") {
        return None;
    }
    if significant.next()?.1.token != Token::LParen {
        return None;
    }

    let mut indexes = vec![];
    loop {
        let (i, tok) = significant.next()?;
        match &tok.token {
            Token::RParen if indexes.is_empty() => return Some((IndexHint { kind, indexes }, i + 1)),
            Token::Word(word) => indexes.push(Name::from(&word.value)),
            _ => return None,
        }
        let (i, tok) = significant.next()?;
        match tok.token {
            Token::Comma => {}
            Token::RParen => return Some((IndexHint { kind, indexes }, i + 1)),
            _ => return None,
        }
    }
}

/// The uppercase text of an unquoted word.
fn bare_word(token: &Token) -> Option<&'static str> {
    let Token::Word(word) = token else { return None };
    if word.quote_style.is_some() {
        return None;
    }
    ["USE", "FORCE", "IGNORE", "INDEX", "KEY"]
        .into_iter()
        .find(|kw| word.value.eq_ignore_ascii_case(kw))
}

/// MySQL deprecates the display width of integer columns, `INT(11)`, one warning per column.
pub(crate) fn deprecation_warnings(stmt: &Statement) -> impl Iterator<Item = SqlWarning> + '_ {
    let columns: &[ast::ColumnDef] = match stmt {
        Statement::Sql { stmt, .. } => match &**stmt {
            ast::Statement::CreateTable { columns, .. } => &columns[..],
            _ => &[],
        },
        _ => &[],
    };
    columns.iter().filter(|column| has_display_width(&column.data_type)).map(|_| {
        SqlWarning::warning(SqlError::new(
            ErrClass::Parser,
            ErrorCode::DEPRECATED_SYNTAX_NO_REPLACEMENT,
            "Integer display width is deprecated and will be removed in a future release.",
        ))
    })
}

fn has_display_width(ty: &ast::DataType) -> bool {
    matches!(
        ty,
        ast::DataType::TinyInt(Some(_))
            | ast::DataType::UnsignedTinyInt(Some(_))
            | ast::DataType::SmallInt(Some(_))
            | ast::DataType::UnsignedSmallInt(Some(_))
            | ast::DataType::MediumInt(Some(_))
            | ast::DataType::UnsignedMediumInt(Some(_))
            | ast::DataType::Int(Some(_))
            | ast::DataType::UnsignedInt(Some(_))
            | ast::DataType::Integer(Some(_))
            | ast::DataType::UnsignedInteger(Some(_))
            | ast::DataType::BigInt(Some(_))
            | ast::DataType::UnsignedBigInt(Some(_))
    )
}
