//! The executor's view of `sqlparser`'s tree.
//!
//! Statement structure is lowered here into the few shapes the executor supports, anything else
//! is reported as not supported. Expressions are left as parsed and are bound against a table by
//! [`Binder`](crate::eval::Binder).

use std::fmt;

use sqltk_core::{Datum, Name};
use sqltk_parse::{ast, IndexHint};

use crate::{errors, Result};

/// The storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataType {
    Int { unsigned: bool },
    Float,
    /// `max_len` is in characters
    Text { max_len: Option<u64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyKind {
    Primary,
    Unique,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    /// The name plans print the operator with.
    pub fn func_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "plus",
            BinaryOp::Sub => "minus",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Eq => "eq",
            BinaryOp::NotEq => "ne",
            BinaryOp::Lt => "lt",
            BinaryOp::LtEq => "le",
            BinaryOp::Gt => "gt",
            BinaryOp::GtEq => "ge",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    #[inline]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        )
    }

    /// The comparison with its operands swapped, `a < b` is `b > a`.
    pub fn flip(self) -> Self {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::LtEq => BinaryOp::GtEq,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::GtEq => BinaryOp::LtEq,
            op => op,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
}

pub(crate) fn lower_binary_op(op: &ast::BinaryOperator) -> Result<BinaryOp> {
    let op = match op {
        ast::BinaryOperator::Plus => BinaryOp::Add,
        ast::BinaryOperator::Minus => BinaryOp::Sub,
        ast::BinaryOperator::Multiply => BinaryOp::Mul,
        ast::BinaryOperator::Divide => BinaryOp::Div,
        ast::BinaryOperator::Modulo => BinaryOp::Mod,
        ast::BinaryOperator::Eq => BinaryOp::Eq,
        ast::BinaryOperator::NotEq => BinaryOp::NotEq,
        ast::BinaryOperator::Lt => BinaryOp::Lt,
        ast::BinaryOperator::LtEq => BinaryOp::LtEq,
        ast::BinaryOperator::Gt => BinaryOp::Gt,
        ast::BinaryOperator::GtEq => BinaryOp::GtEq,
        ast::BinaryOperator::And => BinaryOp::And,
        ast::BinaryOperator::Or => BinaryOp::Or,
        op => return Err(errors::not_supported(format!("operator {op}")).into()),
    };
    Ok(op)
}

/// A literal value. Numbers are integers where they fit, `TRUE` and `FALSE` are `1` and `0`.
pub(crate) fn lower_value(value: &ast::Value) -> Option<Datum> {
    let datum = match value {
        ast::Value::Number(n, _) => lower_number(n),
        ast::Value::SingleQuotedString(s) | ast::Value::DoubleQuotedString(s) => Datum::Text(s.clone()),
        ast::Value::Boolean(b) => Datum::from(*b),
        ast::Value::Null => Datum::Null,
        _ => return None,
    };
    Some(datum)
}

pub(crate) fn lower_number(n: &str) -> Datum {
    if let Ok(i) = n.parse::<i64>() {
        Datum::Int(i)
    } else if let Ok(u) = n.parse::<u64>() {
        Datum::UInt(u)
    } else {
        // the tokenizer only produces valid numeric text
        Datum::Float(n.parse().unwrap_or_default())
    }
}

#[inline]
pub(crate) fn lower_ident(ident: &ast::Ident) -> Name {
    Name::from(&ident.value)
}

/// Every table lives in the one database, so a qualified name is resolved by its last part.
pub(crate) fn lower_name(name: &ast::ObjectName) -> Result<Name> {
    match name.0.last() {
        Some(ident) => Ok(lower_ident(ident)),
        None => Err(errors::not_supported("empty name").into()),
    }
}

pub(crate) fn lower_ty(ty: &ast::DataType) -> Result<DataType> {
    use ast::DataType as Ty;

    let ty = match ty {
        Ty::TinyInt(_)
        | Ty::SmallInt(_)
        | Ty::MediumInt(_)
        | Ty::Int(_)
        | Ty::Integer(_)
        | Ty::BigInt(_)
        | Ty::Bool
        | Ty::Boolean => DataType::Int { unsigned: false },
        Ty::UnsignedTinyInt(_)
        | Ty::UnsignedSmallInt(_)
        | Ty::UnsignedMediumInt(_)
        | Ty::UnsignedInt(_)
        | Ty::UnsignedInteger(_)
        | Ty::UnsignedBigInt(_) => DataType::Int { unsigned: true },
        Ty::Float(_)
        | Ty::Real
        | Ty::Double
        | Ty::DoublePrecision
        | Ty::Decimal(_)
        | Ty::Dec(_)
        | Ty::Numeric(_) => DataType::Float,
        Ty::Char(len) | Ty::Character(len) => DataType::Text { max_len: Some(char_len(len)?.unwrap_or(1)) },
        Ty::Varchar(len) | Ty::CharacterVarying(len) | Ty::CharVarying(len) => {
            DataType::Text { max_len: char_len(len)? }
        }
        Ty::Text | Ty::String(_) => DataType::Text { max_len: None },
        Ty::Custom(name, _)
            if name.0.len() == 1
                && ["tinytext", "mediumtext", "longtext"]
                    .iter()
                    .any(|text| name.0[0].value.eq_ignore_ascii_case(text)) =>
        {
            DataType::Text { max_len: None }
        }
        ty => return Err(errors::not_supported(format!("type {ty}")).into()),
    };
    Ok(ty)
}

fn char_len(len: &Option<ast::CharacterLength>) -> Result<Option<u64>> {
    match len {
        None => Ok(None),
        Some(ast::CharacterLength::IntegerLength { length, .. }) => Ok(Some(*length)),
        Some(ast::CharacterLength::Max) => Err(errors::not_supported("type length MAX").into()),
    }
}

#[derive(Debug)]
pub(crate) struct ColumnDef<'a> {
    pub name: Name,
    pub ty: DataType,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default: Option<&'a ast::Expr>,
}

#[derive(Debug)]
pub(crate) struct KeyDef {
    pub kind: KeyKind,
    pub name: Option<Name>,
    pub columns: Vec<Name>,
}

#[derive(Debug)]
pub(crate) struct CreateTable<'a> {
    pub name: Name,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef<'a>>,
    pub keys: Vec<KeyDef>,
}

pub(crate) fn lower_create_table<'a>(
    name: &ast::ObjectName,
    if_not_exists: bool,
    columns: &'a [ast::ColumnDef],
    constraints: &[ast::TableConstraint],
) -> Result<CreateTable<'a>> {
    let columns = columns.iter().map(lower_column).collect::<Result<Vec<_>>>()?;
    let keys = constraints
        .iter()
        .map(|constraint| match constraint {
            ast::TableConstraint::Unique { name, columns, is_primary } => Ok(KeyDef {
                kind: if *is_primary { KeyKind::Primary } else { KeyKind::Unique },
                name: name.as_ref().map(lower_ident),
                columns: columns.iter().map(lower_ident).collect(),
            }),
            ast::TableConstraint::Index { name, columns, .. } => Ok(KeyDef {
                kind: KeyKind::Index,
                name: name.as_ref().map(lower_ident),
                columns: columns.iter().map(lower_ident).collect(),
            }),
            constraint => Err(errors::not_supported(constraint).into()),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CreateTable { name: lower_name(name)?, if_not_exists, columns, keys })
}

fn lower_column(column: &ast::ColumnDef) -> Result<ColumnDef<'_>> {
    let mut def = ColumnDef {
        name: lower_ident(&column.name),
        ty: lower_ty(&column.data_type)?,
        not_null: false,
        primary_key: false,
        unique: false,
        auto_increment: false,
        default: None,
    };
    for option in &column.options {
        match &option.option {
            ast::ColumnOption::Null => def.not_null = false,
            ast::ColumnOption::NotNull => def.not_null = true,
            ast::ColumnOption::Default(expr) => def.default = Some(expr),
            ast::ColumnOption::Unique { is_primary: true } => def.primary_key = true,
            ast::ColumnOption::Unique { is_primary: false } => def.unique = true,
            ast::ColumnOption::Comment(_) => {}
            ast::ColumnOption::DialectSpecific(tokens)
                if matches!(tokens.as_slice(), [token] if token.to_string().eq_ignore_ascii_case("AUTO_INCREMENT")) =>
            {
                def.auto_increment = true
            }
            option => return Err(errors::not_supported(format!("column option {option}")).into()),
        }
    }
    Ok(def)
}

#[derive(Debug)]
pub(crate) struct CreateIndex {
    pub name: Name,
    pub table: Name,
    pub unique: bool,
    pub columns: Vec<Name>,
}

pub(crate) fn lower_create_index(
    name: Option<&ast::ObjectName>,
    table: &ast::ObjectName,
    unique: bool,
    columns: &[ast::OrderByExpr],
) -> Result<CreateIndex> {
    let Some(name) = name else { return Err(errors::not_supported("CREATE INDEX without a name").into()) };
    let columns = columns
        .iter()
        .map(|column| match &column.expr {
            ast::Expr::Identifier(ident) => Ok(lower_ident(ident)),
            expr => Err(errors::not_supported(format!("index on {expr}")).into()),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CreateIndex { name: lower_name(name)?, table: lower_name(table)?, unique, columns })
}

/// A table read by a statement.
#[derive(Debug)]
pub(crate) struct TableRef {
    pub name: Name,
    pub alias: Option<Name>,
    pub hints: Vec<IndexHint>,
}

/// A single table without joins.
fn lower_table(table: &ast::TableWithJoins, hints: &[IndexHint]) -> Result<TableRef> {
    if !table.joins.is_empty() {
        return Err(errors::not_supported("JOIN").into());
    }
    match &table.relation {
        ast::TableFactor::Table { name, alias, args: None, .. } => Ok(TableRef {
            name: lower_name(name)?,
            alias: alias.as_ref().map(|alias| lower_ident(&alias.name)),
            hints: hints.to_vec(),
        }),
        relation => Err(errors::not_supported(relation).into()),
    }
}

/// The statements that read or write rows.
#[derive(Debug)]
pub(crate) enum Dml<'a> {
    Select(Select<'a>),
    Insert(Insert<'a>),
    Update(Update<'a>),
    Delete(Delete<'a>),
}

/// Lowers a query or a data modification, `None` for any other statement. `hints` are the index
/// hints of the statement's table.
pub(crate) fn lower_dml<'a>(stmt: &'a ast::Statement, hints: &[IndexHint]) -> Result<Option<Dml<'a>>> {
    let dml = match stmt {
        ast::Statement::Query(query) => Dml::Select(lower_query(query, hints)?),
        ast::Statement::Insert { ignore, table_name, columns, source, on, returning, .. } => {
            if *ignore || on.is_some() || returning.is_some() {
                return Err(errors::not_supported("INSERT IGNORE or ON DUPLICATE KEY UPDATE").into());
            }
            Dml::Insert(lower_insert(table_name, columns, source.as_deref())?)
        }
        ast::Statement::Update { table, assignments, from, selection, returning } => {
            if from.is_some() || returning.is_some() {
                return Err(errors::not_supported("multi-table UPDATE").into());
            }
            Dml::Update(lower_update(table, assignments, selection.as_ref(), hints)?)
        }
        ast::Statement::Delete { tables, from, using, selection, returning, order_by, limit } => {
            if !tables.is_empty() || using.is_some() || returning.is_some() || !order_by.is_empty() {
                return Err(errors::not_supported("multi-table or ordered DELETE").into());
            }
            Dml::Delete(lower_delete(from, selection.as_ref(), limit.as_ref(), hints)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(dml))
}

/// `LIMIT count` or `LIMIT offset, count`
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limit<'a> {
    pub count: &'a ast::Expr,
    pub offset: Option<&'a ast::Expr>,
}

#[derive(Debug)]
pub(crate) struct Select<'a> {
    pub from: Option<TableRef>,
    pub items: &'a [ast::SelectItem],
    pub selection: Option<&'a ast::Expr>,
    pub order_by: &'a [ast::OrderByExpr],
    pub limit: Option<Limit<'a>>,
}

fn lower_query<'a>(query: &'a ast::Query, hints: &[IndexHint]) -> Result<Select<'a>> {
    if query.with.is_some() {
        return Err(errors::not_supported("WITH").into());
    }
    if query.fetch.is_some() || !query.locks.is_empty() || !query.limit_by.is_empty() {
        return Err(errors::not_supported(query).into());
    }
    let ast::SetExpr::Select(select) = &*query.body else {
        return Err(errors::not_supported(&query.body).into());
    };
    if select.distinct.is_some() {
        return Err(errors::not_supported("DISTINCT").into());
    }
    if select.having.is_some() || !matches!(&select.group_by, ast::GroupByExpr::Expressions(exprs) if exprs.is_empty())
    {
        return Err(errors::not_supported("GROUP BY").into());
    }

    let from = match select.from.as_slice() {
        [] => None,
        [table] => Some(lower_table(table, hints)?),
        _ => return Err(errors::not_supported("JOIN").into()),
    };
    let limit = match (&query.limit, &query.offset) {
        (Some(count), offset) => Some(Limit { count, offset: offset.as_ref().map(|offset| &offset.value) }),
        (None, None) => None,
        (None, Some(_)) => return Err(errors::not_supported("OFFSET without LIMIT").into()),
    };

    Ok(Select {
        from,
        items: &select.projection,
        selection: select.selection.as_ref(),
        order_by: &query.order_by,
        limit,
    })
}

#[derive(Debug)]
pub(crate) struct Insert<'a> {
    pub table: Name,
    /// `None` targets every column in order
    pub columns: Option<Vec<Name>>,
    pub rows: &'a [Vec<ast::Expr>],
}

fn lower_insert<'a>(
    table: &ast::ObjectName,
    columns: &[ast::Ident],
    source: Option<&'a ast::Query>,
) -> Result<Insert<'a>> {
    let Some(source) = source else { return Err(errors::not_supported("INSERT without VALUES").into()) };
    let ast::SetExpr::Values(values) = &*source.body else {
        return Err(errors::not_supported("INSERT ... SELECT").into());
    };

    // `INSERT INTO t () VALUES ()` fills every column from its default
    let all_empty = values.rows.iter().all(Vec::is_empty);
    let columns = match columns {
        [] if all_empty => Some(vec![]),
        [] => None,
        columns => Some(columns.iter().map(lower_ident).collect()),
    };
    Ok(Insert { table: lower_name(table)?, columns, rows: &values.rows })
}

#[derive(Debug)]
pub(crate) struct Update<'a> {
    pub table: TableRef,
    pub assignments: Vec<(Name, &'a ast::Expr)>,
    pub selection: Option<&'a ast::Expr>,
}

fn lower_update<'a>(
    table: &ast::TableWithJoins,
    assignments: &'a [ast::Assignment],
    selection: Option<&'a ast::Expr>,
    hints: &[IndexHint],
) -> Result<Update<'a>> {
    let table = lower_table(table, hints)?;
    let assignments = assignments
        .iter()
        .map(|assignment| match assignment.id.as_slice() {
            [column] => Ok((lower_ident(column), &assignment.value)),
            [.., qualifier, column]
                if table.alias.as_ref().unwrap_or(&table.name) == &lower_ident(qualifier) =>
            {
                Ok((lower_ident(column), &assignment.value))
            }
            id => Err(errors::bad_field(ast::ObjectName(id.to_vec()), "field list").into()),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Update { table, assignments, selection })
}

#[derive(Debug)]
pub(crate) struct Delete<'a> {
    pub table: TableRef,
    pub selection: Option<&'a ast::Expr>,
    pub limit: Option<&'a ast::Expr>,
}

fn lower_delete<'a>(
    from: &[ast::TableWithJoins],
    selection: Option<&'a ast::Expr>,
    limit: Option<&'a ast::Expr>,
    hints: &[IndexHint],
) -> Result<Delete<'a>> {
    let table = match from {
        [table] => lower_table(table, hints)?,
        _ => return Err(errors::not_supported("multi-table DELETE").into()),
    };
    Ok(Delete { table, selection, limit })
}

/// Splits a filter on `AND`, `a = 1 AND (b = 2 AND c = 3)` gives three conditions.
pub(crate) fn conjuncts(expr: &ast::Expr) -> Vec<&ast::Expr> {
    match expr {
        ast::Expr::BinaryOp { left, op: ast::BinaryOperator::And, right } => {
            let mut exprs = conjuncts(left);
            exprs.extend(conjuncts(right));
            exprs
        }
        ast::Expr::Nested(inner) if matches!(**inner, ast::Expr::BinaryOp { op: ast::BinaryOperator::And, .. }) => {
            conjuncts(inner)
        }
        expr => vec![expr],
    }
}

#[cfg(test)]
mod tests {
    use sqltk_parse::Statement;

    use super::*;

    fn parse_one(sql: &str) -> Statement {
        sqltk_parse::parse_statements(sql).unwrap().stmts.remove(0)
    }

    #[test]
    fn test_lower_create_table() -> Result<()> {
        let Statement::Sql { stmt, .. } = parse_one(
            "create table t (id bigint unsigned primary key auto_increment, v varchar(5) not null default 'x', c char, \
             d double, unique key uv (v), key (c))",
        ) else {
            panic!()
        };
        let ast::Statement::CreateTable { name, if_not_exists, columns, constraints, .. } = &*stmt else { panic!() };
        let create = lower_create_table(name, *if_not_exists, columns, constraints)?;

        let types = create.columns.iter().map(|c| (c.name.as_str(), c.ty)).collect::<Vec<_>>();
        assert_eq!(
            types,
            [
                ("id", DataType::Int { unsigned: true }),
                ("v", DataType::Text { max_len: Some(5) }),
                ("c", DataType::Text { max_len: Some(1) }),
                ("d", DataType::Float),
            ]
        );
        assert!(create.columns[0].primary_key && create.columns[0].auto_increment);
        assert!(create.columns[1].not_null);
        assert_eq!(create.columns[1].default.map(ToString::to_string).as_deref(), Some("'x'"));

        let keys = create.keys.iter().map(|k| (k.kind, k.name.clone(), k.columns.clone())).collect::<Vec<_>>();
        assert_eq!(
            keys,
            [
                (KeyKind::Unique, Some(Name::from("uv")), vec![Name::from("v")]),
                (KeyKind::Index, None, vec![Name::from("c")]),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_unsupported_types() {
        let Statement::Sql { stmt, .. } = parse_one("create table t (a date)") else { panic!() };
        let ast::Statement::CreateTable { name, columns, constraints, .. } = &*stmt else { panic!() };
        let err = lower_create_table(name, false, columns, constraints).unwrap_err();
        assert_eq!(err.to_string(), "[planner:1235]This version of MySQL doesn't yet support 'type DATE'");
    }

    #[test]
    fn test_conjuncts() {
        let expr = ast::Expr::BinaryOp {
            left: Box::new(ast::Expr::Identifier(ast::Ident::new("a"))),
            op: ast::BinaryOperator::And,
            right: Box::new(ast::Expr::Nested(Box::new(ast::Expr::BinaryOp {
                left: Box::new(ast::Expr::Identifier(ast::Ident::new("b"))),
                op: ast::BinaryOperator::And,
                right: Box::new(ast::Expr::Identifier(ast::Ident::new("c"))),
            }))),
        };
        let exprs = conjuncts(&expr).into_iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(exprs, ["a", "b", "c"]);
    }

    #[test]
    fn test_lower_number() {
        assert_eq!(lower_number("12"), Datum::Int(12));
        assert_eq!(lower_number("18446744073709551615"), Datum::UInt(u64::MAX));
        assert_eq!(lower_number("1.5"), Datum::Float(1.5));
    }
}
