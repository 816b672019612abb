use std::fmt;

use sqltk_core::{Datum, Name, Number, SqlError, SqlWarning};
use sqltk_parse::{ast, system_variable, VarScope};

use crate::catalog::{Column, Table};
use crate::ir::{lower_binary_op, lower_ident, lower_number, lower_value, BinaryOp, DataType, UnaryOp};
use crate::session::SessionState;
use crate::{errors, MemStore, Result, DATABASE};

/// An expression with its columns resolved to row offsets and its constants folded in.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BoundExpr {
    Literal(Datum),
    Column { index: usize, table: Name, name: Name },
    Unary { op: UnaryOp, expr: Box<BoundExpr> },
    Binary { op: BinaryOp, lhs: Box<BoundExpr>, rhs: Box<BoundExpr> },
    IsNull { expr: Box<BoundExpr>, negated: bool },
    Function { func: Function, args: Vec<BoundExpr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Concat,
    IfNull,
    Abs,
}

impl Function {
    fn name(self) -> &'static str {
        match self {
            Function::Concat => "concat",
            Function::IfNull => "ifnull",
            Function::Abs => "abs",
        }
    }
}

impl BoundExpr {
    #[inline]
    pub fn is_constant(&self) -> bool {
        match self {
            BoundExpr::Literal(_) => true,
            BoundExpr::Column { .. } => false,
            BoundExpr::Unary { expr, .. } | BoundExpr::IsNull { expr, .. } => expr.is_constant(),
            BoundExpr::Binary { lhs, rhs, .. } => lhs.is_constant() && rhs.is_constant(),
            BoundExpr::Function { args, .. } => args.iter().all(BoundExpr::is_constant),
        }
    }

    /// The expression in the functional form plans print, `eq(test.t.a, 1)`.
    pub fn explain(&self) -> String {
        match self {
            BoundExpr::Literal(Datum::Text(s)) => format!("\"{s}\""),
            BoundExpr::Literal(datum) => datum.to_string(),
            BoundExpr::Column { table, name, .. } => format!("{DATABASE}.{table}.{name}"),
            BoundExpr::Unary { op: UnaryOp::Neg, expr } => format!("unaryminus({})", expr.explain()),
            BoundExpr::Unary { op: UnaryOp::Not, expr } => format!("not({})", expr.explain()),
            BoundExpr::Binary { op, lhs, rhs } => {
                format!("{}({}, {})", op.func_name(), lhs.explain(), rhs.explain())
            }
            BoundExpr::IsNull { expr, negated: false } => format!("isnull({})", expr.explain()),
            BoundExpr::IsNull { expr, negated: true } => format!("not(isnull({}))", expr.explain()),
            BoundExpr::Function { func, args } => format!(
                "{}({})",
                func.name(),
                itertools::join(args.iter().map(BoundExpr::explain), ", ")
            ),
        }
    }
}

impl fmt::Display for BoundExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundExpr::Literal(Datum::Text(s)) => write!(f, "'{s}'"),
            BoundExpr::Literal(datum) => write!(f, "{datum}"),
            BoundExpr::Column { table, name, .. } => write!(f, "{DATABASE}.{table}.{name}"),
            BoundExpr::Unary { op: UnaryOp::Neg, expr } => write!(f, "-{expr}"),
            BoundExpr::Unary { op: UnaryOp::Not, expr } => write!(f, "not {expr}"),
            BoundExpr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            BoundExpr::IsNull { expr, negated: false } => write!(f, "{expr} is null"),
            BoundExpr::IsNull { expr, negated: true } => write!(f, "{expr} is not null"),
            BoundExpr::Function { func, args } => {
                write!(f, "{}({})", func.name(), itertools::join(args, ", "))
            }
        }
    }
}

/// The table expressions are resolved against, possibly under an alias.
#[derive(Clone, Copy)]
pub(crate) struct Scope<'a> {
    pub table: &'a Table,
    pub alias: Option<&'a Name>,
}

impl<'a> Scope<'a> {
    fn resolve(&self, qualifier: Option<&Name>, name: &Name) -> Option<(usize, &'a Column)> {
        if let Some(qualifier) = qualifier {
            let visible_as = self.alias.unwrap_or(&self.table.name);
            if qualifier != visible_as {
                return None;
            }
        }
        let index = self.table.column_index(name)?;
        Some((index, &self.table.columns[index]))
    }
}

pub(crate) struct Binder<'a> {
    store: &'a MemStore,
    state: &'a SessionState,
    params: &'a [Datum],
    scope: Option<Scope<'a>>,
    /// Used in unknown column errors
    clause: &'static str,
}

impl<'a> Binder<'a> {
    pub fn new(store: &'a MemStore, state: &'a SessionState, params: &'a [Datum]) -> Self {
        Self { store, state, params, scope: None, clause: "field list" }
    }

    pub fn with_scope(mut self, scope: Scope<'a>) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn clause(&mut self, clause: &'static str) -> &mut Self {
        self.clause = clause;
        self
    }

    pub fn bind(&self, expr: &ast::Expr) -> Result<BoundExpr> {
        let bound = match expr {
            ast::Expr::Value(ast::Value::Placeholder(placeholder)) => {
                // placeholders are numbered from 1 by the parser, `?1`
                let param = placeholder
                    .strip_prefix('?')
                    .and_then(|n| n.parse::<usize>().ok())
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| self.params.get(idx));
                match param {
                    Some(datum) => BoundExpr::Literal(datum.clone()),
                    None => return Err(errors::wrong_arguments("EXECUTE").into()),
                }
            }
            ast::Expr::Value(value) => match lower_value(value) {
                Some(datum) => BoundExpr::Literal(datum),
                None => return Err(errors::not_supported(value).into()),
            },
            ast::Expr::Identifier(ident) => self.bind_name(std::slice::from_ref(ident))?,
            ast::Expr::CompoundIdentifier(parts) => self.bind_name(parts)?,
            ast::Expr::Nested(expr) => self.bind(expr)?,
            ast::Expr::UnaryOp { op, expr } => match (op, &**expr) {
                // `-9223372036854775808` is a literal, not the negation of one that is out of range
                (ast::UnaryOperator::Minus, ast::Expr::Value(ast::Value::Number(n, _))) => {
                    BoundExpr::Literal(lower_number(&format!("-{n}")))
                }
                (ast::UnaryOperator::Plus, expr) => self.bind(expr)?,
                (ast::UnaryOperator::Minus, expr) => {
                    BoundExpr::Unary { op: UnaryOp::Neg, expr: Box::new(self.bind(expr)?) }
                }
                (ast::UnaryOperator::Not, expr) => {
                    BoundExpr::Unary { op: UnaryOp::Not, expr: Box::new(self.bind(expr)?) }
                }
                (op, _) => return Err(errors::not_supported(format!("operator {op}")).into()),
            },
            ast::Expr::BinaryOp { left, op, right } => BoundExpr::Binary {
                op: lower_binary_op(op)?,
                lhs: Box::new(self.bind(left)?),
                rhs: Box::new(self.bind(right)?),
            },
            ast::Expr::IsNull(expr) => BoundExpr::IsNull { expr: Box::new(self.bind(expr)?), negated: false },
            ast::Expr::IsNotNull(expr) => BoundExpr::IsNull { expr: Box::new(self.bind(expr)?), negated: true },
            ast::Expr::Function(func) => self.bind_function(func)?,
            expr => return Err(errors::not_supported(expr).into()),
        };
        Ok(bound)
    }

    /// A column reference, `a` or `t.a`, or a system variable, `@@global.a`.
    fn bind_name(&self, parts: &[ast::Ident]) -> Result<BoundExpr> {
        if let Some((scope, name)) = system_variable(parts) {
            let value = match scope {
                VarScope::Session => self.state.vars.get(name)?,
                VarScope::Global => self.store.global_vars().get(name)?,
            };
            return Ok(BoundExpr::Literal(value));
        }

        let Some((name, qualifiers)) = parts.split_last() else {
            return Err(errors::bad_field("", self.clause).into());
        };
        let name = lower_ident(name);
        let qualifier = qualifiers.last().map(lower_ident);
        let resolved = self
            .scope
            .and_then(|scope| Some((scope, scope.resolve(qualifier.as_ref(), &name)?)));
        match resolved {
            Some((scope, (index, column))) => Ok(BoundExpr::Column {
                index,
                table: scope.table.name.clone(),
                name: column.name.clone(),
            }),
            None => {
                let column = match qualifier {
                    Some(table) => format!("{table}.{name}"),
                    None => name.to_string(),
                };
                Err(errors::bad_field(column, self.clause).into())
            }
        }
    }

    fn bind_function(&self, func: &ast::Function) -> Result<BoundExpr> {
        if func.over.is_some() || func.filter.is_some() || func.distinct || !func.order_by.is_empty() {
            return Err(errors::not_supported(func).into());
        }
        let name = match func.name.0.as_slice() {
            [name] => lower_ident(name),
            _ => return Err(errors::not_supported(&func.name).into()),
        };
        let args = func
            .args
            .iter()
            .map(|arg| match arg {
                ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Expr(expr)) => Ok(expr),
                arg => Err(errors::not_supported(arg).into()),
            })
            .collect::<Result<Vec<_>>>()?;

        let check_arity = |ok: bool| if ok { Ok(()) } else { Err(errors::wrong_param_count(&name)) };
        let func = match name.as_str() {
            "connection_id" => {
                check_arity(args.is_empty())?;
                return Ok(BoundExpr::Literal(Datum::UInt(self.state.connection_id)));
            }
            "last_insert_id" => {
                check_arity(args.is_empty())?;
                return Ok(BoundExpr::Literal(Datum::UInt(self.state.last_insert_id)));
            }
            "concat" => {
                check_arity(!args.is_empty())?;
                Function::Concat
            }
            "ifnull" => {
                check_arity(args.len() == 2)?;
                Function::IfNull
            }
            "abs" => {
                check_arity(args.len() == 1)?;
                Function::Abs
            }
            _ => return Err(errors::function_not_defined(&name).into()),
        };
        let args = args.into_iter().map(|arg| self.bind(arg)).collect::<Result<Vec<_>>>()?;
        Ok(BoundExpr::Function { func, args })
    }
}

/// Evaluation state of a single statement.
#[derive(Debug, Default)]
pub(crate) struct Evaluator {
    /// Raise conditions like division by zero as errors, as strict DML does
    strict: bool,
    warnings: Vec<SqlWarning>,
}

impl Evaluator {
    pub fn new(strict: bool) -> Self {
        Self { strict, warnings: vec![] }
    }

    #[inline]
    pub fn take_warnings(&mut self) -> Vec<SqlWarning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn warn(&mut self, err: SqlError) {
        self.warnings.push(SqlWarning::warning(err));
    }

    pub fn eval(&mut self, expr: &BoundExpr, row: &[Datum]) -> Result<Datum> {
        let value = match expr {
            BoundExpr::Literal(datum) => datum.clone(),
            BoundExpr::Column { index, .. } => row[*index].clone(),
            BoundExpr::Unary { op: UnaryOp::Not, expr } => {
                let value = self.eval(expr, row)?;
                match self.truthy(&value) {
                    Some(b) => Datum::from(!b),
                    None => Datum::Null,
                }
            }
            BoundExpr::Unary { op: UnaryOp::Neg, expr: operand } => {
                let value = self.eval(operand, row)?;
                match self.number(&value) {
                    None => Datum::Null,
                    Some(Number::Float(f)) => Datum::Float(-f),
                    Some(n) => {
                        let neg = -integer(n);
                        match i64::try_from(neg) {
                            Ok(i) => Datum::Int(i),
                            Err(_) => return Err(errors::data_out_of_range("BIGINT", expr).into()),
                        }
                    }
                }
            }
            BoundExpr::IsNull { expr, negated } => {
                let value = self.eval(expr, row)?;
                Datum::from(value.is_null() != *negated)
            }
            BoundExpr::Binary { op: BinaryOp::And, lhs, rhs } => {
                let lhs = self.eval(lhs, row)?;
                let lhs = self.truthy(&lhs);
                if lhs == Some(false) {
                    return Ok(Datum::from(false));
                }
                let rhs = self.eval(rhs, row)?;
                match (lhs, self.truthy(&rhs)) {
                    (_, Some(false)) => Datum::from(false),
                    (Some(true), Some(true)) => Datum::from(true),
                    _ => Datum::Null,
                }
            }
            BoundExpr::Binary { op: BinaryOp::Or, lhs, rhs } => {
                let lhs = self.eval(lhs, row)?;
                let lhs = self.truthy(&lhs);
                if lhs == Some(true) {
                    return Ok(Datum::from(true));
                }
                let rhs = self.eval(rhs, row)?;
                match (lhs, self.truthy(&rhs)) {
                    (_, Some(true)) => Datum::from(true),
                    (Some(false), Some(false)) => Datum::from(false),
                    _ => Datum::Null,
                }
            }
            BoundExpr::Binary { op, lhs, rhs } if op.is_comparison() => {
                let lhs = self.eval(lhs, row)?;
                let rhs = self.eval(rhs, row)?;
                match lhs.sql_cmp(&rhs) {
                    None => Datum::Null,
                    Some(ord) => Datum::from(match op {
                        BinaryOp::Eq => ord.is_eq(),
                        BinaryOp::NotEq => ord.is_ne(),
                        BinaryOp::Lt => ord.is_lt(),
                        BinaryOp::LtEq => ord.is_le(),
                        BinaryOp::Gt => ord.is_gt(),
                        _ => ord.is_ge(),
                    }),
                }
            }
            BoundExpr::Binary { op, lhs: l, rhs: r } => {
                let lhs = self.eval(l, row)?;
                let rhs = self.eval(r, row)?;
                self.arithmetic(*op, &lhs, &rhs, expr)?
            }
            BoundExpr::Function { func, args } => self.eval_function(*func, args, row, expr)?,
        };
        Ok(value)
    }

    /// Whether a filter accepts the row, `NULL` rejects.
    pub fn eval_predicate(&mut self, expr: &BoundExpr, row: &[Datum]) -> Result<bool> {
        let value = self.eval(expr, row)?;
        Ok(self.truthy(&value).unwrap_or(false))
    }

    fn truthy(&mut self, value: &Datum) -> Option<bool> {
        self.number(value).map(|n| n.as_f64() != 0.0)
    }

    /// Numeric interpretation of a value. Text is always read as a double and a warning is
    /// raised if it is not entirely numeric.
    fn number(&mut self, value: &Datum) -> Option<Number> {
        let (n, lossless) = value.to_number()?;
        if let Datum::Text(s) = value {
            if !lossless {
                self.warn(errors::truncated_wrong_value("DOUBLE", s));
            }
            return Some(Number::Float(n.as_f64()));
        }
        Some(n)
    }

    fn division_by_zero(&mut self) -> Result<Datum> {
        if self.strict {
            return Err(errors::division_by_zero().into());
        }
        self.warn(errors::division_by_zero());
        Ok(Datum::Null)
    }

    fn arithmetic(&mut self, op: BinaryOp, lhs: &Datum, rhs: &Datum, expr: &BoundExpr) -> Result<Datum> {
        let (Some(a), Some(b)) = (self.number(lhs), self.number(rhs)) else { return Ok(Datum::Null) };

        if matches!(op, BinaryOp::Div) {
            if b.as_f64() == 0.0 {
                return self.division_by_zero();
            }
            return Ok(Datum::Float(a.as_f64() / b.as_f64()));
        }

        if let (Number::Float(_), _) | (_, Number::Float(_)) = (a, b) {
            let (a, b) = (a.as_f64(), b.as_f64());
            let value = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Mod if b == 0.0 => return self.division_by_zero(),
                BinaryOp::Mod => a % b,
                _ => unreachable!("not an arithmetic operator: {op}"),
            };
            if !value.is_finite() {
                return Err(errors::data_out_of_range("DOUBLE", expr).into());
            }
            return Ok(Datum::Float(value));
        }

        let unsigned = matches!(a, Number::UInt(_)) || matches!(b, Number::UInt(_));
        let (a, b) = (integer(a), integer(b));
        let value = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Mod if b == 0 => return self.division_by_zero(),
            BinaryOp::Mod => a.checked_rem(b),
            _ => unreachable!("not an arithmetic operator: {op}"),
        };

        let value = if unsigned {
            value.and_then(|v| u64::try_from(v).ok()).map(Datum::UInt)
        } else {
            value.and_then(|v| i64::try_from(v).ok()).map(Datum::Int)
        };
        let ty = if unsigned { "BIGINT UNSIGNED" } else { "BIGINT" };
        Ok(value.ok_or_else(|| errors::data_out_of_range(ty, expr))?)
    }

    fn eval_function(
        &mut self,
        func: Function,
        args: &[BoundExpr],
        row: &[Datum],
        expr: &BoundExpr,
    ) -> Result<Datum> {
        match func {
            Function::Concat => {
                let mut s = String::new();
                for arg in args {
                    match self.eval(arg, row)?.to_text() {
                        Some(text) => s.push_str(&text),
                        None => return Ok(Datum::Null),
                    }
                }
                Ok(Datum::Text(s))
            }
            Function::IfNull => {
                let value = self.eval(&args[0], row)?;
                if value.is_null() { self.eval(&args[1], row) } else { Ok(value) }
            }
            Function::Abs => {
                let value = self.eval(&args[0], row)?;
                let value = match self.number(&value) {
                    None => Datum::Null,
                    Some(Number::Float(f)) => Datum::Float(f.abs()),
                    Some(Number::UInt(u)) => Datum::UInt(u),
                    Some(Number::Int(i)) => match i.checked_abs() {
                        Some(i) => Datum::Int(i),
                        None => return Err(errors::data_out_of_range("BIGINT", expr).into()),
                    },
                };
                Ok(value)
            }
        }
    }
}

#[inline]
fn integer(n: Number) -> i128 {
    match n {
        Number::Int(i) => i as i128,
        Number::UInt(u) => u as i128,
        Number::Float(f) => f as i128,
    }
}

/// Converts a value for storage in `column`. Invalid values are errors in strict mode and are
/// adjusted with a warning otherwise. `row` is the 1-based row number used in messages.
pub(crate) fn cast_for_column(
    value: Datum,
    column: &Column,
    row: usize,
    strict: bool,
    eval: &mut Evaluator,
) -> Result<Datum> {
    if value.is_null() {
        return Ok(value);
    }

    match column.ty {
        DataType::Int { unsigned } => {
            let (n, lossless) = value.to_number().unwrap_or((Number::Int(0), true));
            if !lossless {
                let text = value.to_text().unwrap_or_default();
                let err = errors::incorrect_value_for_column("integer", &text, &column.name, row);
                if strict {
                    return Err(err.into());
                }
                eval.warn(err);
            }

            let n = match n {
                Number::Float(f) => f.round() as i128,
                n => integer(n),
            };
            let (min, max) = if unsigned { (0, u64::MAX as i128) } else { (i64::MIN as i128, i64::MAX as i128) };
            let clamped = n.clamp(min, max);
            if clamped != n {
                let err = errors::out_of_range_for_column(&column.name, row);
                if strict {
                    return Err(err.into());
                }
                eval.warn(err);
            }
            // the clamp guarantees the conversions succeed
            Ok(if unsigned {
                Datum::UInt(u64::try_from(clamped).unwrap_or_default())
            } else {
                Datum::Int(i64::try_from(clamped).unwrap_or_default())
            })
        }
        DataType::Float => {
            let (n, lossless) = value.to_number().unwrap_or((Number::Float(0.0), true));
            if !lossless {
                let text = value.to_text().unwrap_or_default();
                let err = errors::incorrect_value_for_column("double", &text, &column.name, row);
                if strict {
                    return Err(err.into());
                }
                eval.warn(err);
            }
            Ok(Datum::Float(n.as_f64()))
        }
        DataType::Text { max_len } => {
            let text = value.to_text().unwrap_or_default();
            match max_len {
                Some(max_len) if text.chars().count() > max_len as usize => {
                    if strict {
                        return Err(errors::data_too_long(&column.name, row).into());
                    }
                    eval.warn(errors::data_truncated(&column.name, row));
                    Ok(Datum::Text(text.chars().take(max_len as usize).collect()))
                }
                _ => Ok(Datum::Text(text)),
            }
        }
    }
}
