use std::cmp::Ordering;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use sqltk_core::{Datum, Name, SqlError, SqlWarning};
use sqltk_parse::{ast, statement_kind, system_variable, Assignment, IndexHint, Statement, VarScope};
use sqltk_session::{Field, Row};

use crate::catalog::{Column, Table};
use crate::eval::{cast_for_column, Binder, BoundExpr, Evaluator, Scope};
use crate::ir::{
    conjuncts, lower_create_index, lower_create_table, lower_dml, lower_ident, lower_name, CreateIndex,
    CreateTable, DataType, Delete, Dml, Insert, Limit, Select, TableRef, Update,
};
use crate::plan::{
    dml_plan, explain_rows, plan_access, query_plan, Access, ExecStats, PlanNode, QueryShape,
    EXPLAIN_ANALYZE_FIELDS, EXPLAIN_FIELDS,
};
use crate::record_set::{CursorGuard, MemRecordSet};
use crate::session::{SessionState, StmtCtx};
use crate::{errors, MemStore, Result, DATABASE};

/// Executes one statement on behalf of a session.
pub(crate) struct Executor<'a> {
    pub store: &'a MemStore,
    pub state: &'a mut SessionState,
    pub stmt: &'a Arc<Mutex<StmtCtx>>,
    /// Values of the `?` placeholders of a prepared statement
    pub params: &'a [Datum],
    pub cursors: &'a Arc<AtomicUsize>,
}

/// A select with its expressions bound against its table.
struct BoundQuery {
    fields: Vec<Field>,
    access: Access,
    order_by: Vec<(BoundExpr, bool)>,
    /// `(offset, count)`
    limit: Option<(u64, u64)>,
    /// `None` for a plain `SELECT *`
    projection: Option<Vec<BoundExpr>>,
}

impl BoundQuery {
    /// The projection as it shows up in plans, one that just forwards the table is omitted.
    fn shown_projection(&self, table: Option<&Table>) -> Option<&[BoundExpr]> {
        let projection = self.projection.as_deref()?;
        let forwards_table = table.map_or(false, |table| {
            projection.len() == table.columns.len()
                && projection
                    .iter()
                    .enumerate()
                    .all(|(i, expr)| matches!(expr, BoundExpr::Column { index, .. } if *index == i))
        });
        (!forwards_table).then_some(projection)
    }

    fn shape<'q>(&'q self, table: Option<&'q Table>) -> QueryShape<'q> {
        QueryShape {
            table,
            access: &self.access,
            order_by: &self.order_by,
            limit: self.limit,
            projection: self.shown_projection(table),
        }
    }
}

/// The rows an update or delete applies to.
struct BoundSource {
    access: Access,
    limit: Option<u64>,
}

/// `SHOW WARNINGS`, which reports on the statement before it.
pub(crate) fn is_show_warnings(stmt: &Statement) -> bool {
    match stmt {
        Statement::Sql { stmt, .. } => matches!(
            &**stmt,
            ast::Statement::ShowVariable { variable } if matches!(variable.as_slice(), [word] if word.value.eq_ignore_ascii_case("warnings"))
        ),
        _ => false,
    }
}

impl Executor<'_> {
    pub fn execute(mut self, stmt: Statement) -> Result<Option<MemRecordSet>> {
        if is_show_warnings(&stmt) {
            return Ok(Some(self.show_warnings()));
        }

        let (stmt, hints) = match stmt {
            Statement::Sql { stmt, hints } => (stmt, hints),
            Statement::Set(assignments) => {
                self.set(&assignments)?;
                return Ok(None);
            }
            Statement::DropIndex { name, table } => {
                let table = lower_name(&table)?;
                self.store.catalog().write().get_mut(&table)?.drop_index(&lower_ident(&name))?;
                return Ok(None);
            }
        };

        match &*stmt {
            ast::Statement::CreateTable { name, if_not_exists, columns, constraints, .. } => {
                self.create_table(&lower_create_table(name, *if_not_exists, columns, constraints)?)?
            }
            ast::Statement::CreateIndex { name, table_name, columns, unique, .. } => {
                self.create_index(&lower_create_index(name.as_ref(), table_name, *unique, columns)?)?
            }
            ast::Statement::Drop { object_type: ast::ObjectType::Table, if_exists, names, .. } => {
                let names = names.iter().map(lower_name).collect::<Result<Vec<_>>>()?;
                self.drop_tables(&names, *if_exists)?
            }
            ast::Statement::Truncate { table_name, partitions: None, .. } => {
                self.store.catalog().write().get_mut(&lower_name(table_name)?)?.truncate()
            }
            ast::Statement::ShowTables { filter: None, .. } => return Ok(Some(self.show_tables())),
            ast::Statement::Explain { analyze, statement, .. } => {
                return self.explain(statement, *analyze, &hints).map(Some);
            }
            stmt => match lower_dml(stmt, &hints)? {
                Some(Dml::Select(select)) => return self.select(&select).map(Some),
                Some(Dml::Insert(insert)) => {
                    self.insert(&insert)?;
                }
                Some(Dml::Update(update)) => {
                    self.update(&update)?;
                }
                Some(Dml::Delete(delete)) => {
                    self.delete(&delete)?;
                }
                None => return Err(errors::not_supported(statement_kind(stmt)).into()),
            },
        }
        Ok(None)
    }

    fn binder(&self) -> Binder<'_> {
        Binder::new(self.store, self.state, self.params)
    }

    fn record_set(&self, fields: Vec<Field>, rows: Vec<Row>, projection: Option<Vec<BoundExpr>>) -> MemRecordSet {
        MemRecordSet::new(fields, rows, projection, Arc::clone(self.stmt), CursorGuard::new(self.cursors))
    }

    fn warn(&self, warnings: Vec<SqlWarning>) {
        if !warnings.is_empty() {
            self.stmt.lock().warnings.extend(warnings);
        }
    }

    fn note(&self, err: SqlError) {
        self.stmt.lock().warnings.push(SqlWarning::note(err));
    }

    fn create_table(&self, create: &CreateTable<'_>) -> Result<()> {
        let mut catalog = self.store.catalog().write();
        if catalog.contains(&create.name) {
            if create.if_not_exists {
                self.note(errors::table_exists(&create.name));
                return Ok(());
            }
            return Err(errors::table_exists(&create.name).into());
        }

        let binder = self.binder();
        let mut eval = Evaluator::new(true);
        let defaults = create
            .columns
            .iter()
            .map(|def| {
                let Some(expr) = def.default else { return Ok(None) };
                let column = Column {
                    name: def.name.clone(),
                    ty: def.ty,
                    nullable: !def.not_null && !def.primary_key,
                    auto_increment: def.auto_increment,
                    default: None,
                };
                let value = binder
                    .bind(expr)
                    .and_then(|bound| eval.eval(&bound, &[]))
                    .and_then(|value| cast_for_column(value, &column, 1, true, &mut eval));
                match value {
                    Ok(value) if !(value.is_null() && !column.nullable) && !column.auto_increment => {
                        Ok(Some(value))
                    }
                    _ => Err(errors::invalid_default(&def.name).into()),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let table = Table::new(create, defaults)?;
        tracing::debug!(table = %table.name, columns = table.columns.len(), "created table");
        catalog.insert(table);
        Ok(())
    }

    fn create_index(&self, create: &CreateIndex) -> Result<()> {
        let mut catalog = self.store.catalog().write();
        catalog.get_mut(&create.table)?.create_index(create)
    }

    fn drop_tables(&self, names: &[Name], if_exists: bool) -> Result<()> {
        let mut catalog = self.store.catalog().write();
        let missing = names.iter().filter(|name| !catalog.contains(name)).collect::<Vec<_>>();
        if !missing.is_empty() {
            if !if_exists {
                return Err(errors::bad_tables(&missing).into());
            }
            for name in missing {
                self.note(errors::bad_tables(&[name]));
            }
        }

        for name in names {
            catalog.remove(name);
        }
        Ok(())
    }

    fn set(&mut self, assignments: &[Assignment]) -> Result<()> {
        let mut values = Vec::with_capacity(assignments.len());
        {
            let binder = self.binder();
            let mut eval = Evaluator::new(false);
            for assignment in assignments {
                let value = match &assignment.value {
                    // `SET autocommit = ON`, the bare word is the value
                    ast::Expr::Identifier(word) if system_variable(std::slice::from_ref(word)).is_none() => {
                        Datum::Text(word.value.clone())
                    }
                    expr => eval.eval(&binder.bind(expr)?, &[])?,
                };
                values.push(value);
            }
            self.warn(eval.take_warnings());
        }

        for (assignment, value) in assignments.iter().zip(&values) {
            match assignment.scope {
                VarScope::Session => self.state.vars.set(&assignment.name, value)?,
                VarScope::Global => self.store.set_global_var(&assignment.name, value)?,
            }
        }
        Ok(())
    }

    fn show_warnings(&self) -> MemRecordSet {
        let rows = self
            .stmt
            .lock()
            .warnings
            .iter()
            .map(|warning| {
                vec![
                    Datum::Text(warning.level.to_string()),
                    Datum::UInt(u64::from(u16::from(warning.error.code()))),
                    Datum::from(warning.error.message()),
                ]
            })
            .collect();
        let fields = vec![Field::new("Level"), Field::new("Code"), Field::new("Message")];
        self.record_set(fields, rows, None)
    }

    fn show_tables(&self) -> MemRecordSet {
        let rows = self
            .store
            .catalog()
            .read()
            .table_names()
            .into_iter()
            .map(|name| vec![Datum::Text(name.into())])
            .collect();
        self.record_set(vec![Field::new(format!("Tables_in_{DATABASE}"))], rows, None)
    }

    fn select(&self, select: &Select<'_>) -> Result<MemRecordSet> {
        let catalog = self.store.catalog().read();
        let table = select.from.as_ref().map(|from| catalog.get(&from.name)).transpose()?;
        let query = self.bind_query(select, table)?;
        let (rows, _) = self.query(table, &query)?;
        Ok(self.record_set(query.fields, rows, query.projection))
    }

    fn bind_query(&self, select: &Select<'_>, table: Option<&Table>) -> Result<BoundQuery> {
        let scope = table.zip(select.from.as_ref()).map(|(table, from)| Scope { table, alias: from.alias.as_ref() });
        let mut binder = self.binder();
        if let Some(scope) = scope {
            binder = binder.with_scope(scope);
        }

        let conds = match select.selection {
            Some(selection) => {
                binder.clause("where clause");
                conjuncts(selection).into_iter().map(|expr| binder.bind(expr)).collect::<Result<Vec<_>>>()?
            }
            None => vec![],
        };

        binder.clause("field list");
        let mut fields = vec![];
        let mut projection = vec![];
        let mut aliases = vec![];
        for item in select.items {
            match item {
                ast::SelectItem::Wildcard(_) => {
                    let Some(scope) = scope else { return Err(errors::no_tables_used().into()) };
                    for (index, column) in scope.table.columns.iter().enumerate() {
                        fields.push(Field::new(column.name.as_str()));
                        projection.push(BoundExpr::Column {
                            index,
                            table: scope.table.name.clone(),
                            name: column.name.clone(),
                        });
                        aliases.push(None);
                    }
                }
                ast::SelectItem::UnnamedExpr(expr) => {
                    fields.push(Field::new(field_name(expr)));
                    projection.push(binder.bind(expr)?);
                    aliases.push(None);
                }
                ast::SelectItem::ExprWithAlias { expr, alias } => {
                    fields.push(Field::new(alias.value.as_str()));
                    projection.push(binder.bind(expr)?);
                    aliases.push(Some(lower_ident(alias)));
                }
                item => return Err(errors::not_supported(item).into()),
            }
        }

        binder.clause("order clause");
        let order_by = select
            .order_by
            .iter()
            .map(|order| {
                let position = match &order.expr {
                    ast::Expr::Value(ast::Value::Number(n, _)) => n.parse::<i64>().ok(),
                    _ => None,
                };
                let expr = match (&order.expr, position) {
                    // `ORDER BY 2` refers to the second item of the select list
                    (_, Some(position)) => usize::try_from(position)
                        .ok()
                        .and_then(|position| position.checked_sub(1))
                        .and_then(|idx| projection.get(idx))
                        .cloned()
                        .ok_or_else(|| errors::bad_field(position, "order clause"))?,
                    (ast::Expr::Identifier(ident), None) => {
                        let name = lower_ident(ident);
                        match aliases.iter().position(|alias| alias.as_ref() == Some(&name)) {
                            Some(idx) => projection[idx].clone(),
                            None => binder.bind(&order.expr)?,
                        }
                    }
                    (expr, None) => binder.bind(expr)?,
                };
                Ok((expr, order.asc == Some(false)))
            })
            .collect::<Result<Vec<_>>>()?;

        let limit = select.limit.map(|limit| eval_limit(&binder, limit)).transpose()?;

        let access = match (scope, &select.from) {
            (Some(scope), Some(from)) => plan_access(scope.table, &from.hints, conds)?,
            _ => Access::dual(conds),
        };

        let plain_wildcard = matches!(select.items, [ast::SelectItem::Wildcard(_)]);
        Ok(BoundQuery {
            fields,
            access,
            order_by,
            limit,
            projection: (!plain_wildcard).then_some(projection),
        })
    }

    /// Rows matching the access conditions and the filter, with their row ids.
    fn read(&self, table: Option<&Table>, access: &Access, eval: &mut Evaluator) -> Result<(Vec<(u64, Row)>, ExecStats)> {
        let mut stats = ExecStats::default();
        let empty = [(0, vec![])];
        let rows: Box<dyn Iterator<Item = (&u64, &Row)> + '_> = match table {
            Some(table) => Box::new(table.rows.iter()),
            None => Box::new(empty.iter().map(|(id, row)| (id, row))),
        };

        let mut matched = vec![];
        'rows: for (&id, row) in rows {
            stats.table += 1;
            for cond in &access.access_conds {
                if !eval.eval_predicate(cond, row)? {
                    continue 'rows;
                }
            }
            stats.access += 1;
            for cond in &access.filter {
                if !eval.eval_predicate(cond, row)? {
                    continue 'rows;
                }
            }
            stats.matched += 1;
            matched.push((id, row.clone()));
        }
        Ok((matched, stats))
    }

    /// The source rows of a query, sorted and limited. The projection is left to the record set.
    fn query(&self, table: Option<&Table>, query: &BoundQuery) -> Result<(Vec<Row>, ExecStats)> {
        let mut eval = Evaluator::new(false);
        let (rows, mut stats) = self.read(table, &query.access, &mut eval)?;
        let mut rows = rows.into_iter().map(|(_, row)| row).collect::<Vec<_>>();

        if !query.order_by.is_empty() {
            let mut keyed = rows
                .into_iter()
                .map(|row| {
                    let keys = query
                        .order_by
                        .iter()
                        .map(|(expr, _)| eval.eval(expr, &row))
                        .collect::<Result<Vec<_>>>()?;
                    Ok((keys, row))
                })
                .collect::<Result<Vec<_>>>()?;
            keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, &query.order_by));
            rows = keyed.into_iter().map(|(_, row)| row).collect();
        }

        let (offset, count) = query.limit.unwrap_or((0, self.state.vars.sql_select_limit()));
        let rows = rows.into_iter().skip(saturating_usize(offset)).take(saturating_usize(count)).collect::<Vec<_>>();
        stats.output = rows.len();
        self.warn(eval.take_warnings());
        Ok((rows, stats))
    }

    fn bind_source(
        &self,
        table: &Table,
        table_ref: &TableRef,
        selection: Option<&ast::Expr>,
        limit: Option<&ast::Expr>,
    ) -> Result<BoundSource> {
        let mut binder =
            self.binder().with_scope(Scope { table, alias: table_ref.alias.as_ref() });
        binder.clause("where clause");
        let conds = selection
            .map(|selection| conjuncts(selection).into_iter().map(|expr| binder.bind(expr)).collect::<Result<Vec<_>>>())
            .transpose()?
            .unwrap_or_default();
        let limit = limit.map(|limit| eval_count(&binder, limit)).transpose()?;
        Ok(BoundSource { access: plan_access(table, &table_ref.hints, conds)?, limit })
    }

    fn source_plan(
        &self,
        table_ref: &TableRef,
        selection: Option<&ast::Expr>,
        limit: Option<&ast::Expr>,
    ) -> Result<PlanNode> {
        let catalog = self.store.catalog().read();
        let table = catalog.get(&table_ref.name)?;
        let source = self.bind_source(table, table_ref, selection, limit)?;
        Ok(query_plan(&QueryShape {
            table: Some(table),
            access: &source.access,
            order_by: &[],
            limit: source.limit.map(|count| (0, count)),
            projection: None,
        }))
    }

    fn insert(&mut self, insert: &Insert<'_>) -> Result<ExecStats> {
        let strict = self.state.vars.strict();
        let increment = self.state.vars.auto_increment_increment();
        let mut catalog = self.store.catalog().write();
        let mut staged = catalog.get(&insert.table)?.clone();

        let targets = match &insert.columns {
            Some(columns) => columns
                .iter()
                .map(|name| {
                    staged.column_index(name).ok_or_else(|| errors::bad_field(name, "field list").into())
                })
                .collect::<Result<Vec<_>>>()?,
            None => (0..staged.columns.len()).collect(),
        };

        let binder = self.binder();
        let mut eval = Evaluator::new(strict);
        let mut inserted = vec![];
        let mut first_generated_id = None;
        for (i, values) in insert.rows.iter().enumerate() {
            let row_number = i + 1;
            if values.len() != targets.len() {
                return Err(errors::wrong_value_count_on_row(row_number).into());
            }

            let mut provided: Vec<Option<Datum>> = vec![None; staged.columns.len()];
            for (&target, expr) in targets.iter().zip(values) {
                provided[target] = Some(eval.eval(&binder.bind(expr)?, &[])?);
            }

            let mut row = Vec::with_capacity(staged.columns.len());
            for (idx, value) in provided.into_iter().enumerate() {
                let column = &staged.columns[idx];
                let value = match value {
                    Some(value) => cast_for_column(value, column, row_number, strict, &mut eval)?,
                    None if column.auto_increment => Datum::Null,
                    None => match &column.default {
                        Some(default) => default.clone(),
                        None if column.nullable => Datum::Null,
                        None => {
                            let err = errors::no_default_for_field(&column.name);
                            if strict {
                                return Err(err.into());
                            }
                            eval.warn(err);
                            zero_value(column.ty)
                        }
                    },
                };

                let value = if column.auto_increment {
                    if is_unset_auto_id(&value) {
                        let id = staged.auto_id;
                        staged.auto_id = id.saturating_add(increment);
                        first_generated_id.get_or_insert(id);
                        cast_for_column(Datum::UInt(id), column, row_number, strict, &mut eval)?
                    } else {
                        if let Some(id) = value.to_number().and_then(|(n, _)| n.as_i64()).and_then(|n| u64::try_from(n).ok()) {
                            staged.auto_id = staged.auto_id.max(id.saturating_add(1));
                        }
                        value
                    }
                } else {
                    value
                };

                if value.is_null() && !staged.columns[idx].nullable {
                    return Err(errors::bad_null(&staged.columns[idx].name).into());
                }
                row.push(value);
            }

            let id = staged.next_row_id();
            staged.rows.insert(id, row);
            inserted.push(id);
        }

        staged.check_unique(&staged.rows, &inserted)?;
        *catalog.get_mut(&insert.table)? = staged;
        drop(catalog);

        self.warn(eval.take_warnings());
        let last_insert_id = first_generated_id.unwrap_or(0);
        {
            let mut stmt = self.stmt.lock();
            stmt.affected_rows = inserted.len() as u64;
            stmt.last_insert_id = last_insert_id;
        }
        if last_insert_id != 0 {
            self.state.last_insert_id = last_insert_id;
        }
        tracing::trace!(table = %insert.table, rows = inserted.len(), "inserted rows");
        Ok(ExecStats { output: inserted.len(), ..Default::default() })
    }

    fn update(&self, update: &Update<'_>) -> Result<ExecStats> {
        let strict = self.state.vars.strict();
        let mut catalog = self.store.catalog().write();
        let table = catalog.get(&update.table.name)?;
        let source = self.bind_source(table, &update.table, update.selection, None)?;

        let binder = self
            .binder()
            .with_scope(Scope { table, alias: update.table.alias.as_ref() });
        let assignments = update
            .assignments
            .iter()
            .map(|(name, expr)| {
                let column = table.column_index(name).ok_or_else(|| errors::bad_field(name, "field list"))?;
                Ok((column, binder.bind(expr)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut eval = Evaluator::new(strict);
        let (matched, stats) = self.read(Some(table), &source.access, &mut eval)?;

        let mut staged = table.clone();
        let mut changed = vec![];
        for (i, (id, row)) in matched.into_iter().enumerate() {
            let mut new_row = row.clone();
            for (column, expr) in &assignments {
                let value = eval.eval(expr, &new_row)?;
                let column_def = &staged.columns[*column];
                let value = cast_for_column(value, column_def, i + 1, strict, &mut eval)?;
                if value.is_null() && !column_def.nullable {
                    return Err(errors::bad_null(&column_def.name).into());
                }
                if column_def.auto_increment {
                    if let Some(id) = value.to_number().and_then(|(n, _)| n.as_i64()).and_then(|n| u64::try_from(n).ok()) {
                        staged.auto_id = staged.auto_id.max(id.saturating_add(1));
                    }
                }
                new_row[*column] = value;
            }
            if new_row != row {
                staged.rows.insert(id, new_row);
                changed.push(id);
            }
        }

        staged.check_unique(&staged.rows, &changed)?;
        *catalog.get_mut(&update.table.name)? = staged;
        drop(catalog);

        self.warn(eval.take_warnings());
        self.stmt.lock().affected_rows = changed.len() as u64;
        Ok(ExecStats { output: changed.len(), ..stats })
    }

    fn delete(&self, delete: &Delete<'_>) -> Result<ExecStats> {
        let mut catalog = self.store.catalog().write();
        let table = catalog.get(&delete.table.name)?;
        let source = self.bind_source(table, &delete.table, delete.selection, delete.limit)?;

        let mut eval = Evaluator::new(self.state.vars.strict());
        let (mut matched, stats) = self.read(Some(table), &source.access, &mut eval)?;
        if let Some(limit) = source.limit {
            matched.truncate(saturating_usize(limit));
        }

        let table = catalog.get_mut(&delete.table.name)?;
        for (id, _) in &matched {
            table.rows.remove(id);
        }
        drop(catalog);

        self.warn(eval.take_warnings());
        self.stmt.lock().affected_rows = matched.len() as u64;
        Ok(ExecStats { output: matched.len(), ..stats })
    }

    fn explain(&mut self, stmt: &ast::Statement, analyze: bool, hints: &[IndexHint]) -> Result<MemRecordSet> {
        let start = Instant::now();
        let (plan, stats) = match lower_dml(stmt, hints)? {
            Some(Dml::Select(select)) => {
                let catalog = self.store.catalog().read();
                let table = select.from.as_ref().map(|from| catalog.get(&from.name)).transpose()?;
                let query = self.bind_query(&select, table)?;
                let plan = query_plan(&query.shape(table));
                let stats = if analyze { Some(self.analyze_query(table, &query)?) } else { None };
                (plan, stats)
            }
            Some(Dml::Insert(insert)) => {
                // the table has to exist even when nothing is executed
                self.store.catalog().read().get(&insert.table)?;
                let stats = if analyze { Some(self.insert(&insert)?) } else { None };
                (dml_plan("Insert", None), stats)
            }
            Some(Dml::Update(update)) => {
                let source = self.source_plan(&update.table, update.selection, None)?;
                let stats = if analyze { Some(self.update(&update)?) } else { None };
                (dml_plan("Update", Some(source)), stats)
            }
            Some(Dml::Delete(delete)) => {
                let source = self.source_plan(&delete.table, delete.selection, delete.limit)?;
                let stats = if analyze { Some(self.delete(&delete)?) } else { None };
                (dml_plan("Delete", Some(source)), stats)
            }
            None => {
                let what = if analyze { "EXPLAIN ANALYZE" } else { "EXPLAIN" };
                return Err(errors::not_supported(format!("{what} {}", statement_kind(stmt))).into());
            }
        };

        let elapsed = start.elapsed();
        let (fields, rows) = match &stats {
            Some(stats) => (EXPLAIN_ANALYZE_FIELDS, explain_rows(&plan, Some((stats, elapsed)))),
            None => (EXPLAIN_FIELDS, explain_rows(&plan, None)),
        };
        let fields = fields.iter().map(|&name| Field::new(name)).collect();
        Ok(self.record_set(fields, rows, None))
    }

    /// Runs a query to completion, projection included, for `EXPLAIN ANALYZE`.
    fn analyze_query(&self, table: Option<&Table>, query: &BoundQuery) -> Result<ExecStats> {
        let (rows, stats) = self.query(table, query)?;
        if let Some(projection) = &query.projection {
            let mut eval = Evaluator::new(false);
            for row in &rows {
                for expr in projection {
                    eval.eval(expr, row)?;
                }
            }
            self.warn(eval.take_warnings());
        }
        Ok(stats)
    }
}

fn eval_limit(binder: &Binder<'_>, limit: Limit<'_>) -> Result<(u64, u64)> {
    let count = eval_count(binder, limit.count)?;
    let offset = match limit.offset {
        Some(offset) => eval_count(binder, offset)?,
        None => 0,
    };
    Ok((offset, count))
}

/// A row count of `LIMIT`, a non-negative integer.
fn eval_count(binder: &Binder<'_>, expr: &ast::Expr) -> Result<u64> {
    let datum = Evaluator::new(false).eval(&binder.bind(expr)?, &[])?;
    let n = match datum {
        Datum::Int(i) => u64::try_from(i).ok(),
        Datum::UInt(u) => Some(u),
        _ => None,
    };
    Ok(n.ok_or_else(|| errors::wrong_arguments("LIMIT"))?)
}

/// The name of an unaliased select item, a column reference is named after the column.
fn field_name(expr: &ast::Expr) -> String {
    match expr {
        ast::Expr::Identifier(ident) => ident.value.clone(),
        ast::Expr::Value(ast::Value::Placeholder(_)) => "?".to_owned(),
        ast::Expr::CompoundIdentifier(parts) if system_variable(parts).is_none() => {
            parts.last().map_or_else(|| expr.to_string(), |ident| ident.value.clone())
        }
        expr => expr.to_string(),
    }
}

fn compare_keys(a: &[Datum], b: &[Datum], order_by: &[(BoundExpr, bool)]) -> Ordering {
    for ((a, b), (_, desc)) in a.iter().zip(b).zip(order_by) {
        let ord = a.sort_cmp(b);
        let ord = if *desc { ord.reverse() } else { ord };
        if ord.is_ne() {
            return ord;
        }
    }
    Ordering::Equal
}

#[inline]
fn saturating_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// An auto increment column given `NULL` or `0` generates the next id.
fn is_unset_auto_id(value: &Datum) -> bool {
    match value {
        Datum::Null => true,
        value => value.to_number().map_or(false, |(n, _)| n.as_f64() == 0.0),
    }
}

/// What a `NOT NULL` column without a default gets outside of strict mode.
fn zero_value(ty: DataType) -> Datum {
    match ty {
        DataType::Int { unsigned: false } => Datum::Int(0),
        DataType::Int { unsigned: true } => Datum::UInt(0),
        DataType::Float => Datum::Float(0.0),
        DataType::Text { .. } => Datum::Text(String::new()),
    }
}
