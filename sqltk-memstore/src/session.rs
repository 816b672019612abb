use std::sync::atomic::{self, AtomicUsize};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use sqltk_core::{Datum, Error, SqlWarning};
use sqltk_parse::Statement;
use sqltk_session::{PreparedStmt, Session, StmtId};

use crate::config::SystemVars;
use crate::exec::{is_show_warnings, Executor};
use crate::record_set::MemRecordSet;
use crate::{errors, MemStore, Result};

/// Session state that outlives a single statement.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub connection_id: u64,
    pub vars: SystemVars,
    /// What `LAST_INSERT_ID()` returns, the first id generated by the most recent insert that
    /// generated one
    pub last_insert_id: u64,
}

/// Per statement results. Record sets hold on to the context of the statement that produced
/// them so warnings raised while streaming land in the right place.
#[derive(Debug, Default)]
pub(crate) struct StmtCtx {
    pub warnings: Vec<SqlWarning>,
    pub affected_rows: u64,
    pub last_insert_id: u64,
}

#[derive(Debug)]
struct Prepared {
    stmt: Statement,
    param_count: usize,
}

pub struct MemSession {
    store: MemStore,
    state: SessionState,
    stmt: Arc<Mutex<StmtCtx>>,
    prepared: FxHashMap<StmtId, Prepared>,
    next_stmt_id: u32,
    cursors: Arc<AtomicUsize>,
}

impl MemSession {
    pub(crate) fn new(store: MemStore) -> Self {
        let vars = store.global_vars();
        Self {
            store,
            state: SessionState { connection_id: 0, vars, last_insert_id: 0 },
            stmt: Default::default(),
            prepared: Default::default(),
            next_stmt_id: 0,
            cursors: Default::default(),
        }
    }

    /// Record sets produced by this session that are neither closed nor dropped.
    pub fn open_record_sets(&self) -> usize {
        self.cursors.load(atomic::Ordering::Acquire)
    }

    pub fn prepared_stmt_count(&self) -> usize {
        self.prepared.len()
    }

    #[inline]
    pub fn vars(&self) -> &SystemVars {
        &self.state.vars
    }

    /// Start a new statement context. `SHOW WARNINGS` keeps the previous one so it can report it.
    fn begin_stmt(&mut self, stmt: &Statement) {
        if !is_show_warnings(stmt) {
            self.stmt = Default::default();
        }
    }

    #[tracing::instrument(skip_all, fields(conn = self.state.connection_id, kind = stmt.kind()))]
    fn run(&mut self, stmt: Statement, params: &[Datum]) -> Result<Option<MemRecordSet>> {
        self.begin_stmt(&stmt);
        tracing::debug!(?stmt, "executing statement");
        let result = Executor {
            store: &self.store,
            state: &mut self.state,
            stmt: &self.stmt,
            params,
            cursors: &self.cursors,
        }
        .execute(stmt);
        if let Err(err) = &result {
            tracing::debug!(%err, "statement failed");
        }
        result
    }
}

impl Session for MemSession {
    type Stmt = Statement;
    type RecordSet = MemRecordSet;

    fn parse(&mut self, sql: &str) -> Result<Vec<Statement>> {
        let parsed = sqltk_parse::parse_statements(sql)?;
        self.stmt.lock().warnings.extend(parsed.warnings);
        Ok(parsed.stmts)
    }

    fn execute_stmt(&mut self, stmt: Statement) -> Result<Option<MemRecordSet>> {
        self.run(stmt, &[])
    }

    fn prepare_stmt(&mut self, sql: &str) -> Result<PreparedStmt> {
        self.stmt = Default::default();
        let parsed = sqltk_parse::parse_prepared(sql)?;
        self.stmt.lock().warnings.extend(parsed.warnings);

        self.next_stmt_id += 1;
        let id = StmtId::new(self.next_stmt_id);
        self.prepared.insert(id, Prepared { stmt: parsed.stmt, param_count: parsed.param_count });
        tracing::debug!(%id, param_count = parsed.param_count, "prepared statement");
        Ok(PreparedStmt { id, param_count: parsed.param_count })
    }

    fn execute_prepared_stmt(&mut self, id: StmtId, params: &[Datum]) -> Result<Option<MemRecordSet>> {
        let prepared =
            self.prepared.get(&id).ok_or_else(|| errors::unknown_stmt_handler(id, "EXECUTE"))?;
        if prepared.param_count != params.len() {
            return Err(errors::wrong_arguments("EXECUTE").into());
        }
        let stmt = prepared.stmt.clone();
        self.run(stmt, params)
    }

    fn drop_prepared_stmt(&mut self, id: StmtId) -> Result<()> {
        match self.prepared.remove(&id) {
            Some(_) => Ok(()),
            None => Err(errors::unknown_stmt_handler(id, "DEALLOCATE PREPARE").into()),
        }
    }

    #[inline]
    fn connection_id(&self) -> u64 {
        self.state.connection_id
    }

    #[inline]
    fn set_connection_id(&mut self, id: u64) {
        self.state.connection_id = id;
    }

    fn affected_rows(&self) -> u64 {
        self.stmt.lock().affected_rows
    }

    fn last_insert_id(&self) -> u64 {
        self.stmt.lock().last_insert_id
    }

    fn warnings(&self) -> Vec<SqlWarning> {
        self.stmt.lock().warnings.clone()
    }

    fn append_warnings(&mut self, warnings: Vec<SqlWarning>) {
        self.stmt.lock().warnings.extend(warnings);
    }

    fn append_error(&mut self, err: &Error) {
        self.stmt.lock().warnings.push(SqlWarning::error(err.to_sql_error()));
    }
}
