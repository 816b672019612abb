use sqltk_core::{Datum, Error, ErrorCode};
use sqltk_session::{rows_to_strings, RecordSet, Session, Storage};

use crate::context::{ConnectionIds, TestContext};
use crate::error::{ExecError, Result};
use crate::prepared::PreparedGuard;
use crate::result::QueryResult;

type RecordSetOf<S> = <<S as Storage>::Session as Session>::RecordSet;

/// Drives one session of a storage. Methods prefixed with `must_` panic, failing the test, when
/// the statement does not behave as asserted.
pub struct TestKit<S: Storage> {
    storage: S,
    connection_ids: ConnectionIds,
    session: S::Session,
}

impl<S: Storage> TestKit<S> {
    #[track_caller]
    pub fn new(ctx: &TestContext<S>) -> Self {
        let storage = ctx.storage().clone();
        let connection_ids = ctx.connection_ids().clone();
        let session = open_session(&storage, &connection_ids);
        Self { storage, connection_ids, session }
    }

    /// Replace the session with a new one with a new connection id.
    #[track_caller]
    pub fn refresh_session(&mut self) {
        self.session = open_session(&self.storage, &self.connection_ids);
    }

    pub fn set_session(&mut self, session: S::Session) {
        self.session = session;
    }

    #[inline]
    pub fn session(&self) -> &S::Session {
        &self.session
    }

    #[inline]
    pub fn session_mut(&mut self) -> &mut S::Session {
        &mut self.session
    }

    /// Give the current session a new connection id.
    pub fn refresh_connection_id(&mut self) {
        let id = self.connection_ids.next_id();
        tracing::debug!(id, "refreshing connection id");
        self.session.set_connection_id(id);
    }

    pub fn exec(&mut self, sql: &str) -> Result<Option<RecordSetOf<S>>> {
        self.exec_with(sql, &[])
    }

    /// Execute `sql`, returning the record set of its first statement.
    ///
    /// Without arguments `sql` may hold several statements. They run in order and the first
    /// failure stops the batch. Record sets of statements after the first are closed. With
    /// arguments `sql` is prepared, executed with them bound to its placeholders and deallocated.
    #[tracing::instrument(skip(self, args), fields(conn = self.session.connection_id()))]
    pub fn exec_with(&mut self, sql: &str, args: &[Datum]) -> Result<Option<RecordSetOf<S>>> {
        let result =
            if args.is_empty() { self.exec_batch(sql) } else { self.exec_prepared(sql, args) };
        result.map_err(|err| ExecError::new(sql, args, err))
    }

    fn exec_batch(&mut self, sql: &str) -> Result<Option<RecordSetOf<S>>, Error> {
        let before = self.session.warnings().len();
        let stmts = self.session.parse(sql)?;
        let parser_warnings = self.session.warnings().into_iter().skip(before).collect::<Vec<_>>();

        let mut first = None;
        for (i, stmt) in stmts.into_iter().enumerate() {
            let rs = match self.session.execute_stmt(stmt) {
                Ok(rs) => rs,
                Err(err) => {
                    self.session.append_error(&err);
                    return Err(err);
                }
            };
            match rs {
                Some(rs) if i == 0 => first = Some(rs),
                Some(mut rs) => {
                    if let Err(err) = rs.close() {
                        tracing::warn!(%err, index = i, "failed to close record set");
                    }
                }
                None => {}
            }
        }

        // executing resets the warnings, so the parser's have to be added back
        if !parser_warnings.is_empty() {
            self.session.append_warnings(parser_warnings);
        }
        Ok(first)
    }

    fn exec_prepared(&mut self, sql: &str, args: &[Datum]) -> Result<Option<RecordSetOf<S>>, Error> {
        let prepared = self.session.prepare_stmt(sql)?;
        let mut guard = PreparedGuard::new(&mut self.session, prepared.id);
        let rs = guard.session().execute_prepared_stmt(prepared.id, args)?;
        guard.release()?;
        Ok(rs)
    }

    #[track_caller]
    pub fn must_exec(&mut self, sql: &str) {
        self.must_exec_with(sql, &[])
    }

    /// Execute `sql` and close its record set, if any.
    #[track_caller]
    pub fn must_exec_with(&mut self, sql: &str, args: &[Datum]) {
        match self.exec_with(sql, args) {
            Ok(Some(mut rs)) => {
                if let Err(err) = rs.close() {
                    panic!("sql: {sql}, args: {args:?}, failed to close record set: {err}");
                }
            }
            Ok(None) => {}
            Err(err) => panic!("sql: {sql}, args: {args:?}, error stack:\n{}", err.stack()),
        }
    }

    #[track_caller]
    pub fn must_query(&mut self, sql: &str) -> QueryResult {
        self.must_query_with(sql, &[])
    }

    /// Execute `sql`, which must produce rows, and collect them.
    #[track_caller]
    pub fn must_query_with(&mut self, sql: &str, args: &[Datum]) -> QueryResult {
        let comment = format!("sql: {sql}, args: {args:?}");
        let rs = self.must_record_set(sql, args, &comment);
        self.result_set_to_result(rs, comment)
    }

    #[track_caller]
    pub fn query_to_err(&mut self, sql: &str) -> Result<(), Error> {
        self.query_to_err_with(sql, &[])
    }

    /// Execute `sql`, which must succeed and produce rows, and return the error raised while
    /// reading them, if any.
    #[track_caller]
    pub fn query_to_err_with(&mut self, sql: &str, args: &[Datum]) -> Result<(), Error> {
        let comment = format!("sql: {sql}, args: {args:?}");
        let mut rs = self.must_record_set(sql, args, &comment);
        let result = rows_to_strings(&mut rs).map(drop);
        if let Err(err) = rs.close() {
            panic!("{comment}, failed to close record set: {err}");
        }
        result
    }

    #[track_caller]
    pub fn exec_to_err(&mut self, sql: &str) -> Result<()> {
        self.exec_to_err_with(sql, &[])
    }

    /// Execute `sql` for its error alone. Any record set is closed.
    #[track_caller]
    pub fn exec_to_err_with(&mut self, sql: &str, args: &[Datum]) -> Result<()> {
        if let Some(mut rs) = self.exec_with(sql, args)? {
            if let Err(err) = rs.close() {
                panic!("sql: {sql}, args: {args:?}, failed to close record set: {err}");
            }
        }
        Ok(())
    }

    /// Drain and close `rs` into a [`QueryResult`].
    #[track_caller]
    pub fn result_set_to_result(&self, rs: RecordSetOf<S>, comment: impl Into<String>) -> QueryResult {
        QueryResult::from_record_set(rs, comment)
    }

    #[track_caller]
    pub fn has_plan(&mut self, sql: &str, plan: &str) -> bool {
        self.has_plan_with(sql, plan, &[])
    }

    /// Whether the plan of `sql` has an operator whose id contains `plan`.
    #[track_caller]
    pub fn has_plan_with(&mut self, sql: &str, plan: &str, args: &[Datum]) -> bool {
        self.must_query_with(&format!("explain {sql}"), args).has_plan(plan)
    }

    #[track_caller]
    pub fn must_use_index(&mut self, sql: &str, index: &str) -> bool {
        self.must_use_index_with(sql, index, &[])
    }

    /// Whether the plan of `sql` reads `index`, going by the access object column.
    #[track_caller]
    pub fn must_use_index_with(&mut self, sql: &str, index: &str, args: &[Datum]) -> bool {
        self.must_query_with(&format!("explain {sql}"), args)
            .column_contains(3, &format!("index:{index}"))
    }

    /// Assert `sql` fails with a SQL error with the given code.
    #[track_caller]
    pub fn must_get_err_code(&mut self, sql: &str, code: impl Into<ErrorCode>) {
        let code = code.into();
        let err = match self.exec(sql) {
            Ok(_) => panic!("sql: {sql}, expected error code {code} but the statement succeeded"),
            Err(err) => err,
        };
        match err.sql_error() {
            Some(sql_err) => assert_eq!(
                sql_err.code(),
                code,
                "sql: {sql}, expected error code {code}, got: {err}"
            ),
            None => panic!(
                "sql: {sql}, expected error code {code} but the error has none, error stack:\n{}",
                err.stack()
            ),
        }
    }

    /// Assert `sql` fails and its error reads exactly `msg`.
    #[track_caller]
    pub fn must_get_err_msg(&mut self, sql: &str, msg: &str) {
        match self.exec_to_err(sql) {
            Ok(()) => panic!("sql: {sql}, expected error `{msg}` but the statement succeeded"),
            Err(err) => assert_eq!(err.to_string(), msg, "sql: {sql}"),
        }
    }

    /// Assert the affected rows and last insert id of the previous statement.
    #[track_caller]
    pub fn check_exec_result(&self, affected_rows: u64, insert_id: u64) {
        assert_eq!(self.session.affected_rows(), affected_rows, "affected rows");
        assert_eq!(self.session.last_insert_id(), insert_id, "last insert id");
    }

    /// Run `f` with the system variable `name` set to `value` for the session and globally. Both
    /// are put back afterwards.
    #[track_caller]
    pub fn with_variable<R>(
        &mut self,
        name: &str,
        value: impl Into<Datum>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let previous = self.must_query(&format!("select @@session.{name}, @@global.{name}"));
        let [session, global] = match previous.rows() {
            [row] if row.len() == 2 => [row[0].clone(), row[1].clone()],
            rows => panic!("unexpected values of variable `{name}`: {rows:?}"),
        };

        let set = format!("set @@session.{name} = ?, @@global.{name} = ?");
        let value = value.into();
        self.must_exec_with(&set, &[value.clone(), value]);
        let output = f(self);
        self.must_exec_with(&set, &[Datum::from(session), Datum::from(global)]);
        output
    }

    #[track_caller]
    fn must_record_set(&mut self, sql: &str, args: &[Datum], comment: &str) -> RecordSetOf<S> {
        match self.exec_with(sql, args) {
            Ok(Some(rs)) => rs,
            Ok(None) => panic!("{comment}, the statement produced no rows"),
            Err(err) => panic!("{comment}, error stack:\n{}", err.stack()),
        }
    }
}

#[track_caller]
fn open_session<S: Storage>(storage: &S, connection_ids: &ConnectionIds) -> S::Session {
    let mut session = match storage.create_session() {
        Ok(session) => session,
        Err(err) => panic!("failed to create session: {err}"),
    };
    session.set_connection_id(connection_ids.next_id());
    session
}
