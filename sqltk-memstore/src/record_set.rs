use std::fmt;
use std::sync::atomic::{self, AtomicUsize};
use std::sync::Arc;

use parking_lot::Mutex;
use sqltk_core::{Error, Result};
use sqltk_session::{FallibleIterator, Field, RecordSet, Row};

use crate::eval::{BoundExpr, Evaluator};
use crate::session::StmtCtx;

/// Counts the cursor as open for as long as it is alive.
#[derive(Debug)]
pub(crate) struct CursorGuard {
    open: Arc<AtomicUsize>,
}

impl CursorGuard {
    pub fn new(open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, atomic::Ordering::AcqRel);
        Self { open: Arc::clone(open) }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, atomic::Ordering::AcqRel);
    }
}

/// Rows of a statement. When there is a projection it is evaluated as rows are pulled, so
/// evaluation errors surface while iterating rather than when the statement is executed.
pub struct MemRecordSet {
    fields: Vec<Field>,
    rows: std::vec::IntoIter<Row>,
    projection: Option<Vec<BoundExpr>>,
    eval: Evaluator,
    stmt: Arc<Mutex<StmtCtx>>,
    cursor: Option<CursorGuard>,
}

impl MemRecordSet {
    pub(crate) fn new(
        fields: Vec<Field>,
        rows: Vec<Row>,
        projection: Option<Vec<BoundExpr>>,
        stmt: Arc<Mutex<StmtCtx>>,
        cursor: CursorGuard,
    ) -> Self {
        Self {
            fields,
            rows: rows.into_iter(),
            projection,
            eval: Evaluator::new(false),
            stmt,
            cursor: Some(cursor),
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }

    fn flush_warnings(&mut self) {
        let warnings = self.eval.take_warnings();
        if !warnings.is_empty() {
            self.stmt.lock().warnings.extend(warnings);
        }
    }
}

impl fmt::Debug for MemRecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemRecordSet")
            .field("fields", &self.fields)
            .field("remaining", &self.rows.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl FallibleIterator for MemRecordSet {
    type Item = Row;
    type Error = Error;

    fn next(&mut self) -> Result<Option<Row>> {
        if self.is_closed() {
            return Ok(None);
        }
        let Some(row) = self.rows.next() else { return Ok(None) };

        let Some(projection) = &self.projection else { return Ok(Some(row)) };
        let projected =
            projection.iter().map(|expr| self.eval.eval(expr, &row)).collect::<Result<Row>>();
        self.flush_warnings();
        projected.map(Some)
    }
}

impl RecordSet for MemRecordSet {
    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn close(&mut self) -> Result<()> {
        if self.cursor.take().is_some() {
            tracing::trace!(remaining = self.rows.len(), "closing record set");
        }
        Ok(())
    }
}
