use sqltk_core::Result;
use sqltk_session::{Session, StmtId};

/// Deallocates a prepared statement when dropped, so a failed execution does not leak it.
pub(crate) struct PreparedGuard<'a, S: Session> {
    session: &'a mut S,
    id: StmtId,
    released: bool,
}

impl<'a, S: Session> PreparedGuard<'a, S> {
    pub fn new(session: &'a mut S, id: StmtId) -> Self {
        Self { session, id, released: false }
    }

    #[inline]
    pub fn session(&mut self) -> &mut S {
        self.session
    }

    /// Deallocate now, reporting the failure instead of logging it.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.session.drop_prepared_stmt(self.id)
    }
}

impl<S: Session> Drop for PreparedGuard<'_, S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.session.drop_prepared_stmt(self.id) {
            tracing::warn!(id = %self.id, %err, "failed to drop prepared statement");
        }
    }
}
