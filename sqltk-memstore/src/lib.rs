#![deny(rust_2018_idioms)]
//! An in-memory store implementing the session contracts of `sqltk-session`.
//!
//! It has no transactions and no durable storage. Every statement is atomic: it either applies
//! all of its changes or none.

mod catalog;
mod config;
mod errors;
mod eval;
mod exec;
mod ir;
mod plan;
mod record_set;
mod session;

use std::sync::Arc;

use parking_lot::RwLock;
use sqltk_core::{Datum, SqlError};
use sqltk_session::Storage;

pub use self::config::{StoreOptions, SystemVariable, SystemVars, DEFAULT_SQL_MODE};
pub use self::record_set::MemRecordSet;
pub use self::session::MemSession;
use self::catalog::Catalog;

pub type Result<T, E = sqltk_core::Error> = std::result::Result<T, E>;

/// The single database every table lives in.
pub const DATABASE: &str = "test";

/// A shared handle to an in-memory database.
#[derive(Clone)]
pub struct MemStore {
    inner: Arc<Shared>,
}

struct Shared {
    catalog: RwLock<Catalog>,
    globals: RwLock<SystemVars>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl MemStore {
    pub fn new(options: StoreOptions) -> Self {
        let globals = SystemVars::new(&options);
        Self {
            inner: Arc::new(Shared {
                catalog: RwLock::new(Catalog::default()),
                globals: RwLock::new(globals),
            }),
        }
    }

    /// A snapshot of the global system variables.
    pub fn global_vars(&self) -> SystemVars {
        self.inner.globals.read().clone()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.inner.catalog.read().table_names().into_iter().map(String::from).collect()
    }

    pub(crate) fn set_global_var(&self, name: &str, value: &Datum) -> Result<(), SqlError> {
        self.inner.globals.write().set(name, value)
    }

    #[inline]
    pub(crate) fn catalog(&self) -> &RwLock<Catalog> {
        &self.inner.catalog
    }
}

impl Storage for MemStore {
    type Session = MemSession;

    fn create_session(&self) -> Result<MemSession> {
        Ok(MemSession::new(self.clone()))
    }
}

#[cfg(test)]
mod tests;
