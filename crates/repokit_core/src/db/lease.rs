//! Per-call connection resolution.
//!
//! # Responsibility
//! - Reuse the connection bound to a caller transaction when one is supplied.
//! - Otherwise obtain a connection from the factory and own it for one call.
//!
//! # Invariants
//! - Ownership is decided once, at acquisition.
//! - Owned connections go back to the factory on every exit path; borrowed
//!   connections are left untouched.

use super::factory::{AsyncConnection, ConnectionFactory};
use super::transaction::AsyncTransaction;
use super::DbResult;
use log::debug;
use rusqlite::{Connection, Transaction};
use std::ops::Deref;

enum Slot<'a> {
    Owned(Option<Connection>),
    Borrowed(&'a Connection),
}

/// Blocking connection scoped to one repository call.
///
/// Dereferences to the underlying [`Connection`]. Dropping the lease releases
/// the connection through the factory when, and only when, it was created by
/// [`ConnectionLease::acquire`].
pub struct ConnectionLease<'a, F: ConnectionFactory + ?Sized> {
    factory: &'a F,
    slot: Slot<'a>,
}

impl<'a, F: ConnectionFactory + ?Sized> ConnectionLease<'a, F> {
    pub fn acquire(factory: &'a F, transaction: Option<&'a Transaction<'_>>) -> DbResult<Self> {
        let slot = match transaction {
            Some(transaction) => Slot::Borrowed(transaction),
            None => Slot::Owned(Some(factory.create_connection()?)),
        };
        Ok(Self { factory, slot })
    }

    pub fn owns_connection(&self) -> bool {
        matches!(self.slot, Slot::Owned(_))
    }
}

impl<F: ConnectionFactory + ?Sized> Deref for ConnectionLease<'_, F> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.slot {
            Slot::Owned(Some(conn)) => conn,
            Slot::Borrowed(conn) => conn,
            Slot::Owned(None) => unreachable!("owned connection is only taken in drop"),
        }
    }
}

impl<F: ConnectionFactory + ?Sized> Drop for ConnectionLease<'_, F> {
    fn drop(&mut self) {
        if let Slot::Owned(conn) = &mut self.slot {
            if let Some(conn) = conn.take() {
                self.factory.release_connection(conn);
                debug!("event=connection_release module=db mode=sync owned=true");
            }
        }
    }
}

/// Async counterpart of [`ConnectionLease`].
///
/// `Drop` cannot await, so owned connections are handed back through
/// [`AsyncConnectionLease::release`]. A lease dropped before that (for
/// example when the surrounding future is dropped) drops its handle, which
/// shuts the background connection down once no other handle is left.
pub struct AsyncConnectionLease<'a, F: ConnectionFactory + ?Sized> {
    factory: &'a F,
    conn: AsyncConnection,
    owned: bool,
    released: bool,
}

impl<'a, F: ConnectionFactory + ?Sized> AsyncConnectionLease<'a, F> {
    pub async fn acquire(
        factory: &'a F,
        transaction: Option<&AsyncTransaction>,
    ) -> DbResult<AsyncConnectionLease<'a, F>> {
        let (conn, owned) = match transaction {
            Some(transaction) => (transaction.connection().clone(), false),
            None => (factory.create_async_connection().await?, true),
        };
        Ok(Self {
            factory,
            conn,
            owned,
            released: false,
        })
    }

    /// Cloned handle to the leased connection.
    pub fn connection(&self) -> AsyncConnection {
        self.conn.clone()
    }

    pub fn owns_connection(&self) -> bool {
        self.owned
    }

    /// Hands an owned connection back to the factory; no-op when borrowed.
    pub async fn release(mut self) {
        if !self.owned {
            return;
        }
        self.released = true;
        let factory = self.factory;
        let conn = self.conn.clone();
        drop(self);
        factory.release_async_connection(conn).await;
        debug!("event=connection_release module=db mode=async owned=true");
    }
}

impl<F: ConnectionFactory + ?Sized> Drop for AsyncConnectionLease<'_, F> {
    fn drop(&mut self) {
        if self.owned && !self.released {
            debug!("event=connection_release module=db mode=async owned=true path=drop");
        }
    }
}
