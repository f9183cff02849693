//! Transaction coordinator with transactional and best-effort modes.

use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Deref;

pub type TxResult<T> = Result<T, TxError>;

/// Whether the store is configured for multi-document transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// `begin` opens an immediate SQLite transaction.
    Transactional,
    /// Every write is individually durable; chains are not atomic.
    BestEffort,
}

impl TransactionMode {
    /// Stable label used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transactional => "transactional",
            Self::BestEffort => "best_effort",
        }
    }
}

/// Errors raised while opening or finishing a transaction.
#[derive(Debug)]
pub enum TxError {
    Begin(rusqlite::Error),
    Commit(rusqlite::Error),
    Abort(rusqlite::Error),
}

impl Display for TxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin(err) => write!(f, "failed to begin transaction: {err}"),
            Self::Commit(err) => write!(f, "failed to commit transaction: {err}"),
            Self::Abort(err) => write!(f, "failed to abort transaction: {err}"),
        }
    }
}

impl Error for TxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Begin(err) | Self::Commit(err) | Self::Abort(err) => Some(err),
        }
    }
}

/// Handle passed to every write of one logical operation.
///
/// Dereferences to the connection the writes must run on, so repository
/// code reads the same in both variants.
pub enum TransactionContext<'conn> {
    /// Writes autocommit individually.
    NoTransaction(&'conn Connection),
    /// Writes belong to one open session.
    InTransaction(Transaction<'conn>),
}

impl<'conn> TransactionContext<'conn> {
    /// Wraps a plain connection for callers that opt out of atomicity.
    pub fn none(conn: &'conn Connection) -> Self {
        Self::NoTransaction(conn)
    }

    /// Returns whether writes under this context commit or abort together.
    pub fn is_atomic(&self) -> bool {
        matches!(self, Self::InTransaction(_))
    }

    /// Mode label matching `TransactionMode::as_str`.
    pub fn mode_label(&self) -> &'static str {
        if self.is_atomic() {
            TransactionMode::Transactional.as_str()
        } else {
            TransactionMode::BestEffort.as_str()
        }
    }
}

impl Deref for TransactionContext<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Self::NoTransaction(conn) => *conn,
            Self::InTransaction(tx) => &**tx,
        }
    }
}

/// Opens and finishes transaction contexts over one connection.
#[derive(Debug, Clone, Copy)]
pub struct TransactionCoordinator<'conn> {
    conn: &'conn Connection,
    mode: TransactionMode,
}

impl<'conn> TransactionCoordinator<'conn> {
    pub fn new(conn: &'conn Connection, mode: TransactionMode) -> Self {
        Self { conn, mode }
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Starts a context for one logical operation.
    ///
    /// Transactional mode takes the database write lock up front
    /// (`BEGIN IMMEDIATE`), so the find-or-create sequence in the chain is
    /// serialized against other writers.
    ///
    /// # Errors
    /// - `TxError::Begin` when the connection already has an open
    ///   transaction or the lock cannot be acquired within the busy timeout.
    pub fn begin(&self) -> TxResult<TransactionContext<'conn>> {
        match self.mode {
            TransactionMode::Transactional => {
                let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
                    .map_err(TxError::Begin)?;
                debug!("event=tx_begin module=txn status=ok mode=transactional");
                Ok(TransactionContext::InTransaction(tx))
            }
            TransactionMode::BestEffort => {
                debug!("event=tx_begin module=txn status=ok mode=best_effort");
                Ok(TransactionContext::NoTransaction(self.conn))
            }
        }
    }

    /// Commits an active context. No-op for `NoTransaction`.
    pub fn commit(&self, ctx: TransactionContext<'_>) -> TxResult<()> {
        match ctx {
            TransactionContext::InTransaction(tx) => {
                tx.commit().map_err(TxError::Commit)?;
                debug!("event=tx_commit module=txn status=ok");
                Ok(())
            }
            TransactionContext::NoTransaction(_) => Ok(()),
        }
    }

    /// Rolls back an active context. No-op for `NoTransaction`.
    pub fn abort(&self, ctx: TransactionContext<'_>) -> TxResult<()> {
        match ctx {
            TransactionContext::InTransaction(tx) => match tx.rollback() {
                Ok(()) => {
                    debug!("event=tx_abort module=txn status=ok");
                    Ok(())
                }
                Err(err) => {
                    warn!("event=tx_abort module=txn status=error error={err}");
                    Err(TxError::Abort(err))
                }
            },
            TransactionContext::NoTransaction(_) => Ok(()),
        }
    }
}
