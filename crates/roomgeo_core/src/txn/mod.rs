//! Optional multi-document transactions.
//!
//! # Responsibility
//! - Decide whether a logical multi-write operation runs atomically.
//! - Thread one explicit context through every dependent write.
//! - Undo already-applied writes when no real transaction is available and
//!   compensation is enabled.
//!
//! # Invariants
//! - Writes never look up ambient transaction state; they take a
//!   `TransactionContext` argument.
//! - An `InTransaction` context is released by commit, abort or drop.
//!   Drop rolls back.

pub mod chain;
pub mod coordinator;

pub use chain::{Compensation, SaveFailed, SaveResult, SaveStep, WriteChain};
pub use coordinator::{
    TransactionContext, TransactionCoordinator, TransactionMode, TxError, TxResult,
};
