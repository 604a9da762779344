//! Node transactions.
//!
//! Sylva resources follow a single-writer model:
//! - Any number of [`NodeReadTrx`] may read committed revisions
//! - At most one [`NodeWriteTrx`] per resource exists at a time
//! - A write transaction either commits a new revision or leaves the
//!   resource unchanged; dropping it without commit rolls it back

mod read;
mod write;

pub use read::NodeReadTrx;
pub use write::{NodeWriteTrx, TrxState};
