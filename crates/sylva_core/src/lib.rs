//! # Sylva Core
//!
//! Versioned tree storage engine for Sylva.
//!
//! A storage root holds databases; a database holds named resources; a
//! resource is a sequence of immutable revisions of one XML document tree.
//!
//! - [`Databases`] creates, opens, lists and removes databases
//! - [`Database`] creates, opens and removes resources
//! - [`ResourceSession`] starts read and write transactions
//! - [`NodeWriteTrx`] is the single writer of a resource; it commits a new
//!   revision or rolls back when dropped
//! - [`XmlSerializer`] writes a revision back out as XML
//!
//! Node keys are assigned at insert time and stay stable across revisions,
//! so they can address subtrees in later requests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod databases;
mod dir;
mod error;
mod node;
mod resource;
mod serialize;
mod trx;
mod types;

pub use config::{DatabaseConfig, ResourceConfig, FORMAT_VERSION};
pub use database::Database;
pub use databases::Databases;
pub use dir::{DatabaseDir, DatabaseMetadata, ResourceDir};
pub use error::{validate_name, CoreError, CoreResult};
pub use node::{Node, NodeKind, NodeTree};
pub use resource::{ResourceSession, Revision};
pub use serialize::{
    check_reserved_names, is_reserved_name, SerializerOptions, XmlSerializer, REST_ID_ATTRIBUTE, REST_NAMESPACE,
};
pub use trx::{NodeReadTrx, NodeWriteTrx, TrxState};
pub use types::{NodeKey, RevisionNumber};
