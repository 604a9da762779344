//! # Sylva Server
//!
//! Authorization-gated resource lifecycle handler for Sylva.
//!
//! This crate provides:
//! - Create-or-replace of resources from XML payloads, creating the
//!   database on first use
//! - Deletion of all databases, one database, one resource or a subtree
//! - Reads of the latest or a past revision
//! - HMAC-SHA256 bearer tokens with `create`, `delete` and `view` scopes
//!
//! # Architecture
//!
//! Every request is authorized before anything else happens. Blocking
//! storage work (parsing, filesystem I/O, commits, serialization) is handed
//! to tokio's blocking pool through a bounded [`Dispatcher`], one step at a
//! time in a fixed order:
//!
//! ```text
//! Authorize -> Parse -> Ensure database -> Replace resource -> Ingest -> Serialize
//! ```
//!
//! Structural steps hold a per-name lock so that concurrent requests for the
//! same database or resource are serialized. Engine errors are mapped onto
//! [`ServerError`] variants with HTTP-style status codes.
//!
//! Transport is left to the embedding application: [`ResourceServer`]
//! returns [`Response`] values or delivers them into a [`ResponseSink`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod delete;
mod dispatch;
mod emit;
mod error;
mod handler;
mod ingest;
mod lifecycle;
mod locks;
mod server;

pub use auth::{AuthConfig, AuthorizationGate, Credentials, IdentityProvider, Principal, Scope, TokenValidator};
pub use config::ServerConfig;
pub use delete::{bulk_drop, drop_database, drop_resource, remove_subtree, DeleteOutcome, DeleteTarget};
pub use dispatch::Dispatcher;
pub use emit::{deliver, serialize_resource, serialize_snapshot, ResponseSink};
pub use error::{ServerError, ServerResult};
pub use handler::{
    CreateRequest, DeleteRequest, GetRequest, HandlerContext, RequestHandler, Response, TEXT_CONTENT_TYPE,
    XML_CONTENT_TYPE,
};
pub use ingest::{ingest, parse_payload, replace_and_ingest};
pub use lifecycle::{ensure_database, ensure_resource_replaced};
pub use locks::{resource_key, NameLocks};
pub use server::ResourceServer;
