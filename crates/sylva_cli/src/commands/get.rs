//! Get command implementation.

use super::{finish, CliResult, Session};
use sylva_server::{GetRequest, Scope};

/// Runs the get command.
pub fn run(session: &Session, database: String, resource: String, revision: Option<u64>) -> CliResult<()> {
    let credentials = session.credentials(Scope::View)?;
    let request = GetRequest {
        database,
        resource,
        revision,
    };
    let response = session.block_on(session.server().get(&credentials, request));
    finish(response)
}
