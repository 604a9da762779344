//! Create command implementation.

use super::{finish, CliResult, Session};
use std::io::Read;
use std::path::Path;
use sylva_server::{CreateRequest, Scope};

/// Runs the create command.
pub fn run(
    session: &Session,
    database: String,
    resource: Option<String>,
    input: Option<&Path>,
    keep_whitespace: bool,
) -> CliResult<()> {
    let payload = match input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut payload = String::new();
            std::io::stdin().read_to_string(&mut payload)?;
            payload
        }
    };

    let credentials = session.credentials(Scope::Create)?;
    let request = CreateRequest::new(database, resource, payload).keep_whitespace(keep_whitespace);
    let response = session.block_on(session.server().create(&credentials, request));
    finish(response)
}
