//! Delete command implementation.

use super::{finish, CliResult, Session};
use sylva_server::{DeleteRequest, Scope};

/// Runs the delete command.
pub fn run(
    session: &Session,
    database: Option<&str>,
    resource: Option<&str>,
    node: Option<&str>,
) -> CliResult<()> {
    let credentials = session.credentials(Scope::Delete)?;
    let request = DeleteRequest::new(database, resource, node);
    let response = session.block_on(session.server().delete(&credentials, request));
    finish(response)?;

    match (database, resource, node) {
        (None, _, _) => println!("Dropped all databases"),
        (Some(db), None, _) => println!("Dropped database {db}"),
        (Some(db), Some(res), None) => println!("Dropped resource {db}/{res}"),
        (Some(db), Some(res), Some(node)) => println!("Removed node {node} from {db}/{res}"),
    }
    Ok(())
}
