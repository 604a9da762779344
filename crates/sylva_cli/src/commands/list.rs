//! List command implementation.

use super::{CliResult, Session};
use serde::Serialize;
use sylva_server::ServerError;

/// Listing result.
#[derive(Debug, Serialize)]
pub struct Listing {
    /// Storage root.
    pub root: String,
    /// Database whose resources are listed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Database or resource names.
    pub names: Vec<String>,
}

/// Runs the list command.
pub fn run(session: &Session, database: Option<&str>, format: &str) -> CliResult<()> {
    let listing = collect(session, database)?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&listing)
                .map_err(|e| ServerError::Internal(e.to_string()))?;
            println!("{json}");
        }
        _ => print_text_output(&listing),
    }
    Ok(())
}

fn collect(session: &Session, database: Option<&str>) -> CliResult<Listing> {
    let databases = &session.server().context().databases;
    let root = session.root();

    let names = match database {
        None => databases
            .list_databases(root)
            .map_err(ServerError::from)?,
        Some(name) => {
            sylva_core::validate_name(name).map_err(ServerError::from)?;
            databases
                .open_database(&root.join(name))
                .and_then(|db| db.list_resources())
                .map_err(ServerError::from)?
        }
    };

    Ok(Listing {
        root: root.display().to_string(),
        database: database.map(str::to_string),
        names,
    })
}

fn print_text_output(listing: &Listing) {
    match &listing.database {
        None => println!("Databases in {}:", listing.root),
        Some(db) => println!("Resources in {}/{}:", listing.root, db),
    }
    if listing.names.is_empty() {
        println!("  (none)");
    }
    for name in &listing.names {
        println!("  {name}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylva_server::{CreateRequest, Scope};

    #[test]
    fn lists_databases_and_resources() {
        let temp = tempfile::tempdir().unwrap();
        let session = Session::new(temp.path().to_path_buf(), None, false).unwrap();
        let credentials = session.credentials(Scope::Create).unwrap();
        for (db, res) in [("b", "x"), ("a", "y"), ("a", "z")] {
            let request = CreateRequest::new(db, Some(res.to_string()), "<doc/>");
            let response = session.block_on(session.server().create(&credentials, request));
            assert_eq!(response.status, 200);
        }

        let all = collect(&session, None).unwrap();
        assert_eq!(all.names, vec!["a", "b"]);
        let resources = collect(&session, Some("a")).unwrap();
        assert_eq!(resources.names, vec!["y", "z"]);
        assert!(collect(&session, Some("missing")).is_err());

        let json = serde_json::to_value(&resources).unwrap();
        assert_eq!(json["database"], "a");
    }
}
