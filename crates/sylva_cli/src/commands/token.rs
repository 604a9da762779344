//! Token command implementation.

use super::{CliError, CliResult, Session};
use sylva_server::Scope;

/// Runs the token command.
///
/// Requires `--secret`: a token signed with a per-invocation secret would be
/// rejected by every later invocation.
pub fn run(session: &Session, scopes: &[String]) -> CliResult<()> {
    if session.has_ephemeral_secret() {
        return Err(CliError::Usage(
            "token requires --secret; later commands must pass the same secret".into(),
        ));
    }
    let scopes = parse_scopes(scopes)?;
    println!("{}", session.token(&scopes)?);
    Ok(())
}

/// Parses scope names; no names means every scope.
pub fn parse_scopes(names: &[String]) -> CliResult<Vec<Scope>> {
    if names.is_empty() {
        return Ok(Scope::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| {
            Scope::parse(name).ok_or_else(|| CliError::Usage(format!("unknown scope {name:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_default_to_all() {
        assert_eq!(parse_scopes(&[]).unwrap(), Scope::ALL.to_vec());
    }

    #[test]
    fn parses_short_and_full_names() {
        let scopes = parse_scopes(&["view".into(), "realm:delete".into()]).unwrap();
        assert_eq!(scopes, vec![Scope::View, Scope::Delete]);
        assert!(parse_scopes(&["root".into()]).is_err());
    }

    #[test]
    fn requires_explicit_secret() {
        let temp = tempfile::tempdir().unwrap();
        let session = Session::new(temp.path().to_path_buf(), None, false).unwrap();
        assert!(matches!(run(&session, &[]), Err(CliError::Usage(_))));
    }

    #[test]
    fn token_is_accepted_by_later_sessions() {
        let temp = tempfile::tempdir().unwrap();
        let secret = Some("shared".to_string());
        let issuer = Session::new(temp.path().to_path_buf(), secret.clone(), false).unwrap();
        assert!(run(&issuer, &[]).is_ok());
        let token = issuer.token(&[Scope::View]).unwrap();

        let later = Session::new(temp.path().to_path_buf(), secret, false).unwrap();
        let principal = later.server().token_validator().validate_token(&token).unwrap();
        assert!(principal.is_authorized(Scope::View));
        assert!(!principal.is_authorized(Scope::Delete));
    }
}
