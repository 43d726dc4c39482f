use crate::proxy::challenge::Scheme;
use crate::proxy::config::AuthenticatorConfig;

/// Resolves the single scheme to challenge a client with, if any.
///
/// Inside a lock scope, the first configured user agent (in table order) that is a
/// substring of `user_agent` wins, else the fallback applies. Outside every scope the
/// fallback only applies while a single scheme is supported. `None` means every
/// supported scheme is advertised.
pub fn resolve_challenge(
    request_uri: &str,
    user_agent: &str,
    config: &AuthenticatorConfig,
) -> Option<Scheme> {
    let in_scope = config
        .lock_scopes
        .iter()
        .any(|scope| scope.is_match(request_uri));

    if !in_scope {
        if config.supported_schemes.as_slice().len() > 1 {
            return None;
        }
        return config.fallback_challenge;
    }

    config
        .user_agent_locks
        .iter()
        .find(|(key, _)| user_agent.contains(key.as_str()))
        .map(|(_, scheme)| *scheme)
        .or(config.fallback_challenge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::config::AuthConfig;

    fn authenticator_config(extra: &str) -> AuthenticatorConfig {
        let config = format!(
            r#"
            enable_basic_auth = true
            {extra}

            [oidc]
            issuer = "https://idp.example.com"

            [user_agent_lock]
            "mirall" = "basic"
            "Mozilla/5.0 (Windows" = "bearer"
            "Mozilla" = "basic"
            "#
        );
        let config: AuthConfig = toml::from_str(&config).unwrap();
        AuthenticatorConfig::new(&config).unwrap()
    }

    #[test]
    fn test_locked_client_in_scope() {
        let config = authenticator_config("");

        let scheme = resolve_challenge(
            "/remote.php/webdav/file.txt",
            "Mozilla/5.0 (Linux) mirall/2.11.0",
            &config,
        );
        assert_eq!(scheme, Some(Scheme::Basic));
    }

    #[test]
    fn test_first_matching_key_wins() {
        let config = authenticator_config("");

        let scheme = resolve_challenge(
            "/ocs/v2.php/cloud/user",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
            &config,
        );
        assert_eq!(scheme, Some(Scheme::Bearer));

        let scheme = resolve_challenge(
            "/ocs/v1.php/cloud/user",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)",
            &config,
        );
        assert_eq!(scheme, Some(Scheme::Basic));
    }

    #[test]
    fn test_out_of_scope_advertises_all_schemes() {
        let config = authenticator_config("");
        let scheme = resolve_challenge("/graph/v1.0/me", "mirall/2.11.0", &config);
        assert_eq!(scheme, None);

        let config = authenticator_config(r#"fallback_challenge = "basic""#);
        let scheme = resolve_challenge("/graph/v1.0/me", "mirall/2.11.0", &config);
        assert_eq!(scheme, None);
    }

    #[test]
    fn test_out_of_scope_single_scheme_uses_fallback() {
        let config: AuthConfig = toml::from_str(
            r#"
            enable_basic_auth = true
            fallback_challenge = "basic"
            "#,
        )
        .unwrap();
        let config = AuthenticatorConfig::new(&config).unwrap();

        let scheme = resolve_challenge("/graph/v1.0/me", "curl/8.5.0", &config);
        assert_eq!(scheme, Some(Scheme::Basic));
    }

    #[test]
    fn test_unknown_agent_in_scope_uses_fallback() {
        let config = authenticator_config("");
        let scheme = resolve_challenge("/remote.php/dav/files/einstein", "curl/8.5.0", &config);
        assert_eq!(scheme, None);

        let config = authenticator_config(r#"fallback_challenge = "basic""#);
        let scheme = resolve_challenge("/remote.php/dav/files/einstein", "curl/8.5.0", &config);
        assert_eq!(scheme, Some(Scheme::Basic));
    }

    #[test]
    fn test_empty_user_agent() {
        let config = authenticator_config("");
        let scheme = resolve_challenge("/remote.php/webdav", "", &config);
        assert_eq!(scheme, None);
    }

    #[test]
    fn test_scope_is_matched_against_full_uri() {
        let config = authenticator_config(r#"lock_scopes = ["format=xml"]"#);

        let scheme = resolve_challenge("/any/path?format=xml", "mirall/2.11.0", &config);
        assert_eq!(scheme, Some(Scheme::Basic));

        let scheme = resolve_challenge("/any/path?format=json", "mirall/2.11.0", &config);
        assert_eq!(scheme, None);
    }
}
