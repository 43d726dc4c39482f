use std::sync::Arc;

use chrono::{Duration, Utc};
use hyper::header::AUTHORIZATION;
use hyper::http::request::Parts;
use hyper::Request;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::cache;

const SIGNING_KEY: &str = include_str!("../../../../testdata/oidc_signing_key.pem");
const SIGNING_KEY_MODULUS: &str = "p68av5gx5U1X_OgpNmoCc3Lac9Ea_N4SY3YH51OTSH70keR0WBvpgzJ-gaImyO6HYqaAVC_MhZCVAdDmwlHf7EJrBfpqdJPRkUNB4i9XLyWIq7dzHAk8KXH_DDZWJCRS251HC2mQdi-kqimN8FxNMQzwblCcFTjRMyOwB87C1r_pR0u-y9ytoCaan8jwRjowCB3JJ398faLxkiD_J05gEKlSKGDApKvgwD1_-VvA6B4oEXOJpRevPSDzjo1jo_-GEiQXewOvDd6WvXaSfWIkfy5eOjIV4XP1eSh9xgOjolejde4MAqr-pwlrK-cc_edJMq7UZzscH5MfC2ivMSvWkQ";

fn jwks_response() -> Value {
    json!({
        "keys": [{
            "kty": "RSA",
            "use": "sig",
            "kid": "test-key-1",
            "alg": "RS256",
            "n": SIGNING_KEY_MODULUS,
            "e": "AQAB"
        }]
    })
}

fn mint_token(issuer: &str, subject: &str, expires_in: Duration) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("test-key-1".to_string());

    let now = Utc::now();
    let claims = json!({
        "iss": issuer,
        "sub": subject,
        "preferred_username": "einstein",
        "iat": now.timestamp(),
        "exp": (now + expires_in).timestamp(),
    });

    let key = EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap();
    encode(&header, &claims, &key).unwrap()
}

fn build_config(mock_server: &MockServer) -> Config {
    Config {
        issuer: mock_server.uri(),
        jwks_uri: Some(format!("{}/.well-known/jwks", mock_server.uri())),
        userinfo_endpoint: None,
        access_token_verify_method: VerifyMethod::Jwt,
        required_audience: None,
        clock_skew_tolerance: 60,
        jwks_refresh_interval: 3600,
        token_cache_ttl: 10,
    }
}

fn build_validator(config: &Config) -> OidcValidator {
    let cache = cache::Config::default().to_backend().unwrap();
    OidcValidator::new(config, cache).unwrap()
}

fn bearer_parts(token: &str) -> Parts {
    let (parts, ()) = Request::builder()
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(())
        .unwrap()
        .into_parts();
    parts
}

async fn mount_jwks(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_response()))
        .mount(mock_server)
        .await;
}

#[test]
fn test_config_defaults() {
    let config: Config = toml::from_str(r#"issuer = "https://idp.example.com""#).unwrap();

    assert_eq!(config.access_token_verify_method, VerifyMethod::Jwt);
    assert_eq!(config.clock_skew_tolerance, 60);
    assert_eq!(config.jwks_refresh_interval, 3600);
    assert_eq!(config.token_cache_ttl, 10);
    assert!(config.jwks_uri.is_none());
}

#[test]
fn test_config_verify_method_none() {
    let config: Config = toml::from_str(
        r#"
        issuer = "https://idp.example.com"
        access_token_verify_method = "none"
        "#,
    )
    .unwrap();

    assert_eq!(config.access_token_verify_method, VerifyMethod::None);
}

#[tokio::test]
async fn test_authenticate_with_valid_token() {
    let mock_server = MockServer::start().await;
    mount_jwks(&mock_server).await;

    let validator = build_validator(&build_config(&mock_server));
    let token = mint_token(&mock_server.uri(), "user-123", Duration::hours(1));

    let result = validator.authenticate(&bearer_parts(&token)).await.unwrap();
    let AuthResult::Authenticated(identity) = result else {
        panic!("Expected authenticated identity");
    };

    assert_eq!(identity.id, "user-123");
    assert_eq!(identity.username.as_deref(), Some("einstein"));
    assert_eq!(identity.method, AuthMethod::Bearer);
    assert_eq!(identity.claims["sub"], "user-123");
}

#[tokio::test]
async fn test_authenticate_with_discovery() {
    let mock_server = MockServer::start().await;
    mount_jwks(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": mock_server.uri(),
            "jwks_uri": format!("{}/.well-known/jwks", mock_server.uri()),
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = build_config(&mock_server);
    config.jwks_uri = None;
    let validator = build_validator(&config);

    let token = mint_token(&mock_server.uri(), "user-123", Duration::hours(1));
    let result = validator.authenticate(&bearer_parts(&token)).await.unwrap();

    assert!(matches!(result, AuthResult::Authenticated(_)));
}

#[tokio::test]
async fn test_authenticate_without_bearer_token() {
    let mock_server = MockServer::start().await;
    let validator = build_validator(&build_config(&mock_server));

    let (parts, ()) = Request::builder()
        .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(())
        .unwrap()
        .into_parts();

    let result = validator.authenticate(&parts).await.unwrap();
    assert!(matches!(result, AuthResult::NoCredentials));
}

#[tokio::test]
async fn test_authenticate_with_malformed_token() {
    let mock_server = MockServer::start().await;
    let validator = build_validator(&build_config(&mock_server));

    let result = validator
        .authenticate(&bearer_parts("invalid-token"))
        .await
        .unwrap();
    assert!(matches!(result, AuthResult::NoCredentials));
}

#[tokio::test]
async fn test_authenticate_with_foreign_issuer() {
    let mock_server = MockServer::start().await;
    mount_jwks(&mock_server).await;

    let validator = build_validator(&build_config(&mock_server));
    let token = mint_token("https://evil.example.com", "user-123", Duration::hours(1));

    let result = validator.authenticate(&bearer_parts(&token)).await.unwrap();
    assert!(matches!(result, AuthResult::NoCredentials));
}

#[tokio::test]
async fn test_authenticate_with_expired_token() {
    let mock_server = MockServer::start().await;
    mount_jwks(&mock_server).await;

    let validator = build_validator(&build_config(&mock_server));
    let token = mint_token(&mock_server.uri(), "user-123", Duration::hours(-2));

    let result = validator.authenticate(&bearer_parts(&token)).await.unwrap();
    assert!(matches!(result, AuthResult::NoCredentials));
}

#[tokio::test]
async fn test_authenticate_with_unreachable_jwks() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let validator = build_validator(&build_config(&mock_server));
    let token = mint_token(&mock_server.uri(), "user-123", Duration::hours(1));

    let result = validator.authenticate(&bearer_parts(&token)).await;
    assert!(matches!(result, Err(Error::Internal(_))));
}

#[tokio::test]
async fn test_userinfo_verification_is_cached() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer opaque-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "marie",
            "preferred_username": "marie",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = build_config(&mock_server);
    config.access_token_verify_method = VerifyMethod::None;
    config.userinfo_endpoint = Some(format!("{}/userinfo", mock_server.uri()));
    let validator = build_validator(&config);

    for _ in 0..2 {
        let result = validator
            .authenticate(&bearer_parts("opaque-token"))
            .await
            .unwrap();
        let AuthResult::Authenticated(identity) = result else {
            panic!("Expected authenticated identity");
        };
        assert_eq!(identity.id, "marie");
    }
}

#[tokio::test]
async fn test_userinfo_rejection() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let mut config = build_config(&mock_server);
    config.access_token_verify_method = VerifyMethod::None;
    config.userinfo_endpoint = Some(format!("{}/userinfo", mock_server.uri()));
    let validator = build_validator(&config);

    let result = validator
        .authenticate(&bearer_parts("revoked-token"))
        .await
        .unwrap();
    assert!(matches!(result, AuthResult::NoCredentials));
}

#[tokio::test]
async fn test_shared_cache_backend() {
    let mock_server = MockServer::start().await;
    mount_jwks(&mock_server).await;

    let cache = cache::Config::default().to_backend().unwrap();
    let config = build_config(&mock_server);
    let first = OidcValidator::new(&config, Arc::clone(&cache)).unwrap();
    let second = OidcValidator::new(&config, cache).unwrap();

    let token = mint_token(&mock_server.uri(), "user-123", Duration::hours(1));
    assert!(first.validate_token(&token).await.is_ok());
    assert!(second.validate_token(&token).await.is_ok());
}
