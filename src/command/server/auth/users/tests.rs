use std::collections::HashMap;
use std::sync::Arc;

use argon2::{Argon2, PasswordVerifier};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hyper::http::request::Parts;
use hyper::Request;
use serde::Deserialize;

use crate::authentication::basic::{BasicAuthenticationHandler, Options};
use crate::authentication::{
    claim_types, AuthenticateResult, AuthenticationHandler, ConnectionInfo, CredentialsContext,
    CredentialsValidator, Validation,
};
use crate::command::server::auth::users::{build_users, UserConfig, UsersValidator};

#[derive(Deserialize)]
struct TestConfig {
    users: HashMap<String, UserConfig>,
}

static TEST_CONFIG: &str = r#"
[users.id_1]
username = "user1"
password = "$argon2id$v=19$m=19456,t=2,p=1$9pxWwg0VtZzDXno/25417Q$e+cuKy9VisJVxec/EEuKvvfIIIOy5yDGRzYKiuDLjx0"  # password is "password1"

[users.id_2]
username = "user2"
password = "$argon2id$v=19$m=19456,t=2,p=1$Uy1qF140d+2nOKIz1ZFltw$xAii0VrKbNn2d/rb5hUWUmEcwq6kjVFE5mW5ymzFudw"  # password is "password2"

[users.id_3]
username = "user3"
password = "invalid-password-hash"
"#;

fn build_test_config() -> TestConfig {
    toml::from_str(TEST_CONFIG).expect("Failed to parse test config")
}

fn context(username: &str, password: &str) -> CredentialsContext {
    CredentialsContext {
        scheme: "basic".to_string(),
        username: username.to_string(),
        password: password.to_string(),
        remote_address: None,
    }
}

fn build_test_parts(username: &str, password: &str) -> Parts {
    let credentials = BASE64_STANDARD.encode(format!("{username}:{password}"));

    let mut request = Request::builder()
        .header("Authorization", format!("Basic {credentials}"))
        .body(())
        .unwrap();
    request.extensions_mut().insert(ConnectionInfo {
        remote_address: "127.0.0.1:1234".parse().unwrap(),
        secure: true,
    });

    let (parts, ()) = request.into_parts();
    parts
}

#[test]
fn test_build_users() {
    let config = build_test_config();
    let users = build_users(&config.users);

    assert_eq!(users.len(), 2);

    let user1 = users.get("user1").unwrap();
    assert_eq!(user1.id, "id_1");
    assert!(Argon2::default()
        .verify_password("password1".as_bytes(), &user1.password.password_hash())
        .is_ok());

    let user2 = users.get("user2").unwrap();
    assert_eq!(user2.id, "id_2");
    assert!(users.get("user3").is_none());
}

#[tokio::test]
async fn test_validate_credentials_success() {
    let validator = UsersValidator::new(&build_test_config().users);

    let result = validator
        .validate_credentials(&context("user1", "password1"))
        .await
        .unwrap();

    let Validation::Success(principal) = result else {
        panic!("expected success, got {result:?}");
    };
    assert_eq!(principal.authentication_type, "basic");
    assert_eq!(principal.name(), Some("user1"));
    assert_eq!(
        principal
            .find_first(claim_types::NAME_IDENTIFIER)
            .map(|claim| claim.value.as_str()),
        Some("id_1")
    );
}

#[tokio::test]
async fn test_validate_credentials_wrong_password() {
    let validator = UsersValidator::new(&build_test_config().users);

    let result = validator
        .validate_credentials(&context("user1", "password2"))
        .await
        .unwrap();

    assert_eq!(
        result,
        Validation::Fail("Invalid username or password".to_string())
    );
}

#[tokio::test]
async fn test_validate_credentials_unknown_user() {
    let validator = UsersValidator::new(&build_test_config().users);

    for username in ["nobody", "user3"] {
        let result = validator
            .validate_credentials(&context(username, "password1"))
            .await
            .unwrap();

        assert!(matches!(result, Validation::Fail(_)));
    }
}

#[tokio::test]
async fn test_basic_handler_with_users() {
    let validator = Arc::new(UsersValidator::new(&build_test_config().users));
    let handler = BasicAuthenticationHandler::new(Options::default(), validator);

    let result = handler
        .authenticate(&build_test_parts("user2", "password2"))
        .await
        .unwrap();
    let AuthenticateResult::Success(ticket) = result else {
        panic!("expected success, got {result:?}");
    };
    assert_eq!(ticket.principal.name(), Some("user2"));

    let result = handler
        .authenticate(&build_test_parts("user2", "password1"))
        .await
        .unwrap();
    assert_eq!(
        result,
        AuthenticateResult::Fail("Invalid username or password".to_string())
    );
}
