#[cfg(test)]
mod tests;

use std::collections::HashMap;

use argon2::password_hash::PasswordHashString;
use argon2::{Argon2, PasswordVerifier};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::authentication::principal::DEFAULT_ISSUER;
use crate::authentication::{
    claim_types, Claim, CredentialsContext, CredentialsValidator, Fault, Principal, Validation,
};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserConfig {
    pub username: String,
    /// argon2 PHC string, as printed by the `argon` subcommand.
    pub password: String,
}

struct User {
    id: String,
    password: PasswordHashString,
}

/// Checks Basic credentials against statically configured users.
pub struct UsersValidator {
    users: HashMap<String, User>,
}

fn build_users(users: &HashMap<String, UserConfig>) -> HashMap<String, User> {
    let mut credentials = HashMap::new();
    for (id, config) in users {
        let password = match PasswordHashString::new(&config.password) {
            Ok(hash) => hash,
            Err(err) => {
                warn!("Invalid password hash for user {}: {err}", config.username);
                continue;
            }
        };

        credentials.insert(
            config.username.clone(),
            User {
                id: id.clone(),
                password,
            },
        );
    }

    credentials
}

impl UsersValidator {
    pub fn new(users: &HashMap<String, UserConfig>) -> Self {
        Self {
            users: build_users(users),
        }
    }

    fn verify(&self, username: &str, password: &str) -> Option<&User> {
        let Some(user) = self.users.get(username) else {
            debug!("Username not found in credentials");
            return None;
        };

        match Argon2::default().verify_password(password.as_bytes(), &user.password.password_hash())
        {
            Ok(()) => Some(user),
            Err(error) => {
                debug!("Password verification failed: {error}");
                None
            }
        }
    }
}

#[async_trait]
impl CredentialsValidator for UsersValidator {
    #[instrument(skip(self, context), fields(username = %context.username))]
    async fn validate_credentials(
        &self,
        context: &CredentialsContext,
    ) -> Result<Validation, Fault> {
        let Some(user) = self.verify(&context.username, &context.password) else {
            return Ok(Validation::Fail(INVALID_CREDENTIALS.to_string()));
        };

        let principal = Principal::new(&context.scheme)
            .with_claim(Claim::new(
                claim_types::NAME_IDENTIFIER,
                user.id.clone(),
                DEFAULT_ISSUER,
            ))
            .with_claim(Claim::new(
                claim_types::NAME,
                context.username.clone(),
                DEFAULT_ISSUER,
            ));

        Ok(Validation::Success(principal))
    }
}
