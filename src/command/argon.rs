use argh::FromArgs;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Params, PasswordHasher, Version};

use crate::command;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "argon",
    description = "Hash a password for a Basic authentication user entry"
)]
pub struct Options {}

pub struct Command {}

impl Command {
    pub fn run() -> Result<(), command::Error> {
        let password = rpassword::prompt_password("Input Password: ")?;
        let hash = hash_password(&password)?;

        println!("{hash}");
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String, command::Error> {
    let salt = SaltString::generate(OsRng);

    let argon = argon2::Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    let hash = argon
        .hash_password(password.as_bytes(), &salt)
        .map_err(|error| command::Error::Hashing(error.to_string()))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use argon2::{PasswordHash, PasswordVerifier};

    use super::*;

    #[test]
    fn test_hash_password_verifies() {
        let hash = hash_password("password1").unwrap();
        assert!(hash.starts_with("$argon2id$"));

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(argon2::Argon2::default()
            .verify_password(b"password1", &parsed)
            .is_ok());
        assert!(argon2::Argon2::default()
            .verify_password(b"password2", &parsed)
            .is_err());
    }
}
