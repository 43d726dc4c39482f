mod error;

use argh::FromArgs;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version};

pub use error::Error;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "argon",
    description = "Hash a password or client secret following the argon2id algorithm"
)]
pub struct Options {}

pub struct Command {}

impl Command {
    pub fn run() -> Result<(), Error> {
        let password = rpassword::prompt_password("Input Password: ")?;
        if password.is_empty() {
            return Err(Error::Input("Password must not be empty".to_string()));
        }

        let hash = generate_password(&password)?;
        println!("{hash}");
        Ok(())
    }
}

fn generate_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(OsRng);

    let config = Params::default();
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, config);
    let hash = argon.hash_password(password.as_bytes(), &salt)?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use argon2::{Argon2, PasswordVerifier};

    use crate::command::argon::generate_password;
    use crate::proxy::auth::basic_auth;
    use crate::proxy::auth::BasicAuthValidator;
    use crate::proxy::AuthMethod;

    #[test]
    fn test_generate_password() {
        let password = "my_secure_password";
        let hash = generate_password(password).expect("Failed to generate password hash");

        let parsed_hash = argon2::PasswordHash::new(&hash).expect("Failed to parse hash");
        let password_verify = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
        assert!(password_verify.is_ok());
    }

    #[test]
    fn test_generated_hash_is_accepted_by_basic_auth() {
        let hash = generate_password("s3cret").unwrap();

        let mut identities = std::collections::HashMap::new();
        identities.insert(
            "alice".to_string(),
            basic_auth::Config {
                username: "alice".to_string(),
                password: hash,
            },
        );
        let validator = BasicAuthValidator::new(&identities, AuthMethod::Basic);

        assert_eq!(
            validator.validate_credentials("alice", "s3cret"),
            Some("alice".to_string())
        );
        assert_eq!(validator.validate_credentials("alice", "wrong"), None);
    }
}
