use crate::ConfigError;
use std::fmt;

/// Environment variable holding the forum username
pub const USERNAME_ENV: &str = "FORUM_USERNAME";

/// Environment variable holding the forum password
pub const PASSWORD_ENV: &str = "FORUM_PASSWORD";

/// Login credentials for the target forum
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads credentials from `FORUM_USERNAME` / `FORUM_PASSWORD`
    ///
    /// Call `dotenvy::dotenv()` first to pick up a local `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let username = read_var(USERNAME_ENV)?;
        let password = read_var(PASSWORD_ENV)?;
        Ok(Self { username, password })
    }

    /// Returns true if either field is blank
    pub fn is_incomplete(&self) -> bool {
        self.username.trim().is_empty() || self.password.is_empty()
    }
}

fn read_var(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingCredentials(format!(
            "{} is not set",
            name
        ))),
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
