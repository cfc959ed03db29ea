use anyhow::{Result, bail};
use log::debug;

use crate::session::{DEFAULT_CONFIG_URL, SessionBootstrap};

/// Credentials and endpoints for one run of the CLI.
pub struct Config {
    pub email: String,
    pub password: String,
    pub config_url: String,
}

impl Config {
    pub fn new(email: String, password: String, config_url: Option<String>) -> Result<Self> {
        let email = email.trim().to_string();
        if email.is_empty() {
            bail!("An email address is required (--email or ROLLCALL_EMAIL)");
        }
        if password.is_empty() {
            bail!("A password is required (--password or ROLLCALL_PASSWORD)");
        }

        let config_url = config_url.unwrap_or_else(|| DEFAULT_CONFIG_URL.to_string());
        debug!("Using runtime configuration at {}", config_url);

        Ok(Self {
            email,
            password,
            config_url,
        })
    }

    pub fn bootstrap(&self) -> Result<SessionBootstrap> {
        SessionBootstrap::new(self.config_url.as_str())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("email", &self.email)
            .field("password", &"********")
            .field("config_url", &self.config_url)
            .finish()
    }
}
