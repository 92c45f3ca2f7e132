//! Processing stages of the bundled job.

use batchwise_engine::config::ComponentConfig;
use batchwise_engine::item::ItemProcessor;
use batchwise_types::error::BatchError;
use serde::Deserialize;

use crate::schema::{Account, Profile, User};

pub const USER_PROFILE: &str = "user_profile";
pub const PROFILE_ACCOUNT: &str = "profile_account";

const DEFAULT_PREFIX: &str = "PROFILE_";

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserProfileConfig {
    #[serde(default = "default_prefix")]
    prefix: String,
}

/// Maps a [`User`] to a [`Profile`], prefixing every field.
#[derive(Debug, Clone)]
pub struct UserProfileProcessor {
    prefix: String,
}

impl Default for UserProfileProcessor {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

impl UserProfileProcessor {
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// # Errors
    ///
    /// Returns a `configuration` error for settings other than `prefix`.
    pub fn from_config(component: &ComponentConfig) -> Result<Self, BatchError> {
        if component.config.is_null() {
            return Ok(Self::default());
        }
        let config: UserProfileConfig = serde_json::from_value(component.config.clone())
            .map_err(|e| {
                BatchError::configuration(
                    "INVALID_COMPONENT_CONFIG",
                    format!("processor '{USER_PROFILE}': {e}"),
                )
            })?;
        Ok(Self::with_prefix(config.prefix))
    }

    fn prefixed(&self, value: &str) -> Option<String> {
        Some(format!("{}{value}", self.prefix))
    }
}

impl ItemProcessor<User, Profile> for UserProfileProcessor {
    fn process(&self, user: &User) -> Result<Profile, BatchError> {
        Ok(Profile {
            id: self.prefixed(&user.first_value),
            email: self.prefixed(&user.second_value),
            brand: self.prefixed(&user.third_value),
        })
    }
}

/// Maps a [`Profile`] to an [`Account`]. An account is complete when the
/// profile has an id, an email and a brand.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileAccountProcessor;

impl ItemProcessor<Profile, Account> for ProfileAccountProcessor {
    fn process(&self, profile: &Profile) -> Result<Account, BatchError> {
        let completed =
            profile.id.is_some() && profile.email.is_some() && profile.brand.is_some();
        Ok(Account {
            id: profile.id.clone(),
            user_name: None,
            user_email: profile.email.clone(),
            completed,
            user_brand: profile.brand.clone(),
        })
    }
}
