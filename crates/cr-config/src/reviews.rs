//! Review workflow limits.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const fn default_limit() -> u32 {
    2
}

const fn default_page_size() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReviewsConfig {
    /// Open or assigned reviews a student may have requested at once.
    #[serde(default = "default_limit")]
    pub max_open_requests: u32,

    /// Assigned reviews a reviewer may hold at once.
    #[serde(default = "default_limit")]
    pub max_claimed: u32,

    /// Page size for the completed review list.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ReviewsConfig {
    fn default() -> Self {
        Self {
            max_open_requests: default_limit(),
            max_claimed: default_limit(),
            page_size: default_page_size(),
        }
    }
}

impl ReviewsConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for any zero limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("reviews.max_open_requests", self.max_open_requests),
            ("reviews.max_claimed", self.max_claimed),
            ("reviews.page_size", self.page_size),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = ReviewsConfig::default();
        assert_eq!(config.max_open_requests, 2);
        assert_eq!(config.max_claimed, 2);
        assert_eq!(config.page_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_limit_rejected() {
        let config = ReviewsConfig {
            max_claimed: 0,
            ..ReviewsConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "reviews.max_claimed"
        ));
    }
}
