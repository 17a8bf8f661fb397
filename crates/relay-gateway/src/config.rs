use std::fmt;

use relay_protocol::PASSWORD_ENV;

use crate::error::ConfigError;

#[derive(Clone, Default)]
pub struct GatewayConfig {
    /// Shared secret every request must present in its `bearer` header.
    pub password: Option<String>,
}

impl GatewayConfig {
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
        }
    }

    /// Read the secret from `RELAY_PASSWORD`.
    pub fn from_env() -> Self {
        Self {
            password: std::env::var(PASSWORD_ENV).ok(),
        }
    }

    pub(crate) fn into_credential(self) -> Result<String, ConfigError> {
        self.password
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::MissingCredential)
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_is_missing() {
        assert!(GatewayConfig::default().into_credential().is_err());
        assert!(GatewayConfig::with_password("").into_credential().is_err());
        assert_eq!(
            GatewayConfig::with_password("s3cret").into_credential().unwrap(),
            "s3cret"
        );
    }

    #[test]
    fn debug_hides_password() {
        let shown = format!("{:?}", GatewayConfig::with_password("s3cret"));
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("redacted"));
    }
}
