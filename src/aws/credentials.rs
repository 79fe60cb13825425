use std::fmt;
use tracing::debug;

use super::metadata::ImdsClient;
use super::AwsError;

pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";

#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

// Keep secrets out of --verbose output
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn new(access_key_id: &str, secret_access_key: &str, session_token: Option<&str>) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: session_token.map(str::to_string),
        }
    }

    /// Static credentials from the environment, if both keys are set
    pub fn from_env_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let access_key_id = non_empty(ACCESS_KEY_ENV)?;
        let secret_access_key = non_empty(SECRET_KEY_ENV)?;
        Some(Self {
            access_key_id,
            secret_access_key,
            session_token: non_empty(SESSION_TOKEN_ENV),
        })
    }
}

/// Environment credentials first, then the instance profile
pub async fn resolve(imds: &ImdsClient) -> Result<Credentials, AwsError> {
    if let Some(credentials) = Credentials::from_env_lookup(|key| std::env::var(key).ok()) {
        debug!("Using AWS credentials from the environment");
        return Ok(credentials);
    }

    let role = imds.role_credentials().await.map_err(|e| {
        debug!("Instance profile credentials unavailable: {}", e);
        AwsError::NoCredentials
    })?;
    debug!("Using AWS credentials from the instance profile");

    Ok(Credentials {
        access_key_id: role.access_key_id,
        secret_access_key: role.secret_access_key,
        session_token: role.token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_credentials() {
        let creds = Credentials::from_env_lookup(|key| match key {
            ACCESS_KEY_ENV => Some("AKID".to_string()),
            SECRET_KEY_ENV => Some("secret".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds.access_key_id, "AKID");
        assert!(creds.session_token.is_none());
    }

    #[test]
    fn test_incomplete_env_is_ignored() {
        let creds = Credentials::from_env_lookup(|key| match key {
            ACCESS_KEY_ENV => Some("AKID".to_string()),
            SECRET_KEY_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert!(creds.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("AKID", "very-secret", Some("token"));
        let printed = format!("{creds:?}");
        assert!(printed.contains("AKID"));
        assert!(!printed.contains("very-secret"));
        assert!(!printed.contains("token\""));
    }
}
