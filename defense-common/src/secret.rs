use crate::error::{DefenseError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A secret string that prevents accidental logging.
///
/// The actual value is only reachable through `expose_secret`/`into_inner`;
/// `Debug`, `Display` and `Serialize` all redact it.
#[derive(Clone)]
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    pub fn expose_secret(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl Secret<String> {
    /// Create a secret from an environment variable.
    pub fn from_env(var_name: &str) -> Result<Self> {
        std::env::var(var_name)
            .map_err(|e| DefenseError::Secret(format!("environment variable '{var_name}' not set: {e}")))
            .and_then(|val| {
                if val.is_empty() {
                    Err(DefenseError::Secret(format!("environment variable '{var_name}' is empty")))
                } else {
                    Ok(Self::new(val))
                }
            })
    }

    pub fn from_env_or(var_name: &str, default: String) -> Self {
        Self::from_env(var_name).unwrap_or_else(|_| Self::new(default))
    }

    /// Load a secret from a file, trimming a single trailing newline.
    ///
    /// Secrets are carried to components as files in a secrets directory
    /// (file name given by config), never as inline config values.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DefenseError::Secret(format!("reading secret file '{}': {e}", path.display())))?;
        let trimmed = raw.trim_end_matches(['\n', '\r']).to_string();
        if trimmed.is_empty() {
            return Err(DefenseError::Secret(format!("secret file '{}' is empty", path.display())));
        }
        Ok(Self::new(trimmed))
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Clone> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl Serialize for Secret<String> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for Secret<String> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Secret::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug() {
        let secret = Secret::new("my-secret-password".to_string());
        let debug_output = format!("{:?}", secret);
        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("password"));
    }

    #[test]
    fn test_secret_display() {
        let secret = Secret::new("my-secret-password".to_string());
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn test_secret_expose() {
        let secret = Secret::new("my-secret-password".to_string());
        assert_eq!(secret.expose_secret(), "my-secret-password");
    }

    #[test]
    fn test_secret_from_env() {
        std::env::set_var("TEST_DEFENSE_SECRET", "test-value");
        let secret = Secret::<String>::from_env("TEST_DEFENSE_SECRET").unwrap();
        assert_eq!(secret.expose_secret(), "test-value");
        std::env::remove_var("TEST_DEFENSE_SECRET");
    }

    #[test]
    fn test_secret_from_env_empty() {
        std::env::set_var("TEST_DEFENSE_SECRET_EMPTY", "");
        let result = Secret::<String>::from_env("TEST_DEFENSE_SECRET_EMPTY");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
        std::env::remove_var("TEST_DEFENSE_SECRET_EMPTY");
    }

    #[test]
    fn test_secret_serde() {
        let secret = Secret::new("my-password".to_string());
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");
    }

    #[test]
    fn test_secret_from_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("defense_common_test_secret.txt");
        std::fs::write(&path, "file-secret-value\n").unwrap();
        let secret = Secret::<String>::from_file(&path).unwrap();
        assert_eq!(secret.expose_secret(), "file-secret-value");
        std::fs::remove_file(&path).unwrap();
    }
}
