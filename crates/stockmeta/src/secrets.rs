//! API credential resolution.
//!
//! A credential can be given inline, read from a file (Docker secrets) or
//! taken from an environment variable. The first non-empty source wins in
//! that order.

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No credential source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read credential from file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential file '{0}' is empty")]
    EmptyFile(String),

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// The configured places a credential may come from.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialSource<'a> {
    pub direct: Option<&'a str>,
    pub file_path: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl CredentialSource<'_> {
    pub fn is_configured(&self) -> bool {
        non_empty(self.direct).is_some()
            || non_empty(self.file_path).is_some()
            || non_empty(self.env_var).is_some()
    }

    pub fn resolve(&self) -> Result<SecretString> {
        if let Some(value) = non_empty(self.direct) {
            return Ok(SecretString::from(value));
        }

        if let Some(path) = non_empty(self.file_path) {
            let expanded = expand_home(path);
            let content = std::fs::read_to_string(&expanded).map_err(|e| SecretError::FileRead {
                path: expanded.clone(),
                source: e,
            })?;
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return Err(SecretError::EmptyFile(expanded));
            }
            return Ok(SecretString::from(trimmed));
        }

        if let Some(name) = non_empty(self.env_var) {
            return match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value.trim())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }
}

/// Resolves a credential from a direct value, a file, or an env var.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    CredentialSource {
        direct,
        file_path,
        env_var,
    }
    .resolve()
}

/// Like [`resolve_secret`], but a missing source is `Ok(None)`.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` to the home directory. `~user` is not supported.
fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.to_string_lossy(), rest),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("STOCKMETA_TEST_KEY_1", "env_value");
        let result =
            resolve_secret(Some("direct_value"), None, Some("STOCKMETA_TEST_KEY_1")).unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
        std::env::remove_var("STOCKMETA_TEST_KEY_1");
    }

    #[test]
    #[serial]
    fn test_file_before_env() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  file_value  ").unwrap();

        std::env::set_var("STOCKMETA_TEST_KEY_2", "env_value");
        let result = resolve_secret(
            None,
            Some(file.path().to_str().unwrap()),
            Some("STOCKMETA_TEST_KEY_2"),
        )
        .unwrap();
        assert_eq!(result.expose_secret(), "file_value");
        std::env::remove_var("STOCKMETA_TEST_KEY_2");
    }

    #[test]
    #[serial]
    fn test_env_fallback_skips_empty_sources() {
        std::env::set_var("STOCKMETA_TEST_KEY_3", "env_value\n");
        let result = resolve_secret(Some(""), Some(""), Some("STOCKMETA_TEST_KEY_3")).unwrap();
        assert_eq!(result.expose_secret(), "env_value");
        std::env::remove_var("STOCKMETA_TEST_KEY_3");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            resolve_secret(None, None, None),
            Err(SecretError::NoSourceProvided)
        ));
        assert!(matches!(
            resolve_secret(None, Some("/nonexistent/stockmeta/key"), None),
            Err(SecretError::FileRead { .. })
        ));
        assert!(matches!(
            resolve_secret(None, None, Some("STOCKMETA_DEFINITELY_UNSET_42")),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = NamedTempFile::new().unwrap();
        let result = resolve_secret(None, Some(file.path().to_str().unwrap()), None);
        assert!(matches!(result, Err(SecretError::EmptyFile(_))));
    }

    #[test]
    fn test_optional_resolution() {
        assert!(resolve_secret_optional(None, None, None).unwrap().is_none());
        assert!(resolve_secret_optional(Some("k"), None, None)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_is_configured() {
        assert!(!CredentialSource::default().is_configured());
        assert!(CredentialSource {
            env_var: Some("X"),
            ..Default::default()
        }
        .is_configured());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), "/abs/path");
        assert_eq!(expand_home("~other/x"), "~other/x");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home("~/keys/gemini"),
                format!("{}/keys/gemini", home.to_string_lossy())
            );
        }
    }
}
