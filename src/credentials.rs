//! API key resolution for the Mistral-backed engines.
//!
//! Lookup order, first non-empty value wins:
//!
//! 1. the explicit `--api-key` value
//! 2. the `MISTRAL_API_KEY` environment variable
//! 3. a `.env` file in the working directory (`MISTRAL_API_KEY=` or
//!    `api_key=`), skipped when `ALICE_PDF_IGNORE_ENV` is set

use std::fmt;
use std::path::Path;
use tracing::debug;

/// Environment variable holding the Mistral API key.
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// When set (to anything), the `.env` file is not consulted.
pub const IGNORE_DOTENV_ENV: &str = "ALICE_PDF_IGNORE_ENV";

const DOTENV_KEYS: [&str; 2] = [API_KEY_ENV, "api_key"];

/// Where a resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Explicit,
    Environment,
    DotEnv,
}

/// A resolved API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    value: String,
    source: KeySource,
}

impl ApiKey {
    pub fn new(value: impl Into<String>, source: KeySource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }

    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> KeySource {
        self.source
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve the API key from the flag, the environment, or `./.env`.
pub fn resolve_api_key(explicit: Option<&str>) -> Option<ApiKey> {
    let env_value = std::env::var(API_KEY_ENV).ok();
    let dotenv = if std::env::var_os(IGNORE_DOTENV_ENV).is_some() {
        None
    } else {
        Some(Path::new(".env"))
    };
    resolve_from(explicit, env_value.as_deref(), dotenv)
}

/// Resolution with every source passed in explicitly.
pub fn resolve_from(
    explicit: Option<&str>,
    env_value: Option<&str>,
    dotenv_path: Option<&Path>,
) -> Option<ApiKey> {
    if let Some(key) = non_empty(explicit) {
        return Some(ApiKey::new(key, KeySource::Explicit));
    }
    if let Some(key) = non_empty(env_value) {
        return Some(ApiKey::new(key, KeySource::Environment));
    }
    let path = dotenv_path?;
    let key = read_dotenv_key(path)?;
    debug!("API key loaded from {}", path.display());
    Some(ApiKey::new(key, KeySource::DotEnv))
}

/// First `MISTRAL_API_KEY` / `api_key` entry of a `.env` file.
fn read_dotenv_key(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Ignoring unreadable {}: {}", path.display(), e);
            return None;
        }
    };
    entries
        .filter_map(Result::ok)
        .find(|(key, value)| DOTENV_KEYS.contains(&key.as_str()) && !value.trim().is_empty())
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn dotenv_with(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn explicit_key_wins() {
        let file = dotenv_with("MISTRAL_API_KEY=from-file\n");
        let key = resolve_from(Some("flag"), Some("env"), Some(file.path())).unwrap();
        assert_eq!(key.expose(), "flag");
        assert_eq!(key.source(), KeySource::Explicit);
    }

    #[test]
    fn environment_beats_dotenv() {
        let file = dotenv_with("MISTRAL_API_KEY=from-file\n");
        let key = resolve_from(None, Some("env_key"), Some(file.path())).unwrap();
        assert_eq!(key.expose(), "env_key");
        assert_eq!(key.source(), KeySource::Environment);
    }

    #[test]
    fn blank_values_are_ignored() {
        let key = resolve_from(Some("  "), Some(""), None);
        assert!(key.is_none());
    }

    #[test]
    fn dotenv_accepts_both_key_names() {
        let file = dotenv_with("OTHER=1\napi_key=\"quoted-key\"\n");
        let key = resolve_from(None, None, Some(file.path())).unwrap();
        assert_eq!(key.expose(), "quoted-key");
        assert_eq!(key.source(), KeySource::DotEnv);

        let file = dotenv_with("# comment\nMISTRAL_API_KEY=plain\napi_key=second\n");
        let key = resolve_from(None, None, Some(file.path())).unwrap();
        assert_eq!(key.expose(), "plain");
    }

    #[test]
    fn missing_dotenv_gives_none() {
        let dir = tempfile::tempdir().unwrap();
        let key = resolve_from(None, None, Some(&dir.path().join(".env")));
        assert!(key.is_none());
    }

    #[test]
    fn debug_is_redacted() {
        let key = ApiKey::new("sk-123", KeySource::Explicit);
        let dbg = format!("{key:?}");
        assert!(!dbg.contains("sk-123"));
    }
}
