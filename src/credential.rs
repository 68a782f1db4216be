//! Hub credential handling.
//!
//! A token given on the command line wins. Otherwise we fall back to the
//! environment, a `.env` file, and finally the token saved by
//! `huggingface-cli login`.

use dotenv::dotenv;
use std::fmt;

pub const HF_TOKEN_ENV: &str = "HF_TOKEN";
pub const HUGGING_FACE_TOKEN_ENV: &str = "HUGGING_FACE_TOKEN";

/// An access token for the hub. Debug and Display never show the value.
#[derive(Clone, PartialEq, Eq)]
pub struct HfToken {
    inner: String,
}

impl HfToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: token.into(),
        }
    }

    /// Returns `None` for empty or whitespace-only input.
    pub fn from_option(token: Option<impl Into<String>>) -> Option<Self> {
        token
            .map(|t| t.into().trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Self::new)
    }

    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.inner)
    }
}

impl fmt::Debug for HfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HfToken([REDACTED])")
    }
}

impl fmt::Display for HfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Pick the credential for this run.
pub fn resolve_token(explicit: Option<String>) -> Option<HfToken> {
    if let Some(token) = HfToken::from_option(explicit) {
        tracing::debug!("using token passed on the command line");
        return Some(token);
    }
    if let Some(token) = HfToken::from_option(std::env::var(HF_TOKEN_ENV).ok()) {
        tracing::debug!("using token from {HF_TOKEN_ENV}");
        return Some(token);
    }
    dotenv().ok(); // Load .env file
    if let Some(token) = HfToken::from_option(dotenv::var(HUGGING_FACE_TOKEN_ENV).ok()) {
        tracing::debug!("using token from {HUGGING_FACE_TOKEN_ENV}");
        return Some(token);
    }
    stored_token()
}

/// Token written by a previous `huggingface-cli login`, found under `HF_HOME`.
pub fn stored_token() -> Option<HfToken> {
    let token = HfToken::from_option(hf_hub::Cache::from_env().token());
    if token.is_some() {
        tracing::debug!("using token stored in the hub cache");
    } else {
        tracing::debug!("no hub token found, requests will be anonymous");
    }
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn token_is_redacted() {
        let token = HfToken::new("hf_abcdef123");
        assert_eq!(format!("{:?}", token), "HfToken([REDACTED])");
        assert_eq!(format!("{}", token), "[REDACTED]");
        assert_eq!(token.expose_secret(), "hf_abcdef123");
        assert_eq!(token.bearer(), "Bearer hf_abcdef123");
    }

    #[test]
    fn blank_tokens_are_ignored() {
        assert!(HfToken::from_option(Some("   ")).is_none());
        assert!(HfToken::from_option(None::<String>).is_none());
        assert_eq!(
            HfToken::from_option(Some(" hf_x \n")).unwrap().expose_secret(),
            "hf_x"
        );
    }

    #[test]
    fn explicit_token_wins() {
        let token = resolve_token(Some("hf_explicit".to_string())).unwrap();
        assert_eq!(token.expose_secret(), "hf_explicit");
    }

    // Tests in this binary share one process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_token_env() -> Vec<(&'static str, Option<String>)> {
        let saved = [HF_TOKEN_ENV, HUGGING_FACE_TOKEN_ENV, "HF_HOME"]
            .into_iter()
            .map(|key| (key, std::env::var(key).ok()))
            .collect();
        std::env::remove_var(HF_TOKEN_ENV);
        std::env::remove_var(HUGGING_FACE_TOKEN_ENV);
        saved
    }

    fn restore_env(saved: Vec<(&'static str, Option<String>)>) {
        for (key, value) in saved {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }

    #[test]
    fn fallback_order() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let saved = clear_token_env();

        let hf_home = tempfile::tempdir().unwrap();
        std::fs::write(hf_home.path().join("token"), "hf_stored_login\n").unwrap();
        std::env::set_var("HF_HOME", hf_home.path());
        assert_eq!(
            resolve_token(None).map(|t| t.expose_secret().to_string()),
            Some("hf_stored_login".to_string())
        );

        let env_file = hf_home.path().join(".env");
        std::fs::write(&env_file, "HUGGING_FACE_TOKEN=hf_from_dotenv\n").unwrap();
        dotenv::from_path(&env_file).unwrap();
        assert_eq!(
            resolve_token(None).unwrap().expose_secret(),
            "hf_from_dotenv"
        );

        std::env::set_var(HF_TOKEN_ENV, "hf_from_env");
        assert_eq!(resolve_token(None).unwrap().expose_secret(), "hf_from_env");

        assert_eq!(
            resolve_token(Some("hf_explicit".to_string()))
                .unwrap()
                .expose_secret(),
            "hf_explicit"
        );

        restore_env(saved);
    }

    #[test]
    fn no_token_anywhere_is_anonymous() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let saved = clear_token_env();
        let hf_home = tempfile::tempdir().unwrap();
        std::env::set_var("HF_HOME", hf_home.path());

        assert!(stored_token().is_none());
        assert!(resolve_token(Some("  ".to_string())).is_none());

        restore_env(saved);
    }
}
