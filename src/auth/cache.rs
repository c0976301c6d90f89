//! On-disk cache for login tokens.
//!
//! The cache file holds both token/expiry pairs, base64-encoded JSON. A
//! record that fails to decode at any layer (base64, JSON, expiry format) is
//! treated as corrupt: the file is deleted and recreated from defaults
//! before giving up. Expiry timestamps are serialized in a fixed textual
//! format; parse failures are corruption, never silently coerced.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{Error, Result};

/// Serialized expiry timestamp format.
const EXP_FORMAT: &str = "%d:%m:%YT%H:%M:%S";

/// A token closer than this to its expiry is treated as already expired,
/// leaving headroom for in-flight requests.
pub(crate) const EXPIRY_MARGIN_SECS: i64 = 30;

/// How many times a corrupt cache file is deleted and recreated before the
/// store gives up.
const RECOVERY_ATTEMPTS: u32 = 5;

/// A session/refresh token pair with expiry timestamps.
///
/// A token is only meaningful together with its expiry; a pair with either
/// half missing is treated as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    /// Short-lived bearer token for authenticated calls
    pub session_token: Option<String>,
    /// Expiry of the session token
    pub session_exp: Option<DateTime<Utc>>,
    /// Long-lived token used solely to mint new session tokens
    pub refresh_token: Option<String>,
    /// Expiry of the refresh token
    pub refresh_exp: Option<DateTime<Utc>>,
}

impl Credential {
    /// Drop a half-present pair so the invariant holds.
    fn normalized(mut self) -> Self {
        if self.session_token.is_none() || self.session_exp.is_none() {
            self.session_token = None;
            self.session_exp = None;
        }
        if self.refresh_token.is_none() || self.refresh_exp.is_none() {
            self.refresh_token = None;
            self.refresh_exp = None;
        }
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("session_exp", &self.session_exp)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_exp", &self.refresh_exp)
            .finish()
    }
}

/// On-disk record layout: `{"session": {"token", "exp"}, "refresh": {...}}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheRecord {
    session: TokenRecord,
    refresh: TokenRecord,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenRecord {
    token: Option<String>,
    exp: Option<String>,
}

impl CacheRecord {
    fn from_credential(credential: &Credential) -> Self {
        Self {
            session: TokenRecord {
                token: credential.session_token.clone(),
                exp: credential.session_exp.map(|t| t.format(EXP_FORMAT).to_string()),
            },
            refresh: TokenRecord {
                token: credential.refresh_token.clone(),
                exp: credential.refresh_exp.map(|t| t.format(EXP_FORMAT).to_string()),
            },
        }
    }

    fn into_credential(self) -> Result<Credential> {
        Ok(Credential {
            session_token: self.session.token,
            session_exp: parse_exp(self.session.exp)?,
            refresh_token: self.refresh.token,
            refresh_exp: parse_exp(self.refresh.exp)?,
        }
        .normalized())
    }
}

fn parse_exp(exp: Option<String>) -> Result<Option<DateTime<Utc>>> {
    exp.map(|s| {
        NaiveDateTime::parse_from_str(&s, EXP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| Error::Persistence(format!("invalid expiry timestamp '{s}': {e}")))
    })
    .transpose()
}

/// Persists and retrieves the [`Credential`] record.
///
/// Constructed without a path the store is disabled: it holds nothing and
/// every write is a no-op, so callers never branch on whether caching is
/// configured. All file access happens under an internal lock to keep the
/// foreground login flow and the background renewal task from interleaving
/// writes.
pub struct TokenStore {
    path: Option<PathBuf>,
    state: Mutex<Credential>,
}

impl TokenStore {
    /// Open the store, recovering from a corrupt file if needed.
    pub fn open(path: Option<PathBuf>) -> Result<Self> {
        let store = Self {
            path,
            state: Mutex::new(Credential::default()),
        };
        if store.path.is_some() {
            let loaded = store.load_with_recovery()?;
            *store.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = loaded;
        }
        Ok(store)
    }

    /// Whether this store persists anything.
    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Load the current credential record.
    ///
    /// Re-reads the backing file so changes made by another process are
    /// observed. A disabled store returns an empty credential.
    pub fn load(&self) -> Result<Credential> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if self.path.is_some() {
            *state = self.load_with_recovery()?;
        }
        Ok(state.clone())
    }

    /// Persist the given credential record.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.write_locked(&mut state, credential.clone().normalized())
    }

    /// Return the cached session token if it is still comfortably valid.
    ///
    /// A token within [`EXPIRY_MARGIN_SECS`] of its expiry, or past it, is
    /// cleared from the cache and `None` is returned; calling again keeps
    /// returning `None`.
    pub fn session_token(&self) -> Option<String> {
        if self.path.is_none() {
            return None;
        }
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Ok(loaded) = self.load_with_recovery() {
            *state = loaded;
        }

        let (token, exp) = match (&state.session_token, state.session_exp) {
            (Some(token), Some(exp)) => (token.clone(), exp),
            _ => return None,
        };

        let remaining = (exp - Utc::now()).num_seconds();
        if remaining <= EXPIRY_MARGIN_SECS {
            debug!("cached session token is expired, clearing it");
            let mut cleared = state.clone();
            cleared.session_token = None;
            cleared.session_exp = None;
            let _ = self.write_locked(&mut state, cleared);
            return None;
        }
        Some(token)
    }

    /// Return the cached refresh token if it has not expired.
    pub fn refresh_token(&self) -> Option<String> {
        if self.path.is_none() {
            return None;
        }
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Ok(loaded) = self.load_with_recovery() {
            *state = loaded;
        }

        let (token, exp) = match (&state.refresh_token, state.refresh_exp) {
            (Some(token), Some(exp)) => (token.clone(), exp),
            _ => return None,
        };

        if exp <= Utc::now() {
            debug!("cached refresh token is expired, clearing it");
            let mut cleared = state.clone();
            cleared.refresh_token = None;
            cleared.refresh_exp = None;
            let _ = self.write_locked(&mut state, cleared);
            return None;
        }
        Some(token)
    }

    /// Store a fresh token pair, deriving expiries from the tokens.
    pub fn set_tokens(&self, session_token: &str, refresh_token: &str) -> Result<()> {
        if self.path.is_none() {
            return Ok(());
        }
        let credential = Credential {
            session_token: Some(session_token.to_string()),
            session_exp: Some(token_expiry(session_token)?),
            refresh_token: Some(refresh_token.to_string()),
            refresh_exp: Some(token_expiry(refresh_token)?),
        };
        self.save(&credential)
    }

    /// Clear both token pairs.
    pub fn purge(&self) -> Result<()> {
        self.save(&Credential::default())
    }

    fn write_locked(&self, state: &mut Credential, credential: Credential) -> Result<()> {
        if let Some(path) = &self.path {
            let record = CacheRecord::from_credential(&credential);
            let body = STANDARD.encode(serde_json::to_vec(&record)?);
            fs::write(path, body)
                .map_err(|e| Error::Persistence(format!("failed to write {}: {e}", path.display())))?;
        }
        *state = credential;
        Ok(())
    }

    /// Read the cache file, deleting and recreating it on corruption.
    fn load_with_recovery(&self) -> Result<Credential> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(Credential::default()),
        };

        let mut last_err = None;
        for attempt in 1..=RECOVERY_ATTEMPTS {
            match read_record(path) {
                Ok(credential) => return Ok(credential),
                Err(err) => {
                    error!(
                        path = %path.display(),
                        error = %err,
                        attempt,
                        "failed to load auth cache, recreating it; previously cached tokens are lost"
                    );
                    last_err = Some(err);
                    // Drop the corrupt record; the next read recreates defaults.
                    let _ = fs::remove_file(path);
                }
            }
        }

        Err(Error::Persistence(format!(
            "failed to load auth cache {} after {RECOVERY_ATTEMPTS} attempts: {}",
            path.display(),
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

fn read_record(path: &PathBuf) -> Result<Credential> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Persistence(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let body = STANDARD.encode(serde_json::to_vec(&CacheRecord::default())?);
        fs::write(path, body)
            .map_err(|e| Error::Persistence(format!("failed to create {}: {e}", path.display())))?;
    }

    let raw = fs::read(path)
        .map_err(|e| Error::Persistence(format!("failed to read {}: {e}", path.display())))?;
    let decoded = STANDARD
        .decode(raw)
        .map_err(|e| Error::Persistence(format!("auth cache is not valid base64: {e}")))?;
    let record: CacheRecord = serde_json::from_slice(&decoded)
        .map_err(|e| Error::Persistence(format!("auth cache is not valid JSON: {e}")))?;
    record.into_credential()
}

/// Read the `exp` claim out of a JWT without verifying its signature.
///
/// The API's tokens are JWTs; their payload is the only authoritative
/// source for the expiry instant.
pub(crate) fn token_expiry(token: &str) -> Result<DateTime<Utc>> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::Protocol("token is not a JWT".into()))?;
    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::Protocol(format!("token payload is not valid base64: {e}")))?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded)
        .map_err(|e| Error::Protocol(format!("token payload is not valid JSON: {e}")))?;
    let exp = claims
        .get("exp")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::Protocol("token has no exp claim".into()))?;
    DateTime::from_timestamp(exp, 0)
        .ok_or_else(|| Error::Protocol("token exp claim is out of range".into()))
}

/// Build an unsigned JWT whose payload carries the given exp claim.
#[cfg(test)]
pub(crate) fn fake_jwt(exp: DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload =
        URL_SAFE_NO_PAD.encode(serde_json::json!({"exp": exp.timestamp()}).to_string());
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn temp_path(tag: &str) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "mangadex-rs-cache-{}-{tag}-{n}.bin",
            std::process::id()
        ))
    }

    fn truncated(t: DateTime<Utc>) -> DateTime<Utc> {
        // The serialized format has second precision.
        DateTime::from_timestamp(t.timestamp(), 0).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let path = temp_path("roundtrip");
        let store = TokenStore::open(Some(path.clone())).unwrap();

        let credential = Credential {
            session_token: Some("sess".into()),
            session_exp: Some(truncated(Utc::now() + Duration::minutes(15))),
            refresh_token: Some("refr".into()),
            refresh_exp: Some(truncated(Utc::now() + Duration::days(30))),
        };
        store.save(&credential).unwrap();
        assert_eq!(store.load().unwrap(), credential);

        // Reopening reads the same record back.
        let reopened = TokenStore::open(Some(path.clone())).unwrap();
        assert_eq!(reopened.load().unwrap(), credential);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_round_trip_all_null() {
        let path = temp_path("null");
        let store = TokenStore::open(Some(path.clone())).unwrap();
        store.save(&Credential::default()).unwrap();
        assert_eq!(store.load().unwrap(), Credential::default());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_half_pair_is_treated_as_absent() {
        let path = temp_path("halfpair");
        let store = TokenStore::open(Some(path.clone())).unwrap();
        store
            .save(&Credential {
                session_token: Some("sess".into()),
                session_exp: None,
                refresh_token: None,
                refresh_exp: Some(Utc::now()),
            })
            .unwrap();
        assert_eq!(store.load().unwrap(), Credential::default());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_session_token_respects_margin() {
        let path = temp_path("margin");
        let store = TokenStore::open(Some(path.clone())).unwrap();

        // Well within validity.
        store
            .save(&Credential {
                session_token: Some("alive".into()),
                session_exp: Some(Utc::now() + Duration::minutes(10)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.session_token().as_deref(), Some("alive"));

        // Inside the 30s margin: expired, cleared, idempotent.
        store
            .save(&Credential {
                session_token: Some("dying".into()),
                session_exp: Some(Utc::now() + Duration::seconds(10)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.session_token(), None);
        assert_eq!(store.session_token(), None);
        assert_eq!(store.load().unwrap().session_token, None);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_refresh_token_cleared_on_expiry() {
        let path = temp_path("refresh");
        let store = TokenStore::open(Some(path.clone())).unwrap();
        store
            .save(&Credential {
                refresh_token: Some("old".into()),
                refresh_exp: Some(Utc::now() - Duration::seconds(1)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.refresh_token(), None);
        assert_eq!(store.load().unwrap().refresh_token, None);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_corrupt_file_is_recreated() {
        let path = temp_path("corrupt");
        fs::write(&path, "!!! not base64 !!!").unwrap();

        let store = TokenStore::open(Some(path.clone())).unwrap();
        assert_eq!(store.load().unwrap(), Credential::default());
        // The recreated file decodes cleanly now.
        assert!(read_record(&path).is_ok());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_garbled_expiry_is_corruption() {
        let path = temp_path("badexp");
        let record = serde_json::json!({
            "session": {"token": "sess", "exp": "2024-01-01 00:00:00"},
            "refresh": {"token": null, "exp": null}
        });
        fs::write(&path, STANDARD.encode(record.to_string())).unwrap();

        // Wrong format string means corruption: recovered to defaults.
        let store = TokenStore::open(Some(path.clone())).unwrap();
        assert_eq!(store.load().unwrap(), Credential::default());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_disabled_store_holds_nothing() {
        let store = TokenStore::open(None).unwrap();
        assert!(!store.is_enabled());
        store.set_tokens(&fake_jwt(Utc::now()), &fake_jwt(Utc::now())).unwrap();
        assert_eq!(store.session_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert_eq!(store.load().unwrap(), Credential::default());
    }

    #[test]
    fn test_token_expiry_reads_exp_claim() {
        let exp = truncated(Utc::now() + Duration::minutes(15));
        assert_eq!(token_expiry(&fake_jwt(exp)).unwrap(), exp);
    }

    #[test]
    fn test_token_expiry_rejects_garbage() {
        assert!(matches!(token_expiry("not-a-jwt"), Err(Error::Protocol(_))));
        assert!(matches!(
            token_expiry("a.%%%%.c"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_set_tokens_derives_expiries() {
        let path = temp_path("derive");
        let store = TokenStore::open(Some(path.clone())).unwrap();

        let session_exp = truncated(Utc::now() + Duration::minutes(15));
        let refresh_exp = truncated(Utc::now() + Duration::days(30));
        store
            .set_tokens(&fake_jwt(session_exp), &fake_jwt(refresh_exp))
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.session_exp, Some(session_exp));
        assert_eq!(loaded.refresh_exp, Some(refresh_exp));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_credential_debug_redacts_tokens() {
        let credential = Credential {
            session_token: Some("super-secret".into()),
            session_exp: Some(Utc::now()),
            ..Default::default()
        };
        let debug = format!("{credential:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
