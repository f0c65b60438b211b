//! Credential file for the Site24x7 OAuth client
//!
//! A single JSON document holding the client identity, the grant material and
//! the current access token. Operators seed `CLIENT_ID`, `CLIENT_SECRET` and
//! `GENERATED_CODE` (or `REFRESH_TOKEN`) by hand; everything else is written
//! back by the authenticator after each successful exchange.
//!
//! Unknown keys are ignored and missing keys default to empty, so files written
//! by older or newer revisions keep loading across restarts.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::token::{Grant, TokenResponse};

/// On-disk credential record.
///
/// `token_generation_time` is a unix timestamp in milliseconds and
/// `expires_in_sec` is the validity window starting at that instant. Both are
/// only ever written together with `access_token`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialRecord {
    #[serde(rename = "CLIENT_ID")]
    pub client_id: String,
    #[serde(rename = "CLIENT_SECRET")]
    pub client_secret: String,
    /// Single-use authorization code, cleared after it has been exchanged
    #[serde(rename = "GENERATED_CODE")]
    pub authorization_code: String,
    #[serde(rename = "REFRESH_TOKEN")]
    pub refresh_token: String,
    #[serde(rename = "ACCESS_TOKEN")]
    pub access_token: String,
    #[serde(rename = "TOKEN_GENERATION_TIME")]
    pub token_generation_time: i64,
    #[serde(rename = "EXPIRES_IN_SEC")]
    pub expires_in_sec: f64,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("authorization_code", &redacted(&self.authorization_code))
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("access_token", &redacted(&self.access_token))
            .field("token_generation_time", &self.token_generation_time)
            .field("expires_in_sec", &self.expires_in_sec)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() { "" } else { "[REDACTED]" }
}

impl CredentialRecord {
    /// Read a record from `path`.
    ///
    /// Returns `NotFound` if nothing exists at `path` and `CredentialParse` if
    /// the content is not a credential document.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.display().to_string()));
            }
            Err(e) => {
                return Err(Error::Io(format!(
                    "reading credential file {}: {e}",
                    path.display()
                )));
            }
        };
        let record: CredentialRecord = serde_json::from_str(&contents).map_err(|e| {
            Error::CredentialParse(format!("parsing credential file {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "loaded credential file");
        Ok(record)
    }

    /// Write the full record, secrets included, to `path`.
    ///
    /// The previous content is replaced atomically.
    pub async fn persist(&self, path: &Path) -> Result<()> {
        write_atomic(path, self).await
    }

    /// Whether the record holds a usable access token.
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty() && self.expires_in_sec > 0.0
    }

    /// Choose the grant used to obtain the first access token.
    ///
    /// A refresh token wins over an authorization code: once a refresh token
    /// exists the code has already been spent.
    pub fn bootstrap_grant(&self) -> Option<Grant> {
        if !self.refresh_token.is_empty() {
            Some(Grant::RefreshToken(self.refresh_token.clone()))
        } else if !self.authorization_code.is_empty() {
            Some(Grant::AuthorizationCode(self.authorization_code.clone()))
        } else {
            None
        }
    }

    /// Validity window of the current access token.
    pub fn expires_in(&self) -> Duration {
        Duration::try_from_secs_f64(self.expires_in_sec).unwrap_or_default()
    }

    /// Store a validated token response minted at `now_millis`.
    ///
    /// The access token, expiry and generation time change together. A rotated
    /// refresh token replaces the stored one; an exchanged authorization code is
    /// cleared.
    pub fn apply(&mut self, grant: &Grant, response: TokenResponse, now_millis: i64) {
        self.access_token = response.access_token;
        self.expires_in_sec = response.expires_in_sec;
        self.token_generation_time = now_millis;
        if let Some(refresh) = response.refresh_token.filter(|r| !r.is_empty()) {
            self.refresh_token = refresh;
        }
        if matches!(grant, Grant::AuthorizationCode(_)) {
            self.authorization_code.clear();
        }
    }
}

/// Milliseconds since the unix epoch.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Write the record to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over the
/// target. The file holds the client secret and tokens, so it is created 0600
/// on unix.
async fn write_atomic(path: &Path, record: &CredentialRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;
    if !dir.as_os_str().is_empty() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::Io(format!("creating credential directory: {e}")))?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("credential path has no file name".into()))?
        .to_string_lossy();
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_record() -> CredentialRecord {
        CredentialRecord {
            client_id: "1000.CLIENT".into(),
            client_secret: "secret".into(),
            authorization_code: String::new(),
            refresh_token: "RT0".into(),
            access_token: "AT0".into(),
            token_generation_time: 1_735_500_000_000,
            expires_in_sec: 3600.0,
        }
    }

    #[tokio::test]
    async fn roundtrip_persist_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.json");

        let record = seeded_record();
        record.persist(&path).await.unwrap();

        let loaded = CredentialRecord::load(&path).await.unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn roundtrip_preserves_empty_and_zero_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.json");

        let template = CredentialRecord::default();
        template.persist(&path).await.unwrap();

        let loaded = CredentialRecord::load(&path).await.unwrap();
        assert_eq!(loaded, template);
        assert_eq!(loaded.token_generation_time, 0);
        assert_eq!(loaded.expires_in_sec, 0.0);
        assert!(loaded.authorization_code.is_empty());
    }

    #[tokio::test]
    async fn template_uses_operator_facing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.json");

        CredentialRecord::default().persist(&path).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        for key in [
            "CLIENT_ID",
            "CLIENT_SECRET",
            "GENERATED_CODE",
            "REFRESH_TOKEN",
            "ACCESS_TOKEN",
            "TOKEN_GENERATION_TIME",
            "EXPIRES_IN_SEC",
        ] {
            assert!(json.get(key).is_some(), "template must contain {key}");
        }
    }

    #[tokio::test]
    async fn load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CredentialRecord::load(&dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn load_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let err = CredentialRecord::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::CredentialParse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn load_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CredentialRecord::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn load_accepts_partial_and_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.json");
        // Hand-edited file: integer expiry, no GENERATED_CODE, extra key
        tokio::fs::write(
            &path,
            r#"{"CLIENT_ID":"id","CLIENT_SECRET":"s","REFRESH_TOKEN":"rt","EXPIRES_IN_SEC":3600,"API_DOMAIN":"x"}"#,
        )
        .await
        .unwrap();

        let record = CredentialRecord::load(&path).await.unwrap();
        assert_eq!(record.client_id, "id");
        assert_eq!(record.refresh_token, "rt");
        assert_eq!(record.expires_in_sec, 3600.0);
        assert!(record.authorization_code.is_empty());
        assert!(record.access_token.is_empty());
    }

    #[tokio::test]
    async fn persist_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".site24x7").join("oauth.json");

        seeded_record().persist(&path).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn persist_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.json");

        seeded_record().persist(&path).await.unwrap();
        seeded_record().persist(&path).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = vec![];
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["oauth.json"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.json");
        seeded_record().persist(&path).await.unwrap();

        let metadata = tokio::fs::metadata(&path).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "credential file must be 0600, got {mode:o}");
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", seeded_record());
        assert!(debug.contains("1000.CLIENT"));
        assert!(!debug.contains("secret\""));
        assert!(!debug.contains("RT0"));
        assert!(!debug.contains("AT0"));
    }

    #[test]
    fn bootstrap_grant_prefers_refresh_token() {
        let mut record = seeded_record();
        record.authorization_code = "code".into();
        assert_eq!(
            record.bootstrap_grant(),
            Some(Grant::RefreshToken("RT0".into()))
        );

        record.refresh_token.clear();
        assert_eq!(
            record.bootstrap_grant(),
            Some(Grant::AuthorizationCode("code".into()))
        );

        record.authorization_code.clear();
        assert_eq!(record.bootstrap_grant(), None);
    }

    #[test]
    fn apply_updates_token_triple_and_rotates_refresh() {
        let mut record = seeded_record();
        record.apply(
            &Grant::RefreshToken("RT0".into()),
            TokenResponse {
                access_token: "AT1".into(),
                expires_in_sec: 7200.0,
                refresh_token: Some("RT1".into()),
                error: None,
            },
            42,
        );
        assert_eq!(record.access_token, "AT1");
        assert_eq!(record.expires_in_sec, 7200.0);
        assert_eq!(record.token_generation_time, 42);
        assert_eq!(record.refresh_token, "RT1");
    }

    #[test]
    fn apply_keeps_refresh_token_when_not_rotated() {
        let mut record = seeded_record();
        record.apply(
            &Grant::RefreshToken("RT0".into()),
            TokenResponse {
                access_token: "AT1".into(),
                expires_in_sec: 3600.0,
                refresh_token: Some(String::new()),
                error: None,
            },
            1,
        );
        assert_eq!(record.refresh_token, "RT0");
    }

    #[test]
    fn apply_clears_spent_authorization_code() {
        let mut record = CredentialRecord {
            client_id: "id".into(),
            client_secret: "s".into(),
            authorization_code: "code".into(),
            ..Default::default()
        };
        record.apply(
            &Grant::AuthorizationCode("code".into()),
            TokenResponse {
                access_token: "AT1".into(),
                expires_in_sec: 3600.0,
                refresh_token: Some("RT1".into()),
                error: None,
            },
            1,
        );
        assert!(record.authorization_code.is_empty());
        assert_eq!(record.refresh_token, "RT1");
    }

    #[test]
    fn expiry_bookkeeping() {
        let record = seeded_record();
        assert!(record.has_access_token());
        assert_eq!(record.expires_in(), Duration::from_secs(3600));

        let empty = CredentialRecord::default();
        assert!(!empty.has_access_token());
        assert_eq!(empty.expires_in(), Duration::ZERO);
    }
}
