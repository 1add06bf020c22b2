use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, RefreshToken, TokenUrl};
use serde::Deserialize;

use crate::models::credential::Credential;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Gmail is not authorised yet; open /oauth/login to sign in")]
    AuthorizationRequired,

    #[error("Token cache error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token cache is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid client secret file: {0}")]
    InvalidClientSecret(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
}

/// Persistence and renewal of the Gmail credential.
pub trait CredentialStore {
    /// The cached credential, or `None` when nobody has signed in yet.
    fn load(&self) -> Result<Option<Credential>, AuthError>;
    fn save(&self, credential: &Credential) -> Result<(), AuthError>;
    /// Trades the refresh token for a fresh access token. Does not persist.
    fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError>;
}

/// Returns a usable credential, refreshing and re-saving an expired one.
/// A missing or unrefreshable token means the browser flow has to run.
pub fn get_credentials<S: CredentialStore + ?Sized>(store: &S) -> Result<Credential, AuthError> {
    let credential = store.load()?.ok_or(AuthError::AuthorizationRequired)?;
    if credential.is_valid() {
        return Ok(credential);
    }
    if !credential.can_refresh() {
        warn!("Cached Gmail token expired and has no refresh token");
        return Err(AuthError::AuthorizationRequired);
    }

    info!("Access token expired, refreshing");
    let refreshed = store.refresh(&credential)?;
    store.save(&refreshed)?;
    info!("Token successfully refreshed.");
    Ok(refreshed)
}

#[derive(Deserialize)]
struct ClientSecretFile {
    #[serde(alias = "web")]
    installed: OAuthClientConfig,
}

#[derive(Deserialize)]
struct OAuthClientConfig {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
}

/// Builds the OAuth client from a Google client secret file
/// (either the "installed" or the "web" flavour).
pub fn build_oauth_client(client_secret_path: &Path, redirect_url: &str) -> Result<BasicClient, AuthError> {
    let secret_str = fs::read_to_string(client_secret_path).map_err(|e| {
        AuthError::InvalidClientSecret(format!("{}: {}", client_secret_path.display(), e))
    })?;
    let secret: ClientSecretFile = serde_json::from_str(&secret_str)
        .map_err(|e| AuthError::InvalidClientSecret(e.to_string()))?;
    let config = secret.installed;

    let auth_url = AuthUrl::new(config.auth_uri)
        .map_err(|e| AuthError::InvalidClientSecret(format!("auth_uri: {}", e)))?;
    let token_url = TokenUrl::new(config.token_uri)
        .map_err(|e| AuthError::InvalidClientSecret(format!("token_uri: {}", e)))?;
    let redirect_url = RedirectUrl::new(redirect_url.to_string())
        .map_err(|e| AuthError::InvalidClientSecret(format!("redirect url: {}", e)))?;

    Ok(BasicClient::new(
        ClientId::new(config.client_id),
        Some(ClientSecret::new(config.client_secret)),
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(redirect_url))
}

/// Token cache kept as a JSON file next to the binary.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    token_path: PathBuf,
    client_secret_path: PathBuf,
    redirect_url: String,
}

impl FileCredentialStore {
    pub fn new(token_path: PathBuf, client_secret_path: PathBuf, redirect_url: String) -> Self {
        FileCredentialStore { token_path, client_secret_path, redirect_url }
    }

    pub fn oauth_client(&self) -> Result<BasicClient, AuthError> {
        build_oauth_client(&self.client_secret_path, &self.redirect_url)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, AuthError> {
        if !self.token_path.exists() {
            return Ok(None);
        }
        let file_content = fs::read_to_string(&self.token_path)?;
        Ok(Some(serde_json::from_str(&file_content)?))
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        let token_json = serde_json::to_string_pretty(credential)?;
        fs::write(&self.token_path, token_json)?;
        Ok(())
    }

    fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or(AuthError::AuthorizationRequired)?;
        let new_token = self
            .oauth_client()?
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request(http_client)
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;
        Ok(Credential::from_token_response(&new_token, Some(refresh_token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::cell::RefCell;

    struct FakeStore {
        stored: RefCell<Option<Credential>>,
        refreshes: RefCell<usize>,
    }

    impl FakeStore {
        fn with(credential: Option<Credential>) -> Self {
            FakeStore { stored: RefCell::new(credential), refreshes: RefCell::new(0) }
        }
    }

    impl CredentialStore for FakeStore {
        fn load(&self) -> Result<Option<Credential>, AuthError> {
            Ok(self.stored.borrow().clone())
        }

        fn save(&self, credential: &Credential) -> Result<(), AuthError> {
            *self.stored.borrow_mut() = Some(credential.clone());
            Ok(())
        }

        fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
            *self.refreshes.borrow_mut() += 1;
            Ok(Credential {
                access_token: "fresh".to_string(),
                refresh_token: credential.refresh_token.clone(),
                expires_at: Some(Utc::now() + Duration::hours(1)),
            })
        }
    }

    fn expired(refresh_token: Option<&str>) -> Credential {
        Credential {
            access_token: "stale".to_string(),
            refresh_token: refresh_token.map(String::from),
            expires_at: Some(Utc::now() - Duration::minutes(5)),
        }
    }

    #[test]
    fn test_missing_token_requires_authorization() {
        let store = FakeStore::with(None);
        assert!(matches!(get_credentials(&store), Err(AuthError::AuthorizationRequired)));
    }

    #[test]
    fn test_valid_token_is_used_without_refresh() {
        let valid = Credential {
            access_token: "good".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
        };
        let store = FakeStore::with(Some(valid.clone()));
        assert_eq!(get_credentials(&store).unwrap(), valid);
        assert_eq!(*store.refreshes.borrow(), 0);
    }

    #[test]
    fn test_expired_token_is_refreshed_and_saved() {
        let store = FakeStore::with(Some(expired(Some("1//refresh"))));
        let credential = get_credentials(&store).unwrap();
        assert_eq!(credential.access_token, "fresh");
        assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(*store.refreshes.borrow(), 1);
        assert_eq!(store.stored.borrow().as_ref().unwrap().access_token, "fresh");
    }

    #[test]
    fn test_expired_token_without_refresh_token_requires_authorization() {
        let store = FakeStore::with(Some(expired(None)));
        assert!(matches!(get_credentials(&store), Err(AuthError::AuthorizationRequired)));
        assert_eq!(*store.refreshes.borrow(), 0);
    }

    #[test]
    fn test_file_store_round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("mail-agent-store-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let store = FileCredentialStore::new(
            dir.join("tokencache.json"),
            dir.join("client_secret.json"),
            "http://localhost:8080/oauth/callback".to_string(),
        );

        assert!(store.load().unwrap().is_none());
        let credential = Credential {
            access_token: "abc".to_string(),
            refresh_token: Some("def".to_string()),
            expires_at: None,
        };
        store.save(&credential).unwrap();
        assert_eq!(store.load().unwrap(), Some(credential));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_client_secret_file_is_parsed() {
        let dir = std::env::temp_dir().join(format!("mail-agent-secret-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("client_secret.json");
        fs::write(
            &path,
            r#"{"installed": {
                "client_id": "id.apps.googleusercontent.com",
                "client_secret": "shh",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost"]
            }}"#,
        )
        .unwrap();

        assert!(build_oauth_client(&path, "http://localhost:8080/oauth/callback").is_ok());
        assert!(matches!(
            build_oauth_client(&dir.join("missing.json"), "http://localhost:8080/oauth/callback"),
            Err(AuthError::InvalidClientSecret(_))
        ));

        fs::remove_dir_all(&dir).ok();
    }
}
