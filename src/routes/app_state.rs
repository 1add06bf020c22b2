use std::sync::Arc;

use crate::config::AppConfig;
use crate::global_session_manager::GlobalSessionManager;
use crate::services::credential_store::FileCredentialStore;
use crate::services::gmail_service::{GmailSender, MailSender};
use crate::services::llm_service::{ChatCompletion, OllamaClient};

pub type SharedCompletion = Arc<dyn ChatCompletion + Send + Sync>;
pub type SharedMailer = Arc<dyn MailSender + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub llm: SharedCompletion,
    pub mailer: SharedMailer,
    pub credential_store: FileCredentialStore,
    pub session_manager: GlobalSessionManager,
}

impl AppState {
    /// Ollama for completions and Gmail, authorised through the file-backed
    /// token cache, for sending.
    pub fn new(config: AppConfig) -> Self {
        let store = credential_store_for(&config);
        let llm: SharedCompletion = Arc::new(OllamaClient::new(&config.ollama_url, &config.model));
        let mailer: SharedMailer = Arc::new(GmailSender::new(store, &config.gmail_send_url));
        AppState::with_services(config, llm, mailer)
    }

    pub fn with_services(config: AppConfig, llm: SharedCompletion, mailer: SharedMailer) -> Self {
        AppState {
            credential_store: credential_store_for(&config),
            llm,
            mailer,
            session_manager: GlobalSessionManager::new(),
            config,
        }
    }

    pub fn credential_store(&self) -> &FileCredentialStore {
        &self.credential_store
    }
}

fn credential_store_for(config: &AppConfig) -> FileCredentialStore {
    FileCredentialStore::new(
        config.token_cache_path.clone(),
        config.client_secret_path.clone(),
        config.oauth_redirect_url(),
    )
}
