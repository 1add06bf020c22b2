pub mod chat_service;
pub mod credential_store;
pub mod gmail_service;
pub mod intent_service;
pub mod llm_service;
