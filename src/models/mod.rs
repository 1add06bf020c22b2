pub mod credential;
pub mod mail_intent;
pub mod message;
pub mod user_session;
