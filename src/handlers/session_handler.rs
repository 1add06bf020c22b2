use actix_session::Session;
use actix_web::HttpResponse;
use log::{info, error};
use serde_json::json;
use crate::routes::app_state::AppState;

pub const SESSION_ID_KEY: &str = "session_id";

/// Returns the chat session for this browser, creating one when the cookie
/// holds no id or the id is unknown (e.g. after a server restart).
pub fn initialize_session(data: &AppState, session: &Session) -> serde_json::Value {
    if let Ok(Some(existing)) = session.get::<String>(SESSION_ID_KEY) {
        if data.session_manager.get(&existing).is_some() {
            info!("Resuming user session: {}", existing);
            return json!({ "initialized": true, "session_id": existing });
        }
    }

    let session_id = data.session_manager.create();
    if let Err(e) = session.insert(SESSION_ID_KEY, session_id.clone()) {
        error!("Failed to insert session_id into cookie: {:?}", e);
    } else {
        info!("Stored session_id {} in cookie", session_id);
    }
    info!("Initialized user session: {}", session_id);

    json!({ "initialized": true, "session_id": session_id })
}

/// Drops the chat session and its history.
pub fn end_session(data: &AppState, session: &Session) -> serde_json::Value {
    let ended = match session.get::<String>(SESSION_ID_KEY) {
        Ok(Some(session_id)) => {
            let removed = data.session_manager.remove(&session_id);
            info!("Ended user session {} (known: {})", session_id, removed);
            removed
        }
        _ => false,
    };
    session.purge();
    json!({ "ended": ended })
}

/// Session id from the cookie, falling back to one supplied by the client.
pub fn resolve_session_id(session: &Session, fallback: Option<&str>) -> Option<String> {
    match session.get::<String>(SESSION_ID_KEY) {
        Ok(Some(id)) => Some(id),
        _ => fallback.filter(|id| !id.is_empty()).map(String::from),
    }
}

pub fn session_not_found(session_id: &str) -> HttpResponse {
    error!("Session \"{}\" not found!", session_id);
    HttpResponse::NotFound().json(json!({"error": "Session not initialized"}))
}
