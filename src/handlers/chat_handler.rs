use actix_web::{web, HttpResponse};
use actix_session::Session;
use serde::Deserialize;
use serde_json::json;
use log::{info, warn, error};
use crate::global_session_manager::{lock_session, try_lock_session};
use crate::handlers::session_handler::{resolve_session_id, session_not_found};
use crate::models::user_session::TurnError;
use crate::routes::app_state::AppState;
use crate::services::chat_service;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn handle_chat_request(
    data: web::Data<AppState>,
    session: Session,
    req_body: web::Json<ChatRequest>
) -> HttpResponse {
    let request = req_body.into_inner();
    let session_id = match resolve_session_id(&session, request.session_id.as_deref()) {
        Some(id) => id,
        None => {
            warn!("No valid session_id found in cookie or request body");
            return HttpResponse::BadRequest().json(json!({"error": "Missing session_id"}));
        }
    };

    let shared = match data.session_manager.get(&session_id) {
        Some(shared) => shared,
        None => return session_not_found(&session_id),
    };

    info!("Processing message for session {}: {}", session_id, request.message);
    let llm = data.llm.clone();
    let mailer = data.mailer.clone();
    // A turn holds the session lock until its reply is appended; a message
    // arriving meanwhile is refused rather than queued.
    let result = web::block(move || {
        let mut user_session = match try_lock_session(&shared) {
            Some(guard) => guard,
            None => return Err(TurnError::ReplyPending),
        };
        chat_service::process_chat(&request.message, &mut user_session, llm.as_ref(), mailer.as_ref())
    })
    .await;

    match result {
        Ok(Ok(messages)) => HttpResponse::Ok().json(json!({"messages": messages})),
        Ok(Err(TurnError::EmptyMessage)) => HttpResponse::Ok().json(json!({"messages": []})),
        Ok(Err(e @ TurnError::ReplyPending)) => {
            warn!("Rejected message for session {}: {}", session_id, e);
            HttpResponse::Conflict().json(json!({"error": e.to_string()}))
        }
        Err(e) => {
            error!("Error processing chat for session {}: {:?}", session_id, e);
            HttpResponse::InternalServerError().json(json!({"error": "Chat processing failed"}))
        }
    }
}

/// Transcript for rendering. Reading it never answers anything.
pub async fn handle_history_request(
    data: web::Data<AppState>,
    session: Session,
    query: web::Query<HistoryQuery>
) -> HttpResponse {
    let session_id = match resolve_session_id(&session, query.session_id.as_deref()) {
        Some(id) => id,
        None => return HttpResponse::BadRequest().json(json!({"error": "Missing session_id"})),
    };

    let shared = match data.session_manager.get(&session_id) {
        Some(shared) => shared,
        None => return session_not_found(&session_id),
    };

    // A turn in progress holds the lock for the length of a model call.
    match web::block(move || lock_session(&shared).history().to_vec()).await {
        Ok(messages) => HttpResponse::Ok().json(json!({"messages": messages})),
        Err(e) => {
            error!("Error reading history for session {}: {:?}", session_id, e);
            HttpResponse::InternalServerError().json(json!({"error": "Could not read history"}))
        }
    }
}
