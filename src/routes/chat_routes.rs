use actix_web::{get, post, web, Responder};
use actix_session::Session;
use crate::handlers::chat_handler::{ChatRequest, HistoryQuery};
use crate::routes::app_state::AppState;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(chat)
        .service(history);
}

#[post("/chat")]
async fn chat(
    data: web::Data<AppState>,
    session: Session,
    req_body: web::Json<ChatRequest>
) -> impl Responder {
    crate::handlers::chat_handler::handle_chat_request(data, session, req_body).await
}

#[get("/history")]
async fn history(
    data: web::Data<AppState>,
    session: Session,
    query: web::Query<HistoryQuery>
) -> impl Responder {
    crate::handlers::chat_handler::handle_history_request(data, session, query).await
}
