use actix_web::{get, web, HttpResponse, Responder};
use actix_session::Session;
use crate::routes::app_state::AppState;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(init_session)
        .service(end_session);
}

#[get("/init_session")]
async fn init_session(data: web::Data<AppState>, session: Session) -> impl Responder {
    HttpResponse::Ok().json(crate::handlers::session_handler::initialize_session(&data, &session))
}

#[get("/end_session")]
async fn end_session(data: web::Data<AppState>, session: Session) -> impl Responder {
    HttpResponse::Ok().json(crate::handlers::session_handler::end_session(&data, &session))
}
