use actix_web::web;

pub mod app_state;
pub mod chat_routes;
pub mod oauth_routes;
pub mod session_routes;

/// Registers every API route. Static files are mounted separately by the binary.
pub fn configure(cfg: &mut web::ServiceConfig) {
    session_routes::init_routes(cfg);
    chat_routes::init_routes(cfg);
    oauth_routes::init_routes(cfg);
}
