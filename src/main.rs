use actix_files::Files;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{cookie::Key, middleware::Logger, web, App, HttpServer};
use anyhow::Context;

use ollama_mail_agent::config::{self, AppConfig};
use ollama_mail_agent::routes::{self, app_state::AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    config::init_logging();
    let config = AppConfig::load()?;

    log::info!("Using model {} at {}", config.model, config.ollama_url);
    if !config.client_secret_path.exists() {
        log::warn!(
            "No Gmail client secret at {}; sending email will fail until it is added",
            config.client_secret_path.display()
        );
    }

    let data = web::Data::new(AppState::new(config.clone()));
    // Per-process key: cookies die with the in-memory sessions.
    let secret_key = Key::generate();
    let static_dir = config.static_dir.clone();

    log::info!("Starting server on http://{}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            // Use the Logger middleware to log incoming requests.
            .wrap(Logger::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_secure(false)
                    .build(),
            )
            .app_data(data.clone())
            .configure(routes::configure)
            // Serve the chat page (index.html) from the static directory.
            .service(Files::new("/", static_dir.clone()).index_file("index.html"))
    })
    .bind((config.host.clone(), config.port))
    .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?
    .run()
    .await
    .context("Server stopped with an error")
}
