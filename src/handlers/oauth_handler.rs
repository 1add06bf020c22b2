use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use oauth2::reqwest::async_http_client;
use oauth2::{AuthorizationCode, CsrfToken, Scope};
use serde::Deserialize;
use serde_json::json;
use log::{info, warn, error};

use crate::config::GMAIL_SEND_SCOPE;
use crate::models::credential::Credential;
use crate::routes::app_state::AppState;
use crate::services::credential_store::{get_credentials, CredentialStore};

const OAUTH_STATE_KEY: &str = "oauth_state";

#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Initiates the OAuth flow by generating the authorization URL and redirecting.
pub async fn oauth_login(data: web::Data<AppState>, session: Session) -> HttpResponse {
    let oauth_client = match data.credential_store().oauth_client() {
        Ok(client) => client,
        Err(e) => {
            error!("Cannot start OAuth flow: {}", e);
            return HttpResponse::InternalServerError().json(json!({"error": e.to_string()}));
        }
    };

    // Offline access plus forced consent so Google hands out a refresh token.
    let (auth_url, csrf_token) = oauth_client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new(GMAIL_SEND_SCOPE.to_string()))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .url();

    if let Err(e) = session.insert(OAUTH_STATE_KEY, csrf_token.secret().clone()) {
        error!("Failed to store OAuth state in cookie: {:?}", e);
        return HttpResponse::InternalServerError().json(json!({"error": "Could not store OAuth state"}));
    }

    HttpResponse::Found()
        .append_header(("Location", auth_url.to_string()))
        .finish()
}

/// Handles the OAuth callback from Google.
///
/// Checks the CSRF state, exchanges the code for a token, writes it to the
/// token cache and redirects back to the chat page.
pub async fn oauth_callback(
    data: web::Data<AppState>,
    session: Session,
    query: web::Query<OAuthCallback>
) -> HttpResponse {
    let query = query.into_inner();
    if let Some(err) = query.error {
        warn!("Authorization was declined: {}", err);
        return HttpResponse::BadRequest().body(format!("Authorization failed: {}", err));
    }

    let expected_state = session.get::<String>(OAUTH_STATE_KEY).ok().flatten();
    session.remove(OAUTH_STATE_KEY);
    if expected_state.is_none() || expected_state != query.state {
        warn!("OAuth callback state mismatch");
        return HttpResponse::BadRequest().body("Invalid OAuth state");
    }

    let code = match query.code {
        Some(code) => code,
        None => return HttpResponse::BadRequest().body("Missing code"),
    };

    let store = data.credential_store();
    let oauth_client = match store.oauth_client() {
        Ok(client) => client,
        Err(e) => {
            error!("Cannot finish OAuth flow: {}", e);
            return HttpResponse::InternalServerError().body(e.to_string());
        }
    };

    let token_result = oauth_client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(async_http_client)
        .await;

    match token_result {
        Ok(token) => {
            let credential = Credential::from_token_response(&token, None);
            if let Err(e) = store.save(&credential) {
                error!("Unable to write token cache: {}", e);
                return HttpResponse::InternalServerError().body(e.to_string());
            }
            info!("Token successfully obtained and cached.");
            HttpResponse::Found().append_header(("Location", "/")).finish()
        }
        Err(err) => {
            error!("Token exchange error: {:?}", err);
            HttpResponse::InternalServerError().body(format!("Token exchange error: {}", err))
        }
    }
}

/// Reports whether a usable Gmail credential exists, refreshing an expired
/// one on the way.
pub async fn check_auth(data: web::Data<AppState>) -> impl Responder {
    info!("checking the auth token");
    let store = data.credential_store().clone();

    match web::block(move || get_credentials(&store)).await {
        Ok(Ok(_)) => HttpResponse::Ok().json(json!({ "authenticated": true })),
        Ok(Err(e)) => {
            info!("Not authenticated: {}", e);
            HttpResponse::Ok().json(json!({ "authenticated": false, "error": e.to_string() }))
        }
        Err(e) => {
            error!("Auth check failed: {:?}", e);
            HttpResponse::Ok().json(json!({ "authenticated": false, "error": e.to_string() }))
        }
    }
}
