use base64::{engine::general_purpose::URL_SAFE, engine::general_purpose::STANDARD, Engine as _};
use log::{error, info};
use serde::Deserialize;

use crate::services::credential_store::{get_credentials, CredentialStore};

/// Dispatches a single email. Returns whether it went out and a detail
/// string (the provider message id, or what went wrong). Never panics or
/// errors; a caller that retries may send the mail twice.
pub trait MailSender {
    fn send(&self, to: &str, subject: &str, body: &str) -> (bool, String);
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

pub struct GmailSender<S: CredentialStore> {
    store: S,
    send_url: String,
}

impl<S: CredentialStore> GmailSender<S> {
    pub fn new(store: S, send_url: &str) -> Self {
        GmailSender {
            store,
            send_url: send_url.to_string(),
        }
    }

    fn try_send(&self, to: &str, subject: &str, body: &str) -> Result<String, String> {
        let credential = get_credentials(&self.store).map_err(|e| e.to_string())?;
        let raw = URL_SAFE.encode(build_mime_message(to, subject, body).as_bytes());

        let response = reqwest::blocking::Client::new()
            .post(&self.send_url)
            .bearer_auth(&credential.access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let text = response.text().map_err(|e| e.to_string())?;
        if !status.is_success() {
            return Err(format!("Gmail API returned {}: {}", status, text));
        }
        let sent: SentMessage = serde_json::from_str(&text).map_err(|e| e.to_string())?;
        Ok(sent.id)
    }
}

impl<S: CredentialStore> MailSender for GmailSender<S> {
    fn send(&self, to: &str, subject: &str, body: &str) -> (bool, String) {
        info!("Sending email to {}", to);
        match self.try_send(to, subject, body) {
            Ok(id) => {
                info!("Email sent, message id {}", id);
                (true, format!("Message Id: {}", id))
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", to, e);
                (false, e)
            }
        }
    }
}

/// Plain text RFC 822 message. Header values are flattened to one line so
/// model output cannot inject extra headers.
pub fn build_mime_message(to: &str, subject: &str, body: &str) -> String {
    format!(
        "To: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{}",
        header_value(to),
        encode_header(&header_value(subject)),
        body
    )
}

fn header_value(value: &str) -> String {
    value
        .split(|c: char| c == '\r' || c == '\n')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// RFC 2047 encoded-word for non-ASCII subjects.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::Credential;
    use crate::services::credential_store::AuthError;

    use std::io::{Read, Write};
    use std::net::TcpListener;

    struct TokenStore;

    impl CredentialStore for TokenStore {
        fn load(&self) -> Result<Option<Credential>, AuthError> {
            Ok(Some(Credential {
                access_token: "token".to_string(),
                refresh_token: None,
                expires_at: None,
            }))
        }
        fn save(&self, _credential: &Credential) -> Result<(), AuthError> {
            Ok(())
        }
        fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
            Ok(credential.clone())
        }
    }

    /// Serves one request, announcing a longer body than it writes before
    /// hanging up.
    fn truncated_body_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap_or(0);
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"id\":");
            let _ = stream.flush();
        });
        format!("http://{}/send", addr)
    }

    struct EmptyStore;

    impl CredentialStore for EmptyStore {
        fn load(&self) -> Result<Option<Credential>, AuthError> {
            Ok(None)
        }
        fn save(&self, _credential: &Credential) -> Result<(), AuthError> {
            Ok(())
        }
        fn refresh(&self, _credential: &Credential) -> Result<Credential, AuthError> {
            Err(AuthError::AuthorizationRequired)
        }
    }

    #[test]
    fn test_mime_message_layout() {
        let mime = build_mime_message("a@x.com", "Hi", "Hello\nthere");
        assert!(mime.starts_with("To: a@x.com\r\nSubject: Hi\r\n"));
        assert!(mime.contains("Content-Type: text/plain; charset=\"UTF-8\""));
        assert!(mime.ends_with("\r\n\r\nHello\nthere"));
    }

    #[test]
    fn test_header_injection_is_flattened() {
        let mime = build_mime_message("a@x.com\r\nBcc: evil@x.com", "Hi", "body");
        assert!(mime.starts_with("To: a@x.com Bcc: evil@x.com\r\n"));
        assert!(!mime.contains("\r\nBcc:"));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let mime = build_mime_message("a@x.com", "Grüße", "body");
        assert!(mime.contains("Subject: =?UTF-8?B?R3LDvMOfZQ==?="));
    }

    #[test]
    fn test_missing_credentials_reported_not_raised() {
        let sender = GmailSender::new(EmptyStore, "http://127.0.0.1:9/send");
        let (success, detail) = sender.send("a@x.com", "Hi", "Hello");
        assert!(!success);
        assert!(detail.contains("/oauth/login"), "unexpected detail: {}", detail);
    }

    #[test]
    fn test_body_read_error_is_reported() {
        let sender = GmailSender::new(TokenStore, &truncated_body_server());
        let (success, detail) = sender.send("a@x.com", "Hi", "Hello");
        assert!(!success);
        assert!(!detail.contains("EOF while parsing"), "unexpected detail: {}", detail);
    }
}
