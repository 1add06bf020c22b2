use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use crate::models::mail_intent::MailIntent;
use crate::models::message::Message;
use crate::services::gmail_service::MailSender;
use crate::services::llm_service::ChatCompletion;

/// What the model is told to say once it has everything needed for an email.
pub const TRIGGER_PHRASE: &str = "Sending email now...";

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant. \
Behave like a normal chatbot and answer questions or chat naturally. \
Only offer to send an email if the user explicitly asks to inform, email, or contact someone, \
or if the context strongly suggests an email is needed (e.g., 'Can you let Alice know about the meeting?', \
or 'How am I going to tell ... about ...?'). \
If the user wants to send an email, work out the recipient, subject, and body. \
If any information is missing (especially the recipient email address), ask the user for it conversationally, \
and do NOT say 'Sending email now...' until you have all three: recipient, subject, and body. \
Pick a fitting subject yourself rather than asking for one, and keep questions to the necessary ones. \
When you have all the info, say 'Sending email now...' and stop. \
The backend will then send the email and tell the user how it went. \
If the user is not asking to send an email, never mention your email capabilities.";

pub const EXTRACTION_PROMPT: &str = "From the previous conversation, extract the recipient email, subject, and body for the email. \
Reply with ONLY a valid JSON object with keys: recipient, subject, body. Do not include any explanation or extra text. \
If any are missing, use null.";

pub const MISSING_FIELDS_MESSAGE: &str =
    "❌ Could not extract all email fields. Please clarify recipient, subject, and body.";

lazy_static! {
    // Greedy on purpose: first '{' to last '}', across newlines.
    static ref JSON_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").expect("valid JSON span pattern");
}

/// The reply-phase request: system prompt followed by the whole transcript.
pub fn reply_request(history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(SYSTEM_PROMPT));
    messages.extend_from_slice(history);
    messages
}

/// The extraction-phase request: the reply request plus the extraction
/// instruction as a final user turn.
pub fn extraction_request(reply_request: &[Message]) -> Vec<Message> {
    let mut messages = reply_request.to_vec();
    messages.push(Message::user(EXTRACTION_PROMPT));
    messages
}

/// Case-insensitive substring check for the trigger phrase. The trailing
/// ellipsis is not required.
pub fn contains_trigger(reply: &str) -> bool {
    let marker = TRIGGER_PHRASE.trim_end_matches('.').to_lowercase();
    reply.to_lowercase().contains(&marker)
}

/// Parses the extraction reply: the `{...}` span if there is one,
/// otherwise the whole reply.
pub fn parse_mail_intent(raw: &str) -> Result<MailIntent, serde_json::Error> {
    match JSON_OBJECT.find(raw) {
        Some(span) => serde_json::from_str(span.as_str()),
        None => serde_json::from_str(raw),
    }
}

/// Runs the extraction call and, if every field came back, the send.
/// Returns the assistant message describing the outcome.
pub fn run_email_flow<C, M>(reply_request: &[Message], llm: &C, mailer: &M) -> String
where
    C: ChatCompletion + ?Sized,
    M: MailSender + ?Sized,
{
    let raw = llm.complete(&extraction_request(reply_request));
    debug!("Extraction reply: {}", raw);

    let intent = match parse_mail_intent(&raw) {
        Ok(intent) => intent,
        Err(e) => {
            warn!("Could not parse extraction reply: {}", e);
            return format!("❌ Error extracting email info: {}\nRaw response: {}", e, raw);
        }
    };

    let mail = match intent.into_outgoing() {
        Some(mail) => mail,
        None => {
            info!("Extraction reply is missing mail fields");
            return MISSING_FIELDS_MESSAGE.to_string();
        }
    };

    let (success, detail) = mailer.send(&mail.to, &mail.subject, &mail.body);
    if success {
        format!("✅ Email sent to {}!", mail.to)
    } else {
        format!("❌ Failed to send email: {}", detail)
    }
}
