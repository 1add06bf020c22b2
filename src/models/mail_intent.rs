use serde::Deserialize;

/// Mail fields pulled out of a conversation by the extraction call.
/// Lives for a single send attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MailIntent {
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// A mail intent with every field filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailIntent {
    /// Returns the mail only when recipient, subject and body are all
    /// present and non-blank.
    pub fn into_outgoing(self) -> Option<OutgoingMail> {
        Some(OutgoingMail {
            to: filled(self.recipient)?,
            subject: filled(self.subject)?,
            body: filled(self.body)?,
        })
    }
}

fn filled(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}
