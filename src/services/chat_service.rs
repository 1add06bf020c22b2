use log::{debug, info, warn};

use crate::models::message::Message;
use crate::models::user_session::{ConversationState, TurnError, UserSession};
use crate::services::gmail_service::MailSender;
use crate::services::intent_service;
use crate::services::llm_service::ChatCompletion;

/// Answers the pending user turn, if there is one.
///
/// The model reply is appended first. When it announces that an email is
/// going out, the extraction call and send follow and their outcome is
/// appended as a second assistant message. Returns the messages appended by
/// this call; empty when the session was already idle, so calling it again
/// (e.g. on a page reload) never produces a second reply.
pub fn process_pending<C, M>(session: &mut UserSession, llm: &C, mailer: &M) -> Vec<Message>
where
    C: ChatCompletion + ?Sized,
    M: MailSender + ?Sized,
{
    if session.state() != ConversationState::AwaitingReply {
        debug!("No pending user message, nothing to do");
        return Vec::new();
    }

    let request = intent_service::reply_request(session.history());
    let reply = llm.complete(&request);
    let wants_email = intent_service::contains_trigger(&reply);

    let mut appended = vec![session.push_assistant(reply)];

    if wants_email {
        info!("Assistant is ready to send an email, extracting fields");
        let outcome = intent_service::run_email_flow(&request, llm, mailer);
        appended.push(session.push_assistant(outcome));
    }

    appended
}

/// Appends `user_input` and answers it in one go.
///
/// A user turn left unanswered by an earlier failed call is answered first,
/// so its reply precedes the new message in both the history and the
/// returned messages.
pub fn process_chat<C, M>(
    user_input: &str,
    session: &mut UserSession,
    llm: &C,
    mailer: &M,
) -> Result<Vec<Message>, TurnError>
where
    C: ChatCompletion + ?Sized,
    M: MailSender + ?Sized,
{
    if user_input.trim().is_empty() {
        return Err(TurnError::EmptyMessage);
    }

    let mut appended = Vec::new();
    if session.state() == ConversationState::AwaitingReply {
        warn!("Previous user message was never answered, answering it first");
        appended = process_pending(session, llm, mailer);
    }

    session.push_user(user_input)?;
    appended.extend(process_pending(session, llm, mailer));
    Ok(appended)
}
