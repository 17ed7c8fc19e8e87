use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use saucier_core::ids::{MessageId, SessionId};
use saucier_core::messages::NewMessage;
use saucier_core::notice::Notice;
use saucier_core::session::derive_title;
use saucier_core::transport::ResponseTransport;
use saucier_store::ChatStore;

/// Written when a producer completes without yielding anything; an assistant
/// message never settles empty.
pub const EMPTY_REPLY_APOLOGY: &str =
    "Sorry, I couldn't come up with an answer just now. Please try asking again.";

/// Written when both the stream and the single-shot fallback fail.
pub const NETWORK_FAILURE_APOLOGY: &str =
    "Sorry, I couldn't reach the assistant. Please check your connection and try again.";

/// Terminal state of one send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty input or a stale session reference; nothing changed.
    Skipped,
    /// The stream ran to completion.
    Completed,
    /// The stream failed but the single-shot fallback produced a reply.
    Recovered,
    /// Stream and fallback both failed; the apology was written.
    Failed,
    /// Cancelled, by `stop_generation` or a superseding send.
    Aborted,
}

struct ActiveStream {
    generation: u64,
    session_id: SessionId,
    message_id: MessageId,
    cancel: CancellationToken,
}

/// Releases the active slot and resets the generation flags when a stream
/// reaches any terminal state, including panics and cancellation races. Does
/// nothing when a newer stream has already taken the slot; the flags then
/// belong to that stream.
struct StreamGuard<'a> {
    controller: &'a StreamingController,
    generation: u64,
}

impl Drop for StreamGuard<'_> {
    fn drop(&mut self) {
        let owns = {
            let mut active = self.controller.active.lock();
            if active
                .as_ref()
                .is_some_and(|a| a.generation == self.generation)
            {
                *active = None;
                true
            } else {
                false
            }
        };
        if owns {
            self.controller.store.set_loading(false);
            self.controller.store.set_streaming(false);
        }
    }
}

/// Drives one response generation at a time. At most one stream is live
/// across the whole engine: a new send supersedes and cancels the previous
/// one regardless of which session it belonged to.
pub struct StreamingController {
    store: Arc<ChatStore>,
    transport: Arc<dyn ResponseTransport>,
    active: Mutex<Option<ActiveStream>>,
    generation: AtomicU64,
}

impl StreamingController {
    pub fn new(store: Arc<ChatStore>, transport: Arc<dyn ResponseTransport>) -> Self {
        Self {
            store,
            transport,
            active: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Append the user message and stream the assistant reply into a fresh
    /// placeholder. Whitespace-only input changes nothing.
    #[instrument(skip(self, content))]
    pub async fn send_message(&self, content: &str) -> SendOutcome {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return SendOutcome::Skipped;
        }

        let session_id = match self.store.current_session_id() {
            Some(id) => id,
            None => self.store.create_session(None),
        };

        let first_message = self.store.message_count(&session_id) == 0;
        if self
            .store
            .add_message(&session_id, NewMessage::user(trimmed))
            .is_none()
        {
            return SendOutcome::Skipped;
        }
        if first_message {
            self.store
                .rename_session(&session_id, &derive_title(trimmed));
        }

        let Some(placeholder) = self
            .store
            .add_message(&session_id, NewMessage::assistant_placeholder())
        else {
            return SendOutcome::Skipped;
        };

        self.stream_into(&session_id, &placeholder, trimmed).await
    }

    /// Run the generation pipeline against an existing assistant message.
    /// Shared by send (fresh placeholder) and regenerate (reused id).
    pub(crate) async fn stream_into(
        &self,
        session_id: &SessionId,
        message_id: &MessageId,
        content: &str,
    ) -> SendOutcome {
        self.store.set_loading(true);
        self.store.set_streaming(true);

        let (generation, cancel) = self.begin(session_id, message_id);
        let _guard = StreamGuard {
            controller: self,
            generation,
        };

        let outcome = self.pump(session_id, message_id, content, &cancel).await;
        debug!(session_id = %session_id, ?outcome, "generation settled");
        outcome
    }

    /// Install a new active handle, cancelling whichever stream held it.
    fn begin(&self, session_id: &SessionId, message_id: &MessageId) -> (u64, CancellationToken) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        let prior = self.active.lock().replace(ActiveStream {
            generation,
            session_id: session_id.clone(),
            message_id: message_id.clone(),
            cancel: cancel.clone(),
        });
        if let Some(prior) = prior {
            debug!(session_id = %prior.session_id, "superseding active generation");
            prior.cancel.cancel();
        }
        (generation, cancel)
    }

    async fn pump(
        &self,
        session_id: &SessionId,
        message_id: &MessageId,
        content: &str,
        cancel: &CancellationToken,
    ) -> SendOutcome {
        let produced = tokio::select! {
            _ = cancel.cancelled() => return SendOutcome::Aborted,
            produced = self.transport.produce(content, session_id) => produced,
        };

        let mut stream = match produced {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "transport refused the request");
                return self.fallback(session_id, message_id, content).await;
            }
        };

        let mut buffer = String::new();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return SendOutcome::Aborted,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    buffer.push_str(&chunk);
                    self.store
                        .update_message(session_id, message_id, buffer.clone());
                }
                Some(Err(e)) => {
                    warn!(error = %e, "response stream broke");
                    return self.fallback(session_id, message_id, content).await;
                }
                None => break,
            }
        }

        if buffer.is_empty() {
            self.store
                .update_message(session_id, message_id, EMPTY_REPLY_APOLOGY.to_string());
        }
        SendOutcome::Completed
    }

    /// Exactly one recovery attempt: a fresh invocation taken single-shot.
    async fn fallback(
        &self,
        session_id: &SessionId,
        message_id: &MessageId,
        content: &str,
    ) -> SendOutcome {
        let single = match self.transport.produce(content, session_id).await {
            Ok(mut stream) => match stream.next().await {
                Some(Ok(text)) if !text.is_empty() => Some(text),
                _ => None,
            },
            Err(e) => {
                warn!(error = %e, "single-shot fallback refused");
                None
            }
        };

        match single {
            Some(text) => {
                self.store.update_message(session_id, message_id, text);
                SendOutcome::Recovered
            }
            None => {
                self.store.update_message(
                    session_id,
                    message_id,
                    NETWORK_FAILURE_APOLOGY.to_string(),
                );
                self.store.notify(
                    Notice::error("Message failed")
                        .with_message("The assistant could not be reached."),
                );
                SendOutcome::Failed
            }
        }
    }

    /// Cancel the live stream, if any, and reset the generation flags.
    /// Cancellation is a normal terminal state, so the notice is
    /// informational.
    pub fn stop_generation(&self) {
        let prior = self.active.lock().take();
        self.store.set_loading(false);
        self.store.set_streaming(false);
        if let Some(prior) = prior {
            debug!(
                session_id = %prior.session_id,
                message_id = %prior.message_id,
                "generation stopped by user"
            );
            prior.cancel.cancel();
            self.store.notify(Notice::info("Generation stopped"));
        }
    }
}
