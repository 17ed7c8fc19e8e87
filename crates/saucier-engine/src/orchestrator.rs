use std::sync::Arc;

use tracing::{debug, warn};

use saucier_core::ids::{MessageId, RecipeId};
use saucier_core::messages::{FeedbackKind, Role};
use saucier_core::notice::Notice;
use saucier_core::recipes::RecipeRef;
use saucier_core::transport::ResponseTransport;
use saucier_store::ChatStore;

use crate::clipboard::ClipboardSurface;
use crate::streaming::{SendOutcome, StreamingController};

/// Public entry point of the engine: composes the store, the streaming
/// pipeline, and the host's clipboard surface.
pub struct ChatOrchestrator {
    store: Arc<ChatStore>,
    streaming: StreamingController,
    clipboard: Arc<dyn ClipboardSurface>,
}

impl ChatOrchestrator {
    pub fn new(
        store: Arc<ChatStore>,
        transport: Arc<dyn ResponseTransport>,
        clipboard: Arc<dyn ClipboardSurface>,
    ) -> Self {
        Self {
            streaming: StreamingController::new(store.clone(), transport),
            store,
            clipboard,
        }
    }

    pub fn store(&self) -> &Arc<ChatStore> {
        &self.store
    }

    pub async fn send_message(&self, content: &str) -> SendOutcome {
        self.streaming.send_message(content).await
    }

    pub fn stop_generation(&self) {
        self.streaming.stop_generation();
    }

    /// Re-run generation for an assistant message in the current session,
    /// writing into the same message id. The immediately preceding message
    /// must be the user prompt that produced it; anything else is a no-op.
    pub async fn regenerate_response(&self, message_id: &MessageId) -> SendOutcome {
        let Some(session) = self.store.current_session() else {
            return SendOutcome::Skipped;
        };
        let Some(index) = session.messages.iter().position(|m| &m.id == message_id) else {
            return SendOutcome::Skipped;
        };
        if session.messages[index].role != Role::Assistant {
            return SendOutcome::Skipped;
        }
        let Some(previous) = index.checked_sub(1).map(|i| &session.messages[i]) else {
            return SendOutcome::Skipped;
        };
        if previous.role != Role::User {
            return SendOutcome::Skipped;
        }

        let prompt = previous.content.clone();
        debug!(message_id = %message_id, "regenerating response");
        self.store
            .update_message(&session.id, message_id, String::new());
        self.streaming
            .stream_into(&session.id, message_id, &prompt)
            .await
    }

    /// Hand text to the host clipboard and report the outcome as a notice.
    pub async fn copy_message(&self, content: &str) {
        match self.clipboard.write_text(content).await {
            Ok(()) => {
                self.store.notify(Notice::success("Copied to clipboard"));
            }
            Err(e) => {
                warn!(error = %e, "clipboard write failed");
                self.store
                    .notify(Notice::error("Copy failed").with_message(e.to_string()));
            }
        }
    }

    /// Record thumbs feedback on a message in the current session.
    pub fn provide_feedback(&self, message_id: &MessageId, kind: FeedbackKind) {
        let Some(session_id) = self.store.current_session_id() else {
            return;
        };
        if self.store.record_feedback(&session_id, message_id, kind) {
            self.store.notify(Notice::success("Thanks for the feedback"));
        }
    }

    /// Flip a recipe in or out of favorites.
    pub fn toggle_favorite(&self, recipe: RecipeRef) {
        let name = recipe.name.clone();
        let now_favorite = self.store.toggle_favorite(recipe.id);
        let title = if now_favorite {
            "Added to favorites"
        } else {
            "Removed from favorites"
        };
        self.store.notify(Notice::success(title).with_message(name));
    }

    /// Record a star rating for a recipe.
    pub fn rate_recipe(&self, recipe_id: RecipeId, stars: u8) {
        self.store.rate_recipe(recipe_id, stars);
        self.store.notify(Notice::success("Rating submitted"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use saucier_core::messages::NewMessage;
    use saucier_core::mock::{ScriptedReply, ScriptedTransport};
    use saucier_core::notice::NoticeKind;

    use crate::clipboard::{ClipboardError, NullClipboard};

    fn orchestrator(
        replies: Vec<ScriptedReply>,
    ) -> (Arc<ChatStore>, ChatOrchestrator, Arc<ScriptedTransport>) {
        let store = Arc::new(ChatStore::new());
        let transport = Arc::new(ScriptedTransport::new(replies));
        let orchestrator = ChatOrchestrator::new(
            store.clone(),
            transport.clone() as Arc<dyn ResponseTransport>,
            Arc::new(NullClipboard),
        );
        (store, orchestrator, transport)
    }

    #[tokio::test]
    async fn regenerate_rewrites_same_message() {
        let (store, orchestrator, transport) = orchestrator(vec![
            ScriptedReply::text("first answer"),
            ScriptedReply::Chunks(vec!["better answer".into()]),
        ]);

        orchestrator.send_message("best pan for eggs?").await;
        let session = store.current_session().unwrap();
        let target = session.messages[1].id.clone();

        let outcome = orchestrator.regenerate_response(&target).await;
        assert_eq!(outcome, SendOutcome::Completed);
        assert_eq!(transport.call_count(), 2);

        let session = store.current_session().unwrap();
        assert_eq!(session.messages.len(), 2, "no new placeholder");
        assert_eq!(session.messages[1].id, target);
        assert_eq!(session.messages[1].content, "better answer");
    }

    #[tokio::test]
    async fn regenerate_unknown_message_is_noop() {
        let (_, orchestrator, transport) =
            orchestrator(vec![ScriptedReply::text("only answer")]);

        orchestrator.send_message("hi").await;
        let outcome = orchestrator
            .regenerate_response(&MessageId::from_raw("msg_missing"))
            .await;
        assert_eq!(outcome, SendOutcome::Skipped);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn regenerate_user_message_is_noop() {
        let (store, orchestrator, transport) =
            orchestrator(vec![ScriptedReply::text("answer")]);

        orchestrator.send_message("hi").await;
        let user_id = store.current_session().unwrap().messages[0].id.clone();

        let outcome = orchestrator.regenerate_response(&user_id).await;
        assert_eq!(outcome, SendOutcome::Skipped);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn regenerate_without_preceding_user_is_noop() {
        let (store, orchestrator, transport) = orchestrator(vec![]);

        // A session whose first message is an assistant greeting.
        let sid = store.create_session(None);
        let greeting = store
            .add_message(
                &sid,
                NewMessage {
                    role: Role::Assistant,
                    content: "What are we cooking today?".into(),
                    metadata: None,
                },
            )
            .unwrap();

        let outcome = orchestrator.regenerate_response(&greeting).await;
        assert_eq!(outcome, SendOutcome::Skipped);
        assert_eq!(transport.call_count(), 0);
        assert_eq!(
            store.session(&sid).unwrap().messages[0].content,
            "What are we cooking today?"
        );
    }

    #[tokio::test]
    async fn copy_message_reports_success() {
        let (store, orchestrator, _) = orchestrator(vec![]);
        let mut notices = store.subscribe_notices();

        orchestrator.copy_message("325g flour, 7g yeast").await;

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(notice.title, "Copied to clipboard");
    }

    struct BrokenClipboard;

    #[async_trait]
    impl ClipboardSurface for BrokenClipboard {
        async fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError("permission denied".into()))
        }
    }

    #[tokio::test]
    async fn copy_message_reports_failure() {
        let store = Arc::new(ChatStore::new());
        let orchestrator = ChatOrchestrator::new(
            store.clone(),
            Arc::new(ScriptedTransport::new(vec![])),
            Arc::new(BrokenClipboard),
        );
        let mut notices = store.subscribe_notices();

        orchestrator.copy_message("text").await;

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.message.unwrap().contains("permission denied"));
    }

    #[tokio::test]
    async fn feedback_recorded_with_notice() {
        let (store, orchestrator, _) = orchestrator(vec![ScriptedReply::text("answer")]);

        orchestrator.send_message("hi").await;
        let target = store.current_session().unwrap().messages[1].id.clone();
        let mut notices = store.subscribe_notices();

        orchestrator.provide_feedback(&target, FeedbackKind::ThumbsUp);

        assert_eq!(
            store.current_session().unwrap().messages[1].feedback,
            Some(FeedbackKind::ThumbsUp)
        );
        assert_eq!(notices.try_recv().unwrap().kind, NoticeKind::Success);
    }

    #[tokio::test]
    async fn feedback_on_unknown_message_is_silent() {
        let (store, orchestrator, _) = orchestrator(vec![ScriptedReply::text("answer")]);
        orchestrator.send_message("hi").await;
        let mut notices = store.subscribe_notices();

        orchestrator.provide_feedback(&MessageId::from_raw("msg_missing"), FeedbackKind::ThumbsDown);

        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn favorite_toggle_emits_both_directions() {
        let (store, orchestrator, _) = orchestrator(vec![]);
        let mut notices = store.subscribe_notices();
        let recipe = RecipeRef::new(RecipeId::new(), "Shakshuka");

        orchestrator.toggle_favorite(recipe.clone());
        assert_eq!(notices.try_recv().unwrap().title, "Added to favorites");
        assert_eq!(store.favorites().len(), 1);

        orchestrator.toggle_favorite(recipe);
        assert_eq!(notices.try_recv().unwrap().title, "Removed from favorites");
        assert!(store.favorites().is_empty());
    }

    #[tokio::test]
    async fn rating_emits_notice() {
        let (store, orchestrator, _) = orchestrator(vec![]);
        let mut notices = store.subscribe_notices();

        orchestrator.rate_recipe(RecipeId::new(), 4);

        assert_eq!(notices.try_recv().unwrap().title, "Rating submitted");
        assert_eq!(store.ratings()[0].stars, 4);
    }
}
