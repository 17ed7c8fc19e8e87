use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use saucier_core::ids::{MessageId, NoticeId, RecipeId, SessionId};
use saucier_core::messages::{FeedbackKind, Message, NewMessage};
use saucier_core::notice::Notice;
use saucier_core::recipes::{Preferences, RecipeRating, RecipeRef, Theme, RECENTLY_VIEWED_CAP};
use saucier_core::session::{Session, DEFAULT_TITLE};

use crate::snapshot::PersistedState;
use crate::state::ChatState;

const NOTICE_CHANNEL_CAPACITY: usize = 64;

/// The single source of truth for conversation state.
///
/// Every mutation runs to completion under one lock acquisition, so no
/// caller ever observes a partial update. Each mutation bumps a revision
/// watch channel; the persistence layer subscribes to that channel rather
/// than being called inline.
pub struct ChatStore {
    state: Mutex<ChatState>,
    revision: watch::Sender<u64>,
    notice_tx: broadcast::Sender<Notice>,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(ChatState::default()),
            revision,
            notice_tx,
        }
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut ChatState) -> T) -> T {
        let out = {
            let mut state = self.state.lock();
            f(&mut state)
        };
        self.revision.send_modify(|rev| *rev += 1);
        out
    }

    fn read<T>(&self, f: impl FnOnce(&ChatState) -> T) -> T {
        f(&self.state.lock())
    }

    /// Watch channel bumped on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    // --- Sessions ---

    /// Create a session at the head of the list and make it current.
    pub fn create_session(&self, title_hint: Option<&str>) -> SessionId {
        self.mutate(|state| {
            let session = Session::new(title_hint.unwrap_or(DEFAULT_TITLE));
            let id = session.id.clone();
            state.sessions.insert(0, session);
            state.current = Some(id.clone());
            debug!(session_id = %id, "session created");
            id
        })
    }

    /// Select a session; an unknown id clears the selection.
    pub fn switch_session(&self, id: &SessionId) {
        self.mutate(|state| {
            state.current = state.session(id).map(|s| s.id.clone());
        });
    }

    /// Remove a session. If it was current, the head of the remaining list
    /// (or nothing) becomes current.
    pub fn delete_session(&self, id: &SessionId) {
        self.mutate(|state| {
            state.sessions.retain(|s| &s.id != id);
            if state.current.as_ref() == Some(id) {
                state.current = state.sessions.first().map(|s| s.id.clone());
            }
        });
    }

    pub fn rename_session(&self, id: &SessionId, title: &str) {
        self.mutate(|state| {
            if let Some(session) = state.session_mut(id) {
                session.title = title.to_string();
                session.updated_at = Utc::now();
            }
        });
    }

    // --- Messages ---

    /// Append a message, returning its freshly generated id, or `None` when
    /// the session does not exist.
    pub fn add_message(&self, session_id: &SessionId, new: NewMessage) -> Option<MessageId> {
        self.mutate(|state| {
            let session = state.session_mut(session_id)?;
            let message = Message::new(new.role, new.content, new.metadata);
            let id = message.id.clone();
            session.messages.push(message);
            session.updated_at = Utc::now();
            Some(id)
        })
    }

    /// Replace a message's content wholesale. Unknown ids are a silent no-op;
    /// they are reachable only through stale references.
    pub fn update_message(&self, session_id: &SessionId, message_id: &MessageId, content: String) {
        self.mutate(|state| {
            let Some(session) = state.session_mut(session_id) else {
                return;
            };
            if let Some(message) = session.messages.iter_mut().find(|m| &m.id == message_id) {
                message.content = content;
                session.updated_at = Utc::now();
            }
        });
    }

    /// Record thumbs feedback on a message. Returns whether anything changed.
    pub fn record_feedback(
        &self,
        session_id: &SessionId,
        message_id: &MessageId,
        kind: FeedbackKind,
    ) -> bool {
        self.mutate(|state| {
            let Some(session) = state.session_mut(session_id) else {
                return false;
            };
            match session.messages.iter_mut().find(|m| &m.id == message_id) {
                Some(message) => {
                    message.feedback = Some(kind);
                    session.updated_at = Utc::now();
                    true
                }
                None => false,
            }
        })
    }

    pub fn message_count(&self, session_id: &SessionId) -> usize {
        self.read(|state| state.session(session_id).map_or(0, |s| s.messages.len()))
    }

    // --- Generation flags ---

    pub fn set_loading(&self, loading: bool) {
        self.mutate(|state| state.loading = loading);
    }

    pub fn set_streaming(&self, streaming: bool) {
        self.mutate(|state| state.streaming = streaming);
    }

    pub fn is_loading(&self) -> bool {
        self.read(|state| state.loading)
    }

    pub fn is_streaming(&self) -> bool {
        self.read(|state| state.streaming)
    }

    // --- Recipe-domain state ---

    /// Toggle a favorite; returns true when the recipe is now favorited.
    pub fn toggle_favorite(&self, recipe_id: RecipeId) -> bool {
        self.mutate(|state| {
            if let Some(pos) = state.favorites.iter().position(|id| id == &recipe_id) {
                state.favorites.remove(pos);
                false
            } else {
                state.favorites.push(recipe_id);
                true
            }
        })
    }

    /// Record a rating, replacing any earlier rating of the same recipe.
    pub fn rate_recipe(&self, recipe_id: RecipeId, stars: u8) {
        self.mutate(|state| {
            state.ratings.retain(|r| r.recipe_id != recipe_id);
            state.ratings.push(RecipeRating::new(recipe_id, stars));
        });
    }

    /// Push onto the recently-viewed list: de-duplicated by id, newest
    /// first, bounded.
    pub fn push_recently_viewed(&self, recipe: RecipeRef) {
        self.mutate(|state| {
            state.recently_viewed.retain(|r| r.id != recipe.id);
            state.recently_viewed.insert(0, recipe);
            state.recently_viewed.truncate(RECENTLY_VIEWED_CAP);
        });
    }

    pub fn set_theme(&self, theme: Theme) {
        self.mutate(|state| state.theme = theme);
    }

    pub fn set_preferences(&self, preferences: Preferences) {
        self.mutate(|state| state.preferences = preferences);
    }

    // --- Notices ---

    /// Record a notice and broadcast it to the presentation layer.
    pub fn notify(&self, notice: Notice) -> NoticeId {
        let id = notice.id.clone();
        self.mutate(|state| state.notices.push(notice.clone()));
        // Absent receivers just means nothing is presenting right now.
        let _ = self.notice_tx.send(notice);
        id
    }

    pub fn dismiss_notice(&self, id: &NoticeId) {
        self.mutate(|state| state.notices.retain(|n| &n.id != id));
    }

    // --- Reads (cloned snapshots, never references into the tree) ---

    pub fn sessions(&self) -> Vec<Session> {
        self.read(|state| state.sessions.clone())
    }

    pub fn session(&self, id: &SessionId) -> Option<Session> {
        self.read(|state| state.session(id).cloned())
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.read(|state| state.current.clone())
    }

    pub fn current_session(&self) -> Option<Session> {
        self.read(|state| {
            state
                .current
                .as_ref()
                .and_then(|id| state.session(id))
                .cloned()
        })
    }

    pub fn favorites(&self) -> Vec<RecipeId> {
        self.read(|state| state.favorites.clone())
    }

    pub fn ratings(&self) -> Vec<RecipeRating> {
        self.read(|state| state.ratings.clone())
    }

    pub fn recently_viewed(&self) -> Vec<RecipeRef> {
        self.read(|state| state.recently_viewed.clone())
    }

    pub fn theme(&self) -> Theme {
        self.read(|state| state.theme)
    }

    pub fn preferences(&self) -> Preferences {
        self.read(|state| state.preferences.clone())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.read(|state| state.notices.clone())
    }

    // --- Persistence projection ---

    /// Project the curated durable subset of the tree.
    pub fn snapshot(&self) -> PersistedState {
        self.read(|state| PersistedState::project(state))
    }

    /// Replace the durable subset from a rehydrated snapshot. Transient
    /// state (notices, generation flags) always resets.
    pub fn hydrate(&self, persisted: PersistedState) {
        self.mutate(|state| persisted.apply(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saucier_core::messages::Role;

    #[test]
    fn create_inserts_at_head_and_selects() {
        let store = ChatStore::new();
        let first = store.create_session(None);
        let second = store.create_session(Some("Weeknight pasta"));

        let sessions = store.sessions();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, second);
        assert_eq!(sessions[1].id, first);
        assert_eq!(sessions[0].title, "Weeknight pasta");
        assert_eq!(sessions[1].title, DEFAULT_TITLE);
        assert_eq!(store.current_session_id(), Some(second));
    }

    #[test]
    fn creation_order_is_reversed_in_list() {
        let store = ChatStore::new();
        let ids: Vec<SessionId> = (0..5).map(|_| store.create_session(None)).collect();
        let listed: Vec<SessionId> = store.sessions().into_iter().map(|s| s.id).collect();
        let mut expected = ids.clone();
        expected.reverse();
        assert_eq!(listed, expected);
        assert_eq!(store.current_session_id(), Some(ids[4].clone()));
    }

    #[test]
    fn switch_to_unknown_clears_selection() {
        let store = ChatStore::new();
        store.create_session(None);
        store.switch_session(&SessionId::from_raw("sess_missing"));
        assert!(store.current_session_id().is_none());
        assert!(store.current_session().is_none());
    }

    #[test]
    fn switch_selects_existing() {
        let store = ChatStore::new();
        let first = store.create_session(None);
        store.create_session(None);
        store.switch_session(&first);
        assert_eq!(store.current_session_id(), Some(first));
    }

    #[test]
    fn delete_current_falls_back_to_head() {
        let store = ChatStore::new();
        let first = store.create_session(None);
        let second = store.create_session(None);

        store.delete_session(&second);
        assert_eq!(store.current_session_id(), Some(first.clone()));

        store.delete_session(&first);
        assert!(store.current_session_id().is_none());
        assert!(store.sessions().is_empty());
    }

    #[test]
    fn delete_non_current_keeps_selection() {
        let store = ChatStore::new();
        let first = store.create_session(None);
        let second = store.create_session(None);
        store.delete_session(&first);
        assert_eq!(store.current_session_id(), Some(second));
    }

    #[test]
    fn rename_bumps_updated_at() {
        let store = ChatStore::new();
        let id = store.create_session(None);
        let before = store.session(&id).unwrap().updated_at;
        store.rename_session(&id, "Sunday roast");
        let session = store.session(&id).unwrap();
        assert_eq!(session.title, "Sunday roast");
        assert!(session.updated_at >= before);
    }

    #[test]
    fn rename_unknown_is_noop() {
        let store = ChatStore::new();
        store.create_session(None);
        store.rename_session(&SessionId::from_raw("sess_missing"), "x");
        assert_eq!(store.sessions()[0].title, DEFAULT_TITLE);
    }

    #[test]
    fn add_message_returns_usable_id() {
        let store = ChatStore::new();
        let sid = store.create_session(None);
        let mid = store
            .add_message(&sid, NewMessage::user("what goes in a mirepoix?"))
            .unwrap();

        store.update_message(&sid, &mid, "edited".into());
        let session = store.session(&sid).unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, "edited");
        assert_eq!(session.messages[0].role, Role::User);
    }

    #[test]
    fn add_message_to_unknown_session_fails() {
        let store = ChatStore::new();
        let result = store.add_message(
            &SessionId::from_raw("sess_missing"),
            NewMessage::user("hello"),
        );
        assert!(result.is_none());
    }

    #[test]
    fn update_message_replaces_not_appends() {
        let store = ChatStore::new();
        let sid = store.create_session(None);
        let mid = store
            .add_message(&sid, NewMessage::assistant_placeholder())
            .unwrap();

        store.update_message(&sid, &mid, "first".into());
        store.update_message(&sid, &mid, "second".into());
        assert_eq!(store.session(&sid).unwrap().messages[0].content, "second");
    }

    #[test]
    fn update_unknown_message_is_noop() {
        let store = ChatStore::new();
        let sid = store.create_session(None);
        store.update_message(&sid, &MessageId::from_raw("msg_missing"), "x".into());
        assert!(store.session(&sid).unwrap().messages.is_empty());
    }

    #[test]
    fn feedback_recorded_only_for_existing() {
        let store = ChatStore::new();
        let sid = store.create_session(None);
        let mid = store
            .add_message(&sid, NewMessage::assistant_placeholder())
            .unwrap();

        assert!(store.record_feedback(&sid, &mid, FeedbackKind::ThumbsUp));
        assert!(!store.record_feedback(
            &sid,
            &MessageId::from_raw("msg_missing"),
            FeedbackKind::ThumbsDown
        ));
        assert_eq!(
            store.session(&sid).unwrap().messages[0].feedback,
            Some(FeedbackKind::ThumbsUp)
        );
    }

    #[test]
    fn flags_are_independent() {
        let store = ChatStore::new();
        store.set_loading(true);
        assert!(store.is_loading());
        assert!(!store.is_streaming());
        store.set_streaming(true);
        store.set_loading(false);
        assert!(store.is_streaming());
        assert!(!store.is_loading());
    }

    #[test]
    fn toggle_favorite_roundtrip() {
        let store = ChatStore::new();
        let id = RecipeId::new();
        assert!(store.toggle_favorite(id.clone()));
        assert_eq!(store.favorites(), vec![id.clone()]);
        assert!(!store.toggle_favorite(id));
        assert!(store.favorites().is_empty());
    }

    #[test]
    fn rerating_replaces() {
        let store = ChatStore::new();
        let id = RecipeId::new();
        store.rate_recipe(id.clone(), 2);
        store.rate_recipe(id.clone(), 5);
        let ratings = store.ratings();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].stars, 5);
        assert_eq!(ratings[0].recipe_id, id);
    }

    #[test]
    fn recently_viewed_bounded_and_deduped() {
        let store = ChatStore::new();
        let repeat = RecipeRef::new(RecipeId::new(), "Cassoulet");
        store.push_recently_viewed(repeat.clone());
        for i in 0..12 {
            store.push_recently_viewed(RecipeRef::new(RecipeId::new(), format!("Recipe {i}")));
        }
        store.push_recently_viewed(repeat.clone());

        let recent = store.recently_viewed();
        assert_eq!(recent.len(), RECENTLY_VIEWED_CAP);
        assert_eq!(recent[0], repeat);
        let unique: std::collections::HashSet<_> =
            recent.iter().map(|r| r.id.as_str().to_owned()).collect();
        assert_eq!(unique.len(), recent.len());
    }

    #[test]
    fn notices_broadcast_and_dismiss() {
        let store = ChatStore::new();
        let mut rx = store.subscribe_notices();
        let id = store.notify(Notice::success("Copied"));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.title, "Copied");
        assert_eq!(store.notices().len(), 1);

        store.dismiss_notice(&id);
        assert!(store.notices().is_empty());
    }

    #[test]
    fn every_mutation_bumps_revision() {
        let store = ChatStore::new();
        let rx = store.subscribe();
        let start = *rx.borrow();

        let sid = store.create_session(None);
        store.add_message(&sid, NewMessage::user("hi"));
        store.set_loading(true);
        store.set_theme(Theme::Dark);

        assert_eq!(*rx.borrow(), start + 4);
    }
}
