use saucier_core::ids::{RecipeId, SessionId};
use saucier_core::notice::Notice;
use saucier_core::recipes::{Preferences, RecipeRating, RecipeRef, Theme};
use saucier_core::session::Session;

/// The whole in-memory state tree. Only [`crate::store::ChatStore`] mutates
/// it, and only through named operations that run to completion under one
/// lock acquisition.
#[derive(Clone, Debug, Default)]
pub struct ChatState {
    /// Newest-created-first.
    pub sessions: Vec<Session>,
    /// Always `None` or the id of an element of `sessions`.
    pub current: Option<SessionId>,
    /// A request has been issued and not yet settled.
    pub loading: bool,
    /// Chunks are actively arriving. Set together with `loading` today, but
    /// independently settable.
    pub streaming: bool,
    pub preferences: Preferences,
    pub favorites: Vec<RecipeId>,
    pub ratings: Vec<RecipeRating>,
    pub recently_viewed: Vec<RecipeRef>,
    pub theme: Theme,
    /// Transient; never persisted.
    pub notices: Vec<Notice>,
}

impl ChatState {
    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn session_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }
}
