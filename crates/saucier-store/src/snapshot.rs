//! The durable projection of the state tree.
//!
//! The persisted payload is one namespaced JSON blob tagged with a schema
//! version. Decoding is total: malformed payloads degrade field by field to
//! defaults rather than failing the load, with temporal values and
//! sequences coerced by `saucier_core::coerce`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use saucier_core::coerce;
use saucier_core::ids::{RecipeId, SessionId};
use saucier_core::recipes::{Preferences, RecipeRating, RecipeRef, Theme, RECENTLY_VIEWED_CAP};
use saucier_core::session::Session;

use crate::error::StoreError;
use crate::state::ChatState;

pub const STATE_NAMESPACE: &str = "saucier.state";
pub const STATE_VERSION: u32 = 1;

fn current_version() -> u32 {
    STATE_VERSION
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default, deserialize_with = "coerce::de_or_default")]
    pub preferences: Preferences,
    #[serde(default, deserialize_with = "coerce::de_seq")]
    pub favorites: Vec<RecipeId>,
    #[serde(default, deserialize_with = "coerce::de_seq")]
    pub ratings: Vec<RecipeRating>,
    #[serde(default, deserialize_with = "coerce::de_seq")]
    pub sessions: Vec<Session>,
    #[serde(default, deserialize_with = "coerce::de_or_default")]
    pub current_session: Option<SessionId>,
    #[serde(default, deserialize_with = "coerce::de_seq")]
    pub recently_viewed: Vec<RecipeRef>,
    #[serde(default, deserialize_with = "coerce::de_or_default")]
    pub theme: Theme,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            preferences: Preferences::default(),
            favorites: Vec::new(),
            ratings: Vec::new(),
            sessions: Vec::new(),
            current_session: None,
            recently_viewed: Vec::new(),
            theme: Theme::default(),
        }
    }
}

impl PersistedState {
    /// Project the durable subset out of the live tree.
    pub fn project(state: &ChatState) -> Self {
        Self {
            version: STATE_VERSION,
            preferences: state.preferences.clone(),
            favorites: state.favorites.clone(),
            ratings: state.ratings.clone(),
            sessions: state.sessions.clone(),
            current_session: state.current.clone(),
            recently_viewed: state.recently_viewed.clone(),
            theme: state.theme,
        }
    }

    /// Replace the durable subset of a live tree. Transient state always
    /// resets: notices empty, generation flags off. A current-session
    /// reference matching no session is cleared.
    pub fn apply(mut self, state: &mut ChatState) {
        self.recently_viewed.truncate(RECENTLY_VIEWED_CAP);

        let current = self
            .current_session
            .filter(|id| self.sessions.iter().any(|s| &s.id == id));

        state.preferences = self.preferences;
        state.favorites = self.favorites;
        state.ratings = self.ratings;
        state.sessions = self.sessions;
        state.current = current;
        state.recently_viewed = self.recently_viewed;
        state.theme = self.theme;
        state.notices = Vec::new();
        state.loading = false;
        state.streaming = false;
    }

    pub fn encode(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a raw payload, falling back to defaults when it cannot be
    /// parsed at all. Never fails.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<Self>(raw) {
            Ok(state) => {
                if state.version != STATE_VERSION {
                    warn!(
                        found = state.version,
                        expected = STATE_VERSION,
                        "persisted state version mismatch, loading best-effort"
                    );
                }
                state
            }
            Err(e) => {
                warn!(error = %e, "persisted state unreadable, starting fresh");
                Self::default()
            }
        }
    }
}
