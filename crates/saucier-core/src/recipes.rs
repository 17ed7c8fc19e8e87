use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coerce;
use crate::ids::RecipeId;

/// How many recently viewed recipes are retained, newest first.
pub const RECENTLY_VIEWED_CAP: usize = 10;

/// Lightweight reference to a recipe held outside this engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeRef {
    pub id: RecipeId,
    pub name: String,
}

impl RecipeRef {
    pub fn new(id: RecipeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A star rating a user assigned to a recipe.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecipeRating {
    pub recipe_id: RecipeId,
    pub stars: u8,
    #[serde(deserialize_with = "coerce::de_timestamp", default = "Utc::now")]
    pub rated_at: DateTime<Utc>,
}

impl RecipeRating {
    pub fn new(recipe_id: RecipeId, stars: u8) -> Self {
        Self {
            recipe_id,
            stars: stars.clamp(1, 5),
            rated_at: Utc::now(),
        }
    }
}

/// User cooking preferences carried across restarts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, deserialize_with = "coerce::de_seq")]
    pub dietary: Vec<String>,
    #[serde(default, deserialize_with = "coerce::de_seq")]
    pub favorite_cuisines: Vec<String>,
    #[serde(default, deserialize_with = "coerce::de_or_default")]
    pub skill_level: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Dark => write!(f, "dark"),
            Self::System => write!(f, "system"),
        }
    }
}
