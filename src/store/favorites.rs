use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{KeyValueStore, StoreError};
use crate::TtsError;

pub const FAVORITES_KEY: &str = "tts_favorites";
pub const MAX_FAVORITES: usize = 50;
pub const MAX_FAVORITE_CHARS: usize = 2000;
pub const MAX_TITLE_CHARS: usize = 100;

/// Words taken from the text when no title is given.
const TITLE_WORDS: usize = 8;

/// A saved text snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteText {
    pub id: String,
    pub text: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Fields to change with [`FavoritesStore::update`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct FavoriteUpdate {
    pub text: Option<String>,
    pub title: Option<String>,
}

/// Saved snippets, most recent first, capped at [`MAX_FAVORITES`].
pub struct FavoritesStore {
    store: Arc<dyn KeyValueStore>,
}

impl FavoritesStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Save `text` as a new favorite.
    ///
    /// The title is derived from the first words of the text when omitted.
    pub async fn save(&self, text: &str, title: Option<&str>) -> Result<FavoriteText, TtsError> {
        let text = validate_favorite_text(text)?;
        let title = validate_title(title)?;

        let mut favorites = self.list().await?;
        if favorites.iter().any(|f| f.text == text) {
            return Err(TtsError::Duplicate);
        }
        if favorites.len() >= MAX_FAVORITES {
            return Err(TtsError::Capacity(MAX_FAVORITES));
        }

        let favorite = FavoriteText {
            id: Uuid::new_v4().to_string(),
            title: title.unwrap_or_else(|| derive_title(text)),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        favorites.insert(0, favorite.clone());
        self.write(&favorites).await?;
        log::debug!("Saved favorite {} ({} total)", favorite.id, favorites.len());
        Ok(favorite)
    }

    /// All favorites, most recent first.
    pub async fn list(&self) -> Result<Vec<FavoriteText>, TtsError> {
        let Some(raw) = self.store.get(FAVORITES_KEY).await? else {
            return Ok(Vec::new());
        };
        let favorites = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            key: FAVORITES_KEY.to_string(),
            reason: e.to_string(),
        })?;
        Ok(favorites)
    }

    pub async fn get(&self, id: &str) -> Result<Option<FavoriteText>, TtsError> {
        Ok(self.list().await?.into_iter().find(|f| f.id == id))
    }

    /// Whether a favorite with the same trimmed text exists.
    pub async fn contains_text(&self, text: &str) -> Result<bool, TtsError> {
        let text = text.trim();
        Ok(self.list().await?.iter().any(|f| f.text == text))
    }

    /// Delete by id. Returns whether anything was removed; a missing id is not an error.
    pub async fn delete(&self, id: &str) -> Result<bool, TtsError> {
        let mut favorites = self.list().await?;
        let before = favorites.len();
        favorites.retain(|f| f.id != id);
        if favorites.len() == before {
            return Ok(false);
        }
        self.write(&favorites).await?;
        Ok(true)
    }

    /// Change the text and/or title of an existing favorite.
    pub async fn update(&self, id: &str, update: FavoriteUpdate) -> Result<FavoriteText, TtsError> {
        let text = update
            .text
            .as_deref()
            .map(validate_favorite_text)
            .transpose()?;
        let title = match update.title.as_deref() {
            Some(title) => validate_title(Some(title))?,
            None => None,
        };

        let mut favorites = self.list().await?;
        if let Some(text) = text {
            if favorites.iter().any(|f| f.id != id && f.text == text) {
                return Err(TtsError::Duplicate);
            }
        }
        let favorite = favorites
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| TtsError::NotFound(id.to_string()))?;

        if let Some(text) = text {
            favorite.text = text.to_string();
        }
        if let Some(title) = title {
            favorite.title = title;
        }
        let updated = favorite.clone();
        self.write(&favorites).await?;
        Ok(updated)
    }

    pub async fn clear(&self) -> Result<(), TtsError> {
        self.store.remove(FAVORITES_KEY).await?;
        Ok(())
    }

    async fn write(&self, favorites: &[FavoriteText]) -> Result<(), TtsError> {
        let json = serde_json::to_string(favorites).map_err(StoreError::from)?;
        self.store.set(FAVORITES_KEY, json).await?;
        Ok(())
    }
}

fn validate_favorite_text(text: &str) -> Result<&str, TtsError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TtsError::Validation("favorite text must not be empty".to_string()));
    }
    let len = trimmed.chars().count();
    if len > MAX_FAVORITE_CHARS {
        return Err(TtsError::Validation(format!(
            "favorite text is {len} characters, the limit is {MAX_FAVORITE_CHARS}"
        )));
    }
    Ok(trimmed)
}

/// A blank title counts as no title.
fn validate_title(title: Option<&str>) -> Result<Option<String>, TtsError> {
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let len = title.chars().count();
    if len > MAX_TITLE_CHARS {
        return Err(TtsError::Validation(format!(
            "title is {len} characters, the limit is {MAX_TITLE_CHARS}"
        )));
    }
    Ok(Some(title.to_string()))
}

fn derive_title(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut title = words[..words.len().min(TITLE_WORDS)].join(" ");
    if words.len() > TITLE_WORDS {
        title.push_str("...");
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        title = title.chars().take(MAX_TITLE_CHARS - 3).collect::<String>() + "...";
    }
    title
}
