use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Document, DocumentStore, FieldValue, Fields, OrderBy};

pub const NEWS_COLLECTION: &str = "news";
pub const TITLE_MAX_CHARS: usize = 120;
pub const BODY_MAX_CHARS: usize = 10_000;

const F_TITLE: &str = "title";
const F_BODY: &str = "body";
const F_IMAGE_URL: &str = "imageUrl";
const F_CREATED_AT: &str = "createdAt";
const F_UPDATED_AT: &str = "updatedAt";
const F_PUBLISHED_AT: &str = "publishedAt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsArticle {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.get_str(F_TITLE).unwrap_or_default().to_string(),
            body: doc.get_str(F_BODY).unwrap_or_default().to_string(),
            image_url: doc.get_str(F_IMAGE_URL).map(str::to_string),
            created_at: doc.get_timestamp(F_CREATED_AT),
            updated_at: doc.get_timestamp(F_UPDATED_AT),
            published_at: doc.get_timestamp(F_PUBLISHED_AT),
        }
    }
}

/// What an editor submits; everything is normalized before it reaches the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsPayload {
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Trims, cuts to `max_chars` and trims again so a cut never leaves a trailing space.
pub fn clamp_text(raw: &str, max_chars: usize) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

pub fn clean_image_url(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn content_fields(payload: &NewsPayload) -> Fields {
    let mut fields = Fields::new();
    fields.insert(
        F_TITLE.to_string(),
        clamp_text(&payload.title, TITLE_MAX_CHARS).into(),
    );
    fields.insert(
        F_BODY.to_string(),
        clamp_text(&payload.body, BODY_MAX_CHARS).into(),
    );
    fields.insert(
        F_IMAGE_URL.to_string(),
        clean_image_url(payload.image_url.as_deref()).into(),
    );
    fields
}

pub fn create_fields(payload: &NewsPayload) -> Fields {
    let mut fields = content_fields(payload);
    fields.insert(F_CREATED_AT.to_string(), FieldValue::ServerTimestamp);
    fields.insert(F_UPDATED_AT.to_string(), FieldValue::ServerTimestamp);
    fields.insert(
        F_PUBLISHED_AT.to_string(),
        payload
            .published_at
            .map(FieldValue::Timestamp)
            .unwrap_or(FieldValue::ServerTimestamp),
    );
    fields
}

pub fn update_fields(payload: &NewsPayload) -> Fields {
    let mut fields = content_fields(payload);
    fields.insert(F_UPDATED_AT.to_string(), FieldValue::ServerTimestamp);
    if let Some(published_at) = payload.published_at {
        fields.insert(F_PUBLISHED_AT.to_string(), FieldValue::Timestamp(published_at));
    }
    fields
}

#[derive(Clone)]
pub struct NewsClient {
    store: Arc<dyn DocumentStore>,
}

impl NewsClient {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<NewsArticle>> {
        let docs = self
            .store
            .list_ordered(
                NEWS_COLLECTION,
                &[OrderBy::desc(F_PUBLISHED_AT), OrderBy::desc(F_CREATED_AT)],
            )
            .context("list news")?;
        Ok(docs.iter().map(NewsArticle::from_document).collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<NewsArticle>> {
        let doc = self
            .store
            .get(NEWS_COLLECTION, id)
            .with_context(|| format!("get news {id}"))?;
        Ok(doc.as_ref().map(NewsArticle::from_document))
    }

    pub fn create(&self, payload: &NewsPayload) -> Result<String> {
        let id = self
            .store
            .add(NEWS_COLLECTION, create_fields(payload))
            .context("create news")?;
        tracing::info!(target: "pitchside::news", id = %id, "news created");
        Ok(id)
    }

    pub fn update(&self, id: &str, payload: &NewsPayload) -> Result<()> {
        self.store
            .update(NEWS_COLLECTION, id, update_fields(payload))
            .with_context(|| format!("update news {id}"))?;
        tracing::info!(target: "pitchside::news", id = %id, "news updated");
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        self.store
            .delete(NEWS_COLLECTION, id)
            .with_context(|| format!("remove news {id}"))?;
        tracing::info!(target: "pitchside::news", id = %id, "news removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_counts_chars_not_bytes() {
        let title = "č".repeat(200);
        let out = clamp_text(&title, TITLE_MAX_CHARS);
        assert_eq!(out.chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn clamp_retrims_after_cut() {
        let raw = format!("{} tail", "a".repeat(119));
        assert_eq!(clamp_text(&raw, TITLE_MAX_CHARS), "a".repeat(119));
    }

    #[test]
    fn blank_image_url_becomes_null() {
        assert_eq!(clean_image_url(Some("   ")), None);
        assert_eq!(clean_image_url(None), None);
        assert_eq!(
            clean_image_url(Some(" https://img.test/a.png ")).as_deref(),
            Some("https://img.test/a.png")
        );
    }

    #[test]
    fn update_leaves_created_at_and_unset_published_at_alone() {
        let fields = update_fields(&NewsPayload {
            title: "t".into(),
            ..Default::default()
        });
        assert!(!fields.contains_key(F_CREATED_AT));
        assert!(!fields.contains_key(F_PUBLISHED_AT));
        assert_eq!(fields.get(F_UPDATED_AT), Some(&FieldValue::ServerTimestamp));
    }
}
