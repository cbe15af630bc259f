//! Provider response normalization
//!
//! The provider is inconsistent about field names (`next` vs `next_cursor`,
//! `feed` vs `items`), id types (string vs number) and nesting (items either
//! flat or wrapped in a `content` object). Every accepted raw shape is mapped
//! here onto the canonical types from `laterbridge_core`; the rest of the
//! crate never looks at raw JSON.

use laterbridge_core::{CredentialPair, FeedPage, Highlight, Item, ItemStatus, ProviderError, SaveResult};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s.trim().to_string(),
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNamed {
    Text(String),
    Object {
        #[serde(default, alias = "name", alias = "display_name")]
        any_name: Option<String>,
    },
}

impl RawNamed {
    fn into_name(self) -> Option<String> {
        match self {
            RawNamed::Text(s) => Some(s),
            RawNamed::Object { any_name } => any_name,
        }
        .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawStatus {
    Code(i64),
    Label(String),
}

impl RawStatus {
    fn resolve(&self) -> Option<ItemStatus> {
        match self {
            RawStatus::Code(code) => ItemStatus::from_code(*code),
            RawStatus::Label(label) => ItemStatus::from_label(label),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLibrary {
    #[serde(default, alias = "state", alias = "status")]
    library_state: Option<RawStatus>,
}

#[derive(Debug, Deserialize)]
struct RawHistory {
    #[serde(default, alias = "progress")]
    reading_progress: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    #[serde(default, alias = "wordCount")]
    word_count: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTag {
    Name(String),
    Object { name: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNote {
    Text(String),
    Object {
        #[serde(default, alias = "text")]
        note: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawHighlight {
    Text(String),
    Object {
        #[serde(alias = "quote")]
        text: String,
        #[serde(default)]
        note: Option<RawNote>,
    },
}

#[derive(Debug, Deserialize)]
struct RawContent {
    #[serde(default)]
    id: Option<RawId>,
    #[serde(default, alias = "contentId")]
    content_id: Option<RawId>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    author: Option<RawNamed>,
    #[serde(default)]
    publisher: Option<RawNamed>,
    #[serde(default, alias = "publicationDate", alias = "published_at")]
    publication_date: Option<String>,
    #[serde(default)]
    library: Option<RawLibrary>,
    #[serde(default, alias = "status")]
    library_state: Option<RawStatus>,
    #[serde(default)]
    history: Option<RawHistory>,
    #[serde(default, alias = "readingProgress", alias = "progress")]
    reading_progress: Option<f64>,
    #[serde(default)]
    article: Option<RawArticle>,
    #[serde(default, alias = "wordCount")]
    word_count: Option<f64>,
    #[serde(default)]
    tags: Vec<RawTag>,
    #[serde(default, alias = "annotations", alias = "highlights")]
    my_annotations: Vec<RawHighlight>,
    #[serde(default, alias = "note")]
    my_note: Option<RawNote>,
}

#[derive(Debug, Deserialize)]
struct RawFeedPage {
    #[serde(default, alias = "items", alias = "results")]
    feed: Vec<Value>,
    #[serde(default, alias = "next_cursor", alias = "nextCursor")]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTokens {
    #[serde(default, alias = "access", alias = "accessToken")]
    access_token: Option<String>,
    #[serde(default, alias = "refresh", alias = "refreshToken")]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQrTrigger {
    #[serde(default, alias = "sessionToken", alias = "token")]
    session_token: Option<String>,
    #[serde(default, alias = "loginUrl", alias = "qr_url", alias = "qrUrl")]
    login_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSaveResult {
    #[serde(default)]
    id: Option<RawId>,
    #[serde(default, alias = "content_id", alias = "secondaryId", alias = "contentId")]
    secondary_id: Option<RawId>,
    #[serde(default)]
    content: Option<RawContentRef>,
}

#[derive(Debug, Deserialize)]
struct RawContentRef {
    #[serde(default)]
    id: Option<RawId>,
}

fn malformed(what: &str, err: impl std::fmt::Display) -> ProviderError {
    ProviderError::failed(format!("malformed {}: {}", what, err))
}

/// Map a feed response onto a [`FeedPage`].
///
/// A bare JSON array is accepted as a single, final page. Entries without a
/// usable identifier are skipped with a warning rather than failing the page.
pub fn feed_page(value: Value) -> Result<FeedPage, ProviderError> {
    let raw = match value {
        Value::Array(entries) => RawFeedPage {
            feed: entries,
            next: None,
        },
        other => serde_json::from_value::<RawFeedPage>(other)
            .map_err(|e| malformed("feed page", e))?,
    };

    let items = raw
        .feed
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match item(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("[Normalize] Skipping feed entry {}: {}", index, e);
                None
            }
        })
        .collect();

    Ok(FeedPage {
        items,
        next_cursor: raw.next.filter(|c| !c.trim().is_empty()),
    })
}

/// Map one feed entry (flat, or wrapped in `content`) onto an [`Item`]
pub fn item(entry: Value) -> Result<Item, ProviderError> {
    let Value::Object(mut map) = entry else {
        return Err(ProviderError::failed("malformed feed entry: not an object"));
    };

    let (outer_id, content) = match map.remove("content") {
        Some(content @ Value::Object(_)) => (map.remove("id"), content),
        Some(other) => {
            map.insert("content".to_string(), other);
            (None, Value::Object(map))
        }
        None => (None, Value::Object(map)),
    };

    let raw: RawContent =
        serde_json::from_value(content).map_err(|e| malformed("feed entry", e))?;
    let outer_id = outer_id
        .and_then(|v| serde_json::from_value::<RawId>(v).ok())
        .map(RawId::into_string)
        .filter(|s| !s.is_empty());
    let inner_id = raw.id.map(RawId::into_string).filter(|s| !s.is_empty());
    let content_id = raw
        .content_id
        .map(RawId::into_string)
        .filter(|s| !s.is_empty());

    let (id, secondary_id) = match (outer_id, inner_id) {
        (Some(outer), inner) => (outer, inner),
        (None, Some(inner)) => (inner, content_id),
        (None, None) => return Err(ProviderError::failed("malformed feed entry: missing id")),
    };
    let secondary_id = secondary_id.filter(|s| *s != id);

    let status = raw
        .library
        .and_then(|l| l.library_state)
        .or(raw.library_state)
        .and_then(|s| s.resolve())
        .unwrap_or_default();

    let progress = raw
        .history
        .and_then(|h| h.reading_progress)
        .map(percent_progress)
        .or(raw.reading_progress.map(ratio_progress))
        .unwrap_or(0.0);

    let word_count = raw
        .article
        .and_then(|a| a.word_count)
        .or(raw.word_count)
        .filter(|w| w.is_finite() && *w >= 0.0)
        .map(|w| w.round() as u32);

    Ok(Item {
        id,
        secondary_id,
        title: raw.title.unwrap_or_default().trim().to_string(),
        url: raw.url,
        author: raw.author.and_then(RawNamed::into_name),
        publisher: raw.publisher.and_then(RawNamed::into_name),
        published: raw.publication_date,
        status,
        progress,
        word_count,
        note: raw.my_note.and_then(note_text),
        tags: raw
            .tags
            .into_iter()
            .map(|t| match t {
                RawTag::Name(name) | RawTag::Object { name } => name,
            })
            .collect(),
        highlights: raw
            .my_annotations
            .into_iter()
            .map(|h| match h {
                RawHighlight::Text(text) => Highlight { text, note: None },
                RawHighlight::Object { text, note } => Highlight {
                    text,
                    note: note.and_then(note_text),
                },
            })
            .collect(),
    })
}

fn note_text(note: RawNote) -> Option<String> {
    match note {
        RawNote::Text(s) => Some(s),
        RawNote::Object { note } => note,
    }
    .filter(|s| !s.trim().is_empty())
}

/// `history.reading_progress` is the provider's own 0-100 percentage
fn percent_progress(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value / 100.0).clamp(0.0, 1.0)
}

/// Flat `progress` fields are ratios. Values above 1 can only be percentages
/// and are scaled; exactly 1 stays a finished ratio.
fn ratio_progress(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let ratio = if value > 1.0 { value / 100.0 } else { value };
    ratio.clamp(0.0, 1.0)
}

/// Credential pair from a refresh or QR exchange response.
///
/// Returns `None` unless both tokens are present.
pub fn credentials(value: &Value) -> Option<CredentialPair> {
    let raw: RawTokens = serde_json::from_value(value.clone()).ok()?;
    let pair = CredentialPair::new(raw.access_token?, raw.refresh_token?);
    pair.is_complete().then_some(pair)
}

/// Session token and optional login URL from a QR trigger response
pub fn qr_trigger(value: &Value) -> Option<(String, Option<String>)> {
    let raw: RawQrTrigger = serde_json::from_value(value.clone()).ok()?;
    let token = raw.session_token.filter(|t| !t.trim().is_empty())?;
    Some((token, raw.login_url.filter(|u| !u.trim().is_empty())))
}

/// Identifiers from an enqueue response
pub fn save_result(value: Value) -> Result<SaveResult, ProviderError> {
    let raw: RawSaveResult =
        serde_json::from_value(value).map_err(|e| malformed("save response", e))?;
    let id = raw
        .id
        .map(RawId::into_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::failed("malformed save response: missing id"))?;
    let secondary_id = raw
        .secondary_id
        .or_else(|| raw.content.and_then(|c| c.id))
        .map(RawId::into_string)
        .filter(|s| !s.is_empty() && *s != id);
    Ok(SaveResult { id, secondary_id })
}
