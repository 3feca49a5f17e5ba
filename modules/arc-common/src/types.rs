use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{ArcError, Result};
use crate::messages::ScoreInput;

/// Fields hashed into a record key when nothing else is configured.
pub const DEFAULT_KEY_FIELDS: &[&str] = &["product_id", "author", "review_title", "review_body"];

/// Field names reserved for the staged wire form.
pub const RECORD_KEY_FIELD: &str = "record_key";
pub const STAGE_FIELD: &str = "stage";

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One observed unit: a flat mapping of named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style field insert.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for Record {
    type Error = ArcError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(ArcError::InvalidRecord(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Keys and stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Enrichment phase that produced a record version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stage(String);

impl Stage {
    pub const BASE: &'static str = "base";
    pub const ENRICHED: &'static str = "enriched";

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn base() -> Self {
        Self::new(Self::BASE)
    }

    pub fn enriched() -> Self {
        Self::new(Self::ENRICHED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static ASIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(?:dp|gp/product|product-reviews)/([A-Z0-9]{10})(?:[/?#]|$)")
        .expect("valid ASIN regex")
});

/// Identifies one logical session (one viewed product in one tab). Gates the reset call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive a session key from a product page URL.
    ///
    /// Product pages carry the ASIN in the path, so `/dp/B0ABCDEFGH` and
    /// `/product-reviews/B0ABCDEFGH?page=2` map to the same key. Other URLs fall back to
    /// the URL with query string and fragment stripped.
    pub fn from_product_url(url: &str) -> Option<Self> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        if let Some(caps) = ASIN_RE.captures(url) {
            return Some(Self(caps[1].to_string()));
        }
        let base = url.split(['?', '#']).next().unwrap_or(url);
        let base = base.trim_end_matches('/');
        if base.is_empty() {
            None
        } else {
            Some(Self(base.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which record fields feed the record key, in hashing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    fields: Vec<String>,
}

impl KeySpec {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated field list. Blank entries are ignored.
    pub fn parse(list: &str) -> Result<Self> {
        let fields: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect();
        if fields.is_empty() {
            return Err(ArcError::Config("key field list is empty".to_string()));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// SHA-256 over the selected fields in declared order. Missing fields hash as `null`,
    /// so adding unrelated fields to a record never changes its key.
    pub fn derive(&self, record: &Record) -> RecordKey {
        let mut hasher = Sha256::new();
        for field in &self.fields {
            let value = record.get(field).unwrap_or(&Value::Null);
            hasher.update(field.as_bytes());
            hasher.update([0x1f]);
            hasher.update(value.to_string().as_bytes());
            hasher.update([0x1e]);
        }
        RecordKey(hex::encode(hasher.finalize()))
    }
}

impl Default for KeySpec {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_FIELDS.iter().copied())
    }
}

// ---------------------------------------------------------------------------
// Staged record (wire form)
// ---------------------------------------------------------------------------

/// An accepted record tagged with its key and stage, as uploaded to `/ingest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedRecord {
    pub record_key: RecordKey,
    pub stage: Stage,
    #[serde(flatten)]
    pub record: Record,
}

impl StagedRecord {
    /// Reserved field names are stripped from `record` so they cannot shadow the tags.
    pub fn new(record_key: RecordKey, stage: Stage, mut record: Record) -> Self {
        record.0.remove(RECORD_KEY_FIELD);
        record.0.remove(STAGE_FIELD);
        Self {
            record_key,
            stage,
            record,
        }
    }
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// A scraped product review, the record shape the overlay produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default = "unknown_author")]
    pub author: String,
    #[serde(default)]
    pub review_title: String,
    #[serde(default)]
    pub review_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default)]
    pub verified_purchase: bool,
    #[serde(default = "Utc::now")]
    pub scraped_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

fn unknown_author() -> String {
    "Unknown".to_string()
}

impl Review {
    pub fn to_record(&self) -> Result<Record> {
        Record::try_from(serde_json::to_value(self)?)
    }

    pub fn score_input(&self) -> ScoreInput {
        ScoreInput {
            review_title: self.review_title.clone(),
            review_body: self.review_body.clone(),
            verified_purchase: self.verified_purchase,
        }
    }
}
