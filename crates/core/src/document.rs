//! The Document model: a DAG-shaped record carried through a pipeline run.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Field names the framework controls. User-facing setters reject these.
pub const RESERVED_FIELDS: &[&str] = &["id", "run_id", "children", "errors"];

fn check_not_reserved(name: &str) {
    if RESERVED_FIELDS.contains(&name) {
        panic!("field '{name}' is reserved and cannot be set directly");
    }
}

/// Wraps an `Instant` value in a tagged JSON object (`{"$instant": "..."}`)
/// instead of the bare RFC3339 string `chrono` would otherwise produce.
/// `FieldValue` is untagged, and a bare string is indistinguishable from
/// `FieldValue::String` on deserialize — this keeps the two disjoint so a
/// round trip through the wire doesn't silently demote an Instant to a
/// String.
mod instant_tag {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Tagged {
        #[serde(rename = "$instant")]
        instant: DateTime<Utc>,
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        Tagged { instant: *value }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        Tagged::deserialize(deserializer).map(|t| t.instant)
    }
}

/// A single typed value held by a document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Double(f64),
    Boolean(bool),
    Instant(#[serde(with = "instant_tag")] DateTime<Utc>),
    Node(serde_json::Value),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Instant(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}
impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}
impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}
impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}
impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}
impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Instant(v)
    }
}

/// A field is either a single value or an ordered list of values.
///
/// The first `add` against a missing field creates a `Single`; any further
/// add upgrades it to a `Multi` in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Single(FieldValue),
    Multi(Vec<FieldValue>),
}

impl Field {
    pub fn values(&self) -> Vec<&FieldValue> {
        match self {
            Field::Single(v) => vec![v],
            Field::Multi(vs) => vs.iter().collect(),
        }
    }

    pub fn into_values(self) -> Vec<FieldValue> {
        match self {
            Field::Single(v) => vec![v],
            Field::Multi(vs) => vs,
        }
    }

    fn push(&mut self, value: FieldValue) {
        match self {
            Field::Single(existing) => {
                let existing = existing.clone();
                *self = Field::Multi(vec![existing, value]);
            }
            Field::Multi(vs) => vs.push(value),
        }
    }
}

/// Update mode for [`Document::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Replace any existing value(s) with the first given value, then append the rest.
    Overwrite,
    /// Append all given values to whatever is already present.
    Append,
    /// Leave the field untouched if it already exists.
    Skip,
}

/// Unique document identifier. Non-empty, immutable once set.
pub type DocId = String;

/// An enriched record flowing through a pipeline.
///
/// `children` is exactly one level deep — a child never carries its own
/// children. `errors` is append-only and never cleared by the framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    id: DocId,
    run_id: Option<String>,
    #[serde(default)]
    fields: IndexMap<String, Field>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    children: Vec<Document>,
}

impl Document {
    /// Create a new document with the given id and no run-id yet.
    pub fn create(id: impl Into<String>) -> Self {
        let id = id.into();
        assert!(!id.is_empty(), "document id must not be empty");
        Self {
            id,
            run_id: None,
            fields: IndexMap::new(),
            errors: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create a new document with the given id and run-id already attached.
    pub fn with_run_id(id: impl Into<String>, run_id: impl Into<String>) -> Self {
        let mut doc = Self::create(id);
        doc.set_run_id(run_id);
        doc
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Attach a run-id. Panics if a run-id is already set — a run-id may be
    /// initialized at most once per document.
    pub fn set_run_id(&mut self, run_id: impl Into<String>) {
        if self.run_id.is_some() {
            panic!("document '{}' already has a run_id assigned", self.id);
        }
        self.run_id = Some(run_id.into());
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn has_non_null(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .map(|f| !f.values().is_empty())
            .unwrap_or(false)
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|f| match f {
            Field::Single(v) => v.as_str(),
            Field::Multi(vs) => vs.first().and_then(|v| v.as_str()),
        })
    }

    pub fn get_strings(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .map(|f| {
                f.values()
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(|f| match f {
            Field::Single(v) => v.as_i64(),
            Field::Multi(vs) => vs.first().and_then(|v| v.as_i64()),
        })
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(|f| match f {
            Field::Single(v) => v.as_f64(),
            Field::Multi(vs) => vs.first().and_then(|v| v.as_f64()),
        })
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(|f| match f {
            Field::Single(v) => v.as_bool(),
            Field::Multi(vs) => vs.first().and_then(|v| v.as_bool()),
        })
    }

    pub fn get_instant(&self, name: &str) -> Option<DateTime<Utc>> {
        self.fields.get(name).and_then(|f| match f {
            Field::Single(v) => v.as_instant(),
            Field::Multi(vs) => vs.first().and_then(|v| v.as_instant()),
        })
    }

    /// Set a field, replacing any existing value entirely.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        check_not_reserved(name);
        self.fields.insert(name.to_string(), Field::Single(value.into()));
    }

    /// Set the field if absent, otherwise append and upgrade to multi-valued.
    pub fn set_or_add(&mut self, name: &str, value: impl Into<FieldValue>) {
        check_not_reserved(name);
        let value = value.into();
        match self.fields.get_mut(name) {
            Some(field) => field.push(value),
            None => {
                self.fields.insert(name.to_string(), Field::Single(value));
            }
        }
    }

    /// Apply `values` to `name` under the given [`UpdateMode`].
    pub fn update(&mut self, name: &str, mode: UpdateMode, values: Vec<FieldValue>) {
        check_not_reserved(name);
        if values.is_empty() {
            return;
        }
        match mode {
            UpdateMode::Skip => {
                if self.fields.contains_key(name) {
                    return;
                }
                self.write_values(name, values);
            }
            UpdateMode::Overwrite => {
                self.write_values(name, values);
            }
            UpdateMode::Append => {
                for v in values {
                    self.set_or_add(name, v);
                }
            }
        }
    }

    fn write_values(&mut self, name: &str, mut values: Vec<FieldValue>) {
        let first = values.remove(0);
        self.fields.insert(name.to_string(), Field::Single(first));
        for v in values {
            self.set_or_add(name, v);
        }
    }

    /// Rename a field, applying `mode` against any value already present at `new`.
    pub fn rename(&mut self, old: &str, new: &str, mode: UpdateMode) {
        check_not_reserved(old);
        check_not_reserved(new);
        if let Some(field) = self.fields.shift_remove(old) {
            self.update(new, mode, field.into_values());
        }
    }

    /// Remove duplicate values from a field, preserving first-occurrence order.
    /// If `target` is given, the deduplicated result is written there instead.
    pub fn remove_duplicate_values(&mut self, field: &str, target: Option<&str>) {
        let Some(existing) = self.fields.get(field) else {
            return;
        };
        let mut seen = Vec::new();
        for v in existing.values() {
            if !seen.contains(&v) {
                seen.push(v);
            }
        }
        let deduped: Vec<FieldValue> = seen.into_iter().cloned().collect();
        let dest = target.unwrap_or(field);
        check_not_reserved(dest);
        if deduped.len() == 1 {
            self.fields
                .insert(dest.to_string(), Field::Single(deduped.into_iter().next().unwrap()));
        } else {
            self.fields.insert(dest.to_string(), Field::Multi(deduped));
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Attach a child document. One level deep — the child's own `children`
    /// must be empty.
    pub fn add_child(&mut self, child: Document) {
        assert!(
            child.children.is_empty(),
            "child document '{}' must not itself carry children",
            child.id
        );
        self.children.push(child);
    }

    pub fn children(&self) -> &[Document] {
        &self.children
    }

    pub fn take_children(&mut self) -> Vec<Document> {
        std::mem::take(&mut self.children)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
