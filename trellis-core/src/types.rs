//! Domain types for themes, blocks, partials, and their remote counterparts.
//!
//! Local and remote shapes are kept as separate structs: a local component
//! has no durable identifier until it has been synced once, so `name` is the
//! only key the two sides share.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of a site on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteId(pub String);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SiteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SiteId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Name of a theme working directory under the themes root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThemeName(pub String);

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ThemeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThemeName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Site-wide design tokens (colors, typography scale, palettes).
pub type ThemeConfig = Map<String, Value>;

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// Kind of a block field.
///
/// Unknown kinds are kept verbatim in [`FieldType::Other`] so a schema written
/// by a newer editor still round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Textarea,
    Wysiwyg,
    Image,
    Items,
    Select,
    Group,
    Number,
    Date,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Wysiwyg => "wysiwyg",
            FieldType::Image => "image",
            FieldType::Items => "items",
            FieldType::Select => "select",
            FieldType::Group => "group",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Other(other) => other,
        }
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "text" => FieldType::Text,
            "textarea" => FieldType::Textarea,
            "wysiwyg" => FieldType::Wysiwyg,
            "image" => FieldType::Image,
            "items" => FieldType::Items,
            "select" => FieldType::Select,
            "group" => FieldType::Group,
            "number" => FieldType::Number,
            "date" => FieldType::Date,
            _ => FieldType::Other(s),
        }
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_owned()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field descriptor in a block schema.
///
/// Keys this struct does not model are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Server- or bootstrap-generated; never compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Field {
    /// A field as local construction produces it: empty value, empty config.
    pub fn new(field_type: FieldType, name: impl Into<String>) -> Self {
        Self {
            id: None,
            field_type,
            name: name.into(),
            value: Value::String(String::new()),
            config: Some(Map::new()),
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Local components
// ---------------------------------------------------------------------------

/// A block as described by `converted/blocks/<Name>.html` + `<Name>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalBlock {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    /// `None` means the local side makes no claim about the description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_type: Option<String>,
}

/// A partial as described by `converted/partials/<Name>.html`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPartial {
    pub name: String,
    pub template: String,
}

/// Everything read from one theme working directory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalTheme {
    pub blocks: Vec<LocalBlock>,
    pub partials: Vec<LocalPartial>,
    /// `None` when the theme has no `theme.json`; theme tokens are then left alone.
    pub theme: Option<ThemeConfig>,
}

// ---------------------------------------------------------------------------
// Remote components
// ---------------------------------------------------------------------------

/// A block as stored by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBlock {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_type: Option<String>,
}

/// A partial as stored by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePartial {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub template: String,
}

/// Site metadata, including its current theme tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub theme: ThemeConfig,
}

impl From<&RemoteBlock> for LocalBlock {
    fn from(block: &RemoteBlock) -> Self {
        Self {
            name: block.name.clone(),
            template: block.template.clone(),
            fields: block.fields.clone(),
            description: block.description.clone(),
            thumbnail_type: block.thumbnail_type.clone(),
        }
    }
}

impl From<&RemotePartial> for LocalPartial {
    fn from(partial: &RemotePartial) -> Self {
        Self {
            name: partial.name.clone(),
            template: partial.template.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// Partial update of a block: only the properties that differ are sent.
///
/// `description` and `thumbnail_type` are tri-state: `None` leaves the
/// property alone, `Some(None)` clears it (sent as `null`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null"
    )]
    pub thumbnail_type: Option<Option<String>>,
}

/// A key that is present maps to `Some`, even when its value is `null`.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl BlockPatch {
    /// Names of the properties this patch touches, in wire order.
    pub fn property_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.template.is_some() {
            names.push("template");
        }
        if self.fields.is_some() {
            names.push("fields");
        }
        if self.description.is_some() {
            names.push("description");
        }
        if self.thumbnail_type.is_some() {
            names.push("thumbnailType");
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.property_names().is_empty()
    }
}

/// Partial update of a partial.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartialPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
