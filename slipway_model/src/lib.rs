use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered segments locating a leaf in a package schema. Two paths are equal
/// iff they have the same segments in the same order; no normalization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Path(Vec<String>);

impl Path {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parses the CLI/file form "a.b.c". Empty segments are dropped.
    pub fn parse_dotted(s: &str) -> Self {
        Self(
            s.split('.')
                .filter(|seg| !seg.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// The field path reserved for the user-facing instance name. Always hidden
/// from the indexed form regardless of schema metadata.
pub fn friendly_name_path() -> Path {
    Path::from_segments(["slipway", "friendly_name"])
}

/// A leaf value. `Absent` is the explicit empty marker for leaves with
/// neither a form override nor a schema default; it serializes as null.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Absent,
}

impl FieldValue {
    /// Boolean coercion with the same rules as the schema language the
    /// documents come from: false, 0, NaN, "" and null are falsy.
    pub fn truthiness(&self) -> bool {
        match self {
            FieldValue::Bool(b) => *b,
            FieldValue::Number(n) => *n != 0.0 && !n.is_nan(),
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::Absent => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Absent => serde_json::Value::Null,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FormFieldValue {
    pub path: Path,
    pub value: FieldValue,
}

/// Presentation record handed to consumers of the indexed form. The
/// flattener's hidden flag never leaves the core.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FormField {
    pub path: Path,
    pub value: FieldValue,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_readonly: bool,
    /// Only meaningful when `value` is text.
    pub enum_values: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SchemaDocument {
    #[serde(default)]
    pub properties: IndexMap<String, SchemaNode>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SchemaNode {
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SchemaNode>>,
    #[serde(rename = "x-form", skip_serializing_if = "Option::is_none")]
    pub form: Option<FormMeta>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct FormMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

/// Sub-package descriptor returned alongside a rendered schema.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DependencyDescriptor {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Catalog {
    pub id: String,
    pub packages: Vec<CatalogPackage>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CatalogPackage {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LaunchRequest {
    pub catalog_id: String,
    pub package_name: String,
    pub options: serde_json::Map<String, serde_json::Value>,
    pub dry_run: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LaunchOutcome {
    #[serde(default)]
    pub contract: serde_json::Map<String, serde_json::Value>,
}

/// A saved launch configuration: catalog, package, and the change-set of
/// fields whose value differs from the derived default.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RestorableConfig {
    pub catalog_id: String,
    pub package_name: String,
    pub field_values: Vec<FormFieldValue>,
}

impl RestorableConfig {
    /// Structural equality: same catalog and package, and the same
    /// path/value change-set regardless of order.
    pub fn is_same_as(&self, other: &RestorableConfig) -> bool {
        self.catalog_id == other.catalog_id
            && self.package_name == other.package_name
            && self.field_values.len() == other.field_values.len()
            && self.field_values.iter().all(|f| {
                other
                    .field_values
                    .iter()
                    .any(|o| o.path == f.path && o.value == f.value)
            })
    }
}

/// Re-nests a flat field list into the JSON object the launch call expects,
/// mirroring the original path segments.
pub fn form_field_values_to_object(
    fields: &[FormFieldValue],
) -> serde_json::Map<String, serde_json::Value> {
    let mut root = serde_json::Map::new();
    for field in fields {
        insert_nested(&mut root, field.path.segments(), field.value.to_json());
    }
    root
}

fn insert_nested(
    node: &mut serde_json::Map<String, serde_json::Value>,
    segments: &[String],
    value: serde_json::Value,
) {
    match segments {
        [] => {}
        [leaf] => {
            node.insert(leaf.clone(), value);
        }
        [head, rest @ ..] => {
            let entry = node
                .entry(head.clone())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            if !entry.is_object() {
                *entry = serde_json::Value::Object(serde_json::Map::new());
            }
            if let serde_json::Value::Object(child) = entry {
                insert_nested(child, rest, value);
            }
        }
    }
}
