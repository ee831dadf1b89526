use indexmap::IndexMap;
use slipway_model::{
    friendly_name_path, FieldValue, FormField, FormFieldValue, Path, SchemaDocument, SchemaNode,
};
use thiserror::Error;

/// Schema nesting is acyclic by construction; this bound turns degenerate or
/// cyclic input into an error instead of unbounded recursion.
pub const MAX_SCHEMA_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema nesting deeper than {MAX_SCHEMA_DEPTH} levels at {path}")]
    TooDeep { path: Path },
}

/// A flattened schema leaf. `is_hidden` only exists at index time; `public()`
/// strips it before the record leaves the core.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatField {
    pub path: Path,
    pub value: FieldValue,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_readonly: bool,
    pub enum_values: Option<Vec<String>>,
    pub is_hidden: bool,
}

impl FlatField {
    pub fn public(&self) -> FormField {
        FormField {
            path: self.path.clone(),
            value: self.value.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            is_readonly: self.is_readonly,
            enum_values: self.enum_values.clone(),
        }
    }

    pub fn value_record(&self) -> FormFieldValue {
        FormFieldValue {
            path: self.path.clone(),
            value: self.value.clone(),
        }
    }
}

/// Depth-first flattening of a schema document into its leaf fields.
///
/// `properties` insertion order is preserved at every level and becomes the
/// canonical display order. A leaf's value comes from the form-metadata
/// override, else the schema default, else the explicit `Absent` marker.
/// The reserved friendly-name path is always hidden.
pub fn flatten(document: &SchemaDocument) -> Result<Vec<FlatField>, SchemaError> {
    let mut fields = Vec::new();
    let mut current = Vec::new();
    walk(&document.properties, &mut current, &mut fields)?;
    Ok(fields)
}

fn walk(
    properties: &IndexMap<String, SchemaNode>,
    current: &mut Vec<String>,
    fields: &mut Vec<FlatField>,
) -> Result<(), SchemaError> {
    if current.len() >= MAX_SCHEMA_DEPTH {
        return Err(SchemaError::TooDeep {
            path: Path::from_segments(current.iter().cloned()),
        });
    }

    for (key, node) in properties {
        current.push(key.clone());
        if node.node_type == "object" {
            if let Some(children) = &node.properties {
                walk(children, current, fields)?;
            }
        } else {
            fields.push(leaf_field(node, Path::from_segments(current.iter().cloned())));
        }
        current.pop();
    }
    Ok(())
}

fn leaf_field(node: &SchemaNode, path: Path) -> FlatField {
    let form = node.form.as_ref();
    let value = form
        .and_then(|f| f.value.clone())
        .or_else(|| node.default.clone())
        .unwrap_or(FieldValue::Absent);
    let is_hidden =
        path == friendly_name_path() || form.and_then(|f| f.hidden).unwrap_or(false);

    FlatField {
        value,
        title: node.title.clone(),
        description: node.description.clone(),
        is_readonly: form.and_then(|f| f.readonly).unwrap_or(false),
        enum_values: node.enum_values.clone(),
        is_hidden,
        path,
    }
}
