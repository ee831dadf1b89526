use crate::modules::schema::FlatField;
use slipway_model::{FieldValue, FormFieldValue, Path, RestorableConfig};

/// Launcher lifecycle. A configuration is either absent or fully derived;
/// there is no partial state.
#[derive(Debug, Clone)]
pub enum LauncherState {
    NotInitialized,
    Ready(ReadyState),
}

impl LauncherState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LauncherState::Ready(_))
    }

    pub fn as_ready(&self) -> Option<&ReadyState> {
        match self {
            LauncherState::Ready(ready) => Some(ready),
            LauncherState::NotInitialized => None,
        }
    }
}

/// Live configuration derived from a package schema. `defaults` is captured
/// once at construction and never mutated afterward; `changed_values` is the
/// subset of fields whose value differs from that snapshot.
#[derive(Debug, Clone)]
pub struct ReadyState {
    pub catalog_id: String,
    pub package_name: String,
    pub icon: Option<String>,
    pub changed_values: Vec<FormFieldValue>,
    pub contract: Option<serde_json::Map<String, serde_json::Value>>,
    pub is_saved: bool,
    fields: Vec<FlatField>,
    defaults: Vec<FormFieldValue>,
    dependencies: Vec<String>,
}

impl ReadyState {
    pub fn new(
        catalog_id: String,
        package_name: String,
        icon: Option<String>,
        fields: Vec<FlatField>,
        dependencies: Vec<String>,
    ) -> Self {
        let defaults = fields.iter().map(FlatField::value_record).collect();
        Self {
            catalog_id,
            package_name,
            icon,
            changed_values: Vec::new(),
            contract: None,
            is_saved: false,
            fields,
            defaults,
            dependencies,
        }
    }

    pub fn fields(&self) -> &[FlatField] {
        &self.fields
    }

    pub fn default_values(&self) -> &[FormFieldValue] {
        &self.defaults
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn field(&self, path: &Path) -> Option<&FlatField> {
        self.fields.iter().find(|f| f.path == *path)
    }

    /// The full live store as path/value records, in display order.
    pub fn live_values(&self) -> Vec<FormFieldValue> {
        self.fields.iter().map(FlatField::value_record).collect()
    }

    pub fn restorable_config(&self) -> RestorableConfig {
        RestorableConfig {
            catalog_id: self.catalog_id.clone(),
            package_name: self.package_name.clone(),
            field_values: self.changed_values.clone(),
        }
    }

    /// Applies a single-field edit and recomputes that field's change-set
    /// membership against the default snapshot. Returns the updated state and
    /// whether anything actually changed.
    ///
    /// An unknown path indicates a caller bug: it asserts in debug builds and
    /// is a logged no-op in release.
    pub fn with_field_value(mut self, path: &Path, value: FieldValue) -> (Self, bool) {
        let Some(field) = self.fields.iter_mut().find(|f| f.path == *path) else {
            debug_assert!(false, "with_field_value: unknown path {path}");
            log::warn!("ignoring value for unknown field path {path}");
            return (self, false);
        };
        if field.value == value {
            return (self, false);
        }
        field.value = value.clone();

        let differs = match self.defaults.iter().find(|d| d.path == *path) {
            Some(default) => differs_from_default(&default.value, &value),
            None => true,
        };
        if differs {
            match self.changed_values.iter_mut().find(|c| c.path == *path) {
                Some(entry) => entry.value = value,
                None => self.changed_values.push(FormFieldValue {
                    path: path.clone(),
                    value,
                }),
            }
        } else {
            self.changed_values.retain(|c| c.path != *path);
        }
        (self, true)
    }

    pub fn with_contract(
        mut self,
        contract: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn with_saved(mut self, is_saved: bool) -> Self {
        self.is_saved = is_saved;
        self
    }
}

/// Change-set membership test. A boolean edit compares against the
/// truthiness of the default (so a truthy text default counts as `true`);
/// any other edit is plain structural inequality.
pub fn differs_from_default(default: &FieldValue, new_value: &FieldValue) -> bool {
    match new_value {
        FieldValue::Bool(b) => default.truthiness() != *b,
        other => default != other,
    }
}
