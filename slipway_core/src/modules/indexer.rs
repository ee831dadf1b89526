use crate::modules::schema::FlatField;
use indexmap::IndexMap;
use slipway_model::FormField;

/// Owner name -> tab name -> fields, all insertion-ordered.
pub type IndexedFormFields = IndexMap<String, IndexMap<String, Vec<FormField>>>;

/// Owner key for fields that belong to no particular dependency.
pub const GLOBAL_OWNER: &str = "global";

/// Regroups the visible fields for presentation.
///
/// Owners are each dependency name in order, then `"global"`. A field is
/// claimed by the first owner matching its leading path segment and keyed by
/// its second segment (the tab). Whatever is left groups under the package's
/// own name, keyed by the *first* segment — those paths carry no owner prefix
/// to skip. Output records are structural copies with the hidden flag
/// stripped, so downstream mutation never reaches the canonical store.
pub fn index_form_fields(
    fields: &[FlatField],
    package_name: &str,
    dependencies: &[String],
) -> IndexedFormFields {
    let mut rest: Vec<&FlatField> = fields.iter().filter(|f| !f.is_hidden).collect();
    let mut indexed = IndexedFormFields::new();

    for owner in dependencies
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(GLOBAL_OWNER))
    {
        let mut tabs: IndexMap<String, Vec<FormField>> = IndexMap::new();
        rest.retain(|field| {
            if field.path.first() == Some(owner) {
                let tab = field.path.get(1).unwrap_or_default().to_string();
                tabs.entry(tab).or_default().push(field.public());
                false
            } else {
                true
            }
        });
        indexed.insert(owner.to_string(), tabs);
    }

    if !rest.is_empty() {
        let mut tabs: IndexMap<String, Vec<FormField>> = IndexMap::new();
        for field in rest {
            let tab = field.path.first().unwrap_or_default().to_string();
            tabs.entry(tab).or_default().push(field.public());
        }
        indexed.insert(package_name.to_string(), tabs);
    }

    indexed
}

/// Single-slot cache for a pure derivation. The cached value is returned
/// while the key compares equal; any other key recomputes and replaces the
/// slot, so a stale result can never be served for different input.
pub struct Memo<K, V> {
    slot: Option<(K, V)>,
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn new() -> Self {
        Self { slot: None }
    }

    pub fn get_or_insert_with(&mut self, key: K, compute: impl FnOnce() -> V) -> &V {
        let fresh = matches!(&self.slot, Some((k, _)) if *k == key);
        if !fresh {
            self.slot = Some((key, compute()));
        }
        let Some((_, value)) = &self.slot else {
            unreachable!("memo slot filled above")
        };
        value
    }
}

impl<K: PartialEq, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
