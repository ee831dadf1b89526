use crate::modules::api::{ApiError, PlatformApi};
use crate::modules::context::{assemble_template_params, ContextError, ContextProvider};
use crate::modules::indexer::{index_form_fields, IndexedFormFields, Memo};
use crate::modules::restorable::{ConfigStore, StoreError};
use crate::modules::schema::{flatten, SchemaError};
use crate::modules::state::{LauncherState, ReadyState};
use slipway_model::{
    form_field_values_to_object, friendly_name_path, FieldValue, FormFieldValue, LaunchRequest,
    Path, RestorableConfig,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("launcher is not initialized")]
    NotReady,
    #[error("package {package} not found in catalog {catalog}")]
    UnknownPackage { catalog: String, package: String },
    #[error("friendly name field is missing or not a text value")]
    FriendlyName,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the launcher state machine and its collaborators.
///
/// All mutation goes through `&mut self`, so operations on one configuration
/// are serialized by construction; callers that need shared access put the
/// launcher behind a single dispatch task. State transitions are applied as
/// whole-value replacements, and operations that await a collaborator gather
/// what they need first and only commit after the call succeeds.
pub struct Launcher<A, C, S> {
    api: A,
    context: C,
    store: S,
    state: LauncherState,
    // Bumped on every accepted mutation; keys the single-slot memos below.
    revision: u64,
    index_memo: Memo<u64, IndexedFormFields>,
    friendly_memo: Memo<u64, Option<FieldValue>>,
}

impl<A, C, S> Launcher<A, C, S>
where
    A: PlatformApi,
    C: ContextProvider,
    S: ConfigStore,
{
    pub fn new(api: A, context: C, store: S) -> Self {
        Self {
            api,
            context,
            store,
            state: LauncherState::NotInitialized,
            revision: 0,
            index_memo: Memo::new(),
            friendly_memo: Memo::new(),
        }
    }

    pub fn state(&self) -> &LauncherState {
        &self.state
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn ready(&self) -> Result<&ReadyState, LauncherError> {
        self.state.as_ready().ok_or(LauncherError::NotReady)
    }

    /// Derives a fresh configuration for `catalog_id`/`package_name` and
    /// replays `changed_values` on top of it.
    ///
    /// A request identical to the live configuration (same catalog, package
    /// and change-set) is a no-op and performs no schema fetch.
    pub async fn initialize(
        &mut self,
        catalog_id: &str,
        package_name: &str,
        changed_values: Vec<FormFieldValue>,
    ) -> Result<(), LauncherError> {
        if let LauncherState::Ready(ready) = &self.state {
            let requested = RestorableConfig {
                catalog_id: catalog_id.to_string(),
                package_name: package_name.to_string(),
                field_values: changed_values.clone(),
            };
            if ready.restorable_config().is_same_as(&requested) {
                log::debug!("initialize: {catalog_id}/{package_name} already live, skipping");
                return Ok(());
            }
        }

        let params = assemble_template_params(&self.context).await?;
        let (document, dependency_descriptors) = self
            .api
            .rendered_schema(catalog_id, package_name, &params)
            .await?;
        let fields = flatten(&document)?;

        let icon = self
            .api
            .catalogs()
            .await?
            .into_iter()
            .find(|c| c.id == catalog_id)
            .and_then(|c| c.packages.into_iter().find(|p| p.name == package_name))
            .ok_or_else(|| LauncherError::UnknownPackage {
                catalog: catalog_id.to_string(),
                package: package_name.to_string(),
            })?
            .icon;

        let mut dependencies: Vec<String> = Vec::new();
        for descriptor in dependency_descriptors {
            if descriptor.enabled && !dependencies.contains(&descriptor.name) {
                dependencies.push(descriptor.name);
            }
        }

        log::debug!(
            "initialized {catalog_id}/{package_name}: {} fields, {} dependencies",
            fields.len(),
            dependencies.len()
        );
        self.state = LauncherState::Ready(ReadyState::new(
            catalog_id.to_string(),
            package_name.to_string(),
            icon,
            fields,
            dependencies,
        ));
        self.revision += 1;

        // Replay the requested change-set through the regular mutation path
        // so membership and default comparisons are re-established rather
        // than trusted as given.
        for entry in changed_values {
            self.set_field_value(&entry.path, entry.value)?;
        }
        self.refresh_saved_status();
        Ok(())
    }

    /// Single-field edit. No-op when the value equals the current one.
    pub fn set_field_value(
        &mut self,
        path: &Path,
        value: FieldValue,
    ) -> Result<(), LauncherError> {
        let LauncherState::Ready(ready) =
            std::mem::replace(&mut self.state, LauncherState::NotInitialized)
        else {
            return Err(LauncherError::NotReady);
        };
        let (ready, changed) = ready.with_field_value(path, value);
        self.state = LauncherState::Ready(ready);
        if changed {
            self.revision += 1;
            self.refresh_saved_status();
        }
        Ok(())
    }

    /// Dry run: submits the current configuration and stores the returned
    /// contract. The configuration stays live.
    pub async fn preview_contract(
        &mut self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, LauncherError> {
        self.launch_or_preview(true).await?;
        Ok(self.ready()?.contract.clone().unwrap_or_default())
    }

    /// Real launch. On success the configuration is discarded.
    pub async fn launch(&mut self) -> Result<(), LauncherError> {
        self.launch_or_preview(false).await
    }

    async fn launch_or_preview(&mut self, dry_run: bool) -> Result<(), LauncherError> {
        let request = {
            let ready = self.ready()?;
            LaunchRequest {
                catalog_id: ready.catalog_id.clone(),
                package_name: ready.package_name.clone(),
                options: form_field_values_to_object(&ready.live_values()),
                dry_run,
            }
        };
        let outcome = self.api.launch_package(request).await?;

        // State moves only after the call has succeeded.
        if dry_run {
            let LauncherState::Ready(ready) =
                std::mem::replace(&mut self.state, LauncherState::NotInitialized)
            else {
                return Err(LauncherError::NotReady);
            };
            self.state = LauncherState::Ready(ready.with_contract(outcome.contract));
        } else {
            log::debug!("launched, discarding configuration");
            self.state = LauncherState::NotInitialized;
            self.revision += 1;
        }
        Ok(())
    }

    /// The indexed, presentation-ready form. Memoized until the next
    /// accepted mutation.
    pub fn indexed_form_fields(&mut self) -> Result<&IndexedFormFields, LauncherError> {
        let LauncherState::Ready(ready) = &self.state else {
            return Err(LauncherError::NotReady);
        };
        let revision = self.revision;
        Ok(self.index_memo.get_or_insert_with(revision, || {
            index_form_fields(ready.fields(), &ready.package_name, ready.dependencies())
        }))
    }

    pub fn friendly_name(&mut self) -> Result<String, LauncherError> {
        let LauncherState::Ready(ready) = &self.state else {
            return Err(LauncherError::NotReady);
        };
        let revision = self.revision;
        let value = self.friendly_memo.get_or_insert_with(revision, || {
            ready.field(&friendly_name_path()).map(|f| f.value.clone())
        });
        match value {
            Some(FieldValue::Text(name)) => Ok(name.clone()),
            Some(FieldValue::Number(n)) => Ok(n.to_string()),
            _ => Err(LauncherError::FriendlyName),
        }
    }

    pub fn set_friendly_name(&mut self, name: &str) -> Result<(), LauncherError> {
        self.set_field_value(&friendly_name_path(), FieldValue::Text(name.to_string()))
    }

    /// Persists the current configuration through the store collaborator.
    pub fn save_configuration(&mut self) -> Result<(), LauncherError> {
        let config = self.ready()?.restorable_config();
        self.store.save(config)?;
        self.refresh_saved_status();
        Ok(())
    }

    pub fn restorable_config(&self) -> Result<RestorableConfig, LauncherError> {
        Ok(self.ready()?.restorable_config())
    }

    fn refresh_saved_status(&mut self) {
        let LauncherState::Ready(ready) =
            std::mem::replace(&mut self.state, LauncherState::NotInitialized)
        else {
            return;
        };
        let is_saved = self.store.is_already_stored(&ready.restorable_config());
        self.state = LauncherState::Ready(ready.with_saved(is_saved));
    }
}
