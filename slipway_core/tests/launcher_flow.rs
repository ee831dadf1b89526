use slipway_core::api::{ApiError, PlatformApi};
use slipway_core::context::{
    ContextError, ContextProvider, StorageCredentials, UserClaims, UserPrefs, VaultConnection,
};
use slipway_core::launcher::{Launcher, LauncherError};
use slipway_core::model::{
    Catalog, CatalogPackage, DependencyDescriptor, FieldValue, FormFieldValue, LaunchOutcome,
    LaunchRequest, Path, RestorableConfig, SchemaDocument,
};
use slipway_core::restorable::{ConfigStore, InMemoryConfigStore};
use slipway_core::state::LauncherState;
use slipway_core::template::{render, TemplateParams};
use std::sync::Mutex;
use zeroize::Zeroizing;

const SCHEMA: &str = r#"{
  "properties": {
    "slipway": {
      "type": "object",
      "properties": {
        "friendly_name": { "type": "string", "default": "demo" }
      }
    },
    "git": {
      "type": "object",
      "properties": {
        "email": { "type": "string", "default": "a@x.com" },
        "username": { "type": "string", "default": "{{user.idep}}" }
      }
    },
    "postgres": {
      "type": "object",
      "properties": {
        "main": {
          "type": "object",
          "properties": {
            "username": { "type": "string", "default": "admin" }
          }
        }
      }
    },
    "global": {
      "type": "object",
      "properties": {
        "network": {
          "type": "object",
          "properties": {
            "port": { "type": "number", "default": 5432 }
          }
        }
      }
    }
  }
}"#;

struct MockApi {
    schema: &'static str,
    dependencies: Vec<DependencyDescriptor>,
    catalogs: Vec<Catalog>,
    schema_fetches: Mutex<u32>,
    launches: Mutex<Vec<LaunchRequest>>,
    fail_launch: bool,
    contract: serde_json::Map<String, serde_json::Value>,
}

fn mock_api() -> MockApi {
    let contract = match serde_json::json!({ "apiVersion": "v1", "kind": "Contract" }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };
    MockApi {
        schema: SCHEMA,
        dependencies: vec![DependencyDescriptor {
            name: "postgres".to_string(),
            enabled: true,
        }],
        catalogs: vec![Catalog {
            id: "main".to_string(),
            packages: vec![CatalogPackage {
                name: "workbench".to_string(),
                icon: Some("https://icons.test/workbench.svg".to_string()),
            }],
        }],
        schema_fetches: Mutex::new(0),
        launches: Mutex::new(Vec::new()),
        fail_launch: false,
        contract,
    }
}

impl PlatformApi for MockApi {
    async fn rendered_schema(
        &self,
        _catalog_id: &str,
        _package_name: &str,
        params: &TemplateParams,
    ) -> Result<(SchemaDocument, Vec<DependencyDescriptor>), ApiError> {
        *self.schema_fetches.lock().expect("fetch counter") += 1;
        let rendered = render(self.schema, params);
        let document = serde_json::from_str(&rendered).expect("valid schema fixture");
        Ok((document, self.dependencies.clone()))
    }

    async fn catalogs(&self) -> Result<Vec<Catalog>, ApiError> {
        Ok(self.catalogs.clone())
    }

    async fn launch_package(&self, request: LaunchRequest) -> Result<LaunchOutcome, ApiError> {
        if self.fail_launch {
            return Err(ApiError::Parse("launch refused".to_string()));
        }
        self.launches.lock().expect("launch log").push(request);
        Ok(LaunchOutcome {
            contract: self.contract.clone(),
        })
    }
}

struct MockContext;

impl ContextProvider for MockContext {
    fn user_claims(&self) -> Result<UserClaims, ContextError> {
        Ok(UserClaims {
            idep: "jdoe".to_string(),
            family_name: "Doe".to_string(),
            given_name: "Jane".to_string(),
            email: "jane.doe@example.com".to_string(),
        })
    }

    fn user_prefs(&self) -> Result<UserPrefs, ContextError> {
        Ok(UserPrefs {
            service_password: None,
            git_name: "jdoe".to_string(),
            git_email: "jane.doe@example.com".to_string(),
            git_credentials_cache_duration: 3600,
            api_token: None,
        })
    }

    fn vault_connection(&self) -> Result<VaultConnection, ContextError> {
        Ok(VaultConnection {
            addr: "https://vault.test".to_string(),
            token: Zeroizing::new("vault-token".to_string()),
            mount: "secret".to_string(),
        })
    }

    fn storage_credentials(&self) -> Result<StorageCredentials, ContextError> {
        Ok(StorageCredentials {
            access_key_id: "AKTEST".to_string(),
            secret_access_key: Zeroizing::new("sk-test".to_string()),
            session_token: None,
            default_region: "us-east-1".to_string(),
            endpoint: "https://s3.test".to_string(),
        })
    }

    async fn public_ip(&self) -> Result<String, ContextError> {
        Ok("203.0.113.7".to_string())
    }
}

fn new_launcher(api: MockApi) -> Launcher<MockApi, MockContext, InMemoryConfigStore> {
    Launcher::new(api, MockContext, InMemoryConfigStore::new())
}

fn git_email_path() -> Path {
    Path::from_segments(["git", "email"])
}

fn changed_of(launcher: &Launcher<MockApi, MockContext, InMemoryConfigStore>) -> Vec<FormFieldValue> {
    match launcher.state() {
        LauncherState::Ready(ready) => ready.changed_values.clone(),
        LauncherState::NotInitialized => panic!("expected ready state"),
    }
}

#[tokio::test]
async fn edit_enters_and_leaves_the_change_set() {
    let mut launcher = new_launcher(mock_api());
    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("initialize");
    assert!(changed_of(&launcher).is_empty());

    launcher
        .set_field_value(&git_email_path(), FieldValue::Text("b@x.com".to_string()))
        .expect("set");
    assert_eq!(
        changed_of(&launcher),
        vec![FormFieldValue {
            path: git_email_path(),
            value: FieldValue::Text("b@x.com".to_string()),
        }]
    );

    launcher
        .set_field_value(&git_email_path(), FieldValue::Text("a@x.com".to_string()))
        .expect("set back");
    assert!(changed_of(&launcher).is_empty());
}

#[tokio::test]
async fn setting_the_current_value_is_a_noop() {
    let mut launcher = new_launcher(mock_api());
    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("initialize");

    launcher
        .set_field_value(&git_email_path(), FieldValue::Text("a@x.com".to_string()))
        .expect("set");
    assert!(changed_of(&launcher).is_empty());
}

#[tokio::test]
async fn template_params_are_rendered_into_the_schema() {
    let mut launcher = new_launcher(mock_api());
    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("initialize");

    let ready = launcher.state().as_ready().expect("ready");
    let field = ready
        .field(&Path::from_segments(["git", "username"]))
        .expect("rendered field");
    assert_eq!(field.value, FieldValue::Text("jdoe".to_string()));
    assert_eq!(ready.icon.as_deref(), Some("https://icons.test/workbench.svg"));
}

#[tokio::test]
async fn reinitializing_the_same_configuration_skips_the_fetch() {
    let mut launcher = new_launcher(mock_api());
    let override_set = vec![FormFieldValue {
        path: git_email_path(),
        value: FieldValue::Text("b@x.com".to_string()),
    }];

    launcher
        .initialize("main", "workbench", override_set.clone())
        .await
        .expect("first initialize");
    launcher
        .initialize("main", "workbench", override_set)
        .await
        .expect("second initialize");
    assert_eq!(*launcher.api().schema_fetches.lock().expect("counter"), 1);

    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("third initialize");
    assert_eq!(*launcher.api().schema_fetches.lock().expect("counter"), 2);
}

#[tokio::test]
async fn launch_discards_the_configuration() {
    let mut launcher = new_launcher(mock_api());
    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("initialize");
    launcher.launch().await.expect("launch");

    assert!(!launcher.state().is_ready());
    let err = launcher
        .set_field_value(&git_email_path(), FieldValue::Text("b@x.com".to_string()))
        .expect_err("mutation after launch");
    assert!(matches!(err, LauncherError::NotReady));
    let err = launcher.indexed_form_fields().expect_err("query after launch");
    assert!(matches!(err, LauncherError::NotReady));

    let launches = launcher.api().launches.lock().expect("launch log");
    assert_eq!(launches.len(), 1);
    assert!(!launches[0].dry_run);
}

#[tokio::test]
async fn launch_options_mirror_the_live_store() {
    let mut launcher = new_launcher(mock_api());
    launcher
        .initialize(
            "main",
            "workbench",
            vec![FormFieldValue {
                path: git_email_path(),
                value: FieldValue::Text("b@x.com".to_string()),
            }],
        )
        .await
        .expect("initialize");
    launcher.launch().await.expect("launch");

    let launches = launcher.api().launches.lock().expect("launch log");
    let options = serde_json::Value::Object(launches[0].options.clone());
    assert_eq!(options["git"]["email"], serde_json::json!("b@x.com"));
    assert_eq!(options["git"]["username"], serde_json::json!("jdoe"));
    assert_eq!(
        options["postgres"]["main"]["username"],
        serde_json::json!("admin")
    );
    assert_eq!(options["global"]["network"]["port"], serde_json::json!(5432.0));
    assert_eq!(options["slipway"]["friendly_name"], serde_json::json!("demo"));
}

#[tokio::test]
async fn preview_keeps_the_configuration_and_stores_the_contract() {
    let mut launcher = new_launcher(mock_api());
    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("initialize");

    let contract = launcher.preview_contract().await.expect("preview");
    assert_eq!(contract["kind"], serde_json::json!("Contract"));
    assert!(launcher.state().is_ready());
    let ready = launcher.state().as_ready().expect("ready");
    assert_eq!(
        ready.contract.as_ref().expect("stored contract")["kind"],
        serde_json::json!("Contract")
    );
    assert!(launcher.api().launches.lock().expect("launch log")[0].dry_run);
}

#[tokio::test]
async fn failed_launch_leaves_the_configuration_untouched() {
    let mut api = mock_api();
    api.fail_launch = true;
    let mut launcher = new_launcher(api);
    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("initialize");
    launcher
        .set_field_value(&git_email_path(), FieldValue::Text("b@x.com".to_string()))
        .expect("set");

    launcher.launch().await.expect_err("launch should fail");
    assert!(launcher.state().is_ready());
    assert_eq!(changed_of(&launcher).len(), 1);
}

#[tokio::test]
async fn failed_initialize_keeps_the_previous_configuration() {
    let mut launcher = new_launcher(mock_api());
    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("initialize");

    let err = launcher
        .initialize("main", "no-such-package", Vec::new())
        .await
        .expect_err("unknown package");
    assert!(matches!(err, LauncherError::UnknownPackage { .. }));

    let ready = launcher.state().as_ready().expect("previous state kept");
    assert_eq!(ready.package_name, "workbench");
}

#[tokio::test]
async fn saved_status_tracks_the_store() {
    let mut store = InMemoryConfigStore::new();
    store
        .save(RestorableConfig {
            catalog_id: "main".to_string(),
            package_name: "workbench".to_string(),
            field_values: vec![FormFieldValue {
                path: git_email_path(),
                value: FieldValue::Text("b@x.com".to_string()),
            }],
        })
        .expect("seed store");
    let mut launcher = Launcher::new(mock_api(), MockContext, store);

    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("initialize");
    assert!(!launcher.state().as_ready().expect("ready").is_saved);

    launcher
        .set_field_value(&git_email_path(), FieldValue::Text("b@x.com".to_string()))
        .expect("set");
    assert!(launcher.state().as_ready().expect("ready").is_saved);

    launcher
        .set_field_value(&git_email_path(), FieldValue::Text("a@x.com".to_string()))
        .expect("set back");
    assert!(!launcher.state().as_ready().expect("ready").is_saved);
}

#[tokio::test]
async fn save_configuration_marks_the_state_saved() {
    let mut launcher = new_launcher(mock_api());
    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("initialize");
    launcher
        .set_field_value(&git_email_path(), FieldValue::Text("b@x.com".to_string()))
        .expect("set");
    assert!(!launcher.state().as_ready().expect("ready").is_saved);

    launcher.save_configuration().expect("save");
    assert!(launcher.state().as_ready().expect("ready").is_saved);
}

#[tokio::test]
async fn friendly_name_reads_and_writes_the_reserved_field() {
    let mut launcher = new_launcher(mock_api());
    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("initialize");

    assert_eq!(launcher.friendly_name().expect("friendly name"), "demo");

    launcher
        .set_friendly_name("my workbench")
        .expect("set friendly name");
    assert_eq!(launcher.friendly_name().expect("friendly name"), "my workbench");

    // The reserved field never shows up in the indexed form.
    let indexed = launcher.indexed_form_fields().expect("indexed").clone();
    assert!(indexed
        .values()
        .flat_map(|tabs| tabs.values())
        .flatten()
        .all(|field| field.path != slipway_core::model::friendly_name_path()));
}

#[tokio::test]
async fn indexed_form_reflects_edits() {
    let mut launcher = new_launcher(mock_api());
    launcher
        .initialize("main", "workbench", Vec::new())
        .await
        .expect("initialize");

    let before = launcher.indexed_form_fields().expect("indexed").clone();
    assert_eq!(
        before["workbench"]["git"][0].value,
        FieldValue::Text("a@x.com".to_string())
    );

    launcher
        .set_field_value(&git_email_path(), FieldValue::Text("b@x.com".to_string()))
        .expect("set");
    let after = launcher.indexed_form_fields().expect("indexed").clone();
    assert_eq!(
        after["workbench"]["git"][0].value,
        FieldValue::Text("b@x.com".to_string())
    );
    assert_ne!(before, after);
}
