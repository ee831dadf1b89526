use slipway_model::RestorableConfig;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store file parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Persistence boundary for saved configurations. Equality is structural:
/// same catalog, package and change-set, order-independent.
pub trait ConfigStore {
    fn is_already_stored(&self, config: &RestorableConfig) -> bool;
    fn save(&mut self, config: RestorableConfig) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryConfigStore {
    configs: Vec<RestorableConfig>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configs(&self) -> &[RestorableConfig] {
        &self.configs
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn is_already_stored(&self, config: &RestorableConfig) -> bool {
        self.configs.iter().any(|c| c.is_same_as(config))
    }

    fn save(&mut self, config: RestorableConfig) -> Result<(), StoreError> {
        if !self.is_already_stored(&config) {
            self.configs.push(config);
        }
        Ok(())
    }
}

/// One JSON document on disk holding every saved configuration. A missing
/// file reads as an empty store.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Vec<RestorableConfig>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl ConfigStore for JsonFileStore {
    fn is_already_stored(&self, config: &RestorableConfig) -> bool {
        self.load()
            .map(|configs| configs.iter().any(|c| c.is_same_as(config)))
            .unwrap_or(false)
    }

    fn save(&mut self, config: RestorableConfig) -> Result<(), StoreError> {
        let mut configs = self.load()?;
        if !configs.iter().any(|c| c.is_same_as(&config)) {
            configs.push(config);
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&configs)?)?;
        Ok(())
    }
}
