use crate::modules::template::{render, TemplateParams};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use slipway_model::{Catalog, DependencyDescriptor, LaunchOutcome, LaunchRequest, SchemaDocument};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog server request failed: status={status} body={body}")]
    BadStatus { status: StatusCode, body: String },
    #[error("response parse failed: {0}")]
    Parse(String),
    #[error("invalid endpoint url: {0}")]
    BadUrl(String),
}

/// Catalog-server operations the launcher depends on. `rendered_schema`
/// returns a document with the template parameters already substituted.
#[allow(async_fn_in_trait)]
pub trait PlatformApi {
    async fn rendered_schema(
        &self,
        catalog_id: &str,
        package_name: &str,
        params: &TemplateParams,
    ) -> Result<(SchemaDocument, Vec<DependencyDescriptor>), ApiError>;

    async fn catalogs(&self) -> Result<Vec<Catalog>, ApiError>;

    async fn launch_package(&self, request: LaunchRequest) -> Result<LaunchOutcome, ApiError>;
}

#[derive(Deserialize)]
struct ConfigResponse {
    schema: serde_json::Value,
    #[serde(default)]
    dependencies: Vec<DependencyDescriptor>,
}

/// HTTP implementation against a catalog server.
pub struct HttpPlatformApi {
    base: Url,
    http: reqwest::Client,
}

impl HttpPlatformApi {
    pub fn new(base: Url) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(http_timeout())
            .build()?;
        Ok(Self { base, http })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| ApiError::BadUrl(self.base.to_string()))?;
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::BadStatus { status, body });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

fn http_timeout() -> Duration {
    let secs = std::env::var("SLIPWAY_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(30);
    Duration::from_secs(secs)
}

impl PlatformApi for HttpPlatformApi {
    async fn rendered_schema(
        &self,
        catalog_id: &str,
        package_name: &str,
        params: &TemplateParams,
    ) -> Result<(SchemaDocument, Vec<DependencyDescriptor>), ApiError> {
        let url = self.endpoint(&[
            "catalogs",
            catalog_id,
            "packages",
            package_name,
            "config-schema",
        ])?;
        let response: ConfigResponse = self.get_json(url).await?;

        // The server ships the document raw; placeholders are substituted in
        // the serialized text, then the result is parsed into the typed form.
        let raw = serde_json::to_string(&response.schema)
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        let rendered = render(&raw, params);
        let document: SchemaDocument = serde_json::from_str(&rendered)
            .map_err(|e| ApiError::Parse(format!("rendered schema: {e}")))?;

        Ok((document, response.dependencies))
    }

    async fn catalogs(&self) -> Result<Vec<Catalog>, ApiError> {
        self.get_json(self.endpoint(&["catalogs"])?).await
    }

    async fn launch_package(&self, request: LaunchRequest) -> Result<LaunchOutcome, ApiError> {
        let url = self.endpoint(&["launch"])?;
        let response = self.http.post(url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::BadStatus { status, body });
        }
        response
            .json::<LaunchOutcome>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}
