use zeroize::Zeroizing;

/// Contextual parameters rendered into a schema document before it is
/// parsed and flattened. Secret-bearing fields are zeroized on drop.
#[derive(Clone)]
pub struct TemplateParams {
    pub user: UserParams,
    pub git: GitParams,
    pub vault: VaultParams,
    pub s3: StorageParams,
    pub api_token: Option<Zeroizing<String>>,
}

#[derive(Clone)]
pub struct UserParams {
    pub idep: String,
    pub name: String,
    pub email: String,
    pub password: Option<Zeroizing<String>>,
    pub ip: String,
}

#[derive(Clone)]
pub struct GitParams {
    pub name: String,
    pub email: String,
    pub credentials_cache_duration: u32,
}

#[derive(Clone)]
pub struct VaultParams {
    pub addr: String,
    pub token: Zeroizing<String>,
    pub mount: String,
    pub top_dir: String,
}

#[derive(Clone)]
pub struct StorageParams {
    pub access_key_id: String,
    pub secret_access_key: Zeroizing<String>,
    pub session_token: Option<Zeroizing<String>>,
    pub default_region: String,
    pub endpoint: String,
    pub bucket_name: String,
}

impl TemplateParams {
    /// Placeholder keys as the schema documents spell them.
    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![
            ("user.idep", self.user.idep.clone()),
            ("user.name", self.user.name.clone()),
            ("user.email", self.user.email.clone()),
            (
                "user.password",
                self.user
                    .password
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
            ),
            ("user.ip", self.user.ip.clone()),
            ("git.name", self.git.name.clone()),
            ("git.email", self.git.email.clone()),
            (
                "git.credentials_cache_duration",
                self.git.credentials_cache_duration.to_string(),
            ),
            ("vault.VAULT_ADDR", self.vault.addr.clone()),
            ("vault.VAULT_TOKEN", self.vault.token.to_string()),
            ("vault.VAULT_MOUNT", self.vault.mount.clone()),
            ("vault.VAULT_TOP_DIR", self.vault.top_dir.clone()),
            ("s3.AWS_ACCESS_KEY_ID", self.s3.access_key_id.clone()),
            (
                "s3.AWS_SECRET_ACCESS_KEY",
                self.s3.secret_access_key.to_string(),
            ),
            (
                "s3.AWS_SESSION_TOKEN",
                self.s3
                    .session_token
                    .as_ref()
                    .map(|t| t.to_string())
                    .unwrap_or_default(),
            ),
            ("s3.AWS_DEFAULT_REGION", self.s3.default_region.clone()),
            ("s3.AWS_S3_ENDPOINT", self.s3.endpoint.clone()),
            ("s3.AWS_BUCKET_NAME", self.s3.bucket_name.clone()),
        ];
        out.push((
            "apiToken",
            self.api_token
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_default(),
        ));
        out
    }
}

/// Substitutes `{{dotted.key}}` placeholders in a raw schema document.
///
/// Values are escaped for the JSON string literals they land in. Unknown
/// placeholders are left verbatim; the parse step that follows is the one
/// that surfaces them.
pub fn render(raw: &str, params: &TemplateParams) -> String {
    let pairs = params.pairs();
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match pairs.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(&json_escape(value)),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn json_escape(value: &str) -> String {
    match serde_json::to_string(value) {
        Ok(quoted) => quoted[1..quoted.len() - 1].to_string(),
        Err(_) => value.to_string(),
    }
}
