use clap::Parser;
use slipway_core::api::{HttpPlatformApi, PlatformApi};
use slipway_core::context::{ContextProvider, EnvContext};
use slipway_core::launcher::Launcher;
use slipway_core::model::{FieldValue, FormFieldValue, Path};
use slipway_core::restorable::{ConfigStore, JsonFileStore};
use slipway_core::state::LauncherState;
use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "slipway")]
struct Args {
    /// Catalog server base URL (SLIPWAY_BASE_URL works too).
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    catalog: String,

    #[arg(long)]
    package: String,

    /// Field override, repeatable: --set postgres.main.username=admin
    #[arg(long = "set", value_name = "PATH=VALUE")]
    set: Vec<String>,

    /// Display name for the launched instance.
    #[arg(long)]
    friendly_name: Option<String>,

    /// Print the indexed form and exit.
    #[arg(long, default_value_t = false)]
    list_fields: bool,

    /// Dry run: print the deployment contract instead of launching.
    #[arg(long, default_value_t = false)]
    preview_only: bool,

    /// Save the configuration to the store file before acting.
    #[arg(long, default_value_t = false)]
    save: bool,

    #[arg(long, value_name = "PATH", default_value = "slipway_configs.json")]
    store_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!(?args, "parsed arguments");

    let base = args
        .base_url
        .clone()
        .or_else(|| std::env::var("SLIPWAY_BASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("missing --base-url or SLIPWAY_BASE_URL"))?;
    let base = Url::parse(base.trim())?;

    let api = HttpPlatformApi::new(base)?;
    let context = EnvContext::new();
    let store = JsonFileStore::new(args.store_file.clone());
    let mut launcher = Launcher::new(api, context, store);

    let overrides = parse_overrides(&args.set)?;
    launcher
        .initialize(&args.catalog, &args.package, overrides)
        .await?;
    eprintln!("initialized {}/{}", args.catalog, args.package);

    if let Some(name) = args.friendly_name.as_deref() {
        launcher.set_friendly_name(name)?;
    }

    if args.save {
        launcher.save_configuration()?;
        eprintln!("configuration saved to {}", args.store_file.display());
    }

    if args.list_fields {
        print_fields(&mut launcher)?;
        return Ok(());
    }

    if args.preview_only {
        let contract = launcher.preview_contract().await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::Value::Object(contract))?
        );
        return Ok(());
    }

    launcher.launch().await?;
    eprintln!("launched {}/{}", args.catalog, args.package);
    Ok(())
}

fn parse_overrides(raw: &[String]) -> anyhow::Result<Vec<FormFieldValue>> {
    let mut out = Vec::new();
    for entry in raw {
        let Some((path, value)) = entry.split_once('=') else {
            return Err(anyhow::anyhow!(
                "bad --set {entry:?}, expected PATH=VALUE"
            ));
        };
        out.push(FormFieldValue {
            path: Path::parse_dotted(path.trim()),
            value: parse_value(value.trim()),
        });
    }
    Ok(out)
}

fn parse_value(raw: &str) -> FieldValue {
    match raw {
        "true" => FieldValue::Bool(true),
        "false" => FieldValue::Bool(false),
        "null" => FieldValue::Absent,
        _ => raw
            .parse::<f64>()
            .map(FieldValue::Number)
            .unwrap_or_else(|_| FieldValue::Text(raw.to_string())),
    }
}

fn print_fields<A, C, S>(launcher: &mut Launcher<A, C, S>) -> anyhow::Result<()>
where
    A: PlatformApi,
    C: ContextProvider,
    S: ConfigStore,
{
    let changed: Vec<Path> = match launcher.state() {
        LauncherState::Ready(ready) => ready
            .changed_values
            .iter()
            .map(|f| f.path.clone())
            .collect(),
        LauncherState::NotInitialized => Vec::new(),
    };

    let indexed = launcher.indexed_form_fields()?;
    for (owner, tabs) in indexed {
        if tabs.is_empty() {
            continue;
        }
        eprintln!("[{owner}]");
        for (tab, fields) in tabs {
            eprintln!("  [{tab}]");
            for field in fields {
                let marker = if changed.contains(&field.path) { "*" } else { " " };
                let readonly = if field.is_readonly { " (readonly)" } else { "" };
                eprintln!(
                    "  {marker} {} = {}{readonly}",
                    field.path,
                    format_value(&field.value)
                );
            }
        }
    }
    Ok(())
}

fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Number(n) => format!("{n}"),
        FieldValue::Text(s) => format!("{s:?}"),
        FieldValue::Absent => "null".to_string(),
    }
}
