use std::path::{Path, PathBuf};

use certcanvas::api::{ApiError, TemplateClient};
use certcanvas::assets::BaseUrlResolver;
use certcanvas::config::{self, ConfigError, EditorConfig};
use certcanvas::element::ElementType;
use certcanvas::template::{self, DocumentError, LoadedTemplate};
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("invalid design document: {0}")]
    Document(#[from] DocumentError),
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("{0} element(s) were dropped; refusing to push (use --force)")]
    Lossy(usize),
}

#[derive(Parser, Debug)]
#[command(name = "certcanvas", about = "Validate, pull, and push certificate design documents")]
struct Cli {
    #[arg(long, env = "CERT_API_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "CERT_API_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a design document, report repairs, and optionally print it normalized.
    Check {
        file: PathBuf,
        #[arg(long)]
        normalize: bool,
    },
    /// Download a template and write it normalized.
    Pull {
        id: String,
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Upload a design document, creating a template unless `--id` is given.
    Push {
        file: PathBuf,
        #[arg(long)]
        id: Option<String>,
        /// Push even if elements had to be dropped.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = EditorConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config = EditorConfig::from_lookup(|key| match key {
            "CERT_API_BASE_URL" => Some(base_url.clone()),
            _ => config::env_var(key),
        })?;
    }
    if cli.token.is_some() {
        config.api_token = cli.token;
    }

    match cli.command {
        Command::Check { file, normalize } => run_check(&config, &file, normalize),
        Command::Pull { id, out } => run_pull(&config, &id, out.as_deref()).await,
        Command::Push { file, id, force } => run_push(&config, &file, id.as_deref(), force).await,
    }
}

fn run_check(config: &EditorConfig, file: &Path, normalize: bool) -> Result<(), CliError> {
    let loaded = load_file(config, file)?;
    report(&loaded);
    if normalize {
        let doc = template::to_document(&loaded.pages, &loaded.name)?;
        println!("{}", serde_json::to_string_pretty(&doc)?);
    }
    Ok(())
}

async fn run_pull(config: &EditorConfig, id: &str, out: Option<&Path>) -> Result<(), CliError> {
    let client = TemplateClient::new(config)?;
    let raw = client.fetch_template(id).await?;
    let loaded = template::from_document(&raw, &BaseUrlResolver::new(&config.asset_base_url))?;
    report(&loaded);
    let rendered = serde_json::to_string_pretty(&template::to_document(&loaded.pages, &loaded.name)?)?;
    match out {
        Some(path) => {
            std::fs::write(path, rendered).map_err(|source| CliError::Io { path: path.to_path_buf(), source })?;
            eprintln!("wrote template {id} to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

async fn run_push(config: &EditorConfig, file: &Path, id: Option<&str>, force: bool) -> Result<(), CliError> {
    let loaded = load_file(config, file)?;
    report(&loaded);
    let dropped = loaded.warnings.iter().filter(|w| matches!(w, template::LoadWarning::DroppedElement { .. })).count();
    if dropped > 0 && !force {
        return Err(CliError::Lossy(dropped));
    }
    let doc: Value = template::to_document(&loaded.pages, &loaded.name)?;
    let client = TemplateClient::new(config)?;
    match id {
        Some(id) => {
            client.update_template(id, &doc).await?;
            eprintln!("updated template {id}");
        }
        None => {
            let id = client.create_template(&doc).await?;
            eprintln!("created template {id}");
        }
    }
    Ok(())
}

fn load_file(config: &EditorConfig, path: &Path) -> Result<LoadedTemplate, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io { path: path.to_path_buf(), source })?;
    Ok(template::from_str(&text, &BaseUrlResolver::new(&config.asset_base_url))?)
}

fn report(loaded: &LoadedTemplate) {
    let name = if loaded.name.is_empty() { "(unnamed)" } else { loaded.name.as_str() };
    eprintln!("{name}: {} page(s)", loaded.pages.len());
    for (index, page) in loaded.pages.iter().enumerate() {
        let count = |ty: ElementType| page.elements.iter().filter(|e| e.element_type() == ty).count();
        eprintln!(
            "  page {}: {}x{}, {} text, {} image, {} shape, {} qrcode",
            index + 1,
            page.width,
            page.height,
            count(ElementType::Text),
            count(ElementType::Image),
            count(ElementType::Shape),
            count(ElementType::Qrcode),
        );
    }
    for warning in &loaded.warnings {
        eprintln!("  warning: {warning}");
    }
}
