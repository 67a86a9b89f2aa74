use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use easel_server::{EaselServer, Identity, JwtAuth, ServerConfig};
use easel_store::{open_store, BackendConfig, S3Config, Store, TracingObserver};
use easel_types::{Canvas, CanvasMetadata, DocumentId};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Doc(args) => cmd_doc(&config, args.action, &format).await,
        Command::Canvas(args) => cmd_canvas(&config, args.action, &format).await,
        Command::Token(args) => cmd_token(&config, args.action, &format),
    }
}

/// Config file (or defaults), then environment, then command-line flags.
fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => {
            let mut config = ServerConfig::default();
            config.apply_env()?;
            config
        }
    };
    if let Some(root) = &cli.root {
        config.store.backend = BackendConfig::Filesystem { root: root.clone() };
    }
    if let Some(bucket) = &cli.bucket {
        config.store.backend = BackendConfig::S3(S3Config::new(bucket.clone()));
    }
    if let Some(region) = &cli.region {
        match &mut config.store.backend {
            BackendConfig::S3(s3) => s3.region = Some(region.clone()),
            other => bail!("--region applies to the S3 backend, not {}", other.name()),
        }
    }
    Ok(config)
}

async fn open(config: &ServerConfig) -> anyhow::Result<Arc<dyn Store>> {
    open_store(&config.store, Arc::new(TracingObserver))
        .await
        .with_context(|| format!("opening {} store", config.store.backend.name()))
}

fn read_input(file: &str) -> anyhow::Result<Vec<u8>> {
    if file == "-" {
        let mut data = Vec::new();
        std::io::stdin()
            .read_to_end(&mut data)
            .context("reading stdin")?;
        return Ok(data);
    }
    std::fs::read(file).with_context(|| format!("reading {file}"))
}

fn write_output(output: Option<&Path>, data: &[u8]) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

async fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind:?}"))?;
    }
    let server = EaselServer::open(config).await?;
    println!(
        "{} easel server on {} ({} store)",
        "✓".green().bold(),
        server.config().bind_addr.to_string().bold(),
        server.config().store.backend.name()
    );
    server.serve().await?;
    Ok(())
}

async fn cmd_doc(
    config: &ServerConfig,
    action: DocAction,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let store = open(config).await?;
    match action {
        DocAction::Put { file } => {
            let data = read_input(&file)?;
            let id = store.create(&data).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "id": id.as_str() })),
                OutputFormat::Text => println!(
                    "{} Stored {} bytes as {}",
                    "✓".green().bold(),
                    data.len(),
                    id.as_str().yellow()
                ),
            }
        }
        DocAction::Get { id, output } => {
            let id = DocumentId::parse(&id)?;
            let document = store.find_by_id(&id).await?;
            write_output(output.as_deref(), &document.data)?;
        }
    }
    Ok(())
}

async fn cmd_canvas(
    config: &ServerConfig,
    action: CanvasAction,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let store = open(config).await?;
    match action {
        CanvasAction::List { owner } => {
            let mut listed = store.list(&owner).await?;
            listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listed)?),
                OutputFormat::Text if listed.is_empty() => {
                    println!("No canvases for {}.", owner.bold())
                }
                OutputFormat::Text => {
                    for canvas in &listed {
                        println!(
                            "{}  {}  {}",
                            canvas.id.yellow(),
                            canvas.updated_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                            canvas.name
                        );
                    }
                }
            }
        }
        CanvasAction::Get { owner, id, output } => {
            let canvas = store.get(&owner, &id).await?;
            write_output(output.as_deref(), &canvas.data)?;
        }
        CanvasAction::Put {
            owner,
            id,
            file,
            name,
        } => {
            let mut canvas = Canvas::new(owner, id, read_input(&file)?);
            if let Some(name) = name {
                canvas = canvas.with_name(name);
            }
            let saved = store.save(&canvas).await?;
            print_saved(&saved, "Saved", format)?;
        }
        CanvasAction::Rm { owner, id } => {
            store.delete(&owner, &id).await?;
            if let OutputFormat::Text = format {
                println!("Deleted canvas {}/{}", owner.bold(), id.yellow());
            }
        }
        CanvasAction::Rename { owner, id, name } => {
            let saved = store.rename(&owner, &id, &name).await?;
            print_saved(&saved, "Renamed", format)?;
        }
    }
    Ok(())
}

fn print_saved(saved: &CanvasMetadata, verb: &str, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(saved)?),
        OutputFormat::Text => println!(
            "{} {} {}/{} ({})",
            "✓".green().bold(),
            verb,
            saved.owner_id.bold(),
            saved.id.yellow(),
            saved.name
        ),
    }
    Ok(())
}

fn cmd_token(
    config: &ServerConfig,
    action: TokenAction,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    match action {
        TokenAction::Issue { owner, login, name } => {
            if config.jwt_secret.is_empty() {
                bail!("no signing secret; set jwt_secret in --config or JWT_SECRET");
            }
            let auth = JwtAuth::new(
                &config.jwt_secret,
                Duration::from_secs(config.token_ttl_secs),
            );
            let mut identity = Identity::new(owner);
            if let Some(login) = login {
                identity = identity.with_login(login);
            }
            if let Some(name) = name {
                identity = identity.with_name(name);
            }
            let token = auth.issue(&identity)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "token": token })),
                OutputFormat::Text => println!("{token}"),
            }
        }
    }
    Ok(())
}
