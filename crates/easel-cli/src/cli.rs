use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "easel",
    about = "easel -- share links and per-owner canvas storage",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Server config file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the filesystem backend rooted here
    #[arg(long, global = true, conflicts_with = "bucket")]
    pub root: Option<PathBuf>,

    /// Use the S3 backend with this bucket
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Region for the S3 backend, from --bucket or the config
    #[arg(long, global = true)]
    pub region: Option<String>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Store and fetch share-link documents
    Doc(DocArgs),
    /// Manage an owner's canvases
    Canvas(CanvasArgs),
    /// Mint bearer tokens
    Token(TokenArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override the configured listen address
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct DocArgs {
    #[command(subcommand)]
    pub action: DocAction,
}

#[derive(Subcommand)]
pub enum DocAction {
    /// Store a file (or stdin with `-`) and print its id
    Put { file: String },
    /// Fetch a document by id
    Get {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct CanvasArgs {
    #[command(subcommand)]
    pub action: CanvasAction,
}

#[derive(Subcommand)]
pub enum CanvasAction {
    List {
        owner: String,
    },
    Get {
        owner: String,
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Put {
        owner: String,
        id: String,
        /// Payload file, or `-` for stdin
        file: String,
        #[arg(long)]
        name: Option<String>,
    },
    Rm {
        owner: String,
        id: String,
    },
    Rename {
        owner: String,
        id: String,
        name: String,
    },
}

#[derive(Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub action: TokenAction,
}

#[derive(Subcommand)]
pub enum TokenAction {
    /// Issue a token for `owner` signed with the configured secret
    Issue {
        owner: String,
        #[arg(long)]
        login: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
}
