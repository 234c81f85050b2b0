//! waldrive: encrypted file storage on Walrus
//!
//! Commands:
//!   upload <path>                 - encrypt and store a file
//!   download <id> [--out <path>]  - fetch and decrypt a file
//!   list [--folder <id>]          - list folders and files
//!   rename / toggle-public / delete
//!   mkdir <name>                  - create a folder
//!   share <id> <address>          - record an access grant
//!   shares <id>                   - list grants for a file
//!   activity                      - recent activity for the wallet
//!   logout                        - forget the cached session key
//!   health                        - check the blob store
//!   config show                   - display the active configuration

mod signer;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use wd_core::config::{expand_tilde, WdConfig};
use wd_core::types::{FileContent, FileRecord};
use wd_crypto::{KdfParams, PlainFile, SessionKeyCache, SystemClock};
use wd_ledger::JsonRecordStore;
use wd_storage::BlobStore;
use wd_transfer::{ops, ProgressFn, TransferContext};

use crate::signer::PromptSigner;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "waldrive",
    version,
    about = "Client-side encrypted file storage on Walrus",
    long_about = "waldrive: encrypt files with a wallet-derived key, store them on Walrus, and manage their records"
)]
struct Cli {
    /// Path to waldrive.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "WALDRIVE_CONFIG",
        default_value = "~/.config/waldrive/config.toml"
    )]
    config: PathBuf,

    /// Wallet address (overrides [wallet] address)
    #[arg(long, short = 'a', env = "WALDRIVE_ADDRESS")]
    address: Option<String>,

    /// Hex signature of the key-derivation message; skips the prompt
    #[arg(long, env = "WALDRIVE_SIGNATURE", hide_env_values = true)]
    signature: Option<String>,

    /// Log level (overrides [log] level; RUST_LOG takes precedence)
    #[arg(long, env = "WALDRIVE_LOG")]
    log: Option<String>,

    /// Log format (overrides [log] format)
    #[arg(long, env = "WALDRIVE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a local file and upload it
    Upload {
        /// Local file path
        path: PathBuf,
        /// Destination folder id (default: root)
        #[arg(long, short = 'f')]
        folder: Option<String>,
        /// Mark the record public
        #[arg(long)]
        public: bool,
    },

    /// Download and decrypt a file
    Download {
        /// File record id
        id: String,
        /// Output path (default: the file's name in the current directory)
        #[arg(long = "out", short = 'o')]
        output: Option<PathBuf>,
    },

    /// List folders and files
    List {
        /// Folder id (default: root)
        #[arg(long, short = 'f')]
        folder: Option<String>,
    },

    /// Rename a file
    Rename { id: String, name: String },

    /// Flip a file between public and private
    #[command(name = "toggle-public")]
    TogglePublic { id: String },

    /// Delete a file record (and its blob where the backend allows it)
    Delete { id: String },

    /// Create a folder
    Mkdir {
        name: String,
        /// Parent folder id (default: root)
        #[arg(long, short = 'p')]
        parent: Option<String>,
        #[arg(long)]
        public: bool,
    },

    /// Record an access grant for another address
    Share {
        id: String,
        /// Recipient wallet address
        address: String,
        #[arg(long)]
        can_write: bool,
        #[arg(long)]
        can_delete: bool,
    },

    /// List access grants for a file
    Shares { id: String },

    /// Show recent activity
    Activity {
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },

    /// Forget the cached session key
    Logout,

    /// Check that the blob store is reachable
    Health,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = WdConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    match cli.command {
        Commands::Config {
            action: ConfigAction::Show,
        } => return cmd_config_show(&config, &config_path),
        Commands::Logout => return cmd_logout(&config),
        Commands::Health => return cmd_health(&config).await,
        _ => {}
    }

    let address = match &cli.address {
        Some(a) => a.clone(),
        None => config.wallet_address()?.to_string(),
    };
    let session = Session::open(&config, address, cli.signature.clone())?;
    let ctx = session.context();

    let result = run(&ctx, cli.command).await;
    session.persist();
    result
}

async fn run(ctx: &TransferContext<'_>, command: Commands) -> Result<()> {
    match command {
        Commands::Upload {
            path,
            folder,
            public,
        } => cmd_upload(ctx, &path, folder.as_deref(), public).await,
        Commands::Download { id, output } => cmd_download(ctx, &id, output.as_deref()).await,
        Commands::List { folder } => cmd_list(ctx, folder.as_deref()).await,
        Commands::Rename { id, name } => {
            let record = ops::rename(ctx, &id, &name).await?;
            println!("renamed {} to {}", record.id, record.name);
            Ok(())
        }
        Commands::TogglePublic { id } => {
            let record = ops::toggle_public(ctx, &id).await?;
            let state = if record.is_public { "public" } else { "private" };
            println!("{} is now {state}", record.name);
            Ok(())
        }
        Commands::Delete { id } => {
            let record = ops::delete(ctx, &id).await?;
            println!("deleted {} ({})", record.name, record.id);
            Ok(())
        }
        Commands::Mkdir {
            name,
            parent,
            public,
        } => {
            let folder = ops::create_folder(ctx, &name, parent.as_deref(), public).await?;
            println!("created folder {} ({})", folder.name, folder.id);
            Ok(())
        }
        Commands::Share {
            id,
            address,
            can_write,
            can_delete,
        } => {
            let grant = ops::share(ctx, &id, &address, can_write, can_delete).await?;
            println!("shared {} with {}", grant.file_id, grant.shared_with);
            Ok(())
        }
        Commands::Shares { id } => {
            for grant in ops::shares(ctx, &id).await? {
                println!(
                    "{}  write={} delete={}",
                    grant.shared_with, grant.can_write, grant.can_delete
                );
            }
            Ok(())
        }
        Commands::Activity { limit } => {
            for entry in ops::recent_activity(ctx, limit).await? {
                println!(
                    "{:>10}  {:<13} {}  {}",
                    entry.at, entry.action, entry.subject, entry.detail
                );
            }
            Ok(())
        }
        Commands::Config { .. } | Commands::Logout | Commands::Health => Ok(()),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Session wiring ────────────────────────────────────────────────────────────

/// Collaborators for one CLI invocation.
struct Session {
    blobs: Box<dyn BlobStore>,
    records: JsonRecordStore,
    signer: PromptSigner,
    sessions: SessionKeyCache,
    session_path: PathBuf,
    address: String,
    kdf: KdfParams,
    cleanup_orphans: bool,
}

impl Session {
    fn open(config: &WdConfig, address: String, signature: Option<String>) -> Result<Self> {
        let blobs = wd_storage::build_blob_store(config)?;

        let records_path = expand_tilde(&config.ledger.records_path);
        let records = JsonRecordStore::open(&records_path)
            .with_context(|| format!("opening records: {}", records_path.display()))?;

        let session_path = expand_tilde(&config.crypto.session_file);
        let sessions = SessionKeyCache::load(
            &session_path,
            Duration::from_secs(config.crypto.session_ttl_secs),
            Arc::new(SystemClock),
        );

        Ok(Self {
            blobs,
            records,
            signer: PromptSigner::new(signature),
            sessions,
            session_path,
            address,
            kdf: KdfParams {
                iterations: config.crypto.pbkdf2_iterations,
            },
            cleanup_orphans: config.transfer.cleanup_orphans,
        })
    }

    fn context(&self) -> TransferContext<'_> {
        TransferContext::new(
            self.blobs.as_ref(),
            &self.records,
            &self.signer,
            &self.sessions,
            &self.address,
        )
        .with_kdf(self.kdf.clone())
        .with_cleanup_orphans(self.cleanup_orphans)
    }

    fn persist(&self) {
        if let Err(e) = self.sessions.persist(&self.session_path) {
            tracing::warn!(path = %self.session_path.display(), "failed to save session key: {e}");
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn cmd_upload(
    ctx: &TransferContext<'_>,
    path: &Path,
    folder: Option<&str>,
    public: bool,
) -> Result<()> {
    let file = PlainFile::from_path(path).with_context(|| format!("reading {}", path.display()))?;

    let pb = make_progress_bar("upload");
    let progress = progress_callback(&pb);
    let result = wd_transfer::upload_secure_file(ctx, &file, folder, public, Some(&progress)).await;
    pb.finish_and_clear();

    let record = result?;
    println!(
        "uploaded {} ({}, {} bytes) as {}",
        record.name, record.mime_type, record.size, record.id
    );
    Ok(())
}

async fn cmd_download(ctx: &TransferContext<'_>, id: &str, output: Option<&Path>) -> Result<()> {
    let record = ops::readable_file(ctx, id).await?;

    let pb = make_progress_bar("download");
    let progress = progress_callback(&pb);
    let result = wd_transfer::download_secure_file(ctx, &record, Some(&progress)).await;
    pb.finish_and_clear();

    let file = result?;
    let dest = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(&file.name, &record.id));
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(&dest, &file.bytes)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;

    println!("downloaded {} ({} bytes) to {}", file.name, file.bytes.len(), dest.display());
    Ok(())
}

/// Local file name for a download without `--output`. Record names come from
/// the ledger, so only their final component is used, never a directory.
fn default_output_path(name: &str, id: &str) -> PathBuf {
    Path::new(name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(id))
}

async fn cmd_list(ctx: &TransferContext<'_>, folder: Option<&str>) -> Result<()> {
    let listing = ops::list(ctx, folder).await?;
    if listing.folders.is_empty() && listing.files.is_empty() {
        println!("(empty)");
        return Ok(());
    }
    for f in &listing.folders {
        println!("{:<36}  {:>10}  {}/", f.id, "-", f.name);
    }
    for f in &listing.files {
        println!("{:<36}  {:>10}  {}{}", f.id, f.size, f.name, file_flags(f));
    }
    Ok(())
}

fn file_flags(f: &FileRecord) -> String {
    let mut flags = Vec::new();
    if f.is_public {
        flags.push("public");
    }
    if let FileContent::Legacy { .. } = f.content {
        flags.push("unencrypted");
    }
    if flags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", flags.join(", "))
    }
}

fn cmd_logout(config: &WdConfig) -> Result<()> {
    let path = expand_tilde(&config.crypto.session_file);
    let sessions = SessionKeyCache::load(
        &path,
        Duration::from_secs(config.crypto.session_ttl_secs),
        Arc::new(SystemClock),
    );
    sessions.clear();
    sessions
        .persist(&path)
        .with_context(|| format!("removing session file: {}", path.display()))?;
    println!("session key cleared");
    Ok(())
}

async fn cmd_health(config: &WdConfig) -> Result<()> {
    let blobs = wd_storage::build_blob_store(config)?;
    match wd_storage::check_health(blobs.as_ref()).await {
        Ok(()) => {
            println!("{}: ok", blobs.name());
            Ok(())
        }
        Err(e) => anyhow::bail!("{}: {e}", blobs.name()),
    }
}

fn cmd_config_show(config: &WdConfig, path: &Path) -> Result<()> {
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "(defaults)".to_string()
    };
    println!("# config: {source}");
    print!("{}", toml::to_string_pretty(config).context("serializing config")?);
    Ok(())
}

// ── Progress helpers ──────────────────────────────────────────────────────────

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb
}

fn progress_callback(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |p| {
        pb.set_position((p.progress * 100.0).round() as u64);
        pb.set_message(p.step.to_string());
    })
}
