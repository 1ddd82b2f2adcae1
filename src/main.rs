//! box_catalog CLI - Catalog, download and mirror files stored on Box.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use box_catalog::config::{
    DEFAULT_API_BASE, DEFAULT_AUTHORIZE_URL, DEFAULT_TOKEN_URL, DEFAULT_UPLOAD_BASE,
};
use box_catalog::logging::{self, LogFormat};
use box_catalog::store::TableRows;
use box_catalog::sync::DEFAULT_DB_NAME;
use box_catalog::{
    annotate_shared_links, extract_code, filter_by_extension, AccessToken, AuthorizedFetcher,
    CatalogOptions, CatalogStore, ConfigError, Credentials, Endpoints, ExtensionSet, FileEntry,
    ResourceCatalog, SyncMode, SyncOptions, SyncOrchestrator, TokenExchanger,
};

/// CLI tool for cataloguing and mirroring files stored on Box.
#[derive(Parser)]
#[command(name = "box_catalog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with client_id, client_secret and redirect_uri.
    #[arg(long, env = "BOX_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// OAuth2 client ID.
    #[arg(long, env = "BOX_CLIENT_ID")]
    client_id: Option<String>,

    /// OAuth2 client secret.
    #[arg(long, env = "BOX_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Redirect URI registered for the application.
    #[arg(long, env = "BOX_REDIRECT_URI")]
    redirect_uri: Option<String>,

    /// Access token from an earlier exchange.
    #[arg(long, env = "BOX_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Authorization code, or the whole redirect URL, to exchange on startup.
    #[arg(long, env = "BOX_AUTH_CODE", hide_env_values = true)]
    code: Option<String>,

    #[arg(long, env = "BOX_AUTHORIZE_URL", default_value = DEFAULT_AUTHORIZE_URL, hide = true)]
    authorize_url: String,

    #[arg(long, env = "BOX_TOKEN_URL", default_value = DEFAULT_TOKEN_URL, hide = true)]
    token_url: String,

    #[arg(long, env = "BOX_API_BASE", default_value = DEFAULT_API_BASE, hide = true)]
    api_base: String,

    #[arg(long, env = "BOX_UPLOAD_BASE", default_value = DEFAULT_UPLOAD_BASE, hide = true)]
    upload_base: String,

    /// More log output (-v, -vv). RUST_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log line format.
    #[arg(long, value_enum, default_value_t = LogFormatArg::Pretty, global = true)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

/// Preset extension groups.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Images,
    Text,
    All,
}

#[derive(Args)]
struct FilterArgs {
    /// Preset group of extensions to keep.
    #[arg(long, value_enum)]
    kind: Option<Kind>,

    /// Extensions to keep (comma separated, e.g. jpg,png). Overrides --kind.
    #[arg(long, value_delimiter = ',')]
    ext: Vec<String>,
}

impl FilterArgs {
    /// `None` keeps every file.
    fn extension_set(&self, default: Kind) -> Option<ExtensionSet> {
        if !self.ext.is_empty() {
            return Some(ExtensionSet::new(&self.ext));
        }
        match self.kind.unwrap_or(default) {
            Kind::Images => Some(ExtensionSet::images()),
            Kind::Text => Some(ExtensionSet::text()),
            Kind::All => None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the URL to visit to authorize the application.
    AuthUrl {
        /// Opaque value echoed back in the redirect.
        #[arg(long)]
        state: Option<String>,
    },

    /// Exchange an authorization code (or redirect URL) and print the access token.
    Token {
        /// Authorization code or full redirect URL.
        code: String,
    },

    /// List files below a folder.
    List {
        /// Root folder ID ("0" is the account root).
        #[arg(long, short = 'f', default_value = "0")]
        folder: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Fetch full metadata for every file.
        #[arg(long)]
        metadata: bool,

        /// Create an open shared link for every listed file.
        #[arg(long)]
        links: bool,
    },

    /// Print the contents of the text files below a folder.
    ShowText {
        /// Root folder ID.
        #[arg(long, short = 'f', default_value = "0")]
        folder: String,
    },

    /// Download every matching file below a folder.
    Fetch {
        /// Root folder ID.
        #[arg(long, short = 'f', default_value = "0")]
        folder: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Local destination directory.
        #[arg(long, short = 't', default_value = ".")]
        to: PathBuf,
    },

    /// Download a single file to the local filesystem.
    Download {
        /// File ID to download.
        file_id: String,

        /// Local destination path (file or directory).
        #[arg(long, short = 't', default_value = ".")]
        to: PathBuf,
    },

    /// Mirror file metadata into a SQLite database stored on Box.
    Sync {
        /// Root folder ID to catalog.
        #[arg(long, short = 'f', default_value = "0")]
        folder: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Name of the remote database file.
        #[arg(long, default_value = DEFAULT_DB_NAME)]
        db_name: String,

        /// Folder new database files are uploaded into.
        #[arg(long, default_value = "0")]
        dest_folder: String,

        /// Upload a timestamped copy instead of replacing an existing database.
        #[arg(long)]
        snapshot: bool,

        /// Skip shared link creation.
        #[arg(long)]
        no_links: bool,

        /// Fetch full metadata for every file.
        #[arg(long)]
        metadata: bool,
    },

    /// Show the tables and rows of a local SQLite database.
    Inspect {
        /// Path to the database file.
        db: PathBuf,

        /// Table to print; lists the tables when omitted.
        #[arg(long)]
        table: Option<String>,
    },
}

impl Cli {
    fn endpoints(&self) -> Endpoints {
        Endpoints {
            authorize_url: self.authorize_url.clone(),
            token_url: self.token_url.clone(),
            api_base: self.api_base.clone(),
            upload_base: self.upload_base.clone(),
        }
    }

    fn credentials(&self) -> Result<Credentials> {
        if let Some(path) = &self.credentials {
            return Credentials::from_file(path)
                .with_context(|| format!("Failed to load credentials from {:?}", path));
        }

        let client_id = self
            .client_id
            .clone()
            .ok_or(ConfigError::MissingValue("client_id"))?;
        let client_secret = self
            .client_secret
            .clone()
            .ok_or(ConfigError::MissingValue("client_secret"))?;
        let redirect_uri = self
            .redirect_uri
            .clone()
            .ok_or(ConfigError::MissingValue("redirect_uri"))?;

        Ok(Credentials::new(client_id, client_secret, redirect_uri)?)
    }

    fn exchanger(&self) -> Result<TokenExchanger> {
        Ok(TokenExchanger::new(self.credentials()?, &self.endpoints()))
    }

    /// Token for this session: given directly, or exchanged from a code.
    async fn access_token(&self) -> Result<AccessToken> {
        if let Some(token) = &self.access_token {
            return Ok(AccessToken::new(token.clone()));
        }

        let Some(input) = &self.code else {
            anyhow::bail!(
                "No access token: pass --access-token, or --code with a code from `box_catalog auth-url`"
            );
        };

        let code = extract_code(input)?;
        let token = self
            .exchanger()?
            .exchange(&code)
            .await
            .context("Failed to obtain an access token")?;
        Ok(token)
    }

    async fn fetcher(&self) -> Result<AuthorizedFetcher> {
        let token = self.access_token().await?;
        Ok(AuthorizedFetcher::new(token, &self.endpoints()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Json => LogFormat::Json,
    };
    logging::init(cli.verbose, format).context("Failed to initialize logging")?;

    match &cli.command {
        Commands::AuthUrl { state } => {
            let url = cli.exchanger()?.authorize_url(state.as_deref())?;
            println!("{}", url);
        }

        Commands::Token { code } => {
            let code = extract_code(code)?;
            let token = cli
                .exchanger()?
                .exchange(&code)
                .await
                .context("Failed to obtain an access token")?;
            println!("{}", token.secret());
        }

        Commands::List {
            folder,
            filter,
            metadata,
            links,
        } => {
            let fetcher = cli.fetcher().await?;
            let mut entries = build_catalog(&fetcher, folder, filter, Kind::All, *metadata).await?;

            if *links {
                let failures = annotate_shared_links(&fetcher, &mut entries).await;
                if failures > 0 {
                    eprintln!("Warning: {} shared link(s) could not be created", failures);
                }
            }

            if entries.is_empty() {
                println!("No files found.");
            } else {
                println!("{:<14} {:>10} {:<16} {}", "ID", "SIZE", "CREATED", "NAME");
                println!("{}", "-".repeat(80));
                for entry in &entries {
                    println!("{}", entry);
                }
            }
        }

        Commands::ShowText { folder } => {
            let fetcher = cli.fetcher().await?;
            let filter = FilterArgs {
                kind: Some(Kind::Text),
                ext: Vec::new(),
            };
            let entries = build_catalog(&fetcher, folder, &filter, Kind::Text, false).await?;

            if entries.is_empty() {
                println!("No text files found.");
            }

            for entry in &entries {
                match fetcher.file_content(&entry.id).await {
                    Ok(content) => {
                        println!("### {}", entry.name);
                        println!("{}", String::from_utf8_lossy(&content));
                    }
                    Err(e) => eprintln!("Failed to fetch {}: {}", entry.name, e),
                }
            }
        }

        Commands::Fetch { folder, filter, to } => {
            let fetcher = cli.fetcher().await?;
            let entries = build_catalog(&fetcher, folder, filter, Kind::Images, false).await?;

            if entries.is_empty() {
                println!("No matching files found.");
                return Ok(());
            }

            std::fs::create_dir_all(to)
                .with_context(|| format!("Failed to create directory: {:?}", to))?;

            println!("Downloading {} file(s) to {:?}...", entries.len(), to);
            let mut failed = 0;

            let destinations = download_paths(to, &entries);

            for (idx, (entry, destination)) in entries.iter().zip(&destinations).enumerate() {
                print!("[{}/{}] {}... ", idx + 1, entries.len(), entry.name);
                std::io::stdout().flush().ok();

                match fetcher
                    .download_to(&format!("/files/{}/content", entry.id), destination)
                    .await
                {
                    Ok(bytes) => println!("OK ({} bytes)", bytes),
                    Err(e) => {
                        failed += 1;
                        println!("FAILED");
                        eprintln!("  Error: {}", e);
                    }
                }
            }

            println!("Done. {} succeeded, {} failed.", entries.len() - failed, failed);
        }

        Commands::Download { file_id, to } => {
            let fetcher = cli.fetcher().await?;

            let info = fetcher
                .file_info(file_id)
                .await
                .with_context(|| format!("Failed to fetch metadata of file: {}", file_id))?;

            let final_path = destination_path(to, &info.name)?;

            print!("Downloading {}... ", file_id);
            std::io::stdout().flush().ok();

            fetcher
                .download_to(&format!("/files/{}/content", file_id), &final_path)
                .await
                .with_context(|| format!("Failed to download file: {}", file_id))?;

            println!("OK");
            println!("Saved to: {:?}", final_path);
        }

        Commands::Sync {
            folder,
            filter,
            db_name,
            dest_folder,
            snapshot,
            no_links,
            metadata,
        } => {
            let fetcher = cli.fetcher().await?;
            let mut entries =
                build_catalog(&fetcher, folder, filter, Kind::Images, *metadata).await?;

            if !*no_links {
                let failures = annotate_shared_links(&fetcher, &mut entries).await;
                if failures > 0 {
                    eprintln!("Warning: {} shared link(s) could not be created", failures);
                }
            }

            let options = SyncOptions {
                db_name: db_name.clone(),
                folder_id: dest_folder.clone(),
                mode: if *snapshot {
                    SyncMode::Snapshot
                } else {
                    SyncMode::Replace
                },
            };

            let report = SyncOrchestrator::new(&fetcher, options)
                .sync(&entries)
                .await
                .context("Failed to sync the catalog database")?;

            let action = if report.created { "Created" } else { "Updated" };
            println!(
                "{} {} ({}) with {} row(s).",
                action, report.file_name, report.file_id, report.rows_written
            );
        }

        Commands::Inspect { db, table } => {
            let store = CatalogStore::open_read_only(db)
                .with_context(|| format!("Failed to open database: {:?}", db))?;

            match table {
                None => {
                    println!("Tables in {:?}:", db);
                    for name in store.tables()? {
                        println!("  {}", name);
                    }
                }
                Some(table) => match store.table_rows(table)? {
                    Some(rows) => print_table(table, &rows),
                    None => anyhow::bail!("No such table: {}", table),
                },
            }
        }
    }

    Ok(())
}

async fn build_catalog(
    fetcher: &AuthorizedFetcher,
    folder: &str,
    filter: &FilterArgs,
    default_kind: Kind,
    fetch_metadata: bool,
) -> Result<Vec<FileEntry>> {
    let options = CatalogOptions {
        fetch_metadata,
        ..CatalogOptions::default()
    };

    let catalog = ResourceCatalog::new(fetcher, options)
        .build(folder)
        .await
        .with_context(|| format!("Failed to list folder: {}", folder))?;

    let entries = match filter.extension_set(default_kind) {
        Some(extensions) => filter_by_extension(&catalog, &extensions),
        None => catalog,
    };
    info!(folder, files = entries.len(), "Catalog ready");
    Ok(entries)
}

/// Resolve a download target, creating parent directories as needed.
fn destination_path(to: &Path, file_name: &str) -> Result<PathBuf> {
    if to.is_dir() || to.to_string_lossy().ends_with('/') {
        std::fs::create_dir_all(to)
            .with_context(|| format!("Failed to create directory: {:?}", to))?;
        return Ok(to.join(file_name));
    }

    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }
    Ok(to.to_path_buf())
}

/// One local path per entry inside `to`. Names that were already used get
/// the file id appended so files from different folders never overwrite
/// each other.
fn download_paths(to: &Path, entries: &[FileEntry]) -> Vec<PathBuf> {
    let mut used: HashSet<String> = HashSet::new();

    entries
        .iter()
        .map(|entry| {
            let mut name = local_name(&entry.name, &entry.id);
            if !used.insert(name.clone()) {
                let renamed = with_id_suffix(&name, &entry.id);
                warn!(file_id = %entry.id, name = %entry.name, %renamed, "Duplicate file name, renaming");
                name = renamed;
                used.insert(name.clone());
            }
            to.join(name)
        })
        .collect()
}

/// Last path component of a remote name, or the id when nothing usable is left.
fn local_name(name: &str, id: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(id)
        .to_string()
}

fn with_id_suffix(name: &str, id: &str) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &name[..dot], id, &name[dot..]),
        _ => format!("{}_{}", name, id),
    }
}

fn print_table(table: &str, rows: &TableRows) {
    println!("Data from table: {}", table);
    println!("{}", rows.columns.join("\t"));
    for row in &rows.rows {
        let cells: Vec<&str> = row.iter().map(|c| c.as_deref().unwrap_or("NULL")).collect();
        println!("{}", cells.join("\t"));
    }
    println!("({} row(s))", rows.rows.len());
}
