use burrow_storage::{FileRepositoryConfig, StorageConfig};
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const STORAGE_BACKEND_ENV: &str = "BURROW_STORAGE_BACKEND";
pub const FILE_PATH_ENV: &str = "BURROW_FILE_PATH";
pub const FILE_SYNC_ENV: &str = "BURROW_FILE_SYNC";
pub const DATABASE_URL_ENV: &str = "BURROW_DATABASE_URL";
pub const DB_MAX_CONNECTIONS_ENV: &str = "BURROW_DB_MAX_CONNECTIONS";
pub const ID_LENGTH_ENV: &str = "BURROW_ID_LENGTH";
pub const BASE_URL_ENV: &str = "BURROW_BASE_URL";
pub const LOG_FORMAT_ENV: &str = "BURROW_LOG_FORMAT";

pub const DEFAULT_FILE_PATH: &str = "burrow.log";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "memory")]
    Memory,
    #[value(name = "file")]
    File,
    #[value(name = "sqlite")]
    Sqlite,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::Memory => write!(f, "memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct StorageArgs {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::File
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = FILE_PATH_ENV, default_value = DEFAULT_FILE_PATH)]
    pub file_path: PathBuf,

    /// fsync the log after every append.
    #[arg(long, env = FILE_SYNC_ENV)]
    pub file_sync: bool,

    #[arg(long, env = DATABASE_URL_ENV, required_if_eq("storage", "sqlite"))]
    pub database_url: Option<String>,

    #[arg(
        long,
        env = DB_MAX_CONNECTIONS_ENV,
        default_value_t = burrow_storage::config::DEFAULT_MAX_CONNECTIONS
    )]
    pub db_max_connections: u32,
}

impl StorageArgs {
    pub fn to_config(&self) -> anyhow::Result<StorageConfig> {
        let config = match self.storage {
            StorageBackendArg::Memory => StorageConfig::Memory,
            StorageBackendArg::File => StorageConfig::File(
                FileRepositoryConfig::builder()
                    .path(self.file_path.clone())
                    .sync_writes(self.file_sync)
                    .build(),
            ),
            StorageBackendArg::Sqlite => StorageConfig::Sqlite {
                database_url: self
                    .database_url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("database url is required for sqlite storage"))?,
                max_connections: self.db_max_connections,
            },
        };
        Ok(config)
    }
}

#[derive(Debug, Parser)]
#[command(name = "burrow", about = "Shorten URLs against a local store")]
pub struct CLI {
    #[command(flatten)]
    pub storage: StorageArgs,

    /// Length of generated short ids, 1 to 64 characters.
    #[arg(
        long,
        env = ID_LENGTH_ENV,
        default_value_t = 8,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=64)
    )]
    pub id_length: usize,

    /// Prefix used when printing full short URLs.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten a single URL.
    Shorten {
        url: String,
        #[arg(long, default_value = "")]
        owner: String,
    },
    /// Shorten several URLs at once; either all are stored or none.
    Batch {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long, default_value = "")]
        owner: String,
    },
    /// Look up a short id.
    Resolve { id: String },
    /// List the live URLs of an owner.
    List {
        #[arg(long)]
        owner: String,
    },
    /// Soft-delete URLs owned by `owner`.
    Delete {
        #[arg(long)]
        owner: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Print live URL and owner counts.
    Stats,
    /// Remove every record from the store.
    Clear,
}
