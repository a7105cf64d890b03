use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const STORAGE_BACKEND_ENV: &str = "SNIP_STORAGE_BACKEND";
pub const FILE_STORAGE_PATH_ENV: &str = "SNIP_FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "SNIP_DATABASE_DSN";
pub const BASE_URL_ENV: &str = "SNIP_BASE_URL";
pub const LOG_FORMAT_ENV: &str = "SNIP_LOG_FORMAT";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "file")]
    File,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "snip", about = "Per-user URL shortener")]
pub struct CLI {
    /// Storage backend. Inferred from the DSN or file path when omitted.
    #[arg(long, env = STORAGE_BACKEND_ENV, value_enum)]
    pub storage: Option<StorageBackendArg>,

    #[arg(long, env = FILE_STORAGE_PATH_ENV, required_if_eq("storage", "file"))]
    pub file_storage_path: Option<PathBuf>,

    #[arg(long, env = DATABASE_DSN_ENV, required_if_eq("storage", "postgres"))]
    pub database_dsn: Option<String>,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl CLI {
    /// The explicit backend, else postgres when a DSN is set, else file
    /// when a path is set, else in-memory.
    pub fn backend(&self) -> StorageBackendArg {
        match (self.storage, &self.database_dsn, &self.file_storage_path) {
            (Some(backend), _, _) => backend,
            (None, Some(_), _) => StorageBackendArg::Postgres,
            (None, None, Some(_)) => StorageBackendArg::File,
            (None, None, None) => StorageBackendArg::InMemory,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one or more URLs.
    Shorten {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Print the original URL behind a short code.
    Resolve { code: String },
    /// List the live URLs of an owner.
    List { owner: String },
    /// Soft delete short codes owned by `owner`.
    Delete {
        #[arg(long)]
        owner: String,
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Print the number of live URLs and owners.
    Stats,
    /// Check that the backend is reachable.
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CLI {
        CLI::try_parse_from(std::iter::once("snip").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn backend_defaults_to_in_memory() {
        let cli = parse(&["ping"]);
        assert_eq!(cli.backend(), StorageBackendArg::InMemory);
        assert_eq!(cli.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn backend_is_inferred_from_dsn_before_path() {
        let cli = parse(&[
            "--file-storage-path",
            "/tmp/urls.jsonl",
            "--database-dsn",
            "postgres://localhost/snip",
            "ping",
        ]);
        assert_eq!(cli.backend(), StorageBackendArg::Postgres);

        let cli = parse(&["--file-storage-path", "/tmp/urls.jsonl", "ping"]);
        assert_eq!(cli.backend(), StorageBackendArg::File);
    }

    #[test]
    fn explicit_backend_wins() {
        let cli = parse(&[
            "--storage",
            "in-memory",
            "--file-storage-path",
            "/tmp/urls.jsonl",
            "stats",
        ]);
        assert_eq!(cli.backend(), StorageBackendArg::InMemory);
    }

    #[test]
    fn postgres_backend_requires_dsn() {
        let result = CLI::try_parse_from(["snip", "--storage", "postgres", "ping"]);
        assert!(result.is_err());
    }
}
