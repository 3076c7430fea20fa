use std::path::Path;

use clap::{Args, Parser, Subcommand};

use storage_core::StorageConfig;

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "storage", about = "Table and blob storage client")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query a table and print entities as JSON lines
    Query(QueryArgs),
    /// Insert one entity
    Insert(InsertArgs),
    /// Insert entities from a JSON-lines file as atomic batches
    Batch(BatchArgs),
    /// Upload a file as a block blob
    PutBlob(PutBlobArgs),
}

// ═══════════════════════════════════════════════════════════════
//  Connection settings: storage.toml < env/CLI
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct ConnectionArgs {
    /// Path to the TOML settings file
    #[arg(long, global = true, default_value = "storage.toml", env = "STORAGE_CONFIG")]
    pub config: String,

    /// Storage account name
    #[arg(long, global = true, env = "STORAGE_ACCOUNT")]
    pub account: Option<String>,

    /// Shared-access signature query string
    #[arg(long = "sas", global = true, env = "STORAGE_SAS", hide_env_values = true)]
    pub shared_access_signature: Option<String>,
}

impl ConnectionArgs {
    /// Merge the settings file (if present) with flags and env. A
    /// missing file is fine as long as `--account` is given; a file
    /// that exists but does not parse is an error.
    pub fn resolve(&self) -> Result<StorageConfig, CliError> {
        let from_file = if Path::new(&self.config).exists() {
            Some(StorageConfig::load(&self.config)?)
        } else {
            None
        };

        let mut settings = match (from_file, &self.account) {
            (Some(mut cfg), Some(account)) => {
                cfg.account = account.clone();
                cfg
            }
            (Some(cfg), None) => cfg,
            (None, Some(account)) => StorageConfig::new(account.clone()),
            (None, None) => {
                return Err(CliError::Config(format!(
                    "no account: pass --account or create '{}'",
                    self.config
                )));
            }
        };
        if let Some(sas) = &self.shared_access_signature {
            settings.shared_access_signature = Some(sas.clone());
        }
        settings.validate()?;
        Ok(settings)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Subcommand args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct QueryArgs {
    pub table: String,

    /// Filter template with {0}, {1}… placeholders
    #[arg(long)]
    pub filter: Option<String>,

    /// Filter argument; prefix with `datetime:` for a date-time literal
    #[arg(long = "arg")]
    pub args: Vec<String>,

    #[arg(long)]
    pub top: Option<u32>,

    /// Columns to return, comma separated
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Follow continuation tokens until the last page (Ctrl-C stops)
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Clone, Debug)]
pub struct InsertArgs {
    pub table: String,
    pub partition_key: String,

    /// Row key; a random UUID when omitted
    #[arg(long)]
    pub row_key: Option<String>,

    /// String property, `name=value`
    #[arg(long = "prop")]
    pub props: Vec<String>,

    /// Date-time property, `name=2020-01-01T00:00:00Z`
    #[arg(long = "datetime")]
    pub datetimes: Vec<String>,
}

#[derive(Args, Clone, Debug)]
pub struct BatchArgs {
    pub table: String,
    pub partition_key: String,

    /// One JSON-encoded record per line
    pub file: String,
}

#[derive(Args, Clone, Debug)]
pub struct PutBlobArgs {
    pub container: String,
    pub blob: String,
    pub file: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(config: &str, account: Option<&str>, sas: Option<&str>) -> ConnectionArgs {
        ConnectionArgs {
            config: config.into(),
            account: account.map(Into::into),
            shared_access_signature: sas.map(Into::into),
        }
    }

    #[test]
    fn flags_alone_are_enough() {
        let cfg = args("does-not-exist.toml", Some("acme"), Some("?sig=x"))
            .resolve()
            .unwrap();
        assert_eq!(cfg.account, "acme");
        assert_eq!(cfg.shared_access_signature.as_deref(), Some("?sig=x"));
        assert_eq!(cfg.scheme, "http");
    }

    #[test]
    fn missing_account_is_reported() {
        let err = args("does-not-exist.toml", None, None).resolve().unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn flags_override_file() {
        let path = std::env::temp_dir().join(format!("storage-cli-{}.toml", std::process::id()));
        std::fs::write(&path, "account = \"fromfile\"\nscheme = \"https\"\n").unwrap();
        let path_str = path.to_string_lossy().into_owned();

        let from_file = args(&path_str, None, None).resolve().unwrap();
        assert_eq!(from_file.account, "fromfile");
        assert_eq!(from_file.scheme, "https");

        let overridden = args(&path_str, Some("flag"), Some("sig=y")).resolve().unwrap();
        assert_eq!(overridden.account, "flag");
        assert_eq!(overridden.scheme, "https");
        assert_eq!(overridden.shared_access_signature.as_deref(), Some("sig=y"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn cli_parses_query() {
        let cli = Cli::try_parse_from([
            "storage", "--account", "acme", "query", "metrics", "--filter", "Time gt {0}", "--arg",
            "datetime:2020-01-01T00:00:00Z", "--select", "A,B", "--all",
        ])
        .unwrap();
        match cli.command {
            Commands::Query(q) => {
                assert_eq!(q.table, "metrics");
                assert_eq!(q.args, ["datetime:2020-01-01T00:00:00Z"]);
                assert_eq!(q.select, ["A", "B"]);
                assert!(q.all);
            }
            _ => panic!("expected query"),
        }
    }
}
