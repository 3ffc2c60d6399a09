//! Startup configuration: CLI flags layered over an optional TOML config
//! file, environment variables, and defaults, resolved once before the REPL
//! starts reading commands.

use std::fs;
use std::path::Path;

use clap::Parser;
use serde::{Deserialize, Serialize};

const DEFAULT_DB_PATH: &str = "btree.db";
const DEFAULT_POOL_SIZE: usize = 64;
const DEFAULT_TREE_NAME: &str = "default";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "btree-cli")]
#[command(author, version, about = "Line-oriented B+ tree test driver", long_about = None)]
pub struct Args {
    /// Path to an optional TOML config file providing defaults below CLI flags.
    #[arg(long)]
    config: Option<String>,

    /// Path to the backing database file.
    #[arg(long)]
    db: Option<String>,

    /// Number of frames in the buffer pool.
    #[arg(long = "pool-size")]
    pool_size: Option<usize>,

    /// Name under which the tree is registered in the catalog.
    #[arg(long)]
    tree: Option<String>,

    /// `tracing_subscriber::EnvFilter` directive, e.g. "debug" or "btree=trace,info".
    #[arg(long = "log-level")]
    log_level: Option<String>,
}

/// The shape of an optional config file: every field optional, since any of
/// them may instead come from a CLI flag, an environment variable, or the
/// hardcoded default.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct FileConfig {
    db_path: Option<String>,
    pool_size: Option<usize>,
    tree_name: Option<String>,
    log_filter: Option<String>,
}

/// Resolved configuration. Precedence, highest first: CLI flag, environment
/// variable (where one exists), config file, hardcoded default. `page_size`
/// is fixed at compile time and is not part of this struct — the page layout
/// code is written against the `PAGE_SIZE` constant, not a runtime value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub db_path: String,
    pub pool_size: usize,
    pub tree_name: String,
    pub log_filter: String,
}

impl Config {
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => load_file_config(Path::new(path))?,
            None => FileConfig::default(),
        };

        let db_path = args
            .db
            .or_else(|| std::env::var("BTREE_DB_PATH").ok())
            .or(file.db_path)
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let pool_size = args.pool_size.or(file.pool_size).unwrap_or(DEFAULT_POOL_SIZE);

        let tree_name = args.tree.or(file.tree_name).unwrap_or_else(|| DEFAULT_TREE_NAME.to_string());

        let log_filter = args
            .log_level
            .or_else(|| std::env::var("RUST_LOG").ok())
            .or(file.log_filter)
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            db_path,
            pool_size,
            tree_name,
            log_filter,
        })
    }
}

fn load_file_config(path: &Path) -> anyhow::Result<FileConfig> {
    let text = fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(db: Option<&str>, pool_size: Option<usize>, tree: Option<&str>, log_level: Option<&str>) -> Args {
        Args {
            config: None,
            db: db.map(String::from),
            pool_size,
            tree: tree.map(String::from),
            log_level: log_level.map(String::from),
        }
    }

    #[test]
    fn explicit_flags_take_precedence_over_defaults() {
        let config = Config::from_args(args(Some("custom.db"), Some(128), Some("mytree"), Some("debug"))).unwrap();
        assert_eq!(config.db_path, "custom.db");
        assert_eq!(config.pool_size, 128);
        assert_eq!(config.tree_name, "mytree");
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn missing_flags_fall_back_to_defaults() {
        let config = Config::from_args(args(None, None, None, None)).unwrap();
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.tree_name, DEFAULT_TREE_NAME);
    }

    #[test]
    fn config_file_fills_in_gaps_below_explicit_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("btree-cli.toml");
        std::fs::write(&path, "db_path = \"from-file.db\"\npool_size = 8\n").unwrap();

        let mut a = args(None, None, Some("cli-tree"), None);
        a.config = Some(path.to_str().unwrap().to_string());
        let config = Config::from_args(a).unwrap();

        assert_eq!(config.db_path, "from-file.db");
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.tree_name, "cli-tree");
    }
}
