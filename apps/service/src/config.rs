use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::validation::{
    validate_check_interval, validate_echo_count, validate_target_host, validate_unique_hosts,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },

    #[error("failed to write {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },

    #[error("failed to parse {path}: {reason}")]
    ParseFailed { path: path::PathBuf, reason: String },

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("no config directory: neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,

    #[error("invalid config: {0:#}")]
    Invalid(anyhow::Error),
}

/// What to do when a sample cannot be written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreErrorPolicy {
    /// Log, drop the sample, keep probing the remaining hosts.
    #[default]
    Skip,
    /// Stop the sampling loop with the error.
    Abort,
}

impl fmt::Display for StoreErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErrorPolicy::Skip => write!(f, "skip"),
            StoreErrorPolicy::Abort => write!(f, "abort"),
        }
    }
}

/// A host to probe on every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TargetRecord")]
pub struct Target {
    /// Display label
    pub name: String,
    /// Address or hostname handed to the check
    pub host: String,
    /// Display order for reports
    pub sequence: i64,
}

impl Target {
    pub fn new(name: impl Into<String>, host: impl Into<String>, sequence: i64) -> Self {
        Self { name: name.into(), host: host.into(), sequence }
    }
}

/// Targets are accepted as `{name, host, sequence}` tables or as
/// `[name, host, sequence]` triples.
#[derive(Deserialize)]
#[serde(untagged)]
enum TargetRecord {
    Triple(String, String, i64),
    Named {
        name: String,
        host: String,
        #[serde(alias = "seqn")]
        sequence: i64,
    },
}

impl From<TargetRecord> for Target {
    fn from(record: TargetRecord) -> Self {
        match record {
            TargetRecord::Triple(name, host, sequence)
            | TargetRecord::Named { name, host, sequence } => Target { name, host, sequence },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Sampling {
    pub interval_seconds: u64,
    pub echo_count: u32,
    pub probe_grace_seconds: u64,
    pub ping_program: String,
    pub on_store_error: StoreErrorPolicy,
    /// JSON target list; replaces inline targets when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets_file: Option<path::PathBuf>,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            echo_count: 3,
            probe_grace_seconds: 11,
            ping_program: "ping".into(),
            on_store_error: StoreErrorPolicy::Skip,
            targets_file: None,
        }
    }
}

/// Store connection parameters: a local file, or a remote libsql server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: path::PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl DatabaseConfig {
    pub fn local(path: impl Into<path::PathBuf>) -> Self {
        Self { path: path.into(), url: None, auth_token: None }
    }

    /// Where samples go, for logs. Never includes the token.
    pub fn location(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => self.path.display().to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::local("pingsaver.db")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sampling: Sampling,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub targets: Vec<Target>,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/pingsaver/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Some(config_home) = env::var_os("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::var_os("HOME") {
        path::PathBuf::from(home_dir).join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("pingsaver/config.toml"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling: Sampling::default(),
            database: DatabaseConfig::default(),
            targets: vec![
                Target::new("External", "1.1.1.1", 1),
                Target::new("Router", "192.168.1.1", 2),
            ],
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Sampling")?;
        write_1(f, "Interval (s)", &self.sampling.interval_seconds)?;
        write_1(f, "Echo Count", &self.sampling.echo_count)?;
        write_1(f, "Probe Grace (s)", &self.sampling.probe_grace_seconds)?;
        write_1(f, "Ping Program", &self.sampling.ping_program)?;
        write_1(f, "On Store Error", &self.sampling.on_store_error)?;
        write_title_1(f, "Database")?;
        write_1(f, "Location", &self.database.location())?;
        write_title_1(f, "Targets")?;
        for target in &self.targets {
            write_1(f, &target.name, &target.host)?;
            write_2(f, "Sequence", &target.sequence)?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/pingsaver/config.toml
    ///  or the specified path, with the name config.toml if one does not exist.
    /// A configured `targets_file` is loaded relative to the config's
    /// directory and replaces the inline targets.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let mut config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str()).map_err(|err| Error::ParseFailed {
                path: config_path.clone(),
                reason: err.to_string(),
            })?
        } else {
            tracing::info!(path = %config_path.display(), "No config found, writing defaults");
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        if let Some(targets_file) = config.sampling.targets_file.clone() {
            let targets_file = match config_path.parent() {
                Some(dir) if targets_file.is_relative() => dir.join(targets_file),
                _ => targets_file,
            };
            config.targets = load_targets(&targets_file)?;
        }

        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Check everything the sampling loop relies on. Any failure is fatal.
    pub fn validate(&self) -> Result<(), Error> {
        self.check().map_err(Error::Invalid)
    }

    fn check(&self) -> anyhow::Result<()> {
        validate_check_interval(self.sampling.interval_seconds)?;
        validate_echo_count(self.sampling.echo_count)?;

        if self.sampling.ping_program.trim().is_empty() {
            anyhow::bail!("ping_program must not be empty");
        }

        if let Some(url) = &self.database.url {
            url::Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid database url: {}", e))?;
        }

        if self.targets.is_empty() {
            anyhow::bail!("No targets configured");
        }
        for target in &self.targets {
            validate_target_host(&target.host)?;
        }
        validate_unique_hosts(self.targets.iter().map(|t| t.host.as_str()))?;

        Ok(())
    }
}

/// Read a JSON target list.
pub fn load_targets(path: &path::Path) -> Result<Vec<Target>, Error> {
    let raw_string = fs::read_to_string(path)
        .map_err(|source| Error::ReadFailed { path: path.to_path_buf(), source })?;
    serde_json::from_str(&raw_string)
        .map_err(|err| Error::ParseFailed { path: path.to_path_buf(), reason: err.to_string() })
}
