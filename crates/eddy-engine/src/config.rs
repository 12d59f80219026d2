//! Session configuration.
//!
//! A session file lists the analyses to run:
//!
//! ```toml
//! log_level = "info"
//!
//! [[analysis]]
//! type = "histogram"
//! mesh = "fluid"
//! array = "pressure"
//! association = "cell"
//! bins = 16
//!
//! [[analysis]]
//! type = "posthoc"
//! output_dir = "out"
//! mode = "visit"
//! [[analysis.requirements]]
//! mesh = "fluid"
//! cell_arrays = ["pressure"]
//! ```

use std::path::{Path, PathBuf};

use eddy_core::{Association, CommError, Communicator};
use eddy_posthoc::IndexMode;
use eddy_requirements::RequirementConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::logging;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The session file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The session file is not valid TOML for this schema.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The configuration is well-formed but not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Sharing the file between ranks failed.
    #[error("distributing configuration: {0}")]
    Comm(#[from] CommError),
}

/// Whole-session configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Default log filter.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Analyses, in execution order.
    #[serde(default)]
    pub analysis: Vec<AnalysisConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_bins() -> usize {
    10
}

fn default_mode() -> String {
    "paraview".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            analysis: Vec::new(),
        }
    }
}

/// One configured analysis.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalysisConfig {
    /// A distributed histogram.
    Histogram(HistogramSection),
    /// A multi-block writer.
    Posthoc(PosthocSection),
}

impl AnalysisConfig {
    /// Whether the analysis should be built.
    pub fn enabled(&self) -> bool {
        match self {
            Self::Histogram(h) => h.enabled,
            Self::Posthoc(p) => p.enabled,
        }
    }

    /// Analysis type name as written in the file.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Histogram(_) => "histogram",
            Self::Posthoc(_) => "posthoc",
        }
    }
}

/// `type = "histogram"`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct HistogramSection {
    /// Build this analysis.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Mesh to fetch.
    pub mesh: String,
    /// Array to histogram.
    pub array: String,
    /// `point`, `cell` or `field`.
    pub association: String,
    /// Number of bins.
    #[serde(default = "default_bins")]
    pub bins: usize,
}

impl HistogramSection {
    /// Parsed association.
    pub fn association(&self) -> Result<Association, ConfigError> {
        self.association
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("histogram on \"{}\": {e}", self.mesh)))
    }
}

/// `type = "posthoc"`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PosthocSection {
    /// Build this analysis.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Directory receiving block and index files.
    pub output_dir: PathBuf,
    /// Index mode name (`paraview`/`pvd`/`collection`, `visit`/`legacy`).
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Meshes and arrays to write; everything when empty.
    #[serde(default)]
    pub requirements: Vec<RequirementConfig>,
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration on every rank from a file read by rank 0 only.
    ///
    /// Every rank enters the broadcast exactly once, including when rank 0
    /// fails to read the file; in that case every rank returns an error.
    pub fn load_collective<P: AsRef<Path>>(
        comm: &dyn Communicator,
        path: P,
    ) -> Result<Self, ConfigError> {
        const OK: u8 = 1;
        const FAILED: u8 = 0;

        let path = path.as_ref();
        let mut bytes = Vec::new();
        if comm.rank() == 0 {
            match std::fs::read(path) {
                Ok(content) => {
                    bytes.push(OK);
                    bytes.extend_from_slice(&content);
                }
                Err(e) => {
                    bytes.push(FAILED);
                    bytes.extend_from_slice(e.to_string().as_bytes());
                }
            }
        }
        comm.broadcast_bytes(0, &mut bytes)?;

        let Some((&status, payload)) = bytes.split_first() else {
            return Err(ConfigError::Invalid("empty configuration broadcast".into()));
        };
        let text = String::from_utf8_lossy(payload);
        if status != OK {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(text.into_owned()),
            });
        }
        Self::from_toml_str(&text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, analysis) in self.analysis.iter().enumerate() {
            match analysis {
                AnalysisConfig::Histogram(h) => {
                    if h.bins == 0 {
                        return Err(ConfigError::Invalid(format!(
                            "analysis {i}: histogram needs at least one bin"
                        )));
                    }
                    if h.mesh.is_empty() || h.array.is_empty() {
                        return Err(ConfigError::Invalid(format!(
                            "analysis {i}: histogram needs a mesh and an array"
                        )));
                    }
                    h.association()?;
                }
                AnalysisConfig::Posthoc(p) => {
                    if p.output_dir.as_os_str().is_empty() {
                        return Err(ConfigError::Invalid(format!(
                            "analysis {i}: posthoc needs an output_dir"
                        )));
                    }
                    p.mode
                        .parse::<IndexMode>()
                        .map_err(|e| ConfigError::Invalid(format!("analysis {i}: {e}")))?;
                    if let Some(r) = p.requirements.iter().find(|r| r.mesh.is_empty()) {
                        return Err(ConfigError::Invalid(format!(
                            "analysis {i}: requirement with empty mesh name ({r:?})"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Enabled analyses, in order.
    pub fn enabled(&self) -> impl Iterator<Item = &AnalysisConfig> + '_ {
        self.analysis.iter().filter(|a| a.enabled())
    }

    /// Log filter for this session: `EDDY_LOG` if set, else `log_level`.
    pub fn log_filter(&self) -> EnvFilter {
        logging::filter(&self.log_level)
    }

    /// Install the process-wide subscriber at this session's log level.
    /// Returns `false` if one was already installed.
    pub fn init_logging(&self) -> bool {
        logging::init(&self.log_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_core::SelfComm;

    const EXAMPLE: &str = r#"
        [[analysis]]
        type = "histogram"
        mesh = "fluid"
        array = "pressure"
        association = "Cell"
        bins = 16

        [[analysis]]
        type = "posthoc"
        enabled = false
        output_dir = "out"
        mode = "visit"

        [[analysis.requirements]]
        mesh = "fluid"
        cell_arrays = ["pressure"]
    "#;

    #[test]
    fn parses_both_analysis_kinds() {
        let config = SessionConfig::from_toml_str(EXAMPLE).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.analysis.len(), 2);
        let AnalysisConfig::Histogram(h) = &config.analysis[0] else {
            panic!("expected histogram");
        };
        assert_eq!(h.bins, 16);
        assert_eq!(h.association().unwrap(), Association::Cell);
        let AnalysisConfig::Posthoc(p) = &config.analysis[1] else {
            panic!("expected posthoc");
        };
        assert!(!p.enabled);
        assert_eq!(p.requirements[0].cell_arrays, ["pressure"]);
        assert_eq!(config.enabled().count(), 1);
    }

    #[test]
    fn defaults_apply() {
        let config = SessionConfig::from_toml_str(
            r#"
            [[analysis]]
            type = "histogram"
            mesh = "m"
            array = "a"
            association = "point"
            "#,
        )
        .unwrap();
        let AnalysisConfig::Histogram(h) = &config.analysis[0] else {
            panic!("expected histogram");
        };
        assert_eq!(h.bins, 10);
        assert!(h.enabled);
    }

    #[test]
    fn rejects_invalid_values() {
        let zero_bins = r#"
            [[analysis]]
            type = "histogram"
            mesh = "m"
            array = "a"
            association = "cell"
            bins = 0
        "#;
        assert!(matches!(SessionConfig::from_toml_str(zero_bins), Err(ConfigError::Invalid(_))));

        let bad_assoc = r#"
            [[analysis]]
            type = "histogram"
            mesh = "m"
            array = "a"
            association = "edge"
        "#;
        assert!(matches!(SessionConfig::from_toml_str(bad_assoc), Err(ConfigError::Invalid(_))));

        let bad_mode = r#"
            [[analysis]]
            type = "posthoc"
            output_dir = "o"
            mode = "xdmf"
        "#;
        assert!(matches!(SessionConfig::from_toml_str(bad_mode), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn log_level_drives_the_filter() {
        use tracing_subscriber::filter::LevelFilter;
        let config = SessionConfig::from_toml_str("log_level = \"debug\"").unwrap();
        if std::env::var_os(logging::LOG_ENV).is_none() {
            assert_eq!(config.log_filter().max_level_hint(), Some(LevelFilter::DEBUG));
            assert_eq!(
                SessionConfig::default().log_filter().max_level_hint(),
                Some(LevelFilter::INFO)
            );
        }
    }

    #[test]
    fn unknown_type_is_a_parse_error() {
        let text = r#"
            [[analysis]]
            type = "catalyst"
        "#;
        assert!(matches!(SessionConfig::from_toml_str(text), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        match SessionConfig::from_file(&path) {
            Err(ConfigError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn load_collective_on_single_rank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::write(&path, EXAMPLE).unwrap();
        let config = SessionConfig::load_collective(&SelfComm, &path).unwrap();
        assert_eq!(config, SessionConfig::from_file(&path).unwrap());
    }
}
