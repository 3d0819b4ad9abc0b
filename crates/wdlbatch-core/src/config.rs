use crate::errors::ConfigError;
use crate::model::{ConflictPolicy, WorkflowType};
use crate::samplesheet::SampleSheetValidator;
use crate::template::WdlInputTemplate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub max_files: usize,
    pub max_age_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            max_files: 20,
            max_age_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server_url: String,
    pub conflict_policy: ConflictPolicy,
    pub status_progress_interval: usize,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            conflict_policy: ConflictPolicy::default(),
            status_progress_interval: crate::constants::report::STATUS_PROGRESS_INTERVAL,
            logging: LoggingConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("wdlbatch");
    xdg_dirs
        .get_config_home()
        .map(|home| home.join("config.toml"))
        .ok_or(ConfigError::HomeDirectoryNotFound("config"))
}

/// Loads `~/.config/wdlbatch/config.toml`, falling back to defaults when the
/// file does not exist.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path()?;
    if !path.exists() {
        tracing::debug!("No config file at '{}', using defaults", path.display());
        return Ok(Config::default());
    }
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let content = fs_err::read_to_string(path)?;
    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::InvalidFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if config.status_progress_interval == 0 {
        return Err(ConfigError::InvalidFile {
            path: path.to_path_buf(),
            reason: "status_progress_interval must be greater than zero".to_string(),
        });
    }
    tracing::debug!("Loaded config from '{}'", path.display());
    Ok(config)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchConfigFile {
    input_template: Option<String>,
    input_template_file: Option<PathBuf>,
    sample_id_col: String,
    #[serde(default)]
    sample_sheet_validators: Vec<SampleSheetValidator>,
    #[serde(default)]
    wf_type: WorkflowType,
}

/// How a sample sheet is turned into a batch of workflow inputs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub path: PathBuf,
    pub template: WdlInputTemplate,
    pub sample_id_col: String,
    pub sample_sheet_validators: Vec<SampleSheetValidator>,
    pub wf_type: WorkflowType,
}

impl BatchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs_err::read_to_string(path)?;
        let raw: BatchConfigFile = toml::from_str(&content).map_err(|e| ConfigError::InvalidFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let template_text = match (raw.input_template, raw.input_template_file) {
            (Some(inline), None) => inline,
            (None, Some(file)) => {
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                fs_err::read_to_string(base.join(file))?
            }
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidFile {
                    path: path.to_path_buf(),
                    reason: "set only one of 'input_template' and 'input_template_file'".to_string(),
                })
            }
            (None, None) => {
                return Err(ConfigError::InvalidFile {
                    path: path.to_path_buf(),
                    reason: "one of 'input_template' or 'input_template_file' is required".to_string(),
                })
            }
        };
        let template = WdlInputTemplate::parse(&template_text)?;

        if !template.columns().contains(&raw.sample_id_col.as_str()) {
            return Err(ConfigError::InvalidFile {
                path: path.to_path_buf(),
                reason: format!(
                    "sample_id_col '{}' is not a column of the input template",
                    raw.sample_id_col
                ),
            });
        }

        tracing::info!(
            "Loaded batch config '{}' ({} workflow '{}')",
            path.display(),
            raw.wf_type,
            template.workflow_name()
        );
        Ok(Self {
            path: path.to_path_buf(),
            template,
            sample_id_col: raw.sample_id_col,
            sample_sheet_validators: raw.sample_sheet_validators,
            wf_type: raw.wf_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults_fill_missing_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs_err::write(&path, "conflict_policy = \"rerun-all\"\n[logging]\nmax_files = 3\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.conflict_policy, ConflictPolicy::RerunAll);
        assert_eq!(config.status_progress_interval, 20);
        assert_eq!(config.logging.max_files, 3);
        assert_eq!(config.logging.max_age_days, 7);
    }

    #[test]
    fn test_config_rejects_unknown_policy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs_err::write(&path, "conflict_policy = \"rerun-sometimes\"\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile { .. }));
    }

    #[test]
    fn test_batch_config_with_template_file() {
        let dir = tempdir().unwrap();
        fs_err::write(
            dir.path().join("inputs.json"),
            r#"{"wf.sample": "", "wf.fastq": []}"#,
        )
        .unwrap();
        let path = dir.path().join("batch.toml");
        fs_err::write(
            &path,
            r#"
input_template_file = "inputs.json"
sample_id_col = "wf.sample"
sample_sheet_validators = ["label-safe-sample-ids"]
wf_type = "gather"
"#,
        )
        .unwrap();

        let config = BatchConfig::load(&path).unwrap();
        assert_eq!(config.wf_type, WorkflowType::Gather);
        assert_eq!(
            config.sample_sheet_validators,
            vec![SampleSheetValidator::LabelSafeSampleIds]
        );
        assert_eq!(config.template.workflow_name(), "wf");
    }

    #[test]
    fn test_batch_config_rejects_unknown_validator() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch.toml");
        fs_err::write(
            &path,
            r#"
input_template = '{"wf.sample": ""}'
sample_id_col = "wf.sample"
sample_sheet_validators = ["validate_everything"]
"#,
        )
        .unwrap();
        let err = BatchConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("validate_everything"));
    }

    #[test]
    fn test_batch_config_rejects_unknown_workflow_type() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch.toml");
        fs_err::write(
            &path,
            r#"
input_template = '{"wf.sample": ""}'
sample_id_col = "wf.sample"
wf_type = "fanout"
"#,
        )
        .unwrap();
        let err = BatchConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("fanout"));
    }

    #[test]
    fn test_batch_config_requires_exactly_one_template() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch.toml");
        fs_err::write(&path, "sample_id_col = \"wf.sample\"\n").unwrap();
        assert!(BatchConfig::load(&path).is_err());
    }

    #[test]
    fn test_batch_config_id_column_must_be_in_template() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch.toml");
        fs_err::write(
            &path,
            "input_template = '{\"wf.sample\": \"\"}'\nsample_id_col = \"sample\"\n",
        )
        .unwrap();
        let err = BatchConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("sample_id_col"));
    }
}
