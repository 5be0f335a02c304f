use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::SequenceError;
use crate::sequencer::guard::DEFAULT_MAX_ATTEMPTS;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub sequencer: SequencerConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl SequencerConfig {
    /// # Errors
    ///
    /// Returns [`SequenceError::InvalidConfig`] when `max_attempts` is zero.
    pub fn validate(&self) -> Result<(), SequenceError> {
        if self.max_attempts == 0 {
            return Err(SequenceError::InvalidConfig(
                "sequencer.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub stop_on_failure: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            shell: default_shell(),
            stop_on_failure: false,
        }
    }
}

impl RunConfig {
    /// # Errors
    ///
    /// Returns [`SequenceError::InvalidConfig`] when `jobs` is zero or the
    /// shell is blank.
    pub fn validate(&self) -> Result<(), SequenceError> {
        if self.jobs == 0 {
            return Err(SequenceError::InvalidConfig(
                "run.jobs must be at least 1".to_string(),
            ));
        }
        if self.shell.trim().is_empty() {
            return Err(SequenceError::InvalidConfig(
                "run.shell must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

/// Command-line overrides applied on top of files and environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub max_attempts: Option<u32>,
    pub jobs: Option<usize>,
    pub stop_on_failure: bool,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".lineup/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("lineup/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve the effective run configuration.
///
/// Precedence (highest wins): `overrides` > `LINEUP_MAX_ATTEMPTS` / `LINEUP_JOBS`
/// > project file > defaults. The user config only carries display settings
/// and is loaded separately with [`load_user_config`].
///
/// # Errors
///
/// A project file that cannot be read or parsed surfaces as a plain `anyhow`
/// error. Bad environment values and failed validation surface as
/// [`SequenceError::InvalidConfig`], which callers can downcast to.
pub fn resolve_config(project_root: &Path, overrides: Overrides) -> Result<ProjectConfig> {
    let mut project = load_project_config(project_root)?;

    apply_env(
        &mut project,
        env::var("LINEUP_MAX_ATTEMPTS").ok().as_deref(),
        env::var("LINEUP_JOBS").ok().as_deref(),
    )?;
    apply_overrides(&mut project, overrides);

    project.sequencer.validate()?;
    project.run.validate()?;

    Ok(project)
}

fn apply_env(
    project: &mut ProjectConfig,
    max_attempts: Option<&str>,
    jobs: Option<&str>,
) -> Result<(), SequenceError> {
    if let Some(raw) = max_attempts {
        project.sequencer.max_attempts = parse_env("LINEUP_MAX_ATTEMPTS", raw)?;
    }
    if let Some(raw) = jobs {
        project.run.jobs = parse_env("LINEUP_JOBS", raw)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, SequenceError> {
    raw.trim()
        .parse()
        .map_err(|_| SequenceError::InvalidConfig(format!("{name} is not a number: '{raw}'")))
}

fn apply_overrides(project: &mut ProjectConfig, overrides: Overrides) {
    if let Some(max_attempts) = overrides.max_attempts {
        project.sequencer.max_attempts = max_attempts;
    }
    if let Some(jobs) = overrides.jobs {
        project.run.jobs = jobs;
    }
    if overrides.stop_on_failure {
        project.run.stop_on_failure = true;
    }
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_jobs() -> usize {
    1
}

fn default_shell() -> String {
    "sh".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_project_config(root: &Path, body: &str) {
        let dir = root.join(".lineup");
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("config.toml"), body).expect("write");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_project_config(dir.path()).expect("load");
        assert_eq!(cfg, ProjectConfig::default());
        assert_eq!(cfg.sequencer.max_attempts, 3);
        assert_eq!(cfg.run.jobs, 1);
        assert_eq!(cfg.run.shell, "sh");
        assert!(!cfg.run.stop_on_failure);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_project_config(dir.path(), "[sequencer]\nmax_attempts = 5\n");
        let cfg = load_project_config(dir.path()).expect("load");
        assert_eq!(cfg.sequencer.max_attempts, 5);
        assert_eq!(cfg.run, RunConfig::default());
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_project_config(dir.path(), "[sequencer\n");
        let err = load_project_config(dir.path()).expect_err("bad toml");
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn env_then_overrides_take_precedence() {
        let mut cfg = ProjectConfig::default();
        apply_env(&mut cfg, Some("7"), Some("4")).expect("env");
        assert_eq!(cfg.sequencer.max_attempts, 7);
        assert_eq!(cfg.run.jobs, 4);

        apply_overrides(
            &mut cfg,
            Overrides {
                max_attempts: Some(2),
                jobs: None,
                stop_on_failure: true,
            },
        );
        assert_eq!(cfg.sequencer.max_attempts, 2);
        assert_eq!(cfg.run.jobs, 4);
        assert!(cfg.run.stop_on_failure);
    }

    #[test]
    fn non_numeric_env_is_rejected() {
        let mut cfg = ProjectConfig::default();
        let err = apply_env(&mut cfg, None, Some("many")).expect_err("not a number");
        assert_eq!(
            err,
            SequenceError::InvalidConfig("LINEUP_JOBS is not a number: 'many'".to_string())
        );
    }

    #[test]
    fn resolve_keeps_validation_errors_typed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = resolve_config(
            dir.path(),
            Overrides {
                max_attempts: Some(0),
                ..Overrides::default()
            },
        )
        .expect_err("zero attempts");
        assert!(matches!(
            err.downcast_ref::<SequenceError>(),
            Some(SequenceError::InvalidConfig(_))
        ));

        write_project_config(dir.path(), "[run\n");
        let err = resolve_config(dir.path(), Overrides::default()).expect_err("bad toml");
        assert!(err.downcast_ref::<SequenceError>().is_none());
    }

    #[test]
    fn zero_values_fail_validation() {
        let seq = SequencerConfig { max_attempts: 0 };
        assert!(matches!(seq.validate(), Err(SequenceError::InvalidConfig(_))));

        let run = RunConfig {
            jobs: 0,
            ..RunConfig::default()
        };
        assert!(run.validate().is_err());
    }
}
