//! Configuration management utilities.
//!
//! Layered: baked-in defaults, then the global config file, then the
//! workspace config file, then environment variables. The result is a plain
//! struct handed explicitly to the constructors that need it; nothing reads
//! configuration ambiently.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::infra::finder::RepositoryPriority;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".madpack/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub repository: Repository,
    #[serde(default)]
    pub kernel: Kernel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Repository {
    /// Root of the shared model repository on disk.
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    file_priority: Option<String>,
}

impl Repository {
    pub fn base(&self) -> Option<PathBuf> {
        self.base.as_ref().map(PathBuf::from)
    }

    /// The configured lookup priority. Unknown values fall back to
    /// [`RepositoryPriority::Repository`] with a warning instead of failing,
    /// so a typo in a config file never blocks resolution.
    pub fn file_priority(&self) -> RepositoryPriority {
        match self.file_priority.as_deref() {
            None => RepositoryPriority::default(),
            Some("repository") => RepositoryPriority::Repository,
            Some("archive") => RepositoryPriority::Archive,
            Some(other) => {
                tracing::warn!(value = other, "unknown file_priority, using 'repository'");
                RepositoryPriority::Repository
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Kernel {
    /// Directory below which kernel workspaces are created.
    #[serde(default)]
    work_root: Option<String>,
}

impl Kernel {
    pub fn work_root(&self) -> Option<PathBuf> {
        self.work_root.as_ref().map(PathBuf::from)
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    repository_base: Option<String>,
    file_priority: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            repository_base: env::var("MADPACK_REPOSITORY_BASE").ok(),
            file_priority: env::var("MADPACK_FILE_PRIORITY").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(repository_base: &str, file_priority: &str) -> Self {
        Self {
            repository_base: Some(repository_base.to_owned()),
            file_priority: Some(file_priority.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            repository: Repository {
                base: other.repository.base.or(self.repository.base),
                file_priority: other.repository.file_priority.or(self.repository.file_priority),
            },
            kernel: Kernel {
                work_root: other.kernel.work_root.or(self.kernel.work_root),
            },
        }
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("madpack/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(base) = env.repository_base {
        config.repository.base = Some(base);
    }
    if let Some(priority) = env.file_priority {
        config.repository.file_priority = Some(priority);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.repository.base(), None);
        assert_eq!(
            config.repository.file_priority(),
            RepositoryPriority::Repository
        );
        assert_eq!(config.kernel.work_root(), None);
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[repository]
base = "/acc/models"
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".madpack"))?;
        fs::write(
            workspace_dir.join(".madpack/config.toml"),
            r#"
[repository]
file_priority = "archive"
[kernel]
work_root = "/scratch/kernels"
"#,
        )?;

        let global_path = Some(global);
        let workspace_path = Some(workspace_dir.join(".madpack/config.toml"));

        let config =
            Config::load_with_layers(global_path, workspace_path, EnvOverrides::default())?;

        assert_eq!(config.repository.base(), Some(PathBuf::from("/acc/models")));
        assert_eq!(
            config.repository.file_priority(),
            RepositoryPriority::Archive
        );
        assert_eq!(
            config.kernel.work_root(),
            Some(PathBuf::from("/scratch/kernels"))
        );

        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("/env/models", "archive");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.repository.base(), Some(PathBuf::from("/env/models")));
        assert_eq!(
            config.repository.file_priority(),
            RepositoryPriority::Archive
        );
        Ok(())
    }

    #[test]
    fn unknown_priority_falls_back_to_repository() -> Result<()> {
        let overrides = EnvOverrides::for_tests("/env/models", "sideways");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(
            config.repository.file_priority(),
            RepositoryPriority::Repository
        );
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }
}
