// File: ./src/context.rs
//! Where episodic keeps its files.
//!
//! Every piece of code that touches disk receives a `&dyn AppContext`
//! instead of resolving paths itself, so the CLI can honour `--root` and
//! tests can run against a throwaway directory.
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub trait AppContext: Send + Sync + std::fmt::Debug {
    /// Holds the cache and the log. Created on first use.
    fn get_data_dir(&self) -> Result<PathBuf>;
    /// Holds `config.toml`. Created on first use.
    fn get_config_dir(&self) -> Result<PathBuf>;

    fn get_config_file_path(&self) -> Result<PathBuf> {
        Ok(self.get_config_dir()?.join("config.toml"))
    }

    /// Local key-value mirror of the tracked list and settings.
    fn get_cache_path(&self) -> Result<PathBuf> {
        Ok(self.get_data_dir()?.join("cache.json"))
    }

    fn get_log_path(&self) -> Option<PathBuf> {
        self.get_data_dir().ok().map(|p| p.join("episodic.log"))
    }
}

fn create_dir(path: PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(&path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    Ok(path)
}

/// Platform directories, or `<root>/data` and `<root>/config` under `--root`.
#[derive(Clone, Debug)]
pub struct StandardContext {
    root: Option<PathBuf>,
}

impl StandardContext {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "episodic", "episodic")
            .ok_or_else(|| anyhow::anyhow!("Cannot locate a home directory"))
    }
}

impl AppContext for StandardContext {
    fn get_data_dir(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => create_dir(root.join("data")),
            None => create_dir(Self::project_dirs()?.data_dir().to_path_buf()),
        }
    }

    fn get_config_dir(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => create_dir(root.join("config")),
            None => create_dir(Self::project_dirs()?.config_dir().to_path_buf()),
        }
    }
}

/// Unique temp directory for one test, removed on drop.
#[derive(Clone, Debug)]
pub struct TestContext {
    pub root: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let root = std::env::temp_dir().join(format!("episodic_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).expect("failed to create TestContext temp dir");
        Self { root }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext for TestContext {
    fn get_data_dir(&self) -> Result<PathBuf> {
        create_dir(self.root.join("data"))
    }

    fn get_config_dir(&self) -> Result<PathBuf> {
        create_dir(self.root.join("config"))
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_override_layout() {
        let tmp = TestContext::new();
        let ctx = StandardContext::new(Some(tmp.root.join("alt")));
        assert_eq!(
            ctx.get_cache_path().unwrap(),
            tmp.root.join("alt").join("data").join("cache.json")
        );
        assert_eq!(
            ctx.get_config_file_path().unwrap(),
            tmp.root.join("alt").join("config").join("config.toml")
        );
        assert!(tmp.root.join("alt").join("config").is_dir());
    }

    #[test]
    fn test_test_context_cleans_up() {
        let root = {
            let ctx = TestContext::new();
            ctx.get_data_dir().unwrap();
            ctx.root.clone()
        };
        assert!(!root.exists());
    }
}
