// Low-level file helpers shared by the cache and the config layer.
use anyhow::Result;
use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};

pub struct LocalStorage;

impl LocalStorage {
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut name = file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        file_path.with_file_name(name)
    }

    /// Runs `f` while holding an exclusive advisory lock next to `file_path`.
    ///
    /// The lock file lives beside the data file so two processes sharing a
    /// data directory (CLI invocation and daemon) serialize their writes.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    /// Atomic write: Write to .tmp file then rename
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }
}
