use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Private scratch directory for one execution.
///
/// Removed with everything inside it when dropped, on every exit path.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create() -> std::io::Result<Self> {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros())
            .unwrap_or_default();
        let seq = WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let prefix = format!("codebench-{}-{}-", micros, seq);
        let dir = tempfile::Builder::new().prefix(&prefix).tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub async fn write_source(&self, name: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.file(name);
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }
}
