use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tokio::fs;
use tokio::sync::watch::Receiver;
use tracing::{debug, error, info};

/// Keeps the current refresh token on disk so a restart does not need a new
/// authorization code.
#[derive(Debug, Clone)]
pub struct RefreshTokenFile {
    path: PathBuf,
}

impl RefreshTokenFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted token, `None` when the file is missing or blank.
    pub async fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_owned()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow!("unable to read refresh token file '{}': {}", self.path.display(), e)),
        }
    }

    /// Atomic replace: write a 0600 temp file next to the target, then rename.
    pub async fn write(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, token.as_bytes()).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&tmp, &self.path).await?;
        debug!("refresh token written to '{}'", self.path.display());
        Ok(())
    }

    /// Write every refresh token published by the gateway until the sender goes away
    /// or `shutdown` flips. On shutdown the latest published token is flushed first.
    pub async fn run(self, mut rx: Receiver<String>, mut shutdown: Receiver<bool>) -> Result<()> {
        info!("start refresh token sink, path '{}'", self.path.display());
        let mut last_written = self.read().await.unwrap_or_default().unwrap_or_default();

        loop {
            let token = rx.borrow_and_update().to_owned();
            self.persist(&token, &mut last_written).await;

            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        info!("refresh token sink stopped");
                        return Ok(());
                    }
                }
                _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => {
                    let token = rx.borrow_and_update().to_owned();
                    self.persist(&token, &mut last_written).await;
                    info!("refresh token sink stopped on shutdown");
                    return Ok(());
                }
            }
        }
    }

    async fn persist(&self, token: &str, last_written: &mut String) {
        if token.is_empty() || token == last_written.as_str() {
            return;
        }
        match self.write(token).await {
            Ok(()) => *last_written = token.to_owned(),
            Err(e) => error!("persisting refresh token to '{}' failed: {}", self.path.display(), e),
        }
    }
}
