use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::backend::ObjectStore;
use crate::config::StorageConfig;
use crate::error::{ProviderError, StorageError};

/// Object store backed by a local directory.
///
/// Objects are written once with `create_new`; a name that is already taken
/// gets a numbered suffix instead of being overwritten.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: None,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root),
            public_base_url: config
                .public_base_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn with_public_base_url(mut self, url: &str) -> Self {
        self.public_base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `content` under the relative `path` and returns the relative
    /// path actually used.
    pub fn store(&self, path: &str, content: &[u8]) -> Result<String, StorageError> {
        let relative = checked_relative(path)?;
        let target = self.root.join(&relative);
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        ensure_directory(&dir)?;

        let filename = relative
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        let stored = store_exclusive(&dir, filename, content)?;

        let stored_relative = stored
            .strip_prefix(&self.root)
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .map_err(|_| StorageError::InvalidPath(path.to_string()))?;
        Ok(stored_relative)
    }

    /// URL under which a stored relative path is served.
    pub fn url_for(&self, relative: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, relative),
            None => format!("file://{}", self.root.join(relative).display()),
        }
    }
}

/// Rejects empty, absolute and parent-escaping object paths.
fn checked_relative(path: &str) -> Result<PathBuf, StorageError> {
    let candidate = Path::new(path);
    let valid = !path.trim().is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(candidate.to_path_buf())
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn store_exclusive(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
    let (base, ext) = match filename.rfind('.') {
        Some(dot) if dot > 0 => (&filename[..dot], Some(&filename[dot..])),
        _ => (filename, None),
    };

    for counter in 1..=1000 {
        let candidate = match (counter, ext) {
            (1, _) => filename.to_string(),
            (n, Some(ext)) => format!("{}_{}{}", base, n, ext),
            (n, None) => format!("{}_{}", base, n),
        };
        let path = dir.join(&candidate);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(content)
                    .map_err(|e| StorageError::WriteFile {
                        path: path.clone(),
                        source: e,
                    })?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(StorageError::WriteFile { path, source: e }),
        }
    }

    Err(StorageError::FileExists(dir.join(filename)))
}

#[async_trait]
impl ObjectStore for FileStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ProviderError> {
        let storage = self.clone();
        let path = path.to_string();
        let stored = tokio::task::spawn_blocking(move || storage.store(&path, &bytes))
            .await
            .map_err(|e| ProviderError::ObjectStorage(e.to_string()))??;

        log::info!("Stored {} object at {}", content_type, stored);
        Ok(self.url_for(&stored))
    }
}
