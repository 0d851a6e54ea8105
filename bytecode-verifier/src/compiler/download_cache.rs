use super::fetcher::{fetch_bytes, validate_checksum, FetchError};
use crate::metrics;
use bytes::Bytes;
use std::{
    collections::HashMap,
    io::{Cursor, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::Instrument;
use url::Url;

const DOWNLOADS_DIR: &str = "downloads";
const MAX_FILENAME_LEN: usize = 255;

/// What to download and where to place it inside the cache directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: Url,
    pub filename: String,
    pub executable: bool,
    /// Expected sha256 of the downloaded file, hex encoded.
    pub sha256: Option<String>,
}

/// Files are interpolated into process arguments and shell commands,
/// so only a conservative set of characters is accepted.
pub fn validate_filename(filename: &str) -> Result<(), FetchError> {
    let mut chars = filename.chars();
    let valid = filename.len() <= MAX_FILENAME_LEN
        && chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
        && !filename.contains("..");
    if !valid {
        return Err(FetchError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

/// Maps file names to local files, downloading every file at most once.
///
/// Concurrent requests for the same file wait for a single transfer.
/// Failed downloads leave nothing behind and are retried by the next request.
pub struct ArtifactCache {
    dir: PathBuf,
    client: reqwest::Client,
    cache: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::RwLock<Option<PathBuf>>>>>,
}

impl ArtifactCache {
    pub fn new(dir: PathBuf, client: reqwest::Client) -> Self {
        Self {
            dir,
            client,
            cache: Default::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn try_get(&self, filename: &str) -> Option<PathBuf> {
        let entry = {
            let cache = self.cache.lock();
            cache.get(filename).cloned()
        };
        match entry {
            Some(lock) => {
                let file = lock.read().await;
                file.as_ref().cloned()
            }
            None => None,
        }
    }

    /// Returns the local path of the requested file. Files which already
    /// exist in the cache directory are returned without downloading.
    pub async fn download(&self, request: &DownloadRequest) -> Result<PathBuf, FetchError> {
        validate_filename(&request.filename)?;

        metrics::DOWNLOAD_CACHE_TOTAL.inc();
        match self.try_get(&request.filename).await {
            Some(file) => {
                metrics::DOWNLOAD_CACHE_HITS.inc();
                Ok(file)
            }
            None => {
                let span = tracing::debug_span!("fetch compiler", file = %request.filename);
                self.fetch(request).instrument(span).await
            }
        }
    }

    async fn fetch(&self, request: &DownloadRequest) -> Result<PathBuf, FetchError> {
        let lock = {
            let mut cache = self.cache.lock();
            Arc::clone(cache.entry(request.filename.clone()).or_default())
        };
        let mut entry = lock.write().await;
        if let Some(file) = entry.as_ref() {
            return Ok(file.clone());
        }

        let destination = self.dir.join(&request.filename);
        if tokio::fs::try_exists(&destination).await? {
            tracing::debug!(target: "compiler_cache", "found local file {}", request.filename);
        } else {
            let _timer = metrics::COMPILER_FETCH_TIME.start_timer();
            tracing::info!(target: "compiler_cache", "downloading {} from {}", request.filename, request.url);
            let data = fetch_bytes(&self.client, &request.url).await?;
            self.store(request, data, destination.clone()).await?;
        }

        *entry = Some(destination.clone());
        Ok(destination)
    }

    async fn store(
        &self,
        request: &DownloadRequest,
        data: Bytes,
        destination: PathBuf,
    ) -> Result<(), FetchError> {
        let downloads = self.dir.join(DOWNLOADS_DIR);
        let is_archive = request.url.path().ends_with(".zip");
        let executable = request.executable;
        let sha256 = request.sha256.clone();

        let span = tracing::debug_span!("save file");
        tokio::task::spawn_blocking(move || {
            let _guard = span.enter();
            if let Some(sha256) = sha256 {
                validate_checksum(&data, &sha256)?;
            }

            std::fs::create_dir_all(&downloads)?;
            let mut file = tempfile::NamedTempFile::new_in(&downloads)?;
            if is_archive {
                unpack_executable(&data, file.as_file_mut())?;
            } else {
                file.write_all(&data)?;
            }
            file.as_file().sync_all()?;
            if executable {
                make_executable(file.path())?;
            }
            file.persist(&destination).map_err(|err| err.error)?;
            Ok::<_, FetchError>(())
        })
        .await??;
        Ok(())
    }
}

/// Windows distributions are zip archives with a single executable inside.
fn unpack_executable(data: &[u8], out: &mut std::fs::File) -> Result<(), FetchError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_file() && file.name().ends_with(".exe") {
            std::io::copy(&mut file, out)?;
            return Ok(());
        }
    }
    Err(zip::result::ZipError::FileNotFound.into())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
