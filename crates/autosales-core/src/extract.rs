//! Extractor: fetch the raw dataset into local flat files
//!
//! A [`DatasetSource`] writes the dataset (a ZIP archive or a bare CSV) to a
//! file in the raw directory. [`extract`] then unpacks archives and locates
//! the configured CSV file.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use crate::config::{Config, DatasetConfig, KaggleCredentials, SourceKind};
use crate::error::{Error, Result};

const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];
const USER_AGENT: &str = concat!("autosales/", env!("CARGO_PKG_VERSION"));

/// Output of the extract stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDataset {
    /// Path of the raw CSV file
    pub csv_path: PathBuf,
    /// False when an already extracted file was reused
    pub fetched: bool,
}

/// Something that can deliver the raw dataset
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Human-readable origin, for logs
    fn describe(&self) -> String;

    /// File name the fetched payload is stored under
    fn payload_name(&self) -> String;

    /// Write the payload to `dest`, returning the number of bytes written
    async fn fetch(&self, dest: &Path) -> Result<u64>;
}

/// Kaggle dataset download API
#[derive(Debug)]
pub struct KaggleSource {
    client: Client,
    url: String,
    slug: String,
    credentials: Option<KaggleCredentials>,
}

impl KaggleSource {
    /// Build a source for the configured dataset
    pub fn new(dataset: &DatasetConfig, credentials: Option<KaggleCredentials>) -> Self {
        let url = format!(
            "{}/datasets/download/{}/{}",
            dataset.api_base.trim_end_matches('/'),
            dataset.owner,
            dataset.dataset
        );
        Self {
            client: Client::new(),
            url,
            slug: dataset.dataset.clone(),
            credentials,
        }
    }

    /// Download URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DatasetSource for KaggleSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn payload_name(&self) -> String {
        format!("{}.zip", self.slug)
    }

    async fn fetch(&self, dest: &Path) -> Result<u64> {
        let mut request = self
            .client
            .get(&self.url)
            .header(reqwest::header::USER_AGENT, USER_AGENT);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, Some(creds.key.expose()));
        } else {
            tracing::warn!("No Kaggle credentials supplied; trying an anonymous download");
        }

        let response = request.send().await.map_err(|source| Error::Download {
            url: self.url.clone(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::DownloadStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| Error::Download {
                url: self.url.clone(),
                source,
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

/// A CSV or ZIP file already on disk
#[derive(Debug, Clone)]
pub struct LocalSource {
    path: PathBuf,
}

impl LocalSource {
    /// Source reading from `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DatasetSource for LocalSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn payload_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string())
    }

    async fn fetch(&self, dest: &Path) -> Result<u64> {
        Ok(tokio::fs::copy(&self.path, dest).await?)
    }
}

/// Build the source described by the configuration
pub fn source_for(
    config: &Config,
    credentials: Option<KaggleCredentials>,
) -> Result<Box<dyn DatasetSource>> {
    let dataset = &config.project.dataset;
    match dataset.source {
        SourceKind::Kaggle => Ok(Box::new(KaggleSource::new(dataset, credentials))),
        SourceKind::Local => {
            let path = dataset
                .local_path
                .as_deref()
                .ok_or_else(|| Error::ConfigInvalid {
                    message: "dataset.local_path is required when source is 'local'".to_string(),
                })?;
            Ok(Box::new(LocalSource::new(config.resolve(path))))
        }
    }
}

/// Fetch the dataset into `raw_dir` and return the path of `file_name`.
///
/// When `file_name` already exists under `raw_dir` and `force` is false the
/// source is not contacted.
pub async fn extract(
    source: &dyn DatasetSource,
    raw_dir: &Path,
    file_name: &str,
    force: bool,
) -> Result<RawDataset> {
    std::fs::create_dir_all(raw_dir)?;

    if !force && let Some(csv_path) = find_dataset_file(raw_dir, file_name) {
        tracing::info!("Reusing extracted dataset {}", csv_path.display());
        return Ok(RawDataset {
            csv_path,
            fetched: false,
        });
    }

    let payload = raw_dir.join(source.payload_name());
    tracing::info!("Fetching dataset from {}", source.describe());
    let bytes = source.fetch(&payload).await?;
    tracing::debug!("Wrote {} bytes to {}", bytes, payload.display());

    if is_zip(&payload)? {
        let archive = payload.clone();
        let dest = raw_dir.to_path_buf();
        tokio::task::spawn_blocking(move || unpack_archive(&archive, &dest))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;
    } else if payload.file_name().is_some_and(|n| n != file_name) {
        std::fs::rename(&payload, raw_dir.join(file_name))?;
    }

    let csv_path =
        find_dataset_file(raw_dir, file_name).ok_or_else(|| Error::DatasetFileMissing {
            file_name: file_name.to_string(),
            dir: raw_dir.display().to_string(),
        })?;
    tracing::info!("Dataset extracted to {}", csv_path.display());

    Ok(RawDataset {
        csv_path,
        fetched: true,
    })
}

fn is_zip(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 4];
    let mut file = std::fs::File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == ZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Unpack every entry of `archive` into `dest`
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<()> {
    let to_error = |source| Error::Archive {
        path: archive.display().to_string(),
        source,
    };
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(to_error)?;
    tracing::debug!("Unpacking {} entries from {}", zip.len(), archive.display());
    zip.extract(dest).map_err(to_error)?;
    Ok(())
}

/// Find `file_name` anywhere below `dir`
pub fn find_dataset_file(dir: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == file_name)
        .map(|e| e.into_path())
}
