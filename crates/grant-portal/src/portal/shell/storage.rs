use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::config::PortalConfig;
use crate::portal::platform::{BlobMetadata, BlobStore, PlatformError};

/// A file picked in the browser, ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredPdf {
    pub name: String,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("PDF file size exceeds the {limit_mib}MB limit.")]
    TooLarge { size: usize, limit_mib: usize },
    #[error("File type not supported (ONLY pdf file type accepted).")]
    NotPdf(String),
    #[error("No file selected")]
    NoFile,
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Browser-side helpers over the PDF folder of the blob store.
pub struct PdfStorage {
    blobs: Arc<dyn BlobStore>,
    prefix: String,
    max_bytes: usize,
}

impl PdfStorage {
    pub fn new(blobs: Arc<dyn BlobStore>, config: &PortalConfig) -> Self {
        Self {
            blobs,
            prefix: config.upload_prefix.clone(),
            max_bytes: config.max_upload_bytes,
        }
    }

    /// Object path for a file name. Directory parts are dropped so names stay under the prefix.
    fn path_for(&self, name: &str) -> Option<String> {
        let base = file_base_name(name)?;
        Some(format!("{}/{base}", self.prefix))
    }

    /// Stores the file under its own name and returns its download URL.
    pub async fn upload(&self, file: PdfFile) -> Result<StoredPdf, StorageError> {
        if file.bytes.len() > self.max_bytes {
            return Err(StorageError::TooLarge {
                size: file.bytes.len(),
                limit_mib: self.max_bytes / (1024 * 1024),
            });
        }
        if file.content_type != mime::APPLICATION_PDF.essence_str() {
            return Err(StorageError::NotPdf(file.content_type));
        }
        let Some(path) = self.path_for(&file.name) else {
            return Err(StorageError::NoFile);
        };
        let metadata = BlobMetadata {
            content_type: file.content_type,
            custom: BTreeMap::new(),
        };
        self.blobs
            .upload(&path, file.bytes, metadata)
            .await
            .inspect_err(|err| error!(%path, error = %err, "upload failed"))?;

        let url = self.blobs.download_url(&path).await?;
        info!(%path, "pdf uploaded");
        Ok(StoredPdf {
            name: file_name_of(&path).to_string(),
            url,
        })
    }

    /// One download URL per name, in the order given. Fails on the first missing file.
    pub async fn download_by_name(
        &self,
        names: &[String],
    ) -> Result<Vec<StoredPdf>, StorageError> {
        let mut files = Vec::with_capacity(names.len());
        for name in names {
            let path = self
                .path_for(name)
                .ok_or_else(|| PlatformError::NotFound(format!("file `{name}`")))?;
            let url = self
                .blobs
                .download_url(&path)
                .await
                .inspect_err(|err| error!(%name, error = %err, "error listing files"))?;
            files.push(StoredPdf {
                name: name.clone(),
                url,
            });
        }
        Ok(files)
    }

    pub async fn list_all(&self) -> Result<Vec<StoredPdf>, StorageError> {
        let paths = self
            .blobs
            .list(&self.prefix)
            .await
            .inspect_err(|err| error!(prefix = %self.prefix, error = %err, "error listing files"))?;

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let url = self.blobs.download_url(&path).await?;
            let name = file_name_of(&path).to_string();
            files.push(StoredPdf { name, url });
        }
        Ok(files)
    }
}

fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn file_base_name(name: &str) -> Option<&str> {
    match file_name_of(name.trim()) {
        "" | "." | ".." => None,
        base => Some(base),
    }
}
