use std::path::{Component, Path, PathBuf};

use attachsync_core::{SourceError, StorageError, StorageRoot};
use thiserror::Error;
use tracing::{debug, info};

use super::ports::{DestinationStore, SourceService};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("download of file {file_id} failed: {source}")]
    Download {
        file_id: u64,
        #[source]
        source: SourceError,
    },
    #[error("upload to {folder} failed: {source}")]
    Upload {
        folder: String,
        #[source]
        source: StorageError,
    },
    #[error("file name cannot be used as a local path: {0}")]
    UnsafeName(String),
}

/// How a transfer ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Uploaded,
    /// The destination already held an entry with this name.
    AlreadyPresent,
}

/// Copies one source file to the destination through a local scratch file.
#[derive(Debug, Clone)]
pub struct Transfer {
    scratch_dir: PathBuf,
    root: StorageRoot,
}

impl Transfer {
    pub fn new(scratch_dir: impl Into<PathBuf>, root: StorageRoot) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            root,
        }
    }

    /// Local path a file named `file_name` is staged at. Names that collide
    /// share the same path.
    pub fn scratch_path(&self, file_name: &str) -> Result<PathBuf, TransferError> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.scratch_dir.join(file_name)),
            _ => Err(TransferError::UnsafeName(file_name.to_string())),
        }
    }

    /// Downloads `file_id` and uploads it as `folder` + `file_name`.
    ///
    /// The scratch file is removed once the destination holds the name and
    /// left in place when the upload fails.
    pub async fn run<S, D>(
        &self,
        source: &S,
        destination: &D,
        file_id: u64,
        folder: &str,
        file_name: &str,
        create_folders: bool,
    ) -> Result<Delivery, TransferError>
    where
        S: SourceService,
        D: DestinationStore,
    {
        let local = self.scratch_path(file_name)?;

        info!(file_id, path = %local.display(), "downloading file to local storage");
        source
            .download_file(file_id, &local)
            .await
            .map_err(|source| TransferError::Download { file_id, source })?;

        info!(root = %self.root, folder, file = file_name, "uploading file, stand by");
        let delivery = match destination
            .put_file(self.root, folder, &local, create_folders)
            .await
        {
            Ok(()) => Delivery::Uploaded,
            Err(StorageError::AlreadyExists(path)) => {
                info!(path = %path, "destination already holds this name");
                Delivery::AlreadyPresent
            }
            Err(source) => {
                return Err(TransferError::Upload {
                    folder: folder.to_string(),
                    source,
                });
            }
        };

        if let Err(err) = tokio::fs::remove_file(&local).await {
            debug!(path = %local.display(), error = %err, "could not remove scratch file");
        }
        Ok(delivery)
    }
}
