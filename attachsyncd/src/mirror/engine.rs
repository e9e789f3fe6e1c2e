use std::ops::ControlFlow;
use std::path::PathBuf;

use attachsync_core::{Organization, SourceError, SourceFile, Space, StorageError, StorageRoot};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::budget::{BudgetExhausted, DEFAULT_UPLOAD_BUDGET, UploadGate};
use super::folder_cache::ExistenceCache;
use super::paths::{derive_destination, space_folder};
use super::ports::{DestinationStore, SourceService};
use super::transfer::{Delivery, Transfer, TransferError};

/// Files requested per page when listing a space.
pub const PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("destination error: {0}")]
    Storage(#[from] StorageError),
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}

/// What to do when a single file cannot be mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the run with the file's error.
    #[default]
    FailFast,
    /// Log the error, count the file as failed and move on.
    Continue,
}

#[derive(Debug, Clone)]
pub struct MirrorSettings {
    pub organization: String,
    pub root: StorageRoot,
    pub main_folder: String,
    pub upload_budget: u32,
    pub scratch_dir: PathBuf,
    pub failure_policy: FailurePolicy,
}

impl MirrorSettings {
    pub fn new(
        organization: impl Into<String>,
        main_folder: impl Into<String>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            organization: organization.into(),
            root: StorageRoot::default(),
            main_folder: main_folder.into(),
            upload_budget: DEFAULT_UPLOAD_BUDGET,
            scratch_dir: scratch_dir.into(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Uploaded,
    AlreadyPresent,
    Unsupported,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub organization_found: bool,
    pub spaces: usize,
    pub files_seen: usize,
    pub uploaded: usize,
    pub already_present: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub uploads_remaining: u32,
    pub budget_exhausted: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: &FileOutcome) {
        self.files_seen += 1;
        match outcome {
            FileOutcome::Uploaded => self.uploaded += 1,
            FileOutcome::AlreadyPresent => self.already_present += 1,
            FileOutcome::Unsupported => self.unsupported += 1,
            FileOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// State that lives for exactly one run.
struct RunState {
    cache: ExistenceCache,
    gate: UploadGate,
    summary: RunSummary,
}

impl RunState {
    fn finish(mut self) -> RunSummary {
        self.summary.uploads_remaining = self.gate.remaining();
        self.summary.budget_exhausted = self.gate.is_exhausted();
        self.summary
    }
}

/// Mirrors the files of one organization into the destination tree.
pub struct SyncEngine<S, D> {
    source: S,
    destination: D,
    settings: MirrorSettings,
    transfer: Transfer,
}

impl<S: SourceService, D: DestinationStore> SyncEngine<S, D> {
    pub fn new(source: S, destination: D, settings: MirrorSettings) -> Self {
        let transfer = Transfer::new(settings.scratch_dir.clone(), settings.root);
        Self {
            source,
            destination,
            settings,
            transfer,
        }
    }

    pub async fn run(&self) -> Result<RunSummary, EngineError> {
        let mut run = RunState {
            cache: ExistenceCache::new(self.settings.root),
            gate: UploadGate::new(self.settings.upload_budget),
            summary: RunSummary::default(),
        };
        if run.gate.is_exhausted() {
            info!("upload limit is zero, nothing to do");
            return Ok(run.finish());
        }

        let organizations = self.source.list_organizations().await?;
        let Some(organization) = organizations
            .iter()
            .find(|org| org.name == self.settings.organization)
        else {
            warn!(
                organization = %self.settings.organization,
                visible = organizations.len(),
                "organization not found, nothing to sync"
            );
            return Ok(run.finish());
        };
        run.summary.organization_found = true;

        if self
            .sync_organization(organization, &mut run)
            .await?
            .is_break()
        {
            info!(
                uploaded = run.gate.used(),
                uploads_remaining = run.gate.remaining(),
                "file limit reached, stopping for now"
            );
        }
        Ok(run.finish())
    }

    async fn sync_organization(
        &self,
        organization: &Organization,
        run: &mut RunState,
    ) -> Result<ControlFlow<BudgetExhausted>, EngineError> {
        info!(organization = %organization.name, "processing organization");
        let spaces = self.source.list_spaces(organization).await?;
        for space in &spaces {
            run.summary.spaces += 1;
            if let ControlFlow::Break(halt) = self.sync_space(organization, space, run).await? {
                return Ok(ControlFlow::Break(halt));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    async fn sync_space(
        &self,
        organization: &Organization,
        space: &Space,
        run: &mut RunState,
    ) -> Result<ControlFlow<BudgetExhausted>, EngineError> {
        info!(space = %space.name, "processing space");
        let folder = space_folder(&self.settings.main_folder, &organization.name, &space.name);

        let mut offset = 0u32;
        loop {
            let files = self.source.list_files(space.id, PAGE_SIZE, offset).await?;
            debug!(space = %space.name, offset, count = files.len(), "fetched file page");

            for file in &files {
                let outcome = self.sync_file(&folder, file, run).await?;
                run.summary.record(&outcome);
                if outcome == FileOutcome::Uploaded {
                    let flow = run.gate.consume_one();
                    info!(
                        file_id = file.id,
                        uploads_remaining = run.gate.remaining(),
                        "file uploaded"
                    );
                    if flow.is_break() {
                        return Ok(flow);
                    }
                }
            }

            if files.len() < PAGE_SIZE as usize {
                return Ok(ControlFlow::Continue(()));
            }
            offset = offset.saturating_add(PAGE_SIZE);
        }
    }

    async fn sync_file(
        &self,
        space_folder: &str,
        file: &SourceFile,
        run: &mut RunState,
    ) -> Result<FileOutcome, EngineError> {
        let destination = match derive_destination(&self.source, file).await {
            Ok(Some(destination)) => destination,
            Ok(None) => {
                info!(
                    file_id = file.id,
                    subject = ?file.subject.kind,
                    context = ?file.context.kind,
                    "skipping file attached to unsupported record"
                );
                return Ok(FileOutcome::Unsupported);
            }
            Err(err) => return self.file_failed(file, err.into()),
        };

        let folder = destination.folder_under(space_folder);
        let name = destination.file_name.as_str();
        info!(file = name, "processing file");

        if run.cache.exists(&self.destination, &folder, name).await? {
            info!(file = name, "skipping file, already uploaded");
            return Ok(FileOutcome::AlreadyPresent);
        }

        let create_folders = run.cache.is_missing(&folder);
        match self
            .transfer
            .run(&self.source, &self.destination, file.id, &folder, name, create_folders)
            .await
        {
            Ok(delivery) => {
                run.cache.record(&folder, name);
                Ok(match delivery {
                    Delivery::Uploaded => FileOutcome::Uploaded,
                    Delivery::AlreadyPresent => FileOutcome::AlreadyPresent,
                })
            }
            Err(err) => self.file_failed(file, err.into()),
        }
    }

    fn file_failed(&self, file: &SourceFile, err: EngineError) -> Result<FileOutcome, EngineError> {
        match self.settings.failure_policy {
            FailurePolicy::FailFast => Err(err),
            FailurePolicy::Continue => {
                warn!(file_id = file.id, name = %file.name, error = %err, "file failed, continuing");
                Ok(FileOutcome::Failed(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
