//! Remote services the mirror engine talks to.

#![allow(async_fn_in_trait)]

use std::path::Path;

use attachsync_core::{
    Organization, ParentItem, SourceClient, SourceError, SourceFile, Space, StorageClient,
    StorageError, StorageRoot,
};

pub trait SourceService {
    async fn list_organizations(&self) -> Result<Vec<Organization>, SourceError>;

    async fn list_spaces(&self, organization: &Organization) -> Result<Vec<Space>, SourceError>;

    async fn list_files(
        &self,
        space_id: u64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SourceFile>, SourceError>;

    async fn fetch_parent_item(&self, item_id: u64) -> Result<ParentItem, SourceError>;

    async fn download_file(&self, file_id: u64, target: &Path) -> Result<(), SourceError>;
}

pub trait DestinationStore {
    /// Entry names directly inside `folder`, or `None` when it does not exist.
    async fn list_folder(
        &self,
        root: StorageRoot,
        folder: &str,
        max_entries: u32,
    ) -> Result<Option<Vec<String>>, StorageError>;

    /// Stores `local` inside `folder` under the local file's own name,
    /// creating the folder tree first when `create_folders` is set.
    /// A name that already exists yields `StorageError::AlreadyExists`.
    async fn put_file(
        &self,
        root: StorageRoot,
        folder: &str,
        local: &Path,
        create_folders: bool,
    ) -> Result<(), StorageError>;
}

impl SourceService for SourceClient {
    async fn list_organizations(&self) -> Result<Vec<Organization>, SourceError> {
        SourceClient::list_organizations(self).await
    }

    // The organization listing already embeds its spaces.
    async fn list_spaces(&self, organization: &Organization) -> Result<Vec<Space>, SourceError> {
        Ok(organization.spaces.clone())
    }

    async fn list_files(
        &self,
        space_id: u64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SourceFile>, SourceError> {
        self.list_space_files(space_id, limit, offset).await
    }

    async fn fetch_parent_item(&self, item_id: u64) -> Result<ParentItem, SourceError> {
        self.get_item(item_id).await
    }

    async fn download_file(&self, file_id: u64, target: &Path) -> Result<(), SourceError> {
        SourceClient::download_file(self, file_id, target).await
    }
}

impl DestinationStore for StorageClient {
    async fn list_folder(
        &self,
        root: StorageRoot,
        folder: &str,
        max_entries: u32,
    ) -> Result<Option<Vec<String>>, StorageError> {
        self.list_entry_names(root, folder, max_entries).await
    }

    async fn put_file(
        &self,
        root: StorageRoot,
        folder: &str,
        local: &Path,
        create_folders: bool,
    ) -> Result<(), StorageError> {
        StorageClient::put_file(self, root, folder, local, create_folders).await
    }
}
