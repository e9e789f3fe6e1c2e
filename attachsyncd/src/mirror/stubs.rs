//! In-memory services that record every call in a shared journal.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use attachsync_core::{
    Application, Author, Organization, ParentItem, Reference, ReferenceKind, SourceError,
    SourceFile, Space, StorageError, StorageRoot,
};
use reqwest::StatusCode;

use super::ports::{DestinationStore, SourceService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListOrganizations,
    ListSpaces(u64),
    ListFiles { space_id: u64, offset: u32 },
    FetchItem(u64),
    Download(u64),
    ListFolder(String),
    PutFile { folder: String, name: String },
}

pub type Journal = Rc<RefCell<Vec<Call>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn status_file(id: u64, name: &str, author: &str) -> SourceFile {
    file_with_refs(id, name, author, ReferenceKind::Status, ReferenceKind::Status, id)
}

pub fn item_file(id: u64, name: &str, author: &str, item_id: u64) -> SourceFile {
    file_with_refs(id, name, author, ReferenceKind::Item, ReferenceKind::Item, item_id)
}

pub fn file_with_refs(
    id: u64,
    name: &str,
    author: &str,
    subject: ReferenceKind,
    context: ReferenceKind,
    ref_id: u64,
) -> SourceFile {
    SourceFile {
        id,
        name: name.to_string(),
        created_by: Author {
            name: author.to_string(),
        },
        subject: Reference {
            kind: subject,
            id: ref_id,
        },
        context: Reference {
            kind: context,
            id: ref_id,
        },
    }
}

pub fn api_error(status: StatusCode) -> SourceError {
    SourceError::Api {
        status,
        body: "stub failure".to_string(),
    }
}

pub struct StubSource {
    journal: Journal,
    organizations: Vec<Organization>,
    files: HashMap<u64, Vec<SourceFile>>,
    items: HashMap<u64, ParentItem>,
    failing_downloads: HashSet<u64>,
}

impl StubSource {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: Rc::clone(journal),
            organizations: Vec::new(),
            files: HashMap::new(),
            items: HashMap::new(),
            failing_downloads: HashSet::new(),
        }
    }

    pub fn with_organization(mut self, id: u64, name: &str, spaces: &[(u64, &str)]) -> Self {
        self.organizations.push(Organization {
            id,
            name: name.to_string(),
            spaces: spaces
                .iter()
                .map(|(id, name)| Space {
                    id: *id,
                    name: name.to_string(),
                })
                .collect(),
        });
        self
    }

    pub fn with_files(mut self, space_id: u64, files: Vec<SourceFile>) -> Self {
        self.files.entry(space_id).or_default().extend(files);
        self
    }

    pub fn with_item(mut self, item_id: u64, title: &str, app: &str) -> Self {
        self.items.insert(
            item_id,
            ParentItem {
                id: item_id,
                title: title.to_string(),
                app: Application {
                    id: item_id * 10,
                    name: app.to_string(),
                },
            },
        );
        self
    }

    pub fn failing_download(mut self, file_id: u64) -> Self {
        self.failing_downloads.insert(file_id);
        self
    }
}

impl SourceService for StubSource {
    async fn list_organizations(&self) -> Result<Vec<Organization>, SourceError> {
        self.journal.borrow_mut().push(Call::ListOrganizations);
        Ok(self.organizations.clone())
    }

    async fn list_spaces(&self, organization: &Organization) -> Result<Vec<Space>, SourceError> {
        self.journal
            .borrow_mut()
            .push(Call::ListSpaces(organization.id));
        Ok(organization.spaces.clone())
    }

    async fn list_files(
        &self,
        space_id: u64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SourceFile>, SourceError> {
        self.journal
            .borrow_mut()
            .push(Call::ListFiles { space_id, offset });
        let files = self.files.get(&space_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(files
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_parent_item(&self, item_id: u64) -> Result<ParentItem, SourceError> {
        self.journal.borrow_mut().push(Call::FetchItem(item_id));
        self.items
            .get(&item_id)
            .cloned()
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND))
    }

    async fn download_file(&self, file_id: u64, target: &Path) -> Result<(), SourceError> {
        self.journal.borrow_mut().push(Call::Download(file_id));
        if self.failing_downloads.contains(&file_id) {
            return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR));
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(target, format!("contents of {file_id}")).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub root: StorageRoot,
    pub folder: String,
    pub name: String,
    pub contents: Vec<u8>,
    pub created_folders: bool,
}

pub struct StubDestination {
    journal: Journal,
    folders: HashMap<String, Vec<String>>,
    failing_uploads: HashSet<String>,
    existing_uploads: HashSet<String>,
    stored: RefCell<Vec<StoredFile>>,
}

impl StubDestination {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: Rc::clone(journal),
            folders: HashMap::new(),
            failing_uploads: HashSet::new(),
            existing_uploads: HashSet::new(),
            stored: RefCell::new(Vec::new()),
        }
    }

    pub fn with_folder(mut self, folder: &str, names: &[&str]) -> Self {
        self.folders.insert(
            folder.to_string(),
            names.iter().map(|name| name.to_string()).collect(),
        );
        self
    }

    pub fn failing_upload(mut self, name: &str) -> Self {
        self.failing_uploads.insert(name.to_string());
        self
    }

    /// Uploads of `name` report that the target already exists, as when the
    /// name sits beyond the listing limit.
    pub fn existing_upload(mut self, name: &str) -> Self {
        self.existing_uploads.insert(name.to_string());
        self
    }

    pub fn stored(&self) -> Vec<StoredFile> {
        self.stored.borrow().clone()
    }
}

impl DestinationStore for StubDestination {
    async fn list_folder(
        &self,
        _root: StorageRoot,
        folder: &str,
        max_entries: u32,
    ) -> Result<Option<Vec<String>>, StorageError> {
        self.journal
            .borrow_mut()
            .push(Call::ListFolder(folder.to_string()));
        Ok(self
            .folders
            .get(folder)
            .map(|names| names.iter().take(max_entries as usize).cloned().collect()))
    }

    async fn put_file(
        &self,
        root: StorageRoot,
        folder: &str,
        local: &Path,
        create_folders: bool,
    ) -> Result<(), StorageError> {
        let name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidFileName(local.to_path_buf()))?
            .to_string();
        self.journal.borrow_mut().push(Call::PutFile {
            folder: folder.to_string(),
            name: name.clone(),
        });
        if self.failing_uploads.contains(&name) {
            return Err(StorageError::Api {
                status: StatusCode::INSUFFICIENT_STORAGE,
                body: "stub failure".to_string(),
            });
        }
        if self.existing_uploads.contains(&name) {
            return Err(StorageError::AlreadyExists(
                root.qualify(&format!("{folder}{name}")),
            ));
        }
        let contents = tokio::fs::read(local).await?;
        self.stored.borrow_mut().push(StoredFile {
            root,
            folder: folder.to_string(),
            name,
            contents,
            created_folders: create_folders,
        });
        Ok(())
    }
}
