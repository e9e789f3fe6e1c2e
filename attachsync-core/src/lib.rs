mod api;
mod oauth;
mod source;
mod storage;

pub use api::ApiErrorClass;
pub use oauth::{OAuthClient, OAuthError, OAuthToken};
pub use source::{
    Application, Author, Organization, ParentItem, Reference, ReferenceKind, SourceClient,
    SourceError, SourceFile, Space,
};
pub use storage::{
    DiskInfo, Resource, ResourceList, ResourceType, StorageClient, StorageError, StorageRoot,
    TransferLink,
};
