use attachsync_core::{ParentItem, ReferenceKind, SourceError, SourceFile};

use super::ports::SourceService;

/// Where a source file lands relative to its space folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPath {
    /// Subfolder below the space folder; `None` places the file in the space
    /// folder itself.
    pub folder_segment: Option<String>,
    pub file_name: String,
}

impl DestinationPath {
    /// The folder the file belongs in, with a trailing slash.
    pub fn folder_under(&self, space_folder: &str) -> String {
        match &self.folder_segment {
            Some(segment) => format!("{space_folder}{segment}/"),
            None => space_folder.to_string(),
        }
    }
}

/// How a file is named, decided from its reference kinds alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Naming {
    Status,
    Item { item_id: u64 },
    Unsupported,
}

pub fn naming_for(file: &SourceFile) -> Naming {
    match (file.subject.kind, file.context.kind) {
        (ReferenceKind::Status, ReferenceKind::Status) => Naming::Status,
        (ReferenceKind::Item, ReferenceKind::Item) => Naming::Item {
            item_id: file.subject.id,
        },
        _ => Naming::Unsupported,
    }
}

pub fn normalize(value: &str) -> String {
    value.replace(' ', "_")
}

/// `/<main>/<organization>/<space>/`
pub fn space_folder(main_folder: &str, organization: &str, space: &str) -> String {
    format!(
        "/{}/{organization}/{space}/",
        main_folder.trim_matches('/')
    )
}

pub fn status_path(file: &SourceFile) -> DestinationPath {
    DestinationPath {
        folder_segment: None,
        file_name: format!(
            "status[{}]_by_{}-{}",
            file.id,
            normalize(file.author_name()),
            normalize(&file.name)
        ),
    }
}

pub fn item_path(file: &SourceFile, parent: &ParentItem) -> DestinationPath {
    DestinationPath {
        folder_segment: Some(parent.app.name.clone()),
        file_name: format!(
            "{}_by_{}-{}",
            normalize(&parent.title),
            normalize(file.author_name()),
            normalize(&file.name)
        ),
    }
}

/// Resolves the destination of `file`, fetching its parent item when the
/// file hangs off an item. `Ok(None)` means the file is not mirrored.
pub async fn derive_destination<S: SourceService>(
    source: &S,
    file: &SourceFile,
) -> Result<Option<DestinationPath>, SourceError> {
    match naming_for(file) {
        Naming::Status => Ok(Some(status_path(file))),
        Naming::Item { item_id } => {
            let parent = source.fetch_parent_item(item_id).await?;
            Ok(Some(item_path(file, &parent)))
        }
        Naming::Unsupported => Ok(None),
    }
}
