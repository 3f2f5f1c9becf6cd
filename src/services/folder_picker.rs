//! Folder navigation state for choosing where documents live.
//!
//! Keeps the whole path from the drive root so "up" returns to the real
//! parent instead of jumping back to the root.

use crate::{
    models::remote_file::Folder,
    services::drive_service::{DriveResult, DriveService, ROOT_FOLDER_ID},
};
use tracing::debug;

pub const ROOT_FOLDER_NAME: &str = "Mon Drive";

#[derive(Clone, Debug)]
pub struct FolderPicker {
    /// Root first, current folder last; never empty.
    path: Vec<Folder>,
}

impl Default for FolderPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl FolderPicker {
    pub fn new() -> Self {
        Self {
            path: vec![root()],
        }
    }

    /// Restart from the drive root.
    pub fn open(&mut self) {
        self.path = vec![root()];
    }

    pub fn current(&self) -> &Folder {
        // `path` always holds at least the root.
        &self.path[self.path.len() - 1]
    }

    pub fn at_root(&self) -> bool {
        self.path.len() == 1
    }

    pub fn enter(&mut self, folder: Folder) {
        debug!("entering folder {} ({})", folder.name, folder.id);
        self.path.push(folder);
    }

    /// Go to the parent folder; returns false when already at the root.
    pub fn up(&mut self) -> bool {
        if self.at_root() {
            return false;
        }
        self.path.pop();
        true
    }

    pub fn breadcrumb(&self) -> Vec<&str> {
        self.path.iter().map(|f| f.name.as_str()).collect()
    }

    /// The folder to store as the documents folder.
    pub fn selection(&self) -> Folder {
        self.current().clone()
    }

    /// Sub-folders of the current folder.
    pub async fn load(&self, drive: &DriveService) -> DriveResult<Vec<Folder>> {
        drive.list_folders(&self.current().id).await
    }
}

fn root() -> Folder {
    Folder {
        id: ROOT_FOLDER_ID.to_string(),
        name: ROOT_FOLDER_NAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: &str) -> Folder {
        Folder {
            id: id.into(),
            name: id.to_uppercase(),
        }
    }

    #[test]
    fn up_returns_to_true_parent() {
        let mut picker = FolderPicker::new();
        picker.enter(folder("a"));
        picker.enter(folder("b"));
        picker.enter(folder("c"));
        assert_eq!(picker.breadcrumb(), vec!["Mon Drive", "A", "B", "C"]);

        assert!(picker.up());
        assert_eq!(picker.current().id, "b");
        assert!(picker.up());
        assert_eq!(picker.current().id, "a");
        assert!(picker.up());
        assert!(picker.at_root());
        assert!(!picker.up());
        assert_eq!(picker.current().id, "root");
    }

    #[test]
    fn open_resets_and_selection_is_current() {
        let mut picker = FolderPicker::new();
        picker.enter(folder("a"));
        assert_eq!(picker.selection(), folder("a"));

        picker.open();
        assert_eq!(
            picker.selection(),
            Folder {
                id: "root".into(),
                name: "Mon Drive".into()
            }
        );
    }
}
