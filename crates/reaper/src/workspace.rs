//! Disk-backed documents with transactional saves.
//!
//! ## Workflow
//! 1. `DiskWorkspace::new(root)`: initialises the ghost directory.
//! 2. `open_document(file)`: loads the file into memory on first use.
//! 3. Edits (`replace`) touch only the in-memory text.
//! 4. `save(file)`: backs the file up on first touch, then writes it.
//! 5. `commit()`: success path, removes backup files.
//! 6. `restore_all()`: failure path, copies every backup back.

use crate::EditorHost;
use async_trait::async_trait;
use common::position::char_to_byte;
use common::{FileIdentity, LineIndex, Position, Range, TranslateError};
use registry::DocumentHost;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Ghost directory, relative to the workspace root.
pub const GHOST_DIR: &str = ".jobs/ghost";

/// Errors from workspace operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("document {0} is not open")]
    NotOpen(FileIdentity),
    #[error("edit does not fit the document: {0}")]
    Translate(#[from] TranslateError),
}

#[derive(Debug, Clone)]
struct Document {
    text: String,
    dirty: bool,
}

/// Editor host over real files under `root`.
///
/// Ghost directory layout: `{root}/.jobs/ghost/{ts}_{n}_{filename}.bak`
pub struct DiskWorkspace {
    root: PathBuf,
    ghost_dir: PathBuf,
    documents: RefCell<HashMap<FileIdentity, Document>>,
    cursors: RefCell<HashMap<FileIdentity, Position>>,
    /// `original_path → backup_path`
    backups: RefCell<HashMap<PathBuf, PathBuf>>,
}

impl DiskWorkspace {
    /// Creates (or reuses) the ghost directory under `root`.
    pub fn new(root: &Path) -> Result<Self, WorkspaceError> {
        let ghost_dir = root.join(GHOST_DIR);
        std::fs::create_dir_all(&ghost_dir)?;
        Ok(Self {
            root: root.to_path_buf(),
            ghost_dir,
            documents: RefCell::new(HashMap::new()),
            cursors: RefCell::new(HashMap::new()),
            backups: RefCell::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, file: &FileIdentity) -> PathBuf {
        self.root.join(file.as_str())
    }

    /// In-memory text of `file`, reading it from disk on first use.
    pub async fn open_document(&self, file: &FileIdentity) -> Result<String, WorkspaceError> {
        if let Some(doc) = self.documents.borrow().get(file) {
            return Ok(doc.text.clone());
        }
        let text = tokio::fs::read_to_string(self.path_of(file)).await?;
        debug!(file = %file, bytes = text.len(), "document loaded");
        let mut documents = self.documents.borrow_mut();
        let doc = documents.entry(file.clone()).or_insert(Document {
            text,
            dirty: false,
        });
        Ok(doc.text.clone())
    }

    pub fn is_dirty(&self, file: &FileIdentity) -> bool {
        self.documents
            .borrow()
            .get(file)
            .is_some_and(|doc| doc.dirty)
    }

    pub fn cursor(&self, file: &FileIdentity) -> Option<Position> {
        self.cursors.borrow().get(file).copied()
    }

    /// Replaces `range` of the open document with `text`.
    pub fn edit(&self, file: &FileIdentity, range: Range, text: &str) -> Result<(), WorkspaceError> {
        let mut documents = self.documents.borrow_mut();
        let doc = documents
            .get_mut(file)
            .ok_or_else(|| WorkspaceError::NotOpen(file.clone()))?;
        let index = LineIndex::new(&doc.text);
        let start = index.position_to_offset(range.start)?;
        let end = index.position_to_offset(range.end)?;
        let len = doc.text.chars().count();
        let (Some(start), Some(end)) = (char_to_byte(&doc.text, start), char_to_byte(&doc.text, end))
        else {
            return Err(TranslateError::OffsetOutOfBounds { offset: end, len }.into());
        };
        doc.text.replace_range(start..end, text);
        doc.dirty = true;
        Ok(())
    }

    /// Writes the open document to disk, backing the original up first.
    pub async fn save_document(&self, file: &FileIdentity) -> Result<(), WorkspaceError> {
        let text = self
            .documents
            .borrow()
            .get(file)
            .map(|doc| doc.text.clone())
            .ok_or_else(|| WorkspaceError::NotOpen(file.clone()))?;
        let path = self.path_of(file);
        self.ensure_backup(&path).await?;
        tokio::fs::write(&path, &text).await?;
        if let Some(doc) = self.documents.borrow_mut().get_mut(file) {
            doc.dirty = false;
        }
        debug!(file = %file, "document saved");
        Ok(())
    }

    /// Copies all backup files back to their original paths and drops the
    /// in-memory copies, so the next open reads the restored text.
    pub async fn restore_all(&self) -> Result<(), WorkspaceError> {
        let backups: Vec<(PathBuf, PathBuf)> = self
            .backups
            .borrow()
            .iter()
            .map(|(o, b)| (o.clone(), b.clone()))
            .collect();
        for (original, backup) in &backups {
            tokio::fs::copy(backup, original).await?;
        }
        self.documents.borrow_mut().clear();
        Ok(())
    }

    /// Deletes all backup files after a successful session.
    pub async fn commit(&self) -> Result<(), WorkspaceError> {
        let backups: Vec<PathBuf> = self.backups.borrow_mut().drain().map(|(_, b)| b).collect();
        for backup in backups {
            tokio::fs::remove_file(backup).await.ok();
        }
        Ok(())
    }

    /// Returns the number of files currently backed up.
    pub fn backup_count(&self) -> usize {
        self.backups.borrow().len()
    }

    // --- private ---

    async fn ensure_backup(&self, path: &Path) -> Result<(), WorkspaceError> {
        if self.backups.borrow().contains_key(path) {
            return Ok(());
        }
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let n = self.backups.borrow().len();
        let bak_path = self.ghost_dir.join(format!("{ts}_{n}_{filename}.bak"));
        tokio::fs::copy(path, &bak_path).await?;
        self.backups
            .borrow_mut()
            .insert(path.to_path_buf(), bak_path);
        Ok(())
    }
}

#[async_trait(?Send)]
impl DocumentHost for DiskWorkspace {
    async fn open(&self, file: &FileIdentity) -> anyhow::Result<String> {
        Ok(self.open_document(file).await?)
    }
}

#[async_trait(?Send)]
impl EditorHost for DiskWorkspace {
    fn document_text(&self, file: &FileIdentity) -> Option<String> {
        self.documents.borrow().get(file).map(|doc| doc.text.clone())
    }

    async fn replace(&self, file: &FileIdentity, range: Range, text: &str) -> anyhow::Result<()> {
        Ok(self.edit(file, range, text)?)
    }

    async fn save(&self, file: &FileIdentity) -> anyhow::Result<()> {
        Ok(self.save_document(file).await?)
    }

    fn set_cursor(&self, file: &FileIdentity, position: Position) {
        self.cursors.borrow_mut().insert(file.clone(), position);
    }
}
