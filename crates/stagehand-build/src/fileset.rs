use std::path::{Path, PathBuf};

use crate::pipeline::Stage;

/// A file in the output directory and the stage that last wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the output directory
    pub path: PathBuf,
    pub stage: Stage,
}

/// Ordered record of the files a build run wrote into the output directory.
///
/// Files keep the position of their first write. When a later stage writes
/// a path that already exists, that stage becomes the owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    entries: Vec<FileEntry>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write. Returns the previous owner if the path was already present.
    pub fn insert(&mut self, path: impl Into<PathBuf>, stage: Stage) -> Option<Stage> {
        let path = path.into();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.path == path) {
            let previous = entry.stage;
            entry.stage = stage;
            if previous != stage {
                tracing::debug!(
                    path = %path.display(),
                    %previous,
                    owner = %stage,
                    "output path overwritten by later stage"
                );
            }
            return Some(previous);
        }
        self.entries.push(FileEntry { path, stage });
        None
    }

    /// Replace `from` with `to`, keeping its position. Returns `false` if
    /// `from` was not recorded.
    pub fn rename(&mut self, from: &Path, to: impl Into<PathBuf>) -> bool {
        match self.entries.iter_mut().find(|e| e.path == from) {
            Some(entry) => {
                entry.path = to.into();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    pub fn stage_of(&self, path: &Path) -> Option<Stage> {
        self.entries.iter().find(|e| e.path == path).map(|e| e.stage)
    }

    /// Paths written by `stage`, in write order.
    pub fn written_by(&self, stage: Stage) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .filter(move |e| e.stage == stage)
            .map(|e| e.path.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_stage_becomes_owner() {
        let mut files = FileSet::new();
        assert_eq!(files.insert("index.html", Stage::Bundle), None);
        assert_eq!(files.insert("index.js", Stage::Bundle), None);
        assert_eq!(
            files.insert("index.html", Stage::Template),
            Some(Stage::Bundle)
        );

        assert_eq!(files.len(), 2);
        assert_eq!(files.stage_of(Path::new("index.html")), Some(Stage::Template));
        // position of the first write is kept
        assert_eq!(
            files.paths().collect::<Vec<_>>(),
            vec![Path::new("index.html"), Path::new("index.js")]
        );
    }

    #[test]
    fn rename_keeps_order_and_owner() {
        let mut files = FileSet::new();
        files.insert("css/style.css", Stage::Css);
        files.insert("css/print.css", Stage::Css);

        assert!(files.rename(Path::new("css/style.css"), "css/style.0badf00d.css"));
        assert!(!files.rename(Path::new("css/missing.css"), "x.css"));

        let css: Vec<_> = files.written_by(Stage::Css).collect();
        assert_eq!(
            css,
            vec![
                Path::new("css/style.0badf00d.css"),
                Path::new("css/print.css")
            ]
        );
    }

    #[test]
    fn clear_empties_the_set() {
        let mut files = FileSet::new();
        files.insert("index.js", Stage::Bundle);
        files.clear();
        assert!(files.is_empty());
        assert!(!files.contains(Path::new("index.js")));
    }
}
