//! Label index: integer label -> person name.
//!
//! The index is derived from the layout of the faces directory: one
//! subdirectory per enrolled person, labels assigned densely from 0.
//! Directory names are trusted verbatim; renaming or adding a directory
//! changes who a label resolves to. `fingerprint` lets a trained model detect
//! that the layout moved underneath it.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelIndex {
    names: Vec<String>,
}

impl LabelIndex {
    /// Build the index from the immediate subdirectories of `directory`.
    pub fn build(directory: impl AsRef<Path>) -> Result<Self> {
        let names = person_directories(directory.as_ref())?
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        for (label, name) in names.iter().enumerate() {
            log::debug!("label {} -> {}", label, name);
        }
        log::info!("label index built with {} entries", names.len());
        Ok(Self { names })
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, label: u32) -> Option<&str> {
        self.names.get(label as usize).map(String::as_str)
    }

    /// Resolve a label, failing with `UnknownLabel` when it is absent.
    pub fn resolve(&self, label: u32) -> Result<&str> {
        self.name(label).ok_or(Error::UnknownLabel(label))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(label, name)| (label as u32, name.as_str()))
    }

    /// SHA-256 over the ordered names, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for name in &self.names {
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Person subdirectories of `directory` as `(name, path)`, sorted by name.
///
/// Shared by the index builder and the training loader so both agree on label order.
pub(crate) fn person_directories(directory: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !directory.is_dir() {
        return Err(Error::DirectoryNotFound(directory.to_path_buf()));
    }

    let mut people = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        people.push((name, entry.path()));
    }
    people.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(people)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_dense_and_sorted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["carol", "alice", "bob"] {
            fs::create_dir(dir.path().join(name))?;
        }
        fs::write(dir.path().join("notes.txt"), b"not a person")?;

        let index = LabelIndex::build(dir.path())?;

        assert_eq!(index.len(), 3);
        assert_eq!(index.name(0), Some("alice"));
        assert_eq!(index.name(1), Some("bob"));
        assert_eq!(index.name(2), Some("carol"));
        assert_eq!(index.name(3), None);
        Ok(())
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            LabelIndex::build(&missing),
            Err(Error::DirectoryNotFound(path)) if path == missing
        ));
    }

    #[test]
    fn file_path_is_not_a_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            LabelIndex::build(file.path()),
            Err(Error::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn resolve_unknown_label_fails() {
        let index = LabelIndex::from_names(["alice"]);
        assert_eq!(index.resolve(0).unwrap(), "alice");
        assert!(matches!(index.resolve(7), Err(Error::UnknownLabel(7))));
    }

    #[test]
    fn fingerprint_tracks_order_and_names() {
        let a = LabelIndex::from_names(["alice", "bob"]);
        let b = LabelIndex::from_names(["bob", "alice"]);
        let c = LabelIndex::from_names(["alice", "bob"]);

        assert_eq!(a.fingerprint(), c.fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
