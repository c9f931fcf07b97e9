use std::collections::BTreeMap;
use std::io;

use crate::error::Result;
use crate::vfs::{normalize, Vfs};

/// In-process tree of files, used while assembling a bento and as the landing
/// buffer when reading archives. The BTreeMap keeps walk order lexicographic
/// for free.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn is_dir(&self, path: &str) -> bool {
        let prefix = format!("{}/", normalize(path));
        self.files.keys().any(|k| k.starts_with(&prefix))
    }
}

impl Vfs for MemoryFs {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize(path);
        self.files.get(&path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}")).into()
        })
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty path").into());
        }
        self.files.insert(path, data.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        let path = normalize(path);
        self.files.contains_key(&path) || self.is_dir(&path)
    }

    fn walk(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }
}
