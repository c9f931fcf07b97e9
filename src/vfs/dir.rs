use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;
use crate::vfs::{normalize, Vfs};

/// A tree of files rooted at an OS directory.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
    read_only: bool,
}

impl DirFs {
    /// Open writable, creating the root if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(DirFs {
            root,
            read_only: false,
        })
    }

    /// Open an existing directory without write access. Store entries are
    /// handed out this way so a stored bento stays immutable.
    pub fn open_read_only(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", root.display()),
            )
            .into());
        }
        Ok(DirFs {
            root,
            read_only: true,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(normalize(path))
    }
}

impl Vfs for DirFs {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(path))?)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<()> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("filesystem at {} is read-only", self.root.display()),
            )
            .into());
        }
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, data)?;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn walk(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path());
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(rel);
        }
        files.sort();
        Ok(files)
    }
}
