pub mod archive;
pub mod dir;
pub mod memory;

use std::path::{PathBuf, MAIN_SEPARATOR};

use crate::error::{Error, Result};

/// Capability surface shared by every tree-of-files backend.
///
/// Paths are relative, `/`-separated, with no leading separator. `walk`
/// returns every file path in lexicographic order so that consumers writing
/// archives are deterministic by construction.
pub trait Vfs {
    fn read(&self, path: &str) -> Result<Vec<u8>>;
    fn write(&mut self, path: &str, data: &[u8]) -> Result<()>;
    /// True for an existing file or a directory prefix with files under it.
    fn exists(&self, path: &str) -> bool;
    fn walk(&self) -> Result<Vec<String>>;
}

/// Copy every file of `src` into `dest`.
pub fn copy_tree(src: &dyn Vfs, dest: &mut dyn Vfs) -> Result<()> {
    for path in src.walk()? {
        let data = src.read(&path)?;
        dest.write(&path, &data)?;
    }
    Ok(())
}

pub(crate) fn normalize(path: &str) -> String {
    path.trim_start_matches(['/', '\\'])
        .trim_start_matches("./")
        .to_string()
}

/// Storage backend selected from a destination/source address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Bare path or `osfs://` — the OS filesystem.
    Os,
    /// `zip://` — a zip archive at the given path.
    Zip,
    /// `temp://` — an ephemeral directory under the OS temp root; contents
    /// are not guaranteed to outlive the calling process.
    Temp,
}

/// A parsed destination or source address: backend scheme plus path.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub backend: Backend,
    pub path: PathBuf,
    /// The raw path ended in a separator, so the caller denoted a directory.
    pub dir_hint: bool,
}

impl Address {
    pub fn parse(raw: &str) -> Result<Address> {
        let (backend, path_part) = match raw.split_once("://") {
            None => (Backend::Os, raw),
            Some(("osfs", rest)) => (Backend::Os, rest),
            Some(("zip", rest)) => (Backend::Zip, rest),
            Some(("temp", rest)) => (Backend::Temp, rest),
            Some((scheme, _)) => {
                return Err(Error::UnsupportedBackend {
                    scheme: scheme.to_string(),
                })
            }
        };

        let dir_hint = path_part.ends_with('/') || path_part.ends_with(MAIN_SEPARATOR);
        let path = match backend {
            Backend::Temp => std::env::temp_dir().join(path_part.trim_matches('/')),
            _ => PathBuf::from(path_part),
        };
        Ok(Address {
            backend,
            path,
            dir_hint,
        })
    }
}
