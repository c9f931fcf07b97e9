use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::bento::Bento;
use crate::error::{Error, Result};
use crate::manifest::{ManifestInfo, MANIFEST_FILENAME};
use crate::store::Store;
use crate::tag::Tag;
use crate::vfs::dir::DirFs;
use crate::vfs::copy_tree;

/// Local, tag-indexed repository of built bentos.
#[derive(Debug, Clone)]
pub struct BentoStore {
    inner: Store,
}

impl BentoStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(BentoStore {
            inner: Store::open(root, "bento", MANIFEST_FILENAME)?,
        })
    }

    pub fn root(&self) -> &Path {
        self.inner.root()
    }

    /// Persist a bento's full file tree. Re-saving an existing tag replaces
    /// the whole entry (last-writer-wins).
    pub fn save(&self, bento: &Bento) -> Result<PathBuf> {
        self.inner
            .register(bento.tag(), bento.creation_time(), |staging| {
                let mut target = DirFs::create(staging)?;
                copy_tree(bento.fs(), &mut target)
            })
    }

    /// Load a stored bento, bound read-only to its on-disk tree.
    pub fn get(&self, tag: &Tag) -> Result<Bento> {
        let resolved = self.inner.resolve(tag)?;
        let dir = self.inner.version_dir(&resolved);
        let info = ManifestInfo::read_from(&dir.join(MANIFEST_FILENAME))?;
        if info.tag()? != resolved {
            return Err(Error::CorruptManifest(format!(
                "stored entry {resolved} declares tag {}:{}",
                info.name, info.version
            )));
        }
        let fs = DirFs::open_read_only(dir)?;
        Ok(Bento::from_parts(resolved, info, Box::new(fs)))
    }

    pub fn delete(&self, tag: &Tag) -> Result<()> {
        self.inner.delete(tag)
    }

    pub fn resolve(&self, tag: &Tag) -> Result<Tag> {
        self.inner.resolve(tag)
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.inner.contains(tag)
    }

    /// Stored `(tag, creation_time)` pairs, newest first, optionally filtered
    /// by name.
    pub fn list(&self, name: Option<&str>) -> Result<Vec<(Tag, DateTime<Utc>)>> {
        let mut entries = self.inner.list()?;
        if let Some(name) = name {
            entries.retain(|(tag, _)| tag.name == name);
        }
        Ok(entries)
    }
}
