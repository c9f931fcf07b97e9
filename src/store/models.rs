use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::Store;
use crate::tag::Tag;
use crate::vfs::dir::DirFs;
use crate::vfs::Vfs;

/// Manifest filename at the root of every stored model.
pub const MODEL_MANIFEST_FILENAME: &str = "model.yaml";

/// Metadata record for a stored model artifact. The model's payload format
/// is opaque to this layer; only the reference data travels in manifests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    pub version: String,
    pub module: String,
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Handle to a model resolved from the store.
#[derive(Debug, Clone)]
pub struct Model {
    pub tag: Tag,
    pub path: PathBuf,
    pub info: ModelManifest,
}

/// Local, tag-indexed repository of model artifacts. This is the "Model
/// Store" collaborator the packaging layer resolves model references
/// against; it shares the atomic directory layout with the bento store.
#[derive(Debug, Clone)]
pub struct ModelStore {
    inner: Store,
}

impl ModelStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(ModelStore {
            inner: Store::open(root, "model", MODEL_MANIFEST_FILENAME)?,
        })
    }

    pub fn root(&self) -> &Path {
        self.inner.root()
    }

    pub fn get(&self, tag: &Tag) -> Result<Model> {
        let resolved = self.inner.resolve(tag)?;
        let dir = self.inner.version_dir(&resolved);
        self.load(resolved, dir)
    }

    /// Register a new model: writes the manifest, then lets `fill` place the
    /// payload files next to it.
    pub fn create(
        &self,
        tag: &Tag,
        module: &str,
        fill: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<Model> {
        let version = tag.version().filter(|_| !tag.is_latest()).ok_or_else(|| {
            Error::invalid_tag(tag.to_string(), "a model needs a concrete version")
        })?;
        let info = ModelManifest {
            name: tag.name.clone(),
            version: version.to_string(),
            module: module.to_string(),
            creation_time: Utc::now(),
            labels: BTreeMap::new(),
        };
        let dir = self.inner.register(tag, info.creation_time, |staging| {
            fs::write(
                staging.join(MODEL_MANIFEST_FILENAME),
                serde_yaml::to_string(&info)?,
            )?;
            fill(staging)
        })?;
        Ok(Model {
            tag: tag.clone(),
            path: dir,
            info,
        })
    }

    /// Import a model from a subtree of a virtual filesystem (the embedded
    /// `models/<name>/<version>` copy inside a bento). The subtree must carry
    /// its own manifest.
    pub fn import_from_tree(&self, tag: &Tag, src: &dyn Vfs, prefix: &str) -> Result<Model> {
        let manifest_path = format!("{prefix}/{MODEL_MANIFEST_FILENAME}");
        if !src.exists(&manifest_path) {
            return Err(Error::not_found("model", tag));
        }
        let text = String::from_utf8(src.read(&manifest_path)?)
            .map_err(|e| Error::CorruptManifest(format!("{manifest_path}: {e}")))?;
        let info: ModelManifest = serde_yaml::from_str(&text)
            .map_err(|e| Error::CorruptManifest(format!("{manifest_path}: {e}")))?;

        let tree_prefix = format!("{prefix}/");
        let dir = self.inner.register(tag, info.creation_time, |staging| {
            let mut target = DirFs::create(staging)?;
            for path in src.walk()? {
                if let Some(rel) = path.strip_prefix(&tree_prefix) {
                    target.write(rel, &src.read(&path)?)?;
                }
            }
            Ok(())
        })?;
        tracing::info!(tag = %tag, "imported model into local store");
        Ok(Model {
            tag: tag.clone(),
            path: dir,
            info,
        })
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

    pub fn list(&self) -> Result<Vec<(Tag, DateTime<Utc>)>> {
        self.inner.list()
    }

    fn load(&self, tag: Tag, dir: PathBuf) -> Result<Model> {
        let path = dir.join(MODEL_MANIFEST_FILENAME);
        let text = fs::read_to_string(&path)
            .map_err(|e| Error::CorruptManifest(format!("{}: {}", path.display(), e)))?;
        let info: ModelManifest = serde_yaml::from_str(&text)
            .map_err(|e| Error::CorruptManifest(format!("{}: {}", path.display(), e)))?;
        Ok(Model {
            tag,
            path: dir,
            info,
        })
    }
}
