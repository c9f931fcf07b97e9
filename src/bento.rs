use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::build::{compile_file_set, validate_service_ref, BuildConfig};
use crate::error::{Error, Result};
use crate::manifest::{ManifestInfo, ModelInfo, MANIFEST_FILENAME};
use crate::store::bentos::BentoStore;
use crate::store::models::ModelStore;
use crate::tag::{generate_version, Tag};
use crate::vfs::dir::DirFs;
use crate::vfs::memory::MemoryFs;
use crate::vfs::Vfs;

/// An immutable, versioned, self-contained package of service code, declared
/// model references and runtime configuration.
///
/// A bento owns its file tree exclusively until exported; one loaded from the
/// store is bound read-only to the stored tree. `model_store` is unset for
/// freshly built or freshly imported bentos and transitions to the local
/// model store exactly once, on a successful `save`.
pub struct Bento {
    tag: Tag,
    info: ManifestInfo,
    fs: Box<dyn Vfs>,
    model_store: Option<ModelStore>,
}

impl Bento {
    /// Assemble a bento from a build config and context directory.
    ///
    /// The context root is threaded explicitly everywhere; the process
    /// working directory is never consulted or changed. Every referenced
    /// model must already exist in `models`, and a copy of its tree is
    /// embedded under `models/` so the artifact stays self-contained.
    pub fn create(
        config: &BuildConfig,
        build_ctx: &Path,
        version: Option<&str>,
        models: &ModelStore,
    ) -> Result<Bento> {
        let build_ctx = build_ctx
            .canonicalize()
            .map_err(|e| Error::Build(format!("build context {}: {}", build_ctx.display(), e)))?;

        let mut config = config.clone();
        config.apply_args();
        validate_service_ref(&config.service, &build_ctx)?;

        let name = config.derived_name()?;
        let version = match version {
            Some(v) => v.to_string(),
            None => generate_version(),
        };
        let tag = Tag::new(name, Some(version.as_str()))?;

        let files = compile_file_set(&config, &build_ctx)?;
        tracing::info!(tag = %tag, files = files.len(), "assembling bento");

        let mut tree = MemoryFs::new();
        for rel in &files {
            let data = fs::read(build_ctx.join(rel))?;
            tree.write(&format!("src/{rel}"), &data)?;
        }

        let mut model_infos = Vec::with_capacity(config.models.len());
        for reference in &config.models {
            let model_tag = Tag::parse(reference.tag_str())?;
            let model = models.get(&model_tag).map_err(|err| match err {
                Error::NotFound { .. } => Error::Build(format!(
                    "model {:?} not found in the local model store",
                    reference.tag_str()
                )),
                other => other,
            })?;

            let model_version = model.info.version.clone();
            let prefix = format!("models/{}/{}", model.tag.name, model_version);
            let source = DirFs::open_read_only(&model.path)?;
            for path in source.walk()? {
                tree.write(&format!("{prefix}/{path}"), &source.read(&path)?)?;
            }
            model_infos.push(ModelInfo {
                tag: model.tag.clone(),
                module: model.info.module.clone(),
                creation_time: model.info.creation_time,
                alias: reference.alias().map(str::to_string),
            });
        }

        let readme_path = build_ctx.join("README.md");
        let readme = if readme_path.is_file() {
            fs::read(&readme_path)?
        } else {
            default_readme(&tag, config.description.as_deref()).into_bytes()
        };
        tree.write("README.md", &readme)?;

        let mut info = ManifestInfo::new(config.service.as_str(), tag.name.as_str(), version.as_str());
        info.labels = config.labels.clone();
        info.models = model_infos;
        info.envs = config.envs.clone();
        info.args = config.args.clone();
        info.docker = config.docker.clone();
        info.python = config.python.clone();
        info.conda = config.conda.clone();
        tree.write(MANIFEST_FILENAME, info.to_yaml()?.as_bytes())?;

        Ok(Bento {
            tag,
            info,
            fs: Box::new(tree),
            model_store: None,
        })
    }

    pub(crate) fn from_parts(tag: Tag, info: ManifestInfo, fs: Box<dyn Vfs>) -> Bento {
        Bento {
            tag,
            info,
            fs,
            model_store: None,
        }
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn info(&self) -> &ManifestInfo {
        &self.info
    }

    pub fn fs(&self) -> &dyn Vfs {
        self.fs.as_ref()
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.info.creation_time
    }

    /// The local model store this bento's model references resolve against;
    /// populated only after `save`.
    pub fn model_store(&self) -> Option<&ModelStore> {
        self.model_store.as_ref()
    }

    /// Base filename used when exporting into a directory destination.
    pub fn export_name(&self) -> String {
        match self.tag.version() {
            Some(version) => format!("{}_{}", self.tag.name, version),
            None => self.tag.name.clone(),
        }
    }

    /// Persist into the local store and resolve model references.
    ///
    /// Writing the file tree and materializing models are the only effects;
    /// each referenced model missing from `models` is imported from the
    /// embedded `models/` copy, and the call fails with `NotFound` when
    /// neither source has it. Returns the bento re-bound read-only to its
    /// stored tree, with the model store binding set.
    pub fn save(self, store: &BentoStore, models: &ModelStore) -> Result<Bento> {
        let dir = store.save(&self)?;
        tracing::info!(tag = %self.tag, path = %dir.display(), "saved bento");

        for model in &self.info.models {
            if models.contains(&model.tag) {
                continue;
            }
            let version = model.tag.version().ok_or_else(|| {
                Error::invalid_tag(model.tag.to_string(), "manifest model entry has no version")
            })?;
            let prefix = format!("models/{}/{}", model.tag.name, version);
            models.import_from_tree(&model.tag, self.fs.as_ref(), &prefix)?;
        }

        let fs = DirFs::open_read_only(dir)?;
        Ok(Bento {
            tag: self.tag,
            info: self.info,
            fs: Box::new(fs),
            model_store: Some(models.clone()),
        })
    }

    /// Serialize into an archive or directory at `destination`; see the
    /// exporter for destination and format semantics. Returns the path the
    /// artifact was actually written to.
    pub fn export(
        &self,
        destination: &str,
        output_format: Option<&str>,
        subpath: Option<&str>,
    ) -> Result<PathBuf> {
        crate::export::export_bento(self, destination, output_format, subpath)
    }

    /// Reconstruct a bento from an exported archive or directory. The result
    /// lives in memory and is not saved; call `save` to materialize it into
    /// the local store.
    pub fn import_from(source: &str, input_format: Option<&str>) -> Result<Bento> {
        crate::import::import_bento(source, input_format)
    }
}

fn default_readme(tag: &Tag, description: Option<&str>) -> String {
    let body = description.unwrap_or("This service bundle was assembled by bentokit.");
    format!("# {}\n\n{}\n", tag.name, body)
}
