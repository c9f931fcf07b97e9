pub mod bentos;
pub mod models;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::tag::Tag;

const LATEST_FILE: &str = "latest";

/// Tag-addressed directory layout shared by the bento and model stores.
///
/// ```text
/// <root>/<name>/<version>/      one immutable entry
/// <root>/<name>/latest          version string of the newest entry
/// ```
///
/// Every mutation stages into a dot-prefixed sibling directory and renames
/// into place, so readers only ever observe fully-old or fully-new state.
/// Cross-process safety comes from the filesystem's rename atomicity, not
/// from in-process locks.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    kind: &'static str,
    manifest_file: &'static str,
}

impl Store {
    pub fn open(root: impl Into<PathBuf>, kind: &'static str, manifest_file: &'static str) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Store {
            root,
            kind,
            manifest_file,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn name_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn version_dir(&self, tag: &Tag) -> PathBuf {
        let name_dir = self.name_dir(&tag.name);
        match tag.version() {
            Some(version) => name_dir.join(version),
            None => name_dir,
        }
    }

    /// Resolve `latest`/unset versions to the most recently created entry.
    pub fn resolve(&self, tag: &Tag) -> Result<Tag> {
        if !tag.is_latest() {
            return if self.version_dir(tag).is_dir() {
                Ok(tag.clone())
            } else {
                Err(Error::not_found(self.kind, tag))
            };
        }

        if let Some(version) = self.read_latest(&tag.name)? {
            let candidate = tag.with_version(&version)?;
            if self.version_dir(&candidate).is_dir() {
                return Ok(candidate);
            }
            // stale pointer, fall through to a scan
        }

        let newest = self
            .scan_versions(&tag.name)?
            .into_iter()
            .max_by_key(|(_, created)| *created);
        match newest {
            Some((version, _)) => tag.with_version(&version),
            None => Err(Error::not_found(self.kind, &tag.name)),
        }
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.resolve(tag).is_ok()
    }

    /// Create or replace the entry for `tag`. `fill` populates a staging
    /// directory; the final rename is atomic and a replaced entry is swapped
    /// out whole, so concurrent writers degrade to last-writer-wins and a
    /// reader never sees a mixed tree.
    pub fn register(
        &self,
        tag: &Tag,
        created: DateTime<Utc>,
        fill: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<PathBuf> {
        let version = match tag.version() {
            Some(v) if !tag.is_latest() => v,
            _ => {
                return Err(Error::invalid_tag(
                    tag.to_string(),
                    "cannot store an unresolved version",
                ))
            }
        };
        let name_dir = self.name_dir(&tag.name);
        fs::create_dir_all(&name_dir)?;

        let salt = rand::random::<u32>();
        let staging = name_dir.join(format!(".stage-{version}-{salt:08x}"));
        fs::create_dir_all(&staging)?;
        if let Err(err) = fill(&staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }

        let final_dir = name_dir.join(version);
        if final_dir.exists() {
            let retired = name_dir.join(format!(".retired-{version}-{salt:08x}"));
            fs::rename(&final_dir, &retired)?;
            if let Err(err) = fs::rename(&staging, &final_dir) {
                // put the old entry back before surfacing the error
                let _ = fs::rename(&retired, &final_dir);
                let _ = fs::remove_dir_all(&staging);
                return Err(err.into());
            }
            let _ = fs::remove_dir_all(&retired);
        } else if let Err(err) = fs::rename(&staging, &final_dir) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err.into());
        }

        self.bump_latest(&tag.name, version, created)?;
        tracing::debug!(kind = self.kind, tag = %tag, "stored entry");
        Ok(final_dir)
    }

    /// Remove the entry for `tag`; the `latest` pointer is recomputed from
    /// the remaining versions, or cleared when none remain.
    pub fn delete(&self, tag: &Tag) -> Result<()> {
        let resolved = self.resolve(tag)?;
        let version_dir = self.version_dir(&resolved);
        fs::remove_dir_all(&version_dir)?;
        tracing::debug!(kind = self.kind, tag = %resolved, "deleted entry");

        let name = &resolved.name;
        let was_latest = self.read_latest(name)? == resolved.version;
        if was_latest {
            let newest = self
                .scan_versions(name)?
                .into_iter()
                .max_by_key(|(_, created)| *created);
            match newest {
                Some((version, _)) => self.write_latest(name, &version)?,
                None => {
                    let _ = fs::remove_file(self.name_dir(name).join(LATEST_FILE));
                }
            }
        }
        // drop the name directory once nothing is left in it
        let _ = fs::remove_dir(self.name_dir(name));
        Ok(())
    }

    /// Every stored `(tag, creation_time)`, newest first.
    pub fn list(&self) -> Result<Vec<(Tag, DateTime<Utc>)>> {
        let mut entries = Vec::new();
        for name_entry in fs::read_dir(&self.root)? {
            let name_entry = name_entry?;
            if !name_entry.file_type()?.is_dir() {
                continue;
            }
            let name = name_entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            for (version, created) in self.scan_versions(&name)? {
                match Tag::new(name.clone(), Some(&version)) {
                    Ok(tag) => entries.push((tag, created)),
                    Err(err) => {
                        tracing::warn!(kind = self.kind, %name, %version, %err, "skipping unparsable entry")
                    }
                }
            }
        }
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(entries)
    }

    /// Versions under one name with their manifest creation times. Broken
    /// entries are skipped with a warning rather than failing the scan.
    fn scan_versions(&self, name: &str) -> Result<Vec<(String, DateTime<Utc>)>> {
        let name_dir = self.name_dir(name);
        let reader = match fs::read_dir(&name_dir) {
            Ok(reader) => reader,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut versions = Vec::new();
        for entry in reader {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let version = entry.file_name().to_string_lossy().into_owned();
            if version.starts_with('.') {
                continue;
            }
            match self.creation_time_of(&entry.path()) {
                Ok(created) => versions.push((version, created)),
                Err(err) => {
                    tracing::warn!(kind = self.kind, %name, %version, %err, "skipping broken entry")
                }
            }
        }
        Ok(versions)
    }

    /// Creation time as recorded in the entry's manifest file.
    pub fn creation_time_of(&self, dir: &Path) -> Result<DateTime<Utc>> {
        let path = dir.join(self.manifest_file);
        let text = fs::read_to_string(&path)
            .map_err(|e| Error::CorruptManifest(format!("{}: {}", path.display(), e)))?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&text)
            .map_err(|e| Error::CorruptManifest(format!("{}: {}", path.display(), e)))?;
        let raw = doc
            .get("creation_time")
            .and_then(serde_yaml::Value::as_str)
            .ok_or_else(|| {
                Error::CorruptManifest(format!("{}: missing creation_time", path.display()))
            })?;
        let parsed = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| Error::CorruptManifest(format!("{}: {}", path.display(), e)))?;
        Ok(parsed.with_timezone(&Utc))
    }

    fn read_latest(&self, name: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.name_dir(name).join(LATEST_FILE)) {
            Ok(text) => {
                let version = text.trim().to_string();
                Ok((!version.is_empty()).then_some(version))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Move the pointer only when the new entry is newer than the current
    /// target, ordered by creation time.
    fn bump_latest(&self, name: &str, version: &str, created: DateTime<Utc>) -> Result<()> {
        if let Some(current) = self.read_latest(name)? {
            if current != version {
                let current_dir = self.name_dir(name).join(&current);
                if let Ok(current_created) = self.creation_time_of(&current_dir) {
                    if current_created > created {
                        return Ok(());
                    }
                }
            }
        }
        self.write_latest(name, version)
    }

    fn write_latest(&self, name: &str, version: &str) -> Result<()> {
        let name_dir = self.name_dir(name);
        let tmp = name_dir.join(format!(".latest-{:08x}", rand::random::<u32>()));
        fs::write(&tmp, version)?;
        fs::rename(&tmp, name_dir.join(LATEST_FILE))?;
        Ok(())
    }
}
