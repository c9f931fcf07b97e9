use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tag::Tag;

/// Newest manifest schema revision this build can read and the one it writes.
pub const SCHEMA_VERSION: u64 = 1;

/// Manifest filename at the root of every bento tree.
pub const MANIFEST_FILENAME: &str = "bento.yaml";

/// The versioned metadata record describing a bento's contents.
///
/// Field declaration order is the on-disk key order and is part of the wire
/// contract; every key is always emitted, with explicit `null` for unset
/// optional values. `bentoml_version` is kept as the literal key name for
/// compatibility with existing manifests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestInfo {
    pub service: String,
    pub name: String,
    pub version: String,
    pub bentoml_version: String,
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    #[serde(default)]
    pub entry_service: String,
    #[serde(default)]
    pub services: Vec<serde_yaml::Value>,
    #[serde(default)]
    pub envs: Vec<EnvVar>,
    #[serde(default)]
    pub schema: serde_yaml::Mapping,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
    pub spec: u64,
    #[serde(default)]
    pub runners: Vec<RunnerInfo>,
    #[serde(default)]
    pub apis: Vec<ApiInfo>,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub python: PythonConfig,
    #[serde(default)]
    pub conda: CondaConfig,
}

/// Reference to an externally stored model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub tag: Tag,
    pub module: String,
    pub creation_time: DateTime<Utc>,
    /// Friendly name used by service code; the only manifest key omitted when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Declared, independently schedulable execution unit. Descriptive only at
/// this layer; runtime behavior belongs to the serving process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerInfo {
    pub name: String,
    pub runnable_type: String,
    #[serde(default)]
    pub embedded: bool,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub resource_config: Option<BTreeMap<String, serde_yaml::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub name: String,
    pub input_type: String,
    pub output_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub distro: Option<String>,
    pub python_version: Option<String>,
    pub cuda_version: Option<String>,
    pub env: Option<BTreeMap<String, String>>,
    pub system_packages: Option<Vec<String>>,
    pub setup_script: Option<String>,
    pub base_image: Option<String>,
    pub dockerfile_template: Option<String>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        DockerConfig {
            distro: Some("debian".to_string()),
            python_version: None,
            cuda_version: None,
            env: None,
            system_packages: None,
            setup_script: None,
            base_image: None,
            dockerfile_template: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonConfig {
    pub requirements_txt: Option<String>,
    pub packages: Option<Vec<String>>,
    pub lock_packages: bool,
    pub pack_git_packages: bool,
    pub index_url: Option<String>,
    pub no_index: Option<bool>,
    pub trusted_host: Option<Vec<String>>,
    pub find_links: Option<Vec<String>>,
    pub extra_index_url: Option<Vec<String>>,
    pub pip_args: Option<String>,
    pub wheels: Option<Vec<String>>,
}

impl Default for PythonConfig {
    fn default() -> Self {
        PythonConfig {
            requirements_txt: None,
            packages: None,
            lock_packages: true,
            pack_git_packages: true,
            index_url: None,
            no_index: None,
            trusted_host: None,
            find_links: None,
            extra_index_url: None,
            pip_args: None,
            wheels: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CondaConfig {
    pub environment_yml: Option<String>,
    pub channels: Option<Vec<String>>,
    pub dependencies: Option<Vec<serde_yaml::Value>>,
    pub pip: Option<Vec<String>>,
}

impl ManifestInfo {
    /// Fresh manifest skeleton for a resolved tag. `creation_time` is set
    /// once, here.
    pub fn new(service: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        ManifestInfo {
            service: service.into(),
            name: name.into(),
            version: version.into(),
            bentoml_version: env!("CARGO_PKG_VERSION").to_string(),
            creation_time: Utc::now(),
            labels: BTreeMap::new(),
            models: Vec::new(),
            entry_service: String::new(),
            services: Vec::new(),
            envs: Vec::new(),
            schema: serde_yaml::Mapping::new(),
            args: BTreeMap::new(),
            spec: SCHEMA_VERSION,
            runners: Vec::new(),
            apis: Vec::new(),
            docker: DockerConfig::default(),
            python: PythonConfig::default(),
            conda: CondaConfig::default(),
        }
    }

    pub fn tag(&self) -> Result<Tag> {
        Tag::new(self.name.clone(), Some(self.version.as_str()))
    }

    /// Serialize to the stable textual form.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse the textual form. The schema version gate runs before the typed
    /// decode so that newer manifests are rejected, never half-parsed.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| Error::CorruptManifest(e.to_string()))?;

        let found = doc
            .get("spec")
            .and_then(serde_yaml::Value::as_u64)
            .ok_or_else(|| Error::CorruptManifest("missing or non-integer `spec` field".to_string()))?;
        if found > SCHEMA_VERSION {
            return Err(Error::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            });
        }

        serde_yaml::from_value(doc).map_err(|e| Error::CorruptManifest(e.to_string()))
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::CorruptManifest(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}
