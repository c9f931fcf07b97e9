pub mod ignore;
pub mod select;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::manifest::{CondaConfig, DockerConfig, EnvVar, PythonConfig};

use ignore::IgnoreRules;
use select::{select_files, PatternSet};

/// Default build spec filename at the build context root.
pub const BUILDFILE: &str = "bentofile.yaml";

fn default_include() -> Vec<String> {
    vec!["*".to_string()]
}

/// Declarative build specification, typically loaded from `bentofile.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Entrypoint reference, `module.py:Attribute` or `pkg.module:Attribute`.
    pub service: String,
    /// Artifact name override; derived from the service module when unset.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub models: Vec<ModelRef>,
    #[serde(default)]
    pub envs: Vec<EnvVar>,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub python: PythonConfig,
    #[serde(default)]
    pub conda: CondaConfig,
    /// Build-time arguments, substituted as `${key}` template variables into
    /// the service reference and label values.
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

/// A model reference in the build spec: either a bare tag string or a table
/// carrying an alias for service code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelRef {
    Name(String),
    Full {
        tag: String,
        #[serde(default)]
        alias: Option<String>,
    },
}

impl ModelRef {
    pub fn tag_str(&self) -> &str {
        match self {
            ModelRef::Name(tag) => tag,
            ModelRef::Full { tag, .. } => tag,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            ModelRef::Name(_) => None,
            ModelRef::Full { alias, .. } => alias.as_deref(),
        }
    }
}

impl BuildConfig {
    pub fn new(service: impl Into<String>) -> Self {
        BuildConfig {
            service: service.into(),
            name: None,
            description: None,
            include: default_include(),
            exclude: Vec::new(),
            labels: BTreeMap::new(),
            models: Vec::new(),
            envs: Vec::new(),
            docker: DockerConfig::default(),
            python: PythonConfig::default(),
            conda: CondaConfig::default(),
            args: BTreeMap::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Build(format!("cannot read {}: {}", path.display(), e)))?;
        let config: BuildConfig = serde_yaml::from_str(&text)
            .map_err(|e| Error::Build(format!("invalid build spec {}: {}", path.display(), e)))?;
        if config.service.trim().is_empty() {
            return Err(Error::Build(format!(
                "build spec {} does not declare a service",
                path.display()
            )));
        }
        Ok(config)
    }

    /// Substitute `${key}` build arguments into the templated fields.
    pub fn apply_args(&mut self) {
        if self.args.is_empty() {
            return;
        }
        self.service = substitute_args(&self.service, &self.args);
        for value in self.labels.values_mut() {
            *value = substitute_args(value, &self.args);
        }
    }

    /// Artifact name: the explicit override, or the service module's file
    /// stem sanitized to tag grammar.
    pub fn derived_name(&self) -> Result<String> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        let module = self
            .service
            .split_once(':')
            .map(|(module, _)| module)
            .unwrap_or(&self.service);
        let stem = module
            .trim_end_matches(".py")
            .rsplit(['/', '.'])
            .next()
            .unwrap_or(module);
        let name: String = stem
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        if name.is_empty() {
            return Err(Error::Build(format!(
                "cannot derive an artifact name from service {:?}",
                self.service
            )));
        }
        Ok(name)
    }
}

pub(crate) fn substitute_args(text: &str, args: &BTreeMap<String, String>) -> String {
    let mut out = text.to_string();
    for (key, value) in args {
        out = out.replace(&format!("${{{key}}}"), value);
    }
    out
}

/// Validate the entrypoint reference grammar and check the referenced module
/// file exists inside the build context.
pub fn validate_service_ref(service: &str, ctx: &Path) -> Result<()> {
    let (module, attr) = service
        .split_once(':')
        .ok_or_else(|| Error::Build(format!("service {service:?}: expected <module>:<attribute>")))?;
    if module.is_empty() {
        return Err(Error::Build(format!("service {service:?}: empty module")));
    }
    let valid_attr = !attr.is_empty()
        && !attr.starts_with(|c: char| c.is_ascii_digit())
        && attr.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_attr {
        return Err(Error::Build(format!(
            "service {service:?}: {attr:?} is not a valid attribute name"
        )));
    }

    let candidate = if module.ends_with(".py") {
        ctx.join(module)
    } else {
        ctx.join(format!("{}.py", module.replace('.', "/")))
    };
    if !candidate.is_file() {
        return Err(Error::Build(format!(
            "service module {module:?} not found in build context {}",
            ctx.display()
        )));
    }
    Ok(())
}

/// Compile the declarative rules into the deterministic set of files to
/// embed, relative to `ctx`. The `.bentoignore` file at the context root
/// contributes additional excludes.
pub fn compile_file_set(config: &BuildConfig, ctx: &Path) -> Result<Vec<String>> {
    let include = PatternSet::compile(&config.include)?;
    let mut excludes = config.exclude.clone();
    excludes.extend(IgnoreRules::from_context(ctx).patterns().iter().cloned());
    let exclude = PatternSet::compile(&excludes)?;
    select_files(ctx, &include, &exclude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_model_ref_forms() {
        let config: BuildConfig = serde_yaml::from_str(
            "service: app.py:App\nmodels:\n- plain_model:v1\n- tag: aliased_model:v2\n  alias: friendly\n",
        )
        .unwrap();
        assert_eq!(config.models[0].tag_str(), "plain_model:v1");
        assert_eq!(config.models[0].alias(), None);
        assert_eq!(config.models[1].tag_str(), "aliased_model:v2");
        assert_eq!(config.models[1].alias(), Some("friendly"));
    }

    #[test]
    fn test_include_defaults_to_everything() {
        let config: BuildConfig = serde_yaml::from_str("service: app.py:App\n").unwrap();
        assert_eq!(config.include, ["*"]);
    }

    #[test]
    fn test_apply_args_substitutes_templates() {
        let mut config = BuildConfig::new("${entry}.py:App");
        config.args.insert("entry".to_string(), "app".to_string());
        config.args.insert("team".to_string(), "ml".to_string());
        config
            .labels
            .insert("owner".to_string(), "team-${team}".to_string());
        config.apply_args();
        assert_eq!(config.service, "app.py:App");
        assert_eq!(config.labels["owner"], "team-ml");
    }

    #[test]
    fn test_derived_name_from_service_module() {
        assert_eq!(
            BuildConfig::new("simplebento.py:SimpleBento").derived_name().unwrap(),
            "simplebento"
        );
        assert_eq!(
            BuildConfig::new("pkg.service_mod:Svc").derived_name().unwrap(),
            "service_mod"
        );
        let mut named = BuildConfig::new("app.py:App");
        named.name = Some("custom".to_string());
        assert_eq!(named.derived_name().unwrap(), "custom");
    }

    #[test]
    fn test_validate_service_ref() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "class App: pass").unwrap();

        validate_service_ref("app.py:App", dir.path()).unwrap();
        validate_service_ref("app:App", dir.path()).unwrap();
        assert!(validate_service_ref("app.py", dir.path()).is_err());
        assert!(validate_service_ref("app.py:", dir.path()).is_err());
        assert!(validate_service_ref("app.py:9lives", dir.path()).is_err());
        assert!(validate_service_ref("missing.py:App", dir.path()).is_err());
    }

    #[test]
    fn test_compile_file_set_honors_bentoignore() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("app.py"), "code").unwrap();
        fs::write(root.join("scratch.tmp"), "junk").unwrap();
        fs::write(root.join(".bentoignore"), "*.tmp\n").unwrap();

        let config = BuildConfig::new("app.py:App");
        let files = compile_file_set(&config, root).unwrap();
        assert_eq!(files, vec![".bentoignore", "app.py"]);
    }
}
