//! Test assemblies and the `<assembly>.runt-host.toml` files describing how
//! to load their framework.
use crate::{
    boundary::{BoundaryOptions, IsolationPolicy},
    errors::HostError,
    framework::{interfaces, AssemblyInfo, Options},
};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Suffix of the configuration file picked up next to an assembly.
pub const CONFIG_SUFFIX: &str = "runt-host.toml";

/// Configuration for one test assembly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssemblyConfig {
    /// Version of runt-host this configuration is compatible with.
    pub ver: Option<String>,
    #[serde(default)]
    pub framework: FrameworkConfig,
    /// Passed to the framework unmodified during discovery.
    #[serde(default)]
    pub discovery: Options,
    /// Passed to the framework unmodified during execution.
    #[serde(default)]
    pub execution: Options,
    /// File this configuration was read from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Where the framework lives and how to load it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Module identity inside the boundary. Defaults to the assembly's file
    /// stem.
    pub module: Option<String>,
    /// Type instantiated as the framework entry point.
    pub type_name: String,
    /// Declared framework version dependency.
    pub version: Option<String>,
    /// Executable hosting the framework. Defaults to the assembly itself.
    pub host: Option<PathBuf>,
    pub isolation: IsolationPolicy,
    pub shadow_copy: bool,
    pub shadow_copy_folder: Option<PathBuf>,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            module: None,
            type_name: interfaces::FRAMEWORK.to_string(),
            version: None,
            host: None,
            isolation: IsolationPolicy::default(),
            shadow_copy: false,
            shadow_copy_folder: None,
        }
    }
}

impl AssemblyConfig {
    /// Read a configuration file. Relative paths inside it are resolved
    /// against the directory containing it.
    /// Ensures that the version number in the file, when given, matches this
    /// version of runt-host.
    pub fn from_path(conf_path: &Path) -> Result<Self, HostError> {
        let contents = std::fs::read_to_string(conf_path).map_err(|err| {
            HostError::Configuration(format!(
                "cannot read {}: {}",
                conf_path.display(),
                err
            ))
        })?;

        let mut conf: AssemblyConfig = toml::from_str(&contents).map_err(|err| {
            HostError::Configuration(format!(
                "Failed to parse {}: {}",
                conf_path.display(),
                err
            ))
        })?;

        if let Some(ver) = &conf.ver {
            if env!("CARGO_PKG_VERSION") != ver {
                return Err(HostError::Configuration(format!(
                    "runt-host version mismatch. {} requires: {}, tool version: {}.",
                    conf_path.display(),
                    ver,
                    env!("CARGO_PKG_VERSION")
                )));
            }
        }

        let base = conf_path.parent().unwrap_or_else(|| Path::new(""));
        let framework = &mut conf.framework;
        framework.host = framework.host.take().map(|p| base.join(p));
        framework.shadow_copy_folder =
            framework.shadow_copy_folder.take().map(|p| base.join(p));
        conf.source = Some(conf_path.to_path_buf());

        Ok(conf)
    }
}

/// A test assembly paired with its lazily loaded configuration.
#[derive(Debug)]
pub struct ProjectAssembly {
    assembly_path: PathBuf,
    config_path: Option<PathBuf>,
    configuration: OnceCell<AssemblyConfig>,
}

impl ProjectAssembly {
    pub fn new(assembly_path: impl Into<PathBuf>) -> Self {
        Self {
            assembly_path: assembly_path.into(),
            config_path: None,
            configuration: OnceCell::new(),
        }
    }

    /// Use an explicit configuration file instead of looking next to the
    /// assembly. A missing file is then an error.
    pub fn with_config(mut self, config_path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(config_path.into());
        self
    }

    pub fn assembly_path(&self) -> &Path {
        &self.assembly_path
    }

    /// File stem of the assembly.
    pub fn name(&self) -> String {
        self.assembly_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.assembly_path.display().to_string())
    }

    /// `<dir>/<stem>.runt-host.toml`.
    pub fn default_config_path(&self) -> PathBuf {
        self.assembly_path
            .with_file_name(format!("{}.{}", self.name(), CONFIG_SUFFIX))
    }

    /// Loaded on first access and cached afterwards.
    pub fn configuration(&self) -> Result<&AssemblyConfig, HostError> {
        self.configuration.get_or_try_init(|| match &self.config_path {
            Some(path) => AssemblyConfig::from_path(path),
            None => {
                let path = self.default_config_path();
                if path.is_file() {
                    AssemblyConfig::from_path(&path)
                } else {
                    log::debug!("no {} next to {}, using defaults", CONFIG_SUFFIX, self.name());
                    Ok(AssemblyConfig::default())
                }
            }
        })
    }

    pub fn assembly_info(&self) -> AssemblyInfo {
        AssemblyInfo {
            name: self.name(),
            path: self.assembly_path.display().to_string(),
        }
    }

    pub fn module(&self) -> Result<String, HostError> {
        Ok(self
            .configuration()?
            .framework
            .module
            .clone()
            .unwrap_or_else(|| self.name()))
    }

    pub fn boundary_options(&self) -> Result<BoundaryOptions, HostError> {
        let conf = self.configuration()?;
        let framework = &conf.framework;
        let target = framework
            .host
            .clone()
            .unwrap_or_else(|| self.assembly_path.clone());
        Ok(BoundaryOptions {
            config_path: conf.source.clone(),
            shadow_copy: framework.shadow_copy,
            shadow_copy_folder: framework.shadow_copy_folder.clone(),
            ..BoundaryOptions::isolated(target)
        }
        .with_policy(framework.isolation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_without_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectAssembly::new(dir.path().join("math.bin"));
        let conf = project.configuration().unwrap();
        assert!(conf.source.is_none());
        assert_eq!(conf.framework.type_name, "TestFramework");
        assert_eq!(project.module().unwrap(), "math");

        let opts = project.boundary_options().unwrap();
        assert!(opts.use_boundary);
        assert!(!opts.require_boundary);
        assert_eq!(opts.target_module, Some(dir.path().join("math.bin")));
    }

    #[test]
    fn reads_the_file_next_to_the_assembly() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("math.runt-host.toml"),
            r#"
[framework]
module = "demo"
version = "3.0"
host = "bin/demo-host"
isolation = "required"
shadow_copy = true

[execution]
parallel = false
"#,
        )
        .unwrap();
        let project = ProjectAssembly::new(dir.path().join("math.bin"));
        let conf = project.configuration().unwrap();
        assert_eq!(conf.framework.version.as_deref(), Some("3.0"));
        assert_eq!(
            conf.execution.get("parallel"),
            Some(&serde_json::Value::Bool(false))
        );
        assert_eq!(project.module().unwrap(), "demo");

        let opts = project.boundary_options().unwrap();
        assert!(opts.require_boundary);
        assert!(opts.shadow_copy);
        assert_eq!(opts.target_module, Some(dir.path().join("bin/demo-host")));
        assert_eq!(
            opts.config_path,
            Some(dir.path().join("math.runt-host.toml"))
        );
    }

    #[test]
    fn configuration_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let conf_path = dir.path().join("custom.toml");
        fs::write(&conf_path, "[framework]\nmodule = \"first\"\n").unwrap();
        let project = ProjectAssembly::new(dir.path().join("math.bin")).with_config(&conf_path);
        assert_eq!(project.module().unwrap(), "first");

        fs::write(&conf_path, "[framework]\nmodule = \"second\"\n").unwrap();
        assert_eq!(project.module().unwrap(), "first");
    }

    #[test]
    fn missing_explicit_config_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectAssembly::new(dir.path().join("math.bin"))
            .with_config(dir.path().join("nope.toml"));
        assert!(matches!(
            project.configuration(),
            Err(HostError::Configuration(_))
        ));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let conf_path = dir.path().join("old.toml");
        fs::write(&conf_path, "ver = \"0.0.0-old\"\n").unwrap();
        assert!(matches!(
            AssemblyConfig::from_path(&conf_path),
            Err(HostError::Configuration(_))
        ));
    }
}
