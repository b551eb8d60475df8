//! Workflow loader.

use super::WorkflowConfig;
use crate::errors::ConfigLoadError;
use crate::pipeline::StageGraph;
use crate::template::VariableEnv;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "workflow.yaml";

/// The document as written, before variable values are normalized.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawWorkflow {
    variables: Option<BTreeMap<String, Value>>,
    stages: StageGraph,
    shell: Option<String>,
}

impl TryFrom<RawWorkflow> for WorkflowConfig {
    type Error = ConfigLoadError;

    fn try_from(raw: RawWorkflow) -> Result<Self, Self::Error> {
        let mut variables = VariableEnv::new();
        for (name, value) in raw.variables.unwrap_or_default() {
            let rendered = scalar_to_string(&name, value)?;
            variables.insert(name, rendered);
        }

        Ok(Self {
            variables,
            stages: raw.stages,
            shell: raw.shell.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Converts a YAML scalar into the string form used for templating.
///
/// Booleans render lowercase (`true`, `false`) and null renders as the empty
/// string. Workflows that need `True`, `False` or `None` in a command must
/// quote the value.
fn scalar_to_string(name: &str, value: Value) -> Result<String, ConfigLoadError> {
    let found = match value {
        Value::Null => return Ok(String::new()),
        Value::Bool(b) => return Ok(b.to_string()),
        Value::Number(n) => return Ok(n.to_string()),
        Value::String(s) => return Ok(s),
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    };
    Err(ConfigLoadError::InvalidVariable {
        name: name.to_string(),
        found,
    })
}

/// Workflow configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a workflow from a file.
    ///
    /// Scalar variables become strings; an unquoted `true` stays `true` and a
    /// bare key with no value becomes empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError`] if the file is missing, unreadable, not
    /// valid YAML, or declares a non-scalar variable.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<WorkflowConfig, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content, path)?;
        debug!(
            path = %path.display(),
            stages = config.stages.len(),
            variables = config.variables.len(),
            "loaded workflow"
        );
        Ok(config)
    }

    /// Load a workflow from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError`] if the text is not a valid workflow.
    pub fn from_yaml_str(content: &str) -> Result<WorkflowConfig, ConfigLoadError> {
        Self::parse(content, Path::new("<string>"))
    }

    fn parse(content: &str, path: &Path) -> Result<WorkflowConfig, ConfigLoadError> {
        if content.trim().is_empty() {
            return Ok(WorkflowConfig::default());
        }
        let raw: RawWorkflow =
            serde_yaml::from_str(content).map_err(|source| ConfigLoadError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        WorkflowConfig::try_from(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageDef;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const WORKFLOW: &str = r#"
variables:
  build_dir: "{cwd}/target/{dut}"
  logs_dir: "{build_dir}/logs"
  jobs: 8
  release: true
  extra:
stages:
  clean:
    commands: ["rm -rf {build_dir}"]
  configure:
    hidden: true
    commands: ["cmake -B {build_dir}"]
  build:
    dependencies: [configure]
    description: Compile everything
    commands: ["make -j{jobs} -C {build_dir}"]
    log_file: "{logs_dir}/make.log"
"#;

    #[test]
    fn test_from_yaml_str() {
        let config = ConfigLoader::from_yaml_str(WORKFLOW).unwrap();

        assert_eq!(config.variables.get("jobs"), Some("8"));
        assert_eq!(config.variables.get("release"), Some("true"));
        assert_eq!(config.variables.get("extra"), Some(""));
        assert_eq!(
            config.stages.names().collect::<Vec<_>>(),
            vec!["clean", "configure", "build"]
        );
        assert_eq!(
            config.stages.get("build"),
            Some(
                &StageDef::new()
                    .with_dependency("configure")
                    .with_description("Compile everything")
                    .with_command("make -j{jobs} -C {build_dir}")
                    .with_log_file("{logs_dir}/make.log")
            )
        );
        assert!(config.stages.get("configure").unwrap().hidden);
        assert_eq!(config.shell(), "/bin/bash");
    }

    #[test]
    fn test_shell_override() {
        let config = ConfigLoader::from_yaml_str("shell: /bin/sh\nstages: {}\n").unwrap();
        assert_eq!(config.shell(), "/bin/sh");
    }

    #[test]
    fn test_empty_document() {
        let config = ConfigLoader::from_yaml_str("   \n").unwrap();
        assert!(config.stages.is_empty());
        assert!(config.variables.is_empty());
    }

    #[test]
    fn test_null_sections() {
        let config = ConfigLoader::from_yaml_str("variables:\nstages:\n").unwrap();
        assert!(config.stages.is_empty());
        assert!(config.variables.is_empty());
    }

    #[test]
    fn test_non_scalar_variable_rejected() {
        let err = ConfigLoader::from_yaml_str("variables:\n  flags: [a, b]\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidVariable { ref name, found: "a sequence" } if name == "flags"
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = ConfigLoader::from_yaml_str("stages: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Yaml { .. }));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let yaml = "stages:\n  build: {}\n  build: {}\n";
        assert!(matches!(
            ConfigLoader::from_yaml_str(yaml),
            Err(ConfigLoadError::Yaml { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(WORKFLOW.as_bytes()).unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.stages.len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yaml");
        let err = ConfigLoader::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileNotFound(p) if p == path));
    }
}
