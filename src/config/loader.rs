//! Pipeline file loader

use std::path::{Path, PathBuf};

use super::definition::{ConfigError, PipelineDefinition};

/// File name looked up in the project directory when no file is given
pub const DEFAULT_PIPELINE_FILE: &str = "localci.yaml";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("invalid pipeline in {file}: {error}")]
    Invalid { file: String, error: ConfigError },
}

pub struct PipelineLoader;

impl PipelineLoader {
    /// Load and validate a pipeline file
    pub fn load_file(path: &Path) -> Result<PipelineDefinition, LoadError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    pub fn from_yaml(yaml: &str) -> Result<PipelineDefinition, LoadError> {
        Self::parse(yaml, "<inline>")
    }

    /// `<project>/localci.yaml` if it exists
    pub fn find_in(project: &Path) -> Option<PathBuf> {
        let candidate = project.join(DEFAULT_PIPELINE_FILE);
        candidate.is_file().then_some(candidate)
    }

    fn parse(yaml: &str, file: &str) -> Result<PipelineDefinition, LoadError> {
        let definition: PipelineDefinition =
            serde_yaml::from_str(yaml).map_err(|e| LoadError::Yaml {
                file: file.to_string(),
                error: e,
            })?;
        definition.validate().map_err(|e| LoadError::Invalid {
            file: file.to_string(),
            error: e,
        })?;
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ci.yaml");

        fs::write(
            &path,
            r#"
name: single
steps:
  - name: go build
    exe: go
    args: [build, .]
"#,
        )
        .unwrap();

        let def = PipelineLoader::load_file(&path).unwrap();
        assert_eq!(def.name.as_deref(), Some("single"));
        assert_eq!(def.steps[0].name, "go build");
    }

    #[test]
    fn test_load_file_reports_yaml_errors_with_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "steps: [ { name: a").unwrap();

        let err = PipelineLoader::load_file(&path).unwrap_err();
        assert!(matches!(err, LoadError::Yaml { .. }));
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_load_file_rejects_invalid_pipeline() {
        let err = PipelineLoader::from_yaml("steps: [{ name: a, exe: x }, { name: a, exe: x }]")
            .unwrap_err();
        assert!(matches!(err, LoadError::Invalid { .. }));
        assert!(err.to_string().contains("duplicate step name"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = PipelineLoader::load_file(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_find_in_project() {
        let dir = tempdir().unwrap();
        assert!(PipelineLoader::find_in(dir.path()).is_none());

        fs::write(dir.path().join(DEFAULT_PIPELINE_FILE), "steps: []").unwrap();
        assert_eq!(
            PipelineLoader::find_in(dir.path()),
            Some(dir.path().join(DEFAULT_PIPELINE_FILE))
        );
    }
}
