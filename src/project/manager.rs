// Project manager for loading and saving projects

use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::project::model::{DEFAULT_PROJECT_NAME, ProjectModel};
use crate::project::serialization::{LoadedProject, export_project, import_project, to_json_bytes};

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Unsupported save file version: {0}")]
    UnsupportedVersion(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("File system error: {0}")]
    FileSystemError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Characters that cannot appear in a file name on common platforms
const UNSAFE_FILE_NAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Suggested file name for a project: unsafe character runs become `_`, plus `.json`
pub fn default_file_name(project_name: &str) -> String {
    let name = if project_name.trim().is_empty() {
        DEFAULT_PROJECT_NAME
    } else {
        project_name
    };

    let mut safe = String::with_capacity(name.len() + 5);
    let mut in_run = false;
    for c in name.chars() {
        if UNSAFE_FILE_NAME_CHARS.contains(&c) {
            if !in_run {
                safe.push('_');
            }
            in_run = true;
        } else {
            safe.push(c);
            in_run = false;
        }
    }
    safe.push_str(".json");
    safe
}

/// Default directory for saved projects
pub fn default_project_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("beatgrid")
}

/// Project manager - handles saving/loading projects
pub struct ProjectManager {
    project_dir: PathBuf,
}

impl ProjectManager {
    /// Create a project manager rooted at `project_dir`
    pub fn new<P: Into<PathBuf>>(project_dir: P) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Where a project would be saved by default
    pub fn path_for(&self, project_name: &str) -> PathBuf {
        self.project_dir.join(default_file_name(project_name))
    }

    /// Save a project and its tempo as JSON
    ///
    /// Written to a temporary file next to the target and renamed into place, so an
    /// interrupted save never leaves a truncated project behind.
    pub fn save_project<P: AsRef<Path>>(
        &self,
        model: &ProjectModel,
        bpm: f64,
        project_path: P,
    ) -> Result<(), ProjectError> {
        let project_path = project_path.as_ref();
        if let Some(parent) = project_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ProjectError::FileSystemError(format!(
                    "Failed to create project directory: {}",
                    e
                ))
            })?;
        }

        let bytes = to_json_bytes(&export_project(model, bpm))?;
        let temp_path = project_path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, project_path)?;

        info!("Saved project '{}' to {:?}", model.project_name(), project_path);
        Ok(())
    }

    /// Save into the project directory under the default file name
    pub fn save_to_default_path(
        &self,
        model: &ProjectModel,
        bpm: f64,
    ) -> Result<PathBuf, ProjectError> {
        let path = self.path_for(model.project_name());
        self.save_project(model, bpm, &path)?;
        Ok(path)
    }

    /// Load a project file, merged over `existing`
    ///
    /// A project without a name is named after the file.
    pub fn load_project<P: AsRef<Path>>(
        &self,
        project_path: P,
        existing: &ProjectModel,
    ) -> Result<LoadedProject, ProjectError> {
        let project_path = project_path.as_ref();
        if !project_path.exists() {
            return Err(ProjectError::FileSystemError(format!(
                "Project file not found: {:?}",
                project_path
            )));
        }

        let bytes = fs::read(project_path)?;
        let mut loaded = import_project(&bytes, existing)?;

        if loaded.model.project_name().trim().is_empty() {
            if let Some(stem) = project_path.file_stem().and_then(|s| s.to_str()) {
                loaded.model.set_project_name(stem);
            }
        }

        info!(
            "Loaded project '{}' from {:?}",
            loaded.model.project_name(),
            project_path
        );
        Ok(loaded)
    }
}
