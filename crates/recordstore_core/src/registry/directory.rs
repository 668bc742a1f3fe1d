//! Registry backed by JSON model files in one directory.

use log::warn;
use std::path::{Path, PathBuf};

use crate::model::schema::{ModelError, Schema};
use crate::registry::ModelRegistry;

/// Environment variable overriding the directory of [`DirectoryRegistry::main`].
pub const MODEL_DIR_ENV: &str = "RECORDSTORE_MODEL_DIR";

/// File name suffix of model files: `<name>.model.json`.
pub const MODEL_FILE_SUFFIX: &str = ".model.json";

/// Models stored as `<name>.model.json` under `root`.
#[derive(Debug, Clone)]
pub struct DirectoryRegistry {
    root: PathBuf,
    executable_name: Option<String>,
    display_name: Option<String>,
}

impl DirectoryRegistry {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            executable_name: None,
            display_name: None,
        }
    }

    /// Registry of the running program.
    ///
    /// Reads models from `$RECORDSTORE_MODEL_DIR`, or from the directory of
    /// the current executable when the variable is unset. The executable
    /// stem doubles as the executable name.
    pub fn main() -> Self {
        let exe = std::env::current_exe().ok();
        let root = std::env::var_os(MODEL_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| exe.as_deref().and_then(Path::parent).map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let executable_name = exe
            .as_deref()
            .and_then(Path::file_stem)
            .and_then(|stem| stem.to_str())
            .map(str::to_string);

        Self {
            root,
            executable_name,
            display_name: None,
        }
    }

    pub fn with_executable_name(mut self, name: impl Into<String>) -> Self {
        self.executable_name = Some(name.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn model_path(&self, name: &str) -> Option<PathBuf> {
        // Names that could escape the directory are never models.
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return None;
        }
        Some(self.root.join(format!("{name}{MODEL_FILE_SUFFIX}")))
    }
}

impl ModelRegistry for DirectoryRegistry {
    fn exists(&self, name: &str) -> bool {
        self.model_path(name).is_some_and(|path| path.is_file())
    }

    fn load(&self, name: &str) -> Result<Schema, ModelError> {
        let path = self
            .model_path(name)
            .filter(|path| path.is_file())
            .ok_or_else(|| ModelError::NotFound(name.to_string()))?;
        let raw = std::fs::read_to_string(&path).map_err(|source| ModelError::Io {
            path: path.clone(),
            source,
        })?;
        let mut schema: Schema = serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
            name: name.to_string(),
            source,
        })?;

        if schema.name.is_empty() {
            schema.name = name.to_string();
        } else if schema.name != name {
            warn!(
                "event=model_load module=registry status=warn model={name} declared_name={}",
                schema.name
            );
            schema.name = name.to_string();
        }

        schema.validate()?;
        Ok(schema)
    }

    fn executable_name(&self) -> Option<String> {
        self.executable_name.clone()
    }

    fn display_name(&self) -> Option<String> {
        self.display_name.clone()
    }
}
