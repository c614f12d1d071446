//! Unified path management for mscan files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/mscan/             # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/mscan/        # Data directory (or storage.data_dir)
//! ├── prompts.toml             # Workflow node configuration
//! ├── prompts_versions/        # Saved prompt versions, one dir per node
//! │   └── company_overview/
//! │       └── 20250817_120000_000.json
//! ├── uploads/                 # Uploaded PDFs
//! ├── outputs/reports/         # Archived final reports
//! └── logs/                    # Server logs
//!     └── mscan-server.log.YYYY-MM-DD
//! ```

use std::path::{Path, PathBuf};

const APP_DIR: &str = "mscan";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Resolves every file location from a single data root.
#[derive(Debug, Clone)]
pub struct ScanPaths {
    root: PathBuf,
}

impl ScanPaths {
    /// Uses `root` when given, otherwise the platform data directory.
    pub fn new(root: Option<&Path>) -> Result<Self, PathError> {
        let root = match root {
            Some(path) => path.to_path_buf(),
            None => Self::default_data_dir()?,
        };
        Ok(Self { root })
    }

    /// Returns the mscan configuration directory (e.g. `~/.config/mscan/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    fn default_data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prompts_file(&self) -> PathBuf {
        self.root.join("prompts.toml")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("prompts_versions")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("outputs").join("reports")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
