//! Office suite capability detection

use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Executable names probed on `PATH`, in order
const OFFICE_BINARIES: [&str; 2] = ["soffice", "libreoffice"];

pub const DEFAULT_OFFICE_TIMEOUT: Duration = Duration::from_secs(120);

/// How conversions look for an office suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeConfig {
    /// Set to false to always use the library path
    pub enabled: bool,
    /// Explicit executable, tried before searching `PATH`
    pub binary: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: None,
            timeout: DEFAULT_OFFICE_TIMEOUT,
        }
    }
}

impl OfficeConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// A located office suite executable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfficeSuite {
    pub binary: PathBuf,
}

/// Which converter handles a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ConversionStrategy {
    Office(OfficeSuite),
    Library,
}

impl ConversionStrategy {
    /// Probe for an office suite according to `config`
    pub fn detect(config: &OfficeConfig) -> Self {
        if !config.enabled {
            return ConversionStrategy::Library;
        }

        if let Some(binary) = config.binary.as_deref().filter(|path| path.is_file()) {
            return ConversionStrategy::Office(OfficeSuite {
                binary: binary.to_path_buf(),
            });
        }

        match find_on_path(&OFFICE_BINARIES) {
            Some(binary) => ConversionStrategy::Office(OfficeSuite { binary }),
            None => ConversionStrategy::Library,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConversionStrategy::Office(_) => "office",
            ConversionStrategy::Library => "library",
        }
    }
}

/// First `names` entry found as a file in a `PATH` directory
fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    let dirs: Vec<PathBuf> = env::split_paths(&path).collect();
    names
        .iter()
        .flat_map(|name| dirs.iter().map(move |dir| dir.join(name)))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
