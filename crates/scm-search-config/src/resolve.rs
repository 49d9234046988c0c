//! Path resolution for the index root.
//!
//! Resolves relative and tilde-prefixed roots to absolute paths and supplies the platform
//! default when no root is configured.

use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};

use crate::ConfigError;

/// Resolves a configured root to an absolute path.
///
/// - Tilde paths (`~/search`) are expanded to the home directory
/// - Relative paths are resolved against `config_dir`
/// - Absolute paths are returned unchanged
///
/// The directory does not have to exist yet; it is created on first write.
pub fn resolve_root(path: &str, config_dir: &Path) -> Result<PathBuf, ConfigError> {
    let expanded = expand_tilde(path)?;
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(config_dir.join(expanded))
    }
}

/// Returns the platform data directory used when no root is configured.
pub fn default_root() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("org", "scm-manager", "scm-search")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(ConfigError::NoDataDirectory)
}

/// Expands a tilde prefix to the home directory.
fn expand_tilde(path: &str) -> Result<PathBuf, ConfigError> {
    if path == "~" {
        return home_dir();
    }

    if let Some(rest) = path.strip_prefix("~/") {
        let home = home_dir()?;
        return Ok(home.join(rest));
    }

    Ok(PathBuf::from(path))
}

/// Returns the home directory.
fn home_dir() -> Result<PathBuf, ConfigError> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDirectory)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_resolve_relative_root() {
        let test_dir = TempDir::new().unwrap();
        let resolved = resolve_root("./data", test_dir.path()).unwrap();
        assert_eq!(resolved, test_dir.path().join("./data"));
        assert!(resolved.is_absolute());
    }

    #[test]
    fn test_resolve_absolute_root() {
        let test_dir = TempDir::new().unwrap();
        let absolute = test_dir.path().join("search");
        let resolved = resolve_root(absolute.to_str().unwrap(), Path::new("/other")).unwrap();
        assert_eq!(resolved, absolute);
    }

    #[test]
    fn test_resolve_tilde_root() {
        let Some(base) = BaseDirs::new() else {
            return;
        };
        let resolved = resolve_root("~/scm-search", Path::new("/other")).unwrap();
        assert_eq!(resolved, base.home_dir().join("scm-search"));
        assert_eq!(resolve_root("~", Path::new("/other")).unwrap(), base.home_dir());
    }

    #[test]
    fn test_tilde_inside_path_is_literal() {
        let resolved = resolve_root("data/~/x", Path::new("/base")).unwrap();
        assert_eq!(resolved, Path::new("/base/data/~/x"));
    }
}
