/// Canonical file paths for Connmon data files.
///
/// Both files live under %APPDATA%\Connmon\:
///   - config.toml  Optional, read (and hot-reloaded) by the daemon.
///   - status.toml  Written by the daemon, read by a tray front end.
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "Connmon";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";

/// Returns the Connmon application data directory: %APPDATA%\Connmon\
///
/// Falls back to the system temp directory when APPDATA is unset.
pub fn app_data_dir() -> PathBuf {
    let base = std::env::var_os("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    base.join(APP_DIR_NAME)
}

pub fn config_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(CONFIG_FILE_NAME)
}

pub fn status_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(STATUS_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_ends_with_connmon() {
        let dir = app_data_dir();
        assert_eq!(dir.file_name().unwrap(), "Connmon");
    }

    #[test]
    fn config_file_path_has_correct_name() {
        let path = config_file_path(&app_data_dir());
        assert_eq!(path.file_name().unwrap(), CONFIG_FILE_NAME);
    }

    #[test]
    fn config_and_status_share_same_parent_dir() {
        let dir = app_data_dir();
        let config = config_file_path(&dir);
        let status = status_file_path(&dir);
        assert_eq!(config.parent(), status.parent());
        assert_eq!(status.parent(), Some(dir.as_path()));
    }
}
