use std::path::PathBuf;

use directories::ProjectDirs;

const APP_QUALIFIER: &str = "app";
const APP_ORGANIZATION: &str = "quebella";
const APP_NAME: &str = "que-bella";

/// Platform data directory for the database and audio objects.
///
/// Falls back to `./.quebella` when the platform exposes no home directory
/// (containers without `HOME`).
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".quebella"))
}

pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("quebella.sqlite")
}

pub fn audio_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("audio")
}
