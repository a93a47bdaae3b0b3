use std::path::{Path, PathBuf};

/// Subdirectory of a project holding its audio sources.
pub const SOURCES_DIR: &str = "sources";

/// Resolve an audio source name for `project`.
///
/// Absolute paths are used verbatim; anything else lives under
/// `<project>/sources/`.
pub fn resolve_source(project: &Path, name: &Path) -> PathBuf {
    if name.is_absolute() {
        name.to_path_buf()
    } else {
        project.join(SOURCES_DIR).join(name)
    }
}

/// User configuration file (`~/.config/furrow/config.toml`).
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("furrow").join("config.toml"))
}

/// Log file written by the binary (`~/.config/furrow/furrow.log`).
pub fn log_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("furrow")
        .join("furrow.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_names_land_in_sources() {
        let project = Path::new("/projects/song");
        assert_eq!(
            resolve_source(project, Path::new("kick.wav")),
            PathBuf::from("/projects/song/sources/kick.wav")
        );
    }

    #[test]
    fn absolute_names_are_verbatim() {
        let project = Path::new("/projects/song");
        assert_eq!(
            resolve_source(project, Path::new("/samples/kick.wav")),
            PathBuf::from("/samples/kick.wav")
        );
    }
}
