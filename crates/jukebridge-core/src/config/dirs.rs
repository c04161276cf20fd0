use directories::ProjectDirs;
use std::path::PathBuf;

/// System-wide fallback used when no home directory can be resolved
/// (e.g. when running as a system service without `$HOME`).
const SYSTEM_CONFIG_DIR: &str = "/etc/jukebridge";

/// Daemon directories following the XDG base directory layout
#[derive(Debug, Clone)]
pub struct Directories {
    /// Config file path (~/.config/jukebridge/config.json)
    pub config_file: PathBuf,
}

impl Directories {
    #[must_use]
    pub fn new() -> Self {
        let config = ProjectDirs::from("", "", "jukebridge").map_or_else(
            || PathBuf::from(SYSTEM_CONFIG_DIR),
            |project| project.config_dir().to_path_buf(),
        );
        Self::with_base(config)
    }

    #[must_use]
    pub fn with_base(base: PathBuf) -> Self {
        Self {
            config_file: base.join("config.json"),
        }
    }
}

impl Default for Directories {
    fn default() -> Self {
        Self::new()
    }
}
