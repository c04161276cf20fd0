mod dirs;
mod settings;
mod validation;

pub use dirs::Directories;
pub use settings::{
    Config, MqttConfig, PathsConfig, PlayerConfig, RefreshConfig, ServicesConfig, SystemConfig,
};
pub use validation::warn_unknown_fields;
