use std::path::PathBuf;

use chimpdump_core::config::Settings;
use config::{Config, Environment, File};
use directories::ProjectDirs;

pub fn get_configuration_with_paths(
    current_dir_path: Option<PathBuf>,
    system_config_dir_path: Option<PathBuf>,
) -> Result<Settings, config::ConfigError> {
    let config_directory = current_dir_path.unwrap_or_else(|| {
        std::env::current_dir()
            .map(|p| p.join("config"))
            .unwrap_or_else(|_| PathBuf::from("config"))
    });

    let system_config_dir = if let Some(path) = system_config_dir_path {
        path
    } else {
        ProjectDirs::from("com", "chimpdump", "chimpdump")
            .map(|d| d.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config"))
    };

    let defaults = Settings::default();

    let settings = Config::builder()
        // API settings
        .set_default("api.key_path", defaults.api.key_path.to_string_lossy().into_owned())?
        .set_default("api.host", defaults.api.host.as_str())?
        .set_default("api.user_agent", defaults.api.user_agent.as_str())?
        // Export settings
        .set_default("export.output_dir", defaults.export.output_dir.to_string_lossy().into_owned())?
        .set_default("export.list_count", i64::from(defaults.export.list_count))?
        .set_default("export.page_size", i64::from(defaults.export.page_size))?
        .set_default("export.store_count", i64::from(defaults.export.store_count))?
        .set_default("log_level", defaults.log_level.as_str())?
        .add_source(File::from(system_config_dir.join("config.toml")).required(false))
        .add_source(File::from(config_directory.join("config.toml")).required(false))
        .add_source(Environment::with_prefix("CHIMPDUMP").separator("__"))
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    get_configuration_with_paths(None, None)
}
