use std::path::{Path, PathBuf};

use config_sys::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FOLDER_PATH_DEFAULT: &str = "./config/";
const CONFIG_FILE_LOCAL_PREFIX: &str = "local_";
// This makes it so "COCKPIT_WEB_SRV_PORT" overrides web_srv_port and "__" nests
const CONFIG_ENV_PREFIX_SEPARATOR: &str = "_";
const CONFIG_ENV_SEPARATOR: &str = "__";

#[derive(Debug)]
pub enum FileFormat {
    JSON,
    YAML,
    TOML,
}

impl FileFormat {
    pub fn as_str(&self) -> &str {
        match self {
            FileFormat::JSON => "json",
            FileFormat::YAML => "yaml",
            FileFormat::TOML => "toml",
        }
    }
}

/// Loads `T` from, in increasing priority:
/// `./config/<app>.<ext>`, `./config/local_<app>.<ext>`, `<APP>_*` env vars
/// and finally the file given with `--config`.
pub fn setup_config<'a, T>(
    app_name: &str,
    file_format: FileFormat,
    extra_path: Option<&PathBuf>,
) -> Result<T, ConfigError>
where
    T: Deserialize<'a>,
{
    setup_config_from(
        Path::new(CONFIG_FOLDER_PATH_DEFAULT),
        app_name,
        file_format,
        extra_path,
    )
}

pub fn setup_config_from<'a, T>(
    folder: &Path,
    app_name: &str,
    file_format: FileFormat,
    extra_path: Option<&PathBuf>,
) -> Result<T, ConfigError>
where
    T: Deserialize<'a>,
{
    let base = folder.join(format!("{}.{}", app_name, file_format.as_str()));
    let local = folder.join(format!(
        "{}{}.{}",
        CONFIG_FILE_LOCAL_PREFIX,
        app_name,
        file_format.as_str()
    ));

    let mut s = Config::builder()
        .add_source(File::from(base).required(false))
        .add_source(File::from(local).required(false))
        .add_source(
            Environment::with_prefix(app_name.to_uppercase().as_str())
                .prefix_separator(CONFIG_ENV_PREFIX_SEPARATOR)
                .separator(CONFIG_ENV_SEPARATOR),
        );

    if let Some(extra_path) = extra_path {
        s = s.add_source(File::from(extra_path.as_path()));
    }

    s.build()?.try_deserialize::<T>()
}
