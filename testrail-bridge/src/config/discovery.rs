// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Where the user config file lives.

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::Utf8PathBuf;
use etcetera::{BaseStrategy, HomeDirError, base_strategy::Xdg};

/// The name of the directory under the user's config directory.
pub const USER_CONFIG_DIR_NAME: &str = "testrail-bridge";

/// The name of the user config file.
pub const USER_CONFIG_FILE_NAME: &str = "config.toml";

/// Returns candidate paths for the user config file, most preferred first.
///
/// This is `$XDG_CONFIG_HOME/testrail-bridge/config.toml` (or
/// `~/.config/testrail-bridge/config.toml`) everywhere. On Windows,
/// `%APPDATA%\testrail-bridge\config.toml` comes first.
///
/// The caller should use the first path that exists. A missing home
/// directory yields no candidates.
pub fn user_config_paths() -> Result<Vec<Utf8PathBuf>, ConfigParseError> {
    let mut candidates = Vec::new();

    #[cfg(windows)]
    candidates.push(etcetera::base_strategy::Windows::new().map(|s| s.config_dir()));
    candidates.push(Xdg::new().map(|s| s.config_dir()));

    candidates
        .into_iter()
        .filter_map(|config_dir: Result<std::path::PathBuf, HomeDirError>| config_dir.ok())
        .map(|config_dir| {
            to_utf8(
                config_dir
                    .join(USER_CONFIG_DIR_NAME)
                    .join(USER_CONFIG_FILE_NAME),
            )
        })
        .collect()
}

fn to_utf8(path: std::path::PathBuf) -> Result<Utf8PathBuf, ConfigParseError> {
    let display = path.to_string_lossy().into_owned();
    Utf8PathBuf::try_from(path).map_err(|error| {
        ConfigParseError::new(display, ConfigParseErrorKind::NonUtf8Path(error))
    })
}
