// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::discovery::user_config_paths;
use crate::{
    entities::SuiteId,
    errors::{ConfigParseError, ConfigParseErrorKind},
    markers::DEFAULT_MARKER_NAME,
    session::FinishPolicy,
    status::StatusRefreshPolicy,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{
    Config, ConfigError, File, FileFormat,
    builder::{ConfigBuilder, DefaultState},
};
use serde::Deserialize;
use std::{collections::BTreeSet, fmt, time::Duration};
use tracing::{debug, warn};

/// Special value for `--user-config-file` that skips user config loading
/// entirely.
pub const USER_CONFIG_NONE: &str = "none";

/// Specifies where to load user configuration from.
#[derive(Clone, Copy, Debug)]
pub enum UserConfigLocation<'a> {
    /// Discover user config from the default locations.
    Default,

    /// Skip user config loading entirely.
    ///
    /// This is useful for test isolation.
    Isolated,

    /// Load user config from an explicit path.
    ///
    /// Returns an error if the file does not exist.
    Explicit(&'a Utf8Path),
}

impl<'a> UserConfigLocation<'a> {
    /// Creates a user config location from a CLI or environment variable
    /// value.
    ///
    /// Returns `Default` if `None`, `Isolated` if `"none"`, otherwise
    /// `Explicit` with the path.
    pub fn from_cli_or_env(s: Option<&'a str>) -> Self {
        match s {
            None => Self::Default,
            Some(s) if s == USER_CONFIG_NONE => Self::Isolated,
            Some(s) => Self::Explicit(Utf8Path::new(s)),
        }
    }
}

/// Values supplied on the command line or through the environment. These
/// take precedence over every config file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Overrides `server.url`.
    pub server_url: Option<String>,
    /// Overrides `project.name`.
    pub project: Option<String>,
    /// Overrides `server.user`.
    pub user: Option<String>,
    /// Overrides `server.password`.
    pub password: Option<String>,
    /// Overrides `run.on-finish`.
    pub on_finish: Option<FinishPolicy>,
}

/// How to reach the TestRail server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerConfig {
    /// The server URL.
    pub url: String,
    /// The label used in run names, if different from the URL.
    pub label: Option<String>,
    /// The user to authenticate as.
    pub user: String,
    /// The password or API key.
    pub password: String,
    /// The timeout for each request.
    pub timeout: Duration,
    /// The suite to use in multi-suite projects.
    pub suite_id: Option<SuiteId>,
}

impl ServerConfig {
    /// Returns the label identifying this server in run names.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.url)
    }
}

/// Settings for the created run.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    /// The description attached to the run.
    pub description: String,
    /// What to do with the run when the session finishes.
    pub on_finish: FinishPolicy,
}

/// Settings for case markers.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarkerConfig {
    /// The marker name that declares case identifiers.
    pub name: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MARKER_NAME.to_owned(),
        }
    }
}

/// Fully resolved bridge configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BridgeConfig {
    /// The server to report to.
    pub server: ServerConfig,
    /// The display name of the target project.
    pub project_name: String,
    /// Run settings.
    pub run: RunConfig,
    /// Which statuses are looked up on the server.
    pub statuses: StatusRefreshPolicy,
    /// Marker settings.
    pub markers: MarkerConfig,
}

impl BridgeConfig {
    /// The repository config path, relative to the workspace root.
    pub const CONFIG_PATH: &'static str = ".config/testrail-bridge.toml";

    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Loads and layers the default, user and repository config, then applies
    /// `overrides`.
    ///
    /// If `config_file` is `None`, the repository config is read from
    /// [`Self::CONFIG_PATH`] under `workspace_root` if it exists.
    pub fn load(
        workspace_root: &Utf8Path,
        config_file: Option<&Utf8Path>,
        user_config: UserConfigLocation<'_>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigParseError> {
        Self::load_with_warnings(
            workspace_root,
            config_file,
            user_config,
            overrides,
            &mut DefaultConfigWarnings,
        )
    }

    fn load_with_warnings(
        workspace_root: &Utf8Path,
        config_file: Option<&Utf8Path>,
        user_config: UserConfigLocation<'_>,
        overrides: &ConfigOverrides,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let repo_config_file = workspace_root.join(Self::CONFIG_PATH);

        // Lowest priority first.
        let mut files = Vec::new();
        if let Some(path) = user_config_file(user_config)? {
            files.push(path);
        }
        match config_file {
            Some(path) if !path.exists() => {
                return Err(ConfigParseError::new(
                    path,
                    ConfigParseErrorKind::FileNotFound,
                ));
            }
            Some(path) => files.push(path.to_owned()),
            None if repo_config_file.exists() => files.push(repo_config_file.clone()),
            None => debug!("repo config: no file at {repo_config_file}"),
        }

        let mut composite_builder = Self::make_default_config();
        for path in &files {
            debug!("config: loading {path}");
            let source = File::new(path.as_str(), FileFormat::Toml);

            // Deserialize each file on its own so unknown keys are attributed
            // to the file they came from.
            let (_, unknown) =
                Self::build_and_deserialize_config(Self::make_default_config().add_source(
                    source.clone(),
                ))
                .map_err(|kind| ConfigParseError::new(path, kind))?;
            if !unknown.is_empty() {
                warnings.unknown_config_keys(path, &unknown);
            }

            composite_builder = composite_builder.add_source(source);
        }

        // Errors that can't be pinned on a single file are attributed to the
        // highest-priority one.
        let error_file = files.last().cloned().unwrap_or(repo_config_file);
        let (config, _unknown) = Self::build_and_deserialize_config(composite_builder)
            .map_err(|kind| ConfigParseError::new(&error_file, kind))?;

        config
            .apply(overrides)
            .resolve()
            .map_err(|kind| ConfigParseError::new(&error_file, kind))
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<(DeserializedConfig, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build()
            .map_err(|error| ConfigParseErrorKind::Build(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: DeserializedConfig =
            serde_path_to_error::deserialize(ignored_de).map_err(|error| {
                // The config crate also reports the key; drop it so the path
                // only appears once.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::Deserialize(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

impl fmt::Display for BridgeConfig {
    /// Writes the config in TOML-like form, with the password redacted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[server]")?;
        writeln!(f, "url = {:?}", self.server.url)?;
        writeln!(f, "label = {:?}", self.server.label())?;
        writeln!(f, "user = {:?}", self.server.user)?;
        writeln!(f, "password = \"<redacted>\"")?;
        writeln!(
            f,
            "timeout = \"{}\"",
            humantime_serde::re::humantime::format_duration(self.server.timeout)
        )?;
        if let Some(suite_id) = self.server.suite_id {
            writeln!(f, "suite-id = {suite_id}")?;
        }
        writeln!(f)?;
        writeln!(f, "[project]")?;
        writeln!(f, "name = {:?}", self.project_name)?;
        writeln!(f)?;
        writeln!(f, "[run]")?;
        writeln!(f, "description = {:?}", self.run.description)?;
        writeln!(f, "on-finish = \"{}\"", self.run.on_finish)?;
        writeln!(f)?;
        writeln!(f, "[statuses]")?;
        writeln!(f, "resolve-passed = {}", self.statuses.resolve_passed)?;
        writeln!(f)?;
        writeln!(f, "[markers]")?;
        write!(f, "name = {:?}", self.markers.name)
    }
}

fn user_config_file(
    location: UserConfigLocation<'_>,
) -> Result<Option<Utf8PathBuf>, ConfigParseError> {
    match location {
        UserConfigLocation::Isolated => {
            debug!("user config: skipping (isolated)");
            Ok(None)
        }
        UserConfigLocation::Explicit(path) => {
            if path.exists() {
                Ok(Some(path.to_owned()))
            } else {
                Err(ConfigParseError::new(
                    path,
                    ConfigParseErrorKind::FileNotFound,
                ))
            }
        }
        UserConfigLocation::Default => {
            let paths = user_config_paths()?;
            let found = paths.iter().find(|path| path.exists()).cloned();
            if found.is_none() {
                debug!(
                    "user config: no config file found at any candidate path: {:?}",
                    paths
                );
            }
            Ok(found)
        }
    }
}

/// Handles warnings produced while loading configuration.
///
/// Warnings are logged by default; tests collect them instead.
trait ConfigWarnings {
    /// Handles unknown configuration keys found in a config file.
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>);
}

struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        let mut unknown_str = String::new();
        if unknown.len() == 1 {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.extend(unknown.iter().map(|s| s.as_str()));
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push('\n');
                unknown_str.push_str("  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!("in config file {config_file}, ignoring unknown configuration {unknown_str}");
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedConfig {
    server: DeserializedServer,
    #[serde(default)]
    project: DeserializedProject,
    run: RunConfig,
    statuses: StatusRefreshPolicy,
    #[serde(default)]
    markers: MarkerConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedServer {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(with = "humantime_serde")]
    timeout: Duration,
    #[serde(default)]
    suite_id: Option<SuiteId>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedProject {
    #[serde(default)]
    name: Option<String>,
}

impl DeserializedConfig {
    fn apply(mut self, overrides: &ConfigOverrides) -> Self {
        let ConfigOverrides {
            server_url,
            project,
            user,
            password,
            on_finish,
        } = overrides;

        if let Some(url) = server_url {
            self.server.url = Some(url.clone());
        }
        if let Some(project) = project {
            self.project.name = Some(project.clone());
        }
        if let Some(user) = user {
            self.server.user = Some(user.clone());
        }
        if let Some(password) = password {
            self.server.password = Some(password.clone());
        }
        if let Some(on_finish) = on_finish {
            self.run.on_finish = *on_finish;
        }
        self
    }

    fn resolve(self) -> Result<BridgeConfig, ConfigParseErrorKind> {
        fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigParseErrorKind> {
            value
                .filter(|value| !value.is_empty())
                .ok_or(ConfigParseErrorKind::MissingKey(key))
        }

        let server = ServerConfig {
            url: required(self.server.url, "server.url")?,
            label: self.server.label.filter(|label| !label.is_empty()),
            user: required(self.server.user, "server.user")?,
            password: required(self.server.password, "server.password")?,
            timeout: self.server.timeout,
            suite_id: self.server.suite_id,
        };

        Ok(BridgeConfig {
            server,
            project_name: required(self.project.name, "project.name")?,
            run: self.run,
            statuses: self.statuses,
            markers: self.markers,
        })
    }
}
