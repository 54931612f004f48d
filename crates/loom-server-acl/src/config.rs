// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization configuration.
//!
//! Layers merge in precedence order: built-in defaults, then the `[acl]` table
//! of the server TOML file, then `LOOM_SERVER_ACL_*` environment variables.

use std::path::{Path, PathBuf};

use loom_acl_core::{Action, Placeholder, SqlOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// System-wide server config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/loom/server.toml";

pub const ENV_SUPERUSER_ROLE: &str = "LOOM_SERVER_ACL_SUPERUSER_ROLE";
pub const ENV_SKIP_CONDITIONS: &str = "LOOM_SERVER_ACL_SKIP_CONDITIONS";
pub const ENV_DEFAULT_ACTION: &str = "LOOM_SERVER_ACL_DEFAULT_ACTION";
pub const ENV_SQL_PLACEHOLDER: &str = "LOOM_SERVER_ACL_SQL_PLACEHOLDER";
pub const ENV_ABSTAIN_WITHOUT_INSTANCE: &str = "LOOM_SERVER_ACL_ABSTAIN_WITHOUT_INSTANCE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AclConfigLayer {
	pub superuser_role: Option<String>,
	pub skip_conditions: Option<bool>,
	pub default_action: Option<String>,
	pub sql_placeholder: Option<Placeholder>,
	pub abstain_without_instance: Option<bool>,
}

impl AclConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.superuser_role.is_some() {
			self.superuser_role = other.superuser_role;
		}
		if other.skip_conditions.is_some() {
			self.skip_conditions = other.skip_conditions;
		}
		if other.default_action.is_some() {
			self.default_action = other.default_action;
		}
		if other.sql_placeholder.is_some() {
			self.sql_placeholder = other.sql_placeholder;
		}
		if other.abstain_without_instance.is_some() {
			self.abstain_without_instance = other.abstain_without_instance;
		}
	}

	pub fn finalize(self) -> AclConfig {
		let defaults = AclConfig::default();
		AclConfig {
			superuser_role: self.superuser_role.filter(|r| !r.is_empty()),
			skip_conditions: self.skip_conditions.unwrap_or(defaults.skip_conditions),
			default_action: self
				.default_action
				.filter(|a| !a.is_empty())
				.unwrap_or(defaults.default_action),
			sql_placeholder: self.sql_placeholder.unwrap_or(defaults.sql_placeholder),
			abstain_without_instance: self
				.abstain_without_instance
				.unwrap_or(defaults.abstain_without_instance),
		}
	}

	/// Reads the layer from environment variables through `lookup`.
	pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
		let flag = |name: &str| var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1");

		let sql_placeholder = match var(ENV_SQL_PLACEHOLDER) {
			Some(v) => Some(v.parse().map_err(|message| ConfigError::InvalidValue {
				key: ENV_SQL_PLACEHOLDER.to_string(),
				message,
			})?),
			None => None,
		};

		Ok(Self {
			superuser_role: var(ENV_SUPERUSER_ROLE),
			skip_conditions: flag(ENV_SKIP_CONDITIONS),
			default_action: var(ENV_DEFAULT_ACTION),
			sql_placeholder,
			abstain_without_instance: flag(ENV_ABSTAIN_WITHOUT_INSTANCE),
		})
	}

	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_env_with(|name| std::env::var(name).ok())
	}

	/// Reads the `[acl]` table of a TOML file. A missing file is an empty
	/// layer.
	pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
		if !path.exists() {
			debug!(path = %path.display(), "config file not found, skipping");
			return Ok(Self::default());
		}

		debug!(path = %path.display(), "loading config file");
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
			path: path.to_path_buf(),
			source: e,
		})?;
		let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source: e,
		})?;
		Ok(file.acl.unwrap_or_default())
	}
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
	acl: Option<AclConfigLayer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AclConfig {
	/// Actors holding this role bypass rule evaluation.
	pub superuser_role: Option<String>,
	/// Build abilities whose conditioned rules always match.
	pub skip_conditions: bool,
	/// Action used by endpoint policies that name none.
	pub default_action: String,
	pub sql_placeholder: Placeholder,
	/// Abstain, rather than allow with conditions, when an instance is needed
	/// but none could be resolved.
	pub abstain_without_instance: bool,
}

impl AclConfig {
	pub fn sql_options(&self) -> SqlOptions {
		SqlOptions::new(self.sql_placeholder)
	}
}

impl Default for AclConfig {
	fn default() -> Self {
		Self {
			superuser_role: None,
			skip_conditions: false,
			default_action: Action::Execute.to_string(),
			sql_placeholder: Placeholder::Dollar,
			abstain_without_instance: false,
		}
	}
}

/// Loads configuration from defaults, the system config file and the
/// environment.
pub fn load_config() -> Result<AclConfig, ConfigError> {
	load_config_with_file(SYSTEM_CONFIG_PATH)
}

/// Loads configuration with a custom config file path.
pub fn load_config_with_file(path: impl Into<PathBuf>) -> Result<AclConfig, ConfigError> {
	let path = path.into();
	let mut merged = AclConfigLayer::default();
	merged.merge(AclConfigLayer::from_toml_file(&path)?);
	merged.merge(AclConfigLayer::from_env()?);
	let config = merged.finalize();
	debug!(
		superuser_role = ?config.superuser_role,
		skip_conditions = config.skip_conditions,
		default_action = %config.default_action,
		sql_placeholder = %config.sql_placeholder,
		"loaded acl config"
	);
	Ok(config)
}
