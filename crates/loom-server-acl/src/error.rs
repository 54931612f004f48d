// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::sync::Arc;

/// Error raised by an actor or subject resolver.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
	#[error("service not registered: {0}")]
	ServiceNotFound(String),

	#[error("service {key} is not a {expected}")]
	ServiceType { key: String, expected: &'static str },

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error(transparent)]
	Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ResolveError {
	pub fn other(message: impl Into<String>) -> Self {
		Self::Other(message.into().into())
	}
}

/// Errors surfaced by the authorization pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AclError {
	#[error("failed to resolve actor: {0}")]
	ActorResolution(#[source] ResolveError),

	/// Resolver failures are cached with the run, so the source is shared.
	#[error("failed to resolve subject '{name}': {source}")]
	SubjectResolution {
		name: String,
		#[source]
		source: Arc<ResolveError>,
	},

	#[error("not allowed to {action} {subject}{}", suffix(.reason))]
	NotAllowed {
		action: String,
		subject: String,
		reason: Option<String>,
	},

	#[error(transparent)]
	Config(#[from] ConfigError),
}

fn suffix(reason: &Option<String>) -> String {
	reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
}

/// Errors loading [`crate::config::AclConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },
}
