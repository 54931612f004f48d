// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

/// The authenticated user a rule set is built for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub roles: Option<Vec<String>>,
}

impl Actor {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			..Default::default()
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_role(mut self, role: impl Into<String>) -> Self {
		self.role = Some(role.into());
		self
	}

	pub fn with_roles<I, R>(mut self, roles: I) -> Self
	where
		I: IntoIterator<Item = R>,
		R: Into<String>,
	{
		self.roles = Some(roles.into_iter().map(Into::into).collect());
		self
	}

	/// `roles` when present, otherwise `role`, otherwise nothing.
	pub fn effective_roles(&self) -> Vec<&str> {
		match (&self.roles, &self.role) {
			(Some(roles), _) => roles.iter().map(String::as_str).collect(),
			(None, Some(role)) => vec![role.as_str()],
			(None, None) => Vec::new(),
		}
	}

	pub fn has_role(&self, role: &str) -> bool {
		self.effective_roles().contains(&role)
	}

	/// Name for log lines, falling back to the id.
	pub fn display_name(&self) -> &str {
		self.name.as_deref().unwrap_or(&self.id)
	}
}
