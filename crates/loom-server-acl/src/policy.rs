// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_acl_core::Permissions;

use crate::resolver::SubjectResolver;

/// Authorization metadata attached to one protected endpoint.
#[derive(Debug, Clone)]
pub struct EndpointPolicy {
	/// `None` uses the configured default action.
	pub action: Option<String>,
	pub subject: String,
	/// Named resolvers in registration order. The first is the primary
	/// subject.
	pub resolvers: Vec<(String, SubjectResolver)>,
	/// Permission sources bound to this endpoint. `None` falls back to the
	/// registry.
	pub permissions: Option<Vec<Permissions>>,
}

impl EndpointPolicy {
	pub fn new(action: impl Into<String>, subject: impl Into<String>) -> Self {
		Self {
			action: Some(action.into()),
			subject: subject.into(),
			resolvers: Vec::new(),
			permissions: None,
		}
	}

	/// Policy that uses the default action.
	pub fn for_subject(subject: impl Into<String>) -> Self {
		Self {
			action: None,
			..Self::new("", subject)
		}
	}

	pub fn with_resolver(mut self, name: impl Into<String>, resolver: SubjectResolver) -> Self {
		self.resolvers.push((name.into(), resolver));
		self
	}

	pub fn with_permissions(mut self, permissions: Vec<Permissions>) -> Self {
		self.permissions = Some(permissions);
		self
	}

	pub fn action_or<'a>(&'a self, default: &'a str) -> &'a str {
		self.action.as_deref().unwrap_or(default)
	}
}
