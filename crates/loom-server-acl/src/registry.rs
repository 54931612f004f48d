// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_acl_core::Permissions;

use crate::policy::EndpointPolicy;

/// Globally registered permission sources.
///
/// An endpoint without its own sources uses the `current` override when one
/// is bound, otherwise every registered source.
#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
	sources: Vec<Permissions>,
	current: Option<Vec<Permissions>>,
}

impl PermissionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a source, typically one per feature module.
	pub fn register(mut self, permissions: Permissions) -> Self {
		self.sources.push(permissions);
		self
	}

	/// Binds sources that replace the registered ones.
	pub fn with_current(mut self, permissions: Vec<Permissions>) -> Self {
		self.current = Some(permissions);
		self
	}

	pub fn sources(&self) -> &[Permissions] {
		&self.sources
	}

	/// Sources to build an ability from for `policy`.
	pub fn sources_for<'a>(&'a self, policy: &'a EndpointPolicy) -> &'a [Permissions] {
		policy
			.permissions
			.as_deref()
			.or(self.current.as_deref())
			.unwrap_or(&self.sources)
	}
}
