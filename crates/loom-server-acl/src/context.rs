// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request-scoped inputs to an authorization decision.

use std::collections::HashMap;
use std::sync::Arc;

use http::Extensions;
use loom_acl_core::Actor;

use crate::services::ServiceRegistry;

/// What the host framework knows about the current request.
///
/// `params` merges path and query parameters. `extensions` carries whatever
/// the authentication layer attached, typically the [`Actor`].
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
	params: HashMap<String, String>,
	extensions: Extensions,
}

impl RequestContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Takes the extensions of an incoming request.
	pub fn from_request<B>(request: &http::Request<B>) -> Self {
		Self {
			params: HashMap::new(),
			extensions: request.extensions().clone(),
		}
	}

	pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.params.insert(name.into(), value.into());
		self
	}

	pub fn with_actor(mut self, actor: Actor) -> Self {
		self.extensions.insert(actor);
		self
	}

	pub fn param(&self, name: &str) -> Option<&str> {
		self.params.get(name).map(String::as_str)
	}

	pub fn params(&self) -> &HashMap<String, String> {
		&self.params
	}

	pub fn extensions(&self) -> &Extensions {
		&self.extensions
	}

	pub fn extensions_mut(&mut self) -> &mut Extensions {
		&mut self.extensions
	}
}

/// Everything a subject resolver may look at.
///
/// Cheap to clone: the request and the service registry are shared.
#[derive(Debug, Clone)]
pub struct AuthContext {
	pub request: Arc<RequestContext>,
	pub services: ServiceRegistry,
	pub actor: Actor,
}

impl AuthContext {
	pub fn new(request: Arc<RequestContext>, services: ServiceRegistry, actor: Actor) -> Self {
		Self {
			request,
			services,
			actor,
		}
	}

	/// Shorthand for `self.request.param(name)`.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.request.param(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn from_request_copies_extensions() {
		let mut request = http::Request::new(());
		request.extensions_mut().insert(Actor::new("tom"));

		let ctx = RequestContext::from_request(&request).with_param("id", "7");
		assert_eq!(ctx.extensions().get::<Actor>(), Some(&Actor::new("tom")));
		assert_eq!(ctx.param("id"), Some("7"));
		assert_eq!(ctx.param("missing"), None);
	}
}
