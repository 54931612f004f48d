// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed service lookup for service-backed subject resolvers.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ResolveError;

type Service = Arc<dyn Any + Send + Sync>;

/// Named services (repositories, clients) shared across requests.
///
/// A lookup for `key` also tries `services.<key>` and `repositories.<key>`.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
	services: Arc<HashMap<String, Service>>,
}

impl ServiceRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with<S>(mut self, key: impl Into<String>, service: Arc<S>) -> Self
	where
		S: Any + Send + Sync,
	{
		Arc::make_mut(&mut self.services).insert(key.into(), service);
		self
	}

	pub fn contains(&self, key: &str) -> bool {
		self.lookup(key).is_some()
	}

	pub fn get<S>(&self, key: &str) -> Result<Arc<S>, ResolveError>
	where
		S: Any + Send + Sync,
	{
		let service = self
			.lookup(key)
			.ok_or_else(|| ResolveError::ServiceNotFound(key.to_string()))?;
		Arc::clone(service)
			.downcast::<S>()
			.map_err(|_| ResolveError::ServiceType {
				key: key.to_string(),
				expected: type_name::<S>(),
			})
	}

	fn lookup(&self, key: &str) -> Option<&Service> {
		self.services
			.get(key)
			.or_else(|| self.services.get(&format!("services.{key}")))
			.or_else(|| self.services.get(&format!("repositories.{key}")))
	}
}

impl fmt::Debug for ServiceRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut keys: Vec<&String> = self.services.keys().collect();
		keys.sort();
		f.debug_struct("ServiceRegistry").field("keys", &keys).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, PartialEq)]
	struct TodoRepository(&'static str);

	#[test]
	fn finds_by_exact_and_prefixed_key() {
		let services = ServiceRegistry::new()
			.with("TodoRepository", Arc::new(TodoRepository("direct")))
			.with("repositories.UserRepository", Arc::new(TodoRepository("prefixed")));

		assert_eq!(
			*services.get::<TodoRepository>("TodoRepository").unwrap(),
			TodoRepository("direct")
		);
		assert_eq!(
			*services.get::<TodoRepository>("UserRepository").unwrap(),
			TodoRepository("prefixed")
		);
	}

	#[test]
	fn missing_service() {
		let err = ServiceRegistry::new().get::<TodoRepository>("Nope").unwrap_err();
		assert!(matches!(err, ResolveError::ServiceNotFound(key) if key == "Nope"));
	}

	#[test]
	fn wrong_type() {
		let services = ServiceRegistry::new().with("TodoRepository", Arc::new(42u32));
		let err = services.get::<TodoRepository>("TodoRepository").unwrap_err();
		assert!(matches!(err, ResolveError::ServiceType { .. }));
	}
}
