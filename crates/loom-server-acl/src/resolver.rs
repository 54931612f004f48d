// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Actor and subject resolution.
//!
//! Subject resolvers are named. Within one request each runs at most once:
//! [`ResolvedSubjects`] caches the outcome, failures included, the first time
//! a name is asked for.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use loom_acl_core::Actor;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::context::{AuthContext, RequestContext};
use crate::error::{AclError, ResolveError};

/// Name under which the first registered resolver is also reachable.
pub const PRIMARY_SUBJECT: &str = "subject";

/// Finds the authenticated actor for a request.
#[async_trait]
pub trait ActorResolver: Send + Sync {
	async fn resolve(&self, request: &RequestContext) -> Result<Option<Actor>, ResolveError>;
}

/// Reads the [`Actor`] the authentication layer put in the request
/// extensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionActorResolver;

#[async_trait]
impl ActorResolver for ExtensionActorResolver {
	async fn resolve(&self, request: &RequestContext) -> Result<Option<Actor>, ResolveError> {
		Ok(request.extensions().get::<Actor>().cloned())
	}
}

/// Loads a subject instance for the current request.
///
/// `Ok(None)` means "not found" and is left to the endpoint to report.
#[async_trait]
pub trait ResolveSubject: Send + Sync {
	async fn resolve(&self, ctx: &AuthContext) -> Result<Option<Value>, ResolveError>;
}

/// Shareable handle to a [`ResolveSubject`] implementation.
#[derive(Clone)]
pub struct SubjectResolver(Arc<dyn ResolveSubject>);

impl SubjectResolver {
	pub fn new<R>(resolver: R) -> Self
	where
		R: ResolveSubject + 'static,
	{
		Self(Arc::new(resolver))
	}

	/// Resolver from an async closure over the request context.
	pub fn from_fn<F, Fut>(f: F) -> Self
	where
		F: Fn(AuthContext) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Option<Value>, ResolveError>> + Send + 'static,
	{
		Self::new(FnResolver(f))
	}

	/// Resolver that looks up service `key` in the
	/// [`ServiceRegistry`](crate::ServiceRegistry) and hands it to `f`.
	pub fn with_service<S, F, Fut>(key: impl Into<String>, f: F) -> Self
	where
		S: Send + Sync + 'static,
		F: Fn(Arc<S>, AuthContext) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Option<Value>, ResolveError>> + Send + 'static,
	{
		Self::new(ServiceResolver {
			key: key.into(),
			f,
			_service: PhantomData,
		})
	}

	pub async fn resolve(&self, ctx: &AuthContext) -> Result<Option<Value>, ResolveError> {
		self.0.resolve(ctx).await
	}
}

impl fmt::Debug for SubjectResolver {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SubjectResolver")
	}
}

struct FnResolver<F>(F);

#[async_trait]
impl<F, Fut> ResolveSubject for FnResolver<F>
where
	F: Fn(AuthContext) -> Fut + Send + Sync,
	Fut: Future<Output = Result<Option<Value>, ResolveError>> + Send + 'static,
{
	async fn resolve(&self, ctx: &AuthContext) -> Result<Option<Value>, ResolveError> {
		(self.0)(ctx.clone()).await
	}
}

struct ServiceResolver<S, F> {
	key: String,
	f: F,
	_service: PhantomData<fn() -> S>,
}

#[async_trait]
impl<S, F, Fut> ResolveSubject for ServiceResolver<S, F>
where
	S: Send + Sync + 'static,
	F: Fn(Arc<S>, AuthContext) -> Fut + Send + Sync,
	Fut: Future<Output = Result<Option<Value>, ResolveError>> + Send + 'static,
{
	async fn resolve(&self, ctx: &AuthContext) -> Result<Option<Value>, ResolveError> {
		let service = ctx.services.get::<S>(&self.key)?;
		(self.f)(service, ctx.clone()).await
	}
}

type Outcome = Result<Option<Value>, Arc<ResolveError>>;

struct Entry {
	name: String,
	resolver: SubjectResolver,
	outcome: OnceCell<Outcome>,
}

/// Per-request cache of subject resolver outcomes.
pub struct ResolvedSubjects {
	ctx: AuthContext,
	entries: Vec<Entry>,
}

impl ResolvedSubjects {
	pub fn new(ctx: AuthContext, resolvers: &[(String, SubjectResolver)]) -> Self {
		let entries = resolvers
			.iter()
			.map(|(name, resolver)| Entry {
				name: name.clone(),
				resolver: resolver.clone(),
				outcome: OnceCell::new(),
			})
			.collect();
		Self { ctx, entries }
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(|e| e.name.as_str())
	}

	/// Whether `name` has already run.
	pub fn is_resolved(&self, name: &str) -> bool {
		self.entry(name)
			.map(|e| e.outcome.initialized())
			.unwrap_or(false)
	}

	/// The subject resolved under `name`, running its resolver on first use.
	///
	/// `Ok(None)` for an unknown name or a resolver that found nothing.
	pub async fn get(&self, name: &str) -> Result<Option<&Value>, AclError> {
		match self.entry(name) {
			Some(entry) => self.run(entry).await,
			None => Ok(None),
		}
	}

	/// The subject of the first registered resolver.
	pub async fn primary(&self) -> Result<Option<&Value>, AclError> {
		match self.entries.first() {
			Some(entry) => self.run(entry).await,
			None => Ok(None),
		}
	}

	/// Runs every resolver that has not run yet, concurrently.
	pub async fn resolve_all(&self) -> Result<(), AclError> {
		try_join_all(self.entries.iter().map(|entry| self.run(entry))).await?;
		Ok(())
	}

	fn entry(&self, name: &str) -> Option<&Entry> {
		self.entries
			.iter()
			.find(|e| e.name == name)
			.or_else(|| (name == PRIMARY_SUBJECT).then(|| self.entries.first()).flatten())
	}

	#[instrument(level = "debug", skip(self, entry), fields(subject = %entry.name))]
	async fn run<'s>(&'s self, entry: &'s Entry) -> Result<Option<&'s Value>, AclError> {
		let outcome = entry
			.outcome
			.get_or_init(|| async {
				debug!("running subject resolver");
				entry.resolver.resolve(&self.ctx).await.map_err(Arc::new)
			})
			.await;
		match outcome {
			Ok(value) => Ok(value.as_ref()),
			Err(source) => Err(AclError::SubjectResolution {
				name: entry.name.clone(),
				source: Arc::clone(source),
			}),
		}
	}
}

impl fmt::Debug for ResolvedSubjects {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResolvedSubjects")
			.field("names", &self.names().collect::<Vec<_>>())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::ServiceRegistry;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn ctx(id: &str) -> AuthContext {
		AuthContext::new(
			Arc::new(RequestContext::new().with_param("id", id)),
			ServiceRegistry::new(),
			Actor::new("tom"),
		)
	}

	fn counting(calls: Arc<AtomicUsize>) -> SubjectResolver {
		SubjectResolver::from_fn(move |ctx| {
			let calls = Arc::clone(&calls);
			async move {
				calls.fetch_add(1, Ordering::SeqCst);
				Ok(ctx.param("id").map(|id| json!({ "id": id, "userId": "tom" })))
			}
		})
	}

	#[tokio::test]
	async fn resolver_runs_once() {
		let calls = Arc::new(AtomicUsize::new(0));
		let subjects = ResolvedSubjects::new(ctx("7"), &[("todo".into(), counting(Arc::clone(&calls)))]);

		assert!(!subjects.is_resolved("todo"));
		let first = subjects.get("todo").await.unwrap().cloned();
		let again = subjects.primary().await.unwrap().cloned();
		subjects.resolve_all().await.unwrap();

		assert_eq!(first, Some(json!({ "id": "7", "userId": "tom" })));
		assert_eq!(first, again);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(subjects.is_resolved(PRIMARY_SUBJECT));
	}

	#[tokio::test]
	async fn first_resolver_is_primary() {
		let subjects = ResolvedSubjects::new(
			ctx("1"),
			&[
				("a".into(), SubjectResolver::from_fn(|_| async { Ok(Some(json!("a"))) })),
				("b".into(), SubjectResolver::from_fn(|_| async { Ok(Some(json!("b"))) })),
			],
		);
		assert_eq!(subjects.primary().await.unwrap(), Some(&json!("a")));
		assert_eq!(subjects.get(PRIMARY_SUBJECT).await.unwrap(), Some(&json!("a")));
		assert_eq!(subjects.get("b").await.unwrap(), Some(&json!("b")));
		assert_eq!(subjects.get("c").await.unwrap(), None);
	}

	#[tokio::test]
	async fn failures_are_cached_and_named() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let failing = SubjectResolver::from_fn(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			async { Err(ResolveError::other("store offline")) }
		});
		let subjects = ResolvedSubjects::new(ctx("1"), &[("todo".into(), failing)]);

		for _ in 0..2 {
			let err = subjects.get("todo").await.unwrap_err();
			assert!(matches!(err, AclError::SubjectResolution { ref name, .. } if name == "todo"));
		}
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn service_backed_resolver() {
		struct Todos;
		impl Todos {
			fn find(&self, id: &str) -> Option<Value> {
				(id == "7").then(|| json!({ "id": 7, "userId": "tom" }))
			}
		}

		let resolver = SubjectResolver::with_service::<Todos, _, _>("TodoRepository", |todos, ctx| async move {
			Ok(ctx.param("id").and_then(|id| todos.find(id)))
		});
		let services = ServiceRegistry::new().with("repositories.TodoRepository", Arc::new(Todos));
		let auth = AuthContext::new(
			Arc::new(RequestContext::new().with_param("id", "7")),
			services,
			Actor::new("tom"),
		);
		assert_eq!(
			resolver.resolve(&auth).await.unwrap(),
			Some(json!({ "id": 7, "userId": "tom" }))
		);

		let missing = ResolvedSubjects::new(ctx("7"), &[("todo".into(), resolver)]);
		let err = missing.primary().await.unwrap_err();
		let AclError::SubjectResolution { source, .. } = err else {
			panic!("expected a subject resolution error");
		};
		assert!(matches!(*source, ResolveError::ServiceNotFound(_)));
	}

	#[tokio::test]
	async fn extension_actor_resolver() {
		let request = RequestContext::new().with_actor(Actor::new("tom"));
		let actor = ExtensionActorResolver.resolve(&request).await.unwrap();
		assert_eq!(actor.map(|a| a.id), Some("tom".to_string()));
		assert!(ExtensionActorResolver
			.resolve(&RequestContext::new())
			.await
			.unwrap()
			.is_none());
	}
}
