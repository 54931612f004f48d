// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The per-request authorization decision.
//!
//! ```text
//! resolve actor ── none ──────────────────────────────▶ ABSTAIN
//!      │
//! superuser? ── yes ──────────────────────────────────▶ ALLOW
//!      │
//! build ability, coarse check
//!      ├── no rules ──────────────────────────────────▶ ABSTAIN
//!      ├── conclusive ────────────────────────────────▶ ALLOW / ABSTAIN
//!      └── needs instance
//!             ├── resolver yields instance, fine check ▶ ALLOW / ABSTAIN
//!             └── no instance ────────────────────────▶ coarse fallback
//! ```
//!
//! The coarse fallback allows with the compiled conditions attached, or
//! abstains when `abstain_without_instance` is configured. The core never
//! denies outright: mapping ABSTAIN to a status code is the caller's job.

use std::sync::Arc;

use loom_acl_core::{
	build_ability, Ability, Actor, BuildOptions, CoarseCheck, ConditionsQuery, Subject,
};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::able::{Able, AbilityAble, SuperuserAble};
use crate::config::AclConfig;
use crate::context::{AuthContext, RequestContext};
use crate::error::AclError;
use crate::policy::EndpointPolicy;
use crate::registry::PermissionRegistry;
use crate::resolver::{ActorResolver, ExtensionActorResolver, ResolvedSubjects};
use crate::services::ServiceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
	Allow,
	Abstain,
}

/// Which step produced the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionBasis {
	NoActor,
	Superuser,
	NoRules,
	/// Decided from the subject type alone.
	TypeLevel,
	/// Decided against a resolved instance.
	Instance,
	/// An instance was needed but none was available.
	Unresolved,
}

/// Result of [`Authorizer::authorize`], handed to the endpoint.
#[derive(Debug, Clone)]
pub struct Authorization {
	decision: Decision,
	basis: DecisionBasis,
	action: String,
	subject_type: String,
	actor: Option<Actor>,
	able: Option<Arc<dyn Able>>,
	conditions: Option<ConditionsQuery>,
	reason: Option<String>,
	subjects: Option<Arc<ResolvedSubjects>>,
}

impl Authorization {
	fn no_actor(action: &str, subject_type: &str) -> Self {
		Self {
			decision: Decision::Abstain,
			basis: DecisionBasis::NoActor,
			action: action.to_string(),
			subject_type: subject_type.to_string(),
			actor: None,
			able: None,
			conditions: None,
			reason: None,
			subjects: None,
		}
	}

	pub fn decision(&self) -> Decision {
		self.decision
	}

	pub fn is_allowed(&self) -> bool {
		self.decision == Decision::Allow
	}

	pub fn basis(&self) -> DecisionBasis {
		self.basis
	}

	pub fn action(&self) -> &str {
		&self.action
	}

	pub fn subject_type(&self) -> &str {
		&self.subject_type
	}

	pub fn actor(&self) -> Option<&Actor> {
		self.actor.as_ref()
	}

	/// Capability handle for further checks in the endpoint.
	pub fn able(&self) -> Option<&dyn Able> {
		self.able.as_deref()
	}

	/// Compiled conditions for this endpoint's action and subject type.
	pub fn conditions(&self) -> Option<&ConditionsQuery> {
		self.conditions.as_ref()
	}

	/// Reason attached to the deny rule that decided, if any.
	pub fn reason(&self) -> Option<&str> {
		self.reason.as_deref()
	}

	/// The primary subject, resolving it now if the decision did not need it.
	pub async fn subject(&self) -> Result<Option<&Value>, AclError> {
		match &self.subjects {
			Some(subjects) => subjects.primary().await,
			None => Ok(None),
		}
	}

	pub async fn subject_named(&self, name: &str) -> Result<Option<&Value>, AclError> {
		match &self.subjects {
			Some(subjects) => subjects.get(name).await,
			None => Ok(None),
		}
	}

	/// `Err(NotAllowed)` unless the decision is ALLOW.
	pub fn ensure_allowed(&self) -> Result<(), AclError> {
		match self.decision {
			Decision::Allow => Ok(()),
			Decision::Abstain => Err(AclError::NotAllowed {
				action: self.action.clone(),
				subject: self.subject_type.clone(),
				reason: self.reason.clone(),
			}),
		}
	}

	/// Stores a copy in request extensions for extractor-style access.
	pub fn inject(&self, extensions: &mut http::Extensions) {
		extensions.insert(self.clone());
	}
}

/// Runs authorization decisions for endpoints.
pub struct Authorizer {
	config: AclConfig,
	registry: PermissionRegistry,
	services: ServiceRegistry,
	actor_resolver: Arc<dyn ActorResolver>,
}

impl Authorizer {
	/// Reads the actor from request extensions and resolves no services.
	pub fn new(config: AclConfig, registry: PermissionRegistry) -> Self {
		Self {
			config,
			registry,
			services: ServiceRegistry::new(),
			actor_resolver: Arc::new(ExtensionActorResolver),
		}
	}

	pub fn with_actor_resolver<R>(mut self, resolver: R) -> Self
	where
		R: ActorResolver + 'static,
	{
		self.actor_resolver = Arc::new(resolver);
		self
	}

	pub fn with_services(mut self, services: ServiceRegistry) -> Self {
		self.services = services;
		self
	}

	pub fn config(&self) -> &AclConfig {
		&self.config
	}

	/// Builds the ability `actor` would get for `policy`, skipping the
	/// superuser bypass.
	pub fn ability_for(&self, actor: &Actor, policy: &EndpointPolicy) -> Ability {
		build_ability(
			actor,
			self.registry.sources_for(policy),
			BuildOptions {
				skip_conditions: self.config.skip_conditions,
			},
		)
	}

	#[instrument(
		level = "debug",
		skip(self, request, policy),
		fields(action = %policy.action_or(&self.config.default_action), subject = %policy.subject)
	)]
	pub async fn authorize(
		&self,
		request: Arc<RequestContext>,
		policy: &EndpointPolicy,
	) -> Result<Authorization, AclError> {
		let action = policy.action_or(&self.config.default_action);
		let subject_type = policy.subject.as_str();

		let actor = self
			.actor_resolver
			.resolve(&request)
			.await
			.map_err(AclError::ActorResolution)?;
		let Some(actor) = actor else {
			debug!("no current actor");
			return Ok(Authorization::no_actor(action, subject_type));
		};

		let subjects = Arc::new(ResolvedSubjects::new(
			AuthContext::new(request, self.services.clone(), actor.clone()),
			&policy.resolvers,
		));

		if let Some(role) = &self.config.superuser_role {
			if actor.has_role(role) {
				debug!(actor = actor.display_name(), "superuser access granted");
				return Ok(Authorization {
					decision: Decision::Allow,
					basis: DecisionBasis::Superuser,
					action: action.to_string(),
					subject_type: subject_type.to_string(),
					able: Some(Arc::new(SuperuserAble::new(actor.clone()))),
					actor: Some(actor),
					conditions: Some(ConditionsQuery::unrestricted(action, subject_type)),
					reason: None,
					subjects: Some(subjects),
				});
			}
		}

		let ability = self.ability_for(&actor, policy);
		let conditions = ability.conditions_for(action, subject_type);
		debug!(
			actor = actor.display_name(),
			roles = ?actor.effective_roles(),
			rules = ability.rules_for(action, subject_type).len(),
			"built ability"
		);

		let (basis, allowed, reason) = match ability.coarse_check(action, subject_type) {
			CoarseCheck::NoRules => (DecisionBasis::NoRules, false, None),
			CoarseCheck::Conclusive(allowed) => {
				debug!(allowed, "decided by subject type");
				let reason = deny_reason(&ability, action, Subject::Type(subject_type));
				(DecisionBasis::TypeLevel, allowed, reason)
			}
			CoarseCheck::NeedsInstance => match subjects.primary().await? {
				Some(instance) => {
					let subject = Subject::from_value(subject_type, instance);
					let allowed = ability.can(action, subject);
					debug!(allowed, "decided by instance");
					(DecisionBasis::Instance, allowed, deny_reason(&ability, action, subject))
				}
				None => {
					let allowed = !self.config.abstain_without_instance;
					debug!(allowed, "instance needed but unavailable");
					(DecisionBasis::Unresolved, allowed, None)
				}
			},
		};

		Ok(Authorization {
			decision: if allowed {
				Decision::Allow
			} else {
				Decision::Abstain
			},
			basis,
			action: action.to_string(),
			subject_type: subject_type.to_string(),
			able: Some(Arc::new(AbilityAble::new(actor.clone(), ability))),
			actor: Some(actor),
			conditions,
			reason,
			subjects: Some(subjects),
		})
	}
}

fn deny_reason(ability: &Ability, action: &str, subject: Subject<'_>) -> Option<String> {
	ability
		.relevant_rule_for(action, subject)
		.filter(|rule| rule.inverted)
		.and_then(|rule| rule.reason.clone())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ResolveError;
	use crate::resolver::SubjectResolver;
	use async_trait::async_trait;
	use loom_acl_core::Permissions;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn todo_permissions() -> Permissions {
		Permissions::new()
			.everyone(|b, _| {
				b.can("read", "Todo");
			})
			.role("customer", |b, user| {
				b.can("create", "Todo");
				b.can_when("update", "Todo", json!({ "userId": user.id }));
			})
			.role("operator", |b, _| {
				b.can("read", "all");
				b.can("manage", "Todo");
				b.cannot("delete", "Todo").because("todos are kept for audit");
			})
	}

	fn authorizer(config: AclConfig) -> Authorizer {
		Authorizer::new(config, PermissionRegistry::new().register(todo_permissions()))
	}

	fn request(actor: Option<Actor>) -> Arc<RequestContext> {
		let ctx = RequestContext::new().with_param("id", "1");
		Arc::new(match actor {
			Some(actor) => ctx.with_actor(actor),
			None => ctx,
		})
	}

	fn user(id: &str, role: &str) -> Option<Actor> {
		Some(Actor::new(id).with_role(role))
	}

	fn todo_of(owner: &'static str, calls: Arc<AtomicUsize>) -> SubjectResolver {
		SubjectResolver::from_fn(move |ctx| {
			let calls = Arc::clone(&calls);
			async move {
				calls.fetch_add(1, Ordering::SeqCst);
				Ok(ctx.param("id").map(|id| json!({ "id": id, "userId": owner })))
			}
		})
	}

	mod pipeline {
		use super::*;

		#[tokio::test]
		async fn no_actor_abstains() {
			let auth = authorizer(AclConfig::default())
				.authorize(request(None), &EndpointPolicy::new("read", "Todo"))
				.await
				.unwrap();
			assert_eq!(auth.decision(), Decision::Abstain);
			assert_eq!(auth.basis(), DecisionBasis::NoActor);
			assert!(auth.able().is_none());
			assert!(matches!(auth.ensure_allowed(), Err(AclError::NotAllowed { .. })));
		}

		#[tokio::test]
		async fn superuser_bypasses_rules() {
			let config = AclConfig {
				superuser_role: Some("admin".into()),
				..Default::default()
			};
			let authorizer = Authorizer::new(config, PermissionRegistry::new());
			let auth = authorizer
				.authorize(request(user("tom", "admin")), &EndpointPolicy::new("delete", "Anything"))
				.await
				.unwrap();
			assert!(auth.is_allowed());
			assert_eq!(auth.basis(), DecisionBasis::Superuser);
			assert!(auth.able().unwrap().is_superuser());
			assert!(auth.conditions().unwrap().is_unrestricted());
		}

		#[tokio::test]
		async fn admin_without_superuser_config_gets_everyone_rules() {
			let authorizer = authorizer(AclConfig::default());
			let admin = user("tom", "admin");

			let read = authorizer
				.authorize(request(admin.clone()), &EndpointPolicy::new("read", "Todo"))
				.await
				.unwrap();
			assert!(read.is_allowed());
			assert_eq!(read.basis(), DecisionBasis::TypeLevel);

			let update = authorizer
				.authorize(request(admin), &EndpointPolicy::new("update", "Todo"))
				.await
				.unwrap();
			assert_eq!(update.decision(), Decision::Abstain);
			assert_eq!(update.basis(), DecisionBasis::NoRules);
		}

		#[tokio::test]
		async fn customer_updates_own_todo() {
			let calls = Arc::new(AtomicUsize::new(0));
			let policy = EndpointPolicy::new("update", "Todo")
				.with_resolver("todo", todo_of("tom", Arc::clone(&calls)));

			let auth = authorizer(AclConfig::default())
				.authorize(request(user("tom", "customer")), &policy)
				.await
				.unwrap();
			assert!(auth.is_allowed());
			assert_eq!(auth.basis(), DecisionBasis::Instance);

			let subject = auth.subject().await.unwrap().cloned();
			assert_eq!(subject, Some(json!({ "id": "1", "userId": "tom" })));
			assert_eq!(auth.subject_named("todo").await.unwrap().cloned(), subject);
			assert_eq!(calls.load(Ordering::SeqCst), 1);
		}

		#[tokio::test]
		async fn customer_cannot_update_other_users_todo() {
			let calls = Arc::new(AtomicUsize::new(0));
			let policy = EndpointPolicy::new("update", "Todo")
				.with_resolver("todo", todo_of("jerry", Arc::clone(&calls)));

			let auth = authorizer(AclConfig::default())
				.authorize(request(user("tom", "customer")), &policy)
				.await
				.unwrap();
			assert_eq!(auth.decision(), Decision::Abstain);
			assert_eq!(auth.basis(), DecisionBasis::Instance);
		}

		#[tokio::test]
		async fn conclusive_check_does_not_resolve() {
			let calls = Arc::new(AtomicUsize::new(0));
			let policy = EndpointPolicy::new("update", "Todo")
				.with_resolver("todo", todo_of("jerry", Arc::clone(&calls)));

			let auth = authorizer(AclConfig::default())
				.authorize(request(user("tom", "operator")), &policy)
				.await
				.unwrap();
			assert!(auth.is_allowed());
			assert_eq!(auth.basis(), DecisionBasis::TypeLevel);
			assert_eq!(calls.load(Ordering::SeqCst), 0);

			// Still available lazily, and only resolved once.
			auth.subject().await.unwrap();
			auth.subject().await.unwrap();
			assert_eq!(calls.load(Ordering::SeqCst), 1);
		}

		#[tokio::test]
		async fn deny_reason_is_reported() {
			let auth = authorizer(AclConfig::default())
				.authorize(request(user("tom", "operator")), &EndpointPolicy::new("delete", "Todo"))
				.await
				.unwrap();
			assert_eq!(auth.decision(), Decision::Abstain);
			assert_eq!(auth.reason(), Some("todos are kept for audit"));
			let err = auth.ensure_allowed().unwrap_err();
			assert_eq!(err.to_string(), "not allowed to delete Todo: todos are kept for audit");
		}

		#[tokio::test]
		async fn default_action_is_execute() {
			let reports = Permissions::new().role("analyst", |b, _| {
				b.can("execute", "Report");
			});
			let authorizer = Authorizer::new(AclConfig::default(), PermissionRegistry::new())
				.with_services(ServiceRegistry::new());
			let policy = EndpointPolicy::for_subject("Report").with_permissions(vec![reports]);

			let auth = authorizer
				.authorize(request(user("ann", "analyst")), &policy)
				.await
				.unwrap();
			assert!(auth.is_allowed());
			assert_eq!(auth.action(), "execute");
		}
	}

	mod unresolved {
		use super::*;

		#[tokio::test]
		async fn falls_back_to_conditions() {
			let auth = authorizer(AclConfig::default())
				.authorize(request(user("tom", "customer")), &EndpointPolicy::new("update", "Todo"))
				.await
				.unwrap();
			assert!(auth.is_allowed());
			assert_eq!(auth.basis(), DecisionBasis::Unresolved);

			let sql = auth.conditions().unwrap().to_sql();
			assert_eq!(sql.clause, r#""userId" = $1"#);
			assert_eq!(sql.params, vec![json!("tom")]);
			assert!(sql.residuals.is_empty());
		}

		#[tokio::test]
		async fn resolver_finding_nothing_falls_back() {
			let policy = EndpointPolicy::new("update", "Todo")
				.with_resolver("todo", SubjectResolver::from_fn(|_| async { Ok(None) }));
			let auth = authorizer(AclConfig::default())
				.authorize(request(user("tom", "customer")), &policy)
				.await
				.unwrap();
			assert!(auth.is_allowed());
			assert_eq!(auth.basis(), DecisionBasis::Unresolved);
			assert_eq!(auth.subject().await.unwrap(), None);
		}

		#[tokio::test]
		async fn can_be_configured_to_abstain() {
			let config = AclConfig {
				abstain_without_instance: true,
				..Default::default()
			};
			let auth = authorizer(config)
				.authorize(request(user("tom", "customer")), &EndpointPolicy::new("update", "Todo"))
				.await
				.unwrap();
			assert_eq!(auth.decision(), Decision::Abstain);
			assert_eq!(auth.basis(), DecisionBasis::Unresolved);
		}
	}

	mod failures {
		use super::*;

		struct BrokenSessions;

		#[async_trait]
		impl ActorResolver for BrokenSessions {
			async fn resolve(&self, _request: &RequestContext) -> Result<Option<Actor>, ResolveError> {
				Err(ResolveError::other("session store unavailable"))
			}
		}

		#[tokio::test]
		async fn actor_resolution_error_propagates() {
			let err = authorizer(AclConfig::default())
				.with_actor_resolver(BrokenSessions)
				.authorize(request(None), &EndpointPolicy::new("read", "Todo"))
				.await
				.unwrap_err();
			assert!(matches!(err, AclError::ActorResolution(_)));
		}

		#[tokio::test]
		async fn subject_resolution_error_propagates() {
			let policy = EndpointPolicy::new("update", "Todo").with_resolver(
				"todo",
				SubjectResolver::from_fn(|_| async { Err(ResolveError::other("db down")) }),
			);
			let err = authorizer(AclConfig::default())
				.authorize(request(user("tom", "customer")), &policy)
				.await
				.unwrap_err();
			assert!(matches!(err, AclError::SubjectResolution { ref name, .. } if name == "todo"));
		}
	}

	#[tokio::test]
	async fn authorization_can_be_injected() {
		let auth = authorizer(AclConfig::default())
			.authorize(request(user("tom", "customer")), &EndpointPolicy::new("read", "Todo"))
			.await
			.unwrap();
		let mut extensions = http::Extensions::new();
		auth.inject(&mut extensions);
		let injected = extensions.get::<Authorization>().unwrap();
		assert!(injected.is_allowed());
		assert!(injected.able().unwrap().can("create", "Todo".into()));
	}
}
