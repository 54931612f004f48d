// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role-keyed permission definitions and the builder that turns them into an
//! [`Ability`].
//!
//! A [`Permissions`] source maps role names to handlers. Building an ability
//! for an actor visits, in order:
//!
//! 1. every source's `everyone` handler, then its `every` handler;
//! 2. each of the actor's roles, in declaration order, across all sources.
//!
//! Handlers register rules through a [`RuleBuilder`]. `extend(role)` splices
//! another role's rules in at the current position, which is how inheritance
//! is expressed:
//!
//! ```
//! use loom_acl_core::{build_ability, Actor, BuildOptions, Permissions};
//!
//! let permissions = Permissions::new()
//! 	.role("member", |b, _| {
//! 		b.can("read", "Todo");
//! 	})
//! 	.role("manager", |b, _| {
//! 		b.extend("member");
//! 		b.can("delete", "Todo");
//! 	});
//!
//! let actor = Actor::new("u1").with_role("manager");
//! let ability = build_ability(&actor, &[permissions], BuildOptions::default());
//! assert!(ability.can("read", "Todo"));
//! assert!(ability.can("delete", "Todo"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::ability::Ability;
use crate::actor::Actor;
use crate::condition::Conditions;
use crate::rule::Rule;

/// Handler applied to every actor.
pub const EVERYONE: &str = "everyone";

/// Alias of [`EVERYONE`].
pub const EVERY: &str = "every";

/// Registers rules for one role.
pub type DefinePermissions = Arc<dyn Fn(&mut RuleBuilder<'_>, &Actor) + Send + Sync>;

/// One permission definition source: a map from role name to handler.
#[derive(Clone, Default)]
pub struct Permissions {
	handlers: HashMap<String, DefinePermissions>,
}

impl Permissions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers the handler for `role`, replacing any previous one.
	pub fn role<F>(mut self, role: impl Into<String>, define: F) -> Self
	where
		F: Fn(&mut RuleBuilder<'_>, &Actor) + Send + Sync + 'static,
	{
		self.handlers.insert(role.into(), Arc::new(define));
		self
	}

	/// Shorthand for `role(EVERYONE, define)`.
	pub fn everyone<F>(self, define: F) -> Self
	where
		F: Fn(&mut RuleBuilder<'_>, &Actor) + Send + Sync + 'static,
	{
		self.role(EVERYONE, define)
	}

	pub fn handler(&self, role: &str) -> Option<&DefinePermissions> {
		self.handlers.get(role)
	}

	/// Registered role names, sorted.
	pub fn roles(&self) -> Vec<&str> {
		let mut roles: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
		roles.sort_unstable();
		roles
	}
}

impl fmt::Debug for Permissions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Permissions")
			.field("roles", &self.roles())
			.finish()
	}
}

/// Options for [`build_ability`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
	/// Treat every conditioned rule as matching. Useful for coarse gating
	/// when no instance will ever be available.
	pub skip_conditions: bool,
}

/// Collects rules while role handlers run.
pub struct RuleBuilder<'a> {
	actor: &'a Actor,
	sources: &'a [Permissions],
	rules: Vec<Rule>,
	last: Option<usize>,
	applying: Vec<String>,
}

impl<'a> RuleBuilder<'a> {
	fn new(actor: &'a Actor, sources: &'a [Permissions]) -> Self {
		Self {
			actor,
			sources,
			rules: Vec::new(),
			last: None,
			applying: Vec::new(),
		}
	}

	/// The actor the ability is being built for.
	pub fn actor(&self) -> &Actor {
		self.actor
	}

	pub fn can(&mut self, action: impl Into<String>, subject: impl Into<String>) -> &mut Self {
		self.push(Rule::allow(action, subject))
	}

	/// `can` restricted to instances matching `conditions`.
	///
	/// Conditions must be a JSON object. Anything else drops the rule, since
	/// granting it unconditionally would widen access.
	pub fn can_when(
		&mut self,
		action: impl Into<String>,
		subject: impl Into<String>,
		conditions: Value,
	) -> &mut Self {
		let rule = Rule::allow(action, subject);
		match Conditions::from_value(conditions) {
			Some(conditions) => self.push(rule.with_conditions(conditions)),
			None => {
				warn!(
					action = %rule.action,
					subject = %rule.subject,
					"ignoring allow rule with non-object conditions"
				);
				self.last = None;
				self
			}
		}
	}

	pub fn cannot(&mut self, action: impl Into<String>, subject: impl Into<String>) -> &mut Self {
		self.push(Rule::deny(action, subject))
	}

	/// `cannot` restricted to instances matching `conditions`.
	///
	/// Non-object conditions make the rule unconditional.
	pub fn cannot_when(
		&mut self,
		action: impl Into<String>,
		subject: impl Into<String>,
		conditions: Value,
	) -> &mut Self {
		let rule = Rule::deny(action, subject);
		match Conditions::from_value(conditions) {
			Some(conditions) => self.push(rule.with_conditions(conditions)),
			None => {
				warn!(
					action = %rule.action,
					subject = %rule.subject,
					"deny rule has non-object conditions, applying unconditionally"
				);
				self.push(rule)
			}
		}
	}

	/// Attaches a reason to the rule registered by the previous call.
	pub fn because(&mut self, reason: impl Into<String>) -> &mut Self {
		if let Some(rule) = self.last.and_then(|i| self.rules.get_mut(i)) {
			rule.reason = Some(reason.into());
		}
		self
	}

	/// Applies `role`'s handlers from every source at this position.
	pub fn extend(&mut self, role: &str) -> &mut Self {
		let sources = self.sources;
		self.apply(role, sources);
		self
	}

	fn push(&mut self, rule: Rule) -> &mut Self {
		self.last = Some(self.rules.len());
		self.rules.push(rule);
		self
	}

	fn apply(&mut self, role: &str, sources: &'a [Permissions]) {
		if self.applying.iter().any(|r| r == role) {
			warn!(role, chain = ?self.applying, "skipping cyclic extend");
			return;
		}
		self.applying.push(role.to_string());
		let actor = self.actor;
		let mut applied = false;
		for source in sources {
			if let Some(define) = source.handler(role) {
				(**define)(self, actor);
				applied = true;
			}
		}
		self.applying.pop();
		if !applied {
			debug!(role, "no permissions registered for role");
		}
	}

	fn into_rules(self) -> Vec<Rule> {
		self.rules
	}
}

/// Builds the rule set for `actor` from `sources`.
///
/// Unknown roles are skipped. An actor matching nothing gets an empty ability,
/// which denies everything.
#[instrument(
	level = "debug",
	skip(actor, sources, options),
	fields(actor_id = %actor.id, sources = sources.len())
)]
pub fn build_ability(actor: &Actor, sources: &[Permissions], options: BuildOptions) -> Ability {
	let mut builder = RuleBuilder::new(actor, sources);

	for source in sources {
		let single = std::slice::from_ref(source);
		builder.apply(EVERYONE, single);
		builder.apply(EVERY, single);
	}

	for role in actor.effective_roles() {
		builder.apply(role, sources);
	}

	let rules = builder.into_rules();
	debug!(
		rules = rules.len(),
		roles = ?actor.effective_roles(),
		skip_conditions = options.skip_conditions,
		"built ability"
	);
	Ability::new(rules).with_skip_conditions(options.skip_conditions)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn build(actor: &Actor, sources: &[Permissions]) -> Ability {
		build_ability(actor, sources, BuildOptions::default())
	}

	fn actions(ability: &Ability) -> Vec<String> {
		ability
			.rules()
			.iter()
			.map(|r| format!("{}{}:{}", if r.inverted { "!" } else { "" }, r.action, r.subject))
			.collect()
	}

	mod ordering {
		use super::*;

		#[test]
		fn everyone_then_every_per_source_then_roles() {
			let a = Permissions::new()
				.everyone(|b, _| {
					b.can("read", "A");
				})
				.role(EVERY, |b, _| {
					b.can("read", "B");
				})
				.role("member", |b, _| {
					b.can("create", "A");
				});
			let b = Permissions::new()
				.everyone(|b, _| {
					b.can("read", "C");
				})
				.role("member", |b, _| {
					b.can("create", "C");
				});

			let ability = build(&Actor::new("u1").with_role("member"), &[a, b]);
			assert_eq!(
				actions(&ability),
				vec!["read:A", "read:B", "read:C", "create:A", "create:C"]
			);
		}

		#[test]
		fn roles_apply_in_declaration_order() {
			let p = Permissions::new()
				.role("x", |b, _| {
					b.can("read", "X");
				})
				.role("y", |b, _| {
					b.cannot("read", "X");
				});

			let ability = build(&Actor::new("u1").with_roles(["x", "y"]), &[p.clone()]);
			assert!(!ability.can("read", "X"));

			let ability = build(&Actor::new("u1").with_roles(["y", "x"]), &[p]);
			assert!(ability.can("read", "X"));
		}

		#[test]
		fn extend_splices_at_call_position() {
			let p = Permissions::new()
				.role("customer", |b, _| {
					b.can("create", "Todo");
					b.can("delete", "Todo");
				})
				.role("operator", |b, _| {
					b.extend("customer");
					b.can("update", "Todo");
					b.cannot("delete", "Todo");
				});

			let ability = build(&Actor::new("u1").with_role("operator"), &[p]);
			assert_eq!(
				actions(&ability),
				vec!["create:Todo", "delete:Todo", "update:Todo", "!delete:Todo"]
			);
		}

		#[test]
		fn extend_visits_every_source() {
			let a = Permissions::new().role("member", |b, _| {
				b.can("read", "A");
			});
			let b = Permissions::new()
				.role("member", |b, _| {
					b.can("read", "B");
				})
				.role("manager", |b, _| {
					b.extend("member");
				});

			let ability = build(&Actor::new("u1").with_role("manager"), &[a, b]);
			assert_eq!(actions(&ability), vec!["read:A", "read:B"]);
		}
	}

	mod edge_cases {
		use super::*;

		#[test]
		fn cyclic_extend_is_skipped() {
			let p = Permissions::new()
				.role("a", |b, _| {
					b.can("read", "A");
					b.extend("b");
				})
				.role("b", |b, _| {
					b.can("read", "B");
					b.extend("a");
				});

			let ability = build(&Actor::new("u1").with_role("a"), &[p]);
			assert_eq!(actions(&ability), vec!["read:A", "read:B"]);
		}

		#[test]
		fn unknown_role_contributes_nothing() {
			let p = Permissions::new().role("member", |b, _| {
				b.can("read", "A");
			});
			let ability = build(&Actor::new("u1").with_role("ghost"), &[p]);
			assert!(ability.rules().is_empty());
		}

		#[test]
		fn handlers_see_the_actor() {
			let p = Permissions::new().role("member", |b, user| {
				b.can_when("update", "Todo", json!({ "userId": user.id }));
			});
			let ability = build(&Actor::new("tom").with_role("member"), &[p]);
			let conditions = ability.rules()[0].conditions.as_ref().unwrap();
			assert_eq!(conditions.raw().get("userId"), Some(&json!("tom")));
		}

		#[test]
		fn non_object_conditions() {
			let p = Permissions::new().role("member", |b, _| {
				b.can_when("read", "A", json!("nope")).because("dropped");
				b.cannot_when("read", "B", json!(42));
			});
			let ability = build(&Actor::new("u1").with_role("member"), &[p]);
			assert_eq!(actions(&ability), vec!["!read:B"]);
			assert!(!ability.rules()[0].has_conditions());
			assert!(ability.rules()[0].reason.is_none());
		}

		#[test]
		fn because_annotates_last_rule() {
			let p = Permissions::new().role("member", |b, _| {
				b.can("read", "A");
				b.cannot("delete", "A").because("archived");
			});
			let ability = build(&Actor::new("u1").with_role("member"), &[p]);
			assert_eq!(ability.rules()[0].reason, None);
			assert_eq!(ability.rules()[1].reason.as_deref(), Some("archived"));
		}

		#[test]
		fn no_sources_no_rules() {
			let ability = build(&Actor::new("u1").with_role("member"), &[]);
			assert!(ability.rules().is_empty());
			assert!(!ability.can("read", "A"));
		}

		#[test]
		fn debug_lists_roles() {
			let p = Permissions::new()
				.role("b", |_, _| {})
				.everyone(|_, _| {});
			assert_eq!(format!("{p:?}"), r#"Permissions { roles: ["b", "everyone"] }"#);
		}
	}
}
