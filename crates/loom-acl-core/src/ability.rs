// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rule evaluation.
//!
//! An [`Ability`] answers point-in-time questions against an immutable
//! [`RuleStore`]. Rules are scanned newest first and the first one that
//! matches decides; with no matching rule the answer is deny.
//!
//! Type-level checks never grant on conditioned rules: a condition cannot be
//! verified without an instance. [`Ability::coarse_check`] reports when an
//! instance is needed to decide.

use std::sync::Arc;

use tracing::trace;

use crate::query::{self, ConditionsQuery};
use crate::rule::Rule;
use crate::store::RuleStore;
use crate::subject::Subject;

/// Outcome of a type-level check that knows about conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoarseCheck {
	/// No rule applies to the action and subject type.
	NoRules,
	/// Decided without an instance.
	Conclusive(bool),
	/// A conditioned rule could change the outcome for some instance.
	NeedsInstance,
}

/// Immutable, shareable rule set for one actor.
#[derive(Debug, Clone, Default)]
pub struct Ability {
	store: Arc<RuleStore>,
	skip_conditions: bool,
}

impl Ability {
	pub fn new(rules: Vec<Rule>) -> Self {
		Self {
			store: Arc::new(RuleStore::new(rules)),
			skip_conditions: false,
		}
	}

	/// When set, conditioned rules match every subject.
	pub fn with_skip_conditions(mut self, skip_conditions: bool) -> Self {
		self.skip_conditions = skip_conditions;
		self
	}

	pub fn skip_conditions(&self) -> bool {
		self.skip_conditions
	}

	pub fn store(&self) -> &RuleStore {
		&self.store
	}

	/// All rules in registration order.
	pub fn rules(&self) -> &[Rule] {
		self.store.rules()
	}

	/// Rules applying to `action` on `subject_type`, newest first.
	pub fn rules_for(&self, action: &str, subject_type: &str) -> Vec<&Rule> {
		self.store.rules_for(action, subject_type)
	}

	/// The rule that decides `action` on `subject`, if any.
	pub fn relevant_rule_for<'s>(&self, action: &str, subject: impl Into<Subject<'s>>) -> Option<&Rule> {
		let subject = subject.into();
		self.store
			.rules_for(action, subject.subject_type())
			.into_iter()
			.find(|rule| rule.matches(&subject, self.skip_conditions))
	}

	pub fn can<'s>(&self, action: &str, subject: impl Into<Subject<'s>>) -> bool {
		let subject = subject.into();
		let allowed = self
			.relevant_rule_for(action, subject)
			.map(|rule| !rule.inverted)
			.unwrap_or(false);
		trace!(
			action,
			subject = subject.subject_type(),
			instance = subject.fields().is_some(),
			allowed,
			"evaluated"
		);
		allowed
	}

	pub fn cannot<'s>(&self, action: &str, subject: impl Into<Subject<'s>>) -> bool {
		!self.can(action, subject)
	}

	/// Type-level check that distinguishes "denied" from "cannot tell yet".
	///
	/// The first unconditioned rule (newest first) decides, unless a newer
	/// conditioned rule of the opposite polarity could override it for some
	/// instance. When every applicable rule is conditioned, the answer is a
	/// conclusive deny only if none of them allows.
	pub fn coarse_check(&self, action: &str, subject_type: &str) -> CoarseCheck {
		let rules = self.store.rules_for(action, subject_type);
		let Some(newest) = rules.first() else {
			return CoarseCheck::NoRules;
		};
		if self.skip_conditions {
			return CoarseCheck::Conclusive(!newest.inverted);
		}

		let mut conditioned_allow = false;
		let mut conditioned_deny = false;
		for rule in &rules {
			if rule.has_conditions() {
				if rule.inverted {
					conditioned_deny = true;
				} else {
					conditioned_allow = true;
				}
				continue;
			}
			let allowed = !rule.inverted;
			let contested = if allowed {
				conditioned_deny
			} else {
				conditioned_allow
			};
			return if contested {
				CoarseCheck::NeedsInstance
			} else {
				CoarseCheck::Conclusive(allowed)
			};
		}

		if conditioned_allow {
			CoarseCheck::NeedsInstance
		} else {
			CoarseCheck::Conclusive(false)
		}
	}

	/// Compiles the rules for `action` on `subject_type` into a query.
	///
	/// `None` when no rule applies.
	pub fn conditions_for(&self, action: &str, subject_type: &str) -> Option<ConditionsQuery> {
		query::compile(self, action, subject_type)
	}
}
