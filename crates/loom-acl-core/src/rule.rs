// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::actions::{ALL, MANAGE};
use crate::condition::Conditions;
use crate::subject::Subject;

/// One `can` / `cannot` grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
	pub action: String,
	pub subject: String,
	/// `true` for `cannot`.
	#[serde(default)]
	pub inverted: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub conditions: Option<Conditions>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

impl Rule {
	pub fn allow(action: impl Into<String>, subject: impl Into<String>) -> Self {
		Self {
			action: action.into(),
			subject: subject.into(),
			inverted: false,
			conditions: None,
			reason: None,
		}
	}

	pub fn deny(action: impl Into<String>, subject: impl Into<String>) -> Self {
		Self {
			inverted: true,
			..Self::allow(action, subject)
		}
	}

	/// Attaches conditions. An empty condition map is the same as none.
	pub fn with_conditions(mut self, conditions: Conditions) -> Self {
		self.conditions = (!conditions.is_empty()).then_some(conditions);
		self
	}

	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());
		self
	}

	pub fn has_conditions(&self) -> bool {
		self.conditions.is_some()
	}

	/// Whether the rule is about this action and subject type, honouring the
	/// `manage` and `all` wildcards.
	pub fn applies_to(&self, action: &str, subject_type: &str) -> bool {
		(self.action == action || self.action == MANAGE)
			&& (self.subject == subject_type || self.subject == ALL)
	}

	/// Whether the rule decides a check on `subject`.
	///
	/// A conditioned rule cannot be verified without an instance, so it never
	/// matches a type-level subject unless conditions are being skipped.
	pub fn matches(&self, subject: &Subject<'_>, skip_conditions: bool) -> bool {
		match (&self.conditions, subject.fields()) {
			(None, _) => true,
			(Some(_), _) if skip_conditions => true,
			(Some(_), None) => false,
			(Some(conditions), Some(fields)) => conditions.matches(fields),
		}
	}
}
