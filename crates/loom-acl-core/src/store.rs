// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ordered rule storage.
//!
//! Insertion order is evaluation priority: the most recently registered rule
//! wins. Lookups therefore return rules newest first.

use std::collections::HashMap;

use crate::actions::ALL;
use crate::rule::Rule;

#[derive(Debug, Clone, Default)]
pub struct RuleStore {
	rules: Vec<Rule>,
	by_subject: HashMap<String, Vec<usize>>,
}

impl RuleStore {
	pub fn new(rules: Vec<Rule>) -> Self {
		let mut by_subject: HashMap<String, Vec<usize>> = HashMap::new();
		for (index, rule) in rules.iter().enumerate() {
			by_subject.entry(rule.subject.clone()).or_default().push(index);
		}
		Self { rules, by_subject }
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// All rules in registration order.
	pub fn rules(&self) -> &[Rule] {
		&self.rules
	}

	/// Rules about `subject_type` (or `all`) for any action, newest first.
	pub fn possible_rules_for(&self, subject_type: &str) -> Vec<&Rule> {
		let mut indices: Vec<usize> = self
			.by_subject
			.get(subject_type)
			.into_iter()
			.chain(self.by_subject.get(ALL))
			.flatten()
			.copied()
			.collect();
		indices.sort_unstable_by(|a, b| b.cmp(a));
		indices.dedup();
		indices.into_iter().map(|i| &self.rules[i]).collect()
	}

	/// Rules applying to `action` on `subject_type`, newest first.
	pub fn rules_for(&self, action: &str, subject_type: &str) -> Vec<&Rule> {
		self.possible_rules_for(subject_type)
			.into_iter()
			.filter(|rule| rule.applies_to(action, subject_type))
			.collect()
	}
}

impl From<Vec<Rule>> for RuleStore {
	fn from(rules: Vec<Rule>) -> Self {
		Self::new(rules)
	}
}
