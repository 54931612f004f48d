// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Compiles the rules for one action and subject type into a storage filter.
//!
//! Rules are visited newest first, the same order the evaluator uses:
//!
//! - a conditioned allow adds a disjunct;
//! - a conditioned deny adds a conjoined `NOT`;
//! - an unconditioned allow stops the scan and leaves only the denies seen
//!   so far;
//! - an unconditioned deny stops the scan.
//!
//! With no allow disjunct and no unconditioned allow the result is
//! [`QueryFilter::Forbidden`]. The filter is built once as an [`Expr`] tree
//! and rendered by [`sql`] and [`mongo`].
//!
//! The filter never admits an instance the evaluator would deny. It can be
//! narrower: a deny registered before an allow is still subtracted.

pub mod mongo;
pub mod sql;

use serde_json::Value;
use tracing::debug;

use crate::ability::Ability;
use crate::condition::{Expr, Fields};

pub use sql::{Placeholder, Residual, SqlFragment, SqlOptions};

/// Compiled restriction for one action and subject type.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
	/// Nothing is permitted.
	Forbidden,
	/// Permitted when some `allow` disjunct holds (or `allow` is `None`,
	/// meaning unrestricted) and no `deny` conjunct holds.
	Where {
		allow: Option<Vec<Expr>>,
		deny: Vec<Expr>,
	},
}

impl QueryFilter {
	/// No filter needed: every instance is permitted.
	pub fn is_unrestricted(&self) -> bool {
		matches!(self, QueryFilter::Where { allow: None, deny } if deny.is_empty())
	}

	pub fn is_forbidden(&self) -> bool {
		matches!(self, QueryFilter::Forbidden)
	}

	/// The filter as a single expression tree.
	pub fn to_expr(&self) -> Expr {
		match self {
			QueryFilter::Forbidden => Expr::never(),
			QueryFilter::Where { allow, deny } => {
				let mut parts = Vec::with_capacity(deny.len() + 1);
				if let Some(allow) = allow {
					parts.push(collapse_or(allow.clone()));
				}
				parts.extend(deny.iter().cloned().map(Expr::negate));
				if parts.len() == 1 {
					parts.remove(0)
				} else {
					Expr::And(parts)
				}
			}
		}
	}
}

fn collapse_or(mut children: Vec<Expr>) -> Expr {
	if children.len() == 1 {
		children.remove(0)
	} else {
		Expr::Or(children)
	}
}

/// Conditions of the rules relevant to one action and subject type, ready to
/// be evaluated in memory or pushed down to a data store.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionsQuery {
	action: String,
	subject: String,
	filter: QueryFilter,
	sources: Vec<Fields>,
}

impl ConditionsQuery {
	/// A query that permits every instance.
	pub fn unrestricted(action: impl Into<String>, subject: impl Into<String>) -> Self {
		Self {
			action: action.into(),
			subject: subject.into(),
			filter: QueryFilter::Where {
				allow: None,
				deny: Vec::new(),
			},
			sources: Vec::new(),
		}
	}

	pub fn action(&self) -> &str {
		&self.action
	}

	pub fn subject(&self) -> &str {
		&self.subject
	}

	pub fn filter(&self) -> &QueryFilter {
		&self.filter
	}

	/// Raw condition maps that contributed to the filter, newest first.
	pub fn rules(&self) -> &[Fields] {
		&self.sources
	}

	pub fn is_unrestricted(&self) -> bool {
		self.filter.is_unrestricted()
	}

	pub fn is_forbidden(&self) -> bool {
		self.filter.is_forbidden()
	}

	/// The rule-algebra tree both renderers work from.
	pub fn to_ast(&self) -> Expr {
		self.filter.to_expr()
	}

	/// `$n`-numbered SQL predicate.
	pub fn to_sql(&self) -> SqlFragment {
		self.to_sql_with(&SqlOptions::default())
	}

	pub fn to_sql_with(&self, options: &SqlOptions) -> SqlFragment {
		sql::render(&self.filter.to_expr(), options)
	}

	/// Mongo-style filter document.
	pub fn to_mongo(&self) -> Value {
		mongo::render(&self.filter)
	}

	/// Whether an instance passes the filter.
	pub fn matches(&self, fields: &Fields) -> bool {
		self.filter.to_expr().matches(fields)
	}
}

/// Compiles `ability`'s rules for `action` on `subject_type`.
///
/// Returns `None` when no rule applies.
pub fn compile(ability: &Ability, action: &str, subject_type: &str) -> Option<ConditionsQuery> {
	let rules = ability.rules_for(action, subject_type);
	if rules.is_empty() {
		return None;
	}

	let mut allow = Vec::new();
	let mut deny = Vec::new();
	let mut sources = Vec::new();
	let mut unrestricted = false;

	for rule in rules {
		let conditions = rule
			.conditions
			.as_ref()
			.filter(|_| !ability.skip_conditions());
		match (conditions, rule.inverted) {
			(Some(conditions), false) => {
				allow.push(conditions.expr().clone());
				sources.push(conditions.raw().clone());
			}
			(Some(conditions), true) => {
				deny.push(conditions.expr().clone());
				sources.push(conditions.raw().clone());
			}
			(None, false) => {
				unrestricted = true;
				break;
			}
			(None, true) => break,
		}
	}

	let filter = if unrestricted {
		QueryFilter::Where { allow: None, deny }
	} else if allow.is_empty() {
		QueryFilter::Forbidden
	} else {
		QueryFilter::Where {
			allow: Some(allow),
			deny,
		}
	};

	debug!(
		action,
		subject = subject_type,
		forbidden = filter.is_forbidden(),
		unrestricted = filter.is_unrestricted(),
		conditions = sources.len(),
		"compiled conditions"
	);

	Some(ConditionsQuery {
		action: action.to_string(),
		subject: subject_type.to_string(),
		filter,
		sources,
	})
}
