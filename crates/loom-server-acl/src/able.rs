// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Capability handles exposed to endpoint code after a decision.

use std::fmt;

use loom_acl_core::{Ability, Actor, ConditionsQuery, Subject};

/// What an endpoint may ask about the current actor.
pub trait Able: Send + Sync + fmt::Debug {
	fn user(&self) -> &Actor;

	fn can(&self, action: &str, subject: Subject<'_>) -> bool;

	fn cannot(&self, action: &str, subject: Subject<'_>) -> bool {
		!self.can(action, subject)
	}

	/// Compiled conditions for `action` on `subject_type`, `None` when no
	/// rule applies.
	fn conditions_for(&self, action: &str, subject_type: &str) -> Option<ConditionsQuery>;

	fn is_superuser(&self) -> bool {
		false
	}
}

/// Handle backed by a built [`Ability`].
#[derive(Debug, Clone)]
pub struct AbilityAble {
	user: Actor,
	ability: Ability,
}

impl AbilityAble {
	pub fn new(user: Actor, ability: Ability) -> Self {
		Self { user, ability }
	}

	pub fn ability(&self) -> &Ability {
		&self.ability
	}
}

impl Able for AbilityAble {
	fn user(&self) -> &Actor {
		&self.user
	}

	fn can(&self, action: &str, subject: Subject<'_>) -> bool {
		self.ability.can(action, subject)
	}

	fn conditions_for(&self, action: &str, subject_type: &str) -> Option<ConditionsQuery> {
		self.ability.conditions_for(action, subject_type)
	}
}

/// Handle for actors holding the superuser role: everything is allowed and
/// nothing is filtered.
#[derive(Debug, Clone)]
pub struct SuperuserAble {
	user: Actor,
}

impl SuperuserAble {
	pub fn new(user: Actor) -> Self {
		Self { user }
	}
}

impl Able for SuperuserAble {
	fn user(&self) -> &Actor {
		&self.user
	}

	fn can(&self, _action: &str, _subject: Subject<'_>) -> bool {
		true
	}

	fn conditions_for(&self, action: &str, subject_type: &str) -> Option<ConditionsQuery> {
		Some(ConditionsQuery::unrestricted(action, subject_type))
	}

	fn is_superuser(&self) -> bool {
		true
	}
}
