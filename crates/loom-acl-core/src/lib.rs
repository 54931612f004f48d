// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role-based capability rules for Loom.
//!
//! - [`Permissions`] map role names to handlers that register rules.
//! - [`build_ability`] turns an [`Actor`]'s roles into an [`Ability`].
//! - [`Ability::can`] evaluates a check against a subject type or instance.
//! - [`Ability::conditions_for`] compiles the relevant rules into a
//!   [`ConditionsQuery`] that renders as SQL or a Mongo-style filter.
//!
//! Everything here is synchronous and free of I/O. Request handling lives in
//! `loom-server-acl`.

pub mod ability;
pub mod actions;
pub mod actor;
pub mod condition;
pub mod permissions;
pub mod query;
pub mod rule;
pub mod store;
pub mod subject;

pub use ability::{Ability, CoarseCheck};
pub use actions::{Action, ALL, MANAGE};
pub use actor::Actor;
pub use condition::{Conditions, Expr, FieldOp, FieldPredicate, Fields};
pub use permissions::{
	build_ability, BuildOptions, DefinePermissions, Permissions, RuleBuilder, EVERY, EVERYONE,
};
pub use query::{ConditionsQuery, Placeholder, QueryFilter, Residual, SqlFragment, SqlOptions};
pub use rule::Rule;
pub use store::RuleStore;
pub use subject::Subject;
