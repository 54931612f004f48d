// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The member/manager/admin permission set and its sample users.

use loom_acl_core::{Action, Actor, Permissions, ALL};
use serde_json::{json, Value};

pub const USER: &str = "User";

pub const ROLES: [&str; 3] = ["member", "manager", "admin"];

pub const ACTIONS: [Action; 5] = [
	Action::Create,
	Action::Read,
	Action::Update,
	Action::Delete,
	Action::Execute,
];

pub fn permissions() -> Permissions {
	Permissions::new()
		.role("member", |b, user| {
			b.can_when(Action::Create, USER, json!({ "role": "member" }));
			b.can_when(Action::Read, USER, json!({ "id": user.id }));
			b.can_when(Action::Update, USER, json!({ "id": user.id }));
			b.can_when(Action::Execute, USER, json!({ "id": user.id }));
		})
		.role("manager", |b, _| {
			b.extend("member");
			let managed = json!({ "role": { "$in": ["member", "manager"] } });
			b.can_when(Action::Create, USER, json!({ "role": "manager" }));
			b.can_when(Action::Read, USER, managed.clone());
			b.can_when(Action::Update, USER, managed.clone());
			b.can_when(Action::Delete, USER, managed);
		})
		.role("admin", |b, _| {
			b.can(Action::Manage, ALL);
		})
}

/// A sample user record as it would come out of storage.
#[derive(Debug, Clone)]
pub struct SampleUser {
	pub label: &'static str,
	pub record: Value,
}

impl SampleUser {
	fn new(label: &'static str, id: &str, role: &str) -> Self {
		Self {
			label,
			record: json!({ "id": id, "name": label, "role": role }),
		}
	}

	pub fn actor(&self) -> Actor {
		let field = |name: &str| self.record[name].as_str().unwrap_or_default().to_string();
		Actor::new(field("id"))
			.with_name(field("name"))
			.with_role(field("role"))
	}

	pub fn role(&self) -> &str {
		self.record["role"].as_str().unwrap_or_default()
	}
}

pub fn sample_users() -> Vec<SampleUser> {
	vec![
		SampleUser::new("member", "u-member", "member"),
		SampleUser::new("member other", "u-member-2", "member"),
		SampleUser::new("manager", "u-manager", "manager"),
		SampleUser::new("manager other", "u-manager-2", "manager"),
		SampleUser::new("admin", "u-admin", "admin"),
		SampleUser::new("admin other", "u-admin-2", "admin"),
	]
}

/// The first sample user holding `role`.
pub fn user_with_role(role: &str) -> Option<SampleUser> {
	sample_users().into_iter().find(|user| user.role() == role)
}
