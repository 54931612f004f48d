// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Default action vocabulary.
//!
//! Rules store actions as plain strings so applications can add their own
//! verbs; [`Action`] names the ones shipped by default.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wildcard action matching any action.
pub const MANAGE: &str = "manage";

/// Wildcard subject matching any subject type.
pub const ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	Create,
	Read,
	ReadAny,
	Update,
	UpdateAny,
	Delete,
	DeleteAny,
	Execute,
	Manage,
}

impl Action {
	pub const ALL: [Action; 9] = [
		Action::Create,
		Action::Read,
		Action::ReadAny,
		Action::Update,
		Action::UpdateAny,
		Action::Delete,
		Action::DeleteAny,
		Action::Execute,
		Action::Manage,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Action::Create => "create",
			Action::Read => "read",
			Action::ReadAny => "read_any",
			Action::Update => "update",
			Action::UpdateAny => "update_any",
			Action::Delete => "delete",
			Action::DeleteAny => "delete_any",
			Action::Execute => "execute",
			Action::Manage => MANAGE,
		}
	}
}

impl AsRef<str> for Action {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl From<Action> for String {
	fn from(action: Action) -> Self {
		action.as_str().to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn serde_names_match_as_str() {
		for action in Action::ALL {
			let encoded = serde_json::to_value(action).unwrap();
			assert_eq!(encoded, serde_json::json!(action.as_str()));
		}
	}
}
