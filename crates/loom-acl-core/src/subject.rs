// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde_json::Value;

use crate::condition::Fields;

/// What a check is about: a bare subject type, or a tagged instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Subject<'a> {
	Type(&'a str),
	Instance {
		subject_type: &'a str,
		fields: &'a Fields,
	},
}

impl<'a> Subject<'a> {
	pub fn instance(subject_type: &'a str, fields: &'a Fields) -> Self {
		Subject::Instance {
			subject_type,
			fields,
		}
	}

	/// Tags a resolved JSON value. Anything but an object degrades to a
	/// type-level subject.
	pub fn from_value(subject_type: &'a str, value: &'a Value) -> Self {
		match value {
			Value::Object(fields) => Subject::instance(subject_type, fields),
			_ => Subject::Type(subject_type),
		}
	}

	pub fn subject_type(&self) -> &'a str {
		match self {
			Subject::Type(t) => t,
			Subject::Instance { subject_type, .. } => subject_type,
		}
	}

	pub fn fields(&self) -> Option<&'a Fields> {
		match self {
			Subject::Type(_) => None,
			Subject::Instance { fields, .. } => Some(fields),
		}
	}
}

impl<'a> From<&'a str> for Subject<'a> {
	fn from(subject_type: &'a str) -> Self {
		Subject::Type(subject_type)
	}
}

impl<'a> From<&'a String> for Subject<'a> {
	fn from(subject_type: &'a String) -> Self {
		Subject::Type(subject_type.as_str())
	}
}
