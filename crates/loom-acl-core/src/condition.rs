// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Field conditions attached to rules, and the boolean expression tree they
//! are parsed into.
//!
//! A condition map is a Mongo-style document: each key names a field of the
//! subject instance, each value is either a literal (equality) or an operator
//! object whose keys all start with `$`:
//!
//! ```text
//! { "status": "PUBLISHED" }                  status = 'PUBLISHED'
//! { "role": { "$in": ["member", "manager"] } } role IN (...)
//! { "userId": { "$not": null } }             NOT (userId IS NULL)
//! ```
//!
//! Conditions are parsed once into an [`Expr`], which is the single rule
//! algebra used by the in-memory evaluator and by both query renderers.
//!
//! Null and missing fields are treated alike everywhere, which keeps the
//! in-memory semantics identical to SQL `IS NULL`.

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Concrete field values of a subject instance.
pub type Fields = Map<String, Value>;

/// Comparison applied to a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOp {
	Eq(Value),
	Ne(Value),
	In(Vec<Value>),
	Nin(Vec<Value>),
	Exists(bool),
	Gt(Value),
	Gte(Value),
	Lt(Value),
	Lte(Value),
	/// A field condition using an operator this grammar does not know,
	/// possibly nested under `$not`. `value` is the field's whole operator
	/// object. Never matches, whatever the nesting.
	Unsupported { operator: String, value: Value },
}

/// A predicate over one named field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldPredicate {
	pub field: String,
	pub op: FieldOp,
}

impl FieldPredicate {
	pub fn new(field: impl Into<String>, op: FieldOp) -> Self {
		Self {
			field: field.into(),
			op,
		}
	}

	/// Evaluates the predicate against an instance.
	pub fn matches(&self, fields: &Fields) -> bool {
		let actual = fields.get(&self.field);
		match &self.op {
			FieldOp::Eq(expected) => eq_matches(actual, expected),
			FieldOp::Ne(expected) => !eq_matches(actual, expected),
			FieldOp::In(items) => items.iter().any(|item| eq_matches(actual, item)),
			FieldOp::Nin(items) => !items.iter().any(|item| eq_matches(actual, item)),
			FieldOp::Exists(expected) => is_present(actual) == *expected,
			FieldOp::Gt(bound) => compare_matches(actual, bound, |o| o == Ordering::Greater),
			FieldOp::Gte(bound) => compare_matches(actual, bound, |o| o != Ordering::Less),
			FieldOp::Lt(bound) => compare_matches(actual, bound, |o| o == Ordering::Less),
			FieldOp::Lte(bound) => compare_matches(actual, bound, |o| o != Ordering::Greater),
			FieldOp::Unsupported { .. } => false,
		}
	}
}

/// Boolean expression over field predicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
	And(Vec<Expr>),
	Or(Vec<Expr>),
	Not(Box<Expr>),
	Field(FieldPredicate),
}

impl Expr {
	/// Expression that holds for every instance.
	pub fn always() -> Self {
		Expr::And(Vec::new())
	}

	/// Expression that holds for no instance.
	pub fn never() -> Self {
		Expr::Or(Vec::new())
	}

	pub fn field(field: impl Into<String>, op: FieldOp) -> Self {
		Expr::Field(FieldPredicate::new(field, op))
	}

	pub fn negate(self) -> Self {
		Expr::Not(Box::new(self))
	}

	/// Evaluates the expression against an instance.
	pub fn matches(&self, fields: &Fields) -> bool {
		match self {
			Expr::And(children) => children.iter().all(|c| c.matches(fields)),
			Expr::Or(children) => children.iter().any(|c| c.matches(fields)),
			Expr::Not(child) => !child.matches(fields),
			Expr::Field(predicate) => predicate.matches(fields),
		}
	}
}

/// Parsed condition map of a single rule.
///
/// Keeps the raw document (for serialization and for callers that want the
/// original shape) next to its parsed [`Expr`].
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
	raw: Fields,
	expr: Expr,
}

impl Conditions {
	pub fn new(raw: Fields) -> Self {
		let expr = parse_document(&raw);
		Self { raw, expr }
	}

	/// Parses a JSON value. Returns `None` unless the value is an object.
	pub fn from_value(value: Value) -> Option<Self> {
		match value {
			Value::Object(raw) => Some(Self::new(raw)),
			_ => None,
		}
	}

	pub fn raw(&self) -> &Fields {
		&self.raw
	}

	pub fn expr(&self) -> &Expr {
		&self.expr
	}

	pub fn is_empty(&self) -> bool {
		self.raw.is_empty()
	}

	/// Every field condition must hold (AND semantics).
	pub fn matches(&self, fields: &Fields) -> bool {
		self.expr.matches(fields)
	}
}

impl From<Fields> for Conditions {
	fn from(raw: Fields) -> Self {
		Self::new(raw)
	}
}

impl Serialize for Conditions {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.raw.serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for Conditions {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		Fields::deserialize(deserializer).map(Self::new)
	}
}

fn parse_document(raw: &Fields) -> Expr {
	let mut parts: Vec<Expr> = raw
		.iter()
		.map(|(field, value)| parse_field(field, value))
		.collect();
	if parts.len() == 1 {
		parts.remove(0)
	} else {
		Expr::And(parts)
	}
}

fn is_operator_object(object: &Fields) -> bool {
	!object.is_empty() && object.keys().all(|k| k.starts_with('$'))
}

fn parse_field(field: &str, value: &Value) -> Expr {
	match value {
		Value::Object(ops) if is_operator_object(ops) => match parse_operators(field, ops) {
			Ok(expr) => expr,
			Err(operator) => Expr::field(
				field,
				FieldOp::Unsupported {
					operator,
					value: value.clone(),
				},
			),
		},
		literal => Expr::field(field, FieldOp::Eq(literal.clone())),
	}
}

/// Parses an operator object. `Err` carries the first operator, at any depth,
/// this grammar does not know.
fn parse_operators(field: &str, ops: &Fields) -> Result<Expr, String> {
	let mut parts = ops
		.iter()
		.map(|(op, arg)| parse_operator(field, op, arg))
		.collect::<Result<Vec<_>, _>>()?;
	if parts.len() == 1 {
		Ok(parts.remove(0))
	} else {
		Ok(Expr::And(parts))
	}
}

fn parse_operator(field: &str, operator: &str, arg: &Value) -> Result<Expr, String> {
	let op = match (operator, arg) {
		("$not", Value::Object(inner)) if is_operator_object(inner) => {
			return parse_operators(field, inner).map(Expr::negate);
		}
		("$not", literal) => return Ok(Expr::field(field, FieldOp::Eq(literal.clone())).negate()),
		("$eq", v) => FieldOp::Eq(v.clone()),
		("$ne", v) => FieldOp::Ne(v.clone()),
		("$in", Value::Array(items)) => FieldOp::In(items.clone()),
		("$nin", Value::Array(items)) => FieldOp::Nin(items.clone()),
		("$exists", Value::Bool(b)) => FieldOp::Exists(*b),
		("$gt", v) => FieldOp::Gt(v.clone()),
		("$gte", v) => FieldOp::Gte(v.clone()),
		("$lt", v) => FieldOp::Lt(v.clone()),
		("$lte", v) => FieldOp::Lte(v.clone()),
		(other, _) => return Err(other.to_string()),
	};
	Ok(Expr::field(field, op))
}

fn is_present(actual: Option<&Value>) -> bool {
	!matches!(actual, None | Some(Value::Null))
}

fn eq_matches(actual: Option<&Value>, expected: &Value) -> bool {
	match actual {
		None | Some(Value::Null) => expected.is_null(),
		// Array fields match when any element does.
		Some(Value::Array(items)) if !expected.is_array() => {
			items.iter().any(|item| values_equal(item, expected))
		}
		Some(value) => values_equal(value, expected),
	}
}

fn values_equal(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
		_ => a == b,
	}
}

/// Integers compare exactly; floats only come in when either side is one.
fn numbers_equal(x: &Number, y: &Number) -> bool {
	if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
		return x == y;
	}
	if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
		return x == y;
	}
	if !x.is_f64() && !y.is_f64() {
		// One side is negative, the other above i64::MAX.
		return false;
	}
	match (x.as_f64(), y.as_f64()) {
		(Some(x), Some(y)) => x == y,
		_ => false,
	}
}

fn compare_matches(actual: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
	let Some(actual) = actual else {
		return false;
	};
	let ordering = match (actual, bound) {
		(Value::Number(a), Value::Number(b)) => a
			.as_f64()
			.zip(b.as_f64())
			.and_then(|(a, b)| a.partial_cmp(&b)),
		(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
		_ => None,
	};
	ordering.map(accept).unwrap_or(false)
}
