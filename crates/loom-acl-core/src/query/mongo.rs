// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mongo-style filter rendering.
//!
//! Allow rules become a top-level `$or`, deny rules a top-level `$and` of
//! `$nor`s. An unrestricted filter is `{}`; a forbidden one is
//! `{"$nor": [{}]}`, which matches no document.

use serde_json::{json, Map, Value};

use crate::condition::{Expr, FieldOp, FieldPredicate};

use super::QueryFilter;

pub(crate) fn render(filter: &QueryFilter) -> Value {
	match filter {
		QueryFilter::Forbidden => json!({ "$nor": [{}] }),
		QueryFilter::Where { allow, deny } => {
			let mut document = Map::new();
			if let Some(allow) = allow {
				document.insert(
					"$or".to_string(),
					Value::Array(allow.iter().map(expr_document).collect()),
				);
			}
			if !deny.is_empty() {
				let nors = deny
					.iter()
					.map(|expr| json!({ "$nor": [expr_document(expr)] }))
					.collect();
				document.insert("$and".to_string(), Value::Array(nors));
			}
			Value::Object(document)
		}
	}
}

/// Renders one expression as a filter document.
pub fn expr_document(expr: &Expr) -> Value {
	match expr {
		Expr::Field(predicate) => predicate_document(predicate),
		Expr::And(children) => merge_conjunction(children),
		Expr::Or(children) if children.is_empty() => json!({ "$nor": [{}] }),
		Expr::Or(children) => json!({ "$or": children.iter().map(expr_document).collect::<Vec<_>>() }),
		Expr::Not(child) => match child.as_ref() {
			Expr::Field(predicate) => {
				let mut document = Map::new();
				document.insert(
					predicate.field.clone(),
					json!({ "$not": operator_document(&predicate.op) }),
				);
				Value::Object(document)
			}
			other => json!({ "$nor": [expr_document(other)] }),
		},
	}
}

/// `{ field: <value or operator object> }` for a single predicate.
pub fn predicate_document(predicate: &FieldPredicate) -> Value {
	let value = match &predicate.op {
		FieldOp::Eq(value) if !is_operator_object(value) => value.clone(),
		FieldOp::Exists(false) => Value::Null,
		op => operator_document(op),
	};
	let mut document = Map::new();
	document.insert(predicate.field.clone(), value);
	Value::Object(document)
}

fn operator_document(op: &FieldOp) -> Value {
	let (operator, value) = match op {
		FieldOp::Eq(v) => ("$eq", v.clone()),
		FieldOp::Ne(v) => ("$ne", v.clone()),
		FieldOp::In(items) => ("$in", Value::Array(items.clone())),
		FieldOp::Nin(items) => ("$nin", Value::Array(items.clone())),
		// Null and missing are one state, unlike Mongo's `$exists`.
		FieldOp::Exists(true) => ("$ne", Value::Null),
		FieldOp::Exists(false) => ("$eq", Value::Null),
		FieldOp::Gt(v) => ("$gt", v.clone()),
		FieldOp::Gte(v) => ("$gte", v.clone()),
		FieldOp::Lt(v) => ("$lt", v.clone()),
		FieldOp::Lte(v) => ("$lte", v.clone()),
		FieldOp::Unsupported { value, .. } => return value.clone(),
	};
	let mut document = Map::new();
	document.insert(operator.to_string(), value);
	Value::Object(document)
}

fn is_operator_object(value: &Value) -> bool {
	match value {
		Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
		_ => false,
	}
}

/// Merges conjuncts into one document where keys do not collide, falling
/// back to `$and`.
fn merge_conjunction(children: &[Expr]) -> Value {
	let documents: Vec<Value> = children.iter().map(expr_document).collect();
	let mut merged = Map::new();
	for document in &documents {
		let Value::Object(entries) = document else {
			return json!({ "$and": documents });
		};
		for (key, value) in entries {
			match merged.get_mut(key) {
				None => {
					merged.insert(key.clone(), value.clone());
				}
				Some(existing) if can_merge_operators(existing, value) => {
					if let (Value::Object(into), Value::Object(from)) = (existing, value) {
						into.extend(from.clone());
					}
				}
				Some(_) => return json!({ "$and": documents }),
			}
		}
	}
	Value::Object(merged)
}

fn can_merge_operators(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Object(x), Value::Object(y)) => {
			is_operator_object(a) && is_operator_object(b) && !y.keys().any(|k| x.contains_key(k))
		}
		_ => false,
	}
}
