// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQL rendering of compiled conditions.
//!
//! The tree is first lowered: constant sub-trees are folded and any
//! predicate SQL cannot express is replaced by a constant and reported as a
//! [`Residual`]. The constant is chosen so the SQL admits a superset of the
//! rows; callers re-check those rows with [`super::ConditionsQuery::matches`].
//!
//! Parameters are numbered in the order they appear in the clause.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::{Expr, FieldOp, FieldPredicate};

use super::mongo;

/// Positional parameter syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placeholder {
	/// `$1, $2, ...` (PostgreSQL).
	#[default]
	Dollar,
	/// `?1, ?2, ...` (SQLite).
	QuestionNumbered,
	/// `?` (MySQL, SQLite).
	Question,
}

impl Placeholder {
	fn write(&self, out: &mut String, index: usize) {
		match self {
			Placeholder::Dollar => out.push_str(&format!("${index}")),
			Placeholder::QuestionNumbered => out.push_str(&format!("?{index}")),
			Placeholder::Question => out.push('?'),
		}
	}
}

impl FromStr for Placeholder {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"dollar" | "$" => Ok(Placeholder::Dollar),
			"question_numbered" | "?n" => Ok(Placeholder::QuestionNumbered),
			"question" | "?" => Ok(Placeholder::Question),
			other => Err(format!("unknown placeholder style: {other}")),
		}
	}
}

impl fmt::Display for Placeholder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Placeholder::Dollar => "dollar",
			Placeholder::QuestionNumbered => "question_numbered",
			Placeholder::Question => "question",
		})
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlOptions {
	pub placeholder: Placeholder,
	/// Number of parameters already bound by the surrounding query.
	pub offset: usize,
}

impl SqlOptions {
	pub fn new(placeholder: Placeholder) -> Self {
		Self {
			placeholder,
			offset: 0,
		}
	}

	pub fn with_offset(mut self, offset: usize) -> Self {
		self.offset = offset;
		self
	}
}

/// A predicate left out of the SQL clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Residual {
	pub field: String,
	/// The predicate as a Mongo-style document.
	pub predicate: Value,
	/// Whether it sat under an odd number of `NOT`s.
	pub negated: bool,
}

/// A parameterised `WHERE` predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlFragment {
	pub clause: String,
	pub params: Vec<Value>,
	pub residuals: Vec<Residual>,
}

impl SqlFragment {
	/// True when every predicate made it into the clause.
	pub fn is_exact(&self) -> bool {
		self.residuals.is_empty()
	}
}

/// Lowered form: constants folded, only SQL-expressible predicates left.
#[derive(Debug, Clone, PartialEq)]
enum Node<'e> {
	Const(bool),
	And(Vec<Node<'e>>),
	Or(Vec<Node<'e>>),
	Not(Box<Node<'e>>),
	Pred(&'e FieldPredicate),
}

pub(crate) fn render(expr: &Expr, options: &SqlOptions) -> SqlFragment {
	let mut residuals = Vec::new();
	let node = lower(expr, false, &mut residuals);

	let mut writer = Writer {
		options,
		clause: String::new(),
		params: Vec::new(),
	};
	writer.node(&node);

	SqlFragment {
		clause: writer.clause,
		params: writer.params,
		residuals,
	}
}

fn lower<'e>(expr: &'e Expr, negated: bool, residuals: &mut Vec<Residual>) -> Node<'e> {
	match expr {
		Expr::And(children) => fold(children, true, negated, residuals),
		Expr::Or(children) => fold(children, false, negated, residuals),
		Expr::Not(child) => match lower(child, !negated, residuals) {
			Node::Const(value) => Node::Const(!value),
			Node::Not(inner) => *inner,
			node => Node::Not(Box::new(node)),
		},
		Expr::Field(predicate) => lower_predicate(predicate, negated, residuals),
	}
}

/// Folds an `AND` (`conjunction`) or `OR` node.
fn fold<'e>(
	children: &'e [Expr],
	conjunction: bool,
	negated: bool,
	residuals: &mut Vec<Residual>,
) -> Node<'e> {
	let mut kept = Vec::with_capacity(children.len());
	let mut absorbed = false;
	// Every child is lowered, even after absorption, so residuals are complete.
	for child in children {
		match lower(child, negated, residuals) {
			Node::Const(value) if value == conjunction => {}
			Node::Const(_) => absorbed = true,
			Node::And(grandchildren) if conjunction => kept.extend(grandchildren),
			Node::Or(grandchildren) if !conjunction => kept.extend(grandchildren),
			node => kept.push(node),
		}
	}
	if absorbed {
		return Node::Const(!conjunction);
	}
	match kept.len() {
		0 => Node::Const(conjunction),
		1 => kept.remove(0),
		_ if conjunction => Node::And(kept),
		_ => Node::Or(kept),
	}
}

fn lower_predicate<'e>(
	predicate: &'e FieldPredicate,
	negated: bool,
	residuals: &mut Vec<Residual>,
) -> Node<'e> {
	let expressible = match &predicate.op {
		FieldOp::Eq(v) | FieldOp::Ne(v) => is_scalar(v),
		FieldOp::In(items) if items.is_empty() => return Node::Const(false),
		FieldOp::Nin(items) if items.is_empty() => return Node::Const(true),
		FieldOp::In(items) | FieldOp::Nin(items) => items.iter().all(is_scalar),
		FieldOp::Exists(_) => true,
		FieldOp::Gt(v) | FieldOp::Gte(v) | FieldOp::Lt(v) | FieldOp::Lte(v) => {
			v.is_number() || v.is_string()
		}
		FieldOp::Unsupported { .. } => false,
	};
	if expressible {
		return Node::Pred(predicate);
	}
	residuals.push(Residual {
		field: predicate.field.clone(),
		predicate: mongo::predicate_document(predicate),
		negated,
	});
	// `true` at even depth, `false` under a NOT: the clause only widens.
	Node::Const(!negated)
}

fn is_scalar(value: &Value) -> bool {
	!matches!(value, Value::Array(_) | Value::Object(_))
}

struct Writer<'o> {
	options: &'o SqlOptions,
	clause: String,
	params: Vec<Value>,
}

impl Writer<'_> {
	fn node(&mut self, node: &Node<'_>) {
		match node {
			Node::Const(true) => self.clause.push_str("true"),
			Node::Const(false) => self.clause.push_str("false"),
			Node::And(children) => self.group(children, " and "),
			Node::Or(children) => self.group(children, " or "),
			Node::Not(inner) => {
				self.clause.push_str("not ");
				if matches!(**inner, Node::And(_) | Node::Or(_)) {
					self.node(inner);
				} else {
					self.clause.push('(');
					self.node(inner);
					self.clause.push(')');
				}
			}
			Node::Pred(predicate) => self.predicate(predicate),
		}
	}

	fn group(&mut self, children: &[Node<'_>], separator: &str) {
		self.clause.push('(');
		for (i, child) in children.iter().enumerate() {
			if i > 0 {
				self.clause.push_str(separator);
			}
			self.node(child);
		}
		self.clause.push(')');
	}

	fn predicate(&mut self, predicate: &FieldPredicate) {
		let column = quote_identifier(&predicate.field);
		match &predicate.op {
			FieldOp::Eq(Value::Null) | FieldOp::Exists(false) => {
				self.clause.push_str(&format!("{column} is null"));
			}
			FieldOp::Ne(Value::Null) | FieldOp::Exists(true) => {
				self.clause.push_str(&format!("{column} is not null"));
			}
			FieldOp::Eq(v) => self.compare(&column, "=", v),
			FieldOp::Ne(v) => self.compare(&column, "<>", v),
			FieldOp::Gt(v) => self.compare(&column, ">", v),
			FieldOp::Gte(v) => self.compare(&column, ">=", v),
			FieldOp::Lt(v) => self.compare(&column, "<", v),
			FieldOp::Lte(v) => self.compare(&column, "<=", v),
			FieldOp::In(items) => self.membership(&column, items, false),
			FieldOp::Nin(items) => self.membership(&column, items, true),
			// Lowering never keeps these.
			FieldOp::Unsupported { .. } => self.clause.push_str("false"),
		}
	}

	fn compare(&mut self, column: &str, operator: &str, value: &Value) {
		self.clause.push_str(column);
		self.clause.push(' ');
		self.clause.push_str(operator);
		self.clause.push(' ');
		self.param(value);
	}

	/// `IN` / `NOT IN`. A `null` member becomes an `IS [NOT] NULL` test,
	/// since `x IN (NULL)` is never true in SQL.
	fn membership(&mut self, column: &str, items: &[Value], negated: bool) {
		let values: Vec<&Value> = items.iter().filter(|v| !v.is_null()).collect();
		let with_null = values.len() != items.len();

		let null_test = if negated { "is not null" } else { "is null" };
		if values.is_empty() {
			self.clause.push_str(&format!("{column} {null_test}"));
			return;
		}

		if with_null {
			self.clause.push('(');
		}
		self.clause.push_str(column);
		self.clause.push_str(if negated { " not in (" } else { " in (" });
		for (i, value) in values.into_iter().enumerate() {
			if i > 0 {
				self.clause.push_str(", ");
			}
			self.param(value);
		}
		self.clause.push(')');
		if with_null {
			let joiner = if negated { " and " } else { " or " };
			self.clause.push_str(&format!("{joiner}{column} {null_test})"));
		}
	}

	fn param(&mut self, value: &Value) {
		self.params.push(value.clone());
		let index = self.options.offset + self.params.len();
		self.options.placeholder.write(&mut self.clause, index);
	}
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
	format!("\"{}\"", name.replace('"', "\"\""))
}
