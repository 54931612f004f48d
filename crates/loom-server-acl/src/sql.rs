// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Binding compiled conditions to `sqlx` SQLite queries.
//!
//! Render the fragment with [`Placeholder::QuestionNumbered`] (or
//! `Question`) and an offset equal to the number of parameters already bound,
//! then bind its parameters in order:
//!
//! ```ignore
//! let fragment = conditions.to_sql_with(&SqlOptions::new(Placeholder::QuestionNumbered).with_offset(1));
//! let sql = format!("SELECT id FROM todos WHERE list_id = ?1 AND {}", fragment.clause);
//! let query = bind_sql_params(sqlx::query(&sql).bind(list_id), &fragment.params);
//! ```
//!
//! [`Placeholder::QuestionNumbered`]: loom_acl_core::Placeholder::QuestionNumbered

use serde_json::Value;
use sqlx::query::{Query, QueryAs};
use sqlx::sqlite::{Sqlite, SqliteArguments};

/// Folds `params` onto a query builder with a `bind` method, in order.
macro_rules! bind_all {
	($query:expr, $params:expr) => {
		$params.iter().fold($query, |query, value| match value {
			Value::Null => query.bind(None::<String>),
			Value::Bool(b) => query.bind(*b),
			Value::Number(n) => match n.as_i64() {
				Some(i) => query.bind(i),
				None => query.bind(n.as_f64()),
			},
			Value::String(s) => query.bind(s.clone()),
			// Never produced by the renderer; bound as JSON text.
			other => query.bind(other.to_string()),
		})
	};
}

/// Binds `params` onto `query` in order.
pub fn bind_sql_params<'q>(
	query: Query<'q, Sqlite, SqliteArguments<'q>>,
	params: &[Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
	bind_all!(query, params)
}

/// [`bind_sql_params`] for `query_as`.
pub fn bind_sql_params_as<'q, O>(
	query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
	params: &[Value],
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
	bind_all!(query, params)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use sqlx::sqlite::SqlitePool;
	use sqlx::Row;

	#[tokio::test]
	async fn both_helpers_bind_every_value_kind() {
		let pool = SqlitePool::connect(":memory:").await.unwrap();
		let params = vec![json!(null), json!(true), json!(7), json!(1.5), json!("x"), json!([1])];
		let sql = "SELECT ?1 IS NULL, ?2, ?3, ?4, ?5, ?6";

		let row = bind_sql_params(sqlx::query(sql), &params)
			.fetch_one(&pool)
			.await
			.unwrap();
		assert!(row.get::<bool, _>(0));
		assert!(row.get::<bool, _>(1));
		assert_eq!(row.get::<i64, _>(2), 7);
		assert_eq!(row.get::<f64, _>(3), 1.5);
		assert_eq!(row.get::<String, _>(4), "x");
		assert_eq!(row.get::<String, _>(5), "[1]");

		let row: (bool, bool, i64, f64, String, String) =
			bind_sql_params_as(sqlx::query_as(sql), &params)
				.fetch_one(&pool)
				.await
				.unwrap();
		assert_eq!(row, (true, true, 7, 1.5, "x".to_string(), "[1]".to_string()));
	}
}
