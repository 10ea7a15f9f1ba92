//! Predicate fragments shared by the `PostgreSQL` stores.
//!
//! Every helper appends ` AND <predicate>` to a builder whose statement
//! already has a `WHERE` clause, and is a no-op for an unconstrained slot.
//! Values are always bound, never interpolated.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// Escape `LIKE` metacharacters so a user prefix matches literally.
pub(crate) fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len().saturating_add(1));
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `column = ANY($n)` over text values.
pub(crate) fn push_any_text(qb: &mut QueryBuilder<'_, Postgres>, column: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    qb.push(format!(" AND {column} = ANY("));
    qb.push_bind(values.to_vec());
    qb.push(")");
}

/// `column = ANY($n)` over 64-bit integers.
pub(crate) fn push_any_i64(qb: &mut QueryBuilder<'_, Postgres>, column: &str, values: &[i64]) {
    if values.is_empty() {
        return;
    }
    qb.push(format!(" AND {column} = ANY("));
    qb.push_bind(values.to_vec());
    qb.push(")");
}

/// `column = ANY($n)` over UUIDs.
pub(crate) fn push_any_uuid(qb: &mut QueryBuilder<'_, Postgres>, column: &str, values: Vec<Uuid>) {
    if values.is_empty() {
        return;
    }
    qb.push(format!(" AND {column} = ANY("));
    qb.push_bind(values);
    qb.push(")");
}

/// `column LIKE '<prefix>%'` with the prefix escaped.
pub(crate) fn push_prefix(qb: &mut QueryBuilder<'_, Postgres>, column: &str, prefix: Option<&str>) {
    let Some(prefix) = prefix else {
        return;
    };
    qb.push(format!(" AND {column} LIKE "));
    qb.push_bind(format!("{}%", escape_like(prefix)));
    qb.push(r" ESCAPE '\'");
}
