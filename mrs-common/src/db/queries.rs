//! Research query repository

use crate::db::models::{NewQuery, Query, QueryType};
use crate::ids::new_id;
use crate::{Error, Result};
use chrono::Utc;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use std::collections::HashSet;

pub async fn insert_query<'e, E: SqliteExecutor<'e>>(
    db: E,
    topic_id: &str,
    project_id: &str,
    text: &str,
    query_type: QueryType,
    country: Option<&str>,
) -> Result<Query> {
    let now = Utc::now();
    let query = Query {
        id: new_id(),
        topic_id: topic_id.to_string(),
        project_id: project_id.to_string(),
        text: text.to_string(),
        country: country.map(str::to_string),
        active: true,
        query_type,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO queries (id, topic_id, project_id, text, country, active, query_type,
                             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&query.id)
    .bind(&query.topic_id)
    .bind(&query.project_id)
    .bind(&query.text)
    .bind(&query.country)
    .bind(query.active)
    .bind(query.query_type)
    .bind(query.created_at)
    .bind(query.updated_at)
    .execute(db)
    .await?;

    Ok(query)
}

pub async fn get_query(pool: &SqlitePool, query_id: &str) -> Result<Option<Query>> {
    let query = sqlx::query_as::<_, Query>("SELECT * FROM queries WHERE id = ?")
        .bind(query_id)
        .fetch_optional(pool)
        .await?;
    Ok(query)
}

pub async fn list_queries_for_topic(pool: &SqlitePool, topic_id: &str) -> Result<Vec<Query>> {
    let queries = sqlx::query_as::<_, Query>(
        "SELECT * FROM queries WHERE topic_id = ? ORDER BY created_at, text",
    )
    .bind(topic_id)
    .fetch_all(pool)
    .await?;
    Ok(queries)
}

/// Replace a query's text and optionally toggle its active flag
pub async fn update_query(
    pool: &SqlitePool,
    query_id: &str,
    text: &str,
    active: Option<bool>,
) -> Result<Query> {
    let rows = sqlx::query(
        "UPDATE queries SET text = ?, active = COALESCE(?, active), updated_at = ? WHERE id = ?",
    )
    .bind(text)
    .bind(active)
    .bind(Utc::now())
    .bind(query_id)
    .execute(pool)
    .await?
    .rows_affected();

    if rows == 0 {
        return Err(Error::NotFound("Query not found".into()));
    }

    get_query(pool, query_id)
        .await?
        .ok_or_else(|| Error::NotFound("Query not found".into()))
}

pub async fn delete_query(pool: &SqlitePool, query_id: &str) -> Result<bool> {
    let rows = sqlx::query("DELETE FROM queries WHERE id = ?")
        .bind(query_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(rows > 0)
}

/// Normalized form used for duplicate detection
pub fn normalize_query_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Drop candidates that duplicate `existing` texts or each other
///
/// Comparison ignores case and whitespace differences. Empty candidates are
/// dropped as well. Order of the surviving candidates is preserved.
pub fn filter_new_queries<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    candidates: Vec<NewQuery>,
) -> Vec<NewQuery> {
    let mut seen: HashSet<String> = existing.into_iter().map(normalize_query_text).collect();

    candidates
        .into_iter()
        .filter(|q| {
            let key = normalize_query_text(&q.text);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

/// Insert generated queries for a topic, skipping duplicates of existing
/// ones. Returns the rows actually inserted.
pub async fn insert_unique_queries(
    conn: &mut SqliteConnection,
    topic_id: &str,
    project_id: &str,
    country: Option<&str>,
    candidates: Vec<NewQuery>,
) -> Result<Vec<Query>> {
    let existing: Vec<String> = sqlx::query_scalar("SELECT text FROM queries WHERE topic_id = ?")
        .bind(topic_id)
        .fetch_all(&mut *conn)
        .await?;

    let fresh = filter_new_queries(existing.iter().map(String::as_str), candidates);

    let mut inserted = Vec::with_capacity(fresh.len());
    for q in fresh {
        let row = insert_query(&mut *conn, topic_id, project_id, &q.text, q.query_type, country)
            .await?;
        inserted.push(row);
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nq(text: &str) -> NewQuery {
        NewQuery {
            text: text.to_string(),
            query_type: QueryType::Sector,
        }
    }

    #[test]
    fn test_normalize_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_query_text("  Which Bank   has LOW fees? "),
            "which bank has low fees?"
        );
    }

    #[test]
    fn test_filter_drops_existing_and_internal_duplicates() {
        let existing = ["What is the best savings account?"];
        let candidates = vec![
            nq("what is the best  savings account?"),
            nq("Can I open an account online?"),
            nq("can i open an account online?"),
            nq("   "),
            nq("Which bank has no monthly fees?"),
        ];

        let kept = filter_new_queries(existing, candidates);
        let texts: Vec<&str> = kept.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Can I open an account online?", "Which bank has no monthly fees?"]
        );
    }
}
