//! Topic repository

use crate::db::models::{Query, Topic, TopicWithQueries};
use crate::ids::new_id;
use crate::{Error, Result};
use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use std::collections::HashMap;

pub async fn insert_topic<'e, E: SqliteExecutor<'e>>(
    db: E,
    project_id: &str,
    name: &str,
    description: Option<&str>,
) -> Result<Topic> {
    let now = Utc::now();
    let topic = Topic {
        id: new_id(),
        project_id: project_id.to_string(),
        name: name.to_string(),
        description: description.map(str::to_string),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO topics (id, project_id, name, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&topic.id)
    .bind(&topic.project_id)
    .bind(&topic.name)
    .bind(&topic.description)
    .bind(topic.created_at)
    .bind(topic.updated_at)
    .execute(db)
    .await?;

    Ok(topic)
}

pub async fn get_topic(pool: &SqlitePool, topic_id: &str) -> Result<Option<Topic>> {
    let topic = sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE id = ?")
        .bind(topic_id)
        .fetch_optional(pool)
        .await?;
    Ok(topic)
}

/// Rename a topic, optionally replacing its description
pub async fn update_topic(
    pool: &SqlitePool,
    topic_id: &str,
    name: &str,
    description: Option<&str>,
) -> Result<Topic> {
    let rows = sqlx::query(
        "UPDATE topics SET name = ?, description = COALESCE(?, description), updated_at = ? WHERE id = ?",
    )
    .bind(name)
    .bind(description)
    .bind(Utc::now())
    .bind(topic_id)
    .execute(pool)
    .await?
    .rows_affected();

    if rows == 0 {
        return Err(Error::NotFound("Topic not found".into()));
    }

    get_topic(pool, topic_id)
        .await?
        .ok_or_else(|| Error::NotFound("Topic not found".into()))
}

/// Delete a topic and (by cascade) its queries
pub async fn delete_topic(pool: &SqlitePool, topic_id: &str) -> Result<bool> {
    let rows = sqlx::query("DELETE FROM topics WHERE id = ?")
        .bind(topic_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(rows > 0)
}

pub async fn list_topic_ids(pool: &SqlitePool, project_id: &str) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar("SELECT id FROM topics WHERE project_id = ? ORDER BY name")
        .bind(project_id)
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// All topics of a project ordered by name, each with its queries ordered by text
pub async fn list_topics_with_queries(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<Vec<TopicWithQueries>> {
    let topics = sqlx::query_as::<_, Topic>(
        "SELECT * FROM topics WHERE project_id = ? ORDER BY name COLLATE NOCASE",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    let queries = sqlx::query_as::<_, Query>(
        "SELECT * FROM queries WHERE project_id = ? ORDER BY text COLLATE NOCASE",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    let mut by_topic: HashMap<String, Vec<Query>> = HashMap::new();
    for q in queries {
        by_topic.entry(q.topic_id.clone()).or_default().push(q);
    }

    Ok(topics
        .into_iter()
        .map(|topic| {
            let queries = by_topic.remove(&topic.id).unwrap_or_default();
            TopicWithQueries { topic, queries }
        })
        .collect())
}

/// One topic with its queries ordered by text
pub async fn get_topic_with_queries(
    pool: &SqlitePool,
    topic_id: &str,
) -> Result<Option<TopicWithQueries>> {
    let Some(topic) = get_topic(pool, topic_id).await? else {
        return Ok(None);
    };

    let queries = sqlx::query_as::<_, Query>(
        "SELECT * FROM queries WHERE topic_id = ? ORDER BY text COLLATE NOCASE",
    )
    .bind(topic_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(TopicWithQueries { topic, queries }))
}
