//! Research results read model
//!
//! Executions, query executions, sources, domains, competitors and mentions
//! are written by the external analysis automation. This module only reads
//! them and assembles the results dashboard for one project.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

pub const EXECUTION_LIMIT: i64 = 10;
pub const SOURCE_LIMIT: i64 = 20;
pub const COMPETITOR_LIMIT: usize = 15;
pub const DOMAIN_LIMIT: i64 = 10;

/// Dashboard filters taken from the query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsFilter {
    /// Restrict sources and model counts to one execution
    #[serde(default)]
    pub execution_id: Option<String>,
    /// Only list competitors that were actually mentioned
    #[serde(default)]
    pub mentioned_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionSummary {
    pub id: String,
    pub executed_at: DateTime<Utc>,
    pub query_execution_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SourceRow {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub query_text: Option<String>,
    pub query_type: Option<String>,
    pub model_id: Option<String>,
    pub query_execution_id: Option<String>,
    pub domain_name: Option<String>,
    pub domain_category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompetitorRow {
    pub id: String,
    pub name: String,
    /// JSON array of alias strings
    #[serde(skip)]
    pub alternative_names: String,
    pub mention_count: i64,
    pub last_mention_date: Option<DateTime<Utc>>,
}

impl CompetitorRow {
    /// Parsed aliases; malformed JSON yields no aliases
    pub fn aliases(&self) -> Vec<String> {
        serde_json::from_str(&self.alternative_names).unwrap_or_default()
    }
}

/// Competitor as presented on the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorView {
    pub rank: usize,
    pub id: String,
    pub name: String,
    pub alternative_names: Vec<String>,
    pub mention_count: i64,
    pub last_mention_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DomainRow {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub source_count: i64,
}

/// Query executions per model
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ModelBreakdown {
    pub model_id: String,
    pub name: String,
    pub model: String,
    pub color: Option<String>,
    pub query_executions: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultsSummary {
    pub total_executions: i64,
    pub queries_processed: i64,
    pub sources_found: i64,
    pub competitors_identified: i64,
    pub domains_found: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsDashboard {
    pub summary: ResultsSummary,
    pub selected_execution_id: Option<String>,
    pub executions: Vec<ExecutionSummary>,
    pub sources: Vec<SourceRow>,
    pub competitors: Vec<CompetitorView>,
    pub domains: Vec<DomainRow>,
    pub models: Vec<ModelBreakdown>,
}

/// A competitor "has mentions" when at least one mention was recorded
pub fn has_mentions(competitor: &CompetitorRow) -> bool {
    competitor.mention_count > 0
}

/// The requested execution, if it is one of the listed executions
pub fn select_execution<'a>(
    executions: &'a [ExecutionSummary],
    requested: Option<&str>,
) -> Option<&'a ExecutionSummary> {
    let requested = requested?;
    executions.iter().find(|e| e.id == requested)
}

/// Query executions of the selected execution, else of the latest one
pub fn queries_processed(
    executions: &[ExecutionSummary],
    selected: Option<&ExecutionSummary>,
) -> i64 {
    selected
        .or_else(|| executions.first())
        .map(|e| e.query_execution_count)
        .unwrap_or(0)
}

/// Apply the mention filter and ranking to competitors already ordered by
/// most recent mention
pub fn rank_competitors(
    rows: Vec<CompetitorRow>,
    mentioned_only: bool,
    limit: usize,
) -> Vec<CompetitorView> {
    rows.into_iter()
        .filter(|c| !mentioned_only || has_mentions(c))
        .take(limit)
        .enumerate()
        .map(|(i, c)| CompetitorView {
            rank: i + 1,
            alternative_names: c.aliases(),
            id: c.id,
            name: c.name,
            mention_count: c.mention_count,
            last_mention_date: c.last_mention_date,
        })
        .collect()
}

/// Assemble the results dashboard for a project
pub async fn load_results(
    pool: &SqlitePool,
    project_id: &str,
    filter: &ResultsFilter,
) -> Result<ResultsDashboard> {
    let executions = sqlx::query_as::<_, ExecutionSummary>(
        r#"
        SELECT e.id, e.executed_at, COUNT(qe.id) AS query_execution_count
        FROM executions e
        LEFT JOIN query_executions qe ON qe.execution_id = e.id
        WHERE e.project_id = ?
        GROUP BY e.id
        ORDER BY e.executed_at DESC
        LIMIT ?
        "#,
    )
    .bind(project_id)
    .bind(EXECUTION_LIMIT)
    .fetch_all(pool)
    .await?;

    let total_executions: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM executions WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(pool)
            .await?;

    let selected = select_execution(&executions, filter.execution_id.as_deref());
    let selected_id = selected.map(|e| e.id.clone());

    let (sources, sources_found) = load_sources(pool, project_id, selected_id.as_deref()).await?;

    let competitor_rows = sqlx::query_as::<_, CompetitorRow>(
        r#"
        SELECT id, name, alternative_names, mention_count, last_mention_date
        FROM competitors
        WHERE project_id = ?
        ORDER BY last_mention_date IS NULL, last_mention_date DESC, name
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    let competitors_identified = competitor_rows.len() as i64;
    let competitors = rank_competitors(competitor_rows, filter.mentioned_only, COMPETITOR_LIMIT);

    let domains = sqlx::query_as::<_, DomainRow>(
        r#"
        SELECT d.id, d.name, d.category, COUNT(s.id) AS source_count
        FROM domains d
        LEFT JOIN sources s ON s.domain_id = d.id
        WHERE d.project_id = ?
        GROUP BY d.id
        ORDER BY source_count DESC, d.name
        LIMIT ?
        "#,
    )
    .bind(project_id)
    .bind(DOMAIN_LIMIT)
    .fetch_all(pool)
    .await?;

    let domains_found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM domains WHERE project_id = ?")
        .bind(project_id)
        .fetch_one(pool)
        .await?;

    let models = load_model_breakdown(pool, project_id, selected_id.as_deref()).await?;

    let summary = ResultsSummary {
        total_executions,
        queries_processed: queries_processed(&executions, selected),
        sources_found,
        competitors_identified,
        domains_found,
    };

    Ok(ResultsDashboard {
        summary,
        selected_execution_id: selected_id,
        executions,
        sources,
        competitors,
        domains,
        models,
    })
}

async fn load_sources(
    pool: &SqlitePool,
    project_id: &str,
    execution_id: Option<&str>,
) -> Result<(Vec<SourceRow>, i64)> {
    const COLUMNS: &str = r#"
        s.id, s.url, s.title, s.query_text, s.query_type, s.model_id, s.query_execution_id,
        d.name AS domain_name, d.category AS domain_category
    "#;

    match execution_id {
        Some(execution_id) => {
            let rows = sqlx::query_as::<_, SourceRow>(&format!(
                r#"
                SELECT {COLUMNS}
                FROM sources s
                JOIN query_executions qe ON qe.id = s.query_execution_id
                LEFT JOIN domains d ON d.id = s.domain_id
                WHERE s.project_id = ? AND qe.execution_id = ?
                ORDER BY s.created_at DESC
                LIMIT ?
                "#
            ))
            .bind(project_id)
            .bind(execution_id)
            .bind(SOURCE_LIMIT)
            .fetch_all(pool)
            .await?;

            let total: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM sources s
                JOIN query_executions qe ON qe.id = s.query_execution_id
                WHERE s.project_id = ? AND qe.execution_id = ?
                "#,
            )
            .bind(project_id)
            .bind(execution_id)
            .fetch_one(pool)
            .await?;

            Ok((rows, total))
        }
        None => {
            let rows = sqlx::query_as::<_, SourceRow>(&format!(
                r#"
                SELECT {COLUMNS}
                FROM sources s
                LEFT JOIN domains d ON d.id = s.domain_id
                WHERE s.project_id = ?
                ORDER BY s.created_at DESC
                LIMIT ?
                "#
            ))
            .bind(project_id)
            .bind(SOURCE_LIMIT)
            .fetch_all(pool)
            .await?;

            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources WHERE project_id = ?")
                .bind(project_id)
                .fetch_one(pool)
                .await?;

            Ok((rows, total))
        }
    }
}

async fn load_model_breakdown(
    pool: &SqlitePool,
    project_id: &str,
    execution_id: Option<&str>,
) -> Result<Vec<ModelBreakdown>> {
    let rows = sqlx::query_as::<_, ModelBreakdown>(
        r#"
        SELECT m.id AS model_id, m.name, m.model, m.color, COUNT(qe.id) AS query_executions
        FROM query_executions qe
        JOIN executions e ON e.id = qe.execution_id
        JOIN models m ON m.id = qe.model_id
        WHERE e.project_id = ? AND (? IS NULL OR e.id = ?)
        GROUP BY m.id
        ORDER BY m.name
        "#,
    )
    .bind(project_id)
    .bind(execution_id)
    .bind(execution_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
