//! Database models
//!
//! Row types map 1:1 onto tables. Aggregates (`ProjectOverview`,
//! `TopicWithQueries`) replace nested relation fetches with explicit owned
//! collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Enumerations
// ============================================================================

/// Research query classification
///
/// `sector` queries never mention the brand ("market-level"); `product`
/// queries name the company ("brand-specific"). The older `market`/`brand`
/// vocabulary is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    #[serde(alias = "market")]
    Sector,
    #[serde(alias = "brand")]
    Product,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Sector => "sector",
            QueryType::Product => "product",
        }
    }

    /// Parse either vocabulary; unknown values yield `None`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sector" | "market" => Some(QueryType::Sector),
            "product" | "brand" => Some(QueryType::Product),
            _ => None,
        }
    }

    /// Mapping used by the legacy `{query, companySpecific}` shape
    pub fn from_company_specific(company_specific: bool) -> Self {
        if company_specific {
            QueryType::Product
        } else {
            QueryType::Sector
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a user within a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MembershipRole {
    Admin,
    Member,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Admin => "admin",
            MembershipRole::Member => "member",
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

/// Registered user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub email_verified: bool,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Active login session (the token itself is never stored)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Tenancy
// ============================================================================

/// Tenant root: an organization's research project
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub status: i64,
    /// Country/region the research targets
    pub region: Option<String>,
    pub sector: Option<String>,
    pub language: Option<String>,
    pub last_analysis: Option<String>,
    pub logo: Option<String>,
    /// Creating user
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership row (user ↔ project)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub role: MembershipRole,
    pub created_at: DateTime<Utc>,
}

/// Project listed for a member, with the member's role
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectWithRole {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub role: MembershipRole,
}

// ============================================================================
// Topics and queries
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Topic {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Query {
    pub id: String,
    pub topic_id: String,
    pub project_id: String,
    pub text: String,
    pub country: Option<String>,
    pub active: bool,
    pub query_type: QueryType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Topic with its queries, ordered by text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicWithQueries {
    #[serde(flatten)]
    pub topic: Topic,
    pub queries: Vec<Query>,
}

/// Project page aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectOverview {
    pub project: Project,
    pub role: MembershipRole,
    pub topics: Vec<TopicWithQueries>,
}

/// New query prior to insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuery {
    pub text: String,
    pub query_type: QueryType,
}

/// New topic with its initial queries
#[derive(Debug, Clone)]
pub struct NewTopic {
    pub name: String,
    pub description: Option<String>,
    pub queries: Vec<NewQuery>,
}

// ============================================================================
// Research results (written by the external analysis automation)
// ============================================================================

/// LLM/vendor identity used for executions
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiModel {
    pub id: String,
    pub name: String,
    pub model: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Execution {
    pub id: String,
    pub project_id: String,
    pub executed_at: DateTime<Utc>,
}
