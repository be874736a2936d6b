//! Structured response types
//!
//! Each response type has a matching JSON Schema builder used to request
//! structured output from the provider. Parsing is tolerant: models wrap
//! JSON in markdown fences, add prose, or fall back to older field names.

use crate::decode::repair_json_escapes;
use crate::sectors::is_known_sector;
use crate::AiError;
use mrs_common::db::models::{NewQuery, NewTopic, QueryType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Number of topics in a suggested-topics response
pub const SUGGESTED_TOPIC_COUNT: usize = 10;

// ============================================================================
// Queries
// ============================================================================

/// A research query proposed by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GeneratedQueryWire")]
pub struct AiGeneratedQuery {
    pub text: String,
    #[serde(rename = "queryType")]
    pub query_type: QueryType,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GeneratedQueryWire {
    Current {
        text: String,
        #[serde(rename = "queryType", default)]
        query_type: QueryType,
    },
    Legacy {
        query: String,
        #[serde(rename = "companySpecific", default)]
        company_specific: bool,
    },
    Bare(String),
}

impl From<GeneratedQueryWire> for AiGeneratedQuery {
    fn from(wire: GeneratedQueryWire) -> Self {
        match wire {
            GeneratedQueryWire::Current { text, query_type } => Self { text, query_type },
            GeneratedQueryWire::Legacy {
                query,
                company_specific,
            } => Self {
                text: query,
                query_type: QueryType::from_company_specific(company_specific),
            },
            GeneratedQueryWire::Bare(text) => Self {
                text,
                query_type: QueryType::Sector,
            },
        }
    }
}

impl From<AiGeneratedQuery> for NewQuery {
    fn from(q: AiGeneratedQuery) -> Self {
        NewQuery {
            text: q.text,
            query_type: q.query_type,
        }
    }
}

/// `{queries: [...]}` envelope returned by topic query generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQueries {
    #[serde(default)]
    pub queries: Vec<AiGeneratedQuery>,
}

// ============================================================================
// Company profile
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    pub language: String,
    #[serde(default)]
    pub sector: Option<String>,
    pub description: String,
    pub website: String,
}

impl CompanyProfile {
    /// Drop a sector the model made up
    pub fn with_known_sector(mut self) -> Self {
        if let Some(sector) = &self.sector {
            if !is_known_sector(sector) {
                self.sector = None;
            }
        }
        self
    }
}

// ============================================================================
// Topics
// ============================================================================

/// A topic with its queries, as proposed by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedTopic {
    #[serde(alias = "topic")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub queries: Vec<AiGeneratedQuery>,
}

impl From<SuggestedTopic> for NewTopic {
    fn from(topic: SuggestedTopic) -> Self {
        let description = Some(topic.description).filter(|d| !d.trim().is_empty());
        NewTopic {
            name: topic.name,
            description,
            queries: topic.queries.into_iter().map(NewQuery::from).collect(),
        }
    }
}

/// `{topics: [{topic, description, queries}]}` envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTopics {
    pub topics: Vec<SuggestedTopic>,
}

/// Read suggested topics in either the flattened `topic_N` form or the
/// `{topics: [...]}` form
pub fn parse_recommended_topics(value: &Value) -> Result<Vec<SuggestedTopic>, AiError> {
    if let Some(list) = value.get("topics") {
        return Ok(serde_json::from_value(list.clone())?);
    }

    let mut topics = Vec::new();
    for n in 1..=SUGGESTED_TOPIC_COUNT {
        let Some(name) = value.get(format!("topic_{n}")).and_then(Value::as_str) else {
            continue;
        };
        let description = value
            .get(format!("description_{n}"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let queries = match value.get(format!("queries_{n}")) {
            Some(raw) => serde_json::from_value(raw.clone())?,
            None => Vec::new(),
        };
        topics.push(SuggestedTopic {
            name: name.to_string(),
            description,
            queries,
        });
    }

    if topics.is_empty() {
        return Err(AiError::InvalidResponse(
            "no topics found in model output".to_string(),
        ));
    }
    Ok(topics)
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Slice out the JSON document from model text
///
/// Tolerates markdown fences and prose before or after the document.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Repair escapes, extract, then parse
///
/// Escapes are decoded exactly once, on the raw document. Text that was
/// escaped in the JSON (`\\u00e9`) reaches the parsed string as written.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, AiError> {
    let repaired = repair_json_escapes(raw);
    Ok(serde_json::from_str(extract_json(&repaired))?)
}

// ============================================================================
// JSON Schemas
// ============================================================================

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

pub fn query_schema() -> Value {
    object_schema(
        json!({
            "text": { "type": "string" },
            "queryType": { "type": "string", "enum": ["sector", "product"] }
        }),
        &["text", "queryType"],
    )
}

pub fn queries_schema() -> Value {
    object_schema(
        json!({ "queries": { "type": "array", "items": query_schema() } }),
        &["queries"],
    )
}

pub fn company_schema() -> Value {
    object_schema(
        json!({
            "name": { "type": "string" },
            "country": { "type": ["string", "null"] },
            "language": { "type": "string" },
            "sector": { "type": ["string", "null"] },
            "description": { "type": "string" },
            "website": { "type": "string" }
        }),
        &["name", "country", "language", "sector", "description", "website"],
    )
}

/// Flattened `topic_N` / `description_N` / `queries_N` object
pub fn recommended_topics_schema() -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for n in 1..=SUGGESTED_TOPIC_COUNT {
        let keys = [
            format!("topic_{n}"),
            format!("description_{n}"),
            format!("queries_{n}"),
        ];
        properties.insert(keys[0].clone(), json!({ "type": "string" }));
        properties.insert(keys[1].clone(), json!({ "type": "string" }));
        properties.insert(
            keys[2].clone(),
            json!({ "type": "array", "items": query_schema() }),
        );
        required.extend(keys);
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

pub fn generated_topics_schema() -> Value {
    let topic = object_schema(
        json!({
            "topic": { "type": "string" },
            "description": { "type": "string" },
            "queries": { "type": "array", "items": query_schema() }
        }),
        &["topic", "description", "queries"],
    );
    object_schema(
        json!({ "topics": { "type": "array", "items": topic } }),
        &["topics"],
    )
}
