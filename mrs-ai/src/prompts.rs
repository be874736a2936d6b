//! Prompt catalogue and request builders
//!
//! Every AI feature is described here once: system prompt, few-shot
//! messages, model, temperature and output schema. Routes and background
//! tasks only pick a builder and a provider.

use crate::provider::{ChatMessage, CompletionRequest};
use crate::schemas;
use crate::sectors::sector_codes;
use mrs_common::db::models::QueryType;

pub const CHATGPT_MODEL: &str = "gpt-4.1";
pub const CLAUDE_MODEL: &str = "claude-3-5-sonnet-latest";
pub const COMPANY_MODEL: &str = "gpt-4o-mini";
pub const SUGGESTED_TOPICS_MODEL: &str = "gpt-4o";
pub const QUERY_MODEL: &str = "gpt-4.1";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const SINGLE_QUERY_TEMPERATURE: f32 = 0.8;

// ============================================================================
// System prompts
// ============================================================================

pub const CHATGPT_PROMPT: &str = "You are ChatGPT, a helpful assistant. \
Answer the user's question the way you would for any member of the public. \
Search the web for current information, recommend specific companies, products \
and services by name when relevant, and cite the sources you used.";

pub const CLAUDE_PROMPT: &str = "You are Claude, a helpful assistant. \
Answer the user's question the way you would for any member of the public. \
Use web search to ground your answer in current information, name specific \
companies, products and services when relevant, and cite your sources.";

const CUSTOMER_VOICE: &str = "## Content Guidelines
- **Tone**: Casual and conversational, like a customer asking an AI assistant for help
- **Language**: Use the company's primary language and regional context
- **Perspective**: Focus on customer needs, problems and use cases
- **Creativity**: Think like a real customer with specific needs and concerns";

const MARKET_LEVEL_PATTERNS: &str = "### Market-level queries (sector, NO brand mention)
Product or service questions where this company would naturally come up in the answer:
- Comparisons: \"Which [product type] has the lowest fees for [use case]?\"
- Features: \"Can I [specific action] with [service type] in [region]?\"
- Requirements: \"What do I need to [use service] as [customer type]?\"
- Problem solving: \"How do I [solve problem] with [service]?\"
- Use cases: \"Which [product] is best for [customer segment]?\"";

const BRAND_LEVEL_PATTERNS: &str = "### Brand-specific queries (product, WITH brand mention)
Direct customer questions about the company's own offering:
- \"What types of [product] does [COMPANY NAME] offer?\"
- \"Can I [specific action] with my [COMPANY NAME] [product]?\"
- \"How do I [customer action] through [COMPANY NAME]?\"
- \"What's the maximum [action] limit at [COMPANY NAME]?\"";

/// Company profile extraction; the sector list is inlined
pub fn company_prompt() -> String {
    format!(
        "You are a helpful assistant that builds a company profile from the company's website url.
Use the web search tool to find the information.
Return a JSON object with exactly these fields:
{{
  \"name\": \"Company Name\",
  \"country\": \"Country\",
  \"language\": \"Language\",
  \"sector\": \"Business Sector\",
  \"description\": \"Company Description\",
  \"website\": \"Company Website\"
}}

The available business sectors are: {sectors}. Return the sector code exactly as listed. If the sector is not in the list, return null.

The description covers what the company does, who it serves, its mission, the products and services it specializes in, and who its clients are.
Return all information in English.

If you can't find a field, return null for it (country and sector only).
Return the JSON only, with no other text.",
        sectors = sector_codes()
    )
}

pub fn suggested_topics_prompt() -> String {
    format!(
        "You are an expert content strategist. Create topics and queries that real customers would ask an AI assistant when researching or using a company's products and services.

## Your Mission
Generate exactly {count} distinct topics with 3 queries each. Prioritize practical, actionable questions over general company information.

{CUSTOMER_VOICE}

## Topic Requirements
- Topic names are 1-2 words: \"Accounts\", \"Transfers\", \"Fees\", \"Mobile\", \"Security\"
- Each topic targets a specific product, service, feature or customer scenario

## Queries Per Topic (EXACTLY 3)
{MARKET_LEVEL_PATTERNS}
(2 per topic)

{BRAND_LEVEL_PATTERNS}
(1 per topic)

## Output Format
Return topic_1 .. topic_{count} with description_N (why the topic matters to customers) and queries_N.
Each query has \"text\" and \"queryType\" (\"sector\" or \"product\").",
        count = schemas::SUGGESTED_TOPIC_COUNT
    )
}

/// Server-side topic generation used after a project is created without topics
pub fn topics_and_queries_prompt() -> String {
    format!(
        "You are an expert content strategist. Create topics and queries that users would search for or ask an AI assistant about a specific company.

## Your Mission
Generate exactly 10 distinct topics with 7 queries each (70 queries in total). Focus on searchable questions that would lead users to discover or learn about the company.

{CUSTOMER_VOICE}

## Topic Requirements
- Topic names are 1-2 words: \"Banking\", \"Security\", \"Pricing\", \"Support\", \"Comparison\"
- Topics are distinct with minimal overlap

## Queries Per Topic (EXACTLY 7)
{MARKET_LEVEL_PATTERNS}
(5 per topic)

{BRAND_LEVEL_PATTERNS}
(2 per topic)

## Output Format
Return {{\"topics\": [{{\"topic\", \"description\", \"queries\"}}]}}.
Each query has \"text\" and \"queryType\" (\"sector\" or \"product\")."
    )
}

pub fn topic_queries_prompt() -> String {
    format!(
        "You are an expert content strategist. Create 10 practical questions that real customers would ask an AI assistant about a company's products and services for one specific topic.

## Your Mission
Generate 10 queries for the given topic. Consider the existing queries and write complementary ones.

{CUSTOMER_VOICE}

## Query Distribution (EXACTLY 10)
{MARKET_LEVEL_PATTERNS}
(7 queries)

{BRAND_LEVEL_PATTERNS}
(3 queries)

## Quality Standards
- Every query solves a real customer problem or answers a practical question
- Include both basic and advanced scenarios
- **AVOID DUPLICATION**: never repeat an existing query

## Output Format
Return {{\"queries\": [...]}} where each query has \"text\" and \"queryType\" (\"sector\" or \"product\")."
    )
}

pub fn single_query_prompt() -> String {
    format!(
        "You are an expert content strategist. Create 1 practical question that a real customer would ask an AI assistant about a company's products and services for one specific topic.

{CUSTOMER_VOICE}
- **Context**: Read the existing queries and write something complementary

## Query Types (choose the most appropriate)
{MARKET_LEVEL_PATTERNS}

{BRAND_LEVEL_PATTERNS}

## Output Requirements
- Exactly 1 query, specific and actionable
- \"queryType\" is \"product\" when the company is named, otherwise \"sector\"
- Never duplicate an existing query"
    )
}

// ============================================================================
// Context builders
// ============================================================================

/// Company facts shared by the topic and query prompts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyContext {
    pub name: String,
    pub website: String,
    pub country: String,
    pub language: String,
    pub sector: String,
    pub description: String,
}

impl CompanyContext {
    fn details(&self) -> String {
        format!(
            "Name: {}\nWebsite: {}\nCountry: {}\nLanguage: {}\nSector: {}\nDescription: {}",
            self.name, self.website, self.country, self.language, self.sector, self.description
        )
    }
}

pub fn topics_request_message(company: &CompanyContext) -> String {
    format!(
        "Generate topics and queries for the following company:\n\n{}",
        company.details()
    )
}

pub fn topic_queries_message(
    company: &CompanyContext,
    topic_name: &str,
    topic_description: &str,
    existing: &[String],
) -> String {
    let existing_list = existing
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Generate 10 additional queries for the following topic and company:\n\n\
         Company Details:\n{}\n\n\
         Topic Details:\nName: {}\nDescription: {}\n\n\
         Existing Queries (DO NOT DUPLICATE):\n{}\n\n\
         Please generate 10 new, unique queries that complement but don't duplicate the existing ones.",
        company.details(),
        topic_name,
        topic_description,
        existing_list
    )
}

/// An existing query shown to the single-query generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingQuery {
    pub text: String,
    pub query_type: QueryType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingleQueryContext {
    pub company_name: String,
    pub topic_name: String,
    pub topic_description: Option<String>,
    pub company_description: Option<String>,
    pub existing: Vec<ExistingQuery>,
}

pub fn single_query_message(ctx: &SingleQueryContext) -> String {
    let existing = if ctx.existing.is_empty() {
        "No existing queries yet.".to_string()
    } else {
        let lines = ctx
            .existing
            .iter()
            .enumerate()
            .map(|(i, q)| format!("{}. {} ({})", i + 1, q.text, q.query_type))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Existing queries to avoid duplicating:\n{lines}")
    };

    format!(
        "Company: {}\nTopic: {}\nTopic Description: {}\nCompany Description: {}\n\n{}\n\n\
         Generate 1 unique, customer-focused query for this topic that would be valuable for market research and doesn't duplicate any existing queries.",
        ctx.company_name,
        ctx.topic_name,
        ctx.topic_description.as_deref().unwrap_or("No description provided"),
        ctx.company_description
            .as_deref()
            .unwrap_or("No company description provided"),
        existing
    )
}

// ============================================================================
// Request builders
// ============================================================================

pub fn chatgpt_request(prompt: &str) -> CompletionRequest {
    CompletionRequest::new(CHATGPT_MODEL)
        .system(CHATGPT_PROMPT)
        .message(ChatMessage::user(prompt))
        .temperature(DEFAULT_TEMPERATURE)
        .with_web_search()
}

pub fn claude_request(prompt: &str) -> CompletionRequest {
    CompletionRequest::new(CLAUDE_MODEL)
        .system(CLAUDE_PROMPT)
        .message(ChatMessage::user(prompt))
        .temperature(DEFAULT_TEMPERATURE)
        .with_web_search()
}

pub fn company_profile_request(url: &str) -> CompletionRequest {
    CompletionRequest::new(COMPANY_MODEL)
        .system(company_prompt())
        .messages([
            ChatMessage::user("Generate a company profile for acme.com"),
            ChatMessage::assistant(
                r#"{"name":"Acme","country":"United States","language":"English","sector":"manufacturing","description":"Acme is a company that makes widgets.","website":"https://acme.com"}"#,
            ),
            ChatMessage::user(format!("Generate a company profile for {url}")),
        ])
        .temperature(DEFAULT_TEMPERATURE)
        .with_web_search()
        .json_output("company_profile", schemas::company_schema())
}

pub fn suggested_topics_request(company: &CompanyContext) -> CompletionRequest {
    CompletionRequest::new(SUGGESTED_TOPICS_MODEL)
        .system(suggested_topics_prompt())
        .message(ChatMessage::user(topics_request_message(company)))
        .temperature(DEFAULT_TEMPERATURE)
        .with_web_search()
        .json_output("recommended_topics", schemas::recommended_topics_schema())
}

pub fn topics_and_queries_request(company: &CompanyContext) -> CompletionRequest {
    CompletionRequest::new(QUERY_MODEL)
        .system(topics_and_queries_prompt())
        .message(ChatMessage::user(topics_request_message(company)))
        .temperature(DEFAULT_TEMPERATURE)
        .with_web_search()
        .json_output("generated_topics", schemas::generated_topics_schema())
}

pub fn topic_queries_request(
    company: &CompanyContext,
    topic_name: &str,
    topic_description: &str,
    existing: &[String],
) -> CompletionRequest {
    CompletionRequest::new(QUERY_MODEL)
        .system(topic_queries_prompt())
        .message(ChatMessage::user(topic_queries_message(
            company,
            topic_name,
            topic_description,
            existing,
        )))
        .temperature(DEFAULT_TEMPERATURE)
        .with_web_search()
        .json_output("generated_queries", schemas::queries_schema())
}

pub fn single_query_request(ctx: &SingleQueryContext) -> CompletionRequest {
    let example = SingleQueryContext {
        company_name: "Acme Bank".to_string(),
        topic_name: "Mobile Banking".to_string(),
        topic_description: Some(
            "Features and functionality of mobile banking applications".to_string(),
        ),
        company_description: Some(
            "Acme Bank is a digital-first bank offering mobile banking solutions.".to_string(),
        ),
        existing: vec![
            ExistingQuery {
                text: "How do I transfer money using mobile banking?".to_string(),
                query_type: QueryType::Sector,
            },
            ExistingQuery {
                text: "What security features does Acme Bank's mobile app have?".to_string(),
                query_type: QueryType::Product,
            },
        ],
    };

    CompletionRequest::new(QUERY_MODEL)
        .system(single_query_prompt())
        .messages([
            ChatMessage::user(single_query_message(&example)),
            ChatMessage::assistant(
                r#"{"text":"Which mobile banking apps allow international wire transfers without visiting a branch?","queryType":"sector"}"#,
            ),
            ChatMessage::user(single_query_message(ctx)),
        ])
        .temperature(SINGLE_QUERY_TEMPERATURE)
        .json_output("generated_query", schemas::query_schema())
}
