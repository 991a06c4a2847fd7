//! Deterministic stub agents for the search → extract → summarize → report
//! pipeline.
//!
//! These stand in for the real collaborators (search API, scraper, LLM)
//! in tests and the demo binary. The extractor and reporter are synchronous
//! on purpose, to exercise the blocking calling convention.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Agent, AgentResult, BlockingAgent, Payload};
use crate::workflow::input::FROM_PREVIOUS_KEY;

/// Fake search agent: turns a `query` into a small HTML results page.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStub;

#[async_trait]
impl Agent for SearchStub {
    async fn run(&self, payload: Payload) -> anyhow::Result<AgentResult> {
        let Some(query) = payload.get("query").and_then(Value::as_str) else {
            return Ok(AgentResult::failed("no query provided"));
        };
        let mut data = Map::new();
        data.insert(
            "html".to_string(),
            Value::String(format!("<html><body>Results for {query}</body></html>")),
        );
        data.insert(
            "url".to_string(),
            Value::String(format!("https://example.com/search?q={query}")),
        );
        Ok(AgentResult::success(data))
    }
}

/// Tag-stripping extractor. Synchronous, so it runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractorStub;

impl BlockingAgent for ExtractorStub {
    fn run(&self, payload: Payload) -> anyhow::Result<AgentResult> {
        let Some(html) = str_field(&payload, &[FROM_PREVIOUS_KEY, "html"]) else {
            return Ok(AgentResult::failed("no html to extract"));
        };
        let mut data = Map::new();
        data.insert("clean_text".to_string(), Value::String(strip_tags(html)));
        Ok(AgentResult::success(data))
    }
}

/// Fake summarizer: prefixes a truncated excerpt of the input text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummarizerStub;

#[async_trait]
impl Agent for SummarizerStub {
    async fn run(&self, payload: Payload) -> anyhow::Result<AgentResult> {
        let Some(text) = str_field(&payload, &[FROM_PREVIOUS_KEY, "clean_text", "text"]) else {
            return Ok(AgentResult::failed("no text to summarize"));
        };
        // Pretend to think for a moment, like a remote model would.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let excerpt: String = text.chars().take(120).collect();
        let mut data = Map::new();
        data.insert("summary".to_string(), Value::String(format!("Summary: {excerpt}")));
        Ok(AgentResult::success(data))
    }
}

/// Report formatter. Synchronous.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReporterStub;

impl BlockingAgent for ReporterStub {
    fn run(&self, payload: Payload) -> anyhow::Result<AgentResult> {
        let Some(summary) = str_field(&payload, &[FROM_PREVIOUS_KEY, "summary", "text"]) else {
            return Ok(AgentResult::failed("no summary provided"));
        };
        let url = payload.get("url").and_then(Value::as_str).unwrap_or("unknown");
        let mut data = Map::new();
        data.insert(
            "report".to_string(),
            Value::String(format!("REPORT\nURL: {url}\n\nSummary:\n{summary}")),
        );
        Ok(AgentResult::success(data))
    }
}

/// First string value found under any of the given keys.
fn str_field<'a>(payload: &'a Payload, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
}

/// Drop everything between `<` and `>` and trim the remainder.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}
