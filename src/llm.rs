//! External LLM provider contract (spec §1, §6): text/JSON generation and
//! grounded search, treated as a request/response contract with timeouts and
//! retries — not implemented here beyond the contract and a deterministic
//! test double, per spec's explicit scope exclusion.

use async_trait::async_trait;
use serde_json::Value;

use crate::ratelimit::LLM_CALL_TIMEOUT;

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub tokens: u32,
    /// Preserved regardless of which JSON-extraction path succeeded (spec
    /// §9): `grounding_metadata.sources` is optional, since newer provider
    /// SDKs may return query lists only.
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default)]
pub struct GroundingMetadata {
    pub queries: Vec<String>,
    pub sources: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm call timed out")]
    Timeout,
    #[error("llm error ({retryable}): {detail}")]
    Other { detail: String, retryable: bool },
}

impl LlmError {
    pub fn retryable(&self) -> bool {
        matches!(self, LlmError::Timeout)
            || matches!(self, LlmError::Other { retryable: true, .. })
    }
}

/// `generate(prompt, schema?, grounding?) -> {content, tokens, grounding_metadata?}`
/// (spec §6). Errors map to `LlmError{kind, retryable}`; hard 60s timeout is
/// enforced by the caller via `ratelimit::with_timeout`, not the trait impl,
/// so every provider gets the same envelope.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        schema: Option<&Value>,
        grounding: bool,
    ) -> Result<LlmResponse, LlmError>;
}

/// Runs a provider call under the standard 60s deadline (spec §4.3), mapping
/// an elapsed deadline to `LlmError::Timeout` rather than panicking or
/// propagating a cancellation.
pub async fn generate_with_deadline(
    provider: &dyn LlmProvider,
    prompt: &str,
    schema: Option<&Value>,
    grounding: bool,
) -> Result<LlmResponse, LlmError> {
    match crate::ratelimit::with_timeout(
        LLM_CALL_TIMEOUT,
        provider.generate(prompt, schema, grounding),
    )
    .await
    {
        Some(result) => result,
        None => Err(LlmError::Timeout),
    }
}

/// Structured-JSON extraction per spec §9: direct parse -> fenced code block
/// -> regex for the first balanced `{...}`/`[...]` -> light repair (strip
/// trailing commas, normalize quotes). Used when a provider can't combine
/// tool-use with a strict response schema and the JSON is requested via
/// instruction text instead.
pub fn extract_json(raw: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(v);
    }

    if let Some(fenced) = extract_fenced_code_block(raw) {
        if let Ok(v) = serde_json::from_str::<Value>(&fenced) {
            return Some(v);
        }
        if let Some(repaired) = repair_json(&fenced) {
            return Some(repaired);
        }
    }

    if let Some(balanced) = extract_first_balanced(raw) {
        if let Ok(v) = serde_json::from_str::<Value>(&balanced) {
            return Some(v);
        }
        if let Some(repaired) = repair_json(&balanced) {
            return Some(repaired);
        }
    }

    None
}

fn extract_fenced_code_block(raw: &str) -> Option<String> {
    let start = raw.find("```")?;
    let after_fence = &raw[start + 3..];
    let after_fence = after_fence.strip_prefix("json").unwrap_or(after_fence);
    let after_fence = after_fence.strip_prefix('\n').unwrap_or(after_fence);
    let end = after_fence.find("```")?;
    Some(after_fence[..end].trim().to_string())
}

fn extract_first_balanced(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        let (open, close) = match b {
            b'{' => (b'{', b'}'),
            b'[' => (b'[', b']'),
            _ => continue,
        };
        let mut depth = 0i32;
        let mut in_string = false;
        let mut escape = false;
        for (j, &c) in bytes[i..].iter().enumerate() {
            if escape {
                escape = false;
                continue;
            }
            match c {
                b'\\' if in_string => escape = true,
                b'"' => in_string = !in_string,
                _ if in_string => {}
                _ if c == open => depth += 1,
                _ if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(raw[i..i + j + 1].to_string());
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// Strip trailing commas before `}`/`]` and normalize curly quotes — a
/// "light repair," not a full JSON5 parser.
fn repair_json(raw: &str) -> Option<Value> {
    let mut repaired = String::with_capacity(raw.len());
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        let normalized = match c {
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        };
        repaired.push(normalized);
        i += 1;
    }
    serde_json::from_str(&repaired).ok()
}

/// A deterministic test/offline double. Never calls the network; always
/// returns a grounded-search-shaped response so callers that request
/// `grounding = true` (TRENDS backend, feed discovery's keyword expansion)
/// remain exercisable without a live provider. Mirrors the reranker's
/// "deterministic lexical fallback" pattern (SPEC_FULL §4).
pub struct FallbackLlmProvider;

#[async_trait]
impl LlmProvider for FallbackLlmProvider {
    async fn generate(
        &self,
        prompt: &str,
        _schema: Option<&Value>,
        grounding: bool,
    ) -> Result<LlmResponse, LlmError> {
        let content = format!("{{\"echo\": {}}}", serde_json::to_string(prompt).unwrap_or_default());
        Ok(LlmResponse {
            content,
            tokens: prompt.split_whitespace().count() as u32,
            grounding_metadata: grounding.then(|| GroundingMetadata {
                queries: vec![prompt.to_string()],
                sources: None,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_direct() {
        let v = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn extract_json_fenced_block() {
        let raw = "Here you go:\n```json\n{\"a\": 1, \"b\": [1,2,3]}\n```\nthanks";
        let v = extract_json(raw).unwrap();
        assert_eq!(v["a"], 1);
        assert_eq!(v["b"][2], 3);
    }

    #[test]
    fn extract_json_balanced_braces_embedded_in_prose() {
        let raw = "The answer is {\"result\": \"ok\", \"n\": 42} as computed.";
        let v = extract_json(raw).unwrap();
        assert_eq!(v["n"], 42);
    }

    #[test]
    fn extract_json_repairs_trailing_comma() {
        let raw = "{\"a\": 1, \"b\": 2,}";
        let v = extract_json(raw).unwrap();
        assert_eq!(v["b"], 2);
    }

    #[tokio::test]
    async fn fallback_provider_preserves_grounding_queries() {
        let provider = FallbackLlmProvider;
        let resp = provider.generate("trending EV topics", None, true).await.unwrap();
        assert!(resp.grounding_metadata.unwrap().queries.contains(&"trending EV topics".to_string()));
    }
}
