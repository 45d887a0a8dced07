//! Best-effort HTML-to-text extraction, shared by the RSS collector (full
//! article text per entry) and the content synthesizer (source text before
//! BM25 passage pre-filtering). Grounded in the teacher's
//! `scraping::rust_scraper::clean` readability + `html2md` pipeline.

use url::Url;

/// Extracts clean article text from `html`. Falls back to `None` on any
/// failure so callers can fall back to a feed summary / SERP snippet
/// instead (spec §4.4, §4.11) — extraction never propagates an error.
pub fn extract_article_text(html: &str, base_url: &str) -> Option<String> {
    let url = Url::parse(base_url).ok()?;
    match readability::extractor::extract(&mut html.as_bytes(), &url) {
        Ok(product) => {
            let text = html2md::parse_html(&product.content);
            let cleaned = normalize_whitespace(&text);
            if cleaned.split_whitespace().count() < 20 {
                None
            } else {
                Some(cleaned)
            }
        }
        Err(e) => {
            tracing::debug!(url = %base_url, error = %e, "readability extraction failed");
            None
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_body_text_from_simple_article() {
        let html = r#"<html><body><article><h1>Title</h1><p>This is a reasonably long paragraph of article body text used to verify extraction works end to end for the collector pipeline under test.</p></article></body></html>"#;
        let text = extract_article_text(html, "https://example.com/article");
        assert!(text.is_some());
        assert!(text.unwrap().contains("article body text"));
    }

    #[test]
    fn returns_none_for_too_short_content() {
        let html = "<html><body><p>hi</p></body></html>";
        assert!(extract_article_text(html, "https://example.com/x").is_none());
    }
}
