//! E-E-A-T-inspired quality score (spec §4.10): a weighted blend of domain
//! authority, publication type, freshness, and usage popularity.

use chrono::Utc;

use crate::core::types::Source;

const PREMIUM_DOMAINS: &[&str] = &[
    "nytimes.com",
    "wsj.com",
    "reuters.com",
    "apnews.com",
    "bloomberg.com",
    "ft.com",
    "economist.com",
];

const INDUSTRY_DOMAINS: &[&str] = &[
    "techcrunch.com",
    "theverge.com",
    "arstechnica.com",
    "wired.com",
    "venturebeat.com",
];

const BLOG_PLATFORMS: &[&str] = &["medium.com", "substack.com", "blogspot.com", "wordpress.com"];

/// `.gov/.edu -> 1.0`, curated premium -> 0.95, curated industry -> 0.85,
/// blog platforms -> 0.6, unknown -> 0.5.
pub fn domain_authority(domain: &str) -> f32 {
    let d = domain.to_lowercase();
    if d.ends_with(".gov") || d.ends_with(".edu") {
        1.0
    } else if PREMIUM_DOMAINS.iter().any(|p| d.ends_with(p)) {
        0.95
    } else if INDUSTRY_DOMAINS.iter().any(|p| d.ends_with(p)) {
        0.85
    } else if BLOG_PLATFORMS.iter().any(|p| d.ends_with(p)) {
        0.6
    } else {
        0.5
    }
}

/// Auto-detected from domain/path hints: academic 1.0, news 0.9, industry
/// 0.85, analysis 0.8, blog 0.6, social 0.4, unknown 0.5.
pub fn publication_type(url: &str) -> f32 {
    let Ok(parsed) = url::Url::parse(url) else {
        return 0.5;
    };
    let domain = parsed.host_str().unwrap_or_default().to_lowercase();
    let path = parsed.path().to_lowercase();

    if domain.ends_with(".edu") || path.contains("/journal/") || path.contains("/doi/") {
        1.0
    } else if PREMIUM_DOMAINS.iter().any(|p| domain.ends_with(p)) || domain.ends_with(".gov") {
        0.9
    } else if INDUSTRY_DOMAINS.iter().any(|p| domain.ends_with(p)) {
        0.85
    } else if path.contains("/analysis/") || path.contains("/report/") || path.contains("/research/") {
        0.8
    } else if BLOG_PLATFORMS.iter().any(|p| domain.ends_with(p)) || path.contains("/blog/") {
        0.6
    } else if domain.contains("reddit.com") || domain.contains("twitter.com") || domain.contains("x.com") {
        0.4
    } else {
        0.5
    }
}

/// `e^{-age_days/30}`, age relative to `published_at` when known, else
/// `first_fetched_at`.
pub fn freshness(source: &Source) -> f32 {
    let anchor = source.published_at.unwrap_or(source.first_fetched_at);
    let age_days = (Utc::now() - anchor).num_seconds() as f32 / 86_400.0;
    (-age_days.max(0.0) / 30.0).exp()
}

/// `log10(usage_count+1) / log10(100)`, clamped to `[0,1]`.
pub fn usage_popularity(usage_count: u32) -> f32 {
    (((usage_count + 1) as f32).log10() / 100f32.log10()).clamp(0.0, 1.0)
}

/// `0.4*domain_authority + 0.3*publication_type + 0.2*freshness + 0.1*usage_popularity`.
pub fn quality_score(source: &Source) -> f32 {
    0.4 * domain_authority(&source.domain)
        + 0.3 * publication_type(&source.url)
        + 0.2 * freshness(source)
        + 0.1 * usage_popularity(source.usage_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gov_domain_has_top_authority() {
        assert_eq!(domain_authority("epa.gov"), 1.0);
        assert_eq!(domain_authority("mit.edu"), 1.0);
    }

    #[test]
    fn unknown_domain_defaults_to_half() {
        assert_eq!(domain_authority("some-random-blog-host.io"), 0.5);
    }

    #[test]
    fn usage_popularity_saturates_near_100() {
        assert!((usage_popularity(99) - 1.0).abs() < 0.02);
        assert!(usage_popularity(0) < usage_popularity(10));
    }

    #[test]
    fn freshness_decays_toward_zero_for_old_content() {
        let mut source = sample_source();
        source.published_at = Some(Utc::now() - chrono::Duration::days(300));
        assert!(freshness(&source) < 0.001);
    }

    fn sample_source() -> Source {
        Source {
            url: "https://example.com/a".into(),
            domain: "example.com".into(),
            title: "Title".into(),
            content_preview: String::new(),
            first_fetched_at: Utc::now(),
            last_fetched_at: Utc::now(),
            fetch_count: 1,
            topic_ids: vec![],
            usage_count: 1,
            quality_score: 0.5,
            e_e_a_t_signals: Default::default(),
            author: None,
            published_at: None,
            is_stale: false,
            truncated: false,
        }
    }
}
