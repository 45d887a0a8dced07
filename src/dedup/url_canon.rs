//! URL canonicalization (spec §4.2): the deduplication key for Documents.

use url::Url;

const TRACKING_PREFIXES: &[&str] = &["utm_", "gclid", "fbclid", "mc_eid", "mc_cid", "ref_src"];

/// Hosts known to enforce HSTS / TLS-only, so `http://` variants are forced
/// to `https://` even absent a live HSTS probe (spec's "heuristic: known
/// secure host list").
const KNOWN_SECURE_HOSTS: &[&str] = &[
    "github.com",
    "reddit.com",
    "medium.com",
    "nytimes.com",
    "bbc.com",
    "reuters.com",
    "techcrunch.com",
];

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PREFIXES
        .iter()
        .any(|p| key == *p || key.starts_with(p))
}

/// Canonicalize a URL per spec §4.2: lowercase host, strip `www.`, drop
/// fragment, sort query params, drop tracking params, collapse trailing
/// slash, force https on known-secure hosts. Falls back to the trimmed
/// input on parse failure rather than erroring — a bad URL should still be
/// comparable for dedup purposes.
pub fn canonicalize(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.trim().to_string();
    };

    url.set_fragment(None);

    if let Some(host) = url.host_str() {
        let mut host = host.to_lowercase();
        if let Some(stripped) = host.strip_prefix("www.") {
            host = stripped.to_string();
        }
        let _ = url.set_host(Some(&host));
    }

    if url.scheme() == "http" {
        if let Some(host) = url.host_str() {
            if KNOWN_SECURE_HOSTS.iter().any(|h| host == *h || host.ends_with(&format!(".{h}"))) {
                let _ = url.set_scheme("https");
            }
        }
    }

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    params.sort();

    if params.is_empty() {
        url.set_query(None);
    } else {
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    let mut path = url.path().to_string();
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    url.set_path(&path);

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_round_trip() {
        let raw = "HTTP://WWW.Example.com/a/b/?utm_source=x&z=1&a=2#frag";
        let once = canonicalize(raw);
        let twice = canonicalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn strips_www_and_tracking_and_fragment() {
        let out = canonicalize("https://www.example.com/path/?utm_source=news&gclid=abc&keep=1#section");
        assert_eq!(out, "https://example.com/path?keep=1");
    }

    #[test]
    fn sorts_query_params() {
        let out = canonicalize("https://example.com/?z=1&a=2&m=3");
        assert_eq!(out, "https://example.com/?a=2&m=3&z=1");
    }

    #[test]
    fn collapses_trailing_slash() {
        assert_eq!(
            canonicalize("https://example.com/path/"),
            "https://example.com/path"
        );
        assert_eq!(canonicalize("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn forces_https_on_known_secure_host() {
        assert_eq!(
            canonicalize("http://github.com/foo"),
            "https://github.com/foo"
        );
    }
}
