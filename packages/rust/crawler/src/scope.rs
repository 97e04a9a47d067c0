//! Which discovered links a crawl may follow.

use regex::Regex;
use url::Url;

use sitesense_shared::CrawlConfig;

/// Scheme and path filters applied to outbound links before they are queued.
/// Host checks live in [`crate::CrawlState`].
pub(crate) struct CrawlScope {
    /// If non-empty, a path must match at least one.
    include_patterns: Vec<Regex>,
    /// A path matching any of these is skipped.
    exclude_patterns: Vec<Regex>,
}

impl CrawlScope {
    pub(crate) fn new(config: &CrawlConfig) -> Self {
        Self {
            include_patterns: config
                .include_patterns
                .iter()
                .filter_map(|p| glob_to_regex(p))
                .collect(),
            exclude_patterns: config
                .exclude_patterns
                .iter()
                .filter_map(|p| glob_to_regex(p))
                .collect(),
        }
    }

    pub(crate) fn allows(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        let path = url.path();
        if self.exclude_patterns.iter().any(|p| p.is_match(path)) {
            return false;
        }
        self.include_patterns.is_empty() || self.include_patterns.iter().any(|p| p.is_match(path))
    }
}

/// Convert a glob-like pattern to a regex. `**` spans segments, `*` does not.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(include: &[&str], exclude: &[&str]) -> CrawlConfig {
        CrawlConfig {
            max_pages: 10,
            fetch_delay: Duration::from_secs(1),
            max_duration: Duration::from_secs(60),
            include_patterns: include.iter().map(|s| s.to_string()).collect(),
            exclude_patterns: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn excludes_win() {
        let scope = CrawlScope::new(&config(&[], &["/blog/**", "/cart"]));
        assert!(!scope.allows(&url("https://shop.example/blog/2024/post")));
        assert!(!scope.allows(&url("https://shop.example/cart")));
        assert!(scope.allows(&url("https://shop.example/products/bowl")));
    }

    #[test]
    fn includes_restrict() {
        let scope = CrawlScope::new(&config(&["/products/*"], &[]));
        assert!(scope.allows(&url("https://shop.example/products/bowl")));
        assert!(!scope.allows(&url("https://shop.example/products/bowls/tea")));
        assert!(!scope.allows(&url("https://shop.example/about")));
    }

    #[test]
    fn non_http_schemes_rejected() {
        let scope = CrawlScope::new(&config(&[], &[]));
        assert!(!scope.allows(&url("ftp://shop.example/file")));
        assert!(scope.allows(&url("http://shop.example/")));
    }
}
