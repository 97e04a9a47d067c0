//! BFS bookkeeping: the frontier queue and the visited set.

use std::collections::{HashSet, VecDeque};

use url::Url;

/// Canonical form used for dedup and host comparison.
///
/// Scheme, host, port, path, and query are kept; the fragment is dropped.
/// The `url` crate already lowercases scheme and host.
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized.to_string()
}

/// Per-crawl traversal state. Owned by exactly one crawl invocation.
#[derive(Debug)]
pub struct CrawlState {
    base_host: String,
    frontier: VecDeque<Url>,
    /// Normalized URLs already dequeued.
    visited: HashSet<String>,
    /// Normalized URLs ever enqueued, so a link is queued at most once.
    queued: HashSet<String>,
    visit_order: Vec<String>,
    extracted: usize,
}

impl CrawlState {
    /// Seed the frontier with `seed`.
    pub fn new(seed: &Url) -> Self {
        let mut state = Self {
            base_host: seed.host_str().unwrap_or_default().to_string(),
            frontier: VecDeque::new(),
            visited: HashSet::new(),
            queued: HashSet::new(),
            visit_order: Vec::new(),
            extracted: 0,
        };
        state.enqueue(seed.clone());
        state
    }

    pub fn base_host(&self) -> &str {
        &self.base_host
    }

    /// Move the crawl onto `url`'s host, e.g. after the seed redirected
    /// from the apex domain to `www`.
    pub fn rebase(&mut self, url: &Url) {
        if let Some(host) = url.host_str() {
            self.base_host = host.to_string();
        }
    }

    /// Whether `url` lives on the seed host.
    pub fn is_same_host(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|h| h == self.base_host)
    }

    /// Queue `url` unless it is off-host, already visited, or already queued.
    /// Returns whether it was added.
    pub fn enqueue(&mut self, mut url: Url) -> bool {
        url.set_fragment(None);
        if !self.is_same_host(&url) {
            return false;
        }
        let key = normalize_url(&url);
        if self.visited.contains(&key) || !self.queued.insert(key) {
            return false;
        }
        self.frontier.push_back(url);
        true
    }

    /// Pop the next unvisited URL and mark it visited.
    pub fn next_unvisited(&mut self) -> Option<Url> {
        while let Some(url) = self.frontier.pop_front() {
            let key = normalize_url(&url);
            if self.visited.insert(key.clone()) {
                self.visit_order.push(key);
                return Some(url);
            }
        }
        None
    }

    /// Mark an extra URL (e.g. a redirect target) as visited.
    pub fn mark_visited(&mut self, url: &Url) {
        let key = normalize_url(url);
        if self.visited.insert(key.clone()) {
            self.queued.insert(key);
        }
    }

    pub fn record_extracted(&mut self) {
        self.extracted += 1;
    }

    pub fn extracted(&self) -> usize {
        self.extracted
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn is_frontier_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Normalized URLs in the order they were dequeued.
    pub fn into_visit_order(self) -> Vec<String> {
        self.visit_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn normalize_strips_fragment_keeps_query() {
        assert_eq!(
            normalize_url(&url("HTTPS://Shop.Example/items?page=2#reviews")),
            "https://shop.example/items?page=2"
        );
        assert_ne!(
            normalize_url(&url("https://shop.example/items?page=2")),
            normalize_url(&url("https://shop.example/items?page=3"))
        );
    }

    #[test]
    fn fifo_order_and_dedup() {
        let mut state = CrawlState::new(&url("https://shop.example/"));
        assert!(state.enqueue(url("https://shop.example/a")));
        assert!(state.enqueue(url("https://shop.example/b")));
        assert!(!state.enqueue(url("https://shop.example/a#top")));
        assert!(!state.enqueue(url("https://other.example/c")));

        assert_eq!(state.next_unvisited().unwrap().as_str(), "https://shop.example/");
        assert_eq!(state.next_unvisited().unwrap().as_str(), "https://shop.example/a");
        // Already visited pages are never re-queued.
        assert!(!state.enqueue(url("https://shop.example/")));
        assert_eq!(state.next_unvisited().unwrap().as_str(), "https://shop.example/b");
        assert!(state.next_unvisited().is_none());

        assert_eq!(
            state.into_visit_order(),
            vec![
                "https://shop.example/".to_string(),
                "https://shop.example/a".to_string(),
                "https://shop.example/b".to_string(),
            ]
        );
    }

    #[test]
    fn redirect_targets_count_as_visited() {
        let mut state = CrawlState::new(&url("https://shop.example/"));
        state.mark_visited(&url("https://shop.example/home"));
        assert!(!state.enqueue(url("https://shop.example/home")));
    }

    #[test]
    fn rebase_moves_host_check() {
        let mut state = CrawlState::new(&url("https://shop.example/"));
        state.rebase(&url("https://www.shop.example/"));
        assert_eq!(state.base_host(), "www.shop.example");
        assert!(state.enqueue(url("https://www.shop.example/a")));
        assert!(!state.enqueue(url("https://shop.example/b")));
    }
}
