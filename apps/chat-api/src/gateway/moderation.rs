//! Blocked-word pre-check applied before a message is dispatched.

/// Sent privately to a sender whose message hit the filter.
pub const SWEAR_WARNING: &str = "Server: Please don't swear.";

/// Case-insensitive substring filter.
///
/// Substring matching also catches longer words that contain a blocked word.
/// That is intended: it is cheap and errs on the side of blocking.
#[derive(Debug, Clone, Default)]
pub struct WordFilter {
    blocked: Vec<String>,
}

impl WordFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let blocked = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { blocked }
    }

    pub fn is_blocked(&self, text: &str) -> bool {
        if self.blocked.is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        self.blocked.iter().any(|word| text.contains(word.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_substrings_case_insensitively() {
        let filter = WordFilter::new(["darn"]);
        assert!(filter.is_blocked("oh darn it"));
        assert!(filter.is_blocked("DARN"));
        assert!(filter.is_blocked("darnedest"));
        assert!(!filter.is_blocked("hello there"));
    }

    #[test]
    fn blank_entries_are_ignored() {
        let filter = WordFilter::new(["", "  "]);
        assert!(filter.is_empty());
        assert!(!filter.is_blocked("anything"));
    }

    #[test]
    fn default_filter_blocks_nothing() {
        assert!(!WordFilter::default().is_blocked("darn"));
    }
}
