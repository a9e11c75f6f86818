use log::warn;
use regex::{Regex, RegexBuilder};

/// Text predicate behind the search seam. The controller only sees this
/// trait, so the matching engine can be swapped without touching it.
pub trait NodeMatcher {
    fn matches(&self, text: &str) -> bool;
}

/// Case-insensitive regex-fragment matcher, the default engine.
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Option<Self> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .ok()
            .map(|regex| Self { regex })
    }
}

impl NodeMatcher for RegexMatcher {
    fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Case-insensitive substring matcher, used when the pattern is not a valid
/// regex so that search never fails.
pub struct SubstringMatcher {
    needle: String,
}

impl SubstringMatcher {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_lowercase(),
        }
    }
}

impl NodeMatcher for SubstringMatcher {
    fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.needle)
    }
}

/// Compile the user's pattern, degrading to substring matching when it does
/// not parse as a regex.
pub fn compile_pattern(pattern: &str) -> Box<dyn NodeMatcher> {
    match RegexMatcher::new(pattern) {
        Some(matcher) => Box::new(matcher),
        None => {
            warn!("search pattern {pattern:?} is not a valid regex; matching as substring");
            Box::new(SubstringMatcher::new(pattern))
        }
    }
}
