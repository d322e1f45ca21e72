//! Test name matching against operator-supplied patterns
//!
//! A pattern is tried as a regular expression first (unanchored search).
//! Anything that does not compile is read as a glob anchored at both ends,
//! where each `*` matches any sequence, `?` any single character, and every
//! other character (including `.`) only itself.

use regex::Regex;
use tracing::warn;

/// A resolved test name pattern
#[derive(Debug, Clone)]
pub enum TestPattern {
    Regex(Regex),
    /// Glob translated to an anchored regex
    Glob(Regex),
    /// Neither a valid regex nor a valid glob; matches nothing
    Invalid(String),
}

impl TestPattern {
    /// Resolve a raw pattern string
    pub fn compile(raw: &str) -> Self {
        if let Ok(re) = Regex::new(raw) {
            return TestPattern::Regex(re);
        }

        match glob_to_regex(raw) {
            Ok(glob) => TestPattern::Glob(glob),
            Err(e) => {
                warn!("Ignoring test pattern {:?}: not a regex or glob ({})", raw, e);
                TestPattern::Invalid(raw.to_string())
            }
        }
    }

    pub fn matches(&self, test_name: &str) -> bool {
        match self {
            TestPattern::Regex(re) => re.is_match(test_name),
            TestPattern::Glob(glob) => glob.is_match(test_name),
            TestPattern::Invalid(_) => false,
        }
    }
}

fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut translated = String::with_capacity(glob.len() * 2 + 2);
    translated.push('^');
    for c in glob.chars() {
        match c {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            _ => translated.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    translated.push('$');
    Regex::new(&translated)
}

/// A compiled list of patterns
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<TestPattern>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(raw: &[S]) -> Self {
        Self {
            patterns: raw.iter().map(|p| TestPattern::compile(p.as_ref())).collect(),
        }
    }

    /// True if any pattern matches; an empty set matches nothing
    pub fn matches_any(&self, test_name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(test_name))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

/// Check a test name against a single raw pattern
pub fn matches_pattern(test_name: &str, pattern: &str) -> bool {
    TestPattern::compile(pattern).matches(test_name)
}

/// Check if a test matches any exclusion pattern
pub fn is_excluded<S: AsRef<str>>(test_name: &str, exclude_patterns: &[S]) -> bool {
    exclude_patterns
        .iter()
        .any(|p| matches_pattern(test_name, p.as_ref()))
}

/// Check if a test matches any critical pattern
pub fn is_critical<S: AsRef<str>>(test_name: &str, critical_patterns: &[S]) -> bool {
    critical_patterns
        .iter()
        .any(|p| matches_pattern(test_name, p.as_ref()))
}
