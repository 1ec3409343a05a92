//! Expected-output patterns.
//!
//! A [`Pattern`] makes the matching semantics explicit at the type level:
//! either a literal substring or a regular expression, both evaluated as a
//! search over the buffered stream (never an anchored match).

use std::fmt;

use shprobe_types::HarnessError;

/// A pattern the synchronizer waits for in the output stream.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Match if the buffer contains this exact substring.
    Literal(String),
    /// Match if the regex finds a match anywhere in the buffer.
    Regex(regex::Regex),
}

impl Pattern {
    /// Build a literal pattern.
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    /// Compile a regex pattern.
    pub fn regex(pattern: &str) -> Result<Self, HarnessError> {
        Ok(Pattern::Regex(regex::Regex::new(pattern)?))
    }

    /// Search `haystack` and return the byte span of the first match.
    pub fn find(&self, haystack: &str) -> Option<(usize, usize)> {
        match self {
            Pattern::Literal(needle) => haystack
                .find(needle.as_str())
                .map(|start| (start, start + needle.len())),
            Pattern::Regex(re) => re.find(haystack).map(|m| (m.start(), m.end())),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(text) => write!(f, "{text:?}"),
            Pattern::Regex(re) => write!(f, "pattern: {}", re.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_finds_substring() {
        let p = Pattern::literal("cush> ");
        assert_eq!(p.find("some output\ncush> "), Some((12, 18)));
        assert_eq!(p.find("no prompt here"), None);
    }

    #[test]
    fn literal_is_a_search_not_anchored() {
        let p = Pattern::literal("ls");
        // Matches in the middle, surrounded by other text.
        assert!(p.find("1  ls\n2  ls | grep c\n").is_some());
    }

    #[test]
    fn regex_finds_span() {
        let p = Pattern::regex(r"\d+ +ls").expect("compile");
        let haystack = "history:\n1  ls\n";
        let (start, end) = p.find(haystack).expect("should match");
        assert_eq!(&haystack[start..end], "1  ls");
    }

    #[test]
    fn invalid_regex_is_an_error() {
        assert!(matches!(
            Pattern::regex("(unclosed"),
            Err(HarnessError::Regex(_))
        ));
    }
}
