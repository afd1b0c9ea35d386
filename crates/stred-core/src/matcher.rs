//! Regex matching over buffer text, with named rule expansion.

use std::collections::HashMap;

use regex::bytes::Regex;
use stred_buffer::{BufferResult, Matcher, Scanner, Span};

use crate::{CoreError, CoreResult};

/// Named pattern fragments registered with `def`.
///
/// A pattern may reference a rule as `<name>`; the reference is
/// replaced by the rule's body (wrapped in a non-capturing group)
/// before compilation. Rules may reference other rules.
pub type RuleSet = HashMap<String, String>;

const MAX_RULE_DEPTH: usize = 32;

/// A compiled pattern ready to run against a scanner.
///
/// Matching is byte-oriented: patterns run on the raw bytes of the
/// buffer, so a buffer need not hold valid UTF-8.
#[derive(Debug)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    /// Compiles `pattern` after expanding `<name>` rule references.
    pub fn new(pattern: &str, rules: &RuleSet) -> CoreResult<Self> {
        let expanded = expand_rules(pattern, rules, 0)?;
        Ok(Self { regex: Regex::new(&expanded)? })
    }

    /// Matcher for the position right after the `n`-th line
    /// terminator; matches the first `n` lines as a whole.
    pub fn line_matcher(n: usize) -> CoreResult<Self> {
        Self::new(&format!("(?:[^\\n]*\\n){{{n}}}"), &RuleSet::new())
    }
}

impl Matcher for PatternMatcher {
    fn find(&self, scanner: &mut Scanner<'_>) -> BufferResult<Option<Vec<Span>>> {
        let mut haystack = Vec::new();
        while let Some(chunk) = scanner.read()? {
            haystack.extend_from_slice(&chunk);
        }
        let Some(captures) = self.regex.captures(&haystack) else {
            return Ok(None);
        };
        let whole = captures.get(0).map_or(0, |m| m.start());
        let spans = captures
            .iter()
            .map(|group| match group {
                Some(m) => Span::new(m.start(), m.end()),
                // unmatched optional group: empty span at the match
                None => Span::at(whole),
            })
            .collect();
        Ok(Some(spans))
    }
}

/// Replaces `<name>` references with their rule bodies. Unknown names
/// are left untouched for the regex compiler to judge.
fn expand_rules(pattern: &str, rules: &RuleSet, depth: usize) -> CoreResult<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(open) = rest.find('<') {
        let (head, tail) = rest.split_at(open);
        out.push_str(head);
        match tail[1..].find('>') {
            Some(close) => {
                let name = &tail[1..1 + close];
                match rules.get(name) {
                    Some(body) => {
                        if depth >= MAX_RULE_DEPTH {
                            return Err(CoreError::RecursiveRule(name.to_string()));
                        }
                        out.push_str("(?:");
                        out.push_str(&expand_rules(body, rules, depth + 1)?);
                        out.push(')');
                    }
                    None => {
                        out.push('<');
                        out.push_str(name);
                        out.push('>');
                    }
                }
                rest = &tail[close + 2..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stred_buffer::TextBuffer;

    fn search(text: &str, pattern: &str) -> Option<Vec<Span>> {
        let mut buf = TextBuffer::from_text(text).unwrap();
        let matcher = PatternMatcher::new(pattern, &RuleSet::new()).unwrap();
        let mut scanner = buf.scanner(0, None).unwrap();
        scanner.search(&matcher).unwrap()
    }

    #[test]
    fn test_simple_match() {
        let spans = search("hello world", "wor").unwrap();
        assert_eq!(spans, vec![Span::new(6, 9)]);
    }

    #[test]
    fn test_capture_groups() {
        let spans = search("ab=cd", "(\\w+)=(\\w+)").unwrap();
        assert_eq!(spans, vec![Span::new(0, 5), Span::new(0, 2), Span::new(3, 5)]);
    }

    #[test]
    fn test_unmatched_group_is_empty_span() {
        let spans = search("xb", "(a)?(x)").unwrap();
        assert_eq!(spans[1], Span::at(0));
        assert_eq!(spans[2], Span::new(0, 1));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(search("hello", "zzz"), None);
    }

    #[test]
    fn test_bad_pattern() {
        assert!(matches!(
            PatternMatcher::new("(unclosed", &RuleSet::new()),
            Err(CoreError::Pattern(_))
        ));
    }

    #[test]
    fn test_rule_expansion() {
        let mut rules = RuleSet::new();
        rules.insert("word".to_string(), "[a-z]+".to_string());
        let matcher = PatternMatcher::new("<word>=<word>", &rules).unwrap();
        let mut buf = TextBuffer::from_text("foo=bar").unwrap();
        let mut scanner = buf.scanner(0, None).unwrap();
        let spans = scanner.search(&matcher).unwrap().unwrap();
        assert_eq!(spans[0], Span::new(0, 7));
    }

    #[test]
    fn test_nested_rules() {
        let mut rules = RuleSet::new();
        rules.insert("digit".to_string(), "[0-9]".to_string());
        rules.insert("number".to_string(), "<digit>+".to_string());
        let matcher = PatternMatcher::new("<number>", &rules).unwrap();
        let mut buf = TextBuffer::from_text("abc123").unwrap();
        let mut scanner = buf.scanner(0, None).unwrap();
        let spans = scanner.search(&matcher).unwrap().unwrap();
        assert_eq!(spans[0], Span::new(3, 6));
    }

    #[test]
    fn test_recursive_rule_rejected() {
        let mut rules = RuleSet::new();
        rules.insert("loop".to_string(), "a<loop>".to_string());
        assert!(matches!(
            PatternMatcher::new("<loop>", &rules),
            Err(CoreError::RecursiveRule(_))
        ));
    }

    #[test]
    fn test_unknown_rule_left_alone() {
        // <x> with no rule is handed to the regex engine untouched
        assert_eq!(
            expand_rules("a<nope>b", &RuleSet::new(), 0).unwrap(),
            "a<nope>b"
        );
    }

    #[test]
    fn test_line_matcher() {
        let mut buf = TextBuffer::from_text("one\ntwo\nthree\n").unwrap();
        let matcher = PatternMatcher::line_matcher(2).unwrap();
        let mut scanner = buf.scanner(0, None).unwrap();
        let spans = scanner.search(&matcher).unwrap().unwrap();
        assert_eq!(spans[0], Span::new(0, 8));
    }
}
