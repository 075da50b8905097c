//! DLP pattern rules applied to whole-file content.
//!
//! Rules are held in an ordered list and evaluated front to back; the first
//! rule that matches names the incident. A file is never tagged with more
//! than one reason.

use regex::Regex;

/// Rule name for US social security numbers.
pub const SSN_DETECTED: &str = "SSN_DETECTED";
/// Rule name for 16-digit payment card numbers.
pub const CREDIT_CARD: &str = "CREDIT_CARD";

const SSN_PATTERN: &str = r"\b\d{3}-\d{2}-\d{4}\b";
const CREDIT_CARD_PATTERN: &str = r"\b(?:\d{4}[ -]?){3}\d{4}\b";

/// A named content predicate.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    regex: Regex,
}

impl Rule {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_match(&self, content: &str) -> bool {
        self.regex.is_match(content)
    }
}

/// Ordered rule set. Iteration order is evaluation order.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The built-in rules: `SSN_DETECTED` first, then `CREDIT_CARD`.
    pub fn builtin() -> Self {
        let rules = [(SSN_DETECTED, SSN_PATTERN), (CREDIT_CARD, CREDIT_CARD_PATTERN)]
            .into_iter()
            .map(|(name, pattern)| Rule::new(name, pattern).expect("built-in pattern compiles"))
            .collect();
        Self { rules }
    }

    /// Return the first rule that matches `content`, if any.
    pub fn first_match(&self, content: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.is_match(content))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(Rule::name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Decode file bytes as UTF-8, dropping any bytes that are not valid UTF-8.
///
/// Invalid sequences are skipped rather than replaced, so text on either side
/// of a stray byte is joined.
pub fn decode_content(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => String::from_utf8_lossy(bytes)
            .chars()
            .filter(|&c| c != char::REPLACEMENT_CHARACTER)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let rules = RuleSet::builtin();
        let names: Vec<&str> = rules.names().collect();
        assert_eq!(names, vec![SSN_DETECTED, CREDIT_CARD]);
    }

    #[test]
    fn test_ssn_shapes() {
        let rules = RuleSet::builtin();
        let hit = |s: &str| rules.first_match(s).map(|r| r.name().to_string());

        assert_eq!(hit("SSN: 000-00-0000").as_deref(), Some(SSN_DETECTED));
        assert_eq!(hit("123-45-6789").as_deref(), Some(SSN_DETECTED));
        assert_eq!(hit("(123-45-6789)").as_deref(), Some(SSN_DETECTED));

        // Wrong group widths or glued to other digits.
        assert_eq!(hit("12-345-6789"), None);
        assert_eq!(hit("1123-45-6789"), None);
        assert_eq!(hit("123-45-67890"), None);
        assert_eq!(hit("x123-45-6789"), None);
    }

    #[test]
    fn test_credit_card_shapes() {
        let rules = RuleSet::builtin();
        let hit = |s: &str| rules.first_match(s).map(|r| r.name().to_string());

        assert_eq!(hit("card 4111-1111-1111-1111").as_deref(), Some(CREDIT_CARD));
        assert_eq!(hit("card 4111 1111 1111 1111").as_deref(), Some(CREDIT_CARD));
        assert_eq!(hit("card 4111111111111111").as_deref(), Some(CREDIT_CARD));
        assert_eq!(hit("card 4111-1111 11111111").as_deref(), Some(CREDIT_CARD));

        assert_eq!(hit("4111-1111-1111"), None);
        assert_eq!(hit("4111--1111-1111-1111"), None);
        assert_eq!(hit("41111111111111112"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let rules = RuleSet::builtin();
        let content = "card 4111-1111-1111-1111 and ssn 123-45-6789";
        assert_eq!(rules.first_match(content).unwrap().name(), SSN_DETECTED);
    }

    #[test]
    fn test_clean_content() {
        let rules = RuleSet::builtin();
        assert!(rules.first_match("quarterly roadmap, nothing to see").is_none());
        assert!(rules.first_match("").is_none());
    }

    #[test]
    fn test_custom_rule_set_order() {
        let rules = RuleSet::new(vec![
            Rule::new("SECOND_FIRST", r"secret").unwrap(),
            Rule::new("NEVER", r"secret").unwrap(),
        ]);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.first_match("top secret").unwrap().name(), "SECOND_FIRST");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(Rule::new("BROKEN", r"(unclosed").is_err());
    }

    #[test]
    fn test_decode_content_drops_invalid_bytes() {
        assert_eq!(decode_content(b"plain"), "plain");

        let mut bytes = b"123".to_vec();
        bytes.push(0xFF);
        bytes.extend_from_slice(b"-45-6789");
        let decoded = decode_content(&bytes);
        assert_eq!(decoded, "123-45-6789");
        assert!(RuleSet::builtin().first_match(&decoded).is_some());
    }
}
