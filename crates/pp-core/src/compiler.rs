//! Rule compilation.
//!
//! A stored [`RuleDefinition`] becomes a [`CompiledRule`] wrapping a
//! `regex::Regex`. Failures are per rule: the rule set builder skips the
//! offending rule and keeps going.

use pp_common::Category;
use pp_config::RuleDefinition;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Upper bound on compiled program size for a single rule.
const RULE_SIZE_LIMIT: usize = 1 << 20;

/// Why a single pattern failed to compile.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("empty pattern")]
    EmptyPattern,

    #[error("unsupported flag '{0}'")]
    UnsupportedFlag(String),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// A rule from the database that could not be compiled.
#[derive(Debug, Clone, Error)]
#[error("{publisher}/{category}: cannot compile pattern '{pattern}': {source}")]
pub struct PatternCompileError {
    pub publisher: String,
    pub category: Category,
    pub pattern: String,
    #[source]
    pub source: CompileError,
}

impl From<PatternCompileError> for pp_common::Error {
    fn from(err: PatternCompileError) -> Self {
        pp_common::Error::PatternCompile(err.to_string())
    }
}

/// Parsed rule flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleFlags {
    pub case_insensitive: bool,
}

impl RuleFlags {
    /// Parse a flag string.
    ///
    /// Tokens may be separated by commas, pipes, or whitespace. `i`,
    /// `ignorecase` and `re.ignorecase` (any case) turn on case-insensitive
    /// matching. The empty string means no flags.
    pub fn parse(flags: &str) -> Result<Self, CompileError> {
        let mut parsed = RuleFlags::default();
        for token in flags
            .split(|c: char| c == ',' || c == '|' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            match token.to_ascii_lowercase().as_str() {
                "i" | "ignorecase" | "re.ignorecase" | "re.i" => parsed.case_insensitive = true,
                _ => return Err(CompileError::UnsupportedFlag(token.to_string())),
            }
        }
        Ok(parsed)
    }
}

/// Compile pattern text with a flag string.
pub fn compile_pattern(pattern: &str, flags: &str) -> Result<Regex, CompileError> {
    if pattern.is_empty() {
        return Err(CompileError::EmptyPattern);
    }
    let flags = RuleFlags::parse(flags)?;
    Ok(RegexBuilder::new(pattern)
        .case_insensitive(flags.case_insensitive)
        .size_limit(RULE_SIZE_LIMIT)
        .build()?)
}

/// An executable rule.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    regex: Regex,
    pub priority: u32,
    pub pattern: String,
    pub note: Option<String>,
}

impl CompiledRule {
    pub fn compile(rule: &RuleDefinition) -> Result<Self, CompileError> {
        Ok(Self {
            regex: compile_pattern(&rule.pattern, &rule.flags)?,
            priority: rule.priority,
            pattern: rule.pattern.clone(),
            note: rule.note.clone(),
        })
    }

    pub fn is_match(&self, filename: &str) -> bool {
        self.regex.is_match(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_parse() {
        assert_eq!(RuleFlags::parse("").unwrap(), RuleFlags::default());
        assert!(RuleFlags::parse("i").unwrap().case_insensitive);
        assert!(RuleFlags::parse("IGNORECASE").unwrap().case_insensitive);
        assert!(RuleFlags::parse("re.IGNORECASE").unwrap().case_insensitive);
        assert!(matches!(
            RuleFlags::parse("i, x"),
            Err(CompileError::UnsupportedFlag(ref f)) if f == "x"
        ));
    }

    #[test]
    fn test_case_sensitivity() {
        let sensitive = compile_pattern(r"^cover\.jpg$", "").unwrap();
        assert!(!sensitive.is_match("COVER.JPG"));
        let insensitive = compile_pattern(r"^cover\.jpg$", "i").unwrap();
        assert!(insensitive.is_match("COVER.JPG"));
    }

    #[test]
    fn test_invalid_and_empty_patterns() {
        assert!(matches!(
            compile_pattern("^(unclosed", ""),
            Err(CompileError::Regex(_))
        ));
        assert!(matches!(
            compile_pattern("", "i"),
            Err(CompileError::EmptyPattern)
        ));
    }

    #[test]
    fn test_compiled_rule_keeps_metadata() {
        let def = RuleDefinition::new(r"^i[-_]\d+\.jpe?g$", 3)
            .with_flags("i")
            .with_note("interior");
        let rule = CompiledRule::compile(&def).unwrap();
        assert_eq!(rule.priority, 3);
        assert_eq!(rule.note.as_deref(), Some("interior"));
        assert!(rule.is_match("I-003.JPG"));
        assert!(!rule.is_match("cover.jpg"));
    }
}
