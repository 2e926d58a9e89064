//! Suggestion heuristics for unmatched filenames.
//!
//! When no rule matches, the engine guesses a category from common naming
//! conventions and proposes a generalized pattern an operator can promote.
//! Heuristics run on the case-folded file name, first applicable wins:
//!
//! 1. `cover` / `hyoushi` anywhere: cover
//! 2. `kuchie` anywhere, or a `k`/`kc`/`kuchi` numbered prefix: kuchie
//! 3. `illust` anywhere, or a single letter followed by `-`/`_`: illustration
//! 4. letters + digits + image extension: illustration (low confidence)

use crate::classifier::file_name_of;
use pp_common::Category;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A guessed category and the pattern that would capture similar files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: Option<Category>,
    pub pattern: Option<String>,
    pub rationale: String,
    #[serde(default)]
    pub low_confidence: bool,
}

impl Suggestion {
    fn none() -> Self {
        Self {
            category: None,
            pattern: None,
            rationale: "no naming convention recognized".to_string(),
            low_confidence: false,
        }
    }
}

/// Holds the compiled heuristic patterns.
#[derive(Debug, Clone)]
pub struct SuggestionEngine {
    /// `k-01.jpg`, `kc02.png`, `kuchi_3.jpg`
    plate_prefix: Regex,
    /// `i-003.jpg`, `p_12.png`
    letter_separator: Regex,
    /// `p012.jpg`, `img_7.webp`
    generic_shape: Regex,
    digit_run: Regex,
}

impl Default for SuggestionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionEngine {
    pub fn new() -> Self {
        Self {
            plate_prefix: Regex::new(r"^(?:k|kc|kuchi)[-_]?\d+\.").unwrap(),
            letter_separator: Regex::new(r"^[a-z][-_]").unwrap(),
            generic_shape: Regex::new(r"^[a-z]+[-_]?\d+\.(?:jpe?g|png|gif|webp|bmp)$").unwrap(),
            digit_run: Regex::new(r"\d+").unwrap(),
        }
    }

    /// Suggest a category and pattern for an unmatched filename.
    pub fn suggest(&self, filename: &str) -> Suggestion {
        let name = file_name_of(filename).trim().to_lowercase();
        if name.is_empty() {
            return Suggestion::none();
        }

        let (category, rationale, low_confidence) =
            if name.contains("cover") || name.contains("hyoushi") {
                (Category::Cover, "filename mentions cover/hyoushi", false)
            } else if name.contains("kuchie") || self.plate_prefix.is_match(&name) {
                (Category::Plate, "filename uses a kuchie prefix", false)
            } else if name.contains("illust") || self.letter_separator.is_match(&name) {
                (
                    Category::Illustration,
                    "filename uses an illustration prefix",
                    false,
                )
            } else if self.generic_shape.is_match(&name) {
                (
                    Category::Illustration,
                    "low confidence: generic letters+digits image name",
                    true,
                )
            } else {
                return Suggestion::none();
            };

        Suggestion {
            category: Some(category),
            pattern: Some(self.generalize(&name)),
            rationale: rationale.to_string(),
            low_confidence,
        }
    }

    /// Turn a concrete filename into an anchored pattern: literals escaped,
    /// digit runs in the stem widened to `\d+`, `jpg`/`jpeg` to `jpe?g`.
    pub fn generalize(&self, filename: &str) -> String {
        let (stem, ext) = match filename.rfind('.') {
            Some(idx) if idx > 0 => (&filename[..idx], Some(&filename[idx + 1..])),
            _ => (filename, None),
        };

        let mut pattern = String::with_capacity(filename.len() + 8);
        pattern.push('^');

        let mut last = 0;
        for run in self.digit_run.find_iter(stem) {
            pattern.push_str(&escape_literal(&stem[last..run.start()]));
            pattern.push_str(r"\d+");
            last = run.end();
        }
        pattern.push_str(&escape_literal(&stem[last..]));

        if let Some(ext) = ext {
            pattern.push_str(r"\.");
            match ext {
                "jpg" | "jpeg" => pattern.push_str("jpe?g"),
                other => pattern.push_str(&escape_literal(other)),
            }
        }

        pattern.push('$');
        pattern
    }
}

/// Escape regex metacharacters. `-` and `_` stay as-is so patterns read like
/// the filenames they came from.
fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
