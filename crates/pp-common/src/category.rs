//! Image categories.
//!
//! Every extracted image is sorted into one of four categories. The plate
//! category is stored as `kuchie` on the wire (the Japanese term for the
//! colour frontispiece pages bound at the front of a light novel), while
//! `plate` is accepted as an input synonym.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Semantic role of an image inside a publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Artwork that must not be carried over (gaiji glyphs, logos, ads).
    Exclude,
    /// Front cover.
    Cover,
    /// Frontispiece plate.
    #[serde(rename = "kuchie", alias = "plate")]
    Plate,
    /// Interior illustration.
    Illustration,
}

impl Category {
    /// All categories in evaluation order.
    pub const ALL: [Category; 4] = [
        Category::Exclude,
        Category::Cover,
        Category::Plate,
        Category::Illustration,
    ];

    /// Name used in persisted documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exclude => "exclude",
            Self::Cover => "cover",
            Self::Plate => "kuchie",
            Self::Illustration => "illustration",
        }
    }

    /// Position in [`Category::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Self::Exclude => 0,
            Self::Cover => 1,
            Self::Plate => 2,
            Self::Illustration => 3,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid category '{0}' (expected exclude, cover, kuchie/plate, or illustration)")]
pub struct CategoryParseError(pub String);

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclude" => Ok(Self::Exclude),
            "cover" => Ok(Self::Cover),
            "kuchie" | "plate" => Ok(Self::Plate),
            "illustration" => Ok(Self::Illustration),
            _ => Err(CategoryParseError(s.to_string())),
        }
    }
}
