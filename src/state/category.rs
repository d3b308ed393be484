//! Classification outcome buckets for stored images

use std::fmt;

/// Score at or above which an image is filed as `pepe`
pub const PEPE_THRESHOLD: f32 = 0.9;

/// Score at or above which an image is filed as `maybe`
pub const MAYBE_THRESHOLD: f32 = 0.3;

/// Represents the classification state of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Downloaded, not yet scored
    Unclassified,

    /// Score >= 0.9
    Pepe,

    /// 0.3 <= score < 0.9
    Maybe,

    /// Score < 0.3
    NonPepe,

    /// The classifier rejected the file itself (HTTP 500)
    Faulty,
}

impl Category {
    /// Every category, in report order
    pub const ALL: [Category; 5] = [
        Self::Pepe,
        Self::Maybe,
        Self::NonPepe,
        Self::Faulty,
        Self::Unclassified,
    ];

    /// Files a classifier score into its bucket
    ///
    /// # Examples
    ///
    /// ```
    /// use pepe_scout::Category;
    ///
    /// assert_eq!(Category::from_score(0.95), Category::Pepe);
    /// assert_eq!(Category::from_score(0.5), Category::Maybe);
    /// assert_eq!(Category::from_score(0.1), Category::NonPepe);
    /// ```
    pub fn from_score(score: f32) -> Self {
        if score >= PEPE_THRESHOLD {
            Self::Pepe
        } else if score >= MAYBE_THRESHOLD {
            Self::Maybe
        } else {
            Self::NonPepe
        }
    }

    /// Returns true once the classifier has produced a verdict
    pub fn is_classified(&self) -> bool {
        !matches!(self, Self::Unclassified)
    }

    /// Converts the category to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::Pepe => "pepe",
            Self::Maybe => "maybe",
            Self::NonPepe => "non-pepe",
            Self::Faulty => "faulty",
        }
    }

    /// Parses a category from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "unclassified" => Some(Self::Unclassified),
            "pepe" => Some(Self::Pepe),
            "maybe" => Some(Self::Maybe),
            "non-pepe" => Some(Self::NonPepe),
            "faulty" => Some(Self::Faulty),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(Category::from_score(0.95), Category::Pepe);
        assert_eq!(Category::from_score(0.5), Category::Maybe);
        assert_eq!(Category::from_score(0.1), Category::NonPepe);
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(Category::from_score(0.9), Category::Pepe);
        assert_eq!(Category::from_score(0.89), Category::Maybe);
        assert_eq!(Category::from_score(0.3), Category::Maybe);
        assert_eq!(Category::from_score(0.29), Category::NonPepe);
        assert_eq!(Category::from_score(0.0), Category::NonPepe);
        assert_eq!(Category::from_score(1.0), Category::Pepe);
    }

    #[test]
    fn test_db_string_roundtrip() {
        for category in Category::ALL {
            let db_str = category.to_db_string();
            assert_eq!(Category::from_db_string(db_str), Some(category));
        }
    }

    #[test]
    fn test_invalid_db_string() {
        assert_eq!(Category::from_db_string("non_pepe"), None);
        assert_eq!(Category::from_db_string(""), None);
    }

    #[test]
    fn test_is_classified() {
        assert!(!Category::Unclassified.is_classified());
        assert!(Category::Faulty.is_classified());
        assert!(Category::Pepe.is_classified());
    }

    #[test]
    fn test_display() {
        assert_eq!(Category::NonPepe.to_string(), "non-pepe");
    }
}
