//! The closed set of emotion labels the service reports.

/// Labels the classifier is prompted to choose from, in prompt order.
pub const ALLOWED_EMOTIONS: [&str; 7] = [
    "happy",
    "sad",
    "angry",
    "surprised",
    "neutral",
    "fearful",
    "disgusted",
];

/// Fallback label when the classifier fails or returns something unusable.
pub const NEUTRAL: &str = "neutral";

/// Whether a label belongs to the closed emotion set.
pub fn is_allowed(label: &str) -> bool {
    ALLOWED_EMOTIONS.contains(&label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_labels() {
        assert!(is_allowed("happy"));
        assert!(is_allowed("disgusted"));
        assert!(is_allowed(NEUTRAL));
    }

    #[test]
    fn test_rejected_labels() {
        assert!(!is_allowed("perplexed"));
        assert!(!is_allowed("Happy"));
        assert!(!is_allowed(""));
    }
}
