//! Constant label sets shared by every instrument of a set

use crate::error::{MetricsError, MetricsResult};
use std::collections::HashMap;

/// Ordered label set fixed at construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    pairs: Vec<(String, String)>,
}

impl Labels {
    /// Parse an alternating `key, value, key, value, ...` sequence.
    ///
    /// Fails on odd length and on repeated keys.
    pub fn from_pairs<S: AsRef<str>>(labels_and_values: &[S]) -> MetricsResult<Self> {
        if labels_and_values.len() % 2 != 0 {
            return Err(MetricsError::OddLabelValues {
                len: labels_and_values.len(),
            });
        }

        let mut pairs: Vec<(String, String)> = Vec::with_capacity(labels_and_values.len() / 2);
        for chunk in labels_and_values.chunks_exact(2) {
            let key = chunk[0].as_ref();
            if pairs.iter().any(|(k, _)| k == key) {
                return Err(MetricsError::DuplicateLabel(key.to_string()));
            }
            pairs.push((key.to_string(), chunk[1].as_ref().to_string()));
        }

        Ok(Self { pairs })
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True if there are no labels
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Labels in the order they were supplied
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Label map in the shape the Prometheus client expects for constant labels
    pub fn to_const_labels(&self) -> HashMap<String, String> {
        self.pairs.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sequence() {
        let labels = Labels::from_pairs::<&str>(&[]).unwrap();
        assert!(labels.is_empty());
        assert!(labels.to_const_labels().is_empty());
    }

    #[test]
    fn test_pairs_keep_order() {
        let labels = Labels::from_pairs(&["chain_id", "test", "node", "a"]).unwrap();
        let pairs: Vec<_> = labels.iter().collect();
        assert_eq!(pairs, vec![("chain_id", "test"), ("node", "a")]);
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_odd_length_rejected() {
        let err = Labels::from_pairs(&["chain_id", "test", "dangling"]).unwrap_err();
        assert!(matches!(err, MetricsError::OddLabelValues { len: 3 }));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = Labels::from_pairs(&["a", "1", "a", "2"]).unwrap_err();
        assert!(matches!(err, MetricsError::DuplicateLabel(ref k) if k == "a"));
    }

    #[test]
    fn test_owned_strings_accepted() {
        let owned = vec!["k".to_string(), "v".to_string()];
        let labels = Labels::from_pairs(&owned).unwrap();
        assert_eq!(labels.to_const_labels().get("k").map(String::as_str), Some("v"));
    }
}
