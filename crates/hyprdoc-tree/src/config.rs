//! Engine tuning knobs.

use serde::{Deserialize, Serialize};

/// Limits applied by [`BlockArena`](crate::BlockArena) mutations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Narrowest a column may be resized to, in percent.
    pub min_column_width: f64,
    /// Deepest nesting accepted by insert, move, and split (roots are depth 0).
    pub max_depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            min_column_width: 10.0,
            max_depth: 32,
        }
    }
}

impl TreeConfig {
    /// Narrowest a column may be in a row of `columns` columns.
    ///
    /// Shrinks below `min_column_width` when the row is too crowded for
    /// every column to get it.
    pub fn min_column_width_for(&self, columns: usize) -> f64 {
        self.min_column_width.min(100.0 / columns.max(1) as f64)
    }

    /// Widest a single column may be in a row of `columns` columns.
    ///
    /// Never below [`min_column_width_for`](Self::min_column_width_for),
    /// whatever the rounding.
    pub fn max_column_width(&self, columns: usize) -> f64 {
        if columns <= 1 {
            return 100.0;
        }
        let min = self.min_column_width_for(columns);
        (100.0 - min * (columns - 1) as f64).max(min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_column_width() {
        let config = TreeConfig::default();
        assert_eq!(config.max_column_width(1), 100.0);
        assert_eq!(config.max_column_width(2), 90.0);
        assert_eq!(config.max_column_width(4), 70.0);
    }

    #[test]
    fn test_crowded_row_bounds_never_cross() {
        let config = TreeConfig::default();
        for n in 1..=40 {
            let min = config.min_column_width_for(n);
            let max = config.max_column_width(n);
            assert!(min <= max, "{n} columns: min {min} > max {max}");
            assert!(min * n as f64 <= 100.0 + 1e-9);
        }
        assert_eq!(config.min_column_width_for(4), 10.0);
        assert_eq!(config.min_column_width_for(20), 5.0);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: TreeConfig = serde_json::from_str(r#"{"max_depth": 8}"#).unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.min_column_width, 10.0);
    }
}
