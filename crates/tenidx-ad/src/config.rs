//! Graph builder configuration

/// Settings that change how operators record nodes.
///
/// # Examples
///
/// ```
/// use tenidx_ad::GraphConfig;
///
/// let config = GraphConfig::new().concat_fuse_threshold(4);
/// assert_eq!(config.concat_fuse_threshold, 4);
/// assert!(config.index_fusion_barriers);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphConfig {
    /// Number of concat inputs from which every embedding is a fusion barrier
    pub concat_fuse_threshold: usize,
    /// Place fusion barriers around indexing reads and writes
    pub index_fusion_barriers: bool,
    /// Value read by indexing for out-of-range gather coordinates
    pub overflow_value: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            concat_fuse_threshold: 10,
            index_fusion_barriers: true,
            overflow_value: 0.0,
        }
    }
}

impl GraphConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concat barrier threshold
    pub fn concat_fuse_threshold(mut self, threshold: usize) -> Self {
        self.concat_fuse_threshold = threshold;
        self
    }

    /// Enable or disable indexing barriers
    pub fn index_fusion_barriers(mut self, enabled: bool) -> Self {
        self.index_fusion_barriers = enabled;
        self
    }

    /// Set the out-of-range read value
    pub fn overflow_value(mut self, value: f64) -> Self {
        self.overflow_value = value;
        self
    }
}
