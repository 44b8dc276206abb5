//! Screening configuration
//!
//! Loaded from an optional TOML file, then individual fields are overridden
//! from the command line. Every field has a default so a partial file is valid.

use crate::error::{Result, ScreenError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Names of the input columns the screener reads
///
/// Defaults follow the Medicaid provider spending extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub billing_provider_id: String,
    pub hcpcs_code: String,
    pub claim_month: String,
    pub total_unique_beneficiaries: String,
    pub total_claims: String,
    pub total_paid: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            billing_provider_id: "BILLING_PROVIDER_NPI_NUM".to_string(),
            hcpcs_code: "HCPCS_CODE".to_string(),
            claim_month: "CLAIM_FROM_MONTH".to_string(),
            total_unique_beneficiaries: "TOTAL_UNIQUE_BENEFICIARIES".to_string(),
            total_claims: "TOTAL_CLAIMS".to_string(),
            total_paid: "TOTAL_PAID".to_string(),
        }
    }
}

impl ColumnMap {
    /// Header matching the layout of [`crate::record::ClaimRow::from_record`]
    pub fn default_header(&self) -> Vec<String> {
        vec![
            self.billing_provider_id.clone(),
            self.hcpcs_code.clone(),
            self.claim_month.clone(),
            self.total_unique_beneficiaries.clone(),
            self.total_claims.clone(),
            self.total_paid.clone(),
        ]
    }

    fn names(&self) -> [&str; 6] {
        [
            &self.billing_provider_id,
            &self.hcpcs_code,
            &self.claim_month,
            &self.total_unique_beneficiaries,
            &self.total_claims,
            &self.total_paid,
        ]
    }
}

/// Configuration for peer-group IQR screening
///
/// # Example
/// ```
/// use claimscreen::config::ScreeningConfig;
///
/// let config = ScreeningConfig::default();
/// assert_eq!(config.min_group_size, 4);
/// assert_eq!(config.iqr_multiplier, 1.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Minimum number of present values needed to score a metric in a group
    ///
    /// Also the minimum number of distinct providers a group needs before any
    /// metric is scored. Quartiles over fewer than 4 points are unreliable.
    pub min_group_size: usize,

    /// Multiplier applied to the IQR above Q3 to get the upper bound
    ///
    /// 1.5 is Tukey's fence; 3.0 is the "far out" fence.
    pub iqr_multiplier: f64,

    /// Classification worker threads (1 = classify on the reading thread)
    pub workers: usize,

    /// Closed groups buffered between the segmenter and the workers
    pub queue_capacity: usize,

    /// Write results in the order groups appeared in the input
    ///
    /// With `false` and `workers > 1`, groups are written as they finish.
    /// Flags are identical either way; only the row order differs between runs.
    pub ordered_output: bool,

    pub columns: ColumnMap,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            min_group_size: 4,
            iqr_multiplier: 1.5,
            workers: 1,
            queue_capacity: 64,
            ordered_output: true,
            columns: ColumnMap::default(),
        }
    }
}

impl ScreeningConfig {
    /// Far-out fence on larger groups: fewer, more extreme flags
    pub fn strict() -> Self {
        Self {
            min_group_size: 8,
            iqr_multiplier: 3.0,
            ..Self::default()
        }
    }

    /// Tighter fence: more flags, for exploratory review
    pub fn permissive() -> Self {
        Self {
            min_group_size: 4,
            iqr_multiplier: 1.0,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ScreenError::InvalidConfig(format!("failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.min_group_size < 2 {
            return Err(ScreenError::InvalidConfig(format!(
                "min_group_size must be >= 2 to form quartiles, got {}",
                self.min_group_size
            )));
        }

        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(ScreenError::InvalidConfig(format!(
                "iqr_multiplier must be a finite non-negative number, got {}",
                self.iqr_multiplier
            )));
        }

        if self.workers == 0 {
            return Err(ScreenError::InvalidConfig(
                "workers must be >= 1".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(ScreenError::InvalidConfig(
                "queue_capacity must be >= 1".to_string(),
            ));
        }

        let names = self.columns.names();
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ScreenError::InvalidConfig(
                    "column names must not be empty".to_string(),
                ));
            }
            if names[..i].contains(name) {
                return Err(ScreenError::InvalidConfig(format!(
                    "column '{}' is mapped more than once",
                    name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScreeningConfig::default();
        assert_eq!(config.min_group_size, 4);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.workers, 1);
        assert!(config.ordered_output);
        assert_eq!(config.columns.total_paid, "TOTAL_PAID");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_validate() {
        let strict = ScreeningConfig::strict();
        assert_eq!(strict.iqr_multiplier, 3.0);
        assert_eq!(strict.min_group_size, 8);
        assert!(strict.validate().is_ok());

        let permissive = ScreeningConfig::permissive();
        assert_eq!(permissive.iqr_multiplier, 1.0);
        assert!(permissive.validate().is_ok());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_min_group_size() {
        let mut config = ScreeningConfig::default();
        config.min_group_size = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_multiplier() {
        let mut config = ScreeningConfig::default();
        config.iqr_multiplier = -0.5;
        assert!(config.validate().is_err());
        config.iqr_multiplier = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_workers_and_queue() {
        let mut config = ScreeningConfig::default();
        config.workers = 0;
        assert!(config.validate().is_err());

        let mut config = ScreeningConfig::default();
        config.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_duplicate_column_rejected() {
        let mut config = ScreeningConfig::default();
        config.columns.total_claims = "TOTAL_PAID".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("TOTAL_PAID"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ScreeningConfig::from_toml_str(
            r#"
iqr_multiplier = 3.0
workers = 4

[columns]
billing_provider_id = "NPI"
"#,
        )
        .unwrap();
        assert_eq!(config.iqr_multiplier, 3.0);
        assert_eq!(config.workers, 4);
        assert_eq!(config.min_group_size, 4);
        assert_eq!(config.columns.billing_provider_id, "NPI");
        assert_eq!(config.columns.hcpcs_code, "HCPCS_CODE");
    }

    #[test]
    fn test_invalid_toml_values_rejected() {
        assert!(ScreeningConfig::from_toml_str("min_group_size = 0").is_err());
        assert!(ScreeningConfig::from_toml_str("iqr_multiplier = \"wide\"").is_err());
    }
}
