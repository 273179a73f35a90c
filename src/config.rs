use log::LevelFilter;
use std::env;
use thiserror::Error;

use crate::amortization::DEFAULT_AFFORDABILITY_RATIO;
use crate::eligibility::{
    EligibilityPolicy, DEFAULT_LENDERS, DEFAULT_RECOMMENDATION_COUNT, MAX_RECOMMENDED_LENDERS,
};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("LOAN_AFFORDABILITY_RATIO must be a number in (0, 1], got {0:?}")]
    InvalidAffordabilityRatio(String),
    #[error("LOAN_RECOMMENDATION_COUNT must be an integer from 0 to 3, got {0:?}")]
    InvalidRecommendationCount(String),
    #[error("LOAN_LENDERS must name at least one lender")]
    NoLenders,
    #[error("LOAN_LOG_LEVEL must be one of off, error, warn, info, debug, trace, got {0:?}")]
    InvalidLogLevel(String),
}

/// Runtime settings for the portal core.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalConfig {
    pub policy: EligibilityPolicy,
    pub log_level: LevelFilter,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            policy: EligibilityPolicy::default(),
            log_level: LevelFilter::Info,
        }
    }
}

impl PortalConfig {
    /// Reads `.env` if present, then the `LOAN_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let affordability_ratio = match lookup("LOAN_AFFORDABILITY_RATIO") {
            Some(raw) => parse_ratio(&raw)?,
            None => DEFAULT_AFFORDABILITY_RATIO,
        };

        let recommendation_count = match lookup("LOAN_RECOMMENDATION_COUNT") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(count) if count <= MAX_RECOMMENDED_LENDERS => count,
                _ => return Err(ConfigError::InvalidRecommendationCount(raw)),
            },
            None => DEFAULT_RECOMMENDATION_COUNT,
        };

        let lenders = match lookup("LOAN_LENDERS") {
            Some(raw) => {
                let lenders: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect();
                if lenders.is_empty() {
                    return Err(ConfigError::NoLenders);
                }
                lenders
            }
            None => DEFAULT_LENDERS.iter().map(|l| l.to_string()).collect(),
        };

        let log_level = match lookup("LOAN_LOG_LEVEL") {
            Some(raw) => parse_log_level(&raw)?,
            None => LevelFilter::Info,
        };

        Ok(Self {
            policy: EligibilityPolicy {
                affordability_ratio,
                lenders,
                recommendation_count,
            },
            log_level,
        })
    }
}

fn parse_ratio(raw: &str) -> Result<f64, ConfigError> {
    match raw.trim().parse::<f64>() {
        Ok(ratio) if ratio > 0. && ratio <= 1. => Ok(ratio),
        _ => Err(ConfigError::InvalidAffordabilityRatio(raw.to_string())),
    }
}

pub fn parse_log_level(raw: &str) -> Result<LevelFilter, ConfigError> {
    raw.trim()
        .parse::<LevelFilter>()
        .map_err(|_| ConfigError::InvalidLogLevel(raw.to_string()))
}
