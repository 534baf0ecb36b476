//! The parameter whitelist: which parameters polls may change, and how.
//!
//! Each entry carries the parameter's type and bounds, its current value and
//! the poll configuration (quorum, supermajority, duration) used when a
//! parameter vote targets it. Entries are seeded once; afterwards only
//! enactment and rollback change `current_value`.

use serde::{Deserialize, Serialize};

use dyad_store::{GovernanceStore, Table};
use dyad_types::{GovernanceParams, ParamType, ParamValue, QuorumConfig, Timestamp};

use crate::codec::{self, Versioned};
use crate::error::GovernanceError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub name: String,
    pub category: String,
    pub param_type: ParamType,
    /// Inclusive bounds for integers, or length bounds for text.
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub current_value: ParamValue,
    pub quorum: QuorumConfig,
    pub supermajority_bps: Option<u32>,
    /// Whether the proposer must be a verified True Self.
    pub requires_verification: bool,
    pub voting_duration_secs: u64,
    pub updated_at: Timestamp,
}

impl WhitelistEntry {
    /// Check a proposed value against this entry's type and bounds.
    pub fn validate(&self, value: &ParamValue) -> Result<(), GovernanceError> {
        let invalid = |reason: String| GovernanceError::InvalidParameterValue {
            parameter: self.name.clone(),
            reason,
        };
        if value.param_type() != self.param_type {
            return Err(invalid(format!(
                "expected {}, got {}",
                self.param_type,
                value.param_type()
            )));
        }
        let measured = match value {
            ParamValue::Integer(v) => Some(*v),
            ParamValue::Text(s) => Some(s.chars().count() as i64),
            ParamValue::Bool(_) => None,
        };
        if let Some(m) = measured {
            if let Some(min) = self.min.filter(|min| m < *min) {
                return Err(invalid(format!("{m} is below the minimum {min}")));
            }
            if let Some(max) = self.max.filter(|max| m > *max) {
                return Err(invalid(format!("{m} is above the maximum {max}")));
            }
        }
        if *value == self.current_value {
            return Err(invalid(format!("{value} is already the current value")));
        }
        Ok(())
    }
}

struct Seed {
    name: &'static str,
    category: &'static str,
    value: ParamValue,
    bounds: (Option<i64>, Option<i64>),
    protected: bool,
}

/// The initial whitelist, with values and poll settings taken from `params`.
///
/// Constitutionally protected switches are listed too, so proposals touching
/// them reach the constitutional guard instead of failing as unknown.
pub fn default_whitelist(params: &GovernanceParams, now: Timestamp) -> Vec<WhitelistEntry> {
    let seeds = [
        Seed {
            name: "enable_shadow_voting",
            category: "identity",
            value: ParamValue::Bool(true),
            bounds: (None, None),
            protected: true,
        },
        Seed {
            name: "require_humanity_verification",
            category: "identity",
            value: ParamValue::Bool(true),
            bounds: (None, None),
            protected: true,
        },
        Seed {
            name: "expose_identity_links",
            category: "identity",
            value: ParamValue::Bool(false),
            bounds: (None, None),
            protected: true,
        },
        Seed {
            name: "enable_token_derivatives",
            category: "economy",
            value: ParamValue::Bool(false),
            bounds: (None, None),
            protected: true,
        },
        Seed {
            name: "rollback_window_hours",
            category: "governance",
            value: ParamValue::Integer((params.rollback_window_secs / Timestamp::HOUR) as i64),
            bounds: (Some(1), Some(720)),
            protected: true,
        },
        Seed {
            name: "max_vote_changes",
            category: "governance",
            value: ParamValue::Integer(params.max_vote_changes as i64),
            bounds: (Some(0), Some(20)),
            protected: false,
        },
        Seed {
            name: "section_multiplier_min_bps",
            category: "governance",
            value: ParamValue::Integer(params.multiplier_min_bps as i64),
            bounds: (Some(1_000), Some(10_000)),
            protected: false,
        },
        Seed {
            name: "section_multiplier_max_bps",
            category: "governance",
            value: ParamValue::Integer(params.multiplier_max_bps as i64),
            bounds: (Some(10_000), Some(30_000)),
            protected: false,
        },
        Seed {
            name: "daily_post_limit",
            category: "community",
            value: ParamValue::Integer(20),
            bounds: (Some(1), Some(1_000)),
            protected: false,
        },
        Seed {
            name: "community_tagline",
            category: "community",
            value: ParamValue::Text("Two selves, one voice.".to_string()),
            bounds: (Some(1), Some(140)),
            protected: false,
        },
    ];

    seeds
        .into_iter()
        .map(|s| WhitelistEntry {
            name: s.name.to_string(),
            category: s.category.to_string(),
            param_type: s.value.param_type(),
            min: s.bounds.0,
            max: s.bounds.1,
            current_value: s.value,
            quorum: if s.protected {
                QuorumConfig::percentage(2_000)
            } else {
                params.general_quorum
            },
            supermajority_bps: s.protected.then_some(6_667),
            requires_verification: true,
            voting_duration_secs: if s.protected {
                2 * params.parameter_vote_duration_secs
            } else {
                params.parameter_vote_duration_secs
            },
            updated_at: now,
        })
        .collect()
}

pub(crate) fn load_entry(
    store: &dyn GovernanceStore,
    name: &str,
) -> Result<Option<Versioned<WhitelistEntry>>, GovernanceError> {
    codec::load(store, Table::Whitelist, name.as_bytes())
}

/// Every entry, ordered by name.
pub fn list_entries(store: &dyn GovernanceStore) -> Result<Vec<WhitelistEntry>, GovernanceError> {
    Ok(codec::load_all(store, Table::Whitelist, &[])?
        .into_iter()
        .map(|v| v.value)
        .collect())
}

/// `base` with enacted whitelist values applied on top.
pub fn effective_params(
    store: &dyn GovernanceStore,
    base: &GovernanceParams,
) -> Result<GovernanceParams, GovernanceError> {
    let mut params = base.clone();
    let int = |name: &str| -> Result<Option<i64>, GovernanceError> {
        Ok(load_entry(store, name)?.and_then(|e| e.value.current_value.as_integer()))
    };

    if let Some(v) = int("max_vote_changes")? {
        params.max_vote_changes = v.max(0) as u32;
    }
    if let Some(hours) = int("rollback_window_hours")? {
        params.rollback_window_secs = hours.max(0) as u64 * Timestamp::HOUR;
    }
    let min = int("section_multiplier_min_bps")?;
    let max = int("section_multiplier_max_bps")?;
    if let (Some(min), Some(max)) = (min, max) {
        if 0 < min && min <= max {
            params.multiplier_min_bps = min as u32;
            params.multiplier_max_bps = max as u32;
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> WhitelistEntry {
        default_whitelist(&GovernanceParams::defaults(), Timestamp::EPOCH)
            .into_iter()
            .find(|e| e.name == name)
            .unwrap()
    }

    #[test]
    fn integer_bounds_are_inclusive() {
        let e = entry("daily_post_limit");
        assert!(e.validate(&ParamValue::Integer(1)).is_ok());
        assert!(e.validate(&ParamValue::Integer(1_000)).is_ok());
        assert!(e.validate(&ParamValue::Integer(0)).is_err());
        assert!(e.validate(&ParamValue::Integer(1_001)).is_err());
    }

    #[test]
    fn wrong_type_and_no_op_are_rejected() {
        let e = entry("daily_post_limit");
        assert!(matches!(
            e.validate(&ParamValue::Bool(true)),
            Err(GovernanceError::InvalidParameterValue { .. })
        ));
        assert!(e.validate(&ParamValue::Integer(20)).is_err());
    }

    #[test]
    fn text_bounds_count_characters() {
        let e = entry("community_tagline");
        assert!(e.validate(&ParamValue::Text("é".repeat(140))).is_ok());
        assert!(e.validate(&ParamValue::Text("x".repeat(141))).is_err());
        assert!(e.validate(&ParamValue::Text(String::new())).is_err());
    }

    #[test]
    fn protected_entries_require_supermajority() {
        assert_eq!(entry("enable_shadow_voting").supermajority_bps, Some(6_667));
        assert_eq!(entry("daily_post_limit").supermajority_bps, None);
    }
}
