//! Articles and the rules they protect.

use serde::{Deserialize, Serialize};

use dyad_types::ParamValue;

use crate::amendment::AmendmentRequirements;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Active,
    /// Superseded text; the amended article keeps its number and stays active
    /// under a new version, so this marks historical copies only.
    Amended,
    Repealed,
}

/// What a protected parameter may not become.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    MustNotEqual(ParamValue),
    MustNotBeBelow(i64),
    MustNotBeAbove(i64),
}

impl Constraint {
    /// Whether `value` breaks this constraint. Integer bounds only apply to
    /// integer values; a value of another type cannot break them.
    pub fn is_violated_by(&self, value: &ParamValue) -> bool {
        match self {
            Constraint::MustNotEqual(forbidden) => value == forbidden,
            Constraint::MustNotBeBelow(min) => value.as_integer().is_some_and(|v| v < *min),
            Constraint::MustNotBeAbove(max) => value.as_integer().is_some_and(|v| v > *max),
        }
    }
}

/// A rule over one named parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedRule {
    pub parameter: String,
    pub constraint: Constraint,
}

impl ProtectedRule {
    pub fn new(parameter: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            parameter: parameter.into(),
            constraint,
        }
    }

    pub fn is_violated_by(&self, parameter: &str, value: &ParamValue) -> bool {
        self.parameter == parameter && self.constraint.is_violated_by(value)
    }

    /// Human-readable reason shown to a rejected proposer.
    pub fn describe(&self) -> String {
        match &self.constraint {
            Constraint::MustNotEqual(v) => format!("{} must not be set to {}", self.parameter, v),
            Constraint::MustNotBeBelow(min) => format!("{} must not go below {}", self.parameter, min),
            Constraint::MustNotBeAbove(max) => format!("{} must not go above {}", self.parameter, max),
        }
    }
}

/// A single article of the constitution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub number: u32,
    pub title: String,
    pub text: String,
    pub rules: Vec<ProtectedRule>,
    pub requirements: AmendmentRequirements,
    pub status: ArticleStatus,
    /// Incremented each time the article is amended.
    pub version: u32,
}

impl Article {
    pub fn is_active(&self) -> bool {
        self.status == ArticleStatus::Active
    }

    /// Rules of this article broken by setting `parameter` to `value`.
    pub fn violated_rules<'a>(
        &'a self,
        parameter: &'a str,
        value: &'a ParamValue,
    ) -> impl Iterator<Item = &'a ProtectedRule> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.is_violated_by(parameter, value))
    }
}
