//! Typed values of governable parameters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a whitelisted parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Bool,
    Integer,
    Text,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Text => "text",
        })
    }
}

/// A parameter value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Bool(_) => ParamType::Bool,
            Self::Integer(_) => ParamType::Integer,
            Self::Text(_) => ParamType::Text,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Parse a textual value as the given type (`"true"`, `"42"`, anything for text).
    pub fn parse_as(ty: ParamType, raw: &str) -> Option<Self> {
        match ty {
            ParamType::Bool => raw.trim().parse().ok().map(Self::Bool),
            ParamType::Integer => raw.trim().parse().ok().map(Self::Integer),
            ParamType::Text => Some(Self::Text(raw.to_string())),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}
