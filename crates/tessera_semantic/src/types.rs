//! Semantic layer data model.
//!
//! Metadata types ([`Metric`], [`Dimension`], [`Entity`]) double as the
//! tool responses. Request types ([`GroupByParam`], [`OrderByParam`])
//! deserialize straight from tool arguments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// Categorical tags
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Simple,
    Ratio,
    Derived,
    Cumulative,
    Conversion,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DimensionType {
    Categorical,
    Time,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Primary,
    Unique,
    Foreign,
    Natural,
    #[serde(other)]
    Unknown,
}

/// Time bucketing resolution.
///
/// The backend reports the standard grains in either case and may also
/// expose project-defined grains (`fiscal_quarter`), kept as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Granularity {
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
    Custom(String),
}

impl Granularity {
    /// Upper-case wire name (`DAY`); custom grains are returned verbatim.
    pub fn as_str(&self) -> &str {
        match self {
            Granularity::Nanosecond => "NANOSECOND",
            Granularity::Microsecond => "MICROSECOND",
            Granularity::Millisecond => "MILLISECOND",
            Granularity::Second => "SECOND",
            Granularity::Minute => "MINUTE",
            Granularity::Hour => "HOUR",
            Granularity::Day => "DAY",
            Granularity::Week => "WEEK",
            Granularity::Month => "MONTH",
            Granularity::Quarter => "QUARTER",
            Granularity::Year => "YEAR",
            Granularity::Custom(name) => name,
        }
    }
}

impl FromStr for Granularity {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let grain = match s.to_ascii_uppercase().as_str() {
            "NANOSECOND" => Granularity::Nanosecond,
            "MICROSECOND" => Granularity::Microsecond,
            "MILLISECOND" => Granularity::Millisecond,
            "SECOND" => Granularity::Second,
            "MINUTE" => Granularity::Minute,
            "HOUR" => Granularity::Hour,
            "DAY" => Granularity::Day,
            "WEEK" => Granularity::Week,
            "MONTH" => Granularity::Month,
            "QUARTER" => Granularity::Quarter,
            "YEAR" => Granularity::Year,
            _ => Granularity::Custom(s.to_string()),
        };
        Ok(grain)
    }
}

impl From<String> for Granularity {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(grain) => grain,
            Err(never) => match never {},
        }
    }
}

impl From<Granularity> for String {
    fn from(grain: Granularity) -> Self {
        grain.as_str().to_string()
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// A named, computable quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An attribute usable to group or filter metric values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(rename = "type")]
    pub dimension_type: DimensionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub granularities: Vec<Granularity>,
}

/// A join-key-like attribute associated with a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// Request parameters
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupByType {
    #[serde(alias = "dimension")]
    CategoricalDimension,
    TimeDimension,
    Entity,
}

/// A group-by target that violates the grain invariant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("grain is only valid for time dimensions, but `{name}` is a {kind:?}")]
pub struct GroupByError {
    pub name: String,
    pub kind: GroupByType,
}

/// A dimension or entity to group by.
///
/// `grain` is only ever set for [`GroupByType::TimeDimension`]; both the
/// constructor and deserialization reject anything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGroupBy")]
pub struct GroupByParam {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: GroupByType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grain: Option<Granularity>,
}

impl GroupByParam {
    pub fn new(
        name: impl Into<String>,
        kind: GroupByType,
        grain: Option<Granularity>,
    ) -> Result<Self, GroupByError> {
        let name = name.into();
        if grain.is_some() && kind != GroupByType::TimeDimension {
            return Err(GroupByError { name, kind });
        }
        Ok(Self { name, kind, grain })
    }

    pub fn dimension(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: GroupByType::CategoricalDimension,
            grain: None,
        }
    }

    pub fn time_dimension(name: impl Into<String>, grain: Option<Granularity>) -> Self {
        Self {
            name: name.into(),
            kind: GroupByType::TimeDimension,
            grain,
        }
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: GroupByType::Entity,
            grain: None,
        }
    }
}

#[derive(Deserialize)]
struct RawGroupBy {
    name: String,
    #[serde(rename = "type")]
    kind: GroupByType,
    #[serde(default)]
    grain: Option<Granularity>,
}

impl TryFrom<RawGroupBy> for GroupByParam {
    type Error = GroupByError;

    fn try_from(raw: RawGroupBy) -> Result<Self, Self::Error> {
        GroupByParam::new(raw.name, raw.kind, raw.grain)
    }
}

/// Sort instruction naming a requested metric or group-by target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByParam {
    pub name: String,
    #[serde(default)]
    pub descending: bool,
}

// =============================================================================
// Results
// =============================================================================

/// Outcome of a metric query: exactly one of rows or an error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// Serialized rows (record-oriented JSON) or a no-results notice
    Success(String),
    /// Human-readable failure
    Error(String),
}

impl QueryResult {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryResult::Success(_))
    }

    /// The payload text regardless of variant.
    pub fn text(&self) -> &str {
        match self {
            QueryResult::Success(text) | QueryResult::Error(text) => text,
        }
    }
}
