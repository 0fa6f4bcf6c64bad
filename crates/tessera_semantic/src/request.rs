//! Structured query requests and their wire encodings.
//!
//! A [`QueryRequest`] is built from validated tool parameters and rendered
//! either as a semantic-layer SQL template (session transport) or as
//! GraphQL variables for `createQuery` (submit/poll transport). Names and
//! filters are always escaped as string literals, never spliced raw.

use crate::error::QueryError;
use crate::types::{Granularity, GroupByParam, GroupByType, OrderByParam};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

/// An order-by resolved against the request's metrics and group-by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBySpec {
    Metric {
        name: String,
        descending: bool,
    },
    /// Carries the grain of the matching group-by entry
    GroupBy {
        name: String,
        grain: Option<Granularity>,
        descending: bool,
    },
}

/// Resolve each order-by name against the requested metrics first, then the
/// requested group-by targets.
pub fn resolve_order_by(
    order_by: &[OrderByParam],
    metrics: &[String],
    group_by: &[GroupByParam],
) -> Result<Vec<OrderBySpec>, QueryError> {
    let queried_metrics: HashSet<&str> = metrics.iter().map(String::as_str).collect();
    let queried_group_by: HashMap<&str, &GroupByParam> =
        group_by.iter().map(|g| (g.name.as_str(), g)).collect();

    order_by
        .iter()
        .map(|order| {
            if queried_metrics.contains(order.name.as_str()) {
                Ok(OrderBySpec::Metric {
                    name: order.name.clone(),
                    descending: order.descending,
                })
            } else if let Some(group) = queried_group_by.get(order.name.as_str()) {
                Ok(OrderBySpec::GroupBy {
                    name: group.name.clone(),
                    grain: group.grain.clone(),
                    descending: order.descending,
                })
            } else {
                Err(QueryError::OrderByNotFound(order.name.clone()))
            }
        })
        .collect()
}

/// A fully resolved metric query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub metrics: Vec<String>,
    pub group_by: Vec<GroupByParam>,
    pub order_by: Vec<OrderBySpec>,
    pub where_clause: Option<String>,
    pub limit: Option<u32>,
}

impl QueryRequest {
    pub fn new(metrics: Vec<String>) -> Self {
        Self {
            metrics,
            ..Default::default()
        }
    }

    pub fn group_by(mut self, group_by: Vec<GroupByParam>) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn order_by(mut self, order_by: Vec<OrderBySpec>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn where_clause(mut self, where_clause: Option<String>) -> Self {
        self.where_clause = where_clause.filter(|w| !w.trim().is_empty());
        self
    }

    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Render as a semantic-layer SQL template.
    ///
    /// ```text
    /// SELECT * FROM {{ semantic_layer.query(metrics=["revenue"], group_by=[TimeDimension("metric_time", "month")], limit=10) }}
    /// ```
    pub fn to_semantic_sql(&self) -> String {
        let mut args = vec![format!("metrics={}", list(self.metrics.iter().map(|m| quote(m))))];

        if !self.group_by.is_empty() {
            args.push(format!("group_by={}", list(self.group_by.iter().map(group_by_call))));
        }
        if let Some(where_clause) = &self.where_clause {
            args.push(format!("where=[{}]", quote(where_clause)));
        }
        if !self.order_by.is_empty() {
            args.push(format!("order_by={}", list(self.order_by.iter().map(order_by_call))));
        }
        if let Some(limit) = self.limit {
            args.push(format!("limit={}", limit));
        }

        format!("SELECT * FROM {{{{ semantic_layer.query({}) }}}}", args.join(", "))
    }

    /// Variables for the `createQuery` mutation.
    ///
    /// `environmentId` is added by the transport.
    pub fn graphql_variables(&self) -> Map<String, Value> {
        let mut vars = Map::new();
        vars.insert(
            "metrics".to_string(),
            Value::Array(self.metrics.iter().map(|m| json!({ "name": m })).collect()),
        );
        if !self.group_by.is_empty() {
            let groups = self
                .group_by
                .iter()
                .map(|g| {
                    let mut group = json!({ "name": g.name });
                    if let Some(grain) = &g.grain {
                        group["grain"] = json!(grain.as_str());
                    }
                    group
                })
                .collect();
            vars.insert("groupBy".to_string(), Value::Array(groups));
        }
        if let Some(where_clause) = &self.where_clause {
            vars.insert("where".to_string(), json!([{ "sql": where_clause }]));
        }
        if !self.order_by.is_empty() {
            let orders = self
                .order_by
                .iter()
                .map(|order| match order {
                    OrderBySpec::Metric { name, descending } => json!({
                        "metric": { "name": name },
                        "descending": descending,
                    }),
                    OrderBySpec::GroupBy { name, grain, descending } => {
                        let mut group = json!({ "name": name });
                        if let Some(grain) = grain {
                            group["grain"] = json!(grain.as_str());
                        }
                        json!({ "groupBy": group, "descending": descending })
                    }
                })
                .collect();
            vars.insert("orderBy".to_string(), Value::Array(orders));
        }
        if let Some(limit) = self.limit {
            vars.insert("limit".to_string(), json!(limit));
        }
        vars
    }
}

/// A JSON string literal; also valid in the template's call syntax.
fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn list(items: impl Iterator<Item = String>) -> String {
    format!("[{}]", items.collect::<Vec<_>>().join(","))
}

fn grain_literal(grain: &Granularity) -> String {
    quote(&grain.as_str().to_lowercase())
}

fn group_by_call(group: &GroupByParam) -> String {
    match (group.kind, &group.grain) {
        (GroupByType::CategoricalDimension, _) => format!("Dimension({})", quote(&group.name)),
        (GroupByType::Entity, _) => format!("Entity({})", quote(&group.name)),
        (GroupByType::TimeDimension, Some(grain)) => {
            format!("TimeDimension({}, {})", quote(&group.name), grain_literal(grain))
        }
        (GroupByType::TimeDimension, None) => format!("TimeDimension({})", quote(&group.name)),
    }
}

fn order_by_call(order: &OrderBySpec) -> String {
    let (mut call, descending) = match order {
        OrderBySpec::Metric { name, descending } => (format!("Metric({})", quote(name)), *descending),
        OrderBySpec::GroupBy { name, grain, descending } => {
            let mut call = format!("Dimension({})", quote(name));
            if let Some(grain) = grain {
                call.push_str(&format!(".grain({})", grain_literal(grain)));
            }
            (call, *descending)
        }
    };
    if descending {
        call.push_str(".descending(True)");
    }
    call
}
