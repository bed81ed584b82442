//! Matching queries to declared rollups.
//!
//! A rollup can answer a query when every requested measure is derivable
//! from what it stores and every requested dimension is stored at the
//! requested grain or finer. Among eligible rollups a score picks the
//! tightest fit; ties keep the earliest declaration.

use std::collections::HashSet;

use crate::model::{AggregateFunction, MetricKind, Model, PreAggregation, TimeGranularity};

/// Find the best rollup on `model` able to answer the query, if any.
///
/// `metrics` and `dimensions` are unqualified field names on the model;
/// `time_granularity` is the grain the query groups time by, when it does.
pub fn find_matching_preagg<'m>(
    model: &'m Model,
    metrics: &[&str],
    dimensions: &[&str],
    time_granularity: Option<TimeGranularity>,
) -> Option<&'m PreAggregation> {
    let mut best: Option<(&PreAggregation, i64)> = None;
    for preagg in &model.pre_aggregations {
        if !can_satisfy(model, preagg, metrics, dimensions, time_granularity) {
            continue;
        }
        let s = score(preagg, dimensions, time_granularity);
        // Strictly greater keeps the earliest declaration on ties.
        if best.map(|(_, b)| s > b).unwrap_or(true) {
            best = Some((preagg, s));
        }
    }
    best.map(|(p, _)| p)
}

/// Eligibility: measures derivable, dimensions covered, grain compatible.
fn can_satisfy(
    model: &Model,
    preagg: &PreAggregation,
    metrics: &[&str],
    dimensions: &[&str],
    time_granularity: Option<TimeGranularity>,
) -> bool {
    for metric in metrics {
        if !derivable(model, preagg, metric) {
            return false;
        }
    }

    let stored: HashSet<&str> = preagg.dimensions.iter().map(String::as_str).collect();
    for dim in dimensions {
        // The time dimension is stored under its own rule below.
        if preagg.time_dimension.as_deref() == Some(*dim) {
            continue;
        }
        if !stored.contains(dim) {
            return false;
        }
    }

    match (time_granularity, preagg.granularity) {
        // A query at grain g needs storage at g or finer.
        (Some(requested), Some(held)) => requested >= held,
        (Some(_), None) => false,
        (None, _) => true,
    }
}

/// Whether one measure can be computed from the rollup's stored columns.
fn derivable(model: &Model, preagg: &PreAggregation, metric_name: &str) -> bool {
    let Some(metric) = model.metric(metric_name) else {
        return false;
    };
    let stored = preagg.measures.iter().any(|m| m == metric_name);

    match &metric.kind {
        MetricKind::Simple { agg, .. } => match agg {
            AggregateFunction::Sum
            | AggregateFunction::Count
            | AggregateFunction::Min
            | AggregateFunction::Max
            | AggregateFunction::CountDistinct => stored,
            // Re-weighting an average needs a count column alongside it.
            AggregateFunction::Avg => stored && has_count_measure(model, preagg),
        },
        MetricKind::Ratio {
            numerator,
            denominator,
        } => {
            same_model_component(model, numerator)
                .map(|n| derivable(model, preagg, n))
                .unwrap_or(false)
                && same_model_component(model, denominator)
                    .map(|d| derivable(model, preagg, d))
                    .unwrap_or(false)
        }
        MetricKind::Cumulative { measure, .. } => same_model_component(model, measure)
            .map(|m| derivable(model, preagg, m))
            .unwrap_or(false),
        MetricKind::TimeComparison { base, .. } => same_model_component(model, base)
            .map(|b| derivable(model, preagg, b))
            .unwrap_or(false),
        // Derived formulas reference arbitrary metrics; resolving their
        // closure against a single rollup is not attempted. Conversion
        // funnels need row-level event times a rollup no longer has.
        MetricKind::Derived { .. } | MetricKind::Conversion { .. } => false,
    }
}

/// Strip a `model.` qualifier, rejecting references into other models.
fn same_model_component<'a>(model: &Model, reference: &'a str) -> Option<&'a str> {
    match reference.split_once('.') {
        Some((owner, field)) if owner == model.name => Some(field),
        Some(_) => None,
        None => Some(reference),
    }
}

fn has_count_measure(model: &Model, preagg: &PreAggregation) -> bool {
    preagg.measures.iter().any(|name| {
        matches!(
            model.metric(name).map(|m| &m.kind),
            Some(MetricKind::Simple {
                agg: AggregateFunction::Count,
                ..
            })
        )
    })
}

/// Tightness score. Exact dimension sets and exact granularity score
/// highest; extra stored dimensions and granularity distance cost.
fn score(
    preagg: &PreAggregation,
    dimensions: &[&str],
    time_granularity: Option<TimeGranularity>,
) -> i64 {
    let requested: HashSet<&str> = dimensions
        .iter()
        .copied()
        .filter(|d| preagg.time_dimension.as_deref() != Some(*d))
        .collect();
    let stored: HashSet<&str> = preagg.dimensions.iter().map(String::as_str).collect();

    let mut s: i64 = 0;
    if requested == stored {
        s += 1000;
    } else {
        s -= 10 * stored.difference(&requested).count() as i64;
    }

    if let (Some(req), Some(held)) = (time_granularity, preagg.granularity) {
        if req == held {
            s += 100;
        } else {
            s -= 5 * req.distance(held) as i64;
        }
    }
    s
}
