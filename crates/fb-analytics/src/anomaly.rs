use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use fb_core::types::Activity;
use serde::{Deserialize, Serialize};

use crate::aggregate::{daily_trend, group_totals, window_totals, Dimension};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Spike,
    UnusualModel,
    BudgetThreshold,
}

/// Ordered so that `Critical` sorts greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A statistically or policy-flagged deviation in cost behaviour. Derived
/// per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostAnomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    pub observed: f64,
    pub expected: f64,
    pub timestamp: DateTime<Utc>,
    pub agent_id: Option<String>,
    pub model: Option<String>,
}

// ---------------------------------------------------------------------------
// AnomalyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Standard deviations above the baseline mean that count as a spike.
    pub spike_sigma: f64,
    /// Absolute floor a day must exceed to be flagged, so near-zero-spend
    /// days don't produce noise.
    pub spike_min_cost: f64,
    /// Share of window cost above which a single model is unusual.
    pub model_share_threshold: f64,
    /// Absolute cost floor for the unusual-model check.
    pub model_min_cost: f64,
    /// Fraction of the period budget that triggers the threshold alert.
    pub budget_alert_ratio: f64,
    /// Daily budget in USD; zero disables the budget-threshold check.
    pub daily_budget: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            spike_sigma: 3.0,
            spike_min_cost: 1.0,
            model_share_threshold: 0.5,
            model_min_cost: 10.0,
            budget_alert_ratio: 0.8,
            daily_budget: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Detectors
// ---------------------------------------------------------------------------

/// Relative margin a day must clear over a flat baseline (leave-one-out
/// stddev of zero), where any sigma multiple collapses to the bare mean.
const FLAT_BASELINE_MARGIN: f64 = 1.5;

const STDDEV_EPSILON: f64 = 1e-9;

/// Flag days whose cost sits far above the rest of the window.
///
/// Each day is measured against the mean and population standard deviation
/// of the *other* days, so a single large spike cannot inflate its own
/// baseline out of detection range.
pub fn detect_spikes(day_costs: &[(NaiveDate, f64)], config: &AnomalyConfig) -> Vec<CostAnomaly> {
    let mut anomalies = Vec::new();
    if day_costs.len() < 2 {
        return anomalies;
    }

    for (i, &(day, cost)) in day_costs.iter().enumerate() {
        if cost <= config.spike_min_cost {
            continue;
        }
        let others: Vec<f64> = day_costs
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(_, &(_, c))| c)
            .collect();
        let mean = others.iter().sum::<f64>() / others.len() as f64;
        let variance =
            others.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / others.len() as f64;
        let stddev = variance.sqrt();

        // A flat baseline makes every sigma threshold equal the mean, which
        // would report any excess at all as a critical spike; demand a real
        // relative margin instead.
        if stddev < STDDEV_EPSILON && cost < mean * FLAT_BASELINE_MARGIN {
            continue;
        }
        if cost <= mean + config.spike_sigma * stddev {
            continue;
        }
        let severity = if cost > mean + 5.0 * stddev {
            Severity::Critical
        } else if cost > mean + 3.0 * stddev {
            Severity::High
        } else {
            Severity::Medium
        };
        anomalies.push(CostAnomaly {
            kind: AnomalyKind::Spike,
            severity,
            description: format!(
                "daily cost {:.2} far above typical {:.2} (sigma {:.2})",
                cost, mean, stddev
            ),
            observed: cost,
            expected: mean,
            timestamp: day.and_time(NaiveTime::MIN).and_utc(),
            agent_id: None,
            model: None,
        });
    }
    anomalies
}

/// Flag a model dominating the window's spend.
pub fn detect_unusual_models(
    activities: &[Activity],
    config: &AnomalyConfig,
) -> Vec<CostAnomaly> {
    let window_cost = window_totals(activities).cost;
    if window_cost <= 0.0 {
        return Vec::new();
    }

    let mut anomalies = Vec::new();
    for group in group_totals(activities, Dimension::Model) {
        let share = group.totals.cost / window_cost;
        if share <= config.model_share_threshold || group.totals.cost <= config.model_min_cost {
            continue;
        }
        let severity = if share > 0.8 {
            Severity::High
        } else {
            Severity::Medium
        };
        anomalies.push(CostAnomaly {
            kind: AnomalyKind::UnusualModel,
            severity,
            description: format!(
                "model {} accounts for {:.0}% of window cost",
                group.key,
                share * 100.0
            ),
            observed: group.totals.cost,
            expected: window_cost * config.model_share_threshold,
            timestamp: Utc::now(),
            agent_id: None,
            model: Some(group.key),
        });
    }
    anomalies
}

/// Flag window spend approaching or exceeding the period budget
/// (`daily_budget × window days`).
pub fn detect_budget_threshold(
    total_cost: f64,
    window_days: u32,
    config: &AnomalyConfig,
) -> Option<CostAnomaly> {
    let period_budget = config.daily_budget * window_days as f64;
    if period_budget <= 0.0 {
        return None;
    }
    let ratio = total_cost / period_budget;
    if ratio <= config.budget_alert_ratio {
        return None;
    }
    let severity = if ratio > 1.0 {
        Severity::Critical
    } else if ratio > 0.9 {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(CostAnomaly {
        kind: AnomalyKind::BudgetThreshold,
        severity,
        description: format!(
            "spend {:.2} is {:.0}% of the {:.2} period budget",
            total_cost,
            ratio * 100.0,
            period_budget
        ),
        observed: total_cost,
        expected: period_budget,
        timestamp: Utc::now(),
        agent_id: None,
        model: None,
    })
}

/// Run every detector over a window and return results ordered critical
/// first.
pub fn detect_anomalies(
    activities: &[Activity],
    window_days: u32,
    config: &AnomalyConfig,
) -> Vec<CostAnomaly> {
    let day_costs: Vec<(NaiveDate, f64)> = daily_trend(activities)
        .into_iter()
        .map(|point| (point.day, point.totals.cost))
        .collect();

    let mut anomalies = detect_spikes(&day_costs, config);
    anomalies.extend(detect_unusual_models(activities, config));
    if let Some(anomaly) =
        detect_budget_threshold(window_totals(activities).cost, window_days, config)
    {
        anomalies.push(anomaly);
    }

    anomalies.sort_by(|a, b| b.severity.cmp(&a.severity));
    anomalies
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
