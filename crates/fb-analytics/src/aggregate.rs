use ahash::{AHashMap, AHashSet};
use chrono::NaiveDate;
use fb_core::types::Activity;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Dimension
// ---------------------------------------------------------------------------

/// Grouping dimension for usage rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Model,
    Agent,
    Ticket,
    /// UTC calendar date of the activity timestamp.
    Day,
}

fn group_key(dimension: Dimension, activity: &Activity) -> String {
    match dimension {
        Dimension::Model => activity
            .model
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        Dimension::Agent => activity.agent_id.clone(),
        Dimension::Ticket => activity
            .ticket_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unassigned".to_string()),
        Dimension::Day => activity.created_at.date_naive().to_string(),
    }
}

// ---------------------------------------------------------------------------
// UsageTotals
// ---------------------------------------------------------------------------

/// Summed tokens, cost, and activity count for one slice of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost: f64,
    pub activity_count: u64,
}

impl UsageTotals {
    fn absorb(&mut self, activity: &Activity) {
        self.input_tokens += activity.input_tokens;
        self.output_tokens += activity.output_tokens;
        self.total_tokens += activity.total_tokens;
        self.cost += activity.cost_total.unwrap_or(0.0);
        self.activity_count += 1;
    }
}

/// Ungrouped totals over a window.
pub fn window_totals(activities: &[Activity]) -> UsageTotals {
    let mut totals = UsageTotals::default();
    for activity in activities {
        totals.absorb(activity);
    }
    totals
}

// ---------------------------------------------------------------------------
// Grouped totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupedTotals {
    pub key: String,
    pub totals: UsageTotals,
}

/// Partition activities along `dimension` and sum each group. Every activity
/// lands in exactly one group, so grouped sums always equal the window total.
/// Groups come back ordered by cost descending, key ascending on ties.
pub fn group_totals(activities: &[Activity], dimension: Dimension) -> Vec<GroupedTotals> {
    let mut groups: AHashMap<String, UsageTotals> = AHashMap::new();
    for activity in activities {
        groups
            .entry(group_key(dimension, activity))
            .or_default()
            .absorb(activity);
    }

    let mut grouped: Vec<GroupedTotals> = groups
        .into_iter()
        .map(|(key, totals)| GroupedTotals { key, totals })
        .collect();
    grouped.sort_by(|a, b| {
        b.totals
            .cost
            .partial_cmp(&a.totals.cost)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    grouped
}

// ---------------------------------------------------------------------------
// Trend series
// ---------------------------------------------------------------------------

/// One day of the trend series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub day: NaiveDate,
    pub totals: UsageTotals,
    /// Distinct agents that produced activity that day.
    pub active_agents: u64,
}

/// Per-day totals plus distinct-agent counts, ordered by day ascending.
/// Days with no activity are absent, not zero-filled.
pub fn daily_trend(activities: &[Activity]) -> Vec<TrendPoint> {
    let mut totals: AHashMap<NaiveDate, UsageTotals> = AHashMap::new();
    let mut agents: AHashMap<NaiveDate, AHashSet<&str>> = AHashMap::new();
    for activity in activities {
        let day = activity.created_at.date_naive();
        totals.entry(day).or_default().absorb(activity);
        agents
            .entry(day)
            .or_default()
            .insert(activity.agent_id.as_str());
    }

    let mut trend: Vec<TrendPoint> = totals
        .into_iter()
        .map(|(day, totals)| TrendPoint {
            active_agents: agents.get(&day).map(|set| set.len() as u64).unwrap_or(0),
            day,
            totals,
        })
        .collect();
    trend.sort_by_key(|point| point.day);
    trend
}

// ---------------------------------------------------------------------------
// Period comparison
// ---------------------------------------------------------------------------

/// Per-group change between two equal-length windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodDelta {
    pub key: String,
    pub current: UsageTotals,
    pub previous: UsageTotals,
    pub cost_change_pct: f64,
    pub token_change_pct: f64,
}

fn change_pct(current: f64, previous: f64) -> f64 {
    // A group that did not exist before reads as +100%, not a division
    // by zero.
    if previous == 0.0 {
        100.0
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Compare a current window against the previous one, per group. Groups
/// present in either window appear in the result; ordering follows the
/// current window's cost descending.
pub fn compare_periods(
    current: &[Activity],
    previous: &[Activity],
    dimension: Dimension,
) -> Vec<PeriodDelta> {
    let current_groups = group_totals(current, dimension);
    let mut previous_groups: AHashMap<String, UsageTotals> = group_totals(previous, dimension)
        .into_iter()
        .map(|g| (g.key, g.totals))
        .collect();

    let mut deltas: Vec<PeriodDelta> = current_groups
        .into_iter()
        .map(|g| {
            let previous = previous_groups.remove(&g.key).unwrap_or_default();
            PeriodDelta {
                cost_change_pct: change_pct(g.totals.cost, previous.cost),
                token_change_pct: change_pct(
                    g.totals.total_tokens as f64,
                    previous.total_tokens as f64,
                ),
                key: g.key,
                current: g.totals,
                previous,
            }
        })
        .collect();

    // Groups that vanished entirely this period.
    let mut vanished: Vec<(String, UsageTotals)> = previous_groups.into_iter().collect();
    vanished.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, previous) in vanished {
        deltas.push(PeriodDelta {
            cost_change_pct: change_pct(0.0, previous.cost),
            token_change_pct: change_pct(0.0, previous.total_tokens as f64),
            key,
            current: UsageTotals::default(),
            previous,
        });
    }

    deltas
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use fb_core::types::ActivityKind;
    use uuid::Uuid;

    fn activity(agent: &str, model: Option<&str>, tokens: (u64, u64), cost: Option<f64>) -> Activity {
        let mut a = Activity::new(agent, ActivityKind::ApiCall);
        a.model = model.map(|m| m.to_string());
        a.input_tokens = tokens.0;
        a.output_tokens = tokens.1;
        a.total_tokens = tokens.0 + tokens.1;
        a.cost_total = cost;
        a
    }

    fn sample() -> Vec<Activity> {
        vec![
            activity("a1", Some("gpt-4"), (1000, 500), Some(0.06)),
            activity("a1", Some("gpt-4"), (2000, 1000), Some(0.12)),
            activity("a2", Some("claude-3-opus"), (500, 500), Some(0.045)),
            activity("a2", None, (100, 0), None),
        ]
    }

    #[test]
    fn grouped_sums_equal_window_total_for_every_dimension() {
        let activities = sample();
        let total = window_totals(&activities);

        for dimension in [
            Dimension::Model,
            Dimension::Agent,
            Dimension::Ticket,
            Dimension::Day,
        ] {
            let groups = group_totals(&activities, dimension);
            let tokens: u64 = groups.iter().map(|g| g.totals.total_tokens).sum();
            let cost: f64 = groups.iter().map(|g| g.totals.cost).sum();
            let count: u64 = groups.iter().map(|g| g.totals.activity_count).sum();
            assert_eq!(tokens, total.total_tokens, "{dimension:?}");
            assert!((cost - total.cost).abs() < 1e-9, "{dimension:?}");
            assert_eq!(count, total.activity_count, "{dimension:?}");
        }
    }

    #[test]
    fn group_by_model_buckets_missing_as_unknown() {
        let groups = group_totals(&sample(), Dimension::Model);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert!(keys.contains(&"gpt-4"));
        assert!(keys.contains(&"unknown"));
        // Highest-cost group first.
        assert_eq!(groups[0].key, "gpt-4");
        assert!((groups[0].totals.cost - 0.18).abs() < 1e-9);
    }

    #[test]
    fn group_by_ticket_buckets_missing_as_unassigned() {
        let mut activities = sample();
        let ticket = Uuid::new_v4();
        activities[0].ticket_id = Some(ticket);
        let groups = group_totals(&activities, Dimension::Ticket);
        assert!(groups.iter().any(|g| g.key == ticket.to_string()));
        assert!(groups.iter().any(|g| g.key == "unassigned"));
    }

    #[test]
    fn daily_trend_counts_distinct_agents() {
        let day1 = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 8, 2, 9, 0, 0).unwrap();

        let mut activities = Vec::new();
        for (agent, at) in [("a1", day1), ("a2", day1), ("a1", day1 + Duration::hours(2)), ("a1", day2)] {
            let mut a = activity(agent, Some("gpt-4"), (10, 10), Some(0.01));
            a.created_at = at;
            activities.push(a);
        }

        let trend = daily_trend(&activities);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].day, day1.date_naive());
        assert_eq!(trend[0].active_agents, 2);
        assert_eq!(trend[0].totals.activity_count, 3);
        assert_eq!(trend[1].active_agents, 1);
    }

    #[test]
    fn compare_periods_reports_percentage_change() {
        let current = vec![activity("a1", Some("gpt-4"), (100, 100), Some(0.30))];
        let previous = vec![activity("a1", Some("gpt-4"), (100, 100), Some(0.20))];

        let deltas = compare_periods(&current, &previous, Dimension::Model);
        assert_eq!(deltas.len(), 1);
        assert!((deltas[0].cost_change_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn compare_periods_new_group_reads_plus_100() {
        let current = vec![activity("a1", Some("gpt-4"), (10, 10), Some(0.10))];
        let deltas = compare_periods(&current, &[], Dimension::Model);
        assert_eq!(deltas[0].cost_change_pct, 100.0);
    }

    #[test]
    fn compare_periods_vanished_group_reads_minus_100() {
        let previous = vec![activity("a1", Some("gpt-4"), (10, 10), Some(0.10))];
        let deltas = compare_periods(&[], &previous, Dimension::Model);
        assert_eq!(deltas.len(), 1);
        assert!((deltas[0].cost_change_pct - (-100.0)).abs() < 1e-9);
        assert_eq!(deltas[0].current.activity_count, 0);
    }

    #[test]
    fn empty_window_is_all_zero() {
        let totals = window_totals(&[]);
        assert_eq!(totals, UsageTotals::default());
        assert!(group_totals(&[], Dimension::Agent).is_empty());
        assert!(daily_trend(&[]).is_empty());
    }
}
