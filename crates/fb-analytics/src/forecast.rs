use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BudgetParams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetParams {
    pub monthly_budget: f64,
    pub daily_budget: f64,
}

/// Spending pace above which the forecast flags risk even when the monthly
/// projection still fits the budget.
const PACE_RISK_RATIO: f64 = 1.2;

// ---------------------------------------------------------------------------
// BudgetForecast
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetForecast {
    pub spent_to_date: f64,
    pub daily_average: f64,
    pub projected_monthly: f64,
    pub recommended_daily_budget: f64,
    pub days_elapsed: u32,
    pub days_remaining: u32,
    pub at_risk: bool,
}

/// Project month-end spend from the month-to-date run rate.
///
/// `days_elapsed` counts today as a full day; a projection on day one is just
/// thirty-ish times today's spend and should be read accordingly.
pub fn forecast_month(
    spent_to_date: f64,
    days_elapsed: u32,
    days_in_month: u32,
    params: BudgetParams,
) -> BudgetForecast {
    let days_elapsed = days_elapsed.max(1).min(days_in_month);
    let days_remaining = days_in_month - days_elapsed;

    let daily_average = spent_to_date / days_elapsed as f64;
    let projected_monthly = spent_to_date + daily_average * days_remaining as f64;
    let recommended_daily_budget = if days_remaining > 0 {
        (params.monthly_budget - spent_to_date) / days_remaining as f64
    } else {
        0.0
    };

    let over_projection = projected_monthly >= params.monthly_budget;
    let pace = params.daily_budget * days_elapsed as f64;
    let over_pace = pace > 0.0 && spent_to_date / pace > PACE_RISK_RATIO;

    BudgetForecast {
        spent_to_date,
        daily_average,
        projected_monthly,
        recommended_daily_budget,
        days_elapsed,
        days_remaining,
        at_risk: over_projection || over_pace,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_midmonth_forecast() {
        // $150 spent after 15 of 30 days at a $10 daily budget.
        let forecast = forecast_month(
            150.0,
            15,
            30,
            BudgetParams {
                monthly_budget: 300.0,
                daily_budget: 10.0,
            },
        );
        assert!((forecast.daily_average - 10.0).abs() < 1e-9);
        assert!((forecast.projected_monthly - 300.0).abs() < 1e-9);
        assert!((forecast.recommended_daily_budget - 10.0).abs() < 1e-9);
        assert!(forecast.at_risk);
    }

    #[test]
    fn under_budget_is_not_at_risk() {
        let forecast = forecast_month(
            50.0,
            15,
            30,
            BudgetParams {
                monthly_budget: 300.0,
                daily_budget: 10.0,
            },
        );
        assert!((forecast.projected_monthly - 100.0).abs() < 1e-9);
        assert!(!forecast.at_risk);
        // Underspend frees up daily headroom.
        assert!(forecast.recommended_daily_budget > 10.0);
    }

    #[test]
    fn overspend_pace_flags_risk_even_with_small_projection_gap() {
        // 13 of the month's dollars in 1 day: pace ratio 1.3 > 1.2.
        let forecast = forecast_month(
            13.0,
            1,
            30,
            BudgetParams {
                monthly_budget: 1000.0,
                daily_budget: 10.0,
            },
        );
        assert!(forecast.at_risk);
    }

    #[test]
    fn zero_days_elapsed_clamped() {
        let forecast = forecast_month(
            0.0,
            0,
            30,
            BudgetParams {
                monthly_budget: 300.0,
                daily_budget: 10.0,
            },
        );
        assert_eq!(forecast.days_elapsed, 1);
        assert_eq!(forecast.projected_monthly, 0.0);
        assert!(!forecast.at_risk);
    }

    #[test]
    fn month_end_has_no_remaining_recommendation() {
        let forecast = forecast_month(
            200.0,
            30,
            30,
            BudgetParams {
                monthly_budget: 300.0,
                daily_budget: 10.0,
            },
        );
        assert_eq!(forecast.days_remaining, 0);
        assert_eq!(forecast.recommended_daily_budget, 0.0);
        assert!((forecast.projected_monthly - 200.0).abs() < 1e-9);
    }
}
