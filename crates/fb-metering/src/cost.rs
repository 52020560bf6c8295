use serde::{Deserialize, Serialize};

use crate::pricing::{PricingEntry, PricingTable};

// ---------------------------------------------------------------------------
// CostBreakdown
// ---------------------------------------------------------------------------

/// Cost of one activity, split per direction, with the pricing that produced
/// it so callers can show which tier was billed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub pricing: PricingEntry,
}

/// Compute the cost of a request. Pure and deterministic: zero tokens cost
/// zero, unknown models bill at the resolver's default rate.
pub fn calculate_cost(
    table: &PricingTable,
    input_tokens: u64,
    output_tokens: u64,
    model: &str,
) -> CostBreakdown {
    let pricing = table.resolve(model);
    let input_cost = input_tokens as f64 / 1000.0 * pricing.input_per_1k;
    let output_cost = output_tokens as f64 / 1000.0 * pricing.output_per_1k;
    CostBreakdown {
        input_cost,
        output_cost,
        total_cost: input_cost + output_cost,
        pricing,
    }
}

/// Render a dollar amount with graduated precision: two decimals from $1 up,
/// four down to a cent, six below that. Consumers rely on this exact shape
/// for stable dashboard output.
pub fn format_cost(usd: f64) -> String {
    if usd >= 1.0 {
        format!("${:.2}", usd)
    } else if usd >= 0.01 {
        format!("${:.4}", usd)
    } else if usd > 0.0 {
        format!("${:.6}", usd)
    } else {
        "$0.00".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpt4_reference_costs() {
        let table = PricingTable::new();
        let cost = calculate_cost(&table, 1000, 500, "gpt-4");
        assert!((cost.input_cost - 0.03).abs() < 1e-9);
        assert!((cost.output_cost - 0.03).abs() < 1e-9);
        assert!((cost.total_cost - 0.06).abs() < 1e-9);
        assert_eq!(cost.pricing.model, "gpt-4");
    }

    #[test]
    fn total_is_sum_of_directions() {
        let table = PricingTable::new();
        let cost = calculate_cost(&table, 12_345, 6_789, "claude-3-opus");
        assert!((cost.total_cost - (cost.input_cost + cost.output_cost)).abs() < 1e-12);
    }

    #[test]
    fn zero_tokens_cost_nothing() {
        let table = PricingTable::new();
        let cost = calculate_cost(&table, 0, 0, "gpt-4");
        assert_eq!(cost.total_cost, 0.0);
    }

    #[test]
    fn unknown_model_bills_default_rate() {
        let table = PricingTable::new();
        let cost = calculate_cost(&table, 1000, 1000, "mystery-model");
        assert_eq!(cost.pricing.model, "default");
        assert!(cost.total_cost > 0.0);
    }

    #[test]
    fn format_cost_precision_bands() {
        assert_eq!(format_cost(12.5), "$12.50");
        assert_eq!(format_cost(1.0), "$1.00");
        assert_eq!(format_cost(0.25), "$0.2500");
        assert_eq!(format_cost(0.0105), "$0.0105");
        assert_eq!(format_cost(0.0005), "$0.000500");
        assert_eq!(format_cost(0.0), "$0.00");
    }
}
