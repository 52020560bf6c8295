use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PricingEntry
// ---------------------------------------------------------------------------

/// Immutable per-model pricing in USD per 1K tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    pub model: String,
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl PricingEntry {
    pub fn new(model: impl Into<String>, input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            model: model.into(),
            input_per_1k,
            output_per_1k,
        }
    }
}

/// Fallback pricing used when nothing in the table matches.
fn default_entry() -> PricingEntry {
    PricingEntry::new("default", 0.002, 0.006)
}

/// Seed pricing table for common models (approximate published rates).
fn seed_table() -> Vec<PricingEntry> {
    vec![
        // Anthropic
        PricingEntry::new("claude-3-opus", 0.015, 0.075),
        PricingEntry::new("claude-3-5-sonnet", 0.003, 0.015),
        PricingEntry::new("claude-3-haiku", 0.00025, 0.00125),
        // OpenAI
        PricingEntry::new("gpt-4", 0.03, 0.06),
        PricingEntry::new("gpt-4o", 0.0025, 0.01),
        PricingEntry::new("gpt-4o-mini", 0.00015, 0.0006),
        PricingEntry::new("gpt-3.5-turbo", 0.0005, 0.0015),
        PricingEntry::new("o3-mini", 0.0011, 0.0044),
        // Google
        PricingEntry::new("gemini-1.5-pro", 0.00125, 0.005),
        PricingEntry::new("gemini-1.5-flash", 0.000075, 0.0003),
    ]
}

// ---------------------------------------------------------------------------
// PricingTable
// ---------------------------------------------------------------------------

/// Maps free-text model names to a price pair. Resolution never fails.
///
/// Order, first match wins:
/// 1. exact key match
/// 2. case/whitespace-normalized exact match
/// 3. substring match in either direction against every key
/// 4. family heuristics (mini tiers, opus/sonnet/haiku/flash, bare families)
/// 5. the fixed default pair
///
/// Exact pins take precedence over heuristics on purpose: a newly added
/// explicit entry must never be shadowed by an older fuzzy rule.
#[derive(Debug, Clone)]
pub struct PricingTable {
    entries: HashMap<String, PricingEntry>,
    fallback: PricingEntry,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        for entry in seed_table() {
            entries.insert(entry.model.clone(), entry);
        }
        Self {
            entries,
            fallback: default_entry(),
        }
    }
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin an explicit entry. Exact matches always win over heuristics.
    pub fn pin(&mut self, entry: PricingEntry) {
        self.entries.insert(entry.model.clone(), entry);
    }

    /// The fallback pair returned when nothing matches.
    pub fn fallback(&self) -> &PricingEntry {
        &self.fallback
    }

    /// Resolve a model name to a usable price pair. Infallible.
    pub fn resolve(&self, model: &str) -> PricingEntry {
        // 1. Exact.
        if let Some(entry) = self.entries.get(model) {
            return entry.clone();
        }

        // 2. Normalized exact.
        let normalized = model.trim().to_lowercase();
        if let Some(entry) = self.entries.get(normalized.as_str()) {
            return entry.clone();
        }

        // 3. Substring in either direction. Longest key first so
        //    "gpt-4o-mini" beats "gpt-4o" beats "gpt-4" for vendor-prefixed
        //    names like "openai/gpt-4o-mini-2024".
        if !normalized.is_empty() {
            let mut keys: Vec<&String> = self.entries.keys().collect();
            keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            for key in keys {
                if normalized.contains(key.as_str()) || key.contains(normalized.as_str()) {
                    return self.entries[key].clone();
                }
            }
        }

        // 4. Family heuristics, ordered: specific tier fragments before bare
        //    family names.
        if let Some(entry) = self.resolve_family(&normalized) {
            return entry;
        }

        // 5. Default.
        tracing::debug!(model = model, "no pricing match, using default rate");
        self.fallback.clone()
    }

    fn resolve_family(&self, name: &str) -> Option<PricingEntry> {
        let lookup = |key: &str| self.entries.get(key).cloned();

        if name.contains("mini") {
            if name.contains("o3") {
                return lookup("o3-mini");
            }
            return lookup("gpt-4o-mini");
        }
        if name.contains("opus") {
            return lookup("claude-3-opus");
        }
        if name.contains("sonnet") {
            return lookup("claude-3-5-sonnet");
        }
        if name.contains("haiku") {
            return lookup("claude-3-haiku");
        }
        if name.contains("flash") {
            return lookup("gemini-1.5-flash");
        }
        // Bare family names fall back to that family's mid tier.
        if name.contains("claude") {
            return lookup("claude-3-5-sonnet");
        }
        if name.contains("gemini") {
            return lookup("gemini-1.5-pro");
        }
        if name.contains("gpt-4") {
            return lookup("gpt-4");
        }
        if name.contains("gpt") {
            return lookup("gpt-3.5-turbo");
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
