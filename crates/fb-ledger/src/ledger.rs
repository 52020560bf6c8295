use std::sync::Arc;

use chrono::Utc;
use fb_agents::StatusEngine;
use fb_core::store::{FleetStore, StoreError};
use fb_core::trace::TraceRegistry;
use fb_core::types::{Activity, ActivityDraft, ActivityPatch};
use fb_metering::{calculate_cost, ContentClass, PricingTable, TokenEstimator};
use tracing::warn;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("activity not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// ActivityLedger
// ---------------------------------------------------------------------------

/// The append-only record of ingested activities.
///
/// `append` owns the full ingest pipeline: token estimation, cost
/// computation, causal parent resolution, persistence, trace-head update,
/// ticket counter increments, and status notification. Persistence failure
/// aborts the append; failures in the post-persist side effects are logged
/// and swallowed, so callers needing ticket-counter or status consistency
/// must re-derive it from the ledger rather than assume atomicity.
pub struct ActivityLedger {
    store: Arc<dyn FleetStore>,
    traces: TraceRegistry,
    status: StatusEngine,
    pricing: PricingTable,
    estimator: TokenEstimator,
}

impl ActivityLedger {
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self::with_components(
            store,
            TraceRegistry::new(),
            PricingTable::new(),
            TokenEstimator::default(),
        )
    }

    pub fn with_components(
        store: Arc<dyn FleetStore>,
        traces: TraceRegistry,
        pricing: PricingTable,
        estimator: TokenEstimator,
    ) -> Self {
        let status = StatusEngine::new(store.clone());
        Self {
            store,
            traces,
            status,
            pricing,
            estimator,
        }
    }

    /// The trace registry used for auto-chaining.
    pub fn traces(&self) -> &TraceRegistry {
        &self.traces
    }

    /// The status engine this ledger notifies; heartbeats go straight here.
    pub fn status_engine(&self) -> &StatusEngine {
        &self.status
    }

    /// Ingest one unit of agent work.
    pub async fn append(&self, draft: ActivityDraft) -> Result<Activity, LedgerError> {
        // 1. Fill missing token counts from the payloads.
        let input_tokens = match draft.input_tokens {
            Some(tokens) => tokens,
            None => self.estimate(draft.input.as_deref(), draft.content_parts.as_ref()),
        };
        let output_tokens = match draft.output_tokens {
            Some(tokens) => tokens,
            None => self.estimate(draft.output.as_deref(), None),
        };

        // 2-3. Derived totals and cost. Cost fields are set iff a model is
        // named and at least one direction is nonzero.
        let total_tokens = input_tokens + output_tokens;
        let cost = draft
            .model
            .as_deref()
            .filter(|_| total_tokens > 0)
            .map(|model| calculate_cost(&self.pricing, input_tokens, output_tokens, model));

        // 4. Causal parent: explicit wins; otherwise the trace's current
        // head, if any. The lookup and the head update in step 6 are not
        // atomic — concurrent appends on one trace race, last writer wins.
        let parent_activity_id = match draft.parent_activity_id {
            Some(parent) => Some(parent),
            None => match &draft.trace_id {
                Some(trace_id) => self.traces.head(trace_id).await,
                None => None,
            },
        };

        let activity = Activity {
            id: Uuid::new_v4(),
            agent_id: draft.agent_id,
            kind: draft.kind,
            description: draft.description,
            input: draft.input,
            output: draft.output,
            content_parts: draft.content_parts,
            input_tokens,
            output_tokens,
            total_tokens,
            cache_hits: draft.cache_hits,
            tool_name: draft.tool_name,
            tool_input: draft.tool_input,
            tool_output: draft.tool_output,
            api_endpoint: draft.api_endpoint,
            api_method: draft.api_method,
            api_status_code: draft.api_status_code,
            duration_ms: draft.duration_ms,
            ticket_id: draft.ticket_id,
            parent_activity_id,
            trace_id: draft.trace_id,
            session_id: draft.session_id,
            request_id: draft.request_id,
            model: draft.model,
            cost_input: cost.as_ref().map(|c| c.input_cost),
            cost_output: cost.as_ref().map(|c| c.output_cost),
            cost_total: cost.as_ref().map(|c| c.total_cost),
            metadata: draft.metadata,
            created_at: Utc::now(),
        };

        // 5. Persist. Failure aborts the append with no visible side effects.
        self.store.insert_activity(activity.clone()).await?;

        // 6. Advance the trace head to this activity.
        if let Some(trace_id) = &activity.trace_id {
            self.traces.set_head(trace_id, activity.id).await;
        }

        // 7. Ticket counters. Post-persist: failure is logged, never rolled
        // back into the already-persisted activity.
        if let Some(ticket_id) = activity.ticket_id {
            if total_tokens > 0 {
                if let Err(e) = self
                    .store
                    .add_ticket_tokens(ticket_id, input_tokens, output_tokens)
                    .await
                {
                    warn!(
                        activity_id = %activity.id,
                        ticket_id = %ticket_id,
                        error = %e,
                        "ticket counter update failed"
                    );
                }
            }
        }

        // 8. Status notification. Same post-persist semantics as step 7.
        if let Err(e) = self
            .status
            .on_activity(&activity.agent_id, &activity.kind, total_tokens)
            .await
        {
            warn!(
                activity_id = %activity.id,
                agent_id = %activity.agent_id,
                error = %e,
                "status notification failed"
            );
        }

        Ok(activity)
    }

    /// Apply the single follow-up update an activity may receive.
    ///
    /// When `output_tokens` changes, `total_tokens` and cost are recomputed
    /// from the stored input tokens and the new output tokens — never from
    /// anything caller-supplied.
    pub async fn update(&self, id: Uuid, patch: ActivityPatch) -> Result<Activity, LedgerError> {
        let mut activity = self
            .store
            .get_activity(id)
            .await?
            .ok_or(LedgerError::NotFound(id))?;

        if let Some(output) = patch.output {
            activity.output = Some(output);
        }
        if let Some(tool_output) = patch.tool_output {
            activity.tool_output = Some(tool_output);
        }
        if let Some(duration_ms) = patch.duration_ms {
            activity.duration_ms = Some(duration_ms);
        }
        if let Some(api_status_code) = patch.api_status_code {
            activity.api_status_code = Some(api_status_code);
        }
        for (key, value) in patch.metadata {
            activity.metadata.insert(key, value);
        }

        if let Some(output_tokens) = patch.output_tokens {
            activity.output_tokens = output_tokens;
            activity.total_tokens = activity.input_tokens + output_tokens;
            match activity.model.as_deref().filter(|_| activity.total_tokens > 0) {
                Some(model) => {
                    let cost = calculate_cost(
                        &self.pricing,
                        activity.input_tokens,
                        output_tokens,
                        model,
                    );
                    activity.cost_input = Some(cost.input_cost);
                    activity.cost_output = Some(cost.output_cost);
                    activity.cost_total = Some(cost.total_cost);
                }
                None => {
                    activity.cost_input = None;
                    activity.cost_output = None;
                    activity.cost_total = None;
                }
            }
        }

        self.store.update_activity(activity.clone()).await?;
        Ok(activity)
    }

    /// Administrative removal. Side effects on ticket counters and agent
    /// status history are deliberately not reversed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, LedgerError> {
        Ok(self.store.delete_activity(id).await?)
    }

    fn estimate(&self, text: Option<&str>, structured: Option<&serde_json::Value>) -> u64 {
        if let Some(text) = text {
            return self.estimator.estimate_text(text, ContentClass::Mixed);
        }
        if let Some(value) = structured {
            return self.estimator.estimate_value(value, ContentClass::Mixed);
        }
        0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
