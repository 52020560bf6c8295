use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use fb_core::store::FleetStore;
use fb_core::types::{Activity, ActivityKind, Agent, AgentStatus};
use tokio::sync::watch;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// ReconcilerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How often the sweep runs.
    pub period: Duration,
    /// How stale a heartbeat may be before the agent is forced offline.
    pub offline_threshold: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(30),
            offline_threshold: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// Effective status
// ---------------------------------------------------------------------------

/// Display-time status, recomputed on every read and never stored.
///
/// A stale heartbeat reads as OFFLINE even before the reconciler has
/// persisted it; a stored OFFLINE with a fresh heartbeat reads as IDLE, since
/// the agent has resumed reporting but no activity has reclassified it yet.
pub fn effective_status(agent: &Agent, now: DateTime<Utc>, threshold: Duration) -> AgentStatus {
    let stale = now
        .signed_duration_since(agent.last_heartbeat)
        .to_std()
        .map(|elapsed| elapsed > threshold)
        .unwrap_or(false);
    if stale {
        AgentStatus::Offline
    } else if agent.status == AgentStatus::Offline {
        AgentStatus::Idle
    } else {
        agent.status
    }
}

// ---------------------------------------------------------------------------
// HeartbeatReconciler
// ---------------------------------------------------------------------------

/// Periodic sweep that forces agents with stale heartbeats into OFFLINE.
///
/// This is the only path that moves an agent to OFFLINE without an explicit
/// heartbeat saying so. Each forced transition records a history entry on the
/// agent and a `status_change` audit activity in the ledger store.
pub struct HeartbeatReconciler {
    store: Arc<dyn FleetStore>,
    config: ReconcilerConfig,
}

impl HeartbeatReconciler {
    pub fn new(store: Arc<dyn FleetStore>, config: ReconcilerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Display-time status for an agent under this reconciler's threshold.
    pub fn display_status(&self, agent: &Agent, now: DateTime<Utc>) -> AgentStatus {
        effective_status(agent, now, self.config.offline_threshold)
    }

    /// One sweep. Returns the number of agents forced offline. Listing
    /// agents is a hard failure; a failed write for one agent is logged and
    /// the sweep continues.
    pub async fn tick(&self) -> Result<usize> {
        let now = Utc::now();
        let agents = self.store.list_agents().await?;

        let mut forced = 0;
        for mut agent in agents {
            if agent.status == AgentStatus::Offline {
                continue;
            }
            let elapsed = match now.signed_duration_since(agent.last_heartbeat).to_std() {
                Ok(elapsed) => elapsed,
                Err(_) => continue, // heartbeat in the future; clock skew
            };
            if elapsed <= self.config.offline_threshold {
                continue;
            }

            agent.transition_to(AgentStatus::Offline, now, "heartbeat timeout");
            let agent_id = agent.id.clone();
            if let Err(e) = self.store.upsert_agent(agent).await {
                warn!(agent_id = %agent_id, error = %e, "failed to persist forced offline");
                continue;
            }

            let mut audit = Activity::new(agent_id.clone(), ActivityKind::StatusChange);
            audit.description = format!(
                "forced offline: no heartbeat for {}s",
                elapsed.as_secs()
            );
            if let Err(e) = self.store.insert_activity(audit).await {
                warn!(agent_id = %agent_id, error = %e, "failed to record offline audit activity");
            }

            info!(agent_id = %agent_id, stale_secs = elapsed.as_secs(), "agent forced offline");
            forced += 1;
        }

        Ok(forced)
    }

    /// Run the sweep on the configured period until `shutdown` flips to
    /// `true` or the sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            period_secs = self.config.period.as_secs(),
            threshold_secs = self.config.offline_threshold.as_secs(),
            "heartbeat reconciler started"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(0) => {}
                        Ok(forced) => info!(forced, "reconciler sweep forced agents offline"),
                        Err(e) => warn!(error = %e, "reconciler sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("heartbeat reconciler stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fb_core::store::{ActivityFilter, ActivityStore, AgentStore, MemoryStore};
    use fb_core::types::Agent;

    async fn seed_agent(store: &MemoryStore, id: &str, stale: Option<chrono::Duration>) -> Agent {
        let mut agent = Agent::new(id, id);
        if let Some(stale) = stale {
            agent.last_heartbeat = Utc::now() - stale;
        }
        store.upsert_agent(agent.clone()).await.unwrap();
        agent
    }

    fn reconciler(store: Arc<MemoryStore>) -> HeartbeatReconciler {
        HeartbeatReconciler::new(
            store,
            ReconcilerConfig {
                period: Duration::from_millis(10),
                offline_threshold: Duration::from_secs(60),
            },
        )
    }

    #[tokio::test]
    async fn stale_agent_forced_offline() {
        let store = Arc::new(MemoryStore::new());
        seed_agent(&store, "stale", Some(chrono::Duration::seconds(120))).await;
        seed_agent(&store, "fresh", None).await;

        let forced = reconciler(store.clone()).tick().await.unwrap();
        assert_eq!(forced, 1);

        let stale = store.get_agent("stale").await.unwrap().unwrap();
        assert_eq!(stale.status, AgentStatus::Offline);
        assert_eq!(stale.status_history.last().unwrap().reason, "heartbeat timeout");

        let fresh = store.get_agent("fresh").await.unwrap().unwrap();
        assert_eq!(fresh.status, AgentStatus::Idle);
    }

    #[tokio::test]
    async fn sweep_records_audit_activity() {
        let store = Arc::new(MemoryStore::new());
        seed_agent(&store, "stale", Some(chrono::Duration::seconds(300))).await;

        reconciler(store.clone()).tick().await.unwrap();

        let audits = store
            .list_activities(&ActivityFilter::all().for_agent("stale"))
            .await
            .unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].kind, ActivityKind::StatusChange);
        assert!(audits[0].description.contains("forced offline"));
    }

    #[tokio::test]
    async fn already_offline_agents_untouched() {
        let store = Arc::new(MemoryStore::new());
        let mut agent = seed_agent(&store, "gone", Some(chrono::Duration::seconds(300))).await;
        agent.transition_to(AgentStatus::Offline, Utc::now(), "heartbeat timeout");
        let history_len = agent.status_history.len();
        store.upsert_agent(agent).await.unwrap();

        let forced = reconciler(store.clone()).tick().await.unwrap();
        assert_eq!(forced, 0);

        let agent = store.get_agent("gone").await.unwrap().unwrap();
        assert_eq!(agent.status_history.len(), history_len);
    }

    #[tokio::test]
    async fn effective_status_views() {
        let threshold = Duration::from_secs(60);
        let now = Utc::now();

        // Fresh heartbeat, stored Working -> Working.
        let mut agent = Agent::new("a1", "a1");
        agent.status = AgentStatus::Working;
        assert_eq!(effective_status(&agent, now, threshold), AgentStatus::Working);

        // Stale heartbeat reads OFFLINE before the sweep persists it.
        agent.last_heartbeat = now - chrono::Duration::seconds(120);
        assert_eq!(effective_status(&agent, now, threshold), AgentStatus::Offline);

        // Stored OFFLINE but heartbeating again reads IDLE.
        agent.status = AgentStatus::Offline;
        agent.last_heartbeat = now;
        assert_eq!(effective_status(&agent, now, threshold), AgentStatus::Idle);
    }

    #[tokio::test]
    async fn run_loop_sweeps_until_shutdown() {
        let store = Arc::new(MemoryStore::new());
        seed_agent(&store, "stale", Some(chrono::Duration::seconds(120))).await;

        let reconciler = Arc::new(reconciler(store.clone()));
        let (tx, rx) = watch::channel(false);
        let handle = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.run(rx).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        let agent = store.get_agent("stale").await.unwrap().unwrap();
        assert_eq!(agent.status, AgentStatus::Offline);
    }
}
