// Crew rolling - budgeted purchase/reroll loop shared by several workers
use crate::client::{Action, GameClient};
use crate::error::Result;
use crate::fields;
use crate::models::*;
use crate::storage::{ClaimRegistry, RollStats};
use crate::{o_debug, o_info, o_summary};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration, Instant};

/// Balance every worker must leave behind so the others can still finish
/// one purchase-plus-reroll cycle.
pub fn rolling_floor(worker_count: usize, purchase_cost: i64) -> i64 {
    worker_count as i64 * purchase_cost * 2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Rolling,
    /// Budget exhausted, waiting for the balance to recover
    Paused,
    /// Deadline reached or storage full
    Stopped,
}

/// Result of one purchase cycle
#[derive(Debug, Clone, PartialEq)]
pub enum RollOutcome {
    Accepted(StoredCrew),
    /// Budget ran out mid-reroll; the crew was accepted and then deleted
    Discarded(StoredCrew),
}

#[derive(Debug, Default)]
struct RollerState {
    /// Local estimate, debited before the server confirms
    balance: i64,
    floor: i64,
    remaining_slots: i64,
    storage: Vec<StoredCrew>,
    stats: RollStats,
    workers: HashMap<usize, WorkerState>,
    /// Rolls since the worker's last accepted crew
    pending_rolls: HashMap<usize, u64>,
    /// Set when a worker aborts rerolling; its next finalize deletes instead
    discard_next: HashMap<usize, bool>,
}

#[derive(Clone)]
pub struct CrewRoller {
    client: GameClient,
    state: Arc<Mutex<RollerState>>,
    claims: ClaimRegistry<String>,
}

impl CrewRoller {
    pub fn new(client: GameClient) -> Self {
        let floor = rolling_floor(1, client.config().rolling.purchase_cost);
        Self {
            client,
            state: Arc::new(Mutex::new(RollerState {
                floor,
                ..RollerState::default()
            })),
            claims: ClaimRegistry::new(),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RollerState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }

    /// Cached balance; may run ahead of the server until the next refresh
    pub fn balance(&self) -> i64 {
        self.with_state(|s| s.balance)
    }

    pub fn floor(&self) -> i64 {
        self.with_state(|s| s.floor)
    }

    pub fn remaining_slots(&self) -> i64 {
        self.with_state(|s| s.remaining_slots)
    }

    pub fn stats(&self) -> RollStats {
        self.with_state(|s| s.stats.clone())
    }

    pub fn worker_state(&self, worker: usize) -> WorkerState {
        self.with_state(|s| s.workers.get(&worker).copied().unwrap_or(WorkerState::Idle))
    }

    fn set_worker_state(&self, worker: usize, next: WorkerState) {
        let previous = self.with_state(|s| s.workers.insert(worker, next));
        if previous != Some(next) {
            o_debug!("[Crew-{}] {:?} -> {:?}", worker, previous.unwrap_or(WorkerState::Idle), next);
        }
    }

    /// Size the floor for `worker_count` concurrent workers and put each
    /// one in its starting state.
    pub fn configure_workers(&self, worker_count: usize) {
        let rolling = &self.client.config().rolling;
        let floor = rolling_floor(worker_count, rolling.purchase_cost);
        let margin = rolling.slot_safety_margin;
        self.with_state(|s| {
            s.floor = floor;
            let start = if s.balance >= floor && s.remaining_slots > margin {
                WorkerState::Rolling
            } else {
                WorkerState::Paused
            };
            for worker in 0..worker_count {
                s.workers.insert(worker, start);
                s.pending_rolls.insert(worker, 0);
                s.discard_next.insert(worker, false);
            }
        });
    }

    /// Balance must cover the floor and storage must keep its safety margin
    pub fn can_purchase(&self) -> bool {
        let margin = self.client.config().rolling.slot_safety_margin;
        self.with_state(|s| s.balance >= s.floor && s.remaining_slots > margin)
    }

    /// Replace the cached balance with the server's value
    pub async fn refresh_balance(&self) -> Result<i64> {
        let config = self.client.config();
        let body = fields!(
            "userid" => config.identity.user_id,
            "currencyid" => config.rolling.currency_id,
        );
        let response: BalanceResponse = self
            .client
            .execute_as(Action::CurrencyBalance, "player/getCurrencyBalance", fields!(), body)
            .await?;

        let amount = response.amount(config.rolling.currency_id).ok_or_else(|| {
            crate::error::BotError::protocol(format!(
                "balance response has no currency {}",
                config.rolling.currency_id
            ))
        })?;
        self.with_state(|s| s.balance = amount);
        Ok(amount)
    }

    pub async fn refresh_storage(&self) -> Result<CrewStorageResponse> {
        let response: CrewStorageResponse = self
            .client
            .execute_as(Action::CrewStorage, "api/bm/roguecrew/read", fields!(), fields!())
            .await?;
        self.with_state(|s| {
            s.remaining_slots = response.remaining_slots;
            s.storage = response.items.clone();
        });
        Ok(response)
    }

    pub async fn refresh(&self) -> Result<()> {
        self.refresh_storage().await?;
        self.refresh_balance().await?;
        Ok(())
    }

    pub async fn create(&self) -> Result<Purchase> {
        let rolling = &self.client.config().rolling;
        self.with_state(|s| s.balance -= rolling.purchase_cost);
        let response: PurchaseResponse = self
            .client
            .execute_as(
                Action::CrewCreate,
                "api/bm/roguecrew/create",
                fields!(),
                fields!("packId" => rolling.pack_id.as_str()),
            )
            .await?;
        Ok(response.purchase)
    }

    pub async fn reroll(&self, transaction_id: i64) -> Result<Purchase> {
        let rolling = &self.client.config().rolling;
        self.with_state(|s| s.balance -= rolling.reroll_cost);
        let response: PurchaseResponse = self
            .client
            .execute_as(
                Action::CrewReroll,
                "api/bm/roguecrew/reroll",
                fields!(),
                fields!("transactionId" => transaction_id),
            )
            .await?;
        Ok(response.purchase)
    }

    pub async fn accept(&self, transaction_id: i64) -> Result<StoredCrew> {
        let response: AcceptResponse = self
            .client
            .execute_as(
                Action::CrewAccept,
                "api/bm/roguecrew/accept",
                fields!(),
                fields!("transactionId" => transaction_id),
            )
            .await?;
        Ok(response.item)
    }

    pub async fn delete(&self, crew_instance_id: &str) -> Result<()> {
        self.client
            .execute(
                Action::CrewDelete,
                "api/bm/roguecrew/delete",
                fields!(),
                fields!("id" => crew_instance_id),
            )
            .await?;
        Ok(())
    }

    pub async fn assign(&self, crew_instance_id: &str, fleet_id: &str) -> Result<()> {
        self.client
            .execute(
                Action::CrewAssign,
                "api/bm/roguecrew/assign",
                fields!(),
                fields!("id" => crew_instance_id, "fleet_id" => fleet_id),
            )
            .await?;
        Ok(())
    }

    /// First unassigned stored crew of `crew_type` this caller managed to claim
    pub fn pick_crew(&self, crew_type: u32) -> Option<StoredCrew> {
        let storage = self.with_state(|s| s.storage.clone());
        storage
            .into_iter()
            .filter(|crew| crew.crew_id == crew_type && crew.is_unassigned())
            .find(|crew| self.claims.claim(&crew.id))
    }

    /// Drop a claimed crew from storage and delete it server-side
    pub async fn release_crew(&self, crew: &StoredCrew) -> Result<()> {
        self.with_state(|s| s.storage.retain(|stored| stored.id != crew.id));
        self.claims.release(&crew.id);
        self.delete(&crew.id).await
    }

    /// One purchase cycle. `Ok(None)` when the budget or storage blocks a purchase.
    pub async fn roll_crew(&self, worker: usize) -> Result<Option<RollOutcome>> {
        if !self.can_purchase() {
            self.set_worker_state(worker, WorkerState::Paused);
            return Ok(None);
        }

        let config = self.client.config();
        let mut purchase = self.create().await?;
        let mut crew_type = purchase.crew_type()?;

        while !config.crews.allow_list.contains(&crew_type) {
            self.record_roll(worker, crew_type);

            if self.balance() < self.floor() {
                o_debug!("[Crew-{}] budget exhausted mid-reroll", worker);
                self.with_state(|s| s.discard_next.insert(worker, true));
                self.set_worker_state(worker, WorkerState::Paused);
                break;
            }

            purchase = self.reroll(purchase.transaction_id).await?;
            crew_type = purchase.crew_type()?;
        }

        // The current transaction is always finalized; a pending discard
        // then deletes what was just accepted.
        let crew = self.accept(purchase.transaction_id).await?;
        let discard = self.with_state(|s| s.discard_next.insert(worker, false).unwrap_or(false));

        if discard {
            self.delete(&crew.id).await?;
            self.with_state(|s| s.stats.record_discard());
            return Ok(Some(RollOutcome::Discarded(crew)));
        }

        self.record_roll(worker, crew.crew_id);
        self.with_state(|s| {
            let streak = s.pending_rolls.insert(worker, 0).unwrap_or(0);
            s.stats.record_accept(crew.crew_id, streak);
            s.remaining_slots -= 1;
            s.storage.push(crew.clone());
        });
        Ok(Some(RollOutcome::Accepted(crew)))
    }

    fn record_roll(&self, worker: usize, crew_type: u32) {
        self.with_state(|s| {
            s.stats.record_roll(crew_type);
            *s.pending_rolls.entry(worker).or_insert(0) += 1;
        });
    }

    /// Roll until the deadline or until storage is down to its safety margin.
    /// Paused workers poll the balance and resume once it is back above the floor.
    pub async fn fill_crews(&self, worker: usize, deadline: Instant) -> Result<()> {
        let config = self.client.config();
        let margin = config.rolling.slot_safety_margin;
        let pause = Duration::from_secs(config.rolling.pause_seconds);

        while Instant::now() < deadline && self.remaining_slots() > margin {
            if self.worker_state(worker) != WorkerState::Rolling {
                if self.balance() >= self.floor() {
                    o_debug!("[Crew-{}] resuming", worker);
                    self.set_worker_state(worker, WorkerState::Rolling);
                } else {
                    self.set_worker_state(worker, WorkerState::Paused);
                    sleep(pause).await;
                    self.refresh_balance().await?;
                    continue;
                }
            }

            match self.roll_crew(worker).await? {
                Some(RollOutcome::Accepted(crew)) => {
                    o_info!("[Crew-{}] accepted {}", worker, config.crew_name(crew.crew_id));
                    self.print_status();
                }
                Some(RollOutcome::Discarded(crew)) => {
                    o_info!("[Crew-{}] discarded {}", worker, config.crew_name(crew.crew_id));
                }
                None => {}
            }

            self.refresh_balance().await?;
        }

        self.set_worker_state(worker, WorkerState::Stopped);
        o_info!("[Crew-{}] finished rolling", worker);
        Ok(())
    }

    /// Delete stored crews; only block-listed types unless `block_list_only` is false.
    /// Each crew is claimed first so an in-flight assignment is never deleted.
    pub async fn flush(&self, block_list_only: bool) -> Result<usize> {
        let config = self.client.config();
        let response = self.refresh_storage().await?;
        let mut deleted = 0;

        for crew in response.items {
            if block_list_only && !config.crews.block_list.contains(&crew.crew_id) {
                continue;
            }
            if !self.claims.claim(&crew.id) {
                o_debug!("[Crews] {} is claimed, skipping", crew.id);
                continue;
            }
            self.release_crew(&crew).await?;
            deleted += 1;
            o_info!("deleted {}", config.crew_name(crew.crew_id));
        }
        Ok(deleted)
    }

    pub fn print_status(&self) {
        let config = self.client.config();
        let stats = self.stats();
        let mut lines = vec![
            "====== Crew Status ======".to_string(),
            format!("Rolls : {}", stats.total_rolls()),
        ];
        for crew_type in &config.crews.allow_list {
            let accepted = stats.accepted_of(*crew_type);
            if accepted > 0 {
                lines.push(format!("{} : {}", config.crew_name(*crew_type), accepted));
            }
        }
        o_summary!("{}", lines.join("\n"));
    }
}
