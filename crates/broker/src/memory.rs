// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory broker for tests.
//!
//! Implements all four adapter traits with the same transition semantics
//! as the Redis scripts, driven by an injectable [`Clock`] so tests can
//! step time deterministically.

use crate::adapter::{
    BrokerError, EnqueueOutcome, EnqueueSpec, FailOutcome, LeaseState, LockAdapter, ProfilesCache,
    QueueAdapter, QueueCounts, RemoveOutcome, RunStore, StalledSweep,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wq_core::{
    AnalysisRun, AnalysisScope, Clock, HolderProfilesResult, JobId, JobRecord, JobState,
    ProgressValue, QueueName, RunStatus,
};

#[derive(Default)]
struct QueueSim {
    /// (score, id); score encodes (priority desc, FIFO) like the broker.
    waiting: Vec<(u64, String)>,
    /// (promote_at_ms, id)
    delayed: Vec<(u64, String)>,
    /// id → lease deadline ms
    active: HashMap<String, u64>,
    /// Finish order, oldest first.
    completed: Vec<String>,
    failed: Vec<String>,
    paused: bool,
}

struct LockEntry {
    owner: String,
    expires_at_ms: u64,
}

struct CacheEntry {
    json: String,
    expires_at_ms: u64,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, JobRecord>,
    /// Enqueue sequence per job id; preserved across retries so a
    /// requeued job keeps its FIFO position.
    seqs: HashMap<String, u64>,
    queues: HashMap<QueueName, QueueSim>,
    seq: u64,
    locks: HashMap<String, LockEntry>,
    cache: HashMap<String, CacheEntry>,
    /// "(wallet):(scope)" → latest run
    runs: HashMap<String, AnalysisRun>,
}

fn score(priority: u8, seq: u64) -> u64 {
    (10 - u64::from(priority.min(10))) * 10_u64.pow(13) + seq
}

fn runs_field(wallet: &str, scope: AnalysisScope) -> String {
    format!("{wallet}:{scope}")
}

/// An in-process stand-in for the whole broker.
#[derive(Clone)]
pub struct MemoryBroker<C: Clock> {
    clock: C,
    inner: Arc<Mutex<Inner>>,
}

impl<C: Clock> MemoryBroker<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, inner: Arc::new(Mutex::new(Inner::default())) }
    }

    /// Insert a raw cache entry (tests use this to plant corrupt payloads).
    pub fn insert_raw_cache(&self, key: &str, json: &str, ttl_ms: u64) {
        let expires_at_ms = self.clock.epoch_ms() + ttl_ms;
        self.inner
            .lock()
            .cache
            .insert(key.to_string(), CacheEntry { json: json.to_string(), expires_at_ms });
    }

    /// Raw cache read, skipping the decode (tests assert deletion).
    pub fn raw_cache_get(&self, key: &str) -> Option<String> {
        let now = self.clock.epoch_ms();
        self.inner
            .lock()
            .cache
            .get(key)
            .filter(|e| e.expires_at_ms > now)
            .map(|e| e.json.clone())
    }

    /// Directly plant a lock (tests set up orphans with this).
    pub fn plant_lock(&self, key: &str, owner: &str, ttl_ms: u64) {
        let expires_at_ms = self.clock.epoch_ms() + ttl_ms;
        self.inner
            .lock()
            .locks
            .insert(key.to_string(), LockEntry { owner: owner.to_string(), expires_at_ms });
    }
}

#[async_trait]
impl<C: Clock> QueueAdapter for MemoryBroker<C> {
    async fn add(&self, spec: EnqueueSpec) -> Result<EnqueueOutcome, BrokerError> {
        let now = self.clock.epoch_ms();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(existing) = inner.jobs.get(spec.id.as_str()) {
            return Ok(if existing.is_terminal() {
                EnqueueOutcome::TerminalExists(existing.clone())
            } else {
                EnqueueOutcome::AlreadyQueued(existing.clone())
            });
        }

        inner.seq += 1;
        let seq = inner.seq;
        let queue = spec.kind.queue();
        let state = if spec.delay_ms > 0 { JobState::Delayed } else { JobState::Waiting };
        let job = JobRecord {
            id: spec.id.clone(),
            kind: spec.kind,
            queue,
            payload: spec.payload,
            priority: spec.priority,
            state,
            attempts_made: 0,
            max_attempts: spec.max_attempts,
            created_at_ms: now,
            processed_at_ms: None,
            finished_at_ms: None,
            failed_reason: None,
            return_value: None,
            progress: None,
            delay_ms: spec.delay_ms,
            stalled_count: 0,
            cancel_requested: false,
        };
        inner.jobs.insert(spec.id.to_string(), job.clone());
        inner.seqs.insert(spec.id.to_string(), seq);

        let sim = inner.queues.entry(queue).or_default();
        if spec.delay_ms > 0 {
            sim.delayed.push((now + spec.delay_ms, spec.id.to_string()));
        } else {
            sim.waiting.push((score(spec.priority, seq), spec.id.to_string()));
            sim.waiting.sort();
        }
        Ok(EnqueueOutcome::Enqueued(job))
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<JobRecord>, BrokerError> {
        Ok(self.inner.lock().jobs.get(id.as_str()).cloned())
    }

    async fn jobs_in_state(
        &self,
        queue: QueueName,
        state: JobState,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<JobRecord>, BrokerError> {
        let guard = self.inner.lock();
        let Some(sim) = guard.queues.get(&queue) else {
            return Ok(Vec::new());
        };
        let ids: Vec<String> = match state {
            JobState::Waiting => sim.waiting.iter().map(|(_, id)| id.clone()).collect(),
            JobState::Delayed => sim.delayed.iter().map(|(_, id)| id.clone()).collect(),
            JobState::Active => sim.active.keys().cloned().collect(),
            JobState::Completed => sim.completed.iter().rev().cloned().collect(),
            JobState::Failed => sim.failed.iter().rev().cloned().collect(),
            JobState::Paused => {
                return Err(BrokerError::Unsupported { op: "jobs_in_state", state })
            }
        };
        Ok(ids
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| guard.jobs.get(&id).cloned())
            .collect())
    }

    async fn counts(&self, queue: QueueName) -> Result<QueueCounts, BrokerError> {
        let guard = self.inner.lock();
        let Some(sim) = guard.queues.get(&queue) else {
            return Ok(QueueCounts::default());
        };
        Ok(QueueCounts {
            waiting: sim.waiting.len() as u64,
            active: sim.active.len() as u64,
            completed: sim.completed.len() as u64,
            failed: sim.failed.len() as u64,
            delayed: sim.delayed.len() as u64,
            paused: sim.paused,
        })
    }

    async fn is_paused(&self, queue: QueueName) -> Result<bool, BrokerError> {
        Ok(self.inner.lock().queues.get(&queue).map(|s| s.paused).unwrap_or(false))
    }

    async fn set_paused(&self, queue: QueueName, paused: bool) -> Result<(), BrokerError> {
        self.inner.lock().queues.entry(queue).or_default().paused = paused;
        Ok(())
    }

    async fn clean(
        &self,
        queue: QueueName,
        grace_ms: u64,
        keep: usize,
        state: JobState,
    ) -> Result<u64, BrokerError> {
        if !matches!(state, JobState::Completed | JobState::Failed) {
            return Err(BrokerError::Unsupported { op: "clean", state });
        }
        let cutoff = self.clock.epoch_ms().saturating_sub(grace_ms);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(sim) = inner.queues.get_mut(&queue) else {
            return Ok(0);
        };
        let list = if state == JobState::Completed { &mut sim.completed } else { &mut sim.failed };

        let mut removed = 0;
        let mut kept = Vec::with_capacity(list.len());
        let removable = list.len().saturating_sub(keep);
        for id in list.drain(..) {
            let finished =
                inner.jobs.get(&id).and_then(|j| j.finished_at_ms).unwrap_or(0);
            if removed < removable && finished <= cutoff {
                inner.jobs.remove(&id);
                inner.seqs.remove(&id);
                removed += 1;
            } else {
                kept.push(id);
            }
        }
        *list = kept;
        Ok(removed as u64)
    }

    async fn remove(&self, id: &JobId) -> Result<RemoveOutcome, BrokerError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(job) = inner.jobs.get(id.as_str()) else {
            return Ok(RemoveOutcome::NotFound);
        };
        let queue = job.queue;
        let sim = inner.queues.entry(queue).or_default();

        if let Some(pos) = sim.waiting.iter().position(|(_, jid)| jid == id.as_str()) {
            sim.waiting.remove(pos);
            inner.jobs.remove(id.as_str());
            inner.seqs.remove(id.as_str());
            return Ok(RemoveOutcome::Removed);
        }
        if let Some(pos) = sim.delayed.iter().position(|(_, jid)| jid == id.as_str()) {
            sim.delayed.remove(pos);
            inner.jobs.remove(id.as_str());
            inner.seqs.remove(id.as_str());
            return Ok(RemoveOutcome::Removed);
        }
        if sim.active.contains_key(id.as_str()) {
            if let Some(job) = inner.jobs.get_mut(id.as_str()) {
                job.cancel_requested = true;
            }
            return Ok(RemoveOutcome::AbortRequested);
        }
        sim.completed.retain(|jid| jid != id.as_str());
        sim.failed.retain(|jid| jid != id.as_str());
        inner.jobs.remove(id.as_str());
        inner.seqs.remove(id.as_str());
        Ok(RemoveOutcome::Removed)
    }

    async fn reserve(
        &self,
        queue: QueueName,
        lease_ms: u64,
    ) -> Result<Option<JobRecord>, BrokerError> {
        let now = self.clock.epoch_ms();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let sim = inner.queues.entry(queue).or_default();
        if sim.paused {
            return Ok(None);
        }

        // Promote due delayed jobs, keeping their original FIFO position.
        let (ready, pending): (Vec<_>, Vec<_>) =
            sim.delayed.drain(..).partition(|(at, _)| *at <= now);
        sim.delayed = pending;
        for (_, id) in ready {
            if let Some(job) = inner.jobs.get_mut(&id) {
                job.state = JobState::Waiting;
                let seq = inner.seqs.get(&id).copied().unwrap_or(0);
                sim.waiting.push((score(job.priority, seq), id));
            }
        }
        sim.waiting.sort();

        if sim.waiting.is_empty() {
            return Ok(None);
        }
        let (_, id) = sim.waiting.remove(0);
        sim.active.insert(id.clone(), now + lease_ms);
        let job = inner.jobs.get_mut(&id).ok_or_else(|| BrokerError::Corrupt {
            id: id.clone(),
            reason: "waiting entry without job body".to_string(),
        })?;
        job.state = JobState::Active;
        job.processed_at_ms = Some(now);
        job.attempts_made += 1;
        Ok(Some(job.clone()))
    }

    async fn heartbeat(&self, id: &JobId, lease_ms: u64) -> Result<LeaseState, BrokerError> {
        let now = self.clock.epoch_ms();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(job) = inner.jobs.get(id.as_str()) else {
            return Ok(LeaseState { alive: false, cancel_requested: true });
        };
        let cancel_requested = job.cancel_requested;
        let sim = inner.queues.entry(job.queue).or_default();
        match sim.active.get_mut(id.as_str()) {
            Some(deadline) => {
                *deadline = now + lease_ms;
                Ok(LeaseState { alive: true, cancel_requested })
            }
            None => Ok(LeaseState { alive: false, cancel_requested }),
        }
    }

    async fn complete(
        &self,
        id: &JobId,
        return_value: serde_json::Value,
    ) -> Result<bool, BrokerError> {
        let now = self.clock.epoch_ms();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(job) = inner.jobs.get(id.as_str()) else {
            return Ok(false);
        };
        let queue = job.queue;
        let keep = queue.settings().remove_on_complete;
        let sim = inner.queues.entry(queue).or_default();
        if sim.active.remove(id.as_str()).is_none() {
            return Ok(false);
        }
        sim.completed.push(id.to_string());
        let evicted: Vec<String> = if sim.completed.len() > keep {
            let over = sim.completed.len() - keep;
            sim.completed.drain(..over).collect()
        } else {
            Vec::new()
        };
        if let Some(job) = inner.jobs.get_mut(id.as_str()) {
            job.state = JobState::Completed;
            job.return_value = Some(return_value);
            job.finished_at_ms = Some(now);
        }
        for evicted_id in evicted {
            inner.jobs.remove(&evicted_id);
            inner.seqs.remove(&evicted_id);
        }
        Ok(true)
    }

    async fn fail(
        &self,
        id: &JobId,
        reason: &str,
        retry_delay_ms: Option<u64>,
    ) -> Result<FailOutcome, BrokerError> {
        let now = self.clock.epoch_ms();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(job) = inner.jobs.get(id.as_str()) else {
            return Ok(FailOutcome::Noop);
        };
        let queue = job.queue;
        let attempts = job.attempts_made;
        let retryable =
            retry_delay_ms.is_some() && !job.cancel_requested && attempts < job.max_attempts;
        let keep = queue.settings().remove_on_fail;
        let sim = inner.queues.entry(queue).or_default();
        if sim.active.remove(id.as_str()).is_none() {
            return Ok(FailOutcome::Noop);
        }

        if retryable {
            let delay = retry_delay_ms.unwrap_or(0);
            sim.delayed.push((now + delay, id.to_string()));
            if let Some(job) = inner.jobs.get_mut(id.as_str()) {
                job.state = JobState::Delayed;
                job.failed_reason = Some(reason.to_string());
            }
            return Ok(FailOutcome::Retried { attempts_made: attempts });
        }

        sim.failed.push(id.to_string());
        let evicted: Vec<String> = if sim.failed.len() > keep {
            let over = sim.failed.len() - keep;
            sim.failed.drain(..over).collect()
        } else {
            Vec::new()
        };
        if let Some(job) = inner.jobs.get_mut(id.as_str()) {
            job.state = JobState::Failed;
            job.failed_reason = Some(reason.to_string());
            job.finished_at_ms = Some(now);
        }
        for evicted_id in evicted {
            inner.jobs.remove(&evicted_id);
            inner.seqs.remove(&evicted_id);
        }
        Ok(FailOutcome::Failed { attempts_made: attempts })
    }

    async fn update_progress(
        &self,
        id: &JobId,
        progress: &ProgressValue,
    ) -> Result<bool, BrokerError> {
        let mut guard = self.inner.lock();
        match guard.jobs.get_mut(id.as_str()) {
            Some(job) => {
                job.progress = Some(progress.clone());
                Ok(job.cancel_requested)
            }
            None => Ok(true),
        }
    }

    async fn requeue_stalled(
        &self,
        queue: QueueName,
        max_stalled: u32,
    ) -> Result<StalledSweep, BrokerError> {
        let now = self.clock.epoch_ms();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let sim = inner.queues.entry(queue).or_default();
        let expired: Vec<String> = sim
            .active
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        let mut sweep = StalledSweep::default();
        for id in expired {
            sim.active.remove(&id);
            let Some(job) = inner.jobs.get_mut(&id) else { continue };
            job.stalled_count += 1;
            if job.stalled_count > max_stalled {
                job.state = JobState::Failed;
                job.failed_reason = Some("job stalled more than allowable limit".to_string());
                job.finished_at_ms = Some(now);
                sim.failed.push(id.clone());
                sweep.failed.push(JobId::new(id));
            } else {
                job.state = JobState::Waiting;
                job.attempts_made = job.attempts_made.saturating_sub(1);
                let seq = inner.seqs.get(&id).copied().unwrap_or(0);
                sim.waiting.push((score(job.priority, seq), id.clone()));
                sim.waiting.sort();
                sweep.requeued.push(JobId::new(id));
            }
        }
        Ok(sweep)
    }
}

#[async_trait]
impl<C: Clock> LockAdapter for MemoryBroker<C> {
    async fn acquire(&self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool, BrokerError> {
        let now = self.clock.epoch_ms();
        let mut guard = self.inner.lock();
        let alive = guard.locks.get(key).map(|e| e.expires_at_ms > now).unwrap_or(false);
        if alive {
            return Ok(false);
        }
        guard
            .locks
            .insert(key.to_string(), LockEntry { owner: owner.to_string(), expires_at_ms: now + ttl_ms });
        Ok(true)
    }

    async fn release(&self, key: &str, owner: &str) -> Result<bool, BrokerError> {
        let now = self.clock.epoch_ms();
        let mut guard = self.inner.lock();
        let held = guard
            .locks
            .get(key)
            .map(|e| e.owner == owner && e.expires_at_ms > now)
            .unwrap_or(false);
        if held {
            guard.locks.remove(key);
        }
        Ok(held)
    }

    async fn extend(&self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool, BrokerError> {
        let now = self.clock.epoch_ms();
        let mut guard = self.inner.lock();
        match guard.locks.get_mut(key) {
            Some(entry) if entry.owner == owner && entry.expires_at_ms > now => {
                entry.expires_at_ms = now + ttl_ms;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn check(&self, key: &str, owner: Option<&str>) -> Result<bool, BrokerError> {
        let now = self.clock.epoch_ms();
        let guard = self.inner.lock();
        Ok(guard
            .locks
            .get(key)
            .filter(|e| e.expires_at_ms > now)
            .map(|e| owner.map(|o| e.owner == o).unwrap_or(true))
            .unwrap_or(false))
    }

    async fn owner(&self, key: &str) -> Result<Option<String>, BrokerError> {
        let now = self.clock.epoch_ms();
        let guard = self.inner.lock();
        Ok(guard
            .locks
            .get(key)
            .filter(|e| e.expires_at_ms > now)
            .map(|e| e.owner.clone()))
    }

    async fn ttl_ms(&self, key: &str) -> Result<Option<u64>, BrokerError> {
        let now = self.clock.epoch_ms();
        let guard = self.inner.lock();
        Ok(guard
            .locks
            .get(key)
            .filter(|e| e.expires_at_ms > now)
            .map(|e| e.expires_at_ms - now))
    }

    async fn force_release(&self, key: &str) -> Result<bool, BrokerError> {
        Ok(self.inner.lock().locks.remove(key).is_some())
    }

    async fn scan_locks(&self, pattern: &str) -> Result<Vec<(String, String)>, BrokerError> {
        let now = self.clock.epoch_ms();
        let prefix = pattern.trim_end_matches('*');
        let guard = self.inner.lock();
        Ok(guard
            .locks
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.expires_at_ms > now)
            .map(|(key, entry)| (key.clone(), entry.owner.clone()))
            .collect())
    }
}

#[async_trait]
impl<C: Clock> ProfilesCache for MemoryBroker<C> {
    async fn get_token(
        &self,
        mint: &str,
        top_n: u32,
    ) -> Result<Option<HolderProfilesResult>, BrokerError> {
        Ok(self
            .raw_cache_get(&crate::cache::token_key(mint, top_n))
            .and_then(|json| serde_json::from_str(&json).ok()))
    }

    async fn get_wallet(
        &self,
        addr: &str,
    ) -> Result<Option<HolderProfilesResult>, BrokerError> {
        Ok(self
            .raw_cache_get(&crate::cache::wallet_key(addr))
            .and_then(|json| serde_json::from_str(&json).ok()))
    }

    async fn cache_token(
        &self,
        mint: &str,
        top_n: u32,
        result: &HolderProfilesResult,
    ) -> Result<(), BrokerError> {
        if let Ok(json) = serde_json::to_string(result) {
            self.insert_raw_cache(
                &crate::cache::token_key(mint, top_n),
                &json,
                crate::cache::CACHE_TTL_SECS * 1000,
            );
        }
        Ok(())
    }

    async fn cache_wallet(
        &self,
        addr: &str,
        result: &HolderProfilesResult,
    ) -> Result<(), BrokerError> {
        if let Ok(json) = serde_json::to_string(result) {
            self.insert_raw_cache(
                &crate::cache::wallet_key(addr),
                &json,
                crate::cache::CACHE_TTL_SECS * 1000,
            );
        }
        Ok(())
    }

    async fn invalidate_for_wallet(&self, addr: &str) -> Result<u64, BrokerError> {
        let mut guard = self.inner.lock();
        let mut removed = 0;
        let candidates: Vec<String> = guard
            .cache
            .keys()
            .filter(|k| k.starts_with("holder-profiles:token:"))
            .cloned()
            .collect();
        for key in candidates {
            let doomed = match guard.cache.get(&key) {
                Some(entry) => match serde_json::from_str::<HolderProfilesResult>(&entry.json) {
                    Ok(result) => result.profiles.iter().any(|p| p.wallet_address == addr),
                    // Corrupted payloads are deleted outright.
                    Err(_) => true,
                },
                None => false,
            };
            if doomed {
                guard.cache.remove(&key);
                removed += 1;
            }
        }
        if guard.cache.remove(&crate::cache::wallet_key(addr)).is_some() {
            removed += 1;
        }
        Ok(removed)
    }

    async fn invalidate_for_token(&self, mint: &str) -> Result<u64, BrokerError> {
        let prefix = format!("holder-profiles:token:{mint}:");
        let mut guard = self.inner.lock();
        let before = guard.cache.len();
        guard.cache.retain(|k, _| !k.starts_with(&prefix));
        Ok((before - guard.cache.len()) as u64)
    }
}

#[async_trait]
impl<C: Clock> RunStore for MemoryBroker<C> {
    async fn latest_completed(
        &self,
        wallet: &str,
        scope: AnalysisScope,
    ) -> Result<Option<AnalysisRun>, BrokerError> {
        let guard = self.inner.lock();
        Ok(guard
            .runs
            .get(&runs_field(wallet, scope))
            .filter(|run| run.status == RunStatus::Completed)
            .cloned())
    }

    async fn record_run(&self, run: &AnalysisRun) -> Result<(), BrokerError> {
        let mut guard = self.inner.lock();
        guard.runs.insert(runs_field(&run.wallet_address, run.scope), run.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
