// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed queue manager.
//!
//! Job bodies live in `job:<id>` hashes; each queue keeps one sorted set
//! per state. All state transitions run as Lua scripts (see
//! [`crate::scripts`]) so they are atomic at the broker.

use crate::adapter::{
    BrokerError, EnqueueOutcome, EnqueueSpec, FailOutcome, LeaseState, QueueAdapter, QueueCounts,
    RemoveOutcome, StalledSweep,
};
use crate::scripts;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use std::sync::Arc;
use wq_core::{JobId, JobRecord, JobState, ProgressValue, QueueName};

const JOB_PREFIX: &str = "job:";

fn job_key(id: &JobId) -> String {
    format!("{JOB_PREFIX}{id}")
}

fn queue_key(queue: QueueName, part: &str) -> String {
    format!("queue:{queue}:{part}")
}

struct QueueScripts {
    add: Script,
    reserve: Script,
    heartbeat: Script,
    complete: Script,
    fail: Script,
    progress: Script,
    stalled: Script,
    remove: Script,
    clean: Script,
}

impl QueueScripts {
    fn new() -> Self {
        Self {
            add: Script::new(scripts::ADD),
            reserve: Script::new(scripts::RESERVE),
            heartbeat: Script::new(scripts::HEARTBEAT),
            complete: Script::new(scripts::COMPLETE),
            fail: Script::new(scripts::FAIL),
            progress: Script::new(scripts::PROGRESS),
            stalled: Script::new(scripts::STALLED),
            remove: Script::new(scripts::REMOVE),
            clean: Script::new(scripts::CLEAN),
        }
    }
}

/// The production [`QueueAdapter`].
#[derive(Clone)]
pub struct RedisQueues {
    conn: ConnectionManager,
    scripts: Arc<QueueScripts>,
}

impl RedisQueues {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, scripts: Arc::new(QueueScripts::new()) }
    }

    async fn fetch_record(&self, id: &JobId) -> Result<Option<JobRecord>, BrokerError> {
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(job_key(id)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        parse_record(&map).map(Some)
    }

    fn now_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[async_trait]
impl QueueAdapter for RedisQueues {
    async fn add(&self, spec: EnqueueSpec) -> Result<EnqueueOutcome, BrokerError> {
        let queue = spec.kind.queue();
        let mut conn = self.conn.clone();
        let status: String = self
            .scripts
            .add
            .key(job_key(&spec.id))
            .key(queue_key(queue, "waiting"))
            .key(queue_key(queue, "delayed"))
            .key(queue_key(queue, "seq"))
            .arg(spec.id.as_str())
            .arg(spec.kind.as_str())
            .arg(queue.as_str())
            .arg(spec.payload.to_string())
            .arg(spec.priority)
            .arg(spec.max_attempts)
            .arg(Self::now_ms())
            .arg(spec.delay_ms)
            .invoke_async(&mut conn)
            .await?;

        let job = self.fetch_record(&spec.id).await?.ok_or_else(|| BrokerError::Corrupt {
            id: spec.id.to_string(),
            reason: "job vanished immediately after add".to_string(),
        })?;

        match status.as_str() {
            "enqueued" => Ok(EnqueueOutcome::Enqueued(job)),
            "existing" => Ok(EnqueueOutcome::AlreadyQueued(job)),
            "terminal" => Ok(EnqueueOutcome::TerminalExists(job)),
            other => Err(BrokerError::Corrupt {
                id: spec.id.to_string(),
                reason: format!("unexpected add status {other}"),
            }),
        }
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<JobRecord>, BrokerError> {
        self.fetch_record(id).await
    }

    async fn jobs_in_state(
        &self,
        queue: QueueName,
        state: JobState,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<JobRecord>, BrokerError> {
        let (part, newest_first) = match state {
            JobState::Waiting => ("waiting", false),
            JobState::Delayed => ("delayed", false),
            JobState::Active => ("active", false),
            JobState::Completed => ("completed", true),
            JobState::Failed => ("failed", true),
            JobState::Paused => {
                return Err(BrokerError::Unsupported { op: "jobs_in_state", state })
            }
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let stop = offset + limit - 1;
        let mut cmd = redis::cmd("ZRANGE");
        cmd.arg(queue_key(queue, part)).arg(offset).arg(stop);
        if newest_first {
            cmd.arg("REV");
        }
        let ids: Vec<String> = cmd.query_async(&mut conn).await?;

        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            // A job may finish (and be evicted) between the range read and
            // the fetch; skip those.
            if let Some(job) = self.fetch_record(&JobId::new(id)).await? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    async fn counts(&self, queue: QueueName) -> Result<QueueCounts, BrokerError> {
        let mut conn = self.conn.clone();
        let waiting: u64 = conn.zcard(queue_key(queue, "waiting")).await?;
        let active: u64 = conn.zcard(queue_key(queue, "active")).await?;
        let completed: u64 = conn.zcard(queue_key(queue, "completed")).await?;
        let failed: u64 = conn.zcard(queue_key(queue, "failed")).await?;
        let delayed: u64 = conn.zcard(queue_key(queue, "delayed")).await?;
        let paused: bool = conn.exists(queue_key(queue, "paused")).await?;
        Ok(QueueCounts { waiting, active, completed, failed, delayed, paused })
    }

    async fn is_paused(&self, queue: QueueName) -> Result<bool, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(queue_key(queue, "paused")).await?)
    }

    async fn set_paused(&self, queue: QueueName, paused: bool) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        if paused {
            conn.set::<_, _, ()>(queue_key(queue, "paused"), 1).await?;
        } else {
            conn.del::<_, ()>(queue_key(queue, "paused")).await?;
        }
        Ok(())
    }

    async fn clean(
        &self,
        queue: QueueName,
        grace_ms: u64,
        keep: usize,
        state: JobState,
    ) -> Result<u64, BrokerError> {
        let part = match state {
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            other => return Err(BrokerError::Unsupported { op: "clean", state: other }),
        };
        let cutoff = Self::now_ms().saturating_sub(grace_ms);
        let mut conn = self.conn.clone();
        let removed: u64 = self
            .scripts
            .clean
            .key(queue_key(queue, part))
            .arg(cutoff)
            .arg(keep)
            .arg(JOB_PREFIX)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn remove(&self, id: &JobId) -> Result<RemoveOutcome, BrokerError> {
        let Some(job) = self.fetch_record(id).await? else {
            return Ok(RemoveOutcome::NotFound);
        };
        let queue = job.queue;
        let mut conn = self.conn.clone();
        let status: String = self
            .scripts
            .remove
            .key(queue_key(queue, "waiting"))
            .key(queue_key(queue, "delayed"))
            .key(queue_key(queue, "active"))
            .key(queue_key(queue, "completed"))
            .key(queue_key(queue, "failed"))
            .key(job_key(id))
            .arg(id.as_str())
            .invoke_async(&mut conn)
            .await?;
        match status.as_str() {
            "removed" => Ok(RemoveOutcome::Removed),
            "abort-requested" => Ok(RemoveOutcome::AbortRequested),
            _ => Ok(RemoveOutcome::NotFound),
        }
    }

    async fn reserve(
        &self,
        queue: QueueName,
        lease_ms: u64,
    ) -> Result<Option<JobRecord>, BrokerError> {
        let mut conn = self.conn.clone();
        let fields: Option<Vec<String>> = self
            .scripts
            .reserve
            .key(queue_key(queue, "waiting"))
            .key(queue_key(queue, "delayed"))
            .key(queue_key(queue, "active"))
            .key(queue_key(queue, "paused"))
            .arg(Self::now_ms())
            .arg(lease_ms)
            .arg(JOB_PREFIX)
            .invoke_async(&mut conn)
            .await?;

        match fields {
            None => Ok(None),
            Some(flat) => {
                let map = pairs_to_map(flat);
                parse_record(&map).map(Some)
            }
        }
    }

    async fn heartbeat(&self, id: &JobId, lease_ms: u64) -> Result<LeaseState, BrokerError> {
        let job = self.fetch_record(id).await?;
        let Some(job) = job else {
            return Ok(LeaseState { alive: false, cancel_requested: true });
        };
        let mut conn = self.conn.clone();
        let reply: Vec<String> = self
            .scripts
            .heartbeat
            .key(queue_key(job.queue, "active"))
            .key(job_key(id))
            .arg(id.as_str())
            .arg(Self::now_ms())
            .arg(lease_ms)
            .invoke_async(&mut conn)
            .await?;
        let alive = reply.first().map(|s| s == "1").unwrap_or(false);
        let cancel_requested = reply.get(1).map(|s| s == "1").unwrap_or(false);
        Ok(LeaseState { alive, cancel_requested })
    }

    async fn complete(
        &self,
        id: &JobId,
        return_value: serde_json::Value,
    ) -> Result<bool, BrokerError> {
        let Some(job) = self.fetch_record(id).await? else {
            return Ok(false);
        };
        let keep = job.queue.settings().remove_on_complete;
        let mut conn = self.conn.clone();
        let transitioned: u8 = self
            .scripts
            .complete
            .key(queue_key(job.queue, "active"))
            .key(queue_key(job.queue, "completed"))
            .key(job_key(id))
            .arg(id.as_str())
            .arg(return_value.to_string())
            .arg(Self::now_ms())
            .arg(keep)
            .arg(JOB_PREFIX)
            .invoke_async(&mut conn)
            .await?;
        Ok(transitioned == 1)
    }

    async fn fail(
        &self,
        id: &JobId,
        reason: &str,
        retry_delay_ms: Option<u64>,
    ) -> Result<FailOutcome, BrokerError> {
        let Some(job) = self.fetch_record(id).await? else {
            return Ok(FailOutcome::Noop);
        };
        let keep = job.queue.settings().remove_on_fail;
        let delay_arg: i64 = match retry_delay_ms {
            Some(d) => d as i64,
            None => -1,
        };
        let mut conn = self.conn.clone();
        let reply: Vec<String> = self
            .scripts
            .fail
            .key(queue_key(job.queue, "active"))
            .key(queue_key(job.queue, "delayed"))
            .key(queue_key(job.queue, "failed"))
            .key(job_key(id))
            .arg(id.as_str())
            .arg(reason)
            .arg(Self::now_ms())
            .arg(delay_arg)
            .arg(keep)
            .arg(JOB_PREFIX)
            .invoke_async(&mut conn)
            .await?;
        let attempts_made = reply.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
        match reply.first().map(String::as_str) {
            Some("retried") => Ok(FailOutcome::Retried { attempts_made }),
            Some("failed") => Ok(FailOutcome::Failed { attempts_made }),
            _ => Ok(FailOutcome::Noop),
        }
    }

    async fn update_progress(
        &self,
        id: &JobId,
        progress: &ProgressValue,
    ) -> Result<bool, BrokerError> {
        let json = serde_json::to_string(progress).map_err(|e| BrokerError::Corrupt {
            id: id.to_string(),
            reason: format!("unserializable progress: {e}"),
        })?;
        let mut conn = self.conn.clone();
        let reply: String = self
            .scripts
            .progress
            .key(job_key(id))
            .arg(json)
            .invoke_async(&mut conn)
            .await?;
        Ok(reply == "1" || reply == "gone")
    }

    async fn requeue_stalled(
        &self,
        queue: QueueName,
        max_stalled: u32,
    ) -> Result<StalledSweep, BrokerError> {
        let keep = queue.settings().remove_on_fail;
        let mut conn = self.conn.clone();
        let (requeued, failed): (Vec<String>, Vec<String>) = self
            .scripts
            .stalled
            .key(queue_key(queue, "active"))
            .key(queue_key(queue, "waiting"))
            .key(queue_key(queue, "failed"))
            .arg(Self::now_ms())
            .arg(max_stalled)
            .arg(JOB_PREFIX)
            .arg(keep)
            .invoke_async(&mut conn)
            .await?;
        Ok(StalledSweep {
            requeued: requeued.into_iter().map(JobId::new).collect(),
            failed: failed.into_iter().map(JobId::new).collect(),
        })
    }
}

fn pairs_to_map(flat: Vec<String>) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        map.insert(field, value);
    }
    map
}

fn field<'a>(
    map: &'a HashMap<String, String>,
    name: &str,
    id: &str,
) -> Result<&'a str, BrokerError> {
    map.get(name).map(String::as_str).ok_or_else(|| BrokerError::Corrupt {
        id: id.to_string(),
        reason: format!("missing field {name}"),
    })
}

fn parse_num<T: std::str::FromStr>(s: &str, name: &str, id: &str) -> Result<T, BrokerError> {
    s.parse().map_err(|_| BrokerError::Corrupt {
        id: id.to_string(),
        reason: format!("non-numeric field {name}: {s}"),
    })
}

/// Decode a job hash into a [`JobRecord`].
pub(crate) fn parse_record(map: &HashMap<String, String>) -> Result<JobRecord, BrokerError> {
    let id = field(map, "id", "<unknown>")?.to_string();

    let kind = field(map, "kind", &id)?
        .parse()
        .map_err(|e: wq_core::UnknownName| BrokerError::Corrupt { id: id.clone(), reason: e.to_string() })?;
    let queue = field(map, "queue", &id)?
        .parse()
        .map_err(|e: wq_core::UnknownName| BrokerError::Corrupt { id: id.clone(), reason: e.to_string() })?;
    let state = field(map, "state", &id)?
        .parse()
        .map_err(|e: wq_core::UnknownName| BrokerError::Corrupt { id: id.clone(), reason: e.to_string() })?;

    let payload = serde_json::from_str(field(map, "payload", &id)?).map_err(|e| {
        BrokerError::Corrupt { id: id.clone(), reason: format!("bad payload json: {e}") }
    })?;

    let progress = match map.get("progress") {
        Some(raw) => Some(serde_json::from_str(raw).map_err(|e| BrokerError::Corrupt {
            id: id.clone(),
            reason: format!("bad progress json: {e}"),
        })?),
        None => None,
    };
    let return_value = match map.get("returnValue") {
        Some(raw) => Some(serde_json::from_str(raw).map_err(|e| BrokerError::Corrupt {
            id: id.clone(),
            reason: format!("bad return value json: {e}"),
        })?),
        None => None,
    };

    Ok(JobRecord {
        priority: parse_num(field(map, "priority", &id)?, "priority", &id)?,
        attempts_made: parse_num(field(map, "attemptsMade", &id)?, "attemptsMade", &id)?,
        max_attempts: parse_num(field(map, "maxAttempts", &id)?, "maxAttempts", &id)?,
        created_at_ms: parse_num(field(map, "createdAtMs", &id)?, "createdAtMs", &id)?,
        delay_ms: parse_num(field(map, "delayMs", &id)?, "delayMs", &id)?,
        stalled_count: parse_num(field(map, "stalledCount", &id)?, "stalledCount", &id)?,
        processed_at_ms: match map.get("processedAtMs") {
            Some(s) => Some(parse_num(s, "processedAtMs", &id)?),
            None => None,
        },
        finished_at_ms: match map.get("finishedAtMs") {
            Some(s) => Some(parse_num(s, "finishedAtMs", &id)?),
            None => None,
        },
        failed_reason: map.get("failedReason").cloned(),
        cancel_requested: map.get("cancelRequested").map(|s| s == "1").unwrap_or(false),
        id: JobId::new(id),
        kind,
        queue,
        state,
        payload,
        progress,
        return_value,
    })
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
