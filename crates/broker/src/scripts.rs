// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lua scripts for atomic broker transitions.
//!
//! Every multi-step state change runs broker-side in one script so no
//! reader can observe a half-applied transition. Scores in the waiting
//! set encode (priority desc, FIFO): `(10 - priority) * 1e13 + seq`, and
//! the set pops lowest-score first.

/// Idempotent enqueue.
///
/// KEYS: 1 job hash, 2 waiting zset, 3 delayed zset, 4 seq counter.
/// ARGV: 1 id, 2 kind, 3 queue, 4 payload, 5 priority, 6 maxAttempts,
///       7 nowMs, 8 delayMs.
/// Returns 'enqueued', 'existing', or 'terminal'.
pub const ADD: &str = r#"
local state = redis.call('HGET', KEYS[1], 'state')
if state then
  if state == 'completed' or state == 'failed' then
    return 'terminal'
  end
  return 'existing'
end
local seq = redis.call('INCR', KEYS[4])
redis.call('HSET', KEYS[1],
  'id', ARGV[1], 'kind', ARGV[2], 'queue', ARGV[3], 'payload', ARGV[4],
  'priority', ARGV[5], 'maxAttempts', ARGV[6], 'createdAtMs', ARGV[7],
  'delayMs', ARGV[8], 'attemptsMade', '0', 'stalledCount', '0',
  'cancelRequested', '0', 'seq', seq)
if tonumber(ARGV[8]) > 0 then
  redis.call('HSET', KEYS[1], 'state', 'delayed')
  redis.call('ZADD', KEYS[3], tonumber(ARGV[7]) + tonumber(ARGV[8]), ARGV[1])
else
  redis.call('HSET', KEYS[1], 'state', 'waiting')
  redis.call('ZADD', KEYS[2], (10 - tonumber(ARGV[5])) * 1e13 + seq, ARGV[1])
end
return 'enqueued'
"#;

/// Atomic reservation: promote due delayed jobs, pop the best waiting
/// job, mark it active under a lease, and consume an attempt.
///
/// KEYS: 1 waiting zset, 2 delayed zset, 3 active zset, 4 paused flag.
/// ARGV: 1 nowMs, 2 leaseMs, 3 job key prefix.
/// Returns false, or the reserved job hash as a flat field list.
pub const RESERVE: &str = r#"
if redis.call('EXISTS', KEYS[4]) == 1 then
  return false
end
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, id in ipairs(due) do
  local jkey = ARGV[3] .. id
  local pr = tonumber(redis.call('HGET', jkey, 'priority') or '5')
  local seq = tonumber(redis.call('HGET', jkey, 'seq') or '0')
  redis.call('ZREM', KEYS[2], id)
  redis.call('HSET', jkey, 'state', 'waiting')
  redis.call('ZADD', KEYS[1], (10 - pr) * 1e13 + seq, id)
end
local popped = redis.call('ZPOPMIN', KEYS[1])
if #popped == 0 then
  return false
end
local id = popped[1]
local jkey = ARGV[3] .. id
redis.call('HSET', jkey, 'state', 'active', 'processedAtMs', ARGV[1])
redis.call('HINCRBY', jkey, 'attemptsMade', 1)
redis.call('ZADD', KEYS[3], tonumber(ARGV[1]) + tonumber(ARGV[2]), id)
return redis.call('HGETALL', jkey)
"#;

/// Lease refresh plus cancellation observation.
///
/// KEYS: 1 active zset, 2 job hash.
/// ARGV: 1 id, 2 nowMs, 3 leaseMs.
/// Returns {alive, cancelRequested} as '0'/'1' strings.
pub const HEARTBEAT: &str = r#"
if not redis.call('ZSCORE', KEYS[1], ARGV[1]) then
  return {'0', '0'}
end
redis.call('ZADD', KEYS[1], 'XX', tonumber(ARGV[2]) + tonumber(ARGV[3]), ARGV[1])
local cancel = redis.call('HGET', KEYS[2], 'cancelRequested') or '0'
return {'1', cancel}
"#;

/// Terminal success. Guards the exactly-once `completed` event: only the
/// call that removes the job from the active set performs the transition.
///
/// KEYS: 1 active zset, 2 completed zset, 3 job hash.
/// ARGV: 1 id, 2 returnValue, 3 nowMs, 4 keep, 5 job key prefix.
/// Returns 1 iff this call completed the job.
pub const COMPLETE: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 0 then
  return 0
end
redis.call('HSET', KEYS[3], 'state', 'completed',
  'returnValue', ARGV[2], 'finishedAtMs', ARGV[3])
redis.call('ZADD', KEYS[2], tonumber(ARGV[3]), ARGV[1])
local over = redis.call('ZCARD', KEYS[2]) - tonumber(ARGV[4])
if over > 0 then
  local evicted = redis.call('ZPOPMIN', KEYS[2], over)
  for i = 1, #evicted, 2 do
    redis.call('DEL', ARGV[5] .. evicted[i])
  end
end
return 1
"#;

/// Handler failure: schedule a retry or fail terminally.
///
/// KEYS: 1 active zset, 2 delayed zset, 3 failed zset, 4 job hash.
/// ARGV: 1 id, 2 reason, 3 nowMs, 4 retryDelayMs (-1 disallows retry),
///       5 keep, 6 job key prefix.
/// Returns {'retried'|'failed'|'noop', attemptsMade}.
pub const FAIL: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 0 then
  return {'noop', '0'}
end
local attempts = tonumber(redis.call('HGET', KEYS[4], 'attemptsMade') or '0')
local max = tonumber(redis.call('HGET', KEYS[4], 'maxAttempts') or '1')
local cancel = redis.call('HGET', KEYS[4], 'cancelRequested') or '0'
local delay = tonumber(ARGV[4])
if delay >= 0 and cancel ~= '1' and attempts < max then
  redis.call('HSET', KEYS[4], 'state', 'delayed', 'failedReason', ARGV[2])
  redis.call('ZADD', KEYS[2], tonumber(ARGV[3]) + delay, ARGV[1])
  return {'retried', tostring(attempts)}
end
redis.call('HSET', KEYS[4], 'state', 'failed',
  'failedReason', ARGV[2], 'finishedAtMs', ARGV[3])
redis.call('ZADD', KEYS[3], tonumber(ARGV[3]), ARGV[1])
local over = redis.call('ZCARD', KEYS[3]) - tonumber(ARGV[5])
if over > 0 then
  local evicted = redis.call('ZPOPMIN', KEYS[3], over)
  for i = 1, #evicted, 2 do
    redis.call('DEL', ARGV[6] .. evicted[i])
  end
end
return {'failed', tostring(attempts)}
"#;

/// Progress snapshot write. Doubles as a cancellation checkpoint.
///
/// KEYS: 1 job hash.
/// ARGV: 1 progress JSON.
/// Returns 'gone', or the cancelRequested flag.
pub const PROGRESS: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return 'gone'
end
redis.call('HSET', KEYS[1], 'progress', ARGV[1])
return redis.call('HGET', KEYS[1], 'cancelRequested') or '0'
"#;

/// Requeue jobs whose lease expired; fail jobs stalled past the limit.
/// Stall requeues hand back the consumed attempt so retries count only
/// handler errors.
///
/// KEYS: 1 active zset, 2 waiting zset, 3 failed zset.
/// ARGV: 1 nowMs, 2 maxStalled, 3 job key prefix, 4 keepFailed.
/// Returns {requeuedIds, failedIds}.
pub const STALLED: &str = r#"
local expired = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
local requeued = {}
local failed = {}
for _, id in ipairs(expired) do
  local jkey = ARGV[3] .. id
  redis.call('ZREM', KEYS[1], id)
  local stalls = tonumber(redis.call('HINCRBY', jkey, 'stalledCount', 1))
  if stalls > tonumber(ARGV[2]) then
    redis.call('HSET', jkey, 'state', 'failed',
      'failedReason', 'job stalled more than allowable limit',
      'finishedAtMs', ARGV[1])
    redis.call('ZADD', KEYS[3], tonumber(ARGV[1]), id)
    table.insert(failed, id)
  else
    local pr = tonumber(redis.call('HGET', jkey, 'priority') or '5')
    local seq = tonumber(redis.call('HGET', jkey, 'seq') or '0')
    redis.call('HSET', jkey, 'state', 'waiting')
    redis.call('HINCRBY', jkey, 'attemptsMade', -1)
    redis.call('ZADD', KEYS[2], (10 - pr) * 1e13 + seq, id)
    table.insert(requeued, id)
  end
end
local over = redis.call('ZCARD', KEYS[3]) - tonumber(ARGV[4])
if over > 0 then
  local evicted = redis.call('ZPOPMIN', KEYS[3], over)
  for i = 1, #evicted, 2 do
    redis.call('DEL', ARGV[3] .. evicted[i])
  end
end
return {requeued, failed}
"#;

/// Cancellation: waiting/delayed/terminal jobs are removed outright,
/// active jobs get an abort request.
///
/// KEYS: 1 waiting, 2 delayed, 3 active, 4 completed, 5 failed, 6 job hash.
/// ARGV: 1 id.
/// Returns 'removed', 'abort-requested', or 'not-found'.
pub const REMOVE: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 1 or redis.call('ZREM', KEYS[2], ARGV[1]) == 1 then
  redis.call('DEL', KEYS[6])
  return 'removed'
end
if redis.call('ZSCORE', KEYS[3], ARGV[1]) then
  redis.call('HSET', KEYS[6], 'cancelRequested', '1')
  return 'abort-requested'
end
if redis.call('EXISTS', KEYS[6]) == 1 then
  redis.call('ZREM', KEYS[4], ARGV[1])
  redis.call('ZREM', KEYS[5], ARGV[1])
  redis.call('DEL', KEYS[6])
  return 'removed'
end
return 'not-found'
"#;

/// Retention clean: drop jobs older than the cutoff, keeping the newest
/// `keep`.
///
/// KEYS: 1 state zset.
/// ARGV: 1 cutoffMs, 2 keep, 3 job key prefix.
/// Returns the number removed.
pub const CLEAN: &str = r#"
local total = redis.call('ZCARD', KEYS[1])
local removable = total - tonumber(ARGV[2])
if removable <= 0 then
  return 0
end
local old = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
local n = 0
for _, id in ipairs(old) do
  if n >= removable then
    break
  end
  redis.call('ZREM', KEYS[1], id)
  redis.call('DEL', ARGV[3] .. id)
  n = n + 1
end
return n
"#;

/// Owner-checked lock release (CAS).
///
/// KEYS: 1 lock. ARGV: 1 owner. Returns 1 iff released.
pub const LOCK_RELEASE: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Owner-checked TTL extension (CAS).
///
/// KEYS: 1 lock. ARGV: 1 owner, 2 ttlMs. Returns 1 iff extended.
pub const LOCK_EXTEND: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
"#;

/// Membership-checked cache invalidation across a candidate key set.
///
/// Runs as one script so a reader can never race between the membership
/// decode and the delete. Corrupted payloads are deleted outright.
///
/// KEYS: candidate token-scope keys. ARGV: 1 wallet address.
/// Returns the number of keys removed.
pub const CACHE_INVALIDATE_WALLET: &str = r#"
local removed = 0
for i = 1, #KEYS do
  local raw = redis.call('GET', KEYS[i])
  if raw then
    local ok, decoded = pcall(cjson.decode, raw)
    if not ok or type(decoded) ~= 'table' or type(decoded.profiles) ~= 'table' then
      redis.call('DEL', KEYS[i])
      removed = removed + 1
    else
      for _, profile in ipairs(decoded.profiles) do
        if profile.walletAddress == ARGV[1] then
          redis.call('DEL', KEYS[i])
          removed = removed + 1
          break
        end
      end
    end
  end
end
return removed
"#;

#[cfg(test)]
#[path = "scripts_tests.rs"]
mod tests;
