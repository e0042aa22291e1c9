use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{ErrorKind, RedisError, Value};

use super::backend::{Batch, BatchOp, KeyValueBackend, ScanPage};
use super::error::BackendError;

// ============================================================================
// Redis Backend
// ============================================================================
//
// Command mapping:
// - get            → GET
// - set_if_absent  → SET key value NX
// - set_if_present → SET key value XX
// - delete         → DEL
// - set_add/remove → SADD / SREM
// - set_scan       → SSCAN set cursor MATCH pattern COUNT n
// - multi_get      → MGET
// - transaction    → MULTI … EXEC (atomic pipeline), or one Lua script
//                    when the batch is guarded
//
// A multiplexed connection is cloned per call; nothing is locked between
// calls. Dropping the backend releases the connection.
//
// ============================================================================

// KEYS[i] is the key or set of operation i, ARGV[2i-1] its name and
// ARGV[2i] its value or member. Returns one 0/1 flag per operation.
const GUARDED_BATCH: &str = r#"
local applied = {}
for i = 1, #KEYS do
  local op, arg = ARGV[2 * i - 1], ARGV[2 * i]
  local done = 0
  if i == 1 or applied[1] == 1 then
    if op == 'set_nx' then
      done = redis.call('SET', KEYS[i], arg, 'NX') and 1 or 0
    elseif op == 'set_xx' then
      done = redis.call('SET', KEYS[i], arg, 'XX') and 1 or 0
    elseif op == 'del' then
      done = redis.call('DEL', KEYS[i])
    elseif op == 'sadd' then
      done = redis.call('SADD', KEYS[i], arg)
    elseif op == 'srem' then
      done = redis.call('SREM', KEYS[i], arg)
    end
  end
  applied[i] = done
end
return applied
"#;

#[derive(Clone)]
pub struct RedisBackend {
    connection: MultiplexedConnection,
    guarded_batch: redis::Script,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, BackendError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)?;

        tracing::info!(url = %redact_url(url), "Connected to Redis");
        Ok(Self::from_connection(connection))
    }

    pub fn from_connection(connection: MultiplexedConnection) -> Self {
        Self {
            connection,
            guarded_batch: redis::Script::new(GUARDED_BATCH),
        }
    }

    async fn run_guarded(&self, batch: &Batch) -> Result<Vec<bool>, BackendError> {
        let mut invocation = self.guarded_batch.prepare_invoke();
        for op in batch.ops() {
            let (target, name, arg) = script_args(op);
            invocation.key(target).arg(name).arg(arg);
        }

        let mut connection = self.connection.clone();
        let flags: Vec<i64> = invocation
            .invoke_async(&mut connection)
            .await
            .map_err(map_redis_error)?;

        if flags.len() != batch.len() {
            return Err(BackendError::Aborted(format!(
                "script returned {} flags for {} commands",
                flags.len(),
                batch.len()
            )));
        }
        Ok(flags.into_iter().map(|flag| flag > 0).collect())
    }

    async fn query<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T, BackendError> {
        let mut connection = self.connection.clone();
        cmd.query_async(&mut connection).await.map_err(map_redis_error)
    }
}

fn map_redis_error(err: RedisError) -> BackendError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
        BackendError::Connection(err.to_string())
    } else if err.kind() == ErrorKind::ExecAbortError {
        BackendError::Aborted(err.to_string())
    } else {
        BackendError::Command(err.to_string())
    }
}

/// Interpret one reply of a conditional write or counting command.
fn reply_applied(value: &Value) -> Result<bool, BackendError> {
    match value {
        Value::Nil => Ok(false),
        Value::Okay => Ok(true),
        Value::SimpleString(s) => Ok(s == "OK"),
        Value::Int(n) => Ok(*n > 0),
        Value::ServerError(err) => Err(BackendError::Command(format!("{err:?}"))),
        other => Err(BackendError::Command(format!("unexpected reply: {other:?}"))),
    }
}

fn redact_url(url: &str) -> String {
    match url.rsplit_once('@') {
        Some((_, host)) => format!("redis://***@{host}"),
        None => url.to_string(),
    }
}

fn script_args(op: &BatchOp) -> (&str, &str, &[u8]) {
    match op {
        BatchOp::SetIfAbsent { key, value } => (key.as_str(), "set_nx", value.as_slice()),
        BatchOp::SetIfPresent { key, value } => (key.as_str(), "set_xx", value.as_slice()),
        BatchOp::Delete { key } => (key.as_str(), "del", &[]),
        BatchOp::SetAdd { set, member } => (set.as_str(), "sadd", member.as_bytes()),
        BatchOp::SetRemove { set, member } => (set.as_str(), "srem", member.as_bytes()),
    }
}

fn queue(pipe: &mut redis::Pipeline, op: &BatchOp) {
    match op {
        BatchOp::SetIfAbsent { key, value } => {
            pipe.cmd("SET").arg(key).arg(value.as_slice()).arg("NX");
        }
        BatchOp::SetIfPresent { key, value } => {
            pipe.cmd("SET").arg(key).arg(value.as_slice()).arg("XX");
        }
        BatchOp::Delete { key } => {
            pipe.cmd("DEL").arg(key);
        }
        BatchOp::SetAdd { set, member } => {
            pipe.cmd("SADD").arg(set).arg(member);
        }
        BatchOp::SetRemove { set, member } => {
            pipe.cmd("SREM").arg(set).arg(member);
        }
    }
}

#[async_trait]
impl KeyValueBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool, BackendError> {
        let reply: Value = self.query(redis::cmd("SET").arg(key).arg(value).arg("NX")).await?;
        reply_applied(&reply)
    }

    async fn set_if_present(&self, key: &str, value: Vec<u8>) -> Result<bool, BackendError> {
        let reply: Value = self.query(redis::cmd("SET").arg(key).arg(value).arg("XX")).await?;
        reply_applied(&reply)
    }

    async fn delete(&self, key: &str) -> Result<bool, BackendError> {
        let removed: u64 = self.query(redis::cmd("DEL").arg(key)).await?;
        Ok(removed > 0)
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<bool, BackendError> {
        let added: u64 = self.query(redis::cmd("SADD").arg(set).arg(member)).await?;
        Ok(added > 0)
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<bool, BackendError> {
        let removed: u64 = self.query(redis::cmd("SREM").arg(set).arg(member)).await?;
        Ok(removed > 0)
    }

    async fn set_scan(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<ScanPage, BackendError> {
        let (cursor, members): (u64, Vec<String>) = self
            .query(
                redis::cmd("SSCAN")
                    .arg(set)
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(count),
            )
            .await?;

        Ok(ScanPage { members, cursor })
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, BackendError> {
        if keys.is_empty() {
            return Err(BackendError::Command("MGET requires at least one key".to_string()));
        }
        self.query(redis::cmd("MGET").arg(keys)).await
    }

    async fn transaction(&self, batch: Batch) -> Result<Vec<bool>, BackendError> {
        if batch.is_guarded() {
            return self.run_guarded(&batch).await;
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in batch.ops() {
            queue(&mut pipe, op);
        }

        let mut connection = self.connection.clone();
        let replies: Vec<Value> = pipe
            .query_async(&mut connection)
            .await
            .map_err(map_redis_error)?;

        if replies.len() != batch.len() {
            return Err(BackendError::Aborted(format!(
                "EXEC returned {} replies for {} commands",
                replies.len(),
                batch.len()
            )));
        }

        replies.iter().map(reply_applied).collect()
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let _: String = self.query(&redis::cmd("PING")).await?;
        Ok(())
    }
}
