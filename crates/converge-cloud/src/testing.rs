//! In-memory backend for tests
//!
//! [`ScriptedBackend`] replays scripted accessor replies per object and records
//! every call made against it, so controller behaviour can be asserted without a
//! network.

use crate::error::{CloudError, Result};
use crate::kind::ResourceKind;
use crate::provider::{Accessor, Mutator};
use crate::status::StatusSnapshot;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One scripted accessor reply
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Status(String),
    StatusWithMessage(String, String),
    NotFound,
    Fail(String),
}

impl Reply {
    pub fn status(s: &str) -> Self {
        Reply::Status(s.to_string())
    }

    fn into_result(self, id: &str) -> Result<StatusSnapshot> {
        match self {
            Reply::Status(s) => Ok(StatusSnapshot::new(s.clone())
                .with_attributes(serde_json::json!({ "id": id, "status": s }))),
            Reply::StatusWithMessage(s, m) => Ok(StatusSnapshot::new(s.clone())
                .with_message(m)
                .with_attributes(serde_json::json!({ "id": id, "status": s }))),
            Reply::NotFound => Err(CloudError::ResourceNotFound(id.to_string())),
            Reply::Fail(m) => Err(CloudError::ApiError(m)),
        }
    }
}

/// Replies from a list of plain statuses
pub fn statuses(values: &[&str]) -> Vec<Reply> {
    values.iter().map(|s| Reply::status(s)).collect()
}

/// A call observed by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Resolve(ResourceKind),
    Create(ResourceKind, Value),
    Get(String),
    Update(String, Value),
    Delete(String),
}

/// Which mutating call to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Resolve,
    Create,
    Update,
    Delete,
}

#[derive(Default)]
struct Inner {
    replies: HashMap<String, VecDeque<Reply>>,
    after: HashMap<Op, Vec<Reply>>,
    failures: HashMap<Op, InjectedFailure>,
    calls: Vec<Call>,
    next_id: u32,
}

#[derive(Clone)]
enum InjectedFailure {
    Api(String),
    NotFound,
}

/// Scripted in-memory [`Accessor`] + [`Mutator`]
#[derive(Default)]
pub struct ScriptedBackend {
    inner: Mutex<Inner>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the replies for `id`; the last reply repeats forever
    pub fn script(&self, id: &str, replies: Vec<Reply>) {
        self.lock().replies.insert(id.to_string(), replies.into());
    }

    /// Replies installed for the affected id after a successful `op`
    pub fn after(self, op: Op, replies: Vec<Reply>) -> Self {
        self.lock().after.insert(op, replies);
        self
    }

    /// Make every `op` call fail with an API error
    pub fn failing(self, op: Op, message: &str) -> Self {
        self.lock()
            .failures
            .insert(op, InjectedFailure::Api(message.to_string()));
        self
    }

    /// Make every `op` call fail with a not-found error
    pub fn not_found_on(self, op: Op) -> Self {
        self.lock().failures.insert(op, InjectedFailure::NotFound);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls matching `pred`
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_failure(inner: &Inner, op: Op, subject: &str) -> Result<()> {
        match inner.failures.get(&op) {
            Some(InjectedFailure::Api(m)) => Err(CloudError::ApiError(m.clone())),
            Some(InjectedFailure::NotFound) => {
                Err(CloudError::ResourceNotFound(subject.to_string()))
            }
            None => Ok(()),
        }
    }

    fn install_after(inner: &mut Inner, op: Op, id: &str) {
        if let Some(replies) = inner.after.get(&op).cloned() {
            inner.replies.insert(id.to_string(), replies.into());
        }
    }
}

#[async_trait]
impl Accessor for ScriptedBackend {
    async fn get_by_id(&self, _kind: ResourceKind, id: &str) -> Result<StatusSnapshot> {
        let mut inner = self.lock();
        inner.calls.push(Call::Get(id.to_string()));
        let reply = match inner.replies.get_mut(id) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        reply.unwrap_or(Reply::NotFound).into_result(id)
    }
}

#[async_trait]
impl Mutator for ScriptedBackend {
    async fn resolve(&self, kind: ResourceKind, payload: Value) -> Result<Value> {
        let mut inner = self.lock();
        inner.calls.push(Call::Resolve(kind));
        Self::check_failure(&inner, Op::Resolve, kind.as_str())?;
        Ok(payload)
    }

    async fn create(&self, kind: ResourceKind, payload: &Value) -> Result<String> {
        let mut inner = self.lock();
        inner.calls.push(Call::Create(kind, payload.clone()));
        Self::check_failure(&inner, Op::Create, kind.as_str())?;
        inner.next_id += 1;
        let id = format!("{}-{}", kind, inner.next_id);
        Self::install_after(&mut inner, Op::Create, &id);
        Ok(id)
    }

    async fn update(&self, _kind: ResourceKind, id: &str, payload: &Value) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Update(id.to_string(), payload.clone()));
        Self::check_failure(&inner, Op::Update, id)?;
        Self::install_after(&mut inner, Op::Update, id);
        Ok(())
    }

    async fn delete(&self, _kind: ResourceKind, id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Delete(id.to_string()));
        Self::check_failure(&inner, Op::Delete, id)?;
        Self::install_after(&mut inner, Op::Delete, id);
        Ok(())
    }
}
