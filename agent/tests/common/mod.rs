//! Shared helpers for the agent integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use fieldsync_agent::{GatewayError, LocalStore, RemoteGateway};
use fieldsync_engine::{EntityClass, RemoteId};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;

/// One request seen by the gateway.
#[derive(Debug, Clone)]
pub struct Call {
    pub class: EntityClass,
    pub kind: CallKind,
    pub payload: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Upsert,
    Insert,
}

/// Scripted answer for the next request of a class.
#[derive(Debug, Clone)]
pub enum Script {
    Ids(Vec<&'static str>),
    Fail(GatewayError),
}

/// Pauses the next request until released.
#[derive(Default)]
pub struct Hold {
    pub entered: Notify,
    pub release: Notify,
}

/// In-memory remote store.
///
/// Unscripted requests succeed: objects carrying an `id` get it back, the
/// others get a fresh `r{n}` identifier.
#[derive(Default)]
pub struct ScriptedGateway {
    calls: Mutex<Vec<Call>>,
    scripts: Mutex<HashMap<EntityClass, VecDeque<Script>>>,
    outages: Mutex<HashMap<EntityClass, GatewayError>>,
    next_id: AtomicUsize,
    hold: Mutex<Option<Arc<Hold>>>,
    panic_on: Mutex<Option<EntityClass>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, class: EntityClass, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .entry(class)
            .or_default()
            .push_back(script);
    }

    /// Every request of `class` fails with `error` until [`Self::recover`].
    pub fn fail_always(&self, class: EntityClass, error: GatewayError) {
        self.outages.lock().unwrap().insert(class, error);
    }

    pub fn recover(&self, class: EntityClass) {
        self.outages.lock().unwrap().remove(&class);
    }

    pub fn hold(&self) -> Arc<Hold> {
        let hold = Arc::new(Hold::default());
        *self.hold.lock().unwrap() = Some(hold.clone());
        hold
    }

    /// Panic inside requests of `class`; `None` stops panicking.
    pub fn panic_on(&self, class: Option<EntityClass>) {
        *self.panic_on.lock().unwrap() = class;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, class: EntityClass) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.class == class)
            .collect()
    }

    async fn answer(
        &self,
        class: EntityClass,
        kind: CallKind,
        payload: Vec<Value>,
    ) -> Result<Vec<RemoteId>, GatewayError> {
        self.calls.lock().unwrap().push(Call {
            class,
            kind,
            payload: payload.clone(),
        });

        if *self.panic_on.lock().unwrap() == Some(class) {
            panic!("gateway blew up on {class}");
        }

        let hold = self.hold.lock().unwrap().take();
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }

        let outage = self.outages.lock().unwrap().get(&class).cloned();
        if let Some(error) = outage {
            return Err(error);
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&class)
            .and_then(|queue| queue.pop_front());

        match script {
            Some(Script::Fail(error)) => Err(error),
            Some(Script::Ids(ids)) => Ok(ids.into_iter().map(String::from).collect()),
            None => Ok(payload
                .iter()
                .map(|object| match object.get("id").and_then(Value::as_str) {
                    Some(id) => id.to_string(),
                    None => format!("r{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
                })
                .collect()),
        }
    }
}

#[async_trait]
impl RemoteGateway for ScriptedGateway {
    async fn upsert(
        &self,
        class: EntityClass,
        payload: Vec<Value>,
    ) -> Result<Vec<RemoteId>, GatewayError> {
        self.answer(class, CallKind::Upsert, payload).await
    }

    async fn insert(&self, class: EntityClass, payload: Value) -> Result<RemoteId, GatewayError> {
        let mut ids = self.answer(class, CallKind::Insert, vec![payload]).await?;
        ids.pop()
            .ok_or_else(|| GatewayError::Malformed("no identifier".into()))
    }
}

pub fn transport_error() -> GatewayError {
    GatewayError::Transport("network unreachable".into())
}

pub fn rejection() -> GatewayError {
    GatewayError::Rejected {
        status: 400,
        message: "violates check constraint".into(),
    }
}

pub fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("fieldsync.db").display())
}

/// Open a fresh store in its own temporary directory.
pub async fn open_store() -> (TempDir, LocalStore) {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::open(&database_url(&dir)).await.unwrap();
    (dir, store)
}
