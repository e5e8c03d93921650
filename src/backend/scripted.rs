//! Deterministic in-memory backend for tests.
//!
//! Sessions "translate" by uppercasing the prompt. Activation failures and
//! per-key error sequences can be scripted up front.

use super::{Connector, Session};
use crate::error::RemoteError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Scripted reply for one `generate` call.
pub enum Step {
    Fail(RemoteError),
    Reply(String),
}

#[derive(Default)]
struct Script {
    /// Keys whose activation always fails.
    broken: HashSet<String>,
    /// Keys whose activation fails this many more times.
    flaky: HashMap<String, usize>,
    /// Replies consumed before falling back to uppercasing.
    steps: HashMap<String, VecDeque<Step>>,
    connects: Vec<(String, String)>,
    calls: Vec<(String, String)>,
}

/// Test connector with shared, inspectable state.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every activation of `key` fails.
    pub fn break_key(&self, key: &str) -> &Self {
        self.script.lock().unwrap().broken.insert(key.to_string());
        self
    }

    /// The next `times` activations of `key` fail.
    pub fn fail_connects(&self, key: &str, times: usize) -> &Self {
        self.script
            .lock()
            .unwrap()
            .flaky
            .insert(key.to_string(), times);
        self
    }

    /// Queues a scripted reply for the next call made with `key`.
    pub fn push(&self, key: &str, step: Step) -> &Self {
        self.script
            .lock()
            .unwrap()
            .steps
            .entry(key.to_string())
            .or_default()
            .push_back(step);
        self
    }

    /// Number of activation attempts so far.
    pub fn connect_count(&self) -> usize {
        self.script.lock().unwrap().connects.len()
    }

    /// (key, model) of every activation attempt, in order.
    pub fn connects(&self) -> Vec<(String, String)> {
        self.script.lock().unwrap().connects.clone()
    }

    /// Number of generate calls so far.
    pub fn call_count(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    /// (key, prompt) of every generate call, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.script.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn connect(
        &self,
        credential: &str,
        model: &str,
    ) -> Result<Box<dyn Session>, RemoteError> {
        let mut script = self.script.lock().unwrap();
        script
            .connects
            .push((credential.to_string(), model.to_string()));

        if script.broken.contains(credential) {
            return Err(RemoteError::Other(format!("{} is revoked", credential)));
        }
        if let Some(remaining) = script.flaky.get_mut(credential) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::Transient(format!("{} unavailable", credential)));
            }
        }

        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
            credential: credential.to_string(),
        }))
    }
}

struct ScriptedSession {
    script: Arc<Mutex<Script>>,
    credential: String,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn generate(&self, prompt: &str) -> Result<String, RemoteError> {
        let mut script = self.script.lock().unwrap();
        script
            .calls
            .push((self.credential.clone(), prompt.to_string()));

        let step = script
            .steps
            .get_mut(&self.credential)
            .and_then(|queue| queue.pop_front());

        match step {
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Reply(text)) => Ok(text),
            None => Ok(prompt.to_uppercase()),
        }
    }
}
