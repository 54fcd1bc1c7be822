//! Scripted doubles for the channel and sink seams.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use harcap_core::TargetId;

use crate::artifacts::ArtifactSink;
use crate::channel::{AttachError, DebuggerChannel};
use crate::events::ChannelEvent;

/// Scripted response for one command method.
struct Scripted {
    value: Value,
    /// Remaining uses; `None` means unlimited.
    remaining: Option<usize>,
}

/// In-process channel double: attachment set, scripted command results, and
/// a broadcast the test emits events through.
pub struct ScriptedChannel {
    attached: Mutex<HashSet<TargetId>>,
    fail_attach: Mutex<HashSet<TargetId>>,
    responses: Mutex<HashMap<String, Scripted>>,
    detach_on: Mutex<HashSet<String>>,
    sent: Mutex<Vec<(TargetId, String, Value)>>,
    events: broadcast::Sender<ChannelEvent>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            attached: Mutex::new(HashSet::new()),
            fail_attach: Mutex::new(HashSet::new()),
            responses: Mutex::new(HashMap::new()),
            detach_on: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Make `attach` fail for a target with the given message.
    pub fn fail_attach(&self, target: &TargetId) {
        let _ = self.fail_attach.lock().insert(target.clone());
    }

    /// Script an unlimited result for a command method.
    pub fn respond(&self, method: &str, value: Value) {
        let _ = self.responses.lock().insert(
            method.to_owned(),
            Scripted {
                value,
                remaining: None,
            },
        );
    }

    /// Limit an already-scripted method to `n` successful results; further
    /// calls resolve to `None`.
    pub fn respond_times(&self, method: &str, n: usize) {
        if let Some(scripted) = self.responses.lock().get_mut(method) {
            scripted.remaining = Some(n);
        }
    }

    /// Drop the attachment when this method is sent (the command itself
    /// resolves to `None`). Simulates a peer detach racing a command.
    pub fn detach_on_command(&self, method: &str) {
        let _ = self.detach_on.lock().insert(method.to_owned());
    }

    /// Emit an event to subscribers.
    pub fn emit(&self, event: ChannelEvent) {
        let _ = self.events.send(event);
    }

    /// Simulate a peer-initiated detach: drop the attachment and notify.
    pub fn force_detach(&self, target: &TargetId) {
        let _ = self.attached.lock().remove(target);
        self.emit(ChannelEvent::Detached {
            target: target.clone(),
        });
    }

    /// Methods sent for a target, in call order.
    pub fn sent_methods(&self, target: &TargetId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(t, _, _)| t == target)
            .map(|(_, method, _)| method.clone())
            .collect()
    }
}

#[async_trait]
impl DebuggerChannel for ScriptedChannel {
    async fn attach(&self, target: &TargetId) -> Result<(), AttachError> {
        if self.fail_attach.lock().contains(target) {
            return Err(AttachError::new("no such target"));
        }
        let _ = self.attached.lock().insert(target.clone());
        Ok(())
    }

    async fn send_command(&self, target: &TargetId, method: &str, params: Value) -> Option<Value> {
        if !self.is_attached(target) {
            return None;
        }
        self.sent
            .lock()
            .push((target.clone(), method.to_owned(), params));

        if self.detach_on.lock().contains(method) {
            let _ = self.attached.lock().remove(target);
            return None;
        }

        let mut responses = self.responses.lock();
        let scripted = responses.get_mut(method)?;
        match scripted.remaining {
            Some(0) => None,
            Some(n) => {
                scripted.remaining = Some(n - 1);
                Some(scripted.value.clone())
            }
            None => Some(scripted.value.clone()),
        }
    }

    async fn detach(&self, target: &TargetId) {
        let _ = self.attached.lock().remove(target);
    }

    fn is_attached(&self, target: &TargetId) -> bool {
        self.attached.lock().contains(target)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}

/// Sink double collecting delivered artifacts in memory.
pub struct MemorySink {
    delivered: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Delivered filenames, in delivery order.
    pub fn names(&self) -> Vec<String> {
        self.delivered
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Contents of the first artifact delivered under `name`.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.delivered
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.clone())
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn deliver(&self, filename: &str, contents: &[u8]) -> std::io::Result<PathBuf> {
        self.delivered
            .lock()
            .push((filename.to_owned(), contents.to_vec()));
        Ok(PathBuf::from(filename))
    }
}
