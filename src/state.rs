//! Process-scoped scripter state
//!
//! One instance is shared by reference between the supervisor, the idle
//! monitor, the executor and the driver event task.

use std::sync::{Arc, PoisonError, RwLock as StdRwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::error;

use crate::command::Command;
use crate::menu::MenuStateStream;

#[derive(Default)]
struct Slot {
    current: Option<Arc<dyn Command>>,
    last_finished: Option<Instant>,
}

/// The command currently executing, if any
#[derive(Default)]
pub struct ActiveCommandSlot {
    slot: StdRwLock<Slot>,
}

impl ActiveCommandSlot {
    fn read(&self) -> RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Occupy the slot until the returned guard is dropped. Only called by
    /// the executor while it holds the execution lock.
    pub(crate) fn set(&self, command: Arc<dyn Command>) -> ActiveCommandGuard<'_> {
        self.write().current = Some(command);
        ActiveCommandGuard { slot: self }
    }

    /// Empty the slot and remember when the command finished
    pub(crate) fn clear(&self) {
        let mut slot = self.write();
        slot.current = None;
        slot.last_finished = Some(Instant::now());
    }

    pub fn get(&self) -> Option<Arc<dyn Command>> {
        self.read().current.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.read().current.is_some()
    }

    pub fn last_finished(&self) -> Option<Instant> {
        self.read().last_finished
    }
}

/// Clears the active command slot when dropped, including when the caller
/// abandons a running command
pub(crate) struct ActiveCommandGuard<'a> {
    slot: &'a ActiveCommandSlot,
}

impl Drop for ActiveCommandGuard<'_> {
    fn drop(&mut self) {
        self.slot.clear();
    }
}

pub struct ScripterState {
    pub menu: MenuStateStream,
    pub active: ActiveCommandSlot,
    /// Held for the whole of a command, and by the idle monitor while it
    /// disconnects
    execution: Mutex<()>,
    unrecoverable: RwLock<Option<String>>,
}

impl ScripterState {
    pub fn new() -> Self {
        Self {
            menu: MenuStateStream::new(),
            active: ActiveCommandSlot::default(),
            execution: Mutex::new(()),
            unrecoverable: RwLock::new(None),
        }
    }

    pub(crate) fn execution_lock(&self) -> &Mutex<()> {
        &self.execution
    }

    /// Reason the scripter refuses all commands, if any
    pub async fn unrecoverable_error(&self) -> Option<String> {
        self.unrecoverable.read().await.clone()
    }

    pub async fn is_healthy(&self) -> bool {
        self.unrecoverable.read().await.is_none()
    }

    /// Refuse every further command until restart; the first reason wins
    pub async fn mark_unrecoverable(&self, reason: impl Into<String>) {
        let mut slot = self.unrecoverable.write().await;
        if slot.is_none() {
            let reason = reason.into();
            error!("Unrecoverable error, refusing further commands: {}", reason);
            *slot = Some(reason);
        }
    }
}

impl Default for ScripterState {
    fn default() -> Self {
        Self::new()
    }
}
