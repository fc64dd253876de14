//! Process-wide conversation memory.
//!
//! One [`ConversationMemory`] is shared by every caller. It grows without
//! bound until [`clear`](ConversationMemory::clear) is called.
//!
//! Each operation takes the lock once, so a clear is never observed half-done.
//! Snapshot-then-append is not atomic as a pair: two concurrent pipeline calls
//! can read the same history and append in completion order rather than
//! request order. Clears are tracked by an epoch counter, and
//! [`append_in_epoch`](ConversationMemory::append_in_epoch) drops a turn whose
//! snapshot predates the latest clear.

use std::sync::Mutex;

use serde::Serialize;

use crate::error::MemoryError;

/// One exchange: what the user said and the model's raw reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub user_input: String,
    pub model_output: String,
}

impl ConversationTurn {
    pub fn new(user_input: impl Into<String>, model_output: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            model_output: model_output.into(),
        }
    }
}

/// A copy of the turns plus the clear-epoch they were read in.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub epoch: u64,
    pub turns: Vec<ConversationTurn>,
}

#[derive(Default)]
struct Inner {
    epoch: u64,
    turns: Vec<ConversationTurn>,
}

#[derive(Default)]
pub struct ConversationMemory {
    inner: Mutex<Inner>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, MemoryError> {
        self.inner.lock().map_err(|_| MemoryError::Poisoned)
    }

    pub fn append(&self, turn: ConversationTurn) -> Result<(), MemoryError> {
        self.lock()?.turns.push(turn);
        Ok(())
    }

    /// Append only if no clear happened since the snapshot taken at `epoch`.
    /// Returns whether the turn was kept.
    pub fn append_in_epoch(&self, epoch: u64, turn: ConversationTurn) -> Result<bool, MemoryError> {
        let mut inner = self.lock()?;
        if inner.epoch != epoch {
            return Ok(false);
        }
        inner.turns.push(turn);
        Ok(true)
    }

    pub fn snapshot(&self) -> Result<Snapshot, MemoryError> {
        let inner = self.lock()?;
        Ok(Snapshot {
            epoch: inner.epoch,
            turns: inner.turns.clone(),
        })
    }

    pub fn clear(&self) -> Result<(), MemoryError> {
        let mut inner = self.lock()?;
        inner.turns.clear();
        inner.epoch += 1;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, MemoryError> {
        Ok(self.lock()?.turns.len())
    }

    pub fn is_empty(&self) -> Result<bool, MemoryError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
impl ConversationMemory {
    /// Poison the lock the way a panicking holder would.
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.inner.lock();
            panic!("poisoning conversation memory");
        }));
    }
}
