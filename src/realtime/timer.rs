//! One-shot timers whose firings can be invalidated.
//!
//! Each `arm` aborts the previous task and bumps a generation counter. The
//! generation is handed to the fire callback, and the owner calls
//! [`CancellableTimer::accept`] when the firing comes back through its event
//! queue, so a firing that raced with a re-arm or cancel is dropped.

use std::{collections::HashMap, time::Duration};

use tokio::{task::JoinHandle, time::Instant};

#[derive(Debug, Default)]
pub struct CancellableTimer {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl CancellableTimer {
    pub fn arm<F>(&mut self, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        let deadline = Instant::now() + delay;
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fire(generation);
        }));
        generation
    }

    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    /// Consumes a firing. Returns `false` for stale generations.
    pub fn accept(&mut self, generation: u64) -> bool {
        if self.task.is_none() || generation != self.generation {
            return false;
        }
        self.task = None;
        true
    }
}

impl Drop for CancellableTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// A [`CancellableTimer`] per key, used for per-chat typing timers.
#[derive(Debug, Default)]
pub struct KeyedTimers {
    timers: HashMap<String, CancellableTimer>,
}

impl KeyedTimers {
    pub fn arm<F>(&mut self, key: &str, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.timers
            .entry(key.to_owned())
            .or_default()
            .arm(delay, fire)
    }

    /// Cancels the timer for `key`. Returns whether one was armed.
    pub fn cancel(&mut self, key: &str) -> bool {
        match self.timers.remove(key) {
            Some(mut timer) => {
                let was_armed = timer.is_armed();
                timer.cancel();
                was_armed
            }
            None => false,
        }
    }

    pub fn accept(&mut self, key: &str, generation: u64) -> bool {
        let accepted = self
            .timers
            .get_mut(key)
            .is_some_and(|timer| timer.accept(generation));
        if accepted {
            self.timers.remove(key);
        }
        accepted
    }

    pub fn is_armed(&self, key: &str) -> bool {
        self.timers.get(key).is_some_and(CancellableTimer::is_armed)
    }

    pub fn cancel_all(&mut self) {
        for (_, mut timer) in self.timers.drain() {
            timer.cancel();
        }
    }
}
