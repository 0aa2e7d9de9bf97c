use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};

use super::Registry;

/// Periodically evicts rooms that are empty and idle. Aborts the task on drop.
pub struct Reaper {
    task: JoinHandle<()>,
}

impl Reaper {
    pub fn spawn(registry: Arc<Registry>, interval: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                for room_id in registry.reap_idle() {
                    tracing::info!(room_id = %room_id, "cleaned up inactive chatroom");
                }
            }
        });

        Self { task }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.task.abort();
    }
}
