//! Nullable guardian channel: record notices instead of sending them.

use async_trait::async_trait;
use keyward_guardians::{DeliveryOutcome, GuardianChannel, GuardianNotice};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// A test channel that records every delivery attempt.
///
/// Contacts can be told to fail a number of times (or forever) before
/// delivery succeeds, and every send can be slowed down to show that callers
/// do not wait on it.
pub struct NullChannel {
    delivered: Mutex<Vec<(String, GuardianNotice)>>,
    attempts: Mutex<HashMap<String, u32>>,
    /// contact -> remaining failures; `None` fails forever.
    failures: Mutex<HashMap<String, Option<u32>>>,
    delay: Mutex<Option<Duration>>,
}

impl NullChannel {
    pub fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
        }
    }

    /// Fail the next `times` sends to `contact`, then deliver.
    pub fn fail_times(&self, contact: &str, times: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(contact.to_string(), Some(times));
    }

    /// Fail every send to `contact`.
    pub fn fail_always(&self, contact: &str) {
        self.failures.lock().unwrap().insert(contact.to_string(), None);
    }

    /// Sleep for `delay` before answering each send.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Successfully delivered notices, in delivery order.
    pub fn delivered(&self) -> Vec<(String, GuardianNotice)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_to(&self, contact: &str) -> Vec<GuardianNotice> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == contact)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Number of send attempts made to `contact`, failed ones included.
    pub fn attempts(&self, contact: &str) -> u32 {
        self.attempts.lock().unwrap().get(contact).copied().unwrap_or(0)
    }

    /// Clear all state.
    pub fn reset(&self) {
        self.delivered.lock().unwrap().clear();
        self.attempts.lock().unwrap().clear();
        self.failures.lock().unwrap().clear();
        *self.delay.lock().unwrap() = None;
    }
}

impl Default for NullChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuardianChannel for NullChannel {
    async fn notify(&self, contact: &str, notice: &GuardianNotice) -> DeliveryOutcome {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        *self
            .attempts
            .lock()
            .unwrap()
            .entry(contact.to_string())
            .or_insert(0) += 1;

        let fail = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(contact) {
                Some(None) => true,
                Some(Some(remaining)) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if fail {
            return DeliveryOutcome::Failed(format!("{contact} unreachable"));
        }

        self.delivered
            .lock()
            .unwrap()
            .push((contact.to_string(), notice.clone()));
        DeliveryOutcome::Delivered
    }
}
