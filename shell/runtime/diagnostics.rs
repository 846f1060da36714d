/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::{BTreeMap, VecDeque};
use std::sync::OnceLock;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Serialize;
use serde_json::{Value, json};

use crate::model::tab::TabId;

const EVENT_RING_CAPACITY: usize = 256;

static GLOBAL_DIAGNOSTICS_TX: OnceLock<Sender<DiagnosticEvent>> = OnceLock::new();

#[cfg(test)]
thread_local! {
    static TEST_DIAGNOSTICS_TX: std::cell::RefCell<Option<Sender<DiagnosticEvent>>> =
        std::cell::RefCell::new(None);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    PageLoaded {
        id: TabId,
        resources: usize,
    },
    PageCacheHit {
        id: TabId,
    },
    PageEvicted {
        id: TabId,
    },
    PageTornDown {
        id: TabId,
        released: usize,
        cleanups_run: usize,
        cleanups_failed: usize,
    },
    CleanupFailed {
        id: TabId,
        reason: String,
    },
    FrameLoadTimedOut {
        id: TabId,
        after_ms: u64,
    },
    TabLimitRejected {
        id: TabId,
        max_tabs: usize,
    },
    MenuFallback {
        reason: String,
    },
    StaleLoadDiscarded {
        id: TabId,
    },
}

impl DiagnosticEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PageLoaded { .. } => "page_loaded",
            Self::PageCacheHit { .. } => "page_cache_hit",
            Self::PageEvicted { .. } => "page_evicted",
            Self::PageTornDown { .. } => "page_torn_down",
            Self::CleanupFailed { .. } => "cleanup_failed",
            Self::FrameLoadTimedOut { .. } => "frame_load_timed_out",
            Self::TabLimitRejected { .. } => "tab_limit_rejected",
            Self::MenuFallback { .. } => "menu_fallback",
            Self::StaleLoadDiscarded { .. } => "stale_load_discarded",
        }
    }

    pub(crate) fn frame_timeout(id: &TabId, after: Duration) -> Self {
        Self::FrameLoadTimedOut {
            id: id.clone(),
            after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Route events from every shell in this process to `sender`.
///
/// Only the first installed sender is kept.
pub fn install_global_sender(sender: Sender<DiagnosticEvent>) {
    let _ = GLOBAL_DIAGNOSTICS_TX.set(sender.clone());

    #[cfg(test)]
    {
        TEST_DIAGNOSTICS_TX.with(|slot| {
            *slot.borrow_mut() = Some(sender.clone());
        });
    }
}

/// Capture events emitted on the current test thread.
#[cfg(test)]
pub(crate) fn capture_thread_events() -> Receiver<DiagnosticEvent> {
    let (tx, rx) = unbounded();
    TEST_DIAGNOSTICS_TX.with(|slot| {
        *slot.borrow_mut() = Some(tx);
    });
    rx
}

pub(crate) fn emit_event(event: DiagnosticEvent) {
    #[cfg(test)]
    {
        let mut event = Some(event);
        TEST_DIAGNOSTICS_TX.with(|slot| {
            if let Some(tx) = slot.borrow().as_ref()
                && let Some(payload) = event.take()
            {
                let _ = tx.send(payload);
            }
        });
        if let (Some(tx), Some(payload)) = (GLOBAL_DIAGNOSTICS_TX.get(), event.take()) {
            let _ = tx.send(payload);
        }
    }

    #[cfg(not(test))]
    {
        if let Some(tx) = GLOBAL_DIAGNOSTICS_TX.get() {
            let _ = tx.send(event);
        }
    }
}

/// Bounded ring of recent events plus per-kind counters.
pub struct DiagnosticsLog {
    event_rx: Receiver<DiagnosticEvent>,
    event_ring: VecDeque<DiagnosticEvent>,
    counts: BTreeMap<&'static str, u64>,
}

impl DiagnosticsLog {
    /// Install a global sender and return the log that drains it.
    pub fn install() -> Self {
        let (tx, rx) = unbounded();
        install_global_sender(tx);
        Self::from_receiver(rx)
    }

    pub fn from_receiver(event_rx: Receiver<DiagnosticEvent>) -> Self {
        Self {
            event_rx,
            event_ring: VecDeque::new(),
            counts: BTreeMap::new(),
        }
    }

    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            *self.counts.entry(event.name()).or_default() += 1;
            self.event_ring.push_back(event);
            while self.event_ring.len() > EVENT_RING_CAPACITY {
                self.event_ring.pop_front();
            }
            drained += 1;
        }
        drained
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn recent(&self) -> impl Iterator<Item = &DiagnosticEvent> {
        self.event_ring.iter()
    }

    pub fn summary_json(&self) -> Value {
        json!({
            "counts": self.counts,
            "recent": self.event_ring.iter().rev().take(16).collect::<Vec<_>>(),
        })
    }
}
