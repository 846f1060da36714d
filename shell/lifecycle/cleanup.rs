/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Per-page cleanup hooks run when a page is torn down.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use log::{debug, warn};

use crate::model::tab::TabId;
use crate::shell::runtime::diagnostics::{DiagnosticEvent, emit_event};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupError(pub String);

impl fmt::Display for CleanupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cleanup hook failed: {}", self.0)
    }
}

impl std::error::Error for CleanupError {}

pub type CleanupCallback = Box<dyn FnOnce() -> Result<(), CleanupError>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub ran: usize,
    pub failed: usize,
}

/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct CleanupRegistry {
    callbacks: Rc<RefCell<HashMap<TabId, Vec<CleanupCallback>>>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, id: TabId, callback: F)
    where
        F: FnOnce() -> Result<(), CleanupError> + 'static,
    {
        self.callbacks
            .borrow_mut()
            .entry(id)
            .or_default()
            .push(Box::new(callback));
    }

    pub fn pending(&self, id: &str) -> usize {
        self.callbacks.borrow().get(id).map_or(0, Vec::len)
    }

    /// Run and forget every hook for `id`, in registration order.
    ///
    /// The registry is not borrowed while hooks run, so a hook may register
    /// new hooks or trigger another teardown.
    pub fn run(&self, id: &TabId) -> CleanupReport {
        let callbacks = self
            .callbacks
            .borrow_mut()
            .remove(id.as_str())
            .unwrap_or_default();

        let mut report = CleanupReport::default();
        for callback in callbacks {
            report.ran += 1;
            let failure = match catch_unwind(AssertUnwindSafe(callback)) {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(panic) => Some(panic_message(panic.as_ref())),
            };
            if let Some(reason) = failure {
                report.failed += 1;
                warn!("cleanup for page {id} failed: {reason}");
                emit_event(DiagnosticEvent::CleanupFailed {
                    id: id.clone(),
                    reason,
                });
            }
        }
        if report.ran > 0 {
            debug!("ran {} cleanup hooks for {id} ({} failed)", report.ran, report.failed);
        }
        report
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_owned()
    }
}
