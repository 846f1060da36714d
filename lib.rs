/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Tab and page cache manager for a browser-resident workspace shell.
//!
//! Menu destinations open as tabs inside one document. [`shell::tab_controller::Shell`]
//! keeps a bounded LRU cache of materialized pages, never evicts a page whose
//! tab is open, and reverses every script, style, frame and cleanup hook a
//! page added when that page is evicted or closed.

pub mod app;
pub mod model;
pub mod prefs;
pub mod services;
pub mod shell;
