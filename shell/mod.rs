/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Browser-side shell: the document seam, page lifecycles, the tab
//! coordinator and its runtime surfaces.

pub mod host;
pub mod lifecycle;
pub mod runtime;
pub mod tab_controller;
pub mod workbench;
