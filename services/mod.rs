/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

pub mod auth;
pub mod menu_source;
pub mod page_cache;
pub mod page_fetch;
pub mod page_parse;
