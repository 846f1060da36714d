/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    tabshell::shell::runtime::cli::main()
}

// The browser build is driven from JS through the exported `TabShell`.
#[cfg(target_arch = "wasm32")]
fn main() {}
