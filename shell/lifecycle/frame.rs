/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Isolated-frame strategy: every page lives in its own frame element that is
//! shown or hidden on tab switch and removed on teardown.

use std::rc::Rc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{Either, LocalBoxFuture, select};
use log::{debug, warn};

use crate::model::page::PageSource;
use crate::model::tab::TabId;
use crate::shell::host::{ContentView, DocumentHost, FrameHandle};
use crate::shell::lifecycle::{MaterializerKind, PageError, PageMaterializer};
use crate::shell::runtime::diagnostics::{DiagnosticEvent, emit_event};

pub struct FrameMaterializer {
    host: Rc<dyn DocumentHost>,
    load_timeout: Duration,
    visible: Option<FrameHandle>,
}

impl FrameMaterializer {
    pub fn new(host: Rc<dyn DocumentHost>, load_timeout: Duration) -> Self {
        Self {
            host,
            load_timeout,
            visible: None,
        }
    }

    pub fn visible_frame(&self) -> Option<FrameHandle> {
        self.visible
    }
}

impl PageMaterializer for FrameMaterializer {
    type Payload = FrameHandle;

    fn kind(&self) -> MaterializerKind {
        MaterializerKind::Frame
    }

    fn load(
        &self,
        id: &TabId,
        source: &PageSource,
    ) -> LocalBoxFuture<'static, Result<Self::Payload, PageError>> {
        let host = Rc::clone(&self.host);
        let created = host.create_frame(id, &source.location);
        let after = self.load_timeout;
        let id = id.clone();
        async move {
            let frame = created?;
            let loaded = host.frame_loaded(frame);
            let timer = host.sleep(after);
            match select(loaded, timer).await {
                Either::Left((Ok(()), _)) => {
                    debug!("frame for {id} loaded");
                    Ok(frame)
                },
                Either::Left((Err(err), _)) => {
                    warn!("frame for {id} failed to load: {err}");
                    host.remove_frame(frame);
                    Err(PageError::FrameLoad {
                        id,
                        reason: err.to_string(),
                    })
                },
                Either::Right(((), _)) => {
                    warn!("frame for {id} did not load within {after:?}; removing it");
                    host.remove_frame(frame);
                    emit_event(DiagnosticEvent::frame_timeout(&id, after));
                    Err(PageError::FrameTimeout { id, after })
                },
            }
        }
        .boxed_local()
    }

    fn show(&mut self, _id: &TabId, payload: &Self::Payload) -> Result<(), PageError> {
        if let Some(previous) = self.visible.filter(|previous| previous != payload) {
            self.host.set_frame_visible(previous, false);
        }
        self.host.set_content(ContentView::Frames);
        self.host.set_frame_visible(*payload, true);
        self.visible = Some(*payload);
        Ok(())
    }

    fn hide(&mut self, _id: &TabId, payload: &Self::Payload) {
        self.host.set_frame_visible(*payload, false);
        if self.visible == Some(*payload) {
            self.visible = None;
        }
    }

    fn teardown(&mut self, _id: &TabId, payload: Option<Self::Payload>) -> usize {
        let Some(frame) = payload else {
            return 0;
        };
        if self.visible == Some(frame) {
            self.visible = None;
        }
        usize::from(self.host.remove_frame(frame))
    }

    fn attached_resources(&self, _id: &TabId) -> usize {
        usize::from(self.visible.is_some())
    }

    fn discard(&mut self, payload: Self::Payload) {
        self.host.remove_frame(payload);
    }

    fn retains_closed_pages(&self) -> bool {
        false
    }

    fn releases_on_hide(&self) -> bool {
        false
    }
}
