/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Tab strip render model and horizontal scroll geometry.
//!
//! The host measures tab extents; this module owns the scroll position and
//! decides which scroll affordances are shown. Nothing here touches tab or
//! page state.

use serde::Serialize;

use crate::model::tab::{TabCountLevel, TabId, TabSet};

pub const DEFAULT_SCROLL_STEP: f32 = 200.0;

const REVEAL_MARGIN_LEFT: f32 = 20.0;
const REVEAL_MARGIN_RIGHT: f32 = 60.0;

const OPACITY_ENABLED: f32 = 1.0;
const OPACITY_DISABLED: f32 = 0.3;
const OPACITY_HIDDEN: f32 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabItem {
    pub id: TabId,
    pub title: String,
    pub active: bool,
    pub closable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollButton {
    pub visible: bool,
    pub enabled: bool,
    pub opacity: f32,
}

impl ScrollButton {
    const HIDDEN: Self = Self {
        visible: false,
        enabled: false,
        opacity: OPACITY_HIDDEN,
    };

    fn shown(enabled: bool) -> Self {
        Self {
            visible: true,
            enabled,
            opacity: if enabled {
                OPACITY_ENABLED
            } else {
                OPACITY_DISABLED
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollButtons {
    pub left: ScrollButton,
    pub right: ScrollButton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TabCount {
    pub open: usize,
    pub max: usize,
    pub level: TabCountLevel,
}

/// Everything the host needs to draw the strip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabStripFrame {
    pub items: Vec<TabItem>,
    pub scroll_position: f32,
    pub buttons: ScrollButtons,
    pub count: TabCount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabExtent {
    pub id: TabId,
    pub left: f32,
    pub width: f32,
}

impl TabExtent {
    fn right(&self) -> f32 {
        self.left + self.width
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabStripMetrics {
    pub visible_width: f32,
    pub extents: Vec<TabExtent>,
}

#[derive(Debug, Clone)]
pub struct TabBarView {
    scroll_position: f32,
    scroll_step: f32,
    metrics: TabStripMetrics,
}

impl Default for TabBarView {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_STEP)
    }
}

impl TabBarView {
    pub fn new(scroll_step: f32) -> Self {
        Self {
            scroll_position: 0.0,
            scroll_step,
            metrics: TabStripMetrics::default(),
        }
    }

    pub fn render(&self, tabs: &TabSet) -> Vec<TabItem> {
        tabs.tabs()
            .iter()
            .map(|tab| TabItem {
                id: tab.id.clone(),
                title: tab.title.clone(),
                active: tabs.is_active(tab.id.as_str()),
                closable: tabs.is_closable(tab.id.as_str()),
            })
            .collect()
    }

    pub fn scroll_position(&self) -> f32 {
        self.scroll_position
    }

    pub fn set_metrics(&mut self, metrics: TabStripMetrics) {
        self.metrics = metrics;
        self.scroll_position = self.clamp(self.scroll_position);
    }

    fn total_width(&self) -> f32 {
        self.metrics
            .extents
            .iter()
            .map(TabExtent::right)
            .fold(0.0, f32::max)
    }

    pub fn max_scroll(&self) -> f32 {
        (self.total_width() - self.metrics.visible_width).max(0.0)
    }

    fn clamp(&self, position: f32) -> f32 {
        position.clamp(0.0, self.max_scroll())
    }

    /// Scroll just far enough to bring `id` fully into view.
    ///
    /// Returns whether the position changed.
    pub fn scroll_to_tab(&mut self, id: &str) -> bool {
        let Some(extent) = self.metrics.extents.iter().find(|extent| extent.id.as_str() == id)
        else {
            return false;
        };
        let visible_right = self.scroll_position + self.metrics.visible_width;
        let target = if extent.left < self.scroll_position {
            (extent.left - REVEAL_MARGIN_LEFT).max(0.0)
        } else if extent.right() > visible_right {
            (extent.right() - self.metrics.visible_width + REVEAL_MARGIN_RIGHT)
                .min(self.max_scroll())
        } else {
            return false;
        };
        let target = self.clamp(target);
        let changed = target != self.scroll_position;
        self.scroll_position = target;
        changed
    }

    pub fn scroll_left(&mut self) -> f32 {
        self.scroll_by(-self.scroll_step)
    }

    pub fn scroll_right(&mut self) -> f32 {
        self.scroll_by(self.scroll_step)
    }

    /// Vertical wheel movement scrolls the strip horizontally.
    pub fn scroll_by_wheel(&mut self, delta: f32) -> f32 {
        self.scroll_by(delta)
    }

    fn scroll_by(&mut self, delta: f32) -> f32 {
        self.scroll_position = self.clamp(self.scroll_position + delta);
        self.scroll_position
    }

    pub fn update_scroll_buttons(&mut self) -> ScrollButtons {
        let max_scroll = self.max_scroll();
        if max_scroll <= 0.0 {
            self.scroll_position = 0.0;
            return ScrollButtons {
                left: ScrollButton::HIDDEN,
                right: ScrollButton::HIDDEN,
            };
        }
        ScrollButtons {
            left: ScrollButton::shown(self.scroll_position > 0.0),
            right: ScrollButton::shown(self.scroll_position < max_scroll),
        }
    }

    pub fn reset(&mut self) {
        self.scroll_position = 0.0;
    }

    pub fn frame(&mut self, tabs: &TabSet) -> TabStripFrame {
        let buttons = self.update_scroll_buttons();
        TabStripFrame {
            items: self.render(tabs),
            scroll_position: self.scroll_position,
            buttons,
            count: TabCount {
                open: tabs.len(),
                max: tabs.max_tabs(),
                level: tabs.count_level(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::model::tab::LastTabPolicy;

    /// `count` tabs of 100px each in a 300px window.
    fn view_with_tabs(count: usize) -> TabBarView {
        let mut view = TabBarView::default();
        view.set_metrics(TabStripMetrics {
            visible_width: 300.0,
            extents: (0..count)
                .map(|index| TabExtent {
                    id: TabId::new(format!("t{index}")),
                    left: index as f32 * 100.0,
                    width: 100.0,
                })
                .collect(),
        });
        view
    }

    #[test]
    fn test_tabs_that_fit_hide_both_buttons_and_reset() {
        let mut view = view_with_tabs(3);
        view.scroll_position = 40.0;
        let buttons = view.update_scroll_buttons();
        assert_eq!(buttons.left, ScrollButton::HIDDEN);
        assert_eq!(buttons.right, ScrollButton::HIDDEN);
        assert_eq!(view.scroll_position(), 0.0);
    }

    #[test]
    fn test_overflow_enables_buttons_by_position() {
        let mut view = view_with_tabs(10);
        let buttons = view.update_scroll_buttons();
        assert!(buttons.left.visible && !buttons.left.enabled);
        assert_eq!(buttons.left.opacity, 0.3);
        assert!(buttons.right.enabled);
        assert_eq!(buttons.right.opacity, 1.0);

        view.scroll_right();
        view.scroll_right();
        view.scroll_right();
        view.scroll_right();
        assert_eq!(view.scroll_position(), 700.0);
        let buttons = view.update_scroll_buttons();
        assert!(buttons.left.enabled);
        assert!(!buttons.right.enabled);
    }

    #[rstest]
    #[case::right_of_window(0.0, "t5", 360.0)]
    #[case::far_right_clamps(0.0, "t9", 700.0)]
    #[case::left_of_window(500.0, "t2", 180.0)]
    #[case::first_tab_clamps_to_zero(500.0, "t0", 0.0)]
    #[case::already_visible(200.0, "t3", 200.0)]
    fn test_scroll_to_tab(#[case] start: f32, #[case] id: &str, #[case] expected: f32) {
        let mut view = view_with_tabs(10);
        view.scroll_position = start;
        view.scroll_to_tab(id);
        assert_eq!(view.scroll_position(), expected);
    }

    #[test]
    fn test_wheel_scrolls_in_delta_direction_and_clamps() {
        let mut view = view_with_tabs(10);
        assert_eq!(view.scroll_by_wheel(120.0), 120.0);
        assert_eq!(view.scroll_by_wheel(-500.0), 0.0);
        assert_eq!(view.scroll_by_wheel(5000.0), 700.0);
    }

    #[test]
    fn test_shrinking_strip_reclamps_position() {
        let mut view = view_with_tabs(10);
        view.scroll_position = 700.0;
        view.set_metrics(TabStripMetrics {
            visible_width: 300.0,
            extents: view.metrics.extents[..5].to_vec(),
        });
        assert_eq!(view.scroll_position(), 200.0);
    }

    #[test]
    fn test_render_marks_active_and_permanent_tabs() {
        let mut tabs = TabSet::new(10, LastTabPolicy::AllowEmpty).with_permanent(["dashboard"]);
        tabs.open(TabId::from("dashboard"), "Dashboard", None).unwrap();
        tabs.open(TabId::from("tasks"), "Tasks", None).unwrap();

        let mut view = TabBarView::default();
        let frame = view.frame(&tabs);
        assert_eq!(
            frame
                .items
                .iter()
                .map(|item| (item.id.as_str(), item.active, item.closable))
                .collect::<Vec<_>>(),
            vec![("dashboard", false, false), ("tasks", true, true)]
        );
        assert_eq!(frame.count.open, 2);
        assert_eq!(frame.count.level, TabCountLevel::Normal);
    }
}
