//! Hover-driven mouse transparency.
//!
//! Once per frame, after present, the controller samples the cursor against
//! the window rectangle and the UI's own hover state and flips the window
//! between pass-through and interactive. There is no hysteresis: one frame
//! of hover is enough to switch.

use crate::overlay::geometry::{global_to_local, ScreenRect};
use crate::overlay::OverlayShared;

/// Whether something interactive in the UI is under the pointer.
pub trait UiHover {
    fn any_area_hovered(&self) -> bool;
    fn any_item_hovered(&self) -> bool;
}

impl UiHover for egui::Context {
    fn any_area_hovered(&self) -> bool {
        self.is_pointer_over_area()
    }

    fn any_item_hovered(&self) -> bool {
        self.wants_pointer_input() || self.is_using_pointer()
    }
}

/// Native window queries and the single style write the controller needs.
pub trait OverlaySurface {
    fn cursor_position(&self) -> Option<(i32, i32)>;
    fn window_rect(&self) -> Option<ScreenRect>;
    /// Write the pass-through (`true`) or interactive (`false`) extended
    /// style and reassert full opacity.
    fn apply_click_through(&self, click_through: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverOutcome {
    /// A native query failed; nothing changed.
    Skipped,
    Unchanged { click_through: bool },
    Switched { click_through: bool },
}

pub fn is_hovered<H: UiHover + ?Sized>(cursor: (i32, i32), rect: ScreenRect, hover: &H) -> bool {
    rect.contains_inclusive(cursor) && (hover.any_area_hovered() || hover.any_item_hovered())
}

#[derive(Debug)]
pub struct TransparencyController {
    last_click_through: bool,
}

impl Default for TransparencyController {
    fn default() -> Self {
        Self::new()
    }
}

impl TransparencyController {
    /// Matches the window's initial pass-through style.
    pub fn new() -> Self {
        Self {
            last_click_through: true,
        }
    }

    pub fn is_click_through(&self) -> bool {
        self.last_click_through
    }

    pub fn update<S, H>(&mut self, surface: &S, hover: &H, shared: &OverlayShared) -> HoverOutcome
    where
        S: OverlaySurface + ?Sized,
        H: UiHover + ?Sized,
    {
        let (Some(cursor), Some(rect)) = (surface.cursor_position(), surface.window_rect()) else {
            return HoverOutcome::Skipped;
        };

        // Consumed by the next frame; hover below still reflects the input
        // the current frame was built from.
        if let Ok(mut input) = shared.input.try_borrow_mut() {
            input.pointer_moved(global_to_local(cursor, rect.origin()));
        }

        let click_through = !is_hovered(cursor, rect, hover);
        if click_through == self.last_click_through {
            return HoverOutcome::Unchanged { click_through };
        }

        surface.apply_click_through(click_through);
        self.last_click_through = click_through;
        shared.shell.set_click_through(click_through);
        tracing::debug!(click_through, "overlay transparency switched");
        HoverOutcome::Switched { click_through }
    }
}
