//! Window-message state machine.
//!
//! The native window procedure decodes the messages it cares about into
//! [`ShellEvent`]s and turns the returned [`ShellResponse`] back into a
//! message result, so everything in here runs without a real window.

use std::cell::Cell;

/// Size latched from a size-change notification. `(0, 0)` means nothing is
/// pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingResize {
    pub width: u32,
    pub height: u32,
}

impl PendingResize {
    pub const NONE: Self = Self {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_pending(self) -> bool {
        self.width != 0 && self.height != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellEvent {
    /// Client area changed size.
    Resized {
        minimized: bool,
        width: u32,
        height: u32,
    },
    /// Alt-key activation of the window menu.
    KeyMenu,
    /// Non-client hit-test query.
    HitTest,
    /// Z-order/position is about to change.
    PositionChanging,
    /// Window is being destroyed.
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellResponse {
    /// Return this value without default processing.
    Return(isize),
    /// Report the point as transparent so the click reaches the window below.
    HitTransparent,
    /// Pin the insertion point to topmost, then run default processing.
    ForceTopmost,
    /// Post the quit message and return 0.
    PostQuit,
    /// Hand the message to the default window procedure.
    Default,
}

/// State shared between the window procedure and the render loop.
///
/// All fields are `Cell`s: the window procedure can be re-entered from
/// inside native calls made by the loop, so no borrow is ever held across
/// a call into the windowing system.
#[derive(Debug)]
pub struct ShellState {
    pending_resize: Cell<PendingResize>,
    click_through: Cell<bool>,
    quit_requested: Cell<bool>,
    destroyed: Cell<bool>,
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellState {
    /// The window starts out mouse-transparent.
    pub fn new() -> Self {
        Self {
            pending_resize: Cell::new(PendingResize::NONE),
            click_through: Cell::new(true),
            quit_requested: Cell::new(false),
            destroyed: Cell::new(false),
        }
    }

    pub fn handle_event(&self, event: ShellEvent) -> ShellResponse {
        match event {
            ShellEvent::Resized {
                minimized,
                width,
                height,
            } => {
                let size = PendingResize::new(width, height);
                if minimized || !size.is_pending() {
                    return ShellResponse::Return(0);
                }
                tracing::trace!(width, height, "resize latched");
                self.pending_resize.set(size);
                ShellResponse::Return(0)
            }
            ShellEvent::KeyMenu => ShellResponse::Return(0),
            ShellEvent::HitTest => {
                if self.click_through.get() {
                    ShellResponse::HitTransparent
                } else {
                    ShellResponse::Default
                }
            }
            ShellEvent::PositionChanging => ShellResponse::ForceTopmost,
            ShellEvent::Destroy => {
                self.destroyed.set(true);
                ShellResponse::PostQuit
            }
        }
    }

    pub fn pending_resize(&self) -> PendingResize {
        self.pending_resize.get()
    }

    /// Consume the latched size, leaving `(0, 0)` behind.
    pub fn take_pending_resize(&self) -> Option<PendingResize> {
        let pending = self.pending_resize.replace(PendingResize::NONE);
        pending.is_pending().then_some(pending)
    }

    pub fn is_click_through(&self) -> bool {
        self.click_through.get()
    }

    /// Only the transparency controller writes this flag.
    pub(crate) fn set_click_through(&self, click_through: bool) {
        self.click_through.set(click_through);
    }

    pub fn request_quit(&self) {
        self.quit_requested.set(true);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}
