use crate::overlay::device::{
    DeviceError, DeviceResources, DrawOutcome, GraphicsBackend, PresentStatus,
};
use crate::overlay::ui_host::EguiHost;
use crate::overlay::OverlayShared;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const FPS_WINDOW: usize = 120;
pub const OCCLUDED_SLEEP: Duration = Duration::from_millis(10);

/// Read-only facts about the current frame handed to the content callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub frame_index: u64,
    pub fps: f32,
    pub window_size: (u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// No render-target view this frame; nothing was drawn or presented.
    Skipped,
    /// The window is not visible; the loop slept instead of rendering.
    Occluded,
    PresentFailed,
}

/// Rolling frame-rate estimate over the last [`FPS_WINDOW`] frames.
#[derive(Debug, Clone)]
pub struct FrameStats {
    last_frame: Option<Instant>,
    durations: VecDeque<Duration>,
    total: Duration,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            last_frame: None,
            durations: VecDeque::with_capacity(FPS_WINDOW),
            total: Duration::ZERO,
        }
    }
}

impl FrameStats {
    pub fn tick(&mut self, now: Instant) {
        if let Some(last) = self.last_frame.replace(now) {
            self.record(now.saturating_duration_since(last));
        }
    }

    pub fn record(&mut self, duration: Duration) {
        if self.durations.len() == FPS_WINDOW {
            if let Some(oldest) = self.durations.pop_front() {
                self.total -= oldest;
            }
        }
        self.durations.push_back(duration);
        self.total += duration;
    }

    pub fn fps(&self) -> f32 {
        if self.durations.is_empty() || self.total.is_zero() {
            return 0.0;
        }
        self.durations.len() as f32 / self.total.as_secs_f32()
    }
}

/// Runs one iteration of the render loop: resize, UI frame, draw, present.
pub struct FrameDriver<B: GraphicsBackend> {
    host: EguiHost,
    resources: DeviceResources<B>,
    clear_color: [f32; 4],
    occluded: bool,
    occluded_sleep: Duration,
    stats: FrameStats,
    frame_index: u64,
}

impl<B: GraphicsBackend> FrameDriver<B> {
    pub fn new(resources: DeviceResources<B>, host: EguiHost, clear_color: [f32; 4]) -> Self {
        Self {
            host,
            resources,
            clear_color,
            occluded: false,
            occluded_sleep: OCCLUDED_SLEEP,
            stats: FrameStats::default(),
            frame_index: 0,
        }
    }

    pub fn with_occluded_sleep(mut self, sleep: Duration) -> Self {
        self.occluded_sleep = sleep;
        self
    }

    pub fn host(&self) -> &EguiHost {
        &self.host
    }

    pub fn context(&self) -> &egui::Context {
        self.host.context()
    }

    pub fn resources(&self) -> &DeviceResources<B> {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut DeviceResources<B> {
        &mut self.resources
    }

    pub fn is_occluded(&self) -> bool {
        self.occluded
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn render_frame<F>(&mut self, shared: &OverlayShared, content: &mut F) -> FrameOutcome
    where
        F: FnMut(&egui::Context, &FrameInfo),
    {
        if self.occluded {
            if self.resources.test_present() == PresentStatus::Occluded {
                shared.input.borrow_mut().discard_pending();
                std::thread::sleep(self.occluded_sleep);
                return FrameOutcome::Occluded;
            }
            tracing::debug!("overlay visible again");
            self.occluded = false;
        }

        if let Some(size) = shared.shell.take_pending_resize() {
            if let Err(err) = self.resources.resize(size.width, size.height) {
                tracing::warn!(%err, "resize failed");
            }
            self.host.set_screen_size_px((size.width, size.height));
        }

        match self.resources.prepare_frame() {
            Ok(()) | Err(DeviceError::PipelineUnavailable(_)) => {}
            Err(err) => {
                tracing::warn!(%err, "graphics backend frame start failed; frames will be skipped")
            }
        }
        let raw_input = {
            let time = self.host.elapsed_seconds();
            let screen = self.host.screen_size_px();
            shared.input.borrow_mut().take_raw_input(screen, time)
        };
        self.host.begin_frame(raw_input);

        self.stats.tick(Instant::now());
        let info = FrameInfo {
            frame_index: self.frame_index,
            fps: self.stats.fps(),
            window_size: self.host.screen_size_px(),
        };
        content(self.host.context(), &info);
        self.frame_index += 1;

        let (mut frame, cursor_icon) = self.host.end_frame();
        shared.input.borrow_mut().set_cursor_icon(cursor_icon);

        match self.resources.draw(self.clear_color, &frame) {
            DrawOutcome::Drawn => {}
            DrawOutcome::NoRenderTarget | DrawOutcome::Failed => {
                self.host
                    .defer_textures(std::mem::take(&mut frame.textures_delta));
                return FrameOutcome::Skipped;
            }
        }

        match self.resources.present() {
            PresentStatus::Presented => FrameOutcome::Presented,
            PresentStatus::Occluded => {
                tracing::debug!("overlay occluded");
                self.occluded = true;
                FrameOutcome::Presented
            }
            PresentStatus::Failed => FrameOutcome::PresentFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FrameStats;
    use std::time::{Duration, Instant};

    #[test]
    fn fps_is_zero_until_two_frames_seen() {
        let mut stats = FrameStats::default();
        assert_eq!(stats.fps(), 0.0);
        stats.tick(Instant::now());
        assert_eq!(stats.fps(), 0.0);
    }

    #[test]
    fn fps_averages_over_recorded_frames() {
        let mut stats = FrameStats::default();
        for _ in 0..10 {
            stats.record(Duration::from_millis(20));
        }
        assert!((stats.fps() - 50.0).abs() < 0.01);
    }

    #[test]
    fn window_drops_oldest_samples() {
        let mut stats = FrameStats::default();
        for _ in 0..200 {
            stats.record(Duration::from_millis(100));
        }
        for _ in 0..super::FPS_WINDOW {
            stats.record(Duration::from_millis(10));
        }
        assert!((stats.fps() - 100.0).abs() < 0.1);
    }
}
