/// DPI that corresponds to a scale factor of `1.0` on Windows.
pub const BASE_DPI: u32 = 96;

/// Window rectangle in screen coordinates. `right`/`bottom` are exclusive
/// in Win32 terms but hover detection treats them inclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenRect {
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            left: x,
            top: y,
            right: x + width,
            bottom: y + height,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn origin(&self) -> (i32, i32) {
        (self.left, self.top)
    }

    /// Edge-inclusive containment, matching how the hover poll samples the
    /// cursor against `GetWindowRect`.
    pub fn contains_inclusive(&self, point: (i32, i32)) -> bool {
        point.0 >= self.left && point.0 <= self.right && point.1 >= self.top && point.1 <= self.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlacement {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl WindowPlacement {
    pub fn rect(&self) -> ScreenRect {
        ScreenRect::from_xywh(self.x, self.y, self.width, self.height)
    }
}

pub fn dpi_to_scale(dpi: u32) -> f32 {
    if dpi == 0 {
        1.0
    } else {
        dpi as f32 / BASE_DPI as f32
    }
}

/// Scale a logical size, truncating toward zero like the Win32 integer
/// conversion does.
pub fn scale_size(size: (i32, i32), scale: f32) -> (i32, i32) {
    ((size.0 as f32 * scale) as i32, (size.1 as f32 * scale) as i32)
}

/// Logical size of a screen measured in physical pixels. Scaling the result
/// back up by `scale` covers the screen again.
pub fn logical_size(physical: (i32, i32), scale: f32) -> (i32, i32) {
    if !(scale.is_finite() && scale > 0.0) {
        return physical;
    }
    (
        (physical.0 as f32 / scale).round() as i32,
        (physical.1 as f32 / scale).round() as i32,
    )
}

/// Top-left corner that centers `size` on a screen of `screen` pixels.
pub fn center_on_screen(size: (i32, i32), screen: (i32, i32)) -> (i32, i32) {
    ((screen.0 - size.0) / 2, (screen.1 - size.1) / 2)
}

pub fn compute_window_placement(
    requested: (i32, i32),
    scale: f32,
    screen: (i32, i32),
) -> WindowPlacement {
    let (width, height) = scale_size(requested, scale);
    let (x, y) = center_on_screen((width, height), screen);
    WindowPlacement {
        x,
        y,
        width,
        height,
    }
}

pub fn global_to_local(point: (i32, i32), origin: (i32, i32)) -> (i32, i32) {
    (point.0 - origin.0, point.1 - origin.1)
}

/// Convert a clip rectangle in points to a scissor rectangle in pixels,
/// clamped to the render target. `None` when nothing would be visible.
pub fn clip_to_scissor(
    clip: egui::Rect,
    pixels_per_point: f32,
    target_px: (u32, u32),
) -> Option<ScreenRect> {
    let clamp_x = |v: f32| (v * pixels_per_point).round().clamp(0.0, target_px.0 as f32) as i32;
    let clamp_y = |v: f32| (v * pixels_per_point).round().clamp(0.0, target_px.1 as f32) as i32;
    let rect = ScreenRect {
        left: clamp_x(clip.min.x),
        top: clamp_y(clip.min.y),
        right: clamp_x(clip.max.x),
        bottom: clamp_y(clip.max.y),
    };
    (rect.width() > 0 && rect.height() > 0).then_some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_scales_and_centers_on_primary_screen() {
        let placement = compute_window_placement((800, 600), 1.5, (1920, 1080));
        assert_eq!(
            placement,
            WindowPlacement {
                x: 360,
                y: 90,
                width: 1200,
                height: 900,
            }
        );
    }

    #[test]
    fn placement_larger_than_screen_goes_negative() {
        let placement = compute_window_placement((1920, 1080), 1.25, (1920, 1080));
        assert_eq!((placement.width, placement.height), (2400, 1350));
        assert_eq!((placement.x, placement.y), (-240, -135));
    }

    #[test]
    fn default_size_covers_the_high_dpi_screen_exactly() {
        let requested = logical_size((1920, 1080), 1.5);
        assert_eq!(requested, (1280, 720));
        assert_eq!(
            compute_window_placement(requested, 1.5, (1920, 1080)),
            WindowPlacement {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            }
        );
        assert_eq!(logical_size((2560, 1440), 1.25), (2048, 1152));
        assert_eq!(logical_size((1920, 1080), 0.0), (1920, 1080));
    }

    #[test]
    fn fractional_scale_truncates() {
        assert_eq!(scale_size((101, 33), 1.25), (126, 41));
    }

    #[test]
    fn dpi_scale_defaults_to_one_for_unknown_dpi() {
        assert_eq!(dpi_to_scale(0), 1.0);
        assert_eq!(dpi_to_scale(96), 1.0);
        assert_eq!(dpi_to_scale(144), 1.5);
    }

    #[test]
    fn containment_includes_right_and_bottom_edges() {
        let rect = ScreenRect::from_xywh(100, 100, 50, 50);
        assert!(rect.contains_inclusive((100, 100)));
        assert!(rect.contains_inclusive((150, 150)));
        assert!(!rect.contains_inclusive((151, 120)));
        assert!(!rect.contains_inclusive((99, 120)));
    }

    #[test]
    fn clip_rects_scale_and_clamp_to_target() {
        let clip = egui::Rect::from_min_max(egui::pos2(-10.0, 10.0), egui::pos2(700.0, 50.5));
        assert_eq!(
            clip_to_scissor(clip, 2.0, (1200, 900)),
            Some(ScreenRect {
                left: 0,
                top: 20,
                right: 1200,
                bottom: 101,
            })
        );
        let offscreen = egui::Rect::from_min_max(egui::pos2(900.0, 0.0), egui::pos2(950.0, 10.0));
        assert_eq!(clip_to_scissor(offscreen, 1.0, (800, 600)), None);
        assert_eq!(clip_to_scissor(egui::Rect::NOTHING, 1.0, (800, 600)), None);
    }

    #[test]
    fn local_coordinates_are_relative_to_window_origin() {
        let rect = ScreenRect::from_xywh(360, 90, 1200, 900);
        assert_eq!(global_to_local((400, 100), rect.origin()), (40, 10));
        assert_eq!(global_to_local((0, 0), rect.origin()), (-360, -90));
    }
}
