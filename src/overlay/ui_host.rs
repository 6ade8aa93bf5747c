//! egui hosting: the platform-side input queue and the per-frame
//! begin/end calls around the content callback.

use egui::{
    ClippedPrimitive, Context, CursorIcon, Event, FontData, FontDefinitions, FontFamily, ImageData,
    Modifiers, Pos2, RawInput, Rect, TextStyle, TexturesDelta, Vec2, ViewportId, Visuals,
};
use std::path::Path;
use std::time::Instant;

const CUSTOM_FONT_NAME: &str = "overlay-custom";

/// Input collected by the platform layer between two frames.
///
/// Positions arrive in physical pixels relative to the client area and are
/// converted to egui points on the way in.
#[derive(Debug)]
pub struct InputQueue {
    pixels_per_point: f32,
    events: Vec<Event>,
    modifiers: Modifiers,
    focused: bool,
    pointer_tracked: bool,
    cursor_icon: CursorIcon,
    pending_surrogate: Option<u16>,
}

impl InputQueue {
    pub fn new(pixels_per_point: f32) -> Self {
        Self {
            pixels_per_point: sanitize_scale(pixels_per_point),
            events: Vec::new(),
            modifiers: Modifiers::default(),
            focused: false,
            pointer_tracked: false,
            cursor_icon: CursorIcon::Default,
            pending_surrogate: None,
        }
    }

    pub fn pixels_per_point(&self) -> f32 {
        self.pixels_per_point
    }

    pub fn to_points(&self, pixel: (i32, i32)) -> Pos2 {
        Pos2::new(
            pixel.0 as f32 / self.pixels_per_point,
            pixel.1 as f32 / self.pixels_per_point,
        )
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn pending_events(&self) -> &[Event] {
        &self.events
    }

    /// Queue a pointer position given in window-local pixels. Back-to-back
    /// moves collapse into the latest one.
    pub fn pointer_moved(&mut self, local_px: (i32, i32)) {
        let pos = self.to_points(local_px);
        if let Some(Event::PointerMoved(last)) = self.events.last_mut() {
            *last = pos;
            return;
        }
        self.events.push(Event::PointerMoved(pos));
    }

    /// Drop everything queued since the last frame. Returns how many events
    /// were discarded.
    pub fn discard_pending(&mut self) -> usize {
        self.pending_surrogate = None;
        let discarded = self.events.len();
        self.events.clear();
        discarded
    }

    pub fn pointer_left(&mut self) {
        self.pointer_tracked = false;
        self.events.push(Event::PointerGone);
    }

    pub fn is_pointer_tracked(&self) -> bool {
        self.pointer_tracked
    }

    pub fn set_pointer_tracked(&mut self, tracked: bool) {
        self.pointer_tracked = tracked;
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        self.events.push(Event::WindowFocused(focused));
    }

    pub fn cursor_icon(&self) -> CursorIcon {
        self.cursor_icon
    }

    pub fn set_cursor_icon(&mut self, icon: CursorIcon) {
        self.cursor_icon = icon;
    }

    /// Feed one UTF-16 code unit from a character message. Surrogate pairs
    /// are joined; control characters are dropped.
    pub fn push_utf16(&mut self, unit: u16) {
        let units = match self.pending_surrogate.take() {
            Some(high) => vec![high, unit],
            None if (0xD800..0xDC00).contains(&unit) => {
                self.pending_surrogate = Some(unit);
                return;
            }
            None => vec![unit],
        };
        let text: String = char::decode_utf16(units)
            .filter_map(Result::ok)
            .filter(|c| !c.is_control())
            .collect();
        if !text.is_empty() {
            self.events.push(Event::Text(text));
        }
    }

    /// Platform half of starting a frame: drain queued events into a
    /// [`RawInput`] describing a screen of `screen_size_px` pixels.
    pub fn take_raw_input(&mut self, screen_size_px: (u32, u32), time: f64) -> RawInput {
        let screen_points = Vec2::new(
            screen_size_px.0 as f32 / self.pixels_per_point,
            screen_size_px.1 as f32 / self.pixels_per_point,
        );
        let mut raw = RawInput {
            screen_rect: Some(Rect::from_min_size(Pos2::ZERO, screen_points)),
            time: Some(time),
            modifiers: self.modifiers,
            focused: self.focused,
            events: std::mem::take(&mut self.events),
            ..Default::default()
        };
        raw.viewports
            .entry(ViewportId::ROOT)
            .or_default()
            .native_pixels_per_point = Some(self.pixels_per_point);
        raw
    }
}

/// Draw data for one frame, ready for the graphics backend.
#[derive(Debug, Default)]
pub struct PaintFrame {
    pub primitives: Vec<ClippedPrimitive>,
    pub textures_delta: TexturesDelta,
    pub pixels_per_point: f32,
    pub screen_size_px: (u32, u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontSettings {
    pub size: f32,
    pub bytes: Option<Vec<u8>>,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            size: 16.0,
            bytes: None,
        }
    }
}

impl FontSettings {
    /// Read the font file at `path`. A missing or unreadable file falls back
    /// to the built-in fonts.
    pub fn load(path: Option<&Path>, size: f32) -> Self {
        let bytes = path.and_then(|path| match std::fs::read(path) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => {
                tracing::warn!(path = %path.display(), "font file is empty");
                None
            }
            Err(err) => {
                tracing::warn!(?err, path = %path.display(), "failed to read font file");
                None
            }
        });
        Self { size, bytes }
    }
}

pub struct EguiHost {
    ctx: Context,
    started_at: Instant,
    screen_size_px: (u32, u32),
    deferred_textures: TexturesDelta,
}

impl EguiHost {
    pub fn new(screen_size_px: (u32, u32), fonts: &FontSettings) -> Self {
        let ctx = Context::default();
        ctx.set_visuals(Visuals::dark());
        install_fonts(&ctx, fonts);
        Self {
            ctx,
            started_at: Instant::now(),
            screen_size_px,
            deferred_textures: TexturesDelta::default(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn screen_size_px(&self) -> (u32, u32) {
        self.screen_size_px
    }

    pub fn set_screen_size_px(&mut self, size: (u32, u32)) {
        self.screen_size_px = size;
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    pub fn begin_frame(&mut self, raw_input: RawInput) {
        self.ctx.begin_frame(raw_input);
    }

    /// Finish the frame and tessellate it. Texture updates deferred from
    /// skipped frames are prepended so uploads are never lost.
    pub fn end_frame(&mut self) -> (PaintFrame, CursorIcon) {
        let output = self.ctx.end_frame();
        let mut textures_delta = std::mem::take(&mut self.deferred_textures);
        textures_delta.append(output.textures_delta);
        let primitives = self.ctx.tessellate(output.shapes, output.pixels_per_point);
        let frame = PaintFrame {
            primitives,
            textures_delta,
            pixels_per_point: output.pixels_per_point,
            screen_size_px: self.screen_size_px,
        };
        (frame, output.platform_output.cursor_icon)
    }

    /// Keep texture updates of a frame that was not drawn.
    pub fn defer_textures(&mut self, delta: TexturesDelta) {
        let mut pending = std::mem::take(&mut self.deferred_textures);
        pending.append(delta);
        self.deferred_textures = pending;
    }

    pub fn has_deferred_textures(&self) -> bool {
        !self.deferred_textures.set.is_empty() || !self.deferred_textures.free.is_empty()
    }
}

pub fn install_fonts(ctx: &Context, fonts: &FontSettings) {
    if let Some(bytes) = &fonts.bytes {
        let mut definitions = FontDefinitions::default();
        definitions.font_data.insert(
            CUSTOM_FONT_NAME.to_owned(),
            FontData::from_owned(bytes.clone()),
        );
        for family in [FontFamily::Proportional, FontFamily::Monospace] {
            definitions
                .families
                .entry(family)
                .or_default()
                .insert(0, CUSTOM_FONT_NAME.to_owned());
        }
        ctx.set_fonts(definitions);
        tracing::debug!(bytes = bytes.len(), "custom font installed");
    }

    let size = fonts.size;
    let mut style = (*ctx.style()).clone();
    for (text_style, font_id) in style.text_styles.iter_mut() {
        font_id.size = match text_style {
            TextStyle::Heading => size * 1.25,
            TextStyle::Small => size * 0.75,
            _ => size,
        };
    }
    ctx.set_style(style);
}

/// Tightly packed RGBA8 rows of an egui image, premultiplied as egui
/// produces them.
pub fn image_rgba8(image: &ImageData) -> Vec<u8> {
    match image {
        ImageData::Color(image) => image.pixels.iter().flat_map(|c| c.to_array()).collect(),
        ImageData::Font(image) => image.srgba_pixels(None).flat_map(|c| c.to_array()).collect(),
    }
}

fn sanitize_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}
