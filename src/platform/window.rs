//! Native overlay window: class registration, creation, the window
//! procedure and the message pump.

use crate::overlay::geometry::{
    compute_window_placement, dpi_to_scale, ScreenRect, WindowPlacement, BASE_DPI,
};
use crate::overlay::shell::{ShellEvent, ShellResponse};
use crate::overlay::transparency::OverlaySurface;
use crate::overlay::OverlayShared;
use crate::platform::input;
use std::ffi::c_void;
use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::{
    COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM,
};
use windows::Win32::Graphics::Dwm::{
    DwmEnableBlurBehindWindow, DWM_BB_BLURREGION, DWM_BB_ENABLE, DWM_BLURBEHIND,
};
use windows::Win32::Graphics::Gdi::{
    CreateRectRgn, DeleteObject, MonitorFromPoint, UpdateWindow, MONITOR_DEFAULTTOPRIMARY,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::HiDpi::{
    GetDpiForMonitor, SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    MDT_EFFECTIVE_DPI,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetCursorPos,
    GetSystemMetrics, GetWindowLongPtrW, GetWindowRect, PeekMessageW, PostQuitMessage,
    RegisterClassExW, SetLayeredWindowAttributes, SetWindowLongPtrW, SetWindowPos, ShowWindow,
    TranslateMessage, UnregisterClassW, CREATESTRUCTW, CS_CLASSDC, GWLP_USERDATA, GWL_EXSTYLE,
    HTTRANSPARENT, HWND_TOPMOST, LWA_ALPHA, MSG, PM_REMOVE, SC_KEYMENU, SIZE_MINIMIZED,
    SM_CXSCREEN, SM_CYSCREEN, SWP_NOMOVE, SWP_NOSIZE, SW_SHOWDEFAULT, WINDOWPOS,
    WINDOW_EX_STYLE, WM_DESTROY, WM_NCCREATE, WM_NCDESTROY, WM_NCHITTEST, WM_QUIT, WM_SIZE,
    WM_SYSCOMMAND, WM_WINDOWPOSCHANGING, WNDCLASSEXW, WS_EX_LAYERED, WS_EX_TRANSPARENT,
    WS_POPUP,
};

pub const OVERLAY_CLASS_NAME: &str = "OverlayHostWindow";
const FULL_OPACITY: u8 = 255;

fn widestring(value: &str) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    std::ffi::OsStr::new(value)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

#[inline]
pub(crate) fn loword(value: isize) -> u32 {
    (value as usize & 0xffff) as u32
}

#[inline]
pub(crate) fn hiword(value: isize) -> u32 {
    ((value as usize >> 16) & 0xffff) as u32
}

#[inline]
pub(crate) fn signed_point(lparam: LPARAM) -> (i32, i32) {
    (
        (lparam.0 & 0xffff) as i16 as i32,
        ((lparam.0 >> 16) & 0xffff) as i16 as i32,
    )
}

/// Pass-through adds `WS_EX_TRANSPARENT`; both states keep `WS_EX_LAYERED`.
pub fn overlay_ex_style(click_through: bool) -> WINDOW_EX_STYLE {
    if click_through {
        WS_EX_TRANSPARENT | WS_EX_LAYERED
    } else {
        WS_EX_LAYERED
    }
}

pub fn enable_dpi_awareness() {
    if let Err(err) =
        unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) }
    {
        // Already set by a manifest or an earlier call.
        tracing::debug!(?err, "per-monitor DPI awareness not applied");
    }
}

pub fn primary_screen_size() -> (i32, i32) {
    unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) }
}

pub fn primary_monitor_scale() -> f32 {
    let monitor = unsafe { MonitorFromPoint(POINT { x: 0, y: 0 }, MONITOR_DEFAULTTOPRIMARY) };
    let mut dpi_x = BASE_DPI;
    let mut dpi_y = BASE_DPI;
    match unsafe { GetDpiForMonitor(monitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y) } {
        Ok(()) => dpi_to_scale(dpi_x),
        Err(err) => {
            tracing::warn!(?err, "failed to query primary monitor DPI; assuming 96");
            1.0
        }
    }
}

/// Registered window class, unregistered on drop.
pub struct WindowClass {
    name: Vec<u16>,
    hinstance: HINSTANCE,
}

impl WindowClass {
    pub fn register(name: &str) -> windows::core::Result<Self> {
        let hinstance: HINSTANCE = unsafe { GetModuleHandleW(PCWSTR::null()) }?.into();
        let name = widestring(name);
        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_CLASSDC,
            lpfnWndProc: Some(overlay_wndproc),
            hInstance: hinstance,
            lpszClassName: PCWSTR(name.as_ptr()),
            ..Default::default()
        };
        if unsafe { RegisterClassExW(&wc) } == 0 {
            return Err(windows::core::Error::from_win32());
        }
        Ok(Self { name, hinstance })
    }

    pub fn name(&self) -> PCWSTR {
        PCWSTR(self.name.as_ptr())
    }

    pub fn hinstance(&self) -> HINSTANCE {
        self.hinstance
    }
}

impl Drop for WindowClass {
    fn drop(&mut self) {
        if let Err(err) = unsafe { UnregisterClassW(self.name(), self.hinstance) } {
            tracing::warn!(?err, "failed to unregister overlay window class");
        }
    }
}

/// The overlay window. Owns the state its window procedure reads through
/// `GWLP_USERDATA`; destroyed on drop unless the system already did.
pub struct NativeWindow {
    hwnd: HWND,
    placement: WindowPlacement,
    dpi_scale: f32,
    shared: Box<OverlayShared>,
}

impl NativeWindow {
    pub fn create(
        class: &WindowClass,
        title: &str,
        requested: (i32, i32),
    ) -> windows::core::Result<Self> {
        let dpi_scale = primary_monitor_scale();
        let placement = compute_window_placement(requested, dpi_scale, primary_screen_size());
        let shared = Box::new(OverlayShared::new(dpi_scale));
        let title = HSTRING::from(title);

        let hwnd = unsafe {
            CreateWindowExW(
                overlay_ex_style(true),
                class.name(),
                &title,
                WS_POPUP,
                placement.x,
                placement.y,
                placement.width,
                placement.height,
                None,
                None,
                class.hinstance(),
                Some(&*shared as *const OverlayShared as *const c_void),
            )
        }?;
        let window = Self {
            hwnd,
            placement,
            dpi_scale,
            shared,
        };

        unsafe {
            SetLayeredWindowAttributes(hwnd, COLORREF(0), FULL_OPACITY, LWA_ALPHA)?;
            SetWindowPos(hwnd, HWND_TOPMOST, 0, 0, 0, 0, SWP_NOMOVE | SWP_NOSIZE)?;
        }
        tracing::debug!(?placement, dpi_scale, "overlay window created");
        Ok(window)
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    pub fn shared(&self) -> &OverlayShared {
        &self.shared
    }

    pub fn dpi_scale(&self) -> f32 {
        self.dpi_scale
    }

    pub fn client_size(&self) -> (u32, u32) {
        (
            self.placement.width.max(0) as u32,
            self.placement.height.max(0) as u32,
        )
    }

    /// Let DWM blend the back buffer's alpha with the desktop.
    pub fn enable_alpha_compositing(&self) {
        unsafe {
            let region = CreateRectRgn(0, 0, -1, -1);
            let blur_behind = DWM_BLURBEHIND {
                dwFlags: DWM_BB_ENABLE | DWM_BB_BLURREGION,
                fEnable: true.into(),
                hRgnBlur: region,
                fTransitionOnMaximized: false.into(),
            };
            if let Err(err) = DwmEnableBlurBehindWindow(self.hwnd, &blur_behind) {
                tracing::warn!(?err, "failed to enable alpha compositing");
            }
            let _ = DeleteObject(region);
        }
    }

    pub fn show(&self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOWDEFAULT);
            let _ = UpdateWindow(self.hwnd);
        }
    }

    /// Drain the message queue without blocking. Returns `true` once a quit
    /// message has been seen.
    pub fn pump_messages(&self) -> bool {
        let mut msg = MSG::default();
        unsafe {
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).into() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
                if msg.message == WM_QUIT {
                    self.shared.shell.request_quit();
                }
            }
        }
        self.shared.shell.quit_requested()
    }
}

impl OverlaySurface for NativeWindow {
    fn cursor_position(&self) -> Option<(i32, i32)> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }.ok()?;
        Some((point.x, point.y))
    }

    fn window_rect(&self) -> Option<ScreenRect> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(self.hwnd, &mut rect) }.ok()?;
        Some(ScreenRect {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        })
    }

    fn apply_click_through(&self, click_through: bool) {
        unsafe {
            SetWindowLongPtrW(
                self.hwnd,
                GWL_EXSTYLE,
                overlay_ex_style(click_through).0 as isize,
            );
            if let Err(err) =
                SetLayeredWindowAttributes(self.hwnd, COLORREF(0), FULL_OPACITY, LWA_ALPHA)
            {
                tracing::warn!(?err, "failed to reassert overlay opacity");
            }
        }
    }
}

impl Drop for NativeWindow {
    fn drop(&mut self) {
        if !self.shared.shell.is_destroyed() {
            if let Err(err) = unsafe { DestroyWindow(self.hwnd) } {
                tracing::warn!(?err, "failed to destroy overlay window");
            }
        }
    }
}

/// Map the messages the shell state machine handles; everything else is
/// `None` and goes to the default procedure.
pub fn decode_shell_event(msg: u32, wparam: WPARAM, lparam: LPARAM) -> Option<ShellEvent> {
    match msg {
        WM_SIZE => Some(ShellEvent::Resized {
            minimized: wparam.0 as u32 == SIZE_MINIMIZED as u32,
            width: loword(lparam.0),
            height: hiword(lparam.0),
        }),
        WM_SYSCOMMAND if (wparam.0 & 0xfff0) as u32 == SC_KEYMENU as u32 => {
            Some(ShellEvent::KeyMenu)
        }
        WM_NCHITTEST => Some(ShellEvent::HitTest),
        WM_WINDOWPOSCHANGING => Some(ShellEvent::PositionChanging),
        WM_DESTROY => Some(ShellEvent::Destroy),
        _ => None,
    }
}

unsafe extern "system" fn overlay_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let shared_ptr = if msg == WM_NCCREATE {
        let create = unsafe { &*(lparam.0 as *const CREATESTRUCTW) };
        let ptr = create.lpCreateParams as *const OverlayShared;
        unsafe { SetWindowLongPtrW(hwnd, GWLP_USERDATA, ptr as isize) };
        ptr
    } else {
        unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const OverlayShared }
    };
    if shared_ptr.is_null() {
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    }
    if msg == WM_NCDESTROY {
        unsafe { SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0) };
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    }

    // Owned by the `NativeWindow`, which outlives the window itself.
    let shared = unsafe { &*shared_ptr };
    if input::handle_message(&shared.input, hwnd, msg, wparam, lparam) {
        return LRESULT(1);
    }

    let Some(event) = decode_shell_event(msg, wparam, lparam) else {
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    };
    match shared.shell.handle_event(event) {
        ShellResponse::Return(value) => LRESULT(value),
        ShellResponse::HitTransparent => LRESULT(HTTRANSPARENT as i32 as isize),
        ShellResponse::ForceTopmost => {
            let pos = lparam.0 as *mut WINDOWPOS;
            if !pos.is_null() {
                unsafe { (*pos).hwndInsertAfter = HWND_TOPMOST };
            }
            unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
        }
        ShellResponse::PostQuit => {
            unsafe { PostQuitMessage(0) };
            LRESULT(0)
        }
        ShellResponse::Default => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

#[cfg(test)]
mod windows_tests {
    use super::*;
    use windows::Win32::UI::WindowsAndMessaging::{SC_CLOSE, SIZE_RESTORED, WM_PAINT};

    fn size_lparam(width: u32, height: u32) -> LPARAM {
        LPARAM(((height << 16) | width) as isize)
    }

    #[test]
    fn ex_style_toggles_only_the_transparent_bit() {
        let pass_through = overlay_ex_style(true);
        let interactive = overlay_ex_style(false);
        assert_ne!(pass_through.0 & WS_EX_TRANSPARENT.0, 0);
        assert_ne!(pass_through.0 & WS_EX_LAYERED.0, 0);
        assert_eq!(interactive.0 & WS_EX_TRANSPARENT.0, 0);
        assert_ne!(interactive.0 & WS_EX_LAYERED.0, 0);
    }

    #[test]
    fn size_messages_decode_dimensions_and_minimize() {
        assert_eq!(
            decode_shell_event(WM_SIZE, WPARAM(SIZE_RESTORED as usize), size_lparam(1200, 900)),
            Some(ShellEvent::Resized {
                minimized: false,
                width: 1200,
                height: 900,
            })
        );
        assert_eq!(
            decode_shell_event(WM_SIZE, WPARAM(SIZE_MINIMIZED as usize), size_lparam(0, 0)),
            Some(ShellEvent::Resized {
                minimized: true,
                width: 0,
                height: 0,
            })
        );
    }

    #[test]
    fn only_key_menu_system_commands_are_decoded() {
        assert_eq!(
            decode_shell_event(WM_SYSCOMMAND, WPARAM(SC_KEYMENU as usize | 0x3), LPARAM(0)),
            Some(ShellEvent::KeyMenu)
        );
        assert_eq!(
            decode_shell_event(WM_SYSCOMMAND, WPARAM(SC_CLOSE as usize), LPARAM(0)),
            None
        );
        assert_eq!(decode_shell_event(WM_PAINT, WPARAM(0), LPARAM(0)), None);
    }

    #[test]
    fn signed_points_keep_negative_coordinates() {
        let lparam = LPARAM(((0xfff6u32 << 16) | 0xffecu32) as isize);
        assert_eq!(signed_point(lparam), (-20, -10));
    }
}
