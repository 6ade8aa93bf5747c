//! Win32 messages to egui input events.

use crate::overlay::ui_host::InputQueue;
use crate::platform::window::{hiword, loword, signed_point};
use egui::{CursorIcon, Event, Key, Modifiers, PointerButton, Vec2};
use std::cell::RefCell;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetCapture, GetKeyState, ReleaseCapture, SetCapture, TrackMouseEvent, TME_LEAVE,
    TRACKMOUSEEVENT, VIRTUAL_KEY, VK_BACK, VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE,
    VK_F1, VK_F10, VK_F11, VK_F12, VK_F2, VK_F3, VK_F4, VK_F5, VK_F6, VK_F7, VK_F8, VK_F9,
    VK_HOME, VK_INSERT, VK_LEFT, VK_MENU, VK_NEXT, VK_OEM_MINUS, VK_PRIOR, VK_RETURN, VK_RIGHT,
    VK_SHIFT, VK_SPACE, VK_SUBTRACT, VK_TAB, VK_UP,
};
use windows::Win32::UI::WindowsAndMessaging::{
    LoadCursorW, SetCursor, HCURSOR, HTCLIENT, IDC_APPSTARTING, IDC_ARROW, IDC_CROSS, IDC_HAND,
    IDC_HELP, IDC_IBEAM, IDC_NO, IDC_SIZEALL, IDC_SIZENESW, IDC_SIZENS, IDC_SIZENWSE,
    IDC_SIZEWE, IDC_WAIT, WHEEL_DELTA, WM_CHAR, WM_KEYDOWN, WM_KEYUP, WM_KILLFOCUS,
    WM_LBUTTONDBLCLK, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDBLCLK, WM_MBUTTONDOWN,
    WM_MBUTTONUP, WM_MOUSEHWHEEL, WM_MOUSELEAVE, WM_MOUSEMOVE, WM_MOUSEWHEEL,
    WM_RBUTTONDBLCLK, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SETCURSOR, WM_SETFOCUS,
    WM_SYSKEYDOWN, WM_SYSKEYUP,
};

/// Points scrolled per wheel notch.
const POINTS_PER_WHEEL_LINE: f32 = 50.0;
const KEY_REPEAT_BIT: isize = 1 << 30;

const DIGIT_KEYS: [Key; 10] = [
    Key::Num0,
    Key::Num1,
    Key::Num2,
    Key::Num3,
    Key::Num4,
    Key::Num5,
    Key::Num6,
    Key::Num7,
    Key::Num8,
    Key::Num9,
];

const LETTER_KEYS: [Key; 26] = [
    Key::A,
    Key::B,
    Key::C,
    Key::D,
    Key::E,
    Key::F,
    Key::G,
    Key::H,
    Key::I,
    Key::J,
    Key::K,
    Key::L,
    Key::M,
    Key::N,
    Key::O,
    Key::P,
    Key::Q,
    Key::R,
    Key::S,
    Key::T,
    Key::U,
    Key::V,
    Key::W,
    Key::X,
    Key::Y,
    Key::Z,
];

const NUMPAD0: u16 = 0x60;

/// Offer a window message to the UI input queue. Returns `true` only when
/// the message was fully handled and must not reach the default procedure.
pub fn handle_message(
    input: &RefCell<InputQueue>,
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> bool {
    let Ok(mut queue) = input.try_borrow_mut() else {
        return false;
    };
    match msg {
        WM_MOUSEMOVE => {
            if !queue.is_pointer_tracked() {
                let mut track = TRACKMOUSEEVENT {
                    cbSize: std::mem::size_of::<TRACKMOUSEEVENT>() as u32,
                    dwFlags: TME_LEAVE,
                    hwndTrack: hwnd,
                    dwHoverTime: 0,
                };
                if unsafe { TrackMouseEvent(&mut track) }.is_ok() {
                    queue.set_pointer_tracked(true);
                }
            }
            queue.pointer_moved(signed_point(lparam));
            false
        }
        WM_MOUSELEAVE => {
            queue.pointer_left();
            false
        }
        WM_LBUTTONDOWN | WM_LBUTTONDBLCLK | WM_RBUTTONDOWN | WM_RBUTTONDBLCLK
        | WM_MBUTTONDOWN | WM_MBUTTONDBLCLK => {
            if let Some(button) = pointer_button(msg) {
                unsafe { SetCapture(hwnd) };
                push_button(&mut queue, button, true, lparam);
            }
            false
        }
        WM_LBUTTONUP | WM_RBUTTONUP | WM_MBUTTONUP => {
            if let Some(button) = pointer_button(msg) {
                push_button(&mut queue, button, false, lparam);
                if unsafe { GetCapture() } == hwnd {
                    let _ = unsafe { ReleaseCapture() };
                }
            }
            false
        }
        WM_MOUSEWHEEL | WM_MOUSEHWHEEL => {
            queue.push(Event::Scroll(wheel_delta(msg, wparam)));
            false
        }
        WM_KEYDOWN | WM_SYSKEYDOWN | WM_KEYUP | WM_SYSKEYUP => {
            let modifiers = current_modifiers();
            queue.set_modifiers(modifiers);
            let pressed = matches!(msg, WM_KEYDOWN | WM_SYSKEYDOWN);
            if let Some(key) = key_from_vk(wparam.0 as u16) {
                queue.push(Event::Key {
                    key,
                    physical_key: Some(key),
                    pressed,
                    repeat: pressed && lparam.0 & KEY_REPEAT_BIT != 0,
                    modifiers,
                });
            }
            false
        }
        WM_CHAR => {
            queue.push_utf16(wparam.0 as u16);
            false
        }
        WM_SETFOCUS => {
            queue.set_focused(true);
            false
        }
        WM_KILLFOCUS => {
            queue.set_focused(false);
            queue.set_modifiers(Modifiers::default());
            false
        }
        WM_SETCURSOR if loword(lparam.0) == HTCLIENT as u32 => {
            apply_cursor(queue.cursor_icon());
            true
        }
        _ => false,
    }
}

fn push_button(queue: &mut InputQueue, button: PointerButton, pressed: bool, lparam: LPARAM) {
    let pos = queue.to_points(signed_point(lparam));
    let modifiers = queue.modifiers();
    queue.push(Event::PointerButton {
        pos,
        button,
        pressed,
        modifiers,
    });
}

pub fn pointer_button(msg: u32) -> Option<PointerButton> {
    match msg {
        WM_LBUTTONDOWN | WM_LBUTTONDBLCLK | WM_LBUTTONUP => Some(PointerButton::Primary),
        WM_RBUTTONDOWN | WM_RBUTTONDBLCLK | WM_RBUTTONUP => Some(PointerButton::Secondary),
        WM_MBUTTONDOWN | WM_MBUTTONDBLCLK | WM_MBUTTONUP => Some(PointerButton::Middle),
        _ => None,
    }
}

/// Scroll in points for a wheel message. Horizontal wheel input is
/// negated so rightward wheel motion scrolls content to the left.
pub fn wheel_delta(msg: u32, wparam: WPARAM) -> Vec2 {
    let notches = hiword(wparam.0 as isize) as u16 as i16 as f32 / WHEEL_DELTA as f32;
    let points = notches * POINTS_PER_WHEEL_LINE;
    if msg == WM_MOUSEHWHEEL {
        Vec2::new(-points, 0.0)
    } else {
        Vec2::new(0.0, points)
    }
}

fn key_down(vk: VIRTUAL_KEY) -> bool {
    (unsafe { GetKeyState(vk.0 as i32) } as u16 & 0x8000) != 0
}

fn current_modifiers() -> Modifiers {
    let ctrl = key_down(VK_CONTROL);
    Modifiers {
        alt: key_down(VK_MENU),
        ctrl,
        shift: key_down(VK_SHIFT),
        mac_cmd: false,
        command: ctrl,
    }
}

pub fn key_from_vk(vk: u16) -> Option<Key> {
    match vk {
        0x30..=0x39 => return Some(DIGIT_KEYS[usize::from(vk - 0x30)]),
        0x41..=0x5A => return Some(LETTER_KEYS[usize::from(vk - 0x41)]),
        NUMPAD0..=0x69 => return Some(DIGIT_KEYS[usize::from(vk - NUMPAD0)]),
        _ => {}
    }
    let key = match VIRTUAL_KEY(vk) {
        VK_LEFT => Key::ArrowLeft,
        VK_RIGHT => Key::ArrowRight,
        VK_UP => Key::ArrowUp,
        VK_DOWN => Key::ArrowDown,
        VK_ESCAPE => Key::Escape,
        VK_TAB => Key::Tab,
        VK_BACK => Key::Backspace,
        VK_RETURN => Key::Enter,
        VK_SPACE => Key::Space,
        VK_INSERT => Key::Insert,
        VK_DELETE => Key::Delete,
        VK_HOME => Key::Home,
        VK_END => Key::End,
        VK_PRIOR => Key::PageUp,
        VK_NEXT => Key::PageDown,
        VK_OEM_MINUS | VK_SUBTRACT => Key::Minus,
        VK_F1 => Key::F1,
        VK_F2 => Key::F2,
        VK_F3 => Key::F3,
        VK_F4 => Key::F4,
        VK_F5 => Key::F5,
        VK_F6 => Key::F6,
        VK_F7 => Key::F7,
        VK_F8 => Key::F8,
        VK_F9 => Key::F9,
        VK_F10 => Key::F10,
        VK_F11 => Key::F11,
        VK_F12 => Key::F12,
        _ => return None,
    };
    Some(key)
}

/// System cursor for an egui cursor icon; `None` hides the cursor.
pub fn cursor_resource(icon: CursorIcon) -> Option<PCWSTR> {
    let id = match icon {
        CursorIcon::None => return None,
        CursorIcon::PointingHand => IDC_HAND,
        CursorIcon::Text | CursorIcon::VerticalText => IDC_IBEAM,
        CursorIcon::ResizeHorizontal
        | CursorIcon::ResizeEast
        | CursorIcon::ResizeWest
        | CursorIcon::ResizeColumn => IDC_SIZEWE,
        CursorIcon::ResizeVertical
        | CursorIcon::ResizeNorth
        | CursorIcon::ResizeSouth
        | CursorIcon::ResizeRow => IDC_SIZENS,
        CursorIcon::ResizeNeSw | CursorIcon::ResizeNorthEast | CursorIcon::ResizeSouthWest => {
            IDC_SIZENESW
        }
        CursorIcon::ResizeNwSe | CursorIcon::ResizeNorthWest | CursorIcon::ResizeSouthEast => {
            IDC_SIZENWSE
        }
        CursorIcon::Move | CursorIcon::AllScroll | CursorIcon::Grab | CursorIcon::Grabbing => {
            IDC_SIZEALL
        }
        CursorIcon::NotAllowed | CursorIcon::NoDrop => IDC_NO,
        CursorIcon::Wait => IDC_WAIT,
        CursorIcon::Progress => IDC_APPSTARTING,
        CursorIcon::Help => IDC_HELP,
        CursorIcon::Crosshair => IDC_CROSS,
        _ => IDC_ARROW,
    };
    Some(id)
}

fn apply_cursor(icon: CursorIcon) {
    let cursor = match cursor_resource(icon) {
        Some(id) => match unsafe { LoadCursorW(None, id) } {
            Ok(cursor) => cursor,
            Err(err) => {
                tracing::debug!(?err, ?icon, "failed to load system cursor");
                return;
            }
        },
        None => HCURSOR::default(),
    };
    unsafe { SetCursor(cursor) };
}

#[cfg(test)]
mod windows_tests {
    use super::*;

    #[test]
    fn letters_digits_and_numpad_map_to_keys() {
        assert_eq!(key_from_vk(0x41), Some(Key::A));
        assert_eq!(key_from_vk(0x5A), Some(Key::Z));
        assert_eq!(key_from_vk(0x30), Some(Key::Num0));
        assert_eq!(key_from_vk(0x69), Some(Key::Num9));
        assert_eq!(key_from_vk(VK_ESCAPE.0), Some(Key::Escape));
        assert_eq!(key_from_vk(VK_SHIFT.0), None);
    }

    #[test]
    fn wheel_notches_scale_to_points() {
        let up = WPARAM((WHEEL_DELTA as usize) << 16);
        assert_eq!(wheel_delta(WM_MOUSEWHEEL, up), Vec2::new(0.0, 50.0));

        let down = WPARAM(((-(WHEEL_DELTA as i32) as u16 as usize) << 16) as usize);
        assert_eq!(wheel_delta(WM_MOUSEWHEEL, down), Vec2::new(0.0, -50.0));

        assert_eq!(wheel_delta(WM_MOUSEHWHEEL, up), Vec2::new(-50.0, 0.0));
    }

    #[test]
    fn button_messages_map_to_pointer_buttons() {
        assert_eq!(pointer_button(WM_LBUTTONDBLCLK), Some(PointerButton::Primary));
        assert_eq!(pointer_button(WM_RBUTTONUP), Some(PointerButton::Secondary));
        assert_eq!(pointer_button(WM_MBUTTONDOWN), Some(PointerButton::Middle));
        assert_eq!(pointer_button(WM_MOUSEMOVE), None);
    }

    #[test]
    fn cursor_icons_pick_system_cursors() {
        assert_eq!(cursor_resource(CursorIcon::None), None);
        assert_eq!(cursor_resource(CursorIcon::Default), Some(IDC_ARROW));
        assert_eq!(cursor_resource(CursorIcon::Text), Some(IDC_IBEAM));
        assert_eq!(cursor_resource(CursorIcon::ResizeEast), Some(IDC_SIZEWE));
    }

    #[test]
    fn messages_queue_ui_events_without_consuming_them() {
        let input = RefCell::new(InputQueue::new(1.0));
        let handled = handle_message(&input, HWND::default(), WM_CHAR, WPARAM('x' as usize), LPARAM(0));
        assert!(!handled);
        assert_eq!(
            input.borrow().pending_events(),
            &[Event::Text("x".to_owned())]
        );
    }
}
