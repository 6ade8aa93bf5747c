use overlay_host::overlay::content::drawer_panel;
use overlay_host::overlay::device::{DeviceResources, PresentStatus};
use overlay_host::overlay::geometry::ScreenRect;
use overlay_host::overlay::{
    EguiHost, FontSettings, FrameDriver, FrameInfo, FrameOutcome, OverlayShared, OverlaySurface,
    ShellEvent, TransparencyController,
};
use std::cell::Cell;
use std::time::Duration;

use mock_backend::{MockBackend, MockHandles};

fn driver(backend: MockBackend) -> (FrameDriver<MockBackend>, MockHandles) {
    let handles = backend.handles();
    let resources = DeviceResources::create(backend).unwrap();
    let host = EguiHost::new((800, 600), &FontSettings::default());
    let driver = FrameDriver::new(resources, host, [0.0; 4]).with_occluded_sleep(Duration::ZERO);
    handles.clear();
    (driver, handles)
}

#[test]
fn frame_runs_content_then_draws_and_presents() {
    let (mut driver, handles) = driver(MockBackend::new());
    let shared = OverlayShared::new(1.0);
    let mut seen: Vec<FrameInfo> = Vec::new();

    let outcome = driver.render_frame(&shared, &mut |ctx, info| {
        seen.push(*info);
        drawer_panel(ctx, info);
    });

    assert_eq!(outcome, FrameOutcome::Presented);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].frame_index, 0);
    assert_eq!(seen[0].window_size, (800, 600));
    let entries = handles.entries();
    assert_eq!(entries[0], "prepare");
    assert!(entries[1].starts_with("draw view=1 textures="));
    assert_ne!(entries[1], "draw view=1 textures=0");
    assert_eq!(entries[2], "present");
    assert_eq!(driver.frame_index(), 1);
}

#[test]
fn pending_resize_is_applied_before_the_ui_frame() {
    let (mut driver, handles) = driver(MockBackend::new());
    let shared = OverlayShared::new(1.0);
    shared.shell.handle_event(ShellEvent::Resized {
        minimized: false,
        width: 1024,
        height: 768,
    });

    let mut size = None;
    driver.render_frame(&shared, &mut |_, info| size = Some(info.window_size));

    assert_eq!(size, Some((1024, 768)));
    assert_eq!(shared.shell.take_pending_resize(), None);
    let entries = handles.entries();
    assert_eq!(
        &entries[..4],
        &["drop view 1", "resize 1024x768 views=0", "create_view 2", "prepare"]
    );
}

#[test]
fn frame_without_view_is_skipped_and_keeps_texture_uploads() {
    let (mut driver, handles) = driver(MockBackend::new());
    let shared = OverlayShared::new(1.0);
    driver.resources_mut().release_render_target();

    let outcome = driver.render_frame(&shared, &mut |ctx, info| drawer_panel(ctx, info));

    assert_eq!(outcome, FrameOutcome::Skipped);
    assert_eq!(handles.count("present"), 0);
    assert_eq!(handles.count("draw"), 0);
    assert!(driver.host().has_deferred_textures());

    assert!(driver.resources_mut().build_render_target());
    handles.clear();
    let outcome = driver.render_frame(&shared, &mut |ctx, info| drawer_panel(ctx, info));

    assert_eq!(outcome, FrameOutcome::Presented);
    assert!(!driver.host().has_deferred_textures());
    let draw = handles
        .entries()
        .into_iter()
        .find(|entry| entry.starts_with("draw"))
        .unwrap();
    assert_ne!(draw, "draw view=2 textures=0");
}

#[test]
fn failed_draw_skips_present() {
    let (mut driver, handles) = driver(MockBackend::new());
    let shared = OverlayShared::new(1.0);
    driver.resources_mut().backend_mut().fail_draw = true;

    let outcome = driver.render_frame(&shared, &mut |_, _| {});

    assert_eq!(outcome, FrameOutcome::Skipped);
    assert_eq!(handles.count("present"), 0);
}

#[test]
fn occluded_window_sleeps_until_visible_again() {
    let (mut driver, handles) = driver(MockBackend::new());
    let shared = OverlayShared::new(1.0);
    {
        let backend = driver.resources_mut().backend_mut();
        backend.present_results.push_back(PresentStatus::Occluded);
        backend.test_present_results.push_back(PresentStatus::Occluded);
        backend.test_present_results.push_back(PresentStatus::Presented);
    }

    assert_eq!(driver.render_frame(&shared, &mut |_, _| {}), FrameOutcome::Presented);
    assert!(driver.is_occluded());

    handles.clear();
    let mut ran = 0;
    assert_eq!(
        driver.render_frame(&shared, &mut |_, _| ran += 1),
        FrameOutcome::Occluded
    );
    assert_eq!(ran, 0);
    assert_eq!(handles.entries(), vec!["test_present"]);

    handles.clear();
    assert_eq!(
        driver.render_frame(&shared, &mut |_, _| ran += 1),
        FrameOutcome::Presented
    );
    assert_eq!(ran, 1);
    assert!(!driver.is_occluded());
    assert_eq!(handles.entries()[0], "test_present");
    assert_eq!(handles.count("present"), 1);
}

#[test]
fn failed_present_is_reported() {
    let (mut driver, _handles) = driver(MockBackend::new());
    let shared = OverlayShared::new(1.0);
    driver
        .resources_mut()
        .backend_mut()
        .present_results
        .push_back(PresentStatus::Failed);

    assert_eq!(
        driver.render_frame(&shared, &mut |_, _| {}),
        FrameOutcome::PresentFailed
    );
    assert!(!driver.is_occluded());
}

struct MovingCursor {
    cursor: Cell<(i32, i32)>,
}

impl OverlaySurface for MovingCursor {
    fn cursor_position(&self) -> Option<(i32, i32)> {
        let (x, y) = self.cursor.get();
        self.cursor.set((x + 1, y));
        Some((x, y))
    }

    fn window_rect(&self) -> Option<ScreenRect> {
        Some(ScreenRect::from_xywh(0, 0, 800, 600))
    }

    fn apply_click_through(&self, _click_through: bool) {}
}

#[test]
fn input_does_not_pile_up_while_occluded() {
    let (mut driver, handles) = driver(MockBackend::new());
    let shared = OverlayShared::new(1.0);
    let surface = MovingCursor {
        cursor: Cell::new((10, 10)),
    };
    let mut controller = TransparencyController::new();
    {
        let backend = driver.resources_mut().backend_mut();
        backend.present_results.push_back(PresentStatus::Occluded);
        backend
            .test_present_results
            .extend(std::iter::repeat(PresentStatus::Occluded).take(1000));
    }
    driver.render_frame(&shared, &mut |_, _| {});

    for _ in 0..1000 {
        assert_eq!(
            driver.render_frame(&shared, &mut |_, _| {}),
            FrameOutcome::Occluded
        );
        shared.input.borrow_mut().set_focused(true);
        controller.update(&surface, driver.context(), &shared);
        assert!(shared.input.borrow().pending_events().len() <= 2);
    }

    handles.clear();
    let mut events_seen = None;
    assert_eq!(
        driver.render_frame(&shared, &mut |ctx, _| {
            events_seen = Some(ctx.input(|input| input.raw.events.len()))
        }),
        FrameOutcome::Presented
    );
    assert_eq!(events_seen, Some(2));
}

#[test]
fn pipeline_failure_skips_frames_without_retrying() {
    let mut backend = MockBackend::new();
    backend.fail_prepare = true;
    let (mut driver, handles) = driver(backend);
    let shared = OverlayShared::new(1.0);

    for _ in 0..5 {
        assert_eq!(
            driver.render_frame(&shared, &mut |_, _| {}),
            FrameOutcome::Skipped
        );
    }

    assert!(driver.resources().is_pipeline_failed());
    assert_eq!(handles.count("prepare"), 1);
    assert_eq!(handles.count("draw"), 0);
    assert_eq!(handles.count("present"), 0);
}
