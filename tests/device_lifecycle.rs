use overlay_host::overlay::device::{
    BackendError, DeviceError, DeviceResources, DrawOutcome, DriverTier, PresentStatus,
};
use overlay_host::overlay::PaintFrame;

use mock_backend::MockBackend;

#[test]
fn hardware_device_builds_a_view() {
    let backend = MockBackend::new();
    let handles = backend.handles();
    let resources = DeviceResources::create(backend).unwrap();

    assert_eq!(resources.driver_tier(), DriverTier::Hardware);
    assert!(resources.is_alive());
    assert!(resources.has_render_target());
    assert_eq!(handles.entries(), vec!["create_device Hardware", "create_view 1"]);
}

#[test]
fn unsupported_hardware_falls_back_to_warp_once() {
    let backend = MockBackend::new().with_device_results(vec![Err(BackendError::Unsupported)]);
    let handles = backend.handles();
    let resources = DeviceResources::create(backend).unwrap();

    assert_eq!(resources.driver_tier(), DriverTier::Warp);
    assert_eq!(
        handles.entries(),
        vec!["create_device Hardware", "create_device Warp", "create_view 1"]
    );
}

#[test]
fn failing_fallback_reports_both_errors() {
    let backend = MockBackend::new().with_device_results(vec![
        Err(BackendError::Unsupported),
        Err(BackendError::failed("device creation", "no adapter")),
        Err(BackendError::failed("device creation", "never reached")),
    ]);
    let handles = backend.handles();
    let err = DeviceResources::create(backend).err().unwrap();

    assert_eq!(
        err,
        DeviceError::Creation {
            hardware: BackendError::Unsupported,
            fallback: Some(BackendError::failed("device creation", "no adapter")),
        }
    );
    assert_eq!(handles.count("create_device"), 2);
    assert_eq!(handles.count("create_view"), 0);
}

#[test]
fn other_hardware_errors_do_not_retry() {
    let backend = MockBackend::new()
        .with_device_results(vec![Err(BackendError::failed("device creation", "lost"))]);
    let handles = backend.handles();
    let err = DeviceResources::create(backend).err().unwrap();

    assert!(matches!(err, DeviceError::Creation { fallback: None, .. }));
    assert_eq!(handles.entries(), vec!["create_device Hardware"]);
}

#[test]
fn view_failure_leaves_device_usable_but_skips_drawing() {
    let mut backend = MockBackend::new();
    backend.fail_render_target = true;
    let mut resources = DeviceResources::create(backend).unwrap();

    assert!(resources.is_alive());
    assert!(!resources.has_render_target());
    assert_eq!(
        resources.draw([0.0; 4], &PaintFrame::default()),
        DrawOutcome::NoRenderTarget
    );

    resources.backend_mut().fail_render_target = false;
    assert!(resources.build_render_target());
    assert_eq!(
        resources.draw([0.0; 4], &PaintFrame::default()),
        DrawOutcome::Drawn
    );
}

#[test]
fn failed_frame_preparation_is_not_retried() {
    let mut backend = MockBackend::new();
    backend.fail_prepare = true;
    let handles = backend.handles();
    let mut resources = DeviceResources::create(backend).unwrap();
    handles.clear();

    assert!(matches!(
        resources.prepare_frame(),
        Err(DeviceError::Backend(BackendError::Failed { .. }))
    ));
    for _ in 0..3 {
        assert!(matches!(
            resources.prepare_frame(),
            Err(DeviceError::PipelineUnavailable(_))
        ));
        assert_eq!(
            resources.draw([0.0; 4], &PaintFrame::default()),
            DrawOutcome::Failed
        );
    }

    assert!(resources.is_pipeline_failed());
    assert_eq!(handles.count("prepare"), 1);
    assert_eq!(handles.count("draw"), 0);
}

#[test]
fn resize_releases_view_before_resizing_buffers() {
    let backend = MockBackend::new();
    let handles = backend.handles();
    let mut resources = DeviceResources::create(backend).unwrap();
    handles.clear();

    resources.resize(1280, 720).unwrap();

    assert_eq!(
        handles.entries(),
        vec!["drop view 1", "resize 1280x720 views=0", "create_view 2"]
    );
    assert_eq!(resources.render_target().map(|view| view.id), Some(2));
    assert_eq!(handles.live_views.get(), 1);
}

#[test]
fn zero_sized_resize_is_ignored() {
    let backend = MockBackend::new();
    let handles = backend.handles();
    let mut resources = DeviceResources::create(backend).unwrap();
    handles.clear();

    resources.resize(0, 720).unwrap();
    resources.resize(1280, 0).unwrap();

    assert!(handles.entries().is_empty());
    assert!(resources.has_render_target());
}

#[test]
fn failed_resize_still_rebuilds_a_view() {
    let mut backend = MockBackend::new();
    backend.fail_resize = true;
    let mut resources = DeviceResources::create(backend).unwrap();

    assert!(matches!(
        resources.resize(640, 480),
        Err(DeviceError::Backend(BackendError::Failed { .. }))
    ));
    assert!(resources.has_render_target());
}

#[test]
fn destroy_releases_view_chain_then_context_and_device() {
    let backend = MockBackend::new();
    let handles = backend.handles();
    let mut resources = DeviceResources::create(backend).unwrap();
    handles.clear();

    resources.destroy();
    assert_eq!(
        handles.entries(),
        vec!["drop view 1", "drop swap chain", "drop context", "drop device"]
    );

    resources.destroy();
    assert_eq!(handles.entries().len(), 4);
    assert!(!resources.is_alive());
    assert_eq!(resources.present(), PresentStatus::Failed);
    assert_eq!(resources.resize(800, 600), Err(DeviceError::NotCreated));
    assert_eq!(
        resources.draw([0.0; 4], &PaintFrame::default()),
        DrawOutcome::NoRenderTarget
    );
}

#[test]
fn dropping_resources_tears_down_in_order() {
    let backend = MockBackend::new();
    let handles = backend.handles();
    let resources = DeviceResources::create(backend).unwrap();
    handles.clear();

    drop(resources);

    assert_eq!(
        handles.entries(),
        vec!["drop view 1", "drop swap chain", "drop context", "drop device"]
    );
}

#[test]
fn repeated_view_cycles_never_hold_two_views() {
    let backend = MockBackend::new();
    let handles = backend.handles();
    let mut resources = DeviceResources::create(backend).unwrap();

    for _ in 0..100 {
        resources.release_render_target();
        assert_eq!(handles.live_views.get(), 0);
        assert!(resources.build_render_target());
        assert_eq!(handles.live_views.get(), 1);
    }
    assert!(resources.build_render_target());
    assert_eq!(handles.live_views.get(), 1);
    assert_eq!(handles.count("create_view"), 102);
}
