//! Device, swap chain and render-target lifetime.
//!
//! [`DeviceResources`] owns the three as one unit and is the only place that
//! creates, resizes or releases them. The native calls sit behind
//! [`GraphicsBackend`] so the lifecycle can be driven by a mock.

use crate::overlay::ui_host::PaintFrame;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverTier {
    Hardware,
    /// Software rasterizer, used when the hardware path is unsupported.
    Warp,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("driver tier is not supported on this system")]
    Unsupported,
    #[error("{stage} failed: {message}")]
    Failed { stage: &'static str, message: String },
}

impl BackendError {
    pub fn failed(stage: &'static str, message: impl ToString) -> Self {
        Self::Failed {
            stage,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device creation failed (hardware: {hardware}, fallback: {fallback:?})")]
    Creation {
        hardware: BackendError,
        fallback: Option<BackendError>,
    },
    #[error("device resources have been destroyed")]
    NotCreated,
    /// Frame preparation failed earlier on this device and is not retried.
    #[error("frame pipeline unavailable: {0}")]
    PipelineUnavailable(BackendError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    Occluded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn,
    /// No render-target view; nothing was submitted.
    NoRenderTarget,
    Failed,
}

/// Native graphics calls used by [`DeviceResources`].
///
/// `Device` is the device plus its immediate context (and anything else
/// whose lifetime is tied to the device); its fields must drop in
/// context-then-device order.
pub trait GraphicsBackend {
    type Device;
    type SwapChain;
    type RenderTarget;

    fn create_device(
        &mut self,
        tier: DriverTier,
    ) -> Result<(Self::Device, Self::SwapChain), BackendError>;

    fn create_render_target(
        &mut self,
        device: &Self::Device,
        swap_chain: &Self::SwapChain,
    ) -> Result<Self::RenderTarget, BackendError>;

    /// Resize the swap-chain buffers keeping count, format and flags.
    fn resize_buffers(
        &mut self,
        swap_chain: &Self::SwapChain,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>;

    /// Backend part of starting a UI frame (lazy pipeline creation).
    fn prepare_frame(&mut self, device: &mut Self::Device) -> Result<(), BackendError>;

    /// Bind `target`, clear it and rasterize `frame`.
    fn draw(
        &mut self,
        device: &mut Self::Device,
        target: &Self::RenderTarget,
        clear_color: [f32; 4],
        frame: &PaintFrame,
    ) -> Result<(), BackendError>;

    /// Present with vsync, or only test visibility when `test_only` is set.
    fn present(&mut self, swap_chain: &Self::SwapChain, test_only: bool) -> PresentStatus;
}

pub struct DeviceResources<B: GraphicsBackend> {
    backend: B,
    // Released in this order by `destroy`.
    render_target: Option<B::RenderTarget>,
    swap_chain: Option<B::SwapChain>,
    device: Option<B::Device>,
    driver_tier: DriverTier,
    pipeline_error: Option<BackendError>,
}

impl<B: GraphicsBackend> DeviceResources<B> {
    /// Create device and swap chain, retrying once on the software driver
    /// when the hardware driver is unsupported, then build the
    /// render-target view.
    pub fn create(mut backend: B) -> Result<Self, DeviceError> {
        let (tier, (device, swap_chain)) = match backend.create_device(DriverTier::Hardware) {
            Ok(created) => (DriverTier::Hardware, created),
            Err(BackendError::Unsupported) => {
                tracing::warn!("hardware device unsupported; falling back to WARP");
                match backend.create_device(DriverTier::Warp) {
                    Ok(created) => (DriverTier::Warp, created),
                    Err(err) => {
                        return Err(DeviceError::Creation {
                            hardware: BackendError::Unsupported,
                            fallback: Some(err),
                        })
                    }
                }
            }
            Err(err) => {
                return Err(DeviceError::Creation {
                    hardware: err,
                    fallback: None,
                })
            }
        };
        tracing::info!(?tier, "graphics device created");

        let mut resources = Self {
            backend,
            render_target: None,
            swap_chain: Some(swap_chain),
            device: Some(device),
            driver_tier: tier,
            pipeline_error: None,
        };
        resources.build_render_target();
        Ok(resources)
    }

    pub fn driver_tier(&self) -> DriverTier {
        self.driver_tier
    }

    pub fn is_alive(&self) -> bool {
        self.device.is_some() && self.swap_chain.is_some()
    }

    pub fn has_render_target(&self) -> bool {
        self.render_target.is_some()
    }

    pub fn render_target(&self) -> Option<&B::RenderTarget> {
        self.render_target.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Build a view over the current back buffer. A failure leaves the view
    /// empty and is reported through the return value only.
    pub fn build_render_target(&mut self) -> bool {
        self.release_render_target();
        let (Some(device), Some(swap_chain)) = (self.device.as_ref(), self.swap_chain.as_ref())
        else {
            return false;
        };
        match self.backend.create_render_target(device, swap_chain) {
            Ok(view) => {
                self.render_target = Some(view);
                true
            }
            Err(err) => {
                tracing::warn!(%err, "failed to build render target view");
                false
            }
        }
    }

    pub fn release_render_target(&mut self) {
        self.render_target = None;
    }

    /// Release view, resize buffers, rebuild view. Zero dimensions are
    /// ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        let Some(swap_chain) = self.swap_chain.as_ref() else {
            return Err(DeviceError::NotCreated);
        };
        self.render_target = None;
        let resized = self.backend.resize_buffers(swap_chain, width, height);
        if let Err(err) = &resized {
            tracing::warn!(%err, width, height, "swap chain resize failed");
        }
        self.build_render_target();
        resized.map_err(DeviceError::from)
    }

    /// Backend frame preparation. The first failure is latched for the
    /// lifetime of the device; later calls return
    /// [`DeviceError::PipelineUnavailable`] without touching the backend.
    pub fn prepare_frame(&mut self) -> Result<(), DeviceError> {
        if let Some(err) = &self.pipeline_error {
            return Err(DeviceError::PipelineUnavailable(err.clone()));
        }
        let device = self.device.as_mut().ok_or(DeviceError::NotCreated)?;
        if let Err(err) = self.backend.prepare_frame(device) {
            self.pipeline_error = Some(err.clone());
            return Err(DeviceError::Backend(err));
        }
        Ok(())
    }

    pub fn is_pipeline_failed(&self) -> bool {
        self.pipeline_error.is_some()
    }

    pub fn draw(&mut self, clear_color: [f32; 4], frame: &PaintFrame) -> DrawOutcome {
        if self.pipeline_error.is_some() {
            return DrawOutcome::Failed;
        }
        let (Some(device), Some(target)) = (self.device.as_mut(), self.render_target.as_ref())
        else {
            return DrawOutcome::NoRenderTarget;
        };
        match self.backend.draw(device, target, clear_color, frame) {
            Ok(()) => DrawOutcome::Drawn,
            Err(err) => {
                tracing::warn!(%err, "draw submission failed");
                DrawOutcome::Failed
            }
        }
    }

    pub fn present(&mut self) -> PresentStatus {
        match self.swap_chain.as_ref() {
            Some(swap_chain) => self.backend.present(swap_chain, false),
            None => PresentStatus::Failed,
        }
    }

    pub fn test_present(&mut self) -> PresentStatus {
        match self.swap_chain.as_ref() {
            Some(swap_chain) => self.backend.present(swap_chain, true),
            None => PresentStatus::Failed,
        }
    }

    /// Release view, swap chain and device (context first) in that order.
    /// Calling it again is a no-op.
    pub fn destroy(&mut self) {
        if self.device.is_none() && self.swap_chain.is_none() && self.render_target.is_none() {
            return;
        }
        self.render_target = None;
        self.swap_chain = None;
        self.device = None;
        self.pipeline_error = None;
        tracing::debug!("graphics device destroyed");
    }
}

impl<B: GraphicsBackend> Drop for DeviceResources<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}
