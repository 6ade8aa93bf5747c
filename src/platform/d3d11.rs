//! Direct3D 11 implementation of [`GraphicsBackend`].

use crate::overlay::device::{BackendError, DriverTier, GraphicsBackend, PresentStatus};
use crate::overlay::ui_host::PaintFrame;
use crate::platform::painter::EguiPainter;
use windows::Win32::Foundation::{BOOL, HMODULE, HWND};
use windows::Win32::Graphics::Direct3D::{
    D3D_DRIVER_TYPE, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_WARP, D3D_FEATURE_LEVEL,
    D3D_FEATURE_LEVEL_10_0, D3D_FEATURE_LEVEL_11_0,
};
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDeviceAndSwapChain, ID3D11Device, ID3D11DeviceContext, ID3D11RenderTargetView,
    ID3D11Texture2D, D3D11_CREATE_DEVICE_FLAG, D3D11_RENDER_TARGET_VIEW_DESC,
    D3D11_RENDER_TARGET_VIEW_DESC_0, D3D11_RTV_DIMENSION_TEXTURE2D, D3D11_SDK_VERSION,
    D3D11_TEX2D_RTV,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_FORMAT_UNKNOWN, DXGI_MODE_DESC, DXGI_RATIONAL,
    DXGI_SAMPLE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
    IDXGISwapChain, DXGI_ERROR_UNSUPPORTED, DXGI_PRESENT, DXGI_PRESENT_TEST,
    DXGI_STATUS_OCCLUDED, DXGI_SWAP_CHAIN_DESC, DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH,
    DXGI_SWAP_EFFECT_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT,
};

const BUFFER_COUNT: u32 = 2;
const REFRESH_RATE: DXGI_RATIONAL = DXGI_RATIONAL {
    Numerator: 60,
    Denominator: 1,
};
const FEATURE_LEVELS: [D3D_FEATURE_LEVEL; 2] = [D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_10_0];

/// Device and immediate context, plus the egui pipeline built on them.
/// Field order is drop order.
pub struct D3D11Device {
    painter: Option<EguiPainter>,
    context: ID3D11DeviceContext,
    device: ID3D11Device,
}

pub struct D3D11Backend {
    hwnd: HWND,
}

impl D3D11Backend {
    pub fn new(hwnd: HWND) -> Self {
        Self { hwnd }
    }

    fn swap_chain_desc(&self) -> DXGI_SWAP_CHAIN_DESC {
        DXGI_SWAP_CHAIN_DESC {
            BufferDesc: DXGI_MODE_DESC {
                Width: 0,
                Height: 0,
                RefreshRate: REFRESH_RATE,
                Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                ..Default::default()
            },
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: BUFFER_COUNT,
            OutputWindow: self.hwnd,
            Windowed: BOOL::from(true),
            SwapEffect: DXGI_SWAP_EFFECT_DISCARD,
            Flags: DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH.0 as u32,
        }
    }
}

fn driver_type(tier: DriverTier) -> D3D_DRIVER_TYPE {
    match tier {
        DriverTier::Hardware => D3D_DRIVER_TYPE_HARDWARE,
        DriverTier::Warp => D3D_DRIVER_TYPE_WARP,
    }
}

impl GraphicsBackend for D3D11Backend {
    type Device = D3D11Device;
    type SwapChain = IDXGISwapChain;
    type RenderTarget = ID3D11RenderTargetView;

    fn create_device(
        &mut self,
        tier: DriverTier,
    ) -> Result<(D3D11Device, IDXGISwapChain), BackendError> {
        let desc = self.swap_chain_desc();
        let mut swap_chain: Option<IDXGISwapChain> = None;
        let mut device: Option<ID3D11Device> = None;
        let mut context: Option<ID3D11DeviceContext> = None;
        let mut feature_level = D3D_FEATURE_LEVEL::default();

        let created = unsafe {
            D3D11CreateDeviceAndSwapChain(
                None,
                driver_type(tier),
                HMODULE::default(),
                D3D11_CREATE_DEVICE_FLAG(0),
                Some(&FEATURE_LEVELS[..]),
                D3D11_SDK_VERSION,
                Some(&desc),
                Some(&mut swap_chain),
                Some(&mut device),
                Some(&mut feature_level),
                Some(&mut context),
            )
        };
        if let Err(err) = created {
            if err.code() == DXGI_ERROR_UNSUPPORTED {
                return Err(BackendError::Unsupported);
            }
            return Err(BackendError::failed("device creation", err));
        }

        match (device, context, swap_chain) {
            (Some(device), Some(context), Some(swap_chain)) => {
                tracing::debug!(?tier, level = feature_level.0, "D3D11 device created");
                Ok((
                    D3D11Device {
                        painter: None,
                        context,
                        device,
                    },
                    swap_chain,
                ))
            }
            _ => Err(BackendError::failed("device creation", "no device returned")),
        }
    }

    fn create_render_target(
        &mut self,
        device: &D3D11Device,
        swap_chain: &IDXGISwapChain,
    ) -> Result<ID3D11RenderTargetView, BackendError> {
        let back_buffer: ID3D11Texture2D = unsafe { swap_chain.GetBuffer(0) }
            .map_err(|err| BackendError::failed("back buffer", err))?;
        let desc = D3D11_RENDER_TARGET_VIEW_DESC {
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            ViewDimension: D3D11_RTV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_RENDER_TARGET_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_RTV { MipSlice: 0 },
            },
        };
        let mut view: Option<ID3D11RenderTargetView> = None;
        unsafe {
            device
                .device
                .CreateRenderTargetView(&back_buffer, Some(&desc), Some(&mut view))
        }
        .map_err(|err| BackendError::failed("render target view", err))?;
        view.ok_or_else(|| BackendError::failed("render target view", "no view returned"))
    }

    fn resize_buffers(
        &mut self,
        swap_chain: &IDXGISwapChain,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        unsafe {
            swap_chain.ResizeBuffers(
                0,
                width,
                height,
                DXGI_FORMAT_UNKNOWN,
                DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH,
            )
        }
        .map_err(|err| BackendError::failed("buffer resize", err))
    }

    fn prepare_frame(&mut self, device: &mut D3D11Device) -> Result<(), BackendError> {
        if device.painter.is_none() {
            device.painter = Some(EguiPainter::new(&device.device)?);
            tracing::debug!("egui pipeline created");
        }
        Ok(())
    }

    fn draw(
        &mut self,
        device: &mut D3D11Device,
        target: &ID3D11RenderTargetView,
        clear_color: [f32; 4],
        frame: &PaintFrame,
    ) -> Result<(), BackendError> {
        unsafe {
            device
                .context
                .OMSetRenderTargets(Some(&[Some(target.clone())]), None);
            device.context.ClearRenderTargetView(target, &clear_color);
        }
        match device.painter.as_mut() {
            Some(painter) => painter.paint(&device.context, frame),
            None => Err(BackendError::failed("draw", "pipeline not prepared")),
        }
    }

    fn present(&mut self, swap_chain: &IDXGISwapChain, test_only: bool) -> PresentStatus {
        let (interval, flags) = if test_only {
            (0, DXGI_PRESENT_TEST)
        } else {
            (1, DXGI_PRESENT(0))
        };
        let hr = unsafe { swap_chain.Present(interval, flags) };
        if hr == DXGI_STATUS_OCCLUDED {
            PresentStatus::Occluded
        } else if hr.is_ok() {
            PresentStatus::Presented
        } else {
            tracing::warn!(error = %windows::core::Error::from(hr), "present failed");
            PresentStatus::Failed
        }
    }
}

#[cfg(test)]
mod windows_tests {
    use super::*;

    #[test]
    fn swap_chain_matches_overlay_configuration() {
        let backend = D3D11Backend::new(HWND::default());
        let desc = backend.swap_chain_desc();
        assert_eq!(desc.BufferCount, 2);
        assert_eq!(desc.BufferDesc.Format, DXGI_FORMAT_R8G8B8A8_UNORM);
        assert_eq!(desc.BufferDesc.RefreshRate.Numerator, 60);
        assert_eq!(desc.SwapEffect, DXGI_SWAP_EFFECT_DISCARD);
        assert!(desc.Windowed.as_bool());
    }

    #[test]
    fn driver_tiers_map_to_driver_types() {
        assert_eq!(driver_type(DriverTier::Hardware), D3D_DRIVER_TYPE_HARDWARE);
        assert_eq!(driver_type(DriverTier::Warp), D3D_DRIVER_TYPE_WARP);
    }
}
