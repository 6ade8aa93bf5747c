//! Direct3D 11 renderer for egui's tessellated output.

use crate::overlay::device::BackendError;
use crate::overlay::geometry::clip_to_scissor;
use crate::overlay::ui_host::{image_rgba8, PaintFrame};
use egui::epaint::{Primitive, Vertex};
use egui::{ImageData, TextureFilter, TextureId, TexturesDelta};
use std::collections::HashMap;
use std::ffi::c_void;
use windows::core::s;
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D::Fxc::{D3DCompile, D3DCOMPILE_ENABLE_STRICTNESS};
use windows::Win32::Graphics::Direct3D::{ID3DBlob, D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST};
use windows::Win32::Graphics::Direct3D11::{
    ID3D11BlendState, ID3D11Buffer, ID3D11Device, ID3D11DeviceContext, ID3D11InputLayout,
    ID3D11PixelShader, ID3D11RasterizerState, ID3D11SamplerState, ID3D11ShaderResourceView,
    ID3D11Texture2D, ID3D11VertexShader, D3D11_BIND_CONSTANT_BUFFER, D3D11_BIND_INDEX_BUFFER,
    D3D11_BIND_SHADER_RESOURCE, D3D11_BIND_VERTEX_BUFFER, D3D11_BLEND_DESC,
    D3D11_BLEND_INV_DEST_ALPHA, D3D11_BLEND_INV_SRC_ALPHA, D3D11_BLEND_ONE, D3D11_BLEND_OP_ADD,
    D3D11_BOX, D3D11_BUFFER_DESC, D3D11_COLOR_WRITE_ENABLE_ALL, D3D11_COMPARISON_NEVER,
    D3D11_CPU_ACCESS_WRITE, D3D11_CULL_NONE, D3D11_FILL_SOLID, D3D11_FILTER,
    D3D11_FILTER_MIN_MAG_MIP_LINEAR, D3D11_FILTER_MIN_MAG_MIP_POINT, D3D11_INPUT_ELEMENT_DESC,
    D3D11_INPUT_PER_VERTEX_DATA, D3D11_MAPPED_SUBRESOURCE, D3D11_MAP_WRITE_DISCARD,
    D3D11_RASTERIZER_DESC, D3D11_RENDER_TARGET_BLEND_DESC, D3D11_SAMPLER_DESC,
    D3D11_SUBRESOURCE_DATA, D3D11_TEXTURE2D_DESC, D3D11_TEXTURE_ADDRESS_CLAMP,
    D3D11_USAGE_DEFAULT, D3D11_USAGE_DYNAMIC, D3D11_VIEWPORT,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT_R32G32_FLOAT, DXGI_FORMAT_R32_UINT, DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_SAMPLE_DESC,
};

const SHADER_SOURCE: &str = r#"
cbuffer Screen : register(b0) {
    float2 screen_size;
    float2 padding;
};

struct VsInput {
    float2 pos : POSITION;
    float2 uv : TEXCOORD;
    float4 color : COLOR;
};

struct PsInput {
    float4 pos : SV_POSITION;
    float2 uv : TEXCOORD;
    float4 color : COLOR;
};

PsInput vs_main(VsInput input) {
    PsInput output;
    output.pos = float4(
        2.0 * input.pos.x / screen_size.x - 1.0,
        1.0 - 2.0 * input.pos.y / screen_size.y,
        0.0,
        1.0);
    output.uv = input.uv;
    output.color = input.color;
    return output;
}

Texture2D ui_texture : register(t0);
SamplerState ui_sampler : register(s0);

float4 ps_main(PsInput input) : SV_TARGET {
    return input.color * ui_texture.Sample(ui_sampler, input.uv);
}
"#;

const INITIAL_VERTEX_CAPACITY: usize = 5_000;
const INITIAL_INDEX_CAPACITY: usize = 10_000;

#[repr(C)]
#[derive(Clone, Copy)]
struct ScreenConstants {
    screen_size: [f32; 2],
    padding: [f32; 2],
}

struct UiTexture {
    texture: ID3D11Texture2D,
    view: ID3D11ShaderResourceView,
    filter: TextureFilter,
    size: [usize; 2],
}

struct DrawCall {
    texture: TextureId,
    scissor: RECT,
    index_count: u32,
    first_index: u32,
    base_vertex: i32,
}

fn failed(stage: &'static str) -> impl FnOnce(windows::core::Error) -> BackendError {
    move |err| BackendError::failed(stage, err)
}

fn missing(stage: &'static str) -> BackendError {
    BackendError::failed(stage, "no object returned")
}

fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}

fn compile_shader(
    entry: windows::core::PCSTR,
    target: windows::core::PCSTR,
) -> Result<ID3DBlob, BackendError> {
    let mut code: Option<ID3DBlob> = None;
    let mut errors: Option<ID3DBlob> = None;
    let result = unsafe {
        D3DCompile(
            SHADER_SOURCE.as_ptr() as *const c_void,
            SHADER_SOURCE.len(),
            None,
            None,
            None,
            entry,
            target,
            D3DCOMPILE_ENABLE_STRICTNESS,
            0,
            &mut code,
            Some(&mut errors),
        )
    };
    if let Err(err) = result {
        let message = errors
            .as_ref()
            .map(|blob| String::from_utf8_lossy(blob_bytes(blob)).into_owned())
            .unwrap_or_else(|| err.to_string());
        return Err(BackendError::failed("shader compilation", message));
    }
    code.ok_or_else(|| missing("shader compilation"))
}

/// GPU pipeline and texture store for egui. Tied to the device it was
/// created on.
pub struct EguiPainter {
    device: ID3D11Device,
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    constant_buffer: ID3D11Buffer,
    blend_state: ID3D11BlendState,
    rasterizer_state: ID3D11RasterizerState,
    linear_sampler: ID3D11SamplerState,
    nearest_sampler: ID3D11SamplerState,
    vertex_buffer: Option<ID3D11Buffer>,
    vertex_capacity: usize,
    index_buffer: Option<ID3D11Buffer>,
    index_capacity: usize,
    textures: HashMap<TextureId, UiTexture>,
}

impl EguiPainter {
    pub fn new(device: &ID3D11Device) -> Result<Self, BackendError> {
        let vs_blob = compile_shader(s!("vs_main"), s!("vs_4_0"))?;
        let ps_blob = compile_shader(s!("ps_main"), s!("ps_4_0"))?;

        let mut vertex_shader: Option<ID3D11VertexShader> = None;
        let mut pixel_shader: Option<ID3D11PixelShader> = None;
        unsafe {
            device
                .CreateVertexShader(blob_bytes(&vs_blob), None, Some(&mut vertex_shader))
                .map_err(failed("vertex shader"))?;
            device
                .CreatePixelShader(blob_bytes(&ps_blob), None, Some(&mut pixel_shader))
                .map_err(failed("pixel shader"))?;
        }

        let layout = [
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("POSITION"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("TEXCOORD"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 8,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("COLOR"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                InputSlot: 0,
                AlignedByteOffset: 16,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];
        let mut input_layout: Option<ID3D11InputLayout> = None;
        unsafe {
            device
                .CreateInputLayout(&layout, blob_bytes(&vs_blob), Some(&mut input_layout))
                .map_err(failed("input layout"))?;
        }

        let constant_desc = D3D11_BUFFER_DESC {
            ByteWidth: std::mem::size_of::<ScreenConstants>() as u32,
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: D3D11_BIND_CONSTANT_BUFFER.0 as u32,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            MiscFlags: 0,
            StructureByteStride: 0,
        };
        let mut constant_buffer: Option<ID3D11Buffer> = None;
        unsafe {
            device
                .CreateBuffer(&constant_desc, None, Some(&mut constant_buffer))
                .map_err(failed("constant buffer"))?;
        }

        // egui emits premultiplied colors.
        let blend_desc = D3D11_BLEND_DESC {
            AlphaToCoverageEnable: false.into(),
            IndependentBlendEnable: false.into(),
            RenderTarget: [
                D3D11_RENDER_TARGET_BLEND_DESC {
                    BlendEnable: true.into(),
                    SrcBlend: D3D11_BLEND_ONE,
                    DestBlend: D3D11_BLEND_INV_SRC_ALPHA,
                    BlendOp: D3D11_BLEND_OP_ADD,
                    SrcBlendAlpha: D3D11_BLEND_INV_DEST_ALPHA,
                    DestBlendAlpha: D3D11_BLEND_ONE,
                    BlendOpAlpha: D3D11_BLEND_OP_ADD,
                    RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
                },
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
            ],
        };
        let mut blend_state: Option<ID3D11BlendState> = None;
        unsafe {
            device
                .CreateBlendState(&blend_desc, Some(&mut blend_state))
                .map_err(failed("blend state"))?;
        }

        let rasterizer_desc = D3D11_RASTERIZER_DESC {
            FillMode: D3D11_FILL_SOLID,
            CullMode: D3D11_CULL_NONE,
            ScissorEnable: true.into(),
            DepthClipEnable: true.into(),
            ..Default::default()
        };
        let mut rasterizer_state: Option<ID3D11RasterizerState> = None;
        unsafe {
            device
                .CreateRasterizerState(&rasterizer_desc, Some(&mut rasterizer_state))
                .map_err(failed("rasterizer state"))?;
        }

        Ok(Self {
            device: device.clone(),
            vertex_shader: vertex_shader.ok_or_else(|| missing("vertex shader"))?,
            pixel_shader: pixel_shader.ok_or_else(|| missing("pixel shader"))?,
            input_layout: input_layout.ok_or_else(|| missing("input layout"))?,
            constant_buffer: constant_buffer.ok_or_else(|| missing("constant buffer"))?,
            blend_state: blend_state.ok_or_else(|| missing("blend state"))?,
            rasterizer_state: rasterizer_state.ok_or_else(|| missing("rasterizer state"))?,
            linear_sampler: create_sampler(device, D3D11_FILTER_MIN_MAG_MIP_LINEAR)?,
            nearest_sampler: create_sampler(device, D3D11_FILTER_MIN_MAG_MIP_POINT)?,
            vertex_buffer: None,
            vertex_capacity: 0,
            index_buffer: None,
            index_capacity: 0,
            textures: HashMap::new(),
        })
    }

    /// Apply texture updates, draw every mesh, then free released textures.
    pub fn paint(
        &mut self,
        context: &ID3D11DeviceContext,
        frame: &PaintFrame,
    ) -> Result<(), BackendError> {
        self.apply_texture_uploads(context, &frame.textures_delta)?;
        let result = self.draw_primitives(context, frame);
        for id in &frame.textures_delta.free {
            self.textures.remove(id);
        }
        result
    }

    fn apply_texture_uploads(
        &mut self,
        context: &ID3D11DeviceContext,
        delta: &TexturesDelta,
    ) -> Result<(), BackendError> {
        for (id, image_delta) in &delta.set {
            let [width, height] = image_delta.image.size();
            if width == 0 || height == 0 {
                continue;
            }
            let pixels = image_rgba8(&image_delta.image);
            match image_delta.pos {
                None => {
                    let texture = self.create_texture(&image_delta.image, &pixels)?;
                    self.textures.insert(
                        *id,
                        UiTexture {
                            filter: image_delta.options.magnification,
                            ..texture
                        },
                    );
                }
                Some([x, y]) => {
                    let Some(existing) = self.textures.get(id) else {
                        tracing::debug!(?id, "partial update for unknown texture ignored");
                        continue;
                    };
                    if x + width > existing.size[0] || y + height > existing.size[1] {
                        tracing::debug!(?id, "partial update out of bounds ignored");
                        continue;
                    }
                    let region = D3D11_BOX {
                        left: x as u32,
                        top: y as u32,
                        front: 0,
                        right: (x + width) as u32,
                        bottom: (y + height) as u32,
                        back: 1,
                    };
                    unsafe {
                        context.UpdateSubresource(
                            &existing.texture,
                            0,
                            Some(&region),
                            pixels.as_ptr() as *const c_void,
                            (width * 4) as u32,
                            0,
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn create_texture(&self, image: &ImageData, pixels: &[u8]) -> Result<UiTexture, BackendError> {
        let [width, height] = image.size();
        let desc = D3D11_TEXTURE2D_DESC {
            Width: width as u32,
            Height: height as u32,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            CPUAccessFlags: 0,
            MiscFlags: 0,
        };
        let initial = D3D11_SUBRESOURCE_DATA {
            pSysMem: pixels.as_ptr() as *const c_void,
            SysMemPitch: (width * 4) as u32,
            SysMemSlicePitch: 0,
        };
        let mut texture: Option<ID3D11Texture2D> = None;
        unsafe {
            self.device
                .CreateTexture2D(&desc, Some(&initial), Some(&mut texture))
                .map_err(failed("texture"))?;
        }
        let texture = texture.ok_or_else(|| missing("texture"))?;
        let mut view: Option<ID3D11ShaderResourceView> = None;
        unsafe {
            self.device
                .CreateShaderResourceView(&texture, None, Some(&mut view))
                .map_err(failed("texture view"))?;
        }
        Ok(UiTexture {
            texture,
            view: view.ok_or_else(|| missing("texture view"))?,
            filter: TextureFilter::Linear,
            size: [width, height],
        })
    }

    fn draw_primitives(
        &mut self,
        context: &ID3D11DeviceContext,
        frame: &PaintFrame,
    ) -> Result<(), BackendError> {
        let (target_w, target_h) = frame.screen_size_px;
        if target_w == 0 || target_h == 0 {
            return Ok(());
        }

        let mut vertices: Vec<Vertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut calls = Vec::new();
        for clipped in &frame.primitives {
            let Primitive::Mesh(mesh) = &clipped.primitive else {
                continue;
            };
            if mesh.indices.is_empty() {
                continue;
            }
            let Some(scissor) =
                clip_to_scissor(clipped.clip_rect, frame.pixels_per_point, frame.screen_size_px)
            else {
                continue;
            };
            calls.push(DrawCall {
                texture: mesh.texture_id,
                scissor: RECT {
                    left: scissor.left,
                    top: scissor.top,
                    right: scissor.right,
                    bottom: scissor.bottom,
                },
                index_count: mesh.indices.len() as u32,
                first_index: indices.len() as u32,
                base_vertex: vertices.len() as i32,
            });
            vertices.extend_from_slice(&mesh.vertices);
            indices.extend_from_slice(&mesh.indices);
        }
        if calls.is_empty() {
            return Ok(());
        }

        self.ensure_geometry_capacity(vertices.len(), indices.len())?;
        let (Some(vertex_buffer), Some(index_buffer)) =
            (self.vertex_buffer.clone(), self.index_buffer.clone())
        else {
            return Err(missing("geometry buffers"));
        };
        unsafe {
            write_buffer(context, &vertex_buffer, &vertices)?;
            write_buffer(context, &index_buffer, &indices)?;
            write_buffer(
                context,
                &self.constant_buffer,
                &[ScreenConstants {
                    screen_size: [
                        target_w as f32 / frame.pixels_per_point,
                        target_h as f32 / frame.pixels_per_point,
                    ],
                    padding: [0.0; 2],
                }],
            )?;
        }

        let viewport = D3D11_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: target_w as f32,
            Height: target_h as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        let stride = std::mem::size_of::<Vertex>() as u32;
        let offset = 0u32;
        unsafe {
            context.RSSetViewports(Some(&[viewport]));
            context.RSSetState(&self.rasterizer_state);
            context.IASetInputLayout(&self.input_layout);
            context.IASetVertexBuffers(
                0,
                1,
                Some(&Some(vertex_buffer.clone())),
                Some(&stride),
                Some(&offset),
            );
            context.IASetIndexBuffer(&index_buffer, DXGI_FORMAT_R32_UINT, 0);
            context.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            context.VSSetShader(&self.vertex_shader, None);
            context.VSSetConstantBuffers(0, Some(&[Some(self.constant_buffer.clone())]));
            context.PSSetShader(&self.pixel_shader, None);
            let blend_factor = [0.0f32; 4];
            context.OMSetBlendState(&self.blend_state, Some(&blend_factor), 0xffff_ffff);
        }

        for call in &calls {
            let Some(texture) = self.textures.get(&call.texture) else {
                tracing::trace!(id = ?call.texture, "mesh references unknown texture");
                continue;
            };
            let sampler = match texture.filter {
                TextureFilter::Nearest => &self.nearest_sampler,
                TextureFilter::Linear => &self.linear_sampler,
            };
            unsafe {
                context.RSSetScissorRects(Some(&[call.scissor]));
                context.PSSetShaderResources(0, Some(&[Some(texture.view.clone())]));
                context.PSSetSamplers(0, Some(&[Some(sampler.clone())]));
                context.DrawIndexed(call.index_count, call.first_index, call.base_vertex);
            }
        }
        Ok(())
    }

    fn ensure_geometry_capacity(
        &mut self,
        vertex_count: usize,
        index_count: usize,
    ) -> Result<(), BackendError> {
        if self.vertex_buffer.is_none() || vertex_count > self.vertex_capacity {
            let capacity = grown_capacity(self.vertex_capacity, vertex_count, INITIAL_VERTEX_CAPACITY);
            self.vertex_buffer = Some(self.create_dynamic_buffer(
                capacity * std::mem::size_of::<Vertex>(),
                D3D11_BIND_VERTEX_BUFFER.0 as u32,
            )?);
            self.vertex_capacity = capacity;
        }
        if self.index_buffer.is_none() || index_count > self.index_capacity {
            let capacity = grown_capacity(self.index_capacity, index_count, INITIAL_INDEX_CAPACITY);
            self.index_buffer = Some(self.create_dynamic_buffer(
                capacity * std::mem::size_of::<u32>(),
                D3D11_BIND_INDEX_BUFFER.0 as u32,
            )?);
            self.index_capacity = capacity;
        }
        Ok(())
    }

    fn create_dynamic_buffer(&self, bytes: usize, bind: u32) -> Result<ID3D11Buffer, BackendError> {
        let desc = D3D11_BUFFER_DESC {
            ByteWidth: bytes as u32,
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: bind,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            MiscFlags: 0,
            StructureByteStride: 0,
        };
        let mut buffer: Option<ID3D11Buffer> = None;
        unsafe {
            self.device
                .CreateBuffer(&desc, None, Some(&mut buffer))
                .map_err(failed("geometry buffer"))?;
        }
        buffer.ok_or_else(|| missing("geometry buffer"))
    }
}

fn grown_capacity(current: usize, needed: usize, initial: usize) -> usize {
    let mut capacity = current.max(initial);
    while capacity < needed {
        capacity *= 2;
    }
    capacity
}

fn create_sampler(
    device: &ID3D11Device,
    filter: D3D11_FILTER,
) -> Result<ID3D11SamplerState, BackendError> {
    let desc = D3D11_SAMPLER_DESC {
        Filter: filter,
        AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
        AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
        AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
        MipLODBias: 0.0,
        MaxAnisotropy: 1,
        ComparisonFunc: D3D11_COMPARISON_NEVER,
        BorderColor: [0.0, 0.0, 0.0, 0.0],
        MinLOD: 0.0,
        MaxLOD: f32::MAX,
    };
    let mut sampler: Option<ID3D11SamplerState> = None;
    unsafe {
        device
            .CreateSamplerState(&desc, Some(&mut sampler))
            .map_err(failed("sampler"))?;
    }
    sampler.ok_or_else(|| missing("sampler"))
}

/// Overwrite a dynamic buffer with `data`.
///
/// # Safety
/// `buffer` must be a CPU-writable dynamic buffer at least as large as
/// `data`.
unsafe fn write_buffer<T: Copy>(
    context: &ID3D11DeviceContext,
    buffer: &ID3D11Buffer,
    data: &[T],
) -> Result<(), BackendError> {
    let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
    context
        .Map(buffer, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))
        .map_err(failed("buffer map"))?;
    std::ptr::copy_nonoverlapping(
        data.as_ptr() as *const u8,
        mapped.pData as *mut u8,
        std::mem::size_of_val(data),
    );
    context.Unmap(buffer, 0);
    Ok(())
}

#[cfg(test)]
mod windows_tests {
    use super::*;

    #[test]
    fn geometry_capacity_doubles_until_it_fits() {
        assert_eq!(grown_capacity(0, 10, 5_000), 5_000);
        assert_eq!(grown_capacity(5_000, 12_000, 5_000), 20_000);
        assert_eq!(grown_capacity(20_000, 100, 5_000), 20_000);
    }

    #[test]
    fn vertex_layout_matches_input_elements() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
        assert_eq!(std::mem::size_of::<ScreenConstants>(), 16);
    }

    #[test]
    fn shaders_compile() {
        compile_shader(s!("vs_main"), s!("vs_4_0")).expect("vertex shader");
        compile_shader(s!("ps_main"), s!("ps_4_0")).expect("pixel shader");
    }
}
