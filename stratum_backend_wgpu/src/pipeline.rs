// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The single render pipeline every quad goes through.
//!
//! Each draw binds one uniform block and up to four textures: the colour
//! source (one RGBA texture, or the three planes of a Y/Cb/Cr image) and
//! the mask. Unused slots are bound to a 1x1 placeholder.

use bytemuck::{Pod, Zeroable};
use stratum_core::transform::{Homography, Transform3d};

const QUAD_SHADER: &str = r"
struct Quad {
    transform: mat4x4<f32>,
    // Rows of the inverse mask homography.
    mask_x: vec4<f32>,
    mask_y: vec4<f32>,
    mask_w: vec4<f32>,
    color: vec4<f32>,
    rect: vec4<f32>,
    uv_rect: vec4<f32>,
    // Target width and height, then the shift from target pixels to
    // device positions before the draw offset.
    viewport_px: vec4<f32>,
    mask_size: vec4<f32>,
    // Opacity, source kind, mask flag.
    params: vec4<f32>,
}

@group(0) @binding(0) var<uniform> quad: Quad;
@group(0) @binding(1) var src0: texture_2d<f32>;
@group(0) @binding(2) var src1: texture_2d<f32>;
@group(0) @binding(3) var src2: texture_2d<f32>;
@group(0) @binding(4) var src_sampler: sampler;
@group(0) @binding(5) var mask_tex: texture_2d<f32>;
@group(0) @binding(6) var mask_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2(0.0, 0.0),
        vec2(1.0, 0.0),
        vec2(0.0, 1.0),
        vec2(0.0, 1.0),
        vec2(1.0, 0.0),
        vec2(1.0, 1.0),
    );
    let t = corners[vi];
    let p = mix(quad.rect.xy, quad.rect.zw, t);
    let d = quad.transform * vec4(p, 0.0, 1.0);
    // Stay homogeneous so the rasteriser interpolates uv with perspective.
    let x = d.x - quad.viewport_px.z * d.w;
    let y = d.y - quad.viewport_px.w * d.w;
    var out: VertexOutput;
    out.clip_position = vec4(
        2.0 * x / quad.viewport_px.x - d.w,
        d.w - 2.0 * y / quad.viewport_px.y,
        0.0,
        d.w,
    );
    out.uv = mix(quad.uv_rect.xy, quad.uv_rect.zw, t);
    return out;
}

fn bt601_limited(y: f32, cb: f32, cr: f32) -> vec3<f32> {
    let l = (y - 16.0) / 219.0;
    let b = (cb - 128.0) / 224.0;
    let r = (cr - 128.0) / 224.0;
    let rgb = vec3(l + 1.402 * r, l - 0.344136 * b - 0.714136 * r, l + 1.772 * b);
    return clamp(rgb, vec3(0.0), vec3(1.0));
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let rgba = textureSample(src0, src_sampler, in.uv);
    let cb = textureSample(src1, src_sampler, in.uv).r;
    let cr = textureSample(src2, src_sampler, in.uv).r;

    let q = vec3(in.clip_position.xy + quad.viewport_px.zw, 1.0);
    let mw = dot(quad.mask_w.xyz, q);
    let m = vec2(dot(quad.mask_x.xyz, q), dot(quad.mask_y.xyz, q)) / mw;
    let mask_alpha = textureSample(mask_tex, mask_sampler, m / max(quad.mask_size.xy, vec2(1.0))).a;

    let kind = u32(quad.params.y);
    var color = quad.color;
    if kind == 1u {
        color = rgba;
    } else if kind == 2u {
        color = vec4(bt601_limited(rgba.r * 255.0, cb * 255.0, cr * 255.0), 1.0);
    }

    var coverage = quad.params.x;
    if quad.params.z > 0.5 {
        let inside = mw > 0.0 && all(m >= vec2(0.0)) && all(m < quad.mask_size.xy);
        coverage *= select(0.0, mask_alpha, inside);
    }
    return color * coverage;
}
";

/// Which colour source the fragment shader reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SourceKind {
    Solid = 0,
    Rgba = 1,
    Planar = 2,
}

/// Uniform block matching `Quad` in the shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub(crate) struct QuadUniforms {
    pub(crate) transform: [[f32; 4]; 4],
    pub(crate) mask_x: [f32; 4],
    pub(crate) mask_y: [f32; 4],
    pub(crate) mask_w: [f32; 4],
    pub(crate) color: [f32; 4],
    pub(crate) rect: [f32; 4],
    pub(crate) uv_rect: [f32; 4],
    pub(crate) viewport_px: [f32; 4],
    pub(crate) mask_size: [f32; 4],
    pub(crate) params: [f32; 4],
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "the GPU works in f32; layer geometry fits comfortably"
)]
fn narrow(v: f64) -> f32 {
    v as f32
}

impl QuadUniforms {
    pub(crate) fn new(transform: &Transform3d, rect: kurbo::Rect, opacity: f32, source: SourceKind) -> Self {
        let cols = transform.to_cols_array_2d();
        Self {
            transform: cols.map(|c| c.map(narrow)),
            rect: [rect.x0, rect.y0, rect.x1, rect.y1].map(narrow),
            uv_rect: [0.0, 0.0, 1.0, 1.0],
            params: [opacity, f32::from(source as u8), 0.0, 0.0],
            ..Self::default()
        }
    }

    /// Sets the target size and the shift from target pixels back to
    /// pre-offset device positions.
    pub(crate) fn set_viewport(&mut self, width: u32, height: u32, shift_x: i32, shift_y: i32) {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "target sizes and offsets are far below f32 precision limits"
        )]
        let v = [width as f32, height as f32, shift_x as f32, shift_y as f32];
        self.viewport_px = v;
    }

    /// Installs the mask's inverse placement.
    pub(crate) fn set_mask(&mut self, inverse: &Homography, width: u32, height: u32) {
        let c = &inverse.cols;
        self.mask_x = [c[0][0], c[1][0], c[2][0], 0.0].map(narrow);
        self.mask_y = [c[0][1], c[1][1], c[2][1], 0.0].map(narrow);
        self.mask_w = [c[0][2], c[1][2], c[2][2], 0.0].map(narrow);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "mask sizes are bounded by the texture limit"
        )]
        let size = [width as f32, height as f32, 0.0, 0.0];
        self.mask_size = size;
        self.params[2] = 1.0;
    }
}

/// Pipeline plus the long-lived objects every draw shares.
#[derive(Debug)]
pub(crate) struct QuadPipeline {
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) layout: wgpu::BindGroupLayout,
    pub(crate) nearest: wgpu::Sampler,
    pub(crate) linear: wgpu::Sampler,
    pub(crate) placeholder: wgpu::TextureView,
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn sampler(device: &wgpu::Device, label: &str, filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..wgpu::SamplerDescriptor::default()
    })
}

impl QuadPipeline {
    pub(crate) fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stratum quad shader"),
            source: wgpu::ShaderSource::Wgsl(QUAD_SHADER.into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stratum quad bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(size_of::<QuadUniforms>() as u64),
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                sampler_entry(4),
                texture_entry(5),
                sampler_entry(6),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("stratum quad layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("stratum quad pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let placeholder = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("stratum placeholder"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            pipeline,
            layout,
            nearest: sampler(device, "stratum nearest sampler", wgpu::FilterMode::Nearest),
            linear: sampler(device, "stratum linear sampler", wgpu::FilterMode::Linear),
            placeholder,
        }
    }
}
