//! Draws [`DrawOp`]s onto the wallpaper surface and implements the
//! [`TextureStore`] the rest of the engine uploads photographs through.
//!
//! Transforms are applied on the CPU: every op is four NDC corners run
//! through its `Mat4` before they hit the vertex buffer, so the pipelines
//! stay uniform-free and one pass draws the whole collage.

use std::collections::HashMap;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use image::RgbaImage;
use tracing::trace;
use wgpu::util::{BufferInitDescriptor, DeviceExt, TextureDataOrder};

use tileconfig::Color;

use crate::texture::{TextureId, TextureStore};
use crate::transitions::DrawOp;

use super::context::GpuContext;

const PHOTO_SHADER: &str = r#"
struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) pos: vec2<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.position = vec4<f32>(pos, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@group(0) @binding(0) var photo: texture_2d<f32>;
@group(0) @binding(1) var photo_sampler: sampler;

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(photo, photo_sampler, in.uv);
}
"#;

const SOLID_SHADER: &str = r#"
struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(0) pos: vec2<f32>, @location(1) color: vec4<f32>) -> VsOut {
    var out: VsOut;
    out.position = vec4<f32>(pos, 0.0, 1.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Texture coordinates matching the quad corner order bottom-left,
/// bottom-right, top-left, top-right.
const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]];

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct PhotoVertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SolidVertex {
    pos: [f32; 2],
    color: [f32; 4],
}

struct TextureEntry {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

pub struct GpuScene {
    device: wgpu::Device,
    queue: wgpu::Queue,
    photo_pipeline: wgpu::RenderPipeline,
    solid_pipeline: wgpu::RenderPipeline,
    photo_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    textures: HashMap<TextureId, TextureEntry>,
    next_id: u32,
}

impl GpuScene {
    pub fn new(context: &GpuContext) -> Self {
        let device = context.device.clone();
        let queue = context.queue.clone();
        let format = context.config.format;

        let photo_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("photo layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let photo_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("photo shader"),
            source: wgpu::ShaderSource::Wgsl(PHOTO_SHADER.into()),
        });
        let solid_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("solid shader"),
            source: wgpu::ShaderSource::Wgsl(SOLID_SHADER.into()),
        });

        let photo_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("photo pipeline layout"),
                bind_group_layouts: &[&photo_layout],
                push_constant_ranges: &[],
            });
        let solid_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("solid pipeline layout"),
                bind_group_layouts: &[],
                push_constant_ranges: &[],
            });

        let photo_pipeline = create_quad_pipeline(
            &device,
            "photo pipeline",
            &photo_pipeline_layout,
            &photo_module,
            format,
            &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
            std::mem::size_of::<PhotoVertex>() as wgpu::BufferAddress,
        );
        let solid_pipeline = create_quad_pipeline(
            &device,
            "solid pipeline",
            &solid_pipeline_layout,
            &solid_module,
            format,
            &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4],
            std::mem::size_of::<SolidVertex>() as wgpu::BufferAddress,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            device,
            queue,
            photo_pipeline,
            solid_pipeline,
            photo_layout,
            sampler,
            textures: HashMap::new(),
            next_id: 0,
        }
    }

    /// Encodes every op in order onto `view`, clearing to `background`.
    pub fn render(&self, view: &wgpu::TextureView, ops: &[DrawOp], background: Color) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: background.r as f64,
                            g: background.g as f64,
                            b: background.b as f64,
                            a: background.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for op in ops {
                match op {
                    DrawOp::Textured {
                        texture,
                        vertices,
                        transform,
                    } => {
                        let Some(entry) = self.textures.get(texture) else {
                            trace!(id = texture.0, "skipping draw for unknown texture");
                            continue;
                        };
                        let corners = transformed_corners(vertices, transform);
                        let data: Vec<PhotoVertex> = corners
                            .iter()
                            .zip(QUAD_UVS.iter())
                            .map(|(pos, uv)| PhotoVertex { pos: *pos, uv: *uv })
                            .collect();
                        let buffer = self.device.create_buffer_init(&BufferInitDescriptor {
                            label: Some("photo vertices"),
                            contents: bytemuck::cast_slice(&data),
                            usage: wgpu::BufferUsages::VERTEX,
                        });
                        pass.set_pipeline(&self.photo_pipeline);
                        pass.set_bind_group(0, &entry.bind_group, &[]);
                        pass.set_vertex_buffer(0, buffer.slice(..));
                        pass.draw(0..4, 0..1);
                    }
                    DrawOp::Colored {
                        vertices,
                        color,
                        transform,
                    } => {
                        let corners = transformed_corners(vertices, transform);
                        let rgba = [color.r, color.g, color.b, color.a];
                        let data: Vec<SolidVertex> = corners
                            .iter()
                            .map(|pos| SolidVertex { pos: *pos, color: rgba })
                            .collect();
                        let buffer = self.device.create_buffer_init(&BufferInitDescriptor {
                            label: Some("solid vertices"),
                            contents: bytemuck::cast_slice(&data),
                            usage: wgpu::BufferUsages::VERTEX,
                        });
                        pass.set_pipeline(&self.solid_pipeline);
                        pass.set_vertex_buffer(0, buffer.slice(..));
                        pass.draw(0..4, 0..1);
                    }
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl TextureStore for GpuScene {
    fn upload(&mut self, image: &RgbaImage) -> Result<TextureId> {
        let (width, height) = image.dimensions();
        anyhow::ensure!(width > 0 && height > 0, "cannot upload an empty image");
        let id = TextureId(self.next_id);
        self.next_id += 1;

        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(&format!("photo texture #{}", id.0)),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            image.as_raw(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("photo bind group #{}", id.0)),
                layout: &self.photo_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });

        self.textures.insert(
            id,
            TextureEntry {
                _texture: texture,
                bind_group,
            },
        );
        trace!(id = id.0, width, height, "uploaded texture");
        Ok(id)
    }

    fn delete(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_some() {
            trace!(id = id.0, "deleted texture");
        }
    }

    fn contains(&self, id: TextureId) -> bool {
        self.textures.contains_key(&id)
    }
}

/// Runs the quad corners through the op's transform. The transforms are
/// affine, so the perspective divide is a no-op and z can be dropped.
fn transformed_corners(vertices: &[f32; 8], transform: &Mat4) -> [[f32; 2]; 4] {
    let mut corners = [[0.0f32; 2]; 4];
    for (i, corner) in corners.iter_mut().enumerate() {
        let p = transform.transform_point3(Vec3::new(vertices[i * 2], vertices[i * 2 + 1], 0.0));
        *corner = [p.x, p.y];
    }
    corners
}

fn create_quad_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    attributes: &[wgpu::VertexAttribute],
    stride: wgpu::BufferAddress,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}
