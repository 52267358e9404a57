use crate::compose::ViewportScene;
use crate::context::RenderContext;
use crate::description::{Background, LightKind};
use crate::environment::EnvironmentMap;
use crate::error::ContextError;
use crate::graph::NodeKind;
use crate::mesh::{Mesh, MeshTopology, MeshVertex};
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

const MAX_LIGHTS: usize = 8;
const OBJECT_STRIDE: u64 = 256;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct LightUniform {
    position: [f32; 4],
    direction: [f32; 4],
    color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    inv_view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    counts: [u32; 4],
    lights: [LightUniform; MAX_LIGHTS],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ObjectUniform {
    model: [[f32; 4]; 4],
    color: [f32; 4],
    flags: [f32; 4],
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    edge_buffer: Option<wgpu::Buffer>,
    edge_count: u32,
}

struct DrawItem {
    mesh: Arc<Mesh>,
    model: Mat4,
    color: [f32; 4],
    unlit: bool,
    wireframe: bool,
}

/// Forward renderer shared by single viewports and grid cells. Viewport and
/// scissor state is per-pass, so each cell issues its own clipped pass.
pub struct Renderer {
    pipeline_tri: wgpu::RenderPipeline,
    pipeline_line: wgpu::RenderPipeline,
    pipeline_background: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    object_bgl: wgpu::BindGroupLayout,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    object_capacity: usize,
    env_bgl: wgpu::BindGroupLayout,
    env_bind_group: Option<wgpu::BindGroup>,
    env_sampler: wgpu::Sampler,
    depth_view: wgpu::TextureView,
    depth_size: (u32, u32),
    meshes: HashMap<usize, GpuMesh>,
}

impl Renderer {
    pub fn new(context: &RenderContext) -> Self {
        let device = &context.device;
        let format = context.format();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Viewport Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../assets/shaders/viewport.wgsl").into()),
        });

        let globals_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Globals Buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals BG"),
            layout: &globals_bgl,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: globals_buffer.as_entire_binding() }],
        });

        let object_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Object BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<ObjectUniform>() as u64),
                },
                count: None,
            }],
        });
        let object_capacity = 64;
        let object_buffer = Self::make_object_buffer(device, object_capacity);
        let object_bind_group =
            Self::make_object_bind_group(device, &object_bgl, &object_buffer);

        let env_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Environment BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
        let env_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Environment Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&globals_bgl, &object_bgl],
            push_constant_ranges: &[],
        });
        let depth_state = wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        };
        let color_target = Some(wgpu::ColorTargetState {
            format,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        });

        let make_mesh_pipeline = |label: &str, topology: wgpu::PrimitiveTopology| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&mesh_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_mesh"),
                    buffers: &[MeshVertex::layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_mesh"),
                    targets: &[color_target.clone()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState { topology, ..Default::default() },
                depth_stencil: Some(depth_state.clone()),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };
        let pipeline_tri = make_mesh_pipeline("Mesh Pipeline", wgpu::PrimitiveTopology::TriangleList);
        let pipeline_line = make_mesh_pipeline("Line Pipeline", wgpu::PrimitiveTopology::LineList);

        let background_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Background Pipeline Layout"),
            bind_group_layouts: &[&globals_bgl, &env_bgl],
            push_constant_ranges: &[],
        });
        let pipeline_background = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Background Pipeline"),
            layout: Some(&background_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_background"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_background"),
                targets: &[color_target],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                ..depth_state
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let size = context.size();
        let depth_view = Self::make_depth_view(device, size.width.max(1), size.height.max(1));

        Self {
            pipeline_tri,
            pipeline_line,
            pipeline_background,
            globals_buffer,
            globals_bind_group,
            object_bgl,
            object_buffer,
            object_bind_group,
            object_capacity,
            env_bgl,
            env_bind_group: None,
            env_sampler,
            depth_view,
            depth_size: (size.width.max(1), size.height.max(1)),
            meshes: HashMap::new(),
        }
    }

    fn make_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn make_object_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Buffer"),
            size: capacity as u64 * OBJECT_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn make_object_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Object BG"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ObjectUniform>() as u64),
                }),
            }],
        })
    }

    /// Uploads a hot-swapped equirectangular environment map.
    pub fn set_environment(&mut self, context: &RenderContext, map: &EnvironmentMap) {
        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Environment Texture"),
            size: wgpu::Extent3d { width: map.width, height: map.height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&map.texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(map.width * 8),
                rows_per_image: Some(map.height),
            },
            wgpu::Extent3d { width: map.width, height: map.height, depth_or_array_layers: 1 },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.env_bind_group = Some(context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Environment BG"),
            layout: &self.env_bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.env_sampler),
                },
            ],
        }));
    }

    fn ensure_depth(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.depth_size != (width, height) {
            self.depth_view = Self::make_depth_view(device, width, height);
            self.depth_size = (width, height);
        }
    }

    fn ensure_object_capacity(&mut self, device: &wgpu::Device, count: usize) {
        if count <= self.object_capacity {
            return;
        }
        let mut capacity = self.object_capacity.max(64);
        while capacity < count {
            capacity *= 2;
        }
        self.object_buffer = Self::make_object_buffer(device, capacity);
        self.object_bind_group = Self::make_object_bind_group(device, &self.object_bgl, &self.object_buffer);
        self.object_capacity = capacity;
    }

    fn gpu_mesh(&mut self, device: &wgpu::Device, mesh: &Arc<Mesh>, wireframe: bool) -> &GpuMesh {
        let key = Arc::as_ptr(mesh) as usize;
        let entry = self.meshes.entry(key).or_insert_with(|| {
            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh VB"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh IB"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
                edge_buffer: None,
                edge_count: 0,
            }
        });
        if wireframe && entry.edge_buffer.is_none() && mesh.topology == MeshTopology::Triangles {
            let edges = mesh.edge_indices();
            entry.edge_count = edges.len() as u32;
            entry.edge_buffer = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Edge IB"),
                contents: bytemuck::cast_slice(&edges),
                usage: wgpu::BufferUsages::INDEX,
            }));
        }
        entry
    }

    fn collect_items(scene: &ViewportScene) -> Vec<DrawItem> {
        let mut items = Vec::new();
        for (id, node) in scene.graph.iter() {
            let NodeKind::Mesh(instance) = &node.kind else {
                continue;
            };
            if !scene.graph.effectively_visible(id) {
                continue;
            }
            items.push(DrawItem {
                mesh: instance.mesh.clone(),
                model: scene.graph.world_matrix(id),
                color: instance.material.base_color,
                unlit: instance.material.unlit,
                wireframe: instance.material.wireframe,
            });
        }
        items
    }

    fn collect_lights(scene: &ViewportScene) -> ([LightUniform; MAX_LIGHTS], u32) {
        let mut lights = [LightUniform {
            position: [0.0; 4],
            direction: [0.0; 4],
            color: [0.0; 4],
        }; MAX_LIGHTS];
        let mut count = 0usize;
        for (id, node) in scene.graph.iter() {
            let NodeKind::Light(light) = &node.kind else {
                continue;
            };
            if count >= MAX_LIGHTS {
                log::warn!("more than {MAX_LIGHTS} lights declared; extras ignored");
                break;
            }
            let position = scene.graph.world_position(id);
            let kind = match light.kind {
                LightKind::Point => 0.0,
                LightKind::Directional | LightKind::CameraDirectional => 1.0,
                LightKind::Ambient => 2.0,
                LightKind::Spot => 3.0,
            };
            let direction = (light.target - position).normalize_or_zero();
            let direction = if direction == Vec3::ZERO { -Vec3::Y } else { direction };
            lights[count] = LightUniform {
                position: [position.x, position.y, position.z, kind],
                direction: [direction.x, direction.y, direction.z, light.cone_cos],
                color: [light.color.x, light.color.y, light.color.z, light.strength],
            };
            count += 1;
        }
        (lights, count as u32)
    }

    fn clear_color(scene: &ViewportScene) -> wgpu::Color {
        match scene.background {
            Background::Transparent => wgpu::Color::TRANSPARENT,
            Background::Color(color) => wgpu::Color {
                r: color.x as f64,
                g: color.y as f64,
                b: color.z as f64,
                a: 1.0,
            },
            Background::Environment { .. } => wgpu::Color { r: 0.02, g: 0.02, b: 0.03, a: 1.0 },
        }
    }

    /// Draws one scene into `view`, optionally clipped to a pixel rectangle
    /// (x, y from the top-left, width, height). `clear` selects between a
    /// full clear and loading the previous cells' output.
    pub fn render_pass(
        &mut self,
        context: &RenderContext,
        view: &wgpu::TextureView,
        scene: &ViewportScene,
        rect: Option<[u32; 4]>,
        clear: bool,
    ) -> Result<(), ContextError> {
        let size = context.size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        self.ensure_depth(&context.device, size.width, size.height);

        let [x, y, width, height] = rect.unwrap_or([0, 0, size.width, size.height]);
        let width = width.min(size.width.saturating_sub(x)).max(1);
        let height = height.min(size.height.saturating_sub(y)).max(1);
        let aspect = width as f32 / height as f32;

        let view_proj = scene.camera.projection_matrix(aspect) * scene.camera.view_matrix();
        let (lights, light_count) = Self::collect_lights(scene);
        let globals = Globals {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            camera_pos: [scene.camera.position.x, scene.camera.position.y, scene.camera.position.z, 1.0],
            counts: [light_count, 0, 0, 0],
            lights,
        };
        context.queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let items = Self::collect_items(scene);
        self.ensure_object_capacity(&context.device, items.len());
        for (index, item) in items.iter().enumerate() {
            let uniform = ObjectUniform {
                model: item.model.to_cols_array_2d(),
                color: item.color,
                flags: [if item.unlit { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
            };
            context.queue.write_buffer(
                &self.object_buffer,
                index as u64 * OBJECT_STRIDE,
                bytemuck::bytes_of(&uniform),
            );
        }
        for item in &items {
            self.gpu_mesh(&context.device, &item.mesh, item.wireframe);
        }

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Viewport Encoder") });
        {
            let (color_load, depth_load) = if clear {
                (wgpu::LoadOp::Clear(Self::clear_color(scene)), wgpu::LoadOp::Clear(1.0))
            } else {
                (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Viewport Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations { load: color_load, store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations { load: depth_load, store: wgpu::StoreOp::Store }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_viewport(x as f32, y as f32, width as f32, height as f32, 0.0, 1.0);
            pass.set_scissor_rect(x, y, width, height);
            pass.set_bind_group(0, &self.globals_bind_group, &[]);

            let show_env_background = matches!(
                scene.background,
                Background::Environment { scene_background: true }
            );
            if show_env_background {
                if let Some(env_bind_group) = &self.env_bind_group {
                    pass.set_pipeline(&self.pipeline_background);
                    pass.set_bind_group(1, env_bind_group, &[]);
                    pass.draw(0..3, 0..1);
                }
            }

            for (index, item) in items.iter().enumerate() {
                let key = Arc::as_ptr(&item.mesh) as usize;
                let Some(gpu) = self.meshes.get(&key) else {
                    continue;
                };
                let draw_lines = item.wireframe || item.mesh.topology == MeshTopology::Lines;
                pass.set_pipeline(if draw_lines { &self.pipeline_line } else { &self.pipeline_tri });
                let offset = (index as u64 * OBJECT_STRIDE) as u32;
                pass.set_bind_group(1, &self.object_bind_group, &[offset]);
                pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
                if item.wireframe && item.mesh.topology == MeshTopology::Triangles {
                    if let Some(edge_buffer) = &gpu.edge_buffer {
                        pass.set_index_buffer(edge_buffer.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(0..gpu.edge_count, 0, 0..1);
                        continue;
                    }
                }
                pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..gpu.index_count, 0, 0..1);
            }
        }
        context.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
