use crate::error::ContextError;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use winit::dpi::PhysicalSize;
use winit::window::Window;

/// Identity of one embed block in the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId(pub String);

/// Per-instantiation nonce: the same textual block may spawn several
/// independent live instances (one per pane) without colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

/// The surface a context draws into: a host-owned window, or an offscreen
/// texture for headless rendering and capture.
pub enum RenderTarget {
    Window(Arc<Window>),
    Offscreen { width: u32, height: u32 },
}

/// Minimal contract the pool needs from an owned context.
pub trait PooledContext {
    fn is_lost(&self) -> bool;
    fn dispose(&mut self);
}

/// One GPU rendering context per logical embed instance.
pub struct RenderContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    surface: Option<wgpu::Surface<'static>>,
    surface_config: Option<wgpu::SurfaceConfiguration>,
    offscreen: Option<wgpu::Texture>,
    format: wgpu::TextureFormat,
    size: PhysicalSize<u32>,
    lost: bool,
}

pub struct Frame {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl Frame {
    pub fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

fn choose_surface_format(formats: &[wgpu::TextureFormat]) -> wgpu::TextureFormat {
    formats.iter().copied().find(|f| f.is_srgb()).unwrap_or(formats[0])
}

impl RenderContext {
    pub fn new_blocking(target: RenderTarget) -> Result<Self, ContextError> {
        pollster::block_on(Self::new(target))
    }

    pub async fn new(target: RenderTarget) -> Result<Self, ContextError> {
        let instance = wgpu::Instance::default();
        let surface = match &target {
            RenderTarget::Window(window) => Some(
                instance
                    .create_surface(window.clone())
                    .map_err(|err| ContextError::Exhausted(err.to_string()))?,
            ),
            RenderTarget::Offscreen { .. } => None,
        };
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| ContextError::Exhausted(err.to_string()))?;
        let required_limits = wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
        let device_desc = wgpu::DeviceDescriptor {
            label: Some("viewport device"),
            required_features: wgpu::Features::empty(),
            required_limits,
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_desc)
            .await
            .map_err(|err| ContextError::Exhausted(err.to_string()))?;

        let (size, format, surface_config) = match &target {
            RenderTarget::Window(window) => {
                let caps = surface
                    .as_ref()
                    .map(|surface| surface.get_capabilities(&adapter))
                    .ok_or_else(|| ContextError::Exhausted("window surface missing".to_string()))?;
                let format = choose_surface_format(&caps.formats);
                let size = window.inner_size();
                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width: size.width.max(1),
                    height: size.height.max(1),
                    present_mode: wgpu::PresentMode::Fifo,
                    alpha_mode: caps.alpha_modes[0],
                    view_formats: vec![],
                    desired_maximum_frame_latency: 2,
                };
                if let Some(surface) = &surface {
                    surface.configure(&device, &config);
                }
                (size, format, Some(config))
            }
            RenderTarget::Offscreen { width, height } => {
                (PhysicalSize::new(*width, *height), OFFSCREEN_FORMAT, None)
            }
        };

        let mut context = Self {
            device,
            queue,
            surface,
            surface_config,
            offscreen: None,
            format,
            size,
            lost: false,
        };
        if matches!(target, RenderTarget::Offscreen { .. }) {
            context.offscreen = Some(context.make_offscreen_texture());
        }
        Ok(context)
    }

    fn make_offscreen_texture(&self) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width: self.size.width.max(1),
                height: self.size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.size.height == 0 {
            1.0
        } else {
            self.size.width as f32 / self.size.height as f32
        }
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        if let (Some(surface), Some(config)) = (&self.surface, &mut self.surface_config) {
            config.width = new_size.width;
            config.height = new_size.height;
            surface.configure(&self.device, config);
        }
        if self.offscreen.is_some() {
            self.offscreen = Some(self.make_offscreen_texture());
        }
    }

    pub fn begin_frame(&mut self) -> Result<Frame, ContextError> {
        if self.lost {
            return Err(ContextError::Lost);
        }
        if let Some(surface) = &self.surface {
            let surface_texture = surface.get_current_texture().map_err(|err| match err {
                wgpu::SurfaceError::OutOfMemory => ContextError::Exhausted(err.to_string()),
                _ => ContextError::Lost,
            })?;
            let view = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
            return Ok(Frame { view, surface_texture: Some(surface_texture) });
        }
        let texture = self
            .offscreen
            .as_ref()
            .ok_or_else(|| ContextError::Exhausted("context has no render target".to_string()))?;
        Ok(Frame { view: texture.create_view(&wgpu::TextureViewDescriptor::default()), surface_texture: None })
    }
}

impl PooledContext for RenderContext {
    fn is_lost(&self) -> bool {
        self.lost
    }

    /// Forces deterministic reclamation of driver resources instead of
    /// waiting for garbage collection of the handle.
    fn dispose(&mut self) {
        self.offscreen = None;
        self.surface = None;
        self.device.destroy();
        self.lost = true;
    }
}

/// Process-wide registry of live contexts, keyed block → instance.
/// `acquire` and `release` are the only mutators; single-threaded event
/// handling stands in for locking.
pub struct ContextPool<C: PooledContext = RenderContext> {
    entries: HashMap<BlockId, HashMap<InstanceId, C>>,
}

impl<C: PooledContext> ContextPool<C> {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Returns the existing context for this exact (block, instance) pair,
    /// building one via `build` otherwise.
    pub fn acquire(
        &mut self,
        block: &BlockId,
        instance: InstanceId,
        build: impl FnOnce() -> Result<C, ContextError>,
    ) -> Result<&mut C, ContextError> {
        let instances = self.entries.entry(block.clone()).or_default();
        if !instances.contains_key(&instance) {
            match build() {
                Ok(context) => {
                    instances.insert(instance, context);
                }
                Err(err) => {
                    if instances.is_empty() {
                        self.entries.remove(block);
                    }
                    return Err(err);
                }
            }
        }
        self.entries
            .get_mut(block)
            .and_then(|instances| instances.get_mut(&instance))
            .ok_or_else(|| ContextError::Exhausted("context vanished during acquire".to_string()))
    }

    pub fn get_mut(&mut self, block: &BlockId, instance: InstanceId) -> Option<&mut C> {
        self.entries.get_mut(block)?.get_mut(&instance)
    }

    /// Tears the context down and removes the entry; the block entry goes
    /// too when this was its last instance. Returns whether anything was
    /// released.
    pub fn release(&mut self, block: &BlockId, instance: InstanceId) -> bool {
        let Some(instances) = self.entries.get_mut(block) else {
            return false;
        };
        let Some(mut context) = instances.remove(&instance) else {
            return false;
        };
        context.dispose();
        if instances.is_empty() {
            self.entries.remove(block);
        }
        true
    }

    pub fn contains(&self, block: &BlockId, instance: InstanceId) -> bool {
        self.entries.get(block).is_some_and(|instances| instances.contains_key(&instance))
    }

    pub fn block_count(&self) -> usize {
        self.entries.len()
    }

    pub fn instance_count(&self, block: &BlockId) -> usize {
        self.entries.get(block).map(HashMap::len).unwrap_or(0)
    }
}

impl<C: PooledContext> Default for ContextPool<C> {
    fn default() -> Self {
        Self::new()
    }
}
