use crate::compose::{compose, ViewportScene};
use crate::context::{BlockId, InstanceId, PooledContext, RenderContext, RenderTarget};
use crate::description::SceneDescription;
use crate::error::BlockError;
use crate::load::load_models;
use crate::renderer::Renderer;
use crate::resolve::AssetResolver;
use crate::settings::ViewerSettings;
use winit::dpi::PhysicalSize;

/// One live embed occurrence: an owned context, renderer and composed
/// scene. The host's frame callback drives [`ViewportInstance::frame`]; the
/// lifecycle manager drives [`ViewportInstance::dispose`].
pub struct ViewportInstance {
    pub block: BlockId,
    pub instance: InstanceId,
    pub scene: ViewportScene,
    pub context: RenderContext,
    pub renderer: Renderer,
}

impl ViewportInstance {
    /// Parses nothing: the description must already be validated. Blocks on
    /// the model-load barrier (all requested models settle, failures are
    /// tolerated), then composes and stands up the GPU context.
    pub fn new(
        block: BlockId,
        description: SceneDescription,
        resolver: &dyn AssetResolver,
        settings: &ViewerSettings,
        target: RenderTarget,
    ) -> Result<Self, BlockError> {
        let loaded = pollster::block_on(load_models(
            &description.models,
            resolver,
            settings.first_model_policy,
        ))?;
        let scene = compose(description, loaded, resolver);
        let context = RenderContext::new_blocking(target)?;
        let renderer = Renderer::new(&context);
        Ok(Self { block, instance: InstanceId::new(), scene, context, renderer })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }

    /// One tick of the render loop: advance, then draw. Returns `false`
    /// once the context is lost, which is the loop's only cancellation
    /// check; the caller must not reschedule after that.
    pub fn frame(&mut self, dt: f32) -> bool {
        if self.context.is_lost() {
            return false;
        }
        if let Some(map) = self.scene.advance(dt) {
            self.renderer.set_environment(&self.context, &map);
        }
        let frame = match self.context.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("frame acquisition failed: {err}");
                return !self.context.is_lost();
            }
        };
        if let Err(err) = self.renderer.render_pass(&self.context, &frame.view, &self.scene, None, true)
        {
            log::warn!("draw failed: {err}");
        }
        frame.present();
        true
    }

    pub fn dispose(&mut self) {
        self.context.dispose();
    }
}

/// Whole instances can live in the [`crate::context::ContextPool`], keyed
/// by (block, instance), so releasing the pool entry tears down the GPU
/// context with it.
impl PooledContext for ViewportInstance {
    fn is_lost(&self) -> bool {
        self.context.is_lost()
    }

    fn dispose(&mut self) {
        self.context.dispose();
    }
}
