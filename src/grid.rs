use crate::compose::ViewportScene;
use crate::context::{PooledContext, RenderContext};
use crate::description::GridSettings;
use crate::error::ContextError;
use crate::renderer::Renderer;
use glam::Vec2;
use winit::dpi::PhysicalSize;

/// Derived pixel rectangle of one cell inside the shared surface. Origin is
/// the bottom-left of the surface; never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubViewport {
    pub cell: usize,
    pub left: f32,
    pub bottom: f32,
    pub width: f32,
    pub height: f32,
}

impl SubViewport {
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.left
            && point.x < self.left + self.width
            && point.y >= self.bottom
            && point.y < self.bottom + self.height
    }

    /// Rectangle as (x, y, w, h) with y measured from the top of a surface
    /// of `surface_height` pixels, the convention render passes use.
    pub fn to_top_left(&self, surface_height: u32) -> [u32; 4] {
        let top = surface_height as f32 - self.bottom - self.height;
        [
            self.left.max(0.0) as u32,
            top.max(0.0) as u32,
            self.width.max(1.0) as u32,
            self.height.max(1.0) as u32,
        ]
    }
}

/// Row/column layout: column width tracks the container, row height is
/// static per configuration.
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub columns: usize,
    pub row_height: f32,
    pub gap_x: f32,
    pub gap_y: f32,
}

impl From<&GridSettings> for GridLayout {
    fn from(settings: &GridSettings) -> Self {
        Self {
            columns: settings.columns.max(1),
            row_height: settings.row_height.max(1.0),
            gap_x: settings.gap_x.max(0.0),
            gap_y: settings.gap_y.max(0.0),
        }
    }
}

impl GridLayout {
    pub fn rows(&self, cell_count: usize) -> usize {
        cell_count.div_ceil(self.columns)
    }

    pub fn surface_height(&self, cell_count: usize) -> f32 {
        let rows = self.rows(cell_count) as f32;
        rows * self.row_height + (rows - 1.0).max(0.0) * self.gap_y
    }

    pub fn column_width(&self, container_width: f32) -> f32 {
        let columns = self.columns as f32;
        ((container_width - (columns - 1.0) * self.gap_x) / columns).max(1.0)
    }

    /// Rectangles for `cell_count` cells in a container of `container_width`
    /// pixels. Cells fill rows left to right, top row first.
    pub fn rects(&self, cell_count: usize, container_width: f32) -> Vec<SubViewport> {
        let column_width = self.column_width(container_width);
        let total_height = self.surface_height(cell_count);
        (0..cell_count)
            .map(|cell| {
                let row = cell / self.columns;
                let column = cell % self.columns;
                let left = column as f32 * (column_width + self.gap_x);
                let top = row as f32 * (self.row_height + self.gap_y);
                let bottom = total_height - top - self.row_height;
                SubViewport { cell, left, bottom, width: column_width, height: self.row_height }
            })
            .collect()
    }
}

/// N independent (scene, camera, controls) tuples sharing one context and
/// one drawing surface, drawn by one loop with scissored passes.
pub struct GridCompositor {
    pub cells: Vec<ViewportScene>,
    layout: GridLayout,
    rects: Vec<SubViewport>,
    active: Option<usize>,
    measured: PhysicalSize<u32>,
}

impl GridCompositor {
    pub fn new(cells: Vec<ViewportScene>, settings: &GridSettings) -> Self {
        Self {
            cells,
            layout: GridLayout::from(settings),
            rects: Vec::new(),
            active: None,
            measured: PhysicalSize::new(0, 0),
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn rects(&self) -> &[SubViewport] {
        &self.rects
    }

    pub fn active_cell(&self) -> Option<usize> {
        self.active
    }

    /// The surface may be attached before layout has given it a size; cell
    /// rectangles stay deferred until a nonzero measurement arrives.
    pub fn set_measured_size(&mut self, size: PhysicalSize<u32>) {
        if size != self.measured {
            self.measured = size;
            self.relayout();
        }
    }

    pub fn set_columns(&mut self, columns: usize) {
        self.layout.columns = columns.max(1);
        self.relayout();
    }

    fn relayout(&mut self) {
        if self.measured.width == 0 || self.measured.height == 0 {
            self.rects.clear();
            return;
        }
        self.rects = self.layout.rects(self.cells.len(), self.measured.width as f32);
    }

    /// Routes pointer movement: at most one cell's controls are active at a
    /// time, chosen by hit-testing the pointer against cell rectangles.
    /// Position is in surface pixels with a bottom-left origin.
    pub fn pointer_moved(&mut self, position: Vec2) -> Option<usize> {
        let hit = self.rects.iter().find(|rect| rect.contains(position)).map(|rect| rect.cell);
        if hit == self.active {
            return self.active;
        }
        if let Some(previous) = self.active {
            if let Some(cell) = self.cells.get_mut(previous) {
                cell.controls.enabled = false;
            }
        }
        if let Some(index) = hit {
            if let Some(cell) = self.cells.get_mut(index) {
                cell.controls.enabled = true;
            }
        }
        self.active = hit;
        self.active
    }

    pub fn pointer_drag(&mut self, delta: Vec2) {
        if let Some(active) = self.active {
            if let Some(cell) = self.cells.get_mut(active) {
                cell.controls.pointer_drag(delta);
            }
        }
    }

    pub fn wheel(&mut self, factor: f32) {
        if let Some(active) = self.active {
            if let Some(cell) = self.cells.get_mut(active) {
                cell.controls.wheel(factor);
            }
        }
    }

    /// One shared frame: per cell in sequence, advance state and then issue
    /// a scissored draw. Viewport/scissor state is global to the context,
    /// so draws stay interleaved with their own state.
    pub fn frame(
        &mut self,
        context: &mut RenderContext,
        renderer: &mut Renderer,
        dt: f32,
    ) -> Result<(), ContextError> {
        if context.is_lost() {
            return Err(ContextError::Lost);
        }
        self.set_measured_size(context.size());
        if self.rects.is_empty() {
            // Still waiting for a nonzero measured size.
            return Ok(());
        }
        let frame = context.begin_frame()?;
        let surface_height = context.size().height;
        for (index, rect) in self.rects.iter().enumerate() {
            let Some(scene) = self.cells.get_mut(index) else {
                continue;
            };
            if let Some(map) = scene.advance(dt) {
                renderer.set_environment(context, &map);
            }
            renderer.render_pass(
                context,
                &frame.view,
                scene,
                Some(rect.to_top_left(surface_height)),
                index == 0,
            )?;
        }
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::compose;
    use crate::description::{CameraSpec, SceneDescription, SceneSettings};
    use crate::load::LoadOutcome;
    use crate::resolve::{AssetLocation, AssetResolver};

    struct NullResolver;

    impl AssetResolver for NullResolver {
        fn resolve(&self, _name: &str) -> Option<AssetLocation> {
            None
        }
    }

    fn settings(columns: usize) -> GridSettings {
        GridSettings { columns, row_height: 100.0, gap_x: 10.0, gap_y: 10.0 }
    }

    fn empty_scene() -> ViewportScene {
        let description = SceneDescription {
            models: Vec::new(),
            camera: CameraSpec { orthographic: false, cam_pos: [0.0, 5.0, 10.0], look_at: [0.0; 3] },
            lights: Vec::new(),
            scene: SceneSettings::default(),
            render_block: None,
            stl: None,
        };
        compose(description, LoadOutcome { models: Vec::new(), warnings: Vec::new() }, &NullResolver)
    }

    #[test]
    fn row_count_is_ceil_of_cells_over_columns() {
        assert_eq!(GridLayout::from(&settings(3)).rows(7), 3);
        assert_eq!(GridLayout::from(&settings(4)).rows(8), 2);
        assert_eq!(GridLayout::from(&settings(2)).rows(1), 1);
    }

    #[test]
    fn rects_partition_the_container() {
        let layout = GridLayout::from(&settings(3));
        let rects = layout.rects(7, 320.0);
        assert_eq!(rects.len(), 7);
        // 3 columns, 10px gaps: width = (320 - 20) / 3.
        assert!((rects[0].width - 100.0).abs() < 1e-4);
        // First row sits at the top of the surface.
        let total = layout.surface_height(7);
        assert!((rects[0].bottom - (total - 100.0)).abs() < 1e-4);
        // Second row is one row height plus a gap lower.
        assert!((rects[3].bottom - (total - 210.0)).abs() < 1e-4);
        // Columns advance left to right.
        assert!((rects[1].left - 110.0).abs() < 1e-4);
        assert!((rects[6].left - 0.0).abs() < 1e-4, "cell 6 wraps to a new row");
    }

    #[test]
    fn layout_defers_until_nonzero_size() {
        let mut compositor = GridCompositor::new(vec![empty_scene(), empty_scene()], &settings(2));
        compositor.set_measured_size(PhysicalSize::new(0, 0));
        assert!(compositor.rects().is_empty());
        compositor.set_measured_size(PhysicalSize::new(400, 300));
        assert_eq!(compositor.rects().len(), 2);
    }

    #[test]
    fn pointer_movement_switches_the_active_cell() {
        let mut compositor =
            GridCompositor::new(vec![empty_scene(), empty_scene(), empty_scene()], &settings(3));
        compositor.set_measured_size(PhysicalSize::new(320, 100));
        // Hover the first cell.
        assert_eq!(compositor.pointer_moved(Vec2::new(10.0, 50.0)), Some(0));
        assert!(compositor.cells[0].controls.enabled);
        // Move into the second cell: first disables, second enables.
        assert_eq!(compositor.pointer_moved(Vec2::new(150.0, 50.0)), Some(1));
        assert!(!compositor.cells[0].controls.enabled);
        assert!(compositor.cells[1].controls.enabled);
        // Leaving every cell deactivates all controls.
        assert_eq!(compositor.pointer_moved(Vec2::new(105.0, 50.0)), None);
        assert!(!compositor.cells[1].controls.enabled);
    }

    #[test]
    fn top_left_conversion_flips_the_vertical_axis() {
        let layout = GridLayout::from(&settings(2));
        let rects = layout.rects(2, 210.0);
        let surface_height = layout.surface_height(2) as u32;
        let top_left = rects[0].to_top_left(surface_height);
        assert_eq!(top_left, [0, 0, 100, 100]);
    }
}
