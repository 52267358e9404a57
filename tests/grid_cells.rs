use glam::Vec2;
use merlin_viewer::compose::compose;
use merlin_viewer::grid::{GridCompositor, GridLayout};
use merlin_viewer::load::LoadOutcome;
use merlin_viewer::parse::{parse_grid_block, CellPolicy};
use merlin_viewer::resolve::{AssetLocation, AssetResolver};
use winit::dpi::PhysicalSize;

struct NullResolver;

impl AssetResolver for NullResolver {
    fn resolve(&self, _name: &str) -> Option<AssetLocation> {
        None
    }
}

fn cell(name: &str) -> String {
    format!(
        "\"{name}\": {{\n\"models\": [],\n\"camera\": {{ \"camPosXYZ\": [0,5,10], \"LookatXYZ\": [0,0,0] }}\n}}"
    )
}

fn grid_body(cell_count: usize, columns: usize) -> String {
    let cells: Vec<String> = (1..=cell_count).map(|n| cell(&format!("cell{n}"))).collect();
    format!(
        "{},\n\"gridSettings\": {{ \"columns\": {columns}, \"rowHeight\": 200, \"gapX\": 6, \"gapY\": 6 }}",
        cells.join(",\n")
    )
}

#[test]
fn seven_cells_over_three_columns_make_three_rows() {
    let outcome =
        parse_grid_block(&grid_body(7, 3), CellPolicy::AllOrNothing).expect("grid parses");
    assert_eq!(outcome.grid.cells.len(), 7);
    let layout = GridLayout::from(&outcome.grid.settings);
    assert_eq!(layout.rows(7), 3);

    let outcome =
        parse_grid_block(&grid_body(8, 4), CellPolicy::AllOrNothing).expect("grid parses");
    let layout = GridLayout::from(&outcome.grid.settings);
    assert_eq!(layout.rows(8), 2);
}

#[test]
fn cells_keep_their_declared_order() {
    let body = grid_body(12, 4);
    let outcome = parse_grid_block(&body, CellPolicy::AllOrNothing).expect("grid parses");
    let names: Vec<&str> = outcome.grid.cells.iter().map(|cell| cell.name.as_str()).collect();
    // Numeric order, not lexicographic (cell10 after cell9).
    assert_eq!(names[8], "cell9");
    assert_eq!(names[9], "cell10");
    assert_eq!(names[11], "cell12");
}

#[test]
fn compositor_activates_exactly_one_cell_at_a_time() {
    let outcome =
        parse_grid_block(&grid_body(4, 2), CellPolicy::AllOrNothing).expect("grid parses");
    let scenes = outcome
        .grid
        .cells
        .into_iter()
        .map(|cell| {
            compose(
                cell.description,
                LoadOutcome { models: Vec::new(), warnings: Vec::new() },
                &NullResolver,
            )
        })
        .collect();
    let mut compositor = GridCompositor::new(scenes, &outcome.grid.settings);
    // No measured size yet: layout is deferred, nothing is hit.
    assert_eq!(compositor.pointer_moved(Vec2::new(10.0, 10.0)), None);

    compositor.set_measured_size(PhysicalSize::new(406, 406));
    let surface_height = compositor.layout().surface_height(4);
    // Bottom-left of the surface lands in the last row's first cell.
    let hit = compositor.pointer_moved(Vec2::new(10.0, 10.0));
    assert_eq!(hit, Some(2));
    // Top row, second column.
    let hit = compositor.pointer_moved(Vec2::new(300.0, surface_height - 10.0));
    assert_eq!(hit, Some(1));
    let enabled: Vec<bool> =
        compositor.cells.iter().map(|cell| cell.controls.enabled).collect();
    assert_eq!(enabled.iter().filter(|on| **on).count(), 1);
    assert!(compositor.cells[1].controls.enabled);
}
