//! Integration tests for tile-adjacency linking against the core engine.

use nodenet_core::engine::Engine;
use nodenet_core::flags::EdgeFlags;
use nodenet_core::id::EntityId;
use nodenet_core::spatial::{Direction, GridId, TilePos};
use nodenet_core::test_utils::check_connectivity;
use nodenet_spatial::{AdjacencyLinker, AnchorGrid, DirectionMask};

const G: GridId = GridId(0);

fn engine() -> Engine {
    let mut engine = Engine::new();
    engine.register_linker("pipe", Box::new(AdjacencyLinker::new()));
    engine
}

fn linker(engine: &mut Engine) -> &mut AdjacencyLinker {
    engine.linker_mut::<AdjacencyLinker>().unwrap()
}

/// A pipe node anchored at `(x, 0)` facing north.
fn place_pipe(engine: &mut Engine, grid: &mut AnchorGrid, x: i32) -> EntityId {
    let pipe = engine.spawn_node("pipe_segment", "pipe");
    grid.anchor(pipe, G, TilePos::new(x, 0), Direction::North).unwrap();
    pipe
}

fn settle(engine: &mut Engine, grid: &AnchorGrid) {
    let report = engine.update(grid);
    assert!(!report.capped);
    assert!(engine.is_settled());
    check_connectivity(engine).unwrap();
}

// ===========================================================================
// Test 1: A straight run joins
// ===========================================================================

#[test]
fn adjacent_pipes_form_one_graph() {
    let mut engine = engine();
    let mut grid = AnchorGrid::new();
    let a = place_pipe(&mut engine, &mut grid, 0);
    let b = place_pipe(&mut engine, &mut grid, 1);
    let c = place_pipe(&mut engine, &mut grid, 2);
    settle(&mut engine, &grid);

    assert_eq!(engine.graph_count(), 1);
    assert_eq!(engine.graph_nodes(engine.node_graph(a).unwrap()).unwrap().len(), 3);
    let flags = engine.edge_flags(a, b).unwrap();
    assert!(flags.contains(EdgeFlags::AUTO | EdgeFlags::IN | EdgeFlags::OUT));
    assert!(!engine.has_edge(a, c));
}

#[test]
fn separate_grids_do_not_link() {
    let mut engine = engine();
    let mut grid = AnchorGrid::new();
    let a = place_pipe(&mut engine, &mut grid, 0);
    let b = engine.spawn_node("pipe_segment", "pipe");
    grid.anchor(b, GridId(1), TilePos::new(1, 0), Direction::North).unwrap();
    settle(&mut engine, &grid);

    assert!(!engine.has_edge(a, b));
    assert_eq!(engine.graph_count(), 2);
}

// ===========================================================================
// Test 2: Valves
// ===========================================================================

#[test]
fn closing_a_valve_splits_and_reopening_merges() {
    let mut engine = engine();
    let mut grid = AnchorGrid::new();
    let a = place_pipe(&mut engine, &mut grid, 0);
    let valve = place_pipe(&mut engine, &mut grid, 1);
    let c = place_pipe(&mut engine, &mut grid, 2);
    settle(&mut engine, &grid);

    linker(&mut engine).set_closed(valve, true);
    grid.queue_neighbourhood(&mut engine, valve);
    settle(&mut engine, &grid);

    assert_eq!(engine.graph_count(), 3);
    assert!(engine.edge_flags(a, valve).unwrap().contains(EdgeFlags::NO_MERGE));
    assert!(engine.edge_flags(c, valve).unwrap().contains(EdgeFlags::NO_MERGE));

    linker(&mut engine).set_closed(valve, false);
    grid.queue_neighbourhood(&mut engine, valve);
    settle(&mut engine, &grid);

    assert_eq!(engine.graph_count(), 1);
    assert_eq!(engine.node_graph(a), engine.node_graph(c));
}

// ===========================================================================
// Test 3: Openings and facing
// ===========================================================================

#[test]
fn openings_follow_facing() {
    let mut engine = engine();
    let mut grid = AnchorGrid::new();
    let a = place_pipe(&mut engine, &mut grid, 0);
    let b = place_pipe(&mut engine, &mut grid, 1);
    linker(&mut engine).set_openings(a, DirectionMask::NORTH | DirectionMask::SOUTH);
    settle(&mut engine, &grid);

    assert!(!engine.has_edge(a, b));
    assert_eq!(engine.graph_count(), 2);

    grid.rotate_to(a, Direction::East).unwrap();
    grid.queue_neighbourhood(&mut engine, a);
    settle(&mut engine, &grid);

    assert!(engine.has_edge(a, b));
    assert_eq!(engine.graph_count(), 1);
}

#[test]
fn one_sided_opening_is_not_enough() {
    let mut engine = engine();
    let mut grid = AnchorGrid::new();
    let a = place_pipe(&mut engine, &mut grid, 0);
    let b = place_pipe(&mut engine, &mut grid, 1);
    linker(&mut engine).set_openings(b, DirectionMask::EAST);
    settle(&mut engine, &grid);

    assert!(!engine.has_edge(a, b));
}

// ===========================================================================
// Test 4: Removal
// ===========================================================================

#[test]
fn unanchoring_the_middle_splits() {
    let mut engine = engine();
    let mut grid = AnchorGrid::new();
    let a = place_pipe(&mut engine, &mut grid, 0);
    let b = place_pipe(&mut engine, &mut grid, 1);
    let c = place_pipe(&mut engine, &mut grid, 2);
    settle(&mut engine, &grid);

    grid.queue_neighbourhood(&mut engine, b);
    grid.unanchor(b).unwrap();
    settle(&mut engine, &grid);

    assert!(engine.edges(b).is_empty());
    assert_eq!(engine.graph_count(), 3);
    assert_ne!(engine.node_graph(a), engine.node_graph(c));
}

// ===========================================================================
// Test 5: Poly hosts
// ===========================================================================

#[test]
fn pump_proxies_link_on_their_own_sides() {
    let mut engine = engine();
    let mut grid = AnchorGrid::new();
    let left = place_pipe(&mut engine, &mut grid, 0);
    let right = place_pipe(&mut engine, &mut grid, 2);

    let pump = engine.spawn_entity("pump");
    engine.make_poly(pump, None).unwrap();
    let inlet = engine.spawn_proxy_node(pump, "inlet", "pipe").unwrap();
    let outlet = engine.spawn_proxy_node(pump, "outlet", "pipe").unwrap();
    grid.anchor(pump, G, TilePos::new(1, 0), Direction::North).unwrap();
    linker(&mut engine).set_openings(inlet, DirectionMask::WEST);
    linker(&mut engine).set_openings(outlet, DirectionMask::EAST);
    settle(&mut engine, &grid);

    assert!(engine.has_edge(left, inlet));
    assert!(engine.has_edge(outlet, right));
    assert!(!engine.has_edge(inlet, outlet));
    assert_eq!(engine.node_graph(left), engine.node_graph(inlet));
    assert_ne!(engine.node_graph(inlet), engine.node_graph(outlet));

    let mut on_tile = engine.nodes_on_tile(&grid, G, TilePos::new(1, 0), None);
    on_tile.sort();
    let mut expected = vec![inlet, outlet];
    expected.sort();
    assert_eq!(on_tile, expected);

    // Turning the pump around swaps which pipe each proxy reaches.
    grid.rotate_to(pump, Direction::South).unwrap();
    grid.queue_neighbourhood(&mut engine, pump);
    settle(&mut engine, &grid);
    assert!(engine.has_edge(left, outlet));
    assert!(engine.has_edge(inlet, right));
    assert!(!engine.has_edge(left, inlet));
}
