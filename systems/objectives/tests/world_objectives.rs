use std::collections::BTreeSet;

use outpost_core::{
    Action, CivId, MapDimensions, MovementDomain, Terrain, Tile, TurnEngine, UnitType,
    UnitTypeId, WorldQuery,
};
use outpost_system_objectives::{
    CivObjective, ExpansionObjective, ExplorationObjective, Objective, Orders,
};
use outpost_world::{query, AStarPathfinder, World};

const WARRIORS: UnitTypeId = UnitTypeId::new(1);
const SETTLERS: UnitTypeId = UnitTypeId::new(2);

fn catalog() -> Vec<UnitType> {
    vec![
        UnitType {
            id: WARRIORS,
            name: "Warriors".to_owned(),
            moves: 1,
            domain: MovementDomain::Land,
            cost: 10,
            founds_cities: false,
            improves_terrain: false,
            carry_capacity: 0,
        },
        UnitType {
            id: SETTLERS,
            name: "Settlers".to_owned(),
            moves: 1,
            domain: MovementDomain::Land,
            cost: 30,
            founds_cities: true,
            improves_terrain: true,
            carry_capacity: 0,
        },
    ]
}

fn grassland(columns: u32, rows: u32) -> World {
    let dimensions = MapDimensions::new(columns, rows, false);
    World::new(
        dimensions,
        vec![Terrain::Grassland; dimensions.tile_count()],
        catalog(),
    )
    .expect("valid world")
}

fn end_turn(world: &mut World, civ: CivId) {
    world
        .perform_action(civ, &Action::EndTurn)
        .expect("turn ends");
}

#[test]
fn explorers_keep_pushing_into_the_unknown() {
    let mut world = grassland(10, 3);
    let civ = world.add_civilization("Rome");
    let scout = world
        .spawn_unit(civ, WARRIORS, Tile::new(1, 1))
        .expect("spawn scout");
    let pathfinder = AStarPathfinder::new();

    let mut exploration = ExplorationObjective::new(civ, "exploration", 2);
    let snapshot = world.unit(civ, scout).expect("scout");
    assert!(exploration.add_unit(&world, &pathfinder, &snapshot));
    let known_before = query::known_tile_count(&world, civ);

    let mut freed = BTreeSet::new();
    for column in 2..=5 {
        exploration
            .objective_mut()
            .process(&mut world, &pathfinder, &mut freed);
        assert_eq!(world.unit(civ, scout).expect("scout").tile, Tile::new(column, 1));
        end_turn(&mut world, civ);
    }

    assert!(freed.is_empty());
    assert!(query::known_tile_count(&world, civ) > known_before);
    assert!(exploration.objective().contains(scout));
}

#[test]
fn explore_orders_without_autocontinue_end_at_the_first_frontier() {
    let mut world = grassland(12, 3);
    let civ = world.add_civilization("Rome");
    let scout = world
        .spawn_unit(civ, WARRIORS, Tile::new(0, 1))
        .expect("spawn scout");
    let pathfinder = AStarPathfinder::new();

    let mut scouting = Objective::new(civ, "scouting");
    scouting.insert(Orders::explore(civ, scout, false));
    let mut freed = BTreeSet::new();

    scouting.process(&mut world, &pathfinder, &mut freed);
    assert_eq!(world.unit(civ, scout).expect("scout").tile, Tile::new(1, 1));
    assert!(freed.is_empty());
    let mut orders = scouting.orders(scout).cloned().expect("orders held");
    assert_eq!(orders.goal(), Some(Tile::new(1, 1)));
    end_turn(&mut world, civ);

    scouting.process(&mut world, &pathfinder, &mut freed);
    assert_eq!(freed, BTreeSet::from([scout]));
    assert!(scouting.is_empty());
    assert_eq!(world.unit(civ, scout).expect("scout").tile, Tile::new(1, 1));

    for _ in 0..3 {
        assert!(!orders.replan(&world, &pathfinder));
        assert!(orders.finished());
        assert_eq!(orders.get_action(&world), None);
        end_turn(&mut world, civ);
    }
}

#[test]
fn exploration_refuses_settlers_and_extra_explorers() {
    let mut world = grassland(6, 6);
    let civ = world.add_civilization("Rome");
    let first = world
        .spawn_unit(civ, WARRIORS, Tile::new(1, 1))
        .expect("spawn");
    let second = world
        .spawn_unit(civ, WARRIORS, Tile::new(4, 4))
        .expect("spawn");
    let settler = world
        .spawn_unit(civ, SETTLERS, Tile::new(1, 4))
        .expect("spawn");
    let pathfinder = AStarPathfinder::new();

    let mut exploration = ExplorationObjective::new(civ, "exploration", 1);
    let settler = world.unit(civ, settler).expect("settler");
    assert!(!exploration.add_unit(&world, &pathfinder, &settler));
    let first = world.unit(civ, first).expect("warriors");
    assert!(exploration.add_unit(&world, &pathfinder, &first));
    let second = world.unit(civ, second).expect("warriors");
    assert!(!exploration.add_unit(&world, &pathfinder, &second));
    assert_eq!(exploration.unit_points(&world, &second), 0);
}

#[test]
fn settlers_walk_to_a_free_site_and_found_a_city() {
    let mut world = grassland(8, 4);
    let civ = world.add_civilization("Rome");
    let founder = world
        .spawn_unit(civ, SETTLERS, Tile::new(1, 1))
        .expect("spawn");
    world
        .perform_action(civ, &Action::FoundCity { unit: founder })
        .expect("capital founded");
    let settler = world
        .spawn_unit(civ, SETTLERS, Tile::new(3, 1))
        .expect("spawn");
    let pathfinder = AStarPathfinder::new();

    let mut expansion = ExpansionObjective::new(civ, "expansion");
    let snapshot = world.unit(civ, settler).expect("settler");
    assert!(expansion.add_unit(&world, &pathfinder, &snapshot));
    let site = expansion
        .objective()
        .orders(settler)
        .and_then(|orders| orders.goal())
        .expect("site chosen");
    assert_eq!(site, Tile::new(4, 0));

    let mut freed = BTreeSet::new();
    expansion
        .objective_mut()
        .process(&mut world, &pathfinder, &mut freed);
    assert_eq!(world.unit(civ, settler).expect("settler").tile, site);
    end_turn(&mut world, civ);

    expansion
        .objective_mut()
        .process(&mut world, &pathfinder, &mut freed);
    assert!(world.unit(civ, settler).is_none());
    assert_eq!(world.known_city_tiles(civ), vec![Tile::new(1, 1), site]);

    expansion
        .objective_mut()
        .process(&mut world, &pathfinder, &mut freed);
    assert!(expansion.objective().is_empty());
    assert!(freed.is_empty());
}

#[test]
fn settlers_do_not_share_a_claimed_site() {
    let mut world = grassland(8, 4);
    let civ = world.add_civilization("Rome");
    let first = world
        .spawn_unit(civ, SETTLERS, Tile::new(1, 1))
        .expect("spawn");
    let second = world
        .spawn_unit(civ, SETTLERS, Tile::new(3, 1))
        .expect("spawn");
    let pathfinder = AStarPathfinder::new();

    let mut expansion = ExpansionObjective::new(civ, "expansion");
    for settler in [first, second] {
        let snapshot = world.unit(civ, settler).expect("settler");
        assert!(expansion.add_unit(&world, &pathfinder, &snapshot));
    }

    let claims: Vec<_> = expansion.objective().goals().collect();
    assert_eq!(claims, vec![(first, Tile::new(1, 1)), (second, Tile::new(4, 0))]);
}

#[test]
fn settler_scores_drop_as_cities_grow() {
    let mut world = grassland(8, 4);
    let civ = world.add_civilization("Rome");
    let founder = world
        .spawn_unit(civ, SETTLERS, Tile::new(1, 1))
        .expect("spawn");
    let expansion = ExpansionObjective::new(civ, "expansion");

    let idle = world.unit(civ, founder).expect("settler");
    let before = expansion.unit_points(&world, &idle);
    world
        .perform_action(civ, &Action::FoundCity { unit: founder })
        .expect("capital founded");
    let after = expansion.unit_points(&world, &idle);

    assert!(before > after);
    assert!(after > 0);
}
