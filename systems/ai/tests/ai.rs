use outpost_core::{
    CityProduction, MapDimensions, MovementDomain, Terrain, Tile, UnitType, UnitTypeId,
    WorldQuery,
};
use outpost_system_ai::{Ai, DEFAULT_MAX_EXPLORERS};
use outpost_world::{query, AStarPathfinder, World};

const WARRIORS: UnitTypeId = UnitTypeId::new(1);
const SETTLERS: UnitTypeId = UnitTypeId::new(2);

fn world() -> World {
    let dimensions = MapDimensions::new(12, 8, false);
    World::new(
        dimensions,
        vec![Terrain::Grassland; dimensions.tile_count()],
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
        ],
    )
    .expect("valid world")
}

#[test]
fn first_turns_found_a_capital_and_send_out_an_explorer() {
    let mut world = world();
    let civ = world.add_civilization("Rome");
    let settler = world
        .spawn_unit(civ, SETTLERS, Tile::new(2, 2))
        .expect("spawn settler");
    let scout = world
        .spawn_unit(civ, WARRIORS, Tile::new(3, 2))
        .expect("spawn warriors");
    let pathfinder = AStarPathfinder::new();
    let mut ai = Ai::with_default_objectives(civ, DEFAULT_MAX_EXPLORERS);

    let report = ai.play_turn(&mut world, &pathfinder);
    assert_eq!(report.adopted, 2);
    assert_eq!(ai.assignment(settler), Some("expansion"));
    assert_eq!(ai.assignment(scout), Some("exploration"));
    assert_eq!(query::round(&world), 1);

    let report = ai.play_turn(&mut world, &pathfinder);
    assert_eq!(report.freed, 0);
    assert!(world.unit(civ, settler).is_none());
    assert_eq!(ai.assignment(settler), None);
    let cities = world.cities(civ);
    assert_eq!(cities.len(), 1);
    assert_eq!(cities[0].tile, Tile::new(2, 2));
    assert_eq!(cities[0].production, CityProduction::Unit(SETTLERS));
    assert_ne!(world.unit(civ, scout).expect("scout").tile, Tile::new(3, 2));
}

#[test]
fn ai_sessions_keep_every_unit_in_at_most_one_objective() {
    let mut world = world();
    let civ = world.add_civilization("Rome");
    let rival = world.add_civilization("Carthage");
    let _ = world
        .spawn_unit(civ, SETTLERS, Tile::new(1, 1))
        .expect("spawn");
    let _ = world
        .spawn_unit(rival, SETTLERS, Tile::new(9, 5))
        .expect("spawn");
    for column in [2, 3, 4] {
        let _ = world
            .spawn_unit(civ, WARRIORS, Tile::new(column, 1))
            .expect("spawn");
    }
    let pathfinder = AStarPathfinder::new();
    let mut ais = [
        Ai::with_default_objectives(civ, DEFAULT_MAX_EXPLORERS),
        Ai::with_default_objectives(rival, DEFAULT_MAX_EXPLORERS),
    ];

    for _ in 0..12 {
        for ai in &mut ais {
            let _ = ai.play_turn(&mut world, &pathfinder);
        }
    }

    assert_eq!(query::round(&world), 12);
    assert!(!world.cities(civ).is_empty());
    assert!(!world.cities(rival).is_empty());
    let explorers = world
        .units(civ)
        .iter()
        .filter(|unit| ais[0].assignment(unit.id) == Some("exploration"))
        .count();
    assert!(explorers <= DEFAULT_MAX_EXPLORERS);
}
