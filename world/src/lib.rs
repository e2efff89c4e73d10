#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Outpost.
//!
//! The world is the single writer of simulation state. Every mutation goes
//! through [`apply`], which validates an [`Action`] on behalf of a
//! civilization and either rejects it untouched or applies it and records the
//! resulting [`Event`] values in the civilization's message queue.

pub mod navigation;
mod visibility;

use std::collections::{BTreeMap, VecDeque};

use outpost_core::{
    Action, ActionRejected, CityId, CityProduction, CivId, Event, Fog, Improvement,
    MapDimensions, Terrain, Tile, UnitId, UnitType, UnitTypeId, MIN_CITY_DISTANCE,
    MOVE_FRAGMENTS,
};
use thiserror::Error;
use tracing::debug;

pub use navigation::AStarPathfinder;

/// Production every city accumulates at the start of a round.
pub const CITY_PRODUCTION_PER_ROUND: u32 = 10;

const UNIT_SIGHT: u32 = 1;
const CITY_SIGHT: u32 = 2;

/// Errors raised while setting up a world.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The map has no tiles.
    #[error("map dimensions {columns}x{rows} contain no tiles")]
    EmptyMap {
        /// Requested number of columns.
        columns: u32,
        /// Requested number of rows.
        rows: u32,
    },
    /// The terrain layer does not cover the map exactly.
    #[error("terrain layer holds {actual} tiles but the map needs {expected}")]
    TerrainSizeMismatch {
        /// Number of tiles on the map.
        expected: usize,
        /// Number of terrain entries supplied.
        actual: usize,
    },
    /// Two catalog entries share an identifier.
    #[error("unit type {} is declared twice", .0.get())]
    DuplicateUnitType(UnitTypeId),
    /// The civilization does not exist.
    #[error("civilization {} does not exist", .0.get())]
    UnknownCivilization(CivId),
    /// The unit type is not part of the catalog.
    #[error("unit type {} is not part of the catalog", .0.get())]
    UnknownUnitType(UnitTypeId),
    /// The unit cannot be placed on the tile.
    #[error("unit cannot be placed on {tile}: {reason}")]
    UnplaceableUnit {
        /// Requested tile.
        tile: Tile,
        /// Reason the engine would refuse the unit there.
        reason: ActionRejected,
    },
}

#[derive(Clone, Debug)]
struct Unit {
    id: UnitId,
    unit_type: UnitTypeId,
    tile: Tile,
    moves_left: u32,
    fortified: bool,
    carried_by: Option<UnitId>,
}

#[derive(Clone, Debug)]
struct City {
    id: CityId,
    civ: CivId,
    name: String,
    tile: Tile,
    production: CityProduction,
    stored_production: u32,
}

#[derive(Clone, Debug)]
struct Civilization {
    id: CivId,
    name: String,
    units: BTreeMap<UnitId, Unit>,
    fog: Vec<Fog>,
    messages: VecDeque<Event>,
    turn_ended: bool,
    cities_founded: u32,
}

/// Represents the authoritative Outpost world state.
#[derive(Clone, Debug)]
pub struct World {
    dimensions: MapDimensions,
    terrain: Vec<Terrain>,
    improvements: Vec<Option<Improvement>>,
    unit_types: Vec<UnitType>,
    civs: Vec<Civilization>,
    cities: BTreeMap<CityId, City>,
    residents: Vec<Option<CivId>>,
    next_unit_id: u32,
    next_city_id: u32,
    round: u32,
}

impl World {
    /// Creates a world from a terrain layer in row-major order and a unit
    /// type catalog.
    pub fn new(
        dimensions: MapDimensions,
        terrain: Vec<Terrain>,
        unit_types: Vec<UnitType>,
    ) -> Result<Self, WorldError> {
        let expected = dimensions.tile_count();
        if expected == 0 {
            return Err(WorldError::EmptyMap {
                columns: dimensions.columns(),
                rows: dimensions.rows(),
            });
        }
        if terrain.len() != expected {
            return Err(WorldError::TerrainSizeMismatch {
                expected,
                actual: terrain.len(),
            });
        }
        for (index, unit_type) in unit_types.iter().enumerate() {
            if unit_types[..index]
                .iter()
                .any(|earlier| earlier.id == unit_type.id)
            {
                return Err(WorldError::DuplicateUnitType(unit_type.id));
            }
        }

        Ok(Self {
            dimensions,
            terrain,
            improvements: vec![None; expected],
            unit_types,
            civs: Vec::new(),
            cities: BTreeMap::new(),
            residents: vec![None; expected],
            next_unit_id: 1,
            next_city_id: 1,
            round: 0,
        })
    }

    /// Registers a new civilization and returns its identifier.
    pub fn add_civilization(&mut self, name: impl Into<String>) -> CivId {
        let id = CivId::new(u32::try_from(self.civs.len()).unwrap_or(u32::MAX).saturating_add(1));
        self.civs.push(Civilization {
            id,
            name: name.into(),
            units: BTreeMap::new(),
            fog: vec![Fog::Unknown; self.dimensions.tile_count()],
            messages: VecDeque::new(),
            turn_ended: false,
            cities_founded: 0,
        });
        id
    }

    /// Places a fresh unit of the given type on the map.
    pub fn spawn_unit(
        &mut self,
        civ: CivId,
        unit_type: UnitTypeId,
        tile: Tile,
    ) -> Result<UnitId, WorldError> {
        if self.civ(civ).is_none() {
            return Err(WorldError::UnknownCivilization(civ));
        }
        let domain = self
            .catalog_entry(unit_type)
            .ok_or(WorldError::UnknownUnitType(unit_type))?
            .domain;
        let Some(terrain) = self.terrain_at(tile) else {
            return Err(WorldError::UnplaceableUnit {
                tile,
                reason: ActionRejected::OutOfBounds,
            });
        };
        if let Some(occupant) = self.resident(tile).filter(|occupant| *occupant != civ) {
            return Err(WorldError::UnplaceableUnit {
                tile,
                reason: ActionRejected::Occupied { tile, occupant },
            });
        }
        if !domain.can_enter(terrain) && !self.is_own_city(civ, tile) {
            return Err(WorldError::UnplaceableUnit {
                tile,
                reason: ActionRejected::Impassable { terrain },
            });
        }

        let id = self.insert_unit(civ, unit_type, tile);
        self.refresh_residents();
        self.refresh_fog(civ);
        Ok(id)
    }

    /// Removes a unit from the world, as when it is captured or destroyed.
    ///
    /// Cargo aboard a carrier lost at sea is lost with it. Returns whether a
    /// unit was removed.
    pub fn remove_unit(&mut self, civ: CivId, unit: UnitId) -> bool {
        let Some(tile) = self.unit_ref(civ, unit).map(|unit| unit.tile) else {
            return false;
        };
        let at_sea = self.terrain_at(tile).is_some_and(|terrain| !terrain.is_land());

        let mut lost = vec![unit];
        if let Some(civilization) = self.civ_mut(civ) {
            for cargo in civilization.units.values_mut() {
                if cargo.carried_by == Some(unit) {
                    if at_sea {
                        lost.push(cargo.id);
                    } else {
                        cargo.carried_by = None;
                    }
                }
            }
            for id in &lost {
                let _ = civilization.units.remove(id);
                civilization.messages.push_back(Event::UnitLost { unit: *id });
            }
        }

        debug!(civ = civ.get(), unit = unit.get(), lost = lost.len(), "unit removed");
        self.refresh_residents();
        self.refresh_fog(civ);
        true
    }

    /// Removes and returns every message queued for the civilization.
    pub fn drain_messages(&mut self, civ: CivId) -> Vec<Event> {
        self.civ_mut(civ)
            .map(|civilization| civilization.messages.drain(..).collect())
            .unwrap_or_default()
    }

    fn civ(&self, civ: CivId) -> Option<&Civilization> {
        self.civs.iter().find(|civilization| civilization.id == civ)
    }

    fn civ_mut(&mut self, civ: CivId) -> Option<&mut Civilization> {
        self.civs.iter_mut().find(|civilization| civilization.id == civ)
    }

    fn unit_ref(&self, civ: CivId, unit: UnitId) -> Option<&Unit> {
        self.civ(civ).and_then(|civilization| civilization.units.get(&unit))
    }

    fn unit_mut(&mut self, civ: CivId, unit: UnitId) -> Option<&mut Unit> {
        self.civ_mut(civ)
            .and_then(|civilization| civilization.units.get_mut(&unit))
    }

    fn catalog_entry(&self, id: UnitTypeId) -> Option<&UnitType> {
        self.unit_types.iter().find(|unit_type| unit_type.id == id)
    }

    fn terrain_at(&self, tile: Tile) -> Option<Terrain> {
        self.dimensions
            .index(tile)
            .and_then(|index| self.terrain.get(index).copied())
    }

    fn improvement_at(&self, tile: Tile) -> Option<Improvement> {
        self.dimensions
            .index(tile)
            .and_then(|index| self.improvements.get(index).copied().flatten())
    }

    fn resident(&self, tile: Tile) -> Option<CivId> {
        self.dimensions
            .index(tile)
            .and_then(|index| self.residents.get(index).copied().flatten())
    }

    fn city_at(&self, tile: Tile) -> Option<&City> {
        self.cities.values().find(|city| city.tile == tile)
    }

    fn is_own_city(&self, civ: CivId, tile: Tile) -> bool {
        self.city_at(tile).is_some_and(|city| city.civ == civ)
    }

    fn has_road(&self, tile: Tile) -> bool {
        self.city_at(tile).is_some() || self.improvement_at(tile) == Some(Improvement::Road)
    }

    fn is_coastal(&self, tile: Tile) -> bool {
        self.dimensions
            .neighbors(tile)
            .any(|neighbor| self.terrain_at(neighbor).is_some_and(|terrain| !terrain.is_land()))
    }

    fn cargo_count(&self, civ: CivId, carrier: UnitId) -> usize {
        self.civ(civ).map_or(0, |civilization| {
            civilization
                .units
                .values()
                .filter(|unit| unit.carried_by == Some(carrier))
                .count()
        })
    }

    /// Carrier on `tile` owned by `civ` with room for one more unit.
    fn carrier_with_space(&self, civ: CivId, tile: Tile, exclude: UnitId) -> Option<UnitId> {
        let civilization = self.civ(civ)?;
        civilization
            .units
            .values()
            .filter(|unit| unit.tile == tile && unit.id != exclude)
            .find(|unit| {
                self.catalog_entry(unit.unit_type).is_some_and(|unit_type| {
                    u32::try_from(self.cargo_count(civ, unit.id)).unwrap_or(u32::MAX)
                        < unit_type.carry_capacity
                })
            })
            .map(|unit| unit.id)
    }

    fn insert_unit(&mut self, civ: CivId, unit_type: UnitTypeId, tile: Tile) -> UnitId {
        let id = UnitId::new(self.next_unit_id);
        self.next_unit_id = self.next_unit_id.saturating_add(1);
        let moves_left = self
            .catalog_entry(unit_type)
            .map_or(0, UnitType::move_fragments);
        if let Some(civilization) = self.civ_mut(civ) {
            let _ = civilization.units.insert(
                id,
                Unit {
                    id,
                    unit_type,
                    tile,
                    moves_left,
                    fortified: false,
                    carried_by: None,
                },
            );
        }
        id
    }

    fn refresh_residents(&mut self) {
        self.residents.fill(None);
        for civilization in &self.civs {
            for unit in civilization.units.values() {
                if let Some(index) = self.dimensions.index(unit.tile) {
                    self.residents[index] = Some(civilization.id);
                }
            }
        }
        for city in self.cities.values() {
            if let Some(index) = self.dimensions.index(city.tile) {
                self.residents[index] = Some(city.civ);
            }
        }
    }

    fn refresh_fog(&mut self, civ: CivId) {
        let dimensions = self.dimensions;
        let cities: Vec<Tile> = self
            .cities
            .values()
            .filter(|city| city.civ == civ)
            .map(|city| city.tile)
            .collect();
        let Some(civilization) = self.civ_mut(civ) else {
            return;
        };
        let observers = civilization
            .units
            .values()
            .map(|unit| (unit.tile, UNIT_SIGHT))
            .chain(cities.into_iter().map(|tile| (tile, CITY_SIGHT)));
        visibility::recompute(&mut civilization.fog, dimensions, observers);
    }

    fn emit(&mut self, civ: CivId, event: Event, out_events: &mut Vec<Event>) {
        if let Some(civilization) = self.civ_mut(civ) {
            civilization.messages.push_back(event.clone());
        }
        out_events.push(event);
    }

    fn start_round(&mut self, acting: CivId, out_events: &mut Vec<Event>) {
        self.round = self.round.saturating_add(1);
        let round = self.round;
        debug!(round, "round started");

        let budgets: BTreeMap<UnitTypeId, u32> = self
            .unit_types
            .iter()
            .map(|unit_type| (unit_type.id, unit_type.move_fragments()))
            .collect();
        for civilization in &mut self.civs {
            civilization.turn_ended = false;
            for unit in civilization.units.values_mut() {
                unit.moves_left = budgets.get(&unit.unit_type).copied().unwrap_or(0);
            }
        }

        let mut completed = Vec::new();
        for city in self.cities.values_mut() {
            city.stored_production = city
                .stored_production
                .saturating_add(CITY_PRODUCTION_PER_ROUND);
            if let CityProduction::Unit(unit_type) = city.production {
                let cost = self
                    .unit_types
                    .iter()
                    .find(|candidate| candidate.id == unit_type)
                    .map(|candidate| candidate.cost);
                if let Some(cost) = cost {
                    if city.stored_production >= cost {
                        city.stored_production -= cost;
                        completed.push((city.civ, city.id, city.tile, unit_type));
                    }
                }
            }
        }

        let civs: Vec<CivId> = self.civs.iter().map(|civilization| civilization.id).collect();
        for civ in civs.iter().copied() {
            let event = Event::RoundStarted { round };
            if civ == acting {
                self.emit(civ, event, out_events);
            } else if let Some(civilization) = self.civ_mut(civ) {
                civilization.messages.push_back(event);
            }
        }

        for (civ, city, tile, unit_type) in completed {
            let unit = self.insert_unit(civ, unit_type, tile);
            let event = Event::UnitBuilt {
                city,
                unit,
                unit_type,
            };
            if civ == acting {
                self.emit(civ, event, out_events);
            } else if let Some(civilization) = self.civ_mut(civ) {
                civilization.messages.push_back(event);
            }
        }

        self.refresh_residents();
        for civ in civs {
            self.refresh_fog(civ);
        }
    }

    fn move_unit(
        &mut self,
        civ: CivId,
        unit_id: UnitId,
        dx: i32,
        dy: i32,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ActionRejected> {
        let unit = self
            .unit_ref(civ, unit_id)
            .cloned()
            .ok_or(ActionRejected::UnknownUnit(unit_id))?;
        if dx.abs() > 1 || dy.abs() > 1 || (dx == 0 && dy == 0) {
            return Err(ActionRejected::NotAdjacent { dx, dy });
        }
        if unit.moves_left == 0 {
            return Err(ActionRejected::NoMovesLeft(unit_id));
        }
        let from = unit.tile;
        let to = self
            .dimensions
            .offset(from, dx, dy)
            .ok_or(ActionRejected::OutOfBounds)?;
        if let Some(occupant) = self.resident(to).filter(|occupant| *occupant != civ) {
            return Err(ActionRejected::Occupied { tile: to, occupant });
        }
        let terrain = self.terrain_at(to).ok_or(ActionRejected::OutOfBounds)?;
        let domain = self
            .catalog_entry(unit.unit_type)
            .ok_or(ActionRejected::UnknownUnitType(unit.unit_type))?
            .domain;

        let boarding = if domain.can_enter(terrain) || self.is_own_city(civ, to) {
            None
        } else if terrain.is_land() {
            return Err(ActionRejected::Impassable { terrain });
        } else {
            Some(
                self.carrier_with_space(civ, to, unit_id)
                    .ok_or(ActionRejected::Impassable { terrain })?,
            )
        };

        let cost = if self.has_road(from) && self.has_road(to) {
            1
        } else {
            terrain.move_cost().saturating_mul(MOVE_FRAGMENTS)
        };

        let lands = terrain.is_land();
        if let Some(civilization) = self.civ_mut(civ) {
            for cargo in civilization.units.values_mut() {
                if cargo.carried_by == Some(unit_id) {
                    cargo.tile = to;
                }
            }
            if let Some(moving) = civilization.units.get_mut(&unit_id) {
                moving.tile = to;
                moving.moves_left = moving.moves_left.saturating_sub(cost.min(moving.moves_left));
                moving.fortified = false;
                moving.carried_by = match (boarding, moving.carried_by) {
                    (Some(carrier), _) => Some(carrier),
                    (None, Some(_)) if lands => None,
                    (None, current) => current,
                };
            }
        }

        self.emit(
            civ,
            Event::UnitMoved {
                unit: unit_id,
                from,
                to,
            },
            out_events,
        );
        if let Some(carrier) = boarding {
            self.emit(
                civ,
                Event::UnitLoaded {
                    unit: unit_id,
                    carrier,
                },
                out_events,
            );
        }
        Ok(())
    }

    fn found_city(
        &mut self,
        civ: CivId,
        unit_id: UnitId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ActionRejected> {
        let unit = self
            .unit_ref(civ, unit_id)
            .cloned()
            .ok_or(ActionRejected::UnknownUnit(unit_id))?;
        let founds_cities = self
            .catalog_entry(unit.unit_type)
            .is_some_and(|unit_type| unit_type.founds_cities);
        if !founds_cities {
            return Err(ActionRejected::CannotFoundCity(unit_id));
        }
        if unit.moves_left == 0 {
            return Err(ActionRejected::NoMovesLeft(unit_id));
        }
        let terrain = self
            .terrain_at(unit.tile)
            .ok_or(ActionRejected::OutOfBounds)?;
        if !terrain.can_host_city() {
            return Err(ActionRejected::UnsuitableTerrain { terrain });
        }
        let dimensions = self.dimensions;
        if self
            .cities
            .values()
            .any(|city| dimensions.distance(city.tile, unit.tile) < MIN_CITY_DISTANCE)
        {
            return Err(ActionRejected::CityTooClose { tile: unit.tile });
        }

        let id = CityId::new(self.next_city_id);
        self.next_city_id = self.next_city_id.saturating_add(1);
        let name = match self.civ_mut(civ) {
            Some(civilization) => {
                let _ = civilization.units.remove(&unit_id);
                civilization.cities_founded = civilization.cities_founded.saturating_add(1);
                format!("{} {}", civilization.name, civilization.cities_founded)
            }
            None => return Err(ActionRejected::UnknownCivilization(civ)),
        };
        let _ = self.cities.insert(
            id,
            City {
                id,
                civ,
                name,
                tile: unit.tile,
                production: CityProduction::Idle,
                stored_production: 0,
            },
        );
        self.emit(
            civ,
            Event::CityFounded {
                city: id,
                tile: unit.tile,
            },
            out_events,
        );
        Ok(())
    }

    fn load_unit(
        &mut self,
        civ: CivId,
        unit_id: UnitId,
        carrier_id: UnitId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ActionRejected> {
        let unit = self
            .unit_ref(civ, unit_id)
            .cloned()
            .ok_or(ActionRejected::UnknownUnit(unit_id))?;
        let carrier = self
            .unit_ref(civ, carrier_id)
            .cloned()
            .ok_or(ActionRejected::UnknownUnit(carrier_id))?;
        let capacity = self
            .catalog_entry(carrier.unit_type)
            .map_or(0, |unit_type| unit_type.carry_capacity);
        if carrier_id == unit_id
            || capacity == 0
            || carrier.tile != unit.tile
            || carrier.carried_by.is_some()
            || unit.carried_by == Some(carrier_id)
        {
            return Err(ActionRejected::InvalidCarrier(carrier_id));
        }
        if u32::try_from(self.cargo_count(civ, carrier_id)).unwrap_or(u32::MAX) >= capacity {
            return Err(ActionRejected::CarrierFull(carrier_id));
        }
        if let Some(boarding) = self.unit_mut(civ, unit_id) {
            boarding.carried_by = Some(carrier_id);
            boarding.fortified = false;
        }
        self.emit(
            civ,
            Event::UnitLoaded {
                unit: unit_id,
                carrier: carrier_id,
            },
            out_events,
        );
        Ok(())
    }

    fn unload_unit(
        &mut self,
        civ: CivId,
        unit_id: UnitId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ActionRejected> {
        let unit = self
            .unit_ref(civ, unit_id)
            .cloned()
            .ok_or(ActionRejected::UnknownUnit(unit_id))?;
        if unit.carried_by.is_none() {
            return Err(ActionRejected::NotLoaded(unit_id));
        }
        let terrain = self
            .terrain_at(unit.tile)
            .ok_or(ActionRejected::OutOfBounds)?;
        let domain = self
            .catalog_entry(unit.unit_type)
            .ok_or(ActionRejected::UnknownUnitType(unit.unit_type))?
            .domain;
        if !domain.can_enter(terrain) && !self.is_own_city(civ, unit.tile) {
            return Err(ActionRejected::Impassable { terrain });
        }
        if let Some(leaving) = self.unit_mut(civ, unit_id) {
            leaving.carried_by = None;
        }
        self.emit(civ, Event::UnitUnloaded { unit: unit_id }, out_events);
        Ok(())
    }

    fn improve_tile(
        &mut self,
        civ: CivId,
        unit_id: UnitId,
        improvement: Improvement,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ActionRejected> {
        let unit = self
            .unit_ref(civ, unit_id)
            .cloned()
            .ok_or(ActionRejected::UnknownUnit(unit_id))?;
        let improves_terrain = self
            .catalog_entry(unit.unit_type)
            .is_some_and(|unit_type| unit_type.improves_terrain);
        if !improves_terrain || unit.carried_by.is_some() {
            return Err(ActionRejected::CannotImprove(unit_id));
        }
        if unit.moves_left == 0 {
            return Err(ActionRejected::NoMovesLeft(unit_id));
        }
        let terrain = self
            .terrain_at(unit.tile)
            .ok_or(ActionRejected::OutOfBounds)?;
        if !terrain.is_land() {
            return Err(ActionRejected::Impassable { terrain });
        }
        if self.improvement_at(unit.tile) == Some(improvement) {
            return Err(ActionRejected::AlreadyImproved { tile: unit.tile });
        }
        if let Some(index) = self.dimensions.index(unit.tile) {
            self.improvements[index] = Some(improvement);
        }
        if let Some(worker) = self.unit_mut(civ, unit_id) {
            worker.moves_left = 0;
        }
        self.emit(
            civ,
            Event::TileImproved {
                tile: unit.tile,
                improvement,
            },
            out_events,
        );
        Ok(())
    }

    fn set_production(
        &mut self,
        civ: CivId,
        city_id: CityId,
        production: CityProduction,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ActionRejected> {
        if !self
            .cities
            .get(&city_id)
            .is_some_and(|city| city.civ == civ)
        {
            return Err(ActionRejected::UnknownCity(city_id));
        }
        if let CityProduction::Unit(unit_type) = production {
            let candidate = self
                .catalog_entry(unit_type)
                .ok_or(ActionRejected::UnknownUnitType(unit_type))?;
            if !query::can_build_unit(self, civ, candidate, city_id) {
                return Err(ActionRejected::CannotBuild {
                    city: city_id,
                    unit_type,
                });
            }
        }
        if let Some(city) = self.cities.get_mut(&city_id) {
            city.production = production;
        }
        self.emit(
            civ,
            Event::ProductionChanged {
                city: city_id,
                production,
            },
            out_events,
        );
        Ok(())
    }
}

/// Applies the provided action on behalf of `civ`, mutating state
/// deterministically.
///
/// Accepted actions record their events both in `out_events` and in the
/// civilization's message queue. Rejected actions leave the world untouched.
pub fn apply(
    world: &mut World,
    civ: CivId,
    action: &Action,
    out_events: &mut Vec<Event>,
) -> Result<(), ActionRejected> {
    let turn_ended = world
        .civ(civ)
        .ok_or(ActionRejected::UnknownCivilization(civ))?
        .turn_ended;
    if turn_ended {
        return Err(ActionRejected::TurnAlreadyEnded(civ));
    }

    match *action {
        Action::Move { unit, dx, dy } => world.move_unit(civ, unit, dx, dy, out_events)?,
        Action::FoundCity { unit } => world.found_city(civ, unit, out_events)?,
        Action::Fortify { unit } => {
            let fortifying = world
                .unit_mut(civ, unit)
                .ok_or(ActionRejected::UnknownUnit(unit))?;
            fortifying.fortified = true;
            world.emit(civ, Event::UnitFortified { unit }, out_events);
        }
        Action::Skip { unit } => {
            let skipping = world
                .unit_mut(civ, unit)
                .ok_or(ActionRejected::UnknownUnit(unit))?;
            if skipping.moves_left == 0 {
                return Err(ActionRejected::NoMovesLeft(unit));
            }
            skipping.moves_left = 0;
            world.emit(civ, Event::UnitSkipped { unit }, out_events);
        }
        Action::Load { unit, carrier } => world.load_unit(civ, unit, carrier, out_events)?,
        Action::Unload { unit } => world.unload_unit(civ, unit, out_events)?,
        Action::Improve { unit, improvement } => {
            world.improve_tile(civ, unit, improvement, out_events)?
        }
        Action::SetProduction { city, production } => {
            world.set_production(civ, city, production, out_events)?
        }
        Action::EndTurn => {
            if let Some(civilization) = world.civ_mut(civ) {
                civilization.turn_ended = true;
            }
            world.emit(civ, Event::TurnEnded { civ }, out_events);
            if world.civs.iter().all(|civilization| civilization.turn_ended) {
                world.start_round(civ, out_events);
            }
            return Ok(());
        }
    }

    world.refresh_residents();
    world.refresh_fog(civ);
    Ok(())
}

impl outpost_core::TurnEngine for World {
    fn perform_action(&mut self, civ: CivId, action: &Action) -> Result<(), ActionRejected> {
        let mut events = Vec::new();
        apply(self, civ, action, &mut events)
    }
}

impl outpost_core::WorldQuery for World {
    fn dimensions(&self) -> MapDimensions {
        self.dimensions
    }

    fn unit(&self, civ: CivId, unit: UnitId) -> Option<outpost_core::UnitSnapshot> {
        query::unit(self, civ, unit)
    }

    fn units(&self, civ: CivId) -> Vec<outpost_core::UnitSnapshot> {
        query::units(self, civ)
    }

    fn unit_types(&self) -> &[UnitType] {
        &self.unit_types
    }

    fn city(&self, civ: CivId, city: CityId) -> Option<outpost_core::CitySnapshot> {
        query::city(self, civ, city)
    }

    fn cities(&self, civ: CivId) -> Vec<outpost_core::CitySnapshot> {
        query::cities(self, civ)
    }

    fn known_city_tiles(&self, civ: CivId) -> Vec<Tile> {
        query::known_city_tiles(self, civ)
    }

    fn can_build_unit(&self, civ: CivId, unit_type: &UnitType, city: CityId) -> bool {
        query::can_build_unit(self, civ, unit_type, city)
    }

    fn civilization_view(&self, civ: CivId) -> Option<outpost_core::CivilizationView<'_>> {
        query::civilization_view(self, civ)
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use outpost_core::{
        CityId, CitySnapshot, CivId, CivilizationView, Event, Fog, Improvement, KnowledgeView,
        MapDimensions, ResidentView, Terrain, Tile, UnitId, UnitSnapshot, UnitType,
        MovementDomain,
    };

    use super::{City, Unit, World};

    /// Geometry of the map.
    #[must_use]
    pub fn dimensions(world: &World) -> MapDimensions {
        world.dimensions
    }

    /// Number of rounds completed since the session started.
    #[must_use]
    pub fn round(world: &World) -> u32 {
        world.round
    }

    /// Identifiers of every civilization in registration order.
    #[must_use]
    pub fn civilizations(world: &World) -> Vec<CivId> {
        world.civs.iter().map(|civilization| civilization.id).collect()
    }

    /// Display name of the civilization.
    #[must_use]
    pub fn civilization_name(world: &World, civ: CivId) -> Option<&str> {
        world.civ(civ).map(|civilization| civilization.name.as_str())
    }

    /// Reports whether the civilization already ended its turn this round.
    #[must_use]
    pub fn turn_ended(world: &World, civ: CivId) -> bool {
        world.civ(civ).is_some_and(|civilization| civilization.turn_ended)
    }

    /// Terrain of the tile.
    #[must_use]
    pub fn terrain(world: &World, tile: Tile) -> Option<Terrain> {
        world.terrain_at(tile)
    }

    /// Improvement built on the tile, if any.
    #[must_use]
    pub fn improvement(world: &World, tile: Tile) -> Option<Improvement> {
        world.improvement_at(tile)
    }

    /// Civilization whose unit or city stands on the tile.
    #[must_use]
    pub fn resident(world: &World, tile: Tile) -> Option<CivId> {
        world.resident(tile)
    }

    /// Knowledge level the civilization holds about the tile.
    #[must_use]
    pub fn fog(world: &World, civ: CivId, tile: Tile) -> Fog {
        let Some(civilization) = world.civ(civ) else {
            return Fog::Unknown;
        };
        world
            .dimensions
            .index(tile)
            .and_then(|index| civilization.fog.get(index).copied())
            .unwrap_or_default()
    }

    /// Number of tiles the civilization has seen at least once.
    #[must_use]
    pub fn known_tile_count(world: &World, civ: CivId) -> usize {
        world.civ(civ).map_or(0, |civilization| {
            civilization.fog.iter().filter(|fog| fog.is_known()).count()
        })
    }

    /// Resolves a unit owned by the civilization.
    #[must_use]
    pub fn unit(world: &World, civ: CivId, unit: UnitId) -> Option<UnitSnapshot> {
        world
            .unit_ref(civ, unit)
            .and_then(|unit| snapshot_unit(world, civ, unit))
    }

    /// Every unit owned by the civilization in identifier order.
    #[must_use]
    pub fn units(world: &World, civ: CivId) -> Vec<UnitSnapshot> {
        world.civ(civ).map_or_else(Vec::new, |civilization| {
            civilization
                .units
                .values()
                .filter_map(|unit| snapshot_unit(world, civ, unit))
                .collect()
        })
    }

    /// Resolves a city owned by the civilization.
    #[must_use]
    pub fn city(world: &World, civ: CivId, city: CityId) -> Option<CitySnapshot> {
        world
            .cities
            .get(&city)
            .filter(|city| city.civ == civ)
            .map(|city| snapshot_city(world, city))
    }

    /// Every city owned by the civilization in identifier order.
    #[must_use]
    pub fn cities(world: &World, civ: CivId) -> Vec<CitySnapshot> {
        world
            .cities
            .values()
            .filter(|city| city.civ == civ)
            .map(|city| snapshot_city(world, city))
            .collect()
    }

    /// Tiles of every city standing on a tile the civilization has seen.
    #[must_use]
    pub fn known_city_tiles(world: &World, civ: CivId) -> Vec<Tile> {
        world
            .cities
            .values()
            .map(|city| city.tile)
            .filter(|tile| fog(world, civ, *tile).is_known())
            .collect()
    }

    /// Reports whether the civilization may build the unit type in the city.
    ///
    /// Sea units need a coastal city.
    #[must_use]
    pub fn can_build_unit(world: &World, civ: CivId, unit_type: &UnitType, city: CityId) -> bool {
        let Some(city) = world.cities.get(&city).filter(|city| city.civ == civ) else {
            return false;
        };
        if world.catalog_entry(unit_type.id).is_none() {
            return false;
        }
        match unit_type.domain {
            MovementDomain::Land => true,
            MovementDomain::Sea => world.is_coastal(city.tile),
        }
    }

    /// Knowledge and residents as seen by the civilization.
    #[must_use]
    pub fn civilization_view(world: &World, civ: CivId) -> Option<CivilizationView<'_>> {
        let civilization = world.civ(civ)?;
        Some(CivilizationView {
            civ,
            knowledge: KnowledgeView::new(&civilization.fog, &world.terrain, world.dimensions),
            residents: resident_view(world),
        })
    }

    /// Exposes a read-only view of tile residents.
    #[must_use]
    pub fn resident_view(world: &World) -> ResidentView<'_> {
        ResidentView::new(&world.residents, world.dimensions)
    }

    /// Messages queued for the civilization, oldest first.
    #[must_use]
    pub fn messages(world: &World, civ: CivId) -> Vec<Event> {
        world
            .civ(civ)
            .map(|civilization| civilization.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn snapshot_unit(world: &World, civ: CivId, unit: &Unit) -> Option<UnitSnapshot> {
        let unit_type = world.catalog_entry(unit.unit_type)?;
        Some(UnitSnapshot {
            id: unit.id,
            civ,
            unit_type: unit.unit_type,
            domain: unit_type.domain,
            tile: unit.tile,
            moves_left: unit.moves_left,
            fortified: unit.fortified,
            carried_by: unit.carried_by,
        })
    }

    fn snapshot_city(world: &World, city: &City) -> CitySnapshot {
        CitySnapshot {
            id: city.id,
            civ: city.civ,
            name: city.name.clone(),
            tile: city.tile,
            production: city.production,
            stored_production: city.stored_production,
            coastal: world.is_coastal(city.tile),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_core::{MovementDomain, TurnEngine, WorldQuery};

    fn catalog() -> Vec<UnitType> {
        vec![
            UnitType {
                id: UnitTypeId::new(1),
                name: "Warriors".to_owned(),
                moves: 1,
                domain: MovementDomain::Land,
                cost: 10,
                founds_cities: false,
                improves_terrain: false,
                carry_capacity: 0,
            },
            UnitType {
                id: UnitTypeId::new(2),
                name: "Settlers".to_owned(),
                moves: 1,
                domain: MovementDomain::Land,
                cost: 30,
                founds_cities: true,
                improves_terrain: true,
                carry_capacity: 0,
            },
            UnitType {
                id: UnitTypeId::new(3),
                name: "Trireme".to_owned(),
                moves: 3,
                domain: MovementDomain::Sea,
                cost: 40,
                founds_cities: false,
                improves_terrain: false,
                carry_capacity: 2,
            },
        ]
    }

    const WARRIORS: UnitTypeId = UnitTypeId::new(1);
    const SETTLERS: UnitTypeId = UnitTypeId::new(2);
    const TRIREME: UnitTypeId = UnitTypeId::new(3);

    /// Six columns of grassland with an ocean column on the east edge.
    fn coastal_world() -> World {
        let dimensions = MapDimensions::new(6, 5, false);
        let terrain = dimensions
            .tiles()
            .map(|tile| {
                if tile.column() == 5 {
                    Terrain::Ocean
                } else {
                    Terrain::Grassland
                }
            })
            .collect();
        World::new(dimensions, terrain, catalog()).expect("valid world")
    }

    #[test]
    fn new_rejects_mismatched_terrain() {
        let dimensions = MapDimensions::new(3, 3, false);
        let error = World::new(dimensions, vec![Terrain::Plains; 4], catalog())
            .expect_err("terrain too short");
        assert_eq!(
            error,
            WorldError::TerrainSizeMismatch {
                expected: 9,
                actual: 4
            }
        );
    }

    #[test]
    fn move_spends_moves_and_reveals_terrain() {
        let mut world = coastal_world();
        let civ = world.add_civilization("Rome");
        let unit = world
            .spawn_unit(civ, WARRIORS, Tile::new(1, 1))
            .expect("spawn");
        assert_eq!(query::fog(&world, civ, Tile::new(3, 1)), Fog::Unknown);

        let mut events = Vec::new();
        apply(
            &mut world,
            civ,
            &Action::Move { unit, dx: 1, dy: 0 },
            &mut events,
        )
        .expect("move accepted");

        let snapshot = query::unit(&world, civ, unit).expect("unit present");
        assert_eq!(snapshot.tile, Tile::new(2, 1));
        assert_eq!(snapshot.moves_left, 0);
        assert!(!snapshot.idle());
        assert_eq!(query::fog(&world, civ, Tile::new(3, 1)), Fog::Visible);
        assert_eq!(query::fog(&world, civ, Tile::new(0, 1)), Fog::Explored);
        assert_eq!(
            events,
            vec![Event::UnitMoved {
                unit,
                from: Tile::new(1, 1),
                to: Tile::new(2, 1)
            }]
        );
        assert_eq!(world.drain_messages(civ), events);
        assert!(world.drain_messages(civ).is_empty());
    }

    #[test]
    fn rejected_actions_leave_world_untouched() {
        let mut world = coastal_world();
        let civ = world.add_civilization("Rome");
        let unit = world
            .spawn_unit(civ, WARRIORS, Tile::new(4, 1))
            .expect("spawn");

        let ocean = world.perform_action(civ, &Action::Move { unit, dx: 1, dy: 0 });
        assert_eq!(
            ocean,
            Err(ActionRejected::Impassable {
                terrain: Terrain::Ocean
            })
        );
        let far = world.perform_action(civ, &Action::Move { unit, dx: 2, dy: 0 });
        assert_eq!(far, Err(ActionRejected::NotAdjacent { dx: 2, dy: 0 }));

        let snapshot = query::unit(&world, civ, unit).expect("unit present");
        assert_eq!(snapshot.tile, Tile::new(4, 1));
        assert_eq!(snapshot.moves_left, MOVE_FRAGMENTS);
        assert!(world.drain_messages(civ).is_empty());
    }

    #[test]
    fn foreign_units_block_movement() {
        let mut world = coastal_world();
        let rome = world.add_civilization("Rome");
        let carthage = world.add_civilization("Carthage");
        let unit = world
            .spawn_unit(rome, WARRIORS, Tile::new(1, 1))
            .expect("spawn");
        let _ = world
            .spawn_unit(carthage, WARRIORS, Tile::new(2, 2))
            .expect("spawn");

        let result = world.perform_action(rome, &Action::Move { unit, dx: 1, dy: 1 });
        assert_eq!(
            result,
            Err(ActionRejected::Occupied {
                tile: Tile::new(2, 2),
                occupant: carthage
            })
        );
    }

    #[test]
    fn founding_a_city_consumes_the_settler_and_enforces_spacing() {
        let mut world = coastal_world();
        let civ = world.add_civilization("Rome");
        let settler = world
            .spawn_unit(civ, SETTLERS, Tile::new(1, 1))
            .expect("spawn");
        let second = world
            .spawn_unit(civ, SETTLERS, Tile::new(3, 2))
            .expect("spawn");

        world
            .perform_action(civ, &Action::FoundCity { unit: settler })
            .expect("city founded");
        assert!(query::unit(&world, civ, settler).is_none());
        let cities = query::cities(&world, civ);
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].name, "Rome 1");
        assert_eq!(cities[0].tile, Tile::new(1, 1));

        let too_close = world.perform_action(civ, &Action::FoundCity { unit: second });
        assert_eq!(
            too_close,
            Err(ActionRejected::CityTooClose {
                tile: Tile::new(3, 2)
            })
        );
    }

    #[test]
    fn rounds_restore_moves_and_complete_production() {
        let mut world = coastal_world();
        let civ = world.add_civilization("Rome");
        let settler = world
            .spawn_unit(civ, SETTLERS, Tile::new(1, 1))
            .expect("spawn");
        world
            .perform_action(civ, &Action::FoundCity { unit: settler })
            .expect("city founded");
        let city = query::cities(&world, civ)[0].id;
        world
            .perform_action(
                civ,
                &Action::SetProduction {
                    city,
                    production: CityProduction::Unit(WARRIORS),
                },
            )
            .expect("production set");

        world
            .perform_action(civ, &Action::EndTurn)
            .expect("turn ended");
        assert_eq!(query::round(&world), 1);
        assert!(!query::turn_ended(&world, civ));

        let units = query::units(&world, civ);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit_type, WARRIORS);
        assert_eq!(units[0].tile, Tile::new(1, 1));
        let messages = world.drain_messages(civ);
        assert!(messages.contains(&Event::RoundStarted { round: 1 }));
        assert!(messages.contains(&Event::UnitBuilt {
            city,
            unit: units[0].id,
            unit_type: WARRIORS
        }));
    }

    #[test]
    fn ended_turn_rejects_further_actions_until_round_starts() {
        let mut world = coastal_world();
        let rome = world.add_civilization("Rome");
        let _carthage = world.add_civilization("Carthage");
        let unit = world
            .spawn_unit(rome, WARRIORS, Tile::new(1, 1))
            .expect("spawn");

        world
            .perform_action(rome, &Action::EndTurn)
            .expect("turn ended");
        assert_eq!(
            world.perform_action(rome, &Action::Skip { unit }),
            Err(ActionRejected::TurnAlreadyEnded(rome))
        );
        assert_eq!(query::round(&world), 0);
    }

    #[test]
    fn sea_units_need_coastal_cities() {
        let mut world = coastal_world();
        let civ = world.add_civilization("Rome");
        let inland = world
            .spawn_unit(civ, SETTLERS, Tile::new(0, 0))
            .expect("spawn");
        let coastal = world
            .spawn_unit(civ, SETTLERS, Tile::new(4, 4))
            .expect("spawn");
        world
            .perform_action(civ, &Action::FoundCity { unit: inland })
            .expect("inland city");
        world
            .perform_action(civ, &Action::FoundCity { unit: coastal })
            .expect("coastal city");
        let cities = query::cities(&world, civ);
        let trireme = world.catalog_entry(TRIREME).expect("catalog entry").clone();

        assert!(!world.can_build_unit(civ, &trireme, cities[0].id));
        assert!(world.can_build_unit(civ, &trireme, cities[1].id));
    }

    #[test]
    fn land_units_board_carriers_at_sea_and_travel_with_them() {
        let mut world = coastal_world();
        let civ = world.add_civilization("Rome");
        let ship = world
            .spawn_unit(civ, TRIREME, Tile::new(5, 1))
            .expect("spawn ship");
        let warriors = world
            .spawn_unit(civ, WARRIORS, Tile::new(4, 1))
            .expect("spawn warriors");

        world
            .perform_action(
                civ,
                &Action::Move {
                    unit: warriors,
                    dx: 1,
                    dy: 0,
                },
            )
            .expect("boarding move");
        let aboard = query::unit(&world, civ, warriors).expect("warriors");
        assert_eq!(aboard.carried_by, Some(ship));

        world
            .perform_action(
                civ,
                &Action::Move {
                    unit: ship,
                    dx: 0,
                    dy: 1,
                },
            )
            .expect("ship moves");
        let aboard = query::unit(&world, civ, warriors).expect("warriors");
        assert_eq!(aboard.tile, Tile::new(5, 2));

        assert_eq!(
            world.perform_action(civ, &Action::Unload { unit: warriors }),
            Err(ActionRejected::Impassable {
                terrain: Terrain::Ocean
            })
        );
    }

    #[test]
    fn roads_make_moves_cheaper() {
        let mut world = coastal_world();
        let civ = world.add_civilization("Rome");
        let worker = world
            .spawn_unit(civ, SETTLERS, Tile::new(1, 1))
            .expect("spawn");
        for tile in [Tile::new(1, 1), Tile::new(2, 1)] {
            if let Some(index) = world.dimensions.index(tile) {
                world.improvements[index] = Some(Improvement::Road);
            }
        }

        world
            .perform_action(
                civ,
                &Action::Move {
                    unit: worker,
                    dx: 1,
                    dy: 0,
                },
            )
            .expect("road move");
        let snapshot = query::unit(&world, civ, worker).expect("worker");
        assert_eq!(snapshot.moves_left, MOVE_FRAGMENTS - 1);
        assert!(snapshot.idle());

        assert_eq!(
            world.perform_action(
                civ,
                &Action::Improve {
                    unit: worker,
                    improvement: Improvement::Road
                }
            ),
            Err(ActionRejected::AlreadyImproved {
                tile: Tile::new(2, 1)
            })
        );
    }

    #[test]
    fn removed_units_disappear_from_lookups() {
        let mut world = coastal_world();
        let civ = world.add_civilization("Rome");
        let unit = world
            .spawn_unit(civ, WARRIORS, Tile::new(2, 2))
            .expect("spawn");

        assert!(world.remove_unit(civ, unit));
        assert!(world.unit(civ, unit).is_none());
        assert_eq!(query::resident(&world, Tile::new(2, 2)), None);
        assert!(!world.remove_unit(civ, unit));
        assert_eq!(world.drain_messages(civ), vec![Event::UnitLost { unit }]);
    }
}
