//! Objective that founds new cities with city-founding units.

use outpost_core::{
    CityProduction, CitySnapshot, CivId, CivilizationView, Pathfinder, Tile, UnitSnapshot,
    UnitType, WorldQuery, MIN_CITY_DISTANCE,
};

use crate::{CivObjective, Objective, Orders};

/// Points awarded for a settler while the civilization has no city.
const SETTLER_POINTS: u32 = 100;

/// Upper bound on city sites probed for a route when adopting a settler.
const MAX_SITE_CANDIDATES: usize = 16;

/// Walks settlers to the closest free site and founds cities there.
#[derive(Clone, Debug)]
pub struct ExpansionObjective {
    objective: Objective,
}

impl ExpansionObjective {
    /// Creates an expansion objective.
    #[must_use]
    pub fn new(civ: CivId, name: impl Into<String>) -> Self {
        Self {
            objective: Objective::new(civ, name),
        }
    }

    /// Known sites where a city could be founded, closest to `unit` first.
    ///
    /// A site is known land that can host a city, is not held by another
    /// civilization, and keeps the minimum distance from every known city
    /// and from every site already claimed by a held settler.
    fn city_sites(
        &self,
        world: &dyn WorldQuery,
        view: &CivilizationView<'_>,
        unit: &UnitSnapshot,
    ) -> Vec<Tile> {
        let dimensions = view.knowledge.dimensions();
        let mut taken = world.known_city_tiles(view.civ);
        taken.extend(
            self.objective
                .goals()
                .filter(|(held, _)| *held != unit.id)
                .map(|(_, goal)| goal),
        );

        let mut sites: Vec<(u32, u32, u32, Tile)> = dimensions
            .tiles()
            .filter(|tile| {
                view.knowledge
                    .terrain(*tile)
                    .is_some_and(|terrain| terrain.can_host_city())
            })
            .filter(|tile| {
                view.residents
                    .resident(*tile)
                    .map_or(true, |resident| resident == view.civ)
            })
            .filter(|tile| {
                taken
                    .iter()
                    .all(|city| dimensions.distance(*city, *tile) >= MIN_CITY_DISTANCE)
            })
            .map(|tile| {
                (
                    dimensions.distance(unit.tile, tile),
                    tile.row(),
                    tile.column(),
                    tile,
                )
            })
            .collect();
        sites.sort_unstable();
        sites.into_iter().map(|(.., tile)| tile).collect()
    }
}

fn founds_cities(unit_type: &UnitType) -> bool {
    unit_type.founds_cities
}

/// Cheaper settlers win; among equally priced ones the faster does.
fn cheaper_then_faster(candidate: &UnitType, chosen: &UnitType) -> bool {
    candidate.cost < chosen.cost
        || (candidate.cost == chosen.cost && candidate.moves > chosen.moves)
}

impl CivObjective for ExpansionObjective {
    fn objective(&self) -> &Objective {
        &self.objective
    }

    fn objective_mut(&mut self) -> &mut Objective {
        &mut self.objective
    }

    fn unit_points(&self, world: &dyn WorldQuery, unit: &UnitSnapshot) -> u32 {
        if !world.unit_type(unit.unit_type).is_some_and(founds_cities) {
            return 0;
        }
        let planned = world
            .cities(self.objective.civ())
            .len()
            .saturating_add(self.objective.len())
            .saturating_add(1);
        SETTLER_POINTS / u32::try_from(planned).unwrap_or(u32::MAX)
    }

    fn city_production(
        &self,
        world: &dyn WorldQuery,
        city: &CitySnapshot,
    ) -> (CityProduction, u32) {
        self.best_unit_production(world, city, &cheaper_then_faster, &founds_cities)
    }

    fn add_unit(
        &mut self,
        world: &dyn WorldQuery,
        pathfinder: &dyn Pathfinder,
        unit: &UnitSnapshot,
    ) -> bool {
        if unit.carried_by.is_some() || !world.unit_type(unit.unit_type).is_some_and(founds_cities)
        {
            return false;
        }
        let Some(view) = world.civilization_view(self.objective.civ()) else {
            return false;
        };

        let site = self
            .city_sites(world, &view, unit)
            .into_iter()
            .take(MAX_SITE_CANDIDATES)
            .find(|site| {
                *site == unit.tile
                    || !pathfinder
                        .compute_path(&view, unit, true, unit.tile, *site)
                        .is_empty()
            });
        let Some(site) = site else {
            return false;
        };

        self.objective
            .insert(Orders::settle(self.objective.civ(), unit.id, site));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_core::{MovementDomain, UnitTypeId};

    #[test]
    fn cheaper_settlers_are_preferred() {
        let settlers = UnitType {
            id: UnitTypeId::new(1),
            name: "Settlers".to_owned(),
            moves: 1,
            domain: MovementDomain::Land,
            cost: 30,
            founds_cities: true,
            improves_terrain: true,
            carry_capacity: 0,
        };
        let pioneers = UnitType {
            id: UnitTypeId::new(2),
            name: "Pioneers".to_owned(),
            moves: 2,
            cost: 30,
            ..settlers.clone()
        };
        let colonists = UnitType {
            id: UnitTypeId::new(3),
            name: "Colonists".to_owned(),
            cost: 20,
            ..settlers.clone()
        };

        assert!(cheaper_then_faster(&pioneers, &settlers));
        assert!(cheaper_then_faster(&colonists, &pioneers));
        assert!(!cheaper_then_faster(&settlers, &colonists));
    }
}
