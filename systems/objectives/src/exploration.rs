//! Objective that sends spare units out to uncover the map.

use outpost_core::{
    CityProduction, CitySnapshot, CivId, Pathfinder, UnitSnapshot, UnitType, WorldQuery,
};

use crate::{CivObjective, Objective, Orders};

/// Points an exploration objective awards an explorer when it holds none.
const EXPLORER_POINTS: u32 = 40;

/// Keeps up to `max_explorers` units wandering toward unexplored frontier.
#[derive(Clone, Debug)]
pub struct ExplorationObjective {
    objective: Objective,
    max_explorers: usize,
}

impl ExplorationObjective {
    /// Creates an exploration objective holding at most `max_explorers`
    /// units.
    #[must_use]
    pub fn new(civ: CivId, name: impl Into<String>, max_explorers: usize) -> Self {
        Self {
            objective: Objective::new(civ, name),
            max_explorers,
        }
    }

    fn has_room(&self) -> bool {
        self.objective.len() < self.max_explorers
    }
}

fn is_explorer(unit_type: &UnitType) -> bool {
    !unit_type.founds_cities && unit_type.moves > 0
}

/// Faster types win; among equally fast types the cheaper one does.
fn faster_then_cheaper(candidate: &UnitType, chosen: &UnitType) -> bool {
    candidate.moves > chosen.moves
        || (candidate.moves == chosen.moves && candidate.cost < chosen.cost)
}

impl CivObjective for ExplorationObjective {
    fn objective(&self) -> &Objective {
        &self.objective
    }

    fn objective_mut(&mut self) -> &mut Objective {
        &mut self.objective
    }

    fn unit_points(&self, world: &dyn WorldQuery, unit: &UnitSnapshot) -> u32 {
        if !self.has_room() {
            return 0;
        }
        let Some(unit_type) = world.unit_type(unit.unit_type) else {
            return 0;
        };
        if !is_explorer(unit_type) {
            return 0;
        }
        let missing = self.max_explorers.saturating_sub(self.objective.len());
        let missing = u32::try_from(missing).unwrap_or(u32::MAX);
        let wanted = u32::try_from(self.max_explorers.max(1)).unwrap_or(u32::MAX);
        EXPLORER_POINTS.saturating_mul(missing) / wanted + unit_type.moves.saturating_mul(5)
    }

    fn city_production(
        &self,
        world: &dyn WorldQuery,
        city: &CitySnapshot,
    ) -> (CityProduction, u32) {
        self.best_unit_production(world, city, &faster_then_cheaper, &is_explorer)
    }

    fn add_unit(
        &mut self,
        world: &dyn WorldQuery,
        _pathfinder: &dyn Pathfinder,
        unit: &UnitSnapshot,
    ) -> bool {
        if !self.has_room() || unit.carried_by.is_some() {
            return false;
        }
        if !world.unit_type(unit.unit_type).is_some_and(is_explorer) {
            return false;
        }
        self.objective
            .insert(Orders::explore(self.objective.civ(), unit.id, true));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_core::{MovementDomain, UnitTypeId};

    fn unit_type(id: u32, moves: u32, cost: u32) -> UnitType {
        UnitType {
            id: UnitTypeId::new(id),
            name: format!("type {id}"),
            moves,
            domain: MovementDomain::Land,
            cost,
            founds_cities: false,
            improves_terrain: false,
            carry_capacity: 0,
        }
    }

    #[test]
    fn faster_types_beat_cheaper_ones() {
        let horse = unit_type(1, 2, 20);
        let warriors = unit_type(2, 1, 10);
        let archers = unit_type(3, 1, 20);

        assert!(faster_then_cheaper(&horse, &warriors));
        assert!(!faster_then_cheaper(&warriors, &horse));
        assert!(faster_then_cheaper(&warriors, &archers));
        assert!(!faster_then_cheaper(&archers, &archers));
    }
}
