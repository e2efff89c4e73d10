#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Turn driver for computer-controlled civilizations.
//!
//! Each turn the driver lets every objective advance its units, adopts idle
//! units nobody controls into the first objective that accepts them, picks
//! city production from the objectives' proposals, and ends the turn.

use std::collections::{BTreeMap, BTreeSet};

use outpost_core::{Action, CivId, Pathfinder, TurnEngine, UnitId, WorldQuery};
use outpost_system_objectives::{CivObjective, ExpansionObjective, ExplorationObjective};
use tracing::{debug, warn};

/// Explorers the default objective set keeps in the field.
pub const DEFAULT_MAX_EXPLORERS: usize = 2;

/// Summary of a single AI turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurnReport {
    /// Units adopted into an objective this turn.
    pub adopted: usize,
    /// Units released by their objective this turn.
    pub freed: usize,
    /// Cities whose production changed this turn.
    pub production_changes: usize,
}

/// Computer player for a single civilization.
pub struct Ai {
    civ: CivId,
    objectives: Vec<Box<dyn CivObjective>>,
    assignments: BTreeMap<UnitId, usize>,
}

impl std::fmt::Debug for Ai {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ai")
            .field("civ", &self.civ)
            .field(
                "objectives",
                &self
                    .objectives
                    .iter()
                    .map(|objective| objective.get_name())
                    .collect::<Vec<_>>(),
            )
            .field("assignments", &self.assignments)
            .finish()
    }
}

impl Ai {
    /// Creates a driver pursuing the provided objectives in priority order.
    #[must_use]
    pub fn new(civ: CivId, objectives: Vec<Box<dyn CivObjective>>) -> Self {
        Self {
            civ,
            objectives,
            assignments: BTreeMap::new(),
        }
    }

    /// Creates a driver with the standard expansion and exploration
    /// objectives.
    #[must_use]
    pub fn with_default_objectives(civ: CivId, max_explorers: usize) -> Self {
        Self::new(
            civ,
            vec![
                Box::new(ExpansionObjective::new(civ, "expansion")),
                Box::new(ExplorationObjective::new(civ, "exploration", max_explorers)),
            ],
        )
    }

    /// Civilization the driver plays for.
    #[must_use]
    pub fn civ(&self) -> CivId {
        self.civ
    }

    /// Name of the objective currently controlling the unit.
    #[must_use]
    pub fn assignment(&self, unit: UnitId) -> Option<&str> {
        self.assignments
            .get(&unit)
            .and_then(|index| self.objectives.get(*index))
            .map(|objective| objective.get_name())
    }

    /// Plays one full turn and ends it.
    pub fn play_turn<E>(&mut self, engine: &mut E, pathfinder: &dyn Pathfinder) -> TurnReport
    where
        E: TurnEngine + WorldQuery,
    {
        let mut report = TurnReport::default();

        let mut freed = BTreeSet::new();
        for objective in &mut self.objectives {
            objective
                .objective_mut()
                .process(engine, pathfinder, &mut freed);
        }
        report.freed = freed.len();

        let civ = self.civ;
        let objectives = &self.objectives;
        self.assignments.retain(|unit, index| {
            engine.unit(civ, *unit).is_some()
                && objectives
                    .get(*index)
                    .is_some_and(|objective| objective.objective().contains(*unit))
        });

        report.adopted = self.adopt_idle_units(&*engine, pathfinder, &freed);
        report.production_changes = self.choose_production(engine);

        if let Err(reason) = engine.perform_action(self.civ, &Action::EndTurn) {
            warn!(civ = self.civ.get(), %reason, "could not end turn");
        }
        report
    }

    fn adopt_idle_units(
        &mut self,
        world: &dyn WorldQuery,
        pathfinder: &dyn Pathfinder,
        freed: &BTreeSet<UnitId>,
    ) -> usize {
        let mut adopted = 0;
        for unit in world.units(self.civ) {
            if !unit.idle() || freed.contains(&unit.id) || self.assignments.contains_key(&unit.id)
            {
                continue;
            }
            for (index, objective) in self.objectives.iter_mut().enumerate() {
                if objective.add_unit(world, pathfinder, &unit) {
                    debug!(
                        civ = self.civ.get(),
                        unit = unit.id.get(),
                        objective = objective.get_name(),
                        "unit adopted"
                    );
                    let _ = self.assignments.insert(unit.id, index);
                    adopted += 1;
                    break;
                }
            }
        }
        adopted
    }

    fn choose_production<E>(&self, engine: &mut E) -> usize
    where
        E: TurnEngine + WorldQuery,
    {
        let mut changes = 0;
        for city in engine.cities(self.civ) {
            let mut best = None;
            for objective in &self.objectives {
                let (production, points) = objective.city_production(&*engine, &city);
                if points > 0 && best.map_or(true, |(_, current)| points > current) {
                    best = Some((production, points));
                }
            }
            let Some((production, points)) = best else {
                continue;
            };
            if production == city.production {
                continue;
            }
            match engine.perform_action(
                self.civ,
                &Action::SetProduction {
                    city: city.id,
                    production,
                },
            ) {
                Ok(()) => {
                    debug!(city = %city.name, ?production, points, "production changed");
                    changes += 1;
                }
                Err(reason) => warn!(city = %city.name, %reason, "could not change production"),
            }
        }
        changes
    }
}
