#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Objective-driven order execution for computer-controlled civilizations.
//!
//! An [`Objective`] owns standing [`Orders`] for a set of units and drives
//! them one step per [`Objective::process`] call. A rejected step is retried
//! exactly once after replanning; a second rejection releases the unit so a
//! higher-level driver can reassign it later.

mod expansion;
mod exploration;
pub mod orders;

use std::collections::BTreeSet;

use outpost_core::{
    Action, ActionRejected, CitySnapshot, CityProduction, CivId, Pathfinder, TurnEngine,
    UnitId, UnitSnapshot, UnitType, WorldQuery,
};
use tracing::debug;

pub use expansion::ExpansionObjective;
pub use exploration::ExplorationObjective;
pub use orders::Orders;

/// Strict preference between two unit types: `true` when the first beats the
/// second.
pub type UnitComparator<'a> = &'a dyn Fn(&UnitType, &UnitType) -> bool;

/// Filter selecting the unit types an objective is willing to build.
pub type UnitAcceptance<'a> = &'a dyn Fn(&UnitType) -> bool;

/// Registry of units an objective controls together with their orders.
#[derive(Clone, Debug)]
pub struct Objective {
    name: String,
    civ: CivId,
    entries: Vec<(UnitId, Orders)>,
}

impl Objective {
    /// Creates an empty objective for the civilization.
    #[must_use]
    pub fn new(civ: CivId, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            civ,
            entries: Vec::new(),
        }
    }

    /// Diagnostic name of the objective.
    #[must_use]
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Civilization the objective plays for.
    #[must_use]
    pub fn civ(&self) -> CivId {
        self.civ
    }

    /// Number of units currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the objective holds no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reports whether the unit is held by this objective.
    #[must_use]
    pub fn contains(&self, unit: UnitId) -> bool {
        self.entries.iter().any(|(held, _)| *held == unit)
    }

    /// Orders held for the unit.
    #[must_use]
    pub fn orders(&self, unit: UnitId) -> Option<&Orders> {
        self.entries
            .iter()
            .find(|(held, _)| *held == unit)
            .map(|(_, orders)| orders)
    }

    /// Units held in insertion order.
    pub fn units(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.entries.iter().map(|(unit, _)| *unit)
    }

    /// Goals of every held unit that has one, paired with the unit.
    pub fn goals(&self) -> impl Iterator<Item = (UnitId, outpost_core::Tile)> + '_ {
        self.entries
            .iter()
            .filter_map(|(unit, orders)| orders.goal().map(|goal| (*unit, goal)))
    }

    /// Hands the unit over to this objective. Orders already held for the
    /// unit are replaced in place.
    pub fn insert(&mut self, orders: Orders) {
        let unit = orders.unit();
        match self.entries.iter_mut().find(|(held, _)| *held == unit) {
            Some((_, existing)) => *existing = orders,
            None => self.entries.push((unit, orders)),
        }
    }

    /// Releases the unit, returning its orders.
    pub fn remove(&mut self, unit: UnitId) -> Option<Orders> {
        let position = self.entries.iter().position(|(held, _)| *held == unit)?;
        Some(self.entries.remove(position).1)
    }

    /// Advances every held unit by at most one accepted action.
    ///
    /// Units that left the world are dropped silently. A unit whose action
    /// is rejected twice, after one replan, is dropped and recorded in
    /// `freed_units`. Registry removals take effect after the pass.
    pub fn process<E>(
        &mut self,
        engine: &mut E,
        pathfinder: &dyn Pathfinder,
        freed_units: &mut BTreeSet<UnitId>,
    ) where
        E: TurnEngine + WorldQuery,
    {
        let civ = self.civ;
        let mut removals = Vec::new();

        for (unit, orders) in &mut self.entries {
            let unit = *unit;
            if engine.unit(civ, unit).is_none() {
                debug!(objective = %self.name, unit = unit.get(), "unit lost");
                removals.push(unit);
                continue;
            }

            if orders.finished() {
                let _ = orders.replan(&*engine, pathfinder);
            }

            let first = submit(engine, civ, orders);
            if first.is_ok() {
                orders.drop_action();
                continue;
            }
            debug!(
                objective = %self.name,
                unit = unit.get(),
                action = %describe(&first),
                "could not perform action"
            );

            let _ = orders.replan(&*engine, pathfinder);
            let second = submit(engine, civ, orders);
            if second.is_ok() {
                orders.drop_action();
                continue;
            }
            debug!(
                objective = %self.name,
                unit = unit.get(),
                action = %describe(&second),
                "still could not perform action; unit freed"
            );
            let _ = freed_units.insert(unit);
            removals.push(unit);
        }

        self.entries.retain(|(unit, _)| !removals.contains(unit));
    }
}

/// Failure of a single submission attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttemptFailure {
    NoPlan,
    Rejected(Action, ActionRejected),
}

fn submit<E>(engine: &mut E, civ: CivId, orders: &Orders) -> Result<Action, AttemptFailure>
where
    E: TurnEngine + WorldQuery,
{
    let action = orders
        .get_action(&*engine)
        .ok_or(AttemptFailure::NoPlan)?;
    engine
        .perform_action(civ, &action)
        .map(|()| action)
        .map_err(|reason| AttemptFailure::Rejected(action, reason))
}

fn describe(attempt: &Result<Action, AttemptFailure>) -> String {
    match attempt {
        Ok(action) => action.to_string(),
        Err(AttemptFailure::NoPlan) => "no plan".to_owned(),
        Err(AttemptFailure::Rejected(action, reason)) => format!("{action}: {reason}"),
    }
}

/// Behaviour shared by the objectives a civilization pursues.
///
/// Implementors own an [`Objective`] registry and decide which units they
/// accept and what cities should build for them.
pub trait CivObjective {
    /// Registry of held units.
    fn objective(&self) -> &Objective;

    /// Mutable registry of held units.
    fn objective_mut(&mut self) -> &mut Objective;

    /// Value of the unit to this objective; zero means useless.
    fn unit_points(&self, world: &dyn WorldQuery, unit: &UnitSnapshot) -> u32;

    /// What the city should build for this objective and how much it wants it.
    fn city_production(&self, world: &dyn WorldQuery, city: &CitySnapshot)
        -> (CityProduction, u32);

    /// Offers the unit to the objective; returns whether it was taken.
    fn add_unit(
        &mut self,
        world: &dyn WorldQuery,
        pathfinder: &dyn Pathfinder,
        unit: &UnitSnapshot,
    ) -> bool;

    /// Diagnostic name of the objective.
    fn get_name(&self) -> &str {
        self.objective().get_name()
    }

    /// Picks the best unit type the city can build for this objective.
    ///
    /// Types are considered in catalog order; a candidate replaces the
    /// current choice only when `comparator` strictly prefers it. The winner
    /// is scored through [`CivObjective::unit_points`] on a hypothetical unit
    /// standing in the city. Returns [`CityProduction::Idle`] with a score of
    /// zero when no type is accepted.
    fn best_unit_production(
        &self,
        world: &dyn WorldQuery,
        city: &CitySnapshot,
        comparator: UnitComparator<'_>,
        acceptance: UnitAcceptance<'_>,
    ) -> (CityProduction, u32) {
        let civ = self.objective().civ();
        let mut chosen: Option<&UnitType> = None;
        for candidate in world.unit_types() {
            if !world.can_build_unit(civ, candidate, city.id) || !acceptance(candidate) {
                continue;
            }
            if chosen.map_or(true, |current| comparator(candidate, current)) {
                chosen = Some(candidate);
            }
        }

        let Some(unit_type) = chosen else {
            return (CityProduction::Idle, 0);
        };
        let dummy = UnitSnapshot::hypothetical(unit_type, civ, city.tile);
        let points = self.unit_points(world, &dummy);
        debug!(
            objective = self.get_name(),
            city = %city.name,
            unit_type = %unit_type.name,
            points,
            "production proposal"
        );
        (CityProduction::Unit(unit_type.id), points)
    }
}
