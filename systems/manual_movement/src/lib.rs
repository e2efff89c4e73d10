#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Player-issued multi-step movement for human-controlled civilizations.
//!
//! A committed path becomes a queue of waypoints that is walked one tile at a
//! time whenever the owning unit is active and idle. Queues never replan: any
//! invalidation (a foreign presence next to the unit, a waypoint that is no
//! longer adjacent, or a move the engine rejects) deletes the queue.

use std::collections::{BTreeMap, VecDeque};

use outpost_core::{
    Action, ActionRejected, CivId, Pathfinder, Tile, TurnEngine, UnitId, WorldQuery,
};
use tracing::debug;

/// Reason a movement queue was deleted before reaching its end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// A foreign unit or city stands on or next to the unit.
    AdjacentHostile,
    /// The next waypoint is more than one tile away from the unit.
    InvalidStep {
        /// Column displacement to the waypoint.
        dx: i32,
        /// Row displacement to the waypoint.
        dy: i32,
    },
    /// The engine refused the move toward the next waypoint.
    Rejected(ActionRejected),
}

/// Result of walking a unit's movement queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueOutcome {
    /// The unit has no movement queue.
    NoOrders,
    /// The unit cannot act right now; the queue is kept for later.
    NotIdle,
    /// Every waypoint was consumed and the queue was deleted.
    Completed,
    /// The queue was deleted because it became invalid.
    Aborted(AbortReason),
    /// The unit left the world and its queue was deleted.
    UnitLost,
}

/// Movement queues keyed by unit.
#[derive(Clone, Debug, Default)]
pub struct MovementQueues {
    queues: BTreeMap<UnitId, VecDeque<Tile>>,
}

impl MovementQueues {
    /// Creates an empty set of queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the unit's queue with the provided waypoints.
    pub fn set(&mut self, unit: UnitId, waypoints: impl IntoIterator<Item = Tile>) {
        let _ = self.queues.insert(unit, waypoints.into_iter().collect());
    }

    /// Deletes the unit's queue; returns whether one existed.
    pub fn cancel(&mut self, unit: UnitId) -> bool {
        self.queues.remove(&unit).is_some()
    }

    /// Waypoints still queued for the unit.
    #[must_use]
    pub fn waypoints(&self, unit: UnitId) -> Option<&VecDeque<Tile>> {
        self.queues.get(&unit)
    }

    /// Reports whether the unit has a queue.
    #[must_use]
    pub fn has_orders(&self, unit: UnitId) -> bool {
        self.queues.contains_key(&unit)
    }

    /// Walks the unit's queue for as long as the unit stays idle.
    pub fn check<E>(&mut self, engine: &mut E, civ: CivId, unit: UnitId) -> QueueOutcome
    where
        E: TurnEngine + WorldQuery,
    {
        loop {
            let Some(queue) = self.queues.get_mut(&unit) else {
                return QueueOutcome::NoOrders;
            };
            let Some(snapshot) = engine.unit(civ, unit) else {
                let _ = self.queues.remove(&unit);
                return QueueOutcome::UnitLost;
            };
            if !snapshot.idle() {
                return QueueOutcome::NotIdle;
            }
            if queue.is_empty() {
                let _ = self.queues.remove(&unit);
                return QueueOutcome::Completed;
            }

            let hostile = engine
                .civilization_view(civ)
                .map_or(true, |view| view.residents.foreign_presence_near(snapshot.tile, civ));
            if hostile {
                return self.abort(unit, AbortReason::AdjacentHostile);
            }

            let Some(waypoint) = queue.pop_front() else {
                continue;
            };
            let (dx, dy) = engine.dimensions().delta(snapshot.tile, waypoint);
            if (dx, dy) == (0, 0) {
                continue;
            }
            if dx.abs() > 1 || dy.abs() > 1 {
                return self.abort(unit, AbortReason::InvalidStep { dx, dy });
            }
            if let Err(reason) = engine.perform_action(civ, &Action::Move { unit, dx, dy }) {
                return self.abort(unit, AbortReason::Rejected(reason));
            }
        }
    }

    fn abort(&mut self, unit: UnitId, reason: AbortReason) -> QueueOutcome {
        let _ = self.queues.remove(&unit);
        debug!(unit = unit.get(), ?reason, "movement queue aborted");
        QueueOutcome::Aborted(reason)
    }
}

/// Session state of a human player: the active unit, its queued paths and
/// the path currently being drawn.
#[derive(Clone, Debug)]
pub struct ManualControl {
    civ: CivId,
    active: Option<UnitId>,
    queues: MovementQueues,
    preview: Vec<Tile>,
}

impl ManualControl {
    /// Creates a session for the civilization with no active unit.
    #[must_use]
    pub fn new(civ: CivId) -> Self {
        Self {
            civ,
            active: None,
            queues: MovementQueues::new(),
            preview: Vec::new(),
        }
    }

    /// Unit currently receiving player input.
    #[must_use]
    pub fn active_unit(&self) -> Option<UnitId> {
        self.active
    }

    /// Movement queues of the session.
    #[must_use]
    pub fn queues(&self) -> &MovementQueues {
        &self.queues
    }

    /// Path drawn but not yet committed.
    #[must_use]
    pub fn preview(&self) -> &[Tile] {
        &self.preview
    }

    /// Activates the next idle unit after the active one, wrapping around to
    /// the lowest identifier, and walks its movement queue.
    ///
    /// The active unit itself is never picked again. Returns the newly
    /// active unit, or `None` when no other unit is idle.
    pub fn next_free_unit<E>(&mut self, engine: &mut E) -> Option<UnitId>
    where
        E: TurnEngine + WorldQuery,
    {
        let idle: Vec<UnitId> = engine
            .units(self.civ)
            .into_iter()
            .filter(|unit| unit.idle())
            .map(|unit| unit.id)
            .collect();
        let next = match self.active {
            Some(current) => idle
                .iter()
                .copied()
                .find(|unit| *unit > current)
                .or_else(|| idle.iter().copied().find(|unit| *unit < current)),
            None => idle.first().copied(),
        };

        self.active = next;
        if let Some(unit) = next {
            let _ = self.queues.check(engine, self.civ, unit);
        }
        next
    }

    /// Walks the active unit's movement queue.
    pub fn check_active<E>(&mut self, engine: &mut E) -> QueueOutcome
    where
        E: TurnEngine + WorldQuery,
    {
        match self.active {
            Some(unit) => self.queues.check(engine, self.civ, unit),
            None => QueueOutcome::NoOrders,
        }
    }

    /// Picks an own unit standing on the tile.
    ///
    /// Every own unit on the tile loses its movement queue; the first of them
    /// with moves left becomes active. Fortified units stay fortified and
    /// are selected only if they still have moves left.
    pub fn select_at(&mut self, world: &dyn WorldQuery, tile: Tile) -> Option<UnitId> {
        let mut selected = None;
        for unit in world.units(self.civ).into_iter().filter(|unit| unit.tile == tile) {
            let _ = self.queues.cancel(unit.id);
            if selected.is_none() && unit.moves_left > 0 {
                selected = Some(unit.id);
            }
        }
        if selected.is_some() {
            self.active = selected;
            self.preview.clear();
        }
        selected
    }

    /// Previews the route of the active unit to `destination`.
    pub fn draw_path(
        &mut self,
        world: &dyn WorldQuery,
        pathfinder: &dyn Pathfinder,
        destination: Tile,
    ) -> &[Tile] {
        self.preview.clear();
        let unit = self.active.and_then(|unit| world.unit(self.civ, unit));
        if let (Some(unit), Some(view)) = (unit, world.civilization_view(self.civ)) {
            self.preview = pathfinder.compute_path(&view, &unit, false, unit.tile, destination);
        }
        &self.preview
    }

    /// Stores the previewed route as the active unit's movement queue.
    ///
    /// Returns whether a queue was created.
    pub fn commit_path(&mut self) -> bool {
        let preview = std::mem::take(&mut self.preview);
        match self.active {
            Some(unit) if !preview.is_empty() => {
                self.queues.set(unit, preview);
                true
            }
            _ => false,
        }
    }

    /// Discards the previewed route.
    pub fn clear_path(&mut self) {
        self.preview.clear();
    }
}
