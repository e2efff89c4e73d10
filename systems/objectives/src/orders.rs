//! Standing orders that decompose a long-lived goal into single steps.

use std::collections::VecDeque;

use outpost_core::{
    Action, CivId, CivilizationView, Pathfinder, Tile, UnitId, UnitSnapshot, WorldQuery,
};

/// Upper bound on exploration targets probed for a route per replan.
const MAX_EXPLORATION_CANDIDATES: usize = 32;

/// Plan state machine owned by an objective for one unit.
///
/// The cached route is a sub-plan: [`Orders::finished`] reports that it ran
/// out, not that the goal was achieved. Callers obtain the next step with
/// [`Orders::get_action`], submit it, and confirm acceptance with
/// [`Orders::drop_action`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Orders {
    /// Walk to a fixed tile.
    Goto(GotoOrders),
    /// Keep walking toward the most interesting unexplored frontier.
    Explore(ExploreOrders),
    /// Walk to a site and found a city there.
    Settle(SettleOrders),
}

impl Orders {
    /// Creates orders that walk `unit` to `goal`.
    #[must_use]
    pub fn goto(civ: CivId, unit: UnitId, goal: Tile, avoid_hostile_zone: bool) -> Self {
        Self::Goto(GotoOrders {
            civ,
            unit,
            goal,
            avoid_hostile_zone,
            path: VecDeque::new(),
        })
    }

    /// Creates exploration orders for `unit`.
    ///
    /// Without `autocontinue` the orders end once the first chosen frontier
    /// tile is exhausted.
    #[must_use]
    pub fn explore(civ: CivId, unit: UnitId, autocontinue: bool) -> Self {
        Self::Explore(ExploreOrders {
            civ,
            unit,
            autocontinue,
            goal: None,
            exhausted: false,
            path: VecDeque::new(),
        })
    }

    /// Creates orders that found a city with `unit` at `site`.
    #[must_use]
    pub fn settle(civ: CivId, unit: UnitId, site: Tile) -> Self {
        Self::Settle(SettleOrders {
            civ,
            unit,
            site,
            at_site: false,
            path: VecDeque::new(),
        })
    }

    /// Unit the orders drive.
    #[must_use]
    pub fn unit(&self) -> UnitId {
        match self {
            Self::Goto(orders) => orders.unit,
            Self::Explore(orders) => orders.unit,
            Self::Settle(orders) => orders.unit,
        }
    }

    /// Tile the orders currently head for, if one is chosen.
    #[must_use]
    pub fn goal(&self) -> Option<Tile> {
        match self {
            Self::Goto(orders) => Some(orders.goal),
            Self::Explore(orders) => orders.goal,
            Self::Settle(orders) => Some(orders.site),
        }
    }

    /// Reports whether the cached sub-plan is consumed or invalidated.
    #[must_use]
    pub fn finished(&self) -> bool {
        match self {
            Self::Goto(orders) => orders.path.is_empty(),
            Self::Explore(orders) => orders.path.is_empty(),
            Self::Settle(orders) => orders.path.is_empty() && !orders.at_site,
        }
    }

    /// Recomputes the sub-plan from the unit's current tile.
    ///
    /// Returns whether a usable plan exists afterwards.
    pub fn replan(&mut self, world: &dyn WorldQuery, pathfinder: &dyn Pathfinder) -> bool {
        match self {
            Self::Goto(orders) => orders.replan(world, pathfinder),
            Self::Explore(orders) => orders.replan(world, pathfinder),
            Self::Settle(orders) => orders.replan(world, pathfinder),
        }
    }

    /// Next atomic action implied by the plan, or `None` when no plan exists.
    #[must_use]
    pub fn get_action(&self, world: &dyn WorldQuery) -> Option<Action> {
        match self {
            Self::Goto(orders) => step_action(world, orders.civ, orders.unit, &orders.path),
            Self::Explore(orders) => step_action(world, orders.civ, orders.unit, &orders.path),
            Self::Settle(orders) if orders.at_site => {
                Some(Action::FoundCity { unit: orders.unit })
            }
            Self::Settle(orders) => step_action(world, orders.civ, orders.unit, &orders.path),
        }
    }

    /// Marks the most recently returned action as accepted by the engine.
    pub fn drop_action(&mut self) {
        match self {
            Self::Goto(orders) => {
                let _ = orders.path.pop_front();
            }
            Self::Explore(orders) => {
                let _ = orders.path.pop_front();
            }
            Self::Settle(orders) if orders.at_site => orders.at_site = false,
            Self::Settle(orders) => {
                let _ = orders.path.pop_front();
            }
        }
    }

    /// Discards the cached plan so the next use goes through
    /// [`Orders::replan`].
    pub fn clear(&mut self) {
        match self {
            Self::Goto(orders) => orders.path.clear(),
            Self::Explore(orders) => orders.path.clear(),
            Self::Settle(orders) => {
                orders.path.clear();
                orders.at_site = false;
            }
        }
    }
}

/// Route to a fixed destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GotoOrders {
    civ: CivId,
    unit: UnitId,
    goal: Tile,
    avoid_hostile_zone: bool,
    path: VecDeque<Tile>,
}

impl GotoOrders {
    fn replan(&mut self, world: &dyn WorldQuery, pathfinder: &dyn Pathfinder) -> bool {
        self.path = world
            .unit(self.civ, self.unit)
            .map(|unit| plan_route(world, pathfinder, &unit, self.avoid_hostile_zone, self.goal))
            .unwrap_or_default();
        !self.path.is_empty()
    }
}

/// Frontier-chasing exploration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExploreOrders {
    civ: CivId,
    unit: UnitId,
    autocontinue: bool,
    goal: Option<Tile>,
    exhausted: bool,
    path: VecDeque<Tile>,
}

impl ExploreOrders {
    fn replan(&mut self, world: &dyn WorldQuery, pathfinder: &dyn Pathfinder) -> bool {
        self.path.clear();
        if self.exhausted {
            return false;
        }
        let Some(unit) = world.unit(self.civ, self.unit) else {
            return false;
        };
        let Some(view) = world.civilization_view(self.civ) else {
            return false;
        };

        if let Some(goal) = self.goal {
            if goal != unit.tile && view.knowledge.unknown_neighbors(goal) > 0 {
                let path = route(&view, pathfinder, &unit, true, goal);
                if !path.is_empty() {
                    self.path = path;
                    return true;
                }
            }
            if !self.autocontinue {
                self.goal = None;
                self.exhausted = true;
                return false;
            }
        }

        for candidate in exploration_targets(&view, &unit)
            .into_iter()
            .take(MAX_EXPLORATION_CANDIDATES)
        {
            let path = route(&view, pathfinder, &unit, true, candidate);
            if !path.is_empty() {
                self.goal = Some(candidate);
                self.path = path;
                return true;
            }
        }

        self.goal = None;
        false
    }
}

/// Route to a city site followed by founding the city.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettleOrders {
    civ: CivId,
    unit: UnitId,
    site: Tile,
    at_site: bool,
    path: VecDeque<Tile>,
}

impl SettleOrders {
    fn replan(&mut self, world: &dyn WorldQuery, pathfinder: &dyn Pathfinder) -> bool {
        self.path.clear();
        self.at_site = false;
        let Some(unit) = world.unit(self.civ, self.unit) else {
            return false;
        };
        if unit.tile == self.site {
            self.at_site = true;
            return true;
        }
        self.path = plan_route(world, pathfinder, &unit, true, self.site);
        !self.path.is_empty()
    }
}

/// Known tiles worth walking to in order to uncover the map, best first.
///
/// A candidate is a known tile the unit's domain can stand on, not held by
/// another civilization, with at least one unknown neighbour. Candidates are
/// ranked by distance from the unit, then by the number of unknown
/// neighbours (most first), then by row and column.
#[must_use]
pub fn exploration_targets(view: &CivilizationView<'_>, unit: &UnitSnapshot) -> Vec<Tile> {
    let dimensions = view.knowledge.dimensions();
    let mut candidates: Vec<(u32, std::cmp::Reverse<usize>, u32, u32, Tile)> = dimensions
        .tiles()
        .filter_map(|tile| {
            let terrain = view.knowledge.terrain(tile)?;
            if !unit.domain.can_enter(terrain) {
                return None;
            }
            if view
                .residents
                .resident(tile)
                .is_some_and(|resident| resident != view.civ)
            {
                return None;
            }
            let unknown = view.knowledge.unknown_neighbors(tile);
            (unknown > 0).then(|| {
                (
                    dimensions.distance(unit.tile, tile),
                    std::cmp::Reverse(unknown),
                    tile.row(),
                    tile.column(),
                    tile,
                )
            })
        })
        .collect();
    candidates.sort_unstable();
    candidates.into_iter().map(|(.., tile)| tile).collect()
}

fn plan_route(
    world: &dyn WorldQuery,
    pathfinder: &dyn Pathfinder,
    unit: &UnitSnapshot,
    avoid_hostile_zone: bool,
    goal: Tile,
) -> VecDeque<Tile> {
    world
        .civilization_view(unit.civ)
        .map(|view| route(&view, pathfinder, unit, avoid_hostile_zone, goal))
        .unwrap_or_default()
}

fn route(
    view: &CivilizationView<'_>,
    pathfinder: &dyn Pathfinder,
    unit: &UnitSnapshot,
    avoid_hostile_zone: bool,
    goal: Tile,
) -> VecDeque<Tile> {
    pathfinder
        .compute_path(view, unit, avoid_hostile_zone, unit.tile, goal)
        .into()
}

fn step_action(
    world: &dyn WorldQuery,
    civ: CivId,
    unit: UnitId,
    path: &VecDeque<Tile>,
) -> Option<Action> {
    let next = *path.front()?;
    let current = world.unit(civ, unit)?.tile;
    let (dx, dy) = world.dimensions().delta(current, next);
    let adjacent = dx.abs() <= 1 && dy.abs() <= 1 && (dx, dy) != (0, 0);
    adjacent.then_some(Action::Move { unit, dx, dy })
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_core::{
        Fog, KnowledgeView, MapDimensions, MovementDomain, ResidentView, Terrain, UnitTypeId,
    };

    fn scout(tile: Tile) -> UnitSnapshot {
        UnitSnapshot {
            id: UnitId::new(3),
            civ: CivId::new(1),
            unit_type: UnitTypeId::new(1),
            domain: MovementDomain::Land,
            tile,
            moves_left: 3,
            fortified: false,
            carried_by: None,
        }
    }

    #[test]
    fn exploration_targets_prefer_near_then_more_unknown() {
        let dimensions = MapDimensions::new(5, 3, false);
        let terrain = vec![Terrain::Grassland; dimensions.tile_count()];
        let mut fog = vec![Fog::Unknown; dimensions.tile_count()];
        for column in 0..3 {
            for row in 0..3 {
                fog[dimensions.index(Tile::new(column, row)).expect("on map")] = Fog::Visible;
            }
        }
        let residents = vec![None; dimensions.tile_count()];
        let view = CivilizationView {
            civ: CivId::new(1),
            knowledge: KnowledgeView::new(&fog, &terrain, dimensions),
            residents: ResidentView::new(&residents, dimensions),
        };

        let targets = exploration_targets(&view, &scout(Tile::new(1, 1)));

        assert_eq!(
            targets,
            vec![Tile::new(2, 1), Tile::new(2, 0), Tile::new(2, 2)]
        );
    }

    #[test]
    fn settle_orders_found_city_once_at_site() {
        let mut orders = Orders::settle(CivId::new(1), UnitId::new(3), Tile::new(2, 2));
        assert!(orders.finished());
        assert_eq!(orders.goal(), Some(Tile::new(2, 2)));

        if let Orders::Settle(settle) = &mut orders {
            settle.at_site = true;
        }
        assert!(!orders.finished());
        orders.clear();
        assert!(orders.finished());
    }
}
