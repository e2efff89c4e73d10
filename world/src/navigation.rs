//! A* route planner operating on a civilization's map knowledge.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use outpost_core::{CivilizationView, MovementDomain, Pathfinder, Tile, UnitSnapshot};

/// Eight-way A* search over the tiles a civilization has seen.
///
/// Unknown tiles and tiles held by another civilization are never entered.
/// Step costs are the whole-move cost of the destination terrain, so the
/// Chebyshev distance to the goal never overestimates. Ties are broken by
/// lower cost so far and then by tile order, keeping routes reproducible.
#[derive(Clone, Copy, Debug, Default)]
pub struct AStarPathfinder;

impl AStarPathfinder {
    /// Creates a new pathfinder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
struct OpenNode {
    estimate: u32,
    cost: u32,
    tile: Tile,
}

impl OpenNode {
    fn key(&self) -> (u32, u32, Tile) {
        (self.estimate, self.cost, self.tile)
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the cheapest estimate first.
        other.key().cmp(&self.key())
    }
}

impl Pathfinder for AStarPathfinder {
    fn compute_path(
        &self,
        view: &CivilizationView<'_>,
        unit: &UnitSnapshot,
        avoid_hostile_zone: bool,
        from: Tile,
        to: Tile,
    ) -> Vec<Tile> {
        let dimensions = view.knowledge.dimensions();
        let (Some(start), Some(goal)) = (dimensions.index(from), dimensions.index(to)) else {
            return Vec::new();
        };
        if start == goal {
            return Vec::new();
        }

        let enterable = |tile: Tile| -> Option<u32> {
            let terrain = view.knowledge.terrain(tile)?;
            let resident = view.residents.resident(tile);
            if resident.is_some_and(|civ| civ != view.civ) {
                return None;
            }
            if avoid_hostile_zone
                && tile != to
                && view.residents.foreign_presence_near(tile, view.civ)
            {
                return None;
            }
            let domain_allows = unit.domain.can_enter(terrain)
                || (unit.domain == MovementDomain::Sea && tile == to && resident == Some(view.civ));
            domain_allows.then(|| terrain.move_cost())
        };

        let mut best_cost = vec![u32::MAX; dimensions.tile_count()];
        let mut came_from: Vec<Option<usize>> = vec![None; dimensions.tile_count()];
        let mut open = BinaryHeap::new();

        best_cost[start] = 0;
        open.push(OpenNode {
            estimate: dimensions.distance(from, to),
            cost: 0,
            tile: from,
        });

        while let Some(node) = open.pop() {
            let Some(current) = dimensions.index(node.tile) else {
                continue;
            };
            if current == goal {
                return reconstruct(&came_from, goal, start, |index| dimensions.tile_at(index));
            }
            if node.cost != best_cost[current] {
                continue;
            }

            for neighbor in dimensions.neighbors(node.tile) {
                let Some(step) = enterable(neighbor) else {
                    continue;
                };
                let Some(next) = dimensions.index(neighbor) else {
                    continue;
                };
                let cost = node.cost.saturating_add(step);
                if cost >= best_cost[next] {
                    continue;
                }

                best_cost[next] = cost;
                came_from[next] = Some(current);
                open.push(OpenNode {
                    estimate: cost.saturating_add(dimensions.distance(neighbor, to)),
                    cost,
                    tile: neighbor,
                });
            }
        }

        Vec::new()
    }
}

fn reconstruct(
    came_from: &[Option<usize>],
    goal: usize,
    start: usize,
    tile_at: impl Fn(usize) -> Option<Tile>,
) -> Vec<Tile> {
    let mut path = Vec::new();
    let mut current = goal;
    while current != start {
        let Some(tile) = tile_at(current) else {
            return Vec::new();
        };
        path.push(tile);
        match came_from[current] {
            Some(previous) => current = previous,
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}
