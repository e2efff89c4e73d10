//! Fog of war bookkeeping for a single civilization.

use outpost_core::{Fog, MapDimensions, Tile};

/// Demotes every visible tile to explored, then marks the tiles within
/// Chebyshev `radius` of each observer as visible again.
pub(crate) fn recompute(
    fog: &mut [Fog],
    dimensions: MapDimensions,
    observers: impl Iterator<Item = (Tile, u32)>,
) {
    for level in fog.iter_mut() {
        if *level == Fog::Visible {
            *level = Fog::Explored;
        }
    }

    for (origin, radius) in observers {
        let reach = i32::try_from(radius).unwrap_or(i32::MAX);
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let Some(tile) = dimensions.offset(origin, dx, dy) else {
                    continue;
                };
                if let Some(level) = dimensions.index(tile).and_then(|index| fog.get_mut(index)) {
                    *level = Fog::Visible;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observers_reveal_square_and_leave_explored_trail() {
        let dimensions = MapDimensions::new(6, 6, false);
        let mut fog = vec![Fog::Unknown; dimensions.tile_count()];

        recompute(&mut fog, dimensions, [(Tile::new(1, 1), 1)].into_iter());
        assert_eq!(fog.iter().filter(|level| **level == Fog::Visible).count(), 9);

        recompute(&mut fog, dimensions, [(Tile::new(4, 4), 1)].into_iter());
        let at = |tile| fog[dimensions.index(tile).expect("on map")];
        assert_eq!(at(Tile::new(0, 0)), Fog::Explored);
        assert_eq!(at(Tile::new(5, 5)), Fog::Visible);
        assert_eq!(at(Tile::new(0, 5)), Fog::Unknown);
    }

    #[test]
    fn sight_wraps_across_the_date_line() {
        let dimensions = MapDimensions::new(6, 3, true);
        let mut fog = vec![Fog::Unknown; dimensions.tile_count()];

        recompute(&mut fog, dimensions, [(Tile::new(0, 1), 2)].into_iter());

        let at = |tile| fog[dimensions.index(tile).expect("on map")];
        assert_eq!(at(Tile::new(4, 1)), Fog::Visible);
        assert_eq!(at(Tile::new(3, 1)), Fog::Unknown);
    }
}
