#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Outpost engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and the order-execution systems. Systems read the
//! world exclusively through [`WorldQuery`], submit [`Action`] values through
//! [`TurnEngine::perform_action`], and ask a [`Pathfinder`] for routes. The
//! world validates every action, mutates itself, and records [`Event`] values
//! in the acting civilization's message queue.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of movement fragments that make up one whole move.
///
/// Movement budgets are tracked in thirds so that travelling along a road can
/// cost a single fragment.
pub const MOVE_FRAGMENTS: u32 = 3;

/// Minimum distance, in tiles, that must separate two cities.
pub const MIN_CITY_DISTANCE: u32 = 3;

/// Unique identifier assigned to a civilization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CivId(u32);

impl CivId {
    /// Creates a new civilization identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a unit. Identifiers are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(u32);

impl UnitId {
    /// Identifier carried by hypothetical units that never enter the world.
    pub const HYPOTHETICAL: UnitId = UnitId(0);

    /// Creates a new unit identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a city.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CityId(u32);

impl CityId {
    /// Creates a new city identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of an entry in the unit type catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTypeId(u32);

impl UnitTypeId {
    /// Creates a new unit type identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Location of a single map tile expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    column: u32,
    row: u32,
}

impl Tile {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the tile.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the tile.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Geometry of the map: its size and whether columns wrap around.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapDimensions {
    columns: u32,
    rows: u32,
    wrap_columns: bool,
}

impl MapDimensions {
    /// Creates a new map geometry.
    #[must_use]
    pub const fn new(columns: u32, rows: u32, wrap_columns: bool) -> Self {
        Self {
            columns,
            rows,
            wrap_columns,
        }
    }

    /// Number of tile columns.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of tile rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Reports whether walking off the east edge re-enters from the west.
    #[must_use]
    pub const fn wraps_columns(&self) -> bool {
        self.wrap_columns
    }

    /// Total number of tiles on the map.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        let count = u64::from(self.columns) * u64::from(self.rows);
        usize::try_from(count).unwrap_or(0)
    }

    /// Reports whether the tile lies on the map.
    #[must_use]
    pub const fn contains(&self, tile: Tile) -> bool {
        tile.column < self.columns && tile.row < self.rows
    }

    /// Dense row-major index of the tile, if it lies on the map.
    #[must_use]
    pub fn index(&self, tile: Tile) -> Option<usize> {
        if !self.contains(tile) {
            return None;
        }
        let row = usize::try_from(tile.row).ok()?;
        let column = usize::try_from(tile.column).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    /// Tile stored at the provided row-major index.
    #[must_use]
    pub fn tile_at(&self, index: usize) -> Option<Tile> {
        let width = usize::try_from(self.columns).ok()?;
        if width == 0 || index >= self.tile_count() {
            return None;
        }
        let column = u32::try_from(index % width).ok()?;
        let row = u32::try_from(index / width).ok()?;
        Some(Tile::new(column, row))
    }

    /// Iterator over every tile in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> {
        let columns = self.columns;
        (0..self.rows).flat_map(move |row| (0..columns).map(move |column| Tile::new(column, row)))
    }

    /// Tile reached by moving `dx` columns and `dy` rows away from `tile`.
    ///
    /// Columns wrap when the map wraps; rows never do.
    #[must_use]
    pub fn offset(&self, tile: Tile, dx: i32, dy: i32) -> Option<Tile> {
        if !self.contains(tile) {
            return None;
        }

        let row = i64::from(tile.row) + i64::from(dy);
        if row < 0 || row >= i64::from(self.rows) {
            return None;
        }

        let mut column = i64::from(tile.column) + i64::from(dx);
        if self.wrap_columns {
            column = column.rem_euclid(i64::from(self.columns));
        } else if column < 0 || column >= i64::from(self.columns) {
            return None;
        }

        Some(Tile::new(
            u32::try_from(column).ok()?,
            u32::try_from(row).ok()?,
        ))
    }

    /// Signed shortest displacement from `from` to `to`.
    ///
    /// On a wrapping map the column component takes the shorter way around.
    #[must_use]
    pub fn delta(&self, from: Tile, to: Tile) -> (i32, i32) {
        let mut dx = i64::from(to.column) - i64::from(from.column);
        let dy = i64::from(to.row) - i64::from(from.row);

        if self.wrap_columns && self.columns > 0 {
            let columns = i64::from(self.columns);
            let half = columns / 2;
            if dx > half {
                dx -= columns;
            } else if dx < -half {
                dx += columns;
            }
        }

        (saturate(dx), saturate(dy))
    }

    /// Chebyshev distance between two tiles, honouring column wrap.
    #[must_use]
    pub fn distance(&self, from: Tile, to: Tile) -> u32 {
        let (dx, dy) = self.delta(from, to);
        dx.unsigned_abs().max(dy.unsigned_abs())
    }

    /// The up to eight distinct tiles surrounding `tile`.
    #[must_use]
    pub fn neighbors(&self, tile: Tile) -> Neighbors {
        let mut neighbors = Neighbors::default();
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if let Some(neighbor) = self.offset(tile, dx, dy) {
                    if neighbor != tile {
                        neighbors.push(neighbor);
                    }
                }
            }
        }
        neighbors
    }
}

fn saturate(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Fixed-capacity iterator over the neighbours of a tile.
#[derive(Clone, Debug, Default)]
pub struct Neighbors {
    buffer: [Option<Tile>; 8],
    len: usize,
    cursor: usize,
}

impl Neighbors {
    fn push(&mut self, tile: Tile) {
        if self.buffer[..self.len].contains(&Some(tile)) {
            return;
        }
        if self.len < self.buffer.len() {
            self.buffer[self.len] = Some(tile);
            self.len += 1;
        }
    }
}

impl Iterator for Neighbors {
    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.len {
            return None;
        }

        let value = self.buffer[self.cursor];
        self.cursor += 1;
        value
    }
}

/// Terrain covering a single tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    /// Open grassland.
    Grassland,
    /// Open plains.
    Plains,
    /// Dry desert.
    Desert,
    /// Dense forest.
    Forest,
    /// Rolling hills.
    Hills,
    /// Impassable-looking but traversable mountains.
    Mountains,
    /// Open water, only sea units may enter.
    Ocean,
}

impl Terrain {
    /// Whole moves required to enter a tile of this terrain.
    #[must_use]
    pub const fn move_cost(self) -> u32 {
        match self {
            Self::Grassland | Self::Plains | Self::Desert | Self::Ocean => 1,
            Self::Forest | Self::Hills => 2,
            Self::Mountains => 3,
        }
    }

    /// Reports whether the terrain is dry land.
    #[must_use]
    pub const fn is_land(self) -> bool {
        !matches!(self, Self::Ocean)
    }

    /// Reports whether a city may be founded on this terrain.
    #[must_use]
    pub const fn can_host_city(self) -> bool {
        !matches!(self, Self::Ocean | Self::Mountains)
    }

    /// Parses the single-character glyph used by scenario maps.
    #[must_use]
    pub const fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            'g' => Some(Self::Grassland),
            'p' => Some(Self::Plains),
            'd' => Some(Self::Desert),
            'f' => Some(Self::Forest),
            'h' => Some(Self::Hills),
            'm' => Some(Self::Mountains),
            '~' => Some(Self::Ocean),
            _ => None,
        }
    }
}

/// Improvements a unit may construct on its tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Improvement {
    /// Road that reduces the cost of moving between two road tiles.
    Road,
}

/// Kind of terrain a unit can travel across.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementDomain {
    /// Moves across land tiles.
    Land,
    /// Moves across ocean tiles and into coastal cities.
    Sea,
}

impl MovementDomain {
    /// Reports whether a unit of this domain may stand on the terrain.
    #[must_use]
    pub const fn can_enter(self, terrain: Terrain) -> bool {
        match self {
            Self::Land => terrain.is_land(),
            Self::Sea => !terrain.is_land(),
        }
    }
}

/// Catalog entry describing a buildable kind of unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitType {
    /// Identifier of the entry within the catalog.
    pub id: UnitTypeId,
    /// Human-readable name used in diagnostics.
    pub name: String,
    /// Whole moves available each turn.
    pub moves: u32,
    /// Terrain the unit can travel across.
    pub domain: MovementDomain,
    /// Production required to complete the unit.
    pub cost: u32,
    /// Indicates whether the unit can found cities.
    pub founds_cities: bool,
    /// Indicates whether the unit can build terrain improvements.
    pub improves_terrain: bool,
    /// Number of units this unit can carry.
    pub carry_capacity: u32,
}

impl UnitType {
    /// Movement budget of the type expressed in fragments.
    #[must_use]
    pub const fn move_fragments(&self) -> u32 {
        self.moves.saturating_mul(MOVE_FRAGMENTS)
    }
}

/// Immutable representation of a single unit used for queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitSnapshot {
    /// Unique identifier assigned to the unit.
    pub id: UnitId,
    /// Civilization that owns the unit.
    pub civ: CivId,
    /// Catalog entry the unit was built from.
    pub unit_type: UnitTypeId,
    /// Terrain the unit can travel across.
    pub domain: MovementDomain,
    /// Tile the unit currently occupies.
    pub tile: Tile,
    /// Movement fragments left this turn.
    pub moves_left: u32,
    /// Indicates whether the unit is fortified.
    pub fortified: bool,
    /// Carrier transporting the unit, if any.
    pub carried_by: Option<UnitId>,
}

impl UnitSnapshot {
    /// Builds a unit that never existed in the world, used for scoring.
    #[must_use]
    pub fn hypothetical(unit_type: &UnitType, civ: CivId, tile: Tile) -> Self {
        Self {
            id: UnitId::HYPOTHETICAL,
            civ,
            unit_type: unit_type.id,
            domain: unit_type.domain,
            tile,
            moves_left: unit_type.move_fragments(),
            fortified: false,
            carried_by: None,
        }
    }

    /// Reports whether the unit still awaits instructions this turn.
    #[must_use]
    pub const fn idle(&self) -> bool {
        self.moves_left > 0 && !self.fortified
    }
}

/// What a city is currently producing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CityProduction {
    /// The city builds a unit of the given type.
    Unit(UnitTypeId),
    /// The city produces nothing.
    Idle,
}

/// Immutable representation of a single city used for queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CitySnapshot {
    /// Unique identifier assigned to the city.
    pub id: CityId,
    /// Civilization that owns the city.
    pub civ: CivId,
    /// Name given to the city when it was founded.
    pub name: String,
    /// Tile the city stands on.
    pub tile: Tile,
    /// Current production choice.
    pub production: CityProduction,
    /// Production accumulated toward the current choice.
    pub stored_production: u32,
    /// Indicates whether the city touches an ocean tile.
    pub coastal: bool,
}

/// Atomic, data-only description of a requested world mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Moves a unit by a single-tile displacement.
    Move {
        /// Unit attempting the move.
        unit: UnitId,
        /// Column displacement in `-1..=1`.
        dx: i32,
        /// Row displacement in `-1..=1`.
        dy: i32,
    },
    /// Consumes a city-founding unit to found a city on its tile.
    FoundCity {
        /// Unit founding the city.
        unit: UnitId,
    },
    /// Fortifies a unit in place until it is woken.
    Fortify {
        /// Unit to fortify.
        unit: UnitId,
    },
    /// Spends the rest of a unit's moves for this turn.
    Skip {
        /// Unit to skip.
        unit: UnitId,
    },
    /// Boards a carrier standing on the same tile.
    Load {
        /// Unit boarding the carrier.
        unit: UnitId,
        /// Carrier receiving the unit.
        carrier: UnitId,
    },
    /// Leaves the carrier transporting the unit.
    Unload {
        /// Unit leaving its carrier.
        unit: UnitId,
    },
    /// Builds an improvement on the unit's tile.
    Improve {
        /// Unit building the improvement.
        unit: UnitId,
        /// Improvement to construct.
        improvement: Improvement,
    },
    /// Changes what a city produces.
    SetProduction {
        /// City whose production changes.
        city: CityId,
        /// New production choice.
        production: CityProduction,
    },
    /// Ends the acting civilization's turn.
    EndTurn,
}

impl Action {
    /// Unit the action refers to, if any.
    #[must_use]
    pub const fn unit(&self) -> Option<UnitId> {
        match self {
            Self::Move { unit, .. }
            | Self::FoundCity { unit }
            | Self::Fortify { unit }
            | Self::Skip { unit }
            | Self::Load { unit, .. }
            | Self::Unload { unit }
            | Self::Improve { unit, .. } => Some(*unit),
            Self::SetProduction { .. } | Self::EndTurn => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move { unit, dx, dy } => write!(f, "move unit {} by ({dx}, {dy})", unit.get()),
            Self::FoundCity { unit } => write!(f, "found city with unit {}", unit.get()),
            Self::Fortify { unit } => write!(f, "fortify unit {}", unit.get()),
            Self::Skip { unit } => write!(f, "skip unit {}", unit.get()),
            Self::Load { unit, carrier } => {
                write!(f, "load unit {} onto {}", unit.get(), carrier.get())
            }
            Self::Unload { unit } => write!(f, "unload unit {}", unit.get()),
            Self::Improve { unit, improvement } => {
                write!(f, "build {improvement:?} with unit {}", unit.get())
            }
            Self::SetProduction { city, production } => {
                write!(f, "set production of city {} to {production:?}", city.get())
            }
            Self::EndTurn => f.write_str("end turn"),
        }
    }
}

/// Reasons the turn engine may refuse an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ActionRejected {
    /// The acting civilization does not exist.
    #[error("civilization {} is not part of the session", .0.get())]
    UnknownCivilization(CivId),
    /// The acting civilization already ended its turn this round.
    #[error("civilization {} already ended its turn", .0.get())]
    TurnAlreadyEnded(CivId),
    /// The unit does not belong to the acting civilization.
    #[error("unit {} is not controlled by the acting civilization", .0.get())]
    UnknownUnit(UnitId),
    /// The city does not belong to the acting civilization.
    #[error("city {} is not controlled by the acting civilization", .0.get())]
    UnknownCity(CityId),
    /// The unit type is not part of the catalog.
    #[error("unit type {} is not part of the catalog", .0.get())]
    UnknownUnitType(UnitTypeId),
    /// The unit spent its movement budget for this turn.
    #[error("unit {} has no moves left", .0.get())]
    NoMovesLeft(UnitId),
    /// The requested displacement is not a single-tile step.
    #[error("displacement ({dx}, {dy}) is not a single-tile step")]
    NotAdjacent {
        /// Requested column displacement.
        dx: i32,
        /// Requested row displacement.
        dy: i32,
    },
    /// The destination lies outside the map.
    #[error("destination lies outside the map")]
    OutOfBounds,
    /// The unit cannot enter the destination terrain.
    #[error("terrain {terrain:?} cannot be entered by the unit")]
    Impassable {
        /// Terrain of the destination tile.
        terrain: Terrain,
    },
    /// Another civilization holds the destination tile.
    #[error("tile {tile} is held by civilization {}", .occupant.get())]
    Occupied {
        /// Destination tile.
        tile: Tile,
        /// Civilization holding the tile.
        occupant: CivId,
    },
    /// The unit cannot found cities.
    #[error("unit {} cannot found cities", .0.get())]
    CannotFoundCity(UnitId),
    /// The terrain cannot host a city.
    #[error("terrain {terrain:?} cannot host a city")]
    UnsuitableTerrain {
        /// Terrain of the requested city site.
        terrain: Terrain,
    },
    /// Another city stands too close to the requested site.
    #[error("a city already stands within {} tiles of {tile}", MIN_CITY_DISTANCE)]
    CityTooClose {
        /// Requested city site.
        tile: Tile,
    },
    /// The unit cannot build terrain improvements.
    #[error("unit {} cannot improve terrain", .0.get())]
    CannotImprove(UnitId),
    /// The tile already carries the improvement.
    #[error("tile {tile} is already improved")]
    AlreadyImproved {
        /// Tile that already carries the improvement.
        tile: Tile,
    },
    /// The unit is not a carrier on the same tile as the boarding unit.
    #[error("unit {} cannot carry the boarding unit", .0.get())]
    InvalidCarrier(UnitId),
    /// The carrier has no space left.
    #[error("carrier {} is full", .0.get())]
    CarrierFull(UnitId),
    /// The unit is not aboard a carrier.
    #[error("unit {} is not aboard a carrier", .0.get())]
    NotLoaded(UnitId),
    /// The city cannot build the requested unit type.
    #[error("city {} cannot build unit type {}", .city.get(), .unit_type.get())]
    CannotBuild {
        /// City asked to build the unit.
        city: CityId,
        /// Requested unit type.
        unit_type: UnitTypeId,
    },
}

/// Events recorded by the world after accepting actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that a unit moved between two tiles.
    UnitMoved {
        /// Unit that moved.
        unit: UnitId,
        /// Tile the unit left.
        from: Tile,
        /// Tile the unit entered.
        to: Tile,
    },
    /// Confirms that a unit fortified.
    UnitFortified {
        /// Unit that fortified.
        unit: UnitId,
    },
    /// Confirms that a unit skipped the rest of its turn.
    UnitSkipped {
        /// Unit that skipped.
        unit: UnitId,
    },
    /// Confirms that a unit boarded a carrier.
    UnitLoaded {
        /// Unit that boarded.
        unit: UnitId,
        /// Carrier that received it.
        carrier: UnitId,
    },
    /// Confirms that a unit left its carrier.
    UnitUnloaded {
        /// Unit that left its carrier.
        unit: UnitId,
    },
    /// Confirms that an improvement was built.
    TileImproved {
        /// Improved tile.
        tile: Tile,
        /// Improvement that was built.
        improvement: Improvement,
    },
    /// Confirms that a city was founded.
    CityFounded {
        /// Identifier assigned to the new city.
        city: CityId,
        /// Tile the city stands on.
        tile: Tile,
    },
    /// Confirms that a city's production changed.
    ProductionChanged {
        /// City whose production changed.
        city: CityId,
        /// New production choice.
        production: CityProduction,
    },
    /// Announces that a city completed a unit.
    UnitBuilt {
        /// City that built the unit.
        city: CityId,
        /// Identifier assigned to the new unit.
        unit: UnitId,
        /// Catalog entry of the new unit.
        unit_type: UnitTypeId,
    },
    /// Announces that a unit left the world.
    UnitLost {
        /// Unit that was lost.
        unit: UnitId,
    },
    /// Confirms that a civilization ended its turn.
    TurnEnded {
        /// Civilization that ended its turn.
        civ: CivId,
    },
    /// Announces the start of a new round.
    RoundStarted {
        /// Number of the round that started.
        round: u32,
    },
}

/// How much a civilization knows about a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Fog {
    /// Never seen.
    #[default]
    Unknown,
    /// Seen before but not currently in sight.
    Explored,
    /// Currently in sight of a unit or city.
    Visible,
}

impl Fog {
    /// Reports whether the terrain of the tile is known.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Read-only view of one civilization's map knowledge.
#[derive(Clone, Copy, Debug)]
pub struct KnowledgeView<'a> {
    fog: &'a [Fog],
    terrain: &'a [Terrain],
    dimensions: MapDimensions,
}

impl<'a> KnowledgeView<'a> {
    /// Captures a knowledge view backed by dense row-major slices.
    #[must_use]
    pub fn new(fog: &'a [Fog], terrain: &'a [Terrain], dimensions: MapDimensions) -> Self {
        Self {
            fog,
            terrain,
            dimensions,
        }
    }

    /// Geometry of the underlying map.
    #[must_use]
    pub const fn dimensions(&self) -> MapDimensions {
        self.dimensions
    }

    /// Knowledge level of the tile; tiles off the map are unknown.
    #[must_use]
    pub fn fog(&self, tile: Tile) -> Fog {
        self.dimensions
            .index(tile)
            .and_then(|index| self.fog.get(index).copied())
            .unwrap_or_default()
    }

    /// Terrain of the tile if the civilization has seen it.
    #[must_use]
    pub fn terrain(&self, tile: Tile) -> Option<Terrain> {
        if !self.fog(tile).is_known() {
            return None;
        }
        self.dimensions
            .index(tile)
            .and_then(|index| self.terrain.get(index).copied())
    }

    /// Number of unknown tiles surrounding the tile.
    #[must_use]
    pub fn unknown_neighbors(&self, tile: Tile) -> usize {
        self.dimensions
            .neighbors(tile)
            .filter(|neighbor| !self.fog(*neighbor).is_known())
            .count()
    }
}

/// Read-only view of which civilization holds each tile.
#[derive(Clone, Copy, Debug)]
pub struct ResidentView<'a> {
    residents: &'a [Option<CivId>],
    dimensions: MapDimensions,
}

impl<'a> ResidentView<'a> {
    /// Captures a resident view backed by a dense row-major slice.
    #[must_use]
    pub fn new(residents: &'a [Option<CivId>], dimensions: MapDimensions) -> Self {
        Self {
            residents,
            dimensions,
        }
    }

    /// Civilization whose unit or city stands on the tile, if any.
    #[must_use]
    pub fn resident(&self, tile: Tile) -> Option<CivId> {
        self.dimensions
            .index(tile)
            .and_then(|index| self.residents.get(index).copied().flatten())
    }

    /// Reports whether a civilization other than `civ` holds the tile or any
    /// tile within Chebyshev distance one of it.
    #[must_use]
    pub fn foreign_presence_near(&self, tile: Tile, civ: CivId) -> bool {
        let foreign = |candidate: Tile| {
            self.resident(candidate)
                .is_some_and(|resident| resident != civ)
        };
        foreign(tile) || self.dimensions.neighbors(tile).any(foreign)
    }
}

/// Everything a civilization may consult when planning routes.
#[derive(Clone, Copy, Debug)]
pub struct CivilizationView<'a> {
    /// Civilization the view belongs to.
    pub civ: CivId,
    /// Map knowledge of the civilization.
    pub knowledge: KnowledgeView<'a>,
    /// Tile residents across the map.
    pub residents: ResidentView<'a>,
}

/// Authoritative validator and mutator of world state.
pub trait TurnEngine {
    /// Validates the action on behalf of `civ` and applies it when legal.
    ///
    /// A rejected action leaves the world untouched, so submitting twice in
    /// one tick is always safe.
    fn perform_action(&mut self, civ: CivId, action: &Action) -> Result<(), ActionRejected>;
}

/// Read-only lookups into the authoritative world.
pub trait WorldQuery {
    /// Geometry of the map.
    fn dimensions(&self) -> MapDimensions;

    /// Resolves a unit owned by `civ`; `None` once the unit left the world.
    fn unit(&self, civ: CivId, unit: UnitId) -> Option<UnitSnapshot>;

    /// All units owned by `civ` in identifier order.
    fn units(&self, civ: CivId) -> Vec<UnitSnapshot>;

    /// The unit type catalog in declaration order.
    fn unit_types(&self) -> &[UnitType];

    /// Resolves a catalog entry.
    fn unit_type(&self, id: UnitTypeId) -> Option<&UnitType> {
        self.unit_types().iter().find(|unit_type| unit_type.id == id)
    }

    /// Resolves a city owned by `civ`.
    fn city(&self, civ: CivId, city: CityId) -> Option<CitySnapshot>;

    /// All cities owned by `civ` in identifier order.
    fn cities(&self, civ: CivId) -> Vec<CitySnapshot>;

    /// Tiles of every city, of any owner, standing on tiles `civ` has seen.
    fn known_city_tiles(&self, civ: CivId) -> Vec<Tile>;

    /// Reports whether `civ` may build units of the type in the city.
    fn can_build_unit(&self, civ: CivId, unit_type: &UnitType, city: CityId) -> bool;

    /// Knowledge and residents as seen by `civ`.
    fn civilization_view(&self, civ: CivId) -> Option<CivilizationView<'_>>;
}

/// Computes tile-to-tile routes from a civilization's knowledge.
pub trait Pathfinder {
    /// Returns the waypoints from `from` (exclusive) to `to` (inclusive).
    ///
    /// An empty route signals that the goal is unreachable or already reached.
    fn compute_path(
        &self,
        view: &CivilizationView<'_>,
        unit: &UnitSnapshot,
        avoid_hostile_zone: bool,
        from: Tile,
        to: Tile,
    ) -> Vec<Tile>;
}
