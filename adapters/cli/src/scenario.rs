//! TOML scenario files describing the map, unit catalog and starting units.

use std::{fs, path::Path};

use anyhow::{bail, ensure, Context, Result};
use outpost_core::{MapDimensions, MovementDomain, Terrain, Tile, UnitType, UnitTypeId};
use outpost_world::World;
use serde::Deserialize;

/// Scenario bundled with the binary and used when no file is given.
pub(crate) const DEFAULT_SCENARIO: &str = include_str!("../scenarios/default.toml");

/// Parsed scenario before it is turned into a world.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Scenario {
    #[serde(default)]
    wrap_columns: bool,
    map: Vec<String>,
    unit_types: Vec<UnitTypeEntry>,
    civilizations: Vec<CivilizationEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct UnitTypeEntry {
    name: String,
    moves: u32,
    cost: u32,
    #[serde(default)]
    domain: DomainEntry,
    #[serde(default)]
    founds_cities: bool,
    #[serde(default)]
    improves_terrain: bool,
    #[serde(default)]
    carry_capacity: u32,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DomainEntry {
    #[default]
    Land,
    Sea,
}

impl From<DomainEntry> for MovementDomain {
    fn from(value: DomainEntry) -> Self {
        match value {
            DomainEntry::Land => Self::Land,
            DomainEntry::Sea => Self::Sea,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
struct CivilizationEntry {
    name: String,
    #[serde(default)]
    units: Vec<StartingUnit>,
}

#[derive(Clone, Debug, Deserialize)]
struct StartingUnit {
    unit_type: String,
    column: u32,
    row: u32,
}

impl Scenario {
    /// Parses a scenario from TOML text.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse scenario toml contents")
    }

    /// Reads and parses a scenario file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario at {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Names of the civilizations in declaration order.
    pub(crate) fn civilization_names(&self) -> impl Iterator<Item = &str> {
        self.civilizations.iter().map(|civ| civ.name.as_str())
    }

    /// Builds the world described by the scenario.
    pub(crate) fn build(&self) -> Result<World> {
        let dimensions = self.dimensions()?;
        let terrain = self.terrain()?;
        let catalog = self.catalog();
        let mut world = World::new(dimensions, terrain, catalog.clone())
            .context("scenario does not describe a valid world")?;

        for entry in &self.civilizations {
            let civ = world.add_civilization(entry.name.clone());
            for unit in &entry.units {
                let unit_type = catalog
                    .iter()
                    .find(|candidate| candidate.name == unit.unit_type)
                    .with_context(|| {
                        format!(
                            "civilization `{}` starts with unknown unit type `{}`",
                            entry.name, unit.unit_type
                        )
                    })?;
                let tile = Tile::new(unit.column, unit.row);
                let _ = world.spawn_unit(civ, unit_type.id, tile).with_context(|| {
                    format!("cannot place {} of `{}` at {tile}", unit.unit_type, entry.name)
                })?;
            }
        }
        Ok(world)
    }

    fn dimensions(&self) -> Result<MapDimensions> {
        let Some(first) = self.map.first() else {
            bail!("scenario map has no rows");
        };
        let columns = first.chars().count();
        for (row, line) in self.map.iter().enumerate() {
            ensure!(
                line.chars().count() == columns,
                "map row {row} has {} tiles but row 0 has {columns}",
                line.chars().count()
            );
        }
        let columns = u32::try_from(columns).context("map is too wide")?;
        let rows = u32::try_from(self.map.len()).context("map is too tall")?;
        Ok(MapDimensions::new(columns, rows, self.wrap_columns))
    }

    fn terrain(&self) -> Result<Vec<Terrain>> {
        let mut terrain = Vec::new();
        for (row, line) in self.map.iter().enumerate() {
            for (column, glyph) in line.chars().enumerate() {
                let Some(parsed) = Terrain::from_glyph(glyph) else {
                    bail!("unknown terrain glyph `{glyph}` at ({column}, {row})");
                };
                terrain.push(parsed);
            }
        }
        Ok(terrain)
    }

    fn catalog(&self) -> Vec<UnitType> {
        self.unit_types
            .iter()
            .zip(1..)
            .map(|(entry, id)| UnitType {
                id: UnitTypeId::new(id),
                name: entry.name.clone(),
                moves: entry.moves,
                domain: entry.domain.into(),
                cost: entry.cost,
                founds_cities: entry.founds_cities,
                improves_terrain: entry.improves_terrain,
                carry_capacity: entry.carry_capacity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_core::WorldQuery;
    use outpost_world::query;

    #[test]
    fn default_scenario_builds_a_world() {
        let scenario = Scenario::parse(DEFAULT_SCENARIO).expect("default scenario parses");
        let world = scenario.build().expect("default scenario builds");

        let civs = query::civilizations(&world);
        assert_eq!(civs.len(), 2);
        assert_eq!(
            scenario.civilization_names().collect::<Vec<_>>(),
            vec!["Rome", "Carthage"]
        );
        assert!(world.dimensions().wraps_columns());
        assert_eq!(world.units(civs[0]).len(), 2);
        let trireme = world
            .unit_types()
            .iter()
            .find(|unit_type| unit_type.name == "Trireme")
            .expect("trireme in catalog");
        assert_eq!(trireme.domain, MovementDomain::Sea);
    }

    #[test]
    fn ragged_maps_are_rejected() {
        let scenario = Scenario::parse(
            r#"
            map = ["ggg", "gg"]
            unit_types = []
            civilizations = []
            "#,
        )
        .expect("valid toml");

        let error = scenario.build().expect_err("ragged map");
        assert!(error.to_string().contains("row 1"));
    }

    #[test]
    fn unknown_unit_types_are_reported() {
        let scenario = Scenario::parse(
            r#"
            map = ["ggg", "ggg"]

            [[unit_types]]
            name = "Warriors"
            moves = 1
            cost = 10

            [[civilizations]]
            name = "Rome"
            units = [{ unit_type = "Archers", column = 1, row = 1 }]
            "#,
        )
        .expect("valid toml");

        let error = scenario.build().expect_err("unknown unit type");
        assert!(format!("{error:#}").contains("Archers"));
    }

    #[test]
    fn units_cannot_start_at_sea() {
        let scenario = Scenario::parse(
            r#"
            map = ["g~"]

            [[unit_types]]
            name = "Warriors"
            moves = 1
            cost = 10

            [[civilizations]]
            name = "Rome"
            units = [{ unit_type = "Warriors", column = 1, row = 0 }]
            "#,
        )
        .expect("valid toml");

        let error = scenario.build().expect_err("warriors at sea");
        assert!(format!("{error:#}").contains("cannot place"));
    }
}
