//! Loading the JSON map configuration into the game model.
//!
//! The file shape is camelCase JSON: top-level defaults plus a `maps` array;
//! each map carries roads, buildings, offices and a `lootTypes` array whose
//! entries are arbitrary objects. Only the `value` field of a loot type
//! matters to the simulation — the raw array is kept verbatim in a
//! [`LootCatalog`] because the map endpoint echoes it back to clients
//! untouched.

use crate::game::Game;
use crate::map::{
    Building, GridOffset, GridPoint, GridRect, GridSize, LootTypes, Map, ModelError, Office, Road,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

const DEFAULT_DOG_SPEED: f64 = 1.0;
const DEFAULT_BAG_CAPACITY: usize = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("road of map {0} has neither x1 nor y1")]
    InvalidRoad(String),
    #[error("map {0} has no roads")]
    NoRoads(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    default_dog_speed: Option<f64>,
    default_bag_capacity: Option<usize>,
    loot_generator_config: LootGeneratorConfig,
    maps: Vec<MapConfig>,
}

#[derive(Debug, Deserialize)]
struct LootGeneratorConfig {
    period: f64,
    probability: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapConfig {
    id: String,
    name: String,
    dog_speed: Option<f64>,
    bag_capacity: Option<usize>,
    #[serde(default)]
    loot_types: Vec<serde_json::Value>,
    roads: Vec<RoadConfig>,
    #[serde(default)]
    buildings: Vec<BuildingConfig>,
    #[serde(default)]
    offices: Vec<OfficeConfig>,
}

#[derive(Debug, Deserialize)]
struct RoadConfig {
    x0: i64,
    y0: i64,
    x1: Option<i64>,
    y1: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BuildingConfig {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfficeConfig {
    id: String,
    x: i64,
    y: i64,
    offset_x: i64,
    offset_y: i64,
}

/// Raw `lootTypes` config arrays keyed by map id, preserved for the map
/// endpoint.
#[derive(Debug, Default)]
pub struct LootCatalog {
    by_map: HashMap<String, serde_json::Value>,
}

impl LootCatalog {
    pub fn loot_types(&self, map_id: &str) -> Option<&serde_json::Value> {
        self.by_map.get(map_id)
    }
}

/// Reads and parses the config file at `path`.
pub fn load_game(path: &Path) -> Result<(Game, LootCatalog), ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_game(&text)
}

/// Parses config JSON into the game model plus the loot catalog.
pub fn parse_game(text: &str) -> Result<(Game, LootCatalog), ConfigError> {
    let config: ConfigFile = serde_json::from_str(text)?;

    let default_dog_speed = config.default_dog_speed.unwrap_or(DEFAULT_DOG_SPEED);
    let default_bag_capacity = config.default_bag_capacity.unwrap_or(DEFAULT_BAG_CAPACITY);

    let mut game = Game::new();
    let mut catalog = LootCatalog::default();
    for map_config in config.maps {
        if map_config.roads.is_empty() {
            return Err(ConfigError::NoRoads(map_config.id));
        }

        let values = map_config
            .loot_types
            .iter()
            .map(|loot_type| {
                loot_type
                    .get("value")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0) as u32
            })
            .collect();
        let mut map = Map::new(
            &map_config.id,
            &map_config.name,
            map_config.dog_speed.unwrap_or(default_dog_speed),
            map_config.bag_capacity.unwrap_or(default_bag_capacity),
            LootTypes {
                spawn_period: config.loot_generator_config.period,
                spawn_probability: config.loot_generator_config.probability,
                values,
            },
        );

        for road in &map_config.roads {
            let start = GridPoint {
                x: road.x0,
                y: road.y0,
            };
            match (road.x1, road.y1) {
                (Some(x1), _) => map.add_road(Road::horizontal(start, x1)),
                (None, Some(y1)) => map.add_road(Road::vertical(start, y1)),
                (None, None) => return Err(ConfigError::InvalidRoad(map_config.id)),
            }
        }
        for building in &map_config.buildings {
            map.add_building(Building {
                bounds: GridRect {
                    position: GridPoint {
                        x: building.x,
                        y: building.y,
                    },
                    size: GridSize {
                        width: building.w,
                        height: building.h,
                    },
                },
            });
        }
        for office in map_config.offices {
            map.add_office(Office {
                id: office.id,
                position: GridPoint {
                    x: office.x,
                    y: office.y,
                },
                offset: GridOffset {
                    dx: office.offset_x,
                    dy: office.offset_y,
                },
            })?;
        }

        catalog.by_map.insert(
            map_config.id.clone(),
            serde_json::Value::Array(map_config.loot_types),
        );
        game.add_map(map)?;
    }

    Ok((game, catalog))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "defaultDogSpeed": 3.5,
        "defaultBagCapacity": 4,
        "lootGeneratorConfig": { "period": 5.0, "probability": 0.5 },
        "maps": [
            {
                "id": "map1",
                "name": "Village",
                "lootTypes": [
                    { "name": "key", "file": "key.obj", "value": 10 },
                    { "name": "wallet", "file": "wallet.obj", "value": 30 }
                ],
                "roads": [
                    { "x0": 0, "y0": 0, "x1": 40 },
                    { "x0": 40, "y0": 0, "y1": 30 }
                ],
                "buildings": [ { "x": 5, "y": 5, "w": 10, "h": 10 } ],
                "offices": [ { "id": "o0", "x": 40, "y": 30, "offsetX": 5, "offsetY": 0 } ]
            },
            {
                "id": "map2",
                "name": "Town",
                "dogSpeed": 2.0,
                "bagCapacity": 1,
                "lootTypes": [ { "name": "coin", "value": 1 } ],
                "roads": [ { "x0": 0, "y0": 0, "y1": 20 } ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_applies_defaults_and_overrides() {
        let (game, _) = parse_game(CONFIG).unwrap();
        assert_eq!(game.maps().len(), 2);

        let map1 = game.find_map("map1").unwrap();
        assert_eq!(map1.name(), "Village");
        assert_eq!(map1.dog_speed(), 3.5);
        assert_eq!(map1.bag_capacity(), 4);

        let map2 = game.find_map("map2").unwrap();
        assert_eq!(map2.dog_speed(), 2.0);
        assert_eq!(map2.bag_capacity(), 1);
    }

    #[test]
    fn test_parse_builds_roads_buildings_offices() {
        let (game, _) = parse_game(CONFIG).unwrap();
        let map = game.find_map("map1").unwrap();

        assert_eq!(map.roads().len(), 2);
        assert!(map.roads()[0].is_horizontal());
        assert_eq!(map.roads()[0].end(), GridPoint { x: 40, y: 0 });
        assert!(map.roads()[1].is_vertical());
        assert_eq!(map.roads()[1].end(), GridPoint { x: 40, y: 30 });

        assert_eq!(map.buildings().len(), 1);
        assert_eq!(map.buildings()[0].bounds.size.width, 10);

        assert_eq!(map.offices().len(), 1);
        assert_eq!(map.offices()[0].id, "o0");
        assert_eq!(map.offices()[0].offset, GridOffset { dx: 5, dy: 0 });
    }

    #[test]
    fn test_parse_extracts_loot_values_and_keeps_raw_payload() {
        let (game, catalog) = parse_game(CONFIG).unwrap();

        let loot_types = game.find_map("map1").unwrap().loot_types();
        assert_eq!(loot_types.type_count(), 2);
        assert_eq!(loot_types.value(0), 10);
        assert_eq!(loot_types.value(1), 30);
        assert_eq!(loot_types.spawn_period, 5.0);
        assert_eq!(loot_types.spawn_probability, 0.5);

        let raw = catalog.loot_types("map1").unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 2);
        assert_eq!(raw[0]["name"], "key");
        assert_eq!(raw[1]["file"], "wallet.obj");
        assert!(catalog.loot_types("map9").is_none());
    }

    #[test]
    fn test_parse_rejects_duplicate_map_ids() {
        let config = r#"{
            "lootGeneratorConfig": { "period": 1.0, "probability": 0.0 },
            "maps": [
                { "id": "m", "name": "A", "lootTypes": [], "roads": [ { "x0": 0, "y0": 0, "x1": 1 } ] },
                { "id": "m", "name": "B", "lootTypes": [], "roads": [ { "x0": 0, "y0": 0, "x1": 1 } ] }
            ]
        }"#;
        assert!(matches!(
            parse_game(config),
            Err(ConfigError::Model(ModelError::DuplicateMap(_)))
        ));
    }

    #[test]
    fn test_parse_rejects_map_without_roads() {
        let config = r#"{
            "lootGeneratorConfig": { "period": 1.0, "probability": 0.0 },
            "maps": [ { "id": "m", "name": "A", "lootTypes": [], "roads": [] } ]
        }"#;
        assert!(matches!(parse_game(config), Err(ConfigError::NoRoads(_))));
    }

    #[test]
    fn test_parse_rejects_incomplete_road() {
        let config = r#"{
            "lootGeneratorConfig": { "period": 1.0, "probability": 0.0 },
            "maps": [ { "id": "m", "name": "A", "lootTypes": [], "roads": [ { "x0": 0, "y0": 0 } ] } ]
        }"#;
        assert!(matches!(parse_game(config), Err(ConfigError::InvalidRoad(_))));
    }

    #[test]
    fn test_parse_rejects_missing_generator_config() {
        let config = r#"{ "maps": [] }"#;
        assert!(matches!(parse_game(config), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_loot_type_without_value_is_worthless() {
        let config = r#"{
            "lootGeneratorConfig": { "period": 1.0, "probability": 0.0 },
            "maps": [ {
                "id": "m", "name": "A",
                "lootTypes": [ { "name": "junk" } ],
                "roads": [ { "x0": 0, "y0": 0, "x1": 1 } ]
            } ]
        }"#;
        let (game, _) = parse_game(config).unwrap();
        let loot_types = game.find_map("m").unwrap().loot_types();
        assert_eq!(loot_types.type_count(), 1);
        assert_eq!(loot_types.value(0), 0);
    }
}
