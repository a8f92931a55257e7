//! Static map data: roads, buildings, offices, and loot configuration.
//!
//! A [`Map`] is immutable once loaded from the config file. All mutable
//! world state (dogs, lost objects, spawn bookkeeping) lives in the game
//! session, so maps can be shared freely between sessions, snapshots, and
//! the HTTP layer.

use shared::{Point2D, ROAD_HALF_WIDTH};
use thiserror::Error;

/// A position on the integer map grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPoint {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRect {
    pub position: GridPoint,
    pub size: GridSize,
}

/// Render offset of an office sprite relative to its grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridOffset {
    pub dx: i64,
    pub dy: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadOrientation {
    Horizontal,
    Vertical,
}

/// An axis-aligned road segment with integer endpoints.
///
/// The walkable corridor extends [`ROAD_HALF_WIDTH`] beyond the segment on
/// both axes, so a horizontal road from (a, y) to (b, y) covers
/// `[min(a,b) - 0.4, max(a,b) + 0.4] x [y - 0.4, y + 0.4]`. The bounds are
/// computed once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Road {
    orientation: RoadOrientation,
    start: GridPoint,
    end: GridPoint,
    min: Point2D,
    max: Point2D,
}

impl Road {
    pub fn horizontal(start: GridPoint, end_x: i64) -> Self {
        Self::new(
            RoadOrientation::Horizontal,
            start,
            GridPoint {
                x: end_x,
                y: start.y,
            },
        )
    }

    pub fn vertical(start: GridPoint, end_y: i64) -> Self {
        Self::new(
            RoadOrientation::Vertical,
            start,
            GridPoint {
                x: start.x,
                y: end_y,
            },
        )
    }

    fn new(orientation: RoadOrientation, start: GridPoint, end: GridPoint) -> Self {
        let min = Point2D::new(
            start.x.min(end.x) as f64 - ROAD_HALF_WIDTH,
            start.y.min(end.y) as f64 - ROAD_HALF_WIDTH,
        );
        let max = Point2D::new(
            start.x.max(end.x) as f64 + ROAD_HALF_WIDTH,
            start.y.max(end.y) as f64 + ROAD_HALF_WIDTH,
        );
        Self {
            orientation,
            start,
            end,
            min,
            max,
        }
    }

    pub fn is_horizontal(&self) -> bool {
        self.orientation == RoadOrientation::Horizontal
    }

    pub fn is_vertical(&self) -> bool {
        self.orientation == RoadOrientation::Vertical
    }

    pub fn start(&self) -> GridPoint {
        self.start
    }

    pub fn end(&self) -> GridPoint {
        self.end
    }

    /// Lower-left corner of the walkable bounds.
    pub fn min(&self) -> Point2D {
        self.min
    }

    /// Upper-right corner of the walkable bounds.
    pub fn max(&self) -> Point2D {
        self.max
    }

    pub fn contains(&self, pos: Point2D) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x && pos.y >= self.min.y && pos.y <= self.max.y
    }
}

/// A decorative building. Opaque to nothing: movement ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Building {
    pub bounds: GridRect,
}

/// An office where dogs drop off their finds. Materialized as a circular
/// return base by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Office {
    pub id: String,
    pub position: GridPoint,
    pub offset: GridOffset,
}

/// Loot configuration of a map: spawn rate and the score value of each
/// loot type. The number of types is the length of `values`; type indices
/// drawn for new loot are uniform in `[0, type_count)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LootTypes {
    pub spawn_period: f64,
    pub spawn_probability: f64,
    pub values: Vec<u32>,
}

impl LootTypes {
    pub fn type_count(&self) -> usize {
        self.values.len()
    }

    /// Score value of a loot type; unknown types are worthless.
    pub fn value(&self, kind: u32) -> u32 {
        self.values.get(kind as usize).copied().unwrap_or(0)
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("duplicate office id {0}")]
    DuplicateOffice(String),
    #[error("duplicate map id {0}")]
    DuplicateMap(String),
}

/// Immutable description of one game world.
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    id: String,
    name: String,
    dog_speed: f64,
    bag_capacity: usize,
    roads: Vec<Road>,
    buildings: Vec<Building>,
    offices: Vec<Office>,
    loot_types: LootTypes,
}

impl Map {
    pub fn new(
        id: &str,
        name: &str,
        dog_speed: f64,
        bag_capacity: usize,
        loot_types: LootTypes,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            dog_speed,
            bag_capacity,
            roads: Vec::new(),
            buildings: Vec::new(),
            offices: Vec::new(),
            loot_types,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dog_speed(&self) -> f64 {
        self.dog_speed
    }

    pub fn bag_capacity(&self) -> usize {
        self.bag_capacity
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn offices(&self) -> &[Office] {
        &self.offices
    }

    pub fn loot_types(&self) -> &LootTypes {
        &self.loot_types
    }

    pub fn add_road(&mut self, road: Road) {
        self.roads.push(road);
    }

    pub fn add_building(&mut self, building: Building) {
        self.buildings.push(building);
    }

    /// Adds an office. Office ids must be unique within a map.
    pub fn add_office(&mut self, office: Office) -> Result<(), ModelError> {
        if self.offices.iter().any(|o| o.id == office.id) {
            return Err(ModelError::DuplicateOffice(office.id));
        }
        self.offices.push(office);
        Ok(())
    }
}
