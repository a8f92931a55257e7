//! The dog avatar: per-player state and movement constrained to the road
//! network.
//!
//! Movement is one routine parameterized by motion axis and sign. A dog
//! always sits on exactly one road (by index into its map's road list); when
//! a tick would carry it outside that road's bounds, the routine looks for a
//! road it can transition onto in the direction of motion, then clamps to
//! the final road's bounds, zeroing the moving velocity component at dead
//! ends.

use crate::map::{GridPoint, Road};
use serde::{Deserialize, Serialize};
use shared::{Point2D, Vec2D};

/// Facing direction of a dog. On the map grid, y grows downward: North is
/// -y, South is +y, West is -x, East is +x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    West,
    East,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

impl Direction {
    fn motion_axis(self) -> (Axis, f64) {
        match self {
            Direction::West => (Axis::X, -1.0),
            Direction::East => (Axis::X, 1.0),
            Direction::North => (Axis::Y, -1.0),
            Direction::South => (Axis::Y, 1.0),
        }
    }
}

/// An item carried in a dog's bag: the lost object's id and type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundObject {
    pub id: u32,
    pub kind: u32,
}

/// A player-controlled avatar.
///
/// The previous position is refreshed on every position write; the session
/// uses the previous-to-current segment for collision sweeps.
#[derive(Debug, Clone, PartialEq)]
pub struct Dog {
    pub id: u32,
    pub name: String,
    pub bag_capacity: usize,
    pub position: Point2D,
    pub previous_position: Point2D,
    pub velocity: Vec2D,
    pub direction: Direction,
    pub road_index: usize,
    bag: Vec<FoundObject>,
    score: u32,
}

impl Dog {
    /// Creates a dog at rest on the given road, facing North.
    pub fn new(id: u32, name: &str, bag_capacity: usize, position: Point2D, road_index: usize) -> Self {
        Self {
            id,
            name: name.to_string(),
            bag_capacity,
            position,
            previous_position: position,
            velocity: Vec2D::default(),
            direction: Direction::North,
            road_index,
            bag: Vec::new(),
            score: 0,
        }
    }

    /// Rebuilds a dog from captured state, bag and score included.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_snapshot(
        id: u32,
        name: String,
        bag_capacity: usize,
        position: Point2D,
        previous_position: Point2D,
        velocity: Vec2D,
        direction: Direction,
        road_index: usize,
        bag: Vec<FoundObject>,
        score: u32,
    ) -> Self {
        Self {
            id,
            name,
            bag_capacity,
            position,
            previous_position,
            velocity,
            direction,
            road_index,
            bag,
            score,
        }
    }

    pub fn bag(&self) -> &[FoundObject] {
        &self.bag
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn is_bag_full(&self) -> bool {
        self.bag.len() >= self.bag_capacity
    }

    /// Stores an item unless the bag is already full.
    #[must_use]
    pub fn put_to_bag(&mut self, item: FoundObject) -> bool {
        if self.is_bag_full() {
            return false;
        }
        self.bag.push(item);
        true
    }

    /// Drops everything; returns how many items were carried.
    pub fn empty_bag(&mut self) -> usize {
        let count = self.bag.len();
        self.bag.clear();
        count
    }

    pub fn add_score(&mut self, points: u32) {
        self.score += points;
    }

    /// Moves to `position`, remembering where the dog came from.
    pub fn set_position(&mut self, position: Point2D) {
        self.previous_position = self.position;
        self.position = position;
    }

    /// Advances the dog by `delta_ms` along its velocity, constrained to the
    /// road network.
    pub fn advance(&mut self, roads: &[Road], delta_ms: u64) {
        let seconds = delta_ms as f64 / 1000.0;
        let new_pos = Point2D::new(
            self.position.x + self.velocity.x * seconds,
            self.position.y + self.velocity.y * seconds,
        );

        let current = &roads[self.road_index];
        if current.contains(new_pos) {
            self.set_position(new_pos);
            return;
        }

        let (axis, sign) = self.direction.motion_axis();
        for (index, candidate) in roads.iter().enumerate() {
            if can_enter(current, candidate, new_pos, axis, sign) {
                self.road_index = index;
            }
        }

        let road = &roads[self.road_index];
        let mut clamped = new_pos;
        match axis {
            Axis::X => {
                if sign < 0.0 && clamped.x < road.min().x {
                    clamped.x = road.min().x;
                    self.velocity.x = 0.0;
                } else if sign > 0.0 && clamped.x > road.max().x {
                    clamped.x = road.max().x;
                    self.velocity.x = 0.0;
                }
            }
            Axis::Y => {
                if sign < 0.0 && clamped.y < road.min().y {
                    clamped.y = road.min().y;
                    self.velocity.y = 0.0;
                } else if sign > 0.0 && clamped.y > road.max().y {
                    clamped.y = road.max().y;
                    self.velocity.y = 0.0;
                }
            }
        }
        self.set_position(clamped);
    }
}

fn axis_coord(point: GridPoint, axis: Axis) -> i64 {
    match axis {
        Axis::X => point.x,
        Axis::Y => point.y,
    }
}

/// Whether a dog leaving `current` towards `new_pos` may continue onto
/// `candidate`.
///
/// The candidate must run along the motion axis and contain the new
/// position on the orthogonal axis, and the new position must already be
/// past the current road's bound in the direction of travel. A perpendicular
/// current road connects where its fixed coordinate falls inside the
/// candidate's span; a collinear one connects where an endpoint of the
/// current road coincides with the opposite endpoint of the candidate on the
/// shared axis.
fn can_enter(current: &Road, candidate: &Road, new_pos: Point2D, axis: Axis, sign: f64) -> bool {
    let runs_along_motion = match axis {
        Axis::X => candidate.is_horizontal(),
        Axis::Y => candidate.is_vertical(),
    };
    if !runs_along_motion {
        return false;
    }

    let ortho_contained = match axis {
        Axis::X => new_pos.y >= candidate.min().y && new_pos.y <= candidate.max().y,
        Axis::Y => new_pos.x >= candidate.min().x && new_pos.x <= candidate.max().x,
    };
    if !ortho_contained {
        return false;
    }

    let (coord, min, max) = match axis {
        Axis::X => (new_pos.x, current.min().x, current.max().x),
        Axis::Y => (new_pos.y, current.min().y, current.max().y),
    };
    let leaving = if sign < 0.0 { coord < min } else { coord > max };
    if !leaving {
        return false;
    }

    let candidate_start = axis_coord(candidate.start(), axis);
    let candidate_end = axis_coord(candidate.end(), axis);
    let current_start = axis_coord(current.start(), axis);
    let current_end = axis_coord(current.end(), axis);

    let current_perpendicular = match axis {
        Axis::X => current.is_vertical(),
        Axis::Y => current.is_horizontal(),
    };
    if current_perpendicular {
        // The current road has one fixed coordinate on the motion axis; it
        // must fall within the candidate's span, whichever way it runs.
        (candidate_start <= current_start && current_start <= candidate_end)
            || (candidate_end <= current_start && current_start <= candidate_start)
    } else {
        current_start == candidate_end || current_end == candidate_start
    }
}
