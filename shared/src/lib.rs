//! # Shared Simulation Library
//!
//! Deterministic building blocks shared by the game server and its tests:
//! 2D geometry primitives, the world-geometry constants, the sweep collision
//! detector that turns per-tick motion segments into pickup events, and the
//! probability-driven loot generator.
//!
//! Everything in this crate is pure computation. There is no I/O, no global
//! state, and no hidden clock: the loot generator is fed elapsed time by its
//! caller and draws randomness from an injected source, so identical inputs
//! always produce identical outputs. That property is what the server's
//! authoritative tick loop (and the test suite) is built on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Half-width of a road's walkable corridor, in world units.
///
/// A road segment is expanded by this amount on both axes to form its
/// axis-aligned bounds; avatars may occupy any point within those bounds.
pub const ROAD_HALF_WIDTH: f64 = 0.4;

/// Half-width of the swept segment an avatar traces during one tick.
pub const GATHERER_HALF_WIDTH: f64 = 0.3;

/// Collection radius of an office when it acts as a return base.
pub const BASE_RADIUS: f64 = 0.25;

/// Tolerance used by the collision detector for projection-ratio and
/// distance comparisons, and by callers for event-time tie breaking.
pub const COLLISION_EPSILON: f64 = 1e-10;

/// A position in the 2D world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A velocity or displacement in the 2D world. Same shape as [`Point2D`],
/// kept distinct so positions and speeds cannot be mixed up silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2D {
    pub x: f64,
    pub y: f64,
}

impl Vec2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// A stationary collectible for the collision detector: a point plus the
/// radius within which it can be collected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub position: Point2D,
    pub width: f64,
}

/// One tick of avatar motion: the segment from the previous position to the
/// new position, swept with the given half-width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Gatherer {
    pub start_pos: Point2D,
    pub end_pos: Point2D,
    pub width: f64,
}

/// Result of projecting an item center onto a motion segment.
///
/// `proj_ratio` is the position of the closest approach along the segment
/// (0 = segment start, 1 = segment end); `sq_distance` is the squared
/// perpendicular distance at that point.
#[derive(Debug, Clone, Copy)]
pub struct CollectionResult {
    pub sq_distance: f64,
    pub proj_ratio: f64,
}

impl CollectionResult {
    /// Whether the item is collected given the combined collection radius.
    ///
    /// The closest approach must occur during the motion (allowing
    /// [`COLLISION_EPSILON`] slack at both ends) and within the radius.
    pub fn is_collected(&self, collect_radius: f64) -> bool {
        if self.proj_ratio < -COLLISION_EPSILON || self.proj_ratio > 1.0 + COLLISION_EPSILON {
            return false;
        }
        self.sq_distance <= collect_radius * collect_radius + COLLISION_EPSILON
    }
}

/// A detected (item, gatherer) encounter.
///
/// `item_id` and `gatherer_id` are indices into the slices passed to
/// [`find_gather_events`]; `time` is the closest-approach parameter clamped
/// to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatheringEvent {
    pub item_id: usize,
    pub gatherer_id: usize,
    pub sq_distance: f64,
    pub time: f64,
}

/// Projects point `c` onto the segment `a -> b`.
///
/// Returns `None` for a degenerate (zero-length) segment, which produces no
/// events by definition.
pub fn try_collect_point(a: Point2D, b: Point2D, c: Point2D) -> Option<CollectionResult> {
    let v_x = b.x - a.x;
    let v_y = b.y - a.y;
    let v_len2 = v_x * v_x + v_y * v_y;
    if v_len2 == 0.0 {
        return None;
    }

    let u_x = c.x - a.x;
    let u_y = c.y - a.y;
    let u_dot_v = u_x * v_x + u_y * v_y;
    let u_len2 = u_x * u_x + u_y * u_y;

    Some(CollectionResult {
        sq_distance: u_len2 - (u_dot_v * u_dot_v) / v_len2,
        proj_ratio: u_dot_v / v_len2,
    })
}

/// Finds every (item, gatherer) pair whose closest approach during the tick
/// falls within their combined collection radius.
///
/// Events are ordered by closest-approach time ascending; ties closer than
/// [`COLLISION_EPSILON`] break by squared distance ascending, and exact
/// duplicates keep (gatherer, item) discovery order. Cost is O(items ×
/// gatherers), which is fine at the tens-per-session scale the server runs.
pub fn find_gather_events(items: &[Item], gatherers: &[Gatherer]) -> Vec<GatheringEvent> {
    let mut events = Vec::new();

    for (gatherer_id, gatherer) in gatherers.iter().enumerate() {
        for (item_id, item) in items.iter().enumerate() {
            let Some(result) =
                try_collect_point(gatherer.start_pos, gatherer.end_pos, item.position)
            else {
                continue;
            };
            if result.is_collected(gatherer.width + item.width) {
                events.push(GatheringEvent {
                    item_id,
                    gatherer_id,
                    sq_distance: result.sq_distance,
                    time: result.proj_ratio.clamp(0.0, 1.0),
                });
            }
        }
    }

    events.sort_by(|a, b| {
        if (a.time - b.time).abs() < COLLISION_EPSILON {
            a.sq_distance.total_cmp(&b.sq_distance)
        } else {
            a.time.total_cmp(&b.time)
        }
    });
    events
}

/// Decides how many new loot items should appear on a map as time passes.
///
/// The generator models a Bernoulli trial per base interval: over an elapsed
/// time `τ` the chance of at least one appearance is
/// `1 - (1 - p)^(τ / base_interval)`. Elapsed time accumulates across calls
/// until something spawns, so sparse ticks still converge to the configured
/// rate. The number of items on the map never exceeds the number of looters.
///
/// Randomness comes from the injected source; the default source is the
/// constant `1.0`, which makes the generator fully deterministic — the mode
/// the server and the test suite rely on.
pub struct LootGenerator {
    base_interval: Duration,
    probability: f64,
    time_without_loot: Duration,
    random_source: Box<dyn FnMut() -> f64 + Send>,
}

impl LootGenerator {
    /// Creates a generator with the deterministic default random source.
    ///
    /// `base_interval` must be non-zero; `probability` is the chance of an
    /// appearance within one base interval.
    pub fn new(base_interval: Duration, probability: f64) -> Self {
        Self::with_random_source(base_interval, probability, || 1.0)
    }

    /// Creates a generator drawing from a caller-supplied source yielding
    /// uniform values in `[0, 1]`.
    pub fn with_random_source(
        base_interval: Duration,
        probability: f64,
        random_source: impl FnMut() -> f64 + Send + 'static,
    ) -> Self {
        Self {
            base_interval,
            probability,
            time_without_loot: Duration::ZERO,
            random_source: Box::new(random_source),
        }
    }

    /// Returns how many new items to spawn after `time_delta` has passed.
    ///
    /// `loot_count` is the number of items currently on the map and
    /// `looter_count` the number of active gatherers; the result never
    /// exceeds `looter_count - loot_count`. The elapsed-time accumulator
    /// resets only when at least one item spawns.
    pub fn generate(
        &mut self,
        time_delta: Duration,
        loot_count: usize,
        looter_count: usize,
    ) -> usize {
        self.time_without_loot += time_delta;
        let loot_shortage = looter_count.saturating_sub(loot_count);
        let ratio = self.time_without_loot.as_secs_f64() / self.base_interval.as_secs_f64();
        let probability =
            ((1.0 - (1.0 - self.probability).powf(ratio)) * (self.random_source)()).clamp(0.0, 1.0);
        let generated = (loot_shortage as f64 * probability).round() as usize;
        if generated > 0 {
            self.time_without_loot = Duration::ZERO;
        }
        generated
    }
}

impl fmt::Debug for LootGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LootGenerator")
            .field("base_interval", &self.base_interval)
            .field("probability", &self.probability)
            .field("time_without_loot", &self.time_without_loot)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn item(x: f64, y: f64, width: f64) -> Item {
        Item {
            position: Point2D::new(x, y),
            width,
        }
    }

    fn gatherer(x0: f64, y0: f64, x1: f64, y1: f64) -> Gatherer {
        Gatherer {
            start_pos: Point2D::new(x0, y0),
            end_pos: Point2D::new(x1, y1),
            width: 0.6,
        }
    }

    #[test]
    fn test_try_collect_point_projection() {
        let result = try_collect_point(
            Point2D::new(0.0, 0.0),
            Point2D::new(4.0, 0.0),
            Point2D::new(2.0, 1.0),
        )
        .unwrap();
        assert_approx_eq!(result.proj_ratio, 0.5, 1e-12);
        assert_approx_eq!(result.sq_distance, 1.0, 1e-12);
    }

    #[test]
    fn test_try_collect_point_degenerate_segment() {
        let p = Point2D::new(3.0, 3.0);
        assert!(try_collect_point(p, p, Point2D::new(3.0, 3.1)).is_none());
    }

    #[test]
    fn test_is_collected_respects_projection_window() {
        let behind = CollectionResult {
            sq_distance: 0.0,
            proj_ratio: -0.1,
        };
        assert!(!behind.is_collected(1.0));

        let beyond = CollectionResult {
            sq_distance: 0.0,
            proj_ratio: 1.1,
        };
        assert!(!beyond.is_collected(1.0));

        let inside = CollectionResult {
            sq_distance: 0.25,
            proj_ratio: 0.5,
        };
        assert!(inside.is_collected(0.5));
        assert!(!inside.is_collected(0.4));
    }

    #[test]
    fn test_find_gather_events_reference_table() {
        let items = vec![
            item(0.4, 0.6, 0.0),
            item(0.6, 0.0, 0.0),
            item(39.4, 0.7, 0.0),
            item(10.0, 10.4, 0.0),
            item(29.7, 39.9, 0.3),
            item(3.0, 2.0, 1.4),
            item(3.0, 6.0, 1.4),
        ];
        let gatherers = vec![
            gatherer(0.0, 0.5, 0.0, 0.5),
            gatherer(0.4, 0.0, 0.4, 0.0),
            gatherer(0.0, 0.0, 0.5, 0.0),
            gatherer(0.3, 0.2, 1.5, 0.2),
            gatherer(1.2, 0.0, 0.0, 0.0),
            gatherer(0.0, 0.8, 0.0, 0.0),
            gatherer(0.0, 0.0, 0.0, 0.0),
            gatherer(39.0, 0.0, 39.5, 0.0),
            gatherer(10.0, 10.0, 10.0, 10.8),
            gatherer(10.0, 11.0, 10.0, 10.5),
            gatherer(10.0, 9.9, 10.0, 10.7),
            gatherer(15.0, 10.0, 15.0, 10.5),
            gatherer(10.0, 10.0, 10.0, 9.5),
            gatherer(29.2, 39.0, 29.9, 39.0),
            gatherer(1.0, 1.0, 5.0, 5.0),
        ];

        let events = find_gather_events(&items, &gatherers);

        let expected = [
            (0, 3, 0.16, 0.083333333333333356),
            (1, 3, 0.04, 0.25),
            (0, 5, 0.16, 0.25),
            (5, 14, 0.5, 0.375),
            (1, 4, 0.0, 0.5),
            (3, 8, 0.0, 0.5),
            (3, 10, 0.0, 0.62500000000000078),
            (0, 4, 0.36, 0.66666666666666663),
            (4, 13, 0.81, 0.71428571428571508),
            (0, 2, 0.36, 0.80000000000000004),
            (1, 5, 0.36, 1.0),
        ];

        assert_eq!(events.len(), expected.len());
        for (event, (item_id, gatherer_id, sq_distance, time)) in events.iter().zip(expected) {
            assert_eq!(event.item_id, item_id);
            assert_eq!(event.gatherer_id, gatherer_id);
            assert_approx_eq!(event.sq_distance, sq_distance, 1e-10);
            assert_approx_eq!(event.time, time, 1e-10);
        }
    }

    #[test]
    fn test_find_gather_events_skips_stationary_gatherers() {
        let items = vec![item(0.0, 0.0, 1.0)];
        let gatherers = vec![Gatherer {
            start_pos: Point2D::new(0.0, 0.0),
            end_pos: Point2D::new(0.0, 0.0),
            width: 1.0,
        }];
        assert!(find_gather_events(&items, &gatherers).is_empty());
    }

    #[test]
    fn test_find_gather_events_orders_ties_by_distance() {
        // Both items reach closest approach at the same time; the nearer one
        // must come first.
        let items = vec![item(5.0, 0.3, 0.0), item(5.0, 0.1, 0.0)];
        let gatherers = vec![gatherer(0.0, 0.0, 10.0, 0.0)];

        let events = find_gather_events(&items, &gatherers);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].item_id, 1);
        assert_eq!(events[1].item_id, 0);
    }

    #[test]
    fn test_loot_generator_deterministic_spawns() {
        let mut generator = LootGenerator::new(Duration::from_secs(1), 0.5);

        // One full base interval with probability 0.5: half of the shortage.
        assert_eq!(generator.generate(Duration::from_secs(1), 0, 4), 2);
        assert_eq!(generator.generate(Duration::from_secs(1), 2, 4), 1);
    }

    #[test]
    fn test_loot_generator_accumulates_time_until_spawn() {
        let mut generator = LootGenerator::new(Duration::from_secs(1), 0.5);

        // Half an interval: P = 1 - 0.5^0.5 ~= 0.29, rounds to zero spawns.
        assert_eq!(generator.generate(Duration::from_millis(500), 0, 1), 0);
        // The accumulator keeps the earlier half interval: P = 0.5 now.
        assert_eq!(generator.generate(Duration::from_millis(500), 0, 1), 1);
    }

    #[test]
    fn test_loot_generator_capped_by_looter_shortage() {
        let mut generator = LootGenerator::new(Duration::from_millis(1), 1.0);

        assert_eq!(generator.generate(Duration::from_secs(10), 0, 3), 3);
        assert_eq!(generator.generate(Duration::from_secs(10), 3, 3), 0);
        assert_eq!(generator.generate(Duration::from_secs(10), 5, 3), 0);
    }

    #[test]
    fn test_loot_generator_certain_probability_spawns_immediately() {
        let mut generator = LootGenerator::new(Duration::from_secs(5), 1.0);
        assert_eq!(generator.generate(Duration::from_millis(1), 0, 2), 2);
    }

    #[test]
    fn test_loot_generator_custom_random_source() {
        let mut generator = LootGenerator::with_random_source(Duration::from_secs(1), 1.0, || 0.0);
        // A source pinned to zero suppresses every spawn.
        assert_eq!(generator.generate(Duration::from_secs(100), 0, 10), 0);

        let mut generator = LootGenerator::with_random_source(Duration::from_secs(1), 0.5, || 0.5);
        // P = 0.5 * 0.5 = 0.25 over one interval: 10 looters round to 3.
        assert_eq!(generator.generate(Duration::from_secs(1), 0, 10), 3);
    }
}
