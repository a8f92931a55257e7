//! Authoritative per-map world state and the tick pipeline.
//!
//! A [`GameSession`] owns everything that changes while a map is being
//! played: the dogs, the lost objects waiting to be found, the motion
//! segments of the last tick, and the published per-dog views. The
//! [`Game`] registry owns the immutable maps and at most one live session
//! per map id.
//!
//! Each tick runs the same pipeline: move every dog, spawn loot, resolve
//! pickups, resolve base returns, publish views. All randomness flows
//! through the session's own seedable generator so a seeded session ticks
//! reproducibly.

use crate::dog::{Direction, Dog, FoundObject};
use crate::map::{Map, ModelError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shared::{
    find_gather_events, Gatherer, Item, LootGenerator, Point2D, Vec2D, BASE_RADIUS,
    GATHERER_HALF_WIDTH,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

/// A pickup lying somewhere on the road network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LostObject {
    pub id: u32,
    pub kind: u32,
    pub position: Point2D,
}

/// The mutable loot bookkeeping of one session: the outstanding objects and
/// the monotonically increasing id source.
#[derive(Debug, Default)]
pub struct LootState {
    next_id: u32,
    objects: Vec<LostObject>,
}

impl LootState {
    pub fn objects(&self) -> &[LostObject] {
        &self.objects
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    fn add(&mut self, kind: u32, position: Point2D) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.push(LostObject { id, kind, position });
        id
    }
}

/// What observers see of one dog, refreshed at the end of every tick and at
/// join time.
#[derive(Debug, Clone, PartialEq)]
pub struct GameStateView {
    pub position: Point2D,
    pub velocity: Vec2D,
    pub direction: Direction,
    pub bag: Vec<FoundObject>,
    pub score: u32,
}

impl GameStateView {
    fn of(dog: &Dog) -> Self {
        Self {
            position: dog.position,
            velocity: dog.velocity,
            direction: dog.direction,
            bag: dog.bag().to_vec(),
            score: dog.score(),
        }
    }
}

/// Live world state for one map.
pub struct GameSession {
    map_id: String,
    next_dog_id: u32,
    dogs: BTreeMap<u32, Dog>,
    // Motion segments of the last tick, slot index = dog id.
    gatherers: Vec<Gatherer>,
    // Collision mirror of `loot.objects`, index-parallel.
    items: Vec<Item>,
    bases: Vec<Item>,
    loot: LootState,
    generator: LootGenerator,
    views: BTreeMap<u32, GameStateView>,
    rng: StdRng,
}

impl GameSession {
    pub fn new(map: &Map) -> Self {
        Self::with_rng(map, StdRng::from_entropy())
    }

    /// Creates a session with a caller-controlled spawn generator, for
    /// reproducible simulations.
    pub fn with_rng(map: &Map, rng: StdRng) -> Self {
        let loot_types = map.loot_types();
        Self {
            map_id: map.id().to_string(),
            next_dog_id: 0,
            dogs: BTreeMap::new(),
            gatherers: Vec::new(),
            items: Vec::new(),
            bases: Vec::new(),
            loot: LootState::default(),
            generator: LootGenerator::new(
                Duration::from_secs_f64(loot_types.spawn_period),
                loot_types.spawn_probability,
            ),
            views: BTreeMap::new(),
            rng,
        }
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    pub fn dogs(&self) -> &BTreeMap<u32, Dog> {
        &self.dogs
    }

    pub fn dog(&self, id: u32) -> Option<&Dog> {
        self.dogs.get(&id)
    }

    pub fn dog_mut(&mut self, id: u32) -> Option<&mut Dog> {
        self.dogs.get_mut(&id)
    }

    pub fn next_dog_id(&self) -> u32 {
        self.next_dog_id
    }

    pub fn game_state_list(&self) -> &BTreeMap<u32, GameStateView> {
        &self.views
    }

    pub fn lost_objects(&self) -> &[LostObject] {
        self.loot.objects()
    }

    pub fn loot(&self) -> &LootState {
        &self.loot
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Spawns a new dog and publishes its initial view; returns its id.
    pub fn add_dog(
        &mut self,
        name: &str,
        bag_capacity: usize,
        position: Point2D,
        road_index: usize,
    ) -> u32 {
        let id = self.next_dog_id;
        self.next_dog_id += 1;
        let dog = Dog::new(id, name, bag_capacity, position, road_index);
        self.views.insert(id, GameStateView::of(&dog));
        self.dogs.insert(id, dog);
        id
    }

    /// Places a lost object directly, keeping the collision mirror in step.
    /// Restore and scenario setups use this; ticks spawn through the
    /// generator.
    pub fn add_lost_object(&mut self, kind: u32, position: Point2D) -> u32 {
        let id = self.loot.add(kind, position);
        self.items.push(Item {
            position,
            width: 0.0,
        });
        id
    }

    /// Advances the session world by `delta_ms`.
    pub fn update(&mut self, map: &Map, delta_ms: u64) {
        self.move_dogs(map, delta_ms);
        self.spawn_loot(map, delta_ms);
        self.process_gather_events();
        self.process_return_to_base_events(map);
        self.publish_views();
    }

    fn move_dogs(&mut self, map: &Map, delta_ms: u64) {
        for (&id, dog) in &mut self.dogs {
            dog.advance(map.roads(), delta_ms);

            let slot = id as usize;
            if self.gatherers.len() <= slot {
                self.gatherers.resize(slot + 1, Gatherer::default());
            }
            self.gatherers[slot] = Gatherer {
                start_pos: dog.previous_position,
                end_pos: dog.position,
                width: GATHERER_HALF_WIDTH,
            };
        }
    }

    fn spawn_loot(&mut self, map: &Map, delta_ms: u64) {
        if map.loot_types().type_count() == 0 {
            return;
        }
        let looter_count = self.gatherers.len();
        let spawn_count = self.generator.generate(
            Duration::from_millis(delta_ms),
            self.loot.objects().len(),
            looter_count,
        );
        for _ in 0..spawn_count {
            let road = &map.roads()[self.rng.gen_range(0..map.roads().len())];
            let position = Point2D::new(
                self.rng.gen_range(road.min().x..=road.max().x),
                self.rng.gen_range(road.min().y..=road.max().y),
            );
            let kind = self.rng.gen_range(0..map.loot_types().type_count()) as u32;
            self.add_lost_object(kind, position);
        }
    }

    fn process_gather_events(&mut self) {
        let events = find_gather_events(&self.items, &self.gatherers);

        let mut claimed = BTreeSet::new();
        for event in events {
            if claimed.contains(&event.item_id) {
                continue;
            }
            let Some(dog) = self.dogs.get_mut(&(event.gatherer_id as u32)) else {
                continue;
            };
            let object = self.loot.objects[event.item_id];
            if dog.put_to_bag(FoundObject {
                id: object.id,
                kind: object.kind,
            }) {
                claimed.insert(event.item_id);
            }
        }

        // Remove claimed objects and their mirror items from the back so
        // earlier indices stay valid.
        for index in claimed.into_iter().rev() {
            self.loot.objects.remove(index);
            self.items.remove(index);
        }
    }

    fn process_return_to_base_events(&mut self, map: &Map) {
        if self.bases.is_empty() {
            for office in map.offices() {
                self.bases.push(Item {
                    position: Point2D::new(office.position.x as f64, office.position.y as f64),
                    width: BASE_RADIUS,
                });
            }
        }

        for event in find_gather_events(&self.bases, &self.gatherers) {
            let Some(dog) = self.dogs.get_mut(&(event.gatherer_id as u32)) else {
                continue;
            };
            let reward: u32 = dog
                .bag()
                .iter()
                .map(|item| map.loot_types().value(item.kind))
                .sum();
            dog.add_score(reward);
            dog.empty_bag();
        }
    }

    fn publish_views(&mut self) {
        self.views = self
            .dogs
            .iter()
            .map(|(&id, dog)| (id, GameStateView::of(dog)))
            .collect();
    }

    /// Replaces the session's mutable state wholesale, as restored from a
    /// snapshot, and republishes views.
    pub(crate) fn restore_state(
        &mut self,
        next_dog_id: u32,
        dogs: Vec<Dog>,
        items: Vec<Item>,
        next_loot_id: u32,
        objects: Vec<LostObject>,
    ) {
        self.next_dog_id = next_dog_id;
        self.dogs = dogs.into_iter().map(|dog| (dog.id, dog)).collect();
        self.items = items;
        self.loot.next_id = next_loot_id;
        self.loot.objects = objects;
        self.publish_views();
    }
}

/// The set of known maps and the live sessions playing them.
#[derive(Default)]
pub struct Game {
    maps: Vec<Map>,
    map_index: HashMap<String, usize>,
    sessions: BTreeMap<String, GameSession>,
}

impl Game {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a map. Map ids must be unique.
    pub fn add_map(&mut self, map: Map) -> Result<(), ModelError> {
        if self.map_index.contains_key(map.id()) {
            return Err(ModelError::DuplicateMap(map.id().to_string()));
        }
        self.map_index.insert(map.id().to_string(), self.maps.len());
        self.maps.push(map);
        Ok(())
    }

    pub fn maps(&self) -> &[Map] {
        &self.maps
    }

    pub fn find_map(&self, id: &str) -> Option<&Map> {
        self.map_index.get(id).map(|&index| &self.maps[index])
    }

    pub fn find_session(&self, map_id: &str) -> Option<&GameSession> {
        self.sessions.get(map_id)
    }

    pub fn find_session_mut(&mut self, map_id: &str) -> Option<&mut GameSession> {
        self.sessions.get_mut(map_id)
    }

    pub fn sessions(&self) -> &BTreeMap<String, GameSession> {
        &self.sessions
    }

    /// Returns the session for the map, starting one if the map exists and
    /// no session is live yet.
    pub fn create_session(&mut self, map_id: &str) -> Option<&mut GameSession> {
        let index = *self.map_index.get(map_id)?;
        if !self.sessions.contains_key(map_id) {
            let session = GameSession::new(&self.maps[index]);
            self.sessions.insert(map_id.to_string(), session);
        }
        self.sessions.get_mut(map_id)
    }

    /// Advances every live session by `delta_ms`.
    pub fn tick(&mut self, delta_ms: u64) {
        let Game {
            maps,
            map_index,
            sessions,
        } = self;
        for (map_id, session) in sessions.iter_mut() {
            if let Some(&index) = map_index.get(map_id) {
                session.update(&maps[index], delta_ms);
            }
        }
    }
}
