//! Durable snapshots of the application state.
//!
//! A snapshot is a structural capture of everything the config file cannot
//! reproduce: live sessions (dogs, loot, items), the player rosters, and the
//! token bindings. Restoring replays that capture onto a freshly loaded
//! game model; any binding whose referent no longer exists is skipped, so a
//! partially matching snapshot still restores what it can.
//!
//! The byte format is bincode. Files are written to `<path>_tmp` and then
//! renamed over the target, so a failed save never corrupts the previous
//! snapshot.

use crate::app::Application;
use crate::dog::{Direction, Dog, FoundObject};
use crate::game::LostObject;
use crate::players::Player;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use shared::{Item, Point2D, Vec2D};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot format error: {0}")]
    Format(#[from] bincode::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct DogRepr {
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
}

impl DogRepr {
    fn capture(dog: &Dog) -> Self {
        Self {
            id: dog.id,
            name: dog.name.clone(),
            bag_capacity: dog.bag_capacity,
            position: dog.position,
            previous_position: dog.previous_position,
            velocity: dog.velocity,
            direction: dog.direction,
            road_index: dog.road_index,
            bag: dog.bag().to_vec(),
            score: dog.score(),
        }
    }

    fn restore(self) -> Dog {
        Dog::from_snapshot(
            self.id,
            self.name,
            self.bag_capacity,
            self.position,
            self.previous_position,
            self.velocity,
            self.direction,
            self.road_index,
            self.bag,
            self.score,
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LootRepr {
    next_id: u32,
    outstanding_count: u32,
    objects: Vec<LostObject>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRepr {
    map_id: String,
    next_dog_id: u32,
    dogs: Vec<DogRepr>,
    loot: LootRepr,
    items: Vec<Item>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlayersRepr {
    rosters: BTreeMap<String, BTreeMap<u32, String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokensRepr {
    bindings: BTreeMap<String, u32>,
}

/// The complete structural snapshot of an [`Application`].
#[derive(Debug, Serialize, Deserialize)]
pub struct ApplicationRepr {
    sessions: Vec<SessionRepr>,
    players: PlayersRepr,
    tokens: TokensRepr,
}

impl ApplicationRepr {
    pub fn capture(app: &Application) -> Self {
        let sessions = app
            .game()
            .sessions()
            .iter()
            .map(|(map_id, session)| SessionRepr {
                map_id: map_id.clone(),
                next_dog_id: session.next_dog_id(),
                dogs: session.dogs().values().map(DogRepr::capture).collect(),
                loot: LootRepr {
                    next_id: session.loot().next_id(),
                    outstanding_count: session.lost_objects().len() as u32,
                    objects: session.lost_objects().to_vec(),
                },
                items: session.items().to_vec(),
            })
            .collect();

        Self {
            sessions,
            players: PlayersRepr {
                rosters: app.players().rosters().clone(),
            },
            tokens: TokensRepr {
                bindings: app
                    .tokens()
                    .bindings()
                    .iter()
                    .map(|(token, player)| (token.clone(), player.dog_id))
                    .collect(),
            },
        }
    }

    /// Replays the capture onto `app`: sessions first, then rosters, then
    /// tokens, skipping anything whose referent is gone.
    pub fn restore(self, app: &mut Application) {
        let (game, players, tokens) = app.restore_parts();

        for session_repr in self.sessions {
            let Some(session) = game.create_session(&session_repr.map_id) else {
                continue;
            };
            let dogs = session_repr.dogs.into_iter().map(DogRepr::restore).collect();
            session.restore_state(
                session_repr.next_dog_id,
                dogs,
                session_repr.items,
                session_repr.loot.next_id,
                session_repr.loot.objects,
            );
        }

        for (map_id, roster) in self.players.rosters {
            let Some(session) = game.find_session(&map_id) else {
                continue;
            };
            for (dog_id, name) in roster {
                if session.dog(dog_id).is_some() {
                    players.add(&map_id, dog_id, &name);
                }
            }
        }

        for (token, dog_id) in self.tokens.bindings {
            let map_id = players
                .rosters()
                .iter()
                .find(|(_, roster)| roster.contains_key(&dog_id))
                .map(|(map_id, _)| map_id.clone());
            if let Some(map_id) = map_id {
                tokens.bind(token, Player { map_id, dog_id });
            }
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push("_tmp");
    PathBuf::from(tmp)
}

/// Writes a snapshot of `app` to `path` atomically.
pub fn save(app: &Application, path: &Path) -> Result<(), SnapshotError> {
    let bytes = bincode::serialize(&ApplicationRepr::capture(app))?;
    let tmp = tmp_path(path);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Restores `app` from the snapshot at `path`.
pub fn load(app: &mut Application, path: &Path) -> Result<(), SnapshotError> {
    let bytes = std::fs::read(path)?;
    let repr: ApplicationRepr = bincode::deserialize(&bytes)?;
    repr.restore(app);
    Ok(())
}

/// Periodic save bookkeeping driven by the tick loop.
///
/// A failed periodic save is logged and swallowed: the schedule must keep
/// running, and the previous snapshot on disk stays intact.
#[derive(Debug)]
pub struct Autosave {
    path: PathBuf,
    period_ms: u64,
    elapsed_ms: u64,
}

impl Autosave {
    pub fn new(path: PathBuf, period_ms: u64) -> Self {
        Self {
            path,
            period_ms,
            elapsed_ms: 0,
        }
    }

    pub fn on_tick(&mut self, app: &Application, delta_ms: u64) {
        self.elapsed_ms += delta_ms;
        if self.elapsed_ms < self.period_ms {
            return;
        }
        self.elapsed_ms = 0;
        match save(app, &self.path) {
            Ok(()) => debug!("state saved to {}", self.path.display()),
            Err(err) => error!("periodic state save failed: {err}"),
        }
    }
}
