//! The application facade: every request-level operation on the game model
//! enters through here.
//!
//! The facade owns the game registry, the player rosters, and the token
//! registry, and enforces the invariants that tie them together: a token
//! always resolves to a player whose dog lives in a real session, names and
//! move commands are validated before they touch the model, and all failures
//! are typed so the HTTP layer can map them to status codes without
//! inspecting messages.

use crate::dog::Direction;
use crate::game::{Game, GameStateView, LostObject};
use crate::players::{Player, Players, TokenRegistry};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Point2D, Vec2D};
use std::collections::BTreeMap;
use thiserror::Error;

/// Typed request failures surfaced by the facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("map not found")]
    MapNotFound,
    #[error("authorization header is missing or malformed")]
    InvalidToken,
    #[error("player token has not been found")]
    UnknownToken,
}

impl AppError {
    /// Wire-level error code for the `{code, message}` envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => "invalidArgument",
            AppError::MapNotFound => "mapNotFound",
            AppError::InvalidToken => "invalidToken",
            AppError::UnknownToken => "unknownToken",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGameResult {
    pub token: String,
    pub player_id: u32,
}

/// The authoritative application state behind the HTTP layer.
pub struct Application {
    game: Game,
    players: Players,
    tokens: TokenRegistry,
    randomize_spawn: bool,
    spawn_rng: StdRng,
}

impl Application {
    pub fn new(game: Game, randomize_spawn: bool) -> Self {
        Self::with_rngs(game, randomize_spawn, StdRng::from_entropy(), TokenRegistry::new())
    }

    /// Builds an application over caller-controlled generators, for
    /// reproducible joins and token streams in tests.
    pub fn with_rngs(
        game: Game,
        randomize_spawn: bool,
        spawn_rng: StdRng,
        tokens: TokenRegistry,
    ) -> Self {
        Self {
            game,
            players: Players::new(),
            tokens,
            randomize_spawn,
            spawn_rng,
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }

    pub fn players(&self) -> &Players {
        &self.players
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub(crate) fn restore_parts(&mut self) -> (&mut Game, &mut Players, &mut TokenRegistry) {
        (&mut self.game, &mut self.players, &mut self.tokens)
    }

    /// Adds a player to a map: creates the session on first join, spawns the
    /// dog, records the roster entry, and issues a fresh token.
    pub fn join_game(&mut self, name: &str, map_id: &str) -> Result<JoinGameResult, AppError> {
        if name.is_empty() {
            return Err(AppError::InvalidArgument("invalid player name".to_string()));
        }

        let (position, road_index, bag_capacity) = {
            let map = self.game.find_map(map_id).ok_or(AppError::MapNotFound)?;
            let roads = map.roads();
            if self.randomize_spawn {
                let index = self.spawn_rng.gen_range(0..roads.len());
                let road = &roads[index];
                let position = Point2D::new(
                    self.spawn_rng.gen_range(road.min().x..=road.max().x),
                    self.spawn_rng.gen_range(road.min().y..=road.max().y),
                );
                (position, index, map.bag_capacity())
            } else {
                let start = roads[0].start();
                (
                    Point2D::new(start.x as f64, start.y as f64),
                    0,
                    map.bag_capacity(),
                )
            }
        };

        let session = self
            .game
            .create_session(map_id)
            .ok_or(AppError::MapNotFound)?;
        let dog_id = session.add_dog(name, bag_capacity, position, road_index);
        info!("{name} joined map {map_id} as dog {dog_id}");
        self.players.add(map_id, dog_id, name);
        let token = self.tokens.issue(Player {
            map_id: map_id.to_string(),
            dog_id,
        });

        Ok(JoinGameResult {
            token,
            player_id: dog_id,
        })
    }

    /// Applies a move command to the caller's dog. Commands: `""` stops,
    /// `"L"`/`"R"`/`"U"`/`"D"` set the facing direction and full speed along
    /// the matching axis.
    pub fn set_player_action(&mut self, credentials: &str, command: &str) -> Result<(), AppError> {
        let (map_id, dog_id) = {
            let player = self.authorize(credentials)?;
            (player.map_id.clone(), player.dog_id)
        };

        let speed = self
            .game
            .find_map(&map_id)
            .map(|map| map.dog_speed())
            .ok_or(AppError::UnknownToken)?;
        let dog = self
            .game
            .find_session_mut(&map_id)
            .and_then(|session| session.dog_mut(dog_id))
            .ok_or(AppError::UnknownToken)?;

        match command {
            "" => dog.velocity = Vec2D::default(),
            "L" => {
                dog.direction = Direction::West;
                dog.velocity = Vec2D::new(-speed, 0.0);
            }
            "R" => {
                dog.direction = Direction::East;
                dog.velocity = Vec2D::new(speed, 0.0);
            }
            "U" => {
                dog.direction = Direction::North;
                dog.velocity = Vec2D::new(0.0, -speed);
            }
            "D" => {
                dog.direction = Direction::South;
                dog.velocity = Vec2D::new(0.0, speed);
            }
            _ => {
                return Err(AppError::InvalidArgument(
                    "failed to parse action".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Names of everyone on the caller's map, keyed by dog id.
    pub fn player_list(&self, credentials: &str) -> Result<&BTreeMap<u32, String>, AppError> {
        let player = self.authorize(credentials)?;
        self.players
            .roster(&player.map_id)
            .ok_or_else(|| AppError::InvalidArgument("player list was not found".to_string()))
    }

    /// Published per-dog views of the caller's session.
    pub fn game_state_list(
        &self,
        credentials: &str,
    ) -> Result<&BTreeMap<u32, GameStateView>, AppError> {
        let player = self.authorize(credentials)?;
        self.game
            .find_session(&player.map_id)
            .map(|session| session.game_state_list())
            .ok_or(AppError::UnknownToken)
    }

    /// Outstanding lost objects of the caller's session.
    pub fn lost_objects(&self, credentials: &str) -> Result<&[LostObject], AppError> {
        let player = self.authorize(credentials)?;
        self.game
            .find_session(&player.map_id)
            .map(|session| session.lost_objects())
            .ok_or(AppError::UnknownToken)
    }

    /// Advances every live session by `delta_ms`.
    pub fn tick(&mut self, delta_ms: u64) {
        self.game.tick(delta_ms);
    }

    /// Resolves `Authorization` credentials to a player.
    ///
    /// The value must be exactly `"Bearer "` plus 32 token characters; a
    /// well-formed but unbound token is a distinct failure so clients can
    /// tell a stale session from a broken request.
    fn authorize(&self, credentials: &str) -> Result<&Player, AppError> {
        let token = credentials
            .strip_prefix("Bearer ")
            .filter(|token| token.len() == 32)
            .ok_or(AppError::InvalidToken)?;
        self.tokens.find(token).ok_or(AppError::UnknownToken)
    }
}
