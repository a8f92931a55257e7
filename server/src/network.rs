//! The HTTP surface of the game server.
//!
//! Routes under `/api/v1` map onto the application facade; everything else
//! falls through to static file serving when a www root is configured. All
//! state-touching handlers funnel through one shared mutex, so requests and
//! ticks are linearizable — the handler holds the lock for the whole
//! operation and never awaits while holding it.
//!
//! Failures leave the server as a `{code, message}` JSON envelope:
//! `invalidArgument` is 400, `mapNotFound` 404, and both token failures 401.

use crate::app::{AppError, Application};
use crate::config::LootCatalog;
use crate::dog::Direction;
use crate::map::{Map, Road};
use crate::snapshot::Autosave;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the tick loop mutates, behind one lock.
pub struct ServerState {
    pub app: Application,
    pub autosave: Option<Autosave>,
}

impl ServerState {
    pub fn new(app: Application, autosave: Option<Autosave>) -> Self {
        Self { app, autosave }
    }

    /// Advances the world and runs the periodic save bookkeeping.
    pub fn tick(&mut self, delta_ms: u64) {
        self.app.tick(delta_ms);
        if let Some(autosave) = &mut self.autosave {
            autosave.on_tick(&self.app, delta_ms);
        }
    }
}

/// Shared context handed to every handler.
pub struct ApiState {
    pub state: Arc<Mutex<ServerState>>,
    pub catalog: Arc<LootCatalog>,
    /// True when auto-tick is off and clients drive time themselves.
    pub tick_endpoint_enabled: bool,
}

/// Builds the full router: API routes plus optional static file fallback.
pub fn build_router(api: ApiState, www_root: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route("/api/v1/maps", get(list_maps))
        .route("/api/v1/maps/{id}", get(map_by_id))
        .route("/api/v1/game/join", post(join_game))
        .route("/api/v1/game/players", get(list_players))
        .route("/api/v1/game/state", get(game_state))
        .route("/api/v1/game/player/action", post(player_action))
        .route("/api/v1/game/tick", post(tick));
    if let Some(root) = www_root {
        router = router.fallback_service(ServeDir::new(root));
    }
    router
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(Arc::new(api))
}

#[derive(Serialize)]
struct MapSummary {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct JoinResponse {
    #[serde(rename = "authToken")]
    auth_token: String,
    #[serde(rename = "playerId")]
    player_id: u32,
}

#[derive(Serialize)]
struct PlayerName {
    name: String,
}

#[derive(Serialize)]
struct BagItem {
    id: u32,
    #[serde(rename = "type")]
    kind: u32,
}

#[derive(Serialize)]
struct PlayerStateBody {
    pos: [f64; 2],
    speed: [f64; 2],
    dir: &'static str,
    bag: Vec<BagItem>,
    score: u32,
}

#[derive(Serialize)]
struct LostObjectBody {
    #[serde(rename = "type")]
    kind: u32,
    pos: [f64; 2],
}

#[derive(Serialize)]
struct GameStateBody {
    players: BTreeMap<u32, PlayerStateBody>,
    #[serde(rename = "lostObjects")]
    lost_objects: BTreeMap<u32, LostObjectBody>,
}

fn wire_direction(direction: Direction) -> &'static str {
    match direction {
        Direction::North => "U",
        Direction::South => "D",
        Direction::West => "L",
        Direction::East => "R",
    }
}

fn ok_json(body: impl Serialize) -> Response {
    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, "no-cache")],
        Json(body),
    )
        .into_response()
}

fn error_json(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        [(header::CACHE_CONTROL, "no-cache")],
        Json(json!({ "code": code, "message": message })),
    )
        .into_response()
}

fn app_error(error: &AppError) -> Response {
    let status = match error {
        AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        AppError::MapNotFound => StatusCode::NOT_FOUND,
        AppError::InvalidToken | AppError::UnknownToken => StatusCode::UNAUTHORIZED,
    };
    error_json(status, error.code(), &error.to_string())
}

fn invalid_argument(message: &str) -> Response {
    error_json(StatusCode::BAD_REQUEST, "invalidArgument", message)
}

/// Pulls the raw `Authorization` value; its shape is validated by the
/// application facade.
fn credentials(headers: &HeaderMap) -> Result<&str, Response> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            error_json(
                StatusCode::UNAUTHORIZED,
                "invalidToken",
                "authorization header is missing",
            )
        })
}

fn parse_body(body: &str) -> Result<serde_json::Value, Response> {
    serde_json::from_str(body).map_err(|_| invalid_argument("request body is not valid JSON"))
}

async fn list_maps(State(api): State<Arc<ApiState>>) -> Response {
    let state = api.state.lock().await;
    let maps: Vec<MapSummary> = state
        .app
        .game()
        .maps()
        .iter()
        .map(|map| MapSummary {
            id: map.id().to_string(),
            name: map.name().to_string(),
        })
        .collect();
    ok_json(maps)
}

fn road_json(road: &Road) -> serde_json::Value {
    if road.is_horizontal() {
        json!({ "x0": road.start().x, "y0": road.start().y, "x1": road.end().x })
    } else {
        json!({ "x0": road.start().x, "y0": road.start().y, "y1": road.end().y })
    }
}

fn map_json(map: &Map, catalog: &LootCatalog) -> serde_json::Value {
    let roads: Vec<_> = map.roads().iter().map(road_json).collect();
    let buildings: Vec<_> = map
        .buildings()
        .iter()
        .map(|building| {
            json!({
                "x": building.bounds.position.x,
                "y": building.bounds.position.y,
                "w": building.bounds.size.width,
                "h": building.bounds.size.height,
            })
        })
        .collect();
    let offices: Vec<_> = map
        .offices()
        .iter()
        .map(|office| {
            json!({
                "id": office.id,
                "x": office.position.x,
                "y": office.position.y,
                "offsetX": office.offset.dx,
                "offsetY": office.offset.dy,
            })
        })
        .collect();

    let mut body = json!({
        "id": map.id(),
        "name": map.name(),
        "roads": roads,
        "buildings": buildings,
        "offices": offices,
    });
    if let Some(loot_types) = catalog.loot_types(map.id()) {
        body["lootTypes"] = loot_types.clone();
    }
    body
}

async fn map_by_id(State(api): State<Arc<ApiState>>, Path(map_id): Path<String>) -> Response {
    let state = api.state.lock().await;
    match state.app.game().find_map(&map_id) {
        Some(map) => ok_json(map_json(map, &api.catalog)),
        None => error_json(StatusCode::NOT_FOUND, "mapNotFound", "map not found"),
    }
}

async fn join_game(State(api): State<Arc<ApiState>>, body: String) -> Response {
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let (Some(user_name), Some(map_id)) = (
        body.get("userName").and_then(serde_json::Value::as_str),
        body.get("mapId").and_then(serde_json::Value::as_str),
    ) else {
        return invalid_argument("join request must carry userName and mapId");
    };

    let mut state = api.state.lock().await;
    match state.app.join_game(user_name, map_id) {
        Ok(result) => ok_json(JoinResponse {
            auth_token: result.token,
            player_id: result.player_id,
        }),
        Err(error) => app_error(&error),
    }
}

async fn list_players(State(api): State<Arc<ApiState>>, headers: HeaderMap) -> Response {
    let credentials = match credentials(&headers) {
        Ok(credentials) => credentials,
        Err(response) => return response,
    };

    let state = api.state.lock().await;
    match state.app.player_list(credentials) {
        Ok(roster) => {
            let players: BTreeMap<u32, PlayerName> = roster
                .iter()
                .map(|(&id, name)| (id, PlayerName { name: name.clone() }))
                .collect();
            ok_json(players)
        }
        Err(error) => app_error(&error),
    }
}

async fn game_state(State(api): State<Arc<ApiState>>, headers: HeaderMap) -> Response {
    let credentials = match credentials(&headers) {
        Ok(credentials) => credentials,
        Err(response) => return response,
    };

    let state = api.state.lock().await;
    let views = match state.app.game_state_list(credentials) {
        Ok(views) => views,
        Err(error) => return app_error(&error),
    };
    let players = views
        .iter()
        .map(|(&id, view)| {
            (
                id,
                PlayerStateBody {
                    pos: [view.position.x, view.position.y],
                    speed: [view.velocity.x, view.velocity.y],
                    dir: wire_direction(view.direction),
                    bag: view
                        .bag
                        .iter()
                        .map(|item| BagItem {
                            id: item.id,
                            kind: item.kind,
                        })
                        .collect(),
                    score: view.score,
                },
            )
        })
        .collect();

    let lost_objects = match state.app.lost_objects(credentials) {
        Ok(objects) => objects
            .iter()
            .map(|object| {
                (
                    object.id,
                    LostObjectBody {
                        kind: object.kind,
                        pos: [object.position.x, object.position.y],
                    },
                )
            })
            .collect(),
        Err(error) => return app_error(&error),
    };

    ok_json(GameStateBody {
        players,
        lost_objects,
    })
}

async fn player_action(
    State(api): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let credentials = match credentials(&headers) {
        Ok(credentials) => credentials,
        Err(response) => return response,
    };
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(command) = body.get("move").and_then(serde_json::Value::as_str) else {
        return invalid_argument("action request must carry a move field");
    };

    let mut state = api.state.lock().await;
    match state.app.set_player_action(credentials, command) {
        Ok(()) => ok_json(json!({})),
        Err(error) => app_error(&error),
    }
}

async fn tick(State(api): State<Arc<ApiState>>, body: String) -> Response {
    if !api.tick_endpoint_enabled {
        return error_json(StatusCode::BAD_REQUEST, "badRequest", "invalid endpoint");
    }
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(delta_ms) = body.get("timeDelta").and_then(serde_json::Value::as_u64) else {
        return invalid_argument("tick request must carry an integer timeDelta");
    };

    api.state.lock().await.tick(delta_ms);
    ok_json(json!({}))
}
