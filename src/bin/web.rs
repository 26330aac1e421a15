//! Match server: in-memory match store plus one game-flow session per captain client, over REST.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default.
//! Override with env: HOST, PORT, SESSION_IDLE_SECS (idle sessions are closed after this long).

use actix_web::{
    delete, get, post, put,
    web::{Data, Json, Path, Query},
    App, HttpResponse, HttpServer, Responder,
};
use league_match_flow::{
    FieldUpdate, GameFlowEvent, MatchId, MatchPatch, MatchRecord, MatchSession, MatchStore,
    MemoryStore, PlayerId, Position, RoundIndex, SyncError, TeamSide,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

type Session = MatchSession<MemoryStore>;

/// Per-client entry: the session + last activity time (for auto-cleanup).
struct SessionEntry {
    session: Session,
    last_activity: Instant,
}

/// Sessions are keyed by match and client name (e.g. "home", "away").
type SessionKey = (MatchId, String);

struct ServerState {
    store: Arc<MemoryStore>,
    sessions: RwLock<HashMap<SessionKey, SessionEntry>>,
}

type AppState = Data<ServerState>;

/// Default idle threshold: sessions not touched for this long are closed.
const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(12 * 3600);

/// How often the cleanup task runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct CreateMatchBody {
    home_players: Vec<PlayerId>,
    away_players: Vec<PlayerId>,
}

#[derive(Deserialize)]
struct FrameResultBody {
    winner: TeamSide,
}

/// Path segment: match id (e.g. /api/matches/{id})
#[derive(Deserialize)]
struct MatchPath {
    id: MatchId,
}

/// Path segments: match id, 0-based round and position.
#[derive(Deserialize)]
struct FramePath {
    id: MatchId,
    round: RoundIndex,
    position: Position,
}

/// Path segments: match id and client name.
#[derive(Deserialize)]
struct ClientPath {
    id: MatchId,
    client: String,
}

/// Query for the candidate list: who could fill `position` after `round`.
#[derive(Deserialize)]
struct CandidatesQuery {
    side: TeamSide,
    position: Position,
    round: RoundIndex,
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "league-match-flow",
    })
}

/// Create a scheduled match; the first four players of each team start round 1.
#[post("/api/matches")]
async fn api_create_match(state: AppState, body: Json<CreateMatchBody>) -> HttpResponse {
    let body = body.into_inner();
    let record = match MatchRecord::new(body.home_players, body.away_players) {
        Ok(record) => record,
        Err(e) => return HttpResponse::BadRequest().json(json!({ "error": e.to_string() })),
    };
    match state.store.insert(record) {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => sync_error_response(&e),
    }
}

/// Canonical record as held by the store.
#[get("/api/matches/{id}")]
async fn api_get_match(state: AppState, path: Path<MatchPath>) -> HttpResponse {
    match state.store.load(path.id) {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => sync_error_response(&e),
    }
}

/// Record a frame result. Stands in for the score-entry screen.
#[put("/api/matches/{id}/frames/{round}/{position}")]
async fn api_set_frame_result(
    state: AppState,
    path: Path<FramePath>,
    body: Json<FrameResultBody>,
) -> HttpResponse {
    let patch = MatchPatch::from(FieldUpdate::FrameResult {
        round: path.round,
        position: path.position,
        winner: body.winner,
    });
    match state.store.apply(path.id, &patch) {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => sync_error_response(&e),
    }
}

/// Open (or refresh) a client's session and return its game-flow state.
#[get("/api/matches/{id}/clients/{client}")]
async fn api_get_client(state: AppState, path: Path<ClientPath>) -> HttpResponse {
    let path = path.into_inner();
    with_session(&state, path.id, path.client, |session| {
        HttpResponse::Ok().json(session.state())
    })
}

/// Dispatch one captain action. Rejected actions return 400 with the error and unchanged state.
#[post("/api/matches/{id}/clients/{client}/events")]
async fn api_client_event(
    state: AppState,
    path: Path<ClientPath>,
    body: Json<GameFlowEvent>,
) -> HttpResponse {
    let event = body.into_inner();
    if matches!(event, GameFlowEvent::Reconcile { .. }) {
        return HttpResponse::BadRequest()
            .json(json!({ "error": "snapshots come from the store, not from clients" }));
    }
    let path = path.into_inner();
    with_session(&state, path.id, path.client, |session| {
        match session.dispatch(event) {
            Ok(()) => {
                session.pump();
                HttpResponse::Ok().json(session.state())
            }
            Err(e) => HttpResponse::BadRequest()
                .json(json!({ "error": e.to_string(), "state": session.state() })),
        }
    })
}

/// Players the client may substitute into a position, given its staged lineups.
#[get("/api/matches/{id}/clients/{client}/candidates")]
async fn api_client_candidates(
    state: AppState,
    path: Path<ClientPath>,
    query: Query<CandidatesQuery>,
) -> HttpResponse {
    let path = path.into_inner();
    with_session(&state, path.id, path.client, |session| {
        let candidates = session
            .flow()
            .eligible_candidates(query.position, query.side, query.round);
        HttpResponse::Ok().json(candidates)
    })
}

/// Close a client's session (releases its subscription).
#[delete("/api/matches/{id}/clients/{client}")]
async fn api_close_client(state: AppState, path: Path<ClientPath>) -> HttpResponse {
    let path = path.into_inner();
    let mut g = match state.sessions.write() {
        Ok(guard) => guard,
        Err(_) => return HttpResponse::InternalServerError().body("lock error"),
    };
    match g.remove(&(path.id, path.client)) {
        Some(_) => HttpResponse::NoContent().finish(),
        None => HttpResponse::NotFound().json(json!({ "error": "No session" })),
    }
}

/// Run `f` on the client's session, opening it on first use. The session is
/// brought up to date with the store first. Touching it refreshes last_activity.
fn with_session<F>(state: &AppState, id: MatchId, client: String, f: F) -> HttpResponse
where
    F: FnOnce(&mut Session) -> HttpResponse,
{
    let mut g = match state.sessions.write() {
        Ok(guard) => guard,
        Err(_) => return HttpResponse::InternalServerError().body("lock error"),
    };
    let key = (id, client);
    if !g.contains_key(&key) {
        let session = match MatchSession::open(state.store.clone(), id, Some(key.1.clone())) {
            Ok(session) => session,
            Err(e) => return sync_error_response(&e),
        };
        log::info!("Client {} joined match {}", key.1, id);
        g.insert(
            key.clone(),
            SessionEntry {
                session,
                last_activity: Instant::now(),
            },
        );
    }
    let entry = match g.get_mut(&key) {
        Some(e) => e,
        None => return HttpResponse::NotFound().json(json!({ "error": "No session" })),
    };
    entry.last_activity = Instant::now();
    entry.session.pump();
    f(&mut entry.session)
}

fn sync_error_response(err: &SyncError) -> HttpResponse {
    let body = json!({ "error": err.to_string() });
    match err {
        SyncError::NotFound(_) => HttpResponse::NotFound().json(body),
        SyncError::AlreadyExists(_) => HttpResponse::Conflict().json(body),
        SyncError::Rejected(_) => HttpResponse::BadRequest().json(body),
        SyncError::Unavailable(_) => HttpResponse::ServiceUnavailable().json(body),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn session_idle_timeout() -> Duration {
    std::env::var("SESSION_IDLE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_SESSION_IDLE)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = std::env::var("HOST").unwrap_or_else(|_| default_host());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(default_port);
    let idle_timeout = session_idle_timeout();
    let bind = (host.as_str(), port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let state = Data::new(ServerState {
        store: Arc::new(MemoryStore::new()),
        sessions: RwLock::new(HashMap::new()),
    });

    // Background task: close sessions nobody has touched within the idle timeout
    let state_cleanup = state.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let mut g = match state_cleanup.sessions.write() {
                Ok(guard) => guard,
                Err(_) => continue,
            };
            let before = g.len();
            g.retain(|_, entry| entry.last_activity.elapsed() < idle_timeout);
            let removed = before - g.len();
            if removed > 0 {
                log::info!(
                    "Closed {} idle session(s) (no activity for {}s)",
                    removed,
                    idle_timeout.as_secs()
                );
            }
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(api_health)
            .service(api_create_match)
            .service(api_get_match)
            .service(api_set_frame_result)
            .service(api_get_client)
            .service(api_client_event)
            .service(api_client_candidates)
            .service(api_close_client)
    })
    .bind(bind)?
    .run()
    .await
}
