use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use helpdesk_core::capability::TranslatorCache;
use helpdesk_core::faq::{enrich_faq, FaqDraft};
use helpdesk_core::preset::{export_preset, import_preset};
use helpdesk_core::reindex::RebuildReport;
use helpdesk_core::session::TurnCounter;
use helpdesk_core::{Assistant, Capabilities, FaqItem, IndexHandle, PipelineConfig, Preset, ReplyStage, SearchHit, Session, Store, Transcript};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod local_ai;

/// Conversations idle this long are forgotten.
const SESSION_IDLE: Duration = Duration::from_secs(30 * 60);
const MAX_SESSIONS: usize = 10_000;

type ApiError = (StatusCode, String);

fn internal(e: anyhow::Error) -> ApiError {
    tracing::error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub session_id: String,
    /// Rendered reply, document reference included.
    pub reply: String,
    pub stage: ReplyStage,
    pub lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    /// Every state the bot bubble went through, last one final.
    pub messages: Vec<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFaq {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub doc_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildResponse {
    pub num_docs: usize,
    pub num_terms: usize,
    pub avgdl: f32,
    pub created_at: String,
}

impl From<RebuildReport> for RebuildResponse {
    fn from(r: RebuildReport) -> Self {
        Self { num_docs: r.num_docs, num_terms: r.num_terms, avgdl: r.avgdl, created_at: r.meta.created_at }
    }
}

/// A conversation: the session behind an async lock, and its turn counter
/// outside it so a new message can supersede one still streaming.
#[derive(Clone)]
struct SessionSlot {
    turns: TurnCounter,
    session: Arc<tokio::sync::Mutex<Session>>,
}

struct SessionEntry {
    slot: SessionSlot,
    last_used: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub caps: Capabilities,
    pub config: PipelineConfig,
    pub index: Arc<IndexHandle>,
    assistant: Arc<RwLock<Arc<Assistant>>>,
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
    next_session: Arc<AtomicU64>,
    session_idle: Duration,
    max_sessions: usize,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(store: Store, caps: Capabilities, config: PipelineConfig, admin_token: Option<String>) -> Result<Self> {
        let index = Arc::new(IndexHandle::load(&store, &config)?);
        let persona = store.load_persona()?.unwrap_or_default();
        let assistant = Assistant::new(caps.clone(), persona, config.clone(), index.clone());
        Ok(Self {
            store,
            caps,
            config,
            index,
            assistant: Arc::new(RwLock::new(Arc::new(assistant))),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_session: Arc::new(AtomicU64::new(1)),
            session_idle: SESSION_IDLE,
            max_sessions: MAX_SESSIONS,
            admin_token,
        })
    }

    pub fn with_session_limits(mut self, idle: Duration, max_sessions: usize) -> Self {
        self.session_idle = idle;
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn assistant(&self) -> Arc<Assistant> {
        self.assistant.read().clone()
    }

    /// Pick up a persona change. Existing conversations keep their state.
    pub fn reload_persona(&self) -> Result<()> {
        let persona = self.store.load_persona()?.unwrap_or_default();
        let assistant = Assistant::new(self.caps.clone(), persona, self.config.clone(), self.index.clone());
        *self.assistant.write() = Arc::new(assistant);
        Ok(())
    }

    fn session(&self, requested: Option<String>) -> (String, SessionSlot) {
        self.session_at(requested, Instant::now())
    }

    /// Look up or open a conversation. Idle ones are pruned first, and the
    /// least recently used is dropped when the map is full. A reply still
    /// running on a dropped session finishes on its own handle.
    fn session_at(&self, requested: Option<String>, now: Instant) -> (String, SessionSlot) {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, e| now.saturating_duration_since(e.last_used) < self.session_idle);
        if sessions.len() < before {
            tracing::debug!(pruned = before - sessions.len(), "idle sessions dropped");
        }
        if let Some(id) = requested {
            if let Some(entry) = sessions.get_mut(&id) {
                entry.last_used = now;
                return (id, entry.slot.clone());
            }
        }
        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions.iter().min_by_key(|(_, e)| e.last_used).map(|(id, _)| id.clone()) else { break };
            sessions.remove(&oldest);
            tracing::debug!(session = %oldest, "session evicted at capacity");
        }
        let n = self.next_session.fetch_add(1, Ordering::SeqCst);
        let id = format!("s{:x}-{n}", time::OffsetDateTime::now_utc().unix_timestamp());
        let session = self.assistant().new_session();
        let slot = SessionSlot { turns: session.turns(), session: Arc::new(tokio::sync::Mutex::new(session)) };
        sessions.insert(id.clone(), SessionEntry { slot: slot.clone(), last_used: now });
        (id, slot)
    }
}

fn cors_layer() -> CorsLayer {
    // CORS_ALLOW_ORIGIN is a comma-separated list; unset or empty allows any origin
    match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    }
}

pub fn build_app(store: Store, caps: Capabilities, config: PipelineConfig) -> Result<Router> {
    let admin_token = std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty());
    let state = AppState::new(store, caps, config, admin_token)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/chat", post(chat_handler))
        .route("/search", get(search_handler))
        .route("/faq", get(list_faqs).post(add_faq))
        .route("/index/rebuild", post(rebuild_index))
        .route("/preset/import", post(preset_import))
        .route("/preset/export", get(preset_export))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

pub async fn chat_handler(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Result<Json<ChatResponse>, ApiError> {
    if req.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is empty".into()));
    }
    let assistant = state.assistant();
    let (session_id, slot) = state.session(req.session_id);
    // Claim the turn before waiting on the session so an in-flight reply
    // stops at its next chunk.
    let turn = slot.turns.begin();
    let faqs = state.store.load_faqs().map_err(internal)?;
    let mut session = slot.session.lock().await;
    let mut transcript = Transcript::default();
    let reply = assistant.respond(&mut session, &turn, &faqs, &req.message, &mut transcript).await;
    tracing::info!(session = %session_id, stage = ?reply.stage, lang = %reply.lang, "chat turn");
    Ok(Json(ChatResponse {
        session_id,
        reply: reply.render(),
        stage: reply.stage,
        lang: reply.lang,
        doc_id: reply.doc_id,
        messages: transcript.messages,
    }))
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let corpus = state.index.snapshot();
    let mut translators = TranslatorCache::new();
    let results = corpus.search(&params.q, None, &state.caps, &mut translators, &state.config).await;
    let elapsed = start.elapsed();
    Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits: results.len(), results })
}

async fn list_faqs(State(state): State<AppState>) -> Result<Json<Vec<FaqItem>>, ApiError> {
    state.store.load_faqs().map(Json).map_err(internal)
}

async fn add_faq(State(state): State<AppState>, headers: HeaderMap, Json(new): Json<NewFaq>) -> Result<Json<FaqItem>, ApiError> {
    authorize(&state, &headers)?;
    if new.question.trim().is_empty() || new.answer.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question and answer are required".into()));
    }
    let draft = FaqDraft { question: new.question.trim().to_string(), answer: new.answer, doc_id: new.doc_id };
    let mut translators = TranslatorCache::new();
    let item = enrich_faq(draft, &state.caps, &mut translators).await;
    let mut faqs = state.store.load_faqs().map_err(internal)?;
    faqs.insert(0, item.clone());
    state.store.save_faqs(&faqs).map_err(internal)?;
    state.store.flush().map_err(internal)?;
    Ok(Json(item))
}

async fn rebuild_index(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RebuildResponse>, ApiError> {
    authorize(&state, &headers)?;
    let report = state.index.rebuild(&state.store, &state.caps, &state.config).await.map_err(internal)?;
    Ok(Json(report.into()))
}

async fn preset_import(State(state): State<AppState>, headers: HeaderMap, body: String) -> Result<Json<RebuildResponse>, ApiError> {
    authorize(&state, &headers)?;
    let preset = Preset::from_json(&body).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    import_preset(&state.store, preset).map_err(internal)?;
    state.reload_persona().map_err(internal)?;
    let report = state.index.rebuild(&state.store, &state.caps, &state.config).await.map_err(internal)?;
    Ok(Json(report.into()))
}

async fn preset_export(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Preset>, ApiError> {
    authorize(&state, &headers)?;
    export_preset(&state.store).map(Json).map_err(internal)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(idle_secs: u64, max: usize) -> AppState {
        let store = Store::temporary().unwrap();
        AppState::new(store, Capabilities::offline(), PipelineConfig::default(), None)
            .unwrap()
            .with_session_limits(Duration::from_secs(idle_secs), max)
    }

    #[test]
    fn idle_sessions_are_forgotten() {
        let state = limited(60, 100);
        let t0 = Instant::now();
        let (a, _) = state.session_at(None, t0);
        let (same, _) = state.session_at(Some(a.clone()), t0 + Duration::from_secs(30));
        assert_eq!(same, a);

        // last used at 30s, so idle for 70s by now
        let (b, _) = state.session_at(None, t0 + Duration::from_secs(100));
        assert_eq!(state.sessions.lock().len(), 1);
        assert!(state.sessions.lock().contains_key(&b));

        let (fresh, _) = state.session_at(Some(a.clone()), t0 + Duration::from_secs(100));
        assert_ne!(fresh, a);
    }

    #[test]
    fn least_recently_used_session_is_evicted_when_full() {
        let state = limited(3600, 2);
        let t0 = Instant::now();
        let (a, _) = state.session_at(None, t0);
        let (b, _) = state.session_at(None, t0 + Duration::from_secs(1));
        state.session_at(Some(a.clone()), t0 + Duration::from_secs(2));

        let (c, _) = state.session_at(None, t0 + Duration::from_secs(3));
        let sessions = state.sessions.lock();
        assert_eq!(sessions.len(), 2);
        assert!(sessions.contains_key(&a));
        assert!(sessions.contains_key(&c));
        assert!(!sessions.contains_key(&b));
    }
}
