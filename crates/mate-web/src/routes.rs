use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use mate_agent::next_id;
use mate_core::{TaskFilter, DEFAULT_PRIORITY};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::markup::{page_shell, silent_stream_fragment, stream_fragment};
use crate::relay::run_relay;
use crate::state::AppState;

pub const THREAD_COOKIE: &str = "taskmate_thread";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/send", post(send_message))
        .route("/stream", get(stream_turn))
        .route("/submit_task_form", post(submit_task_form))
        .route("/reset", post(reset_thread))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SendForm {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct TaskForm {
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    priority: String,
    #[serde(default)]
    due_date: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    notes: String,
}

/// The stream route also receives an `rid` cache-buster from the page
/// script; it is deliberately not modelled here.
#[derive(Debug, Deserialize)]
struct StreamQuery {
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    q: Option<String>,
}

async fn index(headers: HeaderMap) -> impl IntoResponse {
    let (_, cookie_headers) = ensure_thread_cookie(&headers);
    (cookie_headers, Html(page_shell()))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let tasks = state.store.list(&TaskFilter::default()).await.len();
    Json(serde_json::json!({ "ok": true, "tasks": tasks }))
}

async fn send_message(headers: HeaderMap, Form(form): Form<SendForm>) -> Response {
    let message = form.message.trim().to_string();
    if message.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    let (thread_id, cookie_headers) = ensure_thread_cookie(&headers);
    (cookie_headers, Html(stream_fragment(&thread_id, &message))).into_response()
}

async fn stream_turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let thread_id = query
        .thread_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| thread_id_from_headers(&headers))
        .unwrap_or_else(|| next_id("thread"));
    let user_text = query.q.unwrap_or_default();

    let (updates_tx, updates_rx) = mpsc::channel(32);
    let (events_tx, events_rx) = mpsc::channel(32);

    let driver = Arc::clone(&state.driver);
    let driver_thread = thread_id.clone();
    tokio::spawn(async move {
        driver.run_turn(&driver_thread, &user_text, updates_tx).await;
    });
    tokio::spawn(async move {
        run_relay(updates_rx, events_tx, &thread_id).await;
    });

    let stream = ReceiverStream::new(events_rx).map(|event| {
        Ok::<SseEvent, Infallible>(
            SseEvent::default()
                .event(event.name())
                .data(sanitize_sse_payload(event.payload())),
        )
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(10))
            .text("keepalive"),
    )
}

async fn submit_task_form(headers: HeaderMap, Form(form): Form<TaskForm>) -> Response {
    if form.description.trim().is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    let form_thread = form.thread_id.trim();
    let (thread_id, cookie_headers) = if form_thread.is_empty() {
        ensure_thread_cookie(&headers)
    } else {
        (form_thread.to_string(), HeaderMap::new())
    };
    let command = build_add_task_command(&form);
    (
        cookie_headers,
        Html(silent_stream_fragment(&thread_id, &command)),
    )
        .into_response()
}

async fn reset_thread() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    if let Ok(value) =
        HeaderValue::from_str(&format!("{THREAD_COOKIE}=; Path=/; HttpOnly; Max-Age=0"))
    {
        headers.insert(header::SET_COOKIE, value);
    }
    (headers, Html(String::new()))
}

/// Turns a form submission into the command the reference driver executes,
/// so a form entry and a typed command take the same path through the store.
fn build_add_task_command(form: &TaskForm) -> String {
    let mut task = serde_json::Map::new();
    task.insert("id".to_string(), Value::String(next_id("task")));
    task.insert(
        "description".to_string(),
        Value::String(form.description.trim().to_string()),
    );
    let priority = form
        .priority
        .trim()
        .parse::<i64>()
        .unwrap_or(i64::from(DEFAULT_PRIORITY));
    task.insert("priority".to_string(), Value::from(priority));
    task.insert("status".to_string(), Value::String("todo".to_string()));
    let due = form.due_date.trim();
    if !due.is_empty() {
        task.insert("due_date".to_string(), Value::String(due.to_string()));
    }
    let tags: Vec<Value> = form
        .tags
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(|tag| Value::String(tag.to_string()))
        .collect();
    if !tags.is_empty() {
        task.insert("tags".to_string(), Value::Array(tags));
    }
    let notes = form.notes.trim();
    if !notes.is_empty() {
        task.insert("notes".to_string(), Value::String(notes.to_string()));
    }

    let mut args = serde_json::Map::new();
    args.insert("task".to_string(), Value::Object(task));
    format!("add_task {}", Value::Object(args))
}

fn thread_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == THREAD_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Resolves the thread id from the cookie, minting one (and the matching
/// `Set-Cookie` header) when absent.
fn ensure_thread_cookie(headers: &HeaderMap) -> (String, HeaderMap) {
    let mut response_headers = HeaderMap::new();
    match thread_id_from_headers(headers) {
        Some(thread_id) => (thread_id, response_headers),
        None => {
            let thread_id = next_id("thread");
            if let Ok(value) = HeaderValue::from_str(&format!(
                "{THREAD_COOKIE}={thread_id}; Path=/; HttpOnly; SameSite=Lax"
            )) {
                response_headers.insert(header::SET_COOKIE, value);
            }
            (thread_id, response_headers)
        }
    }
}

/// `data:` framing cannot carry carriage returns; everything else is split
/// into one `data:` line per embedded newline by the SSE encoder.
fn sanitize_sse_payload(payload: &str) -> String {
    payload.replace('\r', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use mate_agent::{MemoryCheckpointer, SupervisorDriver, ToolRegistry};
    use mate_store::TaskStore;
    use tower::ServiceExt;

    fn mk_state() -> AppState {
        let store = TaskStore::in_memory();
        let registry = ToolRegistry::new(store.clone());
        let driver = SupervisorDriver::new(registry, Arc::new(MemoryCheckpointer::new()));
        AppState::new(store, Arc::new(driver))
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    #[test]
    fn cookie_header_parsing_finds_the_thread_id() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("a=b; taskmate_thread=thread-9; c=d"),
        );
        assert_eq!(
            thread_id_from_headers(&headers),
            Some("thread-9".to_string())
        );

        let empty = HeaderMap::new();
        assert_eq!(thread_id_from_headers(&empty), None);
    }

    #[test]
    fn add_task_command_includes_only_populated_fields() {
        let command = build_add_task_command(&TaskForm {
            description: " Ship the release ".to_string(),
            priority: "2".to_string(),
            due_date: "2026-09-01".to_string(),
            tags: "work, urgent, ".to_string(),
            ..TaskForm::default()
        });

        let payload: Value = serde_json::from_str(
            command.strip_prefix("add_task ").expect("command prefix"),
        )
        .expect("json args");
        let task = &payload["task"];
        assert!(task["id"].as_str().expect("id").starts_with("task-"));
        assert_eq!(task["description"], "Ship the release");
        assert_eq!(task["priority"], 2);
        assert_eq!(task["status"], "todo");
        assert_eq!(task["due_date"], "2026-09-01");
        assert_eq!(task["tags"], serde_json::json!(["work", "urgent"]));
        assert!(task.get("notes").is_none());
    }

    #[test]
    fn add_task_command_defaults_priority_and_omits_empty_optionals() {
        let command = build_add_task_command(&TaskForm {
            description: "Buy milk".to_string(),
            priority: "not a number".to_string(),
            ..TaskForm::default()
        });
        let payload: Value = serde_json::from_str(
            command.strip_prefix("add_task ").expect("command prefix"),
        )
        .expect("json args");
        let task = &payload["task"];
        assert_eq!(task["priority"], 3);
        assert!(task.get("due_date").is_none());
        assert!(task.get("tags").is_none());
    }

    #[tokio::test]
    async fn index_assigns_a_thread_cookie_once() {
        let response = router(mk_state())
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("cookie assigned")
            .to_str()
            .expect("ascii cookie");
        assert!(cookie.starts_with("taskmate_thread=thread-"));
        assert!(body_text(response).await.contains("id=\"composer\""));

        let response = router(mk_state())
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::COOKIE, "taskmate_thread=thread-abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn health_reports_task_count() {
        let state = mk_state();
        state
            .store
            .upsert(mate_core::Task::new("t1", "Buy milk"))
            .await;
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body["ok"], true);
        assert_eq!(body["tasks"], 1);
    }

    #[tokio::test]
    async fn empty_message_returns_no_content() {
        let response = router(mk_state())
            .oneshot(form_request("/send", "message=", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn send_returns_bubble_and_stream_hookup() {
        let response = router(mk_state())
            .oneshot(form_request(
                "/send",
                "message=buy+milk",
                Some("taskmate_thread=thread-abc"),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = body_text(response).await;
        assert!(body.contains("<div class=\"message user\">buy milk</div>"));
        assert!(body.contains("data-thread-id=\"thread-abc\""));
        assert!(body.contains("data-q=\"buy milk\""));
    }

    #[tokio::test]
    async fn submit_task_form_returns_silent_hookup() {
        let response = router(mk_state())
            .oneshot(form_request(
                "/submit_task_form",
                "thread_id=thread-abc&description=Ship+it&priority=2",
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("data-silent=\"1\""));
        assert!(body.contains("add_task {&quot;task&quot;"));
        assert!(!body.contains("message user"));
    }

    #[tokio::test]
    async fn submit_task_form_without_title_is_no_content() {
        let response = router(mk_state())
            .oneshot(form_request("/submit_task_form", "description=", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn reset_expires_the_thread_cookie() {
        let response = router(mk_state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/reset")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("expiry cookie")
            .to_str()
            .expect("ascii cookie");
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn stream_runs_a_whole_turn_to_the_final_event() {
        let response = router(mk_state())
            .oneshot(
                Request::builder()
                    .uri("/stream?thread_id=web-test&q=get_tasks&rid=1")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .expect("content type")
            .to_str()
            .expect("ascii")
            .starts_with("text/event-stream"));

        let body = body_text(response).await;
        assert!(body.contains("event: status"));
        assert!(body.contains("data: Queued…"));
        assert!(body.contains("event: final"));
        assert!(body.contains("No tasks have been processed yet."));
    }

    #[test]
    fn sse_payloads_drop_carriage_returns() {
        assert_eq!(sanitize_sse_payload("a\r\nb\r"), "a\nb");
    }
}
