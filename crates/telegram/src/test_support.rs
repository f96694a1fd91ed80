//! In-process stand-in for the Bot API, shared by the crate's tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{StatusCode, Uri},
        response::{IntoResponse, Response},
        routing::any,
    },
    serde_json::{Value, json},
    tokio::sync::oneshot,
};

pub(crate) const TARGET: i64 = -1002222;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TelegramApiMethod {
    GetMe,
    GetFile,
    GetChat,
    GetUpdates,
    DeleteWebhook,
    SendMessage,
    SendPhoto,
    SendVideo,
    SendDocument,
    SendAnimation,
    SendAudio,
    SendVoice,
    SendVideoNote,
    FileDownload,
    Other(String),
}

impl TelegramApiMethod {
    fn from_path(path: &str) -> Self {
        if path.starts_with("/file/") {
            return Self::FileDownload;
        }
        let method = path.rsplit('/').next().unwrap_or_default();
        match method.to_ascii_lowercase().as_str() {
            "getme" => Self::GetMe,
            "getfile" => Self::GetFile,
            "getchat" => Self::GetChat,
            "getupdates" => Self::GetUpdates,
            "deletewebhook" => Self::DeleteWebhook,
            "sendmessage" => Self::SendMessage,
            "sendphoto" => Self::SendPhoto,
            "sendvideo" => Self::SendVideo,
            "senddocument" => Self::SendDocument,
            "sendanimation" => Self::SendAnimation,
            "sendaudio" => Self::SendAudio,
            "sendvoice" => Self::SendVoice,
            "sendvideonote" => Self::SendVideoNote,
            _ => Self::Other(method.to_string()),
        }
    }

    fn is_send(&self) -> bool {
        matches!(
            self,
            Self::SendMessage
                | Self::SendPhoto
                | Self::SendVideo
                | Self::SendDocument
                | Self::SendAnimation
                | Self::SendAudio
                | Self::SendVoice
                | Self::SendVideoNote
        )
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CapturedRequest {
    pub(crate) method: TelegramApiMethod,
    pub(crate) body: Vec<u8>,
}

impl CapturedRequest {
    pub(crate) fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub(crate) fn contains(&self, needle: &[u8]) -> bool {
        !needle.is_empty() && self.body.windows(needle.len()).any(|w| w == needle)
    }
}

#[derive(Clone)]
struct MockFile {
    bytes: Vec<u8>,
    report_size: bool,
}

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    files: Arc<Mutex<HashMap<String, MockFile>>>,
    failing: Arc<Mutex<HashMap<TelegramApiMethod, (StatusCode, &'static str)>>>,
    updates: Arc<Mutex<VecDeque<Value>>>,
}

pub(crate) struct MockTelegramApi {
    state: MockState,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockTelegramApi {
    pub(crate) async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new()
            .route("/{*path}", any(telegram_api_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock telegram api");
        });

        Self {
            state,
            addr,
            shutdown: Some(shutdown_tx),
        }
    }

    pub(crate) fn bot(&self) -> teloxide::Bot {
        let api_url = reqwest::Url::parse(&format!("http://{}/", self.addr)).expect("parse api url");
        teloxide::Bot::new("test-token").set_api_url(api_url)
    }

    pub(crate) fn add_file(&self, file_id: &str, bytes: Vec<u8>) {
        self.insert_file(file_id, bytes, true);
    }

    /// A file whose `getFile` response carries no size.
    pub(crate) fn add_unsized_file(&self, file_id: &str, bytes: Vec<u8>) {
        self.insert_file(file_id, bytes, false);
    }

    fn insert_file(&self, file_id: &str, bytes: Vec<u8>, report_size: bool) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), MockFile { bytes, report_size });
    }

    pub(crate) fn fail(&self, method: TelegramApiMethod) {
        self.state
            .failing
            .lock()
            .unwrap()
            .insert(method, (StatusCode::BAD_REQUEST, "Bad Request: chat not found"));
    }

    /// Answer `getUpdates` as if another instance were polling the same token.
    pub(crate) fn fail_with_conflict(&self) {
        self.state.failing.lock().unwrap().insert(
            TelegramApiMethod::GetUpdates,
            (
                StatusCode::CONFLICT,
                "Conflict: terminated by other getUpdates request; make sure that only one bot instance is running",
            ),
        );
    }

    /// Queue one `getUpdates` batch.
    pub(crate) fn push_updates(&self, batch: Value) {
        self.state.updates.lock().unwrap().push_back(batch);
    }

    pub(crate) fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, method: &TelegramApiMethod) -> usize {
        self.requests().iter().filter(|r| &r.method == method).count()
    }

    /// Outbound publish calls, in order.
    pub(crate) fn sends(&self) -> Vec<CapturedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method.is_send())
            .collect()
    }
}

impl Drop for MockTelegramApi {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn ok(result: Value) -> Response {
    Json(json!({ "ok": true, "result": result })).into_response()
}

fn api_error(status: StatusCode, description: &str) -> Response {
    (
        status,
        Json(json!({ "ok": false, "error_code": status.as_u16(), "description": description })),
    )
        .into_response()
}

fn field(body: &[u8], name: &str) -> Option<Value> {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get(name).cloned())
}

async fn telegram_api_handler(State(state): State<MockState>, uri: Uri, body: Bytes) -> Response {
    let method = TelegramApiMethod::from_path(uri.path());
    state.requests.lock().unwrap().push(CapturedRequest {
        method: method.clone(),
        body: body.to_vec(),
    });

    let failure = state.failing.lock().unwrap().get(&method).copied();
    if let Some((status, description)) = failure {
        return api_error(status, description);
    }

    match method {
        TelegramApiMethod::GetMe => ok(json!({
            "id": 1,
            "is_bot": true,
            "first_name": "Relay",
            "username": "relay_bot",
            "can_join_groups": false,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "can_connect_to_business": false,
            "has_main_web_app": false,
        })),
        TelegramApiMethod::GetFile => {
            let file_id = field(&body, "file_id")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let files = state.files.lock().unwrap();
            match files.get(&file_id) {
                Some(file) => {
                    let mut result = json!({
                        "file_id": file_id,
                        "file_unique_id": format!("u-{file_id}"),
                        "file_path": format!("files/{file_id}"),
                    });
                    if file.report_size {
                        result["file_size"] = json!(file.bytes.len());
                    }
                    ok(result)
                },
                None => api_error(StatusCode::BAD_REQUEST, "Bad Request: invalid file_id"),
            }
        },
        TelegramApiMethod::FileDownload => {
            let file_id = uri.path().rsplit('/').next().unwrap_or_default();
            match state.files.lock().unwrap().get(file_id) {
                Some(file) => file.bytes.clone().into_response(),
                None => StatusCode::NOT_FOUND.into_response(),
            }
        },
        TelegramApiMethod::GetChat => {
            let chat_id = field(&body, "chat_id").unwrap_or(json!(0));
            let title = if chat_id == json!(TARGET) {
                "Public"
            } else {
                "Private"
            };
            ok(json!({
                "id": chat_id,
                "type": "channel",
                "title": title,
                "accent_color_id": 0,
                "max_reaction_count": 0,
            }))
        },
        TelegramApiMethod::GetUpdates => {
            let batch = state.updates.lock().unwrap().pop_front();
            match batch {
                Some(batch) => ok(batch),
                None => {
                    // Stand in for the long-poll wait.
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    ok(json!([]))
                },
            }
        },
        ref m if m.is_send() => {
            let message_id = state.requests.lock().unwrap().len();
            ok(json!({
                "message_id": message_id,
                "date": 0,
                "chat": { "id": TARGET, "type": "channel", "title": "Public" },
                "text": "ok",
            }))
        },
        _ => ok(json!(true)),
    }
}
