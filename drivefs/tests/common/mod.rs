//! In-process mock of the drive API: ranged downloads under `/files/{id}` and
//! chunked upload sessions under `/Drive/Item/{id}:upload` and `/uploads/{id}`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_RANGE, LOCATION, RANGE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use drivefs::{Config, DriveClient, NodeMeta};
use serde::Deserialize;

#[derive(Debug)]
struct UploadSession {
    target: String,
    filename: String,
    overwrite: bool,
    data: Vec<u8>,
}

#[derive(Deserialize)]
struct OpenUpload {
    filename: String,
    overwrite: bool,
}

#[derive(Default)]
pub struct MockDrive {
    base_url: Mutex<String>,
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
    sessions: Mutex<HashMap<String, UploadSession>>,
    range_headers: Mutex<Vec<Option<String>>>,
    pub patches: AtomicUsize,
    pub completions: AtomicUsize,
    pub ignore_range: AtomicBool,
    pub fail_completions: AtomicUsize,
    pub fail_patches: AtomicUsize,
}

impl MockDrive {
    pub fn base_url(&self) -> String {
        self.base_url.lock().unwrap().clone()
    }

    pub fn file_url(&self, id: &str) -> String {
        format!("{}/files/{}", self.base_url(), id)
    }

    /// Store an object and return the metadata a listing would report for it.
    pub fn put_object(&self, id: &str, name: &str, data: Vec<u8>) -> NodeMeta {
        let size = data.len() as i64;
        self.objects
            .lock()
            .unwrap()
            .insert(id.to_string(), (name.to_string(), data));
        NodeMeta::file(id, name, size).with_url(self.file_url(id))
    }

    pub fn object(&self, id: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(id).map(|(_, data)| data.clone())
    }

    pub fn object_named(&self, name: &str) -> Option<(String, Vec<u8>)> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(_, (n, _))| n == name)
            .map(|(id, (_, data))| (id.clone(), data.clone()))
    }

    /// `Range` header of every download request, in order.
    pub fn range_headers(&self) -> Vec<Option<String>> {
        self.range_headers.lock().unwrap().clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn meta_for(&self, id: &str, name: &str, size: usize) -> NodeMeta {
        NodeMeta::file(id, name, size as i64).with_url(self.file_url(id))
    }
}

pub async fn spawn_drive() -> Arc<MockDrive> {
    let drive = Arc::new(MockDrive::default());
    let app = Router::new()
        .route("/files/{id}", get(get_file_handler))
        .route("/Drive/Item/{item}", post(open_upload_handler))
        .route(
            "/uploads/{session_id}",
            axum::routing::patch(patch_upload_handler).put(put_upload_handler),
        )
        .with_state(drive.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    *drive.base_url.lock().unwrap() = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    drive
}

pub fn config_for(drive: &MockDrive, upload_chunk_size: usize) -> Config {
    Config {
        api_endpoint: drive.base_url(),
        upload_chunk_size,
        ..Default::default()
    }
}

pub fn client_for(drive: &MockDrive, upload_chunk_size: usize) -> DriveClient {
    DriveClient::connect(config_for(drive, upload_chunk_size)).unwrap()
}

pub fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn range_start(value: &str) -> Option<usize> {
    value
        .strip_prefix("bytes=")?
        .strip_suffix('-')?
        .parse()
        .ok()
}

/// GET /files/<id>
async fn get_file_handler(
    State(drive): State<Arc<MockDrive>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range = headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    drive.range_headers.lock().unwrap().push(range.clone());

    let Some(data) = drive.object(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if drive.ignore_range.load(Ordering::SeqCst) {
        return (StatusCode::OK, data).into_response();
    }

    match range.as_deref().map(range_start) {
        None => (StatusCode::OK, data).into_response(),
        Some(Some(start)) if start < data.len() => Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(
                CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, data.len() - 1, data.len()),
            )
            .body(Body::from(data[start..].to_vec()))
            .unwrap(),
        Some(_) => StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
    }
}

/// POST /Drive/Item/<id>:upload
async fn open_upload_handler(
    State(drive): State<Arc<MockDrive>>,
    Path(item): Path<String>,
    axum::Json(req): axum::Json<OpenUpload>,
) -> Response {
    let Some(target) = item.strip_suffix(":upload") else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let session_id = uuid::Uuid::new_v4().to_string();
    drive.sessions.lock().unwrap().insert(
        session_id.clone(),
        UploadSession {
            target: target.to_string(),
            filename: req.filename,
            overwrite: req.overwrite,
            data: Vec::new(),
        },
    );
    Response::builder()
        .status(StatusCode::ACCEPTED)
        .header(LOCATION, format!("/uploads/{session_id}"))
        .body(Body::empty())
        .unwrap()
}

fn content_range_start(headers: &HeaderMap) -> Option<usize> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let (start, _end) = value.split_once('-')?;
    start.parse().ok()
}

fn append_chunk(session: &mut UploadSession, headers: &HeaderMap, body: &Bytes) -> Result<(), StatusCode> {
    if body.is_empty() {
        return Ok(());
    }
    match content_range_start(headers) {
        Some(start) if start == session.data.len() => {
            session.data.extend_from_slice(body);
            Ok(())
        }
        Some(_) => Err(StatusCode::RANGE_NOT_SATISFIABLE),
        None => Err(StatusCode::BAD_REQUEST),
    }
}

/// Consume one injected failure, if any are left.
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// PATCH /uploads/<session_id>
async fn patch_upload_handler(
    State(drive): State<Arc<MockDrive>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if take_failure(&drive.fail_patches) {
        return StatusCode::BAD_GATEWAY.into_response();
    }
    let mut sessions = drive.sessions.lock().unwrap();
    let Some(session) = sessions.get_mut(&session_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Err(status) = append_chunk(session, &headers, &body) {
        return status.into_response();
    }
    drive.patches.fetch_add(1, Ordering::SeqCst);
    StatusCode::ACCEPTED.into_response()
}

/// PUT /uploads/<session_id>
async fn put_upload_handler(
    State(drive): State<Arc<MockDrive>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if take_failure(&drive.fail_completions) {
        return StatusCode::BAD_GATEWAY.into_response();
    }

    let session = {
        let mut sessions = drive.sessions.lock().unwrap();
        let Some(mut session) = sessions.remove(&session_id) else {
            return StatusCode::NOT_FOUND.into_response();
        };
        if let Err(status) = append_chunk(&mut session, &headers, &body) {
            sessions.insert(session_id, session);
            return status.into_response();
        }
        session
    };

    let id = if session.overwrite {
        session.target.clone()
    } else {
        uuid::Uuid::new_v4().to_string()
    };
    let meta = drive.meta_for(&id, &session.filename, session.data.len());
    drive
        .objects
        .lock()
        .unwrap()
        .insert(id, (session.filename, session.data));
    drive.completions.fetch_add(1, Ordering::SeqCst);
    (StatusCode::CREATED, axum::Json(meta)).into_response()
}
