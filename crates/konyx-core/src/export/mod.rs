//! Invoice export: progress subscription, start, download and reset.
//!
//! Progress arrives over a single SSE connection to `/export/progress`.
//! Each `data:` line holds one JSON event (see [`ExportEvent`]). The reader
//! task is owned by [`ExportSubscription`]; dropping the handle cancels it
//! and no state changes are published afterwards.

mod decode;
mod event;
mod session;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::StreamExt;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use event::{Change, ExportEvent, parse_event};
pub use session::{ConnectionState, ExportSession};

use self::decode::LossyUtf8;
use crate::api::{ApiClient, ApiError};

pub const PROGRESS_PATH: &str = "/export/progress";
pub const START_PATH: &str = "/export/start";
pub const RESET_PATH: &str = "/export/reset";
pub const DOWNLOAD_PATH: &str = "/export/download";

#[derive(Debug)]
pub enum ExportError {
    /// No finished export has produced a file yet
    NoFile,
    Api(ApiError),
    Io(String),
    /// Backend answered with an `error` field
    Rejected(String),
    Invalid(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::NoFile => write!(f, "no export file available to download"),
            ExportError::Api(err) => write!(f, "{err}"),
            ExportError::Io(message) | ExportError::Invalid(message) => write!(f, "{message}"),
            ExportError::Rejected(message) => write!(f, "export rejected: {message}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for ExportError {
    fn from(err: ApiError) -> Self {
        ExportError::Api(err)
    }
}

/// Form fields and input spreadsheets for `POST /export/start`.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub formato_import: String,
    pub formato_export: String,
    pub empresa: String,
    pub fecha_factura: String,
    pub proyecto: String,
    pub cuenta: String,
    pub usuario: String,
    pub sessions_file: PathBuf,
    pub contacts_file: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportStarted {
    pub status: Option<String>,
    pub file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StartResponse {
    status: Option<String>,
    file: Option<String>,
    error: Option<String>,
}

fn file_part(path: &Path) -> Result<Part, ExportError> {
    let bytes = fs::read(path)
        .map_err(|e| ExportError::Io(format!("Failed to read {}: {e}", path.display())))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Part::bytes(bytes).file_name(name))
}

/// Uploads the input files and kicks off an export.
///
/// # Errors
/// Returns an error if a file cannot be read, no token is held, the request
/// fails, or the backend rejects the export.
pub async fn start_export(
    client: &ApiClient,
    token: &str,
    request: &ExportRequest,
) -> Result<ExportStarted, ExportError> {
    let form = Form::new()
        .text("formatoImport", request.formato_import.clone())
        .text("formatoExport", request.formato_export.clone())
        .text("empresa", request.empresa.clone())
        .text("fechaFactura", request.fecha_factura.clone())
        .text("proyecto", request.proyecto.clone())
        .text("cuenta", request.cuenta.clone())
        .text("usuario", request.usuario.clone())
        .part("ficheroSesiones", file_part(&request.sessions_file)?)
        .part("ficheroContactos", file_part(&request.contacts_file)?);

    let builder = client.authed(Method::POST, START_PATH, token)?.multipart(form);
    let response: StartResponse = ApiClient::send_json(builder).await?;

    if let Some(error) = response.error {
        tracing::warn!("export rejected: {error}");
        return Err(ExportError::Rejected(error));
    }
    tracing::info!(file = ?response.file, "export started");
    Ok(ExportStarted {
        status: response.status,
        file: response.file,
    })
}

/// Downloads a produced export into `dest_dir`.
///
/// Only the final path component of `file` is used, both for the request
/// and for the local file name.
///
/// # Errors
/// Returns an error if `file` is not a plain file name, the request fails,
/// or the file cannot be written.
pub async fn download_file(
    client: &ApiClient,
    file: &str,
    dest_dir: &Path,
) -> Result<PathBuf, ExportError> {
    let name = Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| *n == file)
        .ok_or_else(|| ExportError::Invalid(format!("Invalid export file name: {file}")))?;

    let mut url = url::Url::parse(&client.url(DOWNLOAD_PATH))
        .map_err(|e| ExportError::Invalid(format!("Invalid download URL: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ExportError::Invalid("Backend URL cannot take a path".to_string()))?
        .push(name);

    let response = ApiClient::send(client.request_url(Method::GET, url.as_str())).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExportError::Api(crate::api::classify_reqwest_error(&e)))?;

    fs::create_dir_all(dest_dir)
        .map_err(|e| ExportError::Io(format!("Failed to create {}: {e}", dest_dir.display())))?;
    let dest = dest_dir.join(name);
    fs::write(&dest, &bytes)
        .map_err(|e| ExportError::Io(format!("Failed to write {}: {e}", dest.display())))?;

    tracing::info!(path = %dest.display(), bytes = bytes.len(), "export downloaded");
    Ok(dest)
}

/// Opens progress subscriptions for the export view.
#[derive(Debug, Clone)]
pub struct ExportSubscriber {
    client: ApiClient,
}

impl ExportSubscriber {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Opens the progress stream. Must be called inside a tokio runtime.
    pub fn mount(&self) -> ExportSubscription {
        let (tx, _) = watch::channel(ExportSession::default());
        let state = Arc::new(tx);
        let cancel = CancellationToken::new();

        let publisher = Publisher {
            state: Arc::clone(&state),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(run_stream(self.client.clone(), publisher));

        ExportSubscription {
            client: self.client.clone(),
            state,
            cancel,
            task: Some(task),
        }
    }
}

/// Reader-side handle that refuses to publish once cancelled.
struct Publisher {
    state: Arc<watch::Sender<ExportSession>>,
    cancel: CancellationToken,
}

impl Publisher {
    /// Runs `f` under the channel lock unless the subscription was closed.
    fn update(&self, f: impl FnOnce(&mut ExportSession)) {
        self.state.send_if_modified(|session| {
            if self.cancel.is_cancelled() {
                return false;
            }
            f(session);
            true
        });
    }

    fn fail(&self, reason: String) {
        self.update(|session| {
            if !session.finished {
                session.connection = ConnectionState::Failed(reason);
            }
        });
    }
}

async fn run_stream(client: ApiClient, publisher: Publisher) {
    let opened = tokio::select! {
        () = publisher.cancel.cancelled() => return,
        opened = ApiClient::send(client.stream_request(PROGRESS_PATH)) => opened,
    };
    let response = match opened {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(kind = %err.kind, "export progress stream failed to open: {err}");
            publisher.fail(err.to_string());
            return;
        }
    };
    publisher.update(|session| session.connection = ConnectionState::Open);

    let mut decoder = LossyUtf8::default();
    let mut events = response
        .bytes_stream()
        .map(move |chunk| chunk.map(|bytes| decoder.push(&bytes)))
        .eventsource();
    let mut parser_errors = 0u32;
    loop {
        let next = tokio::select! {
            () = publisher.cancel.cancelled() => return,
            next = events.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                parser_errors = 0;
                let parsed = parse_event(&event.data);
                let mut finished = false;
                publisher.update(|session| match parsed {
                    Some(event) => finished = session.apply(event),
                    None => session.record_dropped(),
                });
                if finished {
                    tracing::debug!("export finished, closing progress stream");
                    return;
                }
            }
            Some(Err(EventStreamError::Transport(err))) => {
                tracing::warn!("export progress stream error: {err}");
                publisher.fail(err.to_string());
                return;
            }
            Some(Err(err @ EventStreamError::Parser(_))) if parser_errors > 0 => {
                // the parser keeps its buffer on error, so a repeat means it is stuck
                tracing::warn!("export progress stream unreadable: {err}");
                publisher.fail(err.to_string());
                return;
            }
            Some(Err(err)) => {
                if matches!(err, EventStreamError::Parser(_)) {
                    parser_errors += 1;
                }
                tracing::debug!("dropping unreadable export event: {err}");
                publisher.update(ExportSession::record_dropped);
            }
            None => {
                tracing::warn!("export progress stream ended before completion");
                publisher.fail("stream closed before the export finished".to_string());
                return;
            }
        }
    }
}

/// A mounted export view. Dropping it closes the stream.
pub struct ExportSubscription {
    client: ApiClient,
    state: Arc<watch::Sender<ExportSession>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ExportSubscription {
    pub fn subscribe(&self) -> watch::Receiver<ExportSession> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ExportSession {
        self.state.borrow().clone()
    }

    /// Waits until the stream is no longer connecting or open.
    pub async fn settled(&self) -> ExportSession {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|session| !session.is_streaming()).await {
            Ok(session) => session.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Downloads the produced file into `dest_dir`.
    ///
    /// # Errors
    /// Returns `NoFile` until the export has finished with a file, or the
    /// download failure otherwise.
    pub async fn download(&self, dest_dir: &Path) -> Result<PathBuf, ExportError> {
        let file = self
            .snapshot()
            .download_target()
            .map(str::to_string)
            .ok_or(ExportError::NoFile)?;
        download_file(&self.client, &file, dest_dir).await
    }

    /// Asks the backend to reset, then clears local state and closes the stream.
    ///
    /// The backend call is best-effort. Nothing reopens until the next mount.
    pub async fn reset(&mut self) {
        if let Err(err) = reset_backend(&self.client).await {
            tracing::warn!("export reset request failed: {err}");
        }
        self.close();
        self.state.send_replace(ExportSession {
            connection: ConnectionState::Closed,
            ..ExportSession::default()
        });
    }

    /// Closes the stream and discards the handle.
    pub fn unmount(self) {}

    fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ExportSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// `POST /export/reset`
///
/// # Errors
/// Returns an error if the request fails.
pub async fn reset_backend(client: &ApiClient) -> Result<(), ApiError> {
    ApiClient::send(client.request(Method::POST, RESET_PATH)).await?;
    Ok(())
}
