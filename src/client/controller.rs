//! Client-side upload state machine.
//!
//! ```text
//! Idle --select(valid)--> Selected --auto--> Uploading --ok--> Completed
//!                                                  \--error--> Failed --retry--> Uploading
//! ```
//!
//! Selecting a valid file starts the upload straight away. Selecting again
//! from any state discards the previous progress and link.

use crate::client::transport::{ProgressFn, TransferError, UploadTransport};
use crate::services::links::share_url;
use crate::utils::validation::UploadValidator;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncReadExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Selected,
    Uploading,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Bytes),
}

/// A file picked for upload together with what the client knows about it.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub source: FileSource,
}

impl SelectedFile {
    pub fn from_bytes(name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    /// Reads size from the filesystem. Without an explicit `content_type` the
    /// type is sniffed from the file header.
    pub async fn from_path(
        path: impl Into<PathBuf>,
        content_type: Option<String>,
    ) -> std::io::Result<Self> {
        let path = path.into();
        let size = tokio::fs::metadata(&path).await?.len();

        let content_type = match content_type {
            Some(ct) => ct,
            None => {
                let mut header = Vec::with_capacity(8192);
                tokio::fs::File::open(&path)
                    .await?
                    .take(8192)
                    .read_to_end(&mut header)
                    .await?;
                infer::get(&header)
                    .map(|kind| kind.mime_type().to_string())
                    .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string())
            }
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed".to_string());

        Ok(Self {
            name,
            content_type,
            size,
            source: FileSource::Path(path),
        })
    }
}

pub trait ProgressSink: Send + Sync {
    /// Fraction of bytes sent, in `0.0..=1.0`
    fn progress(&self, fraction: f64);
}

pub trait ErrorSink: Send + Sync {
    fn error(&self, message: &str);
}

pub trait LinkSink: Send + Sync {
    fn link(&self, share_url: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn progress(&self, fraction: f64) {
        self(fraction)
    }
}

impl<F> ErrorSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn error(&self, message: &str) {
        self(message)
    }
}

impl<F> LinkSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn link(&self, share_url: &str) {
        self(share_url)
    }
}

/// Where the controller reports to. Sinks are called on the task driving the
/// controller and must not block.
#[derive(Clone)]
pub struct TransferSinks {
    pub progress: Arc<dyn ProgressSink>,
    pub error: Arc<dyn ErrorSink>,
    pub link: Arc<dyn LinkSink>,
}

#[derive(Debug, Clone)]
pub struct UploadSession {
    pub file: Option<SelectedFile>,
    pub transferred: u64,
    pub total: u64,
    pub state: TransferState,
    pub last_error: Option<String>,
    pub video_id: Option<String>,
    pub share_link: Option<String>,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self {
            file: None,
            transferred: 0,
            total: 0,
            state: TransferState::Idle,
            last_error: None,
            video_id: None,
            share_link: None,
        }
    }
}

/// Turns raw byte counts into a non-decreasing fraction stream.
struct ProgressTracker {
    total: u64,
    sent: AtomicU64,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressTracker {
    fn fraction(&self, sent: u64) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (sent.min(self.total) as f64) / (self.total as f64)
        }
    }

    fn report(&self, sent: u64) {
        let previous = self.sent.fetch_max(sent, Ordering::SeqCst);
        if sent > previous {
            self.sink.progress(self.fraction(sent));
        }
    }

    fn finish(&self) {
        let previous = self.sent.swap(self.total, Ordering::SeqCst);
        if self.fraction(previous) < 1.0 || previous == 0 {
            self.sink.progress(1.0);
        }
    }

    fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst).min(self.total)
    }
}

pub struct TransferController<T: UploadTransport> {
    transport: T,
    sinks: TransferSinks,
    validator: UploadValidator,
    origin: String,
    session: UploadSession,
}

impl<T: UploadTransport> TransferController<T> {
    /// `origin` is the scheme and authority share links are built against.
    pub fn new(
        transport: T,
        sinks: TransferSinks,
        validator: UploadValidator,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            sinks,
            validator,
            origin: origin.into(),
            session: UploadSession::default(),
        }
    }

    pub fn state(&self) -> TransferState {
        self.session.state
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    /// Checks `file` locally and, when it passes, uploads it immediately.
    ///
    /// A rejected file only reports the error; the session keeps whatever
    /// state and file it had.
    pub async fn select_file(&mut self, file: SelectedFile) -> TransferState {
        let size = usize::try_from(file.size).unwrap_or(usize::MAX);
        if let Err(e) = self.validator.validate(&file.content_type, size) {
            let message = e.to_string();
            tracing::warn!("Rejected {}: {}", file.name, message);
            self.sinks.error.error(&message);
            self.session.last_error = Some(message);
            return self.session.state;
        }

        tracing::info!(
            "Selected: {} ({:.2} MB)",
            file.name,
            file.size as f64 / (1024.0 * 1024.0)
        );

        self.session = UploadSession {
            total: file.size,
            file: Some(file),
            state: TransferState::Selected,
            ..UploadSession::default()
        };

        self.start_upload().await
    }

    /// Re-sends the selected file after a failure. No-op in other states.
    pub async fn retry(&mut self) -> TransferState {
        if self.session.state != TransferState::Failed || self.session.file.is_none() {
            return self.session.state;
        }
        self.start_upload().await
    }

    async fn start_upload(&mut self) -> TransferState {
        let Some(file) = self.session.file.clone() else {
            return self.session.state;
        };

        self.session.state = TransferState::Uploading;
        self.session.transferred = 0;
        self.session.last_error = None;
        self.session.video_id = None;
        self.session.share_link = None;

        let tracker = Arc::new(ProgressTracker {
            total: file.size,
            sent: AtomicU64::new(0),
            sink: self.sinks.progress.clone(),
        });
        self.sinks.progress.progress(0.0);

        let reporter = tracker.clone();
        let on_progress: ProgressFn = Arc::new(move |sent| reporter.report(sent));

        match self.transport.send(&file, on_progress).await {
            Ok(reply) => {
                tracker.finish();
                let link = share_url(&self.origin, &reply.video_id);
                tracing::info!("Upload complete: {}", link);

                self.session.transferred = file.size;
                self.session.state = TransferState::Completed;
                self.session.video_id = Some(reply.video_id);
                self.session.share_link = Some(link.clone());
                self.sinks.link.link(&link);
            }
            Err(e) => {
                let message = failure_message(&e);
                tracing::error!("Upload error: {}", e);

                self.session.transferred = tracker.sent();
                self.session.state = TransferState::Failed;
                self.session.last_error = Some(message.clone());
                self.sinks.error.error(&message);
            }
        }

        self.session.state
    }
}

fn failure_message(err: &TransferError) -> String {
    format!("Error uploading video: {}", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::UploadReply;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Reports progress in `steps` increments, then answers with `outcome`.
    struct ScriptedTransport {
        steps: u64,
        outcome: Mutex<Vec<Result<UploadReply, TransferError>>>,
        calls: AtomicU64,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Result<UploadReply, TransferError>>) -> Self {
            Self {
                steps: 4,
                outcome: Mutex::new(outcomes),
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl UploadTransport for ScriptedTransport {
        async fn send(
            &self,
            file: &SelectedFile,
            on_progress: ProgressFn,
        ) -> Result<UploadReply, TransferError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for step in 1..=self.steps {
                on_progress(file.size * step / self.steps);
                // a stale, smaller count must not move the bar backwards
                on_progress(file.size * step / self.steps / 2);
            }
            self.outcome.lock().unwrap().remove(0)
        }
    }

    fn reply(id: &str) -> Result<UploadReply, TransferError> {
        Ok(UploadReply {
            video_id: id.to_string(),
            url: format!("http://localhost:3000/videos/{}.mp4", id),
        })
    }

    #[derive(Default)]
    struct Recorded {
        progress: Mutex<Vec<f64>>,
        errors: Mutex<Vec<String>>,
        links: Mutex<Vec<String>>,
    }

    fn sinks(recorded: &Arc<Recorded>) -> TransferSinks {
        let p = recorded.clone();
        let e = recorded.clone();
        let l = recorded.clone();
        TransferSinks {
            progress: Arc::new(move |f: f64| p.progress.lock().unwrap().push(f)),
            error: Arc::new(move |m: &str| e.errors.lock().unwrap().push(m.to_string())),
            link: Arc::new(move |u: &str| l.links.lock().unwrap().push(u.to_string())),
        }
    }

    fn video(size: usize) -> SelectedFile {
        SelectedFile::from_bytes("clip.mp4", "video/mp4", Bytes::from(vec![1u8; size]))
    }

    fn controller(
        transport: ScriptedTransport,
        recorded: &Arc<Recorded>,
    ) -> TransferController<ScriptedTransport> {
        TransferController::new(
            transport,
            sinks(recorded),
            UploadValidator::new(1024 * 1024),
            "http://localhost:3000",
        )
    }

    #[tokio::test]
    async fn test_valid_selection_uploads_and_links() {
        let recorded = Arc::new(Recorded::default());
        let mut controller = controller(ScriptedTransport::new(vec![reply("lx1-ok")]), &recorded);

        assert_eq!(controller.state(), TransferState::Idle);
        let state = controller.select_file(video(1000)).await;

        assert_eq!(state, TransferState::Completed);
        assert_eq!(
            controller.session().share_link.as_deref(),
            Some("http://localhost:3000/share/lx1-ok")
        );
        assert_eq!(controller.session().transferred, 1000);
        assert_eq!(
            *recorded.links.lock().unwrap(),
            vec!["http://localhost:3000/share/lx1-ok".to_string()]
        );
        assert!(recorded.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_one() {
        let recorded = Arc::new(Recorded::default());
        let mut controller = controller(ScriptedTransport::new(vec![reply("lx1-ok")]), &recorded);
        controller.select_file(video(999)).await;

        let progress = recorded.progress.lock().unwrap().clone();
        assert!(progress.len() >= 2);
        assert_eq!(progress.first().copied(), Some(0.0));
        assert_eq!(progress.last().copied(), Some(1.0));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
        assert_eq!(progress.iter().filter(|f| **f == 1.0).count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_selection_keeps_state() {
        let recorded = Arc::new(Recorded::default());
        let transport = ScriptedTransport::new(vec![]);
        let mut controller = controller(transport, &recorded);

        let text = SelectedFile::from_bytes("notes.txt", "text/plain", Bytes::from_static(b"hi"));
        assert_eq!(controller.select_file(text).await, TransferState::Idle);

        let huge = SelectedFile {
            size: 2 * 1024 * 1024,
            ..video(1)
        };
        assert_eq!(controller.select_file(huge).await, TransferState::Idle);

        assert_eq!(
            *recorded.errors.lock().unwrap(),
            vec![
                "Please select a video file".to_string(),
                "File size must be less than 1MB".to_string()
            ]
        );
        assert!(controller.session().file.is_none());
        assert_eq!(controller.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_then_retry() {
        let recorded = Arc::new(Recorded::default());
        let transport = ScriptedTransport::new(vec![
            Err(TransferError::Rejected {
                status: 500,
                message: "Upload failed: bucket unavailable".to_string(),
            }),
            reply("lx1-retry"),
        ]);
        let mut controller = controller(transport, &recorded);

        assert_eq!(controller.select_file(video(64)).await, TransferState::Failed);
        assert_eq!(
            controller.session().last_error.as_deref(),
            Some("Error uploading video: Upload failed: bucket unavailable")
        );
        assert!(controller.session().file.is_some());
        assert!(controller.session().share_link.is_none());

        assert_eq!(controller.retry().await, TransferState::Completed);
        assert_eq!(controller.session().video_id.as_deref(), Some("lx1-retry"));
        assert!(controller.session().last_error.is_none());
        assert_eq!(controller.transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_is_noop_unless_failed() {
        let recorded = Arc::new(Recorded::default());
        let mut controller = controller(ScriptedTransport::new(vec![reply("a")]), &recorded);

        assert_eq!(controller.retry().await, TransferState::Idle);
        controller.select_file(video(10)).await;
        assert_eq!(controller.retry().await, TransferState::Completed);
        assert_eq!(controller.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reselection_resets_session() {
        let recorded = Arc::new(Recorded::default());
        let transport = ScriptedTransport::new(vec![reply("first"), reply("second")]);
        let mut controller = controller(transport, &recorded);

        controller.select_file(video(10)).await;
        assert_eq!(controller.session().video_id.as_deref(), Some("first"));

        let other = SelectedFile::from_bytes("other.webm", "video/webm", Bytes::from_static(b"webm"));
        controller.select_file(other).await;
        assert_eq!(controller.session().video_id.as_deref(), Some("second"));
        assert_eq!(controller.session().total, 4);
        assert_eq!(controller.session().file.as_ref().unwrap().name, "other.webm");
    }

    #[tokio::test]
    async fn test_empty_file_progress() {
        let recorded = Arc::new(Recorded::default());
        let mut controller = controller(ScriptedTransport::new(vec![reply("empty")]), &recorded);
        controller
            .select_file(SelectedFile::from_bytes("e.mp4", "video/mp4", Bytes::new()))
            .await;
        assert_eq!(recorded.progress.lock().unwrap().last().copied(), Some(1.0));
    }
}
