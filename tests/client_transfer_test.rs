use bytes::Bytes;
use clipshare::client::{
    HttpTransport, SelectedFile, TransferController, TransferError, TransferSinks, TransferState,
    UploadTransport,
};
use clipshare::config::UploadConfig;
use clipshare::services::local_storage::LocalStorage;
use clipshare::utils::validation::UploadValidator;
use clipshare::{AppState, create_app};
use std::io::Write;
use std::sync::{Arc, Mutex};
use url::Url;

/// Serves the app on an ephemeral port and returns its base URL.
async fn spawn_server(config: UploadConfig) -> (tempfile::TempDir, Url) {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path()).await.unwrap();
    let config = UploadConfig {
        local_storage_dir: dir.path().to_path_buf(),
        ..config
    };
    let app = create_app(AppState::new(config, Arc::new(storage)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (dir, Url::parse(&format!("http://{}", addr)).unwrap())
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

#[tokio::test]
async fn test_file_upload_end_to_end() {
    let (dir, server) = spawn_server(UploadConfig::default()).await;

    let mut video = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    let data: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 253) as u8).collect();
    video.write_all(&data).unwrap();
    video.flush().unwrap();

    let file = SelectedFile::from_path(video.path(), Some("video/mp4".to_string()))
        .await
        .unwrap();
    assert_eq!(file.size, data.len() as u64);

    let recorded = Arc::new(Recorded::default());
    let origin = server.origin().ascii_serialization();
    let mut controller = TransferController::new(
        HttpTransport::new(&server).unwrap(),
        sinks(&recorded),
        UploadValidator::default(),
        origin.clone(),
    );

    let state = controller.select_file(file).await;
    assert_eq!(state, TransferState::Completed, "{:?}", recorded.errors.lock().unwrap());

    let id = controller.session().video_id.clone().unwrap();
    let link = format!("{}/share/{}", origin, id);
    assert_eq!(*recorded.links.lock().unwrap(), vec![link]);

    let progress = recorded.progress.lock().unwrap().clone();
    assert_eq!(progress.first().copied(), Some(0.0));
    assert_eq!(progress.last().copied(), Some(1.0));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    // 3 MiB in 64 KiB chunks
    assert!(progress.len() > 10);

    let stored = std::fs::read(dir.path().join(format!("{}.mp4", id))).unwrap();
    assert!(stored == data);
}

#[tokio::test]
async fn test_server_rejection_is_reported() {
    let config = UploadConfig {
        max_file_size: 1024 * 1024,
        ..UploadConfig::default()
    };
    let (_dir, server) = spawn_server(config).await;

    // A permissive client so the server makes the call
    let recorded = Arc::new(Recorded::default());
    let mut controller = TransferController::new(
        HttpTransport::new(&server).unwrap(),
        sinks(&recorded),
        UploadValidator::new(10 * 1024 * 1024),
        server.origin().ascii_serialization(),
    );

    let file = SelectedFile::from_bytes("big.mp4", "video/mp4", Bytes::from(vec![0u8; 2 * 1024 * 1024]));
    assert_eq!(controller.select_file(file).await, TransferState::Failed);

    assert_eq!(
        *recorded.errors.lock().unwrap(),
        vec!["Error uploading video: File size must be less than 1MB".to_string()]
    );
    assert!(recorded.links.lock().unwrap().is_empty());
    assert!(controller.session().file.is_some());
}

#[tokio::test]
async fn test_transport_error_variants() {
    let (_dir, server) = spawn_server(UploadConfig::default()).await;
    let transport = HttpTransport::new(&server).unwrap();

    let text = SelectedFile::from_bytes("notes.txt", "text/plain", Bytes::from_static(b"hello"));
    let err = transport.send(&text, Arc::new(|_: u64| {})).await.unwrap_err();
    match err {
        TransferError::Rejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Please select a video file");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Nothing listening on this port
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let closed = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    drop(listener);

    let transport = HttpTransport::new(&closed).unwrap();
    let video = SelectedFile::from_bytes("clip.mp4", "video/mp4", Bytes::from_static(b"data"));
    let err = transport.send(&video, Arc::new(|_: u64| {})).await.unwrap_err();
    assert!(matches!(err, TransferError::Network(_)), "{:?}", err);
}
