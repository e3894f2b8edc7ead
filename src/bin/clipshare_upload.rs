use clap::Parser;
use clipshare::client::{HttpTransport, SelectedFile, TransferController, TransferSinks, TransferState};
use clipshare::utils::validation::{MAX_FILE_SIZE, UploadValidator};
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload a video and print its share link", long_about = None)]
struct Args {
    /// Video file to upload
    path: PathBuf,

    /// Base URL of the clipshare server
    #[arg(short, long, default_value = "http://localhost:3000")]
    server: Url,

    /// Content type to send instead of sniffing it from the file
    #[arg(long)]
    content_type: Option<String>,

    /// Client-side size limit in bytes
    #[arg(long, default_value_t = MAX_FILE_SIZE)]
    max_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clipshare=info,clipshare_upload=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let file = SelectedFile::from_path(&args.path, args.content_type.clone()).await?;
    info!("📼 {} ({}, {} bytes)", file.name, file.content_type, file.size);

    let transport = HttpTransport::new(&args.server)?;
    info!("📤 Uploading to {}", transport.upload_url());

    // Log every 10%
    let last_decile = Arc::new(AtomicU8::new(0));
    let sinks = TransferSinks {
        progress: Arc::new(move |fraction: f64| {
            let decile = (fraction * 10.0).floor() as u8;
            if decile > last_decile.fetch_max(decile, Ordering::SeqCst) {
                info!("⏳ {:>3.0}%", fraction * 100.0);
            }
        }),
        error: Arc::new(|message: &str| error!("❌ {}", message)),
        link: Arc::new(|url: &str| println!("{}", url)),
    };

    let origin = args.server.origin().ascii_serialization();
    let mut controller = TransferController::new(
        transport,
        sinks,
        UploadValidator::new(args.max_size),
        origin,
    );

    match controller.select_file(file).await {
        TransferState::Completed => {
            info!("✅ Done");
            Ok(())
        }
        _ => std::process::exit(1),
    }
}
