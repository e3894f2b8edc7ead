use crate::config::{S3Settings, StorageKind, UploadConfig};
use crate::services::local_storage::LocalStorage;
use crate::services::storage::{S3Storage, StorageBackend};
use anyhow::{Context, Result, anyhow};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &UploadConfig) -> Result<Arc<dyn StorageBackend>> {
    match config.storage_backend {
        StorageKind::Local => {
            let storage = LocalStorage::new(&config.local_storage_dir)
                .await
                .with_context(|| {
                    format!(
                        "failed to prepare storage directory {}",
                        config.local_storage_dir.display()
                    )
                })?;
            info!(
                "💾 Local Storage: {}",
                config.local_storage_dir.display()
            );
            Ok(Arc::new(storage))
        }
        StorageKind::S3 => Ok(Arc::new(setup_s3(&config.s3).await?)),
    }
}

async fn setup_s3(settings: &S3Settings) -> Result<S3Storage> {
    let public_url = match (&settings.public_url, &settings.endpoint) {
        (Some(url), _) => url.clone(),
        (None, Some(endpoint)) => format!("{}/{}", endpoint.trim_end_matches('/'), settings.bucket),
        (None, None) => format!(
            "https://{}.s3.{}.amazonaws.com",
            settings.bucket, settings.region
        ),
    };

    info!(
        "☁️  S3 Storage: {} (Bucket: {})",
        settings.endpoint.as_deref().unwrap_or("aws"),
        settings.bucket
    );

    // Credentials come from the default provider chain, never from this crate
    let mut loader = aws_config::from_env().region(Region::new(settings.region.clone()));
    if let Some(endpoint) = &settings.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(settings.endpoint.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Ensure bucket exists
    match s3_client.head_bucket().bucket(&settings.bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", settings.bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", settings.bucket);
            s3_client
                .create_bucket()
                .bucket(&settings.bucket)
                .send()
                .await
                .map_err(|e| {
                    anyhow!(
                        "failed to create bucket '{}': {}",
                        settings.bucket,
                        e.into_service_error()
                    )
                })?;
            info!("✅ Bucket '{}' created successfully", settings.bucket);
        }
    }

    Ok(S3Storage::new(s3_client, settings.bucket.clone(), public_url))
}
