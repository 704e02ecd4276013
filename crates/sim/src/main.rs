//! Drives a post-processor with simulated hardware and prints what happened.
//!
//! Usage: `campost-sim [config.toml]`. `SIM_CAPTURES` sets the number of
//! simulated captures (default 8) and `SIM_REPROCESS` selects `jpeg` or
//! `private` to route them through the offline channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campost_core::{
    load_config,
    metrics::register_metrics,
    testing::{fixtures, MockBufferOwner, MockEncoder, MockOutputBuffers, MockReprocessProvider},
    Collaborators, PostprocConfig, Postprocessor, ReprocessConfig, ReprocessType,
};

/// Output slots owned by the simulated consumer.
const OUTPUT_SLOTS: u32 = 8;

const DEFAULT_CAPTURES: u32 = 8;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => PostprocConfig::default(),
    };
    let captures = match std::env::var("SIM_CAPTURES") {
        Ok(value) => value
            .parse::<u32>()
            .with_context(|| format!("Invalid SIM_CAPTURES value {:?}", value))?,
        Err(_) => DEFAULT_CAPTURES,
    };
    let reprocess_type = match std::env::var("SIM_REPROCESS").as_deref() {
        Ok("jpeg") => ReprocessType::Jpeg,
        Ok("private") => ReprocessType::Private,
        Ok("none") | Err(_) => ReprocessType::None,
        Ok(other) => bail!("Unknown reprocess mode {:?}", other),
    };

    let registry = Registry::new();
    register_metrics(&registry).context("Failed to register metrics")?;

    let encoder = MockEncoder::new();
    encoder.set_auto_complete(true).await;
    let provider = MockReprocessProvider::new();
    provider.channel().set_auto_complete(true).await;
    let outputs = MockOutputBuffers::new(OUTPUT_SLOTS);
    let camera = Arc::new(MockBufferOwner::new(1));

    let processor = Postprocessor::init(
        &config,
        Collaborators {
            encoder: Arc::new(encoder.clone()),
            reprocess: Some(Arc::new(provider.clone())),
            outputs: Arc::new(outputs.clone()),
        },
        0,
    )
    .await
    .context("Failed to initialize post-processor")?;

    let reprocess = reprocess_type.is_required().then(|| ReprocessConfig {
        reprocess_type,
        input: config.output_dimensions,
        output: config.output_dimensions,
        format: Default::default(),
    });
    processor.start(reprocess).await.context("Failed to start")?;

    info!("Submitting {} captures ({:?} reprocess)", captures, reprocess_type);
    for request_id in 0..captures {
        let settings = if request_id % 2 == 0 {
            fixtures::settings_with_gps(request_id, request_id % OUTPUT_SLOTS)
        } else {
            fixtures::settings(request_id, request_id % OUTPUT_SLOTS)
        };
        processor.submit_frame(camera.frame(0, request_id), Some(request_id))?;
        processor.submit_metadata(
            camera
                .metadata(request_id, fixtures::capture_metadata())
                .with_request_id(request_id),
        )?;
        processor.submit_settings(settings)?;
    }

    let status = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let status = processor.status().await?;
            if status.is_idle() && status.encoded + status.dropped >= u64::from(captures) {
                return Ok::<_, campost_core::PostprocError>(status);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .context("Timed out waiting for captures to finish")??;

    processor.stop().await.context("Failed to stop")?;
    processor.deinit().await.context("Failed to deinitialize")?;

    info!(
        "Encoded {}, dropped {}, {} buffers still lent",
        status.encoded,
        status.dropped,
        camera.outstanding()
    );
    println!("{}", serde_json::to_string_pretty(&status)?);
    println!("{}", serde_json::to_string_pretty(&outputs.delivered())?);

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    print!("{}", String::from_utf8(buffer)?);

    Ok(())
}
