//! Request pairing and routing integration tests.
//!
//! These tests verify how requests move through the pipeline:
//! - Pairing frames with metadata and settings by request id or arrival order
//! - Dropping requests whose companions will never arrive
//! - The reprocess path and its failure handling
//! - Framework-supplied inputs
//! - One encode in flight at a time

mod common;

use common::{reprocess_config, TestHarness};

use campost_core::{
    buffer::Dimension,
    encoder::{EncodeOutput, EncodeStatus},
    job::EncodeSettings,
    testing::{fixtures, ChannelOp, EncoderOp, MockEncoder},
    PostprocError, ReprocessType,
};

async fn auto_harness() -> TestHarness {
    let encoder = MockEncoder::new();
    encoder.set_auto_complete(true).await;
    let harness = TestHarness::with_encoder(encoder).await;
    harness.processor.start(None).await.unwrap();
    harness
}

// =============================================================================
// Encode Tests
// =============================================================================

#[tokio::test]
async fn test_request_encoded_once() {
    let harness = TestHarness::new().await;
    harness.processor.start(None).await.unwrap();

    harness.capture(5, 1);
    let job_id = harness
        .wait_until(|s| s.in_flight.is_some())
        .await
        .in_flight
        .unwrap();
    harness
        .encoder
        .complete(job_id, EncodeStatus::Done { size: 1000 })
        .await;
    let status = harness.wait_until(|s| s.encoded == 1 && s.is_idle()).await;

    assert_eq!(status.dropped, 0);
    assert_eq!(
        harness.outputs.delivered(),
        vec![EncodeOutput {
            request_id: Some(5),
            job_id,
            output_index: 1,
            status: EncodeStatus::Done { size: 1000 },
        }]
    );
    assert_eq!(harness.camera.returned_frames(), vec![(0, vec![5])]);
    assert_eq!(harness.camera.returned_metadata(), vec![5]);
}

#[tokio::test]
async fn test_duplicate_completion_is_ignored() {
    let harness = TestHarness::new().await;
    harness.processor.start(None).await.unwrap();

    harness.capture(1, 0);
    let job_id = harness
        .wait_until(|s| s.in_flight.is_some())
        .await
        .in_flight
        .unwrap();
    harness.encoder.complete(job_id, EncodeStatus::Done { size: 1 }).await;
    harness.encoder.complete(job_id, EncodeStatus::Done { size: 1 }).await;

    let status = harness.wait_until(|s| s.is_idle()).await;
    assert_eq!(status.encoded, 1);
    assert_eq!(harness.outputs.delivered_count(), 1);
    assert_eq!(harness.camera.returned_count(), 2);
}

#[tokio::test]
async fn test_failed_encode_is_delivered_and_released() {
    let harness = TestHarness::new().await;
    harness.processor.start(None).await.unwrap();

    harness.capture(3, 2);
    let job_id = harness
        .wait_until(|s| s.in_flight.is_some())
        .await
        .in_flight
        .unwrap();
    harness.encoder.complete(job_id, EncodeStatus::Failed).await;
    harness.wait_until(|s| s.encoded == 1 && s.is_idle()).await;

    let delivered = harness.outputs.delivered();
    assert_eq!(delivered[0].status, EncodeStatus::Failed);
    assert_eq!(harness.camera.outstanding(), 0);
}

#[tokio::test]
async fn test_one_job_in_flight_at_a_time() {
    let harness = TestHarness::new().await;
    harness.processor.start(None).await.unwrap();

    for request_id in 1..=3 {
        harness.capture(request_id, request_id);
    }

    for expected in 1..=3u64 {
        let status = harness.wait_until(|s| s.in_flight.is_some()).await;
        assert_eq!(harness.encoder.started_jobs().await.len() as u64, expected);
        harness
            .encoder
            .complete(status.in_flight.unwrap(), EncodeStatus::Done { size: 1 })
            .await;
        harness.wait_until(|s| s.encoded == expected).await;
    }

    harness.wait_idle().await;
    assert_eq!(harness.encoder.max_in_flight().await, 1);
    assert_eq!(harness.camera.outstanding(), 0);
}

#[tokio::test]
async fn test_start_job_failure_drops_only_that_request() {
    let harness = auto_harness().await;
    harness
        .encoder
        .set_next_error(
            EncoderOp::StartJob,
            PostprocError::hardware_failure("start_job", "queue full"),
        )
        .await;

    harness.capture(1, 0);
    harness.capture(2, 1);
    let status = harness.wait_until(|s| s.encoded == 1 && s.is_idle()).await;

    assert_eq!(status.dropped, 1);
    assert_eq!(harness.outputs.delivered()[0].request_id, Some(2));
    assert_eq!(harness.camera.outstanding(), 0);
}

#[tokio::test]
async fn test_missing_output_buffer_drops_request() {
    let harness = auto_harness().await;

    harness.capture(1, common::OUTPUT_SLOTS + 5);
    let status = harness.wait_until(|s| s.dropped == 1 && s.is_idle()).await;

    assert_eq!(status.encoded, 0);
    assert!(harness.encoder.started_jobs().await.is_empty());
    assert_eq!(harness.camera.outstanding(), 0);
}

#[tokio::test]
async fn test_output_override_replaces_settings_slot() {
    let harness = auto_harness().await;

    harness
        .processor
        .submit_frame_with_output(harness.camera.frame(0, 7), Some(7), 3)
        .unwrap();
    harness
        .processor
        .submit_metadata(
            harness
                .camera
                .metadata(7, fixtures::capture_metadata())
                .with_request_id(7),
        )
        .unwrap();
    harness
        .processor
        .submit_settings(fixtures::settings(7, 0))
        .unwrap();
    harness.wait_until(|s| s.encoded == 1 && s.is_idle()).await;

    assert_eq!(harness.outputs.delivered()[0].output_index, 3);
}

#[tokio::test]
async fn test_encode_request_carries_tags_and_geometry() {
    let harness = auto_harness().await;

    harness.capture_with(4, fixtures::settings_with_gps(4, 0));
    harness.wait_until(|s| s.encoded == 1 && s.is_idle()).await;

    let jobs = harness.encoder.started_jobs().await;
    let request = &jobs[0].request;
    assert_eq!(request.params.main.src.dim, Dimension::new(640, 480));
    assert_eq!(request.params.main.dst, Dimension::new(4208, 3120));
    assert_eq!(
        request.params.thumbnail.as_ref().map(|t| t.dst),
        Some(Dimension::new(320, 240))
    );
    assert!(request.tags.get(exif::Tag::GPSLatitude).is_some());
    assert!(request.tags.get(exif::Tag::FocalLength).is_some());
    assert_eq!(request.metadata, Some(fixtures::capture_metadata()));
    assert_eq!(
        request.debug.three_a_version,
        fixtures::capture_metadata().three_a_version
    );
    assert!(request.debug.three_a_version.is_some());
}

// =============================================================================
// Pairing Tests
// =============================================================================

#[tokio::test]
async fn test_requests_without_ids_pair_in_arrival_order() {
    let harness = auto_harness().await;

    for index in 0..3 {
        harness
            .processor
            .submit_frame(harness.camera.frame(0, index), None)
            .unwrap();
    }
    for index in 0..3 {
        harness
            .processor
            .submit_metadata(harness.camera.metadata(index, fixtures::capture_metadata()))
            .unwrap();
        harness
            .processor
            .submit_settings(EncodeSettings::new(index))
            .unwrap();
    }
    harness.wait_until(|s| s.encoded == 3 && s.is_idle()).await;

    let slots: Vec<u32> = harness
        .outputs
        .delivered()
        .iter()
        .map(|o| o.output_index)
        .collect();
    assert_eq!(slots, vec![0, 1, 2]);
    assert_eq!(
        harness.camera.returned_frames(),
        vec![(0, vec![0]), (0, vec![1]), (0, vec![2])]
    );
    assert_eq!(harness.camera.returned_metadata(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_settings_arriving_first_pair_by_request_id() {
    let harness = auto_harness().await;

    harness.processor.submit_settings(fixtures::settings(8, 2)).unwrap();
    harness.processor.submit_settings(fixtures::settings(9, 3)).unwrap();
    for request_id in [8, 9] {
        harness
            .processor
            .submit_frame(harness.camera.frame(0, request_id), Some(request_id))
            .unwrap();
        harness
            .processor
            .submit_metadata(
                harness
                    .camera
                    .metadata(request_id, fixtures::capture_metadata())
                    .with_request_id(request_id),
            )
            .unwrap();
    }
    harness.wait_until(|s| s.encoded == 2 && s.is_idle()).await;

    let delivered: Vec<_> = harness
        .outputs
        .delivered()
        .iter()
        .map(|o| (o.request_id, o.output_index))
        .collect();
    assert_eq!(delivered, vec![(Some(8), 2), (Some(9), 3)]);
}

#[tokio::test]
async fn test_frame_without_metadata_is_dropped() {
    let harness = auto_harness().await;

    // Metadata and settings for request 2 show request 1 will never get its
    // metadata.
    harness.processor.submit_settings(fixtures::settings(1, 0)).unwrap();
    harness
        .processor
        .submit_frame(harness.camera.frame(0, 1), Some(1))
        .unwrap();
    harness.capture(2, 1);

    let status = harness.wait_until(|s| s.encoded == 1 && s.is_idle()).await;
    assert_eq!(status.dropped, 1);
    assert_eq!(harness.outputs.delivered()[0].request_id, Some(2));
    assert_eq!(harness.camera.outstanding(), 0);
}

#[tokio::test]
async fn test_frame_without_settings_is_dropped() {
    let harness = auto_harness().await;

    harness
        .processor
        .submit_frame(harness.camera.frame(0, 1), Some(1))
        .unwrap();
    harness
        .processor
        .submit_metadata(
            harness
                .camera
                .metadata(1, fixtures::capture_metadata())
                .with_request_id(1),
        )
        .unwrap();
    harness.capture(2, 1);

    let status = harness.wait_until(|s| s.encoded == 1 && s.is_idle()).await;
    assert_eq!(status.dropped, 1);
    assert_eq!(harness.camera.outstanding(), 0);
}

#[tokio::test]
async fn test_stale_metadata_is_released() {
    let harness = auto_harness().await;

    harness
        .processor
        .submit_metadata(
            harness
                .camera
                .metadata(1, fixtures::capture_metadata())
                .with_request_id(1),
        )
        .unwrap();
    harness.capture(2, 0);

    harness.wait_until(|s| s.encoded == 1 && s.is_idle()).await;
    let mut returned = harness.camera.returned_metadata();
    returned.sort_unstable();
    assert_eq!(returned, vec![1, 2]);
}

#[tokio::test]
async fn test_stale_settings_are_dropped() {
    let harness = auto_harness().await;

    harness
        .processor
        .submit_settings(fixtures::settings(4, 0))
        .unwrap();
    harness.capture(5, 1);
    harness.capture(6, 2);

    let status = harness.wait_until(|s| s.encoded == 2 && s.is_idle()).await;
    assert_eq!(status.queues.settings, 0);
    assert_eq!(status.dropped, 1);
    let slots: Vec<u32> = harness
        .outputs
        .delivered()
        .iter()
        .map(|o| o.output_index)
        .collect();
    assert_eq!(slots, vec![1, 2]);
    assert_eq!(harness.camera.outstanding(), 0);
}

#[tokio::test]
async fn test_stale_settings_are_dropped_when_framework_input_pairs() {
    let harness = auto_harness().await;

    harness
        .processor
        .submit_settings(fixtures::settings(4, 0))
        .unwrap();
    harness
        .processor
        .submit_framework_input(harness.framework_input(
            5,
            ReprocessType::None,
            Dimension::new(1920, 1080),
        ))
        .unwrap();
    harness.processor.submit_settings(fixtures::settings(5, 3)).unwrap();

    let status = harness.wait_until(|s| s.encoded == 1 && s.is_idle()).await;
    assert_eq!(status.queues.settings, 0);
    assert_eq!(status.dropped, 1);
    assert_eq!(harness.outputs.delivered()[0].output_index, 3);
}

// =============================================================================
// Reprocess Tests
// =============================================================================

#[tokio::test]
async fn test_reprocessed_frame_is_encoded() {
    let harness = auto_harness().await;
    harness.processor.stop().await.unwrap();
    let channel = harness.channel();
    channel.set_auto_complete(true).await;

    harness
        .processor
        .start(Some(reprocess_config(
            ReprocessType::Jpeg,
            Dimension::new(1280, 960),
        )))
        .await
        .unwrap();
    assert_eq!(channel.start_count().await, 1);

    harness.capture(4, 0);
    harness.wait_until(|s| s.encoded == 1 && s.is_idle()).await;

    let submitted = channel.submitted().await;
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].request_id, Some(4));

    let jobs = harness.encoder.started_jobs().await;
    assert_eq!(jobs[0].request.params.main.src.dim, Dimension::new(1280, 960));
    assert_eq!(harness.outputs.delivered()[0].request_id, Some(4));
    assert_eq!(harness.camera.outstanding(), 0);
    assert_eq!(channel.output_owner().outstanding(), 0);

    harness.processor.stop().await.unwrap();
    assert_eq!(channel.stop_count().await, 1);
    let status = harness.processor.status().await.unwrap();
    assert!(!status.reprocess_channel);
}

#[tokio::test]
async fn test_private_channel_starts_on_first_job() {
    let harness = TestHarness::new().await;
    let channel = harness.channel();

    harness
        .processor
        .start(Some(reprocess_config(
            ReprocessType::Private,
            Dimension::new(640, 480),
        )))
        .await
        .unwrap();
    assert_eq!(channel.start_count().await, 0);
    assert_eq!(harness.provider.channels_added().await.len(), 1);

    harness.capture(1, 0);
    harness.wait_until(|s| s.ongoing_reprocess == 1).await;
    assert_eq!(channel.start_count().await, 1);

    // Pending reprocess work is released by stop.
    harness.processor.stop().await.unwrap();
    assert_eq!(harness.camera.outstanding(), 0);
}

#[tokio::test]
async fn test_rejected_reprocess_releases_request() {
    let harness = auto_harness().await;
    harness.processor.stop().await.unwrap();
    let channel = harness.channel();
    channel
        .set_next_error(
            ChannelOp::Reprocess,
            PostprocError::hardware_failure("reprocess", "busy"),
        )
        .await;

    harness
        .processor
        .start(Some(reprocess_config(
            ReprocessType::Jpeg,
            Dimension::new(640, 480),
        )))
        .await
        .unwrap();
    harness.capture(1, 0);

    let status = harness.wait_until(|s| s.dropped == 1 && s.is_idle()).await;
    assert_eq!(status.encoded, 0);
    assert!(harness.encoder.started_jobs().await.is_empty());
    assert_eq!(harness.camera.outstanding(), 0);
}

#[tokio::test]
async fn test_flush_releases_ongoing_reprocess() {
    let harness = TestHarness::new().await;
    let channel = harness.channel();
    harness
        .processor
        .start(Some(reprocess_config(
            ReprocessType::Jpeg,
            Dimension::new(640, 480),
        )))
        .await
        .unwrap();

    harness.capture(1, 0);
    harness.wait_until(|s| s.ongoing_reprocess == 1).await;
    harness.processor.flush().await.unwrap();

    assert_eq!(harness.camera.outstanding(), 0);
    assert_eq!(channel.unmap_count().await, 1);

    // The channel finishing the dropped pass afterwards is harmless.
    assert!(channel.complete(1).await);
    let status = harness.wait_idle().await;
    assert_eq!(status.encoded, 0);
    assert_eq!(channel.output_owner().outstanding(), 0);
}

// =============================================================================
// Framework Input Tests
// =============================================================================

#[tokio::test]
async fn test_framework_input_encoded_directly() {
    let harness = auto_harness().await;

    harness
        .processor
        .submit_framework_input(harness.framework_input(
            9,
            ReprocessType::None,
            Dimension::new(1920, 1080),
        ))
        .unwrap();
    harness.processor.submit_settings(fixtures::settings(9, 3)).unwrap();
    harness.wait_until(|s| s.encoded == 1 && s.is_idle()).await;

    let delivered = harness.outputs.delivered();
    assert_eq!(delivered[0].request_id, Some(9));
    assert_eq!(delivered[0].output_index, 3);
    let jobs = harness.encoder.started_jobs().await;
    assert_eq!(jobs[0].request.params.main.dst, Dimension::new(1920, 1080));
    assert_eq!(harness.camera.returned_frames(), vec![(1, vec![9])]);
}

#[tokio::test]
async fn test_framework_input_needing_reprocess_without_channel_is_dropped() {
    let harness = auto_harness().await;

    harness
        .processor
        .submit_framework_input(harness.framework_input(
            2,
            ReprocessType::Jpeg,
            Dimension::new(640, 480),
        ))
        .unwrap();
    harness.processor.submit_settings(fixtures::settings(2, 0)).unwrap();

    let status = harness.wait_until(|s| s.dropped == 1 && s.is_idle()).await;
    assert_eq!(status.encoded, 0);
    assert_eq!(harness.camera.outstanding(), 0);
}

#[tokio::test]
async fn test_framework_input_without_settings_is_dropped() {
    let harness = auto_harness().await;

    harness
        .processor
        .submit_framework_input(harness.framework_input(
            1,
            ReprocessType::None,
            Dimension::new(640, 480),
        ))
        .unwrap();
    harness.processor.submit_settings(fixtures::settings(2, 0)).unwrap();

    let status = harness.wait_until(|s| s.dropped == 1).await;
    assert_eq!(status.queues.framework, 0);
    assert_eq!(harness.camera.outstanding(), 0);
}
