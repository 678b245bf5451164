//! Upload service lifecycle scenarios: initialize, status, complete, sweep.

mod common;

use bytes::Bytes;
use common::TestHarness;
use silo_core::api::InitUploadRequest;
use silo_core::{Digest, DigestAlgorithm, SessionStatus};
use silo_upload::UploadError;
use time::OffsetDateTime;

const BODY: &[u8] = b"HELLOWORLD!";

async fn upload_all(harness: &TestHarness, id: silo_core::SessionId) {
    for (index, payload) in [(2u64, "LD!"), (0, "HELL"), (1, "OWOR")] {
        harness
            .chunks
            .store_chunk(id, index, Bytes::from(payload))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn initialize_computes_geometry_and_expiry() {
    let harness = TestHarness::new().await;
    let session = harness.init_text(11, None).await;

    assert_eq!(session.chunk_size, 4);
    assert_eq!(session.total_chunks, 3);
    assert_eq!(session.status, "init");
    assert!(session.expires_at > session.created_at);
}

#[tokio::test]
async fn initialize_rejects_oversize_and_bad_type() {
    let harness = TestHarness::new().await;

    let oversize = InitUploadRequest {
        file_name: "big.bin".to_string(),
        file_size: harness.config.max_file_size + 1,
        file_type: "application/octet-stream".to_string(),
        checksum: None,
        metadata: None,
    };
    match harness.uploads.initialize(&oversize, None).await {
        Err(UploadError::Validation(msg)) => assert!(msg.contains("exceeds maximum")),
        other => panic!("expected Validation, got {other:?}"),
    }

    let bad_type = InitUploadRequest {
        file_name: "movie.txt".to_string(),
        file_size: 10,
        file_type: "video/mp4".to_string(),
        checksum: None,
        metadata: None,
    };
    assert!(harness.uploads.initialize(&bad_type, None).await.is_err());

    let bad_extension = InitUploadRequest {
        file_name: "movie.mp4".to_string(),
        file_size: 10,
        file_type: "text/plain".to_string(),
        checksum: None,
        metadata: None,
    };
    assert!(harness.uploads.initialize(&bad_extension, None).await.is_err());
}

#[tokio::test]
async fn validation_failures_aggregate() {
    let harness = TestHarness::new().await;

    // Bad type AND bad extension AND zero size: one error naming all three.
    let request = InitUploadRequest {
        file_name: "movie.mp4".to_string(),
        file_size: 0,
        file_type: "video/mp4".to_string(),
        checksum: None,
        metadata: None,
    };
    match harness.uploads.initialize(&request, None).await {
        Err(UploadError::Validation(msg)) => {
            assert!(msg.contains("extension"));
            assert!(msg.contains("video/mp4"));
            assert!(msg.contains("positive"));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn fresh_session_reports_all_chunks_missing() {
    let harness = TestHarness::new().await;
    let session = harness.init_text(11, None).await;

    let report = harness.uploads.status(session.id()).await.unwrap();
    assert_eq!(report.uploaded, 0);
    assert_eq!(report.missing, vec![0, 1, 2]);
}

#[tokio::test]
async fn status_tracks_progress() {
    let harness = TestHarness::new().await;
    let session = harness.init_text(11, None).await;
    let id = session.id();

    harness
        .chunks
        .store_chunk(id, 2, Bytes::from("LD!"))
        .await
        .unwrap();

    let report = harness.uploads.status(id).await.unwrap();
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.missing, vec![0, 1]);
    assert_eq!(report.session.status, "uploading");
}

#[tokio::test]
async fn happy_path_three_chunks_out_of_order() {
    let harness = TestHarness::new().await;
    let digest = Digest::compute(DigestAlgorithm::Sha256, BODY);
    let session = harness.init_text(11, Some(&digest.to_string())).await;
    let id = session.id();

    upload_all(&harness, id).await;

    let outcome = harness.uploads.complete(id).await.unwrap();
    assert_eq!(
        harness.storage.get(&outcome.final_path).await.unwrap(),
        Bytes::from(BODY)
    );
    assert_eq!(outcome.ai_job.status, "queued");
    assert!(outcome.ai_job.job_id.is_some());

    let reloaded = harness.sessions.load_uncached(id).await.unwrap();
    assert_eq!(reloaded.status, "completed");
    assert_eq!(reloaded.final_path.as_deref(), Some(outcome.final_path.as_str()));

    // Final object length matches the declared size.
    let meta = harness.storage.head(&outcome.final_path).await.unwrap();
    assert_eq!(meta.size, 11);
}

#[tokio::test]
async fn complete_with_gap_keeps_session_uploading() {
    let harness = TestHarness::new().await;
    let session = harness.init_text(11, None).await;
    let id = session.id();

    harness
        .chunks
        .store_chunk(id, 0, Bytes::from("HELL"))
        .await
        .unwrap();
    harness
        .chunks
        .store_chunk(id, 2, Bytes::from("LD!"))
        .await
        .unwrap();

    match harness.uploads.complete(id).await {
        Err(UploadError::MissingChunks(gaps)) => assert_eq!(gaps, vec![1]),
        other => panic!("expected MissingChunks, got {other:?}"),
    }

    // The assembling flip was rolled back; uploads can resume.
    let reloaded = harness.sessions.load_uncached(id).await.unwrap();
    assert_eq!(reloaded.status, "uploading");

    harness
        .chunks
        .store_chunk(id, 1, Bytes::from("OWOR"))
        .await
        .unwrap();
    harness.uploads.complete(id).await.unwrap();
}

#[tokio::test]
async fn digest_mismatch_fails_session() {
    let harness = TestHarness::new().await;
    let wrong = Digest::compute(DigestAlgorithm::Sha256, b"DIFFERENT BODY!");
    let session = harness.init_text(11, Some(&wrong.to_string())).await;
    let id = session.id();

    upload_all(&harness, id).await;

    match harness.uploads.complete(id).await {
        Err(UploadError::DigestMismatch { expected, actual }) => {
            assert_eq!(expected, wrong.to_string());
            assert_eq!(
                actual,
                Digest::compute(DigestAlgorithm::Sha256, BODY).to_string()
            );
        }
        other => panic!("expected DigestMismatch, got {other:?}"),
    }

    let reloaded = harness.sessions.load_uncached(id).await.unwrap();
    assert_eq!(reloaded.status, "failed");
    assert!(reloaded.final_path.is_none());
}

#[tokio::test]
async fn complete_refuses_sessions_not_uploading() {
    let harness = TestHarness::new().await;
    let session = harness.init_text(11, None).await;
    let id = session.id();

    // Still in init: nothing uploaded.
    match harness.uploads.complete(id).await {
        Err(UploadError::IllegalTransition { from, .. }) => assert_eq!(from, "init"),
        other => panic!("expected IllegalTransition, got {other:?}"),
    }
}

#[tokio::test]
async fn second_complete_after_success_conflicts() {
    let harness = TestHarness::new().await;
    let session = harness.init_text(11, None).await;
    let id = session.id();

    upload_all(&harness, id).await;
    harness.uploads.complete(id).await.unwrap();

    match harness.uploads.complete(id).await {
        Err(UploadError::IllegalTransition { from, .. }) => assert_eq!(from, "completed"),
        other => panic!("expected IllegalTransition, got {other:?}"),
    }
}

#[tokio::test]
async fn structural_check_rejects_broken_jsonl() {
    let harness = TestHarness::new().await;
    // "{\"a\":1}\n{bad}\n" is 14 bytes -> chunks of 4: 4,4,4,2
    let body = b"{\"a\":1}\n{bad}\n";
    let request = InitUploadRequest {
        file_name: "data.jsonl".to_string(),
        file_size: body.len() as u64,
        file_type: "application/jsonl".to_string(),
        checksum: None,
        metadata: None,
    };
    let session = harness.uploads.initialize(&request, None).await.unwrap();
    let id = session.id();

    for (index, chunk) in body.chunks(4).enumerate() {
        harness
            .chunks
            .store_chunk(id, index as u64, Bytes::copy_from_slice(chunk))
            .await
            .unwrap();
    }

    match harness.uploads.complete(id).await {
        Err(UploadError::Structural(msg)) => assert!(msg.contains("line 2")),
        other => panic!("expected Structural, got {other:?}"),
    }

    let reloaded = harness.sessions.load_uncached(id).await.unwrap();
    assert_eq!(reloaded.status, "failed");
}

#[tokio::test]
async fn structural_check_accepts_valid_json() {
    let harness = TestHarness::new().await;
    let body = br#"{"records":[1,2,3]}"#;
    let request = InitUploadRequest {
        file_name: "data.json".to_string(),
        file_size: body.len() as u64,
        file_type: "application/json".to_string(),
        checksum: None,
        metadata: None,
    };
    let session = harness.uploads.initialize(&request, None).await.unwrap();
    let id = session.id();

    for (index, chunk) in body.chunks(4).enumerate() {
        harness
            .chunks
            .store_chunk(id, index as u64, Bytes::copy_from_slice(chunk))
            .await
            .unwrap();
    }

    harness.uploads.complete(id).await.unwrap();
}

#[tokio::test]
async fn transition_enforces_state_machine() {
    let harness = TestHarness::new().await;
    let session = harness.init_text(11, None).await;
    let id = session.id();

    // init -> assembling is not an edge.
    match harness
        .uploads
        .transition(id, SessionStatus::Assembling, None)
        .await
    {
        Err(UploadError::IllegalTransition { from, to }) => {
            assert_eq!(from, "init");
            assert_eq!(to, "assembling");
        }
        other => panic!("expected IllegalTransition, got {other:?}"),
    }

    // init -> failed is.
    harness
        .uploads
        .transition(id, SessionStatus::Failed, None)
        .await
        .unwrap();
    let reloaded = harness.sessions.load_uncached(id).await.unwrap();
    assert_eq!(reloaded.status, "failed");
}

#[tokio::test]
async fn expiry_sweep_fails_and_cleans_expired_sessions() {
    let harness = TestHarness::new().await;
    let session = harness.init_text(11, None).await;
    let id = session.id();

    harness
        .chunks
        .store_chunk(id, 0, Bytes::from("HELL"))
        .await
        .unwrap();
    harness.backdate_expiry(id).await;

    let swept = harness
        .uploads
        .sweep_expired(OffsetDateTime::now_utc())
        .await
        .unwrap();
    assert_eq!(swept, 1);

    let reloaded = harness.sessions.load_uncached(id).await.unwrap();
    assert_eq!(reloaded.status, "failed");

    // Chunks are gone from both storage and index.
    let prefix = format!("temp-chunks/{id}");
    assert!(harness.storage.list(&prefix).await.unwrap().is_empty());
    assert_eq!(harness.metadata.count_chunks(*id.as_uuid()).await.unwrap(), 0);

    // Subsequent chunk uploads see a terminal session.
    match harness.chunks.store_chunk(id, 1, Bytes::from("OWOR")).await {
        Err(UploadError::SessionTerminal { status, .. }) => {
            assert_eq!(status, SessionStatus::Failed);
        }
        other => panic!("expected SessionTerminal, got {other:?}"),
    }

    // A second sweep finds nothing.
    let swept_again = harness
        .uploads
        .sweep_expired(OffsetDateTime::now_utc())
        .await
        .unwrap();
    assert_eq!(swept_again, 0);
}

#[tokio::test]
async fn concurrent_completes_have_one_winner() {
    let harness = TestHarness::new().await;
    let session = harness.init_text(11, None).await;
    let id = session.id();
    upload_all(&harness, id).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let uploads = harness.uploads.clone();
        tasks.push(tokio::spawn(async move { uploads.complete(id).await }));
    }

    let mut succeeded = 0;
    let mut conflicted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(UploadError::IllegalTransition { .. }) => conflicted += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(conflicted, 7);
}
