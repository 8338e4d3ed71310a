mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use b2_pipeline::{
    content_sha1, test_utils::MockB2Server, AuthSession, B2Error, B2UploadPipeline, Credentials,
    ProgressCallback, UploadProgress, UploadRequest, UploadTicket, INFO_AUTHOR,
};
use common::*;

// Happy path tests

#[tokio::test]
async fn test_upload_jpeg_end_to_end() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let bytes = jpeg_bytes();
    let outcome = pipeline
        .run(
            UploadRequest::new(bytes.clone(), "holiday.jpg").with_mime_type("image/jpeg"),
            None,
        )
        .await
        .expect("upload should succeed");

    assert!(outcome.success);
    assert!(outcome.error.is_none());

    let stored_file_name = outcome.stored_file_name.expect("stored name");
    assert_stored_name(&stored_file_name, "jpg");
    assert_eq!(
        outcome.public_url.as_deref(),
        Some(format!("{}/file/photos/{stored_file_name}", mock.base_url()).as_str())
    );

    let uploads = mock.uploads();
    assert_eq!(uploads.len(), 1);
    let upload = &uploads[0];
    assert_eq!(upload.bucket_id, "bucket-photos");
    assert_eq!(upload.file_name, stored_file_name);
    assert_eq!(upload.content_type, "image/jpeg");
    assert_eq!(upload.content_length, Some(10));
    assert_eq!(upload.content_sha1, content_sha1(&bytes));
    assert_eq!(upload.info_author.as_deref(), Some(INFO_AUTHOR));
    assert_eq!(upload.authorization, "upload-token-1");
    assert_eq!(&upload.body[..], &bytes[..]);

    let calls = mock.calls();
    assert_eq!(calls.authorize, 1);
    assert_eq!(calls.list_buckets, 1);
    assert_eq!(calls.get_upload_url, 1);
    assert_eq!(calls.upload, 1);
}

#[tokio::test]
async fn test_steps_can_be_driven_individually() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("documents"));

    let session = pipeline.authenticate().await.expect("authenticate");
    assert_eq!(session.api_url, mock.base_url());
    assert_eq!(session.download_url, mock.base_url());

    let bucket = pipeline
        .resolve_bucket(&session, "documents")
        .await
        .expect("resolve bucket");
    assert_eq!(bucket.bucket_id, "bucket-documents");

    let ticket = pipeline
        .acquire_upload_ticket(&session, &bucket)
        .await
        .expect("ticket");
    assert_eq!(ticket.bucket_id, "bucket-documents");

    let outcome = pipeline
        .upload(
            &session,
            &bucket,
            ticket,
            UploadRequest::new(b"%PDF-1.7 test".to_vec(), "report.pdf"),
            None,
        )
        .await
        .expect("upload");

    let stored_file_name = outcome.stored_file_name.expect("stored name");
    assert_stored_name(&stored_file_name, "pdf");
    assert!(pipeline.check_exists(&session, "documents", &stored_file_name).await);
}

#[tokio::test]
async fn test_content_hash_matches_exact_bytes() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let payloads: [&[u8]; 3] = [b"\x00", b"  leading and trailing  \r\n", &[0xff; 4096]];
    for payload in payloads {
        pipeline
            .run(UploadRequest::new(payload.to_vec(), "blob.bin"), None)
            .await
            .expect("upload should succeed");
    }

    for (upload, payload) in mock.uploads().iter().zip(payloads) {
        assert_eq!(upload.content_sha1, content_sha1(payload));
        assert_eq!(&upload.body[..], payload);
    }
}

#[tokio::test]
async fn test_missing_mime_type_sends_octet_stream() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));

    pipeline
        .run(UploadRequest::new(jpeg_bytes(), "photo.jpg"), None)
        .await
        .expect("upload should succeed");

    assert_eq!(mock.uploads()[0].content_type, "application/octet-stream");
}

#[tokio::test]
async fn test_sequential_uploads_get_distinct_names() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let first = pipeline
        .run(UploadRequest::new(jpeg_bytes(), "a.png"), None)
        .await
        .expect("first upload");
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = pipeline
        .run(UploadRequest::new(jpeg_bytes(), "b.png"), None)
        .await
        .expect("second upload");

    let first = first.stored_file_name.expect("first name");
    let second = second.stored_file_name.expect("second name");
    assert_ne!(first, second);
    for name in [&first, &second] {
        assert_stored_name(name, "png");
        assert!(!name.contains("a.png") && !name.contains("b.png"));
    }
}

#[tokio::test]
async fn test_each_run_reauthenticates() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));

    for _ in 0..2 {
        pipeline
            .run(UploadRequest::new(jpeg_bytes(), "photo.jpg"), None)
            .await
            .expect("upload should succeed");
    }

    let calls = mock.calls();
    assert_eq!(calls.authorize, 2);
    assert_eq!(calls.get_upload_url, 2);
    let tokens: Vec<_> = mock.uploads().into_iter().map(|u| u.authorization).collect();
    assert_eq!(tokens, ["upload-token-1", "upload-token-2"]);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_completes() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let events: Arc<Mutex<Vec<UploadProgress>>> = Arc::default();
    let sink = events.clone();
    let callback: ProgressCallback = Arc::new(move |progress: UploadProgress| {
        sink.lock().unwrap().push(progress)
    });

    let payload = vec![7_u8; 200 * 1024];
    pipeline
        .run(UploadRequest::new(payload.clone(), "big.raw"), Some(callback))
        .await
        .expect("upload should succeed");

    let events = events.lock().unwrap().clone();
    assert!(!events.is_empty());
    assert!(events
        .windows(2)
        .all(|pair| pair[0].bytes_sent <= pair[1].bytes_sent));
    let last = events.last().unwrap();
    assert_eq!(last.bytes_sent, payload.len() as u64);
    assert!(last.is_complete());

    let upload = &mock.uploads()[0];
    assert_eq!(upload.content_length, Some(payload.len() as u64));
    assert_eq!(upload.content_sha1, content_sha1(&payload));
}

#[tokio::test]
async fn test_start_direct_upload_returns_usable_grant() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let grant = pipeline.start_direct_upload().await.expect("grant");

    assert_eq!(grant.bucket_id, "bucket-photos");
    assert_eq!(grant.bucket_name, "photos");
    assert_eq!(grant.download_url, mock.base_url());
    assert_eq!(
        grant.upload_url,
        format!("{}/upload/bucket-photos", mock.base_url())
    );
    assert_eq!(mock.calls().upload, 0);
}

#[tokio::test]
async fn test_unsafe_extension_yields_resolvable_public_url() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let outcome = pipeline
        .run(UploadRequest::new(jpeg_bytes(), "a.p#g"), None)
        .await
        .expect("upload should succeed");

    let stored_file_name = outcome.stored_file_name.expect("stored name");
    assert_stored_name(&stored_file_name, "jpg");

    let session = pipeline.authenticate().await.unwrap();
    assert!(
        pipeline
            .check_exists(&session, "photos", &stored_file_name)
            .await
    );
}

// Bucket resolution tests

#[tokio::test]
async fn test_resolve_bucket_is_case_sensitive() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));
    let session = pipeline.authenticate().await.expect("authenticate");

    let lower = pipeline.resolve_bucket(&session, "photos").await.unwrap();
    let upper = pipeline.resolve_bucket(&session, "Photos").await.unwrap();
    assert_eq!(lower.bucket_id, "bucket-photos");
    assert_eq!(upper.bucket_id, "bucket-photos-upper");

    let missing = pipeline.resolve_bucket(&session, "PHOTOS").await;
    assert!(matches!(missing, Err(B2Error::BucketNotFound(name)) if name == "PHOTOS"));
}

#[tokio::test]
async fn test_unknown_bucket_stops_the_run() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("videos"));

    let result = pipeline
        .run(UploadRequest::new(jpeg_bytes(), "clip.mp4"), None)
        .await;

    assert!(matches!(result, Err(B2Error::BucketNotFound(_))));
    assert_eq!(mock.calls().get_upload_url, 0);
    assert_eq!(mock.calls().upload, 0);
}

#[tokio::test]
async fn test_bucket_listing_failure_is_auth_class() {
    let mock = start_mock().await;
    mock.fail_bucket_listing(401);
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let result = pipeline
        .run(UploadRequest::new(jpeg_bytes(), "photo.jpg"), None)
        .await;

    assert!(matches!(result, Err(B2Error::Auth { status: 401, .. })));
    assert_eq!(mock.calls().get_upload_url, 0);
}

// Failure tests

#[tokio::test]
async fn test_authentication_401_stops_pipeline() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(Credentials::new("test-key-id", "wrong-key", "photos"));

    let result = pipeline
        .run(UploadRequest::new(jpeg_bytes(), "photo.jpg"), None)
        .await;

    match result {
        Err(err @ B2Error::Auth { .. }) => {
            assert_eq!(err.status(), Some(401));
            assert!(err.to_string().contains("Unauthorized"));
        }
        other => panic!("expected auth error, got {other:?}"),
    }

    let calls = mock.calls();
    assert_eq!(calls.authorize, 1);
    assert_eq!(calls.total(), 1);
}

#[tokio::test]
async fn test_empty_file_makes_no_network_call() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let result = pipeline.run(UploadRequest::new(Vec::new(), "empty.jpg"), None).await;
    assert!(matches!(result, Err(B2Error::EmptyFile)));

    let session = AuthSession {
        account_id: "acc".to_string(),
        api_url: mock.base_url().to_string(),
        authorization_token: "tok".to_string(),
        download_url: mock.base_url().to_string(),
    };
    let bucket = b2_pipeline::BucketRef {
        bucket_id: "bucket-photos".to_string(),
        bucket_name: "photos".to_string(),
    };
    let ticket = UploadTicket {
        bucket_id: "bucket-photos".to_string(),
        upload_url: format!("{}/upload/bucket-photos", mock.base_url()),
        authorization_token: "upload-token-1".to_string(),
    };
    let result = pipeline
        .upload(
            &session,
            &bucket,
            ticket,
            UploadRequest::new(Vec::new(), "empty.jpg"),
            None,
        )
        .await;
    assert!(matches!(result, Err(B2Error::EmptyFile)));

    assert_eq!(mock.calls().total(), 0);
}

#[tokio::test]
async fn test_upload_url_failure() {
    let mock = start_mock().await;
    mock.fail_upload_url(503);
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let result = pipeline
        .run(UploadRequest::new(jpeg_bytes(), "photo.jpg"), None)
        .await;

    assert!(matches!(
        result,
        Err(B2Error::TicketAcquisition { status: 503, .. })
    ));
    assert_eq!(mock.calls().upload, 0);
}

#[tokio::test]
async fn test_upload_failure_includes_b2_message_and_code() {
    let mock = start_mock().await;
    mock.fail_upload(
        400,
        r#"{"status":400,"code":"bad_request","message":"Sha1 did not match data received"}"#,
    );
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let result = pipeline
        .run(UploadRequest::new(jpeg_bytes(), "photo.jpg"), None)
        .await;

    match result {
        Err(B2Error::Upload { status, message }) => {
            assert_eq!(status, 400);
            assert!(message.contains("Sha1 did not match data received"));
            assert!(message.contains("bad_request"));
        }
        other => panic!("expected upload error, got {other:?}"),
    }
    assert_eq!(mock.calls().upload, 1);
}

#[tokio::test]
async fn test_upload_failure_with_raw_body_is_truncated() {
    let mock = start_mock().await;
    mock.fail_upload(502, format!("<html>{}</html>", "gateway ".repeat(100)));
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let err = pipeline
        .run(UploadRequest::new(jpeg_bytes(), "photo.jpg"), None)
        .await
        .expect_err("upload should fail");

    assert_eq!(err.status(), Some(502));
    let message = err.to_string();
    assert!(message.starts_with("Upload failed with status 502: <html>gateway"));
    assert!(!message.contains("</html>"));
}

#[tokio::test]
async fn test_upload_tickets_are_single_use() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let session = pipeline.authenticate().await.unwrap();
    let bucket = pipeline.resolve_bucket(&session, "photos").await.unwrap();
    let ticket = pipeline
        .acquire_upload_ticket(&session, &bucket)
        .await
        .unwrap();

    // Same slot presented a second time, as a client replaying the grant would
    let replayed = UploadTicket {
        bucket_id: ticket.bucket_id.clone(),
        upload_url: ticket.upload_url.clone(),
        authorization_token: ticket.authorization_token.clone(),
    };

    pipeline
        .upload(
            &session,
            &bucket,
            ticket,
            UploadRequest::new(jpeg_bytes(), "a.jpg"),
            None,
        )
        .await
        .expect("first use succeeds");
    let reused = pipeline
        .upload(
            &session,
            &bucket,
            replayed,
            UploadRequest::new(jpeg_bytes(), "b.jpg"),
            None,
        )
        .await;

    assert!(matches!(reused, Err(B2Error::Upload { status: 401, .. })));
}

#[tokio::test]
async fn test_ticket_for_another_bucket_is_rejected() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));

    let session = pipeline.authenticate().await.unwrap();
    let photos = pipeline.resolve_bucket(&session, "photos").await.unwrap();
    let documents = pipeline
        .resolve_bucket(&session, "documents")
        .await
        .unwrap();
    let ticket = pipeline
        .acquire_upload_ticket(&session, &photos)
        .await
        .unwrap();

    let result = pipeline
        .upload(
            &session,
            &documents,
            ticket,
            UploadRequest::new(jpeg_bytes(), "scan.png"),
            None,
        )
        .await;

    match result {
        Err(B2Error::TicketMismatch {
            ticket_bucket_id,
            bucket_id,
        }) => {
            assert_eq!(ticket_bucket_id, "bucket-photos");
            assert_eq!(bucket_id, "bucket-documents");
        }
        other => panic!("expected ticket mismatch, got {other:?}"),
    }

    // Nothing was stored under either bucket
    assert_eq!(mock.calls().upload, 0);
    assert!(mock.uploads().is_empty());
}

#[tokio::test]
async fn test_unreachable_provider_is_network_error() {
    let pipeline = B2UploadPipeline::with_http_client(
        reqwest::Client::new(),
        Credentials::new("id", "key", "photos"),
    )
    .with_auth_base_url(unreachable_base_url());

    let result = pipeline.authenticate().await;
    assert!(matches!(result, Err(B2Error::Network(_))));
}

// Existence probe tests

#[tokio::test]
async fn test_check_exists_for_missing_file_is_false() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));
    let session = pipeline.authenticate().await.unwrap();

    assert!(
        !pipeline
            .check_exists(&session, "photos", "file_0000000000000.jpg")
            .await
    );

    mock.insert_file("photos", "file_0000000000000.jpg");
    assert!(
        pipeline
            .check_exists(&session, "photos", "file_0000000000000.jpg")
            .await
    );
}

#[tokio::test]
async fn test_check_exists_swallows_transport_errors() {
    let mock = start_mock().await;
    let pipeline = mock.pipeline(mock.credentials("photos"));
    let session = AuthSession {
        account_id: "acc".to_string(),
        api_url: unreachable_base_url(),
        authorization_token: "tok".to_string(),
        download_url: unreachable_base_url(),
    };

    assert!(!pipeline.check_exists(&session, "photos", "file_1.jpg").await);
}

#[tokio::test]
async fn test_mock_rejects_unknown_key_without_further_calls() {
    let mock = MockB2Server::start_with("other-id", "other-key", &[("b1", "photos")]).await;
    let pipeline = mock.pipeline(Credentials::new("test-key-id", "test-app-key", "photos"));

    assert!(matches!(
        pipeline.authenticate().await,
        Err(B2Error::Auth { status: 401, .. })
    ));
    assert_eq!(mock.calls().total(), 1);
}
