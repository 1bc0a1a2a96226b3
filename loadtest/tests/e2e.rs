use std::time::Duration;

use filestore_test::server::TestServer;
use loadtest::Workload;
use loadtest::http::{Error, HttpRemote};
use loadtest::workload::TaskWeights;

const RUN_DURATION: Duration = Duration::from_secs(2);

fn only(weights: impl FnOnce(&mut TaskWeights)) -> TaskWeights {
    let mut all_zero = TaskWeights {
        upload: 0,
        download: 0,
        list: 0,
        health: 0,
        metrics: 0,
        root: 0,
    };
    weights(&mut all_zero);
    all_zero
}

fn fast_workload(users: usize, weights: TaskWeights) -> Workload {
    Workload::builder()
        .users(users)
        .seed(1234)
        .wait_time(Duration::from_millis(10), Duration::from_millis(20))
        .task_weights(weights)
        .build()
        .unwrap()
}

#[tokio::test]
async fn seeded_file_can_be_downloaded() {
    filestore_test::tracing::init();
    let server = TestServer::new().await;
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    let filename = format!("seed-{}.bin", uuid::Uuid::new_v4().simple());
    let contents: Vec<u8> = (0..1000).map(|_| rand::random()).collect();
    remote.upload(&filename, contents).await.unwrap();

    let received = remote.download(&filename).await.unwrap();
    assert_eq!(received, 1000);

    let files = remote.list().await.unwrap();
    assert_eq!(files, [filename]);
}

#[tokio::test]
async fn missing_file_is_a_failure() {
    let server = TestServer::new().await;
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    let err = remote.download("does-not-exist.bin").await.unwrap_err();
    assert!(matches!(err, Error::Status(status) if status.as_u16() == 404));
}

#[tokio::test]
async fn simple_endpoints() {
    let server = TestServer::new().await;
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    assert_eq!(remote.get("/health").await.unwrap(), 2);
    assert!(remote.get("/metrics").await.unwrap() > 0);
    assert!(remote.get("/").await.unwrap() > 0);
}

#[tokio::test]
async fn rejected_upload_reports_body() {
    let server = TestServer::rejecting_uploads().await;
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    let err = remote.upload("upload-1.bin", vec![1; 512]).await.unwrap_err();
    assert_eq!(err.to_string(), "Upload failed: storage is read-only");
}

#[tokio::test]
async fn listing_without_content_is_empty() {
    let server = TestServer::listing_without_content().await;
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    let files = remote.list().await.unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn upload_counts_once_accepted() {
    let server = TestServer::truncating_upload_responses().await;
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    // the response body breaks off, but the server already answered 200
    remote.upload("upload-1.bin", vec![1; 512]).await.unwrap();
    assert_eq!(server.stored_files(), ["upload-1.bin"]);
}

#[tokio::test]
async fn mixed_workload_succeeds() {
    filestore_test::tracing::init();
    let server = TestServer::new().await;
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    let workload = fast_workload(4, TaskWeights::default());
    let report = loadtest::run(remote, workload, RUN_DURATION).await.unwrap();

    let failures: Vec<_> = report.failures().collect();
    assert!(failures.is_empty(), "{failures:?}");

    // every user uploads at least its seed file
    let uploads = report.get("/files [POST]").unwrap();
    assert!(uploads.successes() >= 4);
    assert!(server.upload_count() >= 4);
    assert!(report.get("/files/{filename}").unwrap().successes() > 0);
    assert!(report.get("/files").unwrap().successes() > 0);
    assert_eq!(report.get("/health").unwrap().failures(), 0);
}

#[tokio::test]
async fn failed_uploads_are_recorded() {
    let server = TestServer::rejecting_uploads().await;
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    let workload = fast_workload(2, only(|w| w.upload = 1));
    let report = loadtest::run(remote, workload, RUN_DURATION).await.unwrap();

    let uploads = report.get("/files [POST]").unwrap();
    assert!(uploads.failures() > 0);
    assert_eq!(uploads.successes(), 0);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    let (name, message, count) = failures[0];
    assert_eq!(name, "/files [POST]");
    assert_eq!(message, "Upload failed: storage is read-only");
    assert_eq!(count, uploads.failures());
}

#[tokio::test]
async fn download_without_files_uploads_instead() {
    let server = TestServer::rejecting_uploads().await;
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    // uploads always fail, so users never learn about a file to download
    let workload = fast_workload(2, only(|w| w.download = 1));
    let report = loadtest::run(remote, workload, RUN_DURATION).await.unwrap();

    assert!(report.get("/files/{filename}").is_none());
    assert!(report.get("/files [POST]").unwrap().requests() > 2);
    assert_eq!(server.download_count(), 0);
}

#[tokio::test]
async fn listed_files_are_downloaded() {
    let server = TestServer::new().await;
    for i in 0..50 {
        server.put_file(&format!("existing-{i}.bin"), b"existing contents");
    }
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    let workload = fast_workload(
        3,
        only(|w| {
            w.list = 1;
            w.download = 1;
        }),
    );
    let report = loadtest::run(remote, workload, RUN_DURATION).await.unwrap();

    let failures: Vec<_> = report.failures().collect();
    assert!(failures.is_empty(), "{failures:?}");
    assert!(report.get("/files").unwrap().successes() > 0);

    // only the three seed uploads, everything else was discovered through listings
    assert_eq!(report.get("/files [POST]").unwrap().requests(), 3);
    assert!(server.download_count() > 0);
    assert_eq!(server.stored_files().len(), 53);
}

#[tokio::test]
async fn listings_without_content_still_succeed() {
    let server = TestServer::listing_without_content().await;
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    let workload = fast_workload(
        2,
        only(|w| {
            w.list = 1;
            w.download = 1;
        }),
    );
    let report = loadtest::run(remote, workload, RUN_DURATION).await.unwrap();

    let failures: Vec<_> = report.failures().collect();
    assert!(failures.is_empty(), "{failures:?}");
    assert!(report.get("/files").unwrap().successes() > 0);
    // users keep downloading their seed files
    assert!(server.download_count() > 0);
}

#[tokio::test]
async fn interrupted_upload_responses_keep_files_known() {
    let server = TestServer::truncating_upload_responses().await;
    let remote = HttpRemote::new(&server.url("/")).unwrap();

    let workload = fast_workload(2, only(|w| w.download = 1));
    let report = loadtest::run(remote, workload, RUN_DURATION).await.unwrap();

    let failures: Vec<_> = report.failures().collect();
    assert!(failures.is_empty(), "{failures:?}");
    // only the seed uploads, every later download found a known file
    assert_eq!(report.get("/files [POST]").unwrap().requests(), 2);
    assert!(report.get("/files/{filename}").unwrap().successes() > 0);
}
