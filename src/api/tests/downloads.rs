use super::*;
use std::io::Read;

fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn start_returns_202_and_job_runs_to_completion() {
    let app = TestApp::new(vec![Step::rate_limited(), Step::success(3)]).await;

    let response = app.post("/download/p1").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["status"], "started");
    assert_eq!(body["id"], "p1");

    let status = app.wait_until_completed("p1").await;
    assert_eq!(status["status"], "succeeded");
    assert_eq!(status["error"], serde_json::Value::Null);
    assert_eq!(status["attempts"], 2);
    assert_eq!(status["progress"]["completed_items"], 3);
    assert_eq!(app.fetcher.calls(), 2);
}

#[tokio::test]
async fn status_object_has_every_field() {
    let app = TestApp::new(vec![Step::Hang]).await;
    app.post("/download/p1").await;

    let body = json_body(app.get("/download-status/p1").await).await;
    for field in [
        "id",
        "completed",
        "error",
        "progress",
        "status",
        "message",
        "attempts",
        "created_at",
        "updated_at",
    ] {
        assert!(body.get(field).is_some(), "missing field {field}");
    }
    assert_eq!(body["completed"], false);
}

#[tokio::test]
async fn second_start_of_live_job_is_conflict() {
    let app = TestApp::new(vec![Step::Hang]).await;

    assert_eq!(app.post("/download/p1").await.status(), StatusCode::ACCEPTED);

    let response = app.post("/download/p1").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "conflict");
    assert_eq!(body["error"]["details"]["job_id"], "p1");
}

#[tokio::test]
async fn failed_job_can_be_started_again() {
    let app = TestApp::new(vec![Step::failure("boom"), Step::success(1)]).await;

    app.post("/download/p1").await;
    let first = app.wait_until_completed("p1").await;
    assert_eq!(first["status"], "failed");

    assert_eq!(app.post("/download/p1").await.status(), StatusCode::ACCEPTED);
    let second = app.wait_until_completed("p1").await;
    assert_eq!(second["status"], "succeeded");
    assert_eq!(second["attempts"], 1);
}

#[tokio::test]
async fn invalid_id_is_bad_request() {
    let app = TestApp::new(vec![]).await;

    let response = app.post("/download/bad.id").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "invalid_job_id");
    assert_eq!(app.manager.job_count().await, 0);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = TestApp::new(vec![]).await;

    let response = app.get("/download-status/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], "job_not_found");

    let response = app.get("/download-archive/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_id_on_read_endpoints_is_not_found() {
    let app = TestApp::new(vec![]).await;

    for uri in ["/download-status/a.b", "/download-archive/a.b"] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "job_not_found");
        assert_eq!(body["error"]["details"]["job_id"], "a.b");
    }
}

#[tokio::test]
async fn archive_of_running_job_is_bad_request() {
    let app = TestApp::new(vec![Step::Hang]).await;
    app.post("/download/p1").await;

    let response = app.get("/download-archive/p1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "not_ready");
}

#[tokio::test]
async fn archive_of_failed_job_carries_its_error() {
    let app = TestApp::new(vec![Step::failure("spotdl exited with status 1")]).await;
    app.post("/download/p1").await;
    app.wait_until_completed("p1").await;

    let response = app.get("/download-archive/p1").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "job_failed");
    assert_eq!(body["error"]["message"], "spotdl exited with status 1");
}

#[tokio::test]
async fn archive_is_streamed_as_zip_attachment() {
    let app = TestApp::new(vec![Step::success(3)]).await;
    app.post("/download/p1").await;
    app.wait_until_completed("p1").await;

    let response = app.get("/download-archive/p1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/zip"
    );
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"p1.zip\""
    );

    let bytes = body_bytes(response).await;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, ["track-00.mp3", "track-01.mp3", "track-02.mp3"]);

    let mut contents = String::new();
    archive
        .by_name("track-01.mp3")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "audio");
}

#[tokio::test]
async fn repeated_archive_requests_serve_identical_bytes() {
    let app = TestApp::new(vec![Step::success(2)]).await;
    app.post("/download/p1").await;
    app.wait_until_completed("p1").await;

    let first = body_bytes(app.get("/download-archive/p1").await).await;
    let second = body_bytes(app.get("/download-archive/p1").await).await;
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn bearer_token_seeds_expected_track_count() {
    let app = TestApp::new(vec![Step::Hang]).await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/download/p1")
                .header("authorization", "Bearer good-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let body = json_body(app.get("/download-status/p1").await).await;
        if body["progress"]["total_items"] == 12 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "total never seeded");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn rejected_token_does_not_block_start() {
    let app = TestApp::new(vec![Step::success(1)]).await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/download/p1")
                .header("authorization", "Bearer stale-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let status = app.wait_until_completed("p1").await;
    assert_eq!(status["status"], "succeeded");
}

#[tokio::test]
async fn create_from_url_generates_an_id() {
    let app = TestApp::new(vec![Step::success(1)]).await;

    let response = app
        .send(json_request(
            "/downloads",
            serde_json::json!({"playlist_url": "https://open.spotify.com/playlist/p1"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = json_body(response).await;
    assert_eq!(body["status"], "started");
    let id = body["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let status = app.wait_until_completed(&id).await;
    assert_eq!(status["status"], "succeeded");
}

#[tokio::test]
async fn create_without_url_is_bad_request() {
    let app = TestApp::new(vec![]).await;

    for body in [
        serde_json::json!({}),
        serde_json::json!({"playlist_url": ""}),
        serde_json::json!({"playlist_url": "ftp://example.com/list"}),
    ] {
        let response = app.send(json_request("/downloads", body.clone())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(
            json_body(response).await["error"]["code"],
            "validation_error"
        );
    }
    assert_eq!(app.manager.job_count().await, 0);
}

#[tokio::test]
async fn start_after_shutdown_is_service_unavailable() {
    let app = TestApp::new(vec![]).await;
    app.manager.shutdown().await.unwrap();

    let response = app.post("/download/p1").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"]["code"], "shutting_down");
}
