use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use db::DBService;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use server::{
    deployment::{Deployment, DeploymentOptions},
    routes,
};
use services::services::reflection::{GeneratorError, ReflectionGenerator, RegenerationPolicy};
use tempfile::TempDir;
use tokio::sync::oneshot;

const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";
const CRON_SECRET: &str = "cron-test-secret";
const DAY: &str = "2026-03-01";

#[derive(Default)]
struct StubGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl ReflectionGenerator for StubGenerator {
    async fn generate(&self, _first: &str, _second: &str) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("Two hearts kept the same quiet rhythm today.".to_string())
    }
}

struct TestApp {
    base: String,
    client: reqwest::Client,
    generator: Arc<StubGenerator>,
    _audio: TempDir,
    _shutdown: oneshot::Sender<()>,
}

struct User {
    id: String,
    token: String,
    invite_code: String,
}

async fn start_app(cron_secret: Option<&str>) -> TestApp {
    let db = DBService::new_in_memory().await.expect("in-memory db");
    let audio = TempDir::new().expect("audio dir");
    let generator = Arc::new(StubGenerator::default());

    let deployment = Deployment::new(
        db,
        DeploymentOptions {
            audio_root: audio.path().to_path_buf(),
            jwt_secret: JWT_SECRET.to_string(),
            token_ttl: chrono::Duration::days(1),
            cron_secret: cron_secret.map(str::to_string),
            generator: Some(generator.clone() as Arc<dyn ReflectionGenerator>),
            regeneration: RegenerationPolicy::Reject,
        },
    )
    .expect("deployment");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let server = axum::serve(listener, routes::router(deployment)).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    tokio::spawn(async move {
        let _ = server.await;
    });

    TestApp {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        generator,
        _audio: audio,
        _shutdown: shutdown_tx,
    }
}

impl TestApp {
    async fn send(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = self.client.request(method, format!("{}{}", self.base, path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.expect("request");
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn register(&self, email: &str) -> User {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/register",
                None,
                Some(json!({ "email": email, "password": "correct horse", "full_name": email })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let data = &body["data"];
        User {
            id: data["user"]["id"].as_str().expect("id").to_string(),
            token: data["access_token"].as_str().expect("token").to_string(),
            invite_code: data["user"]["invite_code"].as_str().expect("code").to_string(),
        }
    }

    async fn link(&self, user: &User, partner: &User) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/invite-partner",
                Some(&user.token),
                Some(json!({ "invite_code": partner.invite_code })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    async fn write_journal(&self, user: &User, date: &str, content: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/journal",
            Some(&user.token),
            Some(json!({ "content": content, "date": date })),
        )
        .await
    }
}

fn entry_id(body: &Value) -> String {
    body["data"]["id"].as_str().expect("entry id").to_string()
}

#[tokio::test]
async fn health_and_authentication() {
    let app = start_app(None).await;

    let (status, body) = app.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Que Bella AI Couples Love Journal is running");

    let (status, _) = app.send(Method::GET, "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(Method::GET, "/api/me", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let ana = app.register("ana@example.com").await;
    let (status, body) = app.send(Method::GET, "/api/me", Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ana@example.com");
    assert_eq!(body["data"]["invite_code"], ana.invite_code.as_str());

    let (status, _) = app
        .send(
            Method::POST,
            "/api/register",
            None,
            Some(json!({ "email": "ANA@example.com", "password": "another pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["id"], ana.id.as_str());
}

#[tokio::test]
async fn one_journal_entry_per_day() {
    let app = start_app(None).await;
    let ana = app.register("ana@example.com").await;

    let (status, _) = app.write_journal(&ana, DAY, "First").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.write_journal(&ana, DAY, "Second").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = app.write_journal(&ana, "2026-03-02", "Next day").await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.send(Method::GET, "/api/journal", Some(&ana.token), None).await;
    let dates: Vec<&str> = body["data"]
        .as_array()
        .expect("entries")
        .iter()
        .map(|e| e["date"].as_str().expect("date"))
        .collect();
    assert_eq!(dates, vec!["2026-03-02", DAY]);
}

#[tokio::test]
async fn linking_is_symmetric_and_exclusive() {
    let app = start_app(None).await;
    let ana = app.register("ana@example.com").await;
    let bo = app.register("bo@example.com").await;
    let cy = app.register("cy@example.com").await;

    let (status, _) = app.send(Method::GET, "/api/partner", Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::POST, "/api/invite-partner", Some(&ana.token), Some(json!({ "invite_code": "NOPE2345" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/invite-partner",
            Some(&ana.token),
            Some(json!({ "invite_code": ana.invite_code })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/invite-partner",
            Some(&ana.token),
            Some(json!({ "invite_code": bo.invite_code.to_lowercase() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["partner"]["id"], bo.id.as_str());

    let (_, body) = app.send(Method::GET, "/api/partner", Some(&ana.token), None).await;
    assert_eq!(body["data"]["id"], bo.id.as_str());
    let (_, body) = app.send(Method::GET, "/api/partner", Some(&bo.token), None).await;
    assert_eq!(body["data"]["id"], ana.id.as_str());
    let (_, body) = app.send(Method::GET, "/api/me", Some(&bo.token), None).await;
    assert_eq!(body["data"]["partner_id"], ana.id.as_str());

    let (status, _) = app
        .send(
            Method::POST,
            "/api/invite-partner",
            Some(&cy.token),
            Some(json!({ "invite_code": ana.invite_code })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/invite-partner",
            Some(&bo.token),
            Some(json!({ "invite_code": cy.invite_code })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn entries_are_visible_only_to_listed_viewers() {
    let app = start_app(None).await;
    let ana = app.register("ana@example.com").await;
    let cy = app.register("cy@example.com").await;

    let (_, body) = app.write_journal(&ana, DAY, "Just for me").await;
    let id = entry_id(&body);
    let path = format!("/api/journal/{id}");

    let (status, _) = app.send(Method::GET, &path, Some(&cy.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, body) = app.send(Method::GET, "/api/journal", Some(&cy.token), None).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));

    let (status, _) = app
        .send(Method::PUT, &path, Some(&cy.token), Some(json!({ "content": "mine now" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("{path}/viewers"),
            Some(&ana.token),
            Some(json!({ "viewer_id": cy.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app.send(Method::GET, &path, Some(&cy.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "Just for me");

    // Still owner-only for writes.
    let (status, _) = app.send(Method::DELETE, &path, Some(&cy.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app
        .send(Method::GET, &format!("/api/access-logs/journal/{id}"), Some(&ana.token), None)
        .await;
    let readers: Vec<&str> = body["data"]
        .as_array()
        .expect("logs")
        .iter()
        .map(|log| log["accessed_by"].as_str().expect("reader"))
        .collect();
    assert!(!readers.is_empty());
    assert!(readers.iter().all(|r| *r == cy.id));

    let (status, _) = app
        .send(Method::DELETE, &format!("{path}/viewers/{}", cy.id), Some(&ana.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, &path, Some(&cy.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn linking_shares_existing_entries_both_ways() {
    let app = start_app(None).await;
    let ana = app.register("ana@example.com").await;
    let bo = app.register("bo@example.com").await;

    let (_, body) = app.write_journal(&ana, DAY, "Before we linked").await;
    let id = entry_id(&body);
    let (status, _) = app.send(Method::GET, &format!("/api/journal/{id}"), Some(&bo.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.link(&bo, &ana).await;

    let (status, _) = app.send(Method::GET, &format!("/api/journal/{id}"), Some(&bo.token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .send(
            Method::POST,
            "/api/mood",
            Some(&bo.token),
            Some(json!({ "mood": "happy", "date": DAY })),
        )
        .await;
    let mood_id = entry_id(&body);
    let (status, body) = app
        .send(Method::GET, &format!("/api/mood/{mood_id}"), Some(&ana.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["mood"], "happy");
}

#[tokio::test]
async fn private_notes_stay_with_their_author() {
    let app = start_app(None).await;
    let ana = app.register("ana@example.com").await;
    let bo = app.register("bo@example.com").await;
    app.link(&ana, &bo).await;

    let (_, body) = app.write_journal(&ana, DAY, "A long day").await;
    let note_path = format!("/api/private-notes/journal/{}", entry_id(&body));

    let (status, body) = app
        .send(Method::PUT, &note_path, Some(&bo.token), Some(json!({ "note_content": "Bring her tea" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app.send(Method::GET, &note_path, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.send(Method::GET, &note_path, Some(&bo.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["note_content"], "Bring her tea");

    let (status, _) = app.send(Method::DELETE, &note_path, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::DELETE, &note_path, Some(&bo.token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reflection_needs_both_entries_and_is_written_once() {
    let app = start_app(None).await;
    let ana = app.register("ana@example.com").await;
    let bo = app.register("bo@example.com").await;
    let path = format!("/api/generate-reflection/{DAY}");

    let (status, _) = app.send(Method::POST, &path, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.link(&ana, &bo).await;
    app.write_journal(&ana, DAY, "We walked by the sea").await;

    let (status, _) = app.send(Method::POST, &path, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.generator.calls.load(Ordering::SeqCst), 0);

    app.write_journal(&bo, DAY, "The sea was loud and lovely").await;

    let (status, body) = app.send(Method::POST, &path, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["date"], DAY);
    assert!(body["data"]["reflection"].as_str().is_some_and(|r| !r.is_empty()));

    let (status, _) = app.send(Method::POST, &path, Some(&bo.token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.generator.calls.load(Ordering::SeqCst), 1);

    let (_, body) = app.send(Method::GET, "/api/reflections", Some(&bo.token), None).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (_, body) = app.send(Method::GET, "/api/calendar/2026-03", Some(&bo.token), None).await;
    let days = body["data"].as_array().expect("calendar");
    assert_eq!(days.len(), 31);
    let first = &days[0];
    assert!(first["user_entry"].is_object());
    assert!(first["partner_entry"].is_object());
    assert!(first["shared_reflection"].is_object());

    let (status, _) = app.send(Method::GET, "/api/calendar/2026-13", Some(&bo.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cron_endpoints_require_the_shared_secret() {
    let app = start_app(Some(CRON_SECRET)).await;
    let ana = app.register("ana@example.com").await;
    let bo = app.register("bo@example.com").await;
    app.link(&ana, &bo).await;
    app.write_journal(&ana, DAY, "Morning").await;
    app.write_journal(&bo, DAY, "Evening").await;

    let path = format!("/api/cron/generate-reflections?date={DAY}");
    let (status, _) = app.send(Method::POST, &path, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let run = || {
        app.client
            .post(format!("{}{}", app.base, path))
            .header("cron-secret", CRON_SECRET)
            .send()
    };
    let body: Value = run().await.expect("cron").json().await.expect("json");
    assert_eq!(body["data"]["generated"], 1);

    let body: Value = run().await.expect("cron").json().await.expect("json");
    assert_eq!(body["data"]["generated"], 0);
    assert_eq!(body["data"]["skipped"], 1);

    let response = app
        .client
        .post(format!("{}/api/cron/backfill-reflection", app.base))
        .header("cron-secret", CRON_SECRET)
        .json(&json!({ "user_id": ana.id, "partner_id": bo.id, "date": DAY }))
        .send()
        .await
        .expect("backfill");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn cron_endpoints_are_disabled_without_a_secret() {
    let app = start_app(None).await;
    let response = app
        .client
        .post(format!("{}/api/cron/generate-reflections", app.base))
        .header("cron-secret", "anything")
        .send()
        .await
        .expect("cron");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn audio_is_readable_by_owner_and_partner_only() {
    let app = start_app(None).await;
    let ana = app.register("ana@example.com").await;
    let bo = app.register("bo@example.com").await;
    let cy = app.register("cy@example.com").await;
    app.link(&ana, &bo).await;

    let upload = |content_type: &'static str| {
        let part = reqwest::multipart::Part::bytes(b"ID3fake-audio".to_vec())
            .file_name("voice.mp3")
            .mime_str(content_type)
            .expect("mime");
        app.client
            .post(format!("{}/api/upload-audio", app.base))
            .bearer_auth(&ana.token)
            .multipart(reqwest::multipart::Form::new().part("file", part))
            .send()
    };

    let response = upload("text/plain").await.expect("upload");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = upload("audio/mpeg").await.expect("upload");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("json");
    let url = body["data"]["audio_url"].as_str().expect("url").to_string();
    assert!(url.starts_with(&format!("/api/audio/{}/", ana.id)));

    for (user, expected) in [(&ana, StatusCode::OK), (&bo, StatusCode::OK), (&cy, StatusCode::FORBIDDEN)] {
        let response = app
            .client
            .get(format!("{}{}", app.base, url))
            .bearer_auth(&user.token)
            .send()
            .await
            .expect("download");
        assert_eq!(response.status(), expected);
        if expected == StatusCode::OK {
            assert_eq!(response.headers()["content-type"], "audio/mpeg");
            assert_eq!(response.bytes().await.expect("bytes").as_ref(), b"ID3fake-audio");
        }
    }

    let (status, _) = app.send(Method::DELETE, &url, Some(&bo.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::DELETE, &url, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn stats_count_own_and_partner_entries() {
    let app = start_app(None).await;
    let ana = app.register("ana@example.com").await;
    let bo = app.register("bo@example.com").await;
    app.link(&ana, &bo).await;
    app.write_journal(&ana, DAY, "one").await;
    app.write_journal(&ana, "2026-03-02", "two").await;
    app.write_journal(&bo, DAY, "three").await;

    let (status, body) = app.send(Method::GET, "/api/stats", Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_entries"], 2);
    assert_eq!(body["data"]["partner_entries"], 1);
    assert_eq!(body["data"]["shared_days"], 1);
    assert_eq!(body["data"]["has_partner"], true);
}
