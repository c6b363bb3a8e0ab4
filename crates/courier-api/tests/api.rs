use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use courier_api::auth::create_token;
use courier_api::{AppStateInner, router};
use courier_core::{AttachmentLimits, Core, FsBlobStore};
use courier_db::{Database, users};

const SECRET: &str = "test-secret-for-integration";
const BOUNDARY: &str = "courier-test-boundary";

struct TestApp {
    app: Router,
    db: Arc<Database>,
    _media: TempDir,
}

fn app() -> TestApp {
    let media = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    let blobs = Arc::new(FsBlobStore::new(media.path()).unwrap());
    let limits = AttachmentLimits::default();
    let max_body_bytes = limits.max_batch_bytes + 1024 * 1024;

    let state = Arc::new(AppStateInner {
        core: Core::new(db.clone(), blobs, limits),
        jwt_secret: SECRET.to_string(),
        token_ttl: chrono::Duration::minutes(60),
        max_body_bytes,
    });

    TestApp {
        app: router(state),
        db,
        _media: media,
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a str, &'a [u8]),
}

impl TestApp {
    /// Insert a user without going through password hashing and return a
    /// bearer token for them.
    fn user(&self, name: &str) -> (i64, String) {
        let email = format!("{name}@example.com");
        let id = self
            .db
            .with_conn(|conn| {
                users::insert(
                    conn,
                    &users::NewUser {
                        email: &email,
                        name,
                        lastname: "Test",
                        bio: None,
                        password_hash: "not-a-hash",
                    },
                )
            })
            .unwrap();
        let token = create_token(SECRET, id, chrono::Duration::minutes(5)).unwrap();
        (id, token)
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn raw(&self, req: Request<Body>) -> axum::response::Response {
        self.app.clone().oneshot(req).await.unwrap()
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn multipart(method: &str, uri: &str, token: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, filename, content_type, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let t = app();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = t.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn register_login_and_profile() {
    let t = app();
    let register = json!({
        "email": "ann@example.com",
        "name": "Ann",
        "lastname": "Lee",
        "password": "correct horse"
    });

    let (status, body) = t
        .send(json_request("POST", "/auth/register", None, register.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = body["user_id"].as_i64().unwrap();

    let (status, body) = t
        .send(json_request("POST", "/auth/register", None, register))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["ok"], false);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = t
        .send(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "ann@example.com", "password": "wrong password" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, body) = t
        .send(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "ann@example.com", "password": "correct horse" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = t.send(get("/users/profile", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user_id);
    assert_eq!(body["email"], "ann@example.com");

    let (status, body) = t.send(get(&format!("/users/{user_id}"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("email").is_none());
}

#[tokio::test]
async fn register_validates_fields() {
    let t = app();
    let (status, body) = t
        .send(json_request(
            "POST",
            "/auth/register",
            None,
            json!({
                "email": "not-an-email",
                "name": "Ann",
                "lastname": "Lee",
                "password": "correct horse"
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = t
        .send(json_request(
            "POST",
            "/auth/register",
            None,
            json!({ "email": "ann@example.com" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn token_problems_have_their_own_codes() {
    let t = app();

    let req = Request::builder().uri("/chats").body(Body::empty()).unwrap();
    let (status, body) = t.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_MISSING");

    let (status, body) = t.send(get("/chats", "garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_INVALID");

    let (_, token) = t.user("ann");
    let req = Request::builder()
        .method("DELETE")
        .uri("/users/profile")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = t.send(req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t.send(get("/chats", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let t = app();
    let (_, token) = t.user("ann");

    let req = Request::builder()
        .method("POST")
        .uri("/chats")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = t.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn group_chat_messages_and_attachments() {
    let t = app();
    let (ann_id, ann) = t.user("ann");
    let (bob_id, bob) = t.user("bob");
    let (_, eve) = t.user("eve");

    let (status, body) = t
        .send(json_request(
            "POST",
            "/chats",
            Some(&ann),
            json!({ "member_ids": [bob_id], "name": "project" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let chat_id = body["chat_id"].as_i64().unwrap();

    let (status, body) = t.send(get("/chats", &bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chat_list"][0]["chat_name"], "project");
    assert_eq!(body["chat_list"][0]["is_private"], false);

    let chat_field = chat_id.to_string();
    let (status, body) = t
        .send(multipart(
            "POST",
            "/messages",
            &ann,
            &[
                Part::Text("text", "see attached"),
                Part::Text("chat_id", &chat_field),
                Part::File("files", "notes.txt", "text/plain", b"hello notes"),
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let message_id = body["message_id"].as_i64().unwrap();
    let attachment_id = body["attachment_ids"][0].as_i64().unwrap();

    let (status, body) = t
        .send(get(&format!("/chats/{chat_id}/messages?limit=10"), &bob))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"][0]["text"], "see attached");
    assert_eq!(body["messages"][0]["user_id"], ann_id);
    assert_eq!(body["messages"][0]["attachment_ids"][0], attachment_id);
    assert!(body["next_cursor"].is_null());

    let uri = format!("/messages/{message_id}/attachments/{attachment_id}");
    let response = t.raw(get(&uri, &bob)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment;")
    );
    assert!(response.headers().contains_key(header::ETAG));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"hello notes");

    let response = t.raw(get(&format!("{uri}/view"), &bob)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("inline;")
    );

    let (status, body) = t.send(get(&uri, &eve)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = t
        .send(get(&format!("/chats/{chat_id}/messages"), &eve))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn send_needs_exactly_one_target() {
    let t = app();
    let (bob_id, _) = t.user("bob");
    let (_, ann) = t.user("ann");
    let bob_field = bob_id.to_string();

    let (status, _) = t
        .send(multipart(
            "POST",
            "/messages",
            &ann,
            &[
                Part::Text("text", "hi"),
                Part::Text("chat_id", "1"),
                Part::Text("user_id", &bob_field),
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send(multipart("POST", "/messages", &ann, &[Part::Text("text", "hi")]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .send(multipart(
            "POST",
            "/messages",
            &ann,
            &[Part::Text("text", "hi"), Part::Text("user_id", &bob_field)],
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let chat_id = body["chat_id"].as_i64().unwrap();

    let (status, body) = t
        .send(json_request(
            "POST",
            "/chats/direct",
            Some(&ann),
            json!({ "user_id": bob_id }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chat_id"], chat_id);
    assert_eq!(body["created"], false);
}

#[tokio::test]
async fn role_changes_over_http() {
    let t = app();
    let (_, ann) = t.user("ann");
    let (bob_id, bob) = t.user("bob");
    let (cid_id, _) = t.user("cid");

    let (_, body) = t
        .send(json_request(
            "POST",
            "/chats",
            Some(&ann),
            json!({ "member_ids": [bob_id, cid_id] }),
        ))
        .await;
    let chat_id = body["chat_id"].as_i64().unwrap();

    let (status, body) = t
        .send(json_request(
            "PATCH",
            &format!("/chats/{chat_id}/settings/roles/{cid_id}"),
            Some(&bob),
            json!({ "is_admin": true }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = t
        .send(json_request(
            "PATCH",
            &format!("/chats/{chat_id}/settings/roles/{bob_id}"),
            Some(&ann),
            json!({ "is_admin": true }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .send(json_request(
            "PATCH",
            &format!("/chats/{chat_id}/settings"),
            Some(&bob),
            json!({ "status": "closed" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t.send(get(&format!("/chats/{chat_id}/members"), &bob)).await;
    assert_eq!(status, StatusCode::OK);
    let roles: Vec<&str> = body["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert!(roles.contains(&"owner"));
    assert!(roles.contains(&"admin"));
}

#[tokio::test]
async fn friendship_over_http() {
    let t = app();
    let (ann_id, ann) = t.user("ann");
    let (bob_id, bob) = t.user("bob");

    let post = |uri: String, token: &str| {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = t.send(post(format!("/friends/{bob_id}/init"), &ann)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.send(post(format!("/friends/{ann_id}/init"), &bob)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = t.send(post(format!("/friends/{ann_id}/accept"), &bob)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = t.send(get("/friends", &ann)).await;
    assert_eq!(body["friends"][0]["user_id"], bob_id);
    assert_eq!(body["friends"][0]["status"], "accepted");
    assert_eq!(body["friends"][0]["direction"], "outgoing");
}

#[tokio::test]
async fn avatar_placeholder_and_upload() {
    let t = app();
    let (ann_id, ann) = t.user("ann");

    let response = t.raw(get(&format!("/users/{ann_id}/avatar"), &ann)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");

    let (status, body) = t
        .send(multipart(
            "PUT",
            "/users/profile/avatar",
            &ann,
            &[Part::File("file", "me.png", "image/png", b"\x89PNG fake")],
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["picture"]["placement"], "avatar");
    let picture_id = body["picture"]["picture_id"].as_i64().unwrap();

    let response = t.raw(get(&format!("/users/{ann_id}/avatar"), &ann)).await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let response = t.raw(get(&format!("/pictures/{picture_id}"), &ann)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = t
        .send(multipart(
            "POST",
            "/users/profile/wall",
            &ann,
            &[Part::File("file", "doc.pdf", "application/pdf", b"%PDF")],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}
