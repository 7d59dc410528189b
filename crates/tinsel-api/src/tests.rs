//! Router tests: an in-memory SQLite store, a recording notifier and real
//! argon2-verified Basic auth, driven through `tower::ServiceExt::oneshot`.

use std::{
  convert::Infallible,
  sync::{Arc, Mutex},
};

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  Router,
  body::Body,
  http::{Method, Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::{Days, Utc};
use rand_core::OsRng;
use serde_json::{Value, json};
use tinsel_core::{
  exchange::{Exchange, ExchangeConfig},
  notify::{DrawNotice, Notifier},
};
use tinsel_store_sqlite::SqliteStore;
use tower::ServiceExt;

use crate::{AppState, OrganizerAccount, OrganizerDirectory, api_router};

#[derive(Clone, Default)]
struct Inbox {
  sent: Arc<Mutex<Vec<DrawNotice>>>,
}

impl Notifier for Inbox {
  type Error = Infallible;

  async fn send(&self, notice: DrawNotice) -> Result<(), Infallible> {
    self.sent.lock().unwrap().push(notice);
    Ok(())
  }
}

fn account(user_id: &str, username: &str, hash: &str) -> OrganizerAccount {
  OrganizerAccount {
    user_id:       user_id.into(),
    email:         format!("{username}@example.com"),
    username:      username.into(),
    password_hash: hash.into(),
  }
}

async fn app() -> (Router, Inbox) {
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(b"secret", &salt)
    .unwrap()
    .to_string();
  let directory = OrganizerDirectory::new(vec![
    account("org-1", "santa", &hash),
    account("org-2", "grinch", &hash),
  ]);

  let store = SqliteStore::open_in_memory().await.unwrap();
  let inbox = Inbox::default();
  let exchange = Exchange::new(store, inbox.clone(), ExchangeConfig::default());
  let state = AppState::new(exchange, directory, "http://localhost:8080/");
  (api_router(state), inbox)
}

fn basic(user: &str) -> String {
  format!("Basic {}", B64.encode(format!("{user}:secret")))
}

async fn call(
  app:    &Router,
  method: Method,
  uri:    &str,
  user:   Option<&str>,
  body:   Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(user) = user {
    builder = builder.header(header::AUTHORIZATION, basic(user));
  }
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp   = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes  = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value  = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, value)
}

fn group_body() -> Value {
  json!({
    "name": "Office party",
    "welcome_message": "Bring snacks",
    "mode": "standard",
    "budget": 20.0,
    "event_date": (Utc::now().date_naive() + Days::new(14)).to_string(),
  })
}

async fn create_group(app: &Router) -> String {
  let (status, body) = call(app, Method::POST, "/groups", Some("santa"), Some(group_body())).await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["group_id"].as_str().unwrap().to_owned()
}

async fn join(app: &Router, id: &str, name: &str) -> StatusCode {
  let body = json!({ "name": name, "email": format!("{}@example.com", name.to_lowercase()) });
  call(app, Method::POST, &format!("/groups/{id}/participants"), None, Some(body)).await.0
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn organizer_routes_require_credentials() {
  let (app, _) = app().await;
  let req = Request::builder().uri("/groups").body(Body::empty()).unwrap();
  let resp = app.clone().oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

  let (status, _) = call(&app, Method::POST, "/groups", Some("rudolph"), Some(group_body())).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn other_organizers_are_forbidden() {
  let (app, _) = app().await;
  let id = create_group(&app).await;

  let (status, body) = call(&app, Method::GET, &format!("/groups/{id}"), Some("grinch"), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(body["error"].is_string());

  let (status, body) = call(&app, Method::GET, "/groups", Some("grinch"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));
}

// ─── Groups ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_fetch_group() {
  let (app, _) = app().await;
  let id = create_group(&app).await;

  let (status, body) = call(&app, Method::GET, &format!("/groups/{id}"), Some("santa"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["name"], "Office party");
  assert_eq!(body["status"], "open");
  assert_eq!(body["join_link"], format!("http://localhost:8080/join/{id}"));
  assert!(body.get("assignments").is_none());

  let (_, list) = call(&app, Method::GET, "/groups", Some("santa"), None).await;
  assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_group_is_bad_request() {
  let (app, _) = app().await;
  let mut body = group_body();
  body["budget"] = json!(0);
  let (status, _) = call(&app, Method::POST, "/groups", Some("santa"), Some(body)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_then_not_found() {
  let (app, _) = app().await;
  let id = create_group(&app).await;

  let (status, _) = call(&app, Method::DELETE, &format!("/groups/{id}"), Some("santa"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = call(&app, Method::GET, &format!("/groups/{id}/invitation"), None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Joining ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn join_through_invitation() {
  let (app, _) = app().await;
  let id = create_group(&app).await;

  let (status, invite) = call(&app, Method::GET, &format!("/groups/{id}/invitation"), None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(invite["name"], "Office party");
  assert_eq!(invite["participant_count"], 0);

  assert_eq!(join(&app, &id, "Ann").await, StatusCode::CREATED);
  assert_eq!(join(&app, &id, "ANN").await, StatusCode::CONFLICT);

  let (_, invite) = call(&app, Method::GET, &format!("/groups/{id}/invitation"), None, None).await;
  assert_eq!(invite["participant_count"], 1);
}

// ─── Draw ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn draw_needs_two_participants() {
  let (app, inbox) = app().await;
  let id = create_group(&app).await;
  join(&app, &id, "Ann").await;

  let (status, _) = call(&app, Method::POST, &format!("/groups/{id}/draw"), Some("santa"), None).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(inbox.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn draw_notifies_and_locks_the_group() {
  let (app, inbox) = app().await;
  let id = create_group(&app).await;
  for name in ["Ann", "Bob", "Cy"] {
    join(&app, &id, name).await;
  }

  let (status, body) = call(&app, Method::POST, &format!("/groups/{id}/draw"), Some("santa"), None).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["delivered"], 3);
  assert_eq!(body["failed"], 0);
  assert_eq!(body["group"]["status"], "drawn");
  assert_eq!(inbox.sent.lock().unwrap().len(), 3);

  let (status, _) = call(&app, Method::POST, &format!("/groups/{id}/draw"), Some("santa"), None).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(join(&app, &id, "Dee").await, StatusCode::CONFLICT);

  let (_, records) =
    call(&app, Method::GET, &format!("/groups/{id}/notifications"), Some("santa"), None).await;
  assert_eq!(records.as_array().unwrap().len(), 3);

  let (status, outcome) = call(
    &app,
    Method::POST,
    &format!("/groups/{id}/notifications/resend"),
    Some("santa"),
    Some(json!({ "email": "bob@example.com" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(outcome["status"], "delivered");

  let (status, summary) =
    call(&app, Method::POST, &format!("/groups/{id}/notifications"), Some("santa"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(summary["delivered"], 3);
}

#[tokio::test]
async fn results_wait_for_the_event() {
  let (app, _) = app().await;
  let id = create_group(&app).await;
  join(&app, &id, "Ann").await;
  join(&app, &id, "Bob").await;
  call(&app, Method::POST, &format!("/groups/{id}/draw"), Some("santa"), None).await;

  let (status, body) = call(&app, Method::GET, &format!("/groups/{id}/results"), None, None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(body["error"].as_str().unwrap().contains("available from"));
}

#[tokio::test]
async fn close_is_one_way() {
  let (app, _) = app().await;
  let id = create_group(&app).await;

  let (status, body) = call(&app, Method::POST, &format!("/groups/{id}/close"), Some("santa"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "closed");

  let (status, _) = call(&app, Method::POST, &format!("/groups/{id}/close"), Some("santa"), None).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(join(&app, &id, "Ann").await, StatusCode::CONFLICT);
}
