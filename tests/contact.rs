#![cfg(feature = "migration")]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{json_body, BrokenStore, TestApp, OWNER};
use portfolio_backend::contact::{ContactError, ContactForm};
use serde_json::json;

fn contact_request(body: serde_json::Value) -> Request<Body> {
    Request::post("/api/contact")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn app() -> TestApp {
    TestApp::with_store(Arc::new(BrokenStore))
}

#[tokio::test]
async fn missing_field_is_400_without_sending() {
    let app = app();

    let response = app
        .call(contact_request(
            json!({ "name": "A", "email": "", "subject": "S", "message": "M" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "status": "error", "message": "All fields are required" })
    );
    assert_eq!(app.mailer.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn absent_fields_and_bad_json_are_400() {
    let app = app();

    let response = app.call(contact_request(json!({ "name": "A" }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .call(Request::post("/api/contact").body(Body::from("{")).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.mailer.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn relays_notification_and_acknowledgment() {
    let app = app();
    let form = ContactForm {
        name: "Ada".into(),
        email: "ada@example.org".into(),
        subject: "Collaboration".into(),
        message: "Hello there".into(),
    };

    app.contact.submit(&form).await.unwrap().await.unwrap();

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, OWNER);
    assert_eq!(sent[0].reply_to.as_deref(), Some("ada@example.org"));
    assert!(sent[0].text.contains("Hello there"));
    assert_eq!(sent[1].to, "ada@example.org");
    assert_eq!(sent[1].subject, "Thank you for getting in touch");
}

#[tokio::test]
async fn successful_submission_is_200() {
    let app = app();

    let response = app
        .call(contact_request(json!({
            "name": "Ada",
            "email": "ada@example.org",
            "subject": "Collaboration",
            "message": "Hello there",
        })))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn acknowledgment_failure_does_not_fail_the_request() {
    let app = app();
    app.mailer.fail_sender.store(true, Ordering::SeqCst);

    let form = ContactForm {
        name: "Ada".into(),
        email: "ada@example.org".into(),
        subject: "S".into(),
        message: "M".into(),
    };
    let acknowledgment = app.contact.submit(&form).await.unwrap();
    acknowledgment.await.unwrap();

    assert_eq!(app.mailer.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(app.mailer.sent().len(), 1);

    let response = app
        .call(contact_request(
            json!({ "name": "Ada", "email": "ada@example.org", "subject": "S", "message": "M" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "success");
}

#[tokio::test]
async fn notification_failure_is_500() {
    let app = app();
    app.mailer.fail_owner.store(true, Ordering::SeqCst);

    let form = ContactForm {
        name: "Ada".into(),
        email: "ada@example.org".into(),
        subject: "S".into(),
        message: "M".into(),
    };
    assert!(matches!(
        app.contact.submit(&form).await,
        Err(ContactError::Delivery(_))
    ));

    let response = app
        .call(contact_request(
            json!({ "name": "Ada", "email": "ada@example.org", "subject": "S", "message": "M" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("try again"));

    // no acknowledgment once the notification fails
    assert_eq!(app.mailer.attempts.load(Ordering::SeqCst), 2);
    assert!(app.mailer.sent().is_empty());
}
