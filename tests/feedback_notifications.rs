mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::spawn_app;

#[tokio::test]
async fn feedback_is_accepted_once_per_user_and_event() {
    let app = spawn_app();
    let organizer = app.register("Olga", "olga@example.com", "organizer").await;
    let attendee = app.register("Anna", "anna@example.com", "attendee").await;
    let event = app.create_event(&organizer, "Conf", 10, 1.0).await;
    let payload = json!({
        "eventId": event["_id"],
        "userId": attendee.id,
        "feedbackText": "Great talks",
        "rating": 5,
    });

    let (status, created) = app.post("/api/feedback/add-feedback", None, payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["rating"], 5);

    let (status, body) = app.post("/api/feedback/add-feedback", None, payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You have already submitted feedback for this event.");

    let (status, list) = app
        .get(&format!("/api/feedback/{}", event["_id"].as_str().unwrap()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["userId"], json!({ "_id": attendee.id, "name": "Anna" }));
}

#[tokio::test]
async fn feedback_validation() {
    let app = spawn_app();
    let event_id = uuid::Uuid::new_v4();
    let user_id = uuid::Uuid::new_v4();

    let (status, body) = app
        .post(
            "/api/feedback/add-feedback",
            None,
            json!({ "eventId": event_id, "userId": user_id, "rating": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "All fields are required");

    for rating in [6, -1] {
        let (status, body) = app
            .post(
                "/api/feedback/add-feedback",
                None,
                json!({ "eventId": event_id, "userId": user_id, "feedbackText": "meh", "rating": rating }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn marking_notification_read_is_idempotent() {
    let app = spawn_app();
    let organizer = app.register("Olga", "olga@example.com", "organizer").await;
    let attendee = app.register("Anna", "anna@example.com", "attendee").await;
    let event = app.create_event(&organizer, "Conf", 10, 1.0).await;

    let (status, _) = app
        .post(
            "/api/tickets/book",
            Some(&attendee.token),
            json!({ "eventId": event["_id"], "price": 1.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let notifications = app.wait_for_notifications(&attendee.token, 1).await;
    assert_eq!(
        notifications[0]["message"],
        "You have successfully booked a ticket for the event: Conf"
    );
    assert_eq!(notifications[0]["isRead"], false);
    let organizer_side = app.wait_for_notifications(&organizer.token, 1).await;
    assert_eq!(
        organizer_side[0]["message"],
        "User Anna has booked a ticket for your event: Conf"
    );

    let (_, unread) = app.get("/api/notifications/unread-count", Some(&attendee.token)).await;
    assert_eq!(unread, json!({ "count": 1 }));

    let read_uri = format!(
        "/api/notifications/{}/read",
        notifications[0]["_id"].as_str().unwrap()
    );
    for _ in 0..2 {
        let (status, body) = app
            .request(Method::PATCH, &read_uri, Some(&attendee.token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isRead"], true);
    }

    let (_, unread) = app.get("/api/notifications/unread-count", Some(&attendee.token)).await;
    assert_eq!(unread, json!({ "count": 0 }));

    // Чужое уведомление не найти
    let (status, _) = app
        .request(Method::PATCH, &read_uri, Some(&organizer.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
