mod common;

use axum::http::{Method, StatusCode};
use chrono::Duration as ChronoDuration;
use serde_json::json;
use std::sync::atomic::Ordering;

use conference_system::services::cleanup::PurchaseCleanup;

use common::spawn_app;

#[tokio::test]
async fn sold_out_event_rejects_booking_without_side_effects() {
    let app = spawn_app();
    let organizer = app.register("Olga", "olga@example.com", "organizer").await;
    let attendee = app.register("Anna", "anna@example.com", "attendee").await;
    let event = app.create_event(&organizer, "Empty Hall", 0, 10.0).await;
    let event_id = event["_id"].as_str().unwrap();

    let (status, body) = app
        .post(
            "/api/tickets/book",
            Some(&attendee.token),
            json!({ "eventId": event_id, "price": 10.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No tickets available for this event");

    let (status, _) = app.get("/api/tickets/my-tickets", Some(&attendee.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, event) = app.get(&format!("/api/events/{}", event_id), None).await;
    assert_eq!(event["ticketsAvailable"], 0);
}

#[tokio::test]
async fn last_ticket_goes_to_first_buyer_only() {
    let app = spawn_app();
    let organizer = app.register("Olga", "olga@example.com", "organizer").await;
    let alice = app.register("Alice", "alice@example.com", "attendee").await;
    let bob = app.register("Bob", "bob@example.com", "attendee").await;
    let event = app.create_event(&organizer, "Tiny Meetup", 1, 15.0).await;
    let event_id = event["_id"].as_str().unwrap();
    let body = json!({ "eventId": event_id, "price": 15.0 });

    let (status, ticket) = app.post("/api/tickets/book", Some(&alice.token), body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ticket["paymentStatus"], "paid");

    let (_, event) = app.get(&format!("/api/events/{}", event_id), None).await;
    assert_eq!(event["ticketsAvailable"], 0);

    let (status, err) = app.post("/api/tickets/book", Some(&bob.token), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["message"], "No tickets available for this event");

    let (status, tickets) = app.get("/api/tickets/my-tickets", Some(&alice.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tickets[0]["event"]["name"], "Tiny Meetup");

    let (_, attendees) = app
        .get(&format!("/api/tickets/{}/attendees", event_id), Some(&organizer.token))
        .await;
    assert_eq!(attendees.as_array().unwrap().len(), 1);
    assert_eq!(attendees[0]["email"], "alice@example.com");
}

#[tokio::test]
async fn concurrent_bookings_never_oversell() {
    let app = spawn_app();
    let organizer = app.register("Olga", "olga@example.com", "organizer").await;
    let event = app.create_event(&organizer, "Rush", 3, 5.0).await;
    let event_id = event["_id"].as_str().unwrap().to_string();

    let mut buyers = Vec::new();
    for i in 0..8 {
        buyers.push(
            app.register(&format!("Buyer {}", i), &format!("buyer{}@example.com", i), "attendee")
                .await,
        );
    }

    let requests = buyers.iter().map(|buyer| {
        app.post(
            "/api/tickets/book",
            Some(&buyer.token),
            json!({ "eventId": event_id, "price": 5.0 }),
        )
    });
    let results = futures::future::join_all(requests).await;

    let booked = results.iter().filter(|(s, _)| *s == StatusCode::CREATED).count();
    assert_eq!(booked, 3);
    let (_, event) = app.get(&format!("/api/events/{}", event_id), None).await;
    assert_eq!(event["ticketsAvailable"], 0);
}

#[tokio::test]
async fn paid_booking_blocks_duplicates_but_pending_does_not() {
    let app = spawn_app();
    let organizer = app.register("Olga", "olga@example.com", "organizer").await;
    let attendee = app.register("Anna", "anna@example.com", "attendee").await;
    let event = app.create_event(&organizer, "Conf", 10, 50.0).await;
    let request = json!({ "event": event["_id"], "totalAmount": 55.0, "numberOfTickets": 1 });

    let (status, first) = app.post("/api/bookings", Some(&attendee.token), request.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["paymentStatus"], "Pending");

    // Pending-дубли разрешены
    let (status, _) = app.post("/api/bookings", Some(&attendee.token), request.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, updated) = app
        .request(
            Method::PUT,
            &format!("/api/bookings/{}", first["_id"].as_str().unwrap()),
            Some(&attendee.token),
            Some(json!({ "paymentStatus": "Paid" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], "Booking updated successfully");
    assert_eq!(updated["booking"]["paymentStatus"], "Paid");

    let (status, err) = app.post("/api/bookings", Some(&attendee.token), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["message"], "User is already registered for this event.");
}

#[tokio::test]
async fn booking_for_missing_event_is_not_found() {
    let app = spawn_app();
    let attendee = app.register("Anna", "anna@example.com", "attendee").await;

    let (status, body) = app
        .post(
            "/api/bookings",
            Some(&attendee.token),
            json!({ "event": uuid::Uuid::new_v4(), "totalAmount": 1.0, "numberOfTickets": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Event not found");
}

#[tokio::test]
async fn bookings_are_limited_to_owner_or_admin() {
    let app = spawn_app();
    let organizer = app.register("Olga", "olga@example.com", "organizer").await;
    let owner = app.register("Anna", "anna@example.com", "attendee").await;
    let stranger = app.register("Sam", "sam@example.com", "attendee").await;
    let admin = app.create_admin("Root", "root@example.com").await;
    let event = app.create_event(&organizer, "Conf", 10, 50.0).await;

    let (_, booking) = app
        .post(
            "/api/bookings",
            Some(&owner.token),
            json!({ "event": event["_id"], "totalAmount": 55.0, "numberOfTickets": 2 }),
        )
        .await;
    let booking_uri = format!("/api/bookings/{}", booking["_id"].as_str().unwrap());

    let (status, _) = app
        .request(Method::DELETE, &booking_uri, Some(&stranger.token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .get(&format!("/api/bookings/user/{}", owner.id), Some(&stranger.token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, list) = app
        .get(&format!("/api/bookings/user/{}", owner.id), Some(&admin.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["event"]["name"], "Conf");
    assert_eq!(list[0]["user"]["email"], "anna@example.com");

    let (status, _) = app.get("/api/bookings", Some(&owner.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, all) = app.get("/api/bookings", Some(&admin.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, body) = app
        .request(Method::DELETE, &booking_uri, Some(&owner.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Booking deleted successfully");

    let (status, body) = app
        .get(&format!("/api/bookings/user/{}", owner.id), Some(&owner.token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No bookings found for this user.");

    let (status, body) = app.get("/api/bookings/user/not-an-id", Some(&owner.token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid userId");
}

#[tokio::test]
async fn purchase_reserves_ticket_and_charges_with_tax() {
    let app = spawn_app();
    let organizer = app.register("Olga", "olga@example.com", "organizer").await;
    let attendee = app.register("Anna", "anna@example.com", "attendee").await;
    let event = app.create_event(&organizer, "Conf", 2, 20.0).await;
    let event_id = event["_id"].as_str().unwrap();

    let (status, body) = app
        .post("/api/tickets/purchase", Some(&attendee.token), json!({ "eventId": event_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["booking"]["paymentStatus"], "Pending");
    assert_eq!(body["ticket"]["paymentStatus"], "pending");
    assert!(body["clientSecret"].as_str().unwrap().contains("_secret_"));
    assert!((body["totalAmount"].as_f64().unwrap() - 22.0).abs() < 1e-9);

    let charged = app.gateway.last_amount.lock().unwrap().clone();
    assert_eq!(charged, Some((2200, "usd".to_string())));

    let (_, event) = app.get(&format!("/api/events/{}", event_id), None).await;
    assert_eq!(event["ticketsAvailable"], 1);
}

#[tokio::test]
async fn confirming_payment_marks_purchased_ticket_paid() {
    let app = spawn_app();
    let organizer = app.register("Olga", "olga@example.com", "organizer").await;
    let attendee = app.register("Anna", "anna@example.com", "attendee").await;
    let event = app.create_event(&organizer, "Conf", 2, 20.0).await;
    let event_id = event["_id"].as_str().unwrap();

    let (status, purchase) = app
        .post("/api/tickets/purchase", Some(&attendee.token), json!({ "eventId": event_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", purchase);
    assert_eq!(purchase["booking"]["ticketId"], purchase["ticket"]["_id"]);
    let booking_uri = format!("/api/bookings/{}", purchase["booking"]["_id"].as_str().unwrap());

    let (status, body) = app
        .request(
            Method::PUT,
            &booking_uri,
            Some(&attendee.token),
            Some(json!({ "paymentStatus": "Paid" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["paymentStatus"], "Paid");

    let (status, tickets) = app.get("/api/tickets/my-tickets", Some(&attendee.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tickets.as_array().unwrap().len(), 1);
    assert_eq!(tickets[0]["paymentStatus"], "paid");

    // Оплаченная покупка не снимается очисткой
    let cleanup = PurchaseCleanup::with_ttl(app.state.clone(), ChronoDuration::zero());
    assert_eq!(cleanup.run_once().await.unwrap(), 0);
    let (_, event) = app.get(&format!("/api/events/{}", event_id), None).await;
    assert_eq!(event["ticketsAvailable"], 1);
}

#[tokio::test]
async fn expired_unpaid_purchase_returns_seat() {
    let app = spawn_app();
    let organizer = app.register("Olga", "olga@example.com", "organizer").await;
    let attendee = app.register("Anna", "anna@example.com", "attendee").await;
    let other = app.register("Bob", "bob@example.com", "attendee").await;
    let event = app.create_event(&organizer, "Conf", 1, 20.0).await;
    let event_id = event["_id"].as_str().unwrap();

    let (status, _) = app
        .post("/api/tickets/purchase", Some(&attendee.token), json!({ "eventId": event_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post("/api/tickets/purchase", Some(&other.token), json!({ "eventId": event_id }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No tickets available for this event");

    // С обычным ttl свежий резерв остается
    assert_eq!(PurchaseCleanup::new(app.state.clone()).run_once().await.unwrap(), 0);

    let cleanup = PurchaseCleanup::with_ttl(app.state.clone(), ChronoDuration::zero());
    assert_eq!(cleanup.run_once().await.unwrap(), 1);

    let (_, stored) = app.get(&format!("/api/events/{}", event_id), None).await;
    assert_eq!(stored["ticketsAvailable"], 1);
    let (status, _) = app.get("/api/tickets/my-tickets", Some(&attendee.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .get(&format!("/api/bookings/user/{}", attendee.id), Some(&attendee.token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post("/api/tickets/purchase", Some(&other.token), json!({ "eventId": event_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn failed_payment_releases_reservation() {
    let app = spawn_app();
    let organizer = app.register("Olga", "olga@example.com", "organizer").await;
    let attendee = app.register("Anna", "anna@example.com", "attendee").await;
    let event = app.create_event(&organizer, "Conf", 1, 20.0).await;
    let event_id = event["_id"].as_str().unwrap();
    app.gateway.failing.store(true, Ordering::SeqCst);

    let (status, body) = app
        .post("/api/tickets/purchase", Some(&attendee.token), json!({ "eventId": event_id }))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["message"], "Error creating payment intent");

    let (_, event) = app.get(&format!("/api/events/{}", event_id), None).await;
    assert_eq!(event["ticketsAvailable"], 1);
    let (status, _) = app.get("/api/tickets/my-tickets", Some(&attendee.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .get(&format!("/api/bookings/user/{}", attendee.id), Some(&attendee.token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payment_intent_endpoint_returns_client_secret() {
    let app = spawn_app();

    let (status, body) = app
        .post(
            "/api/payments/create-payment-intent",
            None,
            json!({ "amount": 1999, "currency": "EUR" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clientSecret"], "pi_0_secret_test");
    assert_eq!(
        app.gateway.last_amount.lock().unwrap().clone(),
        Some((1999, "eur".to_string()))
    );

    app.gateway.failing.store(true, Ordering::SeqCst);
    let (status, _) = app
        .post(
            "/api/payments/create-payment-intent",
            None,
            json!({ "amount": 1999, "currency": "usd" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
