//! Booking endpoints: validation, scheduling, queueing, immediate start.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use chrono::{Days, FixedOffset, Utc};
use serde_json::{json, Value};

use common::{fixtures, TestFixture};
use tatkal_core::TravelClass;

async fn wait_for_job(fixture: &TestFixture, job_id: &str, status: &str) -> Value {
    for _ in 0..100 {
        let response = fixture
            .get(&format!("/api/v1/bookings/scheduled/{}", job_id))
            .await;
        if response.body["status"] == status {
            return response.body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Job {} never reached {}", job_id, status);
}

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("ok"));
}

#[tokio::test]
async fn test_config_hides_passwords() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    let primary = &response.body["credentials"]["primary"];
    assert_eq!(primary["username"], "asha.rao");
    assert_eq!(primary["password_configured"], true);
    assert!(primary.get("password").is_none());
    assert!(!response.body.to_string().contains("s3cret"));
    assert_json_path!(
        response.body["security"],
        "encryption_key_configured",
        json!(true)
    );
    assert!(!response.body.to_string().contains(common::SEALING_KEY));
}

#[tokio::test]
async fn test_validate_accepts_good_booking() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/bookings/validate", fixture.booking_json())
        .await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "valid", json!(true));
    assert_json_path!(response.body, "errors", json!([]));
}

#[tokio::test]
async fn test_validate_lists_every_problem() {
    let fixture = TestFixture::new().await;
    let mut booking = fixture.booking_json();
    booking["to_station"] = booking["from_station"].clone();
    booking["train_number"] = json!("12AB");

    let response = fixture.post("/api/v1/bookings/validate", booking).await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "valid", json!(false));
    assert_eq!(response.body["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_raw("/api/v1/bookings/validate", "{not json")
        .await;

    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_schedule_at_opening() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/bookings/schedule", json!({ "booking": fixture.booking_json() }))
        .await;

    assert_status!(response, StatusCode::CREATED);
    let job_id = response.body["job_id"].as_str().unwrap().to_string();
    assert!(job_id.starts_with("tatkal_"));

    // 3A opens at 10:00 +05:30 the day before the journey
    let journey = fixtures::booking_config().journey_date;
    let expected = format!("{}T04:30:00Z", journey.pred_opt().unwrap());
    assert_json_path!(response.body, "fire_at", json!(expected));

    let list = fixture.get("/api/v1/bookings/scheduled").await;
    assert_status!(list, StatusCode::OK);
    let jobs = list.body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], job_id.as_str());
    assert_eq!(jobs[0]["status"], "scheduled");
    assert_eq!(jobs[0]["journey"]["from_station"], "NDLS");
}

#[tokio::test]
async fn test_schedule_rejects_invalid_booking() {
    let fixture = TestFixture::new().await;
    let mut booking = fixture.booking_json();
    booking["passengers"] = json!([]);

    let response = fixture
        .post("/api/v1/bookings/schedule", json!({ "booking": booking }))
        .await;

    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert_json_path!(response.body, "error", json!("Booking validation failed"));
    assert_json_path!(
        response.body,
        "details",
        json!(["At least one passenger is required"])
    );
    assert!(fixture.scheduler.get_scheduled().is_empty());
}

#[tokio::test]
async fn test_schedule_after_opening_conflicts() {
    let fixture = TestFixture::new().await;
    let site_today = Utc::now()
        .with_timezone(&FixedOffset::east_opt(19_800).unwrap())
        .date_naive();
    let mut booking = fixture.booking_json();
    // Sleeper opens at 11:00 site time the day before; the window for a
    // journey tomorrow opened today, which may or may not be behind us.
    let tomorrow = site_today + Days::new(1);
    booking["journey_date"] = json!(tomorrow.to_string());
    booking["travel_class"] = json!("SL");

    let passed = fixture
        .scheduler
        .is_opening_time_passed(tomorrow, TravelClass::Sleeper);
    let response = fixture
        .post("/api/v1/bookings/schedule", json!({ "booking": booking }))
        .await;

    if passed {
        assert_status!(response, StatusCode::CONFLICT);
        assert!(response.body["error"].as_str().unwrap().contains("already opened"));
    } else {
        assert_status!(response, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn test_schedule_at_explicit_instant() {
    let fixture = TestFixture::new().await;

    let at = Utc::now() + chrono::Duration::minutes(5);
    let response = fixture
        .post(
            "/api/v1/bookings/schedule",
            json!({ "booking": fixture.booking_json(), "at": at }),
        )
        .await;
    assert_status!(response, StatusCode::CREATED);
    assert_json_path!(response.body, "fire_at", json!(at));
}

#[tokio::test]
async fn test_cancel_scheduled_job() {
    let fixture = TestFixture::new().await;
    let at = Utc::now() + chrono::Duration::hours(1);

    let response = fixture
        .post(
            "/api/v1/bookings/schedule",
            json!({ "booking": fixture.booking_json(), "at": at }),
        )
        .await;
    assert_status!(response, StatusCode::CREATED);
    let job_id = response.body["job_id"].as_str().unwrap().to_string();

    let cancel = fixture
        .delete(&format!("/api/v1/bookings/scheduled/{}", job_id))
        .await;
    assert_status!(cancel, StatusCode::OK);
    assert_json_path!(cancel.body, "cancelled", json!(true));

    let job = fixture
        .get(&format!("/api/v1/bookings/scheduled/{}", job_id))
        .await;
    assert_status!(job, StatusCode::OK);
    assert_json_path!(job.body, "status", json!("cancelled"));

    let again = fixture
        .delete(&format!("/api/v1/bookings/scheduled/{}", job_id))
        .await;
    assert_status!(again, StatusCode::CONFLICT);
    assert_eq!(
        again.body["error"],
        format!("Job {} is already cancelled", job_id)
    );
}

#[tokio::test]
async fn test_unknown_scheduled_job() {
    let fixture = TestFixture::new().await;

    let get = fixture.get("/api/v1/bookings/scheduled/tatkal_missing").await;
    assert_status!(get, StatusCode::NOT_FOUND);

    let cancel = fixture
        .delete("/api/v1/bookings/scheduled/tatkal_missing")
        .await;
    assert_status!(cancel, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_due_job_fires_and_completes() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/bookings/schedule",
            json!({ "booking": fixture.booking_json(), "at": Utc::now() }),
        )
        .await;
    assert_status!(response, StatusCode::CREATED);
    let job_id = response.body["job_id"].as_str().unwrap().to_string();

    let job = wait_for_job(&fixture, &job_id, "completed").await;
    assert_eq!(job["result"]["status"], "success");
    assert_eq!(job["result"]["pnr"], fixtures::PNR);
    assert_eq!(job["result"]["run_id"], job_id.as_str());

    // Jobs run through the shared runner, so the result is stored too
    let result = fixture.wait_for_result(&job_id).await;
    assert_eq!(result["pnr"], fixtures::PNR);
}

#[tokio::test]
async fn test_enqueue_runs_booking() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/bookings/queue",
            json!({ "booking": fixture.booking_json(), "priority": 3 }),
        )
        .await;

    assert_status!(response, StatusCode::CREATED);
    let item_id = response.body["item_id"].as_str().unwrap().to_string();
    assert!(item_id.starts_with("queue_"));

    let result = fixture.wait_for_result(&item_id).await;
    assert_eq!(result["status"], "success");

    for _ in 0..50 {
        let status = fixture.get("/api/v1/bookings/queue").await;
        assert_status!(status, StatusCode::OK);
        if status.body["running"] == 0 {
            assert_eq!(status.body["queued"], 0);
            let item = fixture.queue.get(&item_id).unwrap();
            assert_eq!(item.status.as_str(), "completed");
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Queue item {} never left the running set", item_id);
}

#[tokio::test]
async fn test_enqueue_rejects_invalid_booking() {
    let fixture = TestFixture::new().await;
    let mut booking = fixture.booking_json();
    booking["from_station"] = json!("new delhi");

    let response = fixture
        .post("/api/v1/bookings/queue", json!({ "booking": booking }))
        .await;

    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(fixture.queue.status().queued, 0);
}

#[tokio::test]
async fn test_start_books_and_stores_result() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/bookings/start", fixture.booking_json())
        .await;

    assert_status!(response, StatusCode::ACCEPTED);
    let run_id = response.body["run_id"].as_str().unwrap().to_string();
    assert!(run_id.starts_with("run_"));

    let result = fixture.wait_for_result(&run_id).await;
    assert_eq!(result["status"], "success");
    assert_eq!(result["pnr"], fixtures::PNR);
    assert_eq!(result["journey"]["to_station"], "BCT");

    let results = fixture.get("/api/v1/results").await;
    assert_status!(results, StatusCode::OK);
    let listed = results.body["results"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["run_id"], run_id.as_str());
    assert_eq!(fixture.launcher.launch_count(), 1);
}
