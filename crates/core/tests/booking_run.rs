//! Booking run integration tests.
//!
//! Drive a full run against the scripted browser surface:
//! browser_init -> login -> train_search -> train_selection ->
//! passenger_details -> payment -> confirmation

use std::sync::Arc;
use std::time::Duration;

use tatkal_core::{
    bot::selectors,
    input::InputKind,
    testing::{fixtures, MockLauncher, SurfaceCall},
    BookingBot, BookingEvent, BookingRunner, BookingStatus, BotError, BotFactory, BotRunner,
    BotSettings, BotStep, EventHandle, ResultStore, RunError, RunRegistry, SqliteResultStore,
};

fn bot(launcher: &MockLauncher, settings: BotSettings) -> Arc<BookingBot> {
    Arc::new(BookingBot::new(
        "run_test",
        fixtures::booking_config(),
        settings,
        Arc::new(launcher.clone()),
        fixtures::credential_provider(),
        EventHandle::disconnected(),
    ))
}

async fn wait_for_prompt(bot: &BookingBot, kind: InputKind) {
    for _ in 0..200 {
        if bot.get_status().pending_input == Some(kind) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run never asked for {}", kind);
}

#[tokio::test]
async fn test_successful_run() {
    let launcher = fixtures::happy_launcher();
    let (events, mut rx) = tatkal_core::create_event_bus(256);
    let bot = BookingBot::new(
        "run_ok",
        fixtures::booking_config(),
        fixtures::bot_settings(),
        Arc::new(launcher.clone()),
        fixtures::credential_provider(),
        events,
    );

    let result = bot.run().await.unwrap();

    assert_eq!(result.status, BookingStatus::Success);
    assert_eq!(result.pnr.as_deref(), Some(fixtures::PNR));
    assert_eq!(result.run_id, "run_ok");
    assert_eq!(launcher.launch_count(), 1);
    assert_eq!(launcher.close_count(), 1);

    let status = bot.get_status();
    assert_eq!(status.step, BotStep::Success);
    assert!(!status.running);
    assert!(!status.waiting_for_input);

    let calls = launcher.calls();
    assert_eq!(
        calls[0],
        SurfaceCall::Navigate("https://booking.test/nget/train-search".to_string())
    );
    assert!(calls.contains(&SurfaceCall::Fill(
        selectors::USER_ID.to_string(),
        "asha.rao".to_string()
    )));
    assert!(calls.contains(&SurfaceCall::Select(
        selectors::JOURNEY_CLASS.to_string(),
        "3A".to_string()
    )));
    assert!(calls.contains(&SurfaceCall::Select(
        selectors::JOURNEY_QUOTA.to_string(),
        "TQ".to_string()
    )));
    assert!(calls.contains(&SurfaceCall::Fill(
        selectors::passenger_name(0),
        "Asha Rao".to_string()
    )));

    let mut steps = Vec::new();
    let mut finished = None;
    while let Ok(envelope) = rx.try_recv() {
        match envelope.event {
            BookingEvent::Status { step, .. } => {
                if steps.last() != Some(&step) {
                    steps.push(step);
                }
            }
            BookingEvent::Finished { result } => finished = Some(result),
            _ => {}
        }
    }
    assert_eq!(
        steps,
        vec![
            BotStep::BrowserInit,
            BotStep::Login,
            BotStep::TrainSearch,
            BotStep::TrainSelection,
            BotStep::PassengerDetails,
            BotStep::Payment,
            BotStep::Confirmation,
            BotStep::Success,
        ]
    );
    assert_eq!(finished, Some(result));
}

#[tokio::test]
async fn test_run_only_starts_once() {
    let launcher = fixtures::happy_launcher();
    let bot = bot(&launcher, fixtures::bot_settings());

    bot.run().await.unwrap();
    assert!(matches!(bot.run().await, Err(BotError::AlreadyStarted)));
    assert_eq!(launcher.launch_count(), 1);
}

#[tokio::test]
async fn test_captcha_timeout_fails_and_releases_browser() {
    let launcher = fixtures::happy_launcher();
    launcher.present([selectors::LOGIN_CAPTCHA]);
    let bot = bot(&launcher, fixtures::bot_settings());

    let result = bot.run().await.unwrap();

    assert_eq!(result.status, BookingStatus::Failed);
    assert!(result
        .detail
        .unwrap()
        .contains("waiting for captcha input"));
    assert_eq!(bot.get_status().step, BotStep::Failed);
    assert!(bot.outstanding_input().is_none());
    assert_eq!(launcher.close_count(), 1);
}

#[tokio::test]
async fn test_captcha_answer_resumes_run() {
    let launcher = fixtures::happy_launcher();
    launcher.present([selectors::LOGIN_CAPTCHA]);
    let mut settings = fixtures::bot_settings();
    settings.input_timeout = Duration::from_secs(5);
    let (events, mut rx) = tatkal_core::create_event_bus(256);
    let bot = Arc::new(BookingBot::new(
        "run_test",
        fixtures::booking_config(),
        settings,
        Arc::new(launcher.clone()),
        fixtures::credential_provider(),
        events,
    ));

    let handle = tokio::spawn({
        let bot = bot.clone();
        async move { bot.run().await }
    });

    wait_for_prompt(&bot, InputKind::Captcha).await;
    let status = bot.get_status();
    assert_eq!(status.step, BotStep::WaitingCaptcha);
    assert!(status.waiting_for_input);
    assert!(bot.outstanding_input().unwrap().payload.is_some());

    assert!(!bot.submit_input(InputKind::Otp, "123456"));
    assert!(bot.submit_input(InputKind::Captcha, "XK7P2"));

    let result = handle.await.unwrap().unwrap();
    assert!(result.is_success());
    assert!(launcher.calls().contains(&SurfaceCall::Fill(
        selectors::LOGIN_CAPTCHA.to_string(),
        "XK7P2".to_string()
    )));

    // Once answered, messages belong to the step that asked again
    let mut resumed_in = Vec::new();
    let mut accepted = false;
    while let Ok(envelope) = rx.try_recv() {
        match envelope.event {
            BookingEvent::InputAccepted { .. } => accepted = true,
            BookingEvent::Status { step, .. } if accepted && resumed_in.len() < 2 => {
                resumed_in.push(step)
            }
            _ => {}
        }
    }
    assert!(accepted);
    assert_eq!(resumed_in, vec![BotStep::Login, BotStep::Login]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_otp_prompt_after_captcha_is_reported() {
    for _ in 0..20 {
        let launcher = fixtures::happy_launcher();
        launcher.present([selectors::LOGIN_CAPTCHA, selectors::OTP_MODAL]);
        let mut settings = fixtures::bot_settings();
        settings.input_timeout = Duration::from_secs(5);
        let bot = bot(&launcher, settings);

        let registry = RunRegistry::new();
        registry.register(bot.clone()).await;
        let handle = tokio::spawn({
            let bot = bot.clone();
            async move { bot.run().await }
        });

        wait_for_prompt(&bot, InputKind::Captcha).await;
        assert!(bot.submit_input(InputKind::Captcha, "XK7P2"));

        for _ in 0..200 {
            if bot.outstanding_input().map(|r| r.kind) == Some(InputKind::Otp) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let status = bot.get_status();
        assert_eq!(status.step, BotStep::WaitingOtp);
        assert!(status.waiting_for_input);
        assert_eq!(status.pending_input, Some(InputKind::Otp));

        assert_eq!(
            registry.submit_to_waiting(InputKind::Otp, "482913").await,
            Some("run_test".to_string())
        );
        assert!(handle.await.unwrap().unwrap().is_success());
    }
}

#[tokio::test]
async fn test_otp_prompt_is_answered() {
    let launcher = fixtures::happy_launcher();
    launcher.present([selectors::OTP_MODAL]);
    let mut settings = fixtures::bot_settings();
    settings.input_timeout = Duration::from_secs(5);
    let bot = bot(&launcher, settings);

    let handle = tokio::spawn({
        let bot = bot.clone();
        async move { bot.run().await }
    });

    wait_for_prompt(&bot, InputKind::Otp).await;
    assert!(bot.submit_input(InputKind::Otp, "482913"));

    let result = handle.await.unwrap().unwrap();
    assert!(result.is_success());
    let calls = launcher.calls();
    assert!(calls.contains(&SurfaceCall::Fill(
        selectors::OTP_INPUT.to_string(),
        "482913".to_string()
    )));
    assert!(calls.contains(&SurfaceCall::Click(selectors::OTP_CONTINUE.to_string())));
}

#[tokio::test]
async fn test_submit_input_without_prompt_changes_nothing() {
    let launcher = fixtures::happy_launcher();
    let bot = bot(&launcher, fixtures::bot_settings());

    let before = bot.get_status();
    assert!(!bot.submit_input(InputKind::Captcha, "ABCD"));
    assert_eq!(bot.get_status(), before);
}

#[tokio::test]
async fn test_stop_before_start() {
    let launcher = fixtures::happy_launcher();
    let bot = bot(&launcher, fixtures::bot_settings());

    bot.stop();
    bot.stop();
    assert!(bot.is_stop_requested());

    let result = bot.run().await.unwrap();
    assert_eq!(result.status, BookingStatus::Failed);
    assert_eq!(result.detail.as_deref(), Some("Booking stopped by user"));
    assert_eq!(bot.get_status().step, BotStep::Stopped);
    assert_eq!(launcher.launch_count(), 0);
    assert_eq!(launcher.close_count(), 0);
}

#[tokio::test]
async fn test_stop_while_waiting_for_input() {
    let launcher = fixtures::happy_launcher();
    launcher.present([selectors::LOGIN_CAPTCHA]);
    let mut settings = fixtures::bot_settings();
    settings.input_timeout = Duration::from_secs(30);
    let bot = bot(&launcher, settings);

    let handle = tokio::spawn({
        let bot = bot.clone();
        async move { bot.run().await }
    });

    wait_for_prompt(&bot, InputKind::Captcha).await;
    bot.stop();

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("run did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(result.status, BookingStatus::Failed);
    assert_eq!(bot.get_status().step, BotStep::Stopped);
    assert_eq!(launcher.close_count(), 1);
}

#[tokio::test]
async fn test_repeated_stop_cleans_up_once() {
    let launcher = fixtures::happy_launcher();
    launcher.present([selectors::OTP_MODAL]);
    let mut settings = fixtures::bot_settings();
    settings.input_timeout = Duration::from_secs(30);
    let (events, mut rx) = tatkal_core::create_event_bus(256);
    let bot = Arc::new(BookingBot::new(
        "run_twice",
        fixtures::booking_config(),
        settings,
        Arc::new(launcher.clone()),
        fixtures::credential_provider(),
        events,
    ));

    let handle = tokio::spawn({
        let bot = bot.clone();
        async move { bot.run().await }
    });

    wait_for_prompt(&bot, InputKind::Otp).await;
    bot.stop();
    bot.stop();

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("run did not stop")
        .unwrap()
        .unwrap();
    bot.stop();

    assert_eq!(result.status, BookingStatus::Failed);
    assert_eq!(bot.get_status().step, BotStep::Stopped);
    assert_eq!(launcher.launch_count(), 1);
    assert_eq!(launcher.close_count(), 1);

    let mut finished = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        if let BookingEvent::Finished { result } = envelope.event {
            finished.push(result);
        }
    }
    assert_eq!(finished, vec![result]);
}

#[tokio::test]
async fn test_step_error_names_the_step() {
    let launcher = fixtures::happy_launcher();
    launcher.fail_on(selectors::SEARCH, "element not interactable");
    let bot = bot(&launcher, fixtures::bot_settings());

    let result = bot.run().await.unwrap();

    let detail = result.detail.unwrap();
    assert_eq!(result.status, BookingStatus::Failed);
    assert!(detail.starts_with("train_search failed"));
    assert!(detail.contains("element not interactable"));
    assert_eq!(launcher.close_count(), 1);
}

#[tokio::test]
async fn test_launch_failure_fails_without_release() {
    let launcher = fixtures::happy_launcher();
    launcher.set_fail_launch(true);
    let bot = bot(&launcher, fixtures::bot_settings());

    let result = bot.run().await.unwrap();

    assert_eq!(result.status, BookingStatus::Failed);
    assert!(result.detail.unwrap().contains("mock launch failure"));
    assert_eq!(launcher.close_count(), 0);
}

#[tokio::test]
async fn test_unknown_credentials_fail_login() {
    let launcher = fixtures::happy_launcher();
    let mut config = fixtures::booking_config();
    config.credentials = "secondary".to_string();
    let bot = BookingBot::new(
        "run_creds",
        config,
        fixtures::bot_settings(),
        Arc::new(launcher.clone()),
        fixtures::credential_provider(),
        EventHandle::disconnected(),
    );

    let result = bot.run().await.unwrap();
    assert_eq!(result.status, BookingStatus::Failed);
    assert!(result.detail.unwrap().contains("secondary"));
}

#[tokio::test]
async fn test_preferred_train_falls_back_to_first_bookable() {
    let launcher = fixtures::happy_launcher();
    let mut config = fixtures::booking_config();
    config.train_number = Some("12951".to_string());
    let bot = BookingBot::new(
        "run_train",
        config,
        fixtures::bot_settings(),
        Arc::new(launcher.clone()),
        fixtures::credential_provider(),
        EventHandle::disconnected(),
    );

    assert!(bot.run().await.unwrap().is_success());
    let calls = launcher.calls();
    assert!(!calls.contains(&SurfaceCall::Click(selectors::train("12951"))));
    assert!(calls.contains(&SurfaceCall::Click(selectors::FIRST_BOOKABLE.to_string())));
}

#[tokio::test]
async fn test_missing_confirmation_is_unknown() {
    let launcher = fixtures::happy_launcher();
    launcher.remove(selectors::PNR_DETAILS);
    let bot = bot(&launcher, fixtures::bot_settings());

    let result = bot.run().await.unwrap();
    assert_eq!(result.status, BookingStatus::Unknown);
    assert_eq!(result.detail.as_deref(), Some("Confirmation page did not load"));
    assert_eq!(bot.get_status().step, BotStep::Unknown);
}

#[tokio::test]
async fn test_rejected_booking_reports_site_message() {
    let launcher = fixtures::happy_launcher();
    launcher
        .remove(selectors::PNR_NUMBER)
        .set_text(selectors::BOOKING_FAILED, "  No seats available ");
    let bot = bot(&launcher, fixtures::bot_settings());

    let result = bot.run().await.unwrap();
    assert_eq!(result.status, BookingStatus::Failed);
    assert_eq!(result.detail.as_deref(), Some("No seats available"));
}

#[tokio::test]
async fn test_bot_runner_stores_result_and_unregisters() {
    let launcher = fixtures::happy_launcher();
    let store = Arc::new(SqliteResultStore::in_memory().unwrap());
    let registry = RunRegistry::new();
    let factory = BotFactory::new(
        fixtures::bot_settings(),
        Arc::new(launcher),
        fixtures::credential_provider(),
        EventHandle::disconnected(),
    );
    let runner = BotRunner::new(factory.clone(), registry.clone(), Some(store.clone()));

    let result = runner
        .run("run_stored", fixtures::booking_config())
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(registry.is_empty().await);
    let stored = store.get("run_stored").unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Success);
    assert_eq!(stored.pnr, result.pnr);
}

#[tokio::test]
async fn test_bot_runner_rejects_duplicate_run_id() {
    let registry = RunRegistry::new();
    let factory = BotFactory::new(
        fixtures::bot_settings(),
        Arc::new(fixtures::happy_launcher()),
        fixtures::credential_provider(),
        EventHandle::disconnected(),
    );
    let runner = BotRunner::new(factory.clone(), registry.clone(), None);

    let active = Arc::new(factory.create("run_dup", fixtures::booking_config()));
    assert!(registry.register(active).await);

    let err = runner
        .run("run_dup", fixtures::booking_config())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Duplicate(id) if id == "run_dup"));
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_registry_routes_input_to_waiting_run() {
    let launcher = fixtures::happy_launcher();
    launcher.present([selectors::LOGIN_CAPTCHA]);
    let mut settings = fixtures::bot_settings();
    settings.input_timeout = Duration::from_secs(5);
    let bot = bot(&launcher, settings);

    let registry = RunRegistry::new();
    registry.register(bot.clone()).await;
    let handle = tokio::spawn({
        let bot = bot.clone();
        async move { bot.run().await }
    });

    wait_for_prompt(&bot, InputKind::Captcha).await;
    assert_eq!(registry.submit_to_waiting(InputKind::Otp, "123456").await, None);
    assert_eq!(
        registry.submit_to_waiting(InputKind::Captcha, "QW3RT").await,
        Some("run_test".to_string())
    );
    assert_eq!(registry.submit_input("run_missing", InputKind::Captcha, "QW3RT").await, None);

    assert!(handle.await.unwrap().unwrap().is_success());
}
