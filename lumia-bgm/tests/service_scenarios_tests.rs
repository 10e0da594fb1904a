//! End-to-end scenarios through the background music service
//!
//! Signals go in through the public facade; outcomes are read from the
//! session status and the simulated platform's counters.

mod helpers;

use helpers::*;
use lumia_bgm::audio::simulated::AudioOpKind;
use lumia_bgm::console::{apply_command, parse_command, CommandOutcome};
use lumia_bgm::preferences::{Preference, StoredPreference};
use lumia_bgm::service::RouteFocus;
use lumia_bgm::Error;
use lumia_common::events::{SessionErrorKind, SessionEvent, SessionPhase};
use lumia_common::TrackId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_startup_plays_selected_track_once() {
    let harness = start(memory_store(Some(true), Some(1)));

    harness.service.wait_ready().await;
    let status = harness.service.settled().await;

    assert!(status.is_playing(TrackId(1)));
    assert_eq!(harness.audio.count(AudioOpKind::Create, MUSIC1), 1);
    assert_eq!(harness.audio.count(AudioOpKind::Play, MUSIC1), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_run_uses_default_preferences() {
    let harness = start(memory_store(None, None));

    harness.service.wait_ready().await;
    let status = harness.service.settled().await;

    assert_eq!(
        harness.service.preference(),
        Preference {
            enabled: true,
            selected_track: Some(TrackId(1)),
        }
    );
    assert!(status.is_playing(TrackId(1)));
}

#[tokio::test(start_paused = true)]
async fn test_viewport_churn_plays_only_last_item() {
    let mut harness = start(memory_store(Some(false), None));
    harness.service.wait_ready().await;

    harness.service.notify_route_change("/healing", true);
    sleep(Duration::from_millis(30)).await;
    harness.service.notify_visible_index(1);
    sleep(Duration::from_millis(30)).await;
    harness.service.notify_visible_index(2);

    let status = harness.service.settled().await;

    assert!(status.is_playing(TrackId(13)));
    assert_eq!(harness.audio.count(AudioOpKind::Play, FIRE), 0);
    assert_eq!(harness.audio.count(AudioOpKind::Play, RAIN), 0);
    assert_eq!(harness.audio.peak_live_handles(), 1);
    assert_eq!(harness.audio.live_handles(), 1);

    let events = drain(&mut harness.events);
    assert_eq!(started_tracks(&events), vec![TrackId(13)]);
    assert_eq!(stale_tracks(&events), vec![TrackId(11)]);
}

#[tokio::test(start_paused = true)]
async fn test_muted_route_silences_playing_track() {
    let harness = start(memory_store(Some(true), Some(1)));
    harness.service.wait_ready().await;
    assert!(harness.service.settled().await.is_playing(TrackId(1)));

    harness.service.notify_route_change("/settings", true);
    let status = harness.service.settled().await;

    assert_eq!(status.phase, SessionPhase::Idle);
    assert_eq!(harness.audio.live_handles(), 0);
    assert_eq!(harness.audio.leaked_handles(), 0);

    harness.service.notify_route_change("/board", true);
    assert!(harness.service.settled().await.is_playing(TrackId(1)));
}

#[tokio::test(start_paused = true)]
async fn test_toggle_recreates_selected_track_once() {
    let harness = start(memory_store(Some(true), Some(2)));
    harness.service.wait_ready().await;
    assert!(harness.service.settled().await.is_playing(TrackId(2)));

    harness.service.set_enabled(false);
    harness.service.set_enabled(true);
    let status = harness.service.settled().await;

    assert!(status.is_playing(TrackId(2)));
    assert_eq!(harness.audio.count(AudioOpKind::Create, MUSIC2), 2);
    assert_eq!(harness.audio.count(AudioOpKind::Unload, MUSIC2), 1);
    assert_eq!(harness.audio.live_handles(), 1);
    assert_eq!(harness.audio.peak_live_handles(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reenable_recovers_from_create_failure() {
    let harness = start(memory_store(Some(true), Some(1)));
    harness.audio.fail_create(MUSIC1);

    harness.service.wait_ready().await;
    let status = harness.service.settled().await;
    assert_eq!(status.phase, SessionPhase::Idle);
    assert_eq!(status.epoch, 1);

    harness.audio.clear_faults();
    harness.service.set_enabled(true);
    harness.service.select_track(TrackId(1)).unwrap();
    let status = harness.service.settled().await;

    assert!(status.is_playing(TrackId(1)));
    assert_eq!(harness.audio.count(AudioOpKind::Create, MUSIC1), 1);
    assert_eq!(harness.audio.live_handles(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reselect_recovers_from_play_failure() {
    let mut harness = start(memory_store(Some(true), Some(2)));
    harness.audio.fail_play(MUSIC2);

    harness.service.wait_ready().await;
    assert_eq!(harness.service.settled().await.phase, SessionPhase::Idle);
    assert_eq!(harness.audio.live_handles(), 0);

    harness.audio.clear_faults();
    harness.service.select_track(TrackId(2)).unwrap();
    let status = harness.service.settled().await;

    assert!(status.is_playing(TrackId(2)));
    assert_eq!(harness.audio.count(AudioOpKind::Play, MUSIC2), 1);
    let events = drain(&mut harness.events);
    assert_eq!(error_kinds(&events), vec![SessionErrorKind::ResourcePlayFailed]);
    assert_eq!(started_tracks(&events), vec![TrackId(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_load_failure_keeps_viewport_path() {
    let mut harness = start(Arc::new(FailingStore));

    harness.service.wait_ready().await;
    assert!(harness.service.is_ready());
    assert_eq!(harness.service.preference(), Preference::disabled());
    assert_eq!(harness.service.settled().await.phase, SessionPhase::Idle);

    harness.service.notify_route_change("/healing", true);
    harness.service.notify_visible_index(1);
    let status = harness.service.settled().await;

    assert!(status.is_playing(TrackId(12)));
    let events = drain(&mut harness.events);
    assert!(error_kinds(&events).contains(&SessionErrorKind::PreferenceLoadFailed));
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::PreferencesReady { enabled: false, selected_track: None, .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_no_background_activation_before_load() {
    let store = Arc::new(GatedStore::new(StoredPreference {
        enabled: Some(true),
        selected_track: Some(TrackId(1)),
    }));
    let harness = start(store.clone());

    harness.service.notify_route_change("/board", true);
    sleep(Duration::from_secs(1)).await;

    assert!(!harness.service.is_ready());
    assert_eq!(harness.service.status().phase, SessionPhase::Idle);
    assert!(harness.audio.operations().is_empty());

    store.release();
    harness.service.wait_ready().await;

    assert!(harness.service.settled().await.is_playing(TrackId(1)));
}

#[tokio::test(start_paused = true)]
async fn test_viewport_plays_before_load() {
    let store = Arc::new(GatedStore::new(StoredPreference::default()));
    let harness = start(store.clone());

    harness.service.notify_route_change("/healing", true);
    let status = harness.service.settled().await;

    assert!(!harness.service.is_ready());
    assert!(status.is_playing(TrackId(11)));
    store.release();
}

#[tokio::test(start_paused = true)]
async fn test_user_choice_before_load_wins() {
    let store = Arc::new(GatedStore::new(StoredPreference {
        enabled: Some(false),
        selected_track: Some(TrackId(1)),
    }));
    let harness = start(store.clone());

    harness.service.set_enabled(true);
    harness.service.select_track(TrackId(2)).unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(harness.service.status().phase, SessionPhase::Idle);

    store.release();
    harness.service.wait_ready().await;

    assert_eq!(
        harness.service.preference(),
        Preference {
            enabled: true,
            selected_track: Some(TrackId(2)),
        }
    );
    assert!(harness.service.settled().await.is_playing(TrackId(2)));
}

#[tokio::test(start_paused = true)]
async fn test_route_refocus_resumes_last_page() {
    let harness = start(memory_store(Some(true), Some(1)));
    harness.service.wait_ready().await;

    harness.service.notify_route_change("/healing", true);
    harness.service.notify_visible_index(1);
    assert!(harness.service.settled().await.is_playing(TrackId(12)));

    harness.service.notify_route_change("/board", true);
    assert!(harness.service.settled().await.is_playing(TrackId(1)));

    harness.service.notify_route_change("/healing", true);
    assert!(harness.service.settled().await.is_playing(TrackId(12)));
    assert_eq!(harness.audio.peak_live_handles(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_select_unknown_track_rejected() {
    let harness = start(memory_store(Some(true), Some(1)));
    harness.service.wait_ready().await;

    let result = harness.service.select_track(TrackId(99));

    assert!(matches!(result, Err(Error::UnknownTrack(TrackId(99)))));
    assert_eq!(harness.service.preference().selected_track, Some(TrackId(1)));
}

#[tokio::test(start_paused = true)]
async fn test_attached_event_sources_drive_gate() {
    let harness = start(memory_store(Some(false), None));
    harness.service.wait_ready().await;

    let (route_tx, route_rx) = mpsc::unbounded_channel();
    let (index_tx, index_rx) = mpsc::unbounded_channel();
    harness.service.attach_route_events(route_rx);
    harness.service.attach_viewport_events(index_rx);

    route_tx.send(RouteFocus::focus("/healing")).unwrap();
    sleep(Duration::from_millis(1)).await;
    index_tx.send(1).unwrap();
    sleep(Duration::from_millis(1)).await;

    assert!(harness.service.settled().await.is_playing(TrackId(12)));
    assert_eq!(
        harness.service.active_context().visible_item_track_id,
        Some(TrackId(12))
    );

    route_tx.send(RouteFocus::blur("/healing")).unwrap();
    sleep(Duration::from_millis(1)).await;
    assert_eq!(harness.service.settled().await.phase, SessionPhase::Idle);

    let status = harness.service.teardown().await;
    assert_eq!(status.phase, SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_releases_resource_and_drains_writes() {
    let store = memory_store(Some(true), Some(1));
    let harness = start(store.clone());
    harness.service.wait_ready().await;
    harness.service.settled().await;

    harness.service.select_track(TrackId(2)).unwrap();
    harness.service.set_enabled(false);
    let audio = harness.audio.clone();
    let status = harness.service.teardown().await;

    assert_eq!(status.phase, SessionPhase::Idle);
    assert_eq!(audio.live_handles(), 0);
    assert_eq!(audio.leaked_handles(), 0);
    assert_eq!(
        store.snapshot(),
        StoredPreference {
            enabled: Some(false),
            selected_track: Some(TrackId(2)),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_save_failure_is_reported() {
    let Harness {
        service, mut events, ..
    } = start(Arc::new(FailingStore));
    service.wait_ready().await;

    service.set_enabled(true);
    service.teardown().await;

    assert!(error_kinds(&drain(&mut events)).contains(&SessionErrorKind::PreferenceSaveFailed));
}

#[tokio::test(start_paused = true)]
async fn test_console_commands_apply_in_input_order() {
    let harness = start(memory_store(Some(true), Some(1)));
    harness.service.wait_ready().await;
    assert!(harness.service.settled().await.is_playing(TrackId(1)));

    let script = ["route /healing", "index 2", "enable off", "route /healing blur", "enable on"];
    for line in script {
        let command = parse_command(line).unwrap().unwrap();
        let outcome = apply_command(&harness.service, command).unwrap();
        assert_eq!(outcome, CommandOutcome::Continue);
    }

    // Applied without yielding, so the gate already reflects every line
    let context = harness.service.active_context();
    assert_eq!(context.route_id.as_deref(), Some("/healing"));
    assert!(!context.is_route_focused);
    assert!(harness.service.preference().enabled);

    assert!(harness.service.settled().await.is_playing(TrackId(1)));
    assert_eq!(harness.audio.count(AudioOpKind::Play, WIND), 0);
}

#[tokio::test(start_paused = true)]
async fn test_console_status_and_rejected_select() {
    let harness = start(memory_store(Some(true), Some(1)));
    harness.service.wait_ready().await;
    harness.service.settled().await;

    let select = parse_command("select 99").unwrap().unwrap();
    assert!(matches!(
        apply_command(&harness.service, select),
        Err(Error::UnknownTrack(TrackId(99)))
    ));

    let status = parse_command("status").unwrap().unwrap();
    match apply_command(&harness.service, status).unwrap() {
        CommandOutcome::Status(status) => assert!(status.is_playing(TrackId(1))),
        other => panic!("unexpected outcome {:?}", other),
    }

    let quit = parse_command("quit").unwrap().unwrap();
    assert_eq!(apply_command(&harness.service, quit).unwrap(), CommandOutcome::Quit);
}
