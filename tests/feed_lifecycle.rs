//! Integration tests for feed registration: validation, first sync, and
//! what a failed submission leaves behind.
//!
//! Each test builds its own engine over a scripted transport.

mod common;

use common::{engine, record_paths, rss, titles, Script, ScriptedTransport};
use feedsync::store::{RegistrationPhase, StateChange, SyncStatus};
use feedsync::sync::{ErrorKind, SyncError, ValidationError};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

const FEED: &str = "https://example.com/feed.xml";

// ============================================================================
// Successful registration
// ============================================================================

#[tokio::test]
async fn test_register_merges_first_sync() {
    let transport = ScriptedTransport::new();
    transport.serve(FEED, rss("Example", &["A", "B"]));
    let mut engine = engine(&transport);

    let feed_id = engine.submit_candidate(FEED).await.unwrap();
    let store = engine.store();

    assert_eq!(store.links(), [FEED]);
    assert_eq!(store.feeds().len(), 1);
    let feed = &store.feeds()[0];
    assert_eq!(feed.id, feed_id);
    assert_eq!(feed.url, FEED);
    assert_eq!(feed.link, "https://example.com");
    assert_eq!(feed.title, "Example");
    assert_eq!(feed.description, "Example feed");

    assert_eq!(titles(store), ["A", "B"]);
    assert!(store.posts().iter().all(|p| p.feed_id == feed_id));
    assert_eq!(store.posts()[0].url, "https://example.com/A");
    assert_eq!(store.posts()[0].description, "About A");
}

#[tokio::test]
async fn test_register_announces_phases_then_data() {
    let transport = ScriptedTransport::new();
    transport.serve(FEED, rss("Example", &["A"]));
    let mut engine = engine(&transport);
    let paths = record_paths(engine.store_mut());

    engine.submit_candidate(FEED).await.unwrap();

    assert_eq!(
        *paths.lock().unwrap(),
        [
            "registration.error",
            "registration.phase",
            "registration.phase",
            "registration.phase",
            "feeds",
            "posts",
            "links",
            "registration.phase",
        ]
    );
}

#[tokio::test]
async fn test_register_phase_sequence() {
    let transport = ScriptedTransport::new();
    transport.serve(FEED, rss("Example", &[]));
    let mut engine = engine(&transport);

    let phases = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&phases);
    engine.store_mut().subscribe(move |change| {
        if let StateChange::RegistrationPhase(phase) = change {
            sink.lock().unwrap().push(*phase);
        }
    });

    engine.submit_candidate(FEED).await.unwrap();

    assert_eq!(
        *phases.lock().unwrap(),
        [
            RegistrationPhase::Validating,
            RegistrationPhase::Loading,
            RegistrationPhase::Parsing,
            RegistrationPhase::Success,
        ]
    );
}

#[tokio::test]
async fn test_register_does_not_touch_status() {
    let transport = ScriptedTransport::new();
    transport.serve(FEED, rss("Example", &["A"]));
    let mut engine = engine(&transport);

    engine.submit_candidate(FEED).await.unwrap();
    assert_eq!(engine.store().status(), SyncStatus::Idle);
}

#[tokio::test]
async fn test_register_keeps_first_of_repeated_titles() {
    let transport = ScriptedTransport::new();
    transport.serve(FEED, rss("Example", &["A", "B", "A"]));
    let mut engine = engine(&transport);

    engine.submit_candidate(FEED).await.unwrap();
    assert_eq!(titles(engine.store()), ["A", "B"]);
}

#[tokio::test]
async fn test_feeds_keep_registration_order() {
    let transport = ScriptedTransport::new();
    transport.serve("https://z.example/rss", rss("Z", &["z1"]));
    transport.serve("https://a.example/rss", rss("A", &["a1"]));
    let mut engine = engine(&transport);

    engine.submit_candidate("https://z.example/rss").await.unwrap();
    engine.submit_candidate("https://a.example/rss").await.unwrap();

    let feeds: Vec<_> = engine
        .store()
        .feeds()
        .iter()
        .map(|f| f.title.clone())
        .collect();
    assert_eq!(feeds, ["Z", "A"]);
    assert_eq!(
        engine.store().links(),
        ["https://z.example/rss", "https://a.example/rss"]
    );
}

// ============================================================================
// Rejected registration
// ============================================================================

#[tokio::test]
async fn test_duplicate_url_rejected_without_fetch() {
    let transport = ScriptedTransport::new();
    transport.serve(FEED, rss("Example", &["A"]));
    let mut engine = engine(&transport);
    engine.submit_candidate(FEED).await.unwrap();

    let err = engine.submit_candidate(FEED).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Validation(ValidationError::AlreadyExists(ref url)) if url == FEED
    ));
    assert_eq!(err.message_key(), "already exists");
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(engine.store().links(), [FEED]);
    assert_eq!(
        engine.store().registration_error(),
        Some(ErrorKind::Validation)
    );
}

#[tokio::test]
async fn test_invalid_urls_rejected_without_fetch() {
    let transport = ScriptedTransport::new();
    let mut engine = engine(&transport);

    for candidate in ["", "   ", "not a url", "ftp://example.com/feed", "http://localhost/rss"] {
        let err = engine.submit_candidate(candidate).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{candidate:?}");
        assert_eq!(err.message_key(), "invalid url", "{candidate:?}");
        assert_eq!(
            engine.store().registration_phase(),
            RegistrationPhase::Failed
        );
    }
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_network_failure_leaves_state_untouched() {
    let transport = ScriptedTransport::new();
    transport.script(FEED, Script::Status(503));
    let mut engine = engine(&transport);

    let err = engine.submit_candidate(FEED).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.message_key(), "network error");
    assert!(engine.store().links().is_empty());
    assert!(engine.store().feeds().is_empty());
}

#[tokio::test]
async fn test_parse_rejections_leave_state_untouched() {
    let cases = [
        ("<not valid xml", ErrorKind::Parse),
        ("<rss><channel><title>x</title></rss>", ErrorKind::Parse),
        ("<rss version=\"2.0\"></rss>", ErrorKind::Parse),
        ("<html><body>Not a feed</body></html>", ErrorKind::UnsupportedFormat),
    ];

    for (body, kind) in cases {
        let transport = ScriptedTransport::new();
        transport.serve(FEED, body.to_owned());
        let mut engine = engine(&transport);
        let paths = record_paths(engine.store_mut());

        let err = engine.submit_candidate(FEED).await.unwrap_err();

        assert_eq!(err.kind(), kind, "{body}");
        let store = engine.store();
        assert!(store.links().is_empty());
        assert!(store.feeds().is_empty());
        assert!(store.posts().is_empty());
        assert_eq!(store.registration_phase(), RegistrationPhase::Failed);
        assert_eq!(store.registration_error(), Some(kind));
        assert!(
            paths
                .lock()
                .unwrap()
                .iter()
                .all(|p| p.starts_with("registration.")),
            "only registration fields may change"
        );
    }
}

#[tokio::test]
async fn test_retry_after_failure_clears_error() {
    let transport = ScriptedTransport::new();
    transport.script(FEED, Script::Status(500));
    let mut engine = engine(&transport);
    engine.submit_candidate(FEED).await.unwrap_err();

    transport.serve(FEED, rss("Example", &["A"]));
    engine.submit_candidate(FEED).await.unwrap();

    assert_eq!(engine.store().registration_error(), None);
    assert_eq!(
        engine.store().registration_phase(),
        RegistrationPhase::Success
    );
    assert_eq!(engine.store().links(), [FEED]);
}

// ============================================================================
// Viewed posts
// ============================================================================

#[tokio::test]
async fn test_mark_viewed_and_lookup() {
    let transport = ScriptedTransport::new();
    transport.serve(FEED, rss("Example", &["A", "B"]));
    let mut engine = engine(&transport);
    engine.submit_candidate(FEED).await.unwrap();

    let id = engine.store().posts()[1].id;
    assert!(engine.store_mut().mark_viewed(id));

    let store = engine.store();
    assert_eq!(store.viewed_posts(), [id]);
    assert_eq!(store.post(id).map(|p| p.title.as_str()), Some("B"));
}
