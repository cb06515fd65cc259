use assertions::is_removal_cookie;
use fixtures::{SessionFixture, now, signed_config, spy_store, store};
use googletest::{
    assert_that,
    prelude::{eq, none, some},
};
use helpers::{SetCookie, request_cookies};
use itertools::Itertools;
use jiff::{SignedDuration, ToSpan};
use serde_json::json;
use unsafe_session::{
    IncomingSession, Session, SessionConfig, SessionId, config::SessionCookieKind,
    finalize_session,
};

mod assertions;
mod fixtures;
mod helpers;

// Handles are moved across `.await` points in multithreaded executors.
static_assertions::assert_impl_all!(unsafe_session::SessionStore: Send, Sync);
static_assertions::assert_impl_all!(Session<'static>: Send);

#[tokio::test]
async fn untouched_session_is_not_sent_to_the_client() {
    let ((store, call_tracker), config) = (spy_store(), signed_config());

    let mut session = Session::new(&store, &config, None);
    let cookie = session.finalize().await.unwrap();
    assert_that!(cookie, none());

    call_tracker.assert_store_was_untouched().await;
}

#[tokio::test]
async fn reading_from_a_new_session_writes_nothing() {
    let ((store, call_tracker), config) = (spy_store(), signed_config());

    let mut session = Session::new(&store, &config, None);
    assert!(session.get_raw("missing").await.unwrap().is_none());
    assert!(session.is_empty().await.unwrap());
    assert!(session.is_new().await.unwrap());
    assert!(session.was_accessed());
    assert!(!session.is_dirty());

    let cookie = session.finalize().await.unwrap();
    assert_that!(cookie, none());
    call_tracker.assert_store_was_untouched().await;
}

#[tokio::test]
async fn writing_to_a_new_session_creates_a_record_and_sets_a_cookie() {
    let ((store, call_tracker), config) = (spy_store(), signed_config());

    let mut session = Session::new(&store, &config, None);
    session.insert("foo", "bar").await.unwrap();
    assert!(session.is_dirty());
    assert!(session.id().is_none());

    let cookie = session.finalize().await.unwrap().unwrap();
    assert_eq!(cookie.name(), "session");
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.max_age(), None);
    let cookie = SetCookie::parse(cookie, &config);
    assert_eq!(cookie.id().len(), 32);
    assert_eq!(Some(&cookie.id), session.id());

    let oplog = call_tracker.operation_log().await;
    assert_eq!(oplog, vec![format!("create {}", cookie.id())]);

    let record = store.load(&cookie.id).await.unwrap().unwrap();
    assert_eq!(serde_json::to_value(&record.state).unwrap(), json!({"foo": "bar"}));
    assert_eq!(
        record.expires_at,
        record.created_at + SignedDuration::from_secs(1200)
    );
}

#[tokio::test]
async fn state_survives_a_roundtrip_through_the_cookie() {
    let (store, config) = (store(), signed_config());

    let mut session = Session::new(&store, &config, None);
    session.insert("user", json!({"id": 7, "name": "ada"})).await.unwrap();
    session.insert("csrf", "token").await.unwrap();
    let cookie = session.finalize().await.unwrap().unwrap();
    let cookie = SetCookie::parse(cookie, &config);

    let incoming = cookie.send_back(&config).unwrap();
    assert_eq!(incoming.id(), &cookie.id);
    let mut session = Session::new(&store, &config, Some(incoming));
    assert!(!session.is_new().await.unwrap());
    let state = session.state().await.unwrap();
    assert_eq!(
        serde_json::to_value(state).unwrap(),
        json!({"user": {"id": 7, "name": "ada"}, "csrf": "token"})
    );
    let name: Option<String> = session.get("csrf").await.unwrap();
    assert_eq!(name.as_deref(), Some("token"));
}

#[tokio::test]
async fn a_tampered_cookie_never_resolves_to_a_session() {
    let (store, config) = (store(), signed_config());

    let mut session = Session::new(&store, &config, None);
    session.insert("foo", "bar").await.unwrap();
    let cookie = session.finalize().await.unwrap().unwrap();

    let mut tampered = cookie.value().to_owned();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });
    let cookies = request_cookies(&config.cookie.name, &tampered);
    assert!(IncomingSession::extract(&cookies, None, &config).is_none());

    // A raw id is rejected too when signing is enabled.
    let raw = SetCookie::parse(cookie, &config).id;
    let cookies = request_cookies(&config.cookie.name, raw.inner());
    assert!(IncomingSession::extract(&cookies, None, &config).is_none());
}

#[tokio::test]
async fn untouched_existing_session_is_never_loaded() {
    let ((store, call_tracker), config) = (spy_store(), signed_config());
    let fixture = SessionFixture::default();
    let incoming = fixture.setup(&store).await;
    call_tracker.reset().await;

    let mut session = Session::new(&store, &config, Some(incoming));
    assert!(!session.is_loaded());
    assert_that!(session.finalize().await.unwrap(), none());
    call_tracker.assert_store_was_untouched().await;
}

#[tokio::test]
async fn reading_an_existing_session_only_refreshes_its_expiry() {
    let ((store, call_tracker), config) = (spy_store(), signed_config());
    let mut fixture = SessionFixture::with_state([("foo", json!("bar")), ("n", json!(1))]);
    fixture.expires_at = Some(now() + 10.seconds());
    let incoming = fixture.setup(&store).await;
    let before = store.load(&fixture.id).await.unwrap().unwrap();
    call_tracker.reset().await;

    let mut session = Session::new(&store, &config, Some(incoming));
    let value: Option<String> = session.get("foo").await.unwrap();
    assert_eq!(value.as_deref(), Some("bar"));
    assert_that!(session.finalize().await.unwrap(), none());

    let oplog = call_tracker.operation_log().await;
    assert_eq!(
        oplog,
        vec![
            format!("load {}", fixture.id()),
            format!("update-expiry {}", fixture.id())
        ]
    );
    let after = store.load(&fixture.id).await.unwrap().unwrap();
    assert!(after.expires_at > before.expires_at);
    assert_eq!(
        serde_json::to_string(&after.state).unwrap(),
        serde_json::to_string(&before.state).unwrap()
    );
    assert_eq!(after.created_at, before.created_at);
}

#[tokio::test]
async fn modifying_an_existing_session_updates_the_record() {
    let ((store, call_tracker), config) = (spy_store(), signed_config());
    let fixture = SessionFixture::with_state([("a", json!(1)), ("b", json!(2))]);
    let incoming = fixture.setup(&store).await;
    call_tracker.reset().await;

    let mut session = Session::new(&store, &config, Some(incoming));
    session.remove("a").await.unwrap();
    session.insert("c", 3).await.unwrap();
    assert_eq!(
        session.created_at().await.unwrap(),
        fixture.created_at
    );
    // No cookie: the client already has the right one.
    assert_that!(session.finalize().await.unwrap(), none());

    let oplog = call_tracker.operation_log().await;
    assert_eq!(
        oplog,
        vec![
            format!("load {}", fixture.id()),
            format!("update {}", fixture.id())
        ]
    );
    let record = store.load(&fixture.id).await.unwrap().unwrap();
    assert_eq!(
        serde_json::to_value(&record.state).unwrap(),
        json!({"b": 2, "c": 3})
    );
    assert_eq!(record.created_at, fixture.created_at);
}

#[tokio::test]
async fn a_record_expiring_now_is_treated_as_expired() {
    let ((store, call_tracker), config) = (spy_store(), signed_config());
    let mut fixture = SessionFixture::with_state([("foo", json!("bar"))]);
    fixture.expires_at = Some(now());
    let incoming = fixture.setup(&store).await;
    call_tracker.reset().await;

    let mut session = Session::new(&store, &config, Some(incoming));
    assert!(!session.contains_key("foo").await.unwrap());
    assert!(session.is_new().await.unwrap());
    assert!(session.id().is_none());

    let cookie = session.finalize().await.unwrap().unwrap();
    assert_that!(cookie, is_removal_cookie());

    let oplog = call_tracker.operation_log().await;
    assert_eq!(
        oplog,
        vec![
            format!("load {}", fixture.id()),
            format!("delete {}", fixture.id())
        ]
    );
    assert!(store.load(&fixture.id).await.unwrap().is_none());
}

#[tokio::test]
async fn an_unknown_id_starts_a_fresh_session_on_write() {
    let (store, config) = (store(), signed_config());
    let mut fixture = SessionFixture::default();
    fixture.state = None;
    let incoming = fixture.setup(&store).await;

    let mut session = Session::new(&store, &config, Some(incoming));
    session.insert("foo", "bar").await.unwrap();
    let cookie = session.finalize().await.unwrap().unwrap();
    let cookie = SetCookie::parse(cookie, &config);
    assert_ne!(cookie.id(), fixture.id());
    assert!(store.load(&fixture.id).await.unwrap().is_none());
    assert!(store.load(&cookie.id).await.unwrap().is_some());
}

#[tokio::test]
async fn client_chosen_ids_are_adopted_when_configured() {
    let (store, mut config) = (store(), SessionConfig::default());
    config.insecure.accept_client_session_id = true;

    let cookies = request_cookies(&config.cookie.name, "chosen-by-the-attacker");
    let incoming = IncomingSession::extract(&cookies, None, &config).unwrap();
    let mut session = Session::new(&store, &config, Some(incoming));
    session.insert("user", "victim").await.unwrap();
    assert!(session.is_new().await.unwrap());

    let cookie = session.finalize().await.unwrap().unwrap();
    assert_eq!(cookie.value(), "chosen-by-the-attacker");
    let id = SessionId::from_client("chosen-by-the-attacker").unwrap();
    let record = store.load(&id).await.unwrap().unwrap();
    assert_eq!(serde_json::to_value(&record.state).unwrap(), json!({"user": "victim"}));
}

#[tokio::test]
async fn expired_records_are_revived_when_client_ids_are_accepted() {
    let ((store, call_tracker), mut config) = (spy_store(), SessionConfig::default());
    config.insecure.accept_client_session_id = true;
    let mut fixture = SessionFixture::with_state([("stale", json!(true))]);
    fixture.expires_at = Some(now() - 1.minute());
    let incoming = fixture.setup(&store).await;
    call_tracker.reset().await;

    let mut session = Session::new(&store, &config, Some(incoming));
    assert!(session.is_empty().await.unwrap());
    assert!(!session.is_new().await.unwrap());
    session.insert("fresh", true).await.unwrap();
    assert_that!(session.finalize().await.unwrap(), none());

    let oplog = call_tracker.operation_log().await;
    assert_eq!(
        oplog,
        vec![
            format!("load {}", fixture.id()),
            format!("update {}", fixture.id())
        ]
    );
    let record = store.load(&fixture.id).await.unwrap().unwrap();
    assert!(!record.is_expired(now()));
    assert_eq!(serde_json::to_value(&record.state).unwrap(), json!({"fresh": true}));
}

#[tokio::test]
async fn invalidating_then_writing_yields_a_new_id() {
    let ((store, call_tracker), config) = (spy_store(), signed_config());
    let fixture = SessionFixture::with_state([("user", json!("alice"))]);
    let incoming = fixture.setup(&store).await;
    call_tracker.reset().await;

    let mut session = Session::new(&store, &config, Some(incoming));
    session.invalidate().await.unwrap();
    assert!(session.id().is_none());
    assert!(session.is_empty().await.unwrap());
    session.insert("user", "bob").await.unwrap();

    let cookie = session.finalize().await.unwrap().unwrap();
    let cookie = SetCookie::parse(cookie, &config);
    assert_ne!(cookie.id(), fixture.id());

    let oplog = call_tracker.operation_log().await;
    assert_eq!(
        oplog,
        vec![
            format!("delete {}", fixture.id()),
            format!("create {}", cookie.id())
        ]
    );
    assert!(store.load(&fixture.id).await.unwrap().is_none());
}

#[tokio::test]
async fn removal_cookie_is_sent_if_existing_session_is_invalidated() {
    let (store, config) = (store(), signed_config());
    let fixture = SessionFixture::default();
    let incoming = fixture.setup(&store).await;

    let mut session = Session::new(&store, &config, Some(incoming));
    session.invalidate().await.unwrap();

    let cookie = session.finalize().await.unwrap().unwrap();
    assert_that!(cookie, is_removal_cookie());
    assert_eq!(cookie.name(), config.cookie.name);
    assert_eq!(cookie.path(), Some("/"));
}

#[tokio::test]
async fn no_removal_cookie_is_sent_for_a_fresh_but_invalidated_session() {
    let ((store, call_tracker), config) = (spy_store(), signed_config());
    let mut session = Session::new(&store, &config, None);

    session.insert("my_key", "yo").await.unwrap();
    session.invalidate().await.unwrap();

    let cookie = session.finalize().await.unwrap();
    assert_that!(cookie, none());
    call_tracker.assert_store_was_untouched().await;
}

#[tokio::test]
async fn changed_is_idempotent_and_raw_mutable_access_marks_the_session_dirty() {
    let (store, config) = (store(), signed_config());
    let fixture = SessionFixture::with_state([("cart", json!(["apple"]))]);
    let incoming = fixture.setup(&store).await;

    let mut session = Session::new(&store, &config, Some(incoming));
    if let Some(serde_json::Value::Array(items)) = session.get_raw_mut("cart").await.unwrap() {
        items.push(json!("pear"));
    }
    assert!(session.is_dirty());
    session.changed().await.unwrap();
    session.changed().await.unwrap();
    assert!(session.is_dirty());
    session.finalize().await.unwrap();

    let record = store.load(&fixture.id).await.unwrap().unwrap();
    assert_eq!(
        serde_json::to_value(&record.state).unwrap(),
        json!({"cart": ["apple", "pear"]})
    );
}

#[tokio::test]
async fn insertion_order_is_preserved() {
    let (store, config) = (store(), signed_config());

    let mut session = Session::new(&store, &config, None);
    session
        .extend([("b", json!(1)), ("a", json!(2)), ("c", json!(3))])
        .await
        .unwrap();
    session.remove("a").await.unwrap();
    session.insert_raw("a", json!(4)).await.unwrap();
    let keys = session.keys().await.unwrap().collect_vec();
    assert_eq!(keys, vec!["b", "c", "a"]);
    assert_eq!(session.len().await.unwrap(), 3);

    let cookie = session.finalize().await.unwrap().unwrap();
    let incoming = SetCookie::parse(cookie, &config).send_back(&config);
    let mut session = Session::new(&store, &config, incoming);
    let keys = session.keys().await.unwrap().collect_vec();
    assert_eq!(keys, vec!["b", "c", "a"]);
}

#[tokio::test]
async fn clear_keeps_the_record_but_empties_it() {
    let (store, config) = (store(), signed_config());
    let fixture = SessionFixture::with_state([("a", json!(1))]);
    let incoming = fixture.setup(&store).await;

    let mut session = Session::new(&store, &config, Some(incoming));
    session.clear().await.unwrap();
    assert_that!(session.finalize().await.unwrap(), none());

    let record = store.load(&fixture.id).await.unwrap().unwrap();
    assert!(record.state.is_empty());
}

#[tokio::test]
async fn creation_time_is_stamped_on_first_write() {
    let (store, config) = (store(), signed_config());

    let mut session = Session::new(&store, &config, None);
    let before = now();
    session.insert("k", "v").await.unwrap();
    let created_at = session.created_at().await.unwrap();
    assert!(created_at >= before);
    assert_eq!(created_at.subsec_nanosecond(), 0);

    let cookie = session.finalize().await.unwrap().unwrap();
    let id = SetCookie::parse(cookie, &config).id;
    let record = store.load(&id).await.unwrap().unwrap();
    assert_eq!(record.created_at, created_at);
}

#[tokio::test]
async fn values_that_fail_to_deserialize_are_reported() {
    let (store, config) = (store(), signed_config());
    let mut session = Session::new(&store, &config, None);
    session.insert("n", "not a number").await.unwrap();

    let err = session.get::<u64>("n").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to deserialize the value associated with `n`"
    );
}

#[tokio::test]
async fn persistent_cookies_carry_a_max_age() {
    let (store, mut config) = (store(), signed_config());
    config.cookie.kind = SessionCookieKind::Persistent;
    config.cookie.http_only = true;
    config.cookie.secure = true;
    config.cookie.domain = Some("example.com".into());
    config.state.timeout = std::time::Duration::from_secs(60);

    let mut session = Session::new(&store, &config, None);
    session.insert("k", "v").await.unwrap();
    let cookie = session.finalize().await.unwrap().unwrap();

    assert_that!(cookie.max_age(), some(eq(SignedDuration::from_secs(60))));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.domain(), Some("example.com"));
}

#[tokio::test]
async fn unsigned_cookies_carry_the_raw_id() {
    let (store, config) = (store(), SessionConfig::default());

    let mut session = Session::new(&store, &config, None);
    session.insert("k", "v").await.unwrap();
    let cookie = session.finalize().await.unwrap().unwrap();
    assert_eq!(Some(cookie.value()), session.id().map(SessionId::inner));
}

#[tokio::test]
async fn a_record_deleted_concurrently_does_not_fail_the_request() {
    let (store, config) = (store(), signed_config());
    let fixture = SessionFixture::with_state([("a", json!(1))]);
    let incoming = fixture.setup(&store).await;

    let mut session = Session::new(&store, &config, Some(incoming));
    session.insert("b", 2).await.unwrap();
    store.delete(&fixture.id).await.unwrap();

    assert_that!(session.finalize().await.unwrap(), none());
    assert!(store.load(&fixture.id).await.unwrap().is_none());
}

#[tokio::test]
async fn finalize_session_attaches_the_cookie() {
    let (store, config) = (store(), signed_config());
    let mut response_cookies = biscotti::ResponseCookies::new();
    // Response cookies are keyed by name, domain and path.
    let cookie_id = || biscotti::ResponseCookieId::new("session").set_path("/");

    let session = Session::new(&store, &config, None);
    finalize_session(&mut response_cookies, session)
        .await
        .unwrap();
    assert!(response_cookies.get(cookie_id()).is_none());
    assert_eq!(response_cookies.iter().count(), 0);

    let mut session = Session::new(&store, &config, None);
    session.insert("k", "v").await.unwrap();
    finalize_session(&mut response_cookies, session)
        .await
        .unwrap();
    let cookie = response_cookies.get(cookie_id()).unwrap();
    assert_eq!(cookie.path(), Some("/"));
    assert!(config.codec().decode(cookie.value()).is_ok());
}
