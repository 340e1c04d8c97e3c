use cookie_session::{
    BackendConfig, CookieJar, CookieTransport, InMemoryBackend, InvalidReason, SessionBackend,
    SessionConfig, SessionError, SessionManager,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const COOKIE: &str = "test_session";

async fn manager() -> SessionManager {
    SessionManager::new(
        SessionConfig::new()
            .with_cookie_name(COOKIE)
            .with_signing_secret("sign"),
    )
    .await
    .expect("manager")
}

#[tokio::test]
async fn start_issues_cookie_and_reuses_it() {
    let manager = manager().await;

    let mut first = CookieJar::new();
    let store = manager.start(&mut first).await.expect("start");
    let issued = first.outbound_cookie(COOKIE).expect("cookie issued").clone();
    assert_eq!(issued.path, "/");
    assert!(issued.http_only);
    assert_eq!(issued.max_age, Some(86_400));
    assert_eq!(manager.decode_id(&issued.value).expect("decode"), store.session_id());

    let mut second = first.follow_up();
    let store = manager.start(&mut second).await.expect("start again");
    assert!(second.outbound().is_empty(), "live session must not be reissued");
    store.set("foo", "bar");
    store.save().await.expect("save");

    let mut third = second.follow_up();
    let store = manager.start(&mut third).await.expect("start third");
    assert_eq!(store.get_str("foo").as_deref(), Some("bar"));
    assert!(third.outbound().is_empty());
}

#[tokio::test]
async fn issued_token_is_visible_within_same_request() {
    let manager = manager().await;
    let mut jar = CookieJar::new();
    let first = manager.start(&mut jar).await.expect("start");
    first.set("step", 1);

    let again = manager.start(&mut jar).await.expect("start in same request");
    assert_eq!(again.session_id(), first.session_id());
    assert_eq!(again.get_as::<i32>("step").expect("decode"), Some(1));
    assert_eq!(jar.outbound().len(), 1);
}

#[tokio::test]
async fn destroy_expires_cookie_and_record() {
    let manager = manager().await;

    let mut login = CookieJar::new();
    let store = manager.start(&mut login).await.expect("start");
    store.set("foo", "bar");
    store.save().await.expect("save");
    let cookie = login.outbound_cookie(COOKIE).expect("cookie").value.clone();

    let mut logout = CookieJar::new().with_cookie(COOKIE, cookie.clone());
    manager.destroy(&mut logout).await.expect("destroy");
    let expired = logout.outbound_cookie(COOKIE).expect("expiry cookie");
    assert!(expired.is_removal());
    assert!(expired.value.is_empty());

    // a client ignoring the expiry still finds nothing
    let mut stale = CookieJar::new().with_cookie(COOKIE, cookie.clone());
    let store = manager.start(&mut stale).await.expect("start");
    assert!(store.get("foo").is_none());
    let reissued = stale.outbound_cookie(COOKIE).expect("new cookie");
    assert_ne!(reissued.value, cookie);
}

#[tokio::test]
async fn destroy_without_cookie_is_noop() {
    let manager = manager().await;
    let mut jar = CookieJar::new();
    manager.destroy(&mut jar).await.expect("destroy");
    assert!(jar.outbound().is_empty());
}

#[tokio::test]
async fn refresh_rotates_id_and_keeps_values() {
    let manager = manager().await;

    let mut first = CookieJar::new();
    let store = manager.start(&mut first).await.expect("start");
    store.set("foo", "bar");
    store.save().await.expect("save");
    let old_id = store.session_id();
    let old_cookie = first.outbound_cookie(COOKIE).expect("cookie").value.clone();

    let mut second = first.follow_up();
    let rotated = manager.refresh(&mut second).await.expect("refresh");
    assert_ne!(rotated.session_id(), old_id);
    assert_eq!(rotated.get_str("foo").as_deref(), Some("bar"));
    let new_cookie = second.outbound_cookie(COOKIE).expect("new cookie").value.clone();
    assert_ne!(new_cookie, old_cookie);

    assert!(!manager.backend().check(&old_id).await.expect("old"));
    assert!(manager.backend().check(&rotated.session_id()).await.expect("new"));

    let mut third = second.follow_up();
    let store = manager.start(&mut third).await.expect("start");
    assert_eq!(store.session_id(), rotated.session_id());
    assert_eq!(store.get_str("foo").as_deref(), Some("bar"));
}

#[tokio::test]
async fn refresh_without_cookie_starts_fresh_session() {
    let manager = manager().await;
    let mut jar = CookieJar::new();
    let store = manager.refresh(&mut jar).await.expect("refresh");
    assert!(store.is_empty());
    assert!(jar.outbound_cookie(COOKIE).is_some());
}

#[tokio::test]
async fn forged_cookie_gets_new_session() {
    let manager = manager().await;
    let victim = {
        let mut jar = CookieJar::new();
        let store = manager.start(&mut jar).await.expect("start");
        store.set("role", "admin");
        store.save().await.expect("save");
        store.session_id()
    };

    let forged = cookie_session::codec::encode(&victim, Some(b"guess".as_slice()));
    let mut jar = CookieJar::new().with_cookie(COOKIE, forged);
    let store = manager.start(&mut jar).await.expect("forged cookie is not an error");
    assert_ne!(store.session_id(), victim);
    assert!(store.get("role").is_none());
    assert!(jar.outbound_cookie(COOKIE).is_some());
}

#[tokio::test]
async fn unreadable_cookie_is_an_error() {
    let manager = manager().await;
    let mut jar = CookieJar::new().with_cookie(COOKIE, "%ff%fe.00");
    let err = manager.start(&mut jar).await.expect_err("bad escape");
    assert_eq!(err.invalid_reason(), Some(InvalidReason::Escape));

    for token in ["%zz", "%"] {
        let mut jar = CookieJar::new().with_cookie(COOKIE, token);
        let err = manager.start(&mut jar).await.expect_err(token);
        assert_eq!(err.invalid_reason(), Some(InvalidReason::Escape));
        assert!(jar.outbound().is_empty());
    }

    let mut jar = CookieJar::new().with_cookie(COOKIE, "not-base64!.00");
    let err = manager.destroy(&mut jar).await.expect_err("bad base64");
    assert!(matches!(err, SessionError::InvalidIdentifier(InvalidReason::Encoding)));
}

#[tokio::test]
async fn secure_flag_needs_secure_channel() {
    let manager = SessionManager::new(
        SessionConfig::new()
            .with_secure(true)
            .with_domain("example.com")
            .with_cookie_lifetime(0),
    )
    .await
    .expect("manager");

    let mut plain = CookieJar::new();
    manager.start(&mut plain).await.expect("start");
    let cookie = plain.outbound_cookie("session_id").expect("cookie");
    assert!(!cookie.secure);
    assert_eq!(cookie.domain.as_deref(), Some("example.com"));
    assert_eq!(cookie.max_age, None);

    let mut tls = CookieJar::new().with_secure_channel(true);
    manager.start(&mut tls).await.expect("start");
    assert!(tls.outbound_cookie("session_id").expect("cookie").secure);
}

#[tokio::test]
async fn custom_generator_and_backend_are_used() {
    let counter = Arc::new(AtomicUsize::new(0));
    let ids = Arc::clone(&counter);
    let backend = Arc::new(InMemoryBackend::new().expect("backend"));
    let config = SessionConfig::new()
        .with_id_generator(move || format!("sid-{}", ids.fetch_add(1, Ordering::SeqCst)))
        .with_backend(BackendConfig::Custom(backend.clone()));

    let manager = SessionManager::new(config).await.expect("manager");
    let mut jar = CookieJar::new();
    let store = manager.start(&mut jar).await.expect("start");
    assert_eq!(store.session_id(), "sid-0");
    assert_eq!(backend.len(), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_config_fails_at_construction() {
    let err = SessionManager::new(SessionConfig::new().with_cookie_name(""))
        .await
        .err()
        .expect("empty cookie name");
    assert!(matches!(err, SessionError::Config(_)));
}

#[tokio::test]
async fn rendered_headers_round_trip_through_cookie_header() {
    let manager = manager().await;
    let mut jar = CookieJar::new();
    let store = manager.start(&mut jar).await.expect("start");

    let header = jar.set_cookie_headers().pop().expect("set-cookie");
    let pair = header.split(';').next().expect("name=value");
    let mut next = CookieJar::from_header(pair);
    assert_eq!(
        next.cookie(COOKIE).map(|v| manager.decode_id(&v).expect("decode")),
        Some(store.session_id())
    );
    let again = manager.start(&mut next).await.expect("start");
    assert_eq!(again.session_id(), store.session_id());
}

#[tokio::test]
async fn quoted_cookie_value_is_accepted() {
    let manager = manager().await;
    let mut jar = CookieJar::new();
    let store = manager.start(&mut jar).await.expect("start");
    let token = jar.outbound_cookie(COOKIE).expect("cookie").value.clone();

    let mut quoted = CookieJar::from_header(&format!("{COOKIE}=\"{token}\""));
    let again = manager.start(&mut quoted).await.expect("start");
    assert_eq!(again.session_id(), store.session_id());
    assert!(quoted.outbound().is_empty());
}
