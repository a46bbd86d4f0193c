//! Session lifecycle against a local backend

mod common;

use async_trait::async_trait;
use common::{REJECTED_CODE, TestBackend, unreachable_config};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tutor_session_sdk::auth::{IdentityGrant, IdentityProvider, TokenStore};
use tutor_session_sdk::{AuthPhase, ClientConfig, SessionError, SessionManager, UserRole};

/// Provider that always yields the same identity token
struct StaticProvider(&'static str);

#[async_trait]
impl IdentityProvider for StaticProvider {
    async fn authorize(&self) -> tutor_session_sdk::Result<IdentityGrant> {
        Ok(IdentityGrant::new(self.0))
    }
}

/// Provider whose consent step is dismissed by the user
struct DismissedProvider;

#[async_trait]
impl IdentityProvider for DismissedProvider {
    async fn authorize(&self) -> tutor_session_sdk::Result<IdentityGrant> {
        Err(SessionError::exchange("sign-in cancelled"))
    }
}

/// Provider that waits for the test before completing
struct GatedProvider(Arc<Notify>);

#[async_trait]
impl IdentityProvider for GatedProvider {
    async fn authorize(&self) -> tutor_session_sdk::Result<IdentityGrant> {
        self.0.notified().await;
        Ok(IdentityGrant::new("fb-late"))
    }
}

fn manager(
    config: ClientConfig,
    store: &TokenStore,
    provider: impl IdentityProvider + 'static,
) -> SessionManager {
    SessionManager::builder()
        .config(config)
        .store(store.clone())
        .provider(provider)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_sign_in_persists_pair_and_authenticates() {
    let backend = TestBackend::start().await;
    let store = TokenStore::in_memory();
    let session = manager(backend.config(), &store, StaticProvider("fb-1"));

    let user = session.sign_in_with_google(UserRole::Student).await.unwrap();

    assert_eq!(user.id.as_str(), "u1");
    assert_eq!(user.role, Some(UserRole::Student));
    assert!(store.has_tokens());
    assert_eq!(store.identity_token().as_deref(), Some("fb-1"));
    assert_eq!(store.session_token().as_deref(), Some("sess-for-fb-1"));

    let state = session.state();
    assert_eq!(state.phase, AuthPhase::Authenticated);
    assert!(state.is_authenticated());
    assert_eq!(state.user.unwrap().email, "ada@example.edu");
    assert_eq!(state.session_token.as_deref(), Some("sess-for-fb-1"));

    let body = backend.state.last_exchange_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["firebase_token"], "fb-1");
    assert_eq!(body["role"], "student");
    assert_eq!(body["device_data"]["timezone"], "Europe/Berlin");
}

#[tokio::test]
async fn test_sign_in_publishes_to_subscribers() {
    let backend = TestBackend::start().await;
    let store = TokenStore::in_memory();
    let session = manager(backend.config(), &store, StaticProvider("fb-1"));
    let mut rx = session.subscribe();

    session.sign_in_with_google(UserRole::Teacher).await.unwrap();

    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().phase, AuthPhase::Authenticated);
}

#[tokio::test]
async fn test_concurrent_checks_share_one_validation() {
    let backend = TestBackend::start().await;
    backend.state.set_me_delay(Duration::from_millis(100));
    let store = TokenStore::in_memory();
    store.set_tokens("id-123", "sess-456");
    let session = manager(backend.config(), &store, StaticProvider("unused"));

    let (a, b) = tokio::join!(session.check_auth_state(), session.check_auth_state());

    assert_eq!(backend.state.me_calls(), 1);
    assert_eq!(a.phase, AuthPhase::Authenticated);
    assert_eq!(b.phase, AuthPhase::Authenticated);
    assert_eq!(a.user.unwrap().id.as_str(), "u1");
}

#[tokio::test]
async fn test_check_runs_once_until_reset() {
    let backend = TestBackend::start().await;
    let store = TokenStore::in_memory();
    store.set_tokens("id-123", "sess-456");
    let session = manager(backend.config(), &store, StaticProvider("unused"));

    session.check_auth_state().await;
    session.check_auth_state().await;
    assert_eq!(backend.state.me_calls(), 1);

    session.reset_check();
    session.check_auth_state().await;
    assert_eq!(backend.state.me_calls(), 2);
}

#[tokio::test]
async fn test_rejected_stored_session_is_cleared() {
    let backend = TestBackend::start().await;
    let store = TokenStore::in_memory();
    store.set_tokens("id-123", "expired");
    let session = manager(backend.config(), &store, StaticProvider("unused"));

    let state = session.check_auth_state().await;

    assert_eq!(state.phase, AuthPhase::Anonymous);
    assert!(state.error.is_none());
    assert!(!store.has_tokens());
}

#[tokio::test]
async fn test_unreachable_backend_during_check_records_error() {
    let store = TokenStore::in_memory();
    store.set_tokens("id-123", "sess-456");
    let session = manager(unreachable_config(), &store, StaticProvider("unused"));

    let state = session.check_auth_state().await;

    assert_eq!(state.phase, AuthPhase::Anonymous);
    assert!(state.error.is_some());
    assert!(!store.has_tokens());
}

#[tokio::test]
async fn test_rejected_exchange_keeps_existing_session() {
    let backend = TestBackend::start().await;
    let store = TokenStore::in_memory();
    store.set_tokens("id-123", "sess-456");
    let session = manager(backend.config(), &store, StaticProvider(REJECTED_CODE));
    session.check_auth_state().await;

    let err = session
        .sign_in_with_google(UserRole::Student)
        .await
        .unwrap_err();

    match &err {
        SessionError::BackendRejected { status, message } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "Invalid Firebase token");
        }
        other => panic!("expected BackendRejected, got {other:?}"),
    }
    assert!(err.is_auth_failure());

    let state = session.state();
    assert_eq!(state.phase, AuthPhase::Authenticated);
    assert!(state.error.is_some());
    assert_eq!(store.session_token().as_deref(), Some("sess-456"));
}

#[tokio::test]
async fn test_dismissed_consent_is_exchange_error() {
    let backend = TestBackend::start().await;
    let store = TokenStore::in_memory();
    let session = manager(backend.config(), &store, DismissedProvider);
    session.check_auth_state().await;

    let err = session
        .sign_in_with_google(UserRole::Student)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Exchange(_)));
    assert_eq!(session.state().phase, AuthPhase::Anonymous);
    assert_eq!(
        backend.state.exchange_calls.load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn test_unreachable_backend_during_sign_in_is_network_error() {
    let store = TokenStore::in_memory();
    let session = manager(unreachable_config(), &store, StaticProvider("fb-1"));

    let err = session
        .sign_in_with_google(UserRole::Student)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Network(_)));
    assert!(!store.has_tokens());
}

#[tokio::test]
async fn test_sign_in_finishing_after_sign_out_is_discarded() {
    let backend = TestBackend::start().await;
    let store = TokenStore::in_memory();
    let gate = Arc::new(Notify::new());
    let session = manager(backend.config(), &store, GatedProvider(Arc::clone(&gate)));

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.sign_in_with_google(UserRole::Student).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.state().phase, AuthPhase::SigningIn);

    session.sign_out();
    gate.notify_one();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(SessionError::Superseded)));
    assert_eq!(session.state().phase, AuthPhase::Anonymous);
    assert!(!store.has_tokens());
}

#[tokio::test]
async fn test_check_finishing_after_sign_out_is_discarded() {
    let backend = TestBackend::start().await;
    backend.state.set_me_delay(Duration::from_millis(200));
    let store = TokenStore::in_memory();
    store.set_tokens("id-123", "sess-456");
    let session = manager(backend.config(), &store, StaticProvider("unused"));

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.check_auth_state().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.state().phase, AuthPhase::Checking);

    session.sign_out();

    let state = pending.await.unwrap();
    assert_eq!(backend.state.me_calls(), 1);
    assert_eq!(state.phase, AuthPhase::Anonymous);
    assert!(state.user.is_none());
    assert_eq!(session.state().phase, AuthPhase::Anonymous);
    assert!(!store.has_tokens());
}

#[tokio::test]
async fn test_check_finishing_after_sign_in_is_discarded() {
    let backend = TestBackend::start().await;
    backend.state.set_me_delay(Duration::from_millis(200));
    let store = TokenStore::in_memory();
    store.set_tokens("id-old", "expired");
    let session = manager(backend.config(), &store, StaticProvider("fb-new"));

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.check_auth_state().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Only the in-flight check is slow
    backend.state.set_me_delay(Duration::ZERO);
    session.sign_in_with_google(UserRole::Student).await.unwrap();

    let state = pending.await.unwrap();
    assert_eq!(state.phase, AuthPhase::Authenticated);
    assert_eq!(state.identity_token.as_deref(), Some("fb-new"));
    assert_eq!(store.identity_token().as_deref(), Some("fb-new"));
    assert_eq!(store.session_token().as_deref(), Some("sess-for-fb-new"));
}

#[tokio::test]
async fn test_sign_out_after_sign_in() {
    let backend = TestBackend::start().await;
    let store = TokenStore::in_memory();
    let session = manager(backend.config(), &store, StaticProvider("fb-1"));
    session.sign_in_with_google(UserRole::Student).await.unwrap();

    session.sign_out();
    session.sign_out();

    let state = session.state();
    assert_eq!(state.phase, AuthPhase::Anonymous);
    assert!(state.user.is_none());
    assert!(state.session_token.is_none());
    assert!(!store.has_tokens());
}

#[tokio::test]
async fn test_refresh_user_with_rejected_token_signs_out() {
    let backend = TestBackend::start().await;
    let store = TokenStore::in_memory();
    store.set_tokens("id-123", "revoked");
    let session = manager(backend.config(), &store, StaticProvider("unused"));

    let err = session.refresh_user().await.unwrap_err();

    assert!(matches!(err, SessionError::BackendRejected { status: 401, .. }));
    assert_eq!(session.state().phase, AuthPhase::Anonymous);
    assert!(!store.has_tokens());
}

#[tokio::test]
async fn test_chat_transport_uses_session_token() {
    let backend = TestBackend::start().await;
    let store = TokenStore::in_memory();
    let session = manager(backend.config(), &store, StaticProvider("fb-9"));
    session.sign_in_with_google(UserRole::Student).await.unwrap();

    let mut stream = session
        .chat_transport()
        .stream_chat(&"hello".into())
        .await
        .unwrap();
    while futures::StreamExt::next(&mut stream).await.is_some() {}

    assert_eq!(
        backend.state.chat_auth().as_deref(),
        Some("Bearer sess-for-fb-9")
    );
}
