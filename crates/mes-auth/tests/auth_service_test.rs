//! Integration tests for the authentication and user services.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use mes_auth::config::AuthConfig;
use mes_auth::error::AuthError;
use mes_auth::observer::{AuthObserver, CleanupAction};
use mes_auth::password::PasswordHasher;
use mes_auth::role_name::StoreRoleNames;
use mes_auth::service::AuthService;
use mes_auth::token;
use mes_auth::users::UserService;
use mes_core::error::{MesError, MesResult};
use mes_core::models::refresh_token::{CreateRefreshToken, RefreshToken};
use mes_core::models::role::{CreateRole, UpdateRole};
use mes_core::models::user::{CreateUser, UpdateUser, User};
use mes_core::repository::{RefreshTokenRepository, RoleRepository, UserRepository};
use mes_db::repository::{
    SurrealRefreshTokenRepository, SurrealRoleRepository, SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret-test-secret-test-secret".into(),
        jwt_issuer: "mes-test".into(),
        access_token_lifetime_secs: 900,
        // Minimal cost so the tests stay fast.
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        ..AuthConfig::default()
    }
}

struct Fixture {
    db: Surreal<Db>,
    users: SurrealUserRepository<Db>,
    tokens: SurrealRefreshTokenRepository<Db>,
    alice: User,
}

/// Spin up in-memory DB, run migrations, create alice (role 2).
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    mes_db::run_migrations(&db).await.unwrap();

    let users = SurrealUserRepository::new(db.clone());
    let tokens = SurrealRefreshTokenRepository::new(db.clone());

    let user_service = UserService::new(
        users.clone(),
        tokens.clone(),
        PasswordHasher::new(&test_config()).unwrap(),
    );
    let alice = user_service
        .create(CreateUser {
            username: "alice".into(),
            password: "s3cret!".into(),
            full_name: "Alice Example".into(),
            role_id: 2,
            email: Some("alice@example.com".into()),
        })
        .await
        .unwrap();

    Fixture {
        db,
        users,
        tokens,
        alice,
    }
}

fn auth_service<T: RefreshTokenRepository + 'static>(
    fx: &Fixture,
    tokens: T,
) -> AuthService<SurrealUserRepository<Db>, T> {
    AuthService::new(fx.users.clone(), tokens, &test_config()).unwrap()
}

// ---------------------------------------------------------------------------
// Store wrapper that fails on demand, and an observer that records calls
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct FlakyTokens {
    inner: SurrealRefreshTokenRepository<Db>,
    fail_creates: Arc<AtomicUsize>,
    fail_deletes: Arc<AtomicBool>,
    create_delay_ms: Arc<AtomicU64>,
}

impl FlakyTokens {
    fn new(inner: SurrealRefreshTokenRepository<Db>) -> Self {
        Self {
            inner,
            fail_creates: Arc::new(AtomicUsize::new(0)),
            fail_deletes: Arc::new(AtomicBool::new(false)),
            create_delay_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    fn injected() -> MesError {
        MesError::Database("injected failure".into())
    }
}

impl RefreshTokenRepository for FlakyTokens {
    async fn create(&self, input: CreateRefreshToken) -> MesResult<RefreshToken> {
        let pending = self.fail_creates.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_creates.store(pending - 1, Ordering::SeqCst);
            return Err(Self::injected());
        }
        let delay = self.create_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(StdDuration::from_millis(delay)).await;
        }
        self.inner.create(input).await
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> MesResult<RefreshToken> {
        self.inner.get_by_token_hash(token_hash).await
    }

    async fn consume(&self, id: i64) -> MesResult<bool> {
        self.inner.consume(id).await
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> MesResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.delete_by_token_hash(token_hash).await
    }

    async fn delete_for_user(&self, user_id: i64) -> MesResult<u64> {
        self.inner.delete_for_user(user_id).await
    }

    async fn cleanup_expired(&self) -> MesResult<u64> {
        self.inner.cleanup_expired().await
    }
}

#[derive(Clone, Default)]
struct RecordingObserver {
    seen: Arc<Mutex<Vec<CleanupAction>>>,
}

impl RecordingObserver {
    fn actions(&self) -> Vec<CleanupAction> {
        self.seen.lock().unwrap().clone()
    }
}

impl AuthObserver for RecordingObserver {
    fn cleanup_failed(&self, action: CleanupAction, _error: &dyn std::error::Error) {
        self.seen.lock().unwrap().push(action);
    }
}

// ---------------------------------------------------------------------------
// Authenticate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn authenticate_issues_verifiable_token() {
    let fx = setup().await;
    let auth = auth_service(&fx, fx.tokens.clone());

    let out = auth.authenticate("alice", "s3cret!").await.unwrap();

    assert_eq!(out.expires_in, 900);
    assert_eq!(out.user.id, fx.alice.id);
    assert!(!out.refresh_token.is_empty());

    let claims = auth.verify(&out.access_token).unwrap();
    assert_eq!(claims.id, fx.alice.id);
    assert_eq!(claims.role, "operator");
    assert_eq!(claims.iss, "mes-test");

    // Only the digest is stored.
    let digest = token::hash_refresh_token(&out.refresh_token);
    let record = fx.tokens.get_by_token_hash(&digest).await.unwrap();
    assert_eq!(record.user_id, fx.alice.id);
    assert!(record.expires_at > Utc::now() + Duration::days(29));
}

#[tokio::test]
async fn login_user_view_has_no_hash() {
    let fx = setup().await;
    let auth = auth_service(&fx, fx.tokens.clone());

    let out = auth.authenticate("alice", "s3cret!").await.unwrap();
    let view = out.user.view();
    assert_eq!(view.username, "alice");
    assert_eq!(view.role_id, 2);
    assert!(!format!("{:?}", out.user).contains("argon2"));
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let fx = setup().await;
    let auth = auth_service(&fx, fx.tokens.clone());

    let err = auth.authenticate("alice", "wrong").await.unwrap_err();
    assert!(
        matches!(err, AuthError::InvalidCredentials),
        "expected InvalidCredentials, got: {err:?}"
    );
}

#[tokio::test]
async fn unknown_user_is_indistinguishable_from_wrong_password() {
    let fx = setup().await;
    let auth = auth_service(&fx, fx.tokens.clone());

    let unknown = auth.authenticate("mallory", "s3cret!").await.unwrap_err();
    let wrong = auth.authenticate("alice", "nope").await.unwrap_err();
    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn failed_login_persists_no_refresh_token() {
    let fx = setup().await;
    let auth = auth_service(&fx, fx.tokens.clone());

    auth.authenticate("alice", "wrong").await.unwrap_err();
    assert_eq!(fx.tokens.delete_for_user(fx.alice.id).await.unwrap(), 0);
}

#[tokio::test]
async fn refresh_token_persist_failure_is_not_a_credential_error() {
    let fx = setup().await;
    let flaky = FlakyTokens::new(fx.tokens.clone());
    flaky.fail_creates.store(1, Ordering::SeqCst);
    let auth = auth_service(&fx, flaky);

    let err = auth.authenticate("alice", "s3cret!").await.unwrap_err();
    assert!(
        matches!(err, AuthError::Store(_)),
        "expected Store, got: {err:?}"
    );
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_rotates_token_once() {
    let fx = setup().await;
    let auth = auth_service(&fx, fx.tokens.clone());
    let login = auth.authenticate("alice", "s3cret!").await.unwrap();

    let refreshed = auth.refresh(&login.refresh_token).await.unwrap();
    assert_ne!(refreshed.refresh_token, login.refresh_token);
    assert_eq!(refreshed.expires_in, 900);
    let claims = auth.verify(&refreshed.access_token).unwrap();
    assert_eq!(claims.id, fx.alice.id);
    assert_eq!(claims.role, "operator");

    // Second use of the same token fails.
    let err = auth.refresh(&login.refresh_token).await.unwrap_err();
    assert!(
        matches!(err, AuthError::InvalidRefreshToken),
        "expected InvalidRefreshToken, got: {err:?}"
    );

    // The replacement works exactly once as well.
    let again = auth.refresh(&refreshed.refresh_token).await.unwrap();
    assert_ne!(again.refresh_token, refreshed.refresh_token);
}

#[tokio::test]
async fn unknown_refresh_token_is_invalid() {
    let fx = setup().await;
    let auth = auth_service(&fx, fx.tokens.clone());

    let err = auth.refresh("not-a-real-token").await.unwrap_err();
    assert!(
        matches!(err, AuthError::InvalidRefreshToken),
        "expected InvalidRefreshToken, got: {err:?}"
    );
}

#[tokio::test]
async fn expired_refresh_token_is_rejected_and_deleted() {
    let fx = setup().await;
    let auth = auth_service(&fx, fx.tokens.clone());

    let raw = "expired-raw-token";
    let digest = token::hash_refresh_token(raw);
    fx.tokens
        .create(CreateRefreshToken {
            user_id: fx.alice.id,
            token_hash: digest.clone(),
            expires_at: Utc::now() - Duration::minutes(1),
        })
        .await
        .unwrap();

    let err = auth.refresh(raw).await.unwrap_err();
    assert!(
        matches!(err, AuthError::RefreshTokenExpired),
        "expected RefreshTokenExpired, got: {err:?}"
    );

    let lookup = fx.tokens.get_by_token_hash(&digest).await.unwrap_err();
    assert!(lookup.is_not_found(), "record should be gone, got: {lookup:?}");
}

#[tokio::test]
async fn failed_expired_delete_is_observed_not_propagated() {
    let fx = setup().await;
    let flaky = FlakyTokens::new(fx.tokens.clone());
    flaky.fail_deletes.store(true, Ordering::SeqCst);
    let observer = RecordingObserver::default();
    let auth = auth_service(&fx, flaky).with_observer(observer.clone());

    let raw = "expired-raw-token";
    fx.tokens
        .create(CreateRefreshToken {
            user_id: fx.alice.id,
            token_hash: token::hash_refresh_token(raw),
            expires_at: Utc::now() - Duration::minutes(1),
        })
        .await
        .unwrap();

    let err = auth.refresh(raw).await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenExpired), "got: {err:?}");
    assert_eq!(
        observer.actions(),
        [CleanupAction::DeleteExpiredRefreshToken]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refresh_has_exactly_one_winner() {
    let fx = setup().await;
    let auth = Arc::new(auth_service(&fx, fx.tokens.clone()));

    for round in 0..10 {
        let login = auth.authenticate("alice", "s3cret!").await.unwrap();

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let auth = Arc::clone(&auth);
                let raw = login.refresh_token.clone();
                tokio::spawn(async move { auth.refresh(&raw).await })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AuthError::InvalidRefreshToken) => {}
                Err(other) => panic!("round {round}: loser got {other:?}"),
            }
        }
        assert_eq!(successes, 1, "round {round}");
    }
}

#[tokio::test]
async fn cancelled_refresh_still_leaves_a_usable_token() {
    let fx = setup().await;
    let flaky = FlakyTokens::new(fx.tokens.clone());
    let auth = auth_service(&fx, flaky.clone());
    let login = auth.authenticate("alice", "s3cret!").await.unwrap();

    // The replacement is slow to persist; the caller gives up first.
    flaky.create_delay_ms.store(1_000, Ordering::SeqCst);
    let outcome = tokio::time::timeout(
        StdDuration::from_millis(100),
        auth.refresh(&login.refresh_token),
    )
    .await;
    assert!(outcome.is_err(), "refresh should still be in flight");

    // Let the detached rotation finish.
    tokio::time::sleep(StdDuration::from_millis(1_500)).await;

    // Either the old record or its replacement survives, never neither.
    assert_eq!(fx.tokens.delete_for_user(fx.alice.id).await.unwrap(), 1);
}

#[tokio::test]
async fn refresh_for_vanished_user_deletes_the_record() {
    let fx = setup().await;
    let observer = RecordingObserver::default();
    let auth = auth_service(&fx, fx.tokens.clone()).with_observer(observer.clone());
    let login = auth.authenticate("alice", "s3cret!").await.unwrap();

    // Removed behind the user service's back, so the token survives.
    fx.users.delete(fx.alice.id).await.unwrap();

    let err = auth.refresh(&login.refresh_token).await.unwrap_err();
    assert!(
        matches!(err, AuthError::Store(ref e) if e.is_not_found()),
        "got: {err:?}"
    );

    let digest = token::hash_refresh_token(&login.refresh_token);
    assert!(fx.tokens.get_by_token_hash(&digest).await.unwrap_err().is_not_found());
    assert!(observer.actions().is_empty());
}

#[tokio::test]
async fn failed_orphan_delete_is_observed() {
    let fx = setup().await;
    let flaky = FlakyTokens::new(fx.tokens.clone());
    let observer = RecordingObserver::default();
    let auth = auth_service(&fx, flaky.clone()).with_observer(observer.clone());
    let login = auth.authenticate("alice", "s3cret!").await.unwrap();

    fx.users.delete(fx.alice.id).await.unwrap();
    flaky.fail_deletes.store(true, Ordering::SeqCst);

    let err = auth.refresh(&login.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::Store(_)), "got: {err:?}");
    assert_eq!(
        observer.actions(),
        [CleanupAction::DeleteOrphanedRefreshToken]
    );
}

#[tokio::test]
async fn failed_persist_restores_old_token() {
    let fx = setup().await;
    let flaky = FlakyTokens::new(fx.tokens.clone());
    let observer = RecordingObserver::default();
    let auth = auth_service(&fx, flaky.clone()).with_observer(observer.clone());
    let login = auth.authenticate("alice", "s3cret!").await.unwrap();

    // Replacement fails; restoring the old record succeeds.
    flaky.fail_creates.store(1, Ordering::SeqCst);
    let err = auth.refresh(&login.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::Store(_)), "got: {err:?}");
    assert!(observer.actions().is_empty());

    // The client can retry with the same token.
    let retried = auth.refresh(&login.refresh_token).await.unwrap();
    assert_ne!(retried.refresh_token, login.refresh_token);
}

#[tokio::test]
async fn failed_restore_is_observed() {
    let fx = setup().await;
    let flaky = FlakyTokens::new(fx.tokens.clone());
    let observer = RecordingObserver::default();
    let auth = auth_service(&fx, flaky.clone()).with_observer(observer.clone());
    let login = auth.authenticate("alice", "s3cret!").await.unwrap();

    // Both the replacement and the restore fail.
    flaky.fail_creates.store(2, Ordering::SeqCst);
    let err = auth.refresh(&login.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::Store(_)), "got: {err:?}");
    assert_eq!(observer.actions(), [CleanupAction::RestoreRefreshToken]);
}

// ---------------------------------------------------------------------------
// Role names
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unmapped_role_id_gets_fallback_name() {
    let fx = setup().await;
    let auth = auth_service(&fx, fx.tokens.clone());
    let users = UserService::new(
        fx.users.clone(),
        fx.tokens.clone(),
        auth.hasher().clone(),
    );
    users
        .create(CreateUser {
            username: "dave".into(),
            password: "pw".into(),
            full_name: String::new(),
            role_id: 17,
            email: None,
        })
        .await
        .unwrap();

    let out = auth.authenticate("dave", "pw").await.unwrap();
    assert_eq!(auth.verify(&out.access_token).unwrap().role, "user");
}

#[tokio::test]
async fn store_backed_role_names_follow_renames() {
    let fx = setup().await;
    let roles = SurrealRoleRepository::new(fx.db.clone());
    for name in ["admin", "operator", "viewer"] {
        roles
            .create(CreateRole {
                name: name.into(),
                permission_ids: vec![],
            })
            .await
            .unwrap();
    }
    roles
        .update(
            2,
            UpdateRole {
                name: Some("line-operator".into()),
                permission_ids: None,
            },
        )
        .await
        .unwrap();

    let auth = auth_service(&fx, fx.tokens.clone()).with_role_names(StoreRoleNames::new(roles));
    let out = auth.authenticate("alice", "s3cret!").await.unwrap();
    assert_eq!(auth.verify(&out.access_token).unwrap().role, "line-operator");
}

// ---------------------------------------------------------------------------
// User lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_user_rejects_empty_password() {
    let fx = setup().await;
    let users = UserService::new(
        fx.users.clone(),
        fx.tokens.clone(),
        PasswordHasher::new(&test_config()).unwrap(),
    );

    let err = users
        .create(CreateUser {
            username: "bob".into(),
            password: String::new(),
            full_name: "Bob".into(),
            role_id: 3,
            email: None,
        })
        .await
        .unwrap_err();
    assert!(
        matches!(err, AuthError::Store(MesError::Validation { .. })),
        "expected Validation, got: {err:?}"
    );
    assert!(fx.users.get_by_username("bob").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn created_user_stores_only_a_hash() {
    let fx = setup().await;
    assert_ne!(fx.alice.password_hash, "s3cret!");
    assert!(fx.alice.password_hash.starts_with("$argon2id$"));
}

#[tokio::test]
async fn duplicate_username_is_conflict() {
    let fx = setup().await;
    let users = UserService::new(
        fx.users.clone(),
        fx.tokens.clone(),
        PasswordHasher::new(&test_config()).unwrap(),
    );

    let err = users
        .create(CreateUser {
            username: "alice".into(),
            password: "other".into(),
            full_name: String::new(),
            role_id: 3,
            email: None,
        })
        .await
        .unwrap_err();
    assert!(
        matches!(err, AuthError::Store(MesError::AlreadyExists { .. })),
        "expected AlreadyExists, got: {err:?}"
    );
}

#[tokio::test]
async fn update_without_password_keeps_hash() {
    let fx = setup().await;
    let users = UserService::new(
        fx.users.clone(),
        fx.tokens.clone(),
        PasswordHasher::new(&test_config()).unwrap(),
    );

    let updated = users
        .update(
            fx.alice.id,
            UpdateUser {
                full_name: Some("Alice Renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.full_name, "Alice Renamed");
    assert_eq!(updated.password_hash, fx.alice.password_hash);

    // An empty password is treated as "no change" too.
    let updated = users
        .update(
            fx.alice.id,
            UpdateUser {
                password: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.password_hash, fx.alice.password_hash);

    let auth = auth_service(&fx, fx.tokens.clone());
    assert!(auth.authenticate("alice", "s3cret!").await.is_ok());
}

#[tokio::test]
async fn update_with_password_rehashes() {
    let fx = setup().await;
    let users = UserService::new(
        fx.users.clone(),
        fx.tokens.clone(),
        PasswordHasher::new(&test_config()).unwrap(),
    );

    let updated = users
        .update(
            fx.alice.id,
            UpdateUser {
                password: Some("n3w-s3cret".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_ne!(updated.password_hash, fx.alice.password_hash);

    let auth = auth_service(&fx, fx.tokens.clone());
    assert!(matches!(
        auth.authenticate("alice", "s3cret!").await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(auth.authenticate("alice", "n3w-s3cret").await.is_ok());
}

#[tokio::test]
async fn deleting_user_revokes_refresh_tokens() {
    let fx = setup().await;
    let auth = auth_service(&fx, fx.tokens.clone());
    let users = UserService::new(
        fx.users.clone(),
        fx.tokens.clone(),
        auth.hasher().clone(),
    );
    let login = auth.authenticate("alice", "s3cret!").await.unwrap();

    users.delete(fx.alice.id).await.unwrap();

    let err = auth.refresh(&login.refresh_token).await.unwrap_err();
    assert!(
        matches!(err, AuthError::InvalidRefreshToken),
        "expected InvalidRefreshToken, got: {err:?}"
    );
    assert!(users.get(fx.alice.id).await.is_err());
}

// ---------------------------------------------------------------------------
// Verify
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tampered_access_token_is_rejected() {
    let fx = setup().await;
    let auth = auth_service(&fx, fx.tokens.clone());
    let out = auth.authenticate("alice", "s3cret!").await.unwrap();

    let mut tampered = out.access_token.clone();
    tampered.push('x');
    assert!(matches!(
        auth.verify(&tampered),
        Err(AuthError::InvalidToken(_))
    ));
}
