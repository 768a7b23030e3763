//! End-to-end tests of login, renewal, logout and throttling

use garage_auth_core::{
    derive_permissions, has_permission, AuthConfig, AuthError, AuthService, ClientInfo,
    CredentialStore, MemoryStore, NewUser, Principal, Role,
};
use std::sync::Arc;

const PASSWORD: &str = "Oficina#2024";

// =========================================================================
// Test Helpers
// =========================================================================

struct TestEnvironment {
    service: Arc<AuthService>,
    store: Arc<MemoryStore>,
    admin: Principal,
}

impl TestEnvironment {
    async fn new() -> Self {
        let mut config = AuthConfig::default().with_secret("integration-secret-0123456789abcdef");
        config.passwords.bcrypt_cost = 4;
        Self::with_config(config).await
    }

    async fn with_config(config: AuthConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(AuthService::new(config, store.clone()).unwrap());
        let admin = service
            .ensure_default_admin("admin@garage.example", "Administrator", PASSWORD)
            .await
            .unwrap()
            .unwrap();
        let admin = Principal::new(admin.id, admin.email, admin.name, admin.role);

        Self {
            service,
            store,
            admin,
        }
    }

    async fn add_user(&self, email: &str, role: Role) -> uuid::Uuid {
        self.service
            .create_user(&self.admin, NewUser::new(email, "Test User", role), PASSWORD)
            .await
            .unwrap()
            .id
    }
}

fn office() -> ClientInfo {
    ClientInfo::new()
        .with_address("10.1.1.20")
        .with_agent("Mozilla/5.0")
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn test_login_token_carries_role_permissions() {
    let env = TestEnvironment::new().await;
    env.add_user("mech@garage.example", Role::Mechanic).await;

    let outcome = env
        .service
        .login("mech@garage.example", PASSWORD, &office())
        .await
        .unwrap();

    let claims = env
        .service
        .jwt()
        .verify_access_token(&outcome.access_token)
        .unwrap();
    assert_eq!(claims.role, Role::Mechanic);
    let expected: Vec<String> = derive_permissions(Role::Mechanic).into_iter().collect();
    assert_eq!(claims.permissions, expected);

    let principal = env.service.authenticate(&outcome.access_token).await.unwrap();
    assert!(has_permission(principal.role, "service_orders:update"));
    assert!(principal.require_permission("sales:create").is_err());
}

#[tokio::test]
async fn test_access_token_never_contains_password_hash() {
    let env = TestEnvironment::new().await;
    let outcome = env
        .service
        .login("admin@garage.example", PASSWORD, &office())
        .await
        .unwrap();

    let stored = env
        .store
        .find_user_by_email("admin@garage.example")
        .await
        .unwrap()
        .unwrap();
    let claims = env
        .service
        .jwt()
        .verify_access_token(&outcome.access_token)
        .unwrap();
    let json = serde_json::to_string(&claims).unwrap();
    assert!(!json.contains(&stored.password_hash));
    assert!(!json.contains("password"));
}

#[tokio::test]
async fn test_five_failures_then_correct_password_is_throttled() {
    let env = TestEnvironment::new().await;
    env.add_user("op@garage.example", Role::Operator).await;
    let client = office();

    for _ in 0..5 {
        assert!(matches!(
            env.service
                .login("op@garage.example", "Wrong#Pass1", &client)
                .await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    let err = env
        .service
        .login("op@garage.example", PASSWORD, &client)
        .await
        .unwrap_err();
    match err {
        AuthError::Throttled { retry_after_secs } => {
            assert!(retry_after_secs > 0 && retry_after_secs <= 900);
        }
        other => panic!("expected throttling, got {:?}", other),
    }

    // other identities from the same address are unaffected
    assert!(env
        .service
        .login("admin@garage.example", PASSWORD, &client)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_four_failures_still_allow_login() {
    let env = TestEnvironment::new().await;
    env.add_user("op@garage.example", Role::Operator).await;

    for _ in 0..4 {
        let _ = env
            .service
            .login("op@garage.example", "Wrong#Pass1", &office())
            .await;
    }
    assert!(env
        .service
        .login("op@garage.example", PASSWORD, &office())
        .await
        .is_ok());
}

// =========================================================================
// Renewal and logout
// =========================================================================

#[tokio::test]
async fn test_refresh_rotates_and_replay_fails() {
    let env = TestEnvironment::new().await;
    let first = env
        .service
        .login("admin@garage.example", PASSWORD, &office())
        .await
        .unwrap();

    let second = env
        .service
        .refresh(&first.session_handle, &office())
        .await
        .unwrap();
    assert_ne!(first.session_handle, second.session_handle);
    assert_eq!(second.user.id, env.admin.user_id);

    assert!(matches!(
        env.service.refresh(&first.session_handle, &office()).await,
        Err(AuthError::SessionInvalid)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_has_one_winner() {
    let env = TestEnvironment::new().await;
    let outcome = env
        .service
        .login("admin@garage.example", PASSWORD, &office())
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = env.service.clone();
        let handle = outcome.session_handle.clone();
        tasks.push(tokio::spawn(async move {
            service.refresh(&handle, &ClientInfo::new()).await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => winners += 1,
            Err(AuthError::SessionInvalid) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_logout_all_invalidates_every_handle() {
    let env = TestEnvironment::new().await;
    let mut handles = Vec::new();
    for _ in 0..3 {
        handles.push(
            env.service
                .login("admin@garage.example", PASSWORD, &office())
                .await
                .unwrap()
                .session_handle,
        );
    }

    assert_eq!(env.service.logout_all(env.admin.user_id).await.unwrap(), 3);
    for handle in &handles {
        assert!(matches!(
            env.service.refresh(handle, &office()).await,
            Err(AuthError::SessionInvalid)
        ));
    }
    assert!(env
        .service
        .list_sessions(env.admin.user_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let env = TestEnvironment::new().await;
    let outcome = env
        .service
        .login("admin@garage.example", PASSWORD, &office())
        .await
        .unwrap();

    env.service.logout(&outcome.session_handle).await.unwrap();
    env.service.logout(&outcome.session_handle).await.unwrap();
    assert!(env
        .service
        .refresh(&outcome.session_handle, &office())
        .await
        .is_err());
}

#[tokio::test]
async fn test_prefix_revocation_cannot_touch_other_users() {
    let env = TestEnvironment::new().await;
    let other_id = env.add_user("op@garage.example", Role::Operator).await;

    let admin_session = env
        .service
        .login("admin@garage.example", PASSWORD, &office())
        .await
        .unwrap();
    env.service
        .login("op@garage.example", PASSWORD, &office())
        .await
        .unwrap();

    let prefix = &admin_session.session_handle[..8];
    assert!(matches!(
        env.service.revoke_session_by_prefix(other_id, prefix).await,
        Err(AuthError::SessionInvalid)
    ));
    assert!(env
        .service
        .refresh(&admin_session.session_handle, &office())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_listed_prefix_revokes_own_session() {
    let env = TestEnvironment::new().await;
    let outcome = env
        .service
        .login("admin@garage.example", PASSWORD, &office())
        .await
        .unwrap();

    let sessions = env.service.list_sessions(env.admin.user_id).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].prefix.len(), 8);
    assert_eq!(sessions[0].origin_address.as_deref(), Some("10.1.1.20"));

    env.service
        .revoke_session_by_prefix(env.admin.user_id, &sessions[0].prefix)
        .await
        .unwrap();
    assert!(env
        .service
        .refresh(&outcome.session_handle, &office())
        .await
        .is_err());
}

// =========================================================================
// Sweep
// =========================================================================

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let env = TestEnvironment::new().await;
    let outcome = env
        .service
        .login("admin@garage.example", PASSWORD, &office())
        .await
        .unwrap();
    env.service.logout(&outcome.session_handle).await.unwrap();

    let later = chrono::Utc::now() + chrono::Duration::days(40);
    let first = env.service.sweep_at(later).await.unwrap();
    assert_eq!(first.expired_sessions, 1);
    assert_eq!(first.login_attempts, 1);

    let second = env.service.sweep_at(later).await.unwrap();
    assert_eq!(second.total(), 0);
}
