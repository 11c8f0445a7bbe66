mod common;

use chrono::Utc;
use common::{TestApp, TENANT_NAME};
use idp_service::{
    models::{Tenant, TenantMode, WebauthnCredential},
    services::ServiceError,
};

async fn seed_credential(app: &TestApp, email: &str, sign_count: i64) -> WebauthnCredential {
    let user = app.create_user(email).await;
    let credential = WebauthnCredential::new(
        user.id,
        format!("ext-{}", email),
        "{\"old\":true}".to_string(),
        "Key".to_string(),
        sign_count,
    );
    app.state
        .db
        .insert_credential(&credential)
        .await
        .expect("Failed to seed credential");
    credential
}

#[tokio::test]
async fn test_sign_count_must_strictly_advance() {
    // 1. Setup: a credential whose stored count is 5
    let app = TestApp::spawn().await;
    let credential = seed_credential(&app, "alice@example.com", 5).await;

    // 2. A regressed count is rejected and nothing changes
    let updated = app
        .state
        .db
        .update_credential_after_authentication(credential.id, 3, "{\"new\":true}")
        .await
        .expect("update failed");
    assert_eq!(updated, 0);

    // 3. An equal count is rejected too
    let updated = app
        .state
        .db
        .update_credential_after_authentication(credential.id, 5, "{\"new\":true}")
        .await
        .expect("update failed");
    assert_eq!(updated, 0);

    let row = app
        .state
        .db
        .find_credential_by_id(credential.id)
        .await
        .expect("lookup failed")
        .expect("row must exist");
    assert_eq!(row.sign_count, 5);
    assert_eq!(row.public_key, "{\"old\":true}");

    // 4. A strictly greater count is accepted and persisted
    let updated = app
        .state
        .db
        .update_credential_after_authentication(credential.id, 6, "{\"new\":true}")
        .await
        .expect("update failed");
    assert_eq!(updated, 1);

    let row = app
        .state
        .db
        .find_credential_by_id(credential.id)
        .await
        .expect("lookup failed")
        .expect("row must exist");
    assert_eq!(row.sign_count, 6);
    assert_eq!(row.public_key, "{\"new\":true}");
}

#[tokio::test]
async fn test_authenticators_that_never_count_stay_usable() {
    // 1. Setup: a credential stuck at zero
    let app = TestApp::spawn().await;
    let credential = seed_credential(&app, "alice@example.com", 0).await;

    // 2. Zero-to-zero is the one permitted non-advance
    let updated = app
        .state
        .db
        .update_credential_after_authentication(credential.id, 0, "{\"new\":true}")
        .await
        .expect("update failed");
    assert_eq!(updated, 1);

    // 3. A counter that starts moving is accepted
    let updated = app
        .state
        .db
        .update_credential_after_authentication(credential.id, 5, "{\"newer\":true}")
        .await
        .expect("update failed");
    assert_eq!(updated, 1);

    // 4. And once moving, it can never report zero again
    let updated = app
        .state
        .db
        .update_credential_after_authentication(credential.id, 0, "{\"cloned\":true}")
        .await
        .expect("update failed");
    assert_eq!(updated, 0);

    let row = app
        .state
        .db
        .find_credential_by_id(credential.id)
        .await
        .expect("lookup failed")
        .expect("row must exist");
    assert_eq!(row.sign_count, 5);
}

#[tokio::test]
async fn test_token_revocation_wins_exactly_once() {
    // 1. Setup: a live token
    let app = TestApp::spawn().await;
    let user = app.create_user("alice@example.com").await;
    let token = app.issue_token(&user, "read").await;

    // 2. First revocation updates the row
    let revoked = app
        .state
        .db
        .revoke_access_token(&token.token, Utc::now())
        .await
        .expect("revoke failed");
    assert_eq!(revoked, 1);

    // 3. A second revocation is a no-op, preserving the first timestamp
    let row = app
        .state
        .db
        .find_access_token(&token.token)
        .await
        .expect("lookup failed")
        .expect("row must exist");
    let first_revoked_at = row.revoked_at.expect("revoked_at must be set");

    let revoked = app
        .state
        .db
        .revoke_access_token(&token.token, Utc::now())
        .await
        .expect("revoke failed");
    assert_eq!(revoked, 0);

    let row = app
        .state
        .db
        .find_access_token(&token.token)
        .await
        .expect("lookup failed")
        .expect("row must exist");
    assert_eq!(row.revoked_at, Some(first_revoked_at));
}

#[tokio::test]
async fn test_grant_consumption_wins_exactly_once() {
    let app = TestApp::spawn().await;
    let user = app.create_user("alice@example.com").await;
    let grant = app.issue_grant(&user).await;

    let consumed = app
        .state
        .db
        .consume_access_grant(&grant.token, Utc::now())
        .await
        .expect("consume failed");
    assert_eq!(consumed, 1);

    let consumed = app
        .state
        .db
        .consume_access_grant(&grant.token, Utc::now())
        .await
        .expect("consume failed");
    assert_eq!(consumed, 0);
}

#[tokio::test]
async fn test_unique_violations_surface_as_conflicts() {
    let app = TestApp::spawn().await;

    // 1. Tenant names are unique
    let duplicate = Tenant::new(TENANT_NAME.to_string(), TenantMode::Single);
    let err = app
        .state
        .db
        .insert_tenant(&duplicate)
        .await
        .expect_err("duplicate tenant must fail");
    assert!(matches!(err, ServiceError::Conflict(_)));

    // 2. Credential external ids are unique
    let credential = seed_credential(&app, "alice@example.com", 0).await;
    let mut clone = credential.clone();
    clone.id = uuid::Uuid::new_v4();
    let err = app
        .state
        .db
        .insert_credential(&clone)
        .await
        .expect_err("duplicate credential must fail");
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn test_deleting_a_user_cascades_to_everything_it_owns() {
    // 1. Setup: a user with a credential, a token, and a grant
    let app = TestApp::spawn().await;
    let credential = seed_credential(&app, "alice@example.com", 0).await;
    let user = app
        .state
        .db
        .find_user_by_id(credential.user_id)
        .await
        .expect("lookup failed")
        .expect("user must exist");
    let token = app.issue_token(&user, "read").await;
    let grant = app.issue_grant(&user).await;

    // 2. Delete the user
    app.state
        .identity
        .delete_user(user.id)
        .await
        .expect("cascade delete failed");

    // 3. Everything it owned is gone
    assert!(app
        .state
        .db
        .find_user_by_id(user.id)
        .await
        .expect("lookup failed")
        .is_none());
    assert!(app
        .state
        .db
        .find_credentials_by_user(user.id)
        .await
        .expect("lookup failed")
        .is_empty());
    assert!(app
        .state
        .db
        .find_access_token(&token.token)
        .await
        .expect("lookup failed")
        .is_none());
    assert!(app
        .state
        .db
        .find_access_grant(&grant.token)
        .await
        .expect("lookup failed")
        .is_none());

    // 4. Deleting again reports the miss
    let err = app
        .state
        .identity
        .delete_user(user.id)
        .await
        .expect_err("second delete must fail");
    assert!(matches!(err, ServiceError::NotFound(_)));
}
