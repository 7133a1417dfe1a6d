//! 用户服务测试

mod common;

use admin_core::{
    error::ErrorKind,
    models::{association::EdgeKind, user::UpdateUserRequest, Status},
    repository::FailPoint,
    services::ReconcileMode,
    AppError,
};
use common::{sorted, user_request, TestApp, PASSWORD};

#[tokio::test]
async fn test_create_binds_roles_posts_and_depts() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let role = app.role(&ctx, "viewer", &[]).await;
    let post = app.post(&ctx, "dev").await;
    let dept = app.dept(&ctx, None, "R&D").await;

    let mut req = user_request("alice");
    req.role_ids = vec![role.clone()];
    req.post_ids = vec![post.clone()];
    req.dept_ids = vec![dept.clone()];

    let detail = app.core.users.create(&ctx, req).await.unwrap();

    assert_eq!(detail.user.username, "alice");
    assert_eq!(detail.user.tenant_id, "t1");
    assert_eq!(detail.role_ids, vec![role]);
    assert_eq!(detail.post_ids, vec![post]);
    assert_eq!(detail.dept_ids, vec![dept]);
    assert_ne!(detail.user.password_hash, PASSWORD);
}

#[tokio::test]
async fn test_create_is_atomic_with_bad_reference() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let role = app.role(&ctx, "viewer", &[]).await;

    let mut req = user_request("alice");
    req.role_ids = vec![role];
    req.post_ids = vec!["post-404".to_string()];

    let err = app.core.users.create(&ctx, req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidReference);

    // 用户行随事务回滚，用户名仍可用
    app.core.users.create(&ctx, user_request("alice")).await.unwrap();
}

#[tokio::test]
async fn test_create_rejects_weak_password() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");

    let mut req = user_request("alice");
    req.password = "password".to_string();

    let err = app.core.users.create(&ctx, req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_create_validates_request() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");

    let mut req = user_request("alice");
    req.email = Some("not-an-email".to_string());

    let err = app.core.users.create(&ctx, req).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_update_profile_and_status() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let user = app.user(&ctx, "alice", &[]).await;

    let updated = app
        .core
        .users
        .update(
            &ctx,
            &user,
            UpdateUserRequest {
                nickname: Some("Alice".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.nickname.as_deref(), Some("Alice"));
    assert_eq!(updated.status, Status::Enabled);

    let disabled = app
        .core
        .users
        .change_status(&ctx, &user, Status::Disabled)
        .await
        .unwrap();
    assert_eq!(disabled.status, Status::Disabled);
    assert_eq!(disabled.nickname.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn test_credentials_and_password_change() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let user = app.user(&ctx, "alice", &[]).await;

    let found = app
        .core
        .users
        .verify_credentials(&ctx, "alice", PASSWORD)
        .await
        .unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.clone()));
    assert!(app
        .core
        .users
        .verify_credentials(&ctx, "alice", "Wrong1234")
        .await
        .unwrap()
        .is_none());

    app.core
        .users
        .change_password(&ctx, &user, "NewPassw0rd")
        .await
        .unwrap();
    assert!(app
        .core
        .users
        .verify_credentials(&ctx, "alice", "NewPassw0rd")
        .await
        .unwrap()
        .is_some());

    let generated = app.core.users.reset_password(&ctx, &user).await.unwrap();
    assert!(app
        .core
        .users
        .verify_credentials(&ctx, "alice", &generated)
        .await
        .unwrap()
        .is_some());

    // 其他租户的同名账号不匹配
    let other = app.ctx("t2");
    assert!(app
        .core
        .users
        .verify_credentials(&other, "alice", &generated)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_disabled_user_cannot_sign_in() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let user = app.user(&ctx, "alice", &[]).await;

    app.core
        .users
        .change_status(&ctx, &user, Status::Disabled)
        .await
        .unwrap();

    assert!(app
        .core
        .users
        .verify_credentials(&ctx, "alice", PASSWORD)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_delete_clears_edges_and_frees_role() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let role = app.role(&ctx, "viewer", &[]).await;
    let user = app.user(&ctx, "alice", &[role.clone()]).await;

    let err = app.core.roles.delete(&ctx, &role).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    app.core.users.delete(&ctx, &user).await.unwrap();

    let err = app.core.users.get(&ctx, &user).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(app.core.roles.list_users(&ctx, &role).await.unwrap().is_empty());
    app.core.roles.delete(&ctx, &role).await.unwrap();
}

#[tokio::test]
async fn test_cannot_delete_self() {
    let app = TestApp::new();
    let user = app.user(&app.ctx("t1"), "alice", &[]).await;
    let ctx = app.core.context("t1", user.clone());

    let err = app.core.users.delete(&ctx, &user).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

#[tokio::test]
async fn test_role_reconcile_shortcuts() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let r1 = app.role(&ctx, "r1", &[]).await;
    let r2 = app.role(&ctx, "r2", &[]).await;
    let user = app.user(&ctx, "alice", &[r1.clone()]).await;

    app.core.users.add_roles(&ctx, &user, vec![r2.clone()]).await.unwrap();
    let detail = app.core.users.get(&ctx, &user).await.unwrap();
    assert_eq!(sorted(detail.role_ids), sorted(vec![r1.clone(), r2.clone()]));

    app.core.users.remove_roles(&ctx, &user, vec![r1]).await.unwrap();
    app.core.users.set_roles(&ctx, &user, vec![r2.clone()]).await.unwrap();
    let detail = app.core.users.get(&ctx, &user).await.unwrap();
    assert_eq!(detail.role_ids, vec![r2]);
}

#[tokio::test]
async fn test_reconcile_rejects_role_edges() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let user = app.user(&ctx, "alice", &[]).await;

    let err = app
        .core
        .users
        .reconcile(&ctx, &user, EdgeKind::RoleMenu, vec![], ReconcileMode::Replace)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_failed_nested_reconcile_rolls_back_user() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let role = app.role(&ctx, "viewer", &[]).await;

    let mut req = user_request("alice");
    req.role_ids = vec![role];

    app.store.fail_on(FailPoint::EdgeInsert);
    let err = app.core.users.create(&ctx, req).await.unwrap_err();
    app.store.clear_fail_points();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(app
        .core
        .users
        .verify_credentials(&ctx, "alice", PASSWORD)
        .await
        .unwrap()
        .is_none());
}
