//! 租户隔离测试

mod common;

use admin_core::{
    error::ErrorKind,
    models::{association::EdgeKind, menu::UpdateMenuRequest, Status},
    AppError,
};
use common::TestApp;

#[tokio::test]
async fn test_same_code_in_two_tenants() {
    let app = TestApp::new();
    let t1 = app.ctx("t1");
    let t2 = app.ctx("t2");

    let r1 = app.role(&t1, "admin", &[]).await;
    let r2 = app.role(&t2, "admin", &[]).await;
    assert_ne!(r1, r2);

    let t1_roles = app.core.roles.list(&t1).await.unwrap();
    assert_eq!(t1_roles.len(), 1);
    assert_eq!(t1_roles[0].id, r1);

    // 同租户内重复编码冲突
    let err = app
        .core
        .roles
        .create(
            &t1,
            admin_core::models::role::CreateRoleRequest {
                name: "Another".into(),
                code: "admin".into(),
                sort: 0,
                data_scope: Default::default(),
                remark: None,
                menu_ids: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { field: "code", .. }));
}

#[tokio::test]
async fn test_foreign_rows_are_invisible() {
    let app = TestApp::new();
    let t1 = app.ctx("t1");
    let t2 = app.ctx("t2");
    let foreign = app.role(&t2, "admin", &[]).await;

    let err = app.core.roles.get(&t1, &foreign).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = app
        .core
        .roles
        .change_status(&t1, &foreign, admin_core::models::Status::Disabled)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_cannot_bind_foreign_targets() {
    let app = TestApp::new();
    let t1 = app.ctx("t1");
    let t2 = app.ctx("t2");
    let foreign_role = app.role(&t2, "admin", &[]).await;
    let user = app.user(&t1, "alice", &[]).await;

    let err = app
        .core
        .users
        .add_roles(&t1, &user, vec![foreign_role.clone()])
        .await
        .unwrap_err();

    match err {
        AppError::InvalidReference { ids, .. } => assert_eq!(ids, vec![foreign_role]),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_reconcile_never_touches_other_tenant_edges() {
    let app = TestApp::new();
    let t1 = app.ctx("t1");
    let t2 = app.ctx("t2");
    let menu = app.menu(None, "user:read").await;

    // 菜单为全局目录，各租户都能绑定
    let t2_role = app.role(&t2, "admin", &[menu.clone()]).await;
    let t2_user = app.user(&t2, "bob", &[t2_role.clone()]).await;

    // T1 对 T2 的 owner 做调和：owner 不可见
    let err = app
        .core
        .reconcile(&t1, EdgeKind::RoleMenu, &t2_role, vec![], "replace")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = app
        .core
        .reconcile(&t1, EdgeKind::UserRole, &t2_user, vec![], "replace")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let detail = app.core.roles.get(&t2, &t2_role).await.unwrap();
    assert_eq!(detail.menu_ids, vec![menu.clone()]);
    let effective = app.core.permissions.resolve(&t2, &t2_user).await.unwrap();
    assert!(effective.has_permission("user:read"));
}

#[tokio::test]
async fn test_tenant_cannot_mutate_global_menus() {
    let app = TestApp::new();
    let t1 = app.ctx("t1");
    let t2 = app.ctx("t2");
    let menu = app.menu(None, "report:view").await;
    let t2_role = app.role(&t2, "analyst", &[menu.clone()]).await;
    let t2_user = app.user(&t2, "bob", &[t2_role]).await;

    let err = app
        .core
        .menus
        .update(
            &t1,
            &menu,
            UpdateMenuRequest {
                permission_key: Some("system:admin".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = app
        .core
        .menus
        .update(
            &t1,
            &menu,
            UpdateMenuRequest {
                status: Some(Status::Disabled),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = app.core.menus.delete(&t1, &menu).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = app
        .core
        .menus
        .create(&t1, common::menu_request(None, "system:admin"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // T2 的权限保持不变
    let effective = app.core.permissions.resolve(&t2, &t2_user).await.unwrap();
    assert_eq!(
        effective.permissions.into_iter().collect::<Vec<_>>(),
        vec!["report:view".to_string()]
    );
    assert_eq!(app.core.menus.get(&t1, &menu).await.unwrap().status, Status::Enabled);
}

#[tokio::test]
async fn test_platform_menu_delete_unbinds_every_tenant() {
    let app = TestApp::new();
    let t1 = app.ctx("t1");
    let t2 = app.ctx("t2");
    let menu = app.menu(None, "audit:view").await;
    let keep = app.menu(None, "audit:export").await;
    let t1_role = app.role(&t1, "auditor", &[menu.clone()]).await;
    let t2_role = app.role(&t2, "auditor", &[menu.clone(), keep.clone()]).await;
    let t2_user = app.user(&t2, "bob", &[t2_role.clone()]).await;

    app.core.menus.delete(&app.platform(), &menu).await.unwrap();

    let t1_detail = app.core.roles.get(&t1, &t1_role).await.unwrap();
    assert!(t1_detail.menu_ids.is_empty());

    let t2_detail = app.core.roles.get(&t2, &t2_role).await.unwrap();
    assert_eq!(t2_detail.menu_ids, vec![keep.clone()]);
    let effective = app.core.permissions.resolve(&t2, &t2_user).await.unwrap();
    assert_eq!(effective.menu_ids(), vec![keep]);
}

#[tokio::test]
async fn test_usernames_are_unique_per_tenant() {
    let app = TestApp::new();
    let t1 = app.ctx("t1");
    let t2 = app.ctx("t2");

    app.user(&t1, "alice", &[]).await;
    app.user(&t2, "alice", &[]).await;

    let err = app
        .core
        .users
        .create(&t1, common::user_request("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { field: "username", .. }));
}
