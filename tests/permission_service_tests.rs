//! 权限解析测试

mod common;

use admin_core::{
    error::ErrorKind,
    models::{menu::UpdateMenuRequest, Status},
    repository::{MenuStore, RoleStore},
    AppError,
};
use common::{sorted, TestApp};
use std::collections::BTreeSet;

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_union_across_roles() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let m1 = app.menu(None, "user:read").await;
    let m2 = app.menu(None, "user:write").await;
    let r1 = app.role(&ctx, "r1", &[m1.clone()]).await;
    let r2 = app.role(&ctx, "r2", &[m1.clone(), m2.clone()]).await;
    let u1 = app.user(&ctx, "u1", &[r1, r2]).await;

    let effective = app.core.permissions.resolve(&ctx, &u1).await.unwrap();

    assert_eq!(effective.permissions, set(&["user:read", "user:write"]));
    assert_eq!(effective.roles, set(&["r1", "r2"]));
    assert_eq!(sorted(effective.menu_ids()), sorted(vec![m1, m2]));
}

#[tokio::test]
async fn test_overlapping_roles_grant_each_key_once() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let a = app.menu(None, "a").await;
    let b = app.menu(None, "b").await;
    let c = app.menu(None, "c").await;
    let r1 = app.role(&ctx, "r1", &[a.clone(), b.clone()]).await;
    let r2 = app.role(&ctx, "r2", &[b, c]).await;
    let user = app.user(&ctx, "alice", &[r1, r2]).await;

    let effective = app.core.permissions.resolve(&ctx, &user).await.unwrap();

    assert_eq!(effective.permissions, set(&["a", "b", "c"]));
    assert_eq!(effective.menu_ids().len(), 3);
}

#[tokio::test]
async fn test_menu_tree_keeps_hierarchy() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let root = app.menu(None, "system").await;
    let child = app.menu(Some(&root), "system:user").await;
    let role = app.role(&ctx, "admin", &[root.clone(), child.clone()]).await;
    let user = app.user(&ctx, "alice", &[role]).await;

    let effective = app.core.permissions.resolve(&ctx, &user).await.unwrap();

    assert_eq!(effective.menus.len(), 1);
    assert_eq!(effective.menus[0].node.id, root);
    assert_eq!(effective.menus[0].children[0].node.id, child);
}

#[tokio::test]
async fn test_user_without_roles_has_nothing() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let user = app.user(&ctx, "alice", &[]).await;

    let effective = app.core.permissions.resolve(&ctx, &user).await.unwrap();

    assert!(effective.permissions.is_empty());
    assert!(effective.roles.is_empty());
    assert!(effective.menus.is_empty());
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");

    let err = app.core.permissions.resolve(&ctx, "user-404").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_dangling_edges_are_skipped() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let kept = app.menu(None, "kept").await;
    let gone = app.menu(None, "gone").await;
    let live_role = app.role(&ctx, "live", &[kept.clone(), gone.clone()]).await;
    let dead_role = app.role(&ctx, "dead", &[kept.clone()]).await;
    let user = app.user(&ctx, "alice", &[live_role, dead_role.clone()]).await;

    // 绕过服务层直接软删除，边保留下来成为悬空边
    app.core
        .gateway()
        .run(&ctx, move |scope| {
            Box::pin(async move {
                scope.db().soft_delete_menu(&gone).await?;
                scope.db().soft_delete_role(&dead_role).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

    let effective = app.core.permissions.resolve(&ctx, &user).await.unwrap();

    assert_eq!(effective.roles, set(&["live"]));
    assert_eq!(effective.permissions, set(&["kept"]));
    assert_eq!(effective.menu_ids(), vec![kept]);
}

#[tokio::test]
async fn test_disabled_menu_and_role_grant_nothing() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let on = app.menu(None, "on").await;
    let off = app.menu(None, "off").await;
    let secret = app.menu(None, "secret").await;
    let role = app.role(&ctx, "staff", &[on, off.clone()]).await;
    let disabled_role = app.role(&ctx, "vault", &[secret]).await;
    let user = app.user(&ctx, "alice", &[role, disabled_role.clone()]).await;

    app.core
        .menus
        .update(
            &ctx,
            &off,
            UpdateMenuRequest {
                status: Some(Status::Disabled),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    app.core
        .roles
        .change_status(&ctx, &disabled_role, Status::Disabled)
        .await
        .unwrap();

    let effective = app.core.permissions.resolve(&ctx, &user).await.unwrap();

    assert_eq!(effective.permissions, set(&["on"]));
    assert_eq!(effective.roles, set(&["staff"]));
}

#[tokio::test]
async fn test_disabled_user_resolves_empty() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let menu = app.menu(None, "user:read").await;
    let role = app.role(&ctx, "viewer", &[menu]).await;
    let user = app.user(&ctx, "alice", &[role]).await;

    app.core
        .users
        .change_status(&ctx, &user, Status::Disabled)
        .await
        .unwrap();

    let effective = app.core.permissions.resolve(&ctx, &user).await.unwrap();
    assert!(effective.permissions.is_empty());
}

#[tokio::test]
async fn test_resolution_reflects_latest_state() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let read = app.menu(None, "user:read").await;
    let write = app.menu(None, "user:write").await;
    let role = app.role(&ctx, "viewer", &[read]).await;
    let user = app.user(&ctx, "alice", &[role.clone()]).await;

    assert!(!app
        .core
        .permissions
        .check_permission(&ctx, &user, "user:write")
        .await
        .unwrap());

    app.core.roles.grant_menus(&ctx, &role, vec![write]).await.unwrap();

    assert!(app
        .core
        .permissions
        .check_permission(&ctx, &user, "user:write")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_require_permission_forbidden() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let menu = app.menu(None, "user:read").await;
    let role = app.role(&ctx, "viewer", &[menu]).await;
    let user = app.user(&ctx, "alice", &[role]).await;

    app.core
        .permissions
        .require_permission(&ctx, &user, "user:read")
        .await
        .unwrap();

    let err = app
        .core
        .permissions
        .require_permission(&ctx, &user, "user:delete")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    assert_eq!(app.core.render_error(&err).code, 403);
}

#[tokio::test]
async fn test_menu_delete_unbinds_roles() {
    let app = TestApp::new();
    let ctx = app.ctx("t1");
    let menu = app.menu(None, "report:view").await;
    let role = app.role(&ctx, "analyst", &[menu.clone()]).await;
    let user = app.user(&ctx, "alice", &[role.clone()]).await;

    app.core.menus.delete(&app.platform(), &menu).await.unwrap();

    let detail = app.core.roles.get(&ctx, &role).await.unwrap();
    assert!(detail.menu_ids.is_empty());
    let effective = app.core.permissions.resolve(&ctx, &user).await.unwrap();
    assert!(effective.permissions.is_empty());
}
