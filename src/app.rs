//! 服务装配
//! 把存储、ID 生成器、密码哈希器与错误模板表注入到各个服务

use crate::{
    auth::PasswordHasher,
    config::AppConfig,
    context::{RequestContext, TenantId, PLATFORM_TENANT},
    error::{AppError, ErrorCatalog, ErrorKind, ErrorResponse},
    ids::{IdGenerator, UuidIdGenerator},
    models::association::EdgeKind,
    repository::{PgStore, Store},
    services::{
        DataScopeResolver, DeptService, MenuService, PermissionService,
        PostService, ReconcileMode, ReconcileOutcome, RoleService, UserService,
    },
    transaction::Gateway,
};
use std::{sync::Arc, time::Duration};

/// 管理核心的入口
#[derive(Clone)]
pub struct AdminCore {
    pub roles: RoleService,
    pub menus: MenuService,
    pub depts: DeptService,
    pub posts: PostService,
    pub users: UserService,
    pub permissions: PermissionService,
    pub data_scope: DataScopeResolver,
    gateway: Gateway,
    catalog: Arc<ErrorCatalog>,
    request_timeout: Option<Duration>,
    platform: TenantId,
}

/// 构建 [`AdminCore`] 的可选项
pub struct AdminCoreBuilder {
    store: Arc<dyn Store>,
    ids: Arc<dyn IdGenerator>,
    hasher: Arc<PasswordHasher>,
    catalog: Arc<ErrorCatalog>,
    request_timeout: Option<Duration>,
    platform: TenantId,
}

impl AdminCoreBuilder {
    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn catalog(mut self, catalog: Arc<ErrorCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// 可以维护全局菜单目录的租户
    pub fn platform_tenant(mut self, tenant: impl Into<TenantId>) -> Self {
        self.platform = tenant.into();
        self
    }

    pub fn build(self) -> AdminCore {
        let gateway = Gateway::new(self.store);

        AdminCore {
            roles: RoleService::new(gateway.clone(), self.ids.clone()),
            menus: MenuService::new(gateway.clone(), self.ids.clone(), self.platform.clone()),
            depts: DeptService::new(gateway.clone(), self.ids.clone()),
            posts: PostService::new(gateway.clone(), self.ids.clone()),
            users: UserService::new(gateway.clone(), self.ids, self.hasher),
            permissions: PermissionService::new(gateway.clone()),
            data_scope: DataScopeResolver::new(gateway.clone()),
            gateway,
            catalog: self.catalog,
            request_timeout: self.request_timeout,
            platform: self.platform,
        }
    }
}

impl AdminCore {
    /// 默认使用 UUID 与内置错误模板
    pub fn builder(store: Arc<dyn Store>, hasher: PasswordHasher) -> AdminCoreBuilder {
        AdminCoreBuilder {
            store,
            ids: Arc::new(UuidIdGenerator),
            hasher: Arc::new(hasher),
            catalog: Arc::new(ErrorCatalog::builtin()),
            request_timeout: None,
            platform: TenantId::new(PLATFORM_TENANT),
        }
    }

    /// 基于 Postgres 连接池装配
    pub fn from_config(config: &AppConfig, store: PgStore) -> Result<Self, AppError> {
        let hasher = PasswordHasher::new(&config.security)?;

        Ok(Self::builder(Arc::new(store), hasher)
            .request_timeout(config.request_timeout())
            .platform_tenant(config.core.platform_tenant.as_str())
            .build())
    }

    /// 为已认证的调用方创建请求上下文，带上默认截止时间
    pub fn context(
        &self,
        tenant_id: impl Into<TenantId>,
        user_id: impl Into<String>,
    ) -> RequestContext {
        let ctx = RequestContext::new(tenant_id, user_id);
        match self.request_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }

    /// 平台租户的请求上下文，用于维护全局菜单目录
    pub fn platform_context(&self, user_id: impl Into<String>) -> RequestContext {
        self.context(self.platform.clone(), user_id)
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// 以字符串模式调和任意一类关联（外部接口入口）
    pub async fn reconcile(
        &self,
        ctx: &RequestContext,
        kind: EdgeKind,
        owner_id: &str,
        target_ids: Vec<String>,
        mode: &str,
    ) -> Result<ReconcileOutcome, AppError> {
        let mode: ReconcileMode = mode.parse()?;

        match kind {
            EdgeKind::RoleMenu => {
                self.roles
                    .reconcile_menus(ctx, owner_id, target_ids, mode)
                    .await
            }
            EdgeKind::RoleDept => {
                self.roles
                    .reconcile_depts(ctx, owner_id, target_ids, mode)
                    .await
            }
            _ => {
                self.users
                    .reconcile(ctx, owner_id, kind, target_ids, mode)
                    .await
            }
        }
    }

    /// 渲染错误，内部错误同时记录完整上下文
    pub fn render_error(&self, err: &AppError) -> ErrorResponse {
        if err.kind() == ErrorKind::Internal {
            tracing::error!(error = %err, "Internal error");
        }
        self.catalog.render(err)
    }

    pub fn catalog(&self) -> &ErrorCatalog {
        &self.catalog
    }
}
