//! 事务协调
//!
//! [`Gateway`] 为请求打开绑定租户的会话。[`Scope`] 是闭包拿到的作用域上下文：
//! 通过它发出的所有存储调用共享同一个会话。嵌套的 `run_in_transaction` 复用已打开
//! 的事务，只有最外层负责提交或回滚。

use crate::{
    context::RequestContext,
    error::AppError,
    repository::{Session, Store},
};
use futures::future::BoxFuture;
use std::{future::Future, sync::Arc};
use tokio::time::Instant;

/// 存储入口，按请求上下文打开会话
#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn Store>,
}

impl Gateway {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// 自动提交作用域内执行，受截止时间约束
    pub async fn run<R, F>(&self, ctx: &RequestContext, f: F) -> Result<R, AppError>
    where
        F: for<'s> FnOnce(&'s mut Scope) -> BoxFuture<'s, Result<R, AppError>> + Send,
        R: Send,
    {
        ensure_not_expired(ctx)?;
        let session = with_deadline(ctx.deadline, self.store.acquire(&ctx.tenant_id)).await?;
        let mut scope = Scope {
            ctx: ctx.clone(),
            session,
            store: self.store.clone(),
            depth: 0,
        };

        with_deadline(ctx.deadline, f(&mut scope)).await
    }

    /// 事务内执行：闭包返回错误时回滚并原样返回错误，成功时先提交再返回
    pub async fn run_in_transaction<R, F>(&self, ctx: &RequestContext, f: F) -> Result<R, AppError>
    where
        F: for<'s> FnOnce(&'s mut Scope) -> BoxFuture<'s, Result<R, AppError>> + Send,
        R: Send,
    {
        run_transaction(self.store.clone(), ctx.clone(), f).await
    }
}

/// 作用域上下文，携带会话与事务标记
pub struct Scope {
    ctx: RequestContext,
    session: Box<dyn Session>,
    store: Arc<dyn Store>,
    /// 事务嵌套层数，0 表示自动提交
    depth: u32,
}

impl Scope {
    pub fn ctx(&self) -> &RequestContext {
        &self.ctx
    }

    /// 当前会话
    pub fn db(&mut self) -> &mut dyn Session {
        &mut *self.session
    }

    pub fn in_transaction(&self) -> bool {
        self.session.in_transaction()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// 嵌套调用复用已打开的事务；自动提交作用域中调用时开启新事务
    pub async fn run_in_transaction<R, F>(&mut self, f: F) -> Result<R, AppError>
    where
        F: for<'s> FnOnce(&'s mut Scope) -> BoxFuture<'s, Result<R, AppError>> + Send,
        R: Send,
    {
        if !self.session.in_transaction() {
            return run_transaction(self.store.clone(), self.ctx.clone(), f).await;
        }

        ensure_not_expired(&self.ctx)?;
        self.depth += 1;
        let deadline = self.ctx.deadline;
        let result = with_deadline(deadline, f(self)).await;
        self.depth -= 1;
        result
    }
}

async fn run_transaction<R, F>(
    store: Arc<dyn Store>,
    ctx: RequestContext,
    f: F,
) -> Result<R, AppError>
where
    F: for<'s> FnOnce(&'s mut Scope) -> BoxFuture<'s, Result<R, AppError>> + Send,
    R: Send,
{
    ensure_not_expired(&ctx)?;
    let deadline = ctx.deadline;
    let session = with_deadline(deadline, store.begin(&ctx.tenant_id)).await?;

    let mut scope = Scope {
        ctx,
        session,
        store,
        depth: 1,
    };
    let result = with_deadline(deadline, f(&mut scope)).await;

    let Scope { ctx, session, .. } = scope;
    match result {
        Ok(value) => {
            // 超时会丢弃提交中的会话，未完成的事务随之回滚
            with_deadline(deadline, session.commit()).await.map_err(|err| {
                if matches!(err, AppError::Timeout) {
                    tracing::warn!(
                        tenant_id = %ctx.tenant_id,
                        user_id = %ctx.user_id,
                        "Deadline exceeded during commit"
                    );
                }
                err
            })?;
            Ok(value)
        }
        Err(err) => {
            if matches!(err, AppError::Timeout) {
                tracing::warn!(
                    tenant_id = %ctx.tenant_id,
                    user_id = %ctx.user_id,
                    "Deadline exceeded, rolling back transaction"
                );
            }
            if let Err(rollback_err) = session.rollback().await {
                tracing::error!(
                    tenant_id = %ctx.tenant_id,
                    error = %rollback_err,
                    "Failed to roll back transaction"
                );
            }
            Err(err)
        }
    }
}

fn ensure_not_expired(ctx: &RequestContext) -> Result<(), AppError> {
    if ctx.is_expired() {
        return Err(AppError::Timeout);
    }
    Ok(())
}

async fn with_deadline<R>(
    deadline: Option<Instant>,
    fut: impl Future<Output = Result<R, AppError>>,
) -> Result<R, AppError> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut)
            .await
            .map_err(|_| AppError::Timeout)?,
        None => fut.await,
    }
}
