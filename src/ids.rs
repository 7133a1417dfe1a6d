//! ID 生成协作方

use crate::models::EntityKind;
use uuid::Uuid;

/// 为新建的行生成唯一 ID
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: EntityKind) -> String;
}

/// 基于 UUIDv4 的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self, _kind: EntityKind) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
