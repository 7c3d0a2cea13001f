//! 仓储模块
//!
//! [`Repository`] 负责实体的持久化与关联装配，[`QuerySet`] 描述延迟求值的查询

mod query_set;
mod repository;

pub use query_set::{QuerySet, ResultSet};
pub use repository::Repository;
