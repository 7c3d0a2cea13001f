//! 领域模型模块
//!
//! 元素类型通过 [`Element`] 声明字段和选项，实例由 [`Container`]
//! 或 [`Entity`] 持有，所有实例都经过同一条构造管道

pub mod association;
pub mod container;
pub mod convenience;
pub mod entity;
pub mod field_types;
pub mod macros;
pub mod meta;
pub mod options;
mod pipeline;
pub mod state;

pub use association::StagedChanges;
pub use container::{Container, FieldValues};
pub use convenience::*;
pub use entity::Entity;
pub use field_types::{FieldDefault, FieldDefinition, FieldType, MSG_INVALID, MSG_REQUIRED};
pub use meta::{AttributeSource, Element, ElementDecl, ElementMeta, ElementRef, meta};
pub use options::{ElementKind, ElementOptions};
pub use state::EntityState;
