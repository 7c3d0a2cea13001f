//! 通用数据类型
//!
//! 定义字段值与存储记录共用的动态值类型，以及查询条件和排序配置

pub mod data_value;
pub mod query;

pub use data_value::DataValue;
pub use query::{QueryCondition, QueryOperator, SortConfig, SortDirection, LOOKUP_SEPARATOR};
