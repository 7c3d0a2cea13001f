//! 字段便捷函数模块
//!
//! 提供创建各种字段类型的便捷函数

use crate::model::field_types::{FieldDefinition, FieldType};
use crate::model::meta::{Element, ElementRef};

/// 便捷函数：创建自动标识字段
///
/// `increment` 为 true 时由适配器在持久化时生成序列值，否则构造时生成UUID
pub fn auto_field(increment: bool) -> FieldDefinition {
    FieldDefinition::new(FieldType::Auto { increment })
}

/// 便捷函数：创建用户提供的标识字段
pub fn identifier_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Identifier).identifier()
}

/// 便捷函数：创建字符串字段
pub fn string_field(max_length: Option<usize>) -> FieldDefinition {
    FieldDefinition::new(FieldType::String {
        max_length,
        min_length: None,
        regex: None,
    })
}

/// 便捷函数：创建文本字段
pub fn text_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Text)
}

/// 便捷函数：创建整数字段
pub fn integer_field(min_value: Option<i64>, max_value: Option<i64>) -> FieldDefinition {
    FieldDefinition::new(FieldType::Integer {
        min_value,
        max_value,
    })
}

/// 便捷函数：创建浮点数字段
pub fn float_field(min_value: Option<f64>, max_value: Option<f64>) -> FieldDefinition {
    FieldDefinition::new(FieldType::Float {
        min_value,
        max_value,
    })
}

/// 便捷函数：创建布尔字段
pub fn boolean_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Boolean)
}

/// 便捷函数：创建日期时间字段
pub fn datetime_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::DateTime)
}

/// 便捷函数：创建UUID字段
pub fn uuid_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Uuid)
}

/// 便捷函数：创建字典字段
pub fn dict_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Dict)
}

/// 便捷函数：创建列表字段
pub fn list_field(item_type: FieldType) -> FieldDefinition {
    FieldDefinition::new(FieldType::List {
        item_type: Box::new(item_type),
    })
}

/// 便捷函数：创建指向聚合 `T` 的引用字段
///
/// 存储属性为 `{字段名}_{T的标识属性}`，用 [`FieldDefinition::via`] 改为引用 `T` 的其他属性
pub fn reference_field<T: Element>() -> FieldDefinition {
    FieldDefinition::new(FieldType::Reference {
        target: ElementRef::of::<T>(),
        via: None,
    })
}

/// 便捷函数：创建反向一对一关联字段
///
/// `via` 为子元素上保存所属标识的属性名，缺省为 `{所属类型}_id`
pub fn has_one_field<T: Element>(via: Option<&str>) -> FieldDefinition {
    FieldDefinition::new(FieldType::HasOne {
        target: ElementRef::of::<T>(),
        via: via.map(str::to_string),
    })
}

/// 便捷函数：创建反向一对多关联字段
pub fn has_many_field<T: Element>(via: Option<&str>) -> FieldDefinition {
    FieldDefinition::new(FieldType::HasMany {
        target: ElementRef::of::<T>(),
        via: via.map(str::to_string),
    })
}

/// 便捷函数：创建嵌入值对象字段
pub fn value_object_field<T: Element>() -> FieldDefinition {
    FieldDefinition::new(FieldType::ValueObject {
        target: ElementRef::of::<T>(),
    })
}
