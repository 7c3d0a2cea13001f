//! 模型相关的宏定义
//!
//! 提供便捷的宏来构造输入数据和声明元素类型

/// 便捷宏：构造字段名到 [`DataValue`](crate::types::DataValue) 的输入表
///
/// ```ignore
/// let input = data! {"name" => "Foo", "floors" => 4};
/// ```
#[macro_export]
macro_rules! data {
    () => {
        ::std::collections::HashMap::<String, $crate::types::DataValue>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = ::std::collections::HashMap::<String, $crate::types::DataValue>::new();
        $(
            map.insert(($key).to_string(), $crate::types::DataValue::from($value));
        )+
        map
    }};
}

/// 便捷宏：声明一个只有字段表的元素类型
///
/// 需要选项或钩子时直接实现 [`Element`](crate::model::Element)
///
/// ```ignore
/// define_element! {
///     pub struct Person: aggregate {
///         first_name: string_field(Some(50)).required(),
///         age: integer_field(None, None).default_value(21),
///     }
/// }
/// ```
#[macro_export]
macro_rules! define_element {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $kind:ident {
            $($field:ident : $definition:expr),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name;

        impl $crate::model::Element for $name {
            fn declare() -> $crate::model::ElementDecl {
                $crate::model::ElementDecl::$kind::<Self>()
                    $(.field(stringify!($field), $definition))*
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::model::convenience::*;
    use crate::model::meta::meta;
    use crate::model::options::ElementKind;
    use crate::types::DataValue;

    define_element! {
        struct MacroPoint: value_object {
            x: integer_field(None, None).required(),
            y: integer_field(None, None).required(),
        }
    }

    #[test]
    fn test_data_macro() {
        let input = data! {"a" => 1, "b" => "two", "c" => 3.5};
        assert_eq!(input.len(), 3);
        assert_eq!(input.get("a"), Some(&DataValue::Int(1)));
        assert_eq!(input.get("b"), Some(&DataValue::from("two")));
        assert!(data! {}.is_empty());
    }

    #[test]
    fn test_define_element() {
        let meta = meta::<MacroPoint>().unwrap();
        assert_eq!(meta.kind(), ElementKind::ValueObject);
        let names: Vec<&str> = meta.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }
}
