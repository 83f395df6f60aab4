//! 类型转换
//!
//! 参数绑定和方法匹配通过 [`TypeConverter`] 把运行时值转换为参数类型。
//! [`DefaultTypeConverter`] 提供常用的内置转换，也可以注册自定义转换函数。

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::NoTypeConversionAvailable;
use crate::types::{names, normalize, TypeRegistry};
use crate::value::{ObjectValue, Value};

/// 类型转换能力
pub trait TypeConverter: Send + Sync {
    /// 把值转换为目标类型
    ///
    /// `Null` 总是转换为 `Null`；已经可以赋值给目标类型的值原样返回
    fn convert(&self, value: &Value, to_type: &str) -> Result<Value, NoTypeConversionAvailable>;

    /// 类型层面是否存在从 `from_type` 到 `to_type` 的转换
    fn can_convert(&self, from_type: &str, to_type: &str) -> bool;

    /// 尝试转换，失败时返回 `None`
    fn try_convert(&self, value: &Value, to_type: &str) -> Option<Value> {
        self.convert(value, to_type).ok()
    }
}

/// 自定义转换函数，返回 `None` 表示无法转换
pub type ConversionFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// 默认类型转换器
pub struct DefaultTypeConverter {
    types: Arc<TypeRegistry>,
    custom: RwLock<HashMap<(String, String), ConversionFn>>,
}

impl fmt::Debug for DefaultTypeConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultTypeConverter")
            .field("custom_conversions", &self.custom.read().len())
            .finish()
    }
}

impl DefaultTypeConverter {
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            custom: RwLock::new(HashMap::new()),
        }
    }

    /// 注册自定义转换
    pub fn register<F>(&self, from_type: &str, to_type: &str, conversion: F)
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        let key = (normalize(from_type), normalize(to_type));
        tracing::debug!(from = %key.0, to = %key.1, "Registering custom type conversion");
        self.custom.write().insert(key, Arc::new(conversion));
    }

    /// 构建器风格的注册
    pub fn with_conversion<F>(self, from_type: &str, to_type: &str, conversion: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.register(from_type, to_type, conversion);
        self
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    fn custom_conversion(&self, from_type: &str, to_type: &str) -> Option<ConversionFn> {
        self.custom
            .read()
            .get(&(from_type.to_string(), to_type.to_string()))
            .cloned()
    }
}

impl TypeConverter for DefaultTypeConverter {
    fn convert(&self, value: &Value, to_type: &str) -> Result<Value, NoTypeConversionAvailable> {
        let to = normalize(to_type);
        let Some(from) = value.type_name() else {
            return Ok(Value::Null);
        };

        if self.types.is_assignable(from, &to) {
            return Ok(value.clone());
        }

        if let Some(conversion) = self.custom_conversion(from, &to) {
            if let Some(converted) = conversion(value) {
                tracing::trace!(from, to = %to, "Converted value with custom conversion");
                return Ok(converted);
            }
        }

        builtin_convert(value, &to).ok_or_else(|| NoTypeConversionAvailable::new(value, to))
    }

    fn can_convert(&self, from_type: &str, to_type: &str) -> bool {
        let from = normalize(from_type);
        let to = normalize(to_type);
        self.types.is_assignable(&from, &to)
            || self.custom.read().contains_key(&(from.clone(), to.clone()))
            || builtin_supported(&from, &to)
    }
}

fn builtin_supported(from: &str, to: &str) -> bool {
    use names::*;
    match to {
        STRING | CHAR_SEQUENCE => matches!(from, BOOLEAN | INTEGER | LONG | DOUBLE | BYTES | READER),
        INTEGER | LONG => matches!(from, STRING | DOUBLE | INTEGER | LONG),
        DOUBLE | NUMBER => matches!(from, STRING | INTEGER | LONG),
        BOOLEAN | BYTES | READER => from == STRING,
        LIST | COLLECTION => true,
        _ => false,
    }
}

fn builtin_convert(value: &Value, to: &str) -> Option<Value> {
    use names::*;
    match to {
        STRING | CHAR_SEQUENCE => match value {
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => Some(Value::String(value.to_string())),
            Value::Bytes(bytes) => String::from_utf8(bytes.clone()).ok().map(Value::String),
            Value::Object(obj) if obj.type_name == READER => obj.field("text").cloned(),
            _ => None,
        },
        INTEGER | LONG => match value {
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::Int),
            Value::Int(_) => Some(value.clone()),
            // i64 范围外的整数值不截断
            Value::Float(f) if f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f) => {
                Some(Value::Int(*f as i64))
            }
            _ => None,
        },
        DOUBLE => match value {
            Value::String(s) => s.trim().parse::<f64>().ok().map(Value::Float),
            Value::Int(i) => Some(Value::Float(*i as f64)),
            _ => None,
        },
        NUMBER => match value {
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Value::Int)
                    .or_else(|_| s.parse::<f64>().map(Value::Float))
                    .ok()
            }
            _ => None,
        },
        BOOLEAN => match value {
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        BYTES => value.as_str().map(|s| Value::Bytes(s.as_bytes().to_vec())),
        READER => value
            .as_str()
            .map(|s| Value::Object(ObjectValue::new(READER).with_field("text", s))),
        LIST | COLLECTION => Some(Value::List(vec![value.clone()])),
        _ => None,
    }
}
