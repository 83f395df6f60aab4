/// 统一的错误处理类型
///
/// 应用层胶水代码（配置加载、示例程序）使用 `anyhow::Result`，
/// 通过 `.context()` 方法添加错误上下文信息。
/// 库内部的错误使用下面的结构化错误类型，调用方可以按类型分支处理。
pub use anyhow::Result;

use thiserror::Error;

use crate::value::Value;

/// 类型转换失败
///
/// 由 [`TypeConverter`](crate::converter::TypeConverter) 在无法将值转换为目标类型时返回
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "No type converter available to convert from type: {from_type} to the required type: {to_type} with value {value}"
)]
pub struct NoTypeConversionAvailable {
    /// 源类型名称
    pub from_type: String,

    /// 目标类型名称
    pub to_type: String,

    /// 无法转换的值
    pub value: Value,
}

impl NoTypeConversionAvailable {
    pub fn new(value: &Value, to_type: impl Into<String>) -> Self {
        Self {
            from_type: value.type_name().unwrap_or("null").to_string(),
            to_type: to_type.into(),
            value: value.clone(),
        }
    }
}

/// Bean 注册表错误
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Bean 不存在
    #[error("No bean could be found in the registry for: {0}")]
    BeanNotFound(String),

    /// Bean 已经注册
    #[error("Bean '{0}' already exists in the registry")]
    BeanAlreadyExists(String),

    /// Bean 创建失败
    #[error("Failed to create bean '{name}'")]
    CreationFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// 生命周期回调失败
    #[error("Lifecycle callback '{phase}' failed for bean '{name}'")]
    Lifecycle {
        name: String,
        phase: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    /// 配置内容解析失败
    #[error("Failed to parse config source '{source_name}': {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// 配置值非法
    #[error("Invalid value '{value}' for config key '{key}', expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// 日志系统初始化失败
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_conversion_message() {
        let err = NoTypeConversionAvailable::new(&Value::Int(555), "Document");
        assert_eq!(err.from_type, "Integer");
        assert_eq!(err.to_type, "Document");
        assert_eq!(err.value, Value::Int(555));
        assert_eq!(
            err.to_string(),
            "No type converter available to convert from type: Integer to the required type: Document with value 555"
        );
    }

    #[test]
    fn test_null_source_type() {
        let err = NoTypeConversionAvailable::new(&Value::Null, "String");
        assert_eq!(err.from_type, "null");
    }
}
