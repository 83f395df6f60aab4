use std::sync::Arc;
use thiserror::Error;

use beanbind_core::{NoTypeConversionAvailable, RegistryError, Value};

use crate::expression::ExpressionError;
use crate::method::MethodDescriptor;

/// Bean 调用结果类型
pub type BeanResult<T> = std::result::Result<T, BeanError>;

/// Bean 方法解析、参数绑定与调用过程中的错误
#[derive(Debug, Error)]
pub enum BeanError {
    /// 方法表达式语法错误
    #[error("{message}")]
    InvalidMethodSyntax { message: String, expression: String },

    /// 没有匹配的方法
    #[error(
        "Method with name: {} and parameter types: [{}] not found on bean: {}. Exchange[{}]",
        .method, .parameter_types.join(", "), .bean, .exchange_id
    )]
    MethodNotFound {
        bean: String,
        method: String,
        parameter_types: Vec<String>,
        exchange_id: String,
    },

    /// 多个方法同样匹配
    #[error(
        "Ambiguous method invocations possible: [{}]. Exchange[{}]",
        signatures(.candidates), .exchange_id
    )]
    AmbiguousMethodCall {
        candidates: Vec<Arc<MethodDescriptor>>,
        exchange_id: String,
    },

    /// 参数值无法转换为参数类型
    #[error(
        "Error during parameter binding on method: {method} at parameter #{index} with type: {expected_type} with value type: {} and value: {value}",
        .value.type_name().unwrap_or("null")
    )]
    ParameterBinding {
        index: usize,
        method: String,
        expected_type: String,
        value: Value,
        #[source]
        cause: NoTypeConversionAvailable,
    },

    /// 参数表达式求值失败
    #[error("Cannot evaluate parameter value from expression: {expression} at parameter #{index} on method: {method}")]
    ExpressionEvaluation {
        expression: String,
        index: usize,
        method: String,
        #[source]
        cause: ExpressionError,
    },

    /// 消息体无法转换为显式指定的参数类型
    #[error(transparent)]
    TypeConversion(#[from] NoTypeConversionAvailable),

    /// Bean 方法本身返回的错误，原样传播
    #[error(transparent)]
    MethodFailed(anyhow::Error),

    /// Bean 注册表错误（未找到、创建失败、生命周期回调失败）
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// 没有注册该名称的 Bean 类
    #[error("No bean class registered with name: {0}")]
    UnknownClass(String),

    /// Bean 类无法实例化
    #[error("Cannot create an instance of bean class: {class}")]
    NoInstance { class: String },

    /// 抽象方法没有实现
    #[error("Cannot invoke abstract method: {method}")]
    AbstractMethod { method: String },

    /// 调用信封序列化失败
    #[error("Failed to serialize bean invocation: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 调度器已经关闭
    #[error("Invocation dispatcher is closed")]
    DispatcherClosed,
}

fn signatures(candidates: &[Arc<MethodDescriptor>]) -> String {
    candidates
        .iter()
        .map(|m| m.signature())
        .collect::<Vec<_>>()
        .join(", ")
}

impl BeanError {
    pub(crate) fn invalid_syntax(message: String, expression: &str) -> Self {
        BeanError::InvalidMethodSyntax {
            message,
            expression: expression.to_string(),
        }
    }

    /// 底层的类型转换错误（参数绑定或消息体转换）
    pub fn conversion_cause(&self) -> Option<&NoTypeConversionAvailable> {
        match self {
            BeanError::ParameterBinding { cause, .. } => Some(cause),
            BeanError::TypeConversion(cause) => Some(cause),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_found_message() {
        let err = BeanError::MethodNotFound {
            bean: "MyBean".into(),
            method: "foo".into(),
            parameter_types: vec!["String".into(), "Integer".into()],
            exchange_id: "ID-1".into(),
        };
        assert_eq!(
            err.to_string(),
            "Method with name: foo and parameter types: [String, Integer] not found on bean: MyBean. Exchange[ID-1]"
        );
    }

    #[test]
    fn test_parameter_binding_source() {
        use std::error::Error as _;

        let cause = NoTypeConversionAvailable::new(&Value::Int(555), "Document");
        let err = BeanError::ParameterBinding {
            index: 0,
            method: "void MyBean.process(Document)".into(),
            expected_type: "Document".into(),
            value: Value::Int(555),
            cause,
        };
        assert!(err.to_string().contains("with value type: Integer and value: 555"));
        assert_eq!(err.conversion_cause().map(|c| c.to_type.as_str()), Some("Document"));
        assert!(err.source().is_some());
    }
}
