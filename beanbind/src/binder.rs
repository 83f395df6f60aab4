//! 参数绑定
//!
//! 为选中的方法逐个计算参数值：显式参数表达式优先，其次是参数的绑定注解，
//! 最后按约定绑定整个消息体。值不能直接赋给参数类型时交给类型转换器。

use beanbind_core::types::{is_exception_type, names, TypeRegistry};
use beanbind_core::{Exchange, TypeConverter, Value};

use crate::class::ParamBinding;
use crate::error::{BeanError, BeanResult};
use crate::expression;
use crate::method::{MethodDescriptor, ParameterInfo};
use crate::signature::ArgumentKind;

/// 参数绑定器
pub struct ParameterBinder<'a> {
    types: &'a TypeRegistry,
    converter: &'a dyn TypeConverter,
}

impl<'a> ParameterBinder<'a> {
    pub fn new(types: &'a TypeRegistry, converter: &'a dyn TypeConverter) -> Self {
        Self { types, converter }
    }

    /// 绑定所有参数
    ///
    /// 任何一个参数失败都会放弃整个绑定
    pub fn bind(
        &self,
        method: &MethodDescriptor,
        exchange: &Exchange,
        arguments: Option<&[String]>,
    ) -> BeanResult<Vec<Value>> {
        let mut values = Vec::with_capacity(method.parameters.len());
        for param in &method.parameters {
            let argument = arguments.and_then(|args| args.get(param.index));
            let raw = self.raw_value(method, param, exchange, argument)?;
            let value = self.coerce(method, param, raw)?;
            tracing::trace!("Parameter #{} of {} bound to: {}", param.index, method, value);
            values.push(value);
        }
        Ok(values)
    }

    fn raw_value(
        &self,
        method: &MethodDescriptor,
        param: &ParameterInfo,
        exchange: &Exchange,
        argument: Option<&String>,
    ) -> BeanResult<Value> {
        if let Some(argument) = argument {
            match ArgumentKind::classify(argument, self.types) {
                ArgumentKind::Wildcard | ArgumentKind::TypeQualifier(_) => {}
                ArgumentKind::Null => return Ok(Value::Null),
                ArgumentKind::QuotedLiteral(s) | ArgumentKind::Raw(s) => return Ok(Value::String(s)),
                ArgumentKind::Boolean(b) => return Ok(Value::Bool(b)),
                ArgumentKind::Integer(i) => return Ok(Value::Int(i)),
                ArgumentKind::Decimal(f) => return Ok(Value::Float(f)),
                ArgumentKind::Expression(expr) => return evaluate(method, param, &expr, exchange),
            }
        }

        let message = &exchange.in_message;
        let value = match &param.binding {
            ParamBinding::Body => message.body.clone(),
            ParamBinding::Header(name) => message.header(name).cloned().unwrap_or_default(),
            ParamBinding::Headers => Value::Map(message.headers.clone()),
            ParamBinding::Property(name) => exchange.property(name).cloned().unwrap_or_default(),
            ParamBinding::Properties => Value::Map(exchange.properties.clone()),
            ParamBinding::ExchangeException => exchange.exception.clone().unwrap_or_default(),
            ParamBinding::Attachments => Value::Map(message.attachments.clone()),
            ParamBinding::Expression(expr) => return evaluate(method, param, expr, exchange),
            ParamBinding::Default if param.type_name == names::EXCHANGE => Value::Null,
            ParamBinding::Default if is_exception_type(self.types, &param.type_name) => {
                exchange.exception.clone().unwrap_or_default()
            }
            ParamBinding::Default => message.body.clone(),
        };
        Ok(value)
    }

    fn coerce(&self, method: &MethodDescriptor, param: &ParameterInfo, value: Value) -> BeanResult<Value> {
        let Some(value_type) = value.type_name() else {
            return Ok(value);
        };
        if param.type_name == names::EXCHANGE || self.types.is_assignable(value_type, &param.type_name) {
            return Ok(value);
        }
        self.converter
            .convert(&value, &param.type_name)
            .map_err(|cause| BeanError::ParameterBinding {
                index: param.index,
                method: method.signature(),
                expected_type: param.type_name.clone(),
                value,
                cause,
            })
    }
}

fn evaluate(method: &MethodDescriptor, param: &ParameterInfo, expr: &str, exchange: &Exchange) -> BeanResult<Value> {
    expression::evaluate(expr, exchange).map_err(|cause| BeanError::ExpressionEvaluation {
        expression: expr.to_string(),
        index: param.index,
        method: method.signature(),
        cause,
    })
}
