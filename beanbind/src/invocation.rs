//! 可序列化的 Bean 调用
//!
//! [`BeanInvocation`] 记录"调用哪个方法、用什么参数"，可以转成 JSON 传输，
//! 在另一端按类名和参数类型重新找到方法后回放。

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use beanbind_core::{BeanRef, Exchange, Value};

use crate::context::BeanContext;
use crate::error::{BeanError, BeanResult};
use crate::invoker::MethodInvocation;
use crate::method::MethodDescriptor;

/// 方法引用：类名 + 方法名 + 参数类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRef {
    pub class_name: String,
    pub method_name: String,
    pub parameter_types: Vec<String>,
}

impl MethodRef {
    pub fn new(class_name: &str, method: &MethodDescriptor) -> Self {
        Self {
            class_name: class_name.to_string(),
            method_name: method.name.clone(),
            parameter_types: method.parameter_types().iter().map(|t| t.to_string()).collect(),
        }
    }

    /// 在上下文中重新查找方法
    pub fn resolve(&self, ctx: &BeanContext, exchange: &Exchange) -> BeanResult<Arc<MethodDescriptor>> {
        let info = ctx.bean_info_for(&self.class_name)?;
        info.overloads(&self.method_name)
            .iter()
            .find(|m| m.parameter_types() == self.parameter_types)
            .cloned()
            .ok_or_else(|| BeanError::MethodNotFound {
                bean: info.type_name().to_string(),
                method: self.method_name.clone(),
                parameter_types: self.parameter_types.clone(),
                exchange_id: exchange.id.clone(),
            })
    }
}

/// Bean 调用信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeanInvocation {
    pub method: MethodRef,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl BeanInvocation {
    pub fn new(method: MethodRef, args: Vec<Value>) -> Self {
        Self { method, args }
    }

    /// 从已经解析并绑定好的调用创建
    pub fn from_invocation(class_name: &str, invocation: &MethodInvocation) -> Self {
        Self::new(MethodRef::new(class_name, &invocation.method), invocation.values.clone())
    }

    pub fn to_json(&self) -> BeanResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> BeanResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 在实例上回放调用，非 void 的结果写入出站消息体
    pub fn invoke(&self, ctx: &BeanContext, instance: &BeanRef, exchange: &mut Exchange) -> BeanResult<Value> {
        let method = self.method.resolve(ctx, exchange)?;
        tracing::trace!("Replaying invocation of: {} with {} arguments", method, self.args.len());
        let result = method.invoke(instance.as_ref(), self.args.clone(), exchange)?;
        if !method.is_void() {
            exchange.out_mut().body = result.clone();
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::TargetDescriptor;
    use crate::signature::parse;
    use crate::test_support::*;

    #[test]
    fn test_json_round_trip() {
        let invocation = BeanInvocation::new(
            MethodRef {
                class_name: "MyBean".into(),
                method_name: "concat".into(),
                parameter_types: vec!["String".into(), "String".into()],
            },
            vec![Value::from("Hello"), Value::Null],
        );
        let json = invocation.to_json().unwrap();
        assert_eq!(BeanInvocation::from_json(&json).unwrap(), invocation);
        assert!(matches!(
            BeanInvocation::from_json("{not json"),
            Err(BeanError::Serialization(_))
        ));
    }

    #[test]
    fn test_replay_captured_invocation() {
        let fixture = Fixture::new();
        let processor = fixture.ctx.processor(TargetDescriptor::for_class("MyBean")).unwrap();

        let spec = parse("concat(${body}, ${header.foo})").unwrap();
        let mut exchange = Exchange::new("Hello").with_header("foo", "Camel");
        let captured = processor.create_invocation(&mut exchange, Some(&spec)).unwrap();
        let envelope = BeanInvocation::from_invocation("MyBean", &captured);
        assert_eq!(envelope.method.parameter_types, vec!["String", "String"]);

        let replayed = BeanInvocation::from_json(&envelope.to_json().unwrap()).unwrap();
        let instance: BeanRef = Arc::new(MyBean);
        let mut target = Exchange::new("ignored");
        let result = replayed.invoke(&fixture.ctx, &instance, &mut target).unwrap();
        assert_eq!(result, Value::from("Hello=Camel"));
        assert_eq!(target.result_body(), &Value::from("Hello=Camel"));
    }

    #[test]
    fn test_resolve_missing_method() {
        let fixture = Fixture::new();
        let exchange = Exchange::new("x");
        let method = MethodRef {
            class_name: "MyBean".into(),
            method_name: "concat".into(),
            parameter_types: vec!["Integer".into()],
        };
        assert!(matches!(
            method.resolve(&fixture.ctx, &exchange),
            Err(BeanError::MethodNotFound { .. })
        ));

        let unknown = MethodRef {
            class_name: "Missing".into(),
            ..method
        };
        assert!(matches!(
            unknown.resolve(&fixture.ctx, &exchange),
            Err(BeanError::UnknownClass(_))
        ));
    }
}
