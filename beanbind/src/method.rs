//! 方法描述符
//!
//! [`MethodDescriptor`] 是内省后的候选方法：参数类型与绑定注解、
//! 声明类、消息交换模式，以及调用闭包。解析和绑定只读取描述符。

use std::fmt;

use beanbind_core::types::{is_exception_type, names, TypeRegistry};
use beanbind_core::{Exchange, ExchangePattern, Value};

use crate::class::{Args, BeanInstance, MethodDef, MethodFn, ParamBinding};
use crate::error::{BeanError, BeanResult};

/// 方法参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub index: usize,
    pub type_name: String,
    pub binding: ParamBinding,
}

/// 候选方法描述符
#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub parameters: Vec<ParameterInfo>,
    /// 返回类型，`None` 表示 void
    pub return_type: Option<String>,
    /// 对外可见的声明类型；非 public 实现类覆盖接口方法时为接口
    pub declaring_class: String,
    /// 实际声明该方法的类型
    pub implementation_class: String,
    pub pattern: ExchangePattern,
    pub is_static: bool,
    pub is_abstract: bool,
    /// 声明在接口上
    pub from_interface: bool,
    pub is_bridge: bool,
    pub has_custom_annotation: bool,
    pub has_handler_annotation: bool,
    /// 是否有接收交换异常的参数
    pub accepts_exception: bool,
    /// 接收消息体的参数下标
    pub body_parameter: Option<usize>,
    pub(crate) invoker: Option<MethodFn>,
}

impl MethodDescriptor {
    /// 由方法声明构建描述符
    pub fn from_def(
        def: &MethodDef,
        declaring_class: &str,
        from_interface: bool,
        pattern: ExchangePattern,
        types: &TypeRegistry,
    ) -> Self {
        let parameters: Vec<ParameterInfo> = def
            .params
            .iter()
            .enumerate()
            .map(|(index, p)| ParameterInfo {
                index,
                type_name: p.type_name.clone(),
                binding: p.binding.clone(),
            })
            .collect();

        let has_custom_annotation = parameters.iter().any(|p| p.binding.is_annotated());
        let accepts_exception = parameters.iter().any(|p| match &p.binding {
            ParamBinding::ExchangeException => true,
            ParamBinding::Default => is_exception_type(types, &p.type_name),
            _ => false,
        });
        let body_parameter = parameters
            .iter()
            .find(|p| p.binding == ParamBinding::Body)
            .or_else(|| {
                parameters.iter().find(|p| {
                    p.binding == ParamBinding::Default
                        && p.type_name != names::EXCHANGE
                        && !is_exception_type(types, &p.type_name)
                })
            })
            .map(|p| p.index);

        Self {
            name: def.name.clone(),
            parameters,
            return_type: def.returns.clone(),
            declaring_class: declaring_class.to_string(),
            implementation_class: declaring_class.to_string(),
            pattern,
            is_static: def.is_static,
            is_abstract: def.is_abstract,
            from_interface,
            is_bridge: def.is_bridge,
            has_custom_annotation,
            has_handler_annotation: def.handler,
            accepts_exception,
            body_parameter,
            invoker: def.invoker.clone(),
        }
    }

    pub fn parameter_types(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.type_name.as_str()).collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_void(&self) -> bool {
        self.return_type.is_none()
    }

    pub fn has_body_parameter(&self) -> bool {
        self.body_parameter.is_some()
    }

    pub fn body_parameter_type(&self) -> Option<&str> {
        self.body_parameter
            .and_then(|i| self.parameters.get(i))
            .map(|p| p.type_name.as_str())
    }

    /// 唯一参数是 `Exchange` 且返回 void 的方法
    pub fn is_exchange_consumer(&self) -> bool {
        self.is_void()
            && self.parameters.len() == 1
            && self.parameters[0].type_name == names::EXCHANGE
            && self.parameters[0].binding == ParamBinding::Default
    }

    /// 签名，例如 `String Y.process(Request)`
    pub fn signature(&self) -> String {
        format!(
            "{} {}.{}({})",
            self.return_type.as_deref().unwrap_or("void"),
            self.declaring_class,
            self.name,
            self.parameter_types().join(", ")
        )
    }

    /// 两个方法是否协变：同名同参数个数，参数类型和返回类型互相兼容
    ///
    /// 协变方法调用哪一个都一样
    pub fn is_covariant_with(&self, other: &MethodDescriptor, types: &TypeRegistry) -> bool {
        if self.name != other.name || self.parameters.len() != other.parameters.len() {
            return false;
        }
        let compatible = |a: &str, b: &str| types.is_assignable(a, b) || types.is_assignable(b, a);
        let returns = match (&self.return_type, &other.return_type) {
            (None, None) => true,
            (Some(a), Some(b)) => compatible(a, b),
            _ => false,
        };
        returns
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| compatible(&a.type_name, &b.type_name))
    }

    /// `self` 是否（宽松地）覆盖了 `source`
    ///
    /// 两个声明类型都必须是 `bean_type` 的父类型，`self` 的声明类型
    /// 不能是 `source` 声明类型的父类型。参数和返回类型只需要可赋值。
    pub fn overrides(&self, source: &MethodDescriptor, bean_type: &str, types: &TypeRegistry) -> bool {
        let target_class = &self.implementation_class;
        let source_class = &source.implementation_class;
        if target_class == source_class && self.parameter_types() == source.parameter_types() {
            return self.name == source.name;
        }
        if types.is_assignable(source_class, target_class) {
            return false;
        }
        if !types.is_assignable(bean_type, source_class) || !types.is_assignable(bean_type, target_class) {
            return false;
        }
        if self.name != source.name || self.parameters.len() != source.parameters.len() {
            return false;
        }
        let bridged = self.is_bridge || source.is_bridge;
        let returns = match (&source.return_type, &self.return_type) {
            (None, None) => true,
            (Some(s), Some(t)) => types.is_assignable(t, s),
            _ => false,
        };
        if !returns && !bridged {
            return false;
        }
        source
            .parameters
            .iter()
            .zip(&self.parameters)
            .all(|(s, t)| bridged || types.is_assignable(&t.type_name, &s.type_name))
    }

    /// 调用方法
    pub fn invoke(&self, instance: &BeanInstance, values: Vec<Value>, exchange: &mut Exchange) -> BeanResult<Value> {
        let Some(invoker) = &self.invoker else {
            return Err(BeanError::AbstractMethod {
                method: self.signature(),
            });
        };
        let mut args = Args::new(values, exchange);
        invoker(instance, &mut args).map_err(BeanError::MethodFailed)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("signature", &self.signature())
            .field("implementation_class", &self.implementation_class)
            .field("pattern", &self.pattern)
            .field("is_static", &self.is_static)
            .field("is_abstract", &self.is_abstract)
            .field("has_custom_annotation", &self.has_custom_annotation)
            .field("has_handler_annotation", &self.has_handler_annotation)
            .finish()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beanbind_core::TypeDef;

    fn types() -> TypeRegistry {
        let types = TypeRegistry::new();
        types.register(TypeDef::new("Request"));
        types.register(TypeDef::new("SpecialRequest").with_supertype("Request"));
        types.register(TypeDef::new("X"));
        types.register(TypeDef::new("Y").with_supertype("X"));
        types
    }

    fn describe(def: MethodDef, class: &str, types: &TypeRegistry) -> MethodDescriptor {
        MethodDescriptor::from_def(&def, class, false, ExchangePattern::InOut, types)
    }

    #[test]
    fn test_body_parameter_detection() {
        let types = types();
        let m = describe(
            MethodDef::new("handle")
                .param("Exchange")
                .param_with("String", ParamBinding::Header("foo".into()))
                .param("Request"),
            "X",
            &types,
        );
        assert_eq!(m.body_parameter, Some(2));
        assert!(m.has_custom_annotation);
        assert!(!m.accepts_exception);

        let m = describe(
            MethodDef::new("onError").param("Request").param("IllegalStateException"),
            "X",
            &types,
        );
        assert_eq!(m.body_parameter_type(), Some("Request"));
        assert!(m.accepts_exception);
        assert!(!m.has_custom_annotation);

        let m = describe(MethodDef::new("consume").param("Exchange"), "X", &types);
        assert!(m.is_exchange_consumer());
        assert!(!m.has_body_parameter());
    }

    #[test]
    fn test_signature() {
        let types = types();
        let m = describe(
            MethodDef::new("process").param("Request").param("String").returns("String"),
            "Y",
            &types,
        );
        assert_eq!(m.signature(), "String Y.process(Request, String)");
        assert_eq!(m.to_string(), m.signature());

        let m = describe(MethodDef::new("run"), "Y", &types);
        assert_eq!(m.signature(), "void Y.run()");
    }

    #[test]
    fn test_overrides() {
        let types = types();
        let base = describe(MethodDef::new("process").param("Request").returns("Object"), "X", &types);
        let derived = describe(MethodDef::new("process").param("Request").returns("String"), "Y", &types);
        let narrowed = describe(MethodDef::new("process").param("SpecialRequest").returns("String"), "Y", &types);
        let sibling = describe(MethodDef::new("process").param("Request").param("String"), "Y", &types);

        assert!(derived.overrides(&base, "Y", &types));
        assert!(!base.overrides(&derived, "Y", &types));
        assert!(narrowed.overrides(&base, "Y", &types));
        assert!(!sibling.overrides(&base, "Y", &types));
        assert!(!derived.overrides(&base, "X", &types));
    }

    #[test]
    fn test_covariant() {
        let types = types();
        let a = describe(MethodDef::new("process").param("Request").returns("Object"), "X", &types);
        let b = describe(MethodDef::new("process").param("SpecialRequest").returns("String"), "Y", &types);
        let c = describe(MethodDef::new("process").param("String").returns("String"), "Y", &types);
        assert!(a.is_covariant_with(&b, &types));
        assert!(!a.is_covariant_with(&c, &types));
    }

    #[test]
    fn test_invoke_abstract() {
        let types = types();
        let m = describe(MethodDef::new("run").abstract_method(), "X", &types);
        let mut exchange = Exchange::new(Value::Null);
        let err = m.invoke(&(), vec![], &mut exchange).unwrap_err();
        assert!(matches!(err, BeanError::AbstractMethod { .. }));
    }
}
