//! Bean 类声明
//!
//! Rust 没有运行时反射，所以 Bean 的"类"是显式声明的：
//! 类名、父类、接口、方法签名、参数绑定注解，以及每个方法的调用闭包。
//! 声明可以在运行时通过构建器注册，也可以通过 `inventory` 静态提交。

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use beanbind_core::lifecycle::{BeanRef, LifecycleHooks, Service};
use beanbind_core::types::{normalize, TypeDef};
use beanbind_core::{Exchange, ExchangePattern, Value};

/// Bean 实例（类型擦除）
pub type BeanInstance = dyn Any + Send + Sync;

/// 方法调用闭包
pub type MethodFn = Arc<dyn Fn(&BeanInstance, &mut Args<'_>) -> anyhow::Result<Value> + Send + Sync>;

/// 实例工厂
pub type InstanceFactory = Arc<dyn Fn() -> anyhow::Result<BeanRef> + Send + Sync>;

/// 传给方法闭包的参数
///
/// 包含绑定好的参数值，以及对当前消息交换的可变访问
pub struct Args<'a> {
    values: Vec<Value>,
    exchange: &'a mut Exchange,
}

impl<'a> Args<'a> {
    pub fn new(values: Vec<Value>, exchange: &'a mut Exchange) -> Self {
        Self { values, exchange }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// 第 `index` 个参数，越界时返回 `Null`
    pub fn value(&self, index: usize) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(index).unwrap_or(&NULL)
    }

    /// 取出第 `index` 个参数
    pub fn take(&mut self, index: usize) -> Value {
        self.values
            .get_mut(index)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub fn str(&self, index: usize) -> anyhow::Result<&str> {
        self.value(index)
            .as_str()
            .ok_or_else(|| self.mismatch(index, "String"))
    }

    pub fn opt_str(&self, index: usize) -> Option<&str> {
        self.value(index).as_str()
    }

    pub fn i64(&self, index: usize) -> anyhow::Result<i64> {
        self.value(index)
            .as_i64()
            .ok_or_else(|| self.mismatch(index, "Integer"))
    }

    pub fn bool(&self, index: usize) -> anyhow::Result<bool> {
        self.value(index)
            .as_bool()
            .ok_or_else(|| self.mismatch(index, "Boolean"))
    }

    pub fn exchange(&self) -> &Exchange {
        self.exchange
    }

    pub fn exchange_mut(&mut self) -> &mut Exchange {
        self.exchange
    }

    /// 出站消息头，出站消息不存在时创建
    pub fn out_headers_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.exchange.out_mut().headers
    }

    fn mismatch(&self, index: usize, expected: &str) -> anyhow::Error {
        anyhow::anyhow!(
            "Argument #{} is not a {}: {}",
            index,
            expected,
            self.value(index)
        )
    }
}

/// 参数绑定注解
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParamBinding {
    /// 无注解：按参数类型约定绑定（消息体、Exchange、异常）
    #[default]
    Default,
    /// 消息体
    Body,
    /// 指定的消息头
    Header(String),
    /// 全部消息头
    Headers,
    /// 指定的交换属性
    Property(String),
    /// 全部交换属性
    Properties,
    /// 交换上的异常
    ExchangeException,
    /// 全部附件
    Attachments,
    /// 简单表达式
    Expression(String),
}

impl ParamBinding {
    pub fn is_annotated(&self) -> bool {
        !matches!(self, ParamBinding::Default)
    }
}

/// 参数声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    pub type_name: String,
    pub binding: ParamBinding,
}

/// 方法可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    PackagePrivate,
    Private,
}

/// 方法声明
#[derive(Clone)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    /// 返回类型，`None` 表示 void
    pub returns: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    /// 编译器生成的桥接方法，不参与解析
    pub is_bridge: bool,
    /// `@Handler` 注解
    pub handler: bool,
    /// 方法级的消息交换模式注解
    pub pattern: Option<ExchangePattern>,
    pub invoker: Option<MethodFn>,
}

impl MethodDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: None,
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
            is_bridge: false,
            handler: false,
            pattern: None,
            invoker: None,
        }
    }

    /// 添加无注解参数
    pub fn param(self, type_name: &str) -> Self {
        self.param_with(type_name, ParamBinding::Default)
    }

    /// 添加带绑定注解的参数
    pub fn param_with(mut self, type_name: &str, binding: ParamBinding) -> Self {
        self.params.push(ParamDef {
            type_name: normalize(type_name),
            binding,
        });
        self
    }

    pub fn returns(mut self, type_name: &str) -> Self {
        self.returns = Some(normalize(type_name));
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn private(self) -> Self {
        self.visibility(Visibility::Private)
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn abstract_method(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn bridge(mut self) -> Self {
        self.is_bridge = true;
        self
    }

    pub fn handler(mut self) -> Self {
        self.handler = true;
        self
    }

    pub fn pattern(mut self, pattern: ExchangePattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// 设置调用闭包（实例类型擦除）
    pub fn invoke<F>(mut self, f: F) -> Self
    where
        F: Fn(&BeanInstance, &mut Args<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.invoker = Some(Arc::new(f));
        self
    }

    /// 设置调用闭包，实例自动向下转型为 `T`
    pub fn invoke_on<T, F>(self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &mut Args<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.invoke(move |instance, args| {
            let bean = instance.downcast_ref::<T>().ok_or_else(|| {
                anyhow::anyhow!(
                    "Cannot invoke method {} on instance that is not a {}",
                    name,
                    std::any::type_name::<T>()
                )
            })?;
            f(bean, args)
        })
    }

    pub fn parameter_types(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.type_name.as_str()).collect()
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("visibility", &self.visibility)
            .field("is_abstract", &self.is_abstract)
            .field("is_bridge", &self.is_bridge)
            .finish()
    }
}

/// Bean 类声明
#[derive(Clone)]
pub struct BeanClass {
    name: String,
    superclass: Option<String>,
    interfaces: Vec<String>,
    interface: bool,
    public: bool,
    pattern: Option<ExchangePattern>,
    methods: Vec<MethodDef>,
    factory: Option<InstanceFactory>,
    lifecycle: Option<LifecycleHooks>,
}

impl BeanClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: normalize(&name.into()),
            superclass: None,
            interfaces: Vec::new(),
            interface: false,
            public: true,
            pattern: None,
            methods: Vec::new(),
            factory: None,
            lifecycle: None,
        }
    }

    /// 声明一个接口
    pub fn interface(name: impl Into<String>) -> Self {
        let mut class = Self::new(name);
        class.interface = true;
        class
    }

    pub fn extends(mut self, superclass: &str) -> Self {
        self.superclass = Some(normalize(superclass));
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(normalize(interface));
        self
    }

    /// 非 public 类（包内可见）
    pub fn package_private(mut self) -> Self {
        self.public = false;
        self
    }

    /// 类级的消息交换模式注解
    pub fn pattern(mut self, pattern: ExchangePattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        let mut method = method;
        if self.interface && method.invoker.is_none() && !method.is_static {
            method.is_abstract = true;
        }
        self.methods.push(method);
        self
    }

    /// 实例工厂
    pub fn factory<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(move || Ok(Arc::new(factory()?) as BeanRef)));
        self
    }

    /// 使用 `Default` 构造实例
    pub fn constructor<T: Any + Send + Sync + Default>(self) -> Self {
        self.factory(|| Ok(T::default()))
    }

    /// 启用 [`Service`] 生命周期回调
    pub fn lifecycle<T: Service>(mut self) -> Self {
        self.lifecycle = Some(LifecycleHooks::of::<T>());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn is_interface(&self) -> bool {
        self.interface
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn class_pattern(&self) -> Option<ExchangePattern> {
        self.pattern
    }

    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    pub fn lifecycle_hooks(&self) -> Option<&LifecycleHooks> {
        self.lifecycle.as_ref()
    }

    pub fn can_instantiate(&self) -> bool {
        self.factory.is_some()
    }

    /// 创建新实例
    pub fn new_instance(&self) -> Option<anyhow::Result<BeanRef>> {
        self.factory.as_ref().map(|factory| factory())
    }

    /// 类型注册信息
    pub fn type_def(&self) -> TypeDef {
        let mut def = TypeDef::new(self.name.clone()).with_interface(self.interface);
        if let Some(superclass) = &self.superclass {
            def = def.with_supertype(superclass.clone());
        }
        for interface in &self.interfaces {
            def = def.with_supertype(interface.clone());
        }
        def
    }

    /// 按名称和参数类型查找本类声明的方法
    pub fn declared_method(&self, name: &str, parameter_types: &[&str]) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.parameter_types() == parameter_types)
    }
}

impl fmt::Debug for BeanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanClass")
            .field("name", &self.name)
            .field("superclass", &self.superclass)
            .field("interfaces", &self.interfaces)
            .field("interface", &self.interface)
            .field("public", &self.public)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Bean 类注册表
#[derive(Default)]
pub struct ClassRegistry {
    classes: RwLock<HashMap<String, Arc<BeanClass>>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册类，同名类会被替换
    pub fn register(&self, class: BeanClass) -> Arc<BeanClass> {
        let class = Arc::new(class);
        self.register_arc(Arc::clone(&class));
        class
    }

    pub fn register_arc(&self, class: Arc<BeanClass>) {
        tracing::debug!("Registering bean class: {}", class.name());
        self.classes.write().insert(class.name().to_string(), class);
    }

    pub fn get(&self, name: &str) -> Option<Arc<BeanClass>> {
        self.classes.read().get(&normalize(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(&normalize(name))
    }

    pub fn classes(&self) -> Vec<Arc<BeanClass>> {
        let mut classes: Vec<_> = self.classes.read().values().cloned().collect();
        classes.sort_by(|a, b| a.name().cmp(b.name()));
        classes
    }

    /// 加载所有通过 `submit_bean_class!` 提交的类
    pub fn auto_load_classes(&self) {
        for submission in inventory::iter::<BeanClassSubmission> {
            self.register_arc((submission.create)());
        }
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.classes.read().len())
            .finish()
    }
}

/// 全局 Bean 类注册表
///
/// 第一次访问时加载所有通过 inventory 提交的类
static GLOBAL_CLASS_REGISTRY: Lazy<Arc<ClassRegistry>> = Lazy::new(|| {
    let registry = ClassRegistry::new();
    registry.auto_load_classes();
    Arc::new(registry)
});

/// 获取全局 Bean 类注册表
pub fn get_global_registry() -> &'static Arc<ClassRegistry> {
    &GLOBAL_CLASS_REGISTRY
}

/// Bean 类提交结构
pub struct BeanClassSubmission {
    pub create: fn() -> Arc<BeanClass>,
}

inventory::collect!(BeanClassSubmission);

/// 用于全局收集 Bean 类的宏
///
/// ```ignore
/// fn greeter_class() -> BeanClass {
///     BeanClass::new("Greeter").constructor::<Greeter>()
/// }
///
/// beanbind::submit_bean_class!(greeter_class);
/// ```
#[macro_export]
macro_rules! submit_bean_class {
    ($create:path) => {
        $crate::inventory::submit! {
            $crate::class::BeanClassSubmission {
                create: || ::std::sync::Arc::new($create())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Greeter;

    fn greeter_class() -> BeanClass {
        BeanClass::new("test.Greeter")
            .constructor::<Greeter>()
            .method(
                MethodDef::new("greet")
                    .param("String")
                    .returns("String")
                    .invoke_on::<Greeter, _>(|_, args| Ok(Value::from(format!("Hello {}", args.str(0)?)))),
            )
    }

    crate::submit_bean_class!(greeter_class);

    #[test]
    fn test_builder() {
        let class = BeanClass::new("Impl")
            .extends("Base")
            .implements("java.lang.Runnable")
            .package_private()
            .method(MethodDef::new("run").param("int").returns("void"));

        assert_eq!(class.superclass(), Some("Base"));
        assert_eq!(class.interfaces(), &["Runnable".to_string()]);
        assert!(!class.is_public());
        assert_eq!(class.methods()[0].parameter_types(), vec!["Integer"]);
        assert!(!class.can_instantiate());
        assert!(class.new_instance().is_none());
        assert_eq!(class.type_def().supertypes, vec!["Base", "Runnable"]);
    }

    #[test]
    fn test_interface_methods_are_abstract() {
        let iface = BeanClass::interface("Service").method(MethodDef::new("run"));
        assert!(iface.is_interface());
        assert!(iface.methods()[0].is_abstract);
    }

    #[test]
    fn test_typed_invoker() {
        let class = greeter_class();
        let instance = class.new_instance().unwrap().unwrap();
        let invoker = class.methods()[0].invoker.clone().unwrap();

        let mut exchange = Exchange::new("World");
        let mut args = Args::new(vec![Value::from("World")], &mut exchange);
        assert_eq!(invoker(instance.as_ref(), &mut args).unwrap(), Value::from("Hello World"));

        let mut args = Args::new(vec![Value::from("World")], &mut exchange);
        assert!(invoker(&42i32, &mut args).is_err());
    }

    #[test]
    fn test_args_accessors() {
        let mut exchange = Exchange::new("body");
        let mut args = Args::new(vec![Value::from("a"), Value::from(7)], &mut exchange);
        assert_eq!(args.str(0).unwrap(), "a");
        assert_eq!(args.i64(1).unwrap(), 7);
        assert!(args.str(1).is_err());
        assert_eq!(args.value(5), &Value::Null);
        assert_eq!(args.take(0), Value::from("a"));
        assert_eq!(args.value(0), &Value::Null);
        args.out_headers_mut().insert("k".into(), Value::from("v"));
        assert!(args.exchange().has_out());
    }

    #[test]
    fn test_inventory_submission() {
        let registry = get_global_registry();
        let class = registry.get("test.Greeter").expect("submitted class is loaded");
        assert_eq!(class.methods().len(), 1);
    }
}
