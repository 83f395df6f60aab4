//! Bean 调用
//!
//! [`TargetDescriptor`] 描述要调用的 Bean，[`BeanHolder`] 按缓存策略提供实例，
//! [`BeanProcessor`] 把方法解析、参数绑定和调用串起来，并把结果写回消息交换。

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use beanbind_core::{BeanRef, BeanRegistry, CachePolicy, Exchange, ManagedInstance, Value};

use crate::class::BeanClass;
use crate::context::BeanContext;
use crate::error::{BeanError, BeanResult};
use crate::method::MethodDescriptor;
use crate::signature::{self, MethodSpec};

/// 调用目标
#[derive(Clone, Default)]
pub struct TargetDescriptor {
    pub bean_key: Option<String>,
    pub bean_class: Option<String>,
    /// 未设置时使用组件配置的默认策略
    pub cache_policy: Option<CachePolicy>,
    pub instance: Option<BeanRef>,
    /// 显式方法表达式，例如 `concat(${body}, 'x')`
    pub method: Option<String>,
    /// 显式参数类型，第一个参数必须能接收该类型
    pub parameter_type: Option<String>,
}

impl TargetDescriptor {
    /// 按类创建实例
    pub fn for_class(class_name: impl Into<String>) -> Self {
        Self {
            bean_class: Some(class_name.into()),
            ..Default::default()
        }
    }

    /// 从 Bean 注册表按名称查找
    pub fn registry(bean_key: impl Into<String>) -> Self {
        Self {
            bean_key: Some(bean_key.into()),
            ..Default::default()
        }
    }

    /// 使用已有实例
    pub fn instance(class_name: impl Into<String>, instance: BeanRef) -> Self {
        Self {
            bean_class: Some(class_name.into()),
            instance: Some(instance),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_parameter_type(mut self, parameter_type: impl Into<String>) -> Self {
        self.parameter_type = Some(parameter_type.into());
        self
    }

    pub fn with_cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = Some(cache_policy);
        self
    }
}

impl fmt::Debug for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetDescriptor")
            .field("bean_key", &self.bean_key)
            .field("bean_class", &self.bean_class)
            .field("cache_policy", &self.cache_policy)
            .field("has_instance", &self.instance.is_some())
            .field("method", &self.method)
            .field("parameter_type", &self.parameter_type)
            .finish()
    }
}

enum Source {
    Instance,
    Registry(String),
    Class,
}

/// 按缓存策略提供 Bean 实例
///
/// 缓存的实例第一次使用时启动，`stop` 时停止；每次调用新建的实例不参与生命周期
pub struct BeanHolder {
    class: Arc<BeanClass>,
    source: Source,
    policy: CachePolicy,
    cached: Mutex<Option<Arc<ManagedInstance>>>,
}

impl BeanHolder {
    fn new(class: Arc<BeanClass>, target: &TargetDescriptor, policy: CachePolicy) -> Self {
        let (source, cached) = match (&target.instance, &target.bean_key) {
            (Some(instance), _) => {
                let managed = ManagedInstance::new(
                    class.name(),
                    Arc::clone(instance),
                    class.lifecycle_hooks().cloned(),
                );
                (Source::Instance, Some(Arc::new(managed)))
            }
            (None, Some(key)) => (Source::Registry(key.clone()), None),
            (None, None) => (Source::Class, None),
        };
        Self {
            class,
            source,
            policy,
            cached: Mutex::new(cached),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// 获取本次调用使用的实例
    pub fn instance(&self, beans: &BeanRegistry) -> BeanResult<Arc<ManagedInstance>> {
        let mut cached = self.cached.lock();
        if let Some(managed) = cached.as_ref() {
            managed.ensure_started()?;
            return Ok(Arc::clone(managed));
        }

        let cacheable = match &self.source {
            Source::Instance => true,
            Source::Registry(key) => match self.policy {
                CachePolicy::Always => true,
                CachePolicy::Never => false,
                CachePolicy::IfSingleton => beans.is_singleton(key)?,
            },
            Source::Class => self.policy == CachePolicy::Always,
        };

        if !cacheable {
            drop(cached);
            return self.create(beans);
        }

        let managed = self.create(beans)?;
        tracing::debug!("Caching bean instance of: {}", self.class.name());
        managed.ensure_started()?;
        *cached = Some(Arc::clone(&managed));
        Ok(managed)
    }

    fn create(&self, beans: &BeanRegistry) -> BeanResult<Arc<ManagedInstance>> {
        match &self.source {
            Source::Registry(key) => Ok(beans.managed(key)?),
            _ => {
                let instance = self
                    .class
                    .new_instance()
                    .ok_or_else(|| BeanError::NoInstance {
                        class: self.class.name().to_string(),
                    })?
                    .map_err(|source| beanbind_core::RegistryError::CreationFailed {
                        name: self.class.name().to_string(),
                        source,
                    })?;
                Ok(Arc::new(ManagedInstance::new(
                    self.class.name(),
                    instance,
                    self.class.lifecycle_hooks().cloned(),
                )))
            }
        }
    }

    /// 停止缓存的实例
    pub fn stop(&self) -> BeanResult<()> {
        if let Some(managed) = self.cached.lock().as_ref() {
            managed.stop()?;
        }
        Ok(())
    }
}

impl fmt::Debug for BeanHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanHolder")
            .field("class", &self.class.name())
            .field("policy", &self.policy)
            .field("cached", &self.cached.lock().is_some())
            .finish()
    }
}

/// 一次解析好的调用
#[derive(Debug, Clone)]
pub struct MethodInvocation {
    pub method: Arc<MethodDescriptor>,
    /// 显式参数表达式
    pub arguments: Option<Vec<String>>,
    /// 绑定好的参数值
    pub values: Vec<Value>,
}

/// Bean 处理器：解析、绑定并调用方法
pub struct BeanProcessor {
    ctx: Arc<BeanContext>,
    class: Arc<BeanClass>,
    method: Option<MethodSpec>,
    parameter_type: Option<String>,
    holder: BeanHolder,
}

impl BeanProcessor {
    pub fn new(ctx: Arc<BeanContext>, target: TargetDescriptor) -> BeanResult<Self> {
        let class_name = match (&target.bean_class, &target.bean_key) {
            (Some(class_name), _) => class_name.clone(),
            (None, Some(key)) => ctx.beans().definition(key)?.class_name.clone(),
            (None, None) => return Err(BeanError::UnknownClass(String::new())),
        };
        let class = ctx.class(&class_name)?;
        let method = target.method.as_deref().map(signature::parse).transpose()?;
        let policy = target.cache_policy.unwrap_or(ctx.config().cache_policy);
        let holder = BeanHolder::new(Arc::clone(&class), &target, policy);

        tracing::debug!(
            class = %class.name(),
            method = ?target.method,
            policy = %policy,
            "Created bean processor"
        );

        Ok(Self {
            ctx,
            class,
            method,
            parameter_type: target.parameter_type,
            holder,
        })
    }

    pub fn class(&self) -> &Arc<BeanClass> {
        &self.class
    }

    pub fn holder(&self) -> &BeanHolder {
        &self.holder
    }

    /// 解析并调用方法，结果写回 `exchange`
    pub fn process(&self, exchange: &mut Exchange) -> BeanResult<()> {
        let header = exchange
            .in_message
            .remove_header(&self.ctx.config().method_name_header);
        let from_header = match header.as_ref().and_then(Value::as_str).map(str::trim) {
            Some(name) if !name.is_empty() => Some(signature::parse(name)?),
            _ => None,
        };
        let spec = from_header.as_ref().or(self.method.as_ref());

        let invocation = self.create_invocation(exchange, spec)?;
        let managed = self.holder.instance(self.ctx.beans())?;
        self.proceed(managed.instance(), invocation, exchange)
    }

    /// 解析方法并绑定参数
    pub fn create_invocation(&self, exchange: &mut Exchange, spec: Option<&MethodSpec>) -> BeanResult<MethodInvocation> {
        let info = self.ctx.bean_info(&self.class);
        let method = self
            .ctx
            .resolver()
            .resolve(&info, exchange, spec, self.parameter_type.as_deref())?;
        let arguments = spec.and_then(|s| s.arguments.clone());
        let values = self.ctx.binder().bind(&method, exchange, arguments.as_deref())?;
        Ok(MethodInvocation {
            method,
            arguments,
            values,
        })
    }

    /// 调用方法并写回结果
    pub fn proceed(&self, instance: &BeanRef, invocation: MethodInvocation, exchange: &mut Exchange) -> BeanResult<()> {
        let MethodInvocation { method, values, .. } = invocation;
        tracing::trace!("Invoking method: {} with {} arguments", method, values.len());

        let original = exchange.pattern;
        exchange.pattern = method.pattern;
        let result = method.invoke(instance.as_ref(), values, exchange);

        match result {
            Ok(value) if !method.is_void() => {
                fill_result(exchange, value);
                exchange.pattern = original;
                Ok(())
            }
            Ok(_) => {
                exchange.pattern = original;
                if let Some(out) = exchange.out_message.as_mut() {
                    if out.body.is_null() {
                        out.body = exchange.in_message.body.clone();
                    }
                    for (name, value) in &exchange.in_message.headers {
                        out.headers.entry(name.clone()).or_insert_with(|| value.clone());
                    }
                }
                Ok(())
            }
            Err(e) => {
                exchange.pattern = original;
                Err(e)
            }
        }
    }

    /// 停止缓存的实例
    pub fn stop(&self) -> BeanResult<()> {
        self.holder.stop()
    }
}

/// 结果写入出站消息（已有出站消息或模式需要回复时），否则写入入站消息
fn fill_result(exchange: &mut Exchange, result: Value) {
    tracing::trace!("Setting bean invocation result: {}", result);
    if exchange.has_out() || exchange.pattern.is_out_capable() {
        let headers = exchange.in_message.headers.clone();
        let out = exchange.out_mut();
        out.headers.extend(headers);
        out.body = result;
    } else {
        exchange.set_body(result);
    }
}

impl fmt::Debug for BeanProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanProcessor")
            .field("class", &self.class.name())
            .field("method", &self.method)
            .field("parameter_type", &self.parameter_type)
            .field("holder", &self.holder)
            .finish()
    }
}
