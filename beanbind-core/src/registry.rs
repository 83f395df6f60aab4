//! Bean 注册表
//!
//! 按名称保存 Bean 定义，单例实例在第一次获取时创建并缓存，
//! 原型实例每次获取都重新创建。

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::lifecycle::{BeanRef, LifecycleHooks, ManagedInstance, Service};
use crate::scope::Scope;

/// Bean 工厂函数
pub type BeanFactoryFn = Arc<dyn Fn() -> anyhow::Result<BeanRef> + Send + Sync>;

/// Bean 定义 - 描述如何创建和管理 Bean
#[derive(Clone)]
pub struct BeanDefinition {
    /// Bean 的名称
    pub name: String,

    /// Bean 对应的类名称，用于方法解析
    pub class_name: String,

    /// Bean 的作用域
    pub scope: Scope,

    /// Bean 工厂
    pub factory: BeanFactoryFn,

    /// 生命周期回调
    pub lifecycle: Option<LifecycleHooks>,
}

impl BeanDefinition {
    /// 创建新的 Bean 定义
    pub fn new<T, F>(name: impl Into<String>, class_name: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            scope: Scope::default(),
            factory: Arc::new(move || Ok(Arc::new(factory()?) as BeanRef)),
            lifecycle: None,
        }
    }

    /// 使用已有实例创建单例定义
    pub fn from_instance(name: impl Into<String>, class_name: impl Into<String>, instance: BeanRef) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            scope: Scope::Singleton,
            factory: Arc::new(move || Ok(Arc::clone(&instance))),
            lifecycle: None,
        }
    }

    /// 设置作用域
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// 启用 [`Service`] 生命周期回调
    pub fn with_lifecycle<T: Service>(mut self) -> Self {
        self.lifecycle = Some(LifecycleHooks::of::<T>());
        self
    }

    pub fn with_hooks(mut self, hooks: Option<LifecycleHooks>) -> Self {
        self.lifecycle = hooks;
        self
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("class_name", &self.class_name)
            .field("scope", &self.scope)
            .field("has_lifecycle", &self.lifecycle.is_some())
            .finish()
    }
}

/// Bean 注册表
#[derive(Default)]
pub struct BeanRegistry {
    /// Bean 定义存储
    definitions: RwLock<HashMap<String, Arc<BeanDefinition>>>,

    /// 单例 Bean 缓存
    singletons: RwLock<HashMap<String, Arc<ManagedInstance>>>,
}

impl BeanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 Bean 定义
    pub fn register(&self, definition: BeanDefinition) -> Result<(), RegistryError> {
        let mut definitions = self.definitions.write();
        if definitions.contains_key(&definition.name) {
            return Err(RegistryError::BeanAlreadyExists(definition.name));
        }
        tracing::debug!(
            bean = %definition.name,
            class = %definition.class_name,
            scope = ?definition.scope,
            "Registering bean definition"
        );
        definitions.insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    /// 注册一个已经存在的单例实例
    pub fn register_instance(
        &self,
        name: impl Into<String>,
        class_name: impl Into<String>,
        instance: BeanRef,
    ) -> Result<(), RegistryError> {
        self.register(BeanDefinition::from_instance(name, class_name, instance))
    }

    pub fn contains_bean(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    pub fn bean_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn definition(&self, name: &str) -> Result<Arc<BeanDefinition>, RegistryError> {
        self.definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::BeanNotFound(name.to_string()))
    }

    pub fn is_singleton(&self, name: &str) -> Result<bool, RegistryError> {
        Ok(self.definition(name)?.scope == Scope::Singleton)
    }

    /// 获取 Bean 实例
    pub fn get_bean(&self, name: &str) -> Result<BeanRef, RegistryError> {
        Ok(Arc::clone(self.managed(name)?.instance()))
    }

    /// 获取带生命周期状态的 Bean
    ///
    /// 单例在缓存中共享同一个 [`ManagedInstance`]；
    /// 并发创建时以第一个写入缓存的实例为准
    pub fn managed(&self, name: &str) -> Result<Arc<ManagedInstance>, RegistryError> {
        let definition = self.definition(name)?;
        if definition.scope == Scope::Prototype {
            return Ok(Arc::new(self.create(&definition)?));
        }

        if let Some(existing) = self.singletons.read().get(name) {
            return Ok(Arc::clone(existing));
        }

        let created = Arc::new(self.create(&definition)?);
        let mut singletons = self.singletons.write();
        let managed = singletons
            .entry(name.to_string())
            .or_insert_with(|| created);
        Ok(Arc::clone(managed))
    }

    fn create(&self, definition: &BeanDefinition) -> Result<ManagedInstance, RegistryError> {
        tracing::debug!(bean = %definition.name, "Creating bean instance");
        let instance = (definition.factory)().map_err(|source| RegistryError::CreationFailed {
            name: definition.name.clone(),
            source,
        })?;
        Ok(ManagedInstance::new(
            definition.name.clone(),
            instance,
            definition.lifecycle.clone(),
        ))
    }

    /// 停止所有已经启动的单例
    pub fn shutdown(&self) {
        let singletons: Vec<Arc<ManagedInstance>> =
            self.singletons.write().drain().map(|(_, v)| v).collect();
        for managed in singletons {
            if let Err(e) = managed.stop() {
                tracing::warn!(bean = %managed.name(), error = %e, "Failed to stop bean");
            }
        }
    }
}

impl fmt::Debug for BeanRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanRegistry")
            .field("definitions", &self.definitions.read().len())
            .field("singletons", &self.singletons.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Greeter {
        stops: AtomicUsize,
    }

    impl Service for Greeter {
        fn stop(&self) -> anyhow::Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_singleton_is_shared() {
        let registry = BeanRegistry::new();
        registry
            .register(BeanDefinition::new("greeter", "Greeter", || Ok(Greeter::default())))
            .unwrap();

        let a = registry.get_bean("greeter").unwrap();
        let b = registry.get_bean("greeter").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.is_singleton("greeter").unwrap());
    }

    #[test]
    fn test_prototype_is_fresh() {
        let registry = BeanRegistry::new();
        registry
            .register(
                BeanDefinition::new("greeter", "Greeter", || Ok(Greeter::default()))
                    .with_scope(Scope::Prototype),
            )
            .unwrap();

        let a = registry.get_bean("greeter").unwrap();
        let b = registry.get_bean("greeter").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_duplicate_and_missing() {
        let registry = BeanRegistry::new();
        registry.register_instance("a", "Greeter", Arc::new(Greeter::default())).unwrap();
        assert!(matches!(
            registry.register_instance("a", "Greeter", Arc::new(Greeter::default())),
            Err(RegistryError::BeanAlreadyExists(_))
        ));
        assert!(matches!(registry.get_bean("b"), Err(RegistryError::BeanNotFound(_))));
        assert_eq!(registry.bean_names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_factory_failure() {
        let registry = BeanRegistry::new();
        registry
            .register(BeanDefinition::new("broken", "Greeter", || -> anyhow::Result<Greeter> {
                anyhow::bail!("no database")
            }))
            .unwrap();
        assert!(matches!(
            registry.get_bean("broken"),
            Err(RegistryError::CreationFailed { .. })
        ));
    }

    #[test]
    fn test_shutdown_stops_started_singletons() {
        let registry = BeanRegistry::new();
        registry
            .register(
                BeanDefinition::new("greeter", "Greeter", || Ok(Greeter::default()))
                    .with_lifecycle::<Greeter>(),
            )
            .unwrap();

        let managed = registry.managed("greeter").unwrap();
        managed.ensure_started().unwrap();
        registry.shutdown();
        registry.shutdown();

        let greeter = managed.downcast::<Greeter>().unwrap();
        assert_eq!(greeter.stops.load(Ordering::SeqCst), 1);
    }
}
