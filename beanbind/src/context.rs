//! Bean 上下文
//!
//! 把类型层次、类型转换器、类注册表、Bean 注册表、内省缓存和组件配置
//! 组合在一起，是创建 [`BeanProcessor`] 的入口。

use std::sync::Arc;

use beanbind_core::registry::BeanDefinition;
use beanbind_core::{
    BeanComponentConfig, BeanRef, BeanRegistry, DefaultTypeConverter, Scope, TypeDef, TypeRegistry,
};

use crate::binder::ParameterBinder;
use crate::class::{get_global_registry, BeanClass, ClassRegistry};
use crate::error::{BeanError, BeanResult};
use crate::introspect::{BeanInfo, BeanInfoCache};
use crate::invoker::{BeanProcessor, TargetDescriptor};
use crate::resolver::MethodResolver;

/// Bean 上下文
pub struct BeanContext {
    types: Arc<TypeRegistry>,
    converter: Arc<DefaultTypeConverter>,
    classes: ClassRegistry,
    beans: BeanRegistry,
    infos: BeanInfoCache,
    config: BeanComponentConfig,
}

impl BeanContext {
    pub fn new() -> Self {
        Self::with_config(BeanComponentConfig::default())
    }

    /// 使用指定配置创建上下文，全局注册的类会被预先加载
    pub fn with_config(config: BeanComponentConfig) -> Self {
        let types = Arc::new(TypeRegistry::new());
        let converter = Arc::new(DefaultTypeConverter::new(Arc::clone(&types)));
        let classes = ClassRegistry::new();
        for class in get_global_registry().classes() {
            types.register(class.type_def());
            classes.register_arc(class);
        }

        tracing::debug!(
            cache_policy = %config.cache_policy,
            method_name_header = %config.method_name_header,
            "Created bean context"
        );

        Self {
            types,
            converter,
            classes,
            beans: BeanRegistry::new(),
            infos: BeanInfoCache::new(),
            config,
        }
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn converter(&self) -> &Arc<DefaultTypeConverter> {
        &self.converter
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn beans(&self) -> &BeanRegistry {
        &self.beans
    }

    pub fn config(&self) -> &BeanComponentConfig {
        &self.config
    }

    /// 注册不对应 Bean 类的值类型，例如消息体的对象类型
    pub fn register_type(&self, def: TypeDef) {
        self.types.register(def);
    }

    /// 注册 Bean 类，同时登记其类型层次
    pub fn register_class(&self, class: BeanClass) -> Arc<BeanClass> {
        self.types.register(class.type_def());
        self.classes.register(class)
    }

    pub fn class(&self, name: &str) -> BeanResult<Arc<BeanClass>> {
        self.classes
            .get(name)
            .ok_or_else(|| BeanError::UnknownClass(name.to_string()))
    }

    /// 以 Bean 类的工厂注册一个命名 Bean
    pub fn register_bean(&self, name: &str, class_name: &str, scope: Scope) -> BeanResult<()> {
        let class = self.class(class_name)?;
        if !class.can_instantiate() {
            return Err(BeanError::NoInstance {
                class: class.name().to_string(),
            });
        }

        let lifecycle = class.lifecycle_hooks().cloned();
        let factory_class = Arc::clone(&class);
        let definition = BeanDefinition {
            name: name.to_string(),
            class_name: class.name().to_string(),
            scope,
            factory: Arc::new(move || {
                factory_class
                    .new_instance()
                    .unwrap_or_else(|| Err(anyhow::anyhow!("Class {} has no factory", factory_class.name())))
            }),
            lifecycle,
        };
        self.beans.register(definition)?;
        Ok(())
    }

    /// 注册已有实例为单例 Bean
    pub fn register_instance(&self, name: &str, class_name: &str, instance: BeanRef) -> BeanResult<()> {
        let class = self.class(class_name)?;
        let definition = BeanDefinition::from_instance(name, class.name(), instance)
            .with_hooks(class.lifecycle_hooks().cloned());
        self.beans.register(definition)?;
        Ok(())
    }

    /// 获取（必要时内省）类的方法信息
    pub fn bean_info(&self, class: &Arc<BeanClass>) -> Arc<BeanInfo> {
        self.infos.get_or_introspect(class, &self.classes, &self.types)
    }

    pub fn bean_info_for(&self, class_name: &str) -> BeanResult<Arc<BeanInfo>> {
        let class = self.class(class_name)?;
        Ok(self.bean_info(&class))
    }

    pub fn resolver(&self) -> MethodResolver<'_> {
        MethodResolver::new(&self.types, self.converter.as_ref())
            .exclude_getters_setters(self.config.exclude_getters_setters)
    }

    pub fn binder(&self) -> ParameterBinder<'_> {
        ParameterBinder::new(&self.types, self.converter.as_ref())
    }

    /// 为目标 Bean 创建处理器
    pub fn processor(self: &Arc<Self>, target: TargetDescriptor) -> BeanResult<BeanProcessor> {
        BeanProcessor::new(Arc::clone(self), target)
    }

    /// 停止所有单例 Bean 并清空内省缓存
    pub fn shutdown(&self) {
        tracing::debug!("Shutting down bean context");
        self.beans.shutdown();
        self.infos.clear();
    }
}

impl Default for BeanContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BeanContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanContext")
            .field("classes", &self.classes)
            .field("beans", &self.beans)
            .field("infos", &self.infos)
            .field("config", &self.config)
            .finish()
    }
}
