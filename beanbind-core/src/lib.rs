// beanbind-core: Bean 方法调用引擎的基础设施
//
// 提供方法解析引擎依赖的外部协作者模型：
// - 运行时值与类型层次结构
// - 类型转换
// - 消息交换（Exchange / Message）
// - Bean 注册表（单例和原型作用域，start/stop 生命周期）
// - 配置与日志

pub mod config;
pub mod constants;
pub mod converter;
pub mod error;
pub mod exchange;
pub mod lifecycle;
pub mod logging;
pub mod registry;
pub mod scope;
pub mod types;
pub mod utils;
pub mod value;

// 重新导出常用类型
pub use config::{
    BeanComponentConfig, ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource,
    PropertySource, TomlPropertySource,
};
pub use constants::BEAN_METHOD_NAME;
pub use converter::{DefaultTypeConverter, TypeConverter};
pub use error::{ConfigError, NoTypeConversionAvailable, RegistryError, Result};
pub use exchange::{Exchange, ExchangePattern, Message};
pub use lifecycle::{BeanRef, LifecycleHooks, ManagedInstance, Service};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use registry::{BeanDefinition, BeanRegistry};
pub use scope::{CachePolicy, Scope};
pub use types::{TypeDef, TypeRegistry};
pub use value::{ObjectValue, Value};

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::config::{BeanComponentConfig, ConfigValue, Environment, PropertySource};
    pub use crate::converter::{DefaultTypeConverter, TypeConverter};
    pub use crate::error::Result;
    pub use crate::exchange::{Exchange, ExchangePattern, Message};
    pub use crate::lifecycle::{BeanRef, Service};
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::registry::{BeanDefinition, BeanRegistry};
    pub use crate::scope::{CachePolicy, Scope};
    pub use crate::types::TypeRegistry;
    pub use crate::utils;
    pub use crate::value::{ObjectValue, Value};
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
