// beanbind: 在消息交换上调用 Bean 方法
//
// 给定一个 Bean 类和一次消息交换，选出唯一要调用的方法：
// - 内省类层次结构，合并覆盖链（按类缓存）
// - 按显式方法表达式、参数类型或消息体类型解析重载
// - 从消息体、消息头、交换属性和表达式绑定参数
// - 按缓存策略获取实例，调用方法并写回结果

pub mod binder;
pub mod class;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod expression;
pub mod introspect;
pub mod invocation;
pub mod invoker;
pub mod method;
pub mod resolver;
pub mod signature;

#[cfg(test)]
mod test_support;

// 重新导出常用类型
pub use binder::ParameterBinder;
pub use class::{
    get_global_registry, Args, BeanClass, BeanClassSubmission, BeanInstance, ClassRegistry, MethodDef, ParamBinding,
    ParamDef, Visibility,
};
pub use context::BeanContext;
pub use dispatch::InvocationDispatcher;
pub use error::{BeanError, BeanResult};
pub use expression::ExpressionError;
pub use introspect::{BeanInfo, BeanInfoCache};
pub use invocation::{BeanInvocation, MethodRef};
pub use invoker::{BeanHolder, BeanProcessor, MethodInvocation, TargetDescriptor};
pub use method::{MethodDescriptor, ParameterInfo};
pub use resolver::MethodResolver;
pub use signature::{parse as parse_method, ArgumentKind, MethodSpec};

// 导出 inventory，供 submit_bean_class! 宏使用
pub use inventory;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::class::{Args, BeanClass, MethodDef, ParamBinding};
    pub use crate::context::BeanContext;
    pub use crate::error::{BeanError, BeanResult};
    pub use crate::invocation::BeanInvocation;
    pub use crate::invoker::{BeanProcessor, TargetDescriptor};
    pub use crate::submit_bean_class;
    pub use beanbind_core::prelude::*;
}
