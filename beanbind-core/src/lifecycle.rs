use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;

/// 共享的 Bean 实例
pub type BeanRef = Arc<dyn Any + Send + Sync>;

/// 生命周期管理 trait
///
/// 实现了该 trait 的 Bean 在第一次被缓存使用时调用 `start`，
/// 在处理器或注册表关闭时调用 `stop`
pub trait Service: Any + Send + Sync {
    /// 启动回调
    fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// 停止回调
    fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

type HookFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync>;

/// 生命周期回调
///
/// 通过类型擦除保存 [`Service`] 的 start/stop，使 `BeanRef` 也能调用它们
#[derive(Clone)]
pub struct LifecycleHooks {
    start: HookFn,
    stop: HookFn,
}

impl LifecycleHooks {
    /// 为实现了 [`Service`] 的类型创建回调
    pub fn of<T: Service>() -> Self {
        Self {
            start: Arc::new(|instance| downcast::<T>(instance)?.start()),
            stop: Arc::new(|instance| downcast::<T>(instance)?.stop()),
        }
    }

    pub fn start(&self, instance: &(dyn Any + Send + Sync)) -> anyhow::Result<()> {
        (self.start)(instance)
    }

    pub fn stop(&self, instance: &(dyn Any + Send + Sync)) -> anyhow::Result<()> {
        (self.stop)(instance)
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks").finish_non_exhaustive()
    }
}

fn downcast<T: Any>(instance: &(dyn Any + Send + Sync)) -> anyhow::Result<&T> {
    instance.downcast_ref::<T>().ok_or_else(|| {
        anyhow::anyhow!(
            "Bean instance is not of type {}",
            std::any::type_name::<T>()
        )
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    New,
    Started,
    Stopped,
}

/// 带生命周期状态的 Bean 实例
///
/// start 和 stop 各自最多执行一次
pub struct ManagedInstance {
    name: String,
    instance: BeanRef,
    hooks: Option<LifecycleHooks>,
    state: Mutex<LifecycleState>,
}

impl ManagedInstance {
    pub fn new(name: impl Into<String>, instance: BeanRef, hooks: Option<LifecycleHooks>) -> Self {
        Self {
            name: name.into(),
            instance,
            hooks,
            state: Mutex::new(LifecycleState::New),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> &BeanRef {
        &self.instance
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.instance).downcast::<T>().ok()
    }

    pub fn is_started(&self) -> bool {
        *self.state.lock() == LifecycleState::Started
    }

    /// 第一次调用时执行 start 回调
    pub fn ensure_started(&self) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        if *state != LifecycleState::New {
            return Ok(());
        }
        if let Some(hooks) = &self.hooks {
            tracing::debug!(bean = %self.name, "Starting bean");
            hooks
                .start(self.instance.as_ref())
                .map_err(|source| RegistryError::Lifecycle {
                    name: self.name.clone(),
                    phase: "start",
                    source,
                })?;
        }
        *state = LifecycleState::Started;
        Ok(())
    }

    /// 已经启动的实例执行 stop 回调
    pub fn stop(&self) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        if *state != LifecycleState::Started {
            return Ok(());
        }
        *state = LifecycleState::Stopped;
        if let Some(hooks) = &self.hooks {
            tracing::debug!(bean = %self.name, "Stopping bean");
            hooks
                .stop(self.instance.as_ref())
                .map_err(|source| RegistryError::Lifecycle {
                    name: self.name.clone(),
                    phase: "stop",
                    source,
                })?;
        }
        Ok(())
    }
}

impl fmt::Debug for ManagedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedInstance")
            .field("name", &self.name)
            .field("has_lifecycle", &self.hooks.is_some())
            .field("state", &*self.state.lock())
            .finish()
    }
}
