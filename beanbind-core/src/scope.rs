use std::fmt;
use std::str::FromStr;

/// Bean 的作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// 单例模式 - 注册表中只有一个实例
    #[default]
    Singleton,

    /// 原型模式 - 每次请求都创建新实例
    Prototype,
}

/// Bean 实例缓存策略
///
/// 决定 Bean 处理器是复用同一个实例，还是每次调用重新获取
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// 第一次解析后一直复用
    Always,

    /// 每次调用都重新获取（不会调用生命周期回调）
    Never,

    /// 注册表中的单例才缓存（默认）
    #[default]
    IfSingleton,
}

impl FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "always" | "true" => Ok(CachePolicy::Always),
            "never" | "false" => Ok(CachePolicy::Never),
            "ifsingleton" | "singleton" => Ok(CachePolicy::IfSingleton),
            _ => Err(format!("Invalid cache policy: {}", s)),
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachePolicy::Always => write!(f, "always"),
            CachePolicy::Never => write!(f, "never"),
            CachePolicy::IfSingleton => write!(f, "if-singleton"),
        }
    }
}
