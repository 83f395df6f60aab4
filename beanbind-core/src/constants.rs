/// 常量定义
///
/// 消息头名称和配置键集中定义在这里，
/// 确保处理器、配置和示例程序使用相同的标识符

/// 指定要调用的 Bean 方法的消息头，读取后从消息中移除
pub const BEAN_METHOD_NAME: &str = "CamelBeanMethodName";

/// 环境变量配置源的默认前缀
pub const ENV_PREFIX: &str = "BEANBIND_";

/// 配置键
pub mod keys {
    /// Bean 实例缓存策略：`always` / `never` / `if-singleton`
    pub const CACHE_POLICY: &str = "bean.cache-policy";

    /// 方法名消息头
    pub const METHOD_NAME_HEADER: &str = "bean.method-name-header";

    /// 隐式选择方法时是否排除 getter/setter
    pub const EXCLUDE_GETTERS_SETTERS: &str = "bean.exclude-getters-setters";

    pub const LOGGING_LEVEL: &str = "logging.level";
    pub const LOGGING_FORMAT: &str = "logging.format";
}

/// 不会被当作候选方法的名称
pub const EXCLUDED_METHOD_NAMES: &[&str] = &[
    "equals",
    "finalize",
    "getClass",
    "hashCode",
    "notify",
    "notifyAll",
    "wait",
];

/// 检查方法名是否被排除
pub fn is_excluded_method_name(name: &str) -> bool {
    EXCLUDED_METHOD_NAMES.contains(&name)
}
