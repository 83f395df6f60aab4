//! 类型层次结构
//!
//! 方法匹配需要知道一个类型是否可以赋值给另一个类型。
//! [`TypeRegistry`] 记录每个命名类型的父类和接口，
//! 内置常用的值类型，Bean 类在注册时把自己的继承关系写入这里。

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};

/// 内置类型名称
pub mod names {
    pub const OBJECT: &str = "Object";
    pub const NUMBER: &str = "Number";
    pub const INTEGER: &str = "Integer";
    pub const LONG: &str = "Long";
    pub const DOUBLE: &str = "Double";
    pub const BOOLEAN: &str = "Boolean";
    pub const CHAR_SEQUENCE: &str = "CharSequence";
    pub const STRING: &str = "String";
    pub const BYTES: &str = "byte[]";
    pub const COLLECTION: &str = "Collection";
    pub const LIST: &str = "List";
    pub const MAP: &str = "Map";
    pub const READER: &str = "Reader";
    pub const EXCEPTION: &str = "Exception";
    pub const RUNTIME_EXCEPTION: &str = "RuntimeException";
    pub const ILLEGAL_ARGUMENT_EXCEPTION: &str = "IllegalArgumentException";
    pub const ILLEGAL_STATE_EXCEPTION: &str = "IllegalStateException";
    pub const EXCHANGE: &str = "Exchange";
}

/// 类型定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// 类型名称
    pub name: String,

    /// 直接父类型（父类在前，接口在后）
    pub supertypes: Vec<String>,

    /// 是否为接口
    pub interface: bool,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
            interface: false,
        }
    }

    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn with_interface(mut self, interface: bool) -> Self {
        self.interface = interface;
        self
    }
}

/// 类型注册表
#[derive(Debug)]
pub struct TypeRegistry {
    types: RwLock<HashMap<String, TypeDef>>,
}

impl TypeRegistry {
    /// 创建包含内置类型的注册表
    pub fn new() -> Self {
        let registry = Self::empty();
        for def in builtin_types() {
            registry.register(def);
        }
        registry
    }

    /// 创建空注册表（只有 `Object` 根类型的隐式规则）
    pub fn empty() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
        }
    }

    /// 注册或覆盖类型定义
    pub fn register(&self, def: TypeDef) {
        let def = TypeDef {
            name: normalize(&def.name),
            supertypes: def.supertypes.iter().map(|s| normalize(s)).collect(),
            interface: def.interface,
        };
        tracing::trace!(type_name = %def.name, supertypes = ?def.supertypes, "Registering type");
        self.types.write().insert(def.name.clone(), def);
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = normalize(name);
        name == names::OBJECT || self.types.read().contains_key(&name)
    }

    pub fn get(&self, name: &str) -> Option<TypeDef> {
        self.types.read().get(&normalize(name)).cloned()
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.get(name).map(|def| def.interface).unwrap_or(false)
    }

    /// `from` 类型的值是否可以赋给 `to` 类型的参数
    pub fn is_assignable(&self, from: &str, to: &str) -> bool {
        let from = normalize(from);
        let to = normalize(to);
        if from == to || to == names::OBJECT {
            return true;
        }

        let types = self.types.read();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(def) = types.get(&current) {
                for parent in &def.supertypes {
                    if *parent == to {
                        return true;
                    }
                    queue.push_back(parent.clone());
                }
            }
        }
        false
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 规范化类型名称
///
/// - 基本类型别名映射为包装类型：`int` → `Integer`
/// - 去掉 `java.lang.` / `java.util.` 前缀
/// - 去掉 `.class` 后缀
pub fn normalize(name: &str) -> String {
    let name = name.trim();
    let name = name.strip_suffix(".class").unwrap_or(name);
    let name = name
        .strip_prefix("java.lang.")
        .or_else(|| name.strip_prefix("java.util."))
        .unwrap_or(name);
    match name {
        "int" => names::INTEGER.to_string(),
        "long" => names::LONG.to_string(),
        "double" | "float" => names::DOUBLE.to_string(),
        "boolean" => names::BOOLEAN.to_string(),
        other => other.to_string(),
    }
}

/// 异常类型判断：是否可以赋给 `Exception`
pub fn is_exception_type(registry: &TypeRegistry, name: &str) -> bool {
    let name = normalize(name);
    name != names::OBJECT && registry.is_assignable(&name, names::EXCEPTION)
}

fn builtin_types() -> Vec<TypeDef> {
    use names::*;
    vec![
        TypeDef::new(NUMBER),
        TypeDef::new(INTEGER).with_supertype(NUMBER),
        TypeDef::new(LONG).with_supertype(NUMBER),
        TypeDef::new(DOUBLE).with_supertype(NUMBER),
        TypeDef::new(BOOLEAN),
        TypeDef::new(CHAR_SEQUENCE).with_interface(true),
        TypeDef::new(STRING).with_supertype(CHAR_SEQUENCE),
        TypeDef::new(BYTES),
        TypeDef::new(COLLECTION).with_interface(true),
        TypeDef::new(LIST)
            .with_supertype(COLLECTION)
            .with_interface(true),
        TypeDef::new(MAP).with_interface(true),
        TypeDef::new(READER),
        TypeDef::new(EXCEPTION),
        TypeDef::new(RUNTIME_EXCEPTION).with_supertype(EXCEPTION),
        TypeDef::new(ILLEGAL_ARGUMENT_EXCEPTION).with_supertype(RUNTIME_EXCEPTION),
        TypeDef::new(ILLEGAL_STATE_EXCEPTION).with_supertype(RUNTIME_EXCEPTION),
        TypeDef::new(EXCHANGE).with_interface(true),
    ]
}
