//! Bean 类内省
//!
//! 收集一个 Bean 类可调用的候选方法：遍历类本身、父类和接口，
//! 过滤无效方法，合并覆盖链（只保留最派生的声明），推断消息交换模式，
//! 并按名称和注解分组。结果按类缓存在 [`BeanInfoCache`] 中。

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use beanbind_core::constants::is_excluded_method_name;
use beanbind_core::types::{names, normalize, TypeRegistry};
use beanbind_core::utils::naming;
use beanbind_core::ExchangePattern;

use crate::class::{BeanClass, ClassRegistry, MethodDef, Visibility};
use crate::method::MethodDescriptor;

/// 一个 Bean 类的内省结果
pub struct BeanInfo {
    class: Arc<BeanClass>,
    methods: Vec<Arc<MethodDescriptor>>,
    operations: BTreeMap<String, Vec<Arc<MethodDescriptor>>>,
    with_body: Vec<Arc<MethodDescriptor>>,
    with_no_body: Vec<Arc<MethodDescriptor>>,
    with_custom_annotation: Vec<Arc<MethodDescriptor>>,
    with_handler_annotation: Vec<Arc<MethodDescriptor>>,
    default_method: Option<Arc<MethodDescriptor>>,
}

impl BeanInfo {
    /// 内省 Bean 类
    pub fn introspect(class: Arc<BeanClass>, classes: &ClassRegistry, types: &TypeRegistry) -> Self {
        tracing::trace!("Introspecting class: {}", class.name());

        let hierarchy = hierarchy(&class, classes);
        let mut collected: Vec<MethodDescriptor> = Vec::new();

        for owner in &hierarchy {
            for def in owner.methods() {
                if !is_valid_method(def) {
                    tracing::trace!("Skipping method: {}.{}", owner.name(), def.name);
                    continue;
                }
                let pattern = exchange_pattern(def, &hierarchy);
                let proposed = MethodDescriptor::from_def(def, owner.name(), owner.is_interface(), pattern, types);
                register(&mut collected, proposed, &class, types);
            }
        }

        let mut seen = HashSet::new();
        collected.retain(|m| {
            seen.insert((
                m.name.clone(),
                m.parameter_types().iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            ))
        });

        let methods: Vec<Arc<MethodDescriptor>> = collected.into_iter().map(Arc::new).collect();
        let mut operations: BTreeMap<String, Vec<Arc<MethodDescriptor>>> = BTreeMap::new();
        let mut with_body = Vec::new();
        let mut with_no_body = Vec::new();
        let mut with_custom_annotation = Vec::new();
        let mut with_handler_annotation = Vec::new();

        for method in &methods {
            tracing::trace!("Adding operation: {} for method: {}", method.name, method);
            operations
                .entry(method.name.clone())
                .or_default()
                .push(Arc::clone(method));

            if method.has_custom_annotation {
                with_custom_annotation.push(Arc::clone(method));
            } else if method.has_body_parameter() {
                with_body.push(Arc::clone(method));
            } else {
                with_no_body.push(Arc::clone(method));
            }
            if method.has_handler_annotation {
                with_handler_annotation.push(Arc::clone(method));
            }
        }

        let default_method = if methods.len() == 1 {
            methods.first().cloned()
        } else {
            None
        };

        tracing::debug!(
            "Introspected class: {} with {} candidate methods",
            class.name(),
            methods.len()
        );

        Self {
            class,
            methods,
            operations,
            with_body,
            with_no_body,
            with_custom_annotation,
            with_handler_annotation,
            default_method,
        }
    }

    pub fn class(&self) -> &Arc<BeanClass> {
        &self.class
    }

    pub fn type_name(&self) -> &str {
        self.class.name()
    }

    /// 候选方法，按收集顺序
    pub fn candidates(&self) -> &[Arc<MethodDescriptor>] {
        &self.methods
    }

    /// 候选方法，按名称 A..Z 排序
    pub fn methods(&self) -> Vec<Arc<MethodDescriptor>> {
        let mut methods = self.methods.clone();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }

    pub fn operations(&self) -> &BTreeMap<String, Vec<Arc<MethodDescriptor>>> {
        &self.operations
    }

    /// 同名重载集合
    pub fn overloads(&self, name: &str) -> &[Arc<MethodDescriptor>] {
        self.operations.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn with_body(&self) -> &[Arc<MethodDescriptor>] {
        &self.with_body
    }

    pub fn with_no_body(&self) -> &[Arc<MethodDescriptor>] {
        &self.with_no_body
    }

    pub fn with_custom_annotation(&self) -> &[Arc<MethodDescriptor>] {
        &self.with_custom_annotation
    }

    pub fn with_handler_annotation(&self) -> &[Arc<MethodDescriptor>] {
        &self.with_handler_annotation
    }

    /// 只有一个候选方法时的默认方法
    pub fn default_method(&self) -> Option<&Arc<MethodDescriptor>> {
        self.default_method.as_ref()
    }

    /// 按名称查找重载，支持 getter 简写（`name` → `getName` / `isName`）
    pub fn find_method(&self, name: &str) -> &[Arc<MethodDescriptor>] {
        let found = self.overloads(name);
        if !found.is_empty() {
            return found;
        }
        let pascal = naming::to_pascal_case(name);
        for getter in [format!("get{}", pascal), format!("is{}", pascal)] {
            let found = self.overloads(&getter);
            if found.iter().any(|m| is_getter(m)) {
                return found;
            }
        }
        &[]
    }

    pub fn has_method(&self, name: &str) -> bool {
        !self.find_method(name).is_empty()
    }

    pub fn has_static_method(&self, name: &str) -> bool {
        self.find_method(name).iter().any(|m| m.is_static)
    }
}

impl fmt::Debug for BeanInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanInfo")
            .field("class", &self.class.name())
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// getter：`getX()` / `isX()`，无参数且有返回值
pub fn is_getter(method: &MethodDescriptor) -> bool {
    method.parameters.is_empty()
        && !method.is_void()
        && naming::getter_property(&method.name).is_some()
}

/// setter：`setX(value)`，一个参数且返回 void
pub fn is_setter(method: &MethodDescriptor) -> bool {
    method.parameters.len() == 1 && method.is_void() && naming::setter_property(&method.name).is_some()
}

/// 类、父类（递归）、接口（递归）的遍历顺序
fn hierarchy(class: &Arc<BeanClass>, classes: &ClassRegistry) -> Vec<Arc<BeanClass>> {
    fn visit(
        class: Arc<BeanClass>,
        classes: &ClassRegistry,
        visited: &mut HashSet<String>,
        out: &mut Vec<Arc<BeanClass>>,
    ) {
        if !visited.insert(class.name().to_string()) {
            return;
        }
        out.push(Arc::clone(&class));

        if let Some(superclass) = class.superclass() {
            match classes.get(superclass) {
                Some(parent) => visit(parent, classes, visited, out),
                None => tracing::trace!("Superclass {} of {} is not registered", superclass, class.name()),
            }
        }
        for interface in class.interfaces() {
            if let Some(parent) = classes.get(interface) {
                visit(parent, classes, visited, out);
            }
        }
    }

    let mut out = Vec::new();
    visit(Arc::clone(class), classes, &mut HashSet::new(), &mut out);
    out
}

fn is_valid_method(def: &MethodDef) -> bool {
    if is_excluded_method_name(&def.name) {
        return false;
    }
    if def.visibility == Visibility::Private || def.is_bridge {
        return false;
    }
    def.returns.as_deref() != Some(names::EXCHANGE)
}

/// 方法注解 → 层次结构中同签名方法的注解 → 类级注解 → InOut
fn exchange_pattern(def: &MethodDef, hierarchy: &[Arc<BeanClass>]) -> ExchangePattern {
    if let Some(pattern) = def.pattern {
        return pattern;
    }
    let parameter_types = def.parameter_types();
    hierarchy
        .iter()
        .find_map(|c| c.declared_method(&def.name, &parameter_types).and_then(|m| m.pattern))
        .or_else(|| hierarchy.iter().find_map(|c| c.class_pattern()))
        .unwrap_or_default()
}

/// 登记一个方法，合并覆盖链
fn register(collected: &mut Vec<MethodDescriptor>, proposed: MethodDescriptor, bean: &BeanClass, types: &TypeRegistry) {
    let bean_type = normalize(bean.name());

    for existing in collected.iter_mut() {
        if existing.overrides(&proposed, &bean_type, types) {
            tracing::trace!(
                "Method {} is already overridden by {}, preferring the more derived one",
                proposed,
                existing
            );
            if proposed.from_interface && !bean.is_public() {
                existing.declaring_class = proposed.declaring_class.clone();
            }
            return;
        }
        if proposed.overrides(existing, &bean_type, types) {
            tracing::trace!("Method {} overrides registered method {}", proposed, existing);
            *existing = proposed;
            return;
        }
    }
    collected.push(proposed);
}

/// 按类名缓存内省结果
///
/// 内省在锁外进行，并发首次访问时先发布的结果生效
#[derive(Default)]
pub struct BeanInfoCache {
    infos: RwLock<HashMap<String, Arc<BeanInfo>>>,
}

impl BeanInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, class_name: &str) -> Option<Arc<BeanInfo>> {
        self.infos.read().get(class_name).cloned()
    }

    pub fn get_or_introspect(
        &self,
        class: &Arc<BeanClass>,
        classes: &ClassRegistry,
        types: &TypeRegistry,
    ) -> Arc<BeanInfo> {
        if let Some(info) = self.get(class.name()) {
            return info;
        }

        let info = Arc::new(BeanInfo::introspect(Arc::clone(class), classes, types));
        let mut infos = self.infos.write();
        Arc::clone(infos.entry(class.name().to_string()).or_insert(info))
    }

    pub fn len(&self) -> usize {
        self.infos.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.read().is_empty()
    }

    pub fn clear(&self) {
        tracing::debug!("Clearing bean info cache");
        self.infos.write().clear();
    }
}

impl fmt::Debug for BeanInfoCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanInfoCache").field("classes", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ParamBinding;
    use crate::test_support::*;

    #[test]
    fn test_override_keeps_most_derived() {
        let fixture = Fixture::new();
        let info = fixture.info("Y");
        let process = info.overloads("process");
        assert_eq!(process.len(), 1);
        assert_eq!(process[0].declaring_class, "Y");
    }

    #[test]
    fn test_sibling_overload_is_kept() {
        let fixture = Fixture::new();
        let info = fixture.info("Z");
        let signatures: Vec<_> = info.overloads("process").iter().map(|m| m.signature()).collect();
        assert_eq!(
            signatures,
            vec!["String Z.process(Request, String)", "String Y.process(Request)"]
        );
    }

    #[test]
    fn test_invalid_methods_are_skipped() {
        let fixture = Fixture::new();
        fixture.register(
            BeanClass::new("Filtered")
                .method(MethodDef::new("hashCode").returns("int"))
                .method(MethodDef::new("secret").private())
                .method(MethodDef::new("bridged").param("Object").bridge())
                .method(MethodDef::new("exchange").returns("Exchange"))
                .method(MethodDef::new("visible").param("String")),
        );
        let info = fixture.info("Filtered");
        let names: Vec<_> = info.methods().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["visible"]);
        assert!(info.default_method().is_some());
    }

    #[test]
    fn test_package_private_impl_uses_interface() {
        let fixture = Fixture::new();
        let info = fixture.info("PackagePrivateGreeter");
        let greet = &info.overloads("greet")[0];
        assert_eq!(greet.declaring_class, "Greeter");
        assert_eq!(greet.implementation_class, "PackagePrivateGreeter");
        assert!(greet.invoker.is_some());

        let info = fixture.info("PublicGreeter");
        assert_eq!(info.overloads("greet")[0].declaring_class, "PublicGreeter");
    }

    #[test]
    fn test_exchange_pattern_inference() {
        let fixture = Fixture::new();
        let info = fixture.info("PatternBean");
        let pattern = |name: &str| info.overloads(name)[0].pattern;
        assert_eq!(pattern("explicitInOut"), ExchangePattern::InOut);
        assert_eq!(pattern("fromInterface"), ExchangePattern::RobustInOnly);
        assert_eq!(pattern("fromClass"), ExchangePattern::InOnly);

        let info = fixture.info("Y");
        assert_eq!(info.overloads("process")[0].pattern, ExchangePattern::InOut);
    }

    #[test]
    fn test_groups_and_lookup() {
        let fixture = Fixture::new();
        fixture.register(
            BeanClass::new("Grouped")
                .method(MethodDef::new("getName").returns("String"))
                .method(MethodDef::new("isActive").returns("boolean"))
                .method(MethodDef::new("setName").param("String"))
                .method(MethodDef::new("handle").param("String").handler())
                .method(MethodDef::new("tagged").param_with("String", ParamBinding::Header("x".into())))
                .method(MethodDef::new("util").param("String").static_method()),
        );
        let info = fixture.info("Grouped");
        assert_eq!(info.with_handler_annotation().len(), 1);
        assert_eq!(info.with_custom_annotation().len(), 1);
        assert_eq!(info.with_no_body().len(), 2);
        assert!(info.has_method("name"));
        assert!(info.has_method("active"));
        assert!(!info.has_method("missing"));
        assert!(info.has_static_method("util"));
        assert!(!info.has_static_method("handle"));
        assert!(is_getter(&info.overloads("getName")[0]));
        assert!(is_setter(&info.overloads("setName")[0]));
        assert!(info.default_method().is_none());

        let names: Vec<_> = info.methods().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["getName", "handle", "isActive", "setName", "tagged", "util"]);
    }

    #[test]
    fn test_empty_class() {
        let fixture = Fixture::new();
        fixture.register(BeanClass::new("Empty"));
        let info = fixture.info("Empty");
        assert!(info.candidates().is_empty());
        assert!(info.default_method().is_none());
    }

    #[test]
    fn test_concurrent_cache_access() {
        let fixture = Fixture::new();
        let class = fixture.ctx.classes().get("Z").unwrap();
        let cache = BeanInfoCache::new();

        let infos: Vec<Arc<BeanInfo>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cache.get_or_introspect(&class, fixture.ctx.classes(), fixture.ctx.types())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.len(), 1);
        let published = cache.get("Z").unwrap();
        assert!(infos.iter().all(|info| Arc::ptr_eq(info, &published)));

        cache.clear();
        assert!(cache.is_empty());
    }
}
