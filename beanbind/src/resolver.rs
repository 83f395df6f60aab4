//! 方法解析
//!
//! 按以下顺序从候选方法中选出唯一要调用的方法，第一个给出结果的阶段结束解析：
//!
//! 1. 显式方法名 + 显式参数类型
//! 2. 显式方法名 + 参数表达式列表
//! 3. 显式方法名，无参数
//! 4. 隐式调用：`@Handler` → 唯一的自定义注解方法 → 唯一的消息体方法 → 按消息体类型打分
//!
//! 覆盖链在内省时已经合并，所以只有兄弟重载之间才可能产生歧义。

use std::sync::Arc;

use beanbind_core::types::{names, TypeRegistry};
use beanbind_core::{Exchange, TypeConverter, Value};

use crate::error::{BeanError, BeanResult};
use crate::expression;
use crate::introspect::{is_getter, is_setter, BeanInfo};
use crate::method::MethodDescriptor;
use crate::signature::{ArgumentKind, MethodSpec};

type Candidates = Vec<Arc<MethodDescriptor>>;

/// 方法解析器
pub struct MethodResolver<'a> {
    types: &'a TypeRegistry,
    converter: &'a dyn TypeConverter,
    exclude_getters_setters: bool,
}

impl<'a> MethodResolver<'a> {
    pub fn new(types: &'a TypeRegistry, converter: &'a dyn TypeConverter) -> Self {
        Self {
            types,
            converter,
            exclude_getters_setters: true,
        }
    }

    /// 隐式调用时是否排除 getter/setter
    pub fn exclude_getters_setters(mut self, exclude: bool) -> Self {
        self.exclude_getters_setters = exclude;
        self
    }

    /// 解析要调用的方法
    ///
    /// 消息体需要转换才能匹配时，转换后的消息体会写回 `exchange`
    pub fn resolve(
        &self,
        info: &BeanInfo,
        exchange: &mut Exchange,
        method: Option<&MethodSpec>,
        parameter_type: Option<&str>,
    ) -> BeanResult<Arc<MethodDescriptor>> {
        let chosen = match (method, parameter_type) {
            (Some(spec), Some(parameter_type)) => {
                self.resolve_with_parameter_type(info, exchange, &spec.name, parameter_type)?
            }
            (Some(spec), None) => match &spec.arguments {
                Some(arguments) => self.resolve_with_arguments(info, exchange, &spec.name, arguments)?,
                None => self.resolve_named(info, exchange, &spec.name)?,
            },
            (None, _) => match info.default_method() {
                Some(single) => {
                    tracing::trace!("Bean has a single method, choosing: {}", single);
                    Arc::clone(single)
                }
                None => self.choose(info, exchange, None)?,
            },
        };
        tracing::trace!("Resolved method: {} on bean: {}", chosen, info.type_name());
        Ok(chosen)
    }

    /// 阶段 1：第一个参数必须能接收 `parameter_type`，消息体随后转换为该类型
    fn resolve_with_parameter_type(
        &self,
        info: &BeanInfo,
        exchange: &mut Exchange,
        name: &str,
        parameter_type: &str,
    ) -> BeanResult<Arc<MethodDescriptor>> {
        let parameter_type = beanbind_core::types::normalize(parameter_type);
        let matching: Candidates = info
            .find_method(name)
            .iter()
            .filter(|m| {
                m.parameters
                    .first()
                    .is_some_and(|p| self.types.is_assignable(&parameter_type, &p.type_name))
            })
            .cloned()
            .collect();

        let chosen = match matching.len() {
            0 => return Err(not_found(info, exchange, name, vec![parameter_type])),
            1 => Arc::clone(&matching[0]),
            _ => self
                .most_specific(&matching, |m| m.parameters.first().map(|p| p.type_name.as_str()))
                .ok_or_else(|| ambiguous(exchange, matching.clone()))?,
        };

        let body = self.converter.convert(exchange.body(), &parameter_type)?;
        exchange.set_body(body);
        Ok(chosen)
    }

    /// 阶段 2：按参数个数、类型限定符和参数的运行时类型筛选
    fn resolve_with_arguments(
        &self,
        info: &BeanInfo,
        exchange: &mut Exchange,
        name: &str,
        arguments: &[String],
    ) -> BeanResult<Arc<MethodDescriptor>> {
        let overloads = info.find_method(name);
        if arguments.is_empty() {
            let no_args: Candidates = overloads
                .iter()
                .filter(|m| m.parameters.is_empty())
                .cloned()
                .collect();
            return match no_args.len() {
                0 => Err(not_found(info, exchange, &format!("{}()", name), vec![])),
                1 => Ok(Arc::clone(&no_args[0])),
                _ => Err(ambiguous(exchange, no_args)),
            };
        }

        let kinds: Vec<ArgumentKind> = arguments
            .iter()
            .map(|a| ArgumentKind::classify(a, self.types))
            .collect();

        let survivors: Candidates = overloads
            .iter()
            .filter(|m| m.parameters.len() == kinds.len())
            .filter(|m| {
                kinds.iter().zip(&m.parameters).all(|(kind, p)| match kind {
                    ArgumentKind::TypeQualifier(t) => self.types.is_assignable(t, &p.type_name),
                    _ => true,
                })
            })
            .cloned()
            .collect();

        match survivors.len() {
            0 => {
                let attempted = kinds
                    .iter()
                    .map(|k| k.literal_type().unwrap_or(names::OBJECT).to_string())
                    .collect();
                Err(not_found(info, exchange, name, attempted))
            }
            1 => Ok(Arc::clone(&survivors[0])),
            _ => {
                let runtime_types = self.argument_types(&kinds, exchange);
                let (mut candidates, mut fallback) = self.matching_arguments(&survivors, &runtime_types, false);
                if candidates.is_empty() && fallback.is_none() {
                    (candidates, fallback) = self.matching_arguments(&survivors, &runtime_types, true);
                }
                if candidates.len() > 1 {
                    if let Some(single) = self.single_covariant(&candidates) {
                        return Ok(single);
                    }
                }
                match candidates.len() {
                    1 => Ok(Arc::clone(&candidates[0])),
                    0 => match fallback {
                        Some(fallback) => Ok(fallback),
                        None => match self.match_body(exchange, &survivors, &[])? {
                            Some(chosen) => Ok(chosen),
                            None => Err(ambiguous(exchange, survivors)),
                        },
                    },
                    _ => Err(ambiguous(exchange, candidates)),
                }
            }
        }
    }

    /// 参数表达式的运行时类型，无法确定时为 `None`
    fn argument_types(&self, kinds: &[ArgumentKind], exchange: &Exchange) -> Vec<Option<String>> {
        kinds
            .iter()
            .map(|kind| match kind {
                ArgumentKind::Expression(expr) => match expression::evaluate(expr, exchange) {
                    Ok(value) => value.type_name().map(str::to_string),
                    Err(e) => {
                        tracing::trace!("Cannot evaluate {} to determine its type: {}", expr, e);
                        None
                    }
                },
                other => other.literal_type().map(str::to_string),
            })
            .collect()
    }

    /// 返回匹配的方法，以及参数类型为 `Object` 的后备方法
    fn matching_arguments(
        &self,
        methods: &[Arc<MethodDescriptor>],
        runtime_types: &[Option<String>],
        allow_conversion: bool,
    ) -> (Candidates, Option<Arc<MethodDescriptor>>) {
        let mut candidates = Vec::new();
        let mut fallback = None;

        'methods: for method in methods {
            for (runtime, param) in runtime_types.iter().zip(&method.parameters) {
                let Some(runtime) = runtime else {
                    continue;
                };
                if param.type_name == names::OBJECT {
                    fallback = Some(Arc::clone(method));
                    continue 'methods;
                }
                let mut matching = self.is_matching_type(runtime, &param.type_name);
                if !matching && allow_conversion {
                    matching = self.converter.can_convert(runtime, &param.type_name);
                }
                if !matching {
                    continue 'methods;
                }
            }
            candidates.push(Arc::clone(method));
        }
        (candidates, fallback)
    }

    /// 整数字面量也匹配 `Long`
    fn is_matching_type(&self, runtime: &str, expected: &str) -> bool {
        if (runtime == names::INTEGER || runtime == names::NUMBER)
            && (expected == names::INTEGER || expected == names::LONG)
        {
            return true;
        }
        self.types.is_assignable(runtime, expected)
    }

    /// 阶段 3：显式方法名，只有一个重载时直接选择
    fn resolve_named(&self, info: &BeanInfo, exchange: &mut Exchange, name: &str) -> BeanResult<Arc<MethodDescriptor>> {
        let overloads = info.find_method(name);
        match overloads.len() {
            0 => Err(not_found(info, exchange, name, vec![])),
            1 => Ok(Arc::clone(&overloads[0])),
            _ => {
                let method_name = overloads[0].name.clone();
                self.choose(info, exchange, Some(&method_name))
            }
        }
    }

    /// 在（可选按名称过滤的）候选方法中选择
    fn choose(&self, info: &BeanInfo, exchange: &mut Exchange, name: Option<&str>) -> BeanResult<Arc<MethodDescriptor>> {
        let keep = |m: &&Arc<MethodDescriptor>| {
            if m.is_abstract && !m.from_interface {
                return false;
            }
            match name {
                Some(name) => m.name == name,
                None => !(self.exclude_getters_setters && (is_getter(m) || is_setter(m))),
            }
        };
        let filter = |methods: &[Arc<MethodDescriptor>]| -> Candidates { methods.iter().filter(keep).cloned().collect() };

        let handlers = filter(info.with_handler_annotation());
        let custom = filter(info.with_custom_annotation());
        let with_body = filter(info.with_body());
        let no_body = filter(info.with_no_body());

        if handlers.len() > 1 {
            return Err(ambiguous(exchange, handlers));
        }
        if let [handler] = handlers.as_slice() {
            tracing::trace!("Choosing @Handler method: {}", handler);
            return Ok(Arc::clone(handler));
        }
        if let [annotated] = custom.as_slice() {
            tracing::trace!("Choosing the only method with custom annotations: {}", annotated);
            return Ok(Arc::clone(annotated));
        }
        if custom.is_empty() {
            if let [single] = with_body.as_slice() {
                return Ok(Arc::clone(single));
            }
        }

        let possible: Candidates = with_body.iter().chain(&custom).cloned().collect();
        if !possible.is_empty() {
            if let Some(chosen) = self.match_body(exchange, &possible, &custom)? {
                return Ok(chosen);
            }
            if possible.len() > 1 {
                if let Some(single) = self.single_covariant(&possible) {
                    return Ok(single);
                }
            }
        }

        let consumers: Candidates = no_body.iter().filter(|m| m.is_exchange_consumer()).cloned().collect();
        match consumers.len() {
            0 => {}
            1 => return Ok(Arc::clone(&consumers[0])),
            _ => return Err(ambiguous(exchange, consumers)),
        }

        let no_parameters: Candidates = no_body.iter().filter(|m| m.parameters.is_empty()).cloned().collect();
        match no_parameters.len() {
            0 => {}
            1 if possible.is_empty() => return Ok(Arc::clone(&no_parameters[0])),
            _ if possible.is_empty() => return Err(ambiguous(exchange, no_parameters)),
            _ => {}
        }

        let body_type = exchange.body().type_name().unwrap_or(names::OBJECT).to_string();
        Err(not_found(info, exchange, name.unwrap_or_default(), vec![body_type]))
    }

    /// 按消息体类型选择：可赋值优先于可转换，最具体的类型胜出
    fn match_body(
        &self,
        exchange: &mut Exchange,
        possible: &[Arc<MethodDescriptor>],
        custom: &[Arc<MethodDescriptor>],
    ) -> BeanResult<Option<Arc<MethodDescriptor>>> {
        let body = exchange.body();
        let Some(body_type) = body.type_name().map(str::to_string) else {
            return match possible {
                [single] => Ok(Some(Arc::clone(single))),
                [] => Ok(None),
                _ => Err(ambiguous(exchange, possible.to_vec())),
            };
        };
        tracing::trace!("Matching for method with a body parameter of type: {}", body_type);

        let out_capable = exchange.pattern.is_out_capable();
        let mut regular = Vec::new();
        let mut with_exception = Vec::new();
        for method in possible {
            // InOut 需要返回值
            if out_capable && method.is_void() {
                continue;
            }
            let Some(param_type) = method.body_parameter_type() else {
                continue;
            };
            if self.types.is_assignable(&body_type, param_type) {
                if method.accepts_exception {
                    with_exception.push(Arc::clone(method));
                } else {
                    regular.push(Arc::clone(method));
                }
            }
        }

        if exchange.exception.is_some() {
            if let [handler] = with_exception.as_slice() {
                tracing::trace!("Exchange has an exception, preferring method: {}", handler);
                return Ok(Some(Arc::clone(handler)));
            }
        }

        match regular.len() {
            1 => return Ok(Some(regular.remove(0))),
            0 => {}
            _ => {
                if let [annotated] = custom {
                    return Ok(Some(Arc::clone(annotated)));
                }
                if let Some(chosen) = self.most_specific(&regular, |m| m.body_parameter_type()) {
                    return Ok(Some(chosen));
                }
                if let Some(chosen) = self.single_covariant(&regular) {
                    return Ok(Some(chosen));
                }
                return Err(ambiguous(exchange, regular));
            }
        }

        if let Some(first) = with_exception.first() {
            return Ok(Some(Arc::clone(first)));
        }

        tracing::trace!("No method accepts the body as is, trying to convert it");
        let mut converted: Vec<(Arc<MethodDescriptor>, Value)> = Vec::new();
        for method in possible {
            if let Some(param_type) = method.body_parameter_type() {
                if let Some(value) = self.converter.try_convert(body, param_type) {
                    converted.push((Arc::clone(method), value));
                }
            }
        }
        match converted.len() {
            0 => Ok(None),
            1 => {
                let (method, value) = converted.remove(0);
                tracing::trace!("Setting converted body for method: {}", method);
                exchange.set_body(value);
                Ok(Some(method))
            }
            _ => {
                let methods = converted.into_iter().map(|(m, _)| m).collect();
                Err(ambiguous(exchange, methods))
            }
        }
    }

    /// 参数类型严格比其它所有方法都具体的唯一方法
    fn most_specific<F>(&self, methods: &[Arc<MethodDescriptor>], type_of: F) -> Option<Arc<MethodDescriptor>>
    where
        F: Fn(&MethodDescriptor) -> Option<&str>,
    {
        let mut winner = None;
        for candidate in methods {
            let Some(t) = type_of(candidate.as_ref()) else {
                continue;
            };
            let beats_all = methods.iter().filter(|o| !Arc::ptr_eq(o, candidate)).all(|other| {
                type_of(other.as_ref()).is_some_and(|o| self.types.is_assignable(t, o) && !self.types.is_assignable(o, t))
            });
            if beats_all {
                if winner.is_some() {
                    return None;
                }
                winner = Some(Arc::clone(candidate));
            }
        }
        winner
    }

    /// 所有候选都互相协变时返回第一个
    fn single_covariant(&self, methods: &[Arc<MethodDescriptor>]) -> Option<Arc<MethodDescriptor>> {
        let first = methods.first()?;
        methods
            .iter()
            .all(|m| first.is_covariant_with(m, self.types))
            .then(|| Arc::clone(first))
    }
}

fn not_found(info: &BeanInfo, exchange: &Exchange, method: &str, parameter_types: Vec<String>) -> BeanError {
    BeanError::MethodNotFound {
        bean: info.type_name().to_string(),
        method: method.to_string(),
        parameter_types,
        exchange_id: exchange.id.clone(),
    }
}

fn ambiguous(exchange: &Exchange, candidates: Candidates) -> BeanError {
    BeanError::AmbiguousMethodCall {
        candidates,
        exchange_id: exchange.id.clone(),
    }
}
