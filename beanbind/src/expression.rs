//! 简单表达式
//!
//! 参数表达式 `${...}` 的求值，支持消息体、消息头、交换属性、
//! 交换异常以及对象图导航：
//!
//! - `${body}`、`${body.address.city}`、`${body[0]}`
//! - `${header.foo}`、`${headers.foo}`、`${header[foo]}`、`${headers:foo}`
//! - `${exchangeProperty.foo}`、`${property[foo]}`
//! - `${headers}`、`${exchangeProperties}`、`${exception.message}`、`${exchangeId}`
//! - 空安全导航：`${header.animal?.friend.name}`
//!
//! 整个表达式只有一个占位符时返回原始值，否则按文本插值。

use std::collections::BTreeMap;
use thiserror::Error;

use beanbind_core::utils::strings;
use beanbind_core::{Exchange, Value};

/// 表达式求值错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid expression: {expression} due to: {message}")]
    Syntax { expression: String, message: String },

    #[error("Cannot navigate {path} on value of type: {type_name}")]
    Navigation { path: String, type_name: String },

    #[error("Null value when navigating {path}, use ?. for null safe navigation")]
    NullNavigation { path: String },
}

/// 文本中是否包含表达式占位符
pub fn is_expression(text: &str) -> bool {
    text.contains("${")
}

/// 对表达式求值
pub fn evaluate(expression: &str, exchange: &Exchange) -> Result<Value, ExpressionError> {
    let parts = split_placeholders(expression)?;
    if let [Part::Placeholder(function)] = parts.as_slice() {
        return evaluate_function(function, exchange);
    }

    let mut out = String::new();
    for part in parts {
        match part {
            Part::Text(text) => out.push_str(text),
            Part::Placeholder(function) => {
                let value = evaluate_function(function, exchange)?;
                if !value.is_null() {
                    out.push_str(&value.to_string());
                }
            }
        }
    }
    Ok(Value::String(out))
}

enum Part<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn split_placeholders(expression: &str) -> Result<Vec<Part<'_>>, ExpressionError> {
    let mut parts = Vec::new();
    let mut rest = expression;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            parts.push(Part::Text(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let end = placeholder_end(after).ok_or_else(|| ExpressionError::Syntax {
            expression: expression.to_string(),
            message: "expected '}' to close placeholder".to_string(),
        })?;
        parts.push(Part::Placeholder(after[..end].trim()));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        parts.push(Part::Text(rest));
    }
    Ok(parts)
}

/// 匹配的 `}` 位置，允许嵌套的 `{}`
fn placeholder_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn evaluate_function(function: &str, exchange: &Exchange) -> Result<Value, ExpressionError> {
    match function {
        "null" => return Ok(Value::Null),
        "exchangeId" => return Ok(Value::String(exchange.id.clone())),
        "headers" | "in.headers" => return Ok(Value::Map(exchange.in_message.headers.clone())),
        "exchangeProperties" | "properties" => return Ok(Value::Map(exchange.properties.clone())),
        _ => {}
    }

    if let Some(path) = strip_root(function, &["in.body", "body"]) {
        return navigate(exchange.body().clone(), path, function);
    }
    if let Some(path) = strip_root(function, &["exception"]) {
        let exception = exchange.exception.clone().unwrap_or_default();
        return navigate(exception, path, function);
    }
    if let Some(name) = function
        .strip_prefix("headers:")
        .or_else(|| function.strip_prefix("header:"))
    {
        return Ok(lookup(&exchange.in_message.headers, name.trim()));
    }
    for prefix in ["in.headers", "in.header", "headers", "header"] {
        if let Some(rest) = function.strip_prefix(prefix) {
            if let Some((name, path)) = split_key(rest, function)? {
                return navigate(lookup(&exchange.in_message.headers, &name), path, function);
            }
        }
    }
    for prefix in ["exchangeProperty", "property"] {
        if let Some(rest) = function.strip_prefix(prefix) {
            if let Some((name, path)) = split_key(rest, function)? {
                return navigate(lookup(&exchange.properties, &name), path, function);
            }
        }
    }

    Err(ExpressionError::UnknownFunction(function.to_string()))
}

/// 去掉根名称，返回剩余的导航路径
fn strip_root<'a>(function: &'a str, roots: &[&str]) -> Option<&'a str> {
    roots.iter().find_map(|root| {
        let rest = function.strip_prefix(root)?;
        (rest.is_empty() || rest.starts_with(['.', '?', '['])).then_some(rest)
    })
}

/// 解析 `.name` 或 `[name]` 形式的键，返回键和剩余路径
fn split_key<'a>(rest: &'a str, function: &str) -> Result<Option<(String, &'a str)>, ExpressionError> {
    if let Some(after) = rest.strip_prefix('.') {
        let end = after.find(['.', '?', '[']).unwrap_or(after.len());
        let name = &after[..end];
        if name.is_empty() {
            return Err(syntax(function, "expected a name after '.'"));
        }
        return Ok(Some((name.to_string(), &after[end..])));
    }
    if rest.starts_with('[') {
        let inner = strings::between_outer_pair(rest, '[', ']')
            .ok_or_else(|| syntax(function, "expected ']' to close key"))?;
        let consumed = inner.len() + 2;
        let name = strings::remove_leading_and_ending_quotes(inner.trim());
        return Ok(Some((name.to_string(), &rest[consumed..])));
    }
    Ok(None)
}

fn lookup(map: &BTreeMap<String, Value>, name: &str) -> Value {
    map.get(name).cloned().unwrap_or_default()
}

fn syntax(expression: &str, message: &str) -> ExpressionError {
    ExpressionError::Syntax {
        expression: expression.to_string(),
        message: message.to_string(),
    }
}

/// 沿路径导航：`.name` 严格，`?.name` 空安全，`[key]` 下标
fn navigate(mut current: Value, path: &str, function: &str) -> Result<Value, ExpressionError> {
    let mut rest = path;
    while !rest.is_empty() {
        let (null_safe, after) = match rest.strip_prefix("?.") {
            Some(after) => (true, after),
            None => (false, rest),
        };

        let (key, next) = if let Some(after) = after.strip_prefix('.').or(null_safe.then_some(after)) {
            let end = after.find(['.', '?', '[']).unwrap_or(after.len());
            if end == 0 {
                return Err(syntax(function, "expected a name after '.'"));
            }
            (property_name(&after[..end]), &after[end..])
        } else if after.starts_with('[') {
            let inner = strings::between_outer_pair(after, '[', ']')
                .ok_or_else(|| syntax(function, "expected ']' to close index"))?;
            let consumed = inner.len() + 2;
            let key = strings::remove_leading_and_ending_quotes(inner.trim()).to_string();
            (key, &after[consumed..])
        } else {
            return Err(syntax(function, &format!("unexpected token at: {}", rest)));
        };

        if current.is_null() {
            if null_safe {
                return Ok(Value::Null);
            }
            return Err(ExpressionError::NullNavigation {
                path: function.to_string(),
            });
        }

        current = current.child(&key).ok_or_else(|| ExpressionError::Navigation {
            path: format!("{} ({})", function, key),
            type_name: current.type_name().unwrap_or("null").to_string(),
        })?;
        rest = next;
    }
    Ok(current)
}

/// `getName()` / `name()` 都按属性 `name` 访问
fn property_name(segment: &str) -> String {
    let segment = segment.strip_suffix("()").unwrap_or(segment);
    if let Some(property) = beanbind_core::utils::naming::getter_property(segment) {
        return property;
    }
    segment.to_string()
}
