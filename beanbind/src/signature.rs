//! 方法调用表达式解析
//!
//! 语法：`methodName` 或 `methodName(arg1, arg2, ...)`，
//! 参数可以是字面量、类型限定符（`String.class`）、通配符 `*`
//! 或者 `${...}` 表达式。没有括号表示由解析器根据消息体选择重载。

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use beanbind_core::types::{normalize, TypeRegistry};
use beanbind_core::utils::strings;

use crate::error::{BeanError, BeanResult};
use crate::expression;

/// 解析后的方法表达式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    /// 方法名
    pub name: String,

    /// 显式参数表达式；`None` 表示没有括号，`Some(vec![])` 表示 `foo()`
    pub arguments: Option<Vec<String>>,
}

impl MethodSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: None,
        }
    }

    /// 是否是显式的无参调用 `foo()`
    pub fn is_empty_call(&self) -> bool {
        matches!(&self.arguments, Some(args) if args.is_empty())
    }
}

impl fmt::Display for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(args) = &self.arguments {
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

impl std::str::FromStr for MethodSpec {
    type Err = BeanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// 解析方法表达式
pub fn parse(expression: &str) -> BeanResult<MethodSpec> {
    let raw = expression.trim();

    let name_end = raw.find(['(', '.', '[', '?']).unwrap_or(raw.len());
    for (pos, c) in raw[..name_end].char_indices() {
        let valid = if pos == 0 {
            strings::is_identifier_start(c)
        } else {
            strings::is_identifier_part(c)
        };
        if !valid {
            return Err(BeanError::invalid_syntax(
                format!(
                    "Method name must start with a valid java identifier at position: {} in method: {}",
                    pos, raw
                ),
                raw,
            ));
        }
    }
    if name_end == 0 {
        return Err(BeanError::invalid_syntax(
            format!(
                "Method name must start with a valid java identifier at position: 0 in method: {}",
                raw
            ),
            raw,
        ));
    }

    let Some(open) = raw.find('(') else {
        return Ok(MethodSpec::named(raw));
    };

    if !raw.ends_with(')') {
        return Err(BeanError::invalid_syntax(
            format!("Method should end with parenthesis, was {}", raw),
            raw,
        ));
    }
    if !strings::is_balanced(raw, '(', ')') {
        return Err(BeanError::invalid_syntax(
            format!("Method should have even pair of parenthesis, was {}", raw),
            raw,
        ));
    }

    let inner = strings::between_outer_pair(raw, '(', ')').unwrap_or_default();
    Ok(MethodSpec {
        name: raw[..open].trim().to_string(),
        arguments: Some(strings::split_safe_quote(inner, ',')),
    })
}

/// 参数表达式的分类
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentKind {
    /// `*`：使用参数默认的绑定方式
    Wildcard,
    /// `null`
    Null,
    /// 引号包围的字符串字面量（已去掉引号）
    QuotedLiteral(String),
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    /// 类型限定符，例如 `String.class`
    TypeQualifier(String),
    /// `${...}` 表达式
    Expression(String),
    /// 其它原始文本，按字符串处理
    Raw(String),
}

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?\d+[lL]?$").expect("valid integer pattern"));
static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?(\d+\.\d*|\.\d+)([eE][-+]?\d+)?[dDfF]?$").expect("valid decimal pattern"));
static TYPE_QUALIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_$][\w$]*\.)*[A-Za-z_$][\w$]*(\[\])?\.class$").expect("valid class pattern"));

impl ArgumentKind {
    /// 对单个参数表达式分类，`types` 用于识别不带 `.class` 后缀的类型名
    pub fn classify(argument: &str, types: &TypeRegistry) -> Self {
        let arg = argument.trim();
        if arg == "*" {
            return ArgumentKind::Wildcard;
        }
        if arg == "null" {
            return ArgumentKind::Null;
        }
        if strings::is_quoted(arg) {
            return ArgumentKind::QuotedLiteral(strings::remove_leading_and_ending_quotes(arg).to_string());
        }
        if expression::is_expression(arg) {
            return ArgumentKind::Expression(arg.to_string());
        }
        match arg {
            "true" => return ArgumentKind::Boolean(true),
            "false" => return ArgumentKind::Boolean(false),
            _ => {}
        }
        if INTEGER.is_match(arg) {
            if let Ok(i) = arg.trim_end_matches(['l', 'L']).parse::<i64>() {
                return ArgumentKind::Integer(i);
            }
        }
        if DECIMAL.is_match(arg) {
            if let Ok(f) = arg.trim_end_matches(['d', 'D', 'f', 'F']).parse::<f64>() {
                return ArgumentKind::Decimal(f);
            }
        }
        if TYPE_QUALIFIER.is_match(arg) || (types.get(arg).is_some() && !arg.contains(' ')) {
            return ArgumentKind::TypeQualifier(normalize(arg));
        }
        ArgumentKind::Raw(arg.to_string())
    }

    /// 字面量的运行时类型；通配符、null、表达式与原始文本返回 `None`
    pub fn literal_type(&self) -> Option<&str> {
        use beanbind_core::types::names;
        match self {
            ArgumentKind::QuotedLiteral(_) => Some(names::STRING),
            ArgumentKind::Boolean(_) => Some(names::BOOLEAN),
            ArgumentKind::Integer(_) => Some(names::INTEGER),
            ArgumentKind::Decimal(_) => Some(names::DOUBLE),
            ArgumentKind::TypeQualifier(t) => Some(t.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name() {
        let spec = parse("hello").unwrap();
        assert_eq!(spec.name, "hello");
        assert_eq!(spec.arguments, None);
        assert!(!spec.is_empty_call());
    }

    #[test]
    fn test_parse_empty_call() {
        let spec = parse("hello()").unwrap();
        assert_eq!(spec.arguments, Some(vec![]));
        assert!(spec.is_empty_call());
    }

    #[test]
    fn test_parse_arguments() {
        let spec = parse("concat(${body}, ${header.foo})").unwrap();
        assert_eq!(spec.name, "concat");
        assert_eq!(
            spec.arguments,
            Some(vec!["${body}".to_string(), "${header.foo}".to_string()])
        );

        let spec = parse("foo('a, b', bar(1, 2), \"x)\")").unwrap();
        assert_eq!(
            spec.arguments,
            Some(vec!["'a, b'".to_string(), "bar(1, 2)".to_string(), "\"x)\"".to_string()])
        );
    }

    #[test]
    fn test_missing_end_parenthesis() {
        let err = parse("concat(${body}, ${header.foo}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Method should end with parenthesis, was concat(${body}, ${header.foo}"
        );
        assert!(matches!(err, BeanError::InvalidMethodSyntax { .. }));
    }

    #[test]
    fn test_unbalanced_parenthesis() {
        let err = parse("concat((${body}, ${header.foo})").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Method should have even pair of parenthesis, was concat((${body}, ${header.foo})"
        );
    }

    #[test]
    fn test_invalid_identifier() {
        let err = parse("--concat(${body}, ${header.foo})").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Method name must start with a valid java identifier at position: 0 in method: --concat(${body}, ${header.foo})"
        );

        let err = parse("con-cat(${body})").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Method name must start with a valid java identifier at position: 3 in method: con-cat(${body})"
        );
    }

    #[test]
    fn test_identifier_checked_before_parenthesis() {
        let err = parse("9lives(").unwrap_err();
        assert!(err.to_string().starts_with("Method name must start with a valid java identifier at position: 0"));
    }

    #[test]
    fn test_reparse_rendered_source() {
        for expr in [
            "hello",
            "hello()",
            "concat(${body},${header.foo})",
            "foo( 'a, b' , *, null, 5 )",
            "bar(String.class, ${header.animal?.friend.name})",
        ] {
            let parsed = parse(expr).unwrap();
            assert_eq!(parse(&parsed.to_string()).unwrap(), parsed, "expression: {}", expr);
        }
    }

    #[test]
    fn test_classify_arguments() {
        let types = TypeRegistry::new();
        assert_eq!(ArgumentKind::classify("*", &types), ArgumentKind::Wildcard);
        assert_eq!(ArgumentKind::classify("null", &types), ArgumentKind::Null);
        assert_eq!(
            ArgumentKind::classify("'Camel'", &types),
            ArgumentKind::QuotedLiteral("Camel".into())
        );
        assert_eq!(ArgumentKind::classify("true", &types), ArgumentKind::Boolean(true));
        assert_eq!(ArgumentKind::classify("-42", &types), ArgumentKind::Integer(-42));
        assert_eq!(ArgumentKind::classify("1.5", &types), ArgumentKind::Decimal(1.5));
        assert_eq!(
            ArgumentKind::classify("java.lang.String.class", &types),
            ArgumentKind::TypeQualifier("String".into())
        );
        assert_eq!(
            ArgumentKind::classify("Integer", &types),
            ArgumentKind::TypeQualifier("Integer".into())
        );
        assert_eq!(
            ArgumentKind::classify("${body}", &types),
            ArgumentKind::Expression("${body}".into())
        );
        assert_eq!(ArgumentKind::classify("Camel", &types), ArgumentKind::Raw("Camel".into()));
    }
}
