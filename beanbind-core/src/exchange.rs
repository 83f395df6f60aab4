//! 消息交换模型
//!
//! 一次 Bean 调用面对的是一个 [`Exchange`]：入站消息、可选的出站消息、
//! 交换属性、可能存在的异常以及消息交换模式。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::value::Value;

/// 消息交换模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExchangePattern {
    /// 单向
    InOnly,
    /// 请求/应答（默认）
    #[default]
    InOut,
    /// 单向，但需要可靠地报告错误
    RobustInOnly,
}

impl ExchangePattern {
    /// 是否产生出站消息
    pub fn is_out_capable(&self) -> bool {
        matches!(self, ExchangePattern::InOut)
    }
}

impl FromStr for ExchangePattern {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "InOnly" => Ok(ExchangePattern::InOnly),
            "InOut" => Ok(ExchangePattern::InOut),
            "RobustInOnly" => Ok(ExchangePattern::RobustInOnly),
            _ => Err(format!("Invalid exchange pattern: {}", s)),
        }
    }
}

impl fmt::Display for ExchangePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangePattern::InOnly => write!(f, "InOnly"),
            ExchangePattern::InOut => write!(f, "InOut"),
            ExchangePattern::RobustInOnly => write!(f, "RobustInOnly"),
        }
    }
}

/// 消息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub body: Value,

    #[serde(default)]
    pub headers: BTreeMap<String, Value>,

    #[serde(default)]
    pub attachments: BTreeMap<String, Value>,
}

impl Message {
    pub fn new(body: impl Into<Value>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_attachment(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attachments.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn remove_header(&mut self, name: &str) -> Option<Value> {
        self.headers.remove(name)
    }
}

/// 消息交换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// 唯一标识
    pub id: String,

    pub pattern: ExchangePattern,

    /// 入站消息
    #[serde(rename = "in")]
    pub in_message: Message,

    /// 出站消息（InOut 模式下由 Bean 调用结果填充）
    #[serde(default)]
    pub out_message: Option<Message>,

    #[serde(default)]
    pub properties: BTreeMap<String, Value>,

    /// 处理过程中捕获的异常
    #[serde(default)]
    pub exception: Option<Value>,
}

impl Exchange {
    pub fn new(body: impl Into<Value>) -> Self {
        Self::with_message(Message::new(body))
    }

    pub fn with_message(message: Message) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            pattern: ExchangePattern::default(),
            in_message: message,
            out_message: None,
            properties: BTreeMap::new(),
            exception: None,
        }
    }

    pub fn with_pattern(mut self, pattern: ExchangePattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.in_message.set_header(name, value);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_exception(mut self, exception: impl Into<Value>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn body(&self) -> &Value {
        &self.in_message.body
    }

    pub fn set_body(&mut self, body: impl Into<Value>) {
        self.in_message.body = body.into();
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.in_message.header(name)
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn has_out(&self) -> bool {
        self.out_message.is_some()
    }

    /// 出站消息，不存在时创建一个空消息
    pub fn out_mut(&mut self) -> &mut Message {
        self.out_message.get_or_insert_with(Message::default)
    }

    /// 处理结果：有出站消息时取出站消息体，否则取入站消息体
    pub fn result_body(&self) -> &Value {
        self.out_message
            .as_ref()
            .map(|out| &out.body)
            .unwrap_or(&self.in_message.body)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exchange[{}]", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_defaults() {
        let exchange = Exchange::new("Hello");
        assert_eq!(exchange.pattern, ExchangePattern::InOut);
        assert!(!exchange.has_out());
        assert_eq!(exchange.body(), &Value::from("Hello"));
        assert_eq!(exchange.to_string(), format!("Exchange[{}]", exchange.id));
    }

    #[test]
    fn test_unique_ids() {
        assert_ne!(Exchange::new(1).id, Exchange::new(1).id);
    }

    #[test]
    fn test_result_body() {
        let mut exchange = Exchange::new("in");
        assert_eq!(exchange.result_body(), &Value::from("in"));
        exchange.out_mut().body = Value::from("out");
        assert_eq!(exchange.result_body(), &Value::from("out"));
    }

    #[test]
    fn test_pattern_parse() {
        assert_eq!("InOnly".parse::<ExchangePattern>().unwrap(), ExchangePattern::InOnly);
        assert!(!ExchangePattern::RobustInOnly.is_out_capable());
        assert!("Bogus".parse::<ExchangePattern>().is_err());
    }
}
