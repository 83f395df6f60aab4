use anyhow::Context;
use beanbind::prelude::*;
use beanbind::InvocationDispatcher;
use beanbind_core::{BeanComponentConfig, TomlPropertySource, BEAN_METHOD_NAME};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

// ==================== Bean 定义 ====================

#[derive(Default)]
struct GreetingService;

fn greeting_class() -> BeanClass {
    BeanClass::new("GreetingService")
        .constructor::<GreetingService>()
        .method(
            MethodDef::new("greet")
                .param("String")
                .returns("String")
                .invoke(|_, args| Ok(Value::String(format!("Hello {}", args.str(0)?)))),
        )
        .method(
            MethodDef::new("greet")
                .param("Integer")
                .returns("String")
                .invoke(|_, args| Ok(Value::String(format!("Hello #{}", args.i64(0)?)))),
        )
}

beanbind::submit_bean_class!(greeting_class);

#[derive(Default)]
struct OrderService {
    total: AtomicI64,
}

impl Service for OrderService {
    fn start(&self) -> anyhow::Result<()> {
        tracing::info!("OrderService started");
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(total = self.total.load(Ordering::SeqCst), "OrderService stopped");
        Ok(())
    }
}

fn order_class() -> BeanClass {
    BeanClass::new("OrderService")
        .constructor::<OrderService>()
        .lifecycle::<OrderService>()
        .method(
            MethodDef::new("add")
                .param("Integer")
                .returns("Integer")
                .invoke_on::<OrderService, _>(|service, args| {
                    let amount = args.i64(0)?;
                    Ok(Value::Int(service.total.fetch_add(amount, Ordering::SeqCst) + amount))
                }),
        )
        .method(MethodDef::new("audit").param("Exchange").invoke(|_, args| {
            let id = args.exchange().id.clone();
            args.out_headers_mut().insert("audited".into(), Value::String(id));
            Ok(Value::Null)
        }))
}

// ==================== 主程序 ====================

fn load_config() -> anyhow::Result<BeanComponentConfig> {
    let env = Environment::with_defaults();
    for path in ["demos/bean-demo/application.toml", "application.toml"] {
        if std::path::Path::new(path).exists() {
            let source = TomlPropertySource::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path))?;
            env.add_property_source(Box::new(source));
            break;
        }
    }
    BeanComponentConfig::from_environment(&env).context("Invalid bean component configuration")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    config
        .logging
        .clone()
        .merge_env()
        .init()
        .context("Failed to initialize logging")?;

    let ctx = Arc::new(BeanContext::with_config(config));
    ctx.register_class(order_class());
    ctx.register_bean("orders", "OrderService", Scope::Singleton)
        .context("Failed to register order service")?;

    // 隐式调用：按消息体类型选择重载
    let greeter = ctx.processor(TargetDescriptor::for_class("GreetingService"))?;
    let mut exchange = Exchange::new("Camel");
    greeter.process(&mut exchange)?;
    tracing::info!(result = %exchange.result_body(), "Implicit invocation");

    // 消息头指定方法和参数
    let mut exchange = Exchange::new(42)
        .with_header("name", "World")
        .with_header(BEAN_METHOD_NAME, "greet(${header.name})");
    greeter.process(&mut exchange)?;
    tracing::info!(result = %exchange.result_body(), "Invocation from method name header");

    // 消息体需要转换为 Integer
    let orders = ctx.processor(TargetDescriptor::registry("orders").with_method("add"))?;
    for amount in ["10", "32"] {
        let mut exchange = Exchange::new(amount);
        orders.process(&mut exchange)?;
        tracing::info!(amount, total = %exchange.result_body(), "Order added");
    }

    // void 方法保留消息体
    let auditor = ctx.processor(TargetDescriptor::registry("orders").with_method("audit"))?;
    let mut exchange = Exchange::new("audit me");
    auditor.process(&mut exchange)?;
    tracing::info!(body = %exchange.result_body(), "Audited exchange");

    // 参数绑定失败返回结构化错误
    for body in [Value::Bool(true), Value::from("oops")] {
        let mut exchange = Exchange::new(body);
        if let Err(e) = orders.process(&mut exchange) {
            tracing::warn!(error = %e, "Expected failure");
        }
    }

    // 通过调度器回放序列化的调用
    let dispatcher = InvocationDispatcher::spawn(Arc::clone(&ctx), 16);
    let mut exchange = Exchange::new("5");
    let invocation = orders.create_invocation(&mut exchange, None)?;
    let envelope = BeanInvocation::from_invocation("OrderService", &invocation);
    tracing::info!(json = %envelope.to_json()?, "Dispatching invocation");
    let (total, _) = dispatcher.dispatch("orders", &envelope, exchange).await?;
    tracing::info!(%total, "Dispatched invocation completed");
    dispatcher.shutdown().await;

    orders.stop()?;
    ctx.shutdown();
    Ok(())
}
