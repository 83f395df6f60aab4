//! 单元测试共用的 Bean 类

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use beanbind_core::{ExchangePattern, ObjectValue, Scope, Service, TypeDef, Value};

use crate::binder::ParameterBinder;
use crate::class::{Args, BeanClass, MethodDef, ParamBinding};
use crate::context::BeanContext;
use crate::introspect::BeanInfo;
use crate::resolver::MethodResolver;

pub(crate) struct Fixture {
    pub ctx: Arc<BeanContext>,
}

impl Fixture {
    pub fn new() -> Self {
        let ctx = Arc::new(BeanContext::new());
        ctx.register_type(TypeDef::new("Request"));
        ctx.register_type(TypeDef::new("SpecialRequest").with_supertype("Request"));
        ctx.register_type(TypeDef::new("Document"));
        for class in classes() {
            ctx.register_class(class);
        }
        Self { ctx }
    }

    pub fn register(&self, class: BeanClass) -> Arc<BeanClass> {
        self.ctx.register_class(class)
    }

    pub fn info(&self, class: &str) -> Arc<BeanInfo> {
        self.ctx.bean_info_for(class).expect("class is registered")
    }

    pub fn resolver(&self) -> MethodResolver<'_> {
        self.ctx.resolver()
    }

    pub fn binder(&self) -> ParameterBinder<'_> {
        self.ctx.binder()
    }

    pub fn register_counter_class(&self, probe: &LifecycleProbe) {
        let probe = probe.clone();
        self.register(
            BeanClass::new("Counter")
                .factory(move || Ok(probe.counter()))
                .lifecycle::<Counter>()
                .method(
                    MethodDef::new("tick")
                        .param("String")
                        .returns("Integer")
                        .invoke_on::<Counter, _>(|counter, _| {
                            Ok(Value::Int(counter.count.fetch_add(1, Ordering::SeqCst) + 1))
                        }),
                ),
        );
    }

    pub fn register_counter_bean(&self, name: &str, scope: Scope, probe: &LifecycleProbe) {
        self.register_counter_class(probe);
        self.ctx
            .register_bean(name, "Counter", scope)
            .expect("counter bean registers");
    }
}

pub(crate) fn request() -> Value {
    Value::Object(ObjectValue::new("Request"))
}

#[derive(Default)]
pub(crate) struct MyBean;

/// 记录实例创建和生命周期回调次数
#[derive(Clone, Default)]
pub(crate) struct LifecycleProbe {
    pub created: Arc<AtomicUsize>,
    pub started: Arc<AtomicUsize>,
    pub stopped: Arc<AtomicUsize>,
}

impl LifecycleProbe {
    pub fn counter(&self) -> Counter {
        self.created.fetch_add(1, Ordering::SeqCst);
        Counter {
            count: AtomicI64::new(0),
            probe: self.clone(),
        }
    }
}

pub(crate) struct Counter {
    count: AtomicI64,
    probe: LifecycleProbe,
}

impl Service for Counter {
    fn start(&self) -> anyhow::Result<()> {
        self.probe.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<()> {
        self.probe.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn text(args: &Args<'_>, index: usize) -> String {
    args.opt_str(index).unwrap_or_default().to_string()
}

fn echo_first(_: &crate::class::BeanInstance, args: &mut Args<'_>) -> anyhow::Result<Value> {
    Ok(args.value(0).clone())
}

fn classes() -> Vec<BeanClass> {
    vec![
        BeanClass::new("X").method(MethodDef::new("process").param("Request").returns("String").invoke(echo_first)),
        BeanClass::new("Y")
            .extends("X")
            .method(MethodDef::new("process").param("Request").returns("String").invoke(echo_first)),
        BeanClass::new("Z").extends("Y").method(
            MethodDef::new("process")
                .param("Request")
                .param("String")
                .returns("String")
                .invoke(echo_first),
        ),
        BeanClass::new("Printer")
            .method(MethodDef::new("print").param("String").returns("String").invoke(echo_first))
            .method(MethodDef::new("print").param("Integer").returns("String").invoke(echo_first)),
        BeanClass::new("Twins")
            .method(MethodDef::new("first").param("String").returns("String").invoke(echo_first))
            .method(MethodDef::new("second").param("String").returns("String").invoke(echo_first)),
        BeanClass::new("ReaderBean")
            .method(MethodDef::new("read").param("String").returns("String").invoke(echo_first))
            .method(MethodDef::new("read").param("Object").returns("String").invoke(echo_first))
            .method(MethodDef::new("read").param("Reader").returns("String").invoke(echo_first)),
        BeanClass::new("Echo").method(MethodDef::new("echo").param("String").returns("String").invoke(echo_first)),
        BeanClass::new("Calculator")
            .constructor::<MyBean>()
            .method(
                MethodDef::new("twice")
                    .param("Integer")
                    .returns("Integer")
                    .invoke(|_, args| Ok(Value::Int(args.i64(0)? * 2))),
            )
            .method(
                MethodDef::new("flip")
                    .param("Boolean")
                    .returns("Boolean")
                    .invoke(|_, args| Ok(Value::Bool(!args.bool(0)?))),
            ),
        BeanClass::new("HandlerBean")
            .method(MethodDef::new("handle").param("String").returns("String").handler().invoke(echo_first))
            .method(MethodDef::new("other").param("String").returns("String").invoke(echo_first)),
        BeanClass::new("AnnotatedBean")
            .method(
                MethodDef::new("greet")
                    .param_with("String", ParamBinding::Header("greeting".into()))
                    .param_with("String", ParamBinding::Body)
                    .returns("String")
                    .invoke(|_, args| Ok(Value::String(format!("{} {}", text(args, 0), text(args, 1))))),
            )
            .method(MethodDef::new("plain").param("String").returns("String").invoke(echo_first)),
        BeanClass::new("ErrorBean")
            .method(MethodDef::new("handle").param("String").returns("String").invoke(echo_first))
            .method(
                MethodDef::new("handle")
                    .param("String")
                    .param("IllegalStateException")
                    .returns("String")
                    .invoke(echo_first),
            ),
        BeanClass::new("ExchangeBean")
            .constructor::<MyBean>()
            .method(MethodDef::new("consume").param("Exchange").invoke(|_, args| {
                args.out_headers_mut().insert("consumed".into(), Value::Bool(true));
                Ok(Value::Null)
            }))
            .method(
                MethodDef::new("transform")
                    .param("String")
                    .returns("String")
                    .invoke(|_, args| Ok(Value::String(text(args, 0).to_uppercase()))),
            )
            .method(MethodDef::new("count").param("Integer").returns("Integer").invoke(echo_first))
            .method(
                MethodDef::new("getName")
                    .returns("String")
                    .invoke(|_, _| Ok(Value::from("exchange-bean"))),
            ),
        BeanClass::new("MyBean")
            .constructor::<MyBean>()
            .method(
                MethodDef::new("concat")
                    .param("String")
                    .param("String")
                    .returns("String")
                    .invoke_on::<MyBean, _>(|_, args| Ok(Value::String(format!("{}={}", text(args, 0), text(args, 1))))),
            )
            .method(
                MethodDef::new("concat")
                    .param("String")
                    .param("String")
                    .param("String")
                    .returns("String")
                    .invoke_on::<MyBean, _>(|_, args| {
                        Ok(Value::String(format!("{}={}={}", text(args, 0), text(args, 1), text(args, 2))))
                    }),
            )
            .method(MethodDef::new("times").param("String").param("Integer").returns("String").invoke(echo_first))
            .method(MethodDef::new("times").param("String").param("Boolean").returns("String").invoke(echo_first))
            .method(MethodDef::new("times").param("String").param("Object").returns("String").invoke(echo_first)),
        BeanClass::new("Everything").method(
            MethodDef::new("all")
                .param_with("String", ParamBinding::Body)
                .param_with("String", ParamBinding::Header("name".into()))
                .param_with("Map", ParamBinding::Headers)
                .param_with("String", ParamBinding::Property("level".into()))
                .param_with("Map", ParamBinding::Properties)
                .param_with("Exception", ParamBinding::ExchangeException)
                .param_with("Map", ParamBinding::Attachments)
                .param_with("String", ParamBinding::Expression("${body}!".into()))
                .param("Exchange")
                .returns("String")
                .invoke(echo_first),
        ),
        BeanClass::new("DocumentBean").method(
            MethodDef::new("process")
                .param_with("Document", ParamBinding::Header("doc".into()))
                .returns("String")
                .invoke(echo_first),
        ),
        BeanClass::interface("Greeter").method(MethodDef::new("greet").param("String").returns("String")),
        BeanClass::new("PackagePrivateGreeter")
            .implements("Greeter")
            .package_private()
            .method(MethodDef::new("greet").param("String").returns("String").invoke(echo_first)),
        BeanClass::new("PublicGreeter")
            .implements("Greeter")
            .method(MethodDef::new("greet").param("String").returns("String").invoke(echo_first)),
        BeanClass::interface("PatternApi").method(
            MethodDef::new("fromInterface")
                .param("String")
                .returns("String")
                .pattern(ExchangePattern::RobustInOnly),
        ),
        BeanClass::new("PatternBean")
            .implements("PatternApi")
            .pattern(ExchangePattern::InOnly)
            .constructor::<MyBean>()
            .method(
                MethodDef::new("explicitInOut")
                    .param("String")
                    .returns("String")
                    .pattern(ExchangePattern::InOut)
                    .invoke(echo_first),
            )
            .method(MethodDef::new("fromInterface").param("String").returns("String").invoke(echo_first))
            .method(
                MethodDef::new("fromClass")
                    .param("String")
                    .returns("String")
                    .invoke(|_, args| Ok(Value::String(text(args, 0).to_uppercase()))),
            ),
        BeanClass::new("FailingBean").constructor::<MyBean>().method(
            MethodDef::new("fail")
                .param("String")
                .returns("String")
                .invoke(|_, args| Err(anyhow::anyhow!("Forced failure: {}", text(args, 0)))),
        ),
    ]
}
