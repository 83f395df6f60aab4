//! 异步调用调度
//!
//! 工作任务从 mpsc 通道接收序列化的 [`BeanInvocation`]，在 Bean 注册表中
//! 找到实例后回放调用，结果通过 oneshot 通道返回给调用方。

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use beanbind_core::{Exchange, Value};

use crate::context::BeanContext;
use crate::error::{BeanError, BeanResult};
use crate::invocation::BeanInvocation;

type Reply = oneshot::Sender<BeanResult<(Value, Exchange)>>;

struct DispatchRequest {
    bean: String,
    envelope: String,
    exchange: Exchange,
    reply: Reply,
}

/// 调用调度器
pub struct InvocationDispatcher {
    sender: mpsc::Sender<DispatchRequest>,
    worker: JoinHandle<()>,
}

impl InvocationDispatcher {
    /// 启动工作任务，必须在 tokio 运行时中调用
    pub fn spawn(ctx: Arc<BeanContext>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<DispatchRequest>(capacity.max(1));
        let worker = tokio::spawn(async move {
            tracing::debug!("Invocation dispatcher started");
            while let Some(request) = receiver.recv().await {
                let DispatchRequest {
                    bean,
                    envelope,
                    exchange,
                    reply,
                } = request;
                let result = handle(&ctx, &bean, &envelope, exchange);
                if let Err(e) = &result {
                    tracing::debug!(bean = %bean, error = %e, "Dispatched invocation failed");
                }
                if reply.send(result).is_err() {
                    tracing::trace!(bean = %bean, "Caller dropped before the reply was sent");
                }
            }
            tracing::debug!("Invocation dispatcher stopped");
        });
        Self { sender, worker }
    }

    /// 把调用发送给工作任务并等待结果
    pub async fn dispatch(
        &self,
        bean: &str,
        invocation: &BeanInvocation,
        exchange: Exchange,
    ) -> BeanResult<(Value, Exchange)> {
        let (reply, response) = oneshot::channel();
        let request = DispatchRequest {
            bean: bean.to_string(),
            envelope: invocation.to_json()?,
            exchange,
            reply,
        };
        self.sender
            .send(request)
            .await
            .map_err(|_| BeanError::DispatcherClosed)?;
        response.await.map_err(|_| BeanError::DispatcherClosed)?
    }

    /// 关闭通道并等待已排队的调用处理完
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.worker.await {
            tracing::warn!(error = %e, "Invocation dispatcher worker failed");
        }
    }
}

fn handle(ctx: &BeanContext, bean: &str, envelope: &str, mut exchange: Exchange) -> BeanResult<(Value, Exchange)> {
    let invocation = BeanInvocation::from_json(envelope)?;
    let managed = ctx.beans().managed(bean)?;
    // 原型实例只用一次，不参与生命周期
    if ctx.beans().is_singleton(bean)? {
        managed.ensure_started()?;
    }
    let value = invocation.invoke(ctx, managed.instance(), &mut exchange)?;
    Ok((value, exchange))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::MethodRef;
    use crate::test_support::*;
    use beanbind_core::Scope;
    use std::sync::atomic::Ordering;

    fn tick() -> BeanInvocation {
        BeanInvocation::new(
            MethodRef {
                class_name: "Counter".into(),
                method_name: "tick".into(),
                parameter_types: vec!["String".into()],
            },
            vec![Value::from("tick")],
        )
    }

    #[tokio::test]
    async fn test_dispatch_round_trip() {
        let fixture = Fixture::new();
        fixture.ctx.register_bean("myBean", "MyBean", Scope::Singleton).unwrap();
        let dispatcher = InvocationDispatcher::spawn(Arc::clone(&fixture.ctx), 8);

        let invocation = BeanInvocation::new(
            MethodRef {
                class_name: "MyBean".into(),
                method_name: "concat".into(),
                parameter_types: vec!["String".into(), "String".into()],
            },
            vec![Value::from("Hello"), Value::from("Camel")],
        );
        let (value, exchange) = dispatcher
            .dispatch("myBean", &invocation, Exchange::new("ignored"))
            .await
            .unwrap();
        assert_eq!(value, Value::from("Hello=Camel"));
        assert_eq!(exchange.result_body(), &Value::from("Hello=Camel"));

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_shares_singleton() {
        let fixture = Fixture::new();
        let probe = LifecycleProbe::default();
        fixture.register_counter_bean("counter", Scope::Singleton, &probe);
        let dispatcher = Arc::new(InvocationDispatcher::spawn(Arc::clone(&fixture.ctx), 2));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move { dispatcher.dispatch("counter", &tick(), Exchange::new("tick")).await })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            let (value, _) = handle.await.unwrap().unwrap();
            results.push(value.as_i64().unwrap());
        }
        results.sort();
        assert_eq!(results, (1..=10).collect::<Vec<_>>());
        assert_eq!(probe.created.load(Ordering::SeqCst), 1);
        assert_eq!(probe.started.load(Ordering::SeqCst), 1);

        fixture.ctx.shutdown();
        assert_eq!(probe.stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prototype_instances_are_not_started() {
        let fixture = Fixture::new();
        let probe = LifecycleProbe::default();
        fixture.register_counter_bean("counter", Scope::Prototype, &probe);
        let dispatcher = InvocationDispatcher::spawn(Arc::clone(&fixture.ctx), 4);

        for _ in 0..3 {
            let (value, _) = dispatcher
                .dispatch("counter", &tick(), Exchange::new("tick"))
                .await
                .unwrap();
            assert_eq!(value, Value::Int(1));
        }
        dispatcher.shutdown().await;
        fixture.ctx.shutdown();

        assert_eq!(probe.created.load(Ordering::SeqCst), 3);
        assert_eq!(probe.started.load(Ordering::SeqCst), 0);
        assert_eq!(probe.stopped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_errors_are_replied() {
        let fixture = Fixture::new();
        let dispatcher = InvocationDispatcher::spawn(Arc::clone(&fixture.ctx), 1);

        let err = dispatcher
            .dispatch("missing", &tick(), Exchange::new("tick"))
            .await
            .unwrap_err();
        assert!(matches!(err, BeanError::Registry(_)));

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_dispatcher() {
        let fixture = Fixture::new();
        let mut dispatcher = InvocationDispatcher::spawn(Arc::clone(&fixture.ctx), 1);
        dispatcher.worker.abort();
        let _ = (&mut dispatcher.worker).await;

        let err = dispatcher
            .dispatch("counter", &tick(), Exchange::new("tick"))
            .await
            .unwrap_err();
        assert!(matches!(err, BeanError::DispatcherClosed));
    }
}
