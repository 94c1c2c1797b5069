//! 发布/订阅接缝（Publisher）
//!
//! 分发器只通过 `Publisher` 协议把事件交给订阅方：
//! - `send`：按连接顺序调用接收器，第一个失败立即中止并向上传播；
//! - `send_robust`：逐个接收器捕获失败并随结果返回，不中止后续接收器。
//!
//! `InMemoryPublisher` 是基于 `DashMap` 的进程内实现，接收器按信号登记。
//!
use crate::error::{SignalError, SignalResult as Result};
use crate::pending::{Args, Sender};
use crate::signal::{Signal, SignalId};
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 接收器：消费某个信号的回调
pub trait Receiver: Send + Sync {
    /// 接收器名称（用于日志与错误信息）
    fn receiver_name(&self) -> &str;
    /// 处理一次投递
    fn receive(&self, signal: &Signal, sender: &Sender, args: &Args) -> anyhow::Result<Value>;
}

/// 以闭包实现的接收器
pub struct FnReceiver<F> {
    name: String,
    f: F,
}

impl<F> FnReceiver<F>
where
    F: Fn(&Signal, &Sender, &Args) -> anyhow::Result<Value> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Receiver for FnReceiver<F>
where
    F: Fn(&Signal, &Sender, &Args) -> anyhow::Result<Value> + Send + Sync,
{
    fn receiver_name(&self) -> &str {
        &self.name
    }

    fn receive(&self, signal: &Signal, sender: &Sender, args: &Args) -> anyhow::Result<Value> {
        (self.f)(signal, sender, args)
    }
}

/// 非 robust 投递中单个接收器的返回值
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub receiver: String,
    pub value: Value,
}

/// robust 投递中单个接收器的结果（返回值或被捕获的失败）
#[derive(Debug)]
pub struct RobustResponse {
    pub receiver: String,
    pub outcome: anyhow::Result<Value>,
}

impl RobustResponse {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// 发布/订阅协议
pub trait Publisher: Send + Sync {
    fn send(&self, signal: &Signal, sender: &Sender, args: &Args) -> Result<Vec<Response>>;

    fn send_robust(&self, signal: &Signal, sender: &Sender, args: &Args) -> Vec<RobustResponse>;
}

/// 连接标识，用于断开
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReceiverId(u64);

#[derive(Clone)]
struct Connection {
    id: ReceiverId,
    // None 表示接收任意发出方
    sender: Option<Sender>,
    receiver: Arc<dyn Receiver>,
}

impl Connection {
    fn accepts(&self, sender: &Sender) -> bool {
        self.sender.as_ref().is_none_or(|expected| expected == sender)
    }
}

/// 进程内发布器
#[derive(Default)]
pub struct InMemoryPublisher {
    connections: DashMap<SignalId, Vec<Connection>>,
    next_id: AtomicU64,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 连接接收器，接收该信号来自任意发出方的投递
    pub fn connect(&self, signal: &Signal, receiver: Arc<dyn Receiver>) -> ReceiverId {
        self.register(signal, None, receiver)
    }

    /// 连接接收器，仅接收来自 `sender` 的投递
    pub fn connect_from(
        &self,
        signal: &Signal,
        sender: Sender,
        receiver: Arc<dyn Receiver>,
    ) -> ReceiverId {
        self.register(signal, Some(sender), receiver)
    }

    /// 以闭包连接接收器
    pub fn connect_fn<F>(&self, signal: &Signal, name: impl Into<String>, f: F) -> ReceiverId
    where
        F: Fn(&Signal, &Sender, &Args) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.connect(signal, Arc::new(FnReceiver::new(name, f)))
    }

    /// 断开连接，返回是否确实移除了接收器
    pub fn disconnect(&self, signal: &Signal, id: ReceiverId) -> bool {
        let Some(mut list) = self.connections.get_mut(&signal.id()) else {
            return false;
        };
        let before = list.len();
        list.retain(|c| c.id != id);
        before != list.len()
    }

    pub fn receiver_count(&self, signal: &Signal) -> usize {
        self.connections
            .get(&signal.id())
            .map(|list| list.len())
            .unwrap_or_default()
    }

    fn register(
        &self,
        signal: &Signal,
        sender: Option<Sender>,
        receiver: Arc<dyn Receiver>,
    ) -> ReceiverId {
        let id = ReceiverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections
            .entry(signal.id())
            .or_default()
            .push(Connection {
                id,
                sender,
                receiver,
            });
        id
    }

    // 先取快照再释放分片锁，接收器内部可以继续连接/断开或触发信号
    fn live_receivers(&self, signal: &Signal, sender: &Sender) -> Vec<Arc<dyn Receiver>> {
        self.connections
            .get(&signal.id())
            .map(|list| {
                list.iter()
                    .filter(|c| c.accepts(sender))
                    .map(|c| c.receiver.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Publisher for InMemoryPublisher {
    fn send(&self, signal: &Signal, sender: &Sender, args: &Args) -> Result<Vec<Response>> {
        let receivers = self.live_receivers(signal, sender);
        let mut responses = Vec::with_capacity(receivers.len());

        for receiver in receivers {
            let value = receiver.receive(signal, sender, args).map_err(|source| {
                SignalError::receiver(signal.name(), receiver.receiver_name(), source)
            })?;
            responses.push(Response {
                receiver: receiver.receiver_name().to_string(),
                value,
            });
        }

        Ok(responses)
    }

    fn send_robust(&self, signal: &Signal, sender: &Sender, args: &Args) -> Vec<RobustResponse> {
        self.live_receivers(signal, sender)
            .into_iter()
            .map(|receiver| {
                let outcome = receiver.receive(signal, sender, args);
                if let Err(err) = &outcome {
                    tracing::warn!(
                        signal = signal.name(),
                        receiver = receiver.receiver_name(),
                        error = %err,
                        "receiver failed during robust dispatch"
                    );
                }
                RobustResponse {
                    receiver: receiver.receiver_name().to_string(),
                    outcome,
                }
            })
            .collect()
    }
}

impl fmt::Debug for InMemoryPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryPublisher")
            .field("signals", &self.connections.len())
            .finish()
    }
}
