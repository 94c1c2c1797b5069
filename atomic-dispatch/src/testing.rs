//! 测试辅助：记录每次投递的接收器
//!
use crate::pending::{Args, Sender};
use crate::publisher::Receiver;
use crate::signal::{Signal, SignalId};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 一次被记录的投递
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    pub signal_id: SignalId,
    pub signal: String,
    pub sender: Sender,
    pub args: Args,
}

/// 按到达顺序记录投递
#[derive(Debug, Default)]
pub struct Recorder {
    name: String,
    deliveries: Mutex<Vec<Delivery>>,
}

impl Recorder {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            deliveries: Mutex::new(Vec::new()),
        })
    }

    /// 已记录的投递（副本）
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.lock().clone()
    }

    /// 取出并清空已记录的投递
    pub fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Delivery>> {
        self.deliveries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Receiver for Recorder {
    fn receiver_name(&self) -> &str {
        &self.name
    }

    fn receive(&self, signal: &Signal, sender: &Sender, args: &Args) -> anyhow::Result<Value> {
        self.lock().push(Delivery {
            signal_id: signal.id(),
            signal: signal.name().to_string(),
            sender: sender.clone(),
            args: args.clone(),
        });
        Ok(Value::Null)
    }
}
