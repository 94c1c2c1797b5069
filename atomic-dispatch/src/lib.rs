//! 事务感知的延迟信号分发（atomic-dispatch）
//!
//! 在事务作用域内触发的信号不会立即投递，而是：
//! - 内层作用域提交时提升到外层作用域；
//! - 任一层作用域回滚时随该层一并丢弃；
//! - 最外层作用域提交后按最终排队顺序投递。
//!
//! 事件类型可挂载替换策略（`ReplacementPolicy`），同一作用域内语义等价的新事件
//! 原位取代尚未投递的旧事件，避免一次事务中重复通知。
//!
//! 典型用法：
//! 1. 定义 `Signal`，需要去重时以 `Signal::with_replacement` 挂载策略；
//! 2. 在 `InMemoryPublisher`（或自定义 `Publisher`）上连接接收器；
//! 3. 用发布器构建 `Dispatcher`，由事务管理器调用 `on_scope_enter/on_scope_exit`，
//!    或直接使用 `Dispatcher::atomic` 包裹一段业务逻辑；
//! 4. 业务代码通过 `Dispatcher::send/send_robust/raise` 触发信号。
//!
pub mod atomic;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pending;
pub mod policy;
pub mod publisher;
pub mod queue;
pub mod signal;
pub mod stack;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use atomic::{AtomicBlock, ScopeOutcome};
pub use config::DispatcherConfig;
pub use dispatcher::{Dispatched, Dispatcher};
pub use error::{SignalError, SignalResult};
pub use pending::{Args, PendingEvent, Sender};
pub use policy::ReplacementPolicy;
pub use publisher::{
    FnReceiver, InMemoryPublisher, Publisher, Receiver, ReceiverId, Response, RobustResponse,
};
pub use queue::{Enqueued, ScopeQueue};
pub use serde_json::{Value, json};
pub use signal::{Signal, SignalId};
pub use stack::{ScopeStack, ScopeStackRegistry};
