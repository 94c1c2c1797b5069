//! 分发器（Dispatcher）
//!
//! 决定一次触发是立即投递还是延迟到事务作用域提交之后：
//! - 当前上下文没有打开的作用域：立即经 `Publisher` 投递并返回结果；
//! - 存在打开的作用域：构造 `PendingEvent` 放入栈顶队列（应用替换策略），返回 `Deferred`。
//!
//! 作用域管理器通过 `on_scope_enter` / `on_scope_exit` 驱动栈的压入、弹出、提升与丢弃；
//! 最外层作用域提交时按最终排队顺序投递，非 robust 投递的第一个失败会立即中止本次投递。
//!
use crate::atomic::{AtomicBlock, ScopeOutcome};
use crate::config::DispatcherConfig;
use crate::error::{SignalError, SignalResult as Result};
use crate::pending::{Args, PendingEvent, Sender};
use crate::publisher::{Publisher, Response, RobustResponse};
use crate::queue::{Enqueued, ScopeQueue};
use crate::signal::Signal;
use crate::stack::{ScopeStack, ScopeStackRegistry};
use bon::Builder;
use std::fmt;
use std::sync::Arc;

/// 一次触发的结果
#[derive(Debug)]
pub enum Dispatched {
    /// 处于事务作用域内，投递被延迟，不会有即时结果
    Deferred,
    /// 已立即以非 robust 方式投递
    Sent(Vec<Response>),
    /// 已立即以 robust 方式投递
    SentRobust(Vec<RobustResponse>),
}

impl Dispatched {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred)
    }
}

// 退出通知在释放注册表借用之后要做的事
enum ExitStep {
    Done,
    Promote {
        child: ScopeQueue,
        index: usize,
        parent: ScopeQueue,
    },
    Drain(ScopeQueue),
}

/// 分发器，可在多个线程间共享（`Arc<Dispatcher>`）
#[derive(Builder)]
pub struct Dispatcher {
    publisher: Arc<dyn Publisher>,
    #[builder(default)]
    registry: Arc<ScopeStackRegistry>,
    #[builder(default)]
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self::builder().publisher(publisher).build()
    }

    pub fn publisher(&self) -> &Arc<dyn Publisher> {
        &self.publisher
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// 触发事件
    ///
    /// 作用域内返回 `Dispatched::Deferred`；否则立即投递，非 robust 时第一个接收器失败向上传播。
    pub fn raise(
        &self,
        signal: &Signal,
        sender: Sender,
        args: Args,
        robust: bool,
    ) -> Result<Dispatched> {
        let event = PendingEvent::new(signal.clone(), sender, args, robust);

        let Some(event) = self.defer(event) else {
            return Ok(Dispatched::Deferred);
        };

        tracing::debug!(event = %event, "dispatching signal immediately");
        self.deliver(&event)
    }

    /// 非 robust 触发
    pub fn send(&self, signal: &Signal, sender: Sender, args: Args) -> Result<Dispatched> {
        self.raise(signal, sender, args, false)
    }

    /// robust 触发：接收器失败只会被捕获并随 `Dispatched::SentRobust` 返回
    pub fn send_robust(&self, signal: &Signal, sender: Sender, args: Args) -> Result<Dispatched> {
        self.raise(signal, sender, args, true)
    }

    /// 作用域进入通知
    pub fn on_scope_enter(&self, block: AtomicBlock) {
        if !block.savepoint {
            return;
        }

        let reset = block.outermost && self.config.reset_on_outermost;

        self.registry.with_current(|stack| {
            if reset && !stack.is_empty() {
                let depth = stack.depth();
                let discarded = stack.reset();
                tracing::warn!(
                    depth,
                    discarded,
                    "outermost scope entered over a leaked scope stack, resetting"
                );
            }
            stack.push();
        });
    }

    /// 作用域退出通知
    ///
    /// 提交时内层作用域的事件提升到父作用域，最外层作用域的事件被依次投递；
    /// 回滚时丢弃该层全部事件。没有配对的进入通知时返回 `SignalError::ScopeUnderflow`。
    pub fn on_scope_exit(&self, block: AtomicBlock, outcome: ScopeOutcome) -> Result<()> {
        if !block.savepoint {
            return Ok(());
        }

        let step = self.registry.with_current(|stack| {
            let Some(queue) = stack.pop() else {
                tracing::error!(?block, ?outcome, "scope exit without a matching enter");
                return Err(SignalError::ScopeUnderflow);
            };

            if block.outermost != stack.is_empty() {
                tracing::warn!(
                    outermost = block.outermost,
                    depth = stack.depth() + 1,
                    "outermost flag disagrees with scope depth"
                );
            }

            match outcome {
                ScopeOutcome::RolledBack => {
                    tracing::debug!(
                        discarded = queue.len(),
                        depth = stack.depth(),
                        "discarding signals of rolled back scope"
                    );
                    Ok(ExitStep::Done)
                }
                ScopeOutcome::Committed => match stack.take_top() {
                    Some((index, parent)) => Ok(ExitStep::Promote {
                        child: queue,
                        index,
                        parent,
                    }),
                    None => Ok(ExitStep::Drain(queue)),
                },
            }
        })?;

        // 以下不再持有注册表借用：替换策略与接收器都可以再次访问分发器
        match step {
            ExitStep::Done => Ok(()),
            ExitStep::Promote {
                child,
                index,
                mut parent,
            } => {
                for event in &child {
                    tracing::debug!(event = %event, "promoting signal to enclosing scope");
                }
                parent.merge(child, self.config.replace_on_promotion);
                self.restore(index, parent);
                Ok(())
            }
            ExitStep::Drain(queue) => self.drain(queue),
        }
    }

    /// 当前上下文打开的作用域层数
    pub fn depth(&self) -> usize {
        self.registry.depth()
    }

    /// 当前上下文各层等待投递的事件总数
    pub fn pending_len(&self) -> usize {
        self.registry.inspect_current(|stack| stack.pending_len())
    }

    // 有打开的作用域时入队并返回 None，否则原样交还事件
    fn defer(&self, event: PendingEvent) -> Option<PendingEvent> {
        let Some((index, mut queue)) = self.registry.with_current(ScopeStack::take_top) else {
            return Some(event);
        };

        tracing::debug!(
            event = %event,
            depth = index + 1,
            "dispatching signal if transaction scope is successful"
        );
        if let Enqueued::Replaced { position } = queue.enqueue(event) {
            tracing::debug!(position, "signal replaced a pending one");
        }
        self.restore(index, queue);
        None
    }

    fn restore(&self, index: usize, queue: ScopeQueue) {
        let pending = queue.len();
        if !self.registry.with_current(|stack| stack.restore(index, queue)) {
            tracing::warn!(
                depth = index + 1,
                pending,
                "scope closed while its queue was detached, dropping signals"
            );
        }
    }

    fn drain(&self, queue: ScopeQueue) -> Result<()> {
        for event in queue {
            tracing::debug!(event = %event, "dispatching signal as outermost scope committed");
            self.deliver(&event)?;
        }
        Ok(())
    }

    fn deliver(&self, event: &PendingEvent) -> Result<Dispatched> {
        if event.is_robust() {
            Ok(Dispatched::SentRobust(self.publisher.send_robust(
                event.signal(),
                event.sender(),
                event.args(),
            )))
        } else {
            self.publisher
                .send(event.signal(), event.sender(), event.args())
                .map(Dispatched::Sent)
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
