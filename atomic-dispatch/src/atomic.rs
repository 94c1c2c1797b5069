//! 事务作用域通知与闭包式作用域辅助
//!
//! 作用域管理器以 `AtomicBlock` + `ScopeOutcome` 通知分发器；对于没有外部事务管理器的场景，
//! `Dispatcher::atomic` 会成对发出进入/退出通知：闭包返回 `Ok` 视为提交，
//! 返回 `Err` 或发生 panic 视为回滚。
//!
use crate::dispatcher::Dispatcher;
use crate::error::SignalError;

/// 一次作用域进入/退出通知携带的信息
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtomicBlock {
    /// 是否为当前上下文的最外层作用域
    pub outermost: bool,
    /// 是否为真正带 savepoint 的作用域；否则通知被忽略
    pub savepoint: bool,
}

impl AtomicBlock {
    pub fn outermost() -> Self {
        Self {
            outermost: true,
            savepoint: true,
        }
    }

    pub fn nested() -> Self {
        Self {
            outermost: false,
            savepoint: true,
        }
    }

    pub fn without_savepoint(outermost: bool) -> Self {
        Self {
            outermost,
            savepoint: false,
        }
    }
}

/// 作用域退出结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeOutcome {
    Committed,
    RolledBack,
}

impl ScopeOutcome {
    pub fn from_success(successful: bool) -> Self {
        if successful {
            Self::Committed
        } else {
            Self::RolledBack
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}

// 未显式关闭即被 drop（闭包 panic）时按回滚退出
struct ScopeGuard<'a> {
    dispatcher: &'a Dispatcher,
    block: AtomicBlock,
    armed: bool,
}

impl ScopeGuard<'_> {
    fn close(mut self, outcome: ScopeOutcome) -> Result<(), SignalError> {
        self.armed = false;
        self.dispatcher.on_scope_exit(self.block, outcome)
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = self
            .dispatcher
            .on_scope_exit(self.block, ScopeOutcome::RolledBack)
        {
            tracing::error!(error = %err, "failed to roll back scope on unwind");
        }
    }
}

impl Dispatcher {
    /// 在一个带 savepoint 的作用域中执行 `f`
    ///
    /// ```rust
    /// use atomic_dispatch::{Dispatcher, InMemoryPublisher, Sender, Signal, SignalError, args};
    /// use std::sync::Arc;
    ///
    /// let dispatcher = Dispatcher::new(Arc::new(InMemoryPublisher::new()));
    /// let saved = Signal::new("saved");
    ///
    /// let value = dispatcher.atomic(|| {
    ///     dispatcher.send(&saved, Sender::named("Order"), args! { "id" => 1 })?;
    ///     Ok::<_, SignalError>(42)
    /// })?;
    /// assert_eq!(value, 42);
    /// # Ok::<(), SignalError>(())
    /// ```
    pub fn atomic<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<SignalError>,
    {
        self.atomic_with(true, f)
    }

    /// 同 `atomic`，`savepoint` 为假时模拟不带 savepoint 的作用域（不影响信号排队）
    pub fn atomic_with<T, E, F>(&self, savepoint: bool, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<SignalError>,
    {
        let block = AtomicBlock {
            outermost: self.depth() == 0,
            savepoint,
        };
        self.on_scope_enter(block);

        let guard = ScopeGuard {
            dispatcher: self,
            block,
            armed: true,
        };

        match f() {
            Ok(value) => {
                guard.close(ScopeOutcome::Committed)?;
                Ok(value)
            }
            Err(err) => {
                guard.close(ScopeOutcome::RolledBack)?;
                Err(err)
            }
        }
    }
}
