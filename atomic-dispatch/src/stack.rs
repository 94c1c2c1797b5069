//! 作用域栈（ScopeStack）与按执行上下文隔离的注册表（ScopeStackRegistry）
//!
//! 每个执行上下文（本 crate 中即一个 OS 线程）独占一个作用域栈，栈深度等于当前
//! 打开的嵌套事务作用域数量。栈保存在 `thread_local!` 槽中，上下文之间没有共享锁；
//! 线程退出时其栈随线程局部存储一并释放。同一线程上的多个注册表以注册表 ID 区分。
//!
use crate::queue::ScopeQueue;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CONTEXT_STACKS: RefCell<HashMap<u64, ContextStack>> = RefCell::new(HashMap::new());
}

/// 单个执行上下文的作用域栈
#[derive(Clone, Debug, Default)]
pub struct ScopeStack {
    queues: Vec<ScopeQueue>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// 进入新作用域
    pub fn push(&mut self) {
        self.queues.push(ScopeQueue::new());
    }

    /// 离开当前作用域，返回其队列
    pub fn pop(&mut self) -> Option<ScopeQueue> {
        self.queues.pop()
    }

    pub fn top(&self) -> Option<&ScopeQueue> {
        self.queues.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut ScopeQueue> {
        self.queues.last_mut()
    }

    /// 取出栈顶队列，原位留下空队列（深度不变），返回 (层号, 队列)
    pub fn take_top(&mut self) -> Option<(usize, ScopeQueue)> {
        let index = self.queues.len().checked_sub(1)?;
        Some((index, std::mem::take(&mut self.queues[index])))
    }

    /// 放回 `take_top` 取出的队列；取出期间该层新入队的事件追加在其后
    ///
    /// 该层已不存在时返回 false。
    pub fn restore(&mut self, index: usize, queue: ScopeQueue) -> bool {
        let Some(slot) = self.queues.get_mut(index) else {
            return false;
        };
        let added = std::mem::replace(slot, queue);
        slot.merge(added, false);
        true
    }

    /// 清空整个栈，返回被丢弃的事件数
    pub fn reset(&mut self) -> usize {
        let discarded = self.pending_len();
        self.queues.clear();
        discarded
    }

    /// 各层队列中等待投递的事件总数
    pub fn pending_len(&self) -> usize {
        self.queues.iter().map(ScopeQueue::len).sum()
    }
}

// 线程局部存储中的栈，存在期间计入所属注册表的 open 计数
struct ContextStack {
    stack: ScopeStack,
    open: Arc<AtomicUsize>,
}

impl ContextStack {
    fn new(open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::Relaxed);
        Self {
            stack: ScopeStack::new(),
            open,
        }
    }
}

impl Drop for ContextStack {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::Relaxed);
    }
}

/// 执行上下文 -> 作用域栈
#[derive(Debug)]
pub struct ScopeStackRegistry {
    id: u64,
    open: Arc<AtomicUsize>,
}

impl Default for ScopeStackRegistry {
    fn default() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            open: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ScopeStackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以可变方式访问当前上下文的栈（不存在则创建）
    ///
    /// 闭包执行期间持有线程局部的可变借用，闭包内不得运行外部代码
    /// （接收器、替换策略）或再次访问注册表。
    pub fn with_current<R>(&self, f: impl FnOnce(&mut ScopeStack) -> R) -> R {
        CONTEXT_STACKS.with(|stacks| {
            let mut stacks = stacks.borrow_mut();
            let context = stacks
                .entry(self.id)
                .or_insert_with(|| ContextStack::new(self.open.clone()));

            let result = f(&mut context.stack);
            if context.stack.is_empty() {
                stacks.remove(&self.id);
            }
            result
        })
    }

    /// 只读访问当前上下文的栈，不会创建条目
    pub fn inspect_current<R>(&self, f: impl FnOnce(&ScopeStack) -> R) -> R {
        CONTEXT_STACKS.with(|stacks| {
            let stacks = stacks.borrow();
            match stacks.get(&self.id) {
                Some(context) => f(&context.stack),
                None => f(&ScopeStack::default()),
            }
        })
    }

    /// 当前上下文打开的作用域层数
    pub fn depth(&self) -> usize {
        self.inspect_current(ScopeStack::depth)
    }

    /// 持有打开作用域的上下文数量（线程退出后其栈不再计入）
    pub fn open_contexts(&self) -> usize {
        self.open.load(Ordering::Relaxed)
    }
}
