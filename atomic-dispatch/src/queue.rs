//! 作用域队列（ScopeQueue）
//!
//! 记录在某一层事务作用域内直接触发的全部事件。除替换外只追加：
//! 取代旧事件的新事件落在旧事件原来的位置上，与无关事件的相对顺序不变。
//!
use crate::pending::PendingEvent;

/// 入队结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueued {
    /// 追加到队尾
    Appended,
    /// 取代了 `position` 处的旧事件
    Replaced { position: usize },
}

/// 单层作用域的事件队列
#[derive(Clone, Debug, Default)]
pub struct ScopeQueue {
    events: Vec<PendingEvent>,
}

impl ScopeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按替换策略入队
    ///
    /// 从最早的事件开始扫描，至多取代第一个匹配项；无策略或无匹配则追加。
    pub fn enqueue(&mut self, event: PendingEvent) -> Enqueued {
        match self.events.iter().position(|queued| event.supersedes(queued)) {
            Some(position) => {
                self.events[position] = event;
                Enqueued::Replaced { position }
            }
            None => {
                self.events.push(event);
                Enqueued::Appended
            }
        }
    }

    /// 不做替换判断，直接追加
    pub fn push(&mut self, event: PendingEvent) {
        self.events.push(event);
    }

    /// 将子作用域的队列按顺序并入本队列
    ///
    /// `replace` 为真时，每个子事件都像在本作用域中新触发一样应用替换策略。
    pub fn merge(&mut self, child: ScopeQueue, replace: bool) {
        for event in child {
            if replace {
                self.enqueue(event);
            } else {
                self.push(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PendingEvent> {
        self.events.iter()
    }
}

impl IntoIterator for ScopeQueue {
    type Item = PendingEvent;
    type IntoIter = std::vec::IntoIter<PendingEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a ScopeQueue {
    type Item = &'a PendingEvent;
    type IntoIter = std::slice::Iter<'a, PendingEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
