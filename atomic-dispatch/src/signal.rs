//! 信号（Signal）：事件类型的身份
//!
//! 每个 `Signal` 拥有进程内唯一的 `SignalId`，相等与哈希只看该 ID；
//! 替换策略在构造时挂载，之后不可更改。
//!
use crate::policy::ReplacementPolicy;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(1);

/// 信号唯一标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    fn next() -> Self {
        Self(NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal#{}", self.0)
    }
}

/// 事件类型句柄，克隆开销为一次 `Arc` 计数
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    id: SignalId,
    name: String,
    policy: Option<ReplacementPolicy>,
}

impl Signal {
    /// 创建不带替换策略的信号
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// 创建带替换策略的信号
    pub fn with_replacement(name: impl Into<String>, policy: ReplacementPolicy) -> Self {
        Self::build(name.into(), Some(policy))
    }

    fn build(name: String, policy: Option<ReplacementPolicy>) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SignalId::next(),
                name,
                policy,
            }),
        }
    }

    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn replacement_policy(&self) -> Option<&ReplacementPolicy> {
        self.inner.policy.as_ref()
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Signal {}

impl Hash for Signal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    // 测试同名信号仍是不同身份
    #[test]
    fn test_identity_is_not_name() {
        let a = Signal::new("order_changed");
        let b = Signal::new("order_changed");

        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
        assert_eq!(a, a.clone());
    }

    // 测试哈希与相等一致
    #[test]
    fn test_hash_by_id() {
        let a = Signal::new("a");
        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        set.insert(Signal::new("a"));

        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }

    // 测试策略在构造时挂载
    #[test]
    fn test_policy_attached_at_construction() {
        let plain = Signal::new("plain");
        let replacing = Signal::with_replacement("replacing", ReplacementPolicy::matching_keys(["id"]));

        assert!(plain.replacement_policy().is_none());
        assert!(replacing.replacement_policy().is_some());
        assert_eq!(replacing.to_string(), "replacing");
    }
}
