//! 待投递事件（PendingEvent）及其组成部分
//!
//! - `Sender`：事件发出方，按身份比较；
//! - `Args`：具名参数，保留插入顺序供投递使用；
//! - `PendingEvent`：在作用域内触发、等待提交后投递的不可变记录。
//!
use crate::signal::Signal;
use serde_json::Value;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 具名参数（`serde_json` 开启 `preserve_order`，迭代顺序即插入顺序）
pub type Args = serde_json::Map<String, Value>;

/// 以 `"key" => value` 形式构造 `Args`
///
/// ```rust
/// use atomic_dispatch::args;
///
/// let args = args! { "order_id" => 42, "state" => "paid" };
/// assert_eq!(args.keys().collect::<Vec<_>>(), ["order_id", "state"]);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::pending::Args::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::pending::Args::new();
        $(
            map.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        map
    }};
}

/// 事件发出方，按身份比较：类型看 `TypeId`，静态名称看字符串，运行时对象看指针
#[derive(Clone, Default)]
pub enum Sender {
    Type {
        id: TypeId,
        name: &'static str,
    },
    Named(&'static str),
    Instance {
        object: Arc<dyn Any + Send + Sync>,
        name: &'static str,
    },
    #[default]
    Anonymous,
}

impl Sender {
    /// 以 Rust 类型作为发出方
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn named(name: &'static str) -> Self {
        Self::Named(name)
    }

    /// 以运行时对象作为发出方，只与同一个 `Arc` 的克隆相等
    pub fn instance<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Self::Instance {
            object,
            name: type_name::<T>(),
        }
    }

    /// 发出方为运行时对象且类型匹配时返回该对象
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Instance { object, .. } => object.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Type { name, .. } | Self::Instance { name, .. } => name,
            Self::Named(name) => name,
            Self::Anonymous => "<anonymous>",
        }
    }
}

impl PartialEq for Sender {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Type { id: a, .. }, Self::Type { id: b, .. }) => a == b,
            (Self::Named(a), Self::Named(b)) => a == b,
            (Self::Instance { object: a, .. }, Self::Instance { object: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            (Self::Anonymous, Self::Anonymous) => true,
            _ => false,
        }
    }
}

impl Eq for Sender {}

impl Hash for Sender {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Type { id, .. } => id.hash(state),
            Self::Named(name) => name.hash(state),
            Self::Instance { object, .. } => Arc::as_ptr(object).cast::<()>().hash(state),
            Self::Anonymous => {}
        }
    }
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { name, .. } => write!(f, "Sender::Type({name})"),
            Self::Named(name) => write!(f, "Sender::Named({name})"),
            Self::Instance { object, name } => {
                write!(f, "Sender::Instance({name}@{:p})", Arc::as_ptr(object).cast::<()>())
            }
            Self::Anonymous => f.write_str("Sender::Anonymous"),
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 待投递事件，构造后不可变
#[derive(Clone, Debug)]
pub struct PendingEvent {
    signal: Signal,
    sender: Sender,
    args: Args,
    robust: bool,
}

impl PendingEvent {
    pub fn new(signal: Signal, sender: Sender, args: Args, robust: bool) -> Self {
        Self {
            signal,
            sender,
            args,
            robust,
        }
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// 投递时是否捕获接收器失败（而非向上传播）
    pub fn is_robust(&self) -> bool {
        self.robust
    }

    /// 本事件是否应取代已排队的 `queued`：类型相同且该类型的策略判定成立
    pub fn supersedes(&self, queued: &PendingEvent) -> bool {
        if self.signal != queued.signal {
            return false;
        }
        self.signal
            .replacement_policy()
            .is_some_and(|policy| policy.replaces(&self.args, &queued.args))
    }
}

impl fmt::Display for PendingEvent {
    /// 形如 `order_changed(Order, id=1, state="paid")`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.signal.name(), self.sender)?;
        for (key, value) in &self.args {
            write!(f, ", {key}={value}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ReplacementPolicy;

    struct Order;

    // 测试发出方身份比较
    #[test]
    fn test_sender_identity() {
        assert_eq!(Sender::of::<Order>(), Sender::of::<Order>());
        assert_ne!(Sender::of::<Order>(), Sender::of::<String>());
        assert_ne!(Sender::named("Order"), Sender::of::<Order>());
        assert_eq!(Sender::default(), Sender::Anonymous);
        assert!(Sender::of::<Order>().name().ends_with("Order"));
    }

    // 测试运行时对象发出方按指针比较
    #[test]
    fn test_instance_sender_identity() {
        let first = Arc::new(Order);
        let second = Arc::new(Order);

        let a = Sender::instance(first.clone());
        assert_eq!(a, Sender::instance(first));
        assert_ne!(a, Sender::instance(second));
        assert_ne!(a, Sender::of::<Order>());
        assert!(a.name().ends_with("Order"));
        assert!(a.downcast_ref::<Order>().is_some());
        assert!(a.downcast_ref::<String>().is_none());
        assert!(Sender::of::<Order>().downcast_ref::<Order>().is_none());

        let mut set = std::collections::HashSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        assert_eq!(set.len(), 1);
    }

    // 测试参数宏保留插入顺序
    #[test]
    fn test_args_preserve_order() {
        let args = args! { "z" => 1, "a" => "x", "m" => true };
        let keys: Vec<&str> = args.keys().map(String::as_str).collect();

        assert_eq!(keys, ["z", "a", "m"]);
        assert!(args! {}.is_empty());
    }

    // 测试事件描述
    #[test]
    fn test_display() {
        let signal = Signal::new("order_changed");
        let event = PendingEvent::new(
            signal.clone(),
            Sender::named("Order"),
            args! { "id" => 1, "state" => "paid" },
            false,
        );
        assert_eq!(event.to_string(), "order_changed(Order, id=1, state=\"paid\")");

        let bare = PendingEvent::new(signal, Sender::Anonymous, args! {}, true);
        assert_eq!(bare.to_string(), "order_changed(<anonymous>)");
        assert!(bare.is_robust());
    }

    // 测试取代判定：无策略、不同类型、策略成立
    #[test]
    fn test_supersedes() {
        let plain = Signal::new("plain");
        let keyed = Signal::with_replacement("keyed", ReplacementPolicy::matching_keys(["a"]));
        let other_keyed = Signal::with_replacement("keyed", ReplacementPolicy::matching_keys(["a"]));

        let ev = |s: &Signal, a: i64| PendingEvent::new(s.clone(), Sender::Anonymous, args! { "a" => a }, false);

        assert!(!ev(&plain, 1).supersedes(&ev(&plain, 1)));
        assert!(ev(&keyed, 1).supersedes(&ev(&keyed, 1)));
        assert!(!ev(&keyed, 1).supersedes(&ev(&keyed, 2)));
        assert!(!ev(&keyed, 1).supersedes(&ev(&other_keyed, 1)));
    }
}
