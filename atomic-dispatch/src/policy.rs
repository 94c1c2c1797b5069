//! 替换策略（ReplacementPolicy）
//!
//! 按事件类型挂载的谓词：判断新触发的事件是否应取代同一作用域内、
//! 同一类型且尚未投递的旧事件。谓词只比较参数，不做结构相等判断。
//!
use crate::pending::Args;
use std::fmt;
use std::sync::Arc;

type PolicyFn = Arc<dyn Fn(&Args, &Args) -> bool + Send + Sync>;

/// 替换策略
#[derive(Clone)]
pub struct ReplacementPolicy {
    predicate: PolicyFn,
    description: String,
}

impl ReplacementPolicy {
    /// 以任意谓词构建策略，参数依次为（新事件参数，已排队事件参数）
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Args, &Args) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            description: "custom".to_string(),
        }
    }

    /// 当给定的全部参数在两个事件中都存在且相等时替换
    pub fn matching_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let description = format!("matching_keys({})", keys.join(", "));

        let predicate = move |incoming: &Args, queued: &Args| {
            keys.iter().all(|key| match (incoming.get(key), queued.get(key)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            })
        };

        Self {
            predicate: Arc::new(predicate),
            description,
        }
    }

    /// 新事件 `incoming` 是否取代已排队的 `queued`
    pub fn replaces(&self, incoming: &Args, queued: &Args) -> bool {
        (self.predicate)(incoming, queued)
    }
}

impl fmt::Debug for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReplacementPolicy")
            .field(&self.description)
            .finish()
    }
}
