//! 统一错误定义
//!
//! 排队、提升与替换均为纯数据移动，不会失败；
//! 失败面只有两处：接收器调用失败（非 robust 投递时向上传播）与作用域协议被误用。
//!
use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SignalError {
    /// 非 robust 投递时第一个失败的接收器
    #[error("receiver failed: signal={signal}, receiver={receiver}: {source}")]
    Receiver {
        signal: String,
        receiver: String,
        #[source]
        source: anyhow::Error,
    },

    /// 没有与之配对的 enter 就收到了 exit
    #[error("scope underflow: exit notified without a matching enter")]
    ScopeUnderflow,
}

impl SignalError {
    pub fn receiver(
        signal: impl Into<String>,
        receiver: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        Self::Receiver {
            signal: signal.into(),
            receiver: receiver.into(),
            source,
        }
    }

    pub fn is_receiver(&self) -> bool {
        matches!(self, Self::Receiver { .. })
    }
}

/// 统一 Result 类型别名
pub type SignalResult<T> = Result<T, SignalError>;
