//! 分发器配置
//!
/// 分发器配置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// 内层作用域提交、事件提升至父作用域时，是否对父队列重新应用替换策略
    pub replace_on_promotion: bool,
    /// 进入最外层作用域时是否清空当前上下文遗留的作用域栈
    pub reset_on_outermost: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            replace_on_promotion: true,
            reset_on_outermost: true,
        }
    }
}
