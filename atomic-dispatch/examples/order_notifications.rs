/// 事务感知信号示例
/// 展示订单状态变更在嵌套事务中的延迟投递、回滚丢弃与同一订单的通知合并
use anyhow::Result as AnyResult;
use atomic_dispatch::testing::Recorder;
use atomic_dispatch::{
    Dispatcher, InMemoryPublisher, ReplacementPolicy, Sender, Signal, SignalError, Value, args,
};
use std::fmt;
use std::sync::Arc;

struct Order;

#[derive(Debug)]
enum OrderError {
    OutOfStock,
    Signal(SignalError),
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfStock => f.write_str("out of stock"),
            Self::Signal(err) => write!(f, "{err}"),
        }
    }
}

impl From<SignalError> for OrderError {
    fn from(err: SignalError) -> Self {
        Self::Signal(err)
    }
}

fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("atomic_dispatch=debug"))
        .init();

    // 同一订单的状态变更在一次事务内只通知最新状态
    let state_changed = Signal::with_replacement(
        "order_state_changed",
        ReplacementPolicy::matching_keys(["order_id"]),
    );
    let stock_reserved = Signal::new("stock_reserved");

    let publisher = Arc::new(InMemoryPublisher::new());
    let audit = Recorder::new("audit");
    publisher.connect(&state_changed, audit.clone());
    publisher.connect(&stock_reserved, audit.clone());
    publisher.connect_fn(&state_changed, "mailer", |_, sender, args| {
        println!("[mailer] {sender}: order {} is now {}", args["order_id"], args["state"]);
        Ok(Value::Null)
    });

    let dispatcher = Dispatcher::new(publisher);
    let order = Sender::of::<Order>();

    // 外层事务提交，内层预留库存失败只回滚内层
    let result: Result<(), OrderError> = dispatcher.atomic(|| {
        dispatcher.send(&state_changed, order.clone(), args! { "order_id" => 1, "state" => "created" })?;
        dispatcher.send(&state_changed, order.clone(), args! { "order_id" => 2, "state" => "created" })?;

        let reserved: Result<(), OrderError> = dispatcher.atomic(|| {
            dispatcher.send(&stock_reserved, order.clone(), args! { "order_id" => 2 })?;
            Err(OrderError::OutOfStock)
        });
        println!("reservation for order 2: {reserved:?}");

        dispatcher.send(&state_changed, order.clone(), args! { "order_id" => 1, "state" => "paid" })?;
        println!("pending before commit: {}", dispatcher.pending_len());
        Ok(())
    });

    if let Err(err) = result {
        anyhow::bail!("transaction failed: {err}");
    }

    for delivery in audit.take() {
        println!("[audit] {} {}", delivery.signal, Value::Object(delivery.args));
    }

    Ok(())
}
