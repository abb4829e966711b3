use tracing_subscriber::EnvFilter;

/** \brief 未设置 RUST_LOG 时使用的默认过滤规则。 */
pub const DEFAULT_FILTER: &str = "info";

/**
 * \brief 初始化全局 tracing 订阅者，过滤规则取自 RUST_LOG。
 * 重复调用时保持第一次的设置。
 */
pub fn init() {
    init_with(DEFAULT_FILTER);
}

pub fn init_with(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
