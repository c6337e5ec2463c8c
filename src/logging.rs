// ==========================================
// OPME 对账报表 - 日志初始化
// ==========================================
// 输出: tracing-subscriber（文本 / JSON 两种格式）
// 过滤: RUST_LOG 优先，未设置时使用 DEFAULT_DIRECTIVES
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 未设置 RUST_LOG 时的过滤指令
///
/// 本 crate 输出 info 及以上，依赖库只输出 warn 及以上
pub const DEFAULT_DIRECTIVES: &str = "warn,opme_report=info";

fn env_or_default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// 初始化文本日志
///
/// # 环境变量
/// - RUST_LOG: 例如 `RUST_LOG=opme_report=trace` 可看到单元格回退默认值的记录
///
/// # 示例
/// ```no_run
/// opme_report::logging::init();
/// ```
pub fn init() {
    fmt()
        .with_env_filter(env_or_default_filter())
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// 初始化 JSON 日志（每行一个事件，带当前 span 字段）
pub fn init_json() {
    fmt()
        .json()
        .with_env_filter(env_or_default_filter())
        .with_current_span(true)
        .init();
}

/// 测试用日志（debug 级别，输出交给测试框架捕获，可重复调用）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("opme_report=debug"))
        .with_test_writer()
        .try_init();
}
