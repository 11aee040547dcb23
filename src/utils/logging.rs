//! 日志工具模块
//!
//! 提供日志初始化、运行日志文件头和统计横幅

use anyhow::Result;
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅者
///
/// 过滤规则读取 `RUST_LOG`，未设置时为 `info`（`verbose` 时为 `debug`）
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // 重复初始化（如测试中）时忽略错误
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n评分运行日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(max_concurrent: usize, handlers: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 并发评分模式");
    info!("📊 最大并发数: {}", max_concurrent);
    info!("🧩 已注册处理器: {}", handlers);
    info!("{}", "=".repeat(60));
}

/// 记录提交加载信息
pub fn log_submissions_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 个待评分的提交", total);
    info!("📋 将以每批 {} 个的方式处理", max_concurrent);
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `total_batches`: 批次总数
/// - `start`: 起始提交编号
/// - `end`: 结束提交编号
/// - `total`: 提交总数
pub fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批提交: {}-{} / 共 {} 个", start, end, total);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(batch_num: usize, graded: usize, rejected: usize, failed: usize) {
    info!("{}", "─".repeat(60));
    info!(
        "✓ 第 {} 批完成: 评分 {} | 拒绝 {} | 失败 {}",
        batch_num, graded, rejected, failed
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(
    graded: usize,
    rejected: usize,
    failed: usize,
    total: usize,
    log_file_path: &str,
) {
    info!("{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 评分: {}/{}", graded, total);
    info!("🚫 拒绝: {}", rejected);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
