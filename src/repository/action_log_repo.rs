// ==========================================
// 集货分配系统 - 操作日志数据仓储
// ==========================================
// 红线: 所有人工写入、导入与重算必须记录
// 对齐: action_log 表
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::ActionLogRepository;
