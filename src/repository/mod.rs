// ==========================================
// 包装 ERP - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod import_repo;
pub mod import_repo_impl;
pub mod payment_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use import_repo::ImportRepository;
pub use import_repo_impl::ImportRepositoryImpl;
pub use payment_repo::{PaymentRepository, PaymentRepositoryImpl};
