pub mod catalog_service;
pub mod loan_reports;
pub mod loan_repository;
pub mod member_service;

pub use catalog_service::*;
pub use loan_reports::*;
pub use loan_repository::*;
pub use member_service::*;

/// ポート実装が返すエラー
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// ポート共通の Result型
pub type Result<T> = std::result::Result<T, BoxError>;
