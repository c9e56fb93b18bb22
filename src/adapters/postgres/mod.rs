pub mod catalog_service;
pub mod loan_reports;
pub mod loan_repository;
pub mod member_service;

// パブリックに型を再エクスポート
pub use catalog_service::CatalogService as PostgresCatalogService;
pub use loan_reports::LoanReports as PostgresLoanReports;
pub use loan_repository::LoanRepository as PostgresLoanRepository;
pub use member_service::MemberService as PostgresMemberService;
