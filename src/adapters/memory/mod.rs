pub mod catalog_service;
pub mod loan_store;
pub mod member_service;

pub use catalog_service::InMemoryCatalogService;
pub use loan_store::InMemoryLoanStore;
pub use member_service::InMemoryMemberService;
