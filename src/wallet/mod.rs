pub mod handlers;
pub mod service;
pub mod treasury;

pub use service::WalletService;
pub use treasury::TreasuryAccount;
