pub mod journal;
#[cfg(test)]
pub mod memory;
pub mod models;
pub mod repository;
pub mod store;

#[cfg(test)]
pub use memory::MemoryLedgerStore;
pub use repository::LedgerRepository;
pub use store::{LedgerStore, LedgerTx};
