pub mod error;
pub mod models;
pub mod store;
pub mod worker;

pub use store::TaskStore;
pub use worker::TaskQueue;
