pub mod caption;
pub mod config;
pub mod errors;
pub mod fsops;
pub mod logging;
pub mod storage;
