pub mod listing;
pub mod participation;
pub mod service;
pub mod storage;
