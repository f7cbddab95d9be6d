pub mod dispatch;
pub mod media_service;
pub mod preview_worker;
pub mod quota;
pub mod storage;
