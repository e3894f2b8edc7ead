pub mod asset_catalog;
pub mod links;
pub mod local_storage;
pub mod storage;
pub mod upload_service;
