pub mod device_catalog;
pub mod selector;
