pub mod bulk;
pub mod inventory;
pub mod scan;
