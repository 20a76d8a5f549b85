pub mod export;
pub mod import;
pub mod normalizer;
pub mod scan;
pub mod sync;
