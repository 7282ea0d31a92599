pub mod serde_shared;
