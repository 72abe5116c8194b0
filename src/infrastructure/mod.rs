pub mod hashing;
pub mod logging;
pub mod near_rpc;
