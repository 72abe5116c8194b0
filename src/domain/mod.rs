pub mod chain_adapter;
pub mod near_types;
pub mod signature;

pub use chain_adapter::{
    Balance, BroadcastResult, ChainAdapter, DerivationRequest, DerivedKey, HashToSign,
    PreparedTransaction,
};
pub use signature::{Ed25519Signature, RsvSignature, Signature, SignatureKeyType};
