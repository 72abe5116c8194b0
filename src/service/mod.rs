pub mod account_bootstrap;
pub mod chain_signature_contract; // MPC 签名编排
pub mod near_adapter;
pub mod signer_account;

pub use account_bootstrap::{
    ensure_derived_account_exists, EnsureDerivedAccountOutcome, EnsureDerivedAccountParams,
};
pub use chain_signature_contract::{ChainSignatureContract, SignArgs, SignerAccount, TransactionIntent};
pub use near_adapter::{NearAdapter, NearTransactionRequest, NearUnsignedTransaction};
pub use signer_account::LocalSignerAccount;
