//! 端到端演示：派生账户 → (可选)开通 → 查询余额 → MPC 签名 → 广播
//!
//! 需要环境变量 ACCOUNT_ID / PRIVATE_KEY（`ed25519:<base58>`），可放在 .env 中

use std::sync::Arc;

use anyhow::{Context, Result};
use chainsig::{
    config::Config,
    domain::{near_types::KeyPair, ChainAdapter, SignatureKeyType},
    infrastructure::{logging::init_logging, near_rpc::JsonRpcProvider},
    service::{
        ensure_derived_account_exists, ChainSignatureContract, EnsureDerivedAccountParams,
        LocalSignerAccount, NearAdapter, NearTransactionRequest, SignArgs,
    },
};

struct Args {
    path: String,
    receiver: String,
    amount: u128,
    create_account: bool,
}

fn parse_args() -> Result<Args> {
    let mut parsed = Args {
        path: "near-1".to_string(),
        receiver: "receiver.testnet".to_string(),
        amount: 10u128.pow(22),
        create_account: false,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--path" => parsed.path = args.next().context("--path needs a value")?,
            "--to" => parsed.receiver = args.next().context("--to needs a value")?,
            "--amount" => {
                parsed.amount = args
                    .next()
                    .context("--amount needs a value")?
                    .parse()
                    .context("--amount must be yoctoNEAR")?
            }
            "--create-account" => parsed.create_account = true,
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }

    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    Config::load_dotenv();
    let config = Config::from_env_and_file(std::env::var("CHAINSIG_CONFIG").ok())?;
    config.validate()?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("{}", e))?;

    let args = parse_args()?;
    let account_id = std::env::var("ACCOUNT_ID").context("ACCOUNT_ID is required")?;
    let private_key = std::env::var("PRIVATE_KEY").context("PRIVATE_KEY is required")?;

    let provider = Arc::new(JsonRpcProvider::with_endpoints(
        config.near.rpc_endpoints(),
        std::time::Duration::from_secs(config.near.rpc_timeout_secs),
    ));
    let contract = Arc::new(ChainSignatureContract::with_provider(
        &config.near.contract_id,
        &config.near.network_id,
        provider.clone(),
    ));
    let near = NearAdapter::new(provider.clone(), contract.clone());

    let derived = near
        .derive_address_and_public_key(&account_id, &args.path)
        .await?;
    tracing::info!(address = %derived.address, public_key = %derived.public_key, "Derived account");

    if args.create_account {
        let controller_key_pair = KeyPair::from_secret_key_str(&private_key)?;
        let outcome = ensure_derived_account_exists(
            provider.as_ref(),
            EnsureDerivedAccountParams {
                controller_account_id: &account_id,
                controller_key_pair: &controller_key_pair,
                derived_account_id: &derived.address,
                mpc_public_key: &derived.public_key,
                initial_deposit_yocto: 10u128.pow(24),
            },
        )
        .await?;
        tracing::info!(created = outcome.created, "Derived account ready");
    }

    let balance = near.get_balance(&derived.address).await?;
    tracing::info!(balance = %balance.balance, decimals = balance.decimals, "Balance");

    let prepared = near
        .prepare_transaction_for_signing(NearTransactionRequest {
            from: derived.address.clone(),
            to: args.receiver,
            amount: args.amount,
            public_key: derived.public_key.clone(),
            memo: None,
        })
        .await?;

    let signer = LocalSignerAccount::new(
        &account_id,
        KeyPair::from_secret_key_str(&private_key)?,
        provider.clone(),
    );
    let signatures = contract
        .sign(SignArgs {
            payloads: prepared.hashes_to_sign,
            path: args.path,
            key_type: SignatureKeyType::Eddsa,
            signer_account: &signer,
        })
        .await?;

    let signed = near.finalize_transaction_signing(prepared.transaction, &signatures)?;
    let result = near.broadcast_tx(&signed).await?;

    let explorer = match config.near.network_id.as_str() {
        "mainnet" => "https://nearblocks.io",
        _ => "https://testnet.nearblocks.io",
    };
    println!("Sent: {}/txns/{}", explorer, result.hash);
    Ok(())
}
