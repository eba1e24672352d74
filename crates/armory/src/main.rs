//! `armory-parser` -- dump an account's armory data as JSON.
//!
//! # Environment variables
//!
//! | Variable            | Required | Default                   | Description                 |
//! |---------------------|----------|---------------------------|-----------------------------|
//! | `ARMORY_ACCOUNT_ID` | no*      | --                        | Account to look up          |
//! | `ARMORY_BASE_URL`   | no       | `https://d4armory.io/api` | API root                    |
//!
//! \* Either the variable or the first command-line argument must be set.

use anyhow::Context;
use d4log_armory::ArmoryApi;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "d4log_armory=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let raw_id = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ARMORY_ACCOUNT_ID").ok())
        .context("Pass an account id as the first argument or set ARMORY_ACCOUNT_ID")?;
    let account_id: u64 = raw_id
        .trim()
        .parse()
        .with_context(|| format!("Account id must be a number, got '{raw_id}'"))?;

    let api = match std::env::var("ARMORY_BASE_URL") {
        Ok(url) => ArmoryApi::new(url),
        Err(_) => ArmoryApi::default(),
    };

    tracing::info!(account_id, base_url = api.base_url(), "Fetching account");
    let account = api
        .account(account_id)
        .await
        .with_context(|| format!("Failed to fetch account {account_id}"))?;
    println!("{}", serde_json::to_string_pretty(&account)?);

    for character in &account.characters {
        match api.hero(account_id, &character.id).await {
            Ok(hero) => println!("{}", serde_json::to_string_pretty(&hero)?),
            Err(e) => tracing::warn!(
                character = %character.name,
                character_id = %character.id,
                error = %e,
                "Failed to fetch hero"
            ),
        }
    }

    Ok(())
}
