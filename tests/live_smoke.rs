use std::sync::Arc;
use std::time::Duration;

use bitunix_api_client::auth::{Signer, StaticCredentials};
use bitunix_api_client::futures::rest::{PendingPositionsRequest, RestClient};
use bitunix_api_client::futures::ws::{KlineInterval, KlinePriceType, PrivateWsClient, PublicWsClient};

fn live_tests_enabled() -> bool {
    std::env::var("BITUNIX_LIVE_TESTS").ok().as_deref() == Some("1")
}

fn credentials_from_env() -> Option<StaticCredentials> {
    let key = std::env::var("BITUNIX_API_KEY").ok()?;
    let secret = std::env::var("BITUNIX_API_SECRET").ok()?;
    Some(StaticCredentials::new(key, secret))
}

#[tokio::test]
#[ignore]
async fn live_rest_private_smoke() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();
    if !live_tests_enabled() {
        return Ok(());
    }

    let Some(credentials) = credentials_from_env() else {
        return Ok(());
    };
    let client = RestClient::builder().credentials(Arc::new(credentials)).build()?;

    let account = client.get_account("USDT").await?;
    assert_eq!(account.margin_coin, "USDT");
    let _positions = client
        .get_pending_positions(&PendingPositionsRequest::default())
        .await?;

    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_ws_private_login_smoke() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();
    if !live_tests_enabled() {
        return Ok(());
    }

    let Some(credentials) = credentials_from_env() else {
        return Ok(());
    };
    let client = PrivateWsClient::new(Signer::new(Arc::new(credentials)));
    client.connect().await?;
    let _balance = client.subscribe_balance().await?;
    client.close().await;

    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_ws_public_kline_smoke() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();
    if !live_tests_enabled() {
        return Ok(());
    }

    let client = Arc::new(PublicWsClient::new());
    client.connect().await?;
    let mut klines = client
        .subscribe_kline("BTCUSDT", KlineInterval::Min1, KlinePriceType::Market)
        .await?;
    let reader = Arc::clone(&client);
    let stream = tokio::spawn(async move { reader.stream().await });

    let kline = tokio::time::timeout(Duration::from_secs(30), klines.recv()).await?;
    assert!(kline.is_some_and(|k| k.symbol == "BTCUSDT"));

    client.close().await;
    stream.await??;
    Ok(())
}
