//! Stream driver tests against a local WebSocket server.

use futures_util::{SinkExt, StreamExt};
use kiosk_core::{FeedStatus, TickerSource};
use kiosk_feed::{Store, StoreConfig};
use kiosk_ws::{BinanceProvider, DriverConfig, KrakenProvider, StreamDriver};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

fn store_with(keys: &[(&str, TickerSource)]) -> Arc<Store> {
    let store = Store::new(StoreConfig::default()).unwrap();
    for (key, source) in keys {
        store.register_ticker(key, *source).unwrap();
    }
    Arc::new(store)
}

async fn wait_for_price(store: &Store, key: &str) -> Option<f64> {
    for _ in 0..100 {
        if let Some(price) = store.get_ticker(key).and_then(|t| t.price) {
            return Some(price);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    None
}

#[tokio::test]
async fn test_binance_driver_applies_ticks() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text("garbage".to_string())).await.unwrap();
        ws.send(Message::Text(
            r#"{"e":"24hrTicker","s":"BTCUSDT","c":"50500.00","P":"2.50"}"#.to_string(),
        ))
        .await
        .unwrap();
        // Keep the connection open until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let store = store_with(&[("btcusdt", TickerSource::Binance)]);
    let shutdown = CancellationToken::new();
    let driver = StreamDriver::new(
        BinanceProvider::new(format!("ws://{addr}/ws")),
        Arc::clone(&store),
        DriverConfig::default(),
        shutdown.clone(),
    );
    let status = driver.status_handle();
    let task = tokio::spawn(driver.run());

    assert_eq!(wait_for_price(&store, "btcusdt").await, Some(50_500.0));
    assert_eq!(status.state(), FeedStatus::Live);

    let record = store.get_ticker("btcusdt").unwrap();
    assert_eq!(record.change_24h, 2.5);
    assert_eq!(record.last_published_price, Some(50_500.0));
    assert!(record.open_candle.is_some());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.state(), FeedStatus::Disconnected);
}

#[tokio::test]
async fn test_kraken_driver_sends_subscription() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (sub_tx, sub_rx) = tokio::sync::oneshot::channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        if let Some(Ok(Message::Text(hello))) = ws.next().await {
            let _ = sub_tx.send(hello);
        }
        ws.send(Message::Text(r#"{"event":"systemStatus","status":"online"}"#.to_string()))
            .await
            .unwrap();
        ws.send(Message::Text(
            r#"[7,{"c":["110.0","1"],"o":["105.0","100.0"]},"ticker","XMR/USDT"]"#.to_string(),
        ))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let store = store_with(&[
        ("xmrusdt", TickerSource::Kraken),
        ("btcusdt", TickerSource::Binance),
    ]);
    let shutdown = CancellationToken::new();
    let provider = KrakenProvider::new(
        format!("ws://{addr}"),
        HashMap::from([("xmrusdt".to_string(), "XMR/USDT".to_string())]),
    );
    let task = tokio::spawn(
        StreamDriver::new(provider, Arc::clone(&store), DriverConfig::default(), shutdown.clone())
            .run(),
    );

    let hello = tokio::time::timeout(Duration::from_secs(5), sub_rx)
        .await
        .unwrap()
        .unwrap();
    let hello: serde_json::Value = serde_json::from_str(&hello).unwrap();
    assert_eq!(hello["event"], "subscribe");
    assert_eq!(hello["pair"][0], "XMR/USDT");

    assert_eq!(wait_for_price(&store, "xmrusdt").await, Some(110.0));
    let change = store.get_ticker("xmrusdt").unwrap().change_24h;
    assert!((change - 10.0).abs() < 1e-9);
    assert!(store.get_ticker("btcusdt").unwrap().price.is_none());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_driver_reconnects_after_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // First connection is closed straight away; the second one delivers data.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"s":"ETHUSDT","c":"3000","P":"-1.0"}"#.to_string(),
        ))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let store = store_with(&[("ethusdt", TickerSource::Binance)]);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(
        StreamDriver::new(
            BinanceProvider::new(format!("ws://{addr}/ws")),
            Arc::clone(&store),
            DriverConfig::default(),
            shutdown.clone(),
        )
        .run(),
    );

    assert_eq!(wait_for_price(&store, "ethusdt").await, Some(3000.0));
    assert_eq!(store.get_ticker("ethusdt").unwrap().change_24h, -1.0);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_driver_idles_without_symbols() {
    let store = store_with(&[("runecoin", TickerSource::CoinGecko)]);
    let shutdown = CancellationToken::new();
    let driver = StreamDriver::new(
        BinanceProvider::default(),
        Arc::clone(&store),
        DriverConfig::default(),
        shutdown.clone(),
    );
    let status = driver.status_handle();
    let task = tokio::spawn(driver.run());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let snapshot = status.snapshot();
    assert_eq!(snapshot.state, FeedStatus::Disconnected);
    assert_eq!(snapshot.detail, "no symbols to subscribe");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_kraken_without_pairs_stays_connected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (msg_tx, mut msg_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let _ = msg_tx.send(text);
            }
        }
    });

    let store = store_with(&[("btcusdt", TickerSource::Binance)]);
    let shutdown = CancellationToken::new();
    let driver = StreamDriver::new(
        KrakenProvider::new(format!("ws://{addr}"), HashMap::new()),
        Arc::clone(&store),
        DriverConfig::default(),
        shutdown.clone(),
    );
    let status = driver.status_handle();
    let task = tokio::spawn(driver.run());

    let mut state = status.state();
    for _ in 0..100 {
        if state == FeedStatus::Live {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        state = status.state();
    }
    assert_eq!(state, FeedStatus::Live);
    // No subscribe message for an empty pair list.
    assert!(msg_rx.try_recv().is_err());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}
