//! Token data readers against a local attestation API

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256};
use alloy::sol_types::{SolEvent, SolValue};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use common::source;
use exec_provider::config::{TokenBridgeConfig, UsdcConfig};
use exec_provider::token_data::lbtc::{STATUS_APPROVED, STATUS_FAILED};
use exec_provider::token_data::usdc::{MessageAndAttestation, MessageSent};
use exec_provider::types::{PolledLog, TokenTransferMessage};
use exec_provider::{ExecProviderConfig, GenericAddress};

const USDC: Address = Address::new([0xaa; 20]);
const LBTC: Address = Address::new([0xbb; 20]);
const TRANSMITTER: Address = Address::new([0x77; 20]);

#[derive(Clone)]
struct ApiState {
    hits: Arc<AtomicU32>,
    ready_after: u32,
    terminal_status: &'static str,
}

async fn usdc_attestation(
    State(state): State<ApiState>,
    Path(hash): Path<String>,
) -> (StatusCode, Json<Value>) {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst);
    if hit == 0 {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })));
    }
    if hit < state.ready_after {
        return (
            StatusCode::OK,
            Json(json!({ "status": "pending_confirmations" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "complete",
            "attestation": "0xa77e57",
            "hash": hash,
        })),
    )
}

async fn lbtc_deposits(State(state): State<ApiState>, Json(body): Json<Value>) -> Json<Value> {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst);
    let hash = body["messageHash"][0].as_str().unwrap_or_default().to_string();
    let status = if hit + 1 < state.ready_after {
        "NOTARIZATION_STATUS_PENDING"
    } else {
        state.terminal_status
    };
    Json(json!({
        "attestations": [{
            "message_hash": hash,
            "status": status,
            "attestation": "0x1b7c",
        }]
    }))
}

/// Serves the attestation endpoints on an ephemeral port, returning its base URL
async fn serve(state: ApiState) -> String {
    let app = Router::new()
        .route("/v1/attestations/{hash}", get(usdc_attestation))
        .route("/bridge/v1/deposits/getByHash", post(lbtc_deposits))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn bridge(token: Address, api: String, timeout_seconds: u32) -> TokenBridgeConfig {
    TokenBridgeConfig {
        source_token_address: token,
        attestation_api: api,
        attestation_api_timeout_seconds: timeout_seconds,
        attestation_api_interval_milliseconds: 10,
    }
}

fn state(ready_after: u32, terminal_status: &'static str) -> ApiState {
    ApiState {
        hits: Arc::new(AtomicU32::new(0)),
        ready_after,
        terminal_status,
    }
}

#[tokio::test]
async fn test_usdc_reader_polls_until_complete() {
    let api = state(3, "complete");
    let base = serve(api.clone()).await;
    let h = source(ExecProviderConfig {
        usdc: Some(UsdcConfig {
            bridge: bridge(USDC, base, 5),
            source_message_transmitter_address: TRANSMITTER,
        }),
        ..Default::default()
    })
    .await;

    let tx_hash = B256::repeat_byte(0x42);
    let message = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]);
    h.log_poller.push_log(PolledLog {
        address: TRANSMITTER,
        topics: vec![MessageSent::SIGNATURE_HASH],
        data: (message.clone(),).abi_encode_params().into(),
        tx_hash,
        log_index: 3,
        block_number: 10,
    });

    let reader = h
        .provider
        .new_token_data_reader(&CancellationToken::new(), &GenericAddress::from(USDC))
        .await
        .unwrap();
    let msg = TokenTransferMessage {
        tx_hash,
        log_index: 5,
        tokens: vec![USDC],
        source_token_data: vec![Bytes::new()],
    };
    let data = reader.read_token_data(&msg, 0).await.unwrap();

    let expected = MessageAndAttestation {
        message: message.clone(),
        attestation: Bytes::from(vec![0xa7, 0x7e, 0x57]),
    }
    .abi_encode();
    assert_eq!(data.to_vec(), expected);
    assert_eq!(api.hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_usdc_reader_fails_without_message_log() {
    let base = serve(state(1, "complete")).await;
    let h = source(ExecProviderConfig {
        usdc: Some(UsdcConfig {
            bridge: bridge(USDC, base, 5),
            source_message_transmitter_address: TRANSMITTER,
        }),
        ..Default::default()
    })
    .await;

    let reader = h
        .provider
        .new_token_data_reader(&CancellationToken::new(), &GenericAddress::from(USDC))
        .await
        .unwrap();
    let msg = TokenTransferMessage {
        tokens: vec![USDC],
        source_token_data: vec![Bytes::new()],
        ..Default::default()
    };
    let err = reader.read_token_data(&msg, 0).await.unwrap_err();
    assert!(err.to_string().contains("MessageSent"));
}

#[tokio::test]
async fn test_lbtc_reader_returns_approved_attestation() {
    let api = state(2, STATUS_APPROVED);
    let base = serve(api.clone()).await;
    let h = source(ExecProviderConfig {
        lbtc: Some(bridge(LBTC, base, 5)),
        ..Default::default()
    })
    .await;

    let reader = h
        .provider
        .new_token_data_reader(&CancellationToken::new(), &GenericAddress::from(LBTC))
        .await
        .unwrap();
    let msg = TokenTransferMessage {
        tokens: vec![LBTC],
        source_token_data: vec![Bytes::from(vec![0x33; 32])],
        ..Default::default()
    };
    let data = reader.read_token_data(&msg, 0).await.unwrap();
    assert_eq!(data.to_vec(), vec![0x1b, 0x7c]);
    assert_eq!(api.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_lbtc_reader_surfaces_failed_notarization() {
    let base = serve(state(1, STATUS_FAILED)).await;
    let h = source(ExecProviderConfig {
        lbtc: Some(bridge(LBTC, base, 5)),
        ..Default::default()
    })
    .await;

    let reader = h
        .provider
        .new_token_data_reader(&CancellationToken::new(), &GenericAddress::from(LBTC))
        .await
        .unwrap();
    let msg = TokenTransferMessage {
        tokens: vec![LBTC],
        source_token_data: vec![Bytes::from(vec![0x33; 32])],
        ..Default::default()
    };
    let err = reader.read_token_data(&msg, 0).await.unwrap_err();
    assert!(err.to_string().contains("notarization failed"));
}

#[tokio::test]
async fn test_lbtc_reader_times_out_while_pending() {
    let base = serve(state(u32::MAX, STATUS_APPROVED)).await;
    let h = source(ExecProviderConfig {
        lbtc: Some(bridge(LBTC, base, 1)),
        ..Default::default()
    })
    .await;

    let reader = h
        .provider
        .new_token_data_reader(&CancellationToken::new(), &GenericAddress::from(LBTC))
        .await
        .unwrap();
    let msg = TokenTransferMessage {
        tokens: vec![LBTC],
        source_token_data: vec![Bytes::from(vec![0x33; 32])],
        ..Default::default()
    };
    let err = reader.read_token_data(&msg, 0).await.unwrap_err();
    assert!(err.to_string().contains("not ready after"));
}
