use std::{io::Write, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use waterwatch::{
    assessment::TdsPolicy,
    feed::FeedSource,
    normalize::Normalizer,
    routes,
    scheduler::{EndOfFeedPolicy, Ingestor, StreamingIngestor, TickOutcome},
    store::{MemoryReadingStore, ReadingStore, SharedStore},
    Measurements, Reading, TimestampSource, WaterQualityService,
};

// ---

fn app(store: SharedStore) -> Router {
    let service = WaterQualityService::new(store, TdsPolicy::default(), Duration::from_secs(2));
    routes::router(service)
}

async fn get(app: Router, uri: &str) -> Result<(StatusCode, Option<Value>)> {
    // ---
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes)?)
    };
    Ok((status, body))
}

fn reading(object_id: i64, ph: f64, alkalinity: f64) -> Reading {
    Reading {
        id: None,
        object_id: Some(object_id),
        timestamp: Some(Utc::now()),
        timestamp_source: TimestampSource::Pipeline,
        measurements: Measurements {
            ph: Some(ph),
            alkalinity_mgl: Some(alkalinity),
            ..Measurements::default()
        },
    }
}

#[tokio::test]
async fn health_is_ok() -> Result<()> {
    // ---
    let store: SharedStore = Arc::new(MemoryReadingStore::new());
    let (status, body) = get(app(store), "/health").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Some(serde_json::json!({ "status": "ok" })));
    Ok(())
}

#[tokio::test]
async fn empty_store_answers_no_content() -> Result<()> {
    // ---
    let store: SharedStore = Arc::new(MemoryReadingStore::new());

    for uri in [
        "/readings",
        "/readings/latest",
        "/assessment/latest",
        "/status/latest",
    ] {
        let (status, body) = get(app(store.clone()), uri).await?;
        assert_eq!(status, StatusCode::NO_CONTENT, "{uri}");
        assert!(body.is_none(), "{uri} should have no body");
    }
    Ok(())
}

#[tokio::test]
async fn bad_averages_queries_are_rejected() -> Result<()> {
    // ---
    let store: SharedStore = Arc::new(MemoryReadingStore::new());

    for uri in [
        "/averages/turbidity",
        "/averages/ph?window=month&month=2025-13",
        "/averages?window=weekly",
    ] {
        let (status, body) = get(app(store.clone()), uri).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body.and_then(|b| b.get("error").cloned()).is_some());
    }
    Ok(())
}

#[tokio::test]
async fn averages_and_assessment_reflect_stored_readings() -> Result<()> {
    // ---
    let store: SharedStore = Arc::new(MemoryReadingStore::new());
    store.save(reading(1, 7.0, 100.0)).await?;
    store.save(reading(2, 8.0, 600.0)).await?;

    let (status, body) = get(app(store.clone()), "/averages/ph").await?;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap_or_default();
    assert_eq!(body["parameter"], "ph");
    assert_eq!(body["window"], "overall");
    assert_eq!(body["average"].as_f64(), Some(7.5));

    let (status, body) = get(app(store.clone()), "/averages?window=month").await?;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap_or_default();
    assert_eq!(body["averages"]["alkalinity"].as_f64(), Some(350.0));
    assert!(body["averages"]["bod"].is_null());
    assert_eq!(body["averages"].as_object().map(|m| m.len()), Some(10));

    let (status, body) = get(app(store.clone()), "/readings").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap_or_default().as_array().map(Vec::len), Some(2));

    let (status, body) = get(app(store), "/assessment/latest").await?;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap_or_default();
    assert_eq!(body["status"], "UNSAFE");
    assert!(body["issues"][0]
        .as_str()
        .is_some_and(|issue| issue.starts_with("alkalinity exceeds limit")));
    Ok(())
}

#[tokio::test]
async fn latest_status_is_a_traffic_light_flag() -> Result<()> {
    // ---
    let store: SharedStore = Arc::new(MemoryReadingStore::new());
    store.save(reading(1, 7.0, 100.0)).await?;

    let (status, body) = get(app(store.clone()), "/status/latest").await?;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap_or_default();
    assert_eq!(body["flag"], "GREEN");
    assert!(body["timestamp"].is_string());

    // Newer and over the pH limit.
    store.save(reading(2, 9.1, 100.0)).await?;
    let (_, body) = get(app(store), "/status/latest").await?;
    assert_eq!(body.unwrap_or_default()["flag"], "RED");
    Ok(())
}

#[tokio::test]
async fn thresholds_list_who_limits() -> Result<()> {
    // ---
    let store: SharedStore = Arc::new(MemoryReadingStore::new());
    let service = WaterQualityService::new(
        store,
        TdsPolicy::MissingIsUnknown,
        Duration::from_secs(2),
    );
    let (status, body) = get(routes::router(service), "/thresholds").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        Some(serde_json::json!({
            "ph_min": 6.5,
            "ph_max": 8.5,
            "alkalinity_max_mgl": 500.0,
            "conductivity_max_uscm": 2000.0,
            "nitrite_max_mgl": 1.0,
            "tds_max_mgl": 1000.0,
            "tds_policy": "missing-is-unknown",
        }))
    );
    Ok(())
}

#[tokio::test]
async fn streamed_feed_is_queryable() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("River_Water_Quality_Monitoring.csv");
    let mut file = std::fs::File::create(&path)?;
    writeln!(file, "OBJECTID,PH,ALK,COND,BOD,NO2,CU1,CU2,FE,ZN")?;
    writeln!(file, "1,7.2,110,300,2.0,0.1,0.2,50,100,50")?;
    writeln!(file, "2,6.8,90,280,,0.2,,,,")?;
    writeln!(file, "1,7.2,110,300,2.0,0.1,0.2,50,100,50")?;
    writeln!(file, "3,7.0,bad")?;
    drop(file);

    let store = Arc::new(MemoryReadingStore::new());
    let ingestor = Ingestor::new(Normalizer::default(), store.clone());
    let mut streaming =
        StreamingIngestor::new(FeedSource::File(path), EndOfFeedPolicy::Stop, ingestor);

    while streaming.tick(Utc::now()).await != TickOutcome::EndOfFeed {}
    assert_eq!(store.len().await, 2);

    let (status, body) = get(app(store), "/averages/tds").await?;
    assert_eq!(status, StatusCode::OK);
    // Row 1: 0.2 + (50 + 100 + 50) * 0.001 = 0.4, row 2: all operands missing = 0.
    let average = body.unwrap_or_default()["average"].as_f64().unwrap_or_default();
    assert!((average - 0.2).abs() < 1e-9, "tds average {average}");
    Ok(())
}
