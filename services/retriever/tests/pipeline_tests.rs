//! End-to-end retrievals against a scripted upstream.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use geo_transform::geotiff::{read_geotiff, write_geotiff};
use geo_transform::{GeoTransform, Raster};
use object_store::memory::InMemory;
use radar_common::{floor_to_cadence, BoundingBox, CrsCode, DataFormat, InstantSpec, ProductRegistry, RetryPolicy};
use retriever::source::{Download, SourceError};
use retriever::{
    CatalogStatus, DeliveryOptions, Pipeline, RetrievalRequest, StoreProvider, UpstreamSource,
};
use std::sync::Arc;
use storage::{Catalog, ObjectStorage};
use test_utils::{bbox, create_rainfall_grid, scratch_dir, ITALY_COARSE};

/// Publishes one SRI GeoTIFF at a fixed instant.
struct StaticSource {
    instant: DateTime<Utc>,
    tiff: Bytes,
}

impl StaticSource {
    fn new(instant: DateTime<Utc>) -> Self {
        let raster = Raster {
            width: ITALY_COARSE.width,
            height: ITALY_COARSE.height,
            data: create_rainfall_grid(ITALY_COARSE.width, ITALY_COARSE.height, 60.0),
            transform: GeoTransform {
                origin_x: ITALY_COARSE.origin_x,
                origin_y: ITALY_COARSE.origin_y,
                pixel_width: ITALY_COARSE.pixel_size,
                pixel_height: ITALY_COARSE.pixel_size,
            },
            crs: CrsCode::Epsg4326,
        };
        Self {
            instant,
            tiff: Bytes::from(write_geotiff(&raster).unwrap()),
        }
    }
}

#[async_trait]
impl UpstreamSource for StaticSource {
    async fn exists(&self, product: &str, instant: DateTime<Utc>) -> Result<bool, SourceError> {
        Ok(product == "SRI" && instant == self.instant)
    }

    async fn download(&self, product: &str, instant: DateTime<Utc>) -> Result<Download, SourceError> {
        if product != "SRI" || instant != self.instant {
            return Err(SourceError::NotFound(format!("{} at {}", product, instant)));
        }
        Ok(Download {
            bytes: self.tiff.clone(),
            filename: "SRI_upstream.tif".to_string(),
        })
    }

    async fn last_available(&self, _product: &str) -> Result<Option<DateTime<Utc>>, SourceError> {
        Ok(Some(self.instant))
    }
}

fn published() -> DateTime<Utc> {
    floor_to_cadence(Utc::now() - ChronoDuration::minutes(20), ChronoDuration::minutes(5))
}

fn pipeline(instant: DateTime<Utc>) -> Pipeline {
    Pipeline::new(
        Arc::new(ProductRegistry::builtin()),
        Arc::new(StaticSource::new(instant)),
        Default::default(),
        StoreProvider::Fixed(ObjectStorage::from_store(Arc::new(InMemory::new()), "radar")),
    )
}

fn venice_request(spec: InstantSpec, delivery: DeliveryOptions) -> RetrievalRequest {
    let (min_x, min_y, max_x, max_y) = bbox::VENICE;
    RetrievalRequest::new("SRI", spec)
        .with_retry(RetryPolicy::none())
        .with_options(geo_transform::TransformOptions {
            bbox: Some(BoundingBox::new(min_x, min_y, max_x, max_y)),
            ..Default::default()
        })
        .with_delivery(delivery)
}

#[tokio::test]
async fn test_latest_clipped_to_venice_lands_on_disk_and_in_catalog() {
    let dir = scratch_dir();
    let instant = published();
    let request = venice_request(
        InstantSpec::Latest,
        DeliveryOptions {
            out_dir: Some(dir.path().to_path_buf()),
            register_catalog: true,
            ..Default::default()
        },
    );

    let outcome = pipeline(instant).run(&request).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.resolved_instant, Some(instant));
    assert_eq!(outcome.format, Some(DataFormat::GeoTiff));
    assert_eq!(outcome.catalog, CatalogStatus::Registered);

    let location = outcome.delivered_locations()[0].to_string();
    assert!(location.contains("product=SRI"));
    let raster = read_geotiff(&std::fs::read(&location).unwrap()).unwrap();
    assert_eq!((raster.width, raster.height), (2, 2));

    let entries = Catalog::local(dir.path().join("catalog.jsonl")).entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].product, "SRI");
    assert_eq!(entries[0].date_time, instant);
    assert_eq!(entries[0].locations, vec![location]);
}

#[tokio::test]
async fn test_disjoint_bbox_is_typed_failure() {
    let (min_x, min_y, max_x, max_y) = bbox::ATLANTIC;
    let instant = published();
    let request = RetrievalRequest::new("SRI", InstantSpec::Explicit(instant))
        .with_retry(RetryPolicy::none())
        .with_options(geo_transform::TransformOptions {
            bbox: Some(BoundingBox::new(min_x, min_y, max_x, max_y)),
            ..Default::default()
        })
        .with_delivery(DeliveryOptions {
            return_data: true,
            ..Default::default()
        });

    let outcome = pipeline(instant).run(&request).await;
    assert!(!outcome.success);
    assert!(outcome.data.is_none());
    assert_eq!(outcome.error.unwrap().kind, "clip_out_of_bounds");
}

#[tokio::test]
async fn test_raster_to_vector_is_unsupported() {
    let instant = published();
    let request = RetrievalRequest::new("SRI", InstantSpec::Explicit(instant))
        .with_retry(RetryPolicy::none())
        .with_options(geo_transform::TransformOptions {
            target_format: Some(DataFormat::GeoJson),
            ..Default::default()
        })
        .with_delivery(DeliveryOptions {
            return_data: true,
            ..Default::default()
        });

    let outcome = pipeline(instant).run(&request).await;
    assert_eq!(outcome.error.unwrap().kind, "unsupported_format");
    assert_eq!(outcome.fetch_attempts, 1);
}

#[tokio::test]
async fn test_missing_instant_is_resource_unavailable() {
    let instant = published();
    let request = RetrievalRequest::new("SRI", InstantSpec::Explicit(instant - ChronoDuration::minutes(5)))
        .with_retry(RetryPolicy::none())
        .with_delivery(DeliveryOptions {
            return_data: true,
            ..Default::default()
        });

    let outcome = pipeline(instant).run(&request).await;
    assert_eq!(outcome.error.unwrap().kind, "resource_unavailable");
}

#[tokio::test]
async fn test_concurrent_runs_share_one_catalog() {
    let shared = scratch_dir();
    let catalog_path = shared.path().join("catalog.jsonl");
    let instant = published();

    let runs: Vec<_> = (0..4)
        .map(|i| {
            let out = shared.path().join(format!("worker-{}", i));
            let request = venice_request(
                InstantSpec::Explicit(instant),
                DeliveryOptions {
                    out_dir: Some(out),
                    register_catalog: true,
                    catalog: Some(storage::CatalogLocation::Local(catalog_path.clone())),
                    ..Default::default()
                },
            );
            let pipeline = pipeline(instant);
            tokio::spawn(async move { pipeline.run(&request).await })
        })
        .collect();

    for run in runs {
        let outcome = run.await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.catalog, CatalogStatus::Registered);
    }

    let entries = Catalog::local(&catalog_path).entries().await.unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e.date_time == instant));
}
