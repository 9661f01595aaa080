use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::models::Coordinate;
use crate::pipeline::{RecommendationOutcome, RecommendationPipeline};
use crate::{SnapTripError, VERSION};

const IMAGE_FIELDS: [&str; 3] = ["image", "images", "file"];

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Photos and optional starting point of one upload
#[derive(Debug, Default)]
pub struct Upload {
    pub images: Vec<Bytes>,
    pub origin: Option<Coordinate>,
}

pub fn router(pipeline: Arc<RecommendationPipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/recommend", post(recommend))
        .with_state(pipeline)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
        timestamp: Utc::now(),
    })
}

async fn recommend(
    State(pipeline): State<Arc<RecommendationPipeline>>,
    multipart: Multipart,
) -> (StatusCode, Json<RecommendationOutcome>) {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(RecommendationOutcome::from(e)));
        }
    };

    match pipeline.recommend(&upload.images, upload.origin).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)),
        Err(e) => {
            error!("Recommendation failed: {}", e);
            (StatusCode::BAD_GATEWAY, Json(RecommendationOutcome::from(e)))
        }
    }
}

async fn read_upload(mut multipart: Multipart) -> crate::Result<Upload> {
    let mut upload = Upload::default();
    let mut latitude = None;
    let mut longitude = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| SnapTripError::validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if IMAGE_FIELDS.contains(&name.as_str()) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| SnapTripError::validation(e.body_text()))?;
            if !bytes.is_empty() {
                upload.images.push(bytes);
            }
            continue;
        }

        match name.as_str() {
            "latitude" => latitude = Some(parse_degrees(&name, field.text().await)?),
            "longitude" => longitude = Some(parse_degrees(&name, field.text().await)?),
            _ => {}
        }
    }

    if upload.images.is_empty() {
        return Err(SnapTripError::validation("at least one image is required"));
    }

    upload.origin = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => {
            let origin = Coordinate::new(latitude, longitude);
            if !origin.is_valid() {
                return Err(SnapTripError::validation(format!(
                    "coordinates out of range: {}",
                    origin.format_coordinates()
                )));
            }
            Some(origin)
        }
        (None, None) => None,
        _ => {
            return Err(SnapTripError::validation(
                "latitude and longitude must be given together",
            ));
        }
    };

    Ok(upload)
}

fn parse_degrees(
    name: &str,
    text: std::result::Result<String, axum::extract::multipart::MultipartError>,
) -> crate::Result<f64> {
    let text = text.map_err(|e| SnapTripError::validation(e.body_text()))?;
    text.trim()
        .parse::<f64>()
        .map_err(|_| SnapTripError::validation(format!("{name} must be a number, got '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecommendConfig;
    use crate::embedding::ImageEmbedder;
    use crate::models::{PlaceRecord, SearchHit};
    use crate::search::PlaceSearch;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "snaptrip-test-boundary";

    struct LengthEmbedder;

    #[async_trait]
    impl ImageEmbedder for LengthEmbedder {
        async fn embed(&self, image: &[u8]) -> Option<Vec<f32>> {
            (image != b"corrupt").then(|| vec![image.len() as f32, 1.0])
        }
    }

    struct OnePlace;

    #[async_trait]
    impl PlaceSearch for OnePlace {
        async fn search(&self, _query: &[f32], _limit: usize) -> crate::Result<Vec<SearchHit>> {
            Ok(vec![SearchHit::new(
                PlaceRecord {
                    id: Some("1".to_string()),
                    name: "Expo Bridge".to_string(),
                    description: Some("Night view".to_string()),
                    address: None,
                    image_ref: None,
                    latitude: 36.3733,
                    longitude: 127.3866,
                    manual_mood: None,
                },
                0.2,
            )])
        }
    }

    struct OfflineSearch;

    #[async_trait]
    impl PlaceSearch for OfflineSearch {
        async fn search(&self, _query: &[f32], _limit: usize) -> crate::Result<Vec<SearchHit>> {
            Err(SnapTripError::search("connection refused"))
        }
    }

    fn app_with(search: Arc<dyn PlaceSearch>) -> Router {
        let pipeline = RecommendationPipeline::new(
            &RecommendConfig::default(),
            Coordinate::new(36.3325, 127.4342),
            Arc::new(LengthEmbedder),
            search,
        );
        router(Arc::new(pipeline))
    }

    fn app() -> Router {
        app_with(Arc::new(OnePlace))
    }

    fn multipart_body(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            if IMAGE_FIELDS.contains(name) {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"photo.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
                    )
                    .as_bytes(),
                );
            } else {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn post_recommend(parts: &[(&str, &str)]) -> (StatusCode, Value) {
        post_recommend_to(app(), parts).await
    }

    async fn post_recommend_to(app: Router, parts: &[(&str, &str)]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/recommend")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_recommend_success() {
        let (status, json) = post_recommend(&[
            ("image", "jpeg bytes"),
            ("latitude", "36.3740"),
            ("longitude", "127.3860"),
        ])
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"][0]["name"], "Expo Bridge");
        assert_eq!(json["data"][0]["transport"], "walk");
    }

    #[tokio::test]
    async fn test_recommend_without_images() {
        let (status, json) = post_recommend(&[("latitude", "36.3"), ("longitude", "127.4")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "fail");
    }

    #[tokio::test]
    async fn test_recommend_with_half_a_coordinate() {
        let (status, _) = post_recommend(&[("image", "jpeg bytes"), ("latitude", "36.3")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_recommend_with_bad_latitude() {
        let (status, json) = post_recommend(&[
            ("image", "jpeg bytes"),
            ("latitude", "north"),
            ("longitude", "127.4"),
        ])
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().unwrap().contains("latitude"));
    }

    #[tokio::test]
    async fn test_recommend_unreadable_image() {
        let (status, json) = post_recommend(&[("image", "corrupt")]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "fail");
    }

    #[tokio::test]
    async fn test_recommend_with_search_offline() {
        let (status, json) =
            post_recommend_to(app_with(Arc::new(OfflineSearch)), &[("image", "jpeg bytes")]).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["status"], "fail");
        assert!(json["message"].as_str().unwrap().contains("unavailable"));
    }
}
