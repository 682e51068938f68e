//! Shared parameter extractor for the four stats endpoints. Spec.md §6
//! allows `GET` or `POST` with "the same parameter semantics" — on a GET
//! that means the query string, on a POST it means the query string plus
//! url-encoded form fields in the body (spec.md §4.7: "query or form
//! fields"). `StatsQuery` reads both and merges them into one flat map so
//! every handler keeps using `query::parse` unchanged.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::Method;
use axum::response::{IntoResponse, Response};

pub struct StatsQuery(pub HashMap<String, String>);

impl<S> FromRequest<S> for StatsQuery
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut params = HashMap::new();

        if let Some(query) = req.uri().query() {
            if let Ok(parsed) = serde_urlencoded::from_str::<HashMap<String, String>>(query) {
                params.extend(parsed);
            }
        }

        if req.method() == Method::POST {
            let bytes = Bytes::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            if let Ok(parsed) = serde_urlencoded::from_bytes::<HashMap<String, String>>(&bytes) {
                params.extend(parsed);
            }
        }

        Ok(StatsQuery(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn post_form_fields_merge_with_query_string() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/stats_app_day?mode=app")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("dates=1&offset=0"))
            .unwrap();
        let StatsQuery(params) = StatsQuery::from_request(req, &()).await.unwrap();
        assert_eq!(params.get("mode").map(String::as_str), Some("app"));
        assert_eq!(params.get("dates").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn get_reads_query_string_only() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/stats_app_day?mode=app&dates=1")
            .body(Body::empty())
            .unwrap();
        let StatsQuery(params) = StatsQuery::from_request(req, &()).await.unwrap();
        assert_eq!(params.get("dates").map(String::as_str), Some("1"));
    }
}
