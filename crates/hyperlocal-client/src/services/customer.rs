//! Shop discovery and customer preferences on the customer service.

use serde::de::IgnoredAny;
use tracing::debug;

use hyperlocal_core::geo::annotate_distances;
use hyperlocal_core::validation::{validate_coordinates, validate_radius, validate_search_query};
use hyperlocal_core::{CustomerPreferences, InventoryItem, Location, Page, Shop};

use super::PageRequest;
use crate::config::DiscoverySettings;
use crate::error::ClientResult;
use crate::transport::ApiClient;

/// Parameters of `GET /shops/nearby`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub origin: Location,
    pub radius_km: f64,
    pub page: PageRequest,
}

impl NearbyQuery {
    pub fn new(origin: Location) -> Self {
        Self::with_defaults(origin, &DiscoverySettings::default())
    }

    pub fn with_defaults(origin: Location, settings: &DiscoverySettings) -> Self {
        NearbyQuery {
            origin,
            radius_km: settings.default_radius_km,
            page: PageRequest::new(1, settings.page_size),
        }
    }

    pub fn radius(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }

    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    fn query_pairs(&self) -> ClientResult<Vec<(&'static str, String)>> {
        validate_coordinates(self.origin.latitude, self.origin.longitude)?;
        validate_radius(self.radius_km)?;

        let mut pairs = vec![
            ("latitude", self.origin.latitude.to_string()),
            ("longitude", self.origin.longitude.to_string()),
            ("radius", self.radius_km.to_string()),
        ];
        pairs.extend(self.page.query_pairs()?);
        Ok(pairs)
    }
}

#[derive(Debug, Clone)]
pub struct CustomerService {
    client: ApiClient,
    defaults: DiscoverySettings,
}

impl CustomerService {
    pub fn new(client: ApiClient, defaults: DiscoverySettings) -> Self {
        CustomerService { client, defaults }
    }

    /// A nearby query seeded with the configured radius and page size.
    pub fn nearby_query(&self, origin: Location) -> NearbyQuery {
        NearbyQuery::with_defaults(origin, &self.defaults)
    }

    /// Shops around `query.origin`. Shops the server returns without a
    /// distance get one computed from the origin.
    pub async fn nearby_shops(&self, query: &NearbyQuery) -> ClientResult<Page<Shop>> {
        let pairs = query.query_pairs()?;
        let mut page: Page<Shop> = self.client.get_with_query("/shops/nearby", &pairs).await?;
        annotate_distances(&mut page.items, &query.origin);
        debug!(
            origin = %query.origin,
            radius_km = query.radius_km,
            found = page.items.len(),
            total = page.total,
            "Nearby shops loaded"
        );
        Ok(page)
    }

    /// Text search, optionally ranked around `near`.
    ///
    /// A location with a zero latitude or longitude counts as no location:
    /// the search is sent unranked and no distances are filled in.
    pub async fn search_shops(&self, query: &str, near: Option<Location>, page: PageRequest) -> ClientResult<Page<Shop>> {
        let query = validate_search_query(query)?;
        let near = near.filter(|origin| origin.latitude != 0.0 && origin.longitude != 0.0);

        let mut pairs = vec![("query", query)];
        pairs.extend(page.query_pairs()?);
        if let Some(origin) = near {
            validate_coordinates(origin.latitude, origin.longitude)?;
            pairs.push(("latitude", origin.latitude.to_string()));
            pairs.push(("longitude", origin.longitude.to_string()));
        }

        let mut results: Page<Shop> = self.client.get_with_query("/shops/search", &pairs).await?;
        if let Some(origin) = near {
            annotate_distances(&mut results.items, &origin);
        }
        Ok(results)
    }

    pub async fn shop_details(&self, shop_id: i64) -> ClientResult<Shop> {
        self.client.get(&format!("/shops/{}", shop_id)).await
    }

    pub async fn shop_products(&self, shop_id: i64, page: PageRequest) -> ClientResult<Page<InventoryItem>> {
        let pairs = page.query_pairs()?;
        self.client
            .get_with_query(&format!("/shops/{}/products", shop_id), &pairs)
            .await
    }

    pub async fn preferences(&self) -> ClientResult<CustomerPreferences> {
        self.client.get("/preferences").await
    }

    pub async fn update_preferences(&self, preferences: &CustomerPreferences) -> ClientResult<()> {
        if let Some(location) = preferences.default_location() {
            validate_coordinates(location.latitude, location.longitude)?;
        }
        if let Some(radius) = preferences.search_radius {
            validate_radius(radius)?;
        }
        let _: IgnoredAny = self.client.put("/preferences", preferences).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::services::tests::services_for;
    use crate::storage::AppStorage;
    use crate::transport::tests::spawn_server;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn shop_json(id: i64, latitude: f64, longitude: f64, distance: Option<f64>) -> Value {
        json!({
            "id": id,
            "user_id": 100 + id,
            "name": format!("Shop {}", id),
            "description": null,
            "whatsapp_number": "+919876543210",
            "address": null,
            "latitude": latitude,
            "longitude": longitude,
            "image_url": null,
            "banner_url": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "distance": distance
        })
    }

    /// Echoes the received query back in `query` so tests can inspect it.
    async fn nearby(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        Json(json!({
            "items": [shop_json(1, 0.0, 1.0, None), shop_json(2, 0.0, 0.5, Some(0.4))],
            "total": 2,
            "page": params["page"].parse::<u32>().unwrap_or(0),
            "page_size": params["page_size"].parse::<u32>().unwrap_or(0),
            "query": serde_json::to_string(&params).unwrap_or_default()
        }))
    }

    async fn search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        Json(json!({
            "items": [shop_json(3, 0.0, 1.0, None)],
            "total": 41,
            "page": 1,
            "page_size": 20,
            "query": serde_json::to_string(&params).unwrap_or_default()
        }))
    }

    async fn shop(Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
        if id == 1 {
            (StatusCode::OK, Json(shop_json(1, 12.9, 77.6, None)))
        } else {
            (StatusCode::NOT_FOUND, Json(json!({ "detail": "Shop not found" })))
        }
    }

    async fn products(Path(id): Path<i64>) -> Json<Value> {
        Json(json!({
            "items": [{
                "id": 5,
                "shop_id": id,
                "catalog_item_id": 9,
                "price": 499.0,
                "stock": 0,
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z",
                "catalog_item": null
            }],
            "total": 1,
            "page": 1,
            "page_size": 20
        }))
    }

    fn router() -> Router {
        Router::new()
            .route("/shops/nearby", get(nearby))
            .route("/shops/search", get(search))
            .route("/shops/{id}", get(shop))
            .route("/shops/{id}/products", get(products))
            .route(
                "/preferences",
                get(|| async { Json(json!({ "default_latitude": 12.9, "default_longitude": 77.6 })) })
                    .put(|Json(_): Json<Value>| async { StatusCode::NO_CONTENT }),
            )
    }

    fn sent_query(page: &Page<Shop>) -> HashMap<String, String> {
        serde_json::from_str(page.query.as_deref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_nearby_shops_sends_query_and_fills_distance() {
        let base = spawn_server(router()).await;
        let (services, _) = services_for(&base, AppStorage::in_memory());
        let customer = services.customer();

        let query = customer.nearby_query(Location::new(0.0, 0.0)).radius(5.0);
        let page = customer.nearby_shops(&query).await.unwrap();

        let sent = sent_query(&page);
        assert_eq!(sent["latitude"], "0");
        assert_eq!(sent["radius"], "5");
        assert_eq!(sent["page"], "1");
        assert_eq!(sent["page_size"], "20");

        // Missing distance computed locally, server distance kept
        assert_eq!(page.items[0].distance, Some(111.19));
        assert_eq!(page.items[1].distance, Some(0.4));
    }

    #[tokio::test]
    async fn test_nearby_rejects_bad_input_without_calling() {
        let (services, _) = services_for("http://127.0.0.1:9", AppStorage::in_memory());
        let customer = services.customer();

        let far = customer.nearby_query(Location::new(95.0, 0.0));
        assert!(matches!(customer.nearby_shops(&far).await, Err(ClientError::Validation(_))));

        let wide = customer.nearby_query(Location::new(0.0, 0.0)).radius(500.0);
        assert!(matches!(customer.nearby_shops(&wide).await, Err(ClientError::Validation(_))));
    }

    #[tokio::test]
    async fn test_search_shops() {
        let base = spawn_server(router()).await;
        let (services, _) = services_for(&base, AppStorage::in_memory());
        let customer = services.customer();

        let page = customer
            .search_shops("  phones ", None, PageRequest::default())
            .await
            .unwrap();
        let sent = sent_query(&page);
        assert_eq!(sent["query"], "phones");
        assert!(!sent.contains_key("latitude"));
        assert!(page.has_more());
        assert_eq!(page.items[0].distance, None);

        let page = customer
            .search_shops("phones", Some(Location::new(0.5, 1.0)), PageRequest::default())
            .await
            .unwrap();
        let sent = sent_query(&page);
        assert_eq!(sent["latitude"], "0.5");
        assert_eq!(sent["longitude"], "1");
        assert_eq!(page.items[0].distance, Some(55.6));

        // A zero coordinate is treated as no location at all
        let page = customer
            .search_shops("phones", Some(Location::new(0.0, 77.6)), PageRequest::default())
            .await
            .unwrap();
        assert!(!sent_query(&page).contains_key("latitude"));
        assert_eq!(page.items[0].distance, None);

        assert!(matches!(
            customer.search_shops("   ", None, PageRequest::default()).await,
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_shop_details_and_products() {
        let base = spawn_server(router()).await;
        let (services, _) = services_for(&base, AppStorage::in_memory());
        let customer = services.customer();

        assert_eq!(customer.shop_details(1).await.unwrap().name, "Shop 1");

        let err = customer.shop_details(2).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "Shop not found");

        let products = customer.shop_products(1, PageRequest::default()).await.unwrap();
        assert_eq!(products.items[0].shop_id, 1);
        assert!(!products.items[0].in_stock());
    }

    #[tokio::test]
    async fn test_preferences() {
        let base = spawn_server(router()).await;
        let (services, _) = services_for(&base, AppStorage::in_memory());
        let customer = services.customer();

        let prefs = customer.preferences().await.unwrap();
        assert_eq!(prefs.default_location(), Some(Location::new(12.9, 77.6)));
        assert_eq!(prefs.search_radius, None);

        let update = CustomerPreferences {
            search_radius: Some(15.0),
            ..prefs
        };
        customer.update_preferences(&update).await.unwrap();

        let bad = CustomerPreferences {
            search_radius: Some(0.0),
            ..CustomerPreferences::default()
        };
        assert!(customer.update_preferences(&bad).await.is_err());
    }
}
