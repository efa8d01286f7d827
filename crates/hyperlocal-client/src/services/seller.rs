//! Shop and inventory management on the seller service.

use serde::de::IgnoredAny;
use tracing::info;

use hyperlocal_core::validation::{
    validate_coordinates, validate_inventory, validate_phone, validate_price, validate_shop_form, validate_stock,
};
use hyperlocal_core::{InventoryForm, InventoryItem, InventoryUpdate, Page, Shop, ShopForm, ShopStats, ShopUpdate};

use super::PageRequest;
use crate::error::ClientResult;
use crate::transport::ApiClient;

#[derive(Debug, Clone)]
pub struct SellerService {
    client: ApiClient,
}

impl SellerService {
    pub fn new(client: ApiClient) -> Self {
        SellerService { client }
    }

    /// The signed-in seller's shop.
    pub async fn my_shop(&self) -> ClientResult<Shop> {
        self.client.get("/shops/me").await
    }

    pub async fn create_shop(&self, form: &ShopForm) -> ClientResult<Shop> {
        validate_shop_form(form)?;
        let shop: Shop = self.client.post("/shops", form).await?;
        info!(shop_id = shop.id, name = %shop.name, "Shop created");
        Ok(shop)
    }

    pub async fn update_shop(&self, update: &ShopUpdate) -> ClientResult<Shop> {
        if let (Some(latitude), Some(longitude)) = (update.latitude, update.longitude) {
            validate_coordinates(latitude, longitude)?;
        }
        if let Some(number) = &update.whatsapp_number {
            validate_phone(number)?;
        }
        self.client.put("/shops/me", update).await
    }

    pub async fn inventory(&self, page: PageRequest) -> ClientResult<Page<InventoryItem>> {
        let pairs = page.query_pairs()?;
        self.client.get_with_query("/shops/me/products", &pairs).await
    }

    pub async fn add_product(&self, form: &InventoryForm) -> ClientResult<InventoryItem> {
        validate_inventory(form)?;
        self.client.post("/shops/me/products", form).await
    }

    pub async fn update_product(&self, product_id: i64, update: &InventoryUpdate) -> ClientResult<InventoryItem> {
        if let Some(price) = update.price {
            validate_price(price)?;
        }
        if let Some(stock) = update.stock {
            validate_stock(stock)?;
        }
        self.client
            .put(&format!("/shops/me/products/{}", product_id), update)
            .await
    }

    pub async fn remove_product(&self, product_id: i64) -> ClientResult<()> {
        let _: IgnoredAny = self
            .client
            .delete(&format!("/shops/me/products/{}", product_id))
            .await?;
        info!(product_id, "Product removed from inventory");
        Ok(())
    }

    pub async fn shop_stats(&self) -> ClientResult<ShopStats> {
        self.client.get("/shops/me/stats").await
    }
}
