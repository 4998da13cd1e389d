//! Admin product management
//!
//! At most [`MAX_FEATURED_PRODUCTS`] products may be featured. The cap is a
//! read-then-write check: two admins featuring different products at the
//! same moment can both pass it.

use std::sync::Arc;

use serde_json::json;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    ActivityAction, DEFAULT_LOW_STOCK_THRESHOLD, EntityType, MAX_FEATURED_PRODUCTS, Product,
    ProductCreate, ProductUpdate,
};

use crate::audit::{Actor, AuditLog};
use crate::db::{self, Condition, Store, StoreError, Update};

pub struct CatalogService {
    store: Arc<dyn Store>,
    audit: Arc<AuditLog>,
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    Ok(name.to_string())
}

fn validate_price(price: f64) -> AppResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("price must be a non-negative number"));
    }
    Ok(())
}

fn validate_count(field: &str, value: i64) -> AppResult<()> {
    if value < 0 {
        return Err(AppError::validation(format!("{field} must not be negative")));
    }
    Ok(())
}

fn validate_rating(rating: u8) -> AppResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::validation("rating must be between 1 and 5"));
    }
    Ok(())
}

fn flag(on: bool) -> i64 {
    i64::from(on)
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>, audit: Arc<AuditLog>) -> Self {
        Self { store, audit }
    }

    async fn ensure_featured_slot(&self) -> AppResult<()> {
        let featured = db::products::featured(self.store.as_ref()).await?;
        if featured.len() >= MAX_FEATURED_PRODUCTS {
            return Err(AppError::with_message(
                ErrorCode::FeaturedLimitReached,
                format!("At most {MAX_FEATURED_PRODUCTS} products can be featured"),
            )
            .with_detail("featured", featured.len()));
        }
        Ok(())
    }

    pub async fn create(&self, actor: &Actor, input: ProductCreate) -> AppResult<Product> {
        let name = validate_name(&input.name)?;
        validate_price(input.price)?;
        if let Some(stock) = input.stock {
            validate_count("stock", stock)?;
        }
        if let Some(threshold) = input.low_stock_threshold {
            validate_count("low_stock_threshold", threshold)?;
        }
        if let Some(rating) = input.rating {
            validate_rating(rating)?;
        }

        let featured = input.featured_product.unwrap_or(false);
        if featured {
            self.ensure_featured_slot().await?;
        }

        let now = shared::util::now_millis();
        let product = Product {
            id: shared::util::new_id(),
            name,
            price: input.price,
            overview: input.overview.unwrap_or_default(),
            long_description: input.long_description.unwrap_or_default(),
            stock: input.stock,
            low_stock_threshold: input
                .low_stock_threshold
                .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
            in_stock: match input.stock {
                Some(stock) => stock > 0,
                None => input.in_stock.unwrap_or(true),
            },
            best_seller: input.best_seller.unwrap_or(false),
            featured_product: featured,
            rating: input.rating,
            poster: input.poster,
            image_local: input.image_local,
            size: input.size,
            created_at: now,
            updated_at: now,
        };
        db::products::create(self.store.as_ref(), &product).await?;
        tracing::info!(product_id = %product.id, name = %product.name, "Product created");

        self.audit
            .record(
                actor,
                ActivityAction::Create,
                EntityType::Product,
                &product.id,
                json!({ "name": product.name, "price": product.price, "stock": product.stock }),
            )
            .await;
        Ok(product)
    }

    pub async fn update(&self, actor: &Actor, id: &str, input: ProductUpdate) -> AppResult<Product> {
        let current = db::products::get(self.store.as_ref(), id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound).with_detail("product_id", id))?;

        let mut update = Update::new();
        let mut fields: Vec<&str> = Vec::new();

        if let Some(name) = &input.name {
            update = update.set("name", validate_name(name)?);
            fields.push("name");
        }
        if let Some(price) = input.price {
            validate_price(price)?;
            update = update.set("price", price);
            fields.push("price");
        }
        if let Some(overview) = input.overview {
            update = update.set("overview", overview);
            fields.push("overview");
        }
        if let Some(long_description) = input.long_description {
            update = update.set("long_description", long_description);
            fields.push("long_description");
        }
        if let Some(threshold) = input.low_stock_threshold {
            validate_count("low_stock_threshold", threshold)?;
            update = update.set("low_stock_threshold", threshold);
            fields.push("low_stock_threshold");
        }
        match input.stock {
            Some(stock) => {
                validate_count("stock", stock)?;
                update = update.set("stock", stock).set("in_stock", stock > 0);
                fields.push("stock");
            }
            // Tracked products always derive in_stock from stock
            None if !current.is_tracked() => {
                if let Some(in_stock) = input.in_stock {
                    update = update.set("in_stock", in_stock);
                    fields.push("in_stock");
                }
            }
            None => {}
        }
        if let Some(best_seller) = input.best_seller {
            update = update.set("best_seller", flag(best_seller));
            fields.push("best_seller");
        }
        if let Some(featured) = input.featured_product {
            if featured && !current.featured_product {
                self.ensure_featured_slot().await?;
            }
            update = update.set("featured_product", flag(featured));
            fields.push("featured_product");
        }
        if let Some(rating) = input.rating {
            validate_rating(rating)?;
            update = update.set("rating", rating);
            fields.push("rating");
        }
        if let Some(poster) = input.poster {
            update = update.set("poster", poster);
            fields.push("poster");
        }
        if let Some(image_local) = input.image_local {
            update = update.set("image_local", image_local);
            fields.push("image_local");
        }
        if let Some(size) = input.size {
            update = update.set("size", size);
            fields.push("size");
        }

        if fields.is_empty() {
            return Err(AppError::validation("no fields to update"));
        }
        let update = update.set("updated_at", shared::util::now_millis());

        let product = match db::products::update(
            self.store.as_ref(),
            id,
            update,
            Some(Condition::present("id")),
        )
        .await
        {
            Ok(p) => p,
            Err(StoreError::NotFound | StoreError::Conflict) => {
                return Err(AppError::new(ErrorCode::ProductNotFound).with_detail("product_id", id));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(product_id = %id, fields = ?fields, "Product updated");

        self.audit
            .record(
                actor,
                ActivityAction::Update,
                EntityType::Product,
                id,
                json!({ "name": product.name, "updated_fields": fields }),
            )
            .await;
        Ok(product)
    }

    pub async fn delete(&self, actor: &Actor, id: &str) -> AppResult<()> {
        let product = db::products::get(self.store.as_ref(), id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound).with_detail("product_id", id))?;

        db::products::delete(self.store.as_ref(), id).await?;
        tracing::info!(product_id = %id, "Product deleted");

        self.audit
            .record(
                actor,
                ActivityAction::Delete,
                EntityType::Product,
                id,
                json!({ "name": product.name }),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditQuery;
    use crate::db::memory::MemoryStore;
    use crate::testing::product;

    struct Fixture {
        store: Arc<dyn Store>,
        audit: Arc<AuditLog>,
        catalog: CatalogService,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let (audit, _rx) = AuditLog::new(store.clone(), 8);
        Fixture {
            catalog: CatalogService::new(store.clone(), audit.clone()),
            store,
            audit,
        }
    }

    fn admin() -> Actor {
        Actor {
            user_id: "admin-1".into(),
            email: "admin@codebook.dev".into(),
            name: "Admin".into(),
        }
    }

    async fn seed_featured(f: &Fixture, id: &str) {
        let mut p = product(id, id, 10.0, None);
        p.featured_product = true;
        db::products::create(f.store.as_ref(), &p).await.unwrap();
    }

    #[tokio::test]
    async fn test_fourth_featured_product_is_rejected() {
        let f = fixture();
        for id in ["f1", "f2", "f3"] {
            seed_featured(&f, id).await;
        }
        db::products::create(f.store.as_ref(), &product("p4", "Plain", 10.0, None))
            .await
            .unwrap();

        let err = f
            .catalog
            .update(
                &admin(),
                "p4",
                ProductUpdate {
                    featured_product: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::FeaturedLimitReached);

        let stored = db::products::get(f.store.as_ref(), "p4").await.unwrap().unwrap();
        assert!(!stored.featured_product);
        assert_eq!(db::products::featured(f.store.as_ref()).await.unwrap().len(), 3);

        let err = f
            .catalog
            .create(
                &admin(),
                ProductCreate {
                    name: "Another".into(),
                    price: 5.0,
                    featured_product: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::FeaturedLimitReached);
    }

    #[tokio::test]
    async fn test_refeaturing_a_featured_product_is_allowed() {
        let f = fixture();
        for id in ["f1", "f2", "f3"] {
            seed_featured(&f, id).await;
        }
        let updated = f
            .catalog
            .update(
                &admin(),
                "f1",
                ProductUpdate {
                    featured_product: Some(true),
                    price: Some(12.5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.featured_product);
        assert_eq!(updated.price, 12.5);
    }

    #[tokio::test]
    async fn test_create_derives_in_stock_and_audits() {
        let f = fixture();
        let created = f
            .catalog
            .create(
                &admin(),
                ProductCreate {
                    name: "  Zero to Production ".into(),
                    price: 39.0,
                    stock: Some(0),
                    in_stock: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.name, "Zero to Production");
        assert!(!created.in_stock);
        assert_eq!(created.low_stock_threshold, DEFAULT_LOW_STOCK_THRESHOLD);

        let entries = f.audit.query(AuditQuery::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActivityAction::Create);
        assert_eq!(entries[0].entity_id, created.id);
    }

    #[tokio::test]
    async fn test_update_records_changed_fields() {
        let f = fixture();
        db::products::create(f.store.as_ref(), &product("p1", "Rust", 10.0, Some(0)))
            .await
            .unwrap();

        let updated = f
            .catalog
            .update(
                &admin(),
                "p1",
                ProductUpdate {
                    stock: Some(4),
                    best_seller: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.stock, Some(4));
        assert!(updated.in_stock);
        assert!(updated.best_seller);

        let entries = f.audit.query(AuditQuery::default()).await.unwrap();
        assert_eq!(
            entries[0].details["updated_fields"],
            json!(["stock", "best_seller"])
        );
    }

    #[tokio::test]
    async fn test_in_stock_ignored_for_tracked_product() {
        let f = fixture();
        db::products::create(f.store.as_ref(), &product("p1", "Rust", 10.0, Some(0)))
            .await
            .unwrap();

        let err = f
            .catalog
            .update(
                &admin(),
                "p1",
                ProductUpdate {
                    in_stock: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn test_validation() {
        let f = fixture();
        let err = f
            .catalog
            .create(
                &admin(),
                ProductCreate {
                    name: "Book".into(),
                    price: -1.0,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);

        let err = f
            .catalog
            .create(
                &admin(),
                ProductCreate {
                    name: "Book".into(),
                    price: 1.0,
                    rating: Some(6),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn test_delete_missing_product() {
        let f = fixture();
        let err = f.catalog.delete(&admin(), "ghost").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ProductNotFound);
    }
}
