use crate::{
    entities::commerce::{
        category::{self, Entity as CategoryEntity, Model as CategoryModel},
        product::{self, Entity as ProductEntity, ImageList, Model as ProductModel, SkinType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

fn default_price() -> Decimal {
    Decimal::TEN
}

fn default_description() -> String {
    "This is a product".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[serde(default = "default_price")]
    pub price: Decimal,
    #[serde(default = "default_description")]
    pub description: String,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub skin_type: SkinType,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub images: Option<Vec<String>>,
    pub skin_type: Option<SkinType>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateCategoryInput {
    #[validate(length(min = 1, max = 100, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Product as exposed over HTTP
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub images: Vec<String>,
    pub skin_type: SkinType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductModel> for ProductResponse {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            title: model.title,
            price: model.price,
            description: model.description,
            category_id: model.category_id,
            images: model.images.0,
            skin_type: model.skin_type,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CategoryModel> for CategoryResponse {
    fn from(model: CategoryModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            created_at: model.created_at,
        }
    }
}

/// Filter for product listings
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Products and the categories they are grouped under
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    fn ensure_price(price: Decimal) -> Result<(), ServiceError> {
        if price.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "price: must not be negative".to_string(),
            ));
        }
        if price.normalize().scale() > 2 {
            return Err(ServiceError::ValidationError(
                "price: at most 2 decimal places".to_string(),
            ));
        }
        Ok(())
    }

    async fn ensure_category_exists(&self, category_id: Uuid) -> Result<(), ServiceError> {
        CategoryEntity::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::BadRequest(format!("Unknown category {}", category_id)))
    }

    /// Create a new product
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        input.validate()?;
        Self::ensure_price(input.price)?;
        if let Some(category_id) = input.category_id {
            self.ensure_category_exists(category_id).await?;
        }

        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title.trim().to_string()),
            price: Set(input.price),
            description: Set(input.description),
            category_id: Set(input.category_id),
            images: Set(ImageList(input.images)),
            skin_type: Set(input.skin_type),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;
        info!(product_id = %product.id, "Created product");
        Ok(product)
    }

    /// Get product by ID
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Products matching the given ids; unknown ids are simply absent.
    pub async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<ProductModel>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(ProductEntity::find()
            .filter(product::Column::Id.is_in(ids.iter().copied()))
            .all(&*self.db)
            .await?)
    }

    /// List products, optionally within one category
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let page = filter.page.unwrap_or(1).max(1);

        let mut query = ProductEntity::find().order_by_asc(product::Column::CreatedAt);
        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }

        let paginator = query.paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;
        Ok((products, total))
    }

    /// Update an existing product
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        input.validate()?;
        if let Some(price) = input.price {
            Self::ensure_price(price)?;
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category_exists(category_id).await?;
        }

        let mut active = self.get_product(product_id).await?.into_active_model();
        if let Some(title) = input.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(category_id) = input.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(images) = input.images {
            active.images = Set(ImageList(images));
        }
        if let Some(skin_type) = input.skin_type {
            active.skin_type = Set(skin_type);
        }
        active.updated_at = Set(Utc::now());

        let product = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        Ok(product)
    }

    /// Delete a product
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let result = ProductEntity::delete_by_id(product_id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;
        info!(%product_id, "Deleted product");
        Ok(())
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(
        &self,
        input: CreateCategoryInput,
    ) -> Result<CategoryModel, ServiceError> {
        input.validate()?;

        let category = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::CategoryCreated(category.id))
            .await;
        Ok(category)
    }

    pub async fn get_category(&self, category_id: Uuid) -> Result<CategoryModel, ServiceError> {
        CategoryEntity::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", category_id)))
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        Ok(CategoryEntity::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, input))]
    pub async fn update_category(
        &self,
        category_id: Uuid,
        input: UpdateCategoryInput,
    ) -> Result<CategoryModel, ServiceError> {
        input.validate()?;

        let mut active = self.get_category(category_id).await?.into_active_model();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        Ok(active.update(&*self.db).await?)
    }

    /// Categories still referenced by products cannot be deleted.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), ServiceError> {
        self.get_category(category_id).await?;

        let in_use = ProductEntity::find()
            .filter(product::Column::CategoryId.eq(category_id))
            .count(&*self.db)
            .await?;
        if in_use > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category {} is used by {} product(s)",
                category_id, in_use
            )));
        }

        CategoryEntity::delete_by_id(category_id)
            .exec(&*self.db)
            .await?;
        self.event_sender
            .send_or_log(Event::CategoryDeleted(category_id))
            .await;
        Ok(())
    }
}
