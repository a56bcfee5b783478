//! Product catalog: listing and the editor's write path.
//!
//! Input is validated locally before any remote call. Writes need a
//! signed-in caller and are last-write-wins; callers refetch the list
//! afterwards instead of patching what they already hold.

use thiserror::Error;
use tracing::{info, instrument};

use countertop_core::{Product, ProductDraft, ProductId, ValidationError};

use crate::backend::{Backend, BackendError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("You must be logged in to manage products.")]
    NotAuthenticated,

    #[error("Product not found.")]
    NotFound(ProductId),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Product catalog service.
pub struct CatalogService<'a, B> {
    backend: &'a B,
}

impl<'a, B: Backend> CatalogService<'a, B> {
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// All products ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Backend` if the fetch fails.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.backend.list_products().await?)
    }

    /// One product by id, looked up in a fresh listing.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no product has that id.
    #[instrument(skip(self))]
    pub async fn get(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.list()
            .await?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(CatalogError::NotFound(id))
    }

    /// Validate editor input and insert a product owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` before any remote call if the
    /// input is invalid, `CatalogError::NotAuthenticated` if nobody is
    /// signed in.
    #[instrument(skip(self, price, stock))]
    pub async fn create(&self, name: &str, price: &str, stock: &str) -> Result<Product, CatalogError> {
        let draft = ProductDraft::parse(name, price, stock)?;
        let owner = self.require_identity().await?;

        let product = self
            .backend
            .insert_product(&draft.into_new_product(owner))
            .await?;
        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Validate editor input and overwrite an existing product.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create`], plus `CatalogError::Backend` with
    /// `NotFound` if the product no longer exists.
    #[instrument(skip(self, price, stock))]
    pub async fn update(
        &self,
        id: ProductId,
        name: &str,
        price: &str,
        stock: &str,
    ) -> Result<(), CatalogError> {
        let draft = ProductDraft::parse(name, price, stock)?;
        self.require_identity().await?;

        self.backend.update_product(id, &draft.into_patch()).await?;
        info!(product_id = %id, "Product updated");
        Ok(())
    }

    /// Delete a product. Confirmation is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Backend` if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), CatalogError> {
        self.backend.delete_product(id).await?;
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    async fn require_identity(&self) -> Result<countertop_core::UserId, CatalogError> {
        self.backend
            .current_user()
            .await?
            .map(|identity| identity.id)
            .ok_or(CatalogError::NotAuthenticated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use countertop_core::Money;

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::backend::memory::Call;

    #[tokio::test]
    async fn test_create_attaches_owner() {
        let backend = MemoryBackend::new();
        let session = backend.sign_in_as("cashier@example.com");
        let service = CatalogService::new(&backend);

        let product = service.create("Widget", "9.99", "5").await.unwrap();
        assert_eq!(product.user_id, session.user.id);
        assert_eq!(product.price, Money::from_cents(999));
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn test_invalid_price_sends_nothing() {
        let backend = MemoryBackend::new();
        backend.sign_in_as("cashier@example.com");
        let product = backend.seed_product("Widget", Money::from_cents(999), 5);
        let service = CatalogService::new(&backend);

        let err = service
            .update(product.id, "Widget", "abc", "5")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Price and stock must be valid numbers.");
        assert!(backend.calls().is_empty());
        assert_eq!(backend.product(product.id).unwrap(), product);
    }

    #[tokio::test]
    async fn test_writes_require_identity() {
        let backend = MemoryBackend::new();
        let service = CatalogService::new(&backend);

        let err = service.create("Widget", "9.99", "5").await.unwrap_err();
        assert_eq!(err.to_string(), "You must be logged in to manage products.");
        assert!(backend.writes().is_empty());
    }

    #[tokio::test]
    async fn test_update_overwrites_fields() {
        let backend = MemoryBackend::new();
        backend.sign_in_as("cashier@example.com");
        let product = backend.seed_product("Widget", Money::from_cents(999), 5);
        let service = CatalogService::new(&backend);

        service
            .update(product.id, "Widget XL", "12.50", "7")
            .await
            .unwrap();
        let stored = backend.product(product.id).unwrap();
        assert_eq!(stored.name, "Widget XL");
        assert_eq!(stored.price, Money::from_cents(1250));
        assert_eq!(stored.stock, 7);
    }

    #[tokio::test]
    async fn test_get_missing_product() {
        let backend = MemoryBackend::new();
        let service = CatalogService::new(&backend);
        let id = ProductId::generate();

        assert!(matches!(
            service.get(id).await,
            Err(CatalogError::NotFound(missing)) if missing == id
        ));
        assert_eq!(backend.calls(), [Call::ListProducts]);
    }
}
