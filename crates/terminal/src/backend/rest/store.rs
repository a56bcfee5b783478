//! `products` and `sales` over PostgREST.
//!
//! ```text
//! GET    /rest/v1/products?select=*&order=name.asc
//! POST   /rest/v1/products                  (Prefer: return=representation)
//! PATCH  /rest/v1/products?id=eq.{id}
//! DELETE /rest/v1/products?id=eq.{id}
//! POST   /rest/v1/rpc/adjust_stock          {p_product_id, p_delta} -> int | null
//! GET    /rest/v1/sales?select=*&order=created_at.desc
//! POST   /rest/v1/sales
//! DELETE /rest/v1/sales?id=eq.{id}
//! ```

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use countertop_core::{NewProduct, NewSale, Product, ProductId, ProductPatch, Sale, SaleId};

use super::RestBackend;
use crate::backend::{BackendError, Store};

/// Ask PostgREST to echo affected rows so we can tell "no such id" apart
/// from success.
const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Serialize)]
struct AdjustStockArgs {
    p_product_id: ProductId,
    p_delta: i32,
}

impl RestBackend {
    fn table_url(&self, table: &str) -> Result<Url, BackendError> {
        self.endpoint(&format!("rest/v1/{table}"))
    }

    /// URL selecting all columns of `table` in the given order.
    fn select_url(&self, table: &str, order: &str) -> Result<Url, BackendError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", order);
        Ok(url)
    }

    /// URL matching the single row of `table` with the given id.
    fn row_url(&self, table: &str, id: impl std::fmt::Display) -> Result<Url, BackendError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        Ok(url)
    }

    /// Insert one record and return the stored row.
    async fn insert_row<T, B>(&self, table: &str, body: &B) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let request = self
            .request(Method::POST, self.table_url(table)?)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body);
        let rows: Vec<T> = Self::send_json(request).await?;
        rows.into_iter().next().ok_or_else(|| BackendError::Api {
            status: 201,
            message: format!("insert into {table} returned no row"),
        })
    }

    /// Run a row-targeted mutation and fail with `NotFound` if nothing matched.
    async fn mutate_row(
        &self,
        method: Method,
        table: &str,
        id: impl std::fmt::Display + Send,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<(), BackendError> {
        let mut request = self
            .request(method, self.row_url(table, &id)?)
            .header("Prefer", RETURN_REPRESENTATION);
        if let Some(body) = body {
            request = request.json(body);
        }

        let rows: Vec<serde_json::Value> = Self::send_json(request).await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound(format!("{table} {id}")));
        }
        Ok(())
    }
}

impl Store for RestBackend {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        let url = self.select_url("products", "name.asc")?;
        Self::send_json(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    async fn insert_product(&self, product: &NewProduct) -> Result<Product, BackendError> {
        self.insert_row("products", product).await
    }

    #[instrument(skip(self, patch))]
    async fn update_product(&self, id: ProductId, patch: &ProductPatch) -> Result<(), BackendError> {
        self.mutate_row(Method::PATCH, "products", id, Some(patch))
            .await
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, id: ProductId) -> Result<(), BackendError> {
        self.mutate_row(Method::DELETE, "products", id, None::<&()>)
            .await
    }

    #[instrument(skip(self))]
    async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<i32, BackendError> {
        let request = self
            .request(Method::POST, self.endpoint("rest/v1/rpc/adjust_stock")?)
            .json(&AdjustStockArgs {
                p_product_id: id,
                p_delta: delta,
            });

        // The function returns NULL when no row satisfied `stock + delta >= 0`.
        let new_stock: Option<i32> = Self::send_json(request).await?;
        new_stock.ok_or(BackendError::InsufficientStock(id))
    }

    #[instrument(skip(self))]
    async fn list_sales(&self) -> Result<Vec<Sale>, BackendError> {
        let url = self.select_url("sales", "created_at.desc")?;
        Self::send_json(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self, sale), fields(items = sale.items.len(), total = %sale.total_amount))]
    async fn insert_sale(&self, sale: &NewSale) -> Result<Sale, BackendError> {
        self.insert_row("sales", sale).await
    }

    #[instrument(skip(self))]
    async fn delete_sale(&self, id: SaleId) -> Result<(), BackendError> {
        self.mutate_row(Method::DELETE, "sales", id, None::<&()>)
            .await
    }
}
