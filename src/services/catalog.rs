//! Thin collaborator CRUD for SKUs, bins, and batches — just enough to seed
//! inventory ahead of a mixture or step-instance request. A full CRUD
//! surface (patch/delete, ownership codes) is explicitly out of scope.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use crate::entities::{Batch, Bin, Props, Sku};
use crate::errors::ServiceError;
use crate::store::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSkuInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBinInput {
    pub id: String,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBatchInput {
    pub id: String,
    pub sku_id: String,
    pub qty_remaining: Decimal,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub codes: Vec<String>,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositInput {
    pub id: String,
    pub quantity: Decimal,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<Store>,
}

impl CatalogService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, input))]
    pub async fn create_sku(&self, input: CreateSkuInput) -> Result<Sku, ServiceError> {
        let sku = Sku {
            id: input.id,
            name: input.name,
            props: input.props,
        };
        self.store.insert_sku(sku.clone()).await?;
        Ok(sku)
    }

    #[instrument(skip(self, input))]
    pub async fn create_bin(&self, input: CreateBinInput) -> Result<Bin, ServiceError> {
        let bin = Bin {
            id: input.id,
            contents: Default::default(),
            props: input.props,
        };
        self.store.insert_bin(bin.clone()).await?;
        Ok(bin)
    }

    #[instrument(skip(self, input))]
    pub async fn create_batch(&self, input: CreateBatchInput) -> Result<Batch, ServiceError> {
        if self.store.get_sku(&input.sku_id).await.is_none() {
            return Err(ServiceError::MissingSku(input.sku_id));
        }
        let batch = Batch {
            id: input.id,
            sku_id: input.sku_id,
            qty_remaining: input.qty_remaining,
            produced_by_instance: None,
            name: input.name,
            codes: input.codes,
            props: input.props,
        };
        self.store.insert_batch(batch.clone()).await?;
        Ok(batch)
    }

    #[instrument(skip(self))]
    pub async fn get_batch(&self, id: &str) -> Result<Batch, ServiceError> {
        self.store
            .get_batch(id)
            .await
            .ok_or_else(|| ServiceError::MissingBatch(id.to_string()))
    }

    /// Deposits an existing batch's (or mixture's) quantity into a bin —
    /// the seeding step the reference test suite uses before exercising the
    /// mixture and step-instance paths.
    #[instrument(skip(self, input))]
    pub async fn deposit_into_bin(
        &self,
        bin_id: &str,
        input: DepositInput,
    ) -> Result<Bin, ServiceError> {
        let _guard = self.store.lock_for_write().await;
        if self.store.get_bin(bin_id).await.is_none() {
            return Err(ServiceError::MissingBin(bin_id.to_string()));
        }
        self.store
            .adjust_bin_contents(bin_id, &input.id, input.quantity)
            .await?;
        self.store
            .get_bin(bin_id)
            .await
            .ok_or_else(|| ServiceError::MissingBin(bin_id.to_string()))
    }
}
