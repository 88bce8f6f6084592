//! Mixture lifecycle: create, draw, split, and audit. Mutating operations
//! take the store's write lock so that a draw and a split on the same
//! mixture never interleave.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::allocator;
use crate::entities::{AuditEvent, Mixture, MixtureComponent};
use crate::errors::ServiceError;
use crate::ids::IdMinter;
use crate::store::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentInput {
    pub batch_id: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMixtureInput {
    #[serde(default)]
    pub mix_id: Option<String>,
    pub bin_id: String,
    pub sku_id: String,
    pub components: Vec<ComponentInput>,
    pub created_by: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrawInput {
    pub quantity: Decimal,
    pub created_by: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitInput {
    pub quantity: Decimal,
    pub destination_bin: String,
    #[serde(default)]
    pub new_mix_id: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppendAuditInput {
    pub created_by: String,
    pub event: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitOutcome {
    pub source: Mixture,
    pub created: Mixture,
}

#[derive(Clone)]
pub struct MixtureService {
    store: Arc<Store>,
    ids: Arc<IdMinter>,
}

impl MixtureService {
    pub fn new(store: Arc<Store>, ids: Arc<IdMinter>) -> Self {
        Self { store, ids }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateMixtureInput) -> Result<Mixture, ServiceError> {
        let _guard = self.store.lock_for_write().await;

        let mix_id = match input.mix_id {
            Some(id) => id,
            None => self.ids.next("MIX").await,
        };
        if self.store.mixture_exists(&mix_id).await {
            return Err(ServiceError::DuplicateResource {
                kind: "mixture",
                id: mix_id,
            });
        }
        if self.store.get_bin(&input.bin_id).await.is_none() {
            return Err(ServiceError::MissingBin(input.bin_id));
        }
        if self.store.get_sku(&input.sku_id).await.is_none() {
            return Err(ServiceError::MissingSku(input.sku_id));
        }

        let total: Decimal = input.components.iter().map(|c| c.quantity).sum();
        if total <= Decimal::ZERO {
            return Err(ServiceError::InvalidParams(
                "component quantities must sum to more than zero".to_string(),
            ));
        }

        let bin = self.store.get_bin(&input.bin_id).await.unwrap();
        let mut components = Vec::with_capacity(input.components.len());
        for item in &input.components {
            let batch = self
                .store
                .get_batch(&item.batch_id)
                .await
                .ok_or_else(|| ServiceError::MissingBatch(item.batch_id.clone()))?;
            if batch.sku_id != input.sku_id {
                return Err(ServiceError::InvalidParams(format!(
                    "batch {} does not belong to sku {}",
                    item.batch_id, input.sku_id
                )));
            }
            let in_bin = bin
                .contents
                .get(&item.batch_id)
                .copied()
                .unwrap_or(Decimal::ZERO);
            if in_bin < item.quantity || batch.qty_remaining < item.quantity {
                return Err(ServiceError::InsufficientQuantity {
                    requested: item.quantity.to_string(),
                    available: in_bin.min(batch.qty_remaining).to_string(),
                });
            }
            components.push(MixtureComponent {
                batch_id: item.batch_id.clone(),
                qty_initial: item.quantity,
                qty_remaining: item.quantity,
            });
        }

        for item in &input.components {
            let batch = self.store.get_batch(&item.batch_id).await.unwrap();
            self.store
                .set_batch_qty_remaining(&item.batch_id, batch.qty_remaining - item.quantity)
                .await?;
            self.store
                .adjust_bin_contents(&input.bin_id, &item.batch_id, -item.quantity)
                .await?;
        }

        let mixture = Mixture {
            mix_id: mix_id.clone(),
            sku_id: input.sku_id,
            bin_id: input.bin_id.clone(),
            components,
            qty_total: total,
            audit: vec![AuditEvent::new("created", &input.created_by, None, None)],
        };
        self.store.insert_mixture(mixture.clone()).await?;
        self.store
            .adjust_bin_contents(&input.bin_id, &mix_id, total)
            .await?;
        self.ids.advance_past("MIX", &mix_id).await;

        Ok(mixture)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, mix_id: &str) -> Result<Mixture, ServiceError> {
        self.store
            .get_mixture(mix_id)
            .await
            .ok_or_else(|| ServiceError::MissingMixture(mix_id.to_string()))
    }

    #[instrument(skip(self, input))]
    pub async fn draw(&self, mix_id: &str, input: DrawInput) -> Result<Mixture, ServiceError> {
        let _guard = self.store.lock_for_write().await;

        let mut mixture = self
            .store
            .get_mixture(mix_id)
            .await
            .ok_or_else(|| ServiceError::MissingMixture(mix_id.to_string()))?;

        if input.quantity > mixture.qty_total {
            return Err(ServiceError::InsufficientQuantity {
                requested: input.quantity.to_string(),
                available: mixture.qty_total.to_string(),
            });
        }

        let result = allocator::allocate(&mixture.components, input.quantity)?;
        mixture.components = result.kept;
        mixture.recompute_total();
        mixture.audit.push(AuditEvent::new(
            "draw",
            &input.created_by,
            Some(serde_json::json!({ "extracted": result.extracted, "quantity": input.quantity })),
            input.note,
        ));

        self.store
            .adjust_bin_contents(&mixture.bin_id, mix_id, -input.quantity)
            .await?;
        self.store.replace_mixture(mixture.clone()).await?;

        Ok(mixture)
    }

    #[instrument(skip(self, input))]
    pub async fn split(
        &self,
        mix_id: &str,
        input: SplitInput,
    ) -> Result<SplitOutcome, ServiceError> {
        let _guard = self.store.lock_for_write().await;

        let mut source = self
            .store
            .get_mixture(mix_id)
            .await
            .ok_or_else(|| ServiceError::MissingMixture(mix_id.to_string()))?;

        let new_mix_id = match input.new_mix_id {
            Some(id) => id,
            None => self.ids.next("MIX").await,
        };
        if self.store.mixture_exists(&new_mix_id).await {
            return Err(ServiceError::DuplicateResource {
                kind: "mixture",
                id: new_mix_id,
            });
        }
        if self.store.get_bin(&input.destination_bin).await.is_none() {
            return Err(ServiceError::MissingBin(input.destination_bin));
        }
        if input.quantity > source.qty_total {
            return Err(ServiceError::InsufficientQuantity {
                requested: input.quantity.to_string(),
                available: source.qty_total.to_string(),
            });
        }

        let result = allocator::allocate(&source.components, input.quantity)?;
        source.components = result.kept;
        source.recompute_total();
        source.audit.push(AuditEvent::new(
            "split",
            &input.created_by,
            Some(serde_json::json!({
                "new_mix_id": new_mix_id,
                "destination_bin": input.destination_bin,
            })),
            None,
        ));

        let created = Mixture {
            mix_id: new_mix_id.clone(),
            sku_id: source.sku_id.clone(),
            bin_id: input.destination_bin.clone(),
            components: result.extracted,
            qty_total: input.quantity,
            audit: vec![AuditEvent::new(
                "created-from-split",
                &input.created_by,
                Some(serde_json::json!({ "source_mix_id": mix_id })),
                input.note,
            )],
        };

        self.store
            .adjust_bin_contents(&source.bin_id, mix_id, -input.quantity)
            .await?;
        self.store.replace_mixture(source.clone()).await?;
        self.store.insert_mixture(created.clone()).await?;
        self.store
            .adjust_bin_contents(&input.destination_bin, &new_mix_id, input.quantity)
            .await?;
        self.ids.advance_past("MIX", &new_mix_id).await;

        Ok(SplitOutcome { source, created })
    }

    #[instrument(skip(self, input))]
    pub async fn append_audit(
        &self,
        mix_id: &str,
        input: AppendAuditInput,
    ) -> Result<Mixture, ServiceError> {
        let _guard = self.store.lock_for_write().await;

        if input.created_by.trim().is_empty() || input.event.trim().is_empty() {
            return Err(ServiceError::InvalidParams(
                "created_by and event are required".to_string(),
            ));
        }

        let mut mixture = self
            .store
            .get_mixture(mix_id)
            .await
            .ok_or_else(|| ServiceError::MissingMixture(mix_id.to_string()))?;

        mixture.audit.push(AuditEvent::new(
            input.event,
            input.created_by,
            input.details,
            input.note,
        ));
        self.store.replace_mixture(mixture.clone()).await?;

        Ok(mixture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Batch, Bin, Sku};

    async fn seed(store: &Store, bin_id: &str, sku_id: &str, batches: &[(&str, i64)]) {
        store
            .insert_bin(Bin {
                id: bin_id.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .insert_sku(Sku {
                id: sku_id.to_string(),
                name: "Test SKU".to_string(),
                props: Default::default(),
            })
            .await
            .unwrap();
        for (batch_id, qty) in batches {
            store
                .insert_batch(Batch {
                    id: batch_id.to_string(),
                    sku_id: sku_id.to_string(),
                    qty_remaining: Decimal::from(*qty),
                    produced_by_instance: None,
                    name: None,
                    codes: Vec::new(),
                    props: Default::default(),
                })
                .await
                .unwrap();
            store
                .adjust_bin_contents(bin_id, batch_id, Decimal::from(*qty))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn create_updates_batches_and_bin() {
        let store = Store::new();
        seed(&store, "BIN100", "SKU100", &[("BAT100", 6), ("BAT101", 4)]).await;
        let ids = Arc::new(IdMinter::new(store.clone()));
        let service = MixtureService::new(store.clone(), ids);

        let mixture = service
            .create(CreateMixtureInput {
                mix_id: Some("MIX100".to_string()),
                bin_id: "BIN100".to_string(),
                sku_id: "SKU100".to_string(),
                components: vec![
                    ComponentInput {
                        batch_id: "BAT100".to_string(),
                        quantity: Decimal::from(6),
                    },
                    ComponentInput {
                        batch_id: "BAT101".to_string(),
                        quantity: Decimal::from(4),
                    },
                ],
                created_by: "operator".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(mixture.qty_total, Decimal::from(10));
        let bin = store.get_bin("BIN100").await.unwrap();
        assert_eq!(bin.contents.get("MIX100"), Some(&Decimal::from(10)));
        assert!(!bin.contents.contains_key("BAT100"));
        let batch = store.get_batch("BAT100").await.unwrap();
        assert_eq!(batch.qty_remaining, Decimal::ZERO);
    }

    #[tokio::test]
    async fn draw_splits_components_proportionally() {
        let store = Store::new();
        seed(&store, "BIN100", "SKU100", &[("BAT200", 6), ("BAT201", 4)]).await;
        let ids = Arc::new(IdMinter::new(store.clone()));
        let service = MixtureService::new(store.clone(), ids);
        service
            .create(CreateMixtureInput {
                mix_id: Some("MIX200".to_string()),
                bin_id: "BIN100".to_string(),
                sku_id: "SKU100".to_string(),
                components: vec![
                    ComponentInput {
                        batch_id: "BAT200".to_string(),
                        quantity: Decimal::from(6),
                    },
                    ComponentInput {
                        batch_id: "BAT201".to_string(),
                        quantity: Decimal::from(4),
                    },
                ],
                created_by: "operator".to_string(),
            })
            .await
            .unwrap();

        let mixture = service
            .draw(
                "MIX200",
                DrawInput {
                    quantity: Decimal::from(5),
                    created_by: "operator".to_string(),
                    note: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(mixture.qty_total, Decimal::from(5));
        let remaining: std::collections::HashMap<_, _> = mixture
            .components
            .iter()
            .map(|c| (c.batch_id.clone(), c.qty_remaining))
            .collect();
        assert_eq!(remaining["BAT200"], Decimal::from(3));
        assert_eq!(remaining["BAT201"], Decimal::from(2));
    }

    #[tokio::test]
    async fn split_creates_new_mixture_with_proportions() {
        let store = Store::new();
        seed(&store, "BIN100", "SKU100", &[("BAT300", 8), ("BAT301", 4)]).await;
        store
            .insert_bin(Bin {
                id: "BIN200".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids = Arc::new(IdMinter::new(store.clone()));
        let service = MixtureService::new(store.clone(), ids);
        service
            .create(CreateMixtureInput {
                mix_id: Some("MIX300".to_string()),
                bin_id: "BIN100".to_string(),
                sku_id: "SKU100".to_string(),
                components: vec![
                    ComponentInput {
                        batch_id: "BAT300".to_string(),
                        quantity: Decimal::from(8),
                    },
                    ComponentInput {
                        batch_id: "BAT301".to_string(),
                        quantity: Decimal::from(4),
                    },
                ],
                created_by: "operator".to_string(),
            })
            .await
            .unwrap();

        let outcome = service
            .split(
                "MIX300",
                SplitInput {
                    quantity: Decimal::from(6),
                    destination_bin: "BIN200".to_string(),
                    new_mix_id: Some("MIX301".to_string()),
                    created_by: "splitter".to_string(),
                    note: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.source.qty_total, Decimal::from(6));
        assert_eq!(outcome.created.qty_total, Decimal::from(6));
        assert_eq!(outcome.created.bin_id, "BIN200");

        let dest_bin = store.get_bin("BIN200").await.unwrap();
        assert_eq!(dest_bin.contents.get("MIX301"), Some(&Decimal::from(6)));
    }
}
