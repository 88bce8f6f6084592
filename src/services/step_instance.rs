//! Step-instance execution: a two-phase plan/apply transaction that
//! consumes batches and/or mixtures and produces new batches, mutating bin
//! contents atomically. Nothing is written to the store until every
//! precondition in the plan phase has passed.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use crate::allocator;
use crate::entities::{
    AuditEvent, Batch, ConsumptionRecord, Mixture, Props, ProductionRecord, ResourceType,
    StepInstance,
};
use crate::errors::ServiceError;
use crate::ids::IdMinter;
use crate::store::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumeItemInput {
    pub resource_id: String,
    pub bin_id: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProduceItemInput {
    #[serde(default)]
    pub batch_id: Option<String>,
    pub sku_id: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub bin_id: Option<String>,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStepInstanceInput {
    #[serde(default)]
    pub instance_id: Option<String>,
    pub template_id: String,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: Props,
    pub consumed: Vec<ConsumeItemInput>,
    pub produced: Vec<ProduceItemInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchStepInstanceInput {
    #[serde(default)]
    pub operator: Option<Option<String>>,
    #[serde(default)]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub metadata: Option<Props>,
}

enum ConsumePlan {
    Batch {
        record: ConsumptionRecord,
        new_qty_remaining: Decimal,
    },
    Mixture {
        record: ConsumptionRecord,
        updated: Mixture,
    },
}

struct ProducePlan {
    batch: Batch,
    quantity: Decimal,
    record: ProductionRecord,
}

#[derive(Clone)]
pub struct StepExecutor {
    store: Arc<Store>,
    ids: Arc<IdMinter>,
}

impl StepExecutor {
    pub fn new(store: Arc<Store>, ids: Arc<IdMinter>) -> Self {
        Self { store, ids }
    }

    #[instrument(skip(self, input))]
    pub async fn execute(
        &self,
        input: CreateStepInstanceInput,
    ) -> Result<StepInstance, ServiceError> {
        let _guard = self.store.lock_for_write().await;

        let instance_id = match &input.instance_id {
            Some(id) => id.clone(),
            None => self.ids.next("INS").await,
        };
        if self.store.step_instance_exists(&instance_id).await {
            return Err(ServiceError::DuplicateResource {
                kind: "step instance",
                id: instance_id,
            });
        }
        if self
            .store
            .get_step_template(&input.template_id)
            .await
            .is_none()
        {
            return Err(ServiceError::MissingStepTemplate(input.template_id));
        }

        // Per-request local caches so repeated references to the same bin,
        // batch, or mixture see the cumulative effect of prior items.
        let mut bin_cache: HashMap<String, HashMap<String, Decimal>> = HashMap::new();
        let mut batch_cache: HashMap<String, Decimal> = HashMap::new();
        let mut mixture_cache: HashMap<String, Mixture> = HashMap::new();

        let mut consume_plans = Vec::with_capacity(input.consumed.len());
        for item in &input.consumed {
            let bin_contents = match bin_cache.get(&item.bin_id) {
                Some(contents) => contents.clone(),
                None => {
                    let bin = self
                        .store
                        .get_bin(&item.bin_id)
                        .await
                        .ok_or_else(|| ServiceError::MissingBin(item.bin_id.clone()))?;
                    bin.contents
                }
            };
            let on_hand = bin_contents
                .get(&item.resource_id)
                .copied()
                .unwrap_or(Decimal::ZERO);
            if on_hand < item.quantity {
                return Err(ServiceError::InsufficientQuantity {
                    requested: item.quantity.to_string(),
                    available: on_hand.to_string(),
                });
            }

            if let Some(rest) = item.resource_id.strip_prefix("BAT") {
                let _ = rest;
                let current = match batch_cache.get(&item.resource_id) {
                    Some(qty) => *qty,
                    None => {
                        self.store
                            .get_batch(&item.resource_id)
                            .await
                            .ok_or_else(|| ServiceError::MissingBatch(item.resource_id.clone()))?
                            .qty_remaining
                    }
                };
                if current < item.quantity {
                    return Err(ServiceError::InsufficientQuantity {
                        requested: item.quantity.to_string(),
                        available: current.to_string(),
                    });
                }
                let new_qty = current - item.quantity;
                batch_cache.insert(item.resource_id.clone(), new_qty);
                let entry = bin_cache
                    .entry(item.bin_id.clone())
                    .or_insert(bin_contents);
                let remaining = entry.entry(item.resource_id.clone()).or_insert(on_hand);
                *remaining -= item.quantity;

                consume_plans.push(ConsumePlan::Batch {
                    record: ConsumptionRecord {
                        resource_id: item.resource_id.clone(),
                        resource_type: ResourceType::Batch,
                        bin_id: item.bin_id.clone(),
                        quantity: item.quantity,
                        remaining_qty: new_qty,
                        components: None,
                    },
                    new_qty_remaining: new_qty,
                });
            } else if item.resource_id.starts_with("MIX") {
                let mixture = match mixture_cache.get(&item.resource_id) {
                    Some(m) => m.clone(),
                    None => self
                        .store
                        .get_mixture(&item.resource_id)
                        .await
                        .ok_or_else(|| ServiceError::MissingMixture(item.resource_id.clone()))?,
                };
                if mixture.bin_id != item.bin_id {
                    return Err(ServiceError::InvalidParams(format!(
                        "mixture {} is not held in bin {}",
                        item.resource_id, item.bin_id
                    )));
                }
                if mixture.qty_total < item.quantity {
                    return Err(ServiceError::InsufficientQuantity {
                        requested: item.quantity.to_string(),
                        available: mixture.qty_total.to_string(),
                    });
                }
                let result = allocator::allocate(&mixture.components, item.quantity)?;
                let mut updated = mixture;
                updated.components = result.kept;
                updated.recompute_total();
                updated.audit.push(AuditEvent::new(
                    "step-instance-consume",
                    input.operator.clone().unwrap_or_else(|| "system".to_string()),
                    Some(serde_json::json!({
                        "instance_id": instance_id,
                        "template_id": input.template_id,
                    })),
                    None,
                ));

                let entry = bin_cache
                    .entry(item.bin_id.clone())
                    .or_insert(bin_contents);
                let remaining = entry.entry(item.resource_id.clone()).or_insert(on_hand);
                *remaining -= item.quantity;

                mixture_cache.insert(item.resource_id.clone(), updated.clone());
                consume_plans.push(ConsumePlan::Mixture {
                    record: ConsumptionRecord {
                        resource_id: item.resource_id.clone(),
                        resource_type: ResourceType::Mixture,
                        bin_id: item.bin_id.clone(),
                        quantity: item.quantity,
                        remaining_qty: updated.qty_total,
                        components: Some(result.extracted),
                    },
                    updated,
                });
            } else {
                return Err(ServiceError::InvalidParams(format!(
                    "resource id {} is neither a batch nor a mixture",
                    item.resource_id
                )));
            }
        }

        let mut produce_plans = Vec::with_capacity(input.produced.len());
        for item in &input.produced {
            let batch_id = match &item.batch_id {
                Some(id) => id.clone(),
                None => self.ids.next("BAT").await,
            };
            if self.store.batch_exists(&batch_id).await {
                return Err(ServiceError::DuplicateResource {
                    kind: "batch",
                    id: batch_id,
                });
            }
            if let Some(bin_id) = &item.bin_id {
                if self.store.get_bin(bin_id).await.is_none() {
                    return Err(ServiceError::MissingBin(bin_id.clone()));
                }
            }
            produce_plans.push(ProducePlan {
                batch: Batch {
                    id: batch_id.clone(),
                    sku_id: item.sku_id.clone(),
                    qty_remaining: item.quantity,
                    produced_by_instance: Some(instance_id.clone()),
                    name: None,
                    codes: Vec::new(),
                    props: item.props.clone(),
                },
                quantity: item.quantity,
                record: ProductionRecord {
                    batch_id,
                    sku_id: item.sku_id.clone(),
                    quantity: item.quantity,
                    bin_id: item.bin_id.clone(),
                    props: item.props.clone(),
                },
            });
        }

        // Apply phase: consumption first, then production, in recorded order.
        let mut consumed_records = Vec::with_capacity(consume_plans.len());
        for plan in consume_plans {
            match plan {
                ConsumePlan::Batch {
                    record,
                    new_qty_remaining,
                } => {
                    self.store
                        .set_batch_qty_remaining(&record.resource_id, new_qty_remaining)
                        .await?;
                    self.store
                        .adjust_bin_contents(&record.bin_id, &record.resource_id, -record.quantity)
                        .await?;
                    consumed_records.push(record);
                }
                ConsumePlan::Mixture { record, updated } => {
                    self.store.replace_mixture(updated).await?;
                    self.store
                        .adjust_bin_contents(&record.bin_id, &record.resource_id, -record.quantity)
                        .await?;
                    consumed_records.push(record);
                }
            }
        }

        let mut produced_records = Vec::with_capacity(produce_plans.len());
        for plan in produce_plans {
            self.store.insert_batch(plan.batch).await?;
            if let Some(bin_id) = &plan.record.bin_id {
                self.store
                    .adjust_bin_contents(bin_id, &plan.record.batch_id, plan.quantity)
                    .await?;
            }
            produced_records.push(plan.record);
        }

        let instance = StepInstance {
            instance_id: instance_id.clone(),
            template_id: input.template_id,
            operator: input.operator,
            notes: input.notes,
            metadata: input.metadata,
            consumed: consumed_records,
            produced: produced_records,
        };
        self.store.insert_step_instance(instance.clone()).await?;
        self.ids.advance_past("INS", &instance_id).await;

        Ok(instance)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, instance_id: &str) -> Result<StepInstance, ServiceError> {
        self.store
            .get_step_instance(instance_id)
            .await
            .ok_or_else(|| ServiceError::MissingStepInstance(instance_id.to_string()))
    }

    #[instrument(skip(self, input))]
    pub async fn patch(
        &self,
        instance_id: &str,
        input: PatchStepInstanceInput,
    ) -> Result<StepInstance, ServiceError> {
        let _guard = self.store.lock_for_write().await;
        let mut instance = self
            .store
            .get_step_instance(instance_id)
            .await
            .ok_or_else(|| ServiceError::MissingStepInstance(instance_id.to_string()))?;

        if let Some(operator) = input.operator {
            instance.operator = operator;
        }
        if let Some(notes) = input.notes {
            instance.notes = notes;
        }
        if let Some(metadata) = input.metadata {
            instance.metadata = metadata;
        }

        self.store.replace_step_instance(instance.clone()).await?;
        Ok(instance)
    }

    /// Removes the instance and clears `produced_by_instance` on its
    /// produced batches. Does not restore consumed quantities — see the
    /// design notes on why no compensating reversal is performed.
    #[instrument(skip(self))]
    pub async fn delete(&self, instance_id: &str) -> Result<(), ServiceError> {
        let _guard = self.store.lock_for_write().await;
        self.store.delete_step_instance(instance_id).await?;
        self.store.clear_produced_by(instance_id).await;
        Ok(())
    }
}
