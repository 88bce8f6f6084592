//! In-process stand-in for the external document store described by the
//! specification. One `RwLock`-guarded collection per entity kind, plus a
//! single write mutex that serializes the mutating paths of the mixture
//! service and step executor — giving "multiple readers, single writer"
//! without per-entity fine-grained locking, which is sufficient for a
//! single-process Store. A deployment backed by a real document store would
//! swap the mutex for that store's transactions behind this same API.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::entities::{Batch, Bin, Mixture, Sku, StepInstance, StepTemplate};
use crate::errors::ServiceError;

#[derive(Default)]
pub struct Store {
    skus: RwLock<HashMap<String, Sku>>,
    batches: RwLock<HashMap<String, Batch>>,
    bins: RwLock<HashMap<String, Bin>>,
    mixtures: RwLock<HashMap<String, Mixture>>,
    step_templates: RwLock<HashMap<String, StepTemplate>>,
    step_instances: RwLock<HashMap<String, StepInstance>>,
    admin_counters: RwLock<HashMap<String, u32>>,
    write_lock: Mutex<()>,
}

impl Store {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serializes the mutating path of a request. Readers never take this.
    pub async fn lock_for_write(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    // -- sku -----------------------------------------------------------

    pub async fn get_sku(&self, id: &str) -> Option<Sku> {
        self.skus.read().await.get(id).cloned()
    }

    pub async fn insert_sku(&self, sku: Sku) -> Result<(), ServiceError> {
        let mut skus = self.skus.write().await;
        if skus.contains_key(&sku.id) {
            return Err(ServiceError::DuplicateResource {
                kind: "sku",
                id: sku.id,
            });
        }
        skus.insert(sku.id.clone(), sku);
        Ok(())
    }

    // -- batch -----------------------------------------------------------

    pub async fn get_batch(&self, id: &str) -> Option<Batch> {
        self.batches.read().await.get(id).cloned()
    }

    pub async fn insert_batch(&self, batch: Batch) -> Result<(), ServiceError> {
        let mut batches = self.batches.write().await;
        if batches.contains_key(&batch.id) {
            return Err(ServiceError::DuplicateResource {
                kind: "batch",
                id: batch.id,
            });
        }
        batches.insert(batch.id.clone(), batch);
        Ok(())
    }

    pub async fn set_batch_qty_remaining(
        &self,
        id: &str,
        qty_remaining: Decimal,
    ) -> Result<(), ServiceError> {
        let mut batches = self.batches.write().await;
        let batch = batches
            .get_mut(id)
            .ok_or_else(|| ServiceError::MissingBatch(id.to_string()))?;
        batch.qty_remaining = qty_remaining;
        Ok(())
    }

    pub async fn clear_produced_by(&self, instance_id: &str) {
        let mut batches = self.batches.write().await;
        for batch in batches.values_mut() {
            if batch.produced_by_instance.as_deref() == Some(instance_id) {
                batch.produced_by_instance = None;
            }
        }
    }

    // -- bin -----------------------------------------------------------

    pub async fn get_bin(&self, id: &str) -> Option<Bin> {
        self.bins.read().await.get(id).cloned()
    }

    pub async fn insert_bin(&self, bin: Bin) -> Result<(), ServiceError> {
        let mut bins = self.bins.write().await;
        if bins.contains_key(&bin.id) {
            return Err(ServiceError::DuplicateResource {
                kind: "bin",
                id: bin.id,
            });
        }
        bins.insert(bin.id.clone(), bin);
        Ok(())
    }

    /// `$inc` the bin's content for `entity_id` by `delta` (may be negative),
    /// pruning the key if it reaches zero. Enforces the "no zero entries"
    /// bin invariant at the single place content changes.
    pub async fn adjust_bin_contents(
        &self,
        bin_id: &str,
        entity_id: &str,
        delta: Decimal,
    ) -> Result<(), ServiceError> {
        let mut bins = self.bins.write().await;
        let bin = bins
            .get_mut(bin_id)
            .ok_or_else(|| ServiceError::MissingBin(bin_id.to_string()))?;
        let entry = bin.contents.entry(entity_id.to_string()).or_insert(Decimal::ZERO);
        *entry += delta;
        if *entry <= Decimal::ZERO {
            bin.contents.remove(entity_id);
        }
        Ok(())
    }

    // -- mixture ---------------------------------------------------------

    pub async fn get_mixture(&self, id: &str) -> Option<Mixture> {
        self.mixtures.read().await.get(id).cloned()
    }

    pub async fn insert_mixture(&self, mixture: Mixture) -> Result<(), ServiceError> {
        let mut mixtures = self.mixtures.write().await;
        if mixtures.contains_key(&mixture.mix_id) {
            return Err(ServiceError::DuplicateResource {
                kind: "mixture",
                id: mixture.mix_id,
            });
        }
        mixtures.insert(mixture.mix_id.clone(), mixture);
        Ok(())
    }

    pub async fn replace_mixture(&self, mixture: Mixture) -> Result<(), ServiceError> {
        let mut mixtures = self.mixtures.write().await;
        if !mixtures.contains_key(&mixture.mix_id) {
            return Err(ServiceError::MissingMixture(mixture.mix_id));
        }
        mixtures.insert(mixture.mix_id.clone(), mixture);
        Ok(())
    }

    // -- step template -----------------------------------------------------

    pub async fn get_step_template(&self, id: &str) -> Option<StepTemplate> {
        self.step_templates.read().await.get(id).cloned()
    }

    pub async fn insert_step_template(&self, tpl: StepTemplate) -> Result<(), ServiceError> {
        let mut templates = self.step_templates.write().await;
        if templates.contains_key(&tpl.template_id) {
            return Err(ServiceError::DuplicateResource {
                kind: "step template",
                id: tpl.template_id,
            });
        }
        templates.insert(tpl.template_id.clone(), tpl);
        Ok(())
    }

    pub async fn replace_step_template(&self, tpl: StepTemplate) -> Result<(), ServiceError> {
        let mut templates = self.step_templates.write().await;
        if !templates.contains_key(&tpl.template_id) {
            return Err(ServiceError::MissingStepTemplate(tpl.template_id));
        }
        templates.insert(tpl.template_id.clone(), tpl);
        Ok(())
    }

    pub async fn delete_step_template(&self, id: &str) -> Result<(), ServiceError> {
        let mut templates = self.step_templates.write().await;
        templates
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::MissingStepTemplate(id.to_string()))
    }

    // -- step instance -----------------------------------------------------

    pub async fn get_step_instance(&self, id: &str) -> Option<StepInstance> {
        self.step_instances.read().await.get(id).cloned()
    }

    pub async fn insert_step_instance(&self, instance: StepInstance) -> Result<(), ServiceError> {
        let mut instances = self.step_instances.write().await;
        if instances.contains_key(&instance.instance_id) {
            return Err(ServiceError::DuplicateResource {
                kind: "step instance",
                id: instance.instance_id,
            });
        }
        instances.insert(instance.instance_id.clone(), instance);
        Ok(())
    }

    pub async fn replace_step_instance(&self, instance: StepInstance) -> Result<(), ServiceError> {
        let mut instances = self.step_instances.write().await;
        if !instances.contains_key(&instance.instance_id) {
            return Err(ServiceError::MissingStepInstance(instance.instance_id));
        }
        instances.insert(instance.instance_id.clone(), instance);
        Ok(())
    }

    pub async fn delete_step_instance(&self, id: &str) -> Result<StepInstance, ServiceError> {
        let mut instances = self.step_instances.write().await;
        instances
            .remove(id)
            .ok_or_else(|| ServiceError::MissingStepInstance(id.to_string()))
    }

    // -- id minter support ---------------------------------------------------

    pub async fn batch_exists(&self, id: &str) -> bool {
        self.batches.read().await.contains_key(id)
    }

    pub async fn bin_exists(&self, id: &str) -> bool {
        self.bins.read().await.contains_key(id)
    }

    pub async fn mixture_exists(&self, id: &str) -> bool {
        self.mixtures.read().await.contains_key(id)
    }

    pub async fn sku_exists(&self, id: &str) -> bool {
        self.skus.read().await.contains_key(id)
    }

    pub async fn step_template_exists(&self, id: &str) -> bool {
        self.step_templates.read().await.contains_key(id)
    }

    pub async fn step_instance_exists(&self, id: &str) -> bool {
        self.step_instances.read().await.contains_key(id)
    }

    pub async fn admin_counter(&self, prefix: &str) -> u32 {
        self.admin_counters.read().await.get(prefix).copied().unwrap_or(0)
    }

    pub async fn set_admin_counter(&self, prefix: &str, next: u32) {
        self.admin_counters
            .write()
            .await
            .insert(prefix.to_string(), next);
    }
}
