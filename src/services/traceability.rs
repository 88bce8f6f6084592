//! Upstream provenance propagation: given a set of queried batches (or step
//! instances, treated as the batches they produced), compute for every
//! source batch a `[lower_bound, upper_bound]` on how much of it could be
//! present in the query, plus annotations explaining any slack.
//!
//! Ported near-verbatim from the reference `TraceabilityService`: a
//! per-step usage map propagated to a fixed point through a work queue,
//! terminating once no step's usage changes by more than `EPSILON`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::instrument;

use crate::entities::{Batch, ResourceType, StepInstance};
use crate::errors::ServiceError;
use crate::store::Store;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Usage {
    min: f64,
    max: f64,
    annotations: HashSet<String>,
}

impl Usage {
    fn zero() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            annotations: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceabilityInput {
    pub batch_id: String,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub annotations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceabilityQuery {
    pub batch_ids: Vec<String>,
    pub step_instance_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceabilityResult {
    pub query: TraceabilityQuery,
    pub inputs: Vec<TraceabilityInput>,
}

pub struct TraceabilityEngine<'a> {
    store: &'a Store,
    batch_cache: HashMap<String, Option<Batch>>,
    step_cache: HashMap<String, Option<StepInstance>>,
    // step_id -> batch_id -> usage
    step_usage: HashMap<String, HashMap<String, Usage>>,
    queue: VecDeque<String>,
    queued: HashSet<String>,
    results: HashMap<String, Usage>,
}

impl<'a> TraceabilityEngine<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            batch_cache: HashMap::new(),
            step_cache: HashMap::new(),
            step_usage: HashMap::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            results: HashMap::new(),
        }
    }

    async fn batch(&mut self, batch_id: &str) -> Option<Batch> {
        if !self.batch_cache.contains_key(batch_id) {
            let batch = self.store.get_batch(batch_id).await;
            self.batch_cache.insert(batch_id.to_string(), batch);
        }
        self.batch_cache.get(batch_id).cloned().flatten()
    }

    async fn step(&mut self, instance_id: &str) -> Option<StepInstance> {
        if !self.step_cache.contains_key(instance_id) {
            let step = self.store.get_step_instance(instance_id).await;
            self.step_cache.insert(instance_id.to_string(), step);
        }
        self.step_cache.get(instance_id).cloned().flatten()
    }

    pub async fn seed(&mut self, batch_id: &str, quantity: f64) {
        if quantity <= 0.0 {
            return;
        }
        self.record_batch_usage(batch_id, quantity, quantity, HashSet::new())
            .await;
    }

    pub async fn run(&mut self) {
        while let Some(step_id) = self.queue.pop_front() {
            self.queued.remove(&step_id);
            self.process_step(&step_id).await;
        }
    }

    pub fn results(&self) -> Vec<TraceabilityInput> {
        let mut ids: Vec<&String> = self.results.keys().collect();
        ids.sort();
        ids.into_iter()
            .map(|batch_id| {
                let entry = &self.results[batch_id];
                let mut annotations: Vec<String> = entry.annotations.iter().cloned().collect();
                annotations.sort();
                TraceabilityInput {
                    batch_id: batch_id.clone(),
                    lower_bound: entry.min,
                    upper_bound: entry.max,
                    annotations,
                }
            })
            .collect()
    }

    async fn record_batch_usage(
        &mut self,
        batch_id: &str,
        lower: f64,
        upper: f64,
        annotations: HashSet<String>,
    ) {
        if upper <= 0.0 {
            return;
        }
        let lower = lower.max(0.0);
        let lower = if lower > upper { upper } else { lower };

        let Some(batch) = self.batch(batch_id).await else {
            return;
        };

        if let Some(step_id) = batch.produced_by_instance.clone() {
            let usage_for_step = self.step_usage.entry(step_id.clone()).or_default();
            let entry = usage_for_step
                .entry(batch_id.to_string())
                .or_insert_with(Usage::zero);

            let prev_min = entry.min;
            let prev_max = entry.max;
            let prev_ann = entry.annotations.len();

            entry.min += lower;
            entry.max += upper;
            if entry.min > entry.max {
                entry.min = entry.max;
            }
            entry.annotations.extend(annotations);

            let changed = entry.min - prev_min > EPSILON
                || entry.max - prev_max > EPSILON
                || entry.annotations.len() != prev_ann;

            if changed && !self.queued.contains(&step_id) {
                self.queue.push_back(step_id.clone());
                self.queued.insert(step_id);
            }
            return;
        }

        let entry = self
            .results
            .entry(batch_id.to_string())
            .or_insert_with(Usage::zero);
        entry.min += lower;
        entry.max += upper;
        entry.annotations.extend(annotations);
    }

    async fn process_step(&mut self, step_id: &str) {
        let Some(step) = self.step(step_id).await else {
            return;
        };

        let mut produced_map: HashMap<String, f64> = HashMap::new();
        for produced in &step.produced {
            let qty = produced.quantity.to_f64().unwrap_or(0.0);
            produced_map.insert(produced.batch_id.clone(), qty);
        }
        if produced_map.is_empty() {
            return;
        }

        let usage_for_step = self.step_usage.entry(step_id.to_string()).or_default();
        let mut output_usages: HashMap<String, Usage> = HashMap::new();
        let mut base_annotations: HashSet<String> = HashSet::new();

        for (batch_id, produced_qty) in &produced_map {
            let (min_usage, max_usage, annotations) = match usage_for_step.get_mut(batch_id) {
                None => (0.0, 0.0, HashSet::new()),
                Some(entry) => {
                    let mut min_usage = entry.min.min(*produced_qty);
                    let mut max_usage = entry.max.min(*produced_qty);
                    if max_usage < min_usage {
                        min_usage = max_usage;
                    }
                    entry.min = min_usage;
                    entry.max = max_usage;
                    (min_usage, max_usage, entry.annotations.clone())
                }
            };
            base_annotations.extend(annotations.clone());
            output_usages.insert(
                batch_id.clone(),
                Usage {
                    min: min_usage,
                    max: max_usage,
                    annotations,
                },
            );
        }

        let query_capacity: f64 = output_usages.values().map(|u| u.max).sum();
        let complement_capacity: f64 = output_usages
            .iter()
            .map(|(batch_id, usage)| produced_map[batch_id] - usage.min)
            .sum();

        if query_capacity <= 0.0 {
            return;
        }

        for consumed in step.consumed.clone() {
            match consumed.resource_type {
                ResourceType::Batch => {
                    let total_in = consumed.quantity.to_f64().unwrap_or(0.0);
                    let lower = (total_in - complement_capacity).max(0.0);
                    let upper = total_in.min(query_capacity);
                    if upper <= 0.0 {
                        continue;
                    }
                    let mut annotations = base_annotations.clone();
                    if lower < upper && complement_capacity > 0.0 {
                        annotations.insert("complement-capacity".to_string());
                    }
                    self.record_batch_usage(&consumed.resource_id, lower, upper, annotations)
                        .await;
                }
                ResourceType::Mixture => {
                    for component in consumed.components.clone().unwrap_or_default() {
                        let total_in = component.qty_initial.to_f64().unwrap_or(0.0);
                        let lower = (total_in - complement_capacity).max(0.0);
                        let upper = total_in.min(query_capacity);
                        if upper <= 0.0 {
                            continue;
                        }
                        let mut annotations = base_annotations.clone();
                        if lower < upper && complement_capacity > 0.0 {
                            annotations.insert("complement-capacity".to_string());
                            annotations.insert("mixture-allocation".to_string());
                        }
                        self.record_batch_usage(&component.batch_id, lower, upper, annotations)
                            .await;
                    }
                }
            }
        }
    }

    async fn initial_quantity(&mut self, batch: &Batch) -> f64 {
        if let Some(instance_id) = batch.produced_by_instance.clone() {
            if let Some(step) = self.step(&instance_id).await {
                if let Some(produced) = step.produced.iter().find(|p| p.batch_id == batch.id) {
                    return produced.quantity.to_f64().unwrap_or(0.0);
                }
            }
        }
        batch.qty_remaining.to_f64().unwrap_or(0.0)
    }
}

#[instrument(skip(store))]
pub async fn query(
    store: Arc<Store>,
    batch_ids: Vec<String>,
    step_instance_ids: Vec<String>,
) -> Result<TraceabilityResult, ServiceError> {
    let mut engine = TraceabilityEngine::new(&store);

    for batch_id in &batch_ids {
        let batch = engine
            .batch(batch_id)
            .await
            .ok_or_else(|| ServiceError::MissingBatch(batch_id.clone()))?;
        let quantity = engine.initial_quantity(&batch).await;
        if quantity > 0.0 {
            engine.seed(batch_id, quantity).await;
        }
    }

    for instance_id in &step_instance_ids {
        let step = engine
            .step(instance_id)
            .await
            .ok_or_else(|| ServiceError::MissingStepInstance(instance_id.clone()))?;
        for produced in step.produced.clone() {
            let qty = produced.quantity.to_f64().unwrap_or(0.0);
            if qty > 0.0 {
                engine.seed(&produced.batch_id, qty).await;
            }
        }
    }

    engine.run().await;

    Ok(TraceabilityResult {
        query: TraceabilityQuery {
            batch_ids,
            step_instance_ids,
        },
        inputs: engine.results(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    use crate::entities::{Bin, Sku};
    use crate::ids::IdMinter;
    use crate::services::mixture::{ComponentInput, CreateMixtureInput, MixtureService};
    use crate::services::step_instance::{
        ConsumeItemInput, CreateStepInstanceInput, ProduceItemInput, StepExecutor,
    };

    async fn bin(store: &Store, id: &str) {
        store
            .insert_bin(Bin {
                id: id.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    async fn sku(store: &Store, id: &str) {
        store
            .insert_sku(Sku {
                id: id.to_string(),
                name: "sku".to_string(),
                props: Default::default(),
            })
            .await
            .unwrap();
    }

    async fn batch(store: &Store, id: &str, sku_id: &str, qty: i64, bin_id: &str) {
        store
            .insert_batch(Batch {
                id: id.to_string(),
                sku_id: sku_id.to_string(),
                qty_remaining: Decimal::from(qty),
                produced_by_instance: None,
                name: None,
                codes: Vec::new(),
                props: Default::default(),
            })
            .await
            .unwrap();
        store
            .adjust_bin_contents(bin_id, id, Decimal::from(qty))
            .await
            .unwrap();
    }

    async fn template(store: &Store, id: &str) {
        store
            .insert_step_template(crate::entities::StepTemplate {
                template_id: id.to_string(),
                name: "step".to_string(),
                description: String::new(),
                inputs: vec![],
                outputs: vec![],
                metadata: Default::default(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn exact_provenance_collapses_bounds() {
        let store = Store::new();
        bin(&store, "BIN1").await;
        bin(&store, "BIN2").await;
        sku(&store, "SKU1").await;
        batch(&store, "BAT100", "SKU1", 10, "BIN1").await;
        batch(&store, "BAT101", "SKU1", 10, "BIN1").await;
        template(&store, "TPL1").await;

        let ids = Arc::new(IdMinter::new(store.clone()));
        let executor = StepExecutor::new(store.clone(), ids);
        executor
            .execute(CreateStepInstanceInput {
                instance_id: Some("INS1".to_string()),
                template_id: "TPL1".to_string(),
                operator: None,
                notes: None,
                metadata: Default::default(),
                consumed: vec![
                    ConsumeItemInput {
                        resource_id: "BAT100".to_string(),
                        bin_id: "BIN1".to_string(),
                        quantity: Decimal::from(10),
                    },
                    ConsumeItemInput {
                        resource_id: "BAT101".to_string(),
                        bin_id: "BIN1".to_string(),
                        quantity: Decimal::from(10),
                    },
                ],
                produced: vec![ProduceItemInput {
                    batch_id: Some("BAT102".to_string()),
                    sku_id: "SKU1".to_string(),
                    quantity: Decimal::from(10),
                    bin_id: Some("BIN2".to_string()),
                }],
            })
            .await
            .unwrap();

        let result = query(store, vec!["BAT102".to_string()], vec![]).await.unwrap();
        let by_id: HashMap<_, _> = result.inputs.iter().map(|i| (i.batch_id.clone(), i)).collect();
        assert_eq!(by_id["BAT100"].lower_bound, 10.0);
        assert_eq!(by_id["BAT100"].upper_bound, 10.0);
        assert!(by_id["BAT100"].annotations.is_empty());
        assert_eq!(by_id["BAT101"].lower_bound, 10.0);
        assert_eq!(by_id["BAT101"].upper_bound, 10.0);
    }

    #[tokio::test]
    async fn mixture_uncertainty_ranges_match_scenario() {
        let store = Store::new();
        bin(&store, "BIN1").await;
        bin(&store, "BIN2").await;
        sku(&store, "SKU1").await;
        batch(&store, "BAT200", "SKU1", 8, "BIN1").await;
        batch(&store, "BAT201", "SKU1", 2, "BIN1").await;
        template(&store, "TPL1").await;

        let ids = Arc::new(IdMinter::new(store.clone()));
        let mixtures = MixtureService::new(store.clone(), ids.clone());
        mixtures
            .create(CreateMixtureInput {
                mix_id: Some("MIX200".to_string()),
                bin_id: "BIN1".to_string(),
                sku_id: "SKU1".to_string(),
                components: vec![
                    ComponentInput {
                        batch_id: "BAT200".to_string(),
                        quantity: Decimal::from(8),
                    },
                    ComponentInput {
                        batch_id: "BAT201".to_string(),
                        quantity: Decimal::from(2),
                    },
                ],
                created_by: "operator".to_string(),
            })
            .await
            .unwrap();

        let executor = StepExecutor::new(store.clone(), ids);
        executor
            .execute(CreateStepInstanceInput {
                instance_id: Some("INS2".to_string()),
                template_id: "TPL1".to_string(),
                operator: None,
                notes: None,
                metadata: Default::default(),
                consumed: vec![ConsumeItemInput {
                    resource_id: "MIX200".to_string(),
                    bin_id: "BIN1".to_string(),
                    quantity: Decimal::from(10),
                }],
                produced: vec![
                    ProduceItemInput {
                        batch_id: Some("BAT202".to_string()),
                        sku_id: "SKU1".to_string(),
                        quantity: Decimal::from(7),
                        bin_id: Some("BIN2".to_string()),
                    },
                    ProduceItemInput {
                        batch_id: Some("BAT203".to_string()),
                        sku_id: "SKU1".to_string(),
                        quantity: Decimal::from(2),
                        bin_id: Some("BIN2".to_string()),
                    },
                    ProduceItemInput {
                        batch_id: Some("BAT204".to_string()),
                        sku_id: "SKU1".to_string(),
                        quantity: Decimal::from(1),
                        bin_id: Some("BIN2".to_string()),
                    },
                ],
            })
            .await
            .unwrap();

        let result = query(store.clone(), vec!["BAT202".to_string()], vec![])
            .await
            .unwrap();
        let by_id: HashMap<_, _> = result.inputs.iter().map(|i| (i.batch_id.clone(), i)).collect();
        assert_eq!(by_id["BAT200"].lower_bound, 5.0);
        assert_eq!(by_id["BAT200"].upper_bound, 7.0);
        assert!(by_id["BAT200"]
            .annotations
            .contains(&"mixture-allocation".to_string()));
        assert_eq!(by_id["BAT201"].lower_bound, 0.0);
        assert_eq!(by_id["BAT201"].upper_bound, 2.0);

        let result2 = query(
            store,
            vec!["BAT202".to_string(), "BAT203".to_string()],
            vec![],
        )
        .await
        .unwrap();
        let by_id2: HashMap<_, _> = result2
            .inputs
            .iter()
            .map(|i| (i.batch_id.clone(), i))
            .collect();
        assert_eq!(by_id2["BAT200"].lower_bound, 7.0);
        assert_eq!(by_id2["BAT200"].upper_bound, 8.0);
        assert_eq!(by_id2["BAT201"].lower_bound, 1.0);
        assert_eq!(by_id2["BAT201"].upper_bound, 2.0);
    }
}
