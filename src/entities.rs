//! Plain, store-agnostic domain types. These are persisted as-is by the
//! [`crate::store::Store`] rather than mapped through an ORM, since the
//! persistence layer here is an in-process stand-in for an external
//! document store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type Props = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sku {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub sku_id: String,
    pub qty_remaining: Decimal,
    #[serde(default)]
    pub produced_by_instance: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub codes: Vec<String>,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Bin {
    pub id: String,
    /// entity id (batch or mixture) -> on-hand quantity. Every value here
    /// must stay strictly positive; a key reaching zero is removed.
    #[serde(default)]
    pub contents: HashMap<String, Decimal>,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixtureComponent {
    pub batch_id: String,
    pub qty_initial: Decimal,
    pub qty_remaining: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event: String,
    pub created_by: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AuditEvent {
    pub fn new(
        event: impl Into<String>,
        created_by: impl Into<String>,
        details: Option<serde_json::Value>,
        note: Option<String>,
    ) -> Self {
        Self {
            event: event.into(),
            created_by: created_by.into(),
            timestamp: Utc::now(),
            details,
            note,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mixture {
    pub mix_id: String,
    pub sku_id: String,
    pub bin_id: String,
    pub components: Vec<MixtureComponent>,
    pub qty_total: Decimal,
    #[serde(default)]
    pub audit: Vec<AuditEvent>,
}

impl Mixture {
    pub fn recompute_total(&mut self) {
        self.qty_total = self.components.iter().map(|c| c.qty_remaining).sum();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplateInput {
    pub sku_id: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplateOutput {
    pub sku_id: String,
    #[serde(default)]
    pub form: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplate {
    pub template_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<StepTemplateInput>,
    #[serde(default)]
    pub outputs: Vec<StepTemplateOutput>,
    #[serde(default)]
    pub metadata: Props,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Batch,
    Mixture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub bin_id: String,
    pub quantity: Decimal,
    pub remaining_qty: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<MixtureComponent>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub batch_id: String,
    pub sku_id: String,
    pub quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_id: Option<String>,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInstance {
    pub instance_id: String,
    pub template_id: String,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: Props,
    pub consumed: Vec<ConsumptionRecord>,
    pub produced: Vec<ProductionRecord>,
}
