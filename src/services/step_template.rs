//! Step template CRUD: declarative recipes referenced by step instances.

use std::sync::Arc;

use serde::Deserialize;
use tracing::instrument;

use crate::entities::{Props, StepTemplate, StepTemplateInput, StepTemplateOutput};
use crate::errors::ServiceError;
use crate::store::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStepTemplateInput {
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

#[derive(Debug, Clone, Deserialize)]
pub struct PatchStepTemplateInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Option<Vec<StepTemplateInput>>,
    #[serde(default)]
    pub outputs: Option<Vec<StepTemplateOutput>>,
    #[serde(default)]
    pub metadata: Option<Props>,
}

#[derive(Clone)]
pub struct StepTemplateService {
    store: Arc<Store>,
}

impl StepTemplateService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        input: CreateStepTemplateInput,
    ) -> Result<StepTemplate, ServiceError> {
        let tpl = StepTemplate {
            template_id: input.template_id,
            name: input.name,
            description: input.description,
            inputs: input.inputs,
            outputs: input.outputs,
            metadata: input.metadata,
        };
        self.store.insert_step_template(tpl.clone()).await?;
        Ok(tpl)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, template_id: &str) -> Result<StepTemplate, ServiceError> {
        self.store
            .get_step_template(template_id)
            .await
            .ok_or_else(|| ServiceError::MissingStepTemplate(template_id.to_string()))
    }

    #[instrument(skip(self, input))]
    pub async fn patch(
        &self,
        template_id: &str,
        input: PatchStepTemplateInput,
    ) -> Result<StepTemplate, ServiceError> {
        let mut tpl = self
            .store
            .get_step_template(template_id)
            .await
            .ok_or_else(|| ServiceError::MissingStepTemplate(template_id.to_string()))?;

        if let Some(name) = input.name {
            tpl.name = name;
        }
        if let Some(description) = input.description {
            tpl.description = description;
        }
        if let Some(inputs) = input.inputs {
            tpl.inputs = inputs;
        }
        if let Some(outputs) = input.outputs {
            tpl.outputs = outputs;
        }
        if let Some(metadata) = input.metadata {
            tpl.metadata = metadata;
        }

        self.store.replace_step_template(tpl.clone()).await?;
        Ok(tpl)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, template_id: &str) -> Result<(), ServiceError> {
        self.store.delete_step_template(template_id).await
    }
}
