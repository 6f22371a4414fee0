//! Online-updatable decorator
//!
//! Wraps another factory so the fitted model can absorb new instances after
//! deployment: updates are buffered and the model is rebuilt through the
//! inner factory once the buffer reaches a threshold. Between rebuilds the
//! existing model keeps serving predictions.

use super::{ModelBuilderFactory, PredictiveModel, UpdatablePredictiveModel};
use crate::data::{AttributesMap, Instance};
use crate::error::Result;
use crate::optimizer::{Configuration, SearchSpace};
use std::sync::Arc;
use tracing::debug;

/// Decorator factory producing [`UpdatableModel`]s.
pub struct UpdatableFactory {
    inner: Arc<dyn ModelBuilderFactory>,
    name: String,
}

impl UpdatableFactory {
    pub fn new(inner: Arc<dyn ModelBuilderFactory>) -> Self {
        let name = format!("updatable-{}", inner.name());
        Self { inner, name }
    }

    /// Build with the concrete updatable type exposed, for callers that
    /// need to feed new instances in later.
    pub fn build_updatable(
        &self,
        configuration: &Configuration,
        instances: &[Instance],
    ) -> Result<UpdatableModel> {
        let rebuild_threshold = configuration
            .get_int("rebuild_threshold")
            .unwrap_or(128)
            .max(1) as usize;
        let current = self.inner.build(configuration, instances)?;

        Ok(UpdatableModel {
            factory: Arc::clone(&self.inner),
            configuration: configuration.clone(),
            seen: instances.to_vec(),
            pending: Vec::new(),
            rebuild_threshold,
            current,
        })
    }
}

impl ModelBuilderFactory for UpdatableFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_space(&self) -> SearchSpace {
        self.inner.parameter_space().merge(
            SearchSpace::new().discrete("rebuild_threshold", [128i64.into(), 512i64.into()]),
        )
    }

    fn build(
        &self,
        configuration: &Configuration,
        instances: &[Instance],
    ) -> Result<Box<dyn PredictiveModel>> {
        Ok(Box::new(self.build_updatable(configuration, instances)?))
    }
}

/// A model that buffers new instances and periodically refits.
pub struct UpdatableModel {
    factory: Arc<dyn ModelBuilderFactory>,
    configuration: Configuration,
    seen: Vec<Instance>,
    pending: Vec<Instance>,
    rebuild_threshold: usize,
    current: Box<dyn PredictiveModel>,
}

impl UpdatableModel {
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn training_len(&self) -> usize {
        self.seen.len()
    }

    /// Force a rebuild with everything buffered so far.
    pub fn rebuild(&mut self) -> Result<()> {
        self.seen.append(&mut self.pending);
        debug!(
            training = self.seen.len(),
            "rebuilding updatable model through inner factory"
        );
        self.current = self
            .factory
            .build(&self.configuration, &self.seen)?;
        Ok(())
    }
}

impl PredictiveModel for UpdatableModel {
    fn predict(&self, attributes: &AttributesMap) -> Result<f64> {
        self.current.predict(attributes)
    }
}

impl UpdatablePredictiveModel for UpdatableModel {
    fn update(&mut self, instances: &[Instance]) -> Result<()> {
        self.pending.extend_from_slice(instances);
        if self.pending.len() >= self.rebuild_threshold {
            self.rebuild()?;
        }
        Ok(())
    }
}
