use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::sync::Arc;

use crate::builders::{ColumnBuilder, CopyBuilder, DataBuilder, I16ToF32Builder, OverflowPolicy};
use crate::core::Process;
use crate::observability::{MetricsCollector, PipelineMonitor};
use crate::processors::{ColumnRms, Gain, Passthrough};
use super::{Dpu, DpuConfig};

/// A set of DPUs built and chained from a JSON description
pub struct Pipeline {
    dpus: Vec<Arc<Dpu>>,
    collector: MetricsCollector,
}

impl Pipeline {
    /// Build from a document of the form
    ///
    /// ```json
    /// {
    ///   "dpus": [{"id": 1, "name": "scale", "type": "Gain", "config": {"gain": 2.0},
    ///             "input": {"element": "F32", "shape": [256]},
    ///             "output": {"element": "F32", "shape": [256]}, "windows": 4}],
    ///   "chain": [{"from": "scale", "to": "rms", "builder": {"type": "Copy"}, "policy": "SkipData"}]
    /// }
    /// ```
    pub fn from_json(config: Value) -> Result<Self> {
        let mut dpus: Vec<Arc<Dpu>> = Vec::new();
        let mut collector = MetricsCollector::new();

        let dpus_array = config["dpus"]
            .as_array()
            .ok_or(anyhow!("Pipeline missing dpus"))?;
        for dpu_config in dpus_array {
            let desc: DpuConfig = serde_json::from_value(dpu_config.clone())
                .context("Invalid DPU description")?;
            if dpus.iter().any(|d| d.name() == desc.name || d.id() == desc.id) {
                return Err(anyhow!("Duplicate DPU: {} ({})", desc.name, desc.id));
            }

            let dpu_type = dpu_config["type"]
                .as_str()
                .ok_or(anyhow!("DPU {} missing type", desc.name))?;
            let processor = build_processor(dpu_type, &dpu_config["config"])?;

            let dpu = Dpu::with_buffers(&desc, processor)
                .with_context(|| format!("Failed to allocate buffers for DPU {}", desc.name))?;
            collector.register(dpu.metrics());
            dpus.push(dpu);
        }

        if let Some(chain_array) = config["chain"].as_array() {
            for link in chain_array {
                let from = link["from"].as_str().ok_or(anyhow!("Chain link missing from"))?;
                let to = link["to"].as_str().ok_or(anyhow!("Chain link missing to"))?;
                let find = |name: &str| {
                    dpus.iter()
                        .find(|d| d.name() == name)
                        .cloned()
                        .ok_or(anyhow!("Unknown DPU in chain: {}", name))
                };
                let (upstream, downstream) = (find(from)?, find(to)?);

                let builder = build_builder(&link["builder"])?;
                let policy: OverflowPolicy = match link.get("policy") {
                    Some(policy) => serde_json::from_value(policy.clone())
                        .with_context(|| format!("Invalid policy on {} -> {}", from, to))?,
                    None => OverflowPolicy::default(),
                };

                upstream
                    .attach_to_dpu(downstream, builder, policy)
                    .with_context(|| format!("Failed to chain {} -> {}", from, to))?;
            }
        }

        log::debug!("pipeline built with {} DPUs", dpus.len());
        Ok(Self { dpus, collector })
    }

    pub fn dpu(&self, name: &str) -> Option<&Arc<Dpu>> {
        self.dpus.iter().find(|d| d.name() == name)
    }

    pub fn dpus(&self) -> &[Arc<Dpu>] {
        &self.dpus
    }

    /// First DPU that is not fed by another one; sources attach here
    pub fn head(&self) -> Option<&Arc<Dpu>> {
        self.dpus.iter().find(|d| !d.is_chained_as_next())
    }

    /// End of the chain starting at `head`
    pub fn tail(&self) -> Option<Arc<Dpu>> {
        let mut current = self.head()?.clone();
        while let Some(next) = current.next_dpu() {
            current = next;
        }
        Some(current)
    }

    pub fn reset(&self) {
        for dpu in &self.dpus {
            dpu.reset();
        }
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }

    pub fn monitor(&self) -> PipelineMonitor {
        PipelineMonitor::new(self.collector.clone())
    }
}

/// Instantiate a `Process` plugin by type name
pub fn build_processor(dpu_type: &str, config: &Value) -> Result<Box<dyn Process>> {
    let processor: Box<dyn Process> = match dpu_type {
        "Passthrough" => Box::new(Passthrough::new()),
        "Gain" => Box::new(Gain::new(config["gain"].as_f64().unwrap_or(1.0) as f32)),
        "ColumnRms" => Box::new(ColumnRms::new()),
        _ => return Err(anyhow!("Unknown DPU type: {}", dpu_type)),
    };
    Ok(processor)
}

/// Instantiate a data builder from `{"type": ..., ...}`. A missing description means `Copy`.
pub fn build_builder(desc: &Value) -> Result<Box<dyn DataBuilder>> {
    let builder_type = match desc {
        Value::Null => "Copy",
        Value::String(name) => name.as_str(),
        _ => desc["type"].as_str().ok_or(anyhow!("Builder missing type"))?,
    };

    let builder: Box<dyn DataBuilder> = match builder_type {
        "Copy" => Box::new(CopyBuilder::new()),
        "I16ToF32" => match desc["scale"].as_f64() {
            Some(scale) => Box::new(I16ToF32Builder::with_scale(scale as f32)),
            None => Box::new(I16ToF32Builder::new()),
        },
        "Column" => {
            let column = desc["column"].as_u64().ok_or(anyhow!("Column builder missing column"))? as usize;
            let columns = desc["columns"].as_u64().ok_or(anyhow!("Column builder missing columns"))? as usize;
            if column >= columns {
                return Err(anyhow!("Column {} out of range (0..{})", column, columns));
            }
            Box::new(ColumnBuilder::new(column, columns))
        }
        _ => return Err(anyhow!("Unknown builder type: {}", builder_type)),
    };
    Ok(builder)
}
