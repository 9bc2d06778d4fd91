use std::sync::Arc;
use std::time::Duration;

use eloom_dpu::builders::{I16ToF32Builder, OverflowPolicy};
use eloom_dpu::core::{DataSource, EventListener, SourceId};
use eloom_dpu::processors::LogListener;
use eloom_dpu::resilience::FailurePolicy;
use eloom_dpu::sources::SineSource;
use eloom_dpu::{Pipeline, ProcessingTask};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("eLooM DPU chain demo");
    println!("====================\n");

    // Sine (i16) -> [scale: Gain] -> [rms: ColumnRms] -> log
    let config = serde_json::json!({
        "dpus": [
            {
                "id": 10,
                "name": "scale",
                "type": "Gain",
                "config": { "gain": 2.0 },
                "input": { "element": "F32", "shape": [256] },
                "output": { "element": "F32", "shape": [256] },
                "windows": 4
            },
            {
                "id": 11,
                "name": "rms",
                "type": "ColumnRms",
                "input": { "element": "F32", "shape": [512, 1] },
                "output": { "element": "F32", "shape": [1] },
                "windows": 2
            }
        ],
        "chain": [
            { "from": "scale", "to": "rms", "builder": { "type": "Copy" }, "policy": "SkipData" }
        ]
    });

    println!("Building pipeline from config...");
    let pipeline = Pipeline::from_json(config)?;
    let head = pipeline
        .head()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("pipeline has no head"))?;
    if let Some(tail) = pipeline.tail() {
        let sink: Arc<dyn EventListener> = Arc::new(LogListener::new("rms"));
        tail.events().add_listener(sink)?;
    }

    let task = ProcessingTask::spawn(head, 32, FailurePolicy::Ignore);

    let sine = Arc::new(SineSource::new(SourceId(1), 440.0, 48000.0, 100));
    let source: Arc<dyn DataSource> = sine.clone();
    task.attach_to_data_source(source, Box::new(I16ToF32Builder::normalized()), OverflowPolicy::NoDataLoss)
        .await?;

    println!("Streaming for 500ms...\n");
    sine.start(Duration::from_millis(2));
    tokio::time::sleep(Duration::from_millis(500)).await;
    sine.stop();

    task.shutdown().await?;

    println!("\n{}", pipeline.monitor().generate_report());
    Ok(())
}
