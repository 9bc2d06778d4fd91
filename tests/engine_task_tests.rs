use eloom_dpu::builders::{CopyBuilder, OverflowPolicy};
use eloom_dpu::core::{
    DataEvent, DataSource, ElementType, EventListener, FnListener, Process, SourceId, WindowFormat, WindowView,
    WindowViewMut,
};
use eloom_dpu::engine::DpuConfig;
use eloom_dpu::processors::Passthrough;
use eloom_dpu::resilience::FailurePolicy;
use eloom_dpu::sources::ManualSource;
use eloom_dpu::{Dpu, DpuError, ProcessingTask};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn config(windows: usize) -> DpuConfig {
    let format = WindowFormat::vector(ElementType::F32, 2);
    DpuConfig {
        id: SourceId(1),
        name: "task_dpu".to_string(),
        input: format.clone(),
        output: format,
        windows,
    }
}

fn count_windows(dpu: &Dpu) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let listener: Arc<dyn EventListener> = Arc::new(FnListener::new(move |_event: &DataEvent<'_>| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));
    dpu.events().add_listener(listener).unwrap();
    count
}

fn manual_source() -> Arc<ManualSource> {
    Arc::new(ManualSource::new(SourceId(100), WindowFormat::vector(ElementType::F32, 1)))
}

async fn wait_for(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

struct Failing;

impl Process for Failing {
    fn name(&self) -> &str {
        "Failing"
    }

    fn process(&mut self, _input: &WindowView<'_>, _output: &mut WindowViewMut<'_>) -> eloom_dpu::Result<()> {
        Err(DpuError::Process("boom".to_string()))
    }
}

#[tokio::test]
async fn test_task_processes_windows() {
    let dpu = Dpu::with_buffers(&config(4), Box::new(Passthrough::new())).unwrap();
    let windows = count_windows(&dpu);
    let task = ProcessingTask::spawn(dpu.clone(), 16, FailurePolicy::Ignore);

    let source = manual_source();
    let as_source: Arc<dyn DataSource> = source.clone();
    assert_ok!(
        task.attach_to_data_source(as_source, Box::new(CopyBuilder::new()), OverflowPolicy::NoDataLoss)
            .await
    );
    assert_eq!(dpu.source_count(), 1);

    source.push_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();

    assert!(wait_for(|| windows.load(Ordering::SeqCst) == 3).await);
    assert_eq!(dpu.metrics().windows_processed(), 3);
    assert_ok!(task.shutdown().await);
}

#[tokio::test]
async fn test_task_serializes_configuration() {
    let dpu = Dpu::new(&config(2), Box::new(Passthrough::new()));
    let task = ProcessingTask::spawn(dpu.clone(), 8, FailurePolicy::Ignore);

    assert_err!(task.set_in_data_buffer(3).await);
    assert_ok!(task.set_in_data_buffer(8 * 3).await);
    assert_ok!(task.set_out_data_buffer(8).await);
    assert_eq!(dpu.ring().map(|r| r.capacity()), Some(3));

    assert_ok!(task.suspend().await);
    assert!(dpu.is_suspended());
    assert_ok!(task.resume().await);
    assert!(!dpu.is_suspended());
    assert_ok!(task.reset().await);

    let detached = task.detach_from_data_source(SourceId(9)).await.unwrap();
    assert!(detached.is_none());
    assert!(task.detach_from_dpu().await.unwrap().is_none());

    assert_ok!(task.shutdown().await);
}

#[tokio::test]
async fn test_task_chain_commands() {
    let first = Dpu::with_buffers(&config(2), Box::new(Passthrough::new())).unwrap();
    let mut second_config = config(2);
    second_config.id = SourceId(2);
    second_config.name = "next".to_string();
    let second = Dpu::with_buffers(&second_config, Box::new(Passthrough::new())).unwrap();
    let windows = count_windows(&second);

    let task = ProcessingTask::spawn(first.clone(), 8, FailurePolicy::Ignore);
    assert_ok!(
        task.attach_to_dpu(second.clone(), Box::new(CopyBuilder::new()), OverflowPolicy::NoDataLoss)
            .await
    );
    assert!(second.is_chained_as_next());

    let source = manual_source();
    let as_source: Arc<dyn DataSource> = source.clone();
    assert_ok!(
        task.attach_to_data_source(as_source, Box::new(CopyBuilder::new()), OverflowPolicy::NoDataLoss)
            .await
    );
    source.push_f32(&[1.0, 2.0]).unwrap();
    assert!(wait_for(|| windows.load(Ordering::SeqCst) == 1).await);

    assert!(task.detach_from_dpu().await.unwrap().is_some());
    assert!(!second.is_chained_as_next());
    assert_ok!(task.shutdown().await);
}

#[tokio::test]
async fn test_shutdown_returns_to_inline_processing() {
    let dpu = Dpu::with_buffers(&config(2), Box::new(Passthrough::new())).unwrap();
    let windows = count_windows(&dpu);
    let source = manual_source();
    let as_source: Arc<dyn DataSource> = source.clone();
    dpu.attach_to_data_source(as_source, Box::new(CopyBuilder::new()), OverflowPolicy::NoDataLoss)
        .unwrap();

    let task = ProcessingTask::spawn(dpu.clone(), 8, FailurePolicy::Ignore);
    assert_ok!(task.shutdown().await);

    source.push_f32(&[1.0, 2.0]).unwrap();
    assert_eq!(windows.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failure_policy_suspend() {
    let dpu = Dpu::with_buffers(&config(2), Box::new(Failing)).unwrap();
    let source = manual_source();
    let as_source: Arc<dyn DataSource> = source.clone();
    dpu.attach_to_data_source(as_source, Box::new(CopyBuilder::new()), OverflowPolicy::NoDataLoss)
        .unwrap();
    let task = ProcessingTask::spawn(dpu.clone(), 8, FailurePolicy::Suspend);

    source.push_f32(&[1.0, 2.0]).unwrap();

    assert!(wait_for(|| dpu.is_suspended()).await);
    assert_eq!(dpu.metrics().process_errors(), 1);
    assert_ok!(task.shutdown().await);
}

#[tokio::test]
async fn test_failure_policy_stop() {
    let dpu = Dpu::with_buffers(&config(2), Box::new(Failing)).unwrap();
    let source = manual_source();
    let as_source: Arc<dyn DataSource> = source.clone();
    dpu.attach_to_data_source(as_source, Box::new(CopyBuilder::new()), OverflowPolicy::NoDataLoss)
        .unwrap();
    let task = ProcessingTask::spawn(dpu.clone(), 8, FailurePolicy::Stop);

    source.push_f32(&[1.0, 2.0]).unwrap();
    assert!(wait_for(|| dpu.metrics().process_errors() == 1).await);

    let mut stopped = false;
    for _ in 0..200 {
        if matches!(task.resume().await, Err(DpuError::TaskStopped)) {
            stopped = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(stopped);
    assert_ok!(task.shutdown().await);
}

#[tokio::test]
async fn test_notify_new_data_ready_drains_ring() {
    let dpu = Dpu::with_buffers(&config(2), Box::new(Passthrough::new())).unwrap();
    let windows = count_windows(&dpu);
    let source = manual_source();
    let as_source: Arc<dyn DataSource> = source.clone();
    dpu.attach_to_data_source(as_source, Box::new(CopyBuilder::new()), OverflowPolicy::NoDataLoss)
        .unwrap();

    // Windows completed before the task existed are picked up on the first notification
    dpu.register_notify_callback(|_dpu: &Dpu| {});
    source.push_f32(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(windows.load(Ordering::SeqCst), 0);

    let task = ProcessingTask::spawn(dpu.clone(), 8, FailurePolicy::Ignore);
    assert!(task.notify_new_data_ready());

    assert!(wait_for(|| windows.load(Ordering::SeqCst) == 2).await);
    assert_ok!(task.shutdown().await);
}
