use std::sync::Arc;

use serde_json::{Map, Value, json};

use jobpool::config::EngineConfig;
use jobpool::job::{Job, TargetResult};
use jobpool::manager::JobManager;

/// Small demonstration batch: square 0..10 on the worker pool.
fn square(args: &[Value], _kwargs: &Map<String, Value>) -> TargetResult {
    let x = args[0].as_i64().unwrap_or(0);
    Ok(json!(x * x))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let manager = JobManager::shared(EngineConfig::default()).await?;

    for i in 0..10 {
        let job = Job::new(
            format!("square {i}"),
            format!("sq-{i}"),
            Arc::new(square),
            vec![json!(i)],
            Map::new(),
        );
        manager.submit(job)?;
    }

    manager.wait().await;

    for i in 0..10 {
        let outcome = manager.take_result(format!("sq-{i}")).await?;
        println!("sq-{i} -> {}", outcome.value().unwrap_or(&Value::Null));
    }

    manager.shutdown().await?;
    Ok(())
}
