//! Request logging example
//!
//! Builds the standard sink set from configuration, derives one child logger
//! per request and shows where each record ends up on disk.
//!
//! Run with: cargo run --example request_logging
//! Override settings with LOG_* variables, e.g. LOG_ENVIRONMENT=production

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use structured_logger::prelude::*;

fn handle_request(root: &Logger, id: usize) {
    let request = root.child(meta! {
        "requestId" => format!("req-{}", id),
        "worker" => thread::current().name().unwrap_or("main"),
    });
    request.start_trace(None);

    let started = Instant::now();
    request.http("POST /orders", meta! { "method" => "POST", "path" => "/orders" });

    if id % 3 == 0 {
        request.warn_with(
            "Validation failed",
            meta! {
                "path" => "/orders",
                "method" => "POST",
                "errors" => vec!["quantity must be positive"],
            },
        );
    } else {
        request.db("INSERT INTO orders", meta! { "table" => "orders" });
        request.info_with(
            "Order created",
            meta! { "orderId" => id, "card" => meta! { "creditCard" => "4111111111111111" } },
        );
    }

    request.performance("create_order", started.elapsed(), Metadata::new());
}

fn main() -> Result<()> {
    println!("=== Structured Logger - Request Logging ===\n");

    let dir = std::env::temp_dir().join("structured_logger_demo");
    let config = LoggingConfig {
        dir: dir.clone(),
        service: "orders-api".to_string(),
        ..LoggingConfig::load()?
    };

    let root = Arc::new(Logger::from_config(&config)?);
    root.install_fault_handlers();
    root.info_with("Service starting", meta! { "dir" => dir.display().to_string() });

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let root = Arc::clone(&root);
            thread::Builder::new()
                .name(format!("worker-{}", worker))
                .spawn(move || {
                    for i in 0..5 {
                        handle_request(&root, worker * 5 + i);
                    }
                })
        })
        .collect::<std::io::Result<_>>()?;

    for worker in workers {
        let _ = worker.join();
    }

    // Background job that fails with nobody awaiting it
    let failure = std::io::Error::new(std::io::ErrorKind::TimedOut, "report export timed out");
    root.unhandled_rejection(&failure);

    root.audit("Configuration reloaded", meta! { "actor" => "ops" });
    root.shutdown(Duration::from_secs(5));

    println!("\nMetrics:");
    println!("  Records written: {}", root.metrics().total_logged());
    println!("  Records dropped: {}", root.metrics().dropped_count());
    println!("  Sink failures:   {}", root.metrics().sink_failures());
    println!("\nLog files in {}:", dir.display());
    for name in [
        "application-current.log",
        "error-current.log",
        "exceptions-current.log",
        "rejections-current.log",
    ] {
        println!("  {}", dir.join(name).display());
    }

    println!("\n=== Example completed ===");
    Ok(())
}
