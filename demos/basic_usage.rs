//! Basic usage example for structured_logger

use std::time::Duration;
use structured_logger::prelude::*;
use structured_logger::{error, info};

fn main() -> Result<()> {
    println!("=== Structured Logger - Basic Usage ===\n");

    let logger = Logger::builder()
        .min_level(LogLevel::Debug)
        .service(ServiceInfo::new("basic-demo", "development", "0.1.0"))
        .transport(SinkKind::Console, LogLevel::Silly, ConsoleAppender::new())
        .build()?;

    println!("--- Leveled logging ---");
    logger.debug("Debug message - detailed debugging information");
    logger.verbose("Verbose message - more detail than info");
    logger.info("Info message - general information");
    logger.warn("Warn message - something to keep an eye on");
    logger.error("Error message - something failed");

    println!("\n--- Formatting macros ---");
    let port = 8080;
    info!(logger, "Server listening on port {}", port);
    error!(logger, "Failed to connect to {}:{}", "db.internal", 5432);

    println!("\n--- Metadata and redaction ---");
    logger.info_with(
        "User signed in",
        meta! {
            "userId" => "u-42",
            "password" => "never printed",
            "session" => meta! { "token" => "also hidden", "ttl" => 3600 },
        },
    );

    println!("\n--- Tagged helpers ---");
    logger.http("GET /health", meta! { "status" => 200 });
    logger.db("SELECT * FROM users", meta! { "rows" => 12 });
    logger.performance("render_dashboard", Duration::from_millis(87), Metadata::new());
    logger.audit("Role granted", meta! { "role" => "admin", "actor" => "u-1" });

    println!("\n--- Error values ---");
    let err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml missing");
    logger.error_from("Startup check failed", &err, meta! { "check" => "config" });

    println!("\n=== Example completed ===");
    Ok(())
}
