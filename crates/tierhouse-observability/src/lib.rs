//! Tierhouse Observability
//!
//! Prometheus metrics for the tier lifecycle engine.
//!
//! # Features
//!
//! - Ingestion, transition and retrieval counters
//! - Rehydration latency histograms and coalescing counters
//! - Text exposition for operators (`tierctl metrics`)
//!
//! # Usage
//!
//! ```no_run
//! use tierhouse_observability::{exporter, metrics};
//!
//! // Initialize metrics
//! metrics::init();
//!
//! // Render the registry
//! let text = exporter::gather_text().unwrap();
//! println!("{}", text);
//! ```

pub mod exporter;
pub mod metrics;

// Re-export commonly used items
pub use exporter::gather_text;
pub use metrics::{init as init_metrics, REGISTRY};

/// Initialize all observability components
pub fn init() {
    metrics::init();
}
