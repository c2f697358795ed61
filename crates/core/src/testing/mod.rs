//! Testing utilities and mock implementations.
//!
//! Lets the segmenter run against a controllable prober and capture encoder
//! diagnostics without installing a tracing subscriber.
//!
//! # Example
//!
//! ```rust,ignore
//! use hlsvod_core::testing::{CollectingSink, MockProber};
//!
//! let prober = Arc::new(MockProber::new());
//! let sink = Arc::new(CollectingSink::new());
//!
//! let segmenter = FfmpegSegmenter::new(config)
//!     .with_prober(prober.clone())
//!     .with_sink(sink.clone());
//! ```

mod collecting_sink;
mod mock_prober;

pub use collecting_sink::CollectingSink;
pub use mock_prober::MockProber;
