//! Converter module: one executor per conversion strategy.
//!
//! Every executor implements the same contract: it runs to exactly one
//! outcome, reports monotonic progress through its [`ExecutionContext`], and
//! stops its external process when the context's cancel token fires.
//! [`Execution`] wraps an executor in its own task and turns the outcome into
//! a stream of [`ExecutorEvent`]s ending in a single terminal event.
//!
//! # Example
//!
//! ```ignore
//! use convoy_core::converter::{Execution, ExecutionPlan, ExecutorFactory, ToolExecutorFactory};
//!
//! let factory = ToolExecutorFactory::new(ToolsConfig::default());
//! let executor = factory.create(request.plan);
//! let (handle, mut events) = Execution::new(executor, request).start();
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

mod archive;
mod config;
mod document;
mod error;
mod execution;
mod factory;
pub(crate) mod ffmpeg;
mod pdf;
pub(crate) mod process;
mod progress;
mod raster;
mod traits;
mod types;

pub use archive::ArchiveExecutor;
pub use config::{DependencyStatus, Tool, ToolsConfig};
pub use document::DocumentExecutor;
pub use error::{ConverterError, ErrorKind};
pub use execution::{Execution, ExecutionHandle};
pub use factory::{ToolExecutorFactory, UnsupportedExecutor};
pub use ffmpeg::FfmpegExecutor;
pub use pdf::PdfExecutor;
pub use process::ToolCommand;
pub use progress::{parse_duration, parse_timestamp, percent_of};
pub use raster::{decode_raw, encode, flatten, transcode_image, ImageExecutor, RawImageExecutor};
pub use traits::{Executor, ExecutorFactory};
pub use types::{
    ExecutionContext, ExecutionPlan, ExecutionRequest, ExecutorEvent, ProgressReporter,
};
