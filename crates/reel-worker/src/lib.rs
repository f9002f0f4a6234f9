//! Prompt-to-video generation worker.
//!
//! This crate provides:
//! - The generation pipeline (script, scene assets, composition)
//! - The job executor with its failure and refund path
//! - Persistence and payment gateways
//! - Worker configuration, job logging and metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod payment;
pub mod persistence;
pub mod pipeline;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, DEFAULT_ERROR_MESSAGE_MAX_LEN};
pub use logging::JobLogger;
pub use payment::{DisabledPayments, PaymentError, PaymentGateway, TelegramStarsGateway};
pub use persistence::{
    InMemoryJobStore, JobStore, JobUpdate, NewVideo, PaymentRecord, StoreError, VideoRecord,
};
pub use pipeline::{GenerationPipeline, PipelineOutput};
pub use worker::Worker;
