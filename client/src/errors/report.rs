//! Error banner and reporting sink

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::decode::ContractErrorDecoder;
use crate::ClientError;

/// One reported failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Operation that failed, e.g. `mint_action_reward`
    pub context: String,

    /// User-facing message
    pub message: String,

    /// Error category (see `ClientError::category`)
    pub category: String,

    /// Full technical description
    pub detail: String,

    pub at: DateTime<Utc>,
}

/// Destination for reported errors
#[cfg_attr(test, mockall::automock)]
pub trait ErrorSink: Send + Sync {
    fn report(&self, report: &ErrorReport);
}

/// Sink that writes reports to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, report: &ErrorReport) {
        error!(
            context = %report.context,
            category = %report.category,
            detail = %report.detail,
            "{}",
            report.message
        );
    }
}

/// Process-wide error banner holding the latest message
#[derive(Debug, Default)]
pub struct ErrorBanner {
    current: RwLock<Option<ErrorReport>>,
}

impl ErrorBanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, report: ErrorReport) {
        *self.current.write() = Some(report);
    }

    pub fn current(&self) -> Option<ErrorReport> {
        self.current.read().clone()
    }

    /// Current banner text
    pub fn message(&self) -> Option<String> {
        self.current.read().as_ref().map(|report| report.message.clone())
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }
}

/// Decodes errors, shows them on the banner and forwards them to the sink
#[derive(Clone)]
pub struct ErrorReporter {
    decoder: ContractErrorDecoder,
    banner: Arc<ErrorBanner>,
    sink: Arc<dyn ErrorSink>,
}

impl ErrorReporter {
    /// Create a new reporter
    pub fn new(decoder: ContractErrorDecoder, banner: Arc<ErrorBanner>, sink: Arc<dyn ErrorSink>) -> Self {
        Self { decoder, banner, sink }
    }

    /// Reporter with the default decoder and the tracing sink
    pub fn tracing() -> Self {
        Self::new(
            ContractErrorDecoder::default(),
            Arc::new(ErrorBanner::new()),
            Arc::new(TracingErrorSink),
        )
    }

    pub fn banner(&self) -> &Arc<ErrorBanner> {
        &self.banner
    }

    pub fn decoder(&self) -> &ContractErrorDecoder {
        &self.decoder
    }

    /// Report `error`. User rejections are never surfaced and return `None`.
    pub fn report(&self, context: &str, error: &ClientError) -> Option<String> {
        if error.is_user_rejection() {
            info!(context = context, "User cancelled the request");
            return None;
        }

        let report = ErrorReport {
            context: context.to_string(),
            message: self.decoder.message(error),
            category: error.category().to_string(),
            detail: error.to_string(),
            at: Utc::now(),
        };

        metrics::counter!("love20_errors_total", 1, "category" => error.category());
        self.sink.report(&report);
        let message = report.message.clone();
        self.banner.show(report);
        Some(message)
    }
}
