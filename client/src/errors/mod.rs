//! Contract error decoding and user-facing reporting

pub mod decode;
pub mod report;

pub use decode::{decode_revert, ContractErrorDecoder, DecodedRevert, Locale};
pub use report::{ErrorBanner, ErrorReport, ErrorReporter, ErrorSink, TracingErrorSink};
