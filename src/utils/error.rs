use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("Payment processor unavailable: {message}")]
    ProcessorUnavailable { message: String },

    #[error("Invalid account state for '{account_id}': {message}")]
    InvalidAccountState { account_id: String, message: String },

    #[error("Account '{account_id}' has no remote billing customer")]
    CustomerNotProvisioned { account_id: String },

    #[error("Payment method '{reference}' rejected: {message}")]
    InvalidPaymentMethod { reference: String, message: String },

    #[error("Customer '{customer_id}' has no default payment method")]
    NoDefaultPaymentMethod { customer_id: String },

    #[error("Payment processor rejected the request ({status}): {message}")]
    ProcessorRejected { status: u16, message: String },

    #[error("Unexpected processor response: {message}")]
    InvalidProcessorResponse { message: String },

    #[error("Account storage error: {message}")]
    StorageError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

impl From<reqwest::Error> for BindingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BindingError::InvalidProcessorResponse {
                message: err.to_string(),
            }
        } else {
            BindingError::ProcessorUnavailable {
                message: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Processor,
    Account,
    PaymentMethod,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BindingError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BindingError::ProcessorUnavailable { .. }
            | BindingError::ProcessorRejected { .. }
            | BindingError::InvalidProcessorResponse { .. } => ErrorCategory::Processor,
            BindingError::InvalidAccountState { .. }
            | BindingError::CustomerNotProvisioned { .. } => ErrorCategory::Account,
            BindingError::InvalidPaymentMethod { .. }
            | BindingError::NoDefaultPaymentMethod { .. } => ErrorCategory::PaymentMethod,
            BindingError::StorageError { .. }
            | BindingError::IoError(_)
            | BindingError::SerializationError(_) => ErrorCategory::Storage,
            BindingError::ConfigError { .. }
            | BindingError::ConfigValidationError { .. }
            | BindingError::InvalidConfigValueError { .. }
            | BindingError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 空狀態，不算失敗
            BindingError::NoDefaultPaymentMethod { .. } => ErrorSeverity::Low,
            BindingError::ProcessorUnavailable { .. } => ErrorSeverity::Medium,
            BindingError::InvalidAccountState { .. }
            | BindingError::CustomerNotProvisioned { .. }
            | BindingError::InvalidPaymentMethod { .. }
            | BindingError::ProcessorRejected { .. }
            | BindingError::InvalidProcessorResponse { .. } => ErrorSeverity::High,
            BindingError::StorageError { .. }
            | BindingError::IoError(_)
            | BindingError::SerializationError(_)
            | BindingError::ConfigError { .. }
            | BindingError::ConfigValidationError { .. }
            | BindingError::InvalidConfigValueError { .. }
            | BindingError::MissingConfigError { .. } => ErrorSeverity::Critical,
        }
    }

    /// Only transport-level failures are safe to retry with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BindingError::ProcessorUnavailable { .. })
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BindingError::ProcessorUnavailable { .. } => {
                "Check network connectivity to the payment processor and retry"
            }
            BindingError::InvalidAccountState { .. } => {
                "Fix the account record (identifier and stored customer id) before retrying"
            }
            BindingError::CustomerNotProvisioned { .. } => {
                "Provision the remote customer first (ensure_remote_customer / `provision`)"
            }
            BindingError::InvalidPaymentMethod { .. } => {
                "Use a different payment method reference; this one will not be accepted"
            }
            BindingError::NoDefaultPaymentMethod { .. } => {
                "Set a default payment method for the account"
            }
            BindingError::ProcessorRejected { .. } => {
                "Verify the processor secret key and API version in the configuration"
            }
            BindingError::InvalidProcessorResponse { .. } => {
                "Verify processor.api_base points at a compatible payment processor"
            }
            BindingError::StorageError { .. }
            | BindingError::IoError(_)
            | BindingError::SerializationError(_) => {
                "Check that the account store file exists, is readable and contains valid JSON"
            }
            BindingError::ConfigError { .. }
            | BindingError::ConfigValidationError { .. }
            | BindingError::InvalidConfigValueError { .. }
            | BindingError::MissingConfigError { .. } => {
                "Review the configuration file and environment variables"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BindingError::ProcessorUnavailable { .. } => {
                "The payment processor could not be reached. Please try again.".to_string()
            }
            BindingError::CustomerNotProvisioned { account_id } => {
                format!("Account '{}' is not set up for billing yet.", account_id)
            }
            BindingError::InvalidPaymentMethod { reference, .. } => {
                format!("The payment method '{}' was declined.", reference)
            }
            BindingError::NoDefaultPaymentMethod { .. } => {
                "No default payment method is on file.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BindingError>;
