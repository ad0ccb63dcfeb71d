pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::{
    memory::{InMemoryAccountStore, InMemoryProcessor},
    stripe::StripeProcessor,
};
pub use config::{cli::LocalAccountStore, toml_config::TomlConfig};
pub use core::binding::CustomerPaymentBinding;
pub use domain::model::{
    Account, Card, CardSummary, DefaultPaymentMethod, Instrument, PaymentMethod,
    PaymentMethodReference, RemoteCustomerId,
};
pub use utils::error::{BindingError, Result};
