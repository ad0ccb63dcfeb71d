pub mod binding;

pub use crate::domain::model::{
    Account, Card, CardSummary, DefaultPaymentMethod, Instrument, NewCustomer, PaymentMethod,
    PaymentMethodReference, RemoteCustomerId,
};
pub use crate::domain::ports::{AccountStore, ConfigProvider, PaymentProcessor};
pub use crate::utils::error::Result;
