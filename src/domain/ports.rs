use crate::domain::model::{
    CardSummary, DefaultPaymentMethod, NewCustomer, PaymentMethod, PaymentMethodReference,
    RemoteCustomerId,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Persistence for the account side of the binding.
pub trait AccountStore: Send + Sync {
    fn read_customer_id(
        &self,
        account_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<RemoteCustomerId>>> + Send;

    /// Write-once: storing a different id over an existing one is an `InvalidAccountState`.
    fn write_customer_id(
        &self,
        account_id: &str,
        customer_id: &RemoteCustomerId,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn write_card_summary(
        &self,
        account_id: &str,
        summary: Option<&CardSummary>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// The external payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_customer(&self, customer: &NewCustomer) -> Result<RemoteCustomerId>;

    /// Attaches `method` to `customer` when needed and marks it default, replacing any
    /// previous default.
    async fn set_default_payment_method(
        &self,
        customer: &RemoteCustomerId,
        method: &PaymentMethodReference,
    ) -> Result<DefaultPaymentMethod>;

    async fn default_payment_method(
        &self,
        customer: &RemoteCustomerId,
    ) -> Result<Option<DefaultPaymentMethod>>;

    async fn list_payment_methods(&self, customer: &RemoteCustomerId) -> Result<Vec<PaymentMethod>>;
}

pub trait ConfigProvider: Send + Sync {
    fn api_base(&self) -> &str;
    fn secret_key(&self) -> &str;
    fn api_version(&self) -> Option<&str>;
    fn request_timeout(&self) -> Duration;
}
