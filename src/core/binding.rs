use crate::core::{
    Account, AccountStore, DefaultPaymentMethod, NewCustomer, PaymentMethod,
    PaymentMethodReference, PaymentProcessor, RemoteCustomerId,
};
use crate::utils::error::{BindingError, Result};
use crate::utils::validation::validate_payment_method_reference;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_PROCESSOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Binds local accounts to billing customers at the payment processor.
///
/// Every method is a single round trip to the processor (plus the account store).
/// Nothing is locked: callers serialize calls for the same account.
pub struct CustomerPaymentBinding<P: PaymentProcessor, S: AccountStore> {
    processor: P,
    store: S,
    timeout: Duration,
}

impl<P: PaymentProcessor, S: AccountStore> CustomerPaymentBinding<P, S> {
    pub fn new(processor: P, store: S) -> Self {
        Self::with_timeout(processor, store, DEFAULT_PROCESSOR_TIMEOUT)
    }

    pub fn with_timeout(processor: P, store: S, timeout: Duration) -> Self {
        Self {
            processor,
            store,
            timeout,
        }
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the account's billing customer, creating it at the processor on first use.
    pub async fn ensure_remote_customer(&self, account: &mut Account) -> Result<RemoteCustomerId> {
        check_account_id(account)?;

        if let Some(existing) = &account.remote_customer_id {
            check_customer_id(account, existing)?;
            // write-once: a no-op when the store already holds this id
            self.store.write_customer_id(&account.id, existing).await?;
            return Ok(existing.clone());
        }

        if let Some(stored) = self.store.read_customer_id(&account.id).await? {
            check_customer_id(account, &stored)?;
            tracing::debug!("Account {} already linked to {}", account.id, stored);
            account.remote_customer_id = Some(stored.clone());
            return Ok(stored);
        }

        tracing::info!("Creating remote customer for account {}", account.id);
        let new_customer = NewCustomer::from(&*account);
        let customer_id = self
            .call("create_customer", self.processor.create_customer(&new_customer))
            .await?;
        check_customer_id(account, &customer_id)?;

        self.store.write_customer_id(&account.id, &customer_id).await?;
        account.remote_customer_id = Some(customer_id.clone());

        tracing::info!("Account {} linked to {}", account.id, customer_id);
        Ok(customer_id)
    }

    /// Makes `reference` the account's default payment method, replacing any previous one.
    pub async fn set_default_payment_method(
        &self,
        account: &mut Account,
        reference: &PaymentMethodReference,
    ) -> Result<()> {
        let customer_id = provisioned_customer(account)?;
        validate_payment_method_reference(reference.as_str())?;

        tracing::debug!("Setting default payment method {} for {}", reference, customer_id);
        let method = self
            .call(
                "set_default_payment_method",
                self.processor.set_default_payment_method(&customer_id, reference),
            )
            .await?;

        let summary = method.card().map(|card| card.summary());
        self.store
            .write_card_summary(&account.id, summary.as_ref())
            .await?;
        account.card = summary;

        tracing::info!(
            "Default payment method for account {} is now {}",
            account.id,
            method.id
        );
        Ok(())
    }

    pub async fn get_default_payment_method(
        &self,
        account: &Account,
    ) -> Result<DefaultPaymentMethod> {
        let customer_id = provisioned_customer(account)?;

        self.call(
            "default_payment_method",
            self.processor.default_payment_method(&customer_id),
        )
        .await?
        .ok_or_else(|| BindingError::NoDefaultPaymentMethod {
            customer_id: customer_id.to_string(),
        })
    }

    pub async fn has_default_payment_method(&self, account: &Account) -> Result<bool> {
        match self.get_default_payment_method(account).await {
            Ok(_) => Ok(true),
            Err(BindingError::CustomerNotProvisioned { .. })
            | Err(BindingError::NoDefaultPaymentMethod { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Card payment methods attached to the account's customer; empty when unprovisioned.
    pub async fn payment_methods(&self, account: &Account) -> Result<Vec<PaymentMethod>> {
        let Some(customer_id) = &account.remote_customer_id else {
            return Ok(Vec::new());
        };

        self.call(
            "list_payment_methods",
            self.processor.list_payment_methods(customer_id),
        )
        .await
    }

    /// Refreshes the cached card summary from the processor's current default.
    pub async fn sync_default_payment_method(&self, account: &mut Account) -> Result<()> {
        let summary = match self.get_default_payment_method(account).await {
            Ok(method) => method.card().map(|card| card.summary()),
            Err(BindingError::NoDefaultPaymentMethod { .. }) => None,
            Err(e) => return Err(e),
        };

        if summary != account.card {
            tracing::debug!("Card summary for account {} changed", account.id);
            self.store
                .write_card_summary(&account.id, summary.as_ref())
                .await?;
            account.card = summary;
        }
        Ok(())
    }

    async fn call<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Processor call {} timed out after {:?}", operation, self.timeout);
                Err(BindingError::ProcessorUnavailable {
                    message: format!("{} timed out after {:?}", operation, self.timeout),
                })
            }
        }
    }
}

fn provisioned_customer(account: &Account) -> Result<RemoteCustomerId> {
    account
        .remote_customer_id
        .clone()
        .ok_or_else(|| BindingError::CustomerNotProvisioned {
            account_id: account.id.clone(),
        })
}

fn check_account_id(account: &Account) -> Result<()> {
    if account.id.trim().is_empty() {
        return Err(BindingError::InvalidAccountState {
            account_id: account.id.clone(),
            message: "account identifier is blank".to_string(),
        });
    }
    Ok(())
}

fn check_customer_id(account: &Account, customer_id: &RemoteCustomerId) -> Result<()> {
    if customer_id.as_str().trim().is_empty() {
        return Err(BindingError::InvalidAccountState {
            account_id: account.id.clone(),
            message: "remote customer identifier is blank".to_string(),
        });
    }
    Ok(())
}
