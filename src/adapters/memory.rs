use crate::core::{
    Account, AccountStore, Card, CardSummary, DefaultPaymentMethod, Instrument, NewCustomer,
    PaymentMethod, PaymentMethodReference, PaymentProcessor, RemoteCustomerId, Result,
};
use crate::utils::error::BindingError;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Processor double that understands the well-known card test tokens
/// (`pm_card_visa`, `pm_card_mastercard`, ...). Attaching a token mints a new
/// customer-owned payment method id, the same way the real processor does.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessor {
    state: Arc<Mutex<ProcessorState>>,
}

#[derive(Debug, Default)]
struct ProcessorState {
    next_id: u64,
    customers: HashMap<RemoteCustomerId, CustomerRecord>,
    methods: HashMap<PaymentMethodReference, PaymentMethod>,
    unavailable: bool,
    latency: Option<Duration>,
}

#[derive(Debug)]
struct CustomerRecord {
    details: NewCustomer,
    default_method: Option<PaymentMethodReference>,
}

impl ProcessorState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{:014}", prefix, self.next_id)
    }
}

fn test_card(token: &str) -> Option<Card> {
    let valid_until = Utc::now().year() + 5;
    let (brand, last4, funding, exp_year) = match token {
        "pm_card_visa" => ("visa", "4242", "credit", valid_until),
        "pm_card_visa_debit" => ("visa", "5556", "debit", valid_until),
        "pm_card_mastercard" => ("mastercard", "4444", "credit", valid_until),
        "pm_card_amex" => ("amex", "8431", "credit", valid_until),
        "pm_card_discover" => ("discover", "1117", "credit", valid_until),
        "pm_card_chargeDeclinedExpiredCard" => ("visa", "0069", "credit", 2020),
        _ => return None,
    };

    Some(Card {
        brand: brand.to_string(),
        last4: last4.to_string(),
        exp_month: 12,
        exp_year,
        funding: Some(funding.to_string()),
        country: Some("US".to_string()),
    })
}

impl InMemoryProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProcessorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulates a transport outage: every call fails with `ProcessorUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Delays every call, e.g. to exercise the binding's timeout.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    pub fn customer_count(&self) -> usize {
        self.lock().customers.len()
    }

    pub fn customer_details(&self, customer: &RemoteCustomerId) -> Option<NewCustomer> {
        self.lock().customers.get(customer).map(|c| c.details.clone())
    }

    async fn round_trip(&self) -> Result<()> {
        let (latency, unavailable) = {
            let state = self.lock();
            (state.latency, state.unavailable)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if unavailable {
            return Err(BindingError::ProcessorUnavailable {
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

fn unknown_customer(customer: &RemoteCustomerId) -> BindingError {
    BindingError::CustomerNotProvisioned {
        account_id: customer.to_string(),
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryProcessor {
    async fn create_customer(&self, customer: &NewCustomer) -> Result<RemoteCustomerId> {
        self.round_trip().await?;

        let mut state = self.lock();
        let id = RemoteCustomerId::new(state.next_id("cus"));
        state.customers.insert(
            id.clone(),
            CustomerRecord {
                details: customer.clone(),
                default_method: None,
            },
        );
        Ok(id)
    }

    async fn set_default_payment_method(
        &self,
        customer: &RemoteCustomerId,
        method: &PaymentMethodReference,
    ) -> Result<DefaultPaymentMethod> {
        self.round_trip().await?;

        let mut state = self.lock();
        if !state.customers.contains_key(customer) {
            return Err(unknown_customer(customer));
        }

        let attached = match state.methods.get(method).cloned() {
            Some(existing) if existing.customer.as_ref() == Some(customer) => existing,
            Some(_) => {
                return Err(BindingError::InvalidPaymentMethod {
                    reference: method.to_string(),
                    message: "The payment method is attached to another customer".to_string(),
                })
            }
            None => {
                let card = test_card(method.as_str()).ok_or_else(|| {
                    BindingError::InvalidPaymentMethod {
                        reference: method.to_string(),
                        message: format!("No such PaymentMethod: '{}'", method),
                    }
                })?;

                if card.is_expired(Utc::now()) {
                    return Err(BindingError::InvalidPaymentMethod {
                        reference: method.to_string(),
                        message: "Your card has expired.".to_string(),
                    });
                }

                let id = PaymentMethodReference::new(state.next_id("pm"));
                let attached = PaymentMethod {
                    id: id.clone(),
                    customer: Some(customer.clone()),
                    instrument: Instrument::Card(card),
                    created: Some(Utc::now()),
                };
                state.methods.insert(id, attached.clone());
                attached
            }
        };

        if let Some(record) = state.customers.get_mut(customer) {
            record.default_method = Some(attached.id.clone());
        }
        Ok(attached)
    }

    async fn default_payment_method(
        &self,
        customer: &RemoteCustomerId,
    ) -> Result<Option<DefaultPaymentMethod>> {
        self.round_trip().await?;

        let state = self.lock();
        let record = state
            .customers
            .get(customer)
            .ok_or_else(|| unknown_customer(customer))?;

        Ok(record
            .default_method
            .as_ref()
            .and_then(|id| state.methods.get(id))
            .cloned())
    }

    async fn list_payment_methods(&self, customer: &RemoteCustomerId) -> Result<Vec<PaymentMethod>> {
        self.round_trip().await?;

        let state = self.lock();
        if !state.customers.contains_key(customer) {
            return Err(unknown_customer(customer));
        }

        let mut methods: Vec<PaymentMethod> = state
            .methods
            .values()
            .filter(|m| m.customer.as_ref() == Some(customer) && m.card().is_some())
            .cloned()
            .collect();
        // 新的在前
        methods.sort_by(|a, b| b.id.as_str().cmp(a.id.as_str()));
        Ok(methods)
    }
}

/// Map-backed account store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountStore {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, account_id: &str) -> Option<Account> {
        self.lock().get(account_id).cloned()
    }
}

impl AccountStore for InMemoryAccountStore {
    async fn read_customer_id(&self, account_id: &str) -> Result<Option<RemoteCustomerId>> {
        Ok(self
            .lock()
            .get(account_id)
            .and_then(|a| a.remote_customer_id.clone()))
    }

    async fn write_customer_id(
        &self,
        account_id: &str,
        customer_id: &RemoteCustomerId,
    ) -> Result<()> {
        let mut accounts = self.lock();
        let account = accounts
            .entry(account_id.to_string())
            .or_insert_with(|| Account::new(account_id));

        if let Some(existing) = &account.remote_customer_id {
            if existing != customer_id {
                return Err(BindingError::InvalidAccountState {
                    account_id: account_id.to_string(),
                    message: format!("already linked to {}", existing),
                });
            }
        }

        account.remote_customer_id = Some(customer_id.clone());
        Ok(())
    }

    async fn write_card_summary(
        &self,
        account_id: &str,
        summary: Option<&CardSummary>,
    ) -> Result<()> {
        self.lock()
            .entry(account_id.to_string())
            .or_insert_with(|| Account::new(account_id))
            .card = summary.cloned();
        Ok(())
    }
}
