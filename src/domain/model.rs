use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processor-issued billing customer id (`cus_...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteCustomerId(String);

impl RemoteCustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteCustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token naming a payment instrument at the processor, e.g. `pm_card_visa`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethodReference(String);

impl PaymentMethodReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentMethodReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaymentMethodReference {
    fn from(reference: &str) -> Self {
        Self::new(reference)
    }
}

/// Cached brand and last digits of the account's default card. Display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub brand: String,
    pub last_four: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub remote_customer_id: Option<RemoteCustomerId>,
    #[serde(default)]
    pub card: Option<CardSummary>,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
            remote_customer_id: None,
            card: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn has_remote_customer(&self) -> bool {
        self.remote_customer_id.is_some()
    }
}

/// Details sent to the processor when a remote customer is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub account_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl From<&Account> for NewCustomer {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id.clone(),
            email: account.email.clone(),
            name: account.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: i32,
    #[serde(default)]
    pub funding: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Card {
    /// Cards stay valid through the last day of their expiry month.
    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        (self.exp_year, self.exp_month) < (at.year(), at.month())
    }

    pub fn summary(&self) -> CardSummary {
        CardSummary {
            brand: self.brand.clone(),
            last_four: self.last4.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instrument {
    Card(Card),
    Other { kind: String },
}

impl Instrument {
    pub fn type_tag(&self) -> &str {
        match self {
            Instrument::Card(_) => "card",
            Instrument::Other { kind } => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodReference,
    pub customer: Option<RemoteCustomerId>,
    pub instrument: Instrument,
    pub created: Option<DateTime<Utc>>,
}

impl PaymentMethod {
    pub const OBJECT: &'static str = "payment_method";

    pub fn type_tag(&self) -> &'static str {
        Self::OBJECT
    }

    pub fn card(&self) -> Option<&Card> {
        match &self.instrument {
            Instrument::Card(card) => Some(card),
            Instrument::Other { .. } => None,
        }
    }
}

/// The payment method the processor charges when no other is given.
pub type DefaultPaymentMethod = PaymentMethod;
