use crate::core::{
    Card, ConfigProvider, DefaultPaymentMethod, Instrument, NewCustomer, PaymentMethod,
    PaymentMethodReference, PaymentProcessor, RemoteCustomerId, Result,
};
use crate::utils::error::BindingError;
use crate::utils::validation::validate_payment_method_reference;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

const API_VERSION_HEADER: &str = "Stripe-Version";
const EXPAND_DEFAULT_PAYMENT_METHOD: &str = "invoice_settings.default_payment_method";
const LIST_LIMIT: &str = "100";

/// `PaymentProcessor` over the Stripe REST API.
pub struct StripeProcessor {
    client: Client,
    api_base: String,
    secret_key: String,
    api_version: Option<String>,
}

/// What a request was about; decides how a failed response is classified.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Customer(&'a str),
    PaymentMethod(&'a str),
    /// Pointing a customer's invoice default at an attached payment method.
    DefaultUpdate { customer: &'a str, method: &'a str },
    Other,
}

#[derive(Debug, Deserialize)]
struct CustomerObject {
    id: String,
    object: String,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    invoice_settings: Option<InvoiceSettings>,
}

#[derive(Debug, Deserialize)]
struct InvoiceSettings {
    #[serde(default)]
    default_payment_method: Option<Expandable>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expandable {
    Id(String),
    Object(Box<PaymentMethodObject>),
}

#[derive(Debug, Deserialize)]
struct PaymentMethodObject {
    id: String,
    object: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    card: Option<Card>,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    created: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListObject<T> {
    object: String,
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    param: Option<String>,
}

fn unexpected_object(expected: &str, found: &str) -> BindingError {
    BindingError::InvalidProcessorResponse {
        message: format!("expected object '{}', got '{}'", expected, found),
    }
}

impl TryFrom<PaymentMethodObject> for PaymentMethod {
    type Error = BindingError;

    fn try_from(wire: PaymentMethodObject) -> Result<Self> {
        if wire.object != PaymentMethod::OBJECT {
            return Err(unexpected_object(PaymentMethod::OBJECT, &wire.object));
        }

        let instrument = if wire.kind == "card" {
            let card = wire
                .card
                .ok_or_else(|| BindingError::InvalidProcessorResponse {
                    message: format!("card payment method {} has no card details", wire.id),
                })?;
            Instrument::Card(card)
        } else {
            Instrument::Other { kind: wire.kind }
        };

        Ok(PaymentMethod {
            id: PaymentMethodReference::new(wire.id),
            customer: wire.customer.map(RemoteCustomerId::new),
            instrument,
            created: wire.created.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        })
    }
}

fn classify(status: StatusCode, body: &str, target: Target<'_>) -> BindingError {
    let api_error = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error);

    let message = api_error
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| format!("HTTP {}", status));

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return BindingError::ProcessorUnavailable { message };
    }

    let about_payment_method = api_error
        .as_ref()
        .and_then(|e| e.param.as_deref())
        .is_some_and(|param| param.contains("payment_method"));

    match (status.as_u16(), target) {
        (400 | 402 | 404, Target::PaymentMethod(reference)) => BindingError::InvalidPaymentMethod {
            reference: reference.to_string(),
            message,
        },
        (400 | 402 | 404, Target::DefaultUpdate { method, .. }) if about_payment_method => {
            BindingError::InvalidPaymentMethod {
                reference: method.to_string(),
                message,
            }
        }
        (
            404,
            Target::Customer(customer_id) | Target::DefaultUpdate { customer: customer_id, .. },
        ) => {
            tracing::warn!(
                "Customer {} not found at processor (code: {:?})",
                customer_id,
                api_error.and_then(|e| e.code)
            );
            BindingError::CustomerNotProvisioned {
                account_id: customer_id.to_string(),
            }
        }
        (status, _) => BindingError::ProcessorRejected { status, message },
    }
}

impl StripeProcessor {
    pub fn new<C: ConfigProvider>(config: &C) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BindingError::ConfigError {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base: config.api_base().trim_end_matches('/').to_string(),
            secret_key: config.secret_key().to_string(),
            api_version: config.api_version().map(str::to_string),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        target: Target<'_>,
    ) -> Result<T> {
        let mut request = request.bearer_auth(&self.secret_key);
        if let Some(version) = &self.api_version {
            request = request.header(API_VERSION_HEADER, version);
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Processor response status: {}", status);

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let error = classify(status, &body, target);
        tracing::debug!("Processor request failed: {}", error);
        Err(error)
    }

    async fn retrieve_payment_method(&self, reference: &str) -> Result<PaymentMethod> {
        tracing::debug!("GET /v1/payment_methods/{}", reference);
        let request = self
            .client
            .get(self.url(&format!("/v1/payment_methods/{}", reference)));
        let wire: PaymentMethodObject = self.send(request, Target::PaymentMethod(reference)).await?;
        PaymentMethod::try_from(wire)
    }

    async fn attach_payment_method(
        &self,
        reference: &str,
        customer: &RemoteCustomerId,
    ) -> Result<PaymentMethod> {
        tracing::debug!("POST /v1/payment_methods/{}/attach", reference);
        let request = self
            .client
            .post(self.url(&format!("/v1/payment_methods/{}/attach", reference)))
            .form(&[("customer", customer.as_str())]);
        let wire: PaymentMethodObject = self.send(request, Target::PaymentMethod(reference)).await?;
        PaymentMethod::try_from(wire)
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn create_customer(&self, customer: &NewCustomer) -> Result<RemoteCustomerId> {
        let mut form = vec![("metadata[account_id]", customer.account_id.as_str())];
        if let Some(email) = &customer.email {
            form.push(("email", email.as_str()));
        }
        if let Some(name) = &customer.name {
            form.push(("name", name.as_str()));
        }

        tracing::debug!("POST /v1/customers");
        let request = self.client.post(self.url("/v1/customers")).form(&form);
        let created: CustomerObject = self.send(request, Target::Other).await?;

        if created.object != "customer" {
            return Err(unexpected_object("customer", &created.object));
        }
        Ok(RemoteCustomerId::new(created.id))
    }

    async fn set_default_payment_method(
        &self,
        customer: &RemoteCustomerId,
        method: &PaymentMethodReference,
    ) -> Result<DefaultPaymentMethod> {
        validate_payment_method_reference(method.as_str())?;

        let retrieved = self.retrieve_payment_method(method.as_str()).await?;
        let attached = if retrieved.customer.as_ref() == Some(customer) {
            retrieved
        } else {
            self.attach_payment_method(method.as_str(), customer).await?
        };

        tracing::debug!("POST /v1/customers/{} (default payment method)", customer);
        let request = self
            .client
            .post(self.url(&format!("/v1/customers/{}", customer)))
            .form(&[(
                "invoice_settings[default_payment_method]",
                attached.id.as_str(),
            )]);
        let target = Target::DefaultUpdate {
            customer: customer.as_str(),
            method: attached.id.as_str(),
        };
        let updated: CustomerObject = self.send(request, target).await?;

        if updated.object != "customer" {
            return Err(unexpected_object("customer", &updated.object));
        }
        Ok(attached)
    }

    async fn default_payment_method(
        &self,
        customer: &RemoteCustomerId,
    ) -> Result<Option<DefaultPaymentMethod>> {
        tracing::debug!("GET /v1/customers/{}", customer);
        let request = self
            .client
            .get(self.url(&format!("/v1/customers/{}", customer)))
            .query(&[("expand[]", EXPAND_DEFAULT_PAYMENT_METHOD)]);
        let found: CustomerObject = self
            .send(request, Target::Customer(customer.as_str()))
            .await?;

        if found.object != "customer" {
            return Err(unexpected_object("customer", &found.object));
        }
        if found.deleted {
            return Err(BindingError::CustomerNotProvisioned {
                account_id: customer.to_string(),
            });
        }

        match found
            .invoice_settings
            .and_then(|settings| settings.default_payment_method)
        {
            None => Ok(None),
            Some(Expandable::Object(wire)) => PaymentMethod::try_from(*wire).map(Some),
            // 沒有展開時再查一次
            Some(Expandable::Id(id)) => self.retrieve_payment_method(&id).await.map(Some),
        }
    }

    async fn list_payment_methods(&self, customer: &RemoteCustomerId) -> Result<Vec<PaymentMethod>> {
        tracing::debug!("GET /v1/payment_methods?customer={}", customer);
        let request = self.client.get(self.url("/v1/payment_methods")).query(&[
            ("customer", customer.as_str()),
            ("type", "card"),
            ("limit", LIST_LIMIT),
        ]);
        let list: ListObject<PaymentMethodObject> = self
            .send(request, Target::Customer(customer.as_str()))
            .await?;

        if list.object != "list" {
            return Err(unexpected_object("list", &list.object));
        }

        list.data.into_iter().map(PaymentMethod::try_from).collect()
    }
}
