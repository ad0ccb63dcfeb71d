use anyhow::Result;
use card_binding::domain::ports::{ConfigProvider, PaymentProcessor};
use card_binding::{
    Account, BindingError, CustomerPaymentBinding, InMemoryAccountStore, RemoteCustomerId,
    StripeProcessor,
};
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

const SECRET: &str = "sk_test_4eC39HqLyjWDarjtT1zdp7dc";

struct TestConfig {
    api_base: String,
    api_version: Option<String>,
    timeout: Duration,
}

impl ConfigProvider for TestConfig {
    fn api_base(&self) -> &str {
        &self.api_base
    }

    fn secret_key(&self) -> &str {
        SECRET
    }

    fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }
}

fn processor_for(server: &MockServer) -> StripeProcessor {
    StripeProcessor::new(&TestConfig {
        api_base: server.base_url(),
        api_version: Some("2023-10-16".to_string()),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn visa_payment_method(id: &str, customer: Option<&str>) -> serde_json::Value {
    json!({
        "id": id,
        "object": "payment_method",
        "type": "card",
        "created": 1700000000,
        "customer": customer,
        "livemode": false,
        "card": {
            "brand": "visa",
            "last4": "4242",
            "exp_month": 8,
            "exp_year": 2034,
            "funding": "credit",
            "country": "US"
        }
    })
}

#[tokio::test]
async fn test_default_card_round_trip_over_http() -> Result<()> {
    let server = MockServer::start_async().await;

    let create_customer = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/customers")
                .header("authorization", format!("Bearer {}", SECRET))
                .header("stripe-version", "2023-10-16")
                .x_www_form_urlencoded_tuple("email", "we_can_set_the_default_card@cashier-test.com")
                .x_www_form_urlencoded_tuple("metadata[account_id]", "we_can_set_the_default_card");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"id": "cus_123", "object": "customer"}));
        })
        .await;

    let retrieve_token = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/payment_methods/pm_card_visa");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(visa_payment_method("pm_card_visa", None));
        })
        .await;

    let attach = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/payment_methods/pm_card_visa/attach")
                .x_www_form_urlencoded_tuple("customer", "cus_123");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(visa_payment_method("pm_1Attached", Some("cus_123")));
        })
        .await;

    let update_customer = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/customers/cus_123")
                .x_www_form_urlencoded_tuple(
                    "invoice_settings[default_payment_method]",
                    "pm_1Attached",
                );
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "id": "cus_123",
                    "object": "customer",
                    "invoice_settings": {"default_payment_method": "pm_1Attached"}
                }));
        })
        .await;

    let fetch_customer = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/customers/cus_123")
                .query_param("expand[]", "invoice_settings.default_payment_method");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "id": "cus_123",
                    "object": "customer",
                    "invoice_settings": {
                        "default_payment_method": visa_payment_method("pm_1Attached", Some("cus_123"))
                    }
                }));
        })
        .await;

    let store = InMemoryAccountStore::new();
    let binding = CustomerPaymentBinding::new(processor_for(&server), store.clone());
    let mut account = Account::new("we_can_set_the_default_card")
        .with_email("we_can_set_the_default_card@cashier-test.com");

    binding.ensure_remote_customer(&mut account).await?;
    binding
        .set_default_payment_method(&mut account, &"pm_card_visa".into())
        .await?;
    let card = binding.get_default_payment_method(&account).await?;

    create_customer.assert_async().await;
    retrieve_token.assert_async().await;
    attach.assert_async().await;
    update_customer.assert_async().await;
    fetch_customer.assert_async().await;

    assert_eq!(account.remote_customer_id, Some(RemoteCustomerId::new("cus_123")));
    assert_eq!(card.type_tag(), "payment_method");
    assert_eq!(card.instrument.type_tag(), "card");
    assert_eq!(card.id.as_str(), "pm_1Attached");
    assert_eq!(
        store.get("we_can_set_the_default_card").and_then(|a| a.card).map(|c| c.last_four),
        Some("4242".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_already_attached_method_skips_attach() -> Result<()> {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/payment_methods/pm_1Owned");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(visa_payment_method("pm_1Owned", Some("cus_123")));
        })
        .await;

    let attach = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/payment_methods/pm_1Owned/attach");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(visa_payment_method("pm_1Owned", Some("cus_123")));
        })
        .await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/customers/cus_123");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"id": "cus_123", "object": "customer"}));
        })
        .await;

    let processor = processor_for(&server);
    let method = processor
        .set_default_payment_method(&RemoteCustomerId::new("cus_123"), &"pm_1Owned".into())
        .await?;

    assert_eq!(method.id.as_str(), "pm_1Owned");
    assert_eq!(attach.hits_async().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_unknown_payment_method_is_rejected() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/payment_methods/pm_card_invalid_token");
            then.status(404)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "error": {
                        "type": "invalid_request_error",
                        "code": "resource_missing",
                        "message": "No such PaymentMethod: 'pm_card_invalid_token'",
                        "param": "payment_method"
                    }
                }));
        })
        .await;

    let processor = processor_for(&server);
    let result = processor
        .set_default_payment_method(
            &RemoteCustomerId::new("cus_123"),
            &"pm_card_invalid_token".into(),
        )
        .await;

    match result {
        Err(BindingError::InvalidPaymentMethod { reference, message }) => {
            assert_eq!(reference, "pm_card_invalid_token");
            assert!(message.contains("No such PaymentMethod"));
        }
        other => panic!("expected InvalidPaymentMethod, got {:?}", other),
    }
}

#[tokio::test]
async fn test_declined_attach_is_invalid_payment_method() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/payment_methods/pm_card_visa_chargeDeclined");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(visa_payment_method("pm_card_visa_chargeDeclined", None));
        })
        .await;

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/payment_methods/pm_card_visa_chargeDeclined/attach");
            then.status(402)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "error": {
                        "type": "card_error",
                        "code": "card_declined",
                        "message": "Your card was declined."
                    }
                }));
        })
        .await;

    let processor = processor_for(&server);
    let result = processor
        .set_default_payment_method(
            &RemoteCustomerId::new("cus_123"),
            &"pm_card_visa_chargeDeclined".into(),
        )
        .await;

    assert!(matches!(
        result,
        Err(BindingError::InvalidPaymentMethod { .. })
    ));
}

#[tokio::test]
async fn test_rejected_default_update_names_the_payment_method() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/payment_methods/pm_1Owned");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(visa_payment_method("pm_1Owned", Some("cus_123")));
        })
        .await;

    let update = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/customers/cus_123")
                .x_www_form_urlencoded_tuple("invoice_settings[default_payment_method]", "pm_1Owned");
            then.status(400)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "error": {
                        "type": "invalid_request_error",
                        "code": "resource_missing",
                        "message": "No such PaymentMethod: 'pm_1Owned'",
                        "param": "invoice_settings[default_payment_method]"
                    }
                }));
        })
        .await;

    let processor = processor_for(&server);
    let err = processor
        .set_default_payment_method(&RemoteCustomerId::new("cus_123"), &"pm_1Owned".into())
        .await
        .expect_err("default update rejected");

    update.assert_async().await;
    assert!(matches!(
        err,
        BindingError::InvalidPaymentMethod { ref reference, .. } if reference == "pm_1Owned"
    ));
    assert!(err.user_friendly_message().contains("'pm_1Owned'"));
}

#[tokio::test]
async fn test_customer_without_default_returns_none() -> Result<()> {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/customers/cus_123");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "id": "cus_123",
                    "object": "customer",
                    "invoice_settings": {"default_payment_method": null}
                }));
        })
        .await;

    let processor = processor_for(&server);
    let method = processor
        .default_payment_method(&RemoteCustomerId::new("cus_123"))
        .await?;

    assert!(method.is_none());
    Ok(())
}

#[tokio::test]
async fn test_unexpanded_default_is_fetched_separately() -> Result<()> {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/customers/cus_123");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "id": "cus_123",
                    "object": "customer",
                    "invoice_settings": {"default_payment_method": "pm_1Default"}
                }));
        })
        .await;

    let retrieve = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/payment_methods/pm_1Default");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(visa_payment_method("pm_1Default", Some("cus_123")));
        })
        .await;

    let processor = processor_for(&server);
    let method = processor
        .default_payment_method(&RemoteCustomerId::new("cus_123"))
        .await?
        .expect("default payment method");

    retrieve.assert_async().await;
    assert_eq!(method.id.as_str(), "pm_1Default");
    Ok(())
}

#[tokio::test]
async fn test_deleted_customer_is_not_provisioned() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/customers/cus_gone");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"id": "cus_gone", "object": "customer", "deleted": true}));
        })
        .await;

    let processor = processor_for(&server);
    let result = processor
        .default_payment_method(&RemoteCustomerId::new("cus_gone"))
        .await;

    assert!(matches!(
        result,
        Err(BindingError::CustomerNotProvisioned { .. })
    ));
}

#[tokio::test]
async fn test_list_payment_methods() -> Result<()> {
    let server = MockServer::start_async().await;

    let list = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/payment_methods")
                .query_param("customer", "cus_123")
                .query_param("type", "card");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "object": "list",
                    "has_more": false,
                    "data": [
                        visa_payment_method("pm_1", Some("cus_123")),
                        visa_payment_method("pm_2", Some("cus_123"))
                    ]
                }));
        })
        .await;

    let processor = processor_for(&server);
    let methods = processor
        .list_payment_methods(&RemoteCustomerId::new("cus_123"))
        .await?;

    list.assert_async().await;
    assert_eq!(methods.len(), 2);
    assert!(methods.iter().all(|m| m.card().is_some()));
    Ok(())
}

#[tokio::test]
async fn test_server_errors_are_processor_unavailable() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/customers");
            then.status(503);
        })
        .await;

    let processor = processor_for(&server);
    let binding = CustomerPaymentBinding::new(processor, InMemoryAccountStore::new());
    let mut account = Account::new("outage");

    let err = binding
        .ensure_remote_customer(&mut account)
        .await
        .expect_err("processor returned 503");

    assert!(matches!(err, BindingError::ProcessorUnavailable { .. }));
    assert!(account.remote_customer_id.is_none());
}

#[tokio::test]
async fn test_bad_secret_is_rejected_not_retried() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/customers");
            then.status(401)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "error": {
                        "type": "invalid_request_error",
                        "message": "Invalid API Key provided: sk_test_****"
                    }
                }));
        })
        .await;

    let processor = processor_for(&server);
    let binding = CustomerPaymentBinding::new(processor, InMemoryAccountStore::new());
    let mut account = Account::new("bad_key");

    let err = binding
        .ensure_remote_customer(&mut account)
        .await
        .expect_err("processor returned 401");

    assert!(matches!(err, BindingError::ProcessorRejected { status: 401, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/customers/cus_123");
            then.status(200)
                .delay(Duration::from_millis(500))
                .header("Content-Type", "application/json")
                .json_body(json!({"id": "cus_123", "object": "customer"}));
        })
        .await;

    let processor = StripeProcessor::new(&TestConfig {
        api_base: server.base_url(),
        api_version: None,
        timeout: Duration::from_millis(100),
    })
    .unwrap();

    let result = processor
        .default_payment_method(&RemoteCustomerId::new("cus_123"))
        .await;

    assert!(matches!(
        result,
        Err(BindingError::ProcessorUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_non_json_success_is_invalid_response() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/customers");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let processor = processor_for(&server);
    let result = processor
        .create_customer(&(&Account::new("html")).into())
        .await;

    assert!(matches!(
        result,
        Err(BindingError::InvalidProcessorResponse { .. })
    ));
}
