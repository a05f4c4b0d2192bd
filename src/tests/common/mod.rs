//! Common test utilities and mock implementations
//!
//! This module provides the mock gateway and notifier, and a harness that
//! wires every service over the in-memory repository.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use warp::Filter;

use crate::{
    config::AppConfig,
    domain::{
        auth::Caller,
        billing::{Customer, Invoice, Order, PayNowLink, PayNowRequest},
        mandate::MandateBatchRequest,
        notification::{DeliveryResult, EmailMessage, SmsMessage},
    },
    infrastructure::{
        adapters::{
            InMemoryBillingRepository, LoadReport, LoadReportResult, MandateGateway, Notifier, WebhookVerifier,
        },
        bootstrap::ServiceContainer,
        http::routes::RouteBuilder,
    },
    shared::error::{AppError, AppResult},
    tests::{config, fixtures},
};

/// Mock payment gateway that records every call
#[derive(Default)]
pub struct MockGateway {
    submissions: Mutex<Vec<MandateBatchRequest>>,
    pay_now_requests: Mutex<Vec<PayNowRequest>>,
    submit_failure: Mutex<Option<AppError>>,
    pay_now_failure: Mutex<Option<AppError>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later mandate submission fail with `error`
    pub async fn fail_submissions_with(&self, error: AppError) {
        *self.submit_failure.lock().await = Some(error);
    }

    pub async fn fail_pay_now_with(&self, error: AppError) {
        *self.pay_now_failure.lock().await = Some(error);
    }

    pub async fn submissions(&self) -> Vec<MandateBatchRequest> {
        self.submissions.lock().await.clone()
    }

    pub async fn pay_now_requests(&self) -> Vec<PayNowRequest> {
        self.pay_now_requests.lock().await.clone()
    }
}

#[async_trait]
impl MandateGateway for MockGateway {
    async fn submit_mandate(&self, request: &MandateBatchRequest) -> AppResult<String> {
        let mut submissions = self.submissions.lock().await;
        submissions.push(request.clone());
        if let Some(error) = self.submit_failure.lock().await.clone() {
            return Err(error);
        }
        Ok(format!("FT-{:04}", submissions.len()))
    }

    async fn create_pay_now(&self, request: &PayNowRequest) -> AppResult<PayNowLink> {
        self.pay_now_requests.lock().await.push(request.clone());
        if let Some(error) = self.pay_now_failure.lock().await.clone() {
            return Err(error);
        }
        Ok(PayNowLink {
            url: format!("https://paynow.test/pay?p2={}", request.transaction_reference),
            transaction_reference: request.transaction_reference.clone(),
        })
    }

    async fn request_load_report(&self, file_token: &str) -> AppResult<LoadReport> {
        Ok(LoadReport {
            batch_name: file_token.to_string(),
            result: Some(LoadReportResult::Successful),
            errors: Vec::new(),
        })
    }
}

/// Mock notifier with independent per-channel failure switches
#[derive(Default)]
pub struct MockNotifier {
    emails: Mutex<Vec<EmailMessage>>,
    sms: Mutex<Vec<SmsMessage>>,
    email_down: Mutex<bool>,
    sms_down: Mutex<bool>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_email_down(&self, down: bool) {
        *self.email_down.lock().await = down;
    }

    pub async fn set_sms_down(&self, down: bool) {
        *self.sms_down.lock().await = down;
    }

    pub async fn emails(&self) -> Vec<EmailMessage> {
        self.emails.lock().await.clone()
    }

    pub async fn sms(&self) -> Vec<SmsMessage> {
        self.sms.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_email(&self, message: &EmailMessage) -> DeliveryResult {
        if *self.email_down.lock().await {
            return DeliveryResult::failed("email provider unavailable");
        }
        let mut emails = self.emails.lock().await;
        emails.push(message.clone());
        DeliveryResult::delivered(Some(format!("email-{}", emails.len())))
    }

    async fn send_sms(&self, message: &SmsMessage) -> DeliveryResult {
        if *self.sms_down.lock().await {
            return DeliveryResult::failed("sms provider unavailable");
        }
        let mut sms = self.sms.lock().await;
        sms.push(message.clone());
        DeliveryResult::delivered(Some(format!("sms-{}", sms.len())))
    }
}

/// Every service wired over mocks and a fresh in-memory repository
pub struct TestHarness {
    pub config: AppConfig,
    pub repo: Arc<InMemoryBillingRepository>,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<MockNotifier>,
    pub services: ServiceContainer,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(config::test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        config::init();
        let repo = Arc::new(InMemoryBillingRepository::new());
        let gateway = Arc::new(MockGateway::new());
        let notifier = Arc::new(MockNotifier::new());
        let services = ServiceContainer::build(&config, repo.clone(), gateway.clone(), notifier.clone(), None)
            .expect("test services should build");
        Self {
            config,
            repo,
            gateway,
            notifier,
            services,
        }
    }

    /// Services over the same repository and notifier but a different gateway
    pub fn services_with_gateway(&self, gateway: Arc<dyn MandateGateway>) -> ServiceContainer {
        ServiceContainer::build(&self.config, self.repo.clone(), gateway, self.notifier.clone(), None)
            .expect("test services should build")
    }

    /// Full route tree, as served
    pub fn routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
        RouteBuilder::build_routes(&self.config, self.services.clone())
    }

    /// `Authorization` value for a customer acting on their own records
    pub fn customer_token(&self, customer_id: uuid::Uuid) -> String {
        self.bearer(&Caller::customer(customer_id))
    }

    /// `Authorization` value for an internal job
    pub fn service_token(&self) -> String {
        self.bearer(&Caller::service("collection-batch"))
    }

    fn bearer(&self, caller: &Caller) -> String {
        let token = self
            .services
            .authenticator
            .issue(caller, self.config.auth.service_token_ttl_seconds)
            .expect("token signing should succeed");
        format!("Bearer {}", token)
    }

    /// Signature the gateway would send for `body`
    pub fn sign(&self, body: &[u8]) -> String {
        WebhookVerifier::new(self.config.netcash.webhook_secret.as_bytes())
            .sign(body)
            .expect("signing should succeed")
    }

    /// Customer with an account reference and an order awaiting a mandate
    pub async fn seed_customer_with_order(&self) -> (Customer, Order) {
        let customer = fixtures::customer();
        let order = fixtures::order(customer.id);
        self.repo.seed_customer(customer.clone()).await;
        self.repo.seed_order(order.clone()).await;
        (customer, order)
    }

    /// Customer with one unpaid invoice
    pub async fn seed_customer_with_invoice(&self) -> (Customer, Invoice) {
        let customer = fixtures::customer();
        let invoice = fixtures::invoice(customer.id);
        self.repo.seed_customer(customer.clone()).await;
        self.repo.seed_invoice(invoice.clone()).await;
        (customer, invoice)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Assertion helpers shared across suites
pub mod assertions {
    use crate::domain::payment_method::PaymentMethodDisplay;

    /// At most one method in a listing is primary
    pub fn assert_single_primary(methods: &[PaymentMethodDisplay]) {
        let primaries = methods.iter().filter(|m| m.is_primary).count();
        assert!(primaries <= 1, "expected at most one primary method, found {}", primaries);
    }

    /// A public error body carries no internal detail
    pub fn assert_no_internal_detail(body: &str, secrets: &[&str]) {
        for secret in secrets {
            assert!(!body.contains(secret), "response body leaked '{}': {}", secret, body);
        }
    }
}
