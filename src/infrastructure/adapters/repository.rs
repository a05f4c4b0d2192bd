//! Billing persistence
//!
//! Every trait method is one atomic unit of work. Callers never compose
//! check-then-act sequences out of several calls when an invariant spans
//! more than one record.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::audit::{AuditEntry, AuditMetadata};
use crate::domain::billing::{
    check_removal, CollectionFailure, Customer, Invoice, InvoiceStatus, Order, OrderStatus, PayNowLink,
    SettlementOutcome,
};
use crate::domain::mandate::{MandateRequest, MandateStatus};
use crate::domain::notification::Channel;
use crate::domain::payment_method::{EncryptedBlob, PaymentMethod, StoredDetails};
use crate::shared::error::{AppError, AppResult};

/// State change for a mandate request and the records that follow it
#[derive(Debug, Clone)]
pub struct MandateTransition {
    /// New state of the request
    pub mandate: MandateRequest,
    /// Status the stored request must still have for the change to apply
    pub expected_status: MandateStatus,
    /// New state of the linked payment method, if it changes
    pub method: Option<PaymentMethod>,
    /// Make the linked method the customer's primary
    pub promote_method: bool,
    pub order_update: Option<OrderUpdate>,
}

/// Order status change riding along with a mandate transition
#[derive(Debug, Clone, Copy)]
pub struct OrderUpdate {
    /// Apply only while the order is in this status
    pub only_from: Option<OrderStatus>,
    pub to: OrderStatus,
}

#[async_trait]
pub trait BillingRepository: Send + Sync {
    async fn get_customer(&self, customer_id: Uuid) -> AppResult<Option<Customer>>;
    async fn get_order(&self, order_id: Uuid) -> AppResult<Option<Order>>;

    /// Insert a method. A primary insert demotes every other active method
    /// of the customer and moves the billing-default pointer in the same step.
    async fn insert_payment_method(&self, method: PaymentMethod) -> AppResult<PaymentMethod>;
    async fn get_payment_method(&self, method_id: Uuid) -> AppResult<Option<PaymentMethod>>;
    /// Active methods, primary first then newest first
    async fn list_payment_methods(&self, customer_id: Uuid) -> AppResult<Vec<PaymentMethod>>;
    /// Demote-then-promote as one step; `NotFound` unless the method is active and owned
    async fn set_primary_payment_method(&self, customer_id: Uuid, method_id: Uuid) -> AppResult<PaymentMethod>;
    /// Soft delete under the removal rule; clears the pointer without promoting anyone
    async fn remove_payment_method(&self, customer_id: Uuid, method_id: Uuid) -> AppResult<PaymentMethod>;
    /// Replace stored fields; primary flags are left as stored
    async fn update_payment_method(&self, method: PaymentMethod) -> AppResult<()>;
    /// Swap legacy plaintext details for `sealed`, touching no other field.
    /// `Ok(false)` when the row is gone or already encrypted.
    async fn reseal_legacy_details(&self, method_id: Uuid, sealed: EncryptedBlob, at: DateTime<Utc>) -> AppResult<bool>;
    /// Drop never-signed methods for an account reference and fail their open requests
    async fn delete_unsigned_methods_for_reference(&self, customer_id: Uuid, reference: &str) -> AppResult<usize>;

    /// Create a pending method and its mandate request together
    async fn create_mandate_request(&self, method: PaymentMethod, request: MandateRequest) -> AppResult<()>;
    async fn get_mandate_request(&self, mandate_id: Uuid) -> AppResult<Option<MandateRequest>>;
    async fn latest_mandate_for_order(&self, order_id: Uuid) -> AppResult<Option<MandateRequest>>;
    async fn latest_mandate_for_reference(&self, reference: &str) -> AppResult<Option<MandateRequest>>;
    /// Compare-and-set on the request status. `Ok(false)` when the stored
    /// status moved on, in which case nothing is written.
    async fn apply_mandate_transition(&self, transition: MandateTransition) -> AppResult<bool>;
    /// Non-terminal requests past their signing deadline
    async fn find_expirable_mandates(&self, now: DateTime<Utc>) -> AppResult<Vec<MandateRequest>>;

    async fn get_invoice(&self, invoice_id: Uuid) -> AppResult<Option<Invoice>>;
    /// Invoices not yet paid, oldest number first
    async fn list_outstanding_invoices(&self) -> AppResult<Vec<Invoice>>;
    async fn record_collection_failure(&self, invoice_id: Uuid, failure: CollectionFailure) -> AppResult<Invoice>;
    async fn record_paynow_link(&self, invoice_id: Uuid, link: &PayNowLink, amount: Decimal) -> AppResult<Invoice>;
    async fn record_paynow_delivery(&self, invoice_id: Uuid, channels: Vec<Channel>, at: DateTime<Utc>)
        -> AppResult<Invoice>;
    /// Mark the invoice carrying `reference` paid and reduce the customer balance
    async fn settle_invoice_by_reference(
        &self,
        reference: &str,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> AppResult<SettlementOutcome>;
}

#[derive(Default)]
struct BillingState {
    customers: HashMap<Uuid, Customer>,
    orders: HashMap<Uuid, Order>,
    methods: HashMap<Uuid, PaymentMethod>,
    mandates: HashMap<Uuid, MandateRequest>,
    invoices: HashMap<Uuid, Invoice>,
}

impl BillingState {
    fn promote(&mut self, customer_id: Uuid, method_id: Uuid, now: DateTime<Utc>) {
        for method in self.methods.values_mut() {
            if method.customer_id == customer_id && method.is_active && method.is_primary && method.id != method_id {
                method.is_primary = false;
                method.updated_at = now;
            }
        }
        if let Some(method) = self.methods.get_mut(&method_id) {
            method.is_primary = true;
            method.updated_at = now;
        }
        if let Some(customer) = self.customers.get_mut(&customer_id) {
            customer.billing_default_method_id = Some(method_id);
        }
    }

    fn owned_active(&self, customer_id: Uuid, method_id: Uuid) -> AppResult<&PaymentMethod> {
        self.methods
            .get(&method_id)
            .filter(|m| m.customer_id == customer_id && m.is_active)
            .ok_or_else(|| AppError::NotFound(format!("payment method {}", method_id)))
    }

    fn invoice_mut(&mut self, invoice_id: Uuid) -> AppResult<&mut Invoice> {
        self.invoices
            .get_mut(&invoice_id)
            .ok_or_else(|| AppError::NotFound(format!("invoice {}", invoice_id)))
    }
}

/// Process-local repository; one lock guards the whole state so no
/// multi-record change is ever observable half-done.
#[derive(Clone, Default)]
pub struct InMemoryBillingRepository {
    state: Arc<tokio::sync::RwLock<BillingState>>,
}

impl InMemoryBillingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_customer(&self, customer: Customer) {
        self.state.write().await.customers.insert(customer.id, customer);
    }

    pub async fn seed_order(&self, order: Order) {
        self.state.write().await.orders.insert(order.id, order);
    }

    pub async fn seed_invoice(&self, invoice: Invoice) {
        self.state.write().await.invoices.insert(invoice.id, invoice);
    }
}

#[async_trait]
impl BillingRepository for InMemoryBillingRepository {
    async fn get_customer(&self, customer_id: Uuid) -> AppResult<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&customer_id).cloned())
    }

    async fn get_order(&self, order_id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn insert_payment_method(&self, method: PaymentMethod) -> AppResult<PaymentMethod> {
        let mut state = self.state.write().await;
        if !state.customers.contains_key(&method.customer_id) {
            return Err(AppError::NotFound(format!("customer {}", method.customer_id)));
        }
        let (id, customer_id, primary, now) = (method.id, method.customer_id, method.is_primary, method.created_at);
        state.methods.insert(id, PaymentMethod { is_primary: false, ..method });
        if primary {
            state.promote(customer_id, id, now);
        }
        state
            .methods
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::storage("insert payment method", "row vanished"))
    }

    async fn get_payment_method(&self, method_id: Uuid) -> AppResult<Option<PaymentMethod>> {
        Ok(self.state.read().await.methods.get(&method_id).cloned())
    }

    async fn list_payment_methods(&self, customer_id: Uuid) -> AppResult<Vec<PaymentMethod>> {
        let state = self.state.read().await;
        let mut methods: Vec<PaymentMethod> = state
            .methods
            .values()
            .filter(|m| m.customer_id == customer_id && m.is_active)
            .cloned()
            .collect();
        methods.sort_by(|a, b| {
            b.is_primary
                .cmp(&a.is_primary)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(methods)
    }

    async fn set_primary_payment_method(&self, customer_id: Uuid, method_id: Uuid) -> AppResult<PaymentMethod> {
        let mut state = self.state.write().await;
        state.owned_active(customer_id, method_id)?;
        state.promote(customer_id, method_id, Utc::now());
        state.owned_active(customer_id, method_id).cloned()
    }

    async fn remove_payment_method(&self, customer_id: Uuid, method_id: Uuid) -> AppResult<PaymentMethod> {
        let mut state = self.state.write().await;
        let method = state.owned_active(customer_id, method_id)?.clone();
        let customer = state
            .customers
            .get(&customer_id)
            .ok_or_else(|| AppError::NotFound(format!("customer {}", customer_id)))?;
        check_removal(&method, customer)?;

        let now = Utc::now();
        if let Some(stored) = state.methods.get_mut(&method_id) {
            stored.is_active = false;
            stored.is_primary = false;
            stored.updated_at = now;
        }
        if let Some(customer) = state.customers.get_mut(&customer_id) {
            if customer.billing_default_method_id == Some(method_id) {
                customer.billing_default_method_id = None;
            }
        }
        state
            .methods
            .get(&method_id)
            .cloned()
            .ok_or_else(|| AppError::storage("remove payment method", "row vanished"))
    }

    async fn update_payment_method(&self, method: PaymentMethod) -> AppResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .methods
            .get_mut(&method.id)
            .ok_or_else(|| AppError::NotFound(format!("payment method {}", method.id)))?;
        let (is_primary, is_active) = (stored.is_primary, stored.is_active);
        *stored = PaymentMethod {
            is_primary,
            is_active,
            ..method
        };
        Ok(())
    }

    async fn reseal_legacy_details(&self, method_id: Uuid, sealed: EncryptedBlob, at: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.write().await;
        match state.methods.get_mut(&method_id) {
            Some(method) if matches!(method.encrypted_details, StoredDetails::Legacy(_)) => {
                method.encrypted_details = StoredDetails::Encrypted(sealed);
                method.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_unsigned_methods_for_reference(&self, customer_id: Uuid, reference: &str) -> AppResult<usize> {
        let mut state = self.state.write().await;
        let stale: Vec<Uuid> = state
            .methods
            .values()
            .filter(|m| {
                m.customer_id == customer_id
                    && m.mandate_signed_at.is_none()
                    && !m.is_primary
                    && m.netcash_account_reference.as_deref() == Some(reference)
            })
            .map(|m| m.id)
            .collect();

        let now = Utc::now();
        for id in &stale {
            state.methods.remove(id);
        }
        for mandate in state.mandates.values_mut() {
            if stale.contains(&mandate.payment_method_id) && !mandate.status.is_terminal() {
                mandate.status = MandateStatus::Failed;
                mandate.error_messages.push("superseded by a newer mandate request".to_string());
                mandate.updated_at = now;
            }
        }
        Ok(stale.len())
    }

    async fn create_mandate_request(&self, method: PaymentMethod, request: MandateRequest) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.customers.contains_key(&method.customer_id) {
            return Err(AppError::NotFound(format!("customer {}", method.customer_id)));
        }
        if request.payment_method_id != method.id {
            return Err(AppError::Internal("mandate request must reference its payment method".to_string()));
        }
        let (id, customer_id, primary, now) = (method.id, method.customer_id, method.is_primary, method.created_at);
        state.methods.insert(id, PaymentMethod { is_primary: false, ..method });
        if primary {
            state.promote(customer_id, id, now);
        }
        state.mandates.insert(request.id, request);
        Ok(())
    }

    async fn get_mandate_request(&self, mandate_id: Uuid) -> AppResult<Option<MandateRequest>> {
        Ok(self.state.read().await.mandates.get(&mandate_id).cloned())
    }

    async fn latest_mandate_for_order(&self, order_id: Uuid) -> AppResult<Option<MandateRequest>> {
        let state = self.state.read().await;
        Ok(state
            .mandates
            .values()
            .filter(|m| m.order_id == order_id)
            .max_by_key(|m| m.created_at)
            .cloned())
    }

    async fn latest_mandate_for_reference(&self, reference: &str) -> AppResult<Option<MandateRequest>> {
        let state = self.state.read().await;
        Ok(state
            .mandates
            .values()
            .filter(|m| m.netcash_account_reference == reference)
            .max_by_key(|m| m.created_at)
            .cloned())
    }

    async fn apply_mandate_transition(&self, transition: MandateTransition) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let stored = state
            .mandates
            .get(&transition.mandate.id)
            .ok_or_else(|| AppError::NotFound(format!("mandate request {}", transition.mandate.id)))?;

        if stored.status != transition.expected_status {
            return Ok(false);
        }
        if stored.status != MandateStatus::Pending
            && stored.netcash_account_reference != transition.mandate.netcash_account_reference
        {
            return Err(AppError::Validation(
                "account reference cannot change once a mandate request is sent".to_string(),
            ));
        }

        let now = transition.mandate.updated_at;
        let customer_id = transition.mandate.customer_id;
        let method_id = transition.mandate.payment_method_id;
        let order_id = transition.mandate.order_id;
        state.mandates.insert(transition.mandate.id, transition.mandate);

        if let Some(method) = transition.method {
            if let Some(stored) = state.methods.get_mut(&method.id) {
                let (is_primary, is_active) = (stored.is_primary, stored.is_active);
                *stored = PaymentMethod {
                    is_primary,
                    is_active,
                    ..method
                };
            }
        }

        if transition.promote_method && state.methods.get(&method_id).is_some_and(|m| m.is_active) {
            state.promote(customer_id, method_id, now);
        }

        if let Some(update) = transition.order_update {
            if let Some(order) = state.orders.get_mut(&order_id) {
                if update.only_from.map_or(true, |from| order.status == from) {
                    order.status = update.to;
                    order.updated_at = now;
                }
            }
        }
        Ok(true)
    }

    async fn find_expirable_mandates(&self, now: DateTime<Utc>) -> AppResult<Vec<MandateRequest>> {
        let state = self.state.read().await;
        Ok(state.mandates.values().filter(|m| m.is_overdue(now)).cloned().collect())
    }

    async fn get_invoice(&self, invoice_id: Uuid) -> AppResult<Option<Invoice>> {
        Ok(self.state.read().await.invoices.get(&invoice_id).cloned())
    }

    async fn list_outstanding_invoices(&self) -> AppResult<Vec<Invoice>> {
        let state = self.state.read().await;
        let mut invoices: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|i| i.status != InvoiceStatus::Paid)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| a.invoice_number.cmp(&b.invoice_number));
        Ok(invoices)
    }

    async fn record_collection_failure(&self, invoice_id: Uuid, failure: CollectionFailure) -> AppResult<Invoice> {
        let mut state = self.state.write().await;
        let invoice = state.invoice_mut(invoice_id)?;
        invoice.audit.push(AuditEntry::at(
            failure.recorded_at,
            AuditMetadata::CollectionFailed {
                reason: failure.reason.clone(),
            },
        ));
        invoice.collection_failures.push(failure);
        Ok(invoice.clone())
    }

    async fn record_paynow_link(&self, invoice_id: Uuid, link: &PayNowLink, amount: Decimal) -> AppResult<Invoice> {
        let mut state = self.state.write().await;
        let invoice = state.invoice_mut(invoice_id)?;
        invoice.paynow_url = Some(link.url.clone());
        invoice.paynow_transaction_ref = Some(link.transaction_reference.clone());
        invoice.audit.push(AuditEntry::now(AuditMetadata::PayNowIssued {
            transaction_reference: link.transaction_reference.clone(),
            amount,
            channels: Vec::new(),
        }));
        Ok(invoice.clone())
    }

    async fn record_paynow_delivery(
        &self,
        invoice_id: Uuid,
        channels: Vec<Channel>,
        at: DateTime<Utc>,
    ) -> AppResult<Invoice> {
        let mut state = self.state.write().await;
        let invoice = state.invoice_mut(invoice_id)?;
        if !channels.is_empty() {
            invoice.paynow_sent_at = Some(at);
        }
        invoice.paynow_sent_via = channels;
        Ok(invoice.clone())
    }

    async fn settle_invoice_by_reference(
        &self,
        reference: &str,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> AppResult<SettlementOutcome> {
        let mut state = self.state.write().await;
        let Some(invoice) = state
            .invoices
            .values_mut()
            .find(|i| i.paynow_transaction_ref.as_deref() == Some(reference))
        else {
            return Ok(SettlementOutcome::UnknownReference);
        };

        if invoice.status == InvoiceStatus::Paid {
            return Ok(SettlementOutcome::AlreadyPaid);
        }
        if amount < invoice.amount {
            return Ok(SettlementOutcome::AmountMismatch {
                expected: invoice.amount,
                received: amount,
            });
        }

        invoice.status = InvoiceStatus::Paid;
        invoice.paid_at = Some(at);
        invoice.audit.push(AuditEntry::at(
            at,
            AuditMetadata::PayNowSettled {
                transaction_reference: reference.to_string(),
                amount,
            },
        ));
        let settled = invoice.clone();

        if let Some(customer) = state.customers.get_mut(&settled.customer_id) {
            customer.balance -= settled.amount;
        }
        Ok(SettlementOutcome::Settled(settled))
    }
}
