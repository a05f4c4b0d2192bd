//! Test fixtures: customers, orders, invoices and gateway payloads

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::application::services::{AddPaymentMethodRequest, FailedCollectionReport, InitiateMandateRequest};
use crate::domain::billing::{AccountType, Customer, Invoice, InvoiceStatus, Order, OrderStatus, PayNowNotice};
use crate::domain::mandate::{DebitFrequency, MandatePostback};
use crate::domain::payment_method::{
    BankAccountDetails, BankAccountType, CardDetails, EftDetails, PaymentDetails, PaymentMethodType,
};

pub const ACCOUNT_REFERENCE: &str = "CT-2026-00042";
pub const ORDER_NUMBER: &str = "ORD-100";
pub const INVOICE_NUMBER: &str = "INV-7";

pub fn customer() -> Customer {
    Customer {
        id: Uuid::new_v4(),
        first_name: "Thandi".to_string(),
        last_name: "Nkosi".to_string(),
        email: Some("thandi@example.test".to_string()),
        phone: Some("+27 82 555 1234".to_string()),
        account_number: Some(ACCOUNT_REFERENCE.to_string()),
        account_type: AccountType::Consumer,
        balance: Decimal::ZERO,
        billing_default_method_id: None,
    }
}

pub fn customer_with_balance(balance: Decimal) -> Customer {
    Customer {
        balance,
        ..customer()
    }
}

pub fn order(customer_id: Uuid) -> Order {
    Order {
        id: Uuid::new_v4(),
        order_number: ORDER_NUMBER.to_string(),
        customer_id,
        status: OrderStatus::Pending,
        updated_at: Utc::now(),
    }
}

/// R599 unpaid invoice
pub fn invoice(customer_id: Uuid) -> Invoice {
    Invoice {
        id: Uuid::new_v4(),
        invoice_number: INVOICE_NUMBER.to_string(),
        customer_id,
        status: InvoiceStatus::Unpaid,
        amount: dec!(599),
        payment_method_id: None,
        collection_failures: Vec::new(),
        paynow_url: None,
        paynow_transaction_ref: None,
        paynow_sent_at: None,
        paynow_sent_via: Vec::new(),
        paid_at: None,
        audit: Vec::new(),
    }
}

pub fn bank_details() -> BankAccountDetails {
    BankAccountDetails {
        bank_name: "FNB".to_string(),
        account_holder: "T Nkosi".to_string(),
        account_number: "62001231234".to_string(),
        branch_code: "250655".to_string(),
        account_type: BankAccountType::Current,
    }
}

pub fn card_details() -> CardDetails {
    CardDetails {
        card_type: "visa".to_string(),
        holder_name: "T Nkosi".to_string(),
        card_number: "4111111111114242".to_string(),
        expiry_month: 8,
        expiry_year: 2028,
    }
}

pub fn add_card(is_primary: bool) -> AddPaymentMethodRequest {
    AddPaymentMethodRequest {
        method_type: PaymentMethodType::Card,
        details: PaymentDetails::Card(card_details()),
        is_primary,
        mandate_id: None,
    }
}

pub fn add_debit_order(is_primary: bool) -> AddPaymentMethodRequest {
    AddPaymentMethodRequest {
        method_type: PaymentMethodType::DebitOrder,
        details: PaymentDetails::Bank(bank_details()),
        is_primary,
        mandate_id: None,
    }
}

pub fn add_eft(is_primary: bool) -> AddPaymentMethodRequest {
    AddPaymentMethodRequest {
        method_type: PaymentMethodType::Eft,
        details: PaymentDetails::Eft(EftDetails::default()),
        is_primary,
        mandate_id: None,
    }
}

pub fn initiate_request(order_id: Uuid) -> InitiateMandateRequest {
    InitiateMandateRequest {
        order_id,
        mandate_amount: dec!(599),
        payment_method_type: PaymentMethodType::DebitOrder,
        debit_frequency: DebitFrequency::Monthly,
        debit_day: 25,
        notes: None,
        bank_details: None,
    }
}

/// Signed postback carrying the gateway's masked account number
pub fn signed_postback(order_id: Uuid) -> MandatePostback {
    MandatePostback {
        mandate_successful: "1".to_string(),
        is_declined: Some("0".to_string()),
        account_ref: ACCOUNT_REFERENCE.to_string(),
        bank_name: Some("FNB".to_string()),
        bank_account_name: Some("T Nkosi".to_string()),
        bank_account_no: Some("****1234".to_string()),
        branch_code: Some("250655".to_string()),
        bank_account_type: Some("current".to_string()),
        mandate_pdf_link: Some("https://netcash.test/mandates/42.pdf".to_string()),
        field1: Some(order_id.to_string()),
        field2: Some(ORDER_NUMBER.to_string()),
        ..Default::default()
    }
}

pub fn declined_postback(order_id: Uuid) -> MandatePostback {
    MandatePostback {
        mandate_successful: "0".to_string(),
        is_declined: Some("1".to_string()),
        reason_for_decline: Some("Customer declined".to_string()),
        account_ref: ACCOUNT_REFERENCE.to_string(),
        field1: Some(order_id.to_string()),
        ..Default::default()
    }
}

pub fn failed_collection(invoice_id: Uuid) -> FailedCollectionReport {
    FailedCollectionReport {
        invoice_id,
        reason: "Insufficient funds".to_string(),
        mandate_inactive: false,
        force_regenerate: false,
    }
}

pub fn pay_now_notice(reference: &str, cents: i64, accepted: bool) -> PayNowNotice {
    PayNowNotice {
        transaction_accepted: accepted.to_string(),
        amount: cents.to_string(),
        reference: reference.to_string(),
        extra1: None,
        request_trace: Some("trace-1".to_string()),
        reason: (!accepted).then(|| "Card declined".to_string()),
    }
}
