//! Domain layer - Core business logic and domain models
//!
//! Payment methods, mandate requests, invoices and the pure rules that
//! govern them. Nothing here performs I/O.

pub mod audit;
pub mod auth;
pub mod billing;
pub mod health;
pub mod mandate;
pub mod notification;
pub mod payment_method;

pub use audit::{AuditEntry, AuditMetadata};
pub use auth::{Caller, CallerRole};
pub use billing::{
    AccountType, CollectionFailure, Customer, Invoice, InvoiceStatus, Order, OrderStatus, PayNowLink,
    PayNowNotice, PayNowRequest, SettlementOutcome,
};
pub use health::{HealthResponse, HealthStatus};
pub use mandate::{
    Commencement, DebitFrequency, MandateBatchRequest, MandatePostback, MandateRequest, MandateStatus,
    PostbackOutcome,
};
pub use notification::{Channel, DeliveryResult, EmailMessage, NotificationTracking, SmsMessage, SmsTemplate};
pub use payment_method::{
    BankAccountDetails, BankAccountType, CardDetails, EftDetails, EncryptedBlob, PaymentDetails, PaymentMethod,
    PaymentMethodDisplay, PaymentMethodStatus, PaymentMethodType, StoredDetails,
};
