//! NetCash gateway adapter
//!
//! Mandates go through the NIWS `BatchFileUpload` SOAP call as a
//! tab-delimited batch file. Pay Now links are hosted-page URLs built
//! locally from the configured service and vault keys.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::app_config::NetcashConfig;
use crate::domain::billing::{to_cents, PayNowLink, PayNowRequest};
use crate::domain::mandate::MandateBatchRequest;
use crate::shared::error::{AppError, AppResult};
use crate::shared::validation::ValidationUtils;

const TAB: &str = "\t";
const SOAP_ACTION_BASE: &str = "http://tempuri.org/INIWS_NIF/";

/// Outbound calls to the payment gateway
#[async_trait]
pub trait MandateGateway: Send + Sync {
    /// Submit one mandate; returns the gateway file token
    async fn submit_mandate(&self, request: &MandateBatchRequest) -> AppResult<String>;

    /// Build a one-time payment link for an outstanding amount
    async fn create_pay_now(&self, request: &PayNowRequest) -> AppResult<PayNowLink>;

    /// Fetch the load report for a previously uploaded batch
    async fn request_load_report(&self, file_token: &str) -> AppResult<LoadReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadReportResult {
    Successful,
    Unsuccessful,
    SuccessfulWithErrors,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReportError {
    pub account_reference: String,
    pub line_number: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LoadReport {
    pub batch_name: String,
    pub result: Option<LoadReportResult>,
    pub errors: Vec<LoadReportError>,
}

impl LoadReport {
    pub fn is_successful(&self) -> bool {
        self.result == Some(LoadReportResult::Successful)
    }
}

/// NetCash NIWS client
pub struct NetcashGateway {
    config: Arc<NetcashConfig>,
    client: Client,
}

impl NetcashGateway {
    pub fn new(config: Arc<NetcashConfig>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn call(&self, action: &str, body: String) -> AppResult<String> {
        let response = self
            .client
            .post(&self.config.web_service_url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", format!("{}{}", SOAP_ACTION_BASE, action))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let code = if e.is_timeout() { "TIMEOUT" } else { "TRANSPORT" };
                AppError::gateway(code, format!("{} request failed: {}", action, e))
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::gateway("TRANSPORT", format!("{} response unreadable: {}", action, e)))?;
        if !status.is_success() {
            return Err(AppError::gateway(
                status.as_u16().to_string(),
                format!("NetCash API returned {}", status),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl MandateGateway for NetcashGateway {
    async fn submit_mandate(&self, request: &MandateBatchRequest) -> AppResult<String> {
        let now = Utc::now();
        let batch_name = format!("Mandates-{}", now.timestamp_millis());
        let file = build_batch_file(
            &self.config.debit_order_service_key,
            &self.config.software_vendor_key,
            &batch_name,
            now,
            std::slice::from_ref(request),
        );
        let envelope = soap_envelope(
            "BatchFileUpload",
            &[("ServiceKey", self.config.debit_order_service_key.as_str()), ("File", file.as_str())],
        );

        info!(
            account_reference = %request.account_reference,
            batch_name = %batch_name,
            "Submitting mandate batch"
        );
        let body = self.call("BatchFileUpload", envelope).await?;
        let token = parse_batch_upload_result(&body)?;
        info!(account_reference = %request.account_reference, file_token = %token, "Mandate batch accepted");
        Ok(token)
    }

    async fn create_pay_now(&self, request: &PayNowRequest) -> AppResult<PayNowLink> {
        let url = build_pay_now_url(&self.config, request)?;
        Ok(PayNowLink {
            url,
            transaction_reference: request.transaction_reference.clone(),
        })
    }

    async fn request_load_report(&self, file_token: &str) -> AppResult<LoadReport> {
        let envelope = soap_envelope(
            "RequestFileUploadReport",
            &[("ServiceKey", self.config.debit_order_service_key.as_str()), ("FileToken", file_token)],
        );
        let body = self.call("RequestFileUploadReport", envelope).await?;
        let report = extract_element(&body, "RequestFileUploadReportResult")
            .ok_or_else(|| AppError::gateway("PARSE_ERROR", "Could not parse load report"))?;
        let report = parse_load_report(&report);
        if !report.is_successful() {
            warn!(file_token = %file_token, errors = report.errors.len(), "Load report has errors");
        }
        Ok(report)
    }
}

/// Cap a free-text column at `max` characters. Tabs and line breaks would
/// shift every later column, so they become spaces.
fn truncate(value: &str, max: usize) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '\t' | '\r' | '\n') { ' ' } else { c })
        .take(max)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Build the tab-delimited mandate batch: header, key, one transaction
/// per mandate, footer. Optional column groups appear only when some
/// request in the batch uses them.
pub fn build_batch_file(
    service_key: &str,
    vendor_key: &str,
    batch_name: &str,
    action_date: DateTime<Utc>,
    requests: &[MandateBatchRequest],
) -> String {
    let has_email = requests.iter().any(|r| r.email_address.is_some());
    let has_bank = requests.iter().any(|r| r.bank_details.is_some());
    let has_custom = requests
        .iter()
        .any(|r| r.field1.is_some() || r.field2.is_some() || r.field3.is_some());

    let mut keys: Vec<u16> = vec![101, 102, 110, 114, 113, 202, 161, 530, 531, 532, 534, 535, 540, 541];
    if has_email {
        keys.push(201);
    }
    if has_bank {
        keys.extend([131, 132, 133, 134, 135, 136]);
    }
    if has_custom {
        keys.extend([311, 312, 313]);
    }

    let mut lines = Vec::with_capacity(requests.len() + 3);
    let action_date = action_date.format("%Y%m%d").to_string();
    lines.push(["H", service_key, "1", "Mandates", batch_name, action_date.as_str(), vendor_key].join(TAB));
    lines.push(format!(
        "K{}{}",
        TAB,
        keys.iter().map(u16::to_string).collect::<Vec<_>>().join(TAB)
    ));

    let mut total_cents: i64 = 0;
    for req in requests {
        let cents = to_cents(req.mandate_amount);
        total_cents += cents;

        let mut fields: Vec<String> = vec![
            "T".to_string(),
            truncate(&req.account_reference, 22),
            truncate(&req.mandate_name, 50),
            if req.is_consumer { "1" } else { "0" }.to_string(),
            truncate(&req.first_name, 50),
            truncate(&req.surname, 50),
            ValidationUtils::normalize_mobile_number(&req.mobile_number),
            cents.to_string(),
            req.debit_frequency.gateway_code().to_string(),
            req.commencement.padded_month(),
            req.commencement.padded_day(),
            req.agreement_date.format("%Y%m%d").to_string(),
            truncate(&req.agreement_reference, 50),
            if req.send_mandate { "1" } else { "0" }.to_string(),
            req.public_holiday_option.to_string(),
        ];
        if has_email {
            fields.push(req.email_address.as_deref().map(|e| truncate(e, 100)).unwrap_or_default());
        }
        if has_bank {
            match &req.bank_details {
                Some(bank) => fields.extend([
                    "1".to_string(),
                    truncate(&bank.account_holder, 50),
                    bank.account_type.gateway_code().to_string(),
                    truncate(&bank.branch_code, 6),
                    "0".to_string(),
                    truncate(&bank.account_number, 20),
                ]),
                None => fields.extend((0..6).map(|_| String::new())),
            }
        }
        if has_custom {
            for field in [&req.field1, &req.field2, &req.field3] {
                fields.push(field.as_deref().map(|f| truncate(f, 50)).unwrap_or_default());
            }
        }
        lines.push(fields.join(TAB));
    }

    lines.push(format!("F{TAB}{}{TAB}{}{TAB}9999", requests.len(), total_cents));
    lines.join("\n")
}

pub fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn soap_envelope(method: &str, params: &[(&str, &str)]) -> String {
    let body: String = params
        .iter()
        .map(|(name, value)| format!("      <tem:{name}>{}</tem:{name}>\n", escape_xml(value)))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\" xmlns:tem=\"http://tempuri.org/\">\n\
         \x20 <soap:Body>\n\
         \x20   <tem:{method}>\n{body}\x20   </tem:{method}>\n\
         \x20 </soap:Body>\n\
         </soap:Envelope>"
    )
}

/// Text content of the first element named `name`, ignoring namespace prefixes
fn extract_element(xml: &str, name: &str) -> Option<String> {
    let pattern = format!(r"(?s)<(?:\w+:)?{name}(?:\s[^>]*)?>(.*?)</(?:\w+:)?{name}>");
    let re = Regex::new(&pattern).ok()?;
    re.captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| unescape_xml(m.as_str().trim()))
}

/// Known failure codes return fixed messages; any other value is the file token
pub fn parse_batch_upload_result(xml: &str) -> AppResult<String> {
    let result = extract_element(xml, "BatchFileUploadResult")
        .ok_or_else(|| AppError::gateway("PARSE_ERROR", "BatchFileUploadResponse not found"))?;

    let failure = match result.as_str() {
        "100" => Some("Authentication failure. Check service key."),
        "101" => Some("Date format error. Dates should be CCYYMMDD."),
        "102" => Some("Parameter error. Check file format."),
        "200" => Some("General code exception. Contact NetCash support."),
        "" => Some("Empty upload result"),
        _ => None,
    };
    match failure {
        Some(message) => Err(AppError::gateway(result, message)),
        None => Ok(result),
    }
}

fn line_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Line\s*:\s*(\d+)").expect("valid regex"))
}

pub fn parse_load_report(report: &str) -> LoadReport {
    let mut parsed = LoadReport::default();
    for line in report.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if line.starts_with("###BEGIN") {
            parsed.batch_name = parts.get(1).map(|s| s.trim().to_string()).unwrap_or_default();
            let status = parts.get(2).copied().unwrap_or_default();
            parsed.result = if status.contains("SUCCESSFUL WITH ERRORS") {
                Some(LoadReportResult::SuccessfulWithErrors)
            } else if status.contains("UNSUCCESSFUL") {
                Some(LoadReportResult::Unsuccessful)
            } else if status.contains("SUCCESSFUL") {
                Some(LoadReportResult::Successful)
            } else {
                None
            };
        } else if line.starts_with("###ERROR") {
            parsed.errors.push(LoadReportError {
                account_reference: String::new(),
                line_number: 0,
                message: parts.get(1).map(|s| s.to_string()).unwrap_or_else(|| "Unknown error".to_string()),
            });
        } else if !line.starts_with("###") && !line.trim().is_empty() && parts.len() >= 3 {
            let line_number = line_number_pattern()
                .captures(parts[1])
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            parsed.errors.push(LoadReportError {
                account_reference: parts[0].to_string(),
                line_number,
                message: parts[2].to_string(),
            });
        }
    }
    parsed
}

/// Hosted Pay Now URL for a request
pub fn build_pay_now_url(config: &NetcashConfig, request: &PayNowRequest) -> AppResult<String> {
    ValidationUtils::validate_amount(request.amount)?;
    let cents = to_cents(request.amount).to_string();
    let invoice_id = request.invoice_id.to_string();
    let mut params: Vec<(&str, &str)> = vec![
        ("m1", config.paynow_service_key.as_str()),
        ("m2", config.pci_vault_key.as_str()),
        ("p2", request.transaction_reference.as_str()),
        ("p3", request.description.as_str()),
        ("p4", cents.as_str()),
        ("m4", request.transaction_reference.as_str()),
        ("m5", invoice_id.as_str()),
        ("m9", config.return_url.as_str()),
        ("m10", config.cancel_url.as_str()),
    ];
    if let Some(email) = &request.customer_email {
        params.push(("m11", email.as_str()));
    }
    if let Some(phone) = &request.customer_phone {
        params.push(("m12", phone.as_str()));
    }
    Url::parse_with_params(&config.paynow_url, &params)
        .map(|u| u.to_string())
        .map_err(|e| AppError::Config(format!("invalid Pay Now URL: {}", e)))
}
