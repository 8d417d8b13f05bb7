//! Nudm-UEAU request handling
//!
//! - `POST /nudm-ueau/v1/{supiOrSuci}/security-information/generate-auth-data`
//! - `POST /nudm-ueau/v1/{supi}/auth-events`

use std::sync::Arc;

use ogs_sbi::{
    send_bad_request, send_error, send_internal_error, send_method_not_allowed, send_not_found,
    SbiRequest, SbiResponse,
};
use serde::de::DeserializeOwned;

use crate::error::Rejected;
use crate::types::{AuthEvent, AuthenticationInfoRequest};
use crate::ueau::UeauService;

pub const SERVICE_NUDM_UEAU: &str = "nudm-ueau";
pub const API_VERSION_V1: &str = "v1";

fn send_rejected(rejected: &Rejected) -> SbiResponse {
    let status = rejected.http_status();
    let title = if status == 404 { "Not Found" } else { "Forbidden" };
    send_error(status, title, &rejected.detail, Some(rejected.cause))
}

fn parse_body<T: DeserializeOwned>(request: &SbiRequest) -> Result<T, SbiResponse> {
    match request.json_body::<T>() {
        Some(Ok(body)) => Ok(body),
        Some(Err(e)) => Err(send_bad_request(&format!("Invalid JSON: {}", e), Some("INVALID_JSON"))),
        None => Err(send_bad_request("Missing request body", Some("MISSING_BODY"))),
    }
}

/// Route one SBI request to the UEAU service
pub async fn udm_sbi_request_handler(service: Arc<UeauService>, request: SbiRequest) -> SbiResponse {
    let method = request.header.method.as_str();
    let uri = request.header.uri.as_str();
    log::debug!("UDM SBI request: {} {}", method, uri);

    match request.header.service_name.as_deref() {
        Some(SERVICE_NUDM_UEAU) => {}
        _ => {
            log::warn!("Unknown UDM request: {} {}", method, uri);
            return send_not_found("Unknown service", None);
        }
    }
    if request.header.api_version.as_deref() != Some(API_VERSION_V1) {
        return send_bad_request("Unsupported API version", Some("INVALID_API"));
    }

    let resource: Vec<&str> = request.header.resource.iter().map(String::as_str).collect();
    match (resource.as_slice(), method) {
        ([supi, "security-information", "generate-auth-data"], "POST") => {
            handle_generate_auth_data(&service, supi, &request).await
        }
        ([supi, "auth-events"], "POST") => handle_auth_event(&service, supi, &request).await,
        ([_, "security-information", "generate-auth-data"], _) | ([_, "auth-events"], _) => {
            send_method_not_allowed(method, uri)
        }
        _ => send_not_found("Unknown resource", None),
    }
}

/// Handle NUDM UEAU get request (generate-auth-data)
async fn handle_generate_auth_data(
    service: &UeauService,
    supi_or_suci: &str,
    request: &SbiRequest,
) -> SbiResponse {
    log::debug!("[{}] Handle NUDM UEAU get request", supi_or_suci);

    let auth_info: AuthenticationInfoRequest = match parse_body(request) {
        Ok(body) => body,
        Err(response) => return response,
    };

    if auth_info
        .serving_network_name
        .as_deref()
        .map_or(true, str::is_empty)
    {
        log::error!("[{}] No servingNetworkName", supi_or_suci);
        return send_bad_request("No servingNetworkName", None);
    }
    if auth_info.ausf_instance_id.is_none() {
        log::debug!("[{}] No ausfInstanceId", supi_or_suci);
    }

    match service.generate_auth_data(supi_or_suci, &auth_info).await {
        Ok(result) => SbiResponse::ok()
            .with_json_body(&result)
            .unwrap_or_else(|e| send_internal_error(&e.to_string())),
        Err(rejected) => send_rejected(&rejected),
    }
}

/// Handle NUDM UEAU result confirmation inform (auth-events)
async fn handle_auth_event(service: &UeauService, supi: &str, request: &SbiRequest) -> SbiResponse {
    log::debug!("[{}] Handle NUDM UEAU result confirmation inform", supi);

    let event: AuthEvent = match parse_body(request) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if event.nf_instance_id.is_empty() {
        return send_bad_request("No nfInstanceId", None);
    }
    if event.serving_network_name.is_empty() {
        return send_bad_request("No servingNetworkName", None);
    }

    match service.confirm_auth_event(supi, &event).await {
        Ok(auth_event_id) => {
            let location = format!(
                "/{}/{}/{}/auth-events/{}",
                SERVICE_NUDM_UEAU, API_VERSION_V1, supi, auth_event_id
            );
            SbiResponse::created()
                .with_header("Location", location)
                .with_json_body(&event)
                .unwrap_or_else(|e| send_internal_error(&e.to_string()))
        }
        Err(rejected) => send_rejected(&rejected),
    }
}
