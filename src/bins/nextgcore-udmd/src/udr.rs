//! UDR repository port (Nudr-DR subscription data)
//!
//! The authentication path needs three operations from the UDR: fetch the
//! authentication subscription, replace its sequence number and store the
//! authentication status. [`SbiUdrClient`] speaks Nudr-DR over HTTP/2,
//! [`MemoryUdr`] keeps everything in process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ogs_sbi::{SbiClient, SbiClientConfig, SbiError};
use thiserror::Error;

use crate::types::{AuthEvent, AuthenticationSubscription, PatchItem, SequenceNumber};

const NUDR_DR_SUBSCRIPTION_DATA: &str = "/nudr-dr/v1/subscription-data";

/// UDR access errors
#[derive(Error, Debug)]
pub enum UdrError {
    #[error("Subscription not found for {0}")]
    NotFound(String),
    #[error("UDR transport error: {0}")]
    Transport(#[from] SbiError),
    #[error("UDR responded with status {0}")]
    UnexpectedStatus(u16),
    #[error("Invalid UDR response: {0}")]
    InvalidResponse(String),
    #[error("UDR rejected the update")]
    Rejected,
}

/// Repository operations used by the UDM authentication path
#[async_trait]
pub trait UdrClient: Send + Sync {
    /// Fetch the authentication subscription of `supi`
    async fn fetch_auth_subscription(
        &self,
        supi: &str,
    ) -> Result<AuthenticationSubscription, UdrError>;

    /// Replace the stored sequence number of `supi`
    async fn patch_sequence_number(&self, supi: &str, sqn: &str) -> Result<(), UdrError>;

    /// Store the authentication status reported for `supi`
    async fn put_auth_status(&self, supi: &str, event: &AuthEvent) -> Result<(), UdrError>;
}

fn auth_subscription_path(supi: &str) -> String {
    format!(
        "{}/{}/authentication-data/authentication-subscription",
        NUDR_DR_SUBSCRIPTION_DATA, supi
    )
}

fn auth_status_path(supi: &str) -> String {
    format!(
        "{}/{}/authentication-data/authentication-status",
        NUDR_DR_SUBSCRIPTION_DATA, supi
    )
}

/// Nudr-DR client over SBI
pub struct SbiUdrClient {
    client: SbiClient,
}

impl SbiUdrClient {
    pub fn new(config: SbiClientConfig) -> Self {
        Self {
            client: SbiClient::new(config),
        }
    }

    pub fn with_host_port(host: impl Into<String>, port: u16) -> Self {
        Self::new(SbiClientConfig::new(host, port))
    }
}

#[async_trait]
impl UdrClient for SbiUdrClient {
    async fn fetch_auth_subscription(
        &self,
        supi: &str,
    ) -> Result<AuthenticationSubscription, UdrError> {
        let response = self.client.get(&auth_subscription_path(supi)).await?;
        match response.status {
            200 => response
                .json_body()
                .map_err(|e| UdrError::InvalidResponse(e.to_string())),
            404 => Err(UdrError::NotFound(supi.to_string())),
            status => Err(UdrError::UnexpectedStatus(status)),
        }
    }

    async fn patch_sequence_number(&self, supi: &str, sqn: &str) -> Result<(), UdrError> {
        let patch = vec![PatchItem::replace_sequence_number(sqn)];
        let response = self
            .client
            .patch_json(&auth_subscription_path(supi), &patch)
            .await?;
        match response.status {
            200 | 204 => Ok(()),
            404 => Err(UdrError::NotFound(supi.to_string())),
            status => Err(UdrError::UnexpectedStatus(status)),
        }
    }

    async fn put_auth_status(&self, supi: &str, event: &AuthEvent) -> Result<(), UdrError> {
        let response = self.client.put_json(&auth_status_path(supi), event).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(UdrError::UnexpectedStatus(response.status))
        }
    }
}

/// In-process UDR
///
/// Every accepted SQN patch is recorded in arrival order. Patches can be
/// made to fail with [`MemoryUdr::set_fail_patches`].
#[derive(Debug, Default)]
pub struct MemoryUdr {
    subscriptions: Mutex<HashMap<String, AuthenticationSubscription>>,
    auth_status: Mutex<HashMap<String, AuthEvent>>,
    patches: Mutex<Vec<(String, String)>>,
    fail_patches: AtomicBool,
}

impl MemoryUdr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, supi: impl Into<String>, subscription: AuthenticationSubscription) {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(supi.into(), subscription);
    }

    pub fn subscription(&self, supi: &str) -> Option<AuthenticationSubscription> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(supi)
            .cloned()
    }

    /// Stored SQN of `supi`
    pub fn sqn(&self, supi: &str) -> Option<String> {
        self.subscription(supi)
            .and_then(|s| s.sequence_number)
            .map(|s| s.sqn)
    }

    /// Accepted SQN patches as `(supi, sqn)`, oldest first
    pub fn patches(&self) -> Vec<(String, String)> {
        self.patches.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn auth_status(&self, supi: &str) -> Option<AuthEvent> {
        self.auth_status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(supi)
            .cloned()
    }

    pub fn set_fail_patches(&self, fail: bool) {
        self.fail_patches.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl UdrClient for MemoryUdr {
    async fn fetch_auth_subscription(
        &self,
        supi: &str,
    ) -> Result<AuthenticationSubscription, UdrError> {
        let subscription = self.subscription(supi);
        // Let concurrent requests interleave between fetch and patch.
        tokio::task::yield_now().await;
        subscription.ok_or_else(|| UdrError::NotFound(supi.to_string()))
    }

    async fn patch_sequence_number(&self, supi: &str, sqn: &str) -> Result<(), UdrError> {
        if self.fail_patches.load(Ordering::SeqCst) {
            return Err(UdrError::Rejected);
        }

        {
            let mut subscriptions = self.subscriptions.lock().unwrap_or_else(|e| e.into_inner());
            let subscription = subscriptions
                .get_mut(supi)
                .ok_or_else(|| UdrError::NotFound(supi.to_string()))?;
            let scheme = subscription
                .sequence_number
                .take()
                .and_then(|s| s.sqn_scheme);
            subscription.sequence_number = Some(SequenceNumber {
                sqn_scheme: scheme,
                sqn: sqn.to_string(),
            });
        }

        self.patches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((supi.to_string(), sqn.to_string()));
        Ok(())
    }

    async fn put_auth_status(&self, supi: &str, event: &AuthEvent) -> Result<(), UdrError> {
        self.auth_status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(supi.to_string(), event.clone());
        Ok(())
    }
}
