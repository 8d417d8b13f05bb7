//! Nudm-UEAU authentication vector generation
//!
//! [`compute_auth_vector`] turns one authentication subscription into one
//! vector and the SQN to store afterwards. It does no I/O. [`UeauService`]
//! resolves the SUPI, serializes requests per SUPI, and performs the UDR
//! fetch and the SQN patch around it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ogs_crypt::kdf;
use ogs_crypt::milenage::{
    self, MilenageVector, OGS_AUTS_LEN, OGS_KEY_LEN, OGS_RAND_LEN, OGS_SQN_LEN,
};
use ogs_crypt::random::ogs_random_rand;

use crate::error::{ErrorKind, Rejected};
use crate::lock::SupiLockTable;
use crate::sqn::{self, AMF_HEX_LEN, RESYNC_SQN_DELTA, SQN_HEX_LEN, SQN_MODULUS};
use crate::suci::{self, SuciProfile};
use crate::types::{
    AuthEvent, AuthType, AuthenticationInfoRequest, AuthenticationInfoResult,
    AuthenticationSubscription, AuthenticationVector,
};
use crate::udr::{UdrClient, UdrError};

/// A computed vector and the SQN the repository must hold afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorOutcome {
    pub result: AuthenticationInfoResult,
    pub next_sqn: String,
}

fn decode_key(value: Option<&str>) -> Option<[u8; OGS_KEY_LEN]> {
    let value = value?;
    if value.len() != OGS_KEY_LEN * 2 {
        return None;
    }
    let mut key = [0u8; OGS_KEY_LEN];
    hex::decode_to_slice(value, &mut key).ok()?;
    Some(key)
}

fn resolve_opc(
    supi: &str,
    k: &[u8; OGS_KEY_LEN],
    subscription: &AuthenticationSubscription,
) -> Result<[u8; OGS_KEY_LEN], Rejected> {
    if let Some(opc) = decode_key(subscription.enc_opc_key.as_deref()) {
        return Ok(opc);
    }
    if let Some(op) = decode_key(subscription.op_value()) {
        log::debug!("[{}] Deriving OPc from OP", supi);
        return Ok(milenage::milenage_opc(k, &op));
    }
    log::error!("[{}] No usable OPc or OP", supi);
    Err(Rejected::authentication(
        ErrorKind::OpcDerivationFailure,
        "unable to derive OPC",
    ))
}

fn decode_error(supi: &str, detail: String) -> Rejected {
    log::error!("[{}] {}", supi, detail);
    Rejected::authentication(ErrorKind::DecodeError, detail)
}

fn decode_fixed<const N: usize>(supi: &str, name: &str, value: &str) -> Result<[u8; N], Rejected> {
    let mut out = [0u8; N];
    hex::decode_to_slice(value, &mut out)
        .map_err(|_| decode_error(supi, format!("invalid {}: expected {} bytes of hex", name, N)))?;
    Ok(out)
}

/// Key material for `auth_type`, `None` for methods without an AKA vector
fn derive_vector(
    auth_type: AuthType,
    vector: &MilenageVector,
    serving_network_name: &str,
    rand: &[u8; OGS_RAND_LEN],
) -> Option<AuthenticationVector> {
    let mut sqn_xor_ak = [0u8; kdf::OGS_SQN_XOR_AK_LEN];
    sqn_xor_ak.copy_from_slice(&vector.autn[..kdf::OGS_SQN_XOR_AK_LEN]);

    match auth_type {
        AuthType::EapAkaPrime => {
            let (ck_prime, ik_prime) = kdf::ogs_kdf_ck_ik_prime(
                &vector.ck,
                &vector.ik,
                serving_network_name,
                &sqn_xor_ak,
            );
            Some(AuthenticationVector::EapAkaPrime {
                rand: hex::encode(rand),
                xres: hex::encode(vector.res),
                autn: hex::encode(vector.autn),
                ck_prime: hex::encode(ck_prime),
                ik_prime: hex::encode(ik_prime),
            })
        }
        AuthType::FiveGAka => {
            let xres_star = kdf::ogs_kdf_xres_star(
                &vector.ck,
                &vector.ik,
                serving_network_name,
                rand,
                &vector.res,
            );
            let kausf =
                kdf::ogs_kdf_kausf(&vector.ck, &vector.ik, serving_network_name, &sqn_xor_ak);
            Some(AuthenticationVector::FiveGHeAka {
                rand: hex::encode(rand),
                xres_star: hex::encode(xres_star),
                autn: hex::encode(vector.autn),
                kausf: hex::encode(kausf),
            })
        }
        AuthType::EapTls => None,
    }
}

/// Generate one authentication vector.
///
/// `draw_rand` supplies each fresh RAND. The vector is computed against the
/// stored SQN, or against `SQNms + 66` after an accepted resynchronization;
/// `next_sqn` is that SQN plus one.
pub fn compute_auth_vector(
    supi: &str,
    subscription: &AuthenticationSubscription,
    request: &AuthenticationInfoRequest,
    mut draw_rand: impl FnMut() -> [u8; OGS_RAND_LEN],
) -> Result<VectorOutcome, Rejected> {
    let serving_network_name = match request.serving_network_name.as_deref() {
        Some(snn) if !snn.is_empty() => snn,
        _ => return Err(decode_error(supi, "no servingNetworkName".to_string())),
    };

    let auth_type = AuthType::from_method(&subscription.authentication_method).ok_or_else(|| {
        decode_error(
            supi,
            format!(
                "unsupported authentication method '{}'",
                subscription.authentication_method
            ),
        )
    })?;

    let k = decode_key(subscription.enc_permanent_key.as_deref())
        .ok_or_else(|| decode_error(supi, "invalid encPermanentKey".to_string()))?;
    let opc = resolve_opc(supi, &k, subscription)?;

    let stored_sqn = subscription
        .sqn()
        .ok_or_else(|| decode_error(supi, "no sequenceNumber".to_string()))?;
    let mut sqn_hex = sqn::normalize_hex_checked(stored_sqn, SQN_HEX_LEN).map_err(|e| {
        log::warn!("[{}] Stored SQN rejected: {}", supi, e);
        decode_error(supi, format!("invalid sequenceNumber: {}", e))
    })?;

    let amf_hex = subscription
        .authentication_management_field
        .as_deref()
        .ok_or_else(|| decode_error(supi, "no authenticationManagementField".to_string()))?;
    let amf = sqn::amf_to_bytes(amf_hex).map_err(|e| {
        log::warn!("[{}] Stored AMF rejected: {}", supi, e);
        decode_error(supi, format!("invalid authenticationManagementField: {}", e))
    })?;
    log::debug!("[{}] AMF {}", supi, sqn::normalize_hex(amf_hex, AMF_HEX_LEN));

    let mut rand = draw_rand();

    if let Some(resync) = &request.resynchronization_info {
        let ue_rand: [u8; OGS_RAND_LEN] = decode_fixed(supi, "RAND", &resync.rand)?;
        let auts: [u8; OGS_AUTS_LEN] = decode_fixed(supi, "AUTS", &resync.auts)?;

        let sqn_ms = match milenage::milenage_auts(&opc, &k, &ue_rand, &auts) {
            Ok(sqn_ms) => sqn_ms,
            Err(_) => {
                log::error!("[{}] Re-synch MAC failed", supi);
                log::debug!(
                    "[{}] AUTS {} RAND {} SQN {}",
                    supi,
                    resync.auts,
                    resync.rand,
                    sqn_hex
                );
                return Err(Rejected::resync_mismatch());
            }
        };

        let sqn_ms = sqn::sqn_from_bytes(&sqn_ms);
        sqn_hex = sqn::increment_modulo(&sqn_ms, RESYNC_SQN_DELTA, SQN_MODULUS)
            .map_err(|e| decode_error(supi, e.to_string()))?;
        rand = draw_rand();
        log::info!("[{}] Re-synch SQN MS {} -> {}", supi, sqn_ms, sqn_hex);
    }

    let next_sqn = sqn::increment_modulo(&sqn_hex, 1, SQN_MODULUS)
        .map_err(|e| decode_error(supi, e.to_string()))?;
    let sqn_bytes: [u8; OGS_SQN_LEN] =
        sqn::sqn_to_bytes(&sqn_hex).map_err(|e| decode_error(supi, e.to_string()))?;

    let vector = milenage::milenage_generate(&opc, &amf, &k, &sqn_bytes, &rand);
    let authentication_vector = derive_vector(auth_type, &vector, serving_network_name, &rand)
        .ok_or_else(|| {
            decode_error(
                supi,
                format!("no authentication vector for {}", auth_type.as_str()),
            )
        })?;

    Ok(VectorOutcome {
        result: AuthenticationInfoResult {
            auth_type,
            authentication_vector,
            supi: supi.to_string(),
        },
        next_sqn,
    })
}

fn fetch_rejection(supi: &str, e: UdrError) -> Rejected {
    log::error!("[{}] Authentication subscription fetch failed: {}", supi, e);
    match e {
        UdrError::NotFound(_) => Rejected::authentication(
            ErrorKind::SubscriptionNotFound,
            "authentication subscription not found",
        ),
        _ => Rejected::authentication(
            ErrorKind::DecodeError,
            "authentication subscription unavailable",
        ),
    }
}

/// UE authentication service
pub struct UeauService {
    profiles: Vec<SuciProfile>,
    udr: Arc<dyn UdrClient>,
    locks: SupiLockTable,
    next_auth_event_id: AtomicU64,
}

impl UeauService {
    pub fn new(profiles: Vec<SuciProfile>, udr: Arc<dyn UdrClient>) -> Self {
        Self {
            profiles,
            udr,
            locks: SupiLockTable::new(),
            next_auth_event_id: AtomicU64::new(1),
        }
    }

    pub fn profiles(&self) -> &[SuciProfile] {
        &self.profiles
    }

    /// Resolve a SUPI, de-concealing it when a SUCI is given.
    pub fn resolve_supi(&self, supi_or_suci: &str) -> Result<String, Rejected> {
        if supi_or_suci.starts_with("imsi-") || supi_or_suci.starts_with("nai-") {
            return Ok(supi_or_suci.to_string());
        }
        suci::to_supi(supi_or_suci, &self.profiles).map_err(|e| {
            log::error!("[{}] {}", supi_or_suci, e);
            Rejected::from(e)
        })
    }

    /// Generate an authentication vector and advance the stored SQN.
    ///
    /// The SQN patch is issued only once the vector is complete, so an
    /// abandoned request leaves the repository untouched.
    pub async fn generate_auth_data(
        &self,
        supi_or_suci: &str,
        request: &AuthenticationInfoRequest,
    ) -> Result<AuthenticationInfoResult, Rejected> {
        let supi = self.resolve_supi(supi_or_suci)?;
        let _guard = self.locks.lock(&supi).await;

        let subscription = self
            .udr
            .fetch_auth_subscription(&supi)
            .await
            .map_err(|e| fetch_rejection(&supi, e))?;

        let outcome = compute_auth_vector(&supi, &subscription, request, ogs_random_rand)?;

        if let Err(e) = self
            .udr
            .patch_sequence_number(&supi, &outcome.next_sqn)
            .await
        {
            log::error!("[{}] SQN update failed: {}", supi, e);
            return Err(match e {
                UdrError::NotFound(_) => Rejected::authentication(
                    ErrorKind::SubscriptionNotFound,
                    "authentication subscription not found",
                ),
                _ => Rejected::persist_failure(),
            });
        }

        log::info!(
            "[{}] {} vector generated, next SQN {}",
            supi,
            outcome.result.auth_type.as_str(),
            outcome.next_sqn
        );
        Ok(outcome.result)
    }

    /// Store an authentication result event.
    ///
    /// Returns the identifier of the created auth event resource.
    pub async fn confirm_auth_event(&self, supi: &str, event: &AuthEvent) -> Result<String, Rejected> {
        let supi = self.resolve_supi(supi)?;
        log::debug!(
            "[{}] Auth event from {}: success={} ({})",
            supi,
            event.nf_instance_id,
            event.success,
            event.auth_type.as_str()
        );

        if let Err(e) = self.udr.put_auth_status(&supi, event).await {
            log::error!("[{}] Authentication status update failed: {}", supi, e);
            return Err(Rejected::authentication(
                ErrorKind::PersistFailure,
                "authentication status is not stored",
            ));
        }

        Ok(self.next_auth_event_id.fetch_add(1, Ordering::Relaxed).to_string())
    }
}
