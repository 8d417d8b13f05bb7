//! Nudm-UEAU and Nudr-DR data types (TS 29.503, TS 29.505)
//!
//! Only the members the UDM authentication path reads or writes are modeled.
//! Field names follow the OpenAPI camelCase spelling on the wire.

use serde::{Deserialize, Serialize};

/// Authentication type (from OpenAPI AuthType)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthType {
    /// 5G AKA authentication
    #[default]
    #[serde(rename = "5G_AKA")]
    FiveGAka,
    /// EAP-AKA' authentication
    #[serde(rename = "EAP_AKA_PRIME")]
    EapAkaPrime,
    /// EAP-TLS authentication, only ever reported in auth events
    #[serde(rename = "EAP_TLS")]
    EapTls,
}

impl AuthType {
    /// Map a subscription `authenticationMethod` to the vector type the
    /// UDM can generate for it.
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "5G_AKA" => Some(AuthType::FiveGAka),
            "EAP_AKA_PRIME" => Some(AuthType::EapAkaPrime),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::FiveGAka => "5G_AKA",
            AuthType::EapAkaPrime => "EAP_AKA_PRIME",
            AuthType::EapTls => "EAP_TLS",
        }
    }
}

/// Sequence number container in AuthenticationSubscription
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceNumber {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqn_scheme: Option<String>,
    #[serde(default)]
    pub sqn: String,
}

impl SequenceNumber {
    pub fn new(sqn: impl Into<String>) -> Self {
        Self {
            sqn_scheme: Some("NON_TIME_BASED".to_string()),
            sqn: sqn.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Op {
    pub op_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milenage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<Op>,
}

/// Authentication subscription stored at the UDR
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthenticationSubscription {
    pub authentication_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enc_permanent_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protection_parameter_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<SequenceNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_management_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milenage: Option<Milenage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enc_opc_key: Option<String>,
}

impl AuthenticationSubscription {
    /// OP value, if the subscription carries one
    pub fn op_value(&self) -> Option<&str> {
        self.milenage
            .as_ref()
            .and_then(|m| m.op.as_ref())
            .map(|op| op.op_value.as_str())
    }

    /// Stored SQN hex string, if any
    pub fn sqn(&self) -> Option<&str> {
        self.sequence_number.as_ref().map(|s| s.sqn.as_str())
    }
}

// Key material stays out of debug output.
impl std::fmt::Debug for AuthenticationSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationSubscription")
            .field("authentication_method", &self.authentication_method)
            .field("sequence_number", &self.sequence_number)
            .field(
                "authentication_management_field",
                &self.authentication_management_field,
            )
            .field("has_permanent_key", &self.enc_permanent_key.is_some())
            .field("has_opc", &self.enc_opc_key.is_some())
            .field("has_op", &self.op_value().is_some())
            .finish()
    }
}

/// Resynchronization info for re-sync procedure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResynchronizationInfo {
    pub rand: String,
    pub auts: String,
}

/// Authentication info request data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationInfoRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_network_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ausf_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resynchronization_info: Option<ResynchronizationInfo>,
}

impl AuthenticationInfoRequest {
    pub fn new(serving_network_name: impl Into<String>) -> Self {
        Self {
            serving_network_name: Some(serving_network_name.into()),
            ..Default::default()
        }
    }

    pub fn with_resync(mut self, rand: impl Into<String>, auts: impl Into<String>) -> Self {
        self.resynchronization_info = Some(ResynchronizationInfo {
            rand: rand.into(),
            auts: auts.into(),
        });
        self
    }
}

/// Authentication vector, tagged by `avType`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "avType")]
pub enum AuthenticationVector {
    #[serde(rename = "5G_HE_AKA", rename_all = "camelCase")]
    FiveGHeAka {
        rand: String,
        xres_star: String,
        autn: String,
        kausf: String,
    },
    #[serde(rename = "EAP_AKA_PRIME", rename_all = "camelCase")]
    EapAkaPrime {
        rand: String,
        xres: String,
        autn: String,
        ck_prime: String,
        ik_prime: String,
    },
}

impl AuthenticationVector {
    pub fn rand(&self) -> &str {
        match self {
            AuthenticationVector::FiveGHeAka { rand, .. }
            | AuthenticationVector::EapAkaPrime { rand, .. } => rand,
        }
    }

    pub fn autn(&self) -> &str {
        match self {
            AuthenticationVector::FiveGHeAka { autn, .. }
            | AuthenticationVector::EapAkaPrime { autn, .. } => autn,
        }
    }
}

/// Authentication info result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationInfoResult {
    pub auth_type: AuthType,
    pub authentication_vector: AuthenticationVector,
    pub supi: String,
}

/// Auth event reported by the AUSF after authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthEvent {
    pub nf_instance_id: String,
    pub success: bool,
    pub time_stamp: String,
    pub auth_type: AuthType,
    pub serving_network_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_removal_ind: Option<bool>,
}

/// One RFC 6902 JSON Patch operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchItem {
    pub op: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl PatchItem {
    /// `replace /sequenceNumber` with a new SQN
    pub fn replace_sequence_number(sqn: &str) -> Self {
        Self {
            op: "replace".to_string(),
            path: "/sequenceNumber".to_string(),
            value: Some(serde_json::json!({ "sqn": sqn })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_type_wire_names() {
        assert_eq!(serde_json::to_string(&AuthType::FiveGAka).unwrap(), "\"5G_AKA\"");
        assert_eq!(
            serde_json::from_str::<AuthType>("\"EAP_AKA_PRIME\"").unwrap(),
            AuthType::EapAkaPrime
        );
        assert_eq!(AuthType::from_method("5G_AKA"), Some(AuthType::FiveGAka));
        assert_eq!(AuthType::from_method("EAP_TLS"), None);
    }

    #[test]
    fn test_authentication_subscription_json() {
        let json = r#"{
            "authenticationMethod": "5G_AKA",
            "encPermanentKey": "8baf473f2f8fd09487cccbd7097c6862",
            "protectionParameterId": "8baf473f2f8fd09487cccbd7097c6862",
            "sequenceNumber": {"sqnScheme": "NON_TIME_BASED", "sqn": "000000000023"},
            "authenticationManagementField": "8000",
            "milenage": {"op": {"opValue": "8e27b6af0e692e750f32667a3b14605d"}},
            "encOpcKey": "8e27b6af0e692e750f32667a3b14605d"
        }"#;
        let sub: AuthenticationSubscription = serde_json::from_str(json).unwrap();
        assert_eq!(sub.authentication_method, "5G_AKA");
        assert_eq!(sub.sqn(), Some("000000000023"));
        assert_eq!(sub.op_value(), Some("8e27b6af0e692e750f32667a3b14605d"));

        let debug = format!("{:?}", sub);
        assert!(!debug.contains("8baf473f"));
    }

    #[test]
    fn test_authentication_vector_tagging() {
        let av = AuthenticationVector::FiveGHeAka {
            rand: "aa".into(),
            xres_star: "bb".into(),
            autn: "cc".into(),
            kausf: "dd".into(),
        };
        let value = serde_json::to_value(&av).unwrap();
        assert_eq!(value["avType"], "5G_HE_AKA");
        assert_eq!(value["xresStar"], "bb");
        assert!(value.get("xres").is_none());

        let av = AuthenticationVector::EapAkaPrime {
            rand: "aa".into(),
            xres: "bb".into(),
            autn: "cc".into(),
            ck_prime: "dd".into(),
            ik_prime: "ee".into(),
        };
        let value = serde_json::to_value(&av).unwrap();
        assert_eq!(value["avType"], "EAP_AKA_PRIME");
        assert_eq!(value["ckPrime"], "dd");
        assert!(value.get("kausf").is_none());

        let parsed: AuthenticationVector = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, av);
    }

    #[test]
    fn test_patch_item() {
        let item = PatchItem::replace_sequence_number("000000000024");
        let value = serde_json::to_value(vec![item]).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                {"op": "replace", "path": "/sequenceNumber", "value": {"sqn": "000000000024"}}
            ])
        );
    }

    #[test]
    fn test_auth_info_request_optional_members() {
        let req: AuthenticationInfoRequest =
            serde_json::from_str(r#"{"ausfInstanceId":"x"}"#).unwrap();
        assert!(req.serving_network_name.is_none());
        assert!(req.resynchronization_info.is_none());
    }
}
