pub use crate::lsps0::common_schemas::*;
use crate::json_rpc::NoParams;
use serde::{Deserialize, Serialize};

pub type ListprotocolsRequest = NoParams;
pub type Lsps0GetInfoRequest = NoParams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListprotocolsResponse {
    pub protocols: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lsps0GetInfoResponse {
    pub supported_versions: Vec<u32>,
    /// Hex-encoded x-only key the LSP uses to sign LSPS5 notifications on Nostr
    #[serde(default)]
    pub notification_nostr_pubkey: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serialize_protocol_list() {
        let protocols = ListprotocolsResponse {
            protocols: vec![1, 3],
        };

        let json_str = serde_json::to_string(&protocols).unwrap();
        assert_eq!(json_str, "{\"protocols\":[1,3]}")
    }

    #[test]
    fn deserialize_get_info() {
        let info: Lsps0GetInfoResponse = serde_json::from_value(serde_json::json!({
            "supported_versions" : [1],
            "notification_nostr_pubkey" : "ab01"
        }))
        .unwrap();

        assert_eq!(info.supported_versions, vec![1]);
        assert_eq!(info.notification_nostr_pubkey, "ab01");
    }
}
