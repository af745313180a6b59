use serde::{Deserialize, Serialize};

use crate::models::{ItemType, PushSubscription};

// -- VAPID --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidPublicKeyResponse {
    pub public_key: String,
}

// -- Device subscription --

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub subscription: PushSubscription,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

// -- Item subscriptions --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeItemRequest {
    pub subscription: PushSubscription,
    pub item_type: ItemType,
    pub item_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeItemRequest {
    pub endpoint: String,
    pub item_type: ItemType,
    pub item_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckSubscriptionQuery {
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSubscriptionResponse {
    pub is_subscribed: bool,
}

// -- Errors --

/// Error body the backend returns on non-2xx responses.
/// Either field may carry the human-readable text.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    pub fn into_message(self) -> Option<String> {
        self.message
            .or(self.error)
            .filter(|m| !m.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PushKeys;

    #[test]
    fn item_requests_use_camel_case() {
        let req = SubscribeItemRequest {
            subscription: PushSubscription {
                endpoint: "https://e".into(),
                expiration_time: None,
                keys: PushKeys {
                    p256dh: "k".into(),
                    auth: "a".into(),
                },
            },
            item_type: ItemType::Event,
            item_id: "E1".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["itemType"], "event");
        assert_eq!(json["itemId"], "E1");
        assert_eq!(json["subscription"]["endpoint"], "https://e");

        let req = UnsubscribeItemRequest {
            endpoint: "https://e".into(),
            item_type: ItemType::Notice,
            item_id: "N7".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({"endpoint": "https://e", "itemType": "notice", "itemId": "N7"}));
    }

    #[test]
    fn responses_parse_backend_field_names() {
        let key: VapidPublicKeyResponse = serde_json::from_str(r#"{"publicKey":"BAbc"}"#).unwrap();
        assert_eq!(key.public_key, "BAbc");

        let check: CheckSubscriptionResponse =
            serde_json::from_str(r#"{"isSubscribed":true,"extra":1}"#).unwrap();
        assert!(check.is_subscribed);
    }

    #[test]
    fn error_message_prefers_message_field() {
        let body: ErrorResponse =
            serde_json::from_str(r#"{"message":"Item not found","error":"404"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Item not found"));

        let body: ErrorResponse = serde_json::from_str(r#"{"error":"Invalid body"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Invalid body"));

        let body: ErrorResponse = serde_json::from_str(r#"{"message":"  "}"#).unwrap();
        assert_eq!(body.into_message(), None);
    }
}
