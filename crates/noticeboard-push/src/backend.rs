use async_trait::async_trait;
use reqwest::{Client, Response};
use url::Url;

use noticeboard_types::api::{
    CheckSubscriptionResponse, ErrorResponse, SubscribeItemRequest, SubscribeRequest,
    UnsubscribeItemRequest, UnsubscribeRequest, VapidPublicKeyResponse,
};
use noticeboard_types::{ItemRef, PushSubscription};

use crate::error::BackendError;

/// The backend's `/api/push` surface.
#[async_trait]
pub trait PushBackend: Send + Sync {
    /// `GET /vapid-public-key`
    async fn vapid_public_key(&self) -> Result<String, BackendError>;

    /// `POST /subscribe`
    async fn subscribe(&self, subscription: &PushSubscription) -> Result<(), BackendError>;

    /// `POST /unsubscribe`
    async fn unsubscribe(&self, endpoint: &str) -> Result<(), BackendError>;

    /// `POST /subscribe-item`
    async fn subscribe_item(
        &self,
        subscription: &PushSubscription,
        item: &ItemRef,
    ) -> Result<(), BackendError>;

    /// `POST /unsubscribe-item`
    async fn unsubscribe_item(&self, endpoint: &str, item: &ItemRef) -> Result<(), BackendError>;

    /// `GET /check-subscription/:itemType/:itemId?endpoint=...`
    async fn check_item_subscription(
        &self,
        endpoint: &str,
        item: &ItemRef,
    ) -> Result<bool, BackendError>;
}

/// `PushBackend` over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(api_url: &str) -> Result<Self, BackendError> {
        Self::with_client(Client::new(), api_url)
    }

    pub fn with_client(client: Client, api_url: &str) -> Result<Self, BackendError> {
        let mut base = Url::parse(api_url)
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", api_url, e)))?;
        base.set_query(None);
        base.set_fragment(None);
        {
            let mut segments = base
                .path_segments_mut()
                .map_err(|_| BackendError::InvalidUrl(format!("{}: not a base url", api_url)))?;
            segments.pop_if_empty().extend(["api", "push"]);
        }
        Ok(Self { client, base })
    }

    /// Base of the push API, e.g. `http://localhost:5000/api/push`.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    fn check_url(&self, endpoint: &str, item: &ItemRef) -> Url {
        let mut url = self.url(&["check-subscription", item.item_type.as_str(), &item.item_id]);
        url.query_pairs_mut().append_pair("endpoint", endpoint);
        url
    }
}

/// Turn a non-2xx response into `BackendError::Status`, keeping the
/// server's message when the body is a JSON error.
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(ErrorResponse::into_message);
    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl PushBackend for HttpBackend {
    async fn vapid_public_key(&self) -> Result<String, BackendError> {
        let response = self.client.get(self.url(&["vapid-public-key"])).send().await?;
        let body: VapidPublicKeyResponse = check(response).await?.json().await?;
        Ok(body.public_key)
    }

    async fn subscribe(&self, subscription: &PushSubscription) -> Result<(), BackendError> {
        let body = SubscribeRequest {
            subscription: subscription.clone(),
        };
        let response = self.client.post(self.url(&["subscribe"])).json(&body).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn unsubscribe(&self, endpoint: &str) -> Result<(), BackendError> {
        let body = UnsubscribeRequest {
            endpoint: endpoint.to_string(),
        };
        let response = self.client.post(self.url(&["unsubscribe"])).json(&body).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn subscribe_item(
        &self,
        subscription: &PushSubscription,
        item: &ItemRef,
    ) -> Result<(), BackendError> {
        let body = SubscribeItemRequest {
            subscription: subscription.clone(),
            item_type: item.item_type,
            item_id: item.item_id.clone(),
        };
        let response = self.client.post(self.url(&["subscribe-item"])).json(&body).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn unsubscribe_item(&self, endpoint: &str, item: &ItemRef) -> Result<(), BackendError> {
        let body = UnsubscribeItemRequest {
            endpoint: endpoint.to_string(),
            item_type: item.item_type,
            item_id: item.item_id.clone(),
        };
        let response = self.client.post(self.url(&["unsubscribe-item"])).json(&body).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn check_item_subscription(
        &self,
        endpoint: &str,
        item: &ItemRef,
    ) -> Result<bool, BackendError> {
        let response = self.client.get(self.check_url(endpoint, item)).send().await?;
        let body: CheckSubscriptionResponse = check(response).await?.json().await?;
        Ok(body.is_subscribed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_api_hangs_off_the_origin() {
        let backend = HttpBackend::new("http://localhost:5000").unwrap();
        assert_eq!(backend.base_url().as_str(), "http://localhost:5000/api/push");
        assert_eq!(
            backend.url(&["vapid-public-key"]).as_str(),
            "http://localhost:5000/api/push/vapid-public-key"
        );
    }

    #[test]
    fn base_path_is_preserved() {
        let backend = HttpBackend::new("https://example.edu/board/?x=1").unwrap();
        assert_eq!(backend.base_url().as_str(), "https://example.edu/board/api/push");
    }

    #[test]
    fn check_url_escapes_item_and_endpoint() {
        let backend = HttpBackend::new("http://localhost:5000").unwrap();
        let url = backend.check_url(
            "https://fcm.googleapis.com/fcm/send/a:b?c",
            &ItemRef::notice("N/1"),
        );
        assert_eq!(url.path(), "/api/push/check-subscription/notice/N%2F1");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![("endpoint".to_string(), "https://fcm.googleapis.com/fcm/send/a:b?c".to_string())]
        );
    }

    #[test]
    fn relative_urls_are_rejected() {
        assert!(matches!(HttpBackend::new("/api"), Err(BackendError::InvalidUrl(_))));
        assert!(matches!(
            HttpBackend::new("mailto:board@example.edu"),
            Err(BackendError::InvalidUrl(_))
        ));
    }
}
