//! Service providers: the code that produces a delivery for a paid order.

use async_trait::async_trait;
use serde_json::json;
use svp_types::{AccountName, Result, ServiceDescriptor};

/// Produces the payload delivered to a paying buyer.
///
/// `Ok(None)` means "not ready yet": nothing is delivered and the buyer is
/// picked up again on the next scan.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn provide(
        &self,
        buyer: &AccountName,
        service: &ServiceDescriptor,
    ) -> Result<Option<String>>;
}

/// Replies to every buyer with `{"username": <buyer>}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProvider;

#[async_trait]
impl Provider for EchoProvider {
    async fn provide(
        &self,
        buyer: &AccountName,
        _service: &ServiceDescriptor,
    ) -> Result<Option<String>> {
        Ok(Some(json!({ "username": buyer }).to_string()))
    }
}

/// Adapts a synchronous closure into a [`Provider`].
pub struct FnProvider<F> {
    f: F,
}

impl<F> FnProvider<F>
where
    F: Fn(&AccountName, &ServiceDescriptor) -> Option<String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Provider for FnProvider<F>
where
    F: Fn(&AccountName, &ServiceDescriptor) -> Option<String> + Send + Sync,
{
    async fn provide(
        &self,
        buyer: &AccountName,
        service: &ServiceDescriptor,
    ) -> Result<Option<String>> {
        Ok((self.f)(buyer, service))
    }
}

impl<F> std::fmt::Debug for FnProvider<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProvider").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svp_types::ServiceConfig;

    #[tokio::test]
    async fn echo_returns_buyer_name_as_json() {
        let out = EchoProvider
            .provide(&AccountName::new("bob"), &ServiceConfig::default().descriptor())
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value, json!({ "username": "bob" }));
    }

    #[tokio::test]
    async fn closure_provider_sees_buyer_and_service() {
        let provider = FnProvider::new(|buyer: &AccountName, svc: &ServiceDescriptor| {
            (buyer.as_str() != "early").then(|| format!("{}:{}", svc.permlink, buyer))
        });
        let desc = ServiceConfig::dummy("weather", 1).descriptor();

        let ready = provider.provide(&AccountName::new("bob"), &desc).await.unwrap();
        assert_eq!(ready.as_deref(), Some("weather:bob"));

        let not_ready = provider.provide(&AccountName::new("early"), &desc).await.unwrap();
        assert!(not_ready.is_none());
    }
}
