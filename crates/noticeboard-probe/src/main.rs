use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use noticeboard_push::{MemoryPlatform, PushConfig, PushService, Unsubscribed};
use noticeboard_types::{ItemRef, ItemType, PermissionState};

/// Drives the push flow end to end against a live backend, with an
/// in-process browser standing in for the client side.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "noticeboard=debug".into()),
        )
        .init();

    // Args: [event|notice] [item-id]
    let mut args = std::env::args().skip(1);
    let item_type: ItemType = args
        .next()
        .unwrap_or_else(|| "event".into())
        .parse()
        .map_err(anyhow::Error::msg)?;
    let item = ItemRef::new(item_type, args.next().unwrap_or_else(|| "probe".into()));

    let config = PushConfig::from_env();
    info!(api_url = %config.api_url, %item, "starting push probe");

    let platform = Arc::new(MemoryPlatform::new().with_permission(PermissionState::Granted));
    let service = PushService::connect(platform, &config).context("invalid backend url")?;

    let already = service.bootstrap.initialize().await;
    info!(already_subscribed = already, "bootstrap finished");

    let subscription = service.manager.subscribe().await.context("device subscribe")?;
    info!(endpoint = %subscription.endpoint, "device subscribed");

    service
        .items
        .subscribe_to_item(&subscription, &item)
        .await
        .context("item subscribe")?;
    let following = service
        .items
        .is_subscribed_to_item(&subscription.endpoint, &item)
        .await;
    info!(%item, following, "item subscription checked");
    if !following {
        warn!(%item, "backend does not report the item subscription");
    }

    service
        .items
        .unsubscribe_from_item(&subscription.endpoint, &item)
        .await
        .context("item unsubscribe")?;

    match service.manager.unsubscribe().await.context("device unsubscribe")? {
        Unsubscribed::Revoked { endpoint, backend_sync } => match backend_sync.outcome().await {
            Ok(()) => info!(%endpoint, "backend forgot device"),
            Err(e) => warn!(%endpoint, "backend unsubscribe failed: {}", e),
        },
        Unsubscribed::NotSubscribed => warn!("nothing to unsubscribe"),
    }

    info!("push probe finished");
    Ok(())
}
