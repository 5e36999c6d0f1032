//! Notifier that queues notifications and posts them to a webhook in the background.

use parcelroute_core::{Notification, NotificationPort, NotifyError};
use reqwest::{Client, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{WebhookError, parse_endpoint, send_checked};

/// Posts each notification as JSON to a webhook endpoint.
///
/// [`NotificationPort::emit`] only enqueues; delivery happens on a background
/// task and failures are logged, never reported back to the caller.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    queue: mpsc::UnboundedSender<Notification>,
}

impl WebhookNotifier {
    /// Start the delivery task on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidUrl`] when the endpoint is not an absolute URL.
    pub fn spawn(client: Client, endpoint: &str) -> Result<(Self, JoinHandle<()>), WebhookError> {
        let endpoint = parse_endpoint(endpoint)?;
        let (queue, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(deliver(client, endpoint, receiver));
        Ok((Self { queue }, worker))
    }
}

impl NotificationPort for WebhookNotifier {
    fn emit(&self, notification: Notification) -> Result<(), NotifyError> {
        self.queue
            .send(notification)
            .map_err(|_err| NotifyError::QueueClosed)
    }
}

async fn deliver(
    client: Client,
    endpoint: Url,
    mut receiver: mpsc::UnboundedReceiver<Notification>,
) {
    while let Some(notification) = receiver.recv().await {
        let request = client.post(endpoint.clone()).json(&notification);
        match send_checked(request).await {
            Ok(()) => debug!(shipment = %notification.related_id, "notification delivered"),
            Err(err) => warn!(
                shipment = %notification.related_id,
                error = %err,
                "notification delivery failed"
            ),
        }
    }
    debug!("notification queue closed");
}
