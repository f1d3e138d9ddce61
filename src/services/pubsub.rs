//! Pubsub boundary for cross-process notification.

use async_trait::async_trait;

use crate::models::Offer;

/// Fire-and-forget notification sink.
///
/// Implementations must not block the pipeline on delivery failure: log
/// and continue. There is deliberately no return value.
#[async_trait]
pub trait Pubsub: Send + Sync {
    async fn publish(&self, offer: &Offer);
}

/// Pubsub that drops every message. Default when no channel is wired up.
#[derive(Debug, Default)]
pub struct NopPubsub;

#[async_trait]
impl Pubsub for NopPubsub {
    async fn publish(&self, _offer: &Offer) {}
}

/// Pubsub that renders the configured message template and logs it.
///
/// Useful on its own for terminal runs and as the template-expansion
/// reference for real channel implementations.
#[derive(Debug)]
pub struct LogNotifier {
    template: String,
}

impl LogNotifier {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

#[async_trait]
impl Pubsub for LogNotifier {
    async fn publish(&self, offer: &Offer) {
        log::info!("{}", offer.format(&self.template));
    }
}
