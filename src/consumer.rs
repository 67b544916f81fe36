//! NATS subscriptions for inbound call traffic

use crate::config::NatsConfig;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Subscribes to the control, chunk and analyze subjects
pub struct CallConsumer {
    client: Client,
    control_subject: String,
    chunk_subject: String,
    analyze_subject: String,
}

/// The three live subscriptions the service reads from
pub struct CallSubscriptions {
    pub control: Subscriber,
    pub chunks: Subscriber,
    pub analyze: Subscriber,
}

impl CallConsumer {
    /// Create a new call consumer
    pub fn new(client: Client, config: &NatsConfig) -> Self {
        Self {
            client,
            control_subject: config.control_subject.clone(),
            chunk_subject: config.chunk_subject.clone(),
            analyze_subject: config.analyze_subject.clone(),
        }
    }

    /// Subscribe to every inbound subject
    pub async fn subscribe(&self) -> Result<CallSubscriptions> {
        Ok(CallSubscriptions {
            control: self.subscribe_to(&self.control_subject).await?,
            chunks: self.subscribe_to(&self.chunk_subject).await?,
            analyze: self.subscribe_to(&self.analyze_subject).await?,
        })
    }

    async fn subscribe_to(&self, subject: &str) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(subject.to_string()).await?;
        info!(subject = %subject, "Subscribed");
        Ok(subscriber)
    }

    pub fn control_subject(&self) -> &str {
        &self.control_subject
    }

    pub fn chunk_subject(&self) -> &str {
        &self.chunk_subject
    }

    pub fn analyze_subject(&self) -> &str {
        &self.analyze_subject
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
