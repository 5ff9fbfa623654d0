// Account-level endpoints: subscriptions and the event log

use tracing::debug;

use super::ApiClient;
use crate::error::Error;
use crate::models::{EventsResponse, HistoryEvent, Subscription, SubscriptionsResponse};

impl ApiClient {
    /// List the account's active subscriptions (one per location).
    ///
    /// `GET users/{user_id}/subscriptions?activeOnly=true`
    pub async fn get_subscriptions(&self, user_id: u64) -> Result<Vec<Subscription>, Error> {
        let path = format!("users/{user_id}/subscriptions");
        debug!(user_id, "fetching subscriptions");
        let resp: SubscriptionsResponse = self
            .get(&path, &[("activeOnly", "true".to_owned())])
            .await?;
        Ok(resp.subscriptions)
    }

    /// Fetch event-log entries for a system, in server order.
    ///
    /// `GET subscriptions/{sid}/events?fromTimestamp=..&numEvents=..`
    ///
    /// Both parameters are optional; omitted ones are left to the server.
    pub async fn get_events(
        &self,
        system_id: u64,
        from_timestamp: Option<i64>,
        num_events: Option<u32>,
    ) -> Result<Vec<HistoryEvent>, Error> {
        let path = format!("subscriptions/{system_id}/events");
        let mut query = Vec::with_capacity(2);
        if let Some(ts) = from_timestamp {
            query.push(("fromTimestamp", ts.to_string()));
        }
        if let Some(n) = num_events {
            query.push(("numEvents", n.to_string()));
        }
        debug!(system_id, ?from_timestamp, ?num_events, "fetching events");
        let resp: EventsResponse = self.get(&path, &query).await?;
        Ok(resp.events)
    }
}
