//! Draining the paginated results behind one notification

use crate::client::GatewayClient;
use crate::notification::{ApiNotification, MerchantOrderResult};
use crate::token::TokenProvider;
use crate::transport::Transport;
use crate::{OmniKassaError, Result};
use tracing::{debug, warn};

/// Where the poller is in draining a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// More results may be available
    Draining,
    /// The gateway reported no more results
    Done,
}

/// Everything collected while draining, including a failure that ended it early
#[derive(Debug)]
pub struct DrainOutcome {
    /// Results of every page received, in order
    pub results: Vec<MerchantOrderResult>,
    /// Pages received successfully
    pub pages: usize,
    /// Failure that aborted the drain, if any
    pub error: Option<OmniKassaError>,
}

impl DrainOutcome {
    /// True when every page was received
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Results if the drain finished, otherwise the error.
    ///
    /// Partial results are dropped here; read `results` directly to keep them.
    pub fn into_result(self) -> Result<Vec<MerchantOrderResult>> {
        match self.error {
            None => Ok(self.results),
            Some(e) => Err(e),
        }
    }
}

/// Polls the events endpoint for one notification until it is exhausted.
///
/// The notification's signature must already have been verified.
pub struct NotificationPoller<'a, T: Transport, P: TokenProvider> {
    client: &'a GatewayClient<T, P>,
}

impl<'a, T: Transport, P: TokenProvider> NotificationPoller<'a, T, P> {
    /// Poller issuing its calls through `client`
    pub fn new(client: &'a GatewayClient<T, P>) -> Self {
        Self { client }
    }

    /// Fetch pages until the gateway reports no more results or a call fails
    pub async fn drain(&self, notification: &ApiNotification) -> DrainOutcome {
        let mut outcome = DrainOutcome {
            results: Vec::new(),
            pages: 0,
            error: None,
        };
        let mut state = PollState::Draining;

        while state == PollState::Draining {
            match self.client.get_order_status_data(notification).await {
                Ok(page) => {
                    outcome.pages += 1;
                    debug!(
                        page = outcome.pages,
                        results = page.order_results.len(),
                        more = page.more_order_results_available,
                        "received order status page"
                    );
                    outcome.results.extend(page.order_results);
                    if !page.more_order_results_available {
                        state = PollState::Done;
                    }
                }
                Err(e) => {
                    warn!(
                        pages = outcome.pages,
                        results = outcome.results.len(),
                        error = %e,
                        "draining notification aborted"
                    );
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        outcome
    }
}
