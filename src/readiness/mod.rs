//! Waits for a rented instance to report `running`.
//!
//! The poller re-fetches the full instance list on every iteration, picks the
//! single record for the handle, and sleeps between fetches so the control
//! plane is not hammered. Only `running` ends the loop; every other status,
//! including unknown and error tokens, counts as not ready yet. There is no
//! deadline unless the caller sets one with
//! [`ReadinessPoller::with_wait_timeout`].

use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::backend::{ConnectionDetails, ControlPlane, InstanceHandle, InstanceStatus};

/// Delay between two instance-list fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Delay applied after `running` is first seen, before the SSH gateway is
/// trusted to accept connections.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(15);

/// Raised when the instance list does not contain exactly one record for the
/// instance being polled.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("expected exactly one instance with id {instance_id}, found {matches}")]
pub struct InstanceLookupError {
    /// Identifier that was looked up.
    pub instance_id: u64,
    /// Number of records carrying that identifier.
    pub matches: usize,
}

/// Errors surfaced while waiting for an instance to become ready.
#[derive(Debug, Error)]
pub enum ReadinessError<FetchError>
where
    FetchError: std::error::Error + 'static,
{
    /// Raised when the instance list cannot be fetched.
    #[error("failed to list instances: {0}")]
    Fetch(#[source] FetchError),
    /// Raised when the instance set is inconsistent with the handle.
    #[error(transparent)]
    Lookup(#[from] InstanceLookupError),
    /// Raised when an optional deadline elapses before `running` is seen.
    #[error("instance {instance_id} not running after {waited:?} (last status: {last_status})")]
    Timeout {
        /// Instance being waited on.
        instance_id: u64,
        /// Time spent polling.
        waited: Duration,
        /// Last status token observed.
        last_status: String,
    },
}

/// Finds the one record matching `instance_id`.
///
/// # Errors
///
/// Returns [`InstanceLookupError`] when zero or several records match.
pub fn locate_instance(
    instances: &[InstanceStatus],
    instance_id: u64,
) -> Result<&InstanceStatus, InstanceLookupError> {
    let mut matching = instances
        .iter()
        .filter(|instance| instance.instance_id == instance_id);
    match (matching.next(), matching.next()) {
        (Some(found), None) => Ok(found),
        (first, second) => Err(InstanceLookupError {
            instance_id,
            matches: usize::from(first.is_some())
                + usize::from(second.is_some())
                + matching.count(),
        }),
    }
}

fn describe_status(status: Option<&str>) -> &str {
    status.unwrap_or("unknown")
}

/// Polls the control plane until an instance is running.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadinessPoller {
    poll_interval: Duration,
    settle_delay: Duration,
    wait_timeout: Option<Duration>,
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY)
    }
}

impl ReadinessPoller {
    /// Creates a poller that waits forever.
    #[must_use]
    pub const fn new(poll_interval: Duration, settle_delay: Duration) -> Self {
        Self {
            poll_interval,
            settle_delay,
            wait_timeout: None,
        }
    }

    /// Bounds the wait; `None` restores the unbounded default.
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Returns the delay between fetches.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the delay applied after `running` is observed.
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Blocks until `handle` reports `running`, then applies the settle delay
    /// and returns the SSH endpoint captured from that snapshot.
    ///
    /// A `running` record without an SSH endpoint is treated as not ready.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessError::Fetch`] when listing fails,
    /// [`ReadinessError::Lookup`] when the handle does not match exactly one
    /// record, and [`ReadinessError::Timeout`] when a configured deadline
    /// passes.
    pub async fn await_running<C: ControlPlane>(
        &self,
        control_plane: &C,
        handle: &InstanceHandle,
    ) -> Result<ConnectionDetails, ReadinessError<C::Error>> {
        let started = Instant::now();
        let mut previous_status: Option<Option<String>> = None;

        loop {
            let instances = control_plane
                .list_instances()
                .map_err(ReadinessError::Fetch)?;
            let instance = locate_instance(&instances, handle.instance_id)?;

            if previous_status.as_ref() != Some(&instance.actual_status) {
                tracing::info!(
                    instance_id = handle.instance_id,
                    status = describe_status(instance.actual_status.as_deref()),
                    "instance status changed"
                );
                previous_status = Some(instance.actual_status.clone());
            }

            if instance.is_running() {
                if let Some(details) = instance.connection_details() {
                    tracing::info!(
                        instance_id = handle.instance_id,
                        ssh_host = %details.ssh_host,
                        ssh_port = details.ssh_port,
                        settle_delay = ?self.settle_delay,
                        "instance running; waiting for services to settle"
                    );
                    sleep(self.settle_delay).await;
                    return Ok(details);
                }
                tracing::debug!(
                    instance_id = handle.instance_id,
                    "instance running without an SSH endpoint yet"
                );
            }

            let waited = started.elapsed();
            if let Some(limit) = self.wait_timeout
                && waited >= limit
            {
                return Err(ReadinessError::Timeout {
                    instance_id: handle.instance_id,
                    waited,
                    last_status: describe_status(instance.actual_status.as_deref()).to_owned(),
                });
            }

            sleep(self.poll_interval).await;
        }
    }
}
