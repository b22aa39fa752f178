//! Sequences offer selection, rental, readiness, bootstrap, and tunnels.
//!
//! Each stage runs to completion before the next starts and any stage error
//! aborts the rest. Nothing is rolled back: an instance created before a
//! later failure stays rented, and the operator is expected to clean it up.
//! Tunnel failures are not stage errors; both tunnels are always attempted
//! and their outcomes are returned in [`WorkflowOutcome::tunnels`].

use thiserror::Error;

use crate::backend::{
    ConnectionDetails, ControlPlane, InstanceHandle, ProvisionRequest, RequestError,
};
use crate::command::CommandRunner;
use crate::offer::{NoOfferFound, Offer, SearchCriteria, select_best};
use crate::readiness::{ReadinessError, ReadinessPoller};
use crate::remote::{RemoteExecError, RemoteShell, TunnelReport};

/// Errors that abort the workflow.
#[derive(Debug, Error)]
pub enum WorkflowError<ControlPlaneError>
where
    ControlPlaneError: std::error::Error + 'static,
{
    /// Raised when the offer search cannot be executed or parsed.
    #[error("failed to search offers: {0}")]
    Inventory(#[source] ControlPlaneError),
    /// Raised when the search returned no offers.
    #[error(transparent)]
    NoOffer(#[from] NoOfferFound),
    /// Raised when the rental request cannot be built from configuration.
    #[error("invalid rental request: {0}")]
    Request(#[from] RequestError),
    /// Raised when the control plane rejects or fails the rental.
    #[error("failed to rent offer {offer_id}: {source}")]
    Provision {
        /// Offer that was being rented.
        offer_id: u64,
        /// Control plane failure, carrying the raw response where available.
        #[source]
        source: ControlPlaneError,
    },
    /// Raised when the rented instance cannot be confirmed as running.
    #[error("instance {instance_id} did not become ready: {source}")]
    Readiness {
        /// Instance that was being polled.
        instance_id: u64,
        /// Polling failure.
        #[source]
        source: ReadinessError<ControlPlaneError>,
    },
    /// Raised when the notebook package cannot be installed.
    #[error("failed to install the notebook server on instance {instance_id}: {source}")]
    Install {
        /// Instance left running after the failure.
        instance_id: u64,
        /// Remote command failure.
        #[source]
        source: RemoteExecError,
    },
    /// Raised when the notebook server launch cannot be dispatched.
    #[error("failed to start the notebook server on instance {instance_id}: {source}")]
    Launch {
        /// Instance left running after the failure.
        instance_id: u64,
        /// Remote command failure.
        #[source]
        source: RemoteExecError,
    },
}

/// Everything the workflow produced, handed back to the caller for
/// reporting.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowOutcome {
    /// Offer that was rented.
    pub offer: Offer,
    /// Rented instance.
    pub instance: InstanceHandle,
    /// SSH endpoint observed when the instance reached `running`.
    pub connection: ConnectionDetails,
    /// Result of each tunnel attempt.
    pub tunnels: TunnelReport,
}

/// What to rent: the search bounds plus the container settings applied to
/// the chosen offer.
#[derive(Clone, Debug, PartialEq)]
pub struct RentalPlan {
    /// Bounds for the offer search.
    pub criteria: SearchCriteria,
    /// Docker image to deploy.
    pub docker_image: String,
    /// Disk to allocate, in gigabytes.
    pub disk_space_gb: u32,
}

/// Runs the rental workflow against a control plane and a remote shell.
#[derive(Debug)]
pub struct WorkflowOrchestrator<C, R: CommandRunner> {
    control_plane: C,
    shell: RemoteShell<R>,
    poller: ReadinessPoller,
    plan: RentalPlan,
}

impl<C, R> WorkflowOrchestrator<C, R>
where
    C: ControlPlane,
    R: CommandRunner,
{
    /// Creates an orchestrator using the default poll interval and settle
    /// delay.
    #[must_use]
    pub fn new(control_plane: C, shell: RemoteShell<R>, plan: RentalPlan) -> Self {
        Self {
            control_plane,
            shell,
            poller: ReadinessPoller::default(),
            plan,
        }
    }

    /// Overrides the readiness poller.
    #[must_use]
    pub const fn with_poller(mut self, poller: ReadinessPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Searches the marketplace and returns the cheapest matching offer
    /// without renting it.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Inventory`] when the search fails and
    /// [`WorkflowError::NoOffer`] when nothing matched.
    pub fn select_offer(&self) -> Result<Offer, WorkflowError<C::Error>> {
        let offers = self
            .control_plane
            .search_offers(&self.plan.criteria)
            .map_err(WorkflowError::Inventory)?;
        tracing::info!(count = offers.len(), "offers found");

        let offer = select_best(&offers)?.clone();
        tracing::info!(
            offer_id = offer.id,
            cpu = %offer.cpu_name,
            cpu_cores_effective = offer.cpu_cores_effective,
            cpu_cores_total = offer.cpu_cores_total,
            ram_mb = offer.ram_mb,
            hourly_price_base = offer.hourly_price_base,
            hourly_price_total = offer.hourly_price_total,
            download_mbps = offer.download_mbps,
            max_cuda_version = offer.max_cuda_version,
            "selected offer"
        );
        Ok(offer)
    }

    /// Rents the cheapest matching offer, waits for it to run, starts the
    /// notebook server, and opens both tunnels.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] for the first stage that fails. Tunnel
    /// failures are reported through [`WorkflowOutcome::tunnels`] instead.
    pub async fn execute(&self) -> Result<WorkflowOutcome, WorkflowError<C::Error>> {
        let offer = self.select_offer()?;

        let request = ProvisionRequest::for_offer(
            &offer,
            self.plan.docker_image.as_str(),
            self.plan.disk_space_gb,
        )?;
        let instance = self
            .control_plane
            .create_instance(&request)
            .map_err(|source| WorkflowError::Provision {
                offer_id: offer.id,
                source,
            })?;
        tracing::info!(
            instance_id = instance.instance_id,
            offer_id = offer.id,
            "instance created"
        );

        let connection = self
            .poller
            .await_running(&self.control_plane, &instance)
            .await
            .map_err(|source| WorkflowError::Readiness {
                instance_id: instance.instance_id,
                source,
            })?;

        let instance_id = instance.instance_id;
        self.shell
            .install_notebook_service(&connection)
            .map_err(|source| WorkflowError::Install {
                instance_id,
                source,
            })?;
        self.shell
            .start_notebook_service(&connection)
            .map_err(|source| WorkflowError::Launch {
                instance_id,
                source,
            })?;

        let tunnels = self.shell.open_tunnels(&connection);

        Ok(WorkflowOutcome {
            offer,
            instance,
            connection,
            tunnels,
        })
    }
}
