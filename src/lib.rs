//! Core library for the vastbook notebook launcher.
//!
//! The crate rents the cheapest Vast.ai machine matching a set of search
//! bounds, waits for it to report `running`, starts a Jupyter server on it
//! over SSH, and forwards local ports to the notebook and to the machine's
//! own SSH daemon (search → rent → poll → bootstrap → tunnel).

pub mod backend;
pub mod command;
pub mod config;
pub mod marketplace;
pub mod offer;
pub mod readiness;
pub mod remote;
pub mod test_support;
pub mod workflow;

pub use backend::{
    ConnectionDetails, ControlPlane, InstanceHandle, InstanceStatus, ProvisionRequest,
    ProvisionRequestBuilder, RUNNING_STATUS, RequestError,
};
pub use command::{CommandOutput, CommandRunner, ProcessCommandRunner, SpawnError};
pub use config::{ConfigError, MarketConfig};
pub use marketplace::{
    DEFAULT_VAST_BIN, MarketplaceError, VastCli, VastCliConfig, interpret_create_response,
};
pub use offer::{
    CriteriaError, DEFAULT_MIN_HOURLY_PRICE, NoOfferFound, Offer, SearchCriteria,
    SearchCriteriaBuilder, select_best,
};
pub use readiness::{
    DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY, InstanceLookupError, ReadinessError,
    ReadinessPoller, locate_instance,
};
pub use remote::{
    NOTEBOOK_REMOTE_PORT, RemoteCommand, RemoteConfig, RemoteConfigLoadError, RemoteExecError,
    RemoteShell, SHELL_REMOTE_PORT, TunnelError, TunnelKind, TunnelOutcome, TunnelReport,
    TunnelSpec,
};
pub use workflow::{RentalPlan, WorkflowError, WorkflowOrchestrator, WorkflowOutcome};
