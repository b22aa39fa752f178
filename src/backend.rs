//! Control-plane abstraction for renting marketplace instances.
//!
//! The workflow only ever talks to the marketplace through [`ControlPlane`],
//! which keeps offer ranking and readiness polling independent of how the
//! records are fetched.

use thiserror::Error;

use crate::offer::{Offer, SearchCriteria};

/// Parameters required to rent an instance from a chosen offer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionRequest {
    /// Marketplace identifier of the offer being rented.
    pub offer_id: u64,
    /// Docker image to deploy on the rented machine.
    pub docker_image: String,
    /// Disk space to allocate, in gigabytes.
    pub disk_space_gb: u32,
}

impl ProvisionRequest {
    /// Starts a builder for a [`ProvisionRequest`].
    #[must_use]
    pub fn builder() -> ProvisionRequestBuilder {
        ProvisionRequestBuilder::new()
    }

    /// Builds a request for `offer` using the caller's image and disk size.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when the image is blank or the disk size is
    /// zero.
    pub fn for_offer(
        offer: &Offer,
        docker_image: impl Into<String>,
        disk_space_gb: u32,
    ) -> Result<Self, RequestError> {
        Self::builder()
            .offer_id(offer.id)
            .docker_image(docker_image)
            .disk_space_gb(disk_space_gb)
            .build()
    }

    /// Validates the request, returning a descriptive error when a required
    /// field is missing.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when the image is empty or the
    /// disk size is zero.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.docker_image.is_empty() {
            return Err(RequestError::Validation("docker_image".to_owned()));
        }
        if self.disk_space_gb == 0 {
            return Err(RequestError::Validation("disk_space_gb".to_owned()));
        }
        Ok(())
    }
}

/// Builder for [`ProvisionRequest`] that trims and validates on build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProvisionRequestBuilder {
    offer_id: u64,
    docker_image: String,
    disk_space_gb: u32,
}

impl ProvisionRequestBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the offer identifier.
    #[must_use]
    pub const fn offer_id(mut self, value: u64) -> Self {
        self.offer_id = value;
        self
    }

    /// Sets the docker image.
    #[must_use]
    pub fn docker_image(mut self, value: impl Into<String>) -> Self {
        self.docker_image = value.into();
        self
    }

    /// Sets the disk size in gigabytes.
    #[must_use]
    pub const fn disk_space_gb(mut self, value: u32) -> Self {
        self.disk_space_gb = value;
        self
    }

    /// Builds and validates the [`ProvisionRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when a required field is empty.
    pub fn build(self) -> Result<ProvisionRequest, RequestError> {
        let request = ProvisionRequest {
            offer_id: self.offer_id,
            docker_image: self.docker_image.trim().to_owned(),
            disk_space_gb: self.disk_space_gb,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Handle returned once the marketplace has accepted a rental.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct InstanceHandle {
    /// Contract identifier assigned by the marketplace.
    pub instance_id: u64,
}

/// Snapshot of one instance as reported by the control plane.
///
/// Every poll re-fetches the whole record; nothing here is cached between
/// polls.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceStatus {
    /// Contract identifier.
    pub instance_id: u64,
    /// Status token such as `loading` or `running`. `None` while the
    /// marketplace is still scheduling the rental.
    pub actual_status: Option<String>,
    /// SSH gateway host, once assigned.
    pub ssh_host: Option<String>,
    /// SSH gateway port, once assigned.
    pub ssh_port: Option<u16>,
}

/// Status token that marks an instance as ready.
pub const RUNNING_STATUS: &str = "running";

impl InstanceStatus {
    /// Returns `true` when the control plane reports the instance running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.actual_status.as_deref() == Some(RUNNING_STATUS)
    }

    /// Extracts the SSH endpoint when both host and port are known.
    #[must_use]
    pub fn connection_details(&self) -> Option<ConnectionDetails> {
        let host = self.ssh_host.as_deref().map(str::trim)?;
        if host.is_empty() {
            return None;
        }
        Some(ConnectionDetails {
            ssh_host: host.to_owned(),
            ssh_port: self.ssh_port?,
        })
    }
}

/// SSH endpoint for an instance confirmed to be running.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ConnectionDetails {
    /// Host name or address of the SSH gateway.
    pub ssh_host: String,
    /// TCP port of the SSH gateway.
    pub ssh_port: u16,
}

/// Errors raised while building requests.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Minimal interface implemented by marketplace clients.
pub trait ControlPlane {
    /// Transport specific error type returned by the client.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Searches the marketplace for offers satisfying `criteria`. The order of
    /// the returned offers carries no meaning.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] when the query cannot be executed or its output
    /// cannot be parsed.
    fn search_offers(&self, criteria: &SearchCriteria) -> Result<Vec<Offer>, Self::Error>;

    /// Rents the offer named in `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] when the call fails or the marketplace rejects
    /// the rental.
    fn create_instance(&self, request: &ProvisionRequest) -> Result<InstanceHandle, Self::Error>;

    /// Lists every instance owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] when the call fails or its output cannot be
    /// parsed.
    fn list_instances(&self) -> Result<Vec<InstanceStatus>, Self::Error>;
}
