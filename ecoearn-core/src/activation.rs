//! Bin activation protocol.
//!
//! A bin is either `Inactive` or `Active { occupant }`. Transitions are made
//! with a conditional write against the bin store, so two users scanning the
//! same bin at once cannot both win it.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::model::{Bin, BinId, Occupancy, OccupancyEvent, Transition, UserId};
use crate::ports::{BinStore, OccupancyLog, StoreError};

#[derive(thiserror::Error, Debug)]
/// Reasons an activation or deactivation is refused.
pub enum ActivationError {
    /// No bin with this id exists.
    #[error("Bin not found")]
    BinNotFound,
    /// Another user holds the bin.
    #[error("Bin is in use by another user")]
    BinBusy {
        /// Current holder.
        occupant: UserId,
    },
    /// The bin changed between read and write.
    #[error("Bin just changed state, try again")]
    Conflict,
    /// Caller tried to release a bin held by someone else.
    #[error("Bin is held by another user")]
    NotOccupant {
        /// Current holder.
        occupant: UserId,
    },
    /// Store access failed.
    #[error("Store write failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Successful outcome of [`ActivationProtocol::activate`].
pub enum Activation {
    /// The bin was inactive and is now held by the caller.
    Activated,
    /// The caller already held the bin; nothing changed.
    AlreadyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Successful outcome of a release.
pub enum Deactivation {
    /// The bin was active and is now free.
    Deactivated,
    /// The bin was already free; nothing changed.
    AlreadyInactive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Who may release an active bin through [`ActivationProtocol::deactivate`].
pub enum DeactivationPolicy {
    /// Only the current occupant.
    #[default]
    OccupantOnly,
    /// Any caller, the way the original dashboard behaved.
    AdminOverride,
}

/// Activation state machine bound to a bin store and an audit log.
pub struct ActivationProtocol {
    bins: Arc<dyn BinStore>,
    log: Arc<dyn OccupancyLog>,
    policy: DeactivationPolicy,
}

impl fmt::Debug for ActivationProtocol {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ActivationProtocol")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ActivationProtocol {
    /// Create a protocol over the given ports.
    #[must_use]
    pub fn new(
        bins: Arc<dyn BinStore>,
        log: Arc<dyn OccupancyLog>,
        policy: DeactivationPolicy,
    ) -> Self {
        Self { bins, log, policy }
    }

    /// Configured release policy.
    #[must_use]
    pub fn policy(&self) -> DeactivationPolicy {
        self.policy
    }

    /// Claim `bin_id` for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::BinNotFound`] for unknown bins,
    /// [`ActivationError::BinBusy`] when someone else holds the bin,
    /// [`ActivationError::Conflict`] when the bin changed mid-flight, and
    /// [`ActivationError::Store`] when the store fails.
    pub async fn activate(
        &self,
        bin_id: &BinId,
        user: &UserId,
    ) -> Result<Activation, ActivationError> {
        let bin = self.fetch(bin_id).await?;

        match bin.occupancy {
            Occupancy::Active { occupant } if &occupant == user => {
                debug!(bin = %bin_id, %user, "bin already held by caller");
                Ok(Activation::AlreadyActive)
            }
            Occupancy::Active { occupant } => Err(ActivationError::BinBusy { occupant }),
            Occupancy::Inactive => {
                let next = Occupancy::held_by(user.clone());
                match self
                    .bins
                    .swap_occupancy(bin_id, &Occupancy::Inactive, &next)
                    .await
                {
                    Ok(()) => {
                        info!(bin = %bin_id, %user, "bin activated");
                        self.record(bin_id, user, Transition::Activated).await;
                        Ok(Activation::Activated)
                    }
                    Err(StoreError::Conflict) => {
                        warn!(bin = %bin_id, %user, "activation lost a concurrent write");
                        self.resolve_lost_activation(bin_id, user).await
                    }
                    Err(StoreError::NotFound) => Err(ActivationError::BinNotFound),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    /// Release `bin_id` on behalf of `user`, subject to the configured policy.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::NotOccupant`] when the policy requires the
    /// occupant and `user` is not it, plus the errors of
    /// [`ActivationProtocol::activate`].
    pub async fn deactivate(
        &self,
        bin_id: &BinId,
        user: &UserId,
    ) -> Result<Deactivation, ActivationError> {
        let bin = self.fetch(bin_id).await?;

        let Occupancy::Active { occupant } = &bin.occupancy else {
            return Ok(Deactivation::AlreadyInactive);
        };

        let transition = if occupant == user {
            Transition::Deactivated
        } else {
            match self.policy {
                DeactivationPolicy::OccupantOnly => {
                    return Err(ActivationError::NotOccupant {
                        occupant: occupant.clone(),
                    });
                }
                DeactivationPolicy::AdminOverride => Transition::ForcedRelease,
            }
        };

        self.release(&bin, user, transition).await
    }

    /// Release `bin_id` regardless of who holds it.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::BinNotFound`], [`ActivationError::Conflict`]
    /// or [`ActivationError::Store`].
    pub async fn force_release(
        &self,
        bin_id: &BinId,
        admin: &UserId,
    ) -> Result<Deactivation, ActivationError> {
        let bin = self.fetch(bin_id).await?;
        if !bin.occupancy.is_active() {
            return Ok(Deactivation::AlreadyInactive);
        }
        self.release(&bin, admin, Transition::ForcedRelease).await
    }

    async fn release(
        &self,
        bin: &Bin,
        user: &UserId,
        transition: Transition,
    ) -> Result<Deactivation, ActivationError> {
        match self
            .bins
            .swap_occupancy(&bin.id, &bin.occupancy, &Occupancy::Inactive)
            .await
        {
            Ok(()) => {
                info!(bin = %bin.id, %user, %transition, "bin released");
                self.record(&bin.id, user, transition).await;
                Ok(Deactivation::Deactivated)
            }
            Err(StoreError::Conflict) => {
                warn!(bin = %bin.id, %user, "release lost a concurrent write");
                Err(ActivationError::Conflict)
            }
            Err(StoreError::NotFound) => Err(ActivationError::BinNotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn fetch(&self, bin_id: &BinId) -> Result<Bin, ActivationError> {
        self.bins
            .get(bin_id)
            .await?
            .ok_or(ActivationError::BinNotFound)
    }

    // Someone else's write landed between our read and our swap; report what it was.
    async fn resolve_lost_activation(
        &self,
        bin_id: &BinId,
        user: &UserId,
    ) -> Result<Activation, ActivationError> {
        let bin = self.fetch(bin_id).await?;
        match bin.occupancy {
            Occupancy::Active { occupant } if &occupant == user => Ok(Activation::AlreadyActive),
            Occupancy::Active { occupant } => Err(ActivationError::BinBusy { occupant }),
            Occupancy::Inactive => Err(ActivationError::Conflict),
        }
    }

    async fn record(&self, bin_id: &BinId, user: &UserId, transition: Transition) {
        let event = OccupancyEvent {
            bin_id: bin_id.clone(),
            user_id: user.clone(),
            transition,
            at: Utc::now(),
        };
        if let Err(err) = self.log.append(&event).await {
            warn!(bin = %bin_id, %user, %transition, error = %err, "failed to append occupancy event");
        }
    }
}
