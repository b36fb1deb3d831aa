//! Lease-protected mutation and primary-broker election.

use crate::error::{Error, Result};
use crate::model::{ComponentType, Member, MemberStatus, MemberUpdate};
use crate::store::MembershipStore;
use crate::view::{DeploymentView, DualPrimaryError};

use farm_conch::{Conch, ConchOptions};
use farm_parameters::ParameterStore;
use tracing::{debug, info, instrument, warn};

/// Record name of the membership collection within a deployment scope.
pub const MEMBERS_RECORD: &str = "members";

/// Record name of the lease within a deployment scope.
pub const CONCH_RECORD: &str = "conch";

/// Result of a primary-broker election attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ElectionOutcome {
    /// The candidate is the uncontested primary.
    Won,

    /// The candidate backed off and is recorded as a non-primary broker.
    Lost {
        /// The primary observed after backing off, if any.
        winner: Option<String>,
    },
}

/// Membership of one deployment: the single path through which it is mutated.
#[derive(Clone, Debug)]
pub struct Membership<P>
where
    P: ParameterStore,
{
    conch: Conch<P>,
    store: MembershipStore<P>,
}

impl<P> Membership<P>
where
    P: ParameterStore,
{
    /// Creates the membership over a store already scoped to one deployment.
    pub fn new(store: P, conch_options: ConchOptions) -> Self {
        Self {
            conch: Conch::new(store.clone(), CONCH_RECORD, conch_options),
            store: MembershipStore::new(store, MEMBERS_RECORD),
        }
    }

    /// The lease guarding this membership.
    pub const fn conch(&self) -> &Conch<P> {
        &self.conch
    }

    /// Best-effort snapshot of every member, removed ones included.
    ///
    /// # Errors
    ///
    /// Store or decoding failures.
    pub async fn members(&self) -> Result<Vec<Member>> {
        self.store.read_all().await
    }

    /// Best-effort snapshot of the active deployment.
    ///
    /// # Errors
    ///
    /// [`Error::DualPrimary`] if two primaries are recorded, or store failures.
    pub async fn view(&self) -> Result<DeploymentView> {
        let members = self.store.read_all().await?;
        Ok(DeploymentView::build(&members)?)
    }

    /// Merges `update` into the stored membership under the lease.
    ///
    /// Returns the member as written.
    ///
    /// # Errors
    ///
    /// [`Error::PrimaryConflict`] if the update claims primacy while another
    /// broker holds it (nothing is written), validation errors from the merge,
    /// and lease or store failures.
    #[instrument(skip(self), fields(instance_id = %update.instance_id))]
    pub async fn set_member(&self, update: MemberUpdate) -> Result<Member> {
        let token = self.conch.acquire().await?;

        let committed = self.commit(&update).await;

        if let Err(e) = self.conch.release(&token).await {
            warn!(error = %e, "failed to release lease, leaving it to expire");
        }

        let member = committed?;
        debug!(?member, "member committed");

        Ok(member)
    }

    /// Tries to make `instance_id` the primary broker.
    ///
    /// The candidate claims primacy optimistically, then re-reads the view. A
    /// rejected claim or a second primary in the view means the race was lost:
    /// the candidate records itself as a plain broker and backs off.
    ///
    /// # Errors
    ///
    /// Lease or store failures.
    #[instrument(skip(self))]
    pub async fn elect_primary(&self, instance_id: &str) -> Result<ElectionOutcome> {
        let claim = MemberUpdate::new(instance_id)
            .component_type(ComponentType::Broker)
            .status(MemberStatus::New)
            .primary(true);

        match self.set_member(claim).await {
            Ok(_) => match self.view().await {
                Ok(view) if view.is_primary(instance_id) => {
                    info!("elected primary broker");
                    return Ok(ElectionOutcome::Won);
                }
                Ok(view) => {
                    warn!(primary = ?view.primary_broker.map(|m| m.instance_id), "claim did not stick");
                }
                Err(Error::DualPrimary(DualPrimaryError { first, second })) => {
                    info!(%first, %second, "race for primary detected, backing off");
                }
                Err(e) => return Err(e),
            },
            Err(Error::PrimaryConflict { existing, .. }) => {
                info!(%existing, "another broker is already primary, backing off");
            }
            Err(e) => return Err(e),
        }

        let demote = MemberUpdate::new(instance_id)
            .component_type(ComponentType::Broker)
            .status(MemberStatus::New)
            .primary(false);
        self.set_member(demote).await?;

        let winner = match self.view().await {
            Ok(view) => view.primary_broker.map(|m| m.instance_id),
            Err(Error::DualPrimary(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(ElectionOutcome::Lost { winner })
    }

    async fn commit(&self, update: &MemberUpdate) -> Result<Member> {
        let mut members = self.store.read_all().await?;

        if update.claims_primary() {
            let existing = match DeploymentView::build(&members) {
                Ok(view) => view.primary_broker.map(|m| m.instance_id),
                Err(DualPrimaryError { first, .. }) => Some(first),
            };

            if let Some(existing) = existing.filter(|id| *id != update.instance_id) {
                return Err(Error::PrimaryConflict {
                    existing,
                    candidate: update.instance_id.clone(),
                });
            }
        }

        // Removed records are only needed until the next write.
        members.retain(|m| {
            m.status != MemberStatus::Removed || m.instance_id == update.instance_id
        });

        let member = match members
            .iter_mut()
            .find(|m| m.instance_id == update.instance_id)
        {
            Some(existing) => {
                existing.apply(update)?;
                existing.clone()
            }
            None => {
                let member = Member::from_update(update)?;
                members.push(member.clone());
                member
            }
        };

        if update.claims_primary() {
            DeploymentView::build(&members)?;
        }

        self.store.write_all(&members).await?;

        Ok(member)
    }
}
