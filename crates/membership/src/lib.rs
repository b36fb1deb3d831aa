//! Membership of a role-typed server farm: the member model, the derived
//! deployment view, and the lease-protected mutation and election protocol.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod model;
mod protocol;
mod store;
mod view;

pub use error::{Error, Result};
pub use model::{ComponentType, Member, MemberStatus, MemberUpdate, UnknownComponentType};
pub use protocol::{CONCH_RECORD, ElectionOutcome, MEMBERS_RECORD, Membership};
pub use store::MembershipStore;
pub use view::{DeploymentView, DualPrimaryError, build_view};
