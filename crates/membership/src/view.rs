//! Read-only projection of the active members.

use crate::model::{ComponentType, Member};

use thiserror::Error;

/// Two active brokers both carry the primary flag.
///
/// Callers treat this as a lost election, never as a benign state.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("two connection brokers are both marked primary: {first} and {second}")]
pub struct DualPrimaryError {
    /// The primary encountered first.
    pub first: String,
    /// The conflicting second primary.
    pub second: String,
}

/// Active members partitioned by role, with the primary broker singled out.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeploymentView {
    /// The primary broker, if one is recorded.
    pub primary_broker: Option<Member>,
    /// All active brokers, primary included.
    pub brokers: Vec<Member>,
    /// All active gateways.
    pub gateways: Vec<Member>,
    /// All active web access nodes.
    pub web_access: Vec<Member>,
    /// Every active member.
    pub all_members: Vec<Member>,
}

impl DeploymentView {
    /// Folds the raw collection into a view, skipping members on their way out.
    ///
    /// # Errors
    ///
    /// Returns [`DualPrimaryError`] if a second primary broker is found.
    pub fn build(members: &[Member]) -> Result<Self, DualPrimaryError> {
        let mut view = Self::default();

        for member in members.iter().filter(|m| m.status.is_active()) {
            match member.component_type {
                ComponentType::Broker => {
                    if member.is_primary {
                        if let Some(primary) = &view.primary_broker {
                            return Err(DualPrimaryError {
                                first: primary.instance_id.clone(),
                                second: member.instance_id.clone(),
                            });
                        }
                        view.primary_broker = Some(member.clone());
                    }
                    view.brokers.push(member.clone());
                }
                ComponentType::Gateway => view.gateways.push(member.clone()),
                ComponentType::WebAccess => view.web_access.push(member.clone()),
            }
            view.all_members.push(member.clone());
        }

        Ok(view)
    }

    /// Looks up an active member.
    #[must_use]
    pub fn member(&self, instance_id: &str) -> Option<&Member> {
        self.all_members
            .iter()
            .find(|m| m.instance_id == instance_id)
    }

    /// Whether `instance_id` is the primary broker.
    #[must_use]
    pub fn is_primary(&self, instance_id: &str) -> bool {
        self.primary_broker
            .as_ref()
            .is_some_and(|p| p.instance_id == instance_id)
    }
}

/// Shorthand for [`DeploymentView::build`].
///
/// # Errors
///
/// Returns [`DualPrimaryError`] if a second primary broker is found.
pub fn build_view(members: &[Member]) -> Result<DeploymentView, DualPrimaryError> {
    DeploymentView::build(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MemberStatus;

    fn member(id: &str, component_type: ComponentType, status: MemberStatus, primary: bool) -> Member {
        Member {
            instance_id: id.to_string(),
            component_type,
            status,
            is_primary: primary,
        }
    }

    #[test]
    fn test_partitions_by_role() {
        let members = vec![
            member("b1", ComponentType::Broker, MemberStatus::Configured, true),
            member("b2", ComponentType::Broker, MemberStatus::New, false),
            member("g1", ComponentType::Gateway, MemberStatus::Configuring, false),
            member("w1", ComponentType::WebAccess, MemberStatus::Configured, false),
        ];

        let view = build_view(&members).unwrap();

        assert_eq!(view.primary_broker.as_ref().unwrap().instance_id, "b1");
        assert_eq!(view.brokers.len(), 2);
        assert_eq!(view.gateways.len(), 1);
        assert_eq!(view.web_access.len(), 1);
        assert_eq!(view.all_members.len(), 4);
        assert!(view.is_primary("b1"));
        assert!(!view.is_primary("b2"));
    }

    #[test]
    fn test_departing_members_are_excluded() {
        let members = vec![
            member("b1", ComponentType::Broker, MemberStatus::Removing, true),
            member("b2", ComponentType::Broker, MemberStatus::Removed, true),
            member("g1", ComponentType::Gateway, MemberStatus::Removed, false),
        ];

        let view = build_view(&members).unwrap();

        assert_eq!(view, DeploymentView::default());
        assert!(view.member("g1").is_none());
    }

    #[test]
    fn test_dual_primary_is_an_error() {
        let members = vec![
            member("b1", ComponentType::Broker, MemberStatus::New, true),
            member("g1", ComponentType::Gateway, MemberStatus::New, false),
            member("b2", ComponentType::Broker, MemberStatus::New, true),
        ];

        assert_eq!(
            build_view(&members),
            Err(DualPrimaryError {
                first: "b1".to_string(),
                second: "b2".to_string(),
            })
        );
    }
}
