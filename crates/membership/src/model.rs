//! Members of the farm and partial updates to them.

use crate::error::{Error, Result};

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role an instance plays in the farm.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ComponentType {
    /// Connection broker. Exactly one active broker is primary.
    #[serde(rename = "RDS-Connection-Broker")]
    Broker,

    /// Gateway.
    #[serde(rename = "RDS-Gateway")]
    Gateway,

    /// Web access node.
    #[serde(rename = "RDS-Web-Access")]
    WebAccess,
}

impl ComponentType {
    /// The wire name used in hook names and the membership record.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Broker => "RDS-Connection-Broker",
            Self::Gateway => "RDS-Gateway",
            Self::WebAccess => "RDS-Web-Access",
        }
    }
}

impl Display for ComponentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A component type name that is not one of the known roles.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown component type: {0}")]
pub struct UnknownComponentType(pub String);

impl FromStr for ComponentType {
    type Err = UnknownComponentType;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "RDS-Connection-Broker" => Ok(Self::Broker),
            "RDS-Gateway" => Ok(Self::Gateway),
            "RDS-Web-Access" => Ok(Self::WebAccess),
            other => Err(UnknownComponentType(other.to_string())),
        }
    }
}

/// Lifecycle state of a member.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum MemberStatus {
    /// Recorded, configuration not yet started.
    New,

    /// External configuration accepted and running.
    Configuring,

    /// Fully part of the farm.
    Configured,

    /// Being torn down.
    Removing,

    /// Gone. Kept only until the next compaction.
    Removed,
}

impl MemberStatus {
    /// Whether the member counts towards the deployment view.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Removing | Self::Removed)
    }
}

/// One tracked compute instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Member {
    /// Instance identifier, unique within the store.
    pub instance_id: String,

    /// Role of the instance. Never changes once recorded.
    #[serde(rename = "Type")]
    pub component_type: ComponentType,

    /// Lifecycle state.
    pub status: MemberStatus,

    /// Whether this broker is the primary.
    #[serde(rename = "PrimaryBroker", default)]
    pub is_primary: bool,
}

impl Member {
    /// Builds a fresh member from an update, defaulting to `New` and non-primary.
    ///
    /// # Errors
    ///
    /// Fails if the update carries no component type, or marks a non-broker primary.
    pub fn from_update(update: &MemberUpdate) -> Result<Self> {
        let component_type = update
            .component_type
            .ok_or_else(|| Error::MissingComponentType(update.instance_id.clone()))?;

        let member = Self {
            instance_id: update.instance_id.clone(),
            component_type,
            status: update.status.unwrap_or(MemberStatus::New),
            is_primary: update.is_primary.unwrap_or(false),
        };
        member.validate()?;

        Ok(member)
    }

    /// Overwrites only the fields present in `update`.
    ///
    /// # Errors
    ///
    /// Fails if the update changes the component type or marks a non-broker primary.
    pub fn apply(&mut self, update: &MemberUpdate) -> Result<()> {
        if let Some(requested) = update.component_type {
            if requested != self.component_type {
                return Err(Error::ComponentTypeMismatch {
                    instance_id: self.instance_id.clone(),
                    stored: self.component_type,
                    requested,
                });
            }
        }

        let mut merged = self.clone();
        if let Some(status) = update.status {
            merged.status = status;
        }
        if let Some(is_primary) = update.is_primary {
            merged.is_primary = is_primary;
        }
        merged.validate()?;

        *self = merged;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.is_primary && self.component_type != ComponentType::Broker {
            return Err(Error::PrimaryNotBroker {
                instance_id: self.instance_id.clone(),
                component_type: self.component_type,
            });
        }

        Ok(())
    }
}

/// A partial member: only the `Some` fields are written.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MemberUpdate {
    /// Member to create or update.
    pub instance_id: String,

    /// Component type; required when the member is new.
    pub component_type: Option<ComponentType>,

    /// New status.
    pub status: Option<MemberStatus>,

    /// New primary flag.
    pub is_primary: Option<bool>,
}

impl MemberUpdate {
    /// Starts an update for `instance_id` that changes nothing.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }

    /// Sets the component type.
    #[must_use]
    pub const fn component_type(mut self, component_type: ComponentType) -> Self {
        self.component_type = Some(component_type);
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn status(mut self, status: MemberStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the primary flag.
    #[must_use]
    pub const fn primary(mut self, is_primary: bool) -> Self {
        self.is_primary = Some(is_primary);
        self
    }

    /// Whether this update asks for primary-broker status.
    #[must_use]
    pub const fn claims_primary(&self) -> bool {
        matches!(self.is_primary, Some(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn test_wire_format() {
        let member = Member {
            instance_id: "i-1".to_string(),
            component_type: ComponentType::Broker,
            status: MemberStatus::Configured,
            is_primary: true,
        };

        assert_eq!(
            serde_json::to_string(&member).unwrap(),
            r#"{"InstanceId":"i-1","Type":"RDS-Connection-Broker","Status":"Configured","PrimaryBroker":true}"#
        );

        let gateway: Member =
            serde_json::from_str(r#"{"InstanceId":"i-2","Type":"RDS-Gateway","Status":"New"}"#)
                .unwrap();
        assert!(!gateway.is_primary);
    }

    #[test]
    fn test_unknown_component_type_is_rejected() {
        assert!(
            serde_json::from_str::<Member>(r#"{"InstanceId":"i-1","Type":"RDS-Licensing","Status":"New"}"#)
                .is_err()
        );
        assert_eq!(
            "RDS-Licensing".parse::<ComponentType>(),
            Err(UnknownComponentType("RDS-Licensing".to_string()))
        );
        assert_eq!("RDS-Web-Access".parse(), Ok(ComponentType::WebAccess));
    }

    #[test]
    fn test_apply_is_partial() {
        let mut member = Member::from_update(
            &MemberUpdate::new("i-1")
                .component_type(ComponentType::Broker)
                .primary(true),
        )
        .unwrap();
        assert_eq!(member.status, MemberStatus::New);

        member
            .apply(&MemberUpdate::new("i-1").status(MemberStatus::Configured))
            .unwrap();

        assert_eq!(member.status, MemberStatus::Configured);
        assert!(member.is_primary);
    }

    #[test]
    fn test_component_type_is_immutable() {
        let mut member = Member::from_update(
            &MemberUpdate::new("i-1").component_type(ComponentType::Gateway),
        )
        .unwrap();

        assert_matches!(
            member.apply(&MemberUpdate::new("i-1").component_type(ComponentType::Broker)),
            Err(Error::ComponentTypeMismatch { .. })
        );
        assert_eq!(member.component_type, ComponentType::Gateway);
    }

    #[test]
    fn test_only_brokers_are_primary() {
        assert_matches!(
            Member::from_update(
                &MemberUpdate::new("i-1")
                    .component_type(ComponentType::WebAccess)
                    .primary(true)
            ),
            Err(Error::PrimaryNotBroker { .. })
        );
        assert_matches!(
            Member::from_update(&MemberUpdate::new("i-1")),
            Err(Error::MissingComponentType(id)) if id == "i-1"
        );
    }
}
