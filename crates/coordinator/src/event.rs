//! Events accepted by the coordinator, decoded once at the boundary.

use std::fmt::{Display, Formatter, Result as FmtResult};

use farm_membership::ComponentType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// An autoscaling lifecycle-hook notification.
///
/// Fields the coordinator does not use are kept so a republished event
/// carries the original payload.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LifecycleHookEvent {
    /// `{component type}-{LAUNCHING|TERMINATING}`.
    #[serde(rename = "LifecycleHookName")]
    pub hook_name: String,

    /// The instance being launched or terminated.
    #[serde(rename = "EC2InstanceId")]
    pub instance_id: String,

    /// The autoscaling group that paused.
    #[serde(rename = "AutoScalingGroupName")]
    pub group_name: String,

    /// Token to complete the lifecycle action with.
    #[serde(rename = "LifecycleActionToken")]
    pub action_token: String,

    /// Everything else in the original notification.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What the lifecycle hook is pausing for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HookAction {
    /// Instance is joining.
    Launching,
    /// Instance is leaving.
    Terminating,
}

/// The role and intent encoded in a hook name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HookTarget {
    /// Role of the instance.
    pub component_type: ComponentType,
    /// Whether it is joining or leaving.
    pub action: HookAction,
}

/// A hook name that does not encode a known role and action.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("hook name {0:?} should be <component type>-LAUNCHING or <component type>-TERMINATING")]
pub struct InvalidHookName(pub String);

impl LifecycleHookEvent {
    /// Decodes the role and action from the hook name.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHookName`] for an unknown role or action suffix.
    pub fn target(&self) -> Result<HookTarget, InvalidHookName> {
        let invalid = || InvalidHookName(self.hook_name.clone());

        let (component, action) = self.hook_name.rsplit_once('-').ok_or_else(invalid)?;
        let action = if action.eq_ignore_ascii_case("LAUNCHING") {
            HookAction::Launching
        } else if action.eq_ignore_ascii_case("TERMINATING") {
            HookAction::Terminating
        } else {
            return Err(invalid());
        };
        let component_type = component.parse().map_err(|_| invalid())?;

        Ok(HookTarget {
            component_type,
            action,
        })
    }
}

/// A rescheduled poll of configuration progress for one hook.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StatusCheckEvent {
    /// The hook being waited on.
    #[serde(flatten)]
    pub hook: LifecycleHookEvent,

    #[serde(rename = "StatusCheck")]
    marker: bool,

    /// Number of checks already made for this hook.
    #[serde(rename = "StatusChecks", default)]
    pub checks: u32,
}

impl StatusCheckEvent {
    /// First status check for `hook`.
    #[must_use]
    pub const fn new(hook: LifecycleHookEvent) -> Self {
        Self {
            hook,
            marker: true,
            checks: 0,
        }
    }

    /// The check to publish after this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self {
            checks: self.checks.saturating_add(1),
            ..self
        }
    }
}

/// Every shape of event the coordinator can be handed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// A lifecycle hook from autoscaling.
    LifecycleHook(LifecycleHookEvent),
    /// A status check the coordinator scheduled for itself.
    StatusCheck(StatusCheckEvent),
    /// Anything else; logged and skipped.
    Unrecognized(Value),
}

impl Event {
    /// Decodes one notification message.
    ///
    /// # Errors
    ///
    /// Fails only if `raw` is not JSON at all.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_value(serde_json::from_str(raw)?))
    }

    /// Classifies a JSON payload by its tag fields.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        if value.get("StatusCheck").and_then(Value::as_bool) == Some(true) {
            return serde_json::from_value(value.clone())
                .map_or(Self::Unrecognized(value), Self::StatusCheck);
        }

        if value.get("LifecycleHookName").is_some() {
            return serde_json::from_value(value.clone())
                .map_or(Self::Unrecognized(value), Self::LifecycleHook);
        }

        Self::Unrecognized(value)
    }

    /// Encodes the event for republishing.
    ///
    /// # Errors
    ///
    /// Serialization failures.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::LifecycleHook(hook) => serde_json::to_string(hook),
            Self::StatusCheck(check) => serde_json::to_string(check),
            Self::Unrecognized(value) => serde_json::to_string(value),
        }
    }

    /// Decodes a notification envelope (`{"Records":[{"Sns":{"Message":..}}]}`)
    /// or a bare message into its events.
    ///
    /// Records whose message is missing or not JSON become [`Event::Unrecognized`].
    ///
    /// # Errors
    ///
    /// Fails only if `raw` is not JSON at all.
    pub fn decode_notification(raw: &str) -> Result<Vec<Self>, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;

        let Some(records) = value.get("Records").and_then(Value::as_array) else {
            return Ok(vec![Self::from_value(value)]);
        };

        Ok(records
            .iter()
            .map(|record| {
                record
                    .pointer("/Sns/Message")
                    .and_then(Value::as_str)
                    .and_then(|message| Self::decode(message).ok())
                    .unwrap_or_else(|| Self::Unrecognized(record.clone()))
            })
            .collect())
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::LifecycleHook(hook) => write!(f, "{} for {}", hook.hook_name, hook.instance_id),
            Self::StatusCheck(check) => write!(
                f,
                "status check #{} of {} for {}",
                check.checks, check.hook.hook_name, check.hook.instance_id
            ),
            Self::Unrecognized(_) => f.write_str("unrecognized event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use serde_json::json;

    fn launching_gateway() -> Value {
        json!({
            "LifecycleHookName": "RDS-Gateway-LAUNCHING",
            "EC2InstanceId": "i-0abc",
            "AutoScalingGroupName": "gateways",
            "LifecycleActionToken": "tok-1",
            "LifecycleTransition": "autoscaling:EC2_INSTANCE_LAUNCHING",
            "AccountId": "123456789012"
        })
    }

    #[test]
    fn test_decode_lifecycle_hook() {
        let event = Event::from_value(launching_gateway());

        assert_matches!(&event, Event::LifecycleHook(hook) if hook.instance_id == "i-0abc");
        let Event::LifecycleHook(hook) = event else {
            unreachable!()
        };
        assert_eq!(
            hook.target(),
            Ok(HookTarget {
                component_type: ComponentType::Gateway,
                action: HookAction::Launching,
            })
        );
        assert_eq!(hook.extra.len(), 2);
    }

    #[test]
    fn test_hook_names() {
        let hook = |name: &str| LifecycleHookEvent {
            hook_name: name.to_string(),
            instance_id: "i-1".to_string(),
            group_name: "g".to_string(),
            action_token: "t".to_string(),
            extra: Map::new(),
        };

        assert_eq!(
            hook("RDS-Connection-Broker-terminating").target(),
            Ok(HookTarget {
                component_type: ComponentType::Broker,
                action: HookAction::Terminating,
            })
        );
        assert!(hook("RDS-Web-Access-STOPPING").target().is_err());
        assert!(hook("RDS-Licensing-LAUNCHING").target().is_err());
        assert!(hook("LAUNCHING").target().is_err());
    }

    #[test]
    fn test_status_check_round_trips_original_payload() {
        let Event::LifecycleHook(hook) = Event::from_value(launching_gateway()) else {
            panic!("expected lifecycle hook");
        };

        let check = Event::StatusCheck(StatusCheckEvent::new(hook).next());
        let encoded: Value = serde_json::from_str(&check.encode().unwrap()).unwrap();

        assert_eq!(encoded["StatusCheck"], json!(true));
        assert_eq!(encoded["StatusChecks"], json!(1));
        assert_eq!(encoded["AccountId"], json!("123456789012"));
        assert_eq!(Event::from_value(encoded), check);
    }

    #[test]
    fn test_unrecognized_shapes() {
        assert_matches!(
            Event::from_value(json!({"Event": "autoscaling:TEST_NOTIFICATION"})),
            Event::Unrecognized(_)
        );
        assert_matches!(
            Event::from_value(json!({"LifecycleHookName": "RDS-Gateway-LAUNCHING"})),
            Event::Unrecognized(_)
        );
        assert_matches!(
            Event::from_value(json!({"StatusCheck": true, "EC2InstanceId": "i-1"})),
            Event::Unrecognized(_)
        );
        assert!(Event::decode("not json").is_err());
    }

    #[test]
    fn test_decode_notification_envelope() {
        let envelope = json!({
            "Records": [
                {"Sns": {"Message": launching_gateway().to_string()}},
                {"Sns": {"Message": "not json"}},
                {"Other": {}}
            ]
        });

        let events = Event::decode_notification(&envelope.to_string()).unwrap();

        assert_eq!(events.len(), 3);
        assert_matches!(events[0], Event::LifecycleHook(_));
        assert_matches!(events[1], Event::Unrecognized(_));
        assert_matches!(events[2], Event::Unrecognized(_));

        let bare = Event::decode_notification(&launching_gateway().to_string()).unwrap();
        assert_matches!(bare.as_slice(), [Event::LifecycleHook(_)]);
    }
}
