//! Effective-status arbitration.
//!
//! Several authorities can have an opinion about an instance's status: the
//! client itself, a replicating peer, an operator override, the
//! autoscaling group, and the status this server already holds. This
//! module picks the winner with a fixed precedence, as a pure function
//! over its inputs and oracles.

use beacon_types::InstanceInfo;
use beacon_types::InstanceStatus;

use crate::overrides::StatusOverrides;

/// Oracle answering whether an autoscaling group is taking traffic.
pub trait AsgStatusOracle: Send + Sync {
    /// True when the named group is enabled.
    fn is_asg_enabled(&self, asg_name: &str) -> bool;
}

/// Oracle that treats every autoscaling group as enabled.
///
/// The default for deployments without an ASG integration.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysEnabledAsg;

impl AsgStatusOracle for AlwaysEnabledAsg {
    fn is_asg_enabled(&self, _asg_name: &str) -> bool {
        true
    }
}

/// Choose the status to apply for `reported`.
///
/// Precedence:
/// 1. A report of anything other than UP or OUT_OF_SERVICE is believed
///    outright; STARTING and DOWN come straight from the instance and no
///    other authority can contradict them.
/// 2. A live operator override wins over the report.
/// 3. An instance with an autoscaling group follows the group: disabled
///    group means OUT_OF_SERVICE, enabled means UP.
/// 4. On a direct (non-replicated) call, the server sticks to its own
///    prior opinion when that opinion is UP or OUT_OF_SERVICE.
/// 5. Otherwise the report stands.
pub fn effective_status(
    reported: &InstanceInfo,
    existing_status: Option<InstanceStatus>,
    is_replication: bool,
    overrides: &StatusOverrides,
    asg: &dyn AsgStatusOracle,
    now_ms: u64,
) -> InstanceStatus {
    if reported.status != InstanceStatus::Up && reported.status != InstanceStatus::OutOfService {
        tracing::debug!(
            instance_id = %reported.instance_id,
            status = %reported.status,
            "trusting reported status"
        );
        return reported.status;
    }

    if let Some(overridden) = overrides.get(&reported.instance_id, now_ms) {
        tracing::debug!(
            instance_id = %reported.instance_id,
            status = %overridden,
            "applying operator override"
        );
        return overridden;
    }

    if let Some(asg_name) = reported.asg_name.as_deref() {
        return if asg.is_asg_enabled(asg_name) {
            InstanceStatus::Up
        } else {
            tracing::debug!(instance_id = %reported.instance_id, asg_name, "autoscaling group disabled");
            InstanceStatus::OutOfService
        };
    }

    if !is_replication {
        if let Some(existing) = existing_status {
            if existing == InstanceStatus::Up || existing == InstanceStatus::OutOfService {
                return existing;
            }
        }
    }

    reported.status
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAsg(bool);

    impl AsgStatusOracle for FixedAsg {
        fn is_asg_enabled(&self, _asg_name: &str) -> bool {
            self.0
        }
    }

    fn reported(status: InstanceStatus) -> InstanceInfo {
        let mut info = InstanceInfo::new("app", "i-1");
        info.status = status;
        info
    }

    fn empty_overrides() -> StatusOverrides {
        StatusOverrides::new(3_600_000)
    }

    #[test]
    fn non_up_reports_are_believed() {
        let overrides = empty_overrides();
        overrides.insert("i-1", InstanceStatus::Up, 0);

        // DOWN and STARTING beat even a live override.
        for status in [InstanceStatus::Down, InstanceStatus::Starting, InstanceStatus::Unknown] {
            let got = effective_status(&reported(status), None, false, &overrides, &AlwaysEnabledAsg, 0);
            assert_eq!(got, status);
        }
    }

    #[test]
    fn live_override_wins_over_up_report() {
        let overrides = empty_overrides();
        overrides.insert("i-1", InstanceStatus::OutOfService, 0);

        let got =
            effective_status(&reported(InstanceStatus::Up), None, false, &overrides, &AlwaysEnabledAsg, 0);
        assert_eq!(got, InstanceStatus::OutOfService);
    }

    #[test]
    fn asg_state_decides_when_no_override() {
        let overrides = empty_overrides();
        let mut info = reported(InstanceStatus::Up);
        info.asg_name = Some("asg-a".to_string());

        let got = effective_status(&info, None, false, &overrides, &FixedAsg(false), 0);
        assert_eq!(got, InstanceStatus::OutOfService);

        let got = effective_status(&info, Some(InstanceStatus::OutOfService), false, &overrides, &FixedAsg(true), 0);
        assert_eq!(got, InstanceStatus::Up);
    }

    #[test]
    fn server_keeps_its_opinion_on_direct_calls() {
        let overrides = empty_overrides();

        let got = effective_status(
            &reported(InstanceStatus::Up),
            Some(InstanceStatus::OutOfService),
            false,
            &overrides,
            &AlwaysEnabledAsg,
            0,
        );
        assert_eq!(got, InstanceStatus::OutOfService);

        // A replicated call does not get the sticky treatment.
        let got = effective_status(
            &reported(InstanceStatus::Up),
            Some(InstanceStatus::OutOfService),
            true,
            &overrides,
            &AlwaysEnabledAsg,
            0,
        );
        assert_eq!(got, InstanceStatus::Up);
    }

    #[test]
    fn report_stands_when_nothing_else_applies() {
        let overrides = empty_overrides();
        let got = effective_status(
            &reported(InstanceStatus::Up),
            Some(InstanceStatus::Starting),
            false,
            &overrides,
            &AlwaysEnabledAsg,
            0,
        );
        assert_eq!(got, InstanceStatus::Up);

        let got = effective_status(&reported(InstanceStatus::Up), None, true, &overrides, &AlwaysEnabledAsg, 0);
        assert_eq!(got, InstanceStatus::Up);
    }
}
