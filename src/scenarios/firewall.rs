use async_trait::async_trait;
use tracing::{Instrument, info};

use crate::client::{Client, ServiceRequest};
use crate::domain::{CipPath, ServiceCode, TargetConfig};
use crate::error::ScenarioError;
use crate::metrics::ExpectedOutcome;
use crate::shutdown::ShutdownSignal;

use super::context::{RunContext, release};
use super::edge::{Probe, probe_loop};
use super::{Scenario, ScenarioParams};

/// Industrial firewall families with a regression pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FirewallVendor {
    Hirschmann,
    Moxa,
    Dynics,
}

impl FirewallVendor {
    /// Tag edge targets carry to join this vendor's pack.
    pub(crate) const fn tag(self) -> &'static str {
        match self {
            FirewallVendor::Hirschmann => "hirschmann",
            FirewallVendor::Moxa => "moxa",
            FirewallVendor::Dynics => "dynics",
        }
    }

    const fn scenario_name(self) -> &'static str {
        match self {
            FirewallVendor::Hirschmann => "firewall_hirschmann",
            FirewallVendor::Moxa => "firewall_moxa",
            FirewallVendor::Dynics => "firewall_dynics",
        }
    }

    const fn description(self) -> &'static str {
        match self {
            FirewallVendor::Hirschmann => {
                "Hirschmann EAGLE regression pack: tagged edge targets plus allow/deny pair"
            }
            FirewallVendor::Moxa => {
                "Moxa EDF/EDR regression pack: tagged edge targets plus allow/deny pair"
            }
            FirewallVendor::Dynics => {
                "Dynics ICS-Defender regression pack: tagged edge targets plus allow/deny pair"
            }
        }
    }
}

/// Traffic every enforcing rule set must pass, and traffic it must stop.
/// Identity reads are allowed; writes to the identity object are denied and
/// answered with an error status by a compliant path.
pub(crate) fn allow_deny_pair() -> [Probe; 2] {
    [
        Probe::new(
            "fw_allow_identity_read",
            ServiceRequest::get_attribute_single(CipPath::IDENTITY.with_attribute(1)),
            ExpectedOutcome::Success,
        ),
        Probe::new(
            "fw_deny_identity_write",
            ServiceRequest::new(
                ServiceCode::SET_ATTRIBUTE_SINGLE,
                CipPath::IDENTITY.with_attribute(1),
                vec![0x00, 0x00],
            ),
            ExpectedOutcome::Error,
        ),
    ]
}

/// Regression pack for one firewall vendor.
#[derive(Debug)]
pub(crate) struct FirewallScenario {
    vendor: FirewallVendor,
}

impl FirewallScenario {
    pub(crate) const fn new(vendor: FirewallVendor) -> Self {
        Self { vendor }
    }
}

#[async_trait]
impl Scenario for FirewallScenario {
    fn name(&self) -> &'static str {
        self.vendor.scenario_name()
    }

    fn description(&self) -> &'static str {
        self.vendor.description()
    }

    async fn run(
        &self,
        shutdown: ShutdownSignal,
        client: &mut dyn Client,
        targets: &TargetConfig,
        params: &ScenarioParams,
    ) -> Result<(), ScenarioError> {
        let tag = self.vendor.tag();
        let tagged = targets.edges_tagged(tag);
        if tagged.is_empty() {
            return Err(ScenarioError::NoTaggedTargets {
                scenario: self.name(),
                tag: tag.to_owned(),
            });
        }
        let mut probes: Vec<Probe> = tagged.into_iter().map(Probe::from).collect();
        probes.extend(allow_deny_pair());
        info!(
            "{}: {} tagged targets plus built-in allow/deny pair",
            self.name(),
            probes.len().saturating_sub(2)
        );

        let mut ctx = RunContext::new(params, shutdown);
        let result = probe_loop(&mut ctx, client, &probes, self.name())
            .instrument(params.span.clone())
            .await;
        release(client).await;
        result
    }
}
