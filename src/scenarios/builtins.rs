use super::baseline::BaselineScenario;
use super::churn::ChurnScenario;
use super::dpi::DpiScenario;
use super::edge::EdgeScenario;
use super::evasion::{EvasionScenario, Family};
use super::firewall::{FirewallScenario, FirewallVendor};
use super::io::IoScenario;
use super::mixed::MixedScenario;
use super::registry::ScenarioFactory;
use super::tunnel::{ConnectedTunnelScenario, UcmmTunnelScenario};

static BUILTINS: [ScenarioFactory; 15] = [
    || Box::new(BaselineScenario),
    || Box::new(MixedScenario),
    || Box::new(ChurnScenario),
    || Box::new(IoScenario),
    || Box::new(EdgeScenario),
    || Box::new(FirewallScenario::new(FirewallVendor::Hirschmann)),
    || Box::new(FirewallScenario::new(FirewallVendor::Moxa)),
    || Box::new(FirewallScenario::new(FirewallVendor::Dynics)),
    || Box::new(UcmmTunnelScenario),
    || Box::new(ConnectedTunnelScenario),
    || Box::new(DpiScenario),
    || Box::new(EvasionScenario::new(Family::Segment)),
    || Box::new(EvasionScenario::new(Family::Fuzz)),
    || Box::new(EvasionScenario::new(Family::Anomaly)),
    || Box::new(EvasionScenario::new(Family::Timing)),
];

/// Every scenario shipped with the binary.
pub(crate) fn builtins() -> &'static [ScenarioFactory] {
    &BUILTINS
}
