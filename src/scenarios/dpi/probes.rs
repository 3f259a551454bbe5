use std::time::Duration;

use crate::client::{IoConnectionParams, ServiceRequest, ServiceResponse};
use crate::domain::{CipPath, IoTransport, ServiceCode, TargetConfig};
use crate::error::{ClientError, ClientResult};
use crate::metrics::{ExpectedOutcome, Metric, OperationKind, Outcome};
use crate::scenarios::edge::Probe;
use crate::scenarios::firewall::allow_deny_pair;

use super::phases::PhaseKind;

pub(crate) const UNEXPECTED_SUCCESS: &str =
    "unexpected success: device accepted invalid request (possible false negative)";

const LARGE_PAYLOAD_SIZES: [usize; 3] = [64, 256, 480];
const OVERSIZE_PAYLOAD: usize = 1_024;
const FANOUT_REQUESTS: usize = 24;
const UNKNOWN_CLASS: u16 = 0x99;
const UNKNOWN_SERVICE: ServiceCode = ServiceCode(0x4B);

/// One unit of work inside a DPI phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DpiStep {
    /// Explicit request, optionally with the outcome it should produce.
    Request {
        name: String,
        kind: OperationKind,
        request: ServiceRequest,
        expected: Option<ExpectedOutcome>,
    },
    /// Malformed request a compliant path must reject.
    Violation { name: String, request: ServiceRequest },
    /// Class-3 forward open immediately followed by its forward close.
    OpenClose(IoConnectionParams),
}

impl DpiStep {
    fn read(name: impl Into<String>, request: ServiceRequest) -> Self {
        DpiStep::Request {
            name: name.into(),
            kind: OperationKind::Read,
            request,
            expected: None,
        }
    }

    fn custom(
        name: impl Into<String>,
        request: ServiceRequest,
        expected: ExpectedOutcome,
    ) -> Self {
        DpiStep::Request {
            name: name.into(),
            kind: OperationKind::Custom,
            request,
            expected: Some(expected),
        }
    }

    fn violation(name: &str, request: ServiceRequest) -> Self {
        DpiStep::Violation {
            name: name.to_owned(),
            request,
        }
    }
}

impl From<Probe> for DpiStep {
    fn from(probe: Probe) -> Self {
        DpiStep::custom(probe.name, probe.request, probe.expected)
    }
}

/// Work issued on every cycle of `kind`.
pub(crate) fn phase_steps(kind: PhaseKind, targets: &TargetConfig) -> Vec<DpiStep> {
    let reads = targets.reads_or_identity();
    match kind {
        PhaseKind::Baseline => reads
            .iter()
            .map(|target| {
                DpiStep::read(
                    target.name.clone(),
                    ServiceRequest::new(target.service, target.path, Vec::new()),
                )
            })
            .collect(),
        PhaseKind::EncodingAmbiguity => {
            // The same reads as single requests, as one batch and routed.
            let singles: Vec<ServiceRequest> = reads
                .iter()
                .map(|target| ServiceRequest::get_attribute_single(target.path))
                .collect();
            let mut steps: Vec<DpiStep> = reads
                .iter()
                .zip(&singles)
                .map(|(target, request)| DpiStep::read(target.name.clone(), request.clone()))
                .collect();
            if let Some(first) = singles.first() {
                steps.push(DpiStep::read(
                    "routed_single",
                    ServiceRequest::unconnected_send(first.clone(), 0),
                ));
            }
            steps.push(DpiStep::read("msp_batch", ServiceRequest::multiple(singles)));
            steps
        }
        PhaseKind::ConnectionLifecycle => vec![
            DpiStep::OpenClose(IoConnectionParams {
                name: "lifecycle_class3".to_owned(),
                rpi: Duration::from_millis(100),
                o_to_t_size: 64,
                t_to_o_size: 64,
                transport: IoTransport::Class3,
                connection_point: CipPath::MESSAGE_ROUTER,
            }),
            DpiStep::read(
                "identity_vendor_id",
                ServiceRequest::get_attribute_single(CipPath::IDENTITY.with_attribute(1)),
            ),
        ],
        PhaseKind::LargePayloads => {
            let mut steps: Vec<DpiStep> = LARGE_PAYLOAD_SIZES
                .iter()
                .map(|size| {
                    DpiStep::custom(
                        format!("attribute_list_{}b", size),
                        attribute_list(*size),
                        ExpectedOutcome::Success,
                    )
                })
                .collect();
            steps.push(DpiStep::custom(
                format!("attribute_list_{}b", OVERSIZE_PAYLOAD),
                attribute_list(OVERSIZE_PAYLOAD),
                ExpectedOutcome::Error,
            ));
            let fanout = vec![
                ServiceRequest::get_attribute_single(CipPath::IDENTITY.with_attribute(1));
                FANOUT_REQUESTS
            ];
            steps.push(DpiStep::custom(
                "msp_fanout",
                ServiceRequest::multiple(fanout),
                ExpectedOutcome::Any,
            ));
            steps
        }
        PhaseKind::ProtocolViolations => violation_steps(),
        PhaseKind::AllowlistPrecision => targets
            .edges()
            .map(Probe::from)
            .chain(allow_deny_pair())
            .map(DpiStep::from)
            .collect(),
    }
}

fn attribute_list(size: usize) -> ServiceRequest {
    let data: Vec<u8> = (0..size)
        .map(|idx| u8::try_from(idx & 0xFF).unwrap_or(0))
        .collect();
    ServiceRequest::new(ServiceCode::GET_ATTRIBUTE_LIST, CipPath::IDENTITY, data)
}

fn violation_steps() -> Vec<DpiStep> {
    vec![
        DpiStep::violation(
            "unknown_class",
            ServiceRequest::get_attribute_single(CipPath::attribute(UNKNOWN_CLASS, 1, 1)),
        ),
        DpiStep::violation(
            "unknown_instance",
            ServiceRequest::get_attribute_single(CipPath::attribute(0x01, 0x7F, 1)),
        ),
        DpiStep::violation(
            "unknown_attribute",
            ServiceRequest::get_attribute_single(CipPath::IDENTITY.with_attribute(0x7F)),
        ),
        DpiStep::violation(
            "unsupported_service",
            ServiceRequest::new(UNKNOWN_SERVICE, CipPath::IDENTITY, Vec::new()),
        ),
        DpiStep::violation("empty_batch", ServiceRequest::multiple(Vec::new())),
        DpiStep::violation(
            "single_without_attribute",
            ServiceRequest::get_attribute_single(CipPath::IDENTITY),
        ),
    ]
}

/// How the path answered a request it should have rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ViolationVerdict {
    /// Error status from the device: the expected, healthy case.
    Rejected(u8),
    /// No protocol answer: silently dropped or actively blocked in transit.
    Dropped(ClientError),
    /// Success status for an invalid request.
    Accepted,
}

impl ViolationVerdict {
    pub(crate) fn classify(result: &ClientResult<ServiceResponse>) -> Self {
        match result {
            Ok(response) if response.status == 0 => ViolationVerdict::Accepted,
            Ok(response) => ViolationVerdict::Rejected(response.status),
            Err(err) => ViolationVerdict::Dropped(err.clone()),
        }
    }

    /// Finishes `base` (already carrying RTT and labels) for this verdict.
    /// An accepted violation keeps `success == false` but realizes a
    /// `Success` outcome, so it counts as misclassified against the expected
    /// error.
    pub(crate) fn apply(&self, base: Metric) -> Metric {
        let base = base.with_expected(ExpectedOutcome::Error);
        match self {
            ViolationVerdict::Rejected(status) => base.failed(*status, ""),
            ViolationVerdict::Dropped(err) => base.failed(0, err.to_string()),
            ViolationVerdict::Accepted => base
                .failed(0, UNEXPECTED_SUCCESS)
                .with_outcome(Outcome::Success),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetType;
    use crate::scenarios::dpi::phases::PHASES;

    fn base() -> Metric {
        Metric::new(
            "dpi_explicit:phase_4_protocol_violations",
            TargetType::EmulatedAdapter,
            OperationKind::Custom,
            "unknown_class",
            "0x0E",
        )
    }

    #[test]
    fn rejection_is_the_expected_case() -> Result<(), String> {
        let reply = Ok(ServiceResponse::status(ServiceCode::GET_ATTRIBUTE_SINGLE, 0x05));
        let verdict = ViolationVerdict::classify(&reply);
        if verdict != ViolationVerdict::Rejected(0x05) {
            return Err(format!("verdict: {:?}", verdict));
        }
        let metric = verdict.apply(base());
        if metric.success || metric.status != 0x05 || metric.is_misclassified() {
            return Err(format!("metric: {:?}", metric));
        }
        Ok(())
    }

    #[test]
    fn accepted_violation_is_a_misclassification() -> Result<(), String> {
        let reply = Ok(ServiceResponse::ok(ServiceCode::GET_ATTRIBUTE_SINGLE, vec![1]));
        let metric = ViolationVerdict::classify(&reply).apply(base());
        if metric.success || metric.outcome != Outcome::Success || !metric.is_misclassified() {
            return Err(format!("metric: {:?}", metric));
        }
        if !metric.error.contains("false negative") {
            return Err(format!("error text: {}", metric.error));
        }
        Ok(())
    }

    #[test]
    fn dropped_violation_is_a_timeout() -> Result<(), String> {
        let reply = Err(ClientError::Timeout { after_ms: 1_000 });
        let metric = ViolationVerdict::classify(&reply).apply(base());
        if metric.outcome != Outcome::Timeout || !metric.is_misclassified() {
            return Err(format!("metric: {:?}", metric));
        }
        Ok(())
    }

    #[test]
    fn every_phase_has_work() -> Result<(), String> {
        let targets = TargetConfig::default();
        for kind in PHASES {
            if phase_steps(kind, &targets).is_empty() {
                return Err(format!("{} has no steps", kind.slug()));
            }
        }
        Ok(())
    }
}
