//! Staged split and reconstruction bound to an explicit operation context.
//!
//! Every stage returns an [`OperationResult`] instead of an error, so a caller can log or report
//! the outcome of each step of a session. Reconstruction refuses to combine shares that fail
//! verification.

use core::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::sss::{combine_shares, split_secret, Share};
use crate::verify::{ErrorCode, ShareSet, VerificationReport};

/// Algorithm identifier recorded in every context this crate creates.
pub const ALGORITHM_VERSION: &str = "shamir-gf256-v1";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationStage {
    Initialize,
    Split,
    Verify,
    Reconstruct,
}

impl fmt::Display for OperationStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            OperationStage::Initialize => "initialize",
            OperationStage::Split => "split",
            OperationStage::Verify => "verify",
            OperationStage::Reconstruct => "reconstruct",
        })
    }
}

/// Machine-readable reason a stage did not succeed.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationError {
    InvalidThreshold,
    InvalidTotalShares,
    ThresholdExceedsTotalShares,
    MissingSessionId,
    MissingAlgorithmVersion,
    UnsupportedAlgorithmVersion,
    DryRunActive,
    SplitFailed,
    InsufficientShares,
    DuplicateShare,
    CorruptedInput,
    ShareContextMismatch,
    InconsistentShares,
    ReconstructionFailed,
}

impl OperationError {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationError::InvalidThreshold => "INVALID_THRESHOLD",
            OperationError::InvalidTotalShares => "INVALID_TOTAL_SHARES",
            OperationError::ThresholdExceedsTotalShares => "THRESHOLD_EXCEEDS_TOTAL_SHARES",
            OperationError::MissingSessionId => "MISSING_SESSION_ID",
            OperationError::MissingAlgorithmVersion => "MISSING_ALGORITHM_VERSION",
            OperationError::UnsupportedAlgorithmVersion => "UNSUPPORTED_ALGORITHM_VERSION",
            OperationError::DryRunActive => "DRY_RUN_ACTIVE",
            OperationError::SplitFailed => "SPLIT_FAILED",
            OperationError::InsufficientShares => "INSUFFICIENT_SHARES",
            OperationError::DuplicateShare => "DUPLICATE_SHARE",
            OperationError::CorruptedInput => "CORRUPTED_INPUT",
            OperationError::ShareContextMismatch => "SHARE_CONTEXT_MISMATCH",
            OperationError::InconsistentShares => "INCONSISTENT_SHARES",
            OperationError::ReconstructionFailed => "RECONSTRUCTION_FAILED",
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorCode> for OperationError {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::DuplicateShareId => OperationError::DuplicateShare,
            ErrorCode::InconsistentField => OperationError::ShareContextMismatch,
            ErrorCode::InvalidShareFormat => OperationError::CorruptedInput,
            ErrorCode::ThresholdNotMet => OperationError::InsufficientShares,
            ErrorCode::MathInconsistency => OperationError::InconsistentShares,
        }
    }
}

/// Parameters of one split or reconstruction session.
///
/// A context is fixed once built; the `with_*` methods return a modified copy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    session_id: String,
    threshold: usize,
    total_shares: usize,
    algorithm_version: String,
    dry_run: bool,
}

impl OperationContext {
    pub fn new(session_id: impl Into<String>, threshold: usize, total_shares: usize) -> Self {
        OperationContext {
            session_id: session_id.into(),
            threshold,
            total_shares,
            algorithm_version: ALGORITHM_VERSION.to_string(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_algorithm_version(mut self, version: impl Into<String>) -> Self {
        self.algorithm_version = version.into();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn total_shares(&self) -> usize {
        self.total_shares
    }

    pub fn algorithm_version(&self) -> &str {
        &self.algorithm_version
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Checks the context on its own, without looking at any secret or share.
    pub fn validate(&self) -> Result<(), OperationError> {
        if self.threshold == 0 {
            return Err(OperationError::InvalidThreshold);
        }
        if self.total_shares == 0 {
            return Err(OperationError::InvalidTotalShares);
        }
        if self.threshold > self.total_shares {
            return Err(OperationError::ThresholdExceedsTotalShares);
        }
        if self.session_id.is_empty() {
            return Err(OperationError::MissingSessionId);
        }
        if self.algorithm_version.is_empty() {
            return Err(OperationError::MissingAlgorithmVersion);
        }
        if self.algorithm_version != ALGORITHM_VERSION {
            return Err(OperationError::UnsupportedAlgorithmVersion);
        }
        Ok(())
    }
}

/// Generates a random hex session identifier.
pub fn new_session_id<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut id = [0u8; 8];
    rng.fill_bytes(&mut id);
    hex::encode(id)
}

/// Outcome of a single stage.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub stage: OperationStage,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<OperationError>,
    pub message: String,
}

impl OperationResult {
    fn succeeded(stage: OperationStage, message: impl Into<String>) -> Self {
        OperationResult {
            stage,
            success: true,
            error_code: None,
            message: message.into(),
        }
    }

    fn failed(stage: OperationStage, code: OperationError, message: impl Into<String>) -> Self {
        warn!("{} stage failed: {}", stage, code);
        OperationResult {
            stage,
            success: false,
            error_code: Some(code),
            message: message.into(),
        }
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.error_code {
            Some(code) => write!(f, "{} failed [{}]: {}", self.stage, code, self.message),
            None => write!(f, "{}: {}", self.stage, self.message),
        }
    }
}

/// Validates the context before any work is done.
pub fn initialize(context: &OperationContext) -> OperationResult {
    match context.validate() {
        Ok(()) => {
            info!(
                "Session {} initialized: {}-of-{}",
                context.session_id(),
                context.threshold(),
                context.total_shares()
            );
            OperationResult::succeeded(OperationStage::Initialize, "context initialized")
        }
        Err(code) => OperationResult::failed(
            OperationStage::Initialize,
            code,
            "context validation failed",
        ),
    }
}

/// Splits `secret` with the context's parameters. Nothing is split in dry-run mode.
pub fn split<R: RngCore + ?Sized>(
    secret: &[u8],
    context: &OperationContext,
    rng: &mut R,
) -> (OperationResult, Option<Vec<Share>>) {
    if context.dry_run() {
        return (
            OperationResult::failed(
                OperationStage::Split,
                OperationError::DryRunActive,
                "split skipped in dry-run mode",
            ),
            None,
        );
    }

    match split_secret(secret, context.threshold(), context.total_shares(), rng) {
        Ok(shares) => (
            OperationResult::succeeded(OperationStage::Split, "secret split"),
            Some(shares),
        ),
        Err(e) => (
            OperationResult::failed(OperationStage::Split, OperationError::SplitFailed, e.to_string()),
            None,
        ),
    }
}

/// Verifies a share set against the context. The full report is returned alongside the result.
pub fn verify(shares: &ShareSet, context: &OperationContext) -> (OperationResult, VerificationReport) {
    let report = shares.verify(context.threshold());
    debug!(
        "Session {}: {} errors in verification report",
        context.session_id(),
        report.errors.len()
    );

    if shares.is_empty() {
        let result = OperationResult::failed(
            OperationStage::Verify,
            OperationError::InsufficientShares,
            "no shares provided",
        );
        return (result, report);
    }

    if let Some(first) = report.errors.first() {
        let result = OperationResult::failed(OperationStage::Verify, first.code.into(), first.to_string());
        return (result, report);
    }

    match shares.recorded_share_count() {
        Some(count) if count != context.total_shares() => {
            let result = OperationResult::failed(
                OperationStage::Verify,
                OperationError::ShareContextMismatch,
                format!(
                    "shares record {count} total shares, context expects {}",
                    context.total_shares()
                ),
            );
            (result, report)
        }
        _ => (
            OperationResult::succeeded(OperationStage::Verify, "shares verified"),
            report,
        ),
    }
}

/// Verifies the shares and only then combines them into the secret.
///
/// When verification fails its result is returned and nothing is combined.
pub fn reconstruct(
    shares: &ShareSet,
    context: &OperationContext,
) -> (OperationResult, Option<Vec<u8>>) {
    let (verification, _) = verify(shares, context);
    if !verification.success {
        return (verification, None);
    }

    match combine_shares(shares.shares()) {
        Ok(secret) => {
            info!("Session {}: secret reconstructed", context.session_id());
            (
                OperationResult::succeeded(OperationStage::Reconstruct, "secret reconstructed"),
                Some(secret),
            )
        }
        Err(e) => (
            OperationResult::failed(
                OperationStage::Reconstruct,
                OperationError::ReconstructionFailed,
                e.to_string(),
            ),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::format::ShareHeader;
    use crate::sss::tests::CyclingRng;

    const SECRET: &[u8] = b"operation secret";

    fn context(threshold: usize, total: usize) -> OperationContext {
        OperationContext::new("session-1", threshold, total)
    }

    fn split_ok(threshold: usize, total: usize) -> Vec<Share> {
        let mut rng = StdRng::seed_from_u64(7);
        let (result, shares) = split(SECRET, &context(threshold, total), &mut rng);
        assert!(result.success, "{result}");
        shares.unwrap()
    }

    #[test]
    fn test_context_error_codes() {
        let cases = [
            (context(0, 3), OperationError::InvalidThreshold),
            (context(2, 0), OperationError::InvalidTotalShares),
            (context(4, 3), OperationError::ThresholdExceedsTotalShares),
            (OperationContext::new("", 2, 3), OperationError::MissingSessionId),
            (
                context(2, 3).with_algorithm_version(""),
                OperationError::MissingAlgorithmVersion,
            ),
            (
                context(2, 3).with_algorithm_version("shamir-gf256-v0"),
                OperationError::UnsupportedAlgorithmVersion,
            ),
        ];

        for (ctx, expected) in cases {
            assert_eq!(ctx.validate(), Err(expected), "{ctx:?}");
        }
        assert_eq!(context(2, 3).validate(), Ok(()));
    }

    #[test]
    fn test_context_is_copied_on_change() {
        let base = context(2, 3);
        let dry = base.clone().with_dry_run(true);

        assert!(!base.dry_run());
        assert!(dry.dry_run());
        assert_eq!(dry.session_id(), "session-1");
        assert_eq!(dry.algorithm_version(), ALGORITHM_VERSION);
    }

    #[test]
    fn test_initialize() {
        let ok = initialize(&context(2, 3));
        assert!(ok.success);
        assert_eq!(ok.stage, OperationStage::Initialize);
        assert_eq!(ok.error_code, None);

        let failed = initialize(&context(5, 3));
        assert!(!failed.success);
        assert_eq!(failed.stage, OperationStage::Initialize);
        assert_eq!(failed.error_code, Some(OperationError::ThresholdExceedsTotalShares));
    }

    #[test]
    fn test_split_stage() {
        let shares = split_ok(3, 5);
        assert_eq!(shares.len(), 5);
        assert_eq!(combine_shares(&shares[..3]).unwrap(), SECRET);
    }

    #[test]
    fn test_split_dry_run_skips() {
        let mut rng = CyclingRng::new(&[0x11]);
        let (result, shares) = split(SECRET, &context(2, 3).with_dry_run(true), &mut rng);

        assert!(!result.success);
        assert_eq!(result.stage, OperationStage::Split);
        assert_eq!(result.error_code, Some(OperationError::DryRunActive));
        assert_eq!(shares, None);
    }

    #[test]
    fn test_split_failure() {
        let mut rng = CyclingRng::new(&[0x11]);
        let (result, shares) = split(b"", &context(2, 3), &mut rng);

        assert_eq!(result.error_code, Some(OperationError::SplitFailed));
        assert!(result.message.contains("secret must not be empty"));
        assert_eq!(shares, None);
    }

    #[test]
    fn test_verify_stage() {
        let shares = ShareSet::bare(split_ok(3, 5));
        let (result, report) = verify(&shares, &context(3, 5));

        assert!(result.success, "{result}");
        assert_eq!(result.stage, OperationStage::Verify);
        assert!(report.is_success());
    }

    #[test]
    fn test_verify_stage_maps_report_codes() {
        let all = split_ok(3, 5);

        let (result, _) = verify(&ShareSet::bare(vec![]), &context(3, 5));
        assert_eq!(result.error_code, Some(OperationError::InsufficientShares));

        let (result, report) = verify(&ShareSet::bare(all[..2].to_vec()), &context(3, 5));
        assert_eq!(result.error_code, Some(OperationError::InsufficientShares));
        assert!(!report.threshold_satisfied);

        let mut duplicated = all.clone();
        duplicated.push(all[0].clone());
        let (result, _) = verify(&ShareSet::bare(duplicated), &context(3, 5));
        assert_eq!(result.error_code, Some(OperationError::DuplicateShare));

        let mut tampered = all.clone();
        tampered[4].y[0] ^= 0x80;
        let (result, _) = verify(&ShareSet::bare(tampered), &context(3, 5));
        assert_eq!(result.error_code, Some(OperationError::InconsistentShares));

        let mut corrupted = all;
        corrupted[1].x = 0;
        let (result, _) = verify(&ShareSet::bare(corrupted), &context(3, 5));
        assert_eq!(result.error_code, Some(OperationError::CorruptedInput));
    }

    #[test]
    fn test_verify_stage_checks_recorded_parameters() {
        let framed: Vec<(Option<ShareHeader>, Share)> = split_ok(2, 3)
            .into_iter()
            .map(|s| (Some(ShareHeader::new(2, 3, s.x)), s))
            .collect();
        let set = ShareSet::from_decoded(framed);

        let (result, _) = verify(&set, &context(2, 3));
        assert!(result.success, "{result}");

        let (result, _) = verify(&set, &context(2, 4));
        assert_eq!(result.error_code, Some(OperationError::ShareContextMismatch));

        let (result, _) = verify(&set, &context(3, 3));
        assert_eq!(result.error_code, Some(OperationError::ShareContextMismatch));
    }

    #[test]
    fn test_reconstruct() {
        let shares = split_ok(3, 5);
        let set = ShareSet::bare(vec![shares[4].clone(), shares[0].clone(), shares[2].clone()]);
        let (result, secret) = reconstruct(&set, &context(3, 3));

        assert!(result.success, "{result}");
        assert_eq!(result.stage, OperationStage::Reconstruct);
        assert_eq!(secret.as_deref(), Some(SECRET));
    }

    #[test]
    fn test_reconstruct_refuses_unverified_shares() {
        let mut shares = split_ok(2, 4);
        shares[3].y[5] ^= 0x01;
        let (result, secret) = reconstruct(&ShareSet::bare(shares), &context(2, 4));

        assert!(!result.success);
        assert_eq!(result.stage, OperationStage::Verify);
        assert_eq!(result.error_code, Some(OperationError::InconsistentShares));
        assert_eq!(secret, None);
    }

    #[test]
    fn test_result_serialization() {
        let result = initialize(&context(0, 3));
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["stage"], "initialize");
        assert_eq!(value["success"], false);
        assert_eq!(value["error_code"], "INVALID_THRESHOLD");
        assert_eq!(
            result.to_string(),
            "initialize failed [INVALID_THRESHOLD]: context validation failed"
        );
    }

    #[test]
    fn test_session_ids() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = new_session_id(&mut rng);
        let b = new_session_id(&mut rng);

        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}
