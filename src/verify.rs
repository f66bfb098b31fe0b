use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::format::ShareHeader;
use crate::gf256::Gf256;
use crate::interpolate::{apply_weights, lagrange_weights};
use crate::sss::Share;

/// Free-form details attached to a finding, keyed by name.
pub type Context = BTreeMap<String, Value>;

/// Machine-readable category of a verification error.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "ERR_DUPLICATE_SHARE_ID")]
    DuplicateShareId,
    #[serde(rename = "ERR_INCONSISTENT_FIELD")]
    InconsistentField,
    #[serde(rename = "ERR_INVALID_SHARE_FORMAT")]
    InvalidShareFormat,
    #[serde(rename = "ERR_THRESHOLD_NOT_MET")]
    ThresholdNotMet,
    #[serde(rename = "ERR_MATH_INCONSISTENCY")]
    MathInconsistency,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DuplicateShareId => "ERR_DUPLICATE_SHARE_ID",
            ErrorCode::InconsistentField => "ERR_INCONSISTENT_FIELD",
            ErrorCode::InvalidShareFormat => "ERR_INVALID_SHARE_FORMAT",
            ErrorCode::ThresholdNotMet => "ERR_THRESHOLD_NOT_MET",
            ErrorCode::MathInconsistency => "ERR_MATH_INCONSISTENCY",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VerificationError {
    pub code: ErrorCode,
    pub message: String,
    pub context: Context,
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        write_context(f, &self.context)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VerificationWarning {
    pub message: String,
    pub context: Context,
}

impl fmt::Display for VerificationWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)?;
        write_context(f, &self.context)
    }
}

fn write_context(f: &mut fmt::Formatter, context: &Context) -> fmt::Result {
    if context.is_empty() {
        return Ok(());
    }
    let pairs: Vec<String> = context.iter().map(|(k, v)| format!("{k}={v}")).collect();
    write!(f, " ({})", pairs.join(", "))
}

/// Outcome of checking a share set against a threshold.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct VerificationReport {
    pub valid_shares_count: usize,
    pub invalid_shares_count: usize,
    pub threshold_satisfied: bool,
    pub errors: Vec<VerificationError>,
    pub warnings: Vec<VerificationWarning>,
}

impl VerificationReport {
    /// True when nothing was flagged and enough shares are usable.
    pub fn is_success(&self) -> bool {
        self.threshold_satisfied && self.errors.is_empty()
    }
}

/// Verifies bare shares against the threshold they are expected to meet.
///
/// Checks run in this order: duplicate identifiers, parameter consistency, share structure,
/// threshold, and polynomial consistency. The last one only runs when everything before it passed
/// and more than `threshold` shares were supplied: the first `threshold` shares then fix the
/// polynomial of every byte position, and each further share must lie on it.
pub fn verify_shares(shares: &[Share], threshold: usize) -> VerificationReport {
    Verifier::new(shares, None, threshold).run()
}

/// Like [`verify_shares`], additionally cross-checking the headers decoded from containers.
///
/// A requested threshold that differs from the recorded one is reported as
/// [`ErrorCode::InconsistentField`].
pub fn verify_framed(framed: &[(ShareHeader, Share)], threshold: usize) -> VerificationReport {
    let (headers, shares): (Vec<ShareHeader>, Vec<Share>) = framed.iter().cloned().unzip();
    Verifier::new(&shares, Some(&headers), threshold).run()
}

/// Shares gathered from one input, with their container headers when every share had one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareSet {
    shares: Vec<Share>,
    headers: Option<Vec<ShareHeader>>,
}

impl ShareSet {
    pub fn bare(shares: Vec<Share>) -> Self {
        ShareSet {
            shares,
            headers: None,
        }
    }

    /// Collects decoded shares. Headers are kept only if no share arrived without one.
    pub fn from_decoded(decoded: Vec<(Option<ShareHeader>, Share)>) -> Self {
        let framed = !decoded.is_empty() && decoded.iter().all(|(header, _)| header.is_some());
        let (headers, shares): (Vec<Option<ShareHeader>>, Vec<Share>) = decoded.into_iter().unzip();
        ShareSet {
            shares,
            headers: framed.then(|| headers.into_iter().flatten().collect()),
        }
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn headers(&self) -> Option<&[ShareHeader]> {
        self.headers.as_deref()
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// The share count written into the containers, if the set came from containers.
    pub fn recorded_share_count(&self) -> Option<usize> {
        self.headers()
            .and_then(|headers| headers.first())
            .map(|header| header.share_count as usize)
    }

    /// Runs [`verify_framed`] when headers are known and [`verify_shares`] otherwise.
    pub fn verify(&self, threshold: usize) -> VerificationReport {
        Verifier::new(&self.shares, self.headers(), threshold).run()
    }
}

struct Verifier<'a> {
    shares: &'a [Share],
    headers: Option<&'a [ShareHeader]>,
    threshold: usize,
    invalid: BTreeSet<usize>,
    report: VerificationReport,
}

impl<'a> Verifier<'a> {
    fn new(shares: &'a [Share], headers: Option<&'a [ShareHeader]>, threshold: usize) -> Self {
        Verifier {
            shares,
            headers,
            threshold,
            invalid: BTreeSet::new(),
            report: VerificationReport::default(),
        }
    }

    fn run(mut self) -> VerificationReport {
        if self.shares.is_empty() {
            self.error(ErrorCode::InvalidShareFormat, "no shares provided", Context::new());
            return self.report;
        }

        if self.threshold < 2 {
            self.warning(
                "threshold below 2 cannot protect a secret",
                context([("threshold", json!(self.threshold))]),
            );
        }

        self.check_duplicate_ids();
        self.check_parameter_consistency();
        self.check_share_structure();
        self.check_threshold();
        self.check_polynomial_consistency();

        self.report.invalid_shares_count = self.invalid.len();
        self.report.valid_shares_count = self.shares.len() - self.invalid.len();
        debug!(
            "verified {} shares: {} errors, {} warnings",
            self.shares.len(),
            self.report.errors.len(),
            self.report.warnings.len()
        );
        self.report
    }

    fn check_duplicate_ids(&mut self) {
        let mut positions: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
        for (i, share) in self.shares.iter().enumerate() {
            positions.entry(share.x).or_default().push(i);
        }

        for (x, found) in positions {
            if found.len() < 2 {
                continue;
            }
            self.invalid.extend(&found[1..]);
            self.error(
                ErrorCode::DuplicateShareId,
                "share identifier appears more than once",
                context([("x", json!(x)), ("positions", json!(found))]),
            );
        }
    }

    fn check_parameter_consistency(&mut self) {
        let shares = self.shares;
        let expected_len = shares[0].y.len();
        for (i, share) in shares.iter().enumerate() {
            if share.y.len() != expected_len {
                self.invalid.insert(i);
                self.error(
                    ErrorCode::InconsistentField,
                    "share length differs from the first share",
                    context([
                        ("position", json!(i)),
                        ("expected_len", json!(expected_len)),
                        ("actual_len", json!(share.y.len())),
                    ]),
                );
            }
        }

        let Some(headers) = self.headers else {
            return;
        };
        let reference = headers[0];
        // Polynomial consistency interpolates with the requested threshold.
        if reference.threshold as usize != self.threshold {
            self.error(
                ErrorCode::InconsistentField,
                "requested threshold differs from the one recorded in the shares",
                context([
                    ("requested", json!(self.threshold)),
                    ("recorded", json!(reference.threshold)),
                ]),
            );
        }
        for (i, (header, share)) in headers.iter().zip(shares).enumerate() {
            if header.threshold != reference.threshold
                || header.share_count != reference.share_count
                || header.field_id != reference.field_id
            {
                self.invalid.insert(i);
                self.error(
                    ErrorCode::InconsistentField,
                    "share header disagrees with the first share",
                    context([
                        ("position", json!(i)),
                        ("threshold", json!(header.threshold)),
                        ("share_count", json!(header.share_count)),
                        ("field_id", json!(header.field_id)),
                    ]),
                );
            }
            if header.share_index != share.x {
                self.invalid.insert(i);
                self.error(
                    ErrorCode::InconsistentField,
                    "header share index does not match share identifier",
                    context([
                        ("position", json!(i)),
                        ("share_index", json!(header.share_index)),
                        ("x", json!(share.x)),
                    ]),
                );
            }
        }
    }

    fn check_share_structure(&mut self) {
        let shares = self.shares;
        for (i, share) in shares.iter().enumerate() {
            if share.x == 0 {
                self.invalid.insert(i);
                self.error(
                    ErrorCode::InvalidShareFormat,
                    "share identifier 0 is reserved for the secret",
                    context([("position", json!(i))]),
                );
            }
            if share.y.is_empty() {
                self.invalid.insert(i);
                self.error(
                    ErrorCode::InvalidShareFormat,
                    "share carries no data",
                    context([("position", json!(i)), ("x", json!(share.x))]),
                );
            }
        }
    }

    fn check_threshold(&mut self) {
        let available = self.shares.len() - self.invalid.len();
        self.report.threshold_satisfied = available > 0 && available >= self.threshold;
        if !self.report.threshold_satisfied {
            self.error(
                ErrorCode::ThresholdNotMet,
                "reconstruction threshold not satisfied",
                context([
                    ("required", json!(self.threshold)),
                    ("available", json!(available)),
                ]),
            );
        }
    }

    fn check_polynomial_consistency(&mut self) {
        if !self.report.errors.is_empty() || self.threshold < 2 {
            return;
        }
        if self.shares.len() == self.threshold {
            self.warning(
                "no surplus shares, polynomial consistency not checked",
                context([("shares", json!(self.shares.len()))]),
            );
            return;
        }

        let shares = self.shares;
        let (basis, extra) = shares.split_at(self.threshold);
        let xs: Vec<Gf256> = basis.iter().map(|s| Gf256(s.x)).collect();
        let mut ys = Vec::with_capacity(basis.len());

        for (offset, share) in extra.iter().enumerate() {
            let position = self.threshold + offset;
            let weights = match lagrange_weights(&xs, Gf256(share.x)) {
                Ok(weights) => weights,
                Err(err) => {
                    self.invalid.insert(position);
                    self.error(
                        ErrorCode::MathInconsistency,
                        "interpolation failed",
                        context([("position", json!(position)), ("reason", json!(err.to_string()))]),
                    );
                    continue;
                }
            };

            let mismatch = (0..share.y.len()).find(|&idx| {
                ys.clear();
                ys.extend(basis.iter().map(|s| Gf256(s.y[idx])));
                apply_weights(&weights, &ys) != Gf256(share.y[idx])
            });

            if let Some(idx) = mismatch {
                self.invalid.insert(position);
                self.error(
                    ErrorCode::MathInconsistency,
                    "share does not lie on the polynomial defined by the threshold shares",
                    context([
                        ("position", json!(position)),
                        ("x", json!(share.x)),
                        ("byte_index", json!(idx)),
                    ]),
                );
            }
        }
    }

    fn error(&mut self, code: ErrorCode, message: &str, context: Context) {
        self.report.errors.push(VerificationError {
            code,
            message: message.to_string(),
            context,
        });
    }

    fn warning(&mut self, message: &str, context: Context) {
        self.report.warnings.push(VerificationWarning {
            message: message.to_string(),
            context,
        });
    }
}

fn context<const N: usize>(pairs: [(&str, Value); N]) -> Context {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::sss::split_secret;

    fn shares(threshold: usize, count: usize) -> Vec<Share> {
        let mut rng = StdRng::seed_from_u64(99);
        split_secret(b"verification target", threshold, count, &mut rng).unwrap()
    }

    fn codes(report: &VerificationReport) -> Vec<ErrorCode> {
        report.errors.iter().map(|e| e.code).collect()
    }

    #[test]
    fn test_valid_set_with_surplus() {
        let report = verify_shares(&shares(3, 5), 3);

        assert!(report.is_success());
        assert_eq!(report.valid_shares_count, 5);
        assert_eq!(report.invalid_shares_count, 0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_exact_threshold_warns() {
        let set = shares(3, 5);
        let report = verify_shares(&set[1..4], 3);

        assert!(report.is_success());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_empty_set() {
        let report = verify_shares(&[], 2);

        assert!(!report.is_success());
        assert_eq!(codes(&report), vec![ErrorCode::InvalidShareFormat]);
    }

    #[test]
    fn test_duplicate_ids() {
        let mut set = shares(2, 3);
        set.push(set[0].clone());
        let report = verify_shares(&set, 2);

        assert_eq!(codes(&report), vec![ErrorCode::DuplicateShareId]);
        assert_eq!(report.errors[0].context["x"], json!(1));
        assert_eq!(report.errors[0].context["positions"], json!([0, 3]));
        assert_eq!(report.invalid_shares_count, 1);
        assert_eq!(report.valid_shares_count, 3);
        assert!(report.threshold_satisfied);
    }

    #[test]
    fn test_inconsistent_length() {
        let mut set = shares(2, 3);
        set[2].y.pop();
        let report = verify_shares(&set, 2);

        assert_eq!(codes(&report), vec![ErrorCode::InconsistentField]);
        assert_eq!(report.invalid_shares_count, 1);
    }

    #[test]
    fn test_reserved_identifier_and_empty_data() {
        let set = vec![
            Share::new(0, vec![1, 2]),
            Share::new(2, vec![]),
            Share::new(3, vec![5, 6]),
        ];
        let report = verify_shares(&set, 2);

        assert_eq!(
            codes(&report),
            vec![
                ErrorCode::InconsistentField,
                ErrorCode::InvalidShareFormat,
                ErrorCode::InvalidShareFormat,
                ErrorCode::ThresholdNotMet,
            ]
        );
        assert_eq!(report.valid_shares_count, 1);
        assert!(!report.threshold_satisfied);
    }

    #[test]
    fn test_threshold_not_met() {
        let set = shares(3, 5);
        let report = verify_shares(&set[..2], 3);

        assert!(!report.threshold_satisfied);
        assert_eq!(codes(&report), vec![ErrorCode::ThresholdNotMet]);
        assert_eq!(report.errors[0].context["available"], json!(2));
    }

    #[test]
    fn test_tampered_share_is_detected() {
        let mut set = shares(3, 5);
        set[4].y[2] ^= 0x01;
        let report = verify_shares(&set, 3);

        assert!(report.threshold_satisfied);
        assert_eq!(codes(&report), vec![ErrorCode::MathInconsistency]);
        assert_eq!(report.errors[0].context["x"], json!(5));
        assert_eq!(report.errors[0].context["byte_index"], json!(2));
        assert_eq!(report.valid_shares_count, 4);
    }

    #[test]
    fn test_shares_from_different_splits() {
        let mut set = shares(2, 3);
        let mut rng = StdRng::seed_from_u64(1234);
        let other = split_secret(b"a different secret!", 2, 3, &mut rng).unwrap();
        set[2] = other[2].clone();

        let report = verify_shares(&set, 2);
        assert_eq!(codes(&report), vec![ErrorCode::MathInconsistency]);
    }

    #[test]
    fn test_framed_header_mismatch() {
        let set = shares(2, 3);
        let framed: Vec<(ShareHeader, Share)> = vec![
            (ShareHeader::new(2, 3, 1), set[0].clone()),
            (ShareHeader::new(2, 4, 2), set[1].clone()),
            (ShareHeader::new(2, 3, 1), set[2].clone()),
        ];
        let report = verify_framed(&framed, 2);

        assert_eq!(
            codes(&report),
            vec![
                ErrorCode::InconsistentField,
                ErrorCode::InconsistentField,
                ErrorCode::ThresholdNotMet,
            ]
        );
        assert_eq!(report.invalid_shares_count, 2);
        assert!(!report.threshold_satisfied);
    }

    #[test]
    fn test_framed_valid() {
        let set = shares(2, 3);
        let framed: Vec<(ShareHeader, Share)> = set
            .iter()
            .map(|s| (ShareHeader::new(2, 3, s.x), s.clone()))
            .collect();
        let report = verify_framed(&framed, 2);

        assert!(report.is_success());
        assert!(report.warnings.is_empty());
        assert_eq!(report.valid_shares_count, 3);
    }

    #[test]
    fn test_framed_requested_threshold_differs() {
        let set = shares(3, 5);
        let framed: Vec<(ShareHeader, Share)> = set
            .iter()
            .map(|s| (ShareHeader::new(3, 5, s.x), s.clone()))
            .collect();
        let report = verify_framed(&framed, 2);

        assert!(!report.is_success());
        assert_eq!(codes(&report), vec![ErrorCode::InconsistentField]);
        assert_eq!(report.errors[0].context["requested"], json!(2));
        assert_eq!(report.errors[0].context["recorded"], json!(3));
        assert_eq!(report.valid_shares_count, 5);
        assert_eq!(report.invalid_shares_count, 0);
        assert!(report.threshold_satisfied);
    }

    #[test]
    fn test_share_set_keeps_headers_only_when_complete() {
        let set = shares(2, 3);
        let framed = ShareSet::from_decoded(
            set.iter()
                .map(|s| (Some(ShareHeader::new(2, 3, s.x)), s.clone()))
                .collect(),
        );
        assert_eq!(framed.headers().map(|h| h.len()), Some(3));
        assert_eq!(framed.recorded_share_count(), Some(3));
        assert!(framed.verify(2).is_success());

        let mixed = ShareSet::from_decoded(vec![
            (Some(ShareHeader::new(2, 3, 1)), set[0].clone()),
            (None, set[1].clone()),
        ]);
        assert_eq!(mixed.headers(), None);
        assert_eq!(mixed.recorded_share_count(), None);
        assert_eq!(mixed.shares(), &set[..2]);

        assert!(ShareSet::from_decoded(vec![]).is_empty());
    }

    #[test]
    fn test_report_serializes_codes() {
        let set = shares(3, 5);
        let report = verify_shares(&set[..1], 3);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["errors"][0]["code"], json!("ERR_THRESHOLD_NOT_MET"));
        assert_eq!(value["threshold_satisfied"], json!(false));
    }

    #[test]
    fn test_error_display() {
        let err = VerificationError {
            code: ErrorCode::ThresholdNotMet,
            message: "reconstruction threshold not satisfied".to_string(),
            context: context([("available", json!(1)), ("required", json!(3))]),
        };
        assert_eq!(
            err.to_string(),
            "ERR_THRESHOLD_NOT_MET: reconstruction threshold not satisfied (available=1, required=3)"
        );
    }
}
