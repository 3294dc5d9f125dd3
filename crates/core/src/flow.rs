//! Signature flow state machine.
//!
//! A flow walks its signers in `order`. `current_order` points at the signer
//! whose turn is active. Flow states: PENDING → IN_PROGRESS → COMPLETED or
//! CANCELLED. Signer states: PENDING → SIGNED or REJECTED.
//!
//! A rejection halts the flow where it stands: the flow stays IN_PROGRESS,
//! `current_order` is not advanced and no further signature is accepted. Only
//! [`SignatureFlow::cancel`] moves a halted flow on.

use crate::model::{FlowStatus, SignatureFlow, SignerFlowData, SignerStatus};

/// Path of the flow list page.
pub const FLOW_LIST_PATH: &str = "/dashboard/signatures/flows";

/// Path of the signing page.
pub const SIGN_PAGE_PATH: &str = "/dashboard/signatures/sign";

/// Errors raised by flow transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("a signature flow needs at least one signer")]
    NoSigners,

    #[error("signer {0} appears more than once in the flow")]
    DuplicateSigner(String),

    #[error("flow is {status} and accepts no further actions")]
    Closed { status: &'static str },

    #[error("flow is halted by a rejection")]
    Halted,

    #[error("it is not {user_id}'s turn to sign")]
    NotYourTurn { user_id: String },
}

impl SignatureFlow {
    /// Build a new PENDING flow. Signers take orders 1..=n in the given order.
    pub fn new(
        id: String,
        name: String,
        document_id: String,
        signer_ids: &[String],
        created_by: String,
        at: &str,
    ) -> Result<Self, FlowError> {
        if signer_ids.is_empty() {
            return Err(FlowError::NoSigners);
        }
        let mut seen = std::collections::HashSet::new();
        for id in signer_ids {
            if !seen.insert(id.as_str()) {
                return Err(FlowError::DuplicateSigner(id.clone()));
            }
        }

        let signers = signer_ids
            .iter()
            .enumerate()
            .map(|(idx, user_id)| SignerFlowData {
                user_id: user_id.clone(),
                order: idx as u32 + 1,
                signed_at: None,
                status: SignerStatus::Pending,
                signature_id: None,
            })
            .collect();

        let mut flow = SignatureFlow {
            id,
            name,
            document_id,
            signers,
            current_order: 1,
            status: FlowStatus::Pending,
            created_by,
            created_at: at.to_string(),
            updated_at: at.to_string(),
            progress_percent: 0,
            signed_count: 0,
            total_signers: 0,
        };
        flow.refresh_progress();
        Ok(flow)
    }

    /// Signer whose turn is active, if any.
    pub fn current_signer(&self) -> Option<&SignerFlowData> {
        self.signers.iter().find(|s| s.order == self.current_order)
    }

    /// True once any signer has rejected.
    pub fn is_halted(&self) -> bool {
        self.signers
            .iter()
            .any(|s| s.status == SignerStatus::Rejected)
    }

    /// Whether `user_id` may act on the flow right now.
    pub fn is_turn_of(&self, user_id: &str) -> bool {
        !self.status.is_terminal()
            && !self.is_halted()
            && self
                .current_signer()
                .is_some_and(|s| s.user_id == user_id && s.status == SignerStatus::Pending)
    }

    fn check_turn(&self, user_id: &str) -> Result<(), FlowError> {
        if self.status.is_terminal() {
            return Err(FlowError::Closed {
                status: self.status.as_str(),
            });
        }
        if self.is_halted() {
            return Err(FlowError::Halted);
        }
        if !self.is_turn_of(user_id) {
            return Err(FlowError::NotYourTurn {
                user_id: user_id.to_string(),
            });
        }
        Ok(())
    }

    /// Mark the active signer as SIGNED and advance the turn.
    pub fn record_signature(
        &mut self,
        user_id: &str,
        signature_id: &str,
        at: &str,
    ) -> Result<(), FlowError> {
        self.check_turn(user_id)?;
        let current = self.current_order;
        if let Some(signer) = self.signers.iter_mut().find(|s| s.order == current) {
            signer.status = SignerStatus::Signed;
            signer.signed_at = Some(at.to_string());
            signer.signature_id = Some(signature_id.to_string());
        }

        let next = self
            .signers
            .iter()
            .filter(|s| s.status == SignerStatus::Pending)
            .map(|s| s.order)
            .min();
        match next {
            Some(order) => {
                self.current_order = order;
                self.status = FlowStatus::InProgress;
            }
            None => {
                self.status = FlowStatus::Completed;
            }
        }
        self.updated_at = at.to_string();
        self.refresh_progress();
        Ok(())
    }

    /// Mark the active signer as REJECTED. The flow halts in IN_PROGRESS.
    pub fn reject(&mut self, user_id: &str, at: &str) -> Result<(), FlowError> {
        self.check_turn(user_id)?;
        let current = self.current_order;
        if let Some(signer) = self.signers.iter_mut().find(|s| s.order == current) {
            signer.status = SignerStatus::Rejected;
        }
        self.status = FlowStatus::InProgress;
        self.updated_at = at.to_string();
        self.refresh_progress();
        Ok(())
    }

    /// Cancel a PENDING or IN_PROGRESS flow.
    pub fn cancel(&mut self, at: &str) -> Result<(), FlowError> {
        if self.status.is_terminal() {
            return Err(FlowError::Closed {
                status: self.status.as_str(),
            });
        }
        self.status = FlowStatus::Cancelled;
        self.updated_at = at.to_string();
        Ok(())
    }

    /// Recompute the derived progress fields.
    pub fn refresh_progress(&mut self) {
        let total = self.signers.len() as u32;
        let signed = self
            .signers
            .iter()
            .filter(|s| s.status == SignerStatus::Signed)
            .count() as u32;
        self.total_signers = total;
        self.signed_count = signed;
        self.progress_percent = if total == 0 {
            0
        } else {
            ((signed as f64 * 100.0) / total as f64).round() as u32
        };
    }
}

// ──────────────────────────────────────────────
// Open-flow redirect
// ──────────────────────────────────────────────

/// Where to send a user who opens a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowRedirect {
    Sign {
        document_id: String,
        flow_id: String,
    },
    FlowList,
}

impl FlowRedirect {
    /// Decide the redirect for a flow: the signing page when the signer at
    /// `current_order` has not signed yet and the flow names a document,
    /// otherwise the flow list.
    pub fn for_flow(flow: &SignatureFlow) -> Self {
        let awaiting = flow
            .signers
            .iter()
            .find(|s| s.order == flow.current_order && s.signed_at.is_none());
        match awaiting {
            Some(_) if !flow.document_id.is_empty() => FlowRedirect::Sign {
                document_id: flow.document_id.clone(),
                flow_id: flow.id.clone(),
            },
            _ => FlowRedirect::FlowList,
        }
    }

    /// Target path including query parameters.
    pub fn path(&self) -> String {
        match self {
            FlowRedirect::Sign {
                document_id,
                flow_id,
            } => format!(
                "{}?documentId={}&flowId={}",
                SIGN_PAGE_PATH,
                urlencoding::encode(document_id),
                urlencoding::encode(flow_id)
            ),
            FlowRedirect::FlowList => FLOW_LIST_PATH.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AT: &str = "2026-02-01T09:00:00Z";

    fn flow(signers: &[&str]) -> SignatureFlow {
        let ids: Vec<String> = signers.iter().map(|s| s.to_string()).collect();
        SignatureFlow::new(
            "flow-1".to_string(),
            "Resolución directoral".to_string(),
            "doc-1".to_string(),
            &ids,
            "admin".to_string(),
            AT,
        )
        .unwrap()
    }

    #[test]
    fn new_flow_orders_signers_from_one() {
        let f = flow(&["ana", "luis", "rosa"]);
        let orders: Vec<u32> = f.signers.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(f.current_order, 1);
        assert_eq!(f.status, FlowStatus::Pending);
        assert_eq!(f.total_signers, 3);
        assert_eq!(f.progress_percent, 0);
    }

    #[test]
    fn new_flow_rejects_empty_and_duplicate_signers() {
        let err = SignatureFlow::new(
            "f".into(),
            "n".into(),
            "d".into(),
            &[],
            "a".into(),
            AT,
        )
        .unwrap_err();
        assert_eq!(err, FlowError::NoSigners);

        let dup = vec!["ana".to_string(), "ana".to_string()];
        let err =
            SignatureFlow::new("f".into(), "n".into(), "d".into(), &dup, "a".into(), AT)
                .unwrap_err();
        assert_eq!(err, FlowError::DuplicateSigner("ana".to_string()));
    }

    #[test]
    fn signing_in_order_completes_flow() {
        let mut f = flow(&["ana", "luis"]);
        f.record_signature("ana", "sig-1", AT).unwrap();
        assert_eq!(f.status, FlowStatus::InProgress);
        assert_eq!(f.current_order, 2);
        assert_eq!(f.progress_percent, 50);

        f.record_signature("luis", "sig-2", AT).unwrap();
        assert_eq!(f.status, FlowStatus::Completed);
        assert_eq!(f.signed_count, 2);
        assert_eq!(f.progress_percent, 100);
        assert!(f
            .signers
            .iter()
            .all(|s| s.status == SignerStatus::Signed && s.signed_at.is_some()));
    }

    #[test]
    fn out_of_turn_signature_is_refused() {
        let mut f = flow(&["ana", "luis"]);
        let err = f.record_signature("luis", "sig-1", AT).unwrap_err();
        assert_eq!(
            err,
            FlowError::NotYourTurn {
                user_id: "luis".to_string()
            }
        );
        assert_eq!(f.status, FlowStatus::Pending);
    }

    #[test]
    fn rejection_halts_until_cancelled() {
        let mut f = flow(&["ana", "luis"]);
        f.reject("ana", AT).unwrap();
        assert_eq!(f.status, FlowStatus::InProgress);
        assert!(f.is_halted());
        assert_eq!(f.current_order, 1);
        assert_eq!(f.record_signature("ana", "s", AT), Err(FlowError::Halted));

        f.cancel(AT).unwrap();
        assert_eq!(f.status, FlowStatus::Cancelled);
        assert!(matches!(f.cancel(AT), Err(FlowError::Closed { .. })));
    }

    #[test]
    fn completed_flow_is_closed() {
        let mut f = flow(&["ana"]);
        f.record_signature("ana", "s", AT).unwrap();
        assert_eq!(
            f.record_signature("ana", "s2", AT),
            Err(FlowError::Closed {
                status: "COMPLETED"
            })
        );
    }

    #[test]
    fn redirect_to_signing_page_when_current_signer_unsigned() {
        let f = flow(&["ana", "luis"]);
        let redirect = FlowRedirect::for_flow(&f);
        assert_eq!(
            redirect,
            FlowRedirect::Sign {
                document_id: "doc-1".to_string(),
                flow_id: "flow-1".to_string()
            }
        );
        assert_eq!(
            redirect.path(),
            "/dashboard/signatures/sign?documentId=doc-1&flowId=flow-1"
        );
    }

    #[test]
    fn redirect_to_list_when_current_signer_signed() {
        let mut f = flow(&["ana"]);
        f.record_signature("ana", "s", AT).unwrap();
        assert_eq!(FlowRedirect::for_flow(&f), FlowRedirect::FlowList);
    }

    #[test]
    fn redirect_to_list_without_document() {
        let mut f = flow(&["ana"]);
        f.document_id.clear();
        assert_eq!(FlowRedirect::for_flow(&f), FlowRedirect::FlowList);
    }

    #[test]
    fn redirect_to_list_when_no_signer_matches_current_order() {
        let mut f = flow(&["ana"]);
        f.current_order = 7;
        assert_eq!(FlowRedirect::for_flow(&f).path(), FLOW_LIST_PATH);
    }

    #[test]
    fn redirect_encodes_query_values() {
        let redirect = FlowRedirect::Sign {
            document_id: "a b".to_string(),
            flow_id: "x&y".to_string(),
        };
        assert_eq!(
            redirect.path(),
            "/dashboard/signatures/sign?documentId=a%20b&flowId=x%26y"
        );
    }
}
