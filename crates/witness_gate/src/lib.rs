//! WITNESS Response Gate
//!
//! Finds tool-result claims in generated text, checks each one against the
//! execution registry, and withholds any response whose claims do not all
//! trace back to a real, completed, still-retained execution.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod claim;
pub mod extract;
pub mod gate;
pub mod verify;

pub use claim::{Claim, Extraction};
pub use extract::{ClaimExtractor, PatternExtractor};
pub use gate::{remediation_message, GateOutcome, Gatekeeper, Issue};
pub use verify::{InvalidReason, Verdict, Verifier};
