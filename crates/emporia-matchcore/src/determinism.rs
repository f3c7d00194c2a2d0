//! Results root: one hash that identifies a round's output.
//!
//! Two runs over the same sealed round and the same starting ledger must
//! serialize to the same bytes; comparing roots checks that cheaply.

use emporia_types::{ExecutionResult, Result};
use sha2::{Digest, Sha256};

/// SHA-256 over the JSON serialization of each result, in order.
pub fn compute_results_root(results: &[ExecutionResult]) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(b"emporia:results_root:v1:");
    hasher.update((results.len() as u64).to_le_bytes());
    for result in results {
        let bytes = serde_json::to_vec(result)?;
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(hasher.finalize().into())
}

/// Recompute and compare.
#[must_use]
pub fn verify_results_root(results: &[ExecutionResult], expected: &[u8; 32]) -> bool {
    compute_results_root(results).is_ok_and(|root| root == *expected)
}
