//! Header chain verification
//!
//! Scores a batch of raw headers against the tracked chain tip. The batch
//! is walked over a fixed number of slots so the cost of one call is bounded
//! by configuration, not by the size of the submitted proof. Longer proofs
//! are split across sequential calls, each persisting its progress.

use crate::contract::error::ContractError;
use crate::core::{BlockHeader, ContractState, StateError, BLOCK_HEADER_SIZE};
use primitive_types::U256;

/// Verification progress carried between slots and calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainProgress {
    /// Last accepted header
    pub tip: BlockHeader,
    /// Height of `tip`
    pub height: u64,
    /// Qualifying blocks still required
    pub remaining: u64,
    /// The required count was reached
    pub fulfilled: bool,
}

impl ChainProgress {
    /// Starting point for a call against the stored state
    pub fn from_state(state: &ContractState) -> Self {
        Self {
            tip: state.prev_header,
            height: state.prev_height,
            remaining: state.remaining_count,
            fulfilled: false,
        }
    }
}

/// Validates linkage and proof-of-work of header batches
#[derive(Debug, Clone)]
pub struct HeaderChainVerifier {
    max_headers: usize,
    target_difficulty: U256,
}

impl HeaderChainVerifier {
    /// `target_difficulty` is the easiest own-target a block may claim and still count
    pub fn new(max_headers: usize, target_difficulty: U256) -> Self {
        Self {
            max_headers,
            target_difficulty,
        }
    }

    pub fn max_headers(&self) -> usize {
        self.max_headers
    }

    /// A header counts iff `hash <= own target <= configured target`
    pub fn qualifies(&self, header: &BlockHeader) -> bool {
        let own_target = header.target();
        header.work_value() <= own_target && own_target <= self.target_difficulty
    }

    /// Walk the slots of `blob`, returning the resulting progress
    ///
    /// Slot `i` is active only while the requirement is unmet and the blob
    /// holds a complete header at `i`. A single linkage failure rejects the
    /// whole batch, including headers already accepted earlier in the call.
    /// Progress that is already fulfilled or requires no blocks is rejected,
    /// since it would release funds without a qualifying header.
    pub fn process_headers(
        &self,
        progress: &ChainProgress,
        blob: &[u8],
    ) -> Result<ChainProgress, ContractError> {
        if progress.fulfilled || progress.remaining == 0 {
            return Err(ContractError::InvalidState(StateError::NoBlocksRequired));
        }

        let mut next = *progress;
        let mut qualified = 0usize;

        for slot in 0..self.max_headers {
            let end = (slot + 1) * BLOCK_HEADER_SIZE;
            if next.fulfilled || blob.len() < end {
                continue;
            }

            let header = match BlockHeader::from_slice(&blob[end - BLOCK_HEADER_SIZE..end]) {
                Some(header) => header,
                None => continue,
            };

            if !header.extends(&next.tip) {
                log::debug!(
                    "Header {} ({}) does not extend tip {}",
                    slot,
                    header.hash_hex(),
                    next.tip.hash_hex()
                );
                return Err(ContractError::InvalidChainLinkage { index: slot });
            }

            if self.qualifies(&header) {
                next.remaining = next.remaining.saturating_sub(1);
                qualified += 1;
            }

            if next.remaining == 0 {
                next.fulfilled = true;
            } else {
                next.tip = header;
                next.height = next
                    .height
                    .checked_add(1)
                    .ok_or(ContractError::HeightOverflow)?;
            }
        }

        log::debug!(
            "Processed header batch: {} qualifying, {} remaining, height {}",
            qualified,
            next.remaining,
            next.height
        );

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compact;
    use crate::core::header::fixtures::*;

    fn progress(tip: &str, height: u64, remaining: u64) -> ChainProgress {
        ChainProgress {
            tip: header(tip),
            height,
            remaining,
            fulfilled: false,
        }
    }

    fn chain_1m(range: std::ops::Range<usize>) -> Vec<BlockHeader> {
        CHAIN_1M[range].iter().map(|h| header(h)).collect()
    }

    #[test]
    fn test_single_header_fulfils() {
        let verifier = HeaderChainVerifier::new(52, compact::decode(0x1c27_b3c0));
        let start = progress(CHAIN_1M[0], 1_000_000, 1);

        let result = verifier
            .process_headers(&start, &blob(&chain_1m(1..2)))
            .unwrap();

        assert!(result.fulfilled);
        assert_eq!(result.remaining, 0);
        // The fulfilling header does not become the tracked tip
        assert_eq!(result.tip, start.tip);
        assert_eq!(result.height, 1_000_000);
    }

    #[test]
    fn test_five_headers_in_one_call() {
        let verifier = HeaderChainVerifier::new(52, compact::decode(0x1b52_ccc0));
        let start = progress(CHAIN_1M[0], 1_000_000, 5);

        let result = verifier
            .process_headers(&start, &blob(&chain_1m(1..6)))
            .unwrap();

        assert!(result.fulfilled);
        assert_eq!(result.remaining, 0);
        assert_eq!(result.tip, header(CHAIN_1M[4]));
        assert_eq!(result.height, 1_000_004);
    }

    #[test]
    fn test_partial_progress_advances_tip() {
        let verifier = HeaderChainVerifier::new(52, compact::decode(0x1b52_ccc0));
        let start = progress(CHAIN_1M[0], 1_000_000, 10);

        let result = verifier
            .process_headers(&start, &blob(&chain_1m(1..4)))
            .unwrap();

        assert!(!result.fulfilled);
        assert_eq!(result.remaining, 7);
        assert_eq!(result.tip, header(CHAIN_1M[3]));
        assert_eq!(result.height, 1_000_003);
    }

    #[test]
    fn test_too_easy_headers_do_not_count() {
        // One step harder than the headers' own bits
        let verifier = HeaderChainVerifier::new(52, compact::decode(0x1b52_ccbf));
        let start = progress(CHAIN_1M[0], 1_000_000, 2);

        let result = verifier
            .process_headers(&start, &blob(&chain_1m(1..6)))
            .unwrap();

        assert!(!result.fulfilled);
        assert_eq!(result.remaining, 2);
        assert_eq!(result.height, 1_000_005);
        assert_eq!(result.tip, header(CHAIN_1M[5]));
    }

    #[test]
    fn test_unlinked_header_rejected() {
        let verifier = HeaderChainVerifier::new(52, compact::decode(0x1a35_0b34));
        let start = progress(H577267, 577_267, 1);

        assert_eq!(
            verifier.process_headers(&start, header(H577266).as_bytes()),
            Err(ContractError::InvalidChainLinkage { index: 0 })
        );
    }

    #[test]
    fn test_late_linkage_failure_rejects_whole_batch() {
        let verifier = HeaderChainVerifier::new(52, compact::decode(0x1b52_ccc0));
        let start = progress(CHAIN_1M[0], 1_000_000, 5);

        let mut headers = chain_1m(1..3);
        headers.push(header(CHAIN_1M[4]));

        assert_eq!(
            verifier.process_headers(&start, &blob(&headers)),
            Err(ContractError::InvalidChainLinkage { index: 2 })
        );
    }

    #[test]
    fn test_slots_after_fulfilment_are_not_consulted() {
        let verifier = HeaderChainVerifier::new(52, compact::decode(0x1b52_ccc0));
        let start = progress(CHAIN_1M[0], 1_000_000, 2);

        // Garbage after the second header would fail linkage if it were read
        let mut data = blob(&chain_1m(1..3));
        data.extend_from_slice(&[0xee; BLOCK_HEADER_SIZE]);

        let result = verifier.process_headers(&start, &data).unwrap();
        assert!(result.fulfilled);
        assert_eq!(result.tip, header(CHAIN_1M[1]));
    }

    #[test]
    fn test_trailing_partial_header_ignored() {
        let verifier = HeaderChainVerifier::new(52, compact::decode(0x1b52_ccc0));
        let start = progress(CHAIN_1M[0], 1_000_000, 3);

        let mut data = blob(&chain_1m(1..2));
        data.extend_from_slice(&[0u8; 40]);

        let result = verifier.process_headers(&start, &data).unwrap();
        assert_eq!(result.height, 1_000_001);
        assert_eq!(result.remaining, 2);
    }

    #[test]
    fn test_cap_bounds_one_call() {
        let tip = header(CHAIN_1M[0]);
        let headers = mine_chain(&tip, 0x207f_ffff, 6);
        let verifier = HeaderChainVerifier::new(4, compact::decode(0x207f_ffff));
        let start = ChainProgress {
            tip,
            height: 10,
            remaining: 100,
            fulfilled: false,
        };

        let first = verifier.process_headers(&start, &blob(&headers)).unwrap();
        assert_eq!(first.height, 14);
        assert_eq!(first.remaining, 96);
        assert_eq!(first.tip, headers[3]);

        // The caller resumes from the persisted tip
        let second = verifier.process_headers(&first, &blob(&headers[4..])).unwrap();
        assert_eq!(second.height, 16);
        assert_eq!(second.remaining, 94);
    }

    #[test]
    fn test_deterministic_and_monotonic() {
        let verifier = HeaderChainVerifier::new(52, compact::decode(0x1b52_ccc0));
        let start = progress(CHAIN_1M[0], 1_000_000, 4);
        let data = blob(&chain_1m(1..4));

        let a = verifier.process_headers(&start, &data).unwrap();
        let b = verifier.process_headers(&start, &data).unwrap();
        assert_eq!(a, b);
        assert!(a.remaining <= start.remaining);
    }

    #[test]
    fn test_spent_progress_rejected() {
        // CHAIN_1M[1] does not qualify here, so nothing may release funds
        let verifier = HeaderChainVerifier::new(52, compact::decode(0x1b52_ccbf));
        let next = header(CHAIN_1M[1]);
        assert!(!verifier.qualifies(&next));

        let spent = progress(CHAIN_1M[0], 1_000_000, 0);
        assert_eq!(
            verifier.process_headers(&spent, next.as_bytes()),
            Err(ContractError::InvalidState(StateError::NoBlocksRequired))
        );

        let fulfilled = ChainProgress {
            fulfilled: true,
            ..progress(CHAIN_1M[0], 1_000_000, 1)
        };
        assert!(verifier.process_headers(&fulfilled, next.as_bytes()).is_err());
    }

    #[test]
    fn test_height_overflow_is_an_error() {
        let verifier = HeaderChainVerifier::new(52, compact::decode(0x1b52_ccc0));
        let start = progress(CHAIN_1M[0], u64::MAX, 5);

        assert_eq!(
            verifier.process_headers(&start, &blob(&chain_1m(1..2))),
            Err(ContractError::HeightOverflow)
        );
    }
}
