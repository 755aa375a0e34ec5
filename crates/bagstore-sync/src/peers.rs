use rand::seq::SliceRandom;

use bagstore_ledger::OperatorEndpoint;

/// Decides the order in which candidate peers are tried for a fetch.
pub trait PeerSelector: Send + Sync {
    fn order(&self, candidates: &[OperatorEndpoint]) -> Vec<OperatorEndpoint>;
}

/// Uniform random order, so load spreads across every operator holding a
/// bag. Callers fall back through the list sequentially.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomPeerSelector;

impl PeerSelector for RandomPeerSelector {
    fn order(&self, candidates: &[OperatorEndpoint]) -> Vec<OperatorEndpoint> {
        let mut ordered = candidates.to_vec();
        ordered.shuffle(&mut rand::thread_rng());
        ordered
    }
}

/// Candidates in the order given.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialPeerSelector;

impl PeerSelector for SequentialPeerSelector {
    fn order(&self, candidates: &[OperatorEndpoint]) -> Vec<OperatorEndpoint> {
        candidates.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bagstore_types::StorageBucketId;
    use std::collections::HashSet;

    fn candidates(n: u64) -> Vec<OperatorEndpoint> {
        (0..n)
            .map(|i| OperatorEndpoint {
                bucket_id: StorageBucketId(i),
                worker_id: None,
                url: format!("http://peer-{i}"),
            })
            .collect()
    }

    #[test]
    fn random_order_is_a_permutation() {
        let input = candidates(8);
        let ordered = RandomPeerSelector.order(&input);
        assert_eq!(ordered.len(), input.len());
        let a: HashSet<_> = input.iter().collect();
        let b: HashSet<_> = ordered.iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn random_order_varies() {
        let input = candidates(8);
        let firsts: HashSet<String> = (0..200)
            .map(|_| RandomPeerSelector.order(&input)[0].url.clone())
            .collect();
        assert!(firsts.len() > 1);
    }

    #[test]
    fn sequential_keeps_order() {
        let input = candidates(3);
        assert_eq!(SequentialPeerSelector.order(&input), input);
        assert!(SequentialPeerSelector.order(&[]).is_empty());
    }
}
