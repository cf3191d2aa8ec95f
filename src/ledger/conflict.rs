// Conflict Tracking - Detects double-spends and picks winners once blocks arrive
//
// Claimants of a shared outpoint are merged into one conflict set with a
// union-find over transaction ids. Descendants of conflicted transactions
// join the set too, so a loser's children lose with it.

use crate::tx::{OutPoint, Transaction, TxId};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, warn};

/// What tracking a transaction did to the conflict sets
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackOutcome {
    /// True if the transaction now belongs to a conflict set
    pub conflicted: bool,
    /// Outpoints this transaction claims that another transaction also claims
    pub contested: Vec<OutPoint>,
}

/// Result of resolving one conflict set against current chain depths
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Final depth for every member of the set
    pub depths: BTreeMap<TxId, i64>,
    pub winners: BTreeSet<TxId>,
    pub losers: BTreeSet<TxId>,
    /// Two confirmed members claim the same outpoint; nothing was forced
    pub deferred: bool,
}

/// Outpoint claim registry plus disjoint-set membership
#[derive(Clone, Debug, Default)]
pub struct ConflictTracker {
    /// Outpoint -> transactions that spend it
    claims: HashMap<OutPoint, BTreeSet<TxId>>,
    /// Transaction -> outpoints it spends
    spends: HashMap<TxId, Vec<OutPoint>>,
    /// Parent transaction -> transactions spending any of its outputs
    children: HashMap<TxId, BTreeSet<TxId>>,
    parent: HashMap<TxId, TxId>,
    /// Root -> members of its set
    members: HashMap<TxId, BTreeSet<TxId>>,
}

impl ConflictTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions tracked
    pub fn tracked_count(&self) -> usize {
        self.spends.len()
    }

    pub fn is_tracked(&self, id: &TxId) -> bool {
        self.spends.contains_key(id)
    }

    /// Record the input claims of a newly registered transaction
    pub fn track(&mut self, tx: &Transaction) -> TrackOutcome {
        let id = *tx.id();
        if self.spends.contains_key(&id) {
            return TrackOutcome {
                conflicted: self.is_conflicted(&id),
                contested: Vec::new(),
            };
        }

        self.make_set(id);
        let inputs: Vec<OutPoint> = tx.spent_outpoints().copied().collect();
        self.spends.insert(id, inputs.clone());

        let mut contested = Vec::new();
        for outpoint in &inputs {
            let claimants = self.claims.entry(*outpoint).or_default();
            claimants.insert(id);
            if claimants.len() > 1 {
                contested.push(*outpoint);
            }
            self.children.entry(*outpoint.txid()).or_default().insert(id);
        }

        for outpoint in &contested {
            let claimants: Vec<TxId> = self.claims[outpoint].iter().copied().collect();
            debug!(%outpoint, claimants = claimants.len(), "double-spend detected");
            for other in claimants {
                self.union(id, other);
            }
        }

        // Spending an output of a conflicted transaction ties our fate to it
        for outpoint in &inputs {
            let parent = *outpoint.txid();
            if self.is_conflicted(&parent) {
                self.union(id, parent);
            }
        }

        let conflicted = self.is_conflicted(&id);
        if conflicted {
            self.absorb_descendants(&id);
        }

        TrackOutcome {
            conflicted,
            contested,
        }
    }

    /// Root of the set containing `id`
    pub fn find(&self, id: &TxId) -> Option<TxId> {
        let mut current = *self.parent.get(id)?;
        loop {
            let next = self.parent[&current];
            if next == current {
                return Some(current);
            }
            current = next;
        }
    }

    /// All members of the set containing `id` (just `id` if untracked)
    pub fn conflict_set(&self, id: &TxId) -> Vec<TxId> {
        match self.find(id) {
            Some(root) => self.members[&root].iter().copied().collect(),
            None => vec![*id],
        }
    }

    pub fn is_conflicted(&self, id: &TxId) -> bool {
        self.find(id)
            .map(|root| self.members[&root].len() > 1)
            .unwrap_or(false)
    }

    /// Every set with more than one member
    pub fn conflict_sets(&self) -> Vec<Vec<TxId>> {
        self.members
            .values()
            .filter(|m| m.len() > 1)
            .map(|m| m.iter().copied().collect())
            .collect()
    }

    /// Transactions that spend `outpoint`
    pub fn claimants(&self, outpoint: &OutPoint) -> Vec<TxId> {
        self.claims
            .get(outpoint)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Direct competitors: other claimants of any input of `id`
    pub fn conflicts_of(&self, id: &TxId) -> Vec<TxId> {
        let mut out = BTreeSet::new();
        for outpoint in self.spends.get(id).into_iter().flatten() {
            if let Some(claimants) = self.claims.get(outpoint) {
                out.extend(claimants.iter().filter(|c| *c != id).copied());
            }
        }
        out.into_iter().collect()
    }

    /// Outpoints claimed by more than one transaction
    pub fn contested_outpoints(&self) -> Vec<OutPoint> {
        self.claims
            .iter()
            .filter(|(_, c)| c.len() > 1)
            .map(|(op, _)| *op)
            .collect()
    }

    /// Resolve the set containing `id` against the chain's depths.
    ///
    /// Only members confirmed on the best chain (depth >= 1) can win. Each
    /// other claimant of a winner's outpoint is forced to `-winnerDepth`
    /// and that depth cascades to its descendants within the set. If any
    /// outpoint has two confirmed claimants the set is deferred.
    pub fn resolve<F>(&self, id: &TxId, depth_of: F) -> Resolution
    where
        F: Fn(&TxId) -> i64,
    {
        let members: BTreeSet<TxId> = self.conflict_set(id).into_iter().collect();
        let base: BTreeMap<TxId, i64> = members.iter().map(|m| (*m, depth_of(m))).collect();

        let outpoints: BTreeSet<&OutPoint> = members
            .iter()
            .filter_map(|m| self.spends.get(m))
            .flatten()
            .collect();

        let mut winners = BTreeSet::new();
        let mut forced: BTreeMap<TxId, i64> = BTreeMap::new();

        for outpoint in outpoints {
            let Some(claimants) = self.claims.get(outpoint) else {
                continue;
            };
            if claimants.len() < 2 {
                continue;
            }

            let confirmed: Vec<&TxId> = claimants
                .iter()
                .filter(|c| base.get(*c).copied().unwrap_or(0) >= 1)
                .collect();

            match confirmed.as_slice() {
                [] => {}
                [winner] => {
                    let winner_depth = base[*winner];
                    winners.insert(**winner);
                    for loser in claimants.iter().filter(|c| *c != *winner) {
                        let depth = forced.entry(*loser).or_insert(-winner_depth);
                        *depth = (*depth).min(-winner_depth);
                    }
                }
                _ => {
                    warn!(%outpoint, confirmed = confirmed.len(), "multiple confirmed claimants, deferring");
                    return Resolution {
                        depths: base,
                        deferred: true,
                        ..Default::default()
                    };
                }
            }
        }

        // Cascade to descendants
        let mut queue: VecDeque<TxId> = forced.keys().copied().collect();
        while let Some(loser) = queue.pop_front() {
            let depth = forced[&loser];
            for child in self.children.get(&loser).into_iter().flatten() {
                if !members.contains(child) {
                    continue;
                }
                let lowered = match forced.get(child) {
                    Some(existing) if *existing <= depth => false,
                    _ => true,
                };
                if lowered {
                    forced.insert(*child, depth);
                    queue.push_back(*child);
                }
            }
        }

        let losers: BTreeSet<TxId> = forced.keys().copied().collect();
        let mut depths = base;
        depths.extend(forced);

        Resolution {
            depths,
            winners,
            losers,
            deferred: false,
        }
    }

    fn make_set(&mut self, id: TxId) {
        if !self.parent.contains_key(&id) {
            self.parent.insert(id, id);
            self.members.insert(id, BTreeSet::from([id]));
        }
    }

    /// Union by size
    fn union(&mut self, a: TxId, b: TxId) {
        self.make_set(a);
        self.make_set(b);
        let (Some(ra), Some(rb)) = (self.find(&a), self.find(&b)) else {
            return;
        };
        if ra == rb {
            return;
        }

        let (big, small) = if self.members[&ra].len() >= self.members[&rb].len() {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent.insert(small, big);
        let moved = self.members.remove(&small).unwrap_or_default();
        self.members.entry(big).or_default().extend(moved);
    }

    /// Pull every tracked descendant of the set's members into the set
    fn absorb_descendants(&mut self, id: &TxId) {
        let mut queue: VecDeque<TxId> = self.conflict_set(id).into_iter().collect();
        while let Some(current) = queue.pop_front() {
            let children: Vec<TxId> = self
                .children
                .get(&current)
                .map(|c| c.iter().copied().collect())
                .unwrap_or_default();
            for child in children {
                if !self.spends.contains_key(&child) {
                    continue;
                }
                if self.find(&child) != self.find(id) {
                    self.union(*id, child);
                    queue.push_back(child);
                }
            }
        }
    }
}
