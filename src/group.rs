//! Similarity grouping.
//!
//! Builds the transitive closure of the "within Hamming threshold" relation
//! over all fingerprints with a union-find structure, then picks one keeper
//! per group by quality score. Membership and keeper choice depend only on
//! the input set, never on arrival or scheduling order.

use crate::fingerprint::Fingerprint;
use crate::score::QualityScore;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default distance threshold: fingerprints at most this many bits apart are
/// considered duplicates. Calibrated for the 64-bit average hash.
pub const DEFAULT_MAX_DISTANCE: u32 = 3;

/// Prefix width of the coarse bucket key. Wider keys spread records across
/// more buckets and prune more pair comparisons; pruning stays exact at any
/// width because the prefix distance lower-bounds the full distance.
const BUCKET_BITS: u32 = 8;

/// Below this many records the plain O(N^2) scan beats the bucket overhead.
const BUCKET_CUTOFF: usize = 1024;

/// One fingerprinted input image. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub score: QualityScore,
}

/// A maximal set of mutually-connected images under the threshold relation.
///
/// Members are ordered with the representative first, remaining members in
/// path order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub members: Vec<ImageRecord>,
}

impl Group {
    /// Build a group from its members, moving the keeper to the front.
    ///
    /// The keeper is the member with the highest quality score; score ties go
    /// to the lexicographically smallest path so the choice is total.
    fn new(mut members: Vec<ImageRecord>) -> Self {
        let best = members
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.score
                    .cmp(&b.score)
                    .then_with(|| b.path.cmp(&a.path))
            })
            .map(|(i, _)| i)
            .unwrap_or(0);
        let keeper = members.remove(best);
        members.insert(0, keeper);
        Group { members }
    }

    /// The member to retain.
    pub fn representative(&self) -> &ImageRecord {
        &self.members[0]
    }

    /// Every member except the representative.
    pub fn duplicates(&self) -> &[ImageRecord] {
        &self.members[1..]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Disjoint-set forest with path compression and union by rank.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        DisjointSet {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            // Halve the path on the way up.
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Partition records into groups of near-duplicates.
///
/// Two records are linked when their fingerprint distance is at most
/// `max_distance` (inclusive; 0 degenerates to exact-fingerprint matching);
/// groups are the connected components of that relation. Every input record
/// lands in exactly one group. Size-1 groups mean no duplication and are
/// dropped unless `include_singletons` is set.
pub fn group_records(
    mut records: Vec<ImageRecord>,
    max_distance: u32,
    include_singletons: bool,
) -> Vec<Group> {
    // Path order, not caller order, decides indices: grouping output must not
    // depend on how the fingerprint stage scheduled its workers.
    records.sort_by(|a, b| a.path.cmp(&b.path));

    let mut dsu = DisjointSet::new(records.len());
    if records.len() > BUCKET_CUTOFF {
        union_pairs_bucketed(&records, max_distance, &mut dsu);
    } else {
        union_pairs_naive(&records, max_distance, &mut dsu);
    }

    collect_groups(records, &mut dsu, include_singletons)
}

/// Compare every unordered pair.
fn union_pairs_naive(records: &[ImageRecord], max_distance: u32, dsu: &mut DisjointSet) {
    for i in 0..records.len() {
        for j in (i + 1)..records.len() {
            if records[i].fingerprint.distance(records[j].fingerprint) <= max_distance {
                dsu.union(i, j);
            }
        }
    }
}

/// Compare only pairs whose bucket keys could possibly be within threshold.
///
/// Records are bucketed by the top `BUCKET_BITS` fingerprint bits. Two
/// buckets are cross-compared only when their key distance is at most
/// `max_distance`; since the key distance is a lower bound on the full
/// distance, no within-threshold pair is ever skipped.
fn union_pairs_bucketed(records: &[ImageRecord], max_distance: u32, dsu: &mut DisjointSet) {
    let mut buckets: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (i, rec) in records.iter().enumerate() {
        buckets
            .entry(rec.fingerprint.prefix(BUCKET_BITS))
            .or_default()
            .push(i);
    }

    let buckets: Vec<(u64, Vec<usize>)> = buckets.into_iter().collect();
    for (bi, (key_a, members_a)) in buckets.iter().enumerate() {
        for (mi, &i) in members_a.iter().enumerate() {
            for &j in &members_a[mi + 1..] {
                if records[i].fingerprint.distance(records[j].fingerprint) <= max_distance {
                    dsu.union(i, j);
                }
            }
        }

        for (key_b, members_b) in &buckets[bi + 1..] {
            if (key_a ^ key_b).count_ones() > max_distance {
                continue;
            }
            for &i in members_a {
                for &j in members_b {
                    if records[i].fingerprint.distance(records[j].fingerprint) <= max_distance {
                        dsu.union(i, j);
                    }
                }
            }
        }
    }
}

/// Materialize the disjoint sets as groups, sorted by representative path.
fn collect_groups(
    records: Vec<ImageRecord>,
    dsu: &mut DisjointSet,
    include_singletons: bool,
) -> Vec<Group> {
    let roots: Vec<usize> = (0..records.len()).map(|i| dsu.find(i)).collect();

    // Records arrive path-sorted, so each set's members stay path-sorted.
    let mut sets: BTreeMap<usize, Vec<ImageRecord>> = BTreeMap::new();
    for (i, rec) in records.into_iter().enumerate() {
        sets.entry(roots[i]).or_default().push(rec);
    }

    let mut groups: Vec<Group> = sets
        .into_values()
        .filter(|members| include_singletons || members.len() > 1)
        .map(Group::new)
        .collect();
    groups.sort_by(|a, b| a.representative().path.cmp(&b.representative().path));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(path: &str, bits: u64, score: u64) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(path),
            fingerprint: Fingerprint::from_bits(bits),
            score: QualityScore::from_value(score),
        }
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_records(Vec::new(), DEFAULT_MAX_DISTANCE, false).is_empty());
    }

    #[test]
    fn identical_fingerprints_group_and_strangers_drop() {
        // Two identical images, one 40 bits away from both.
        let records = vec![
            rec("/album/a.jpg", 0, 10),
            rec("/album/b.jpg", 0, 20),
            rec("/album/far.jpg", 0xff_ff_ff_ff_ff, 30),
        ];
        let groups = group_records(records, 3, false);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0].representative().path, PathBuf::from("/album/b.jpg"));
    }

    #[test]
    fn transitive_closure_bridges_distant_pairs() {
        // A and C sit beyond the threshold but both reach B, so all three
        // land in one group. Distances: A-B=1, B-C=4, A-C=5, threshold 4.
        let a = rec("/p/a.jpg", 0b00000, 1);
        let b = rec("/p/b.jpg", 0b00001, 2);
        let c = rec("/p/c.jpg", 0b11111, 3);
        assert_eq!(a.fingerprint.distance(c.fingerprint), 5);
        assert_eq!(a.fingerprint.distance(b.fingerprint), 1);
        assert_eq!(b.fingerprint.distance(c.fingerprint), 4);

        let groups = group_records(vec![a, b, c], 4, false);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn threshold_is_inclusive() {
        let records = vec![rec("/x/a.jpg", 0b000, 1), rec("/x/b.jpg", 0b111, 1)];
        let groups = group_records(records, 3, false);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn threshold_zero_is_exact_matching() {
        let records = vec![
            rec("/x/a.jpg", 42, 1),
            rec("/x/b.jpg", 42, 2),
            rec("/x/c.jpg", 43, 3), // one bit off
        ];
        let groups = group_records(records, 0, false);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn singletons_partition_the_input_when_requested() {
        let records = vec![
            rec("/x/a.jpg", 0, 1),
            rec("/x/b.jpg", 1, 2),
            rec("/x/c.jpg", u64::MAX, 3),
        ];
        let groups = group_records(records.clone(), 1, true);
        let total: usize = groups.iter().map(Group::len).sum();
        assert_eq!(total, records.len());
        for r in &records {
            let appearances = groups
                .iter()
                .flat_map(|g| &g.members)
                .filter(|m| m.path == r.path)
                .count();
            assert_eq!(appearances, 1, "{} must appear exactly once", r.path.display());
        }
    }

    #[test]
    fn larger_threshold_never_splits_groups() {
        let records = vec![
            rec("/m/a.jpg", 0b0000_0000, 1),
            rec("/m/b.jpg", 0b0000_0011, 2),
            rec("/m/c.jpg", 0b0001_0011, 3),
            rec("/m/d.jpg", 0b1111_0000, 4),
            rec("/m/e.jpg", u64::MAX, 5),
        ];
        let tight = group_records(records.clone(), 2, true);
        let loose = group_records(records, 5, true);

        for g in &tight {
            let first = &g.members[0].path;
            let host = loose
                .iter()
                .find(|lg| lg.members.iter().any(|m| &m.path == first))
                .expect("member lost");
            for m in &g.members {
                assert!(
                    host.members.iter().any(|lm| lm.path == m.path),
                    "loosening the threshold split a group"
                );
            }
        }
    }

    #[test]
    fn grouping_ignores_input_order() {
        let mut records = vec![
            rec("/o/a.jpg", 0, 5),
            rec("/o/b.jpg", 1, 5),
            rec("/o/c.jpg", 3, 9),
            rec("/o/z.jpg", u64::MAX, 1),
        ];
        let forward = group_records(records.clone(), 2, false);
        records.reverse();
        let backward = group_records(records, 2, false);
        assert_eq!(forward, backward);
    }

    #[test]
    fn representative_prefers_score_then_path() {
        let records = vec![
            rec("/r/b.jpg", 0, 7),
            rec("/r/a.jpg", 1, 7), // equal score, smaller path wins
            rec("/r/c.jpg", 2, 3),
        ];
        let groups = group_records(records, 2, false);
        assert_eq!(groups[0].representative().path, PathBuf::from("/r/a.jpg"));
        // Non-representatives stay in path order.
        let rest: Vec<_> = groups[0].duplicates().iter().map(|m| &m.path).collect();
        assert_eq!(rest, vec![&PathBuf::from("/r/b.jpg"), &PathBuf::from("/r/c.jpg")]);
    }

    #[test]
    fn bucketed_scan_matches_naive_scan() {
        // Spread fingerprints across bucket-key prefixes, with some pairs
        // whose similarity crosses bucket boundaries.
        let mut records = Vec::new();
        for i in 0..200u64 {
            let base = (i % 7) << 56; // seven distinct top-byte buckets
            let noise = i.wrapping_mul(0x9e37_79b9_7f4a_7c15) & 0x00ff_ffff_ffff_ffff;
            records.push(rec(&format!("/s/{i:03}.jpg"), base | noise, i));
        }
        // A cross-bucket near pair: keys differ by 1 bit, bodies identical.
        records.push(rec("/s/x1.jpg", 0x01 << 56 | 0xabcd, 1000));
        records.push(rec("/s/x2.jpg", 0x03 << 56 | 0xabcd, 1001));

        let max_distance = 3;
        let mut sorted = records.clone();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let mut naive = DisjointSet::new(sorted.len());
        union_pairs_naive(&sorted, max_distance, &mut naive);
        let naive_groups = collect_groups(sorted.clone(), &mut naive, true);

        let mut bucketed = DisjointSet::new(sorted.len());
        union_pairs_bucketed(&sorted, max_distance, &mut bucketed);
        let bucketed_groups = collect_groups(sorted, &mut bucketed, true);

        assert_eq!(naive_groups, bucketed_groups);
        // And the cross-bucket pair really did land together.
        let host = bucketed_groups
            .iter()
            .find(|g| g.members.iter().any(|m| m.path == PathBuf::from("/s/x1.jpg")))
            .unwrap();
        assert!(host.members.iter().any(|m| m.path == PathBuf::from("/s/x2.jpg")));
    }
}
