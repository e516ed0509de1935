use super::slab::{KeySlab, SlabRef};
use crate::engine::OccurrenceManager;
use crate::{Literal, Var};

/// Selects which clauses of a residual formula take part in its cache key.
///
/// Clauses left out are entirely determined by the component's variables and
/// the input formula, so the key stays a sound identity.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StoreMode {
    /// Encode every unsatisfied clause incident on the component.
    All,
    /// Skip clauses of the input formula of length at most two.
    NoBinary,
    /// Skip clauses with no falsified literal.
    NotTouched,
}

/// The fixed-size prefix of a residual key: the dimensions of the encoded
/// sub-formula and the byte width chosen for each integer family.
///
/// Header equality is checked before the (more expensive) byte comparison of
/// the payloads.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct KeyHeader {
    pub len: u32,
    pub n_vars: u32,
    pub n_lits: u32,
    pub n_clauses: u32,
    pub bytes_var: u8,
    pub bytes_lit: u8,
    pub bytes_hist: u8,
}

/// A canonical byte encoding of a residual sub-formula, the sole source of
/// cache identity.
pub(crate) struct ResidualKey {
    pub header: KeyHeader,
    pub data: SlabRef,
}

/// Builds residual keys: the canonical byte encoding of the sub-formula
/// induced by a component under the current assignment.
///
/// The layout is fixed: the component's variables (global indices, sorted),
/// then the clause-length histogram as `(count, size)` pairs, then the
/// clauses themselves, grouped by length and sorted inside each group,
/// each literal written as `local_var_index << 1 | sign`. Every integer
/// family uses the smallest of 1, 2 or 4 bytes that fits its largest value.
pub struct BucketManager {
    slab: KeySlab,
    mode: StoreMode,
    mark: Vec<bool>,
    map_var: Vec<u32>,
}

impl BucketManager {
    /// Builds a bucket manager for a formula with the given dimensions.
    #[must_use]
    pub fn new(n_vars: usize, n_clauses: usize, mode: StoreMode) -> Self {
        Self {
            slab: KeySlab::new(),
            mode,
            mark: vec![false; n_clauses],
            map_var: vec![0; n_vars],
        }
    }

    /// Builds the key of the residual formula induced by `component`.
    ///
    /// The unsatisfied clauses incident on the component are collected
    /// exactly once through the occurrence lists, duplicates are dropped,
    /// and the canonical layout described on the type is emitted.
    pub(crate) fn build_key(
        &mut self,
        component: &[Var],
        occ: &OccurrenceManager,
    ) -> ResidualKey {
        let mut vars = component.to_vec();
        vars.sort_unstable();
        for (i, &v) in vars.iter().enumerate() {
            self.map_var[v] = u32::try_from(i).expect("component size overflows u32");
        }

        let mut clauses: Vec<Vec<u32>> = Vec::new();
        let mut marked = Vec::new();
        for &v in &vars {
            for polarity in [true, false] {
                let l = Literal::from_var(v, polarity);
                for &idx in occ.occ_list(l) {
                    let idx = idx as usize;
                    if self.mark[idx] {
                        continue;
                    }
                    if self.mode == StoreMode::NotTouched && occ.n_unsat(idx) == 0 {
                        continue;
                    }
                    if self.mode == StoreMode::NoBinary && occ.clause(idx).len() <= 2 {
                        continue;
                    }
                    self.mark[idx] = true;
                    marked.push(idx);
                    let mut residual: Vec<u32> = occ
                        .clause(idx)
                        .iter()
                        .filter(|l| !occ.var_is_assigned(l.var_index()))
                        .map(|l| (self.map_var[l.var_index()] << 1) | u32::from(!l.polarity()))
                        .collect();
                    residual.sort_unstable();
                    clauses.push(residual);
                }
            }
        }
        for idx in marked {
            self.mark[idx] = false;
        }

        clauses.sort_unstable_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        clauses.dedup();

        let mut hist: Vec<(u32, u32)> = Vec::new();
        for c in &clauses {
            let size = u32::try_from(c.len()).expect("clause length overflows u32");
            match hist.last_mut() {
                Some((count, s)) if *s == size => *count += 1,
                _ => hist.push((1, size)),
            }
        }
        let n_lits: usize = clauses.iter().map(Vec::len).sum();

        let bytes_var = int_width(u32::try_from(*vars.last().expect("a non-empty component"))
            .expect("variable index overflows u32") + 1);
        let bytes_lit = int_width(
            u32::try_from((vars.len() + 2) << 1).expect("component size overflows u32"),
        );
        let bytes_hist = int_width(
            hist.iter()
                .map(|(count, size)| (*count).max(*size))
                .max()
                .unwrap_or(0),
        );

        let len = usize::from(bytes_var) * vars.len()
            + 2 * usize::from(bytes_hist) * hist.len()
            + usize::from(bytes_lit) * n_lits;
        let data = self.slab.alloc(len);
        let buf = self.slab.bytes_mut(data, len);
        let mut pos = 0;
        for &v in &vars {
            write_int(
                buf,
                &mut pos,
                u32::try_from(v).expect("variable index overflows u32"),
                bytes_var,
            );
        }
        for &(count, size) in &hist {
            write_int(buf, &mut pos, count, bytes_hist);
            write_int(buf, &mut pos, size, bytes_hist);
        }
        for c in &clauses {
            for &encoded in c {
                write_int(buf, &mut pos, encoded, bytes_lit);
            }
        }
        debug_assert_eq!(len, pos);

        ResidualKey {
            header: KeyHeader {
                len: u32::try_from(len).expect("key length overflows u32"),
                n_vars: u32::try_from(vars.len()).expect("component size overflows u32"),
                n_lits: u32::try_from(n_lits).expect("literal count overflows u32"),
                n_clauses: u32::try_from(clauses.len()).expect("clause count overflows u32"),
                bytes_var,
                bytes_lit,
                bytes_hist,
            },
            data,
        }
    }

    pub(crate) fn key_bytes(&self, key: &ResidualKey) -> &[u8] {
        self.slab.bytes(key.data, key.header.len as usize)
    }

    pub(crate) fn block_bytes(&self, data: SlabRef, len: usize) -> &[u8] {
        self.slab.bytes(data, len)
    }

    pub(crate) fn release_key(&mut self, key: ResidualKey) {
        self.slab.release(key.data, key.header.len as usize);
    }

    pub(crate) fn release_block(&mut self, data: SlabRef, len: usize) {
        self.slab.release(data, len);
    }

    /// Returns the total number of bytes reserved for key storage.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.slab.allocated_bytes()
    }
}

fn int_width(v: u32) -> u8 {
    if v < 1 << 8 {
        1
    } else if v < 1 << 16 {
        2
    } else {
        4
    }
}

fn write_int(buf: &mut [u8], pos: &mut usize, v: u32, width: u8) {
    let bytes = v.to_le_bytes();
    buf[*pos..*pos + usize::from(width)].copy_from_slice(&bytes[..usize::from(width)]);
    *pos += usize::from(width);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lits(dimacs: &[isize]) -> Vec<Literal> {
        dimacs.iter().map(|n| Literal::from(*n)).collect()
    }

    fn occ_manager(n_vars: usize, clauses: &[&[isize]]) -> OccurrenceManager {
        OccurrenceManager::new(clauses.iter().map(|c| lits(c)).collect(), n_vars)
    }

    fn key_of(bm: &mut BucketManager, component: &[Var], occ: &OccurrenceManager) -> Vec<u8> {
        let key = bm.build_key(component, occ);
        let bytes = bm.key_bytes(&key).to_vec();
        bm.release_key(key);
        bytes
    }

    #[test]
    fn test_int_width() {
        assert_eq!(1, int_width(0));
        assert_eq!(1, int_width(255));
        assert_eq!(2, int_width(256));
        assert_eq!(2, int_width(65535));
        assert_eq!(4, int_width(65536));
    }

    #[test]
    fn test_key_is_order_independent() {
        let occ = occ_manager(3, &[&[1, 2], &[-2, 3]]);
        let mut bm = BucketManager::new(3, 2, StoreMode::All);
        let a = key_of(&mut bm, &[0, 1, 2], &occ);
        let b = key_of(&mut bm, &[2, 0, 1], &occ);
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_distinguishes_formulas() {
        let occ1 = occ_manager(2, &[&[1, 2]]);
        let occ2 = occ_manager(2, &[&[1, -2]]);
        let mut bm = BucketManager::new(2, 1, StoreMode::All);
        assert_ne!(key_of(&mut bm, &[0, 1], &occ1), key_of(&mut bm, &[0, 1], &occ2));
    }

    #[test]
    fn test_key_distinguishes_global_variables() {
        let occ = occ_manager(4, &[&[1, 2], &[3, 4]]);
        let mut bm = BucketManager::new(4, 2, StoreMode::All);
        assert_ne!(key_of(&mut bm, &[0, 1], &occ), key_of(&mut bm, &[2, 3], &occ));
    }

    #[test]
    fn test_duplicate_clauses_collapse() {
        let occ1 = occ_manager(2, &[&[1, 2], &[2, 1]]);
        let occ2 = occ_manager(2, &[&[1, 2]]);
        let mut bm = BucketManager::new(2, 2, StoreMode::All);
        assert_eq!(key_of(&mut bm, &[0, 1], &occ1), key_of(&mut bm, &[0, 1], &occ2));
    }

    #[test]
    fn test_layout_of_a_small_key() {
        let occ = occ_manager(2, &[&[1, -2]]);
        let mut bm = BucketManager::new(2, 1, StoreMode::All);
        let key = bm.build_key(&[0, 1], &occ);
        assert_eq!(2, key.header.n_vars);
        assert_eq!(1, key.header.n_clauses);
        assert_eq!(2, key.header.n_lits);
        // vars 0 1, histogram (1, 2), clause [0, 3]
        assert_eq!(&[0, 1, 1, 2, 0, 3], bm.key_bytes(&key));
        bm.release_key(key);
    }

    #[test]
    fn test_not_touched_mode_skips_untouched() {
        let occ = occ_manager(2, &[&[1, 2]]);
        let mut bm = BucketManager::new(2, 1, StoreMode::NotTouched);
        let key = bm.build_key(&[0, 1], &occ);
        // no falsified literal anywhere: only the variables are encoded
        assert_eq!(0, key.header.n_clauses);
        assert_eq!(&[0, 1], bm.key_bytes(&key));
        bm.release_key(key);
    }
}
