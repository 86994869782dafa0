//! Earley items and the bins/chart that hold them.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// One Earley item: a partially (or fully) recognized rule instance, together with the
/// parameter trail `eval` produced while building it.
///
/// `values` is laid out `[in(L), in(R1), out(R1), in(R2), out(R2), ..., in(R_dot), out(R_dot)]`
/// and grows by two entries per consumed symbol; on completion (`dot == rhs.len()`) one final
/// `out(L)` entry is appended. `results` holds only the scanned/constructed results of the
/// symbols consumed so far (terminals and, once built, nonterminal sub-results are *not* stored
/// here — they are recomputed during result construction, see [`crate::result`]).
#[derive(Clone, Debug)]
pub struct Item<E, P, R> {
    pub rule_index: usize,
    pub env: E,
    pub values: Vec<P>,
    pub results: Vec<Option<R>>,
    pub indices: Vec<usize>,
}

/// One consumed right-hand-side symbol of an item, as seen from `Complete`/`Scan`/result
/// construction: `indices[i]` is where it started, `indices[i+1]` is where it ended.
pub struct Child<P, R> {
    pub input: P,
    pub output: P,
    pub result: Option<R>,
    pub from: usize,
    pub to: usize,
}

impl<E, P: Clone, R: Clone> Item<E, P, R> {
    /// Position this item started at.
    pub fn origin(&self) -> usize {
        self.indices[0]
    }

    /// Number of right-hand-side symbols consumed so far.
    pub fn dot(&self) -> usize {
        self.indices.len() - 1
    }

    /// `in` parameter of the item's left-hand symbol.
    pub fn in_param(&self) -> &P {
        &self.values[0]
    }

    /// Parameter the next symbol to be parsed (if any) is invoked with, or — once the item is
    /// completed — the `out` parameter of the left-hand symbol.
    pub fn next_param(&self) -> &P {
        self.values.last().expect("values is never empty")
    }

    /// `out` parameter of the left-hand symbol. Only meaningful once the item is completed;
    /// identical storage location to `next_param`.
    pub fn out_param(&self) -> &P {
        self.next_param()
    }

    /// Position reached after consuming the `i`-th right-hand-side symbol (`child(i).to`).
    pub fn child(&self, i: usize) -> Child<P, R> {
        Child {
            input: self.values[2 * i + 1].clone(),
            output: self.values[2 * i + 2].clone(),
            result: self.results[i].clone(),
            from: self.indices[i],
            to: self.indices[i + 1],
        }
    }
}

impl<E, P: PartialEq, R> PartialEq for Item<E, P, R> {
    /// Items compare equal by `(rule_index, values, indices)` only: `env` and `results` are
    /// deliberately excluded so that distinct environment states or stored terminal results
    /// collapse into one chart entry, exactly the classical Earley dedup rule.
    fn eq(&self, other: &Self) -> bool {
        self.rule_index == other.rule_index
            && self.values == other.values
            && self.indices == other.indices
    }
}
impl<E, P: Eq, R> Eq for Item<E, P, R> {}
impl<E, P: Hash, R> Hash for Item<E, P, R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rule_index.hash(state);
        self.values.hash(state);
        self.indices.hash(state);
    }
}

/// Set of items whose dot currently sits at one chart position. Insertion is "first writer
/// wins": if an equal item (by `(rule_index, values, indices)`) is already present, its `env`
/// and `results` are kept rather than overwritten.
pub type Bin<E, P, R> = HashSet<Item<E, P, R>>;

/// Chart positions, indexed by buffer position minus the parse's `start_position`.
pub type Chart<E, P, R> = Vec<Bin<E, P, R>>;
