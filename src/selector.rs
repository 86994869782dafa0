//! The `Selector` collaborator: arbitrates which of the overlapping candidate tokens at a
//! position are actually admitted into the chart.

use crate::token::Tokens;

/// Picks a subset of `from` to admit, given what has already been admitted at this position in
/// earlier phases of the same `computeBin` call.
///
/// Called once per phase of the local lexing loop (see `computeBin` in [`crate::engine`]) with
/// the full accumulated candidate pool, not just what's new this phase — the returned set must
/// be a superset of `already_selected` for phase-to-phase monotonicity to hold (property 6 of
/// the engine's testable invariants).
pub trait Selector<P, R> {
    fn select(&self, from: &Tokens<P, R>, already_selected: &Tokens<P, R>) -> Tokens<P, R>;
}

/// A `Selector` that admits every candidate immediately: no ambiguity arbitration, useful for
/// grammars with no overlapping terminals and as a baseline in tests.
pub struct SelectAll;

impl<P, R> Selector<P, R> for SelectAll
where
    P: Clone + Eq + std::hash::Hash,
    R: Clone,
{
    fn select(&self, from: &Tokens<P, R>, _already_selected: &Tokens<P, R>) -> Tokens<P, R> {
        from.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{TerminalKey, Token};
    use std::collections::{HashMap, HashSet};

    #[test]
    fn select_all_admits_everything_unconditionally() {
        let mut from: Tokens<u32, ()> = HashMap::new();
        let key = TerminalKey {
            terminal_index: 0,
            input_param: 0u32,
        };
        let mut set = HashSet::new();
        set.insert(Token {
            length: 1,
            output_param: 1,
            result: None,
        });
        from.insert(key.clone(), set);

        let selector = SelectAll;
        let selected = selector.select(&from, &HashMap::new());
        assert_eq!(selected.get(&key).unwrap().len(), 1);
    }
}
