//! Bottom-up reconstruction of results from a finished chart.
//!
//! Walks the chart with an explicit work stack rather than recursion — the teacher's
//! `parser::CstIter` does the same for the same reason: a deeply nested parse can stack an
//! unbounded number of completed items at one position, and a recursive `eval` would blow the
//! native stack right where the input is most interesting.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use log::trace;

use crate::construct_result::{CompletedChild, CompletedRightHandSide, ItemKey};
use crate::grammar::Grammar;
use crate::input::Input;
use crate::item::{Chart, Item};
use crate::symbol::{is_nonterminal_ish, Symbol};

/// Memoization state for one [`ItemKey`]. `Computing` breaks cycles: an item that (directly or
/// through its children) reaches back to a key already on the current call stack resolves to
/// `None` for that particular occurrence, not globally — other, later occurrences of the same
/// key still get a fresh attempt once `Computing` has unwound (spec.md §7). `Done` caches the
/// final value so that sharing a sub-result across ambiguous parses costs one reconstruction, not
/// one per occurrence that needs it.
pub enum CacheState<R> {
    Computing,
    Done(Option<R>),
}

/// Persists across repeated [`construct`] calls on the same chart — once per distinct `out`
/// candidate at the top level, and recursively for every nonterminal-ish child encountered.
pub type Cache<P, R> = HashMap<ItemKey<P>, CacheState<R>>;

enum Task<E, P, R> {
    /// Find every item occurrence completing `key`; fall through to the cache if already
    /// (being) computed.
    StartKey(ItemKey<P>),
    /// One chosen occurrence of `key`; push its children's tasks, then a `CompleteKeyItem` to
    /// collect them back up once they've all landed on the `results` stack.
    StartKeyItem(ItemKey<P>, Item<E, P, R>),
    /// All of `item`'s children have pushed their result, in order, onto the `results` stack.
    CompleteKeyItem(ItemKey<P>, Item<E, P, R>),
    /// All occurrences of `key` have pushed their result onto the `results` stack.
    CompleteKey(ItemKey<P>, usize),
    /// A value ready to go, no further work needed to produce it.
    Push(Option<R>),
}

/// Reconstruct a result for `key` out of `chart`, driving an explicit work stack so that neither
/// recursion depth nor revisiting a key through ambiguous alternate derivations blows the native
/// call stack.
///
/// `treated_as_nonterminal` must be the same set the parse that produced `chart` used: it decides
/// whether a terminal's completed span is looked up in `chart` (grammar-recognized, scannerless)
/// or taken directly from the item's stored scan result (lexer-recognized).
pub fn construct<C, E, P, R>(
    grammar: &Grammar<C, E, P, R>,
    input: &dyn Input<C>,
    chart: &Chart<E, P, R>,
    treated_as_nonterminal: &HashSet<u32>,
    key: ItemKey<P>,
    cache: &mut Cache<P, R>,
) -> Option<R>
where
    E: Clone,
    P: Clone + Eq + Hash,
    R: Clone,
{
    let mut stack: Vec<Task<E, P, R>> = vec![Task::StartKey(key)];
    let mut results: Vec<Option<R>> = Vec::new();

    while let Some(task) = stack.pop() {
        match task {
            Task::StartKey(key) => {
                if let Some(state) = cache.get(&key) {
                    let value = match state {
                        CacheState::Computing => None,
                        CacheState::Done(v) => v.clone(),
                    };
                    results.push(value);
                    continue;
                }
                cache.insert(key.clone(), CacheState::Computing);

                let occurrences: Vec<Item<E, P, R>> = chart[key.to]
                    .iter()
                    .filter(|item| {
                        grammar.rules()[item.rule_index].lhs == key.symbol
                            && item.origin() == key.from
                            && item.in_param() == &key.in_param
                            && item.dot() == grammar.rules()[item.rule_index].rhs.len()
                            && item.out_param() == &key.out_param
                    })
                    .cloned()
                    .collect();

                trace!(
                    "StartKey {:?}..{:?} found {} occurrence(s)",
                    key.from,
                    key.to,
                    occurrences.len()
                );

                stack.push(Task::CompleteKey(key.clone(), occurrences.len()));
                for item in occurrences {
                    stack.push(Task::StartKeyItem(key.clone(), item));
                }
            }
            Task::StartKeyItem(key, item) => {
                let rule = &grammar.rules()[item.rule_index];
                let n = rule.rhs.len();
                stack.push(Task::CompleteKeyItem(key.clone(), item.clone()));

                for i in 0..n {
                    let child = item.child(i);
                    if is_nonterminal_ish(rule.rhs[i], treated_as_nonterminal) {
                        let child_key = ItemKey {
                            symbol: rule.rhs[i],
                            from: child.from,
                            to: child.to,
                            in_param: child.input,
                            out_param: child.output,
                        };
                        stack.push(Task::StartKey(child_key));
                    } else {
                        let child_key = ItemKey {
                            symbol: rule.rhs[i],
                            from: child.from,
                            to: child.to,
                            in_param: child.input,
                            out_param: child.output,
                        };
                        let value = grammar.construct_result().terminal(&child_key, child.result);
                        stack.push(Task::Push(value));
                    }
                }
            }
            Task::CompleteKeyItem(key, item) => {
                let rule = &grammar.rules()[item.rule_index];
                let n = rule.rhs.len();
                let mut children = Vec::with_capacity(n);
                for i in 0..n {
                    let value = results.pop().flatten();
                    let c = item.child(i);
                    children.push(CompletedChild {
                        result: value,
                        in_param: c.input,
                        out_param: c.output,
                        from: c.from,
                        to: c.to,
                    });
                }
                let rhs = CompletedRightHandSide { children };
                let value = grammar.construct_result().eval_rule(input, &key, &rhs);
                results.push(value);
            }
            Task::CompleteKey(key, count) => {
                let mut collected = Vec::with_capacity(count);
                for _ in 0..count {
                    collected.push(results.pop());
                }
                let present: Vec<R> = collected.into_iter().flatten().flatten().collect();
                let value = grammar.construct_result().merge(&key, present);
                cache.insert(key, CacheState::Done(value.clone()));
                results.push(value);
            }
            Task::Push(value) => {
                results.push(value);
            }
        }
    }

    results.pop().flatten()
}

/// Top-level `construct` (spec.md §4.6): collect every completed item recognizing `symbol` from
/// `0` (chart-relative) to `end` with `in == in_param`, group them by their distinct `out`
/// parameter, and reconstruct one result per group — each group is exactly one [`ItemKey`], so
/// reconstruction is just [`construct`] called once per distinct `out` value found.
pub fn construct_top<C, E, P, R>(
    grammar: &Grammar<C, E, P, R>,
    input: &dyn Input<C>,
    chart: &Chart<E, P, R>,
    treated_as_nonterminal: &HashSet<u32>,
    symbol: Symbol,
    in_param: P,
    end: usize,
    cache: &mut Cache<P, R>,
) -> HashMap<P, Option<R>>
where
    E: Clone,
    P: Clone + Eq + Hash,
    R: Clone,
{
    let mut out_params: HashSet<P> = HashSet::new();
    for item in &chart[end] {
        let rule = &grammar.rules()[item.rule_index];
        if rule.lhs == symbol && item.origin() == 0 && item.dot() == rule.rhs.len() && item.in_param() == &in_param {
            out_params.insert(item.out_param().clone());
        }
    }

    let mut results = HashMap::new();
    for out_param in out_params {
        let key = ItemKey {
            symbol,
            from: 0,
            to: end,
            in_param: in_param.clone(),
            out_param: out_param.clone(),
        };
        let value = construct(grammar, input, chart, treated_as_nonterminal, key, cache);
        results.insert(out_param, value);
    }
    results
}
