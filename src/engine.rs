//! Chart fixpoint engine (`Predict`/`Complete`/`Scan`/`Pi`), the local lexing loop
//! (`computeBin`/`CollectNewTokens`), and the `parse` driver that ties them together.
//!
//! Chart positions in this module are always relative to the enclosing parse's `start_position`
//! (bin 0 is the position the symbol was asked to match from); absolute input positions are
//! recovered as `start_position + k` wherever `Input` or a sub-parser needs one.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use log::{debug, trace};

use crate::construct_result::ItemKey;
use crate::grammar::{Grammar, Rule, Semantics, TerminalParseMode};
use crate::input::Input;
use crate::item::{Bin, Chart, Item};
use crate::result::{self, Cache};
use crate::symbol::{is_nonterminal_ish, Symbol};
use crate::token::{merge_tokens, TerminalKey, Token, Tokens};

/// Outcome of a top-level or recursive `parse` call (spec.md §6).
#[derive(Debug, Clone)]
pub enum ParseResult<P, R> {
    /// No recognition of the initial symbol anywhere in the chart.
    Failed {
        /// Furthest chart position (absolute) that had a non-empty bin, best-effort error locus.
        position: usize,
    },
    /// Recognized with the given length; `results` maps every output parameter the recognition
    /// produced to its (possibly absent) constructed result.
    Success {
        length: usize,
        results: HashMap<P, Option<R>>,
    },
}

/// `Predict`: for every item in bin `k` whose next symbol is treated as a nonterminal, seed the
/// initial items of every rule defining that symbol. Never grows the chart past bin `k`.
fn predict<C, E, P, R>(
    grammar: &Grammar<C, E, P, R>,
    bins: &mut Chart<E, P, R>,
    treated_as_nonterminal: &HashSet<u32>,
    k: usize,
    snapshot: &[Item<E, P, R>],
) -> bool
where
    E: Clone,
    P: Clone + Eq + Hash,
{
    let mut changed = false;
    for item in snapshot {
        let rule = &grammar.rules()[item.rule_index];
        if item.dot() == rule.rhs.len() {
            continue;
        }
        let next_symbol = rule.rhs[item.dot()];
        if !is_nonterminal_ish(next_symbol, treated_as_nonterminal) {
            continue;
        }
        for &rule_index in grammar.rules_of(next_symbol) {
            let predicted_rule = &grammar.rules()[rule_index];
            if let Some(new_item) = predicted_rule.initial_item(rule_index, k, item.next_param().clone()) {
                if bins[k].insert(new_item) {
                    changed = true;
                }
            }
        }
    }
    changed
}

/// `Complete`: for every completed item in bin `k`, advance every item waiting for its `lhs` at
/// its origin bin. Never grows the chart past bin `k`.
fn complete<C, E, P, R>(grammar: &Grammar<C, E, P, R>, bins: &mut Chart<E, P, R>, k: usize, snapshot: &[Item<E, P, R>]) -> bool
where
    E: Clone,
    P: Clone + Eq + Hash,
    R: Clone,
{
    let mut changed = false;
    for item in snapshot {
        let rule = &grammar.rules()[item.rule_index];
        if item.dot() != rule.rhs.len() {
            continue;
        }
        let lhs = rule.lhs;
        let p_in = item.in_param().clone();
        let p_out = item.out_param().clone();
        let origin = item.origin();

        let waiting: Vec<Item<E, P, R>> = bins[origin]
            .iter()
            .filter(|candidate| {
                let candidate_rule = &grammar.rules()[candidate.rule_index];
                candidate.dot() < candidate_rule.rhs.len()
                    && candidate_rule.rhs[candidate.dot()] == lhs
                    && candidate.next_param() == &p_in
            })
            .cloned()
            .collect();

        for waiting_item in &waiting {
            let waiting_rule = &grammar.rules()[waiting_item.rule_index];
            if let Some(new_item) = waiting_rule.next_item(waiting_item, p_out.clone(), None, k) {
                if bins[k].insert(new_item) {
                    changed = true;
                }
            }
        }
    }
    changed
}

/// `Scan`: for every item in bin `k` waiting on a terminal that is not being treated as a
/// nonterminal, advance it with every selected token registered for that terminal/parameter
/// pair. May grow the chart forward (never backward, never into bin `k` itself).
fn scan<C, E, P, R>(
    grammar: &Grammar<C, E, P, R>,
    bins: &mut Chart<E, P, R>,
    tokens: &Tokens<P, R>,
    treated_as_nonterminal: &HashSet<u32>,
    k: usize,
    snapshot: &[Item<E, P, R>],
) -> bool
where
    E: Clone,
    P: Clone + Eq + Hash,
    R: Clone,
{
    let mut changed = false;
    for item in snapshot {
        let rule = &grammar.rules()[item.rule_index];
        if item.dot() == rule.rhs.len() {
            continue;
        }
        let next_symbol = rule.rhs[item.dot()];
        if is_nonterminal_ish(next_symbol, treated_as_nonterminal) {
            continue;
        }
        let terminal_index = match next_symbol {
            Symbol::Terminal(t) => t,
            Symbol::Nonterminal(_) => unreachable!("is_nonterminal_ish already excluded plain nonterminals"),
        };
        let key = TerminalKey {
            terminal_index,
            input_param: item.next_param().clone(),
        };
        let Some(candidates) = tokens.get(&key) else {
            continue;
        };
        for token in candidates {
            let to = k + token.length;
            while bins.len() <= to {
                bins.push(Bin::new());
            }
            if let Some(new_item) = rule.next_item(item, token.output_param.clone(), token.result.clone(), to) {
                if bins[to].insert(new_item) {
                    changed = true;
                }
            }
        }
    }
    changed
}

/// `Pi`: run `Predict`/`Complete`/`Scan` over bin `k` to a fixpoint, each pass iterating a
/// snapshot of the bin taken at the start of that pass (spec.md §4.2).
fn pi<C, E, P, R>(
    grammar: &Grammar<C, E, P, R>,
    bins: &mut Chart<E, P, R>,
    tokens: &Tokens<P, R>,
    treated_as_nonterminal: &HashSet<u32>,
    k: usize,
) -> bool
where
    E: Clone,
    P: Clone + Eq + Hash,
    R: Clone,
{
    let mut any_change = false;
    loop {
        let snapshot: Vec<Item<E, P, R>> = bins[k].iter().cloned().collect();
        let predicted = predict(grammar, bins, treated_as_nonterminal, k, &snapshot);
        let completed = complete(grammar, bins, k, &snapshot);
        let scanned = scan(grammar, bins, tokens, treated_as_nonterminal, k, &snapshot);
        let changed = predicted || completed || scanned;
        any_change = any_change || changed;
        if !changed {
            trace!("Pi(bin {}) reached fixpoint with {} items", k, bins[k].len());
            return any_change;
        }
    }
}

/// Candidate `(terminal_index, input_param)` pairs bin `k` is currently waiting to scan: every
/// unfinished item whose next symbol is a terminal not treated as a nonterminal.
fn scan_candidates<E, P, R>(rules: &[Rule<E, P>], bin: &Bin<E, P, R>, treated_as_nonterminal: &HashSet<u32>) -> HashSet<(u32, P)>
where
    P: Clone + Eq + Hash,
{
    let mut candidates = HashSet::new();
    for item in bin {
        let rule = &rules[item.rule_index];
        if item.dot() == rule.rhs.len() {
            continue;
        }
        if let Symbol::Terminal(t) = rule.rhs[item.dot()] {
            if !treated_as_nonterminal.contains(&t) {
                candidates.insert((t, item.next_param().clone()));
            }
        }
    }
    candidates
}

/// `CollectNewTokens`: for every `(terminal, input_param)` bin `k` is waiting on and `tokens`
/// hasn't already got an entry for, recursively sub-parse the terminal (if it has grammar rules
/// of its own) and ask the lexer, unioning whatever both sources produce. Always inserts an
/// entry for an explored key, even an empty one, so a key already explored this bin is never
/// re-queried (spec.md §4.3).
fn collect_new_tokens<C, E, P, R>(
    grammar: &Grammar<C, E, P, R>,
    input: &dyn Input<C>,
    bin: &Bin<E, P, R>,
    treated_as_nonterminal: &HashSet<u32>,
    k: usize,
    start_position: usize,
    tokens: &Tokens<P, R>,
) -> Tokens<P, R>
where
    C: Clone,
    E: Clone,
    P: Clone + Eq + Hash,
    R: Clone,
{
    let mut new_tokens: Tokens<P, R> = HashMap::new();
    for (terminal_index, input_param) in scan_candidates(grammar.rules(), bin, treated_as_nonterminal) {
        let key = TerminalKey {
            terminal_index,
            input_param: input_param.clone(),
        };
        if tokens.contains_key(&key) {
            continue;
        }

        let mut found: HashSet<Token<P, R>> = HashSet::new();

        if !grammar.rules_of(Symbol::Terminal(terminal_index)).is_empty() {
            let mut sub_treated = treated_as_nonterminal.clone();
            sub_treated.insert(terminal_index);
            let sub_result = parse_inner(
                grammar,
                input,
                Symbol::Terminal(terminal_index),
                input_param.clone(),
                start_position + k,
                &sub_treated,
            );
            match grammar.terminal_parse_mode(terminal_index) {
                None | Some(TerminalParseMode::LongestMatch) => {
                    if let ParseResult::Success { length, results } = sub_result {
                        for (output_param, result) in results {
                            found.insert(Token {
                                length,
                                output_param,
                                result,
                            });
                        }
                    }
                }
                Some(TerminalParseMode::AndNext) => {
                    if let ParseResult::Success { results, .. } = sub_result {
                        for (output_param, result) in results {
                            found.insert(Token {
                                length: 0,
                                output_param,
                                result,
                            });
                        }
                    }
                }
                Some(TerminalParseMode::NotNext(negative_param)) => {
                    if let ParseResult::Failed { .. } = sub_result {
                        found.insert(Token {
                            length: 0,
                            output_param: negative_param.clone(),
                            result: None,
                        });
                    }
                }
            }
        }

        found.extend(grammar.lexer().parse(input, start_position + k, &key));

        trace!(
            "CollectNewTokens: terminal {} at position {} found {} token(s)",
            terminal_index,
            start_position + k,
            found.len()
        );
        new_tokens.insert(key, found);
    }
    new_tokens
}

/// Restrict `new_tokens` to those some item waiting in `bin` can actually consume
/// (`Semantics::Modified`, spec.md §4.3). Keeps every key (so exploration is still recorded),
/// but may empty out its token set.
fn filter_new_tokens<E, P, R>(rules: &[Rule<E, P>], bin: &Bin<E, P, R>, new_tokens: Tokens<P, R>) -> Tokens<P, R>
where
    E: Clone,
    P: Clone + Eq + Hash,
    R: Clone,
{
    let mut filtered = HashMap::new();
    for (key, candidates) in new_tokens {
        let waiting: Vec<&Item<E, P, R>> = bin
            .iter()
            .filter(|item| {
                let rule = &rules[item.rule_index];
                item.dot() < rule.rhs.len()
                    && rule.rhs[item.dot()] == Symbol::Terminal(key.terminal_index)
                    && item.next_param() == &key.input_param
            })
            .collect();

        let admitted: HashSet<Token<P, R>> = candidates
            .into_iter()
            .filter(|token| {
                waiting
                    .iter()
                    .any(|item| rules[item.rule_index].has_next_item(item, &token.output_param))
            })
            .collect();
        filtered.insert(key, admitted);
    }
    filtered
}

/// `computeBin`: interleave the chart fixpoint with local lexing at position `k` until neither
/// produces change, then perform one final `Scan` with everything selected so far (spec.md
/// §4.3). The loop skips running `Pi` before the first token collection, per the Open Question
/// decision recorded in `SPEC_FULL.md` §Open Questions(1).
fn compute_bin<C, E, P, R>(
    grammar: &Grammar<C, E, P, R>,
    input: &dyn Input<C>,
    bins: &mut Chart<E, P, R>,
    treated_as_nonterminal: &HashSet<u32>,
    k: usize,
    start_position: usize,
) where
    C: Clone,
    E: Clone,
    P: Clone + Eq + Hash,
    R: Clone,
{
    let mut tokens: Tokens<P, R> = HashMap::new();
    let mut already_selected: Tokens<P, R> = HashMap::new();
    let mut first_iteration = true;

    loop {
        let pi_changed = if first_iteration {
            false
        } else {
            pi(grammar, bins, &already_selected, treated_as_nonterminal, k)
        };
        first_iteration = false;

        let new_tokens_raw = collect_new_tokens(grammar, input, &bins[k], treated_as_nonterminal, k, start_position, &tokens);
        let produced_new = !new_tokens_raw.is_empty();
        let new_tokens = match grammar.semantics() {
            Semantics::Paper => new_tokens_raw,
            Semantics::Modified => filter_new_tokens(grammar.rules(), &bins[k], new_tokens_raw),
        };
        merge_tokens(&mut tokens, new_tokens);

        let before = already_selected.len();
        already_selected = grammar.selector().select(&tokens, &already_selected);
        debug!(
            "bin {} selector phase: pool {} keys, selected {} -> {} keys",
            k,
            tokens.len(),
            before,
            already_selected.len()
        );

        if !pi_changed && !produced_new {
            break;
        }
    }

    let snapshot: Vec<Item<E, P, R>> = bins[k].iter().cloned().collect();
    scan(grammar, bins, &already_selected, treated_as_nonterminal, k, &snapshot);
}

/// Public entry point (spec.md §4.4): parse `initial_symbol` from `start_position` in `input`,
/// fed `initial_param`. `start_position` is an absolute input position; internally the chart is
/// indexed relative to it.
pub fn parse<C, E, P, R>(
    grammar: &Grammar<C, E, P, R>,
    input: &dyn Input<C>,
    initial_symbol: Symbol,
    initial_param: P,
    start_position: usize,
) -> ParseResult<P, R>
where
    C: Clone,
    E: Clone,
    P: Clone + Eq + Hash,
    R: Clone,
{
    parse_inner(grammar, input, initial_symbol, initial_param, start_position, &HashSet::new())
}

/// Recursive worker behind [`parse`]: `inherited` is the caller's `treated_as_nonterminal` set
/// (grows only downward through recursion, spec.md §4.5).
fn parse_inner<C, E, P, R>(
    grammar: &Grammar<C, E, P, R>,
    input: &dyn Input<C>,
    initial_symbol: Symbol,
    initial_param: P,
    start_position: usize,
    inherited: &HashSet<u32>,
) -> ParseResult<P, R>
where
    C: Clone,
    E: Clone,
    P: Clone + Eq + Hash,
    R: Clone,
{
    let mut treated_as_nonterminal = inherited.clone();
    if let Symbol::Terminal(idx) = initial_symbol {
        treated_as_nonterminal.insert(idx);
    }

    let mut bins: Chart<E, P, R> = vec![Bin::new()];
    for &rule_index in grammar.rules_of(initial_symbol) {
        let rule = &grammar.rules()[rule_index];
        if let Some(item) = rule.initial_item(rule_index, 0, initial_param.clone()) {
            bins[0].insert(item);
        }
    }

    let mut i = 0;
    while i < bins.len() {
        compute_bin(grammar, input, &mut bins, &treated_as_nonterminal, i, start_position);
        i += 1;
    }

    let recognized_at = (0..bins.len()).rev().find(|&i| {
        bins[i].iter().any(|item| {
            let rule = &grammar.rules()[item.rule_index];
            item.origin() == 0
                && rule.lhs == initial_symbol
                && item.dot() == rule.rhs.len()
                && item.in_param() == &initial_param
        })
    });

    match recognized_at {
        Some(length) => {
            let mut cache: Cache<P, R> = Cache::new();
            let results = result::construct_top(
                grammar,
                input,
                &bins,
                &treated_as_nonterminal,
                initial_symbol,
                initial_param,
                length,
                &mut cache,
            );
            trace!("parse succeeded: length {} with {} output alternative(s)", length, results.len());
            ParseResult::Success { length, results }
        }
        None => {
            let furthest = bins.iter().rposition(|bin| !bin.is_empty()).unwrap_or(0);
            ParseResult::Failed {
                position: start_position + furthest,
            }
        }
    }
}
