//! Tokens produced by a `Lexer` or a scannerless sub-parse, and the pools the local lexing loop
//! passes between `CollectNewTokens` and the `Selector`.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// Identifies which terminal a token was requested for and at what input parameter.
///
/// Two keys with the same `terminal_index` but different `input_param` are distinct: the same
/// terminal can be asked to match under different parameterizations at the same position.
#[derive(Clone, Debug)]
pub struct TerminalKey<P> {
    pub terminal_index: u32,
    pub input_param: P,
}

impl<P: PartialEq> PartialEq for TerminalKey<P> {
    fn eq(&self, other: &Self) -> bool {
        self.terminal_index == other.terminal_index && self.input_param == other.input_param
    }
}
impl<P: Eq> Eq for TerminalKey<P> {}
impl<P: Hash> Hash for TerminalKey<P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.terminal_index.hash(state);
        self.input_param.hash(state);
    }
}

/// One candidate match for a terminal at a position: consumes `length` input elements, yields
/// `output_param` to whatever consumes the terminal, and carries an optional constructed
/// `result` for later use by `ConstructResult::terminal`.
///
/// Equality and hashing deliberately ignore `result`: two tokens that agree on `(length,
/// output_param)` are the same candidate for selection purposes, even if a lexer handed back two
/// differently-constructed results for it (the first one registered wins, matching the `Bin`
/// collapse rule in [`crate::item`]).
#[derive(Clone, Debug)]
pub struct Token<P, R> {
    pub length: usize,
    pub output_param: P,
    pub result: Option<R>,
}

impl<P: PartialEq, R> PartialEq for Token<P, R> {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.output_param == other.output_param
    }
}
impl<P: Eq, R> Eq for Token<P, R> {}
impl<P: Hash, R> Hash for Token<P, R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.length.hash(state);
        self.output_param.hash(state);
    }
}

/// A pool of tokens, keyed by which terminal/input-parameter combination they answer.
pub type Tokens<P, R> = HashMap<TerminalKey<P>, HashSet<Token<P, R>>>;

/// Union `new_tokens` into `tokens`, per key, as `computeBin` does at the end of every phase.
pub fn merge_tokens<P, R>(tokens: &mut Tokens<P, R>, new_tokens: Tokens<P, R>)
where
    P: Eq + Hash + Clone,
    R: Clone,
{
    for (key, set) in new_tokens {
        tokens.entry(key).or_insert_with(HashSet::new).extend(set);
    }
}
