//! The `Lexer` collaborator: supplies tokens for terminals that are not themselves defined by
//! grammar rules (or supplements the ones that are).

use std::collections::HashSet;

use crate::input::Input;
use crate::token::{TerminalKey, Token};

/// Produces candidate tokens for one terminal/input-parameter combination at one position.
///
/// Called by `CollectNewTokens` in addition to (not instead of) recursively parsing the
/// terminal's own rules, if it has any: a terminal can be both scannerless and lexer-backed, and
/// the local lexing loop unions whatever both sources produce.
pub trait Lexer<C, P, R> {
    fn parse(&self, input: &dyn Input<C>, position: usize, key: &TerminalKey<P>) -> HashSet<Token<P, R>>;
}

/// A `Lexer` that never matches anything, for terminals that are defined entirely by grammar
/// rules (scannerless) and have no lexer-level fallback.
pub struct NoTokens;

impl<C, P, R> Lexer<C, P, R> for NoTokens {
    fn parse(&self, _input: &dyn Input<C>, _position: usize, _key: &TerminalKey<P>) -> HashSet<Token<P, R>> {
        HashSet::new()
    }
}
