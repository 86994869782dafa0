//! The `ConstructResult` collaborator and the types result construction hands it.
//!
//! Kept in its own module, separate from [`crate::result`], so that a grammar can be built
//! (`grammar.rs` needs the trait for its builder) without pulling in the traversal machine that
//! implements it.

use crate::input::Input;
use crate::symbol::Symbol;

/// Identifies every completed item occurrence that reconstructs to the same result: a symbol
/// recognized over `[from, to)` with the given `in`/`out` parameters — deliberately *not*
/// keyed on which rule produced it, since two different rules for the same symbol can complete
/// at the same span and parameters (ambiguity), and `merge` is exactly how those are folded
/// into one value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ItemKey<P> {
    pub symbol: Symbol,
    pub from: usize,
    pub to: usize,
    pub in_param: P,
    pub out_param: P,
}

/// One child of a completed right-hand side, as handed to `eval_rule`: its own result (already
/// reconstructed, or `None` if that subtree failed to produce one) plus the span and parameters
/// it was found at.
#[derive(Clone, Debug)]
pub struct CompletedChild<P, R> {
    pub result: Option<R>,
    pub in_param: P,
    pub out_param: P,
    pub from: usize,
    pub to: usize,
}

/// The fully reconstructed right-hand side of one completed item occurrence, in left-to-right
/// order, passed to `ConstructResult::eval_rule`.
pub struct CompletedRightHandSide<P, R> {
    pub children: Vec<CompletedChild<P, R>>,
}

/// User-supplied reconstruction logic: turns completed chart structure back into the caller's own
/// result type.
///
/// The three methods mirror the three places a result can come from: a completed grammar rule, a
/// scanned/lexer-supplied token, and an ambiguous position where more than one item occurrence
/// completed with the same `(rule, span, in, out)` key and has to be folded into one value.
pub trait ConstructResult<C, P, R> {
    /// Build the result for one completed rule application from its already-reconstructed
    /// children.
    fn eval_rule(&self, input: &dyn Input<C>, key: &ItemKey<P>, completed: &CompletedRightHandSide<P, R>) -> Option<R>;

    /// Build the result for a terminal directly scanned by the lexer (or by a scannerless
    /// sub-parse); `result` is whatever the `Token`/sub-parse already carried.
    fn terminal(&self, key: &ItemKey<P>, result: Option<R>) -> Option<R>;

    /// Fold together the results of more than one item occurrence that completed at the same key
    /// (ambiguity).
    fn merge(&self, key: &ItemKey<P>, results: Vec<R>) -> Option<R>;
}
