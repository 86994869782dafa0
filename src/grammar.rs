//! Grammar model: rules, their evaluation functions, and the external collaborators (`Lexer`,
//! `Selector`, `ConstructResult`) a grammar is built around.

use std::collections::HashMap;
use std::fmt;

use log::trace;

use crate::construct_result::ConstructResult;
use crate::item::Item;
use crate::lexer::Lexer;
use crate::selector::Selector;
use crate::symbol::Symbol;

/// A grammar rule `lhs ⇒ rhs`, together with the per-instantiation evaluator that threads
/// parameters through it.
///
/// `eval(env, k, params)` is called once to produce the item's initial value (`k == 0`,
/// `params` holding just the `in` parameter of `lhs`) and once more for every right-hand-side
/// symbol consumed (`k == 1..=rhs.len()`, `params` holding the interleaved `values` built so
/// far). Returning `None` at any stage silently drops that item — not an error, see
/// `spec.md` §7.
pub struct Rule<E, P> {
    pub lhs: Symbol,
    pub rhs: Vec<Symbol>,
    pub initial_env: E,
    pub eval: Box<dyn Fn(&mut E, usize, &[P]) -> Option<P>>,
}

impl<E, P> Rule<E, P> {
    /// A rule with no evaluation logic beyond "copy the input parameter straight through to
    /// every stage". Convenient for grammars whose symbols don't actually need parameters.
    pub fn unparameterized(lhs: Symbol, rhs: Vec<Symbol>) -> Self
    where
        E: Default,
        P: Clone,
    {
        Self {
            lhs,
            rhs,
            initial_env: E::default(),
            eval: Box::new(|_env, _k, params| params.last().cloned()),
        }
    }
}

impl<E: Clone, P: Clone> Rule<E, P> {
    /// Build the initial item for this rule at `position`, fed `input_param`. Returns `None` if
    /// `eval` rejects the `in` parameter.
    pub fn initial_item<R>(&self, rule_index: usize, position: usize, input_param: P) -> Option<Item<E, P, R>> {
        let mut env = self.initial_env.clone();
        let values = vec![input_param];
        let v0 = (self.eval)(&mut env, 0, &values)?;
        let mut values = values;
        values.push(v0);
        Some(Item {
            rule_index,
            env,
            values,
            results: Vec::new(),
            indices: vec![position],
        })
    }

    /// Build the successor of `item` after consuming its next right-hand-side symbol with
    /// output parameter `output` and scanned result `result`, reaching chart position `to`.
    /// Returns `None` if `eval` rejects the transition.
    pub fn next_item<R: Clone>(
        &self,
        item: &Item<E, P, R>,
        output: P,
        result: Option<R>,
        to: usize,
    ) -> Option<Item<E, P, R>> {
        let mut env = item.env.clone();
        let mut values = item.values.clone();
        values.push(output);
        let v = (self.eval)(&mut env, item.dot() + 1, &values)?;
        values.push(v);
        let mut results = item.results.clone();
        results.push(result);
        let mut indices = item.indices.clone();
        indices.push(to);
        Some(Item {
            rule_index: item.rule_index,
            env,
            values,
            results,
            indices,
        })
    }

    /// Trial-run `eval` for `item`'s next transition under `output`, discarding the result.
    /// Used by the local lexing loop's `modified` semantics to filter candidate tokens down to
    /// those some waiting item can actually consume (spec.md §4.3).
    pub fn has_next_item<R>(&self, item: &Item<E, P, R>, output: &P) -> bool
    where
        R: Clone,
    {
        let mut env = item.env.clone();
        let mut values = item.values.clone();
        values.push(output.clone());
        (self.eval)(&mut env, item.dot() + 1, &values).is_some()
    }
}

/// How a terminal's own scannerless parse is translated into tokens (spec.md §6).
#[derive(Clone)]
pub enum TerminalParseMode<P> {
    /// Emit one token per successful sub-parse, with its full consumed length.
    LongestMatch,
    /// Positive lookahead: on success, emit zero-length tokens (the match is asserted, not
    /// consumed).
    AndNext,
    /// Negative lookahead: on failure of the sub-parse, emit one zero-length token carrying `0`;
    /// on success, emit nothing.
    NotNext(P),
}

impl<P> Default for TerminalParseMode<P> {
    fn default() -> Self {
        TerminalParseMode::LongestMatch
    }
}

/// Which of the two documented readings of the local lexing loop's token-filtering step is in
/// effect (spec.md §4.3, §9 Open Question).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Semantics {
    /// The selector sees every newly collected token, unfiltered.
    Paper,
    /// Newly collected tokens are first restricted to those some waiting item in the bin can
    /// actually consume.
    Modified,
}

/// Grammar construction errors, caught at `GrammarBuilder::build` time rather than left to panic
/// at parse time (spec.md §7: "violations of structural preconditions ... are programmer errors
/// caught at grammar construction").
#[derive(Debug)]
pub enum Error {
    /// The nominated start nonterminal has no rule with it as `lhs`.
    NoRuleForStart(Symbol),
    /// A rule references a nonterminal index at or past `nonterminal_count`.
    SymbolOutOfRange(Symbol),
    /// A required external collaborator (`Lexer`, `Selector`, `ConstructResult`) was never
    /// supplied to the builder.
    MissingCollaborator(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoRuleForStart(sym) => write!(f, "no rule has {:?} as its left-hand side", sym),
            Error::SymbolOutOfRange(sym) => write!(f, "symbol {:?} is out of the declared range", sym),
            Error::MissingCollaborator(what) => write!(f, "grammar is missing its {}", what),
        }
    }
}

impl std::error::Error for Error {}

/// Immutable, validated grammar: rules plus the external collaborators (`Lexer`, `Selector`,
/// `ConstructResult`) and parsing-mode configuration fixed at construction time.
pub struct Grammar<C, E, P, R> {
    start: Symbol,
    rules: Vec<Rule<E, P>>,
    rules_of: HashMap<Symbol, Vec<usize>>,
    lexer: Box<dyn Lexer<C, P, R>>,
    selector: Box<dyn Selector<P, R>>,
    construct_result: Box<dyn ConstructResult<C, P, R>>,
    terminal_parse_modes: HashMap<u32, TerminalParseMode<P>>,
    semantics: Semantics,
}

impl<C, E, P, R> Grammar<C, E, P, R> {
    pub fn start(&self) -> Symbol {
        self.start
    }

    pub(crate) fn rules(&self) -> &[Rule<E, P>] {
        &self.rules
    }

    pub(crate) fn rules_of(&self, symbol: Symbol) -> &[usize] {
        self.rules_of.get(&symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn lexer(&self) -> &dyn Lexer<C, P, R> {
        self.lexer.as_ref()
    }

    pub(crate) fn selector(&self) -> &dyn Selector<P, R> {
        self.selector.as_ref()
    }

    pub(crate) fn construct_result(&self) -> &dyn ConstructResult<C, P, R> {
        self.construct_result.as_ref()
    }

    /// Explicit parse mode configured for `terminal_index`, or `None` to mean the default,
    /// `LongestMatch` (most terminals never need anything else).
    pub(crate) fn terminal_parse_mode(&self, terminal_index: u32) -> Option<&TerminalParseMode<P>> {
        let mode = self.terminal_parse_modes.get(&terminal_index);
        if mode.is_none() {
            trace!("terminal {} has no explicit parse mode, defaulting to LongestMatch", terminal_index);
        }
        mode
    }

    pub(crate) fn semantics(&self) -> Semantics {
        self.semantics
    }
}

impl<C, E, P, R> Grammar<C, E, P, R>
where
    C: Clone,
    E: Clone,
    P: Clone + Eq + std::hash::Hash,
    R: Clone,
{
    /// Parse this grammar's start symbol from `start_position` in `input`, fed `initial_param`.
    /// Thin wrapper around [`crate::parse`], mirroring how `sesd::SyncBlock` layers a
    /// convenience entry point over `Parser::new`/`update`.
    pub fn parse(&self, input: &dyn crate::input::Input<C>, initial_param: P, start_position: usize) -> crate::engine::ParseResult<P, R> {
        crate::engine::parse(self, input, self.start, initial_param, start_position)
    }

    /// [`Grammar::parse`] defaulting `start_position` to `0`.
    pub fn parse_from_start(&self, input: &dyn crate::input::Input<C>, initial_param: P) -> crate::engine::ParseResult<P, R> {
        self.parse(input, initial_param, 0)
    }
}

/// Builder for [`Grammar`], mirroring the teacher's fluent `Rule::new(..).nt(..).t(..)` ergonomics
/// generalized to this grammar's parameterized rule model.
pub struct GrammarBuilder<C, E, P, R> {
    nonterminal_count: u32,
    terminal_count: u32,
    start: Option<Symbol>,
    rules: Vec<Rule<E, P>>,
    lexer: Option<Box<dyn Lexer<C, P, R>>>,
    selector: Option<Box<dyn Selector<P, R>>>,
    construct_result: Option<Box<dyn ConstructResult<C, P, R>>>,
    terminal_parse_modes: HashMap<u32, TerminalParseMode<P>>,
    semantics: Semantics,
}

impl<C, E, P, R> GrammarBuilder<C, E, P, R> {
    pub fn new(nonterminal_count: u32, terminal_count: u32) -> Self {
        Self {
            nonterminal_count,
            terminal_count,
            start: None,
            rules: Vec::new(),
            lexer: None,
            selector: None,
            construct_result: None,
            terminal_parse_modes: HashMap::new(),
            semantics: Semantics::Paper,
        }
    }

    pub fn start(mut self, start: Symbol) -> Self {
        self.start = Some(start);
        self
    }

    pub fn rule(mut self, rule: Rule<E, P>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn lexer(mut self, lexer: impl Lexer<C, P, R> + 'static) -> Self {
        self.lexer = Some(Box::new(lexer));
        self
    }

    pub fn selector(mut self, selector: impl Selector<P, R> + 'static) -> Self {
        self.selector = Some(Box::new(selector));
        self
    }

    pub fn construct_result(mut self, construct_result: impl ConstructResult<C, P, R> + 'static) -> Self {
        self.construct_result = Some(Box::new(construct_result));
        self
    }

    pub fn terminal_parse_mode(mut self, terminal_index: u32, mode: TerminalParseMode<P>) -> Self {
        self.terminal_parse_modes.insert(terminal_index, mode);
        self
    }

    pub fn semantics(mut self, semantics: Semantics) -> Self {
        self.semantics = semantics;
        self
    }

    /// Validate and freeze the grammar. Checks (mirroring `TextGrammar::compile`'s validation
    /// pass): every symbol referenced by a rule is within the declared terminal/nonterminal
    /// counts, and the start symbol has at least one rule.
    pub fn build(self) -> Result<Grammar<C, E, P, R>, Error> {
        let in_range = |sym: Symbol| -> bool {
            match sym {
                Symbol::Nonterminal(i) => i < self.nonterminal_count,
                Symbol::Terminal(i) => i < self.terminal_count,
            }
        };

        for rule in &self.rules {
            if !in_range(rule.lhs) {
                return Err(Error::SymbolOutOfRange(rule.lhs));
            }
            for &sym in &rule.rhs {
                if !in_range(sym) {
                    return Err(Error::SymbolOutOfRange(sym));
                }
            }
        }

        let start = self.start.ok_or(Error::MissingCollaborator("start symbol"))?;
        if !in_range(start) {
            return Err(Error::SymbolOutOfRange(start));
        }

        let mut rules_of: HashMap<Symbol, Vec<usize>> = HashMap::new();
        for (index, rule) in self.rules.iter().enumerate() {
            rules_of.entry(rule.lhs).or_insert_with(Vec::new).push(index);
        }

        if !rules_of.contains_key(&start) {
            return Err(Error::NoRuleForStart(start));
        }

        let lexer = self.lexer.ok_or(Error::MissingCollaborator("lexer"))?;
        let selector = self.selector.ok_or(Error::MissingCollaborator("selector"))?;
        let construct_result = self
            .construct_result
            .ok_or(Error::MissingCollaborator("construct_result"))?;

        Ok(Grammar {
            rules: self.rules,
            rules_of,
            lexer,
            selector,
            construct_result,
            terminal_parse_modes: self.terminal_parse_modes,
            semantics: self.semantics,
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::construct_result::{CompletedRightHandSide, ItemKey};
    use crate::input::SliceInput;
    use crate::lexer::NoTokens;
    use crate::selector::SelectAll;

    /// `S = A B`, `A = 'a'` (terminal index 0), `B = 'b'` (terminal index 1), with the
    /// parameters simply threaded through unchanged and results concatenated as strings.
    ///
    /// Shared by `grammar`, `engine`, and `result` tests, the way `sesd`'s
    /// `dynamic_grammar::tests::define_grammar` feeds `parser`'s tests.
    pub struct ConcatResults;

    impl ConstructResult<char, u32, String> for ConcatResults {
        fn eval_rule(
            &self,
            _input: &dyn crate::input::Input<char>,
            _key: &ItemKey<u32>,
            completed: &CompletedRightHandSide<u32, String>,
        ) -> Option<String> {
            let mut s = String::new();
            for child in &completed.children {
                if let Some(r) = &child.result {
                    s.push_str(r);
                }
            }
            Some(s)
        }

        fn terminal(&self, _key: &ItemKey<u32>, result: Option<String>) -> Option<String> {
            result
        }

        fn merge(&self, _key: &ItemKey<u32>, mut results: Vec<String>) -> Option<String> {
            results.pop()
        }
    }

    struct CharLexer {
        terminal_chars: Vec<char>,
    }

    impl Lexer<char, u32, String> for CharLexer {
        fn parse(
            &self,
            input: &dyn crate::input::Input<char>,
            position: usize,
            key: &crate::token::TerminalKey<u32>,
        ) -> std::collections::HashSet<crate::token::Token<u32, String>> {
            let mut out = std::collections::HashSet::new();
            if let Some(expected) = self.terminal_chars.get(key.terminal_index as usize) {
                if input.at(position) == Some(*expected) {
                    out.insert(crate::token::Token {
                        length: 1,
                        output_param: key.input_param,
                        result: Some(expected.to_string()),
                    });
                }
            }
            out
        }
    }

    pub fn sentence_grammar() -> Grammar<char, (), u32, String> {
        use Symbol::*;
        GrammarBuilder::new(3, 2)
            .start(Nonterminal(0))
            .rule(Rule::unparameterized(Nonterminal(0), vec![Nonterminal(1), Nonterminal(2)]))
            .rule(Rule::unparameterized(Nonterminal(1), vec![Terminal(0)]))
            .rule(Rule::unparameterized(Nonterminal(2), vec![Terminal(1)]))
            .lexer(CharLexer {
                terminal_chars: vec!['a', 'b'],
            })
            .selector(SelectAll)
            .construct_result(ConcatResults)
            .build()
            .expect("grammar should validate")
    }

    #[test]
    fn build_rejects_missing_start_rule() {
        use Symbol::*;
        let err = GrammarBuilder::<char, (), u32, String>::new(1, 0)
            .start(Nonterminal(0))
            .lexer(NoTokens)
            .selector(SelectAll)
            .construct_result(ConcatResults)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::NoRuleForStart(_)));
    }

    #[test]
    fn build_rejects_out_of_range_symbol() {
        use Symbol::*;
        let err = GrammarBuilder::<char, (), u32, String>::new(1, 0)
            .start(Nonterminal(0))
            .rule(Rule::unparameterized(Nonterminal(0), vec![Nonterminal(5)]))
            .lexer(NoTokens)
            .selector(SelectAll)
            .construct_result(ConcatResults)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SymbolOutOfRange(_)));
    }

    #[test]
    fn rules_of_indexes_by_lhs() {
        let grammar = sentence_grammar();
        assert_eq!(grammar.rules_of(Symbol::Nonterminal(0)), &[0]);
        assert_eq!(grammar.rules_of(Symbol::Nonterminal(1)), &[1]);
        assert_eq!(grammar.rules_of(Symbol::Terminal(0)), &[] as &[usize]);
    }

    #[test]
    fn error_display_is_human_readable() {
        let msg = format!("{}", Error::NoRuleForStart(Symbol::Nonterminal(3)));
        assert!(msg.contains("Nonterminal"));
    }

    #[test]
    fn input_smoke() {
        let input: SliceInput<char> = "ab".into();
        assert_eq!(input.at(0), Some('a'));
    }
}
