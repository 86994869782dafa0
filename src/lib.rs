//! Parameterized, locally-lexing Earley parsing.
//!
//! Every grammar symbol carries an input and output parameter threaded through a user-supplied
//! [`Rule`] evaluation function, and the lexer is invoked lazily, position by position, with a
//! [`Selector`] arbitrating which overlapping tokens get admitted. A terminal may also be
//! defined by grammar rules of its own ("scannerless"), recognized through a recursive
//! invocation of [`parse`] rather than through a [`Lexer`].
//!
//! Assemble a [`Grammar`] out of [`Rule`]s plus the three external collaborators ([`Lexer`],
//! [`Selector`], [`ConstructResult`]) with [`GrammarBuilder`], then call
//! [`parse`]/[`Grammar::parse`].

mod construct_result;
mod engine;
mod grammar;
mod input;
mod item;
mod lexer;
mod result;
mod selector;
mod symbol;
mod token;

pub use construct_result::{CompletedChild, CompletedRightHandSide, ConstructResult, ItemKey};
pub use engine::{parse, ParseResult};
pub use grammar::{Error as GrammarError, Grammar, GrammarBuilder, Rule, Semantics, TerminalParseMode};
pub use input::{Input, SliceInput};
pub use item::{Bin, Chart, Item};
pub use lexer::{Lexer, NoTokens};
pub use selector::{SelectAll, Selector};
pub use symbol::Symbol;
pub use token::{TerminalKey, Token, Tokens};
