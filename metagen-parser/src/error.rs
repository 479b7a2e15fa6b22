use metagen_emit::EmitError;
use thiserror::Error;

/// Fatal grammar failure.
///
/// Raised while building the grammar IR, during preprocessing, or while
/// emitting artifacts. Nothing is recovered: the tool reports the
/// diagnostic and exits.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// One lexer variable bound to two different C types.
    #[error("variable `{varname}` bound to inconsistent C types `{first}` and `{second}`")]
    InconsistentTypes {
        /// The shared `yylval` field.
        varname: String,
        /// Type recorded first.
        first: String,
        /// Conflicting type.
        second: String,
    },

    /// Rules for one nonterminal disagree about their result storage.
    #[error("rules for nonterminal `{nt}` disagree about result storage (`{first}` vs `{second}`)")]
    StorageMismatch {
        /// The nonterminal.
        nt: String,
        /// Storage of the first rule.
        first: String,
        /// Storage of the offending rule.
        second: String,
    },

    /// Two rules collapse to the same end-of-rule at the same depth.
    #[error("multiple equivalent rules of length {depth} for nonterminal `{nt}`")]
    AmbiguousEndRule {
        /// The nonterminal.
        nt: String,
        /// Decision-tree depth.
        depth: usize,
    },

    /// Two repetition rules compete at the same position.
    #[error("multiple repeat rules at depth {depth} for nonterminal `{nt}`")]
    AmbiguousRepeatRule {
        /// The nonterminal.
        nt: String,
        /// Decision-tree depth.
        depth: usize,
    },

    /// An end-of-rule and a repeat rule compete at the same position.
    #[error("conflicting end-of-rule and repeat rule for nonterminal `{nt}` at depth {depth}")]
    EndRepeatConflict {
        /// The nonterminal.
        nt: String,
        /// Decision-tree depth.
        depth: usize,
    },

    /// Left recursion survived preprocessing.
    #[error("unresolvable left recursion detected: {cycles}")]
    LeftRecursion {
        /// The offending nonterminals and their closures.
        cycles: String,
    },

    /// A `Repetition` construction without a lone `Repeat` right-hand side.
    #[error("Repetition() requires a right-hand side of exactly one Repeat in a rule for `{nt}`")]
    RepetitionWithoutRepeat {
        /// The nonterminal.
        nt: String,
    },

    /// An AST construction references a parse result its rule never binds.
    #[error("AST construction for `{nt}` references `{symbol}` occurrence {index}, which the rule does not bind")]
    UnboundReference {
        /// The nonterminal whose rule is broken.
        nt: String,
        /// Referenced symbol.
        symbol: String,
        /// Referenced occurrence index.
        index: usize,
    },

    /// A nonterminal whose result storage cannot be resolved (no rules).
    #[error("cannot resolve result storage for nonterminal `{nt}`")]
    UnresolvedStorage {
        /// The nonterminal.
        nt: String,
    },

    /// Too many attributes for the flag bits left over by tag packing.
    #[error("not enough bits left to store all attributes (need {need}, have {have})")]
    FlagBitsExhausted {
        /// Distinct attribute count.
        need: usize,
        /// Flag bits available.
        have: usize,
    },

    /// Template failure bubbled up from the emission layer.
    #[error(transparent)]
    Emit(#[from] EmitError),
}
