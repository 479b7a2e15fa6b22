//! AST-construction expressions.
//!
//! Each rule carries one of these; at an end-of-rule point the parser
//! emitter folds it into the C expression that builds the rule's AST value
//! from the parse results bound along the way. The variants mirror the
//! construction algebra rule authors write: node constructors, builtin
//! references, attribute words, in-place updates, and direct references to
//! right-hand-side symbols.

use crate::term::TermId;

/// Index of a nonterminal in the grammar's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NtId(pub usize);

/// Prefix of constructed node tags.
pub const NODE_PREFIX: &str = "AST_NODE_";
/// Prefix of value-node tags.
pub const VALUE_PREFIX: &str = "AST_VALUE_";
/// Prefix of builtin-operation ids.
pub const BUILTIN_PREFIX: &str = "BUILTIN_OP_";
/// Prefix of attribute flag masks.
pub const FLAG_PREFIX: &str = "AST_FLAG_";

/// An AST-construction expression.
#[derive(Debug, Clone, PartialEq)]
pub enum AstGen {
    /// The null node.
    Null,
    /// Empty attribute word.
    NoAttr,
    /// A single attribute flag.
    Attr(String),
    /// Construct a node with the given children.
    Cons {
        /// Tag base name.
        name: String,
        /// Child constructions.
        children: Vec<AstGen>,
    },
    /// Reference to a builtin operation's identifier node.
    Builtin(String),
    /// Replace child `index` of `base` with `value`, yielding `base`.
    Update {
        /// Node being updated.
        base: Box<AstGen>,
        /// Child slot.
        index: usize,
        /// New child.
        value: Box<AstGen>,
    },
    /// OR an attribute word into `base`'s flags, yielding `base`.
    AddAttribute {
        /// Node receiving the attribute.
        base: Box<AstGen>,
        /// Attribute word (an [`AstGen::Attr`] or a reference to a rule
        /// producing one).
        attr: Box<AstGen>,
    },
    /// Collect the rule's lone `Repeat` into a node with the given tag.
    Repetition(String),
    /// Direct reference to a right-hand-side terminal.
    TermRef(TermId),
    /// Reference to the `index`-th occurrence of a nonterminal in the rule.
    NtRef(NtId, usize),
}

impl AstGen {
    /// Shorthand constructor for [`AstGen::Cons`].
    pub fn cons(name: &str, children: Vec<AstGen>) -> Self {
        AstGen::Cons {
            name: name.to_owned(),
            children,
        }
    }

    /// Shorthand constructor for [`AstGen::Update`].
    pub fn update(base: AstGen, index: usize, value: AstGen) -> Self {
        AstGen::Update {
            base: Box::new(base),
            index,
            value: Box::new(value),
        }
    }

    /// Shorthand constructor for [`AstGen::AddAttribute`].
    pub fn add_attribute(base: AstGen, attr: AstGen) -> Self {
        AstGen::AddAttribute {
            base: Box::new(base),
            attr: Box::new(attr),
        }
    }

    /// Immediate children.
    pub fn children(&self) -> Vec<&AstGen> {
        match self {
            AstGen::Cons { children, .. } => children.iter().collect(),
            AstGen::Update { base, value, .. } => vec![base, value],
            AstGen::AddAttribute { base, attr } => vec![base, attr],
            _ => Vec::new(),
        }
    }

    /// Preorder traversal of this construction.
    pub fn self_and_sub(&self) -> Vec<&AstGen> {
        let mut out = vec![self];
        for child in self.children() {
            out.extend(child.self_and_sub());
        }
        out
    }

    /// Replace every nonterminal reference listed in `map` (keyed by
    /// `(nonterminal, occurrence)`) in one simultaneous pass.
    pub fn subst_nt_refs(
        &self,
        map: &std::collections::HashMap<(NtId, usize), AstGen>,
    ) -> AstGen {
        match self {
            AstGen::NtRef(nt, index) => match map.get(&(*nt, *index)) {
                Some(replacement) => replacement.clone(),
                None => self.clone(),
            },
            AstGen::Cons { name, children } => AstGen::Cons {
                name: name.clone(),
                children: children.iter().map(|c| c.subst_nt_refs(map)).collect(),
            },
            AstGen::Update { base, index, value } => AstGen::Update {
                base: Box::new(base.subst_nt_refs(map)),
                index: *index,
                value: Box::new(value.subst_nt_refs(map)),
            },
            AstGen::AddAttribute { base, attr } => AstGen::AddAttribute {
                base: Box::new(base.subst_nt_refs(map)),
                attr: Box::new(attr.subst_nt_refs(map)),
            },
            _ => self.clone(),
        }
    }

    /// Replace references to one nonterminal occurrence.
    pub fn subst(&self, from: (NtId, usize), to: &AstGen) -> AstGen {
        let mut map = std::collections::HashMap::new();
        map.insert(from, to.clone());
        self.subst_nt_refs(&map)
    }

    /// Tag base name reserved by this construction, if any.
    pub fn ast_name(&self) -> Option<&str> {
        match self {
            AstGen::Cons { name, .. } | AstGen::Repetition(name) => Some(name),
            AstGen::Builtin(_) => Some("ID"),
            _ => None,
        }
    }

    /// Builtin operation name, if this is a builtin reference.
    pub fn builtin_name(&self) -> Option<&str> {
        match self {
            AstGen::Builtin(name) => Some(name),
            _ => None,
        }
    }

    /// Whether a unique AST node tag is reserved for this construction
    /// itself. Builtins share the generic identifier tag, so they answer
    /// no.
    pub fn has_ast_representation(&self) -> bool {
        matches!(self, AstGen::Cons { .. } | AstGen::Repetition(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(nt: usize, index: usize) -> AstGen {
        AstGen::NtRef(NtId(nt), index)
    }

    #[test]
    fn subst_replaces_only_the_named_occurrence() {
        let pair = AstGen::cons("PAIR", vec![b(1, 0), b(1, 1)]);
        let dropped = pair.subst((NtId(1), 1), &AstGen::Null);
        assert_eq!(dropped, AstGen::cons("PAIR", vec![b(1, 0), AstGen::Null]));
    }

    #[test]
    fn subst_descends_into_updates_and_attributes() {
        let nested = AstGen::update(
            AstGen::add_attribute(AstGen::cons("VARDECL", vec![b(2, 0)]), b(3, 0)),
            1,
            b(4, 0),
        );
        let substituted = nested.subst((NtId(3), 0), &AstGen::NoAttr);
        let expected = AstGen::update(
            AstGen::add_attribute(AstGen::cons("VARDECL", vec![b(2, 0)]), AstGen::NoAttr),
            1,
            b(4, 0),
        );
        assert_eq!(substituted, expected);
    }

    #[test]
    fn preorder_visits_every_node() {
        let tree = AstGen::cons("IF", vec![b(1, 0), AstGen::cons("SKIP", vec![]), AstGen::Null]);
        let names: Vec<Option<&str>> = tree.self_and_sub().iter().map(|n| n.ast_name()).collect();
        assert_eq!(names, vec![Some("IF"), None, Some("SKIP"), None]);
    }
}
