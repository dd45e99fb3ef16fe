/// Pattern text is ordinary source extended with metavariables (`$X`, `$_`), ellipsis (`...`)
/// and named ellipsis (`$...X`). None of those parse as host-language syntax, so before a
/// pattern reaches the parser this module rewrites each of them into a reserved identifier,
/// which parses wherever an expression, statement, pattern or name is expected. The lowering
/// recognizes the reserved identifiers again with `placeholder`.
use proc_macro2::{Group, Ident, Spacing, Span, TokenStream, TokenTree};

use log::trace;

const ELLIPSIS: &str = "__genmatch_ellipsis";
const ANONYMOUS: &str = "__genmatch_any";
const META_PREFIX: &str = "__genmatch_mv_";
const SEQ_PREFIX: &str = "__genmatch_mvs_";

/// A reserved identifier, decoded.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Placeholder {
    /// `$X`; the name keeps its sigil
    Meta(String),
    Anonymous,
    /// `...`, or `$...X` when named
    Ellipsis(Option<String>),
}

pub(crate) fn placeholder(ident: &str) -> Option<Placeholder> {
    if ident == ELLIPSIS {
        Some(Placeholder::Ellipsis(None))
    } else if ident == ANONYMOUS {
        Some(Placeholder::Anonymous)
    } else if let Some(name) = ident.strip_prefix(SEQ_PREFIX) {
        Some(Placeholder::Ellipsis(Some(format!("$...{}", name))))
    } else if let Some(name) = ident.strip_prefix(META_PREFIX) {
        Some(Placeholder::Meta(format!("${}", name)))
    } else {
        None
    }
}

fn is_punct(tt: Option<&TokenTree>, c: char) -> Option<Spacing> {
    match tt {
        Some(TokenTree::Punct(p)) if p.as_char() == c => Some(p.spacing()),
        _ => None,
    }
}

/// `...` lexes as three joint dots.
fn is_ellipsis(tts: &[TokenTree]) -> bool {
    is_punct(tts.get(0), '.') == Some(Spacing::Joint)
        && is_punct(tts.get(1), '.') == Some(Spacing::Joint)
        && is_punct(tts.get(2), '.').is_some()
        && is_punct(tts.get(3), '.').is_none()
}

fn reserved(name: String, span: Span) -> TokenTree {
    Ident::new(&name, span).into()
}

/// Decode what follows a `$`. Returns the replacement and how many tokens it consumed.
fn metavar(rest: &[TokenTree], span: Span) -> Result<(TokenTree, usize), String> {
    match rest.first() {
        Some(TokenTree::Ident(id)) if id == "_" => Ok((reserved(ANONYMOUS.to_owned(), span), 1)),
        Some(TokenTree::Punct(p)) if p.as_char() == '_' => {
            Ok((reserved(ANONYMOUS.to_owned(), span), 1))
        }
        Some(TokenTree::Ident(id)) => Ok((reserved(format!("{}{}", META_PREFIX, id), span), 1)),
        Some(TokenTree::Punct(_)) if is_ellipsis(rest) => match rest.get(3) {
            Some(TokenTree::Ident(id)) => {
                Ok((reserved(format!("{}{}", SEQ_PREFIX, id), span), 4))
            }
            _ => Err("expected a name after `$...`".to_owned()),
        },
        _ => Err("after '$', expected one of: identifier, '_', '...'".to_owned()),
    }
}

fn rewrite(ts: TokenStream) -> Result<TokenStream, String> {
    let tts: Vec<TokenTree> = ts.into_iter().collect();
    let mut out = Vec::with_capacity(tts.len());
    let mut i = 0;
    while i < tts.len() {
        match &tts[i] {
            TokenTree::Group(g) => {
                let mut group = Group::new(g.delimiter(), rewrite(g.stream())?);
                group.set_span(g.span());
                out.push(group.into());
                i += 1;
            }
            TokenTree::Punct(p) if p.as_char() == '$' => {
                let (tt, used) = metavar(&tts[i + 1..], p.span())?;
                out.push(tt);
                i += 1 + used;
            }
            TokenTree::Punct(p) if is_ellipsis(&tts[i..]) => {
                out.push(reserved(ELLIPSIS.to_owned(), p.span()));
                i += 3;
            }
            tt => {
                out.push(tt.clone());
                i += 1;
            }
        }
    }
    Ok(out.into_iter().collect())
}

/// Tokenize pattern text, replacing pattern syntax with reserved identifiers.
pub(crate) fn lex(text: &str) -> Result<TokenStream, String> {
    let ts: TokenStream = text.parse().map_err(|e| format!("{:?}", e))?;
    let ts = rewrite(ts)?;
    trace!("lexed pattern: {}", ts);
    Ok(ts)
}
