use nom::{
    branch::alt,
    bytes::complete::{
        is_not,
        tag,
        take_until,
        take_while,
        take_while1,
    },
    character::complete::{
        anychar,
        char,
        multispace0,
        none_of,
        not_line_ending,
        one_of,
        satisfy,
    },
    combinator::{
        all_consuming,
        cut,
        map,
        not,
        opt,
        recognize,
        value,
    },
    error::{
        context,
        convert_error,
        VerboseError,
    },
    multi::{
        many0,
        many0_count,
        separated_list0,
        separated_list1,
    },
    sequence::{
        delimited,
        pair,
        preceded,
        separated_pair,
        terminated,
        tuple,
    },
    IResult,
};

use super::ast::{
    Alternative,
    Alternatives,
    Atom,
    CommentToken,
    Element,
    Grammar,
    GrammarKind,
    GrammarOption,
    LineIndex,
    Prequel,
    RuleSpec,
    Suffix,
    TokenSpec,
};
use crate::docs::CommentKind;

type Res<'a, U> = IResult<&'a str, U, VerboseError<&'a str>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxError {
    /// Line of the innermost error, relative to the parsed text.
    pub line: usize,
    pub message: String,
}

pub fn parse(input: &str) -> Result<Grammar<'_>, SyntaxError> {
    finish(input, parse_grammar_complete(input))
}

/// Parses a bare rule body, as given to the `content` command.
pub fn parse_body(input: &str) -> Result<Alternatives<'_>, SyntaxError> {
    finish(
        input,
        all_consuming(terminated(parse_alternatives, consume_ws))(input),
    )
}

pub(crate) fn finish<'a, U>(input: &'a str, result: Res<'a, U>) -> Result<U, SyntaxError> {
    match result {
        Ok((_, output)) => Ok(output),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let line = e
                .errors
                .first()
                .map(|(rest, _)| LineIndex::new(input).line_of(rest))
                .unwrap_or(1);
            Err(SyntaxError {
                line,
                message: convert_error(input, e),
            })
        }
        _ => unreachable!(),
    }
}

fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn parse_doc_comment(input: &str) -> Res<&str> {
    recognize(tuple((
        tag("/**"),
        not(char('/')),
        take_until("*/"),
        tag("*/"),
    )))(input)
}

/// A comment. Comments that carry no documentation yield `None`.
fn parse_comment(input: &str) -> Res<Option<CommentToken>> {
    alt((
        map(parse_doc_comment, |text| {
            Some(CommentToken {
                kind: CommentKind::Doc,
                text,
            })
        }),
        map(recognize(pair(tag("//@"), not_line_ending)), |text| {
            Some(CommentToken {
                kind: CommentKind::Command,
                text,
            })
        }),
        map(recognize(pair(tag("///"), not_line_ending)), |text| {
            Some(CommentToken {
                kind: CommentKind::Header,
                text,
            })
        }),
        value(None, parse_plain_comment),
    ))(input)
}

fn parse_plain_comment(input: &str) -> Res<()> {
    alt((
        value((), tag("/**/")),
        value(
            (),
            tuple((tag("/*"), not(char('*')), take_until("*/"), tag("*/"))),
        ),
        value((), pair(tag("//"), not_line_ending)),
    ))(input)
}

/// Consumes whitespace and comments, and collects the comments that carry
/// documentation.
fn parse_trivia(input: &str) -> Res<Vec<CommentToken>> {
    map(
        terminated(many0(preceded(multispace0, parse_comment)), multispace0),
        |comments| comments.into_iter().flatten().collect(),
    )(input)
}

/// consumes whitespace and plain comments, but stops at doc comments
fn consume_ws(input: &str) -> Res<()> {
    value(
        (),
        terminated(
            many0_count(preceded(multispace0, parse_plain_comment)),
            multispace0,
        ),
    )(input)
}

/// consumes whitespace and plain comments before calling the parser `f`
fn wsc<'a, U>(f: impl FnMut(&'a str) -> Res<'a, U>) -> impl FnMut(&'a str) -> Res<'a, U> {
    preceded(consume_ws, f)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    wsc(terminated(tag(word), not(satisfy(is_id_char))))
}

fn parse_id(input: &str) -> Res<&str> {
    context(
        "identifier",
        wsc(recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            take_while(is_id_char),
        ))),
    )(input)
}

fn parse_string(input: &str) -> Res<&str> {
    context(
        "string literal",
        wsc(recognize(delimited(
            char('\''),
            many0_count(alt((preceded(char('\\'), anychar), none_of("\\'\r\n")))),
            cut(char('\'')),
        ))),
    )(input)
}

fn parse_char_set(input: &str) -> Res<&str> {
    context(
        "char set",
        wsc(recognize(delimited(
            char('['),
            many0_count(alt((preceded(char('\\'), anychar), none_of("\\]")))),
            cut(char(']')),
        ))),
    )(input)
}

/// `{ ... }` with nested braces.
pub(crate) fn parse_action_block(input: &str) -> Res<&str> {
    context("action", wsc(recognize(parse_action_braces)))(input)
}

fn parse_action_braces(input: &str) -> Res<()> {
    value(
        (),
        delimited(char('{'), many0_count(parse_action_text), cut(char('}'))),
    )(input)
}

/// Action code. Quoted literals and comments may contain braces, so they're
/// skipped as a whole.
fn parse_action_text(input: &str) -> Res<()> {
    alt((
        parse_action_braces,
        value((), parse_action_quoted('\'', "\\'")),
        value((), parse_action_quoted('"', "\\\"")),
        value((), pair(tag("//"), not_line_ending)),
        value((), tuple((tag("/*"), take_until("*/"), tag("*/")))),
        value((), is_not("{}'\"/")),
        // a lone quote or slash, as in `it's`
        value((), one_of("'\"/")),
    ))(input)
}

fn parse_action_quoted<'a>(
    quote: char,
    stop: &'static str,
) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    recognize(delimited(
        char(quote),
        many0_count(alt((preceded(char('\\'), anychar), none_of(stop)))),
        char(quote),
    ))
}

/// `[ ... ]` with nested brackets, as used for rule arguments.
fn parse_arg_block(input: &str) -> Res<&str> {
    context(
        "argument block",
        wsc(recognize(delimited(
            char('['),
            many0_count(alt((value((), parse_arg_block), value((), is_not("[]"))))),
            cut(char(']')),
        ))),
    )(input)
}

/// `<assoc=right>` and the like.
fn parse_element_options(input: &str) -> Res<&str> {
    wsc(delimited(char('<'), is_not(">"), char('>')))(input)
}

fn parse_grammar_complete(input: &str) -> Res<Grammar> {
    all_consuming(terminated(parse_grammar, parse_trivia))(input)
}

fn parse_grammar(input: &str) -> Res<Grammar> {
    context(
        "grammar",
        map(
            tuple((
                parse_trivia,
                parse_grammar_decl,
                many0(parse_prequel),
                parse_rules,
            )),
            |(docs, (kind, name), prequels, rules)| {
                Grammar {
                    docs,
                    kind,
                    name,
                    prequels,
                    rules,
                }
            },
        ),
    )(input)
}

fn parse_grammar_decl(input: &str) -> Res<(GrammarKind, &str)> {
    context(
        "grammar declaration",
        pair(
            map(
                opt(alt((keyword("lexer"), keyword("parser")))),
                |kind| {
                    match kind {
                        Some("lexer") => GrammarKind::Lexer,
                        Some(_) => GrammarKind::Parser,
                        None => GrammarKind::Combined,
                    }
                },
            ),
            preceded(
                keyword("grammar"),
                cut(terminated(parse_id, wsc(char(';')))),
            ),
        ),
    )(input)
}

fn parse_prequel(input: &str) -> Res<Prequel> {
    context(
        "prequel",
        preceded(
            parse_trivia,
            alt((
                map(parse_options_spec, Prequel::Options),
                map(parse_imports, Prequel::Imports),
                map(parse_tokens_spec, Prequel::Tokens),
                map(parse_channels_spec, Prequel::Channels),
                value(Prequel::Action, parse_named_action),
            )),
        ),
    )(input)
}

fn parse_options_spec(input: &str) -> Res<Vec<GrammarOption>> {
    context(
        "options",
        preceded(
            keyword("options"),
            cut(delimited(
                wsc(char('{')),
                many0(terminated(parse_option, wsc(char(';')))),
                wsc(char('}')),
            )),
        ),
    )(input)
}

fn parse_option(input: &str) -> Res<GrammarOption> {
    map(
        separated_pair(parse_id, wsc(char('=')), parse_option_value),
        |(name, value)| GrammarOption { name, value },
    )(input)
}

fn parse_option_value(input: &str) -> Res<&str> {
    alt((
        parse_string,
        parse_action_block,
        wsc(recognize(separated_list1(
            char('.'),
            take_while1(is_id_char),
        ))),
    ))(input)
}

fn parse_imports(input: &str) -> Res<Vec<&str>> {
    context(
        "import",
        preceded(
            keyword("import"),
            cut(terminated(
                separated_list1(wsc(char(',')), parse_delegate),
                wsc(char(';')),
            )),
        ),
    )(input)
}

/// `Name` or `Alias = Name`. Yields the name of the imported grammar.
fn parse_delegate(input: &str) -> Res<&str> {
    map(
        pair(parse_id, opt(preceded(wsc(char('=')), parse_id))),
        |(name, target)| target.unwrap_or(name),
    )(input)
}

fn parse_tokens_spec(input: &str) -> Res<Vec<TokenSpec>> {
    context(
        "tokens",
        preceded(
            keyword("tokens"),
            cut(delimited(
                wsc(char('{')),
                terminated(
                    separated_list0(wsc(char(',')), parse_token),
                    opt(wsc(char(','))),
                ),
                pair(parse_trivia, wsc(char('}'))),
            )),
        ),
    )(input)
}

fn parse_token(input: &str) -> Res<TokenSpec> {
    map(pair(parse_trivia, parse_id), |(comments, name)| {
        TokenSpec { comments, name }
    })(input)
}

fn parse_channels_spec(input: &str) -> Res<Vec<&str>> {
    context(
        "channels",
        preceded(
            keyword("channels"),
            cut(delimited(
                wsc(char('{')),
                separated_list0(wsc(char(',')), parse_id),
                pair(opt(wsc(char(','))), wsc(char('}'))),
            )),
        ),
    )(input)
}

/// `@header { ... }` or `@parser::members { ... }`
fn parse_named_action(input: &str) -> Res<()> {
    value(
        (),
        preceded(
            wsc(char('@')),
            cut(tuple((
                parse_id,
                opt(preceded(wsc(tag("::")), parse_id)),
                parse_action_block,
            ))),
        ),
    )(input)
}

fn parse_mode(input: &str) -> Res<&str> {
    context(
        "mode",
        preceded(keyword("mode"), terminated(parse_id, wsc(char(';')))),
    )(input)
}

fn parse_rules(input: &str) -> Res<Vec<RuleSpec>> {
    map(
        many0(alt((
            value(None, preceded(parse_trivia, parse_mode)),
            map(parse_rule, Some),
        ))),
        |rules| rules.into_iter().flatten().collect(),
    )(input)
}

fn parse_rule(input: &str) -> Res<RuleSpec> {
    context("rule", parse_rule_spec)(input)
}

fn parse_rule_spec(input: &str) -> Res<RuleSpec> {
    let (input, comments) = parse_trivia(input)?;
    let (input, is_fragment) = map(opt(keyword("fragment")), |f| f.is_some())(input)?;
    let (input, name) = parse_id(input)?;
    let (input, _) = parse_rule_prequel(input)?;
    let (input, _) = wsc(char(':'))(input)?;
    let (input, body) = cut(parse_alternatives)(input)?;
    let (input, _) = cut(wsc(char(';')))(input)?;
    let (input, _) = parse_exception_group(input)?;

    Ok((
        input,
        RuleSpec {
            comments,
            name,
            is_fragment,
            body,
        },
    ))
}

/// Arguments, return values, locals, options and actions of a parser rule.
fn parse_rule_prequel(input: &str) -> Res<()> {
    value(
        (),
        tuple((
            opt(parse_arg_block),
            opt(pair(keyword("returns"), cut(parse_arg_block))),
            opt(pair(
                keyword("throws"),
                cut(separated_list1(wsc(char(',')), parse_id)),
            )),
            opt(pair(keyword("locals"), cut(parse_arg_block))),
            many0_count(alt((
                value((), parse_options_spec),
                value((), parse_named_action),
            ))),
        )),
    )(input)
}

fn parse_exception_group(input: &str) -> Res<()> {
    value(
        (),
        many0_count(alt((
            value(
                (),
                tuple((keyword("catch"), parse_arg_block, parse_action_block)),
            ),
            value((), pair(keyword("finally"), parse_action_block)),
        ))),
    )(input)
}

fn parse_alternatives(input: &str) -> Res<Alternatives> {
    context(
        "alternatives",
        map(
            separated_list1(wsc(char('|')), parse_alternative),
            Alternatives,
        ),
    )(input)
}

fn parse_alternative(input: &str) -> Res<Alternative> {
    context(
        "alternative",
        map(
            tuple((
                opt(parse_element_options),
                many0(parse_element),
                opt(parse_lexer_commands),
                opt(preceded(wsc(char('#')), cut(parse_id))),
            )),
            |(_, elements, _, _)| Alternative(elements),
        ),
    )(input)
}

/// `-> skip`, `-> channel(HIDDEN), pushMode(X)`
fn parse_lexer_commands(input: &str) -> Res<()> {
    value(
        (),
        preceded(
            wsc(tag("->")),
            cut(separated_list1(
                wsc(char(',')),
                pair(
                    parse_id,
                    opt(delimited(wsc(char('(')), is_not(")"), char(')'))),
                ),
            )),
        ),
    )(input)
}

fn parse_element(input: &str) -> Res<Element> {
    context(
        "element",
        alt((
            map(wsc(parse_doc_comment), |text| {
                Element {
                    atom: Atom::Doc(text),
                    suffix: None,
                }
            }),
            map(pair(parse_action_block, opt(char('?'))), |_| {
                Element {
                    atom: Atom::Action,
                    suffix: None,
                }
            }),
            map(
                tuple((
                    opt(parse_label),
                    parse_atom,
                    opt(parse_element_options),
                    opt(parse_suffix),
                )),
                |(_, atom, _, suffix)| Element { atom, suffix },
            ),
        )),
    )(input)
}

/// `label=` or `label+=`
fn parse_label(input: &str) -> Res<&str> {
    terminated(parse_id, wsc(alt((tag("+="), tag("=")))))(input)
}

fn parse_suffix(input: &str) -> Res<Suffix> {
    context(
        "suffix",
        terminated(
            map(wsc(one_of("?*+")), |c| {
                match c {
                    '?' => Suffix::Optional,
                    '*' => Suffix::ZeroOrMore,
                    '+' => Suffix::OneOrMore,
                    _ => unreachable!(),
                }
            }),
            // non-greedy
            opt(char('?')),
        ),
    )(input)
}

fn parse_atom(input: &str) -> Res<Atom> {
    context(
        "atom",
        alt((
            map(
                separated_pair(parse_string, wsc(tag("..")), cut(parse_string)),
                |(start, end)| Atom::Range { start, end },
            ),
            map(parse_string, Atom::Literal),
            map(parse_char_set, Atom::CharSet),
            value(Atom::Wildcard, wsc(char('.'))),
            map(preceded(wsc(char('~')), cut(parse_atom)), |atom| {
                Atom::Not(Box::new(atom))
            }),
            map(parse_block, Atom::Block),
            map(parse_rule_ref, Atom::Ref),
        )),
    )(input)
}

fn parse_rule_ref(input: &str) -> Res<&str> {
    let (input, name) = parse_id(input)?;
    // only parser rules take arguments, `A [a-z]` is a char set
    let (input, _) = if name.starts_with(char::is_lowercase) {
        opt(parse_arg_block)(input)?
    }
    else {
        (input, None)
    };
    Ok((input, name))
}

fn parse_block(input: &str) -> Res<Alternatives> {
    context(
        "block",
        delimited(
            wsc(char('(')),
            preceded(
                opt(pair(
                    many0_count(alt((
                        value((), parse_options_spec),
                        value((), parse_named_action),
                    ))),
                    wsc(char(':')),
                )),
                parse_alternatives,
            ),
            cut(wsc(char(')'))),
        ),
    )(input)
}
