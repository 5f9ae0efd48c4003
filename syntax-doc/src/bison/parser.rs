use nom::{
    branch::alt,
    bytes::complete::{
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
        space0,
    },
    combinator::{
        all_consuming,
        cut,
        map,
        not,
        opt,
        recognize,
        rest,
        value,
    },
    error::{
        context,
        VerboseError,
    },
    multi::{
        many0,
        many0_count,
        many1,
        separated_list1,
    },
    sequence::{
        delimited,
        pair,
        preceded,
        terminated,
        tuple,
    },
    IResult,
};

use super::ast::{
    Alternative,
    Declaration,
    DeclarationKind,
    Element,
    Grammar,
    RuleSpec,
    TokenDecl,
};
use crate::{
    antlr4::{
        ast::CommentToken,
        parser::{
            finish,
            parse_action_block,
            SyntaxError,
        },
    },
    docs::CommentKind,
};

type Res<'a, U> = IResult<&'a str, U, VerboseError<&'a str>>;

pub fn parse(input: &str) -> Result<Grammar<'_>, SyntaxError> {
    finish(input, all_consuming(parse_grammar)(input))
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '-'
}

fn parse_doc_comment(input: &str) -> Res<&str> {
    recognize(tuple((
        tag("/**"),
        not(char('/')),
        take_until("*/"),
        tag("*/"),
    )))(input)
}

/// `//@ %token NAME` looks like a command, but declares a token.
fn parse_token_command_start(input: &str) -> Res<()> {
    value(
        (),
        tuple((
            tag("//@"),
            space0,
            tag("%token"),
            not(satisfy(is_name_char)),
        )),
    )(input)
}

fn parse_comment(input: &str) -> Res<Option<CommentToken>> {
    alt((
        map(parse_doc_comment, |text| {
            Some(CommentToken {
                kind: CommentKind::Doc,
                text,
            })
        }),
        map(
            recognize(tuple((
                not(parse_token_command_start),
                tag("//@"),
                not_line_ending,
            ))),
            |text| {
                Some(CommentToken {
                    kind: CommentKind::Command,
                    text,
                })
            },
        ),
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
        value(
            (),
            tuple((not(parse_token_command_start), tag("//"), not_line_ending)),
        ),
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

fn consume_ws(input: &str) -> Res<()> {
    value(
        (),
        terminated(
            many0_count(preceded(multispace0, parse_plain_comment)),
            multispace0,
        ),
    )(input)
}

fn wsc<'a, U>(f: impl FnMut(&'a str) -> Res<'a, U>) -> impl FnMut(&'a str) -> Res<'a, U> {
    preceded(consume_ws, f)
}

fn parse_name(input: &str) -> Res<&str> {
    context(
        "name",
        wsc(recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_' || c == '.'),
            take_while(is_name_char),
        ))),
    )(input)
}

fn parse_number(input: &str) -> Res<&str> {
    wsc(recognize(pair(
        satisfy(|c| c.is_ascii_digit()),
        take_while(|c: char| c.is_ascii_alphanumeric()),
    )))(input)
}

fn parse_quoted<'a>(quote: char, stop: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    wsc(recognize(delimited(
        char(quote),
        many0_count(alt((preceded(char('\\'), anychar), none_of(stop)))),
        char(quote),
    )))
}

fn parse_string(input: &str) -> Res<&str> {
    context("string literal", parse_quoted('"', "\\\"\r\n"))(input)
}

fn parse_char_literal(input: &str) -> Res<&str> {
    context("character literal", parse_quoted('\'', "\\'\r\n"))(input)
}

fn parse_literal(input: &str) -> Res<&str> {
    alt((parse_char_literal, parse_string))(input)
}

/// `<type>`
fn parse_type_tag(input: &str) -> Res<&str> {
    wsc(recognize(delimited(
        char('<'),
        take_while(|c| c != '>'),
        char('>'),
    )))(input)
}

/// `[name]` after a symbol.
fn parse_named_ref(input: &str) -> Res<&str> {
    wsc(delimited(char('['), take_while1(is_name_char), char(']')))(input)
}

fn directive<'a>(name: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    wsc(recognize(terminated(
        pair(char('%'), tag(name)),
        not(satisfy(is_name_char)),
    )))
}

fn parse_grammar(input: &str) -> Res<Grammar> {
    context(
        "grammar",
        map(
            tuple((
                many0(parse_declaration),
                parse_trivia,
                context("rules section", cut(tag("%%"))),
                many0(parse_rule),
                parse_trivia,
                opt(preceded(tag("%%"), rest)),
            )),
            |(declarations, trailing_comments, _, rules, _, _)| {
                Grammar {
                    declarations,
                    trailing_comments,
                    rules,
                }
            },
        ),
    )(input)
}

fn parse_declaration(input: &str) -> Res<Declaration> {
    context(
        "declaration",
        map(
            pair(
                parse_trivia,
                alt((
                    map(parse_token_decls, DeclarationKind::Tokens),
                    map(parse_epp, DeclarationKind::Epp),
                    map(
                        preceded(parse_token_command_start, cut(parse_name)),
                        DeclarationKind::TokenCommand,
                    ),
                    value(DeclarationKind::Other, parse_prologue),
                    value(DeclarationKind::Other, parse_other_directive),
                )),
            ),
            |(comments, kind)| Declaration { comments, kind },
        ),
    )(input)
}

/// `%token <type> NAME 1 "alias" OTHER`
fn parse_token_decls(input: &str) -> Res<Vec<TokenDecl>> {
    map(
        preceded(
            directive("token"),
            cut(many1(alt((
                value(None, parse_type_tag),
                value(None, parse_char_literal),
                map(
                    tuple((parse_name, opt(parse_number), opt(parse_string))),
                    |(name, _, alias)| Some(TokenDecl { name, alias }),
                ),
            )))),
        ),
        |tokens| tokens.into_iter().flatten().collect(),
    )(input)
}

/// `%epp NAME "literal"`
fn parse_epp(input: &str) -> Res<TokenDecl> {
    map(
        preceded(directive("epp"), cut(pair(parse_name, opt(parse_literal)))),
        |(name, alias)| TokenDecl { name, alias },
    )(input)
}

/// `%{ ... %}`
fn parse_prologue(input: &str) -> Res<()> {
    value(
        (),
        preceded(tag("%{"), cut(pair(take_until("%}"), tag("%}")))),
    )(input)
}

/// Any other declaration, with whatever arguments it takes.
fn parse_other_directive(input: &str) -> Res<()> {
    value(
        (),
        pair(
            recognize(pair(
                char('%'),
                take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
            )),
            many0_count(alt((
                value((), parse_action_block),
                value((), parse_type_tag),
                value((), parse_literal),
                value(
                    (),
                    wsc(take_while1(|c: char| {
                        !c.is_whitespace() && !"%{}<>'\"/;|:".contains(c)
                    })),
                ),
                value((), wsc(one_of(";"))),
            ))),
        ),
    )(input)
}

fn parse_rule(input: &str) -> Res<RuleSpec> {
    context("rule", parse_rule_spec)(input)
}

fn parse_rule_spec(input: &str) -> Res<RuleSpec> {
    let (input, comments) = parse_trivia(input)?;
    let (input, name) = parse_name(input)?;
    let (input, _) = opt(parse_named_ref)(input)?;
    let (input, _) = wsc(char(':'))(input)?;
    let (input, body) = cut(separated_list1(wsc(char('|')), parse_alternative))(input)?;
    let (input, _) = opt(wsc(char(';')))(input)?;

    Ok((
        input,
        RuleSpec {
            comments,
            name,
            body,
        },
    ))
}

/// `name:` or `name[ref]:`, i.e. the start of the next rule. Bison doesn't
/// require rules to end with `;`.
fn parse_rule_start(input: &str) -> Res<()> {
    value(
        (),
        tuple((
            parse_trivia,
            parse_name,
            opt(parse_named_ref),
            wsc(char(':')),
        )),
    )(input)
}

fn parse_alternative(input: &str) -> Res<Alternative> {
    context("alternative", map(many0(parse_element), Alternative))(input)
}

fn parse_element(input: &str) -> Res<Element> {
    context(
        "element",
        alt((
            map(
                terminated(wsc(parse_doc_comment), not(parse_rule_start)),
                Element::Doc,
            ),
            value(Element::Ignored, parse_ignored_element),
            map(terminated(parse_literal, opt(parse_named_ref)), Element::Literal),
            map(
                terminated(
                    terminated(parse_name, opt(parse_named_ref)),
                    not(wsc(char(':'))),
                ),
                Element::Symbol,
            ),
        )),
    )(input)
}

/// Actions, predicates and rule modifiers.
fn parse_ignored_element(input: &str) -> Res<()> {
    alt((
        value((), pair(opt(parse_type_tag), parse_action_block)),
        value((), preceded(wsc(tag("%?")), cut(parse_action_block))),
        value((), directive("empty")),
        value(
            (),
            preceded(directive("prec"), cut(alt((parse_name, parse_literal)))),
        ),
        value((), preceded(directive("dprec"), cut(parse_number))),
        value((), preceded(directive("merge"), cut(parse_type_tag))),
        value((), preceded(directive("expect-rr"), cut(parse_number))),
        value((), preceded(directive("expect"), cut(parse_number))),
    ))(input)
}
