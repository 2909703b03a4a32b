use std::collections::BTreeSet;

use pl_core::RenderError;

use crate::expr::{parse_expression, Expr};
use crate::lexer::{lex_template, Segment};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Output { expr: Expr, line: usize },
    If { arms: Vec<IfArm>, else_body: Option<Vec<Node>> },
    For { var: String, items: Expr, body: Vec<Node>, line: usize },
    Set { name: String, value: Expr },
    Block { name: String, body: Vec<Node>, line: usize },
    Include { reference: String, line: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfArm {
    pub condition: Expr,
    pub body: Vec<Node>,
}

struct IfBuilder {
    line: usize,
    arms: Vec<IfArm>,
    pending_condition: Option<Expr>,
    in_else: bool,
}

enum Open {
    If(IfBuilder),
    For { line: usize, var: String, items: Expr },
    Block { line: usize, name: String },
}

impl Open {
    fn describe(&self) -> (&'static str, usize) {
        match self {
            Self::If(builder) => ("if", builder.line),
            Self::For { line, .. } => ("for", *line),
            Self::Block { line, .. } => ("block", *line),
        }
    }
}

/// Parses template source into a node tree. `functions` is the set of
/// callable names; every call site is checked during this parse so an
/// unknown function fails before any output is produced.
pub fn parse_template(
    source: &str,
    functions: &BTreeSet<String>,
) -> Result<Vec<Node>, RenderError> {
    let segments = lex_template(source)?;

    let mut open_stack: Vec<Open> = Vec::new();
    let mut bodies: Vec<Vec<Node>> = vec![Vec::new()];

    for segment in segments {
        match segment {
            Segment::Literal { text, .. } => {
                push_node(&mut bodies, Node::Text(text));
            }
            Segment::Expr { body, line } => {
                if body.is_empty() {
                    return Err(RenderError::at_line(
                        "PARSE_EXPR",
                        "Empty expression directive.",
                        line,
                    ));
                }
                let expr = parse_expression(&body, line, functions)?;
                push_node(&mut bodies, Node::Output { expr, line });
            }
            Segment::Tag { body, line } => {
                handle_tag(&body, line, functions, &mut open_stack, &mut bodies)?;
            }
        }
    }

    if let Some(open) = open_stack.last() {
        let (keyword, line) = open.describe();
        return Err(RenderError::at_line(
            "PARSE_UNEXPECTED_DIRECTIVE",
            format!("{{% {} %}} opened here is never closed.", keyword),
            line,
        ));
    }

    Ok(bodies.pop().unwrap_or_default())
}

fn push_node(bodies: &mut [Vec<Node>], node: Node) {
    if let Some(current) = bodies.last_mut() {
        current.push(node);
    }
}

fn handle_tag(
    body: &str,
    line: usize,
    functions: &BTreeSet<String>,
    open_stack: &mut Vec<Open>,
    bodies: &mut Vec<Vec<Node>>,
) -> Result<(), RenderError> {
    let (keyword, rest) = match body.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (body, ""),
    };

    match keyword {
        "" => Err(RenderError::at_line(
            "PARSE_UNEXPECTED_DIRECTIVE",
            "Empty directive.",
            line,
        )),
        "if" => {
            let condition = parse_required_expr(rest, line, functions, "if")?;
            open_stack.push(Open::If(IfBuilder {
                line,
                arms: Vec::new(),
                pending_condition: Some(condition),
                in_else: false,
            }));
            bodies.push(Vec::new());
            Ok(())
        }
        "elif" => start_else_if_arm(rest, line, functions, open_stack, bodies),
        "else" => {
            // `else if <cond>` is accepted as a spelling of `elif`.
            if let Some(condition_src) = rest.strip_prefix("if") {
                if condition_src.is_empty() || condition_src.starts_with(char::is_whitespace) {
                    return start_else_if_arm(
                        condition_src.trim(),
                        line,
                        functions,
                        open_stack,
                        bodies,
                    );
                }
            }
            if !rest.is_empty() {
                return Err(RenderError::at_line(
                    "PARSE_UNEXPECTED_DIRECTIVE",
                    format!("Unexpected input after else: \"{}\".", rest),
                    line,
                ));
            }
            let Some(Open::If(builder)) = open_stack.last_mut() else {
                return Err(stray_directive("else", line));
            };
            if builder.in_else {
                return Err(RenderError::at_line(
                    "PARSE_UNEXPECTED_DIRECTIVE",
                    "Duplicate {% else %} in the same if.",
                    line,
                ));
            }
            let finished = bodies.pop().unwrap_or_default();
            let condition = builder
                .pending_condition
                .take()
                .expect("arm condition should be pending before else");
            builder.arms.push(IfArm {
                condition,
                body: finished,
            });
            builder.in_else = true;
            bodies.push(Vec::new());
            Ok(())
        }
        "endif" => {
            let Some(Open::If(mut builder)) = open_stack.pop() else {
                return Err(stray_directive("endif", line));
            };
            let finished = bodies.pop().unwrap_or_default();
            let else_body = if builder.in_else {
                Some(finished)
            } else {
                let condition = builder
                    .pending_condition
                    .take()
                    .expect("arm condition should be pending before endif");
                builder.arms.push(IfArm {
                    condition,
                    body: finished,
                });
                None
            };
            push_node(
                bodies,
                Node::If {
                    arms: builder.arms,
                    else_body,
                },
            );
            Ok(())
        }
        "for" => {
            let (var, after) = split_identifier(rest).ok_or_else(|| {
                RenderError::at_line(
                    "PARSE_UNEXPECTED_DIRECTIVE",
                    "for expects \"{% for <name> in <expression> %}\".",
                    line,
                )
            })?;
            let items_src = after
                .trim_start()
                .strip_prefix("in")
                .filter(|tail| tail.is_empty() || tail.starts_with(char::is_whitespace))
                .ok_or_else(|| {
                    RenderError::at_line(
                        "PARSE_UNEXPECTED_DIRECTIVE",
                        "for expects \"{% for <name> in <expression> %}\".",
                        line,
                    )
                })?;
            let items = parse_required_expr(items_src.trim(), line, functions, "for")?;
            open_stack.push(Open::For {
                line,
                var: var.to_string(),
                items,
            });
            bodies.push(Vec::new());
            Ok(())
        }
        "endfor" => {
            let Some(Open::For { line: for_line, var, items }) = open_stack.pop() else {
                return Err(stray_directive("endfor", line));
            };
            let body = bodies.pop().unwrap_or_default();
            push_node(
                bodies,
                Node::For {
                    var,
                    items,
                    body,
                    line: for_line,
                },
            );
            Ok(())
        }
        "set" => {
            let (name, after) = split_identifier(rest).ok_or_else(|| {
                RenderError::at_line(
                    "PARSE_UNEXPECTED_DIRECTIVE",
                    "set expects \"{% set <name> = <expression> %}\".",
                    line,
                )
            })?;
            let value_src = after.trim_start().strip_prefix('=').ok_or_else(|| {
                RenderError::at_line(
                    "PARSE_UNEXPECTED_DIRECTIVE",
                    "set expects \"{% set <name> = <expression> %}\".",
                    line,
                )
            })?;
            let value = parse_required_expr(value_src.trim(), line, functions, "set")?;
            push_node(
                bodies,
                Node::Set {
                    name: name.to_string(),
                    value,
                },
            );
            Ok(())
        }
        "block" => {
            let Some((name, "")) = split_identifier(rest) else {
                return Err(RenderError::at_line(
                    "PARSE_UNEXPECTED_DIRECTIVE",
                    "block expects \"{% block <name> %}\".",
                    line,
                ));
            };
            open_stack.push(Open::Block {
                line,
                name: name.to_string(),
            });
            bodies.push(Vec::new());
            Ok(())
        }
        "endblock" => {
            let Some(Open::Block { line: block_line, name }) = open_stack.pop() else {
                return Err(stray_directive("endblock", line));
            };
            let body = bodies.pop().unwrap_or_default();
            push_node(
                bodies,
                Node::Block {
                    name,
                    body,
                    line: block_line,
                },
            );
            Ok(())
        }
        "include" => {
            let reference = parse_expression(rest, line, functions)?;
            let Expr::Str(reference) = reference else {
                return Err(RenderError::at_line(
                    "PARSE_UNEXPECTED_DIRECTIVE",
                    "include expects a quoted template reference.",
                    line,
                ));
            };
            push_node(bodies, Node::Include { reference, line });
            Ok(())
        }
        other => Err(RenderError::at_line(
            "PARSE_UNKNOWN_DIRECTIVE",
            format!("Unknown directive keyword \"{}\".", other),
            line,
        )),
    }
}

fn start_else_if_arm(
    condition_src: &str,
    line: usize,
    functions: &BTreeSet<String>,
    open_stack: &mut [Open],
    bodies: &mut Vec<Vec<Node>>,
) -> Result<(), RenderError> {
    let Some(Open::If(builder)) = open_stack.last_mut() else {
        return Err(stray_directive("elif", line));
    };
    if builder.in_else {
        return Err(RenderError::at_line(
            "PARSE_UNEXPECTED_DIRECTIVE",
            "{% elif %} is not allowed after {% else %}.",
            line,
        ));
    }
    let condition = parse_required_expr(condition_src, line, functions, "elif")?;
    let finished = bodies.pop().unwrap_or_default();
    let previous = builder
        .pending_condition
        .take()
        .expect("arm condition should be pending before elif");
    builder.arms.push(IfArm {
        condition: previous,
        body: finished,
    });
    builder.pending_condition = Some(condition);
    bodies.push(Vec::new());
    Ok(())
}

fn parse_required_expr(
    source: &str,
    line: usize,
    functions: &BTreeSet<String>,
    keyword: &str,
) -> Result<Expr, RenderError> {
    if source.is_empty() {
        return Err(RenderError::at_line(
            "PARSE_UNEXPECTED_DIRECTIVE",
            format!("{} expects an expression.", keyword),
            line,
        ));
    }
    parse_expression(source, line, functions)
}

fn split_identifier(input: &str) -> Option<(&str, &str)> {
    let mut end = 0;
    for (index, ch) in input.char_indices() {
        let valid = if index == 0 {
            ch.is_ascii_alphabetic() || ch == '_'
        } else {
            ch.is_ascii_alphanumeric() || ch == '_'
        };
        if !valid {
            break;
        }
        end = index + ch.len_utf8();
    }
    if end == 0 {
        return None;
    }
    Some((&input[..end], &input[end..]))
}

fn stray_directive(keyword: &str, line: usize) -> RenderError {
    RenderError::at_line(
        "PARSE_UNEXPECTED_DIRECTIVE",
        format!("{{% {} %}} has no matching open construct.", keyword),
        line,
    )
}
