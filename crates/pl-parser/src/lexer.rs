use pl_core::RenderError;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal { text: String, line: usize },
    Expr { body: String, line: usize },
    Tag { body: String, line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveKind {
    Expr,
    Tag,
    Comment,
}

impl DirectiveKind {
    fn opener(&self) -> &'static str {
        match self {
            Self::Expr => "{{",
            Self::Tag => "{%",
            Self::Comment => "{#",
        }
    }

    fn closer(&self) -> &'static str {
        match self {
            Self::Expr => "}}",
            Self::Tag => "%}",
            Self::Comment => "#}",
        }
    }
}

/// Splits template source into alternating literal and directive segments.
/// Literal text is passed through untouched; comments produce nothing.
pub fn lex_template(source: &str) -> Result<Vec<Segment>, RenderError> {
    let mut segments = Vec::new();
    let mut cursor = 0usize;
    let mut line = 1usize;

    while cursor < source.len() {
        let Some((offset, kind)) = find_opener(&source[cursor..]) else {
            segments.push(Segment::Literal {
                text: source[cursor..].to_string(),
                line,
            });
            break;
        };

        if offset > 0 {
            let literal = &source[cursor..cursor + offset];
            segments.push(Segment::Literal {
                text: literal.to_string(),
                line,
            });
            line += count_newlines(literal);
        }

        let open_line = line;
        let body_start = cursor + offset + kind.opener().len();
        let Some(close_offset) = source[body_start..].find(kind.closer()) else {
            return Err(RenderError::at_line(
                "PARSE_UNTERMINATED_DIRECTIVE",
                format!(
                    "Directive opened with \"{}\" is missing its closing \"{}\".",
                    kind.opener(),
                    kind.closer()
                ),
                open_line,
            ));
        };

        let body = &source[body_start..body_start + close_offset];
        line += count_newlines(body);
        match kind {
            DirectiveKind::Expr => segments.push(Segment::Expr {
                body: body.trim().to_string(),
                line: open_line,
            }),
            DirectiveKind::Tag => segments.push(Segment::Tag {
                body: body.trim().to_string(),
                line: open_line,
            }),
            DirectiveKind::Comment => {}
        }

        cursor = body_start + close_offset + kind.closer().len();
    }

    Ok(segments)
}

fn find_opener(text: &str) -> Option<(usize, DirectiveKind)> {
    let mut best: Option<(usize, DirectiveKind)> = None;
    for kind in [DirectiveKind::Expr, DirectiveKind::Tag, DirectiveKind::Comment] {
        if let Some(index) = text.find(kind.opener()) {
            if best.map(|(at, _)| index < at).unwrap_or(true) {
                best = Some((index, kind));
            }
        }
    }
    best
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|byte| *byte == b'\n').count()
}

#[cfg(test)]
mod lexer_tests {
    use super::*;

    #[test]
    fn lex_template_splits_literal_expr_and_tag_segments() {
        let segments =
            lex_template("Hello {{ npc.name }}!\n{% if brave %}ok{% endif %}").expect("lex");
        assert_eq!(
            segments,
            vec![
                Segment::Literal {
                    text: "Hello ".to_string(),
                    line: 1
                },
                Segment::Expr {
                    body: "npc.name".to_string(),
                    line: 1
                },
                Segment::Literal {
                    text: "!\n".to_string(),
                    line: 1
                },
                Segment::Tag {
                    body: "if brave".to_string(),
                    line: 2
                },
                Segment::Literal {
                    text: "ok".to_string(),
                    line: 2
                },
                Segment::Tag {
                    body: "endif".to_string(),
                    line: 2
                },
            ]
        );
    }

    #[test]
    fn comments_are_discarded_without_residual_text() {
        let segments = lex_template("a{# note to authors #}b").expect("lex");
        assert_eq!(
            segments,
            vec![
                Segment::Literal {
                    text: "a".to_string(),
                    line: 1
                },
                Segment::Literal {
                    text: "b".to_string(),
                    line: 1
                },
            ]
        );
    }

    #[test]
    fn literal_text_is_never_trimmed() {
        let segments = lex_template("  spaced  \n\n{{ x }}  tail  ").expect("lex");
        assert_eq!(
            segments[0],
            Segment::Literal {
                text: "  spaced  \n\n".to_string(),
                line: 1
            }
        );
        assert_eq!(
            segments[2],
            Segment::Literal {
                text: "  tail  ".to_string(),
                line: 3
            }
        );
    }

    #[test]
    fn unterminated_directive_reports_opener_line() {
        let error =
            lex_template("line one\nline two {{ npc.name").expect_err("unterminated should fail");
        assert_eq!(error.code, "PARSE_UNTERMINATED_DIRECTIVE");
        assert_eq!(error.line, Some(2));

        let error = lex_template("{% if x ").expect_err("unterminated tag should fail");
        assert_eq!(error.code, "PARSE_UNTERMINATED_DIRECTIVE");
        assert_eq!(error.line, Some(1));

        let error = lex_template("{# never closed").expect_err("unterminated comment should fail");
        assert_eq!(error.code, "PARSE_UNTERMINATED_DIRECTIVE");
    }

    #[test]
    fn multi_line_directives_keep_counting_lines() {
        let segments = lex_template("{% if\nbrave %}x{{ y }}").expect("lex");
        assert_eq!(
            segments[0],
            Segment::Tag {
                body: "if\nbrave".to_string(),
                line: 1
            }
        );
        assert_eq!(
            segments[2],
            Segment::Expr {
                body: "y".to_string(),
                line: 2
            }
        );
    }
}
