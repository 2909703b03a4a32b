use std::sync::OnceLock;

use pl_core::{Message, RenderError, Role};
use regex::Regex;

fn marker_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^\[ (end )?([a-z]+) \]$").expect("marker regex must compile"))
}

/// Slices rendered text into role-tagged messages. A line counts as a
/// marker only when its trimmed content is exactly `[ role ]` or
/// `[ end role ]` for one of the known roles; anything else is content.
pub fn split_sections(rendered: &str) -> Result<Vec<Message>, RenderError> {
    let mut messages = Vec::new();
    let mut open: Option<(Role, Vec<&str>)> = None;

    for line in rendered.lines() {
        let trimmed = line.trim();
        let marker = marker_regex().captures(trimmed).and_then(|caps| {
            let role = Role::from_marker_name(caps.get(2).map(|m| m.as_str()).unwrap_or(""))?;
            Some((caps.get(1).is_some(), role))
        });

        match marker {
            Some((false, role)) => {
                if let Some((open_role, _)) = &open {
                    return Err(RenderError::new(
                        "SECTIONS_MALFORMED",
                        format!(
                            "Marker \"[ {} ]\" opened while \"[ {} ]\" is still open.",
                            role.as_str(),
                            open_role.as_str()
                        ),
                    ));
                }
                open = Some((role, Vec::new()));
            }
            Some((true, role)) => {
                let Some((open_role, lines)) = open.take() else {
                    return Err(RenderError::new(
                        "SECTIONS_MALFORMED",
                        format!("End marker \"[ end {} ]\" has no open section.", role.as_str()),
                    ));
                };
                if open_role != role {
                    return Err(RenderError::new(
                        "SECTIONS_MALFORMED",
                        format!(
                            "End marker \"[ end {} ]\" does not match open \"[ {} ]\".",
                            role.as_str(),
                            open_role.as_str()
                        ),
                    ));
                }
                messages.push(Message {
                    role: open_role,
                    content: section_content(lines),
                });
            }
            None => {
                if let Some((_, lines)) = &mut open {
                    lines.push(line);
                }
            }
        }
    }

    if let Some((role, _)) = open {
        return Err(RenderError::new(
            "SECTIONS_MALFORMED",
            format!("Marker \"[ {} ]\" is never closed.", role.as_str()),
        ));
    }

    Ok(messages)
}

/// Section content keeps inner lines verbatim, minus at most one leading
/// and one trailing blank line.
fn section_content(mut lines: Vec<&str>) -> String {
    if lines.first().map(|line| line.trim().is_empty()).unwrap_or(false) {
        lines.remove(0);
    }
    if lines.last().map(|line| line.trim().is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n")
}
