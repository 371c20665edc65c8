/// A line added by a unified diff, with its line number in the new file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedLine<'a> {
    pub line: u32,
    pub content: &'a str,
}

/// Parse the new-file start line out of a hunk header (`@@ -a,b +c,d @@`)
fn hunk_new_start(header: &str) -> Option<u32> {
    let rest = header.strip_prefix("@@")?;
    let plus = rest.split_whitespace().find(|part| part.starts_with('+'))?;
    let start = plus[1..].split(',').next()?;
    start.parse().ok()
}

/// Collect added lines from a single-file unified diff
///
/// Lines before the first hunk header (file headers) are ignored. Malformed
/// hunk headers skip lines until the next valid header.
pub fn added_lines(diff: &str) -> Vec<AddedLine<'_>> {
    let mut added = Vec::new();
    let mut next_line: Option<u32> = None;

    for raw in diff.lines() {
        if raw.starts_with("@@") {
            next_line = hunk_new_start(raw);
            continue;
        }
        let Some(line) = next_line else {
            continue;
        };
        match raw.as_bytes().first() {
            Some(b'+') => {
                added.push(AddedLine {
                    line,
                    content: &raw[1..],
                });
                next_line = Some(line + 1);
            }
            Some(b'-') | Some(b'\\') => {}
            _ => next_line = Some(line + 1),
        }
    }

    added
}

/// Number of added plus removed lines in a unified diff
pub fn changed_line_count(diff: &str) -> usize {
    diff.lines()
        .filter(|l| {
            (l.starts_with('+') && !l.starts_with("+++"))
                || (l.starts_with('-') && !l.starts_with("---"))
        })
        .count()
}
