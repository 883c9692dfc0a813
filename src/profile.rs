use std::path::Path;

use crate::config::Config;
use crate::error::SimError;
use crate::task::{ChildDescriptor, TaskKind2};

/// Output of a successful parse: the top-level run settings plus the
/// forest of children hung directly off the seed task.
#[derive(Debug, Clone)]
pub struct ParsedProfile {
    pub config: Config,
    pub root_children: Vec<ChildDescriptor>,
}

struct Token {
    text: String,
    line: usize,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line = idx + 1;
        let code = match raw_line.find(';') {
            Some(at) => &raw_line[..at],
            None => raw_line,
        };
        for word in code.split_whitespace() {
            tokens.push(Token {
                text: word.to_string(),
                line,
            });
        }
    }
    tokens
}

fn malformed(line: usize, reason: impl Into<String>) -> SimError {
    SimError::ProfileMalformed {
        line,
        reason: reason.into(),
    }
}

fn parse_int(tok: &Token) -> Result<i64, SimError> {
    tok.text
        .parse::<i64>()
        .map_err(|_| malformed(tok.line, format!("expected integer, found '{}'", tok.text)))
}

struct RawNode {
    descriptor: ChildDescriptor,
    children: Vec<usize>,
}

/// Reads a profile file into a [`ParsedProfile`]. Keyword handling and the
/// `SPAWN`/`ENDSPAWN` scoping rules follow the original `readProfile`
/// state machine: `NEWPROCESS` attaches the new node to whatever scope is
/// currently open, `SPAWN` descends into the node being edited, `ENDSPAWN`
/// ascends back out and reopens that same node for further field edits.
pub fn parse(path: &Path) -> Result<ParsedProfile, SimError> {
    let text = std::fs::read_to_string(path).map_err(|_| SimError::ProfileNotFound {
        path: path.display().to_string(),
    })?;

    let tokens = tokenize(&text);
    let mut iter = tokens.into_iter().peekable();

    let mut config = Config::default();
    let mut arena: Vec<RawNode> = Vec::new();
    let mut root_children: Vec<usize> = Vec::new();
    let mut scope_stack: Vec<usize> = Vec::new();
    let mut building: Option<usize> = None;

    while let Some(tok) = iter.next() {
        let keyword = tok
            .text
            .strip_prefix('#')
            .ok_or_else(|| malformed(tok.line, "missing '#' at beginning of command"))?;

        macro_rules! need_value {
            () => {
                iter.next()
                    .ok_or_else(|| malformed(tok.line, "missing value"))?
            };
        }
        macro_rules! need_building {
            () => {
                building.ok_or_else(|| malformed(tok.line, format!("{} outside NEWPROCESS", keyword)))?
            };
        }

        match keyword {
            "CYCLE_TIME" => {
                let v = parse_int(&need_value!())?;
                if v < 0 {
                    return Err(malformed(tok.line, "CYCLE_TIME must be non-negative"));
                }
                config.cycle_sleep_microseconds = Some(v as u64);
            }
            "SEED" => {
                let v = parse_int(&need_value!())?;
                config.seed = v as u64;
            }
            "ENDTIME" => {
                let v = parse_int(&need_value!())?;
                if v < 0 {
                    return Err(malformed(tok.line, "ENDTIME must be non-negative"));
                }
                config.end_time_ms = Some(v as u64);
            }
            "NEWPROCESS" => {
                let idx = arena.len();
                arena.push(RawNode {
                    descriptor: ChildDescriptor::default(),
                    children: Vec::new(),
                });
                match scope_stack.last() {
                    Some(&parent) => arena[parent].children.push(idx),
                    None => root_children.push(idx),
                }
                building = Some(idx);
            }
            "ENDPROCESS" => {
                need_building!();
                building = None;
            }
            "NAME" => {
                let v = need_value!();
                let idx = need_building!();
                arena[idx].descriptor.name = v.text;
            }
            "TYPE" => {
                let v = need_value!();
                let idx = need_building!();
                arena[idx].descriptor.kind = match v.text.as_str() {
                    "INTERACTIVE" => TaskKind2::Interactive,
                    "NONINTERACTIVE" => TaskKind2::NonInteractive,
                    other => {
                        return Err(malformed(v.line, format!("unknown type '{}'", other)))
                    }
                };
            }
            "NICE" => {
                let v = parse_int(&need_value!())?;
                let idx = need_building!();
                arena[idx].descriptor.nice = if (-19..=20).contains(&v) { v as i32 } else { 0 };
            }
            "KILLTIME" => {
                let v = parse_int(&need_value!())?;
                let idx = need_building!();
                arena[idx].descriptor.kill_time_ms = if v < 0 { None } else { Some(v) };
            }
            "SPAWNTIME" => {
                let v = parse_int(&need_value!())?;
                if v < 0 {
                    return Err(malformed(tok.line, "SPAWNTIME must be non-negative"));
                }
                let idx = need_building!();
                arena[idx].descriptor.spawn_time_ms = v as u64;
            }
            "SPAWN" => {
                let idx = need_building!();
                scope_stack.push(idx);
            }
            "ENDSPAWN" => {
                let idx = scope_stack
                    .pop()
                    .ok_or_else(|| malformed(tok.line, "ENDSPAWN without matching SPAWN"))?;
                building = Some(idx);
            }
            other => {
                return Err(malformed(tok.line, format!("unknown command '{}'", other)));
            }
        }
    }

    if !scope_stack.is_empty() {
        return Err(malformed(0, "unbalanced SPAWN at end of file"));
    }

    fn build(idx: usize, arena: &[RawNode]) -> ChildDescriptor {
        let mut descriptor = arena[idx].descriptor.clone();
        descriptor.children = arena[idx]
            .children
            .iter()
            .map(|&c| build(c, arena))
            .collect();
        descriptor
    }

    let root_children = root_children.iter().map(|&idx| build(idx, &arena)).collect();

    Ok(ParsedProfile {
        config,
        root_children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_profile(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_profile_is_reported() {
        let err = parse(Path::new("/does/not/exist.profile")).unwrap_err();
        assert!(matches!(err, SimError::ProfileNotFound { .. }));
    }

    #[test]
    fn unknown_keyword_is_malformed() {
        let file = write_profile("#BOGUS 1\n");
        let err = parse(file.path()).unwrap_err();
        assert!(matches!(err, SimError::ProfileMalformed { line: 1, .. }));
    }

    #[test]
    fn flat_child_is_parsed() {
        let file = write_profile(
            "#CYCLE_TIME 500000\n#SEED 7\n#NEWPROCESS\n#NAME child\n#TYPE INTERACTIVE\n#NICE 0\n#KILLTIME -1\n#SPAWNTIME 0\n#ENDPROCESS\n",
        );
        let parsed = parse(file.path()).unwrap();
        assert_eq!(parsed.config.cycle_sleep_microseconds, Some(500_000));
        assert_eq!(parsed.config.seed, 7);
        assert_eq!(parsed.root_children.len(), 1);
        assert_eq!(parsed.root_children[0].name, "child");
        assert!(parsed.root_children[0].kill_time_ms.is_none());
    }

    #[test]
    fn nested_spawn_builds_a_subtree() {
        let file = write_profile(
            "#NEWPROCESS\n#NAME A\n#SPAWN\n#NEWPROCESS\n#NAME B\n#ENDPROCESS\n#ENDSPAWN\n#ENDPROCESS\n",
        );
        let parsed = parse(file.path()).unwrap();
        assert_eq!(parsed.root_children.len(), 1);
        assert_eq!(parsed.root_children[0].name, "A");
        assert_eq!(parsed.root_children[0].children.len(), 1);
        assert_eq!(parsed.root_children[0].children[0].name, "B");
    }

    #[test]
    fn unbalanced_spawn_is_rejected() {
        let file = write_profile("#NEWPROCESS\n#NAME A\n#SPAWN\n#ENDPROCESS\n");
        let err = parse(file.path()).unwrap_err();
        assert!(matches!(err, SimError::ProfileMalformed { .. }));
    }

    #[test]
    fn field_outside_newprocess_is_rejected() {
        let file = write_profile("#NAME orphan\n");
        let err = parse(file.path()).unwrap_err();
        assert!(matches!(err, SimError::ProfileMalformed { .. }));
    }
}
