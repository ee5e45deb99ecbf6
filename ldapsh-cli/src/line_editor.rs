//! Interactive line input with history and Tab completion.
//!
//! A crossterm raw-mode editor providing:
//! - Up/Down arrow history navigation with draft preservation
//! - Tab completion: a unique match is inserted, several matches extend the
//!   word to their common prefix, a second Tab lists them
//! - Ctrl-C abandons the line, Ctrl-D on an empty line ends input
//! - Persistent history file
//!
//! When stdin is not a terminal, lines are read plainly without editing.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal,
};
use tracing::warn;

use crate::completion::{Complete, all_matches};

/// One read from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// Ctrl-C, with whatever had been typed so far.
    Interrupted { pending: String },
    Eof,
}

/// Anything the shell can read lines from.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str, completer: &mut dyn Complete) -> io::Result<Input>;
}

/// Persistent command history.
pub struct InputHistory {
    entries: Vec<String>,
    index: Option<usize>,
    draft: Option<String>,
    file_path: Option<PathBuf>,
    max_entries: usize,
}

impl InputHistory {
    /// Load history from `file_path`, or keep it in memory only.
    pub fn new(file_path: Option<PathBuf>, max_entries: usize) -> Self {
        let mut entries = file_path
            .as_deref()
            .map(Self::load_from_file)
            .unwrap_or_default();
        if entries.len() > max_entries {
            entries.drain(..entries.len() - max_entries);
        }
        Self {
            entries,
            index: None,
            draft: None,
            file_path,
            max_entries,
        }
    }

    fn load_from_file(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect()
    }

    fn save_to_file(&self) {
        let Some(path) = &self.file_path else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let content: String = self.entries.iter().map(|e| format!("{e}\n")).collect();
        if let Err(e) = std::fs::write(path, content) {
            warn!(path = %path.display(), error = %e, "Failed to write input history");
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Push a new entry, skipping blanks and consecutive duplicates.
    pub fn push(&mut self, entry: &str) {
        let trimmed = entry.trim().to_string();
        if trimmed.is_empty() {
            return;
        }
        if self.entries.last() == Some(&trimmed) {
            self.reset_navigation();
            return;
        }
        self.entries.push(trimmed);
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
        self.save_to_file();
        self.reset_navigation();
    }

    /// Older entry. The first step saves `current_buffer` as the draft.
    fn navigate_up(&mut self, current_buffer: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        match self.index {
            None => {
                self.draft = Some(current_buffer.to_string());
                self.index = Some(self.entries.len() - 1);
            }
            Some(0) => {}
            Some(ref mut idx) => *idx -= 1,
        }
        self.index.map(|i| self.entries[i].as_str())
    }

    /// Newer entry, or the draft once past the newest.
    fn navigate_down(&mut self) -> Option<String> {
        let idx = self.index?;
        if idx + 1 >= self.entries.len() {
            self.index = None;
            self.draft.take()
        } else {
            self.index = Some(idx + 1);
            Some(self.entries[idx + 1].clone())
        }
    }

    fn reset_navigation(&mut self) {
        self.index = None;
        self.draft = None;
    }
}

/// What a Tab press does to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabAction {
    /// Replace the buffer and move the cursor.
    Edit { buffer: String, cursor: usize },
    /// Show these candidates below the prompt.
    List(Vec<String>),
    /// Nothing to complete.
    None,
}

/// Byte offset where the word ending at `line`'s end starts.
fn word_start(line: &str) -> usize {
    line.rfind(char::is_whitespace)
        .map(|i| i + line[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0)
}

/// Longest prefix shared by every candidate.
pub fn common_prefix(candidates: &[String]) -> &str {
    let Some(first) = candidates.first() else {
        return "";
    };
    let mut end = first.len();
    for other in &candidates[1..] {
        end = first[..end]
            .char_indices()
            .zip(other.chars())
            .find(|((_, a), b)| a != b)
            .map_or(end.min(other.len()), |((i, _), _)| i);
    }
    &first[..end]
}

/// Work out the effect of Tab with the cursor at byte offset `cursor`.
/// `repeated` is set when the previous key was also Tab.
pub fn tab_action(
    completer: &mut dyn Complete,
    buffer: &str,
    cursor: usize,
    repeated: bool,
) -> TabAction {
    let line = &buffer[..cursor];
    let start = word_start(line);
    let text = &line[start..];
    let matches = all_matches(completer, text, line);

    let tail = &buffer[word_end(buffer, cursor)..];
    let replace = |word: &str, suffix: &str| {
        let mut edited = format!("{}{word}{suffix}", &buffer[..start]);
        let cursor = edited.len();
        edited.push_str(tail);
        TabAction::Edit {
            buffer: edited,
            cursor,
        }
    };

    match matches.as_slice() {
        [] => TabAction::None,
        [only] if tail.starts_with(char::is_whitespace) => replace(only.as_str(), ""),
        [only] => replace(only.as_str(), " "),
        _ => {
            let prefix = common_prefix(&matches);
            if prefix.len() > text.len() {
                replace(prefix, "")
            } else if repeated {
                TabAction::List(matches.clone())
            } else {
                TabAction::None
            }
        }
    }
}

/// Byte offset where the word containing `cursor` ends.
fn word_end(buffer: &str, cursor: usize) -> usize {
    buffer[cursor..]
        .find(char::is_whitespace)
        .map_or(buffer.len(), |i| cursor + i)
}

/// Terminal line editor.
pub struct LineEditor {
    history: InputHistory,
    /// Number of candidate lines currently displayed below the input.
    rendered_lines: usize,
}

impl LineEditor {
    pub fn new(history: InputHistory) -> Self {
        Self {
            history,
            rendered_lines: 0,
        }
    }

    /// Read one line without editing. Scripted input stays out of history.
    fn read_plain(
        &mut self,
        input: &mut impl BufRead,
        out: &mut impl Write,
        prompt: &str,
    ) -> io::Result<Input> {
        write!(out, "{prompt}")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(Input::Eof);
        }
        Ok(Input::Line(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn read_line_raw(&mut self, prompt: &str, completer: &mut dyn Complete) -> io::Result<Input> {
        let mut buffer = String::new();
        let mut cursor_pos: usize = 0;
        let mut last_was_tab = false;

        loop {
            let Event::Key(KeyEvent {
                code,
                modifiers,
                kind,
                ..
            }) = event::read()?
            else {
                continue;
            };
            if kind == KeyEventKind::Release {
                continue;
            }
            let is_tab = code == KeyCode::Tab;

            match (code, modifiers) {
                (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                    self.clear_candidate_lines()?;
                    return Ok(Input::Interrupted { pending: buffer });
                }
                (KeyCode::Char('d'), KeyModifiers::CONTROL) => {
                    if buffer.is_empty() {
                        return Ok(Input::Eof);
                    }
                }
                (KeyCode::Tab, _) => {
                    match tab_action(completer, &buffer, cursor_pos, last_was_tab) {
                        TabAction::Edit {
                            buffer: edited,
                            cursor,
                        } => {
                            buffer = edited;
                            cursor_pos = cursor;
                            self.clear_candidate_lines()?;
                        }
                        TabAction::List(candidates) => {
                            self.render_candidates(&candidates)?;
                        }
                        TabAction::None => {}
                    }
                    self.redraw_input(prompt, &buffer, cursor_pos)?;
                }
                (KeyCode::Enter, _) => {
                    self.clear_candidate_lines()?;
                    self.history.push(&buffer);
                    return Ok(Input::Line(buffer));
                }
                (KeyCode::Up, _) => {
                    if let Some(entry) = self.history.navigate_up(&buffer) {
                        buffer = entry.to_string();
                        cursor_pos = buffer.len();
                        self.redraw_input(prompt, &buffer, cursor_pos)?;
                    }
                }
                (KeyCode::Down, _) => {
                    if let Some(entry) = self.history.navigate_down() {
                        buffer = entry;
                        cursor_pos = buffer.len();
                        self.redraw_input(prompt, &buffer, cursor_pos)?;
                    }
                }
                (KeyCode::Left, _) => {
                    if let Some(c) = buffer[..cursor_pos].chars().next_back() {
                        cursor_pos -= c.len_utf8();
                    }
                    self.redraw_input(prompt, &buffer, cursor_pos)?;
                }
                (KeyCode::Right, _) => {
                    if let Some(c) = buffer[cursor_pos..].chars().next() {
                        cursor_pos += c.len_utf8();
                    }
                    self.redraw_input(prompt, &buffer, cursor_pos)?;
                }
                (KeyCode::Backspace, _) => {
                    if let Some(c) = buffer[..cursor_pos].chars().next_back() {
                        cursor_pos -= c.len_utf8();
                        buffer.remove(cursor_pos);
                    }
                    self.redraw_input(prompt, &buffer, cursor_pos)?;
                }
                (KeyCode::Delete, _) => {
                    if cursor_pos < buffer.len() {
                        buffer.remove(cursor_pos);
                    }
                    self.redraw_input(prompt, &buffer, cursor_pos)?;
                }
                (KeyCode::Home, _) | (KeyCode::Char('a'), KeyModifiers::CONTROL) => {
                    cursor_pos = 0;
                    self.redraw_input(prompt, &buffer, cursor_pos)?;
                }
                (KeyCode::End, _) | (KeyCode::Char('e'), KeyModifiers::CONTROL) => {
                    cursor_pos = buffer.len();
                    self.redraw_input(prompt, &buffer, cursor_pos)?;
                }
                (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                    buffer.insert(cursor_pos, c);
                    cursor_pos += c.len_utf8();
                    self.history.reset_navigation();
                    self.redraw_input(prompt, &buffer, cursor_pos)?;
                }
                _ => {}
            }
            last_was_tab = is_tab;
        }
    }

    /// Print candidates on the lines below the input, then return to it.
    fn render_candidates(&mut self, candidates: &[String]) -> io::Result<()> {
        self.clear_candidate_lines()?;
        let width = terminal::size().map(|(w, _)| w as usize).unwrap_or(80);
        let column = candidates.iter().map(|c| c.chars().count()).max().unwrap_or(0) + 2;
        let per_row = (width / column).max(1);

        let rows: Vec<String> = candidates
            .chunks(per_row)
            .map(|row| {
                row.iter()
                    .map(|c| format!("{c:<column$}"))
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect();

        let mut stdout = io::stdout();
        for row in &rows {
            write!(stdout, "\r\n\x1b[2K{row}")?;
        }
        if !rows.is_empty() {
            write!(stdout, "\x1b[{}A", rows.len())?;
        }
        stdout.flush()?;
        self.rendered_lines = rows.len();
        Ok(())
    }

    fn clear_candidate_lines(&mut self) -> io::Result<()> {
        if self.rendered_lines > 0 {
            let mut stdout = io::stdout();
            for _ in 0..self.rendered_lines {
                write!(stdout, "\r\n\x1b[2K")?;
            }
            write!(stdout, "\x1b[{}A", self.rendered_lines)?;
            stdout.flush()?;
            self.rendered_lines = 0;
        }
        Ok(())
    }

    /// Redraw the prompt and buffer, leaving the cursor at `cursor_pos`.
    fn redraw_input(&self, prompt: &str, buffer: &str, cursor_pos: usize) -> io::Result<()> {
        let mut stdout = io::stdout();
        write!(stdout, "\r\x1b[2K{prompt}{buffer}")?;
        let chars_after_cursor = buffer[cursor_pos..].chars().count();
        if chars_after_cursor > 0 {
            write!(stdout, "{}", cursor::MoveLeft(chars_after_cursor as u16))?;
        }
        stdout.flush()
    }
}

impl LineSource for LineEditor {
    /// Enables raw mode while reading, restores it on return.
    fn read_line(&mut self, prompt: &str, completer: &mut dyn Complete) -> io::Result<Input> {
        if !io::stdin().is_terminal() {
            return self.read_plain(&mut io::stdin().lock(), &mut io::stdout(), prompt);
        }

        print!("{prompt}");
        io::stdout().flush()?;

        terminal::enable_raw_mode()?;
        let result = self.read_line_raw(prompt, completer);
        terminal::disable_raw_mode()?;

        print!("\r\n");
        io::stdout().flush()?;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Completes the last word from a fixed word list.
    struct Words(Vec<&'static str>);

    impl Complete for Words {
        fn complete(&mut self, text: &str, _line: &str, state: usize) -> Option<String> {
            self.0
                .iter()
                .filter(|w| w.starts_with(text))
                .nth(state)
                .map(|w| w.to_string())
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_common_prefix() {
        assert_eq!(common_prefix(&[]), "");
        assert_eq!(common_prefix(&strings(&["ou=people"])), "ou=people");
        assert_eq!(common_prefix(&strings(&["ou=people", "ou=groups"])), "ou=");
        assert_eq!(common_prefix(&strings(&["cat", "cd", "c"])), "c");
        assert_eq!(common_prefix(&strings(&["abc", "xyz"])), "");
        assert_eq!(common_prefix(&strings(&["cn=é1", "cn=é2"])), "cn=é");
    }

    #[test]
    fn test_word_start() {
        assert_eq!(word_start(""), 0);
        assert_eq!(word_start("cd"), 0);
        assert_eq!(word_start("cd "), 3);
        assert_eq!(word_start("cd ou=p"), 3);
    }

    #[test]
    fn test_unique_match_inserted_with_space() {
        let mut words = Words(vec!["cat", "cd", "pwd"]);
        assert_eq!(
            tab_action(&mut words, "pw", 2, false),
            TabAction::Edit {
                buffer: "pwd ".into(),
                cursor: 4
            }
        );
        assert_eq!(
            tab_action(&mut words, "cat ca", 6, false),
            TabAction::Edit {
                buffer: "cat cat ".into(),
                cursor: 8
            }
        );
    }

    #[test]
    fn test_ambiguous_extends_then_lists() {
        let mut words = Words(vec!["ou=people", "ou=groups"]);
        assert_eq!(
            tab_action(&mut words, "cd o", 4, false),
            TabAction::Edit {
                buffer: "cd ou=".into(),
                cursor: 6
            }
        );
        assert_eq!(tab_action(&mut words, "cd ou=", 6, false), TabAction::None);
        assert_eq!(
            tab_action(&mut words, "cd ou=", 6, true),
            TabAction::List(strings(&["ou=people", "ou=groups"]))
        );
    }

    #[test]
    fn test_completion_mid_line_keeps_tail() {
        let mut words = Words(vec!["ou=people"]);
        assert_eq!(
            tab_action(&mut words, "cat ou=p extra", 8, false),
            TabAction::Edit {
                buffer: "cat ou=people extra".into(),
                cursor: 13
            }
        );
        assert_eq!(
            tab_action(&mut words, "cat ou=pextra", 8, false),
            TabAction::Edit {
                buffer: "cat ou=people ".into(),
                cursor: 14
            }
        );
    }

    #[test]
    fn test_no_match() {
        let mut words = Words(vec!["cat"]);
        assert_eq!(tab_action(&mut words, "zz", 2, true), TabAction::None);
    }

    #[test]
    fn test_plain_input_skips_history() {
        let mut editor = LineEditor::new(InputHistory::new(None, 10));
        let mut input = io::Cursor::new("ls\r\ncd ou=people\n");
        let mut out = Vec::new();

        assert_eq!(
            editor.read_plain(&mut input, &mut out, "> ").unwrap(),
            Input::Line("ls".into())
        );
        assert_eq!(
            editor.read_plain(&mut input, &mut out, "> ").unwrap(),
            Input::Line("cd ou=people".into())
        );
        assert_eq!(editor.read_plain(&mut input, &mut out, "> ").unwrap(), Input::Eof);
        assert_eq!(out, b"> > > ");
        assert!(editor.history.entries().is_empty());
    }

    #[test]
    fn test_history_dedup_and_cap() {
        let mut history = InputHistory::new(None, 3);
        for entry in ["ls", "ls", "  ", "cd a", "pwd", "cat x"] {
            history.push(entry);
        }
        assert_eq!(history.entries(), &strings(&["cd a", "pwd", "cat x"])[..]);
    }

    #[test]
    fn test_history_navigation_restores_draft() {
        let mut history = InputHistory::new(None, 10);
        history.push("ls");
        history.push("pwd");

        assert_eq!(history.navigate_up("dra"), Some("pwd"));
        assert_eq!(history.navigate_up("ignored"), Some("ls"));
        assert_eq!(history.navigate_up("ignored"), Some("ls"));
        assert_eq!(history.navigate_down(), Some("pwd".to_string()));
        assert_eq!(history.navigate_down(), Some("dra".to_string()));
        assert_eq!(history.navigate_down(), None);
    }

    #[test]
    fn test_history_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("input_history");

        let mut history = InputHistory::new(Some(path.clone()), 10);
        history.push("cd dc=example,dc=com");
        history.push("ls");

        let reloaded = InputHistory::new(Some(path), 1);
        assert_eq!(reloaded.entries(), &strings(&["ls"])[..]);
    }
}
