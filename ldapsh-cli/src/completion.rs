//! Tab completion.
//!
//! The line editor asks for matches one at a time with an increasing `state`,
//! starting from zero for every Tab press. State zero recomputes and sorts the
//! full match set; later states index into it until they run off the end.

use ldapsh_core::Navigator;

use crate::shell::CommandRegistry;

/// Completion protocol spoken by the line editor.
pub trait Complete {
    /// The `state`-th match for `text`, the word before the cursor, given
    /// `line`, everything before the cursor.
    fn complete(&mut self, text: &str, line: &str, state: usize) -> Option<String>;
}

/// Completes command names in the first word and delegates later words to
/// the named command.
pub struct Completer<'a> {
    registry: &'a CommandRegistry,
    navigator: &'a mut Navigator,
    matches: Vec<String>,
}

impl<'a> Completer<'a> {
    pub fn new(registry: &'a CommandRegistry, navigator: &'a mut Navigator) -> Self {
        Self {
            registry,
            navigator,
            matches: Vec::new(),
        }
    }

    fn candidates(&mut self, text: &str, line: &str) -> Vec<String> {
        let mut words = shlex::split(line)
            .unwrap_or_else(|| line.split_whitespace().map(str::to_string).collect());
        let trailing_space = line.ends_with([' ', '\t']);

        if words.len() > 1 || (words.len() == 1 && trailing_space) {
            let name = words.remove(0);
            let Some(command) = self.registry.get(&name) else {
                return Vec::new();
            };
            if trailing_space {
                words.push(String::new());
            }
            command.complete(self.navigator, &words)
        } else {
            self.registry.completions(text)
        }
    }
}

impl Complete for Completer<'_> {
    fn complete(&mut self, text: &str, line: &str, state: usize) -> Option<String> {
        if state == 0 {
            self.matches = self.candidates(text, line);
            self.matches.sort();
        }
        self.matches.get(state).cloned()
    }
}

/// Collect every match for one Tab press.
pub fn all_matches(completer: &mut dyn Complete, text: &str, line: &str) -> Vec<String> {
    (0..)
        .map_while(|state| completer.complete(text, line, state))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldapsh_core::{Attributes, DirectoryTree, MemoryDirectory};
    use pretty_assertions::assert_eq;

    use crate::commands;

    fn navigator() -> Navigator {
        let dir = MemoryDirectory::new();
        for root in ["dc=other,dc=com", "dc=example,dc=com"] {
            dir.add_root(root);
            dir.insert(root, Attributes::new()).unwrap();
        }
        dir.insert("ou=people,dc=example,dc=com", Attributes::new())
            .unwrap();
        dir.insert("ou=groups,dc=example,dc=com", Attributes::new())
            .unwrap();
        Navigator::new(DirectoryTree::new(Box::new(dir)).unwrap())
    }

    #[test]
    fn test_empty_line_lists_all_commands() {
        let registry = commands::registry();
        let mut nav = navigator();
        let mut completer = Completer::new(&registry, &mut nav);
        let all = all_matches(&mut completer, "", "");
        assert_eq!(all.len(), registry.len());
        assert!(all.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_first_word_matches_command_names() {
        let registry = commands::registry();
        let mut nav = navigator();
        let mut completer = Completer::new(&registry, &mut nav);
        assert_eq!(all_matches(&mut completer, "c", "c"), vec!["cat", "cd"]);
        assert_eq!(all_matches(&mut completer, "ex", "ex"), vec!["exit"]);
        assert!(all_matches(&mut completer, "zz", "zz").is_empty());
    }

    #[test]
    fn test_root_children_sorted() {
        let registry = commands::registry();
        let mut nav = navigator();
        let mut completer = Completer::new(&registry, &mut nav);
        assert_eq!(
            all_matches(&mut completer, "", "cd "),
            vec!["dc=example,dc=com", "dc=other,dc=com"]
        );
        assert_eq!(
            all_matches(&mut completer, "dc=o", "cat dc=o"),
            vec!["dc=other,dc=com"]
        );
    }

    #[test]
    fn test_modify_second_word() {
        let registry = commands::registry();
        let mut nav = navigator();
        nav.change_directory("dc=example,dc=com").unwrap();
        let mut completer = Completer::new(&registry, &mut nav);
        assert_eq!(
            all_matches(&mut completer, "", "modify ou=people "),
            vec!["add", "delete", "replace"]
        );
        assert_eq!(
            all_matches(&mut completer, "re", "modify ou=people re"),
            vec!["replace"]
        );
        assert_eq!(
            all_matches(&mut completer, "ou=", "modify ou="),
            vec!["ou=groups", "ou=people"]
        );
        assert!(all_matches(&mut completer, "", "modify ou=people add ").is_empty());
    }

    #[test]
    fn test_unknown_command_or_no_completer() {
        let registry = commands::registry();
        let mut nav = navigator();
        let mut completer = Completer::new(&registry, &mut nav);
        assert!(all_matches(&mut completer, "", "bogus ").is_empty());
        assert!(all_matches(&mut completer, "", "ls ").is_empty());
    }

    #[test]
    fn test_state_out_of_range() {
        let registry = commands::registry();
        let mut nav = navigator();
        let mut completer = Completer::new(&registry, &mut nav);
        assert_eq!(completer.complete("pw", "pw", 0), Some("pwd".to_string()));
        assert_eq!(completer.complete("pw", "pw", 1), None);
        assert_eq!(completer.complete("pw", "pw", 7), None);
    }
}
