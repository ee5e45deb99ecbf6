//! Command registry, dispatcher and the read-eval loop.
//!
//! A line is split shell-style, the first word names the command and the rest
//! are its arguments. `-h` or `--help` anywhere among the arguments prints the
//! command's usage instead of running it.

use std::collections::BTreeMap;
use std::io::{self, Write};

use crossterm::style::Stylize;
use ldapsh_core::{NavigationError, Navigator};
use tracing::debug;

use crate::completion::Completer;
use crate::line_editor::{Input, LineSource};

/// What the loop should do after a command returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Errors surfaced to the user at the prompt. None of them end the session.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Syntax error! {reason}\n{usage}")]
    Usage { reason: String, usage: String },

    #[error("No such command: {name}")]
    NoSuchCommand { name: String },

    #[error("Syntax error! {message}")]
    Tokenize { message: String },

    #[error("Malformed attribute: {token}\n{usage}")]
    MalformedAttribute { token: String, usage: String },

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What a command gets to work with while it runs.
pub struct Context<'a> {
    pub navigator: &'a mut Navigator,
    pub registry: &'a CommandRegistry,
    pub out: &'a mut dyn Write,
}

/// A shell command.
pub trait Command {
    fn name(&self) -> &str;

    /// One line shown by `help`.
    fn description(&self) -> &str;

    /// Usage text. `args` are the arguments the command was called with.
    fn usage(&self, navigator: &Navigator, args: &[String]) -> String;

    fn invoke(&self, ctx: &mut Context<'_>, args: &[String]) -> Result<Flow, CommandError>;

    /// Candidates for the last element of `args`, which is the word being
    /// completed and may be empty.
    fn complete(&self, _navigator: &mut Navigator, _args: &[String]) -> Vec<String> {
        Vec::new()
    }
}

/// Build the error for a call with the wrong arguments.
pub fn syntax_error(
    command: &dyn Command,
    navigator: &Navigator,
    args: &[String],
    reason: impl Into<String>,
) -> CommandError {
    CommandError::Usage {
        reason: reason.into(),
        usage: command.usage(navigator, args),
    }
}

/// Leaves the shell.
pub struct ExitCommand {
    name: &'static str,
}

impl ExitCommand {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Command for ExitCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Leave the shell"
    }

    fn usage(&self, _navigator: &Navigator, _args: &[String]) -> String {
        format!("Usage: {}\nExit ldapsh.", self.name)
    }

    fn invoke(&self, _ctx: &mut Context<'_>, _args: &[String]) -> Result<Flow, CommandError> {
        Ok(Flow::Exit)
    }
}

/// Commands by name. Registering a name twice keeps the later command.
pub struct CommandRegistry {
    commands: BTreeMap<String, Box<dyn Command>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// A registry holding `exit` and `quit`.
    pub fn new() -> Self {
        let mut registry = Self {
            commands: BTreeMap::new(),
        };
        registry.register(Box::new(ExitCommand::new("exit")));
        registry.register(Box::new(ExitCommand::new("quit")));
        registry
    }

    pub fn register(&mut self, command: Box<dyn Command>) {
        let name = command.name().to_string();
        if self.commands.insert(name.clone(), command).is_some() {
            debug!(command = %name, "Replaced command");
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    /// Commands in name order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Command> {
        self.commands.values().map(|c| c.as_ref())
    }

    /// Command names starting with `prefix`, sorted.
    pub fn completions(&self, prefix: &str) -> Vec<String> {
        self.commands
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Split `line` into words with shell quoting rules.
pub fn tokenize(line: &str) -> Result<Vec<String>, CommandError> {
    shlex::split(line).ok_or_else(|| CommandError::Tokenize {
        message: "No closing quotation".to_string(),
    })
}

fn wants_help(args: &[String]) -> bool {
    args.iter().any(|a| a == "-h" || a == "--help")
}

/// The interactive shell: a registry, the navigation state and where output goes.
pub struct Shell<W: Write> {
    registry: CommandRegistry,
    navigator: Navigator,
    out: W,
    prompt: String,
    color: bool,
}

impl<W: Write> Shell<W> {
    pub fn new(registry: CommandRegistry, navigator: Navigator, out: W) -> Self {
        Self {
            registry,
            navigator,
            out,
            prompt: "$ ".to_string(),
            color: false,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Run one line. An empty line does nothing.
    pub fn dispatch(&mut self, line: &str) -> Result<Flow, CommandError> {
        let words = tokenize(line)?;
        let Some((name, args)) = words.split_first() else {
            return Ok(Flow::Continue);
        };
        let command = self
            .registry
            .get(name)
            .ok_or_else(|| CommandError::NoSuchCommand { name: name.clone() })?;

        if wants_help(args) {
            writeln!(self.out, "{}", command.usage(&self.navigator, args))?;
            return Ok(Flow::Continue);
        }

        debug!(command = %name, ?args, "Dispatching");
        let mut ctx = Context {
            navigator: &mut self.navigator,
            registry: &self.registry,
            out: &mut self.out,
        };
        command.invoke(&mut ctx, args)
    }

    /// Read and run lines until end of input, an exit command, or an
    /// interrupt at an empty prompt.
    pub fn run(&mut self, source: &mut dyn LineSource) -> io::Result<()> {
        loop {
            let input = {
                let mut completer = Completer::new(&self.registry, &mut self.navigator);
                source.read_line(&self.prompt, &mut completer)?
            };

            match input {
                Input::Eof => break,
                Input::Interrupted { pending } if !pending.is_empty() => continue,
                Input::Interrupted { .. } => break,
                Input::Line(line) => match self.dispatch(&line) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Exit) => break,
                    Err(e) => self.report(&e)?,
                },
            }
        }
        self.out.flush()
    }

    fn report(&mut self, error: &CommandError) -> io::Result<()> {
        debug!(error = %error, "Command failed");
        let message = error.to_string();
        if self.color {
            writeln!(self.out, "{}", message.as_str().red())
        } else {
            writeln!(self.out, "{message}")
        }
    }
}
