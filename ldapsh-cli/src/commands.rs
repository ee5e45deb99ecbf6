//! The shell commands.

use ldapsh_core::{Attributes, Navigator};

use crate::shell::{Command, CommandError, CommandRegistry, Context, Flow, syntax_error};

/// A registry with every shell command.
pub fn registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(Box::new(List));
    registry.register(Box::new(ChangeDirectory));
    registry.register(Box::new(PrintWorkingDirectory));
    registry.register(Box::new(Cat));
    registry.register(Box::new(Modify));
    registry.register(Box::new(Delete));
    registry.register(Box::new(Add));

    let mut names: Vec<String> = registry.iter().map(|c| c.name().to_string()).collect();
    names.push("help".to_string());
    names.sort();
    registry.register(Box::new(Help { names }));
    registry
}

/// Children of the current object matching the word being completed, if that
/// word is the first argument.
fn complete_first_child(navigator: &mut Navigator, args: &[String]) -> Vec<String> {
    match args {
        [] => navigator.children().unwrap_or_default(),
        [prefix] => navigator.complete_child(prefix).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn no_arguments(
    command: &dyn Command,
    ctx: &Context<'_>,
    args: &[String],
) -> Result<(), CommandError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(syntax_error(
            command,
            ctx.navigator,
            args,
            format!("{} must be called without arguments", command.name()),
        ))
    }
}

fn one_argument<'a>(
    command: &dyn Command,
    ctx: &Context<'_>,
    args: &'a [String],
) -> Result<&'a str, CommandError> {
    match args {
        [arg] => Ok(arg.as_str()),
        _ => Err(syntax_error(
            command,
            ctx.navigator,
            args,
            format!("{} must be called with exactly one argument", command.name()),
        )),
    }
}

struct List;

impl Command for List {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List the children of the current object"
    }

    fn usage(&self, navigator: &Navigator, _args: &[String]) -> String {
        format!(
            "Usage: ls\nLists children of the current DN (currently: {}).",
            navigator.cwd()
        )
    }

    fn invoke(&self, ctx: &mut Context<'_>, args: &[String]) -> Result<Flow, CommandError> {
        no_arguments(self, ctx, args)?;
        let children = ctx.navigator.children()?;
        writeln!(ctx.out, "{}", children.join("\t"))?;
        Ok(Flow::Continue)
    }
}

struct ChangeDirectory;

impl Command for ChangeDirectory {
    fn name(&self) -> &str {
        "cd"
    }

    fn description(&self) -> &str {
        "Move to a child, or to the parent with .."
    }

    fn usage(&self, _navigator: &Navigator, _args: &[String]) -> String {
        "Usage: cd relativeDN\nChanges the current DN to the child named by relativeDN, \
         or to the parent if relativeDN is \"..\"."
            .to_string()
    }

    fn invoke(&self, ctx: &mut Context<'_>, args: &[String]) -> Result<Flow, CommandError> {
        let name = one_argument(self, ctx, args)?;
        ctx.navigator.change_directory(name)?;
        Ok(Flow::Continue)
    }

    fn complete(&self, navigator: &mut Navigator, args: &[String]) -> Vec<String> {
        complete_first_child(navigator, args)
    }
}

struct PrintWorkingDirectory;

impl Command for PrintWorkingDirectory {
    fn name(&self) -> &str {
        "pwd"
    }

    fn description(&self) -> &str {
        "Print the current DN"
    }

    fn usage(&self, navigator: &Navigator, _args: &[String]) -> String {
        format!(
            "Usage: pwd\nPrints the current DN (which currently is: {}).",
            navigator.cwd()
        )
    }

    fn invoke(&self, ctx: &mut Context<'_>, args: &[String]) -> Result<Flow, CommandError> {
        no_arguments(self, ctx, args)?;
        writeln!(ctx.out, "{}", ctx.navigator.cwd())?;
        Ok(Flow::Continue)
    }
}

struct Cat;

impl Command for Cat {
    fn name(&self) -> &str {
        "cat"
    }

    fn description(&self) -> &str {
        "Print the attributes of an object"
    }

    fn usage(&self, _navigator: &Navigator, _args: &[String]) -> String {
        "Usage: cat relativeDN\nPrints the attributes of the object named by relativeDN."
            .to_string()
    }

    fn invoke(&self, ctx: &mut Context<'_>, args: &[String]) -> Result<Flow, CommandError> {
        let name = one_argument(self, ctx, args)?;
        let attributes = ctx.navigator.attributes(name)?;
        for (attribute, values) in attributes {
            for value in values {
                writeln!(ctx.out, "{attribute}: {value}")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn complete(&self, navigator: &mut Navigator, args: &[String]) -> Vec<String> {
        complete_first_child(navigator, args)
    }
}

struct Modify;

const MODIFY_SUBCOMMANDS: [&str; 3] = ["add", "delete", "replace"];

impl Modify {
    fn wrong_arity(&self, ctx: &Context<'_>, args: &[String], subcommand: &str) -> CommandError {
        syntax_error(
            self,
            ctx.navigator,
            args,
            format!("modify {subcommand} was called with wrong number of parameters"),
        )
    }
}

impl Command for Modify {
    fn name(&self) -> &str {
        "modify"
    }

    fn description(&self) -> &str {
        "Add, delete or replace an attribute value"
    }

    fn usage(&self, _navigator: &Navigator, _args: &[String]) -> String {
        "Usage: modify relativeDN (add|delete|replace) ...\n\
         Modifies an attribute of the object named by relativeDN.\n\
         \n\
         Subcommands:\n    \
             add ATTRIBUTE VALUE       - adds VALUE to ATTRIBUTE\n    \
             delete ATTRIBUTE VALUE    - removes VALUE from ATTRIBUTE\n    \
             replace ATTRIBUTE OLD NEW - replaces OLD value with NEW value in ATTRIBUTE"
            .to_string()
    }

    fn invoke(&self, ctx: &mut Context<'_>, args: &[String]) -> Result<Flow, CommandError> {
        let [name, subcommand, rest @ ..] = args else {
            return Err(syntax_error(
                self,
                ctx.navigator,
                args,
                "modify called with too few arguments",
            ));
        };

        let (attribute, new_value, old_value) = match (subcommand.as_str(), rest) {
            ("add", [attribute, value]) => (attribute, Some(value.as_str()), None),
            ("delete", [attribute, value]) => (attribute, None, Some(value.as_str())),
            ("replace", [attribute, old, new]) => {
                (attribute, Some(new.as_str()), Some(old.as_str()))
            }
            ("add" | "delete" | "replace", _) => {
                return Err(self.wrong_arity(ctx, args, subcommand));
            }
            (other, _) => {
                return Err(syntax_error(
                    self,
                    ctx.navigator,
                    args,
                    format!("No such subcommand: {other}"),
                ));
            }
        };

        ctx.navigator
            .set_attribute(name, attribute, new_value, old_value)?;
        Ok(Flow::Continue)
    }

    fn complete(&self, navigator: &mut Navigator, args: &[String]) -> Vec<String> {
        match args {
            [_, prefix] => MODIFY_SUBCOMMANDS
                .iter()
                .filter(|s| s.starts_with(prefix.as_str()))
                .map(|s| s.to_string())
                .collect(),
            _ => complete_first_child(navigator, args),
        }
    }
}

struct Delete;

impl Command for Delete {
    fn name(&self) -> &str {
        "delete"
    }

    fn description(&self) -> &str {
        "Delete an object and everything below it"
    }

    fn usage(&self, _navigator: &Navigator, _args: &[String]) -> String {
        "Usage: delete relativeDN\n\
         Deletes the object named by relativeDN. Children are deleted recursively."
            .to_string()
    }

    fn invoke(&self, ctx: &mut Context<'_>, args: &[String]) -> Result<Flow, CommandError> {
        let name = one_argument(self, ctx, args)?;
        ctx.navigator.delete(name)?;
        Ok(Flow::Continue)
    }

    fn complete(&self, navigator: &mut Navigator, args: &[String]) -> Vec<String> {
        complete_first_child(navigator, args)
    }
}

struct Add;

impl Command for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Create an object below the current one"
    }

    fn usage(&self, _navigator: &Navigator, _args: &[String]) -> String {
        "Usage: add relativeDN (attribute:value)+\n\
         Adds an object named relativeDN with the given attributes below the current object.\n\
         Repeat an attribute to give it several values."
            .to_string()
    }

    fn invoke(&self, ctx: &mut Context<'_>, args: &[String]) -> Result<Flow, CommandError> {
        let [rdn, pairs @ ..] = args else {
            return Err(self.too_few(ctx, args));
        };
        if pairs.is_empty() {
            return Err(self.too_few(ctx, args));
        }

        let mut attributes = Attributes::new();
        for raw in pairs {
            let Some((attribute, value)) = raw.split_once(':') else {
                return Err(CommandError::MalformedAttribute {
                    token: raw.clone(),
                    usage: self.usage(ctx.navigator, args),
                });
            };
            attributes
                .entry(attribute.to_string())
                .or_default()
                .push(value.to_string());
        }

        ctx.navigator.add(rdn, attributes)?;
        Ok(Flow::Continue)
    }
}

impl Add {
    fn too_few(&self, ctx: &Context<'_>, args: &[String]) -> CommandError {
        syntax_error(
            self,
            ctx.navigator,
            args,
            "add has to be called with at least two arguments",
        )
    }
}

struct Help {
    names: Vec<String>,
}

impl Command for Help {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "List commands, or show how to use one"
    }

    fn usage(&self, _navigator: &Navigator, _args: &[String]) -> String {
        "Usage: help [command]\nLists the available commands, or prints the usage of one."
            .to_string()
    }

    fn invoke(&self, ctx: &mut Context<'_>, args: &[String]) -> Result<Flow, CommandError> {
        match args {
            [] => {
                writeln!(ctx.out, "Available commands:")?;
                for command in ctx.registry.iter() {
                    writeln!(ctx.out, "  {:<8} {}", command.name(), command.description())?;
                }
            }
            [name] => {
                let command = ctx
                    .registry
                    .get(name)
                    .ok_or_else(|| CommandError::NoSuchCommand { name: name.clone() })?;
                writeln!(ctx.out, "{}", command.usage(ctx.navigator, &[]))?;
            }
            _ => {
                return Err(syntax_error(
                    self,
                    ctx.navigator,
                    args,
                    "help takes at most one argument",
                ));
            }
        }
        Ok(Flow::Continue)
    }

    fn complete(&self, _navigator: &mut Navigator, args: &[String]) -> Vec<String> {
        match args {
            [prefix] => self
                .names
                .iter()
                .filter(|n| n.starts_with(prefix.as_str()))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }
}
