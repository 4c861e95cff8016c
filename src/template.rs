//! # Command Template Module
//!
//! Sostituzione dei placeholder `%name%` nei comandi del tool esterno.
//!
//! Two ways to use a template:
//! - [`render`] performs pure string substitution, unmatched placeholders stay verbatim
//! - [`CommandTemplate`] is split into arguments once, when the configuration is
//!   loaded; [`CommandTemplate::build`] then substitutes inside each argument, so
//!   bound values never need shell quoting

use crate::error::{BatchError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder name → value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(BTreeMap<String, String>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a placeholder, replacing any previous value
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// Replace every `%key%` for every bound key
pub fn render(template: &str, bindings: &Bindings) -> String {
    bindings
        .iter()
        .fold(template.to_string(), |command, (key, value)| {
            command.replace(&format!("%{}%", key), value)
        })
}

/// A program plus its arguments, ready to spawn without a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote_for_display(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote_for_display(arg))?;
        }
        Ok(())
    }
}

fn quote_for_display(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(char::is_whitespace) {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

/// Command template read from the configuration, already split into arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    template: String,
    tokens: Vec<String>,
}

impl CommandTemplate {
    /// Tokenise `template`; an empty template or an unterminated quote is a config error
    pub fn parse(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let tokens = tokenize(&template)?;
        if tokens.is_empty() {
            return Err(BatchError::Config(format!("Empty command template: {:?}", template)));
        }
        Ok(Self { template, tokens })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute placeholders inside each argument
    pub fn build(&self, bindings: &Bindings) -> CommandLine {
        let mut tokens = self.tokens.iter().map(|token| render(token, bindings));
        let program = tokens.next().unwrap_or_default();
        CommandLine::new(program, tokens.collect())
    }
}

/// Split on whitespace; single or double quotes group characters into one token
fn tokenize(template: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in template.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err(BatchError::Config(format!(
            "Unterminated quote in command template: {}",
            template
        )));
    }
    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_keys() {
        let bindings = Bindings::new().bind("a", "X").bind("b", "Y");
        assert_eq!(render("%a% and %b%", &bindings), "X and Y");
        assert_eq!(render("%a%%a%", &bindings), "XX");
    }

    #[test]
    fn test_render_leaves_unmatched_placeholders() {
        let bindings = Bindings::new().bind("a", "X");
        assert_eq!(render("%a% %c%", &bindings), "X %c%");
        assert_eq!(render("100%", &bindings), "100%");
    }

    #[test]
    fn test_build_keeps_values_with_spaces_in_one_argument() {
        let template = CommandTemplate::parse("%convertbin% %input% -resize %dimensions% %output%").unwrap();
        let bindings = Bindings::new()
            .bind("convertbin", "convert")
            .bind("input", "/in/my photo.jpg")
            .bind("output", "/out/my photo.jpg")
            .bind("dimensions", "100x200");

        let command = template.build(&bindings);
        assert_eq!(command.program, "convert");
        assert_eq!(
            command.args,
            vec!["/in/my photo.jpg", "-resize", "100x200", "/out/my photo.jpg"]
        );
        assert_eq!(
            command.to_string(),
            "convert \"/in/my photo.jpg\" -resize 100x200 \"/out/my photo.jpg\""
        );
    }

    #[test]
    fn test_build_honours_quotes_in_template() {
        let template = CommandTemplate::parse("convert \"%input%\" -crop '1x1+1+1' txt:-").unwrap();
        let bindings = Bindings::new().bind("input", "a b.jpg");
        let command = template.build(&bindings);
        assert_eq!(command.args, vec!["a b.jpg", "-crop", "1x1+1+1", "txt:-"]);
    }

    #[test]
    fn test_build_rejects_broken_templates() {
        assert!(matches!(CommandTemplate::parse("   "), Err(BatchError::Config(_))));
        assert!(matches!(
            CommandTemplate::parse("mogrify \"%output%"),
            Err(BatchError::Config(_))
        ));
    }
}
