use std::borrow::Cow;
use std::collections::HashSet;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use mallet::evaluator::special_form_identifiers;
use mallet::lexer::EOF_IN_STRING;
use mallet::{Environment, ParseError, Token, TokenKind, evaluate_str, parse_str, tokenize};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Interactive read-eval-print loop for mallet.
#[derive(Parser, Debug)]
#[command(name = "mallet", version, about)]
struct Cli {
    /// Prompt shown before each entry
    #[arg(long, default_value = "user> ")]
    prompt: String,

    /// File the line history is loaded from and saved to
    #[arg(long, default_value = "mallet_history.txt")]
    history: PathBuf,

    /// Neither load nor save history
    #[arg(long)]
    no_history: bool,

    /// Line editing key bindings
    #[arg(long, value_enum, default_value_t = EditStyle::Emacs)]
    edit_mode: EditStyle,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum EditStyle {
    Vi,
    Emacs,
}

impl From<EditStyle> for rustyline::EditMode {
    fn from(style: EditStyle) -> Self {
        match style {
            EditStyle::Vi => rustyline::EditMode::Vi,
            EditStyle::Emacs => rustyline::EditMode::Emacs,
        }
    }
}

struct MalletCompleter {
    identifiers: HashSet<String>,
}

impl MalletCompleter {
    fn new(env: &Environment<'_>) -> Self {
        let mut completer = MalletCompleter {
            identifiers: HashSet::new(),
        };
        completer.refresh(env);
        completer
    }

    // Picks up anything bound by def! since the last entry
    fn refresh(&mut self, env: &Environment<'_>) {
        self.identifiers = env
            .identifiers()
            .union(&special_form_identifiers())
            .cloned()
            .collect();
    }
}

impl rustyline::completion::Completer for MalletCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let candidates = match tokenize(&line[..pos]).last() {
            Some(token) if token.kind == TokenKind::Symbol && token.span.end == pos => {
                let prefix = token.text.as_str();
                let mut found: Vec<String> = self
                    .identifiers
                    .iter()
                    .filter(|id| id.starts_with(prefix))
                    .map(|id| id[prefix.len()..].to_string())
                    .collect();
                found.sort();
                found
            }
            _ => vec![],
        };
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputHelper {
    #[rustyline(Validator)]
    validator: MalletValidator,
    #[rustyline(Highlighter)]
    highlighter: MalletHighlighter,
    #[rustyline(Completer)]
    completer: MalletCompleter,
}

struct MalletValidator;

impl Validator for MalletValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        // Unclosed aggregates and strings continue on the next line. Every
        // other error is left for the evaluation step to report.
        Ok(match parse_str(ctx.input()) {
            Err(ParseError::Unbalanced { .. }) => ValidationResult::Incomplete,
            Err(ParseError::Invalid { token }) if token.text == EOF_IN_STRING => {
                ValidationResult::Incomplete
            }
            _ => ValidationResult::Valid(None),
        })
    }
}

const RESET: &str = "\x1b[0m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const BOLD_BLUE: &str = "\x1b[1;34m";

fn closes(open: TokenKind, close: TokenKind) -> bool {
    matches!(
        (open, close),
        (TokenKind::LParen, TokenKind::RParen)
            | (TokenKind::LBracket, TokenKind::RBracket)
            | (TokenKind::LBrace, TokenKind::RBrace)
    )
}

fn touches(token: &Token, pos: usize) -> bool {
    token.span.start == pos || token.span.end == pos
}

// Indices of the bracket pair next to the cursor and of every bracket that
// closes the wrong kind or nothing at all.
fn bracket_marks(tokens: &[Token], pos: usize) -> (HashSet<usize>, HashSet<usize>) {
    let mut matched = HashSet::new();
    let mut unmatched = HashSet::new();
    let mut stack: Vec<usize> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if token.kind.is_open() {
            stack.push(i);
        } else if token.kind.is_close() {
            match stack.pop() {
                Some(open) if closes(tokens[open].kind, token.kind) => {
                    if touches(&tokens[open], pos) || touches(token, pos) {
                        matched.insert(open);
                        matched.insert(i);
                    }
                }
                Some(open) => {
                    unmatched.insert(open);
                    unmatched.insert(i);
                }
                None => {
                    unmatched.insert(i);
                }
            }
        }
    }
    (matched, unmatched)
}

// Bracket highlighting only changes when the cursor sits on or just after a bracket
fn bracket_near(line: &str, pos: usize) -> bool {
    let is_bracket = |c: char| matches!(c, '(' | ')' | '[' | ']' | '{' | '}');
    let before = line.get(..pos).and_then(|head| head.chars().next_back());
    let at = line.get(pos..).and_then(|tail| tail.chars().next());
    before.is_some_and(is_bracket) || at.is_some_and(is_bracket)
}

struct MalletHighlighter;

impl Highlighter for MalletHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let tokens = tokenize(line);
        if tokens.is_empty() {
            return Cow::Borrowed(line);
        }
        let (matched, unmatched) = bracket_marks(&tokens, pos);

        let mut highlighted = String::with_capacity(line.len());
        let mut last = 0;
        for (i, token) in tokens.iter().enumerate() {
            let range = token.span.to_range();
            // Whitespace, commas and comments between tokens pass through
            highlighted.push_str(&line[last..range.start]);
            let style = match token.kind {
                TokenKind::String => Some(GREEN),
                TokenKind::Number | TokenKind::Boolean => Some(CYAN),
                TokenKind::Invalid => Some(RED),
                _ if unmatched.contains(&i) => Some(RED),
                _ if matched.contains(&i) => Some(BOLD_BLUE),
                _ => None,
            };
            match style {
                Some(style) => {
                    highlighted.push_str(style);
                    highlighted.push_str(&line[range.clone()]);
                    highlighted.push_str(RESET);
                }
                None => highlighted.push_str(&line[range.clone()]),
            }
            last = range.end;
        }
        highlighted.push_str(&line[last..]);

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, line: &str, pos: usize, kind: CmdKind) -> bool {
        matches!(kind, CmdKind::ForcedRefresh) || bracket_near(line, pos)
    }
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> rustyline::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    println!("mallet v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let mut env = Environment::new_global_populated();
    let helper = InputHelper {
        highlighter: MalletHighlighter,
        validator: MalletValidator,
        completer: MalletCompleter::new(&env),
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(cli.edit_mode.into())
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if !cli.no_history && rl.load_history(&cli.history).is_err() {
        debug!(path = %cli.history.display(), "no previous history");
    }

    loop {
        match rl.readline(&cli.prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(line.as_str())?;
                if trimmed == "exit" {
                    break;
                }

                match evaluate_str(&line, &mut env) {
                    Ok(value) => println!("{}", value),
                    // Comment-only entries produce nothing
                    Err(e) if e.is_empty_input() => {}
                    Err(e) => {
                        if e.pretty_print(&line).is_err() {
                            eprintln!("ERROR: {}", e);
                        }
                    }
                }
                if let Some(helper) = rl.helper_mut() {
                    helper.completer.refresh(&env);
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!();
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }

    if !cli.no_history {
        if let Err(e) = rl.save_history(&cli.history) {
            warn!(path = %cli.history.display(), error = %e, "could not save history");
        }
    }
    Ok(())
}
