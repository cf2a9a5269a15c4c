//! Line-based interactive suggestion loop.

use std::io::{BufRead, Write};

use crate::app::{App, AppError};
use crate::domain::activity::PRIORITY_STEP;
use crate::service::Suggestion;
use crate::ui::{format_priority, Palette};

const PROMPT: &str = "[+] raise  [-] lower  [q] quit  [enter] another: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAction {
    Raise,
    Lower,
    Quit,
    Next,
}

pub fn parse_action(line: &str) -> PromptAction {
    match line.trim() {
        "+" | "=" => PromptAction::Raise,
        "-" | "_" => PromptAction::Lower,
        "q" | "Q" => PromptAction::Quit,
        _ => PromptAction::Next,
    }
}

/// Draws suggestions until the user quits or input ends. Returns the number of
/// suggestions shown.
pub fn run_suggest_loop<R: BufRead, W: Write>(
    app: &mut App,
    mut input: R,
    output: &mut W,
    palette: &Palette,
) -> Result<usize, AppError> {
    let mut shown = 0usize;
    loop {
        let Some(suggestion) = app.suggest()? else {
            return Err(no_activities());
        };
        shown += 1;
        write_suggestion(output, &suggestion, palette)?;
        write!(output, "{PROMPT}")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(shown);
        }

        let delta = match parse_action(&line) {
            PromptAction::Quit => return Ok(shown),
            PromptAction::Next => continue,
            PromptAction::Raise => PRIORITY_STEP,
            PromptAction::Lower => -PRIORITY_STEP,
        };
        let updated = app.adjust_priority(&suggestion.activity, delta)?;
        writeln!(
            output,
            "{}",
            palette.success(&format!("Priority adjusted to {}", format_priority(updated)))
        )?;
        writeln!(output)?;
    }
}

pub fn write_suggestion<W: Write>(
    output: &mut W,
    suggestion: &Suggestion,
    palette: &Palette,
) -> std::io::Result<()> {
    writeln!(output, "Selected activity: {}", palette.name(&suggestion.activity))?;
    writeln!(output, "Priority: {}", palette.priority(suggestion.priority))?;
    writeln!(
        output,
        "Minimum roll: {}",
        palette.dim(&format_priority(suggestion.min_roll))
    )?;
    writeln!(output)
}

pub fn no_activities() -> AppError {
    AppError::InvalidArgument(
        "no activities to suggest; add one with `actgen add <name>`".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;

    use uuid::Uuid;

    use super::{parse_action, run_suggest_loop, PromptAction};
    use crate::app::{App, AppError};
    use crate::config::Settings;
    use crate::ui::Palette;

    fn open_app() -> (App, PathBuf) {
        let root = std::env::temp_dir().join(format!("actgen-prompt-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&root).expect("workspace should be creatable");
        let db = root.join("local.sqlite");
        let app = App::open(db.to_str().expect("utf8 path"), Settings::default())
            .expect("app should open");
        (app, root)
    }

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(parse_action("+\n"), PromptAction::Raise);
        assert_eq!(parse_action("="), PromptAction::Raise);
        assert_eq!(parse_action("-"), PromptAction::Lower);
        assert_eq!(parse_action("_"), PromptAction::Lower);
        assert_eq!(parse_action("Q"), PromptAction::Quit);
        assert_eq!(parse_action(""), PromptAction::Next);
        assert_eq!(parse_action("x"), PromptAction::Next);
    }

    #[test]
    fn raise_and_lower_adjust_the_suggested_activity() {
        let (mut app, root) = open_app();
        app.add("walk", 1.0).expect("add should succeed");

        let mut output = Vec::new();
        let shown = run_suggest_loop(
            &mut app,
            Cursor::new("+\n+\n-\nq\n"),
            &mut output,
            &Palette::plain(),
        )
        .expect("loop should run");
        assert_eq!(shown, 4);
        let text = String::from_utf8(output).expect("utf8 output");
        assert!(text.contains("Selected activity: walk"));
        assert!(text.contains("Priority adjusted to 1.2"));
        assert!(text.contains("Priority adjusted to 1.1"));

        let stored = app
            .get("walk")
            .expect("get should run")
            .expect("activity should exist");
        assert_eq!(stored.priority, 1.1);

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn end_of_input_quits() {
        let (mut app, root) = open_app();
        app.add("read", 0.1).expect("add should succeed");

        let mut output = Vec::new();
        let shown = run_suggest_loop(
            &mut app,
            Cursor::new("-\n"),
            &mut output,
            &Palette::plain(),
        )
        .expect("loop should run");
        assert_eq!(shown, 2);
        assert_eq!(
            app.get("read")
                .expect("get should run")
                .map(|activity| activity.priority),
            Some(0.1),
            "lowering stops at the floor"
        );

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn empty_store_is_an_error() {
        let (mut app, root) = open_app();
        let mut output = Vec::new();
        let err = run_suggest_loop(&mut app, Cursor::new(""), &mut output, &Palette::plain())
            .expect_err("no activities should fail");
        assert!(matches!(err, AppError::InvalidArgument(_)));

        let _ = std::fs::remove_dir_all(root);
    }
}
