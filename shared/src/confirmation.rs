use crate::types::Result;
use dialoguer::Confirm;
use std::io::IsTerminal;

/// Yes/no prompt shared by the CLI commands.
///
/// When stdin is not a terminal (piped input, CI) the prompt is skipped and
/// `default_yes` is returned as the answer.
pub fn ask_confirmation(prompt: &str, default_yes: bool) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        tracing::debug!(prompt, default_yes, "stdin is not a terminal, using default answer");
        return Ok(default_yes);
    }
    let choice = Confirm::new()
        .with_prompt(prompt)
        .default(default_yes)
        .show_default(true)
        .interact()?;
    Ok(choice)
}
