//! Interactive terminal loop for one interview session.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Confirm, Input};

use colloquy_core::{
    ControllerState, EmailConsent, FragmentCallback, SessionController, SessionError,
};
use colloquy_notify::EmailStatus;

/// Run an interview to completion: stream turns, collect respondent input,
/// and walk the finalization dialog.
pub async fn run_session(
    mut controller: SessionController,
    interrupted: Arc<AtomicBool>,
    default_recipient: &str,
) -> Result<()> {
    print!("{} ", "Interviewer:".bright_cyan().bold());
    let _ = std::io::stdout().flush();
    let opener = controller.begin(Some(stdout_fragments())).await?;
    finish_interviewer_line(&controller, &opener);

    while controller.state() == ControllerState::Active {
        if interrupted.load(Ordering::SeqCst) {
            let message = controller.quit()?;
            println!("\n{}", message);
            break;
        }

        let input: String = match Input::new().with_prompt("You".bold().to_string()).interact_text()
        {
            Ok(input) => input,
            // Input was interrupted; treat like /quit.
            Err(_) => String::from("/quit"),
        };
        let input = input.trim().to_string();
        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("/quit") || interrupted.load(Ordering::SeqCst) {
            let message = controller.quit()?;
            println!("\n{}", message);
            break;
        }

        print!("\n{} ", "Interviewer:".bright_cyan().bold());
        let _ = std::io::stdout().flush();

        match controller.submit(&input, Some(stdout_fragments())).await {
            Ok(outcome) => {
                finish_interviewer_line(&controller, outcome.display_text());
            }
            Err(SessionError::Provider(e)) => {
                println!();
                eprintln!(
                    "{} {}",
                    "Provider error:".bright_red(),
                    e.to_string().dimmed()
                );
                eprintln!("Your last message was not recorded; please send it again.");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if controller.state() != ControllerState::AwaitingConfirmation {
        return Ok(());
    }

    let consent = ask_email_consent(default_recipient)?;
    let report = controller.finalize(consent).await?;

    println!();
    if let Some(path) = &report.transcript_path {
        println!("Transcript saved to {}", path.display().to_string().dimmed());
    }
    if let Some(error) = &report.persist_error {
        eprintln!("{} {}", "Transcript could not be saved:".bright_red(), error);
    }
    match &report.email {
        EmailStatus::Sent { to } => println!("Transcript emailed to {}", to),
        EmailStatus::Failed { error } => {
            eprintln!("{} {}", "Email failed:".bright_yellow(), error.dimmed())
        }
        EmailStatus::Skipped => {}
    }
    if let Some(url) = &report.evaluation_url {
        println!();
        println!(
            "Please take a minute to evaluate this interview: {}",
            url.bright_blue()
        );
    }
    println!(
        "{}",
        format!("Interview length: {:.1} minutes", report.duration_minutes).dimmed()
    );

    Ok(())
}

/// Fragments go straight to stdout as they stream.
fn stdout_fragments() -> FragmentCallback {
    Arc::new(|fragment: &str| {
        print!("{}", fragment);
        let _ = std::io::stdout().flush();
    })
}

/// Close out the streamed line. A closing turn's fragments stop before the
/// code, so the configured message is printed in full instead.
fn finish_interviewer_line(controller: &SessionController, display_text: &str) {
    if controller.state() == ControllerState::AwaitingConfirmation {
        println!("\n\n{}", display_text);
    } else {
        println!("\n");
    }
}

fn ask_email_consent(default_recipient: &str) -> Result<EmailConsent> {
    let send = Confirm::new()
        .with_prompt("Would you like a copy of the transcript by email?")
        .default(true)
        .interact()?;
    if !send {
        return Ok(EmailConsent::declined());
    }

    let mut prompt = Input::new().with_prompt("Email address");
    if !default_recipient.is_empty() {
        prompt = prompt.default(default_recipient.to_string());
    }
    let recipient: String = prompt.interact_text()?;
    Ok(EmailConsent::granted(Some(recipient.trim().to_string())))
}
