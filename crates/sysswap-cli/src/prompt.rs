use std::io::{self, Write};

/// Asks a yes/no question on the terminal; anything but `y`/`yes` is a no.
pub(crate) async fn confirm(question: String) -> bool {
    tokio::task::spawn_blocking(move || {
        print!("{question} [y/N] ");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        parse_confirmation(&answer)
    })
    .await
    .unwrap_or(false)
}

pub(crate) fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
