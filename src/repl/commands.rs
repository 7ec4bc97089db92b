//! Builtin commands handled locally, before classification or the server.

use std::io::{self, Write};

/// Looks up a builtin by its exact input line.
pub fn builtin(line: &str) -> Option<fn()> {
    match line {
        "clear" => Some(clear_screen),
        _ => None,
    }
}

/// Clears the terminal and homes the cursor.
pub fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
    let _ = io::stdout().flush();
}
