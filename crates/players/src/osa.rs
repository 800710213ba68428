use anyhow::{anyhow, Context, Result};
use tokio::process::Command;

/// Run an inline AppleScript snippet and return trimmed stdout.
pub(crate) async fn run(script: &str) -> Result<String> {
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .await
        .context("failed to spawn osascript")?;

    if !output.status.success() {
        return Err(anyhow!(
            "osascript failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let stdout = String::from_utf8(output.stdout).context("invalid UTF-8 from osascript")?;
    Ok(stdout.trim().to_string())
}

/// `osascript` prints AppleScript booleans as the words true/false.
pub(crate) fn parse_bool(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true")
}
