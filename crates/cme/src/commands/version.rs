//! `cme version` command implementation.

use crate::error::CliError;
use crate::output::Output;

/// Print `cme <version>` to stdout.
pub(crate) fn execute(version: &str) -> Result<(), CliError> {
    Output::new().document(&version_line(version))?;
    Ok(())
}

fn version_line(version: &str) -> String {
    format!("cme {version}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_line() {
        assert_eq!(version_line("1.2.3"), "cme 1.2.3\n");
    }
}
