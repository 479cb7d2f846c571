//! completions command - Print shell completion scripts for yb

use clap::CommandFactory;
use clap_complete::Shell;

use super::Cli;
use crate::exit_code::ExitCode;

/// Arguments for the completions command
#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `args.shell` to stdout
pub fn execute(args: CompletionsArgs) -> ExitCode {
    write_completions(args.shell, &mut std::io::stdout());
    ExitCode::Success
}

fn write_completions(shell: Shell, out: &mut dyn std::io::Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(shell: Shell) -> String {
        let mut buf = Vec::new();
        write_completions(shell, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_completions_mention_subcommands() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            let output = script(shell);
            assert!(output.contains("yb"), "{shell:?}");
            assert!(output.contains("prune"), "{shell:?}");
        }
    }

    #[test]
    fn test_completions_shell_specific() {
        assert!(script(Shell::Zsh).contains("compdef"));
        assert!(script(Shell::PowerShell).contains("Register-ArgumentCompleter"));
    }
}
