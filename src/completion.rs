//! Shell completion generation via clap_complete.
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! setlist completion bash > ~/.local/share/bash-completion/completions/setlist
//!
//! # Generate zsh completions
//! setlist completion zsh > ~/.config/zsh/completions/_setlist
//! ```

use clap::Command;
use clap_complete::Generator;
use std::io;

/// Generate shell completions for the given shell on stdout.
pub fn generate_completions<G: Generator>(generator: G, cmd: &mut Command) {
    let name = cmd.get_name().to_string();
    clap_complete::generate(generator, cmd, name, &mut io::stdout());
}
