//! Config subcommand handlers.

use std::io::{BufRead, IsTerminal};

use ally_config::Profile;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for name in cfg.profile_names() {
        let Some(p) = cfg.profile(name) else { continue };
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        if let Some(ref key) = p.key {
            let _ = writeln!(out, "key = \"{key}\"");
        }
        if p.secret.is_some() {
            let _ = writeln!(out, "secret = \"****\"");
        }
        if let Some(ref env) = p.secret_env {
            let _ = writeln!(out, "secret_env = \"{env}\"");
        }
        if let Some(ref url) = p.base_url {
            let _ = writeln!(out, "base_url = \"{url}\"");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        let timings = [
            ("poll_interval", p.poll_interval),
            ("throttle_floor", p.throttle_floor),
            ("token_refresh_margin", p.token_refresh_margin),
            ("race_delay", p.race_delay),
        ];
        for (field, value) in timings {
            if let Some(value) = value {
                let _ = writeln!(out, "{field} = {value}");
            }
        }
    }

    out
}

/// Read the secret from stdin or an interactive prompt.
fn read_secret(from_stdin: bool) -> Result<String, CliError> {
    let secret = if from_stdin || !std::io::stdin().is_terminal() {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        line.trim_end_matches(['\r', '\n']).to_owned()
    } else {
        rpassword::prompt_password("API secret: ")?
    };

    if secret.is_empty() {
        return Err(CliError::Validation {
            field: "secret".into(),
            reason: "secret cannot be empty".into(),
        });
    }
    Ok(secret)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            output::print_output(format_config_redacted(&cfg).trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), false);
            Ok(())
        }

        ConfigCommand::SetProfile {
            name,
            key,
            base_url,
            secret_env,
            default,
        } => {
            if let Some(ref raw) = base_url {
                ally_config::parse_base_url(raw)?;
            }

            let mut cfg = config::load_config_or_default();
            let profile = cfg.profiles.entry(name.clone()).or_insert_with(Profile::default);
            if key.is_some() {
                profile.key = key;
            }
            if base_url.is_some() {
                profile.base_url = base_url;
            }
            if secret_env.is_some() {
                profile.secret_env = secret_env;
            }
            if default || cfg.profiles.len() == 1 {
                cfg.default_profile = Some(name.clone());
            }

            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Profile '{name}' saved to {}", config::config_path().display());
            }
            Ok(())
        }

        ConfigCommand::SetSecret { stdin } => {
            let cfg = config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            let secret = read_secret(stdin)?;
            ally_config::store_secret(&name, &secret)?;
            if !global.quiet {
                eprintln!("Secret for profile '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}
