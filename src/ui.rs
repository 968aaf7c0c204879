// UI layer: one handler per CLI command. Prompts are hidden where the
// input is secret, output is plain println. Handlers own the config
// read/update lifecycle around the core operations; the core never
// prompts or touches hidden global state.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Password};

use crate::api::EpicClient;
use crate::config::Config;
use crate::download::{self, Target};
use crate::vault::{self, Vault};

/// `set API=<key>`: validate the assignment, prompt for a passphrase
/// twice, encrypt and store.
pub fn cmd_set(vault: &Vault, assignment: &str) -> Result<()> {
    let api_key = match assignment.split_once('=') {
        Some(("API", key)) => key.trim(),
        _ => bail!("invalid set command; use: eimg set API=<your_key>"),
    };
    if !vault::valid_key_format(api_key) {
        bail!("invalid API key format; check your NASA API key");
    }

    let passphrase = Password::new()
        .with_prompt("Set master passphrase")
        .with_confirmation("Confirm passphrase", "Passphrases don't match")
        .interact()?;
    if passphrase.len() < 8 {
        bail!("passphrase must be at least 8 characters long");
    }

    vault.store(api_key, &passphrase)?;
    println!(
        "Encrypted API key saved to {}",
        Config::path_in(vault.dir()).display()
    );
    Ok(())
}

/// `validate`: decrypt the key and confirm the service accepts it.
pub fn cmd_validate(vault: &Vault) -> Result<()> {
    let passphrase = prompt_passphrase()?;
    println!("Validating API key...");
    if vault.validate(&passphrase)? {
        println!("API key is valid and working.");
        Ok(())
    } else {
        bail!("API key was rejected by the service (invalid, expired, or rate limited)");
    }
}

/// `config`: display the current configuration. No secrets.
pub fn cmd_config(vault: &Vault) -> Result<()> {
    let path = Config::path_in(vault.dir());
    println!("Config file: {}", path.display());

    match vault.config()? {
        Some(config) => {
            if config.has_credential() {
                println!("API key: stored (encrypted)");
            } else {
                println!("API key: not set");
            }
            println!("Default output dir: {}", config.default_output_dir);
            match config.last_download_date {
                Some(date) => println!("Last download date: {date}"),
                None => println!("Last download date: never"),
            }
        }
        None => println!("API key: not set (no config file)"),
    }

    #[cfg(unix)]
    if vault.dir().exists() {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(vault.dir())?.permissions().mode() & 0o777;
        if mode == 0o700 {
            println!("Directory permissions: secure (700)");
        } else {
            println!("Directory permissions: {mode:o} (recommend 700)");
        }
    }
    Ok(())
}

/// `dates`: list available image dates, most recent first.
pub fn cmd_dates(vault: &Vault, limit: usize) -> Result<()> {
    let client = open_client(vault)?;
    println!("Fetching available dates...");
    let dates = client.available_dates()?;
    if dates.is_empty() {
        println!("No dates available.");
        return Ok(());
    }

    println!("Found {} available dates:", dates.len());
    for (i, date) in dates.iter().take(limit).enumerate() {
        println!("  {}. {}", i + 1, date);
    }
    if dates.len() > limit {
        println!("  ... and {} more", dates.len() - limit);
    }
    Ok(())
}

/// `metadata [DATE]`: show metadata for the latest images or a date.
pub fn cmd_metadata(vault: &Vault, date: Option<&str>) -> Result<()> {
    let client = open_client(vault)?;
    let records = match date {
        Some(raw) => {
            let date = download::parse_date(raw)?;
            println!("Metadata for {date}:");
            client.images_for_date(date)?
        }
        None => {
            println!("Latest image metadata:");
            client.latest_images()?
        }
    };
    if records.is_empty() {
        println!("No metadata available.");
        return Ok(());
    }

    for (i, record) in records.iter().take(3).enumerate() {
        println!();
        println!("Image {}:", i + 1);
        println!("  Identifier: {}", record.identifier);
        println!("  Captured: {} UTC", record.capture_timestamp);
        println!("  Caption: {}", record.caption);
        println!(
            "  Earth center: {}, {}",
            record.earth_center.lat, record.earth_center.lon
        );
        println!(
            "  Satellite position: x={}, y={}, z={}",
            record.satellite_position.x,
            record.satellite_position.y,
            record.satellite_position.z
        );
    }
    if records.len() > 3 {
        println!();
        println!("... and {} more images", records.len() - 3);
    }
    Ok(())
}

/// `download` / `download-date`: run the retrieval pipeline and record
/// the capture date of the result in the config.
pub fn cmd_download(
    vault: &Vault,
    target: Target,
    output: Option<PathBuf>,
    filename: Option<String>,
) -> Result<()> {
    let client = open_client(vault)?;
    let mut config = vault.config()?.unwrap_or_default();
    let output_dir = output.unwrap_or_else(|| PathBuf::from(&config.default_output_dir));

    println!("Fetching Earth image ({target})...");
    let result = download::fetch(&client, target, &output_dir, filename.as_deref())?;

    println!("Image saved to: {}", result.local_path.display());
    println!(
        "File size: {:.2} MB",
        result.byte_size as f64 / 1024.0 / 1024.0
    );

    config.last_download_date = Some(result.source_record.capture_date());
    config
        .save(vault.dir())
        .context("download succeeded but recording it in the config failed")?;
    Ok(())
}

/// `wipe`: confirm, then securely destroy the configuration.
pub fn cmd_wipe(vault: &Vault) -> Result<()> {
    let confirmed = Confirm::new()
        .with_prompt("Wipe all configuration?")
        .default(false)
        .interact()?;
    if !confirmed {
        println!("Operation cancelled.");
        return Ok(());
    }
    vault.wipe()?;
    println!("Configuration securely wiped.");
    Ok(())
}

fn prompt_passphrase() -> Result<String> {
    Ok(Password::new()
        .with_prompt("Master passphrase")
        .interact()?)
}

fn open_client(vault: &Vault) -> Result<EpicClient> {
    let passphrase = prompt_passphrase()?;
    let api_key = vault.load(&passphrase)?;
    Ok(EpicClient::new(api_key)?)
}
