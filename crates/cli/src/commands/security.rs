// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mtpgw security generate-cert|check-cert`.

use anyhow::Context;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum SecurityCommand {
    /// Generate a self-signed certificate and private key
    GenerateCert {
        /// Subject name (also used as SAN)
        #[arg(long, default_value = "mtpgw")]
        name: String,
        /// Directory receiving cert.pem and key.pem
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Sanity-check a PEM certificate file
    CheckCert { cert: PathBuf },
}

pub fn run(command: SecurityCommand) -> anyhow::Result<()> {
    match command {
        SecurityCommand::GenerateCert { name, out_dir } => generate_cert(&name, &out_dir),
        SecurityCommand::CheckCert { cert } => check_cert(&cert),
    }
}

fn generate_cert(name: &str, out_dir: &std::path::Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(out_dir)?;
    let certified = rcgen::generate_simple_self_signed(vec![name.to_string()])
        .context("certificate generation failed")?;

    let cert_path = out_dir.join("cert.pem");
    let key_path = out_dir.join("key.pem");
    std::fs::write(&cert_path, certified.cert.pem())?;
    std::fs::write(&key_path, certified.key_pair.serialize_pem())?;

    println!("wrote {}", cert_path.display());
    println!("wrote {}", key_path.display());
    Ok(())
}

fn check_cert(path: &std::path::Path) -> anyhow::Result<()> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    if !pem.contains("-----BEGIN CERTIFICATE-----") || !pem.contains("-----END CERTIFICATE-----") {
        anyhow::bail!("{} is not a PEM certificate", path.display());
    }
    let blocks = pem.matches("-----BEGIN CERTIFICATE-----").count();
    println!("{}: {} certificate(s), PEM structure ok", path.display(), blocks);
    Ok(())
}

#[cfg(test)]
#[path = "security_tests.rs"]
mod tests;
