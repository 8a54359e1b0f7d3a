use anyhow::{Result, bail};
use chrono::TimeZone;
use std::env;
use std::fs;
use std::process::Command;
use vergen_gitcl::{Emitter, GitclBuilder};

const LIBRARY: &str = "eti";

fn main() -> Result<()> {
    let gitcl = GitclBuilder::default()
        .describe(true, true, Some("v[0-9]*"))
        .build()?;

    let gitcl_res = Emitter::default()
        .idempotent()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|emitter| emitter.emit());

    if let Err(e) = gitcl_res {
        eprintln!("git information unavailable: {e:?}");
        Emitter::default().idempotent().fail_on_error().emit()?;
    }

    // Reproducible builds pin the timestamp through SOURCE_DATE_EPOCH
    let now = match env::var("SOURCE_DATE_EPOCH") {
        Ok(val) => {
            let secs = val.parse::<i64>()?;
            match chrono::Utc.timestamp_opt(secs, 0).single() {
                Some(ts) => ts,
                None => bail!("SOURCE_DATE_EPOCH out of range: {secs}"),
            }
        }
        Err(_) => chrono::Utc::now(),
    };

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let eti_version = library_version_from_metadata()
        .or_else(|_| library_version_from_manifest())
        .unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=ETI_VERSION={eti_version}");
    println!("cargo:rerun-if-changed=eti/Cargo.toml");

    Ok(())
}

/// Version of the library as resolved by cargo, local member or registry.
fn library_version_from_metadata() -> Result<String> {
    let output = Command::new(env::var("CARGO").unwrap_or_else(|_| "cargo".to_string()))
        .args(["metadata", "--format-version", "1"])
        .output()?;

    if !output.status.success() {
        bail!("cargo metadata failed");
    }

    let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)?;

    let packages = metadata["packages"].as_array().into_iter().flatten();
    for package in packages {
        if package["name"].as_str() == Some(LIBRARY) {
            if let Some(version) = package["version"].as_str() {
                return Ok(version.to_string());
            }
        }
    }

    // Registry ids read "eti 0.3.0 (registry+...)"
    let nodes = metadata["resolve"]["nodes"].as_array().into_iter().flatten();
    for node in nodes {
        let Some(id) = node["id"].as_str() else {
            continue;
        };
        let mut parts = id.split(' ');
        if parts.next() == Some(LIBRARY) {
            if let Some(version) = parts.next() {
                return Ok(version.to_string());
            }
        }
    }

    bail!("{LIBRARY} package not found in metadata");
}

fn library_version_from_manifest() -> Result<String> {
    let manifest = fs::read_to_string("eti/Cargo.toml")?;

    for line in manifest.lines().map(str::trim) {
        if let Some(value) = line.strip_prefix("version") {
            if let Some(value) = value.trim_start().strip_prefix('=') {
                return Ok(value.trim().trim_matches('"').to_string());
            }
        }
    }

    bail!("Could not find version in eti/Cargo.toml");
}
