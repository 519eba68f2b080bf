//! `njleg preflight` - check external collaborators before a run
//!
//! Verifies the mdbtools programs are on PATH and the warehouse connection
//! string is configured. Prints one line per check; exits successfully
//! either way so it can be used informationally.

use std::process::Stdio;

pub async fn run() -> anyhow::Result<()> {
    println!("NJLEG Preflight Check");

    let database_url = std::env::var("DATABASE_URL")
        .ok()
        .filter(|v| !v.is_empty());
    println!(
        "{} DATABASE_URL",
        if database_url.is_some() { "ok " } else { "MISSING" }
    );

    for tool in ["mdb-tables", "mdb-export"] {
        println!("{} {tool}", if tool_available(tool).await { "ok " } else { "MISSING" });
    }

    Ok(())
}

/// A tool is available when it can be spawned at all
async fn tool_available(tool: &str) -> bool {
    tokio::process::Command::new(tool)
        .arg("--help")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok()
}
