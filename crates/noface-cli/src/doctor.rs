use anyhow::Result;

use noface::config::Config;

use crate::check_tool;

/// Check system requirements and configuration.
pub fn run(config: &Config) -> Result<()> {
    println!("noface doctor");
    println!("=============");
    println!();

    let mut all_ok = true;

    all_ok &= check_tool("jj", true);
    all_ok &= check_tool("bd", true);
    all_ok &= check_tool(&config.agents.implementer, true);
    if config.agents.reviewer != config.agents.implementer {
        all_ok &= check_tool(&config.agents.reviewer, true);
    }

    if let Some(build) = &config.project.build {
        println!("build command: {build}");
    } else {
        println!("[SKIP] build: no build command configured");
    }

    println!();
    if all_ok {
        println!("All required checks passed!");
    } else {
        println!("Some required checks failed. See above for details.");
    }

    Ok(())
}
