// Statement fetch - runs ofxget and files the output under the database
//
// Each fetch writes two copies: a timestamped snapshot for history and the
// `current_{server}_{user}.ofx` file that aggregation reads.

use crate::accounts;
use crate::cfg::{CFG_USER_LABEL, CURRENT_PREFIX, Config, OFX_EXTENSION};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::info;
use std::fs;
use std::process::Command;

/// Fetch kinds pulled for every server on a full extract run.
pub const FETCH_KINDS: &[&str] = &["acctinfo", "stmt"];

/// Fetch one kind for one (server, user) pair and file the output.
pub fn write_file(kind: &str, server: &str, user: &str, cfg: &Config) -> Result<()> {
    let kind = kind.to_lowercase();
    let mut cmd = Command::new("ofxget");
    cmd.arg(&kind).arg(server).arg("-u").arg(user);
    if kind == "stmt" {
        cmd.arg("--all");
    }
    info!("running ofxget {} {} -u {}", kind, server, user);
    let output = cmd
        .output()
        .with_context(|| format!("running ofxget {} for {}", kind, server))?;
    if !output.status.success() {
        bail!(
            "ofxget {} {} failed: {}",
            kind,
            server,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let folder = cfg.fetch_dir(&kind);
    fs::create_dir_all(&folder)
        .with_context(|| format!("creating fetch directory {}", folder.display()))?;

    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let dated = folder.join(format!("{}_{}_{}.{}", stamp, server, user, OFX_EXTENSION));
    let current = folder.join(format!(
        "{}_{}_{}.{}",
        CURRENT_PREFIX, server, user, OFX_EXTENSION
    ));
    fs::write(&dated, &output.stdout)
        .with_context(|| format!("writing {}", dated.display()))?;
    fs::write(&current, &output.stdout)
        .with_context(|| format!("writing {}", current.display()))?;
    Ok(())
}

/// Fetch account info and statements for every configured server.
pub fn extract(cfg: &Config) -> Result<()> {
    let user_cfg = accounts::get_user_cfg(cfg)?;
    for (server, settings) in user_cfg.servers() {
        let user = settings
            .get(CFG_USER_LABEL)
            .with_context(|| format!("server {} has no {} setting", server, CFG_USER_LABEL))?;
        for kind in FETCH_KINDS {
            write_file(kind, server, user, cfg)?;
        }
    }
    Ok(())
}
