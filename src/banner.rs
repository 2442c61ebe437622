//! Startup banner and farewell.

use std::path::Path;
use std::time::Duration;

use crate::config::BotConfig;
use crate::consts::AUTHOR;

/// What the banner shows about this run.
pub struct BannerInfo<'a> {
    pub mode: &'a str,
    pub config_path: &'a Path,
    pub config: &'a BotConfig,
    pub target_url: &'a str,
    pub poll_interval: Duration,
    /// Control service address, when serving.
    pub bind: Option<&'a str>,
}

pub fn banner_text(info: &BannerInfo) -> String {
    let mut text = format!(
        r#"
   ╔═══════════════════════════════════════╗
   ║          T R I P W I R E              ║
   ║   answers the channel while you work  ║
   ╚═══════════════════════════════════════╝

   version   {}
   by        {}
   mode      {}
   config    {}
   triggers  {}
   reply     {}
   target    {}
   poll      {}ms
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        info.mode,
        info.config_path.display(),
        info.config.triggers_display(),
        info.config.reply_text,
        info.target_url,
        info.poll_interval.as_millis(),
    );
    if let Some(bind) = info.bind {
        text.push_str(&format!("   control   http://{bind}\n"));
    }
    text
}

pub fn print_banner(info: &BannerInfo) {
    println!("{}", banner_text(info));
}

pub fn print_farewell() {
    println!("goodbye.");
}
