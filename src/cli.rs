use clap::Parser;
use std::path::PathBuf;

use crate::loader::ClassifyConfig;
use crate::paging::ViewMode;
use crate::ui::state::ScrollConfig;

pub const HELP_KEYS: &str = "\
Key Bindings:
  q                 : Quit
  Space / Left      : Next page (scroll down in vertical mode)
  Backspace / Right : Previous page (scroll up in vertical mode)
  j / Down          : Scroll down while held (vertical mode)
  k / Up            : Scroll up while held (vertical mode)
  m / s / v         : Manga / single / vertical mode
  r / Middle click  : Flip pairing at the current image
  c                 : Print changechapter
  i                 : Print getinfo
  Left / Right click: Next / previous page

Commands (one per line on stdin):
  add_images(tag,path,...)  goto_tag(tag)  remove_tag(tag)
  goto_offset(n)  change_mode(manga|single|vertical)  quit
";

#[derive(Parser, Debug)]
#[command(name = "spreadview", about = "A manga and comic page viewer driven by stdin", after_help = HELP_KEYS)]
pub struct Cli {
    /// Images to add to tag 0 at startup
    pub paths: Vec<PathBuf>,

    /// Number of decode threads. Default: available cores minus one.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Initial view mode: manga, single or vertical
    #[arg(short, long, default_value = "manga")]
    pub mode: ViewMode,

    /// Initial window width
    #[arg(long, default_value = "800")]
    pub width: u32,

    /// Initial window height
    #[arg(long, default_value = "600")]
    pub height: u32,

    /// Pages wider than this fraction of their height stand alone
    #[arg(long, default_value = "0.8")]
    pub wide_ratio: f32,

    /// Column variance below which a page edge counts as blank margin
    #[arg(long, default_value = "500")]
    pub variance_threshold: u32,

    /// How many columns inward to sample when both edges look blank
    #[arg(long, default_value = "20")]
    pub sample_depth: u32,

    /// Pixels scrolled per page key in vertical mode
    #[arg(long, default_value = "200")]
    pub scroll_step: f32,

    /// Pixels per second scrolled while j/k is held
    #[arg(long, default_value = "1000")]
    pub scroll_speed: f32,

    /// Do not read commands from stdin
    #[arg(long)]
    pub no_stdin: bool,
}

impl Cli {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
                .saturating_sub(1)
        })
        .max(1)
    }

    pub fn classify_config(&self) -> ClassifyConfig {
        ClassifyConfig {
            wide_ratio: self.wide_ratio,
            variance_threshold: self.variance_threshold,
            sample_depth: self.sample_depth,
        }
    }

    pub fn scroll_config(&self) -> ScrollConfig {
        ScrollConfig {
            step: self.scroll_step,
            speed: self.scroll_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["spreadview"]).unwrap();
        assert!(cli.paths.is_empty());
        assert_eq!(cli.mode, ViewMode::Manga);
        assert_eq!((cli.width, cli.height), (800, 600));
        assert_eq!(cli.classify_config(), ClassifyConfig::default());
        assert_eq!(cli.scroll_config(), ScrollConfig::default());
        assert!(cli.worker_count() >= 1);
        assert!(!cli.no_stdin);
    }

    #[test]
    fn overrides() {
        let cli = Cli::try_parse_from([
            "spreadview",
            "--mode",
            "vertical",
            "--workers",
            "0",
            "--variance-threshold",
            "300",
            "--no-stdin",
            "a.png",
            "b.png",
        ])
        .unwrap();
        assert_eq!(cli.mode, ViewMode::Vertical);
        assert_eq!(cli.worker_count(), 1);
        assert_eq!(cli.classify_config().variance_threshold, 300);
        assert_eq!(cli.paths, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
        assert!(cli.no_stdin);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["spreadview", "--mode", "scroll"]).is_err());
    }
}
