use anyhow::Result;
use clap::Parser;
use pagediff_common::observability::{LogConfig, init_logging};
use pagediff_config::{PageDiffConfig, PageDiffConfigLoader};
use pagediff_web::{CompareOutcome, CompareReport, CompareRequest, Mode};
use std::path::PathBuf;
use std::process::ExitCode;
use wiring::build_from_config;
mod wiring;

const DEFAULT_CONFIG: &str = "pagediff.yaml";

#[derive(Parser, Debug)]
#[command(
    name = "pagediff",
    about = "Score how similar the visible text of two web pages is",
    version
)]
struct Cli {
    /// First page: a URL, or a curl command copied from browser dev tools
    a: String,

    /// Second page, in the same forms as the first
    b: String,

    /// Retrieval mode: auto, replay or browser
    #[arg(long, default_value_t = Mode::Auto)]
    mode: Mode,

    /// Configuration file (default: ./pagediff.yaml when present)
    #[arg(short, long, env = "PAGEDIFF_CONFIG")]
    config: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Scroll rendered pages to the bottom before reading them
    #[arg(long)]
    scroll: bool,

    /// Bound for each rendering wait, in seconds
    #[arg(long)]
    wait_seconds: Option<u64>,
}

impl Cli {
    fn load_config(&self) -> Result<PageDiffConfig> {
        let loader = match &self.config {
            Some(path) => PageDiffConfigLoader::new().with_file(path),
            None => PageDiffConfigLoader::new().with_optional_file(DEFAULT_CONFIG),
        };
        let mut cfg = loader.load()?;
        self.apply_overrides(&mut cfg);
        Ok(cfg)
    }

    fn apply_overrides(&self, cfg: &mut PageDiffConfig) {
        if self.scroll {
            cfg.browser.scroll = true;
        }
        if let Some(secs) = self.wait_seconds {
            cfg.browser.wait_seconds = secs;
        }
    }

    fn request(&self) -> CompareRequest {
        CompareRequest {
            a: self.a.clone(),
            b: self.b.clone(),
            mode: self.mode,
        }
    }
}

fn log_config(cfg: &PageDiffConfig) -> LogConfig {
    LogConfig {
        app_name: "pagediff",
        log_dir: cfg.log.dir.clone(),
        to_file: cfg.log.to_file,
        emit_stderr: cfg.log.emit_stderr,
        format: cfg.log.format,
        default_filter: cfg.log.filter.clone(),
    }
}

fn render_text(report: &CompareReport) -> String {
    let mut out = format!("Similarity: {}/100\n", report.result.score);
    for (label, side) in [("A", &report.a), ("B", &report.b)] {
        out.push_str(&format!(
            "{label}: {} ({}, {} tokens)\n",
            side.source_url, side.route, side.tokens
        ));
    }
    if !report.result.analysis.is_empty() {
        out.push('\n');
        out.push_str(&report.result.analysis);
        out.push('\n');
    }
    out
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let cfg = cli.load_config()?;

    if let Some(path) = init_logging(log_config(&cfg))? {
        tracing::debug!(target: "app", log_file = %path.display(), "file logging enabled");
    }

    let pipeline = build_from_config(&cfg)?;
    let outcome = CompareOutcome::from(pipeline.run(cli.request()).await);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    match outcome {
        CompareOutcome::Result(report) => {
            if !cli.json {
                print!("{}", render_text(&report));
            }
            Ok(ExitCode::SUCCESS)
        }
        CompareOutcome::Error(message) => {
            if !cli.json {
                eprintln!("error: {message}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagediff_common::ComparisonResult;
    use pagediff_web::Route;
    use pagediff_web::pipeline::SideReport;

    #[test]
    fn parses_positional_pages_and_flags() {
        let cli = Cli::try_parse_from([
            "pagediff",
            "https://a.test",
            "curl 'https://b.test' -H 'Accept: text/html'",
            "--mode",
            "replay",
            "--scroll",
            "--wait-seconds",
            "3",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.mode, Mode::Replay);
        assert!(cli.json);
        let req = cli.request();
        assert!(req.b.starts_with("curl "));

        let mut cfg = PageDiffConfigLoader::new().load().unwrap();
        cli.apply_overrides(&mut cfg);
        assert!(cfg.browser.scroll);
        assert_eq!(cfg.browser.wait_seconds, 3);
    }

    #[test]
    fn mode_defaults_to_auto_and_rejects_unknown() {
        let cli = Cli::try_parse_from(["pagediff", "https://a.test", "https://b.test"]).unwrap();
        assert_eq!(cli.mode, Mode::Auto);
        assert!(cli.wait_seconds.is_none());
        assert!(
            Cli::try_parse_from(["pagediff", "a", "b", "--mode", "turbo"]).is_err()
        );
    }

    #[test]
    fn text_rendering_lists_both_sides() {
        let side = |url: &str, route| SideReport {
            input: url.to_string(),
            source_url: url.to_string(),
            route,
            classification: None,
            tokens: 12,
        };
        let report = CompareReport {
            result: ComparisonResult::new(88, "Minor wording changes."),
            a: side("https://a.test", Route::Static),
            b: side("https://b.test", Route::Dynamic),
        };
        let text = render_text(&report);
        assert!(text.starts_with("Similarity: 88/100\n"));
        assert!(text.contains("A: https://a.test (static, 12 tokens)"));
        assert!(text.contains("B: https://b.test (dynamic, 12 tokens)"));
        assert!(text.ends_with("Minor wording changes.\n"));
    }
}
