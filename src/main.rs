// src/main.rs - 命令行入口

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use guestpass::card;
use guestpass::config::Config;
use guestpass::export::{self, RasterFormat};
use guestpass::history::{self, HistoryEntry};
use guestpass::notify;
use guestpass::print::{self, LpPrinter};
use guestpass::scan::{Discovery, MockSource, NetworkSource, NmcliSource};
use guestpass::welcome::CommandWelcome;
use guestpass::{
    payload, qr, raster, CardSession, DisplayOptions, ErrorCorrection, ExportKind, ExportSettings,
    NetworkCredential, Security, SoftwareRenderer,
};
use std::path::PathBuf;
use std::time::Duration;

// ════════════════════════════════════════════════════════════════
// CLI 参数
// ════════════════════════════════════════════════════════════════

#[derive(Parser)]
#[command(name = "guestpass", about = "访客 Wi-Fi 二维码卡片生成器", version)]
struct Cli {
    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,
    /// 指定配置文件（默认查找 ~/.config/guestpass/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct CredentialArgs {
    /// 网络名
    #[arg(long)]
    ssid: String,
    /// 密码（开放网络可省略）
    #[arg(long)]
    password: Option<String>,
    /// 加密类型：WPA / WEP / nopass
    #[arg(long, default_value = "WPA", value_parser = parse_security)]
    security: Security,
    /// 隐藏网络
    #[arg(long)]
    hidden: bool,
    /// 纠错等级 L / M / Q / H（默认取配置）
    #[arg(long)]
    ec: Option<ErrorCorrection>,
}

// Security 还有面向 nmcli 的宽松 From<&str>，命令行必须走严格解析
fn parse_security(s: &str) -> Result<Security, String> {
    s.parse()
}

impl CredentialArgs {
    fn credential(&self) -> NetworkCredential {
        NetworkCredential::new(self.ssid.clone(), self.password.clone(), self.security, self.hidden)
    }
}

#[derive(Args)]
struct DisplayArgs {
    /// 卡片上不显示网络名
    #[arg(long)]
    hide_ssid: bool,
    /// 卡片上不显示密码
    #[arg(long)]
    hide_password: bool,
}

impl From<&DisplayArgs> for DisplayOptions {
    fn from(d: &DisplayArgs) -> Self {
        DisplayOptions {
            hide_ssid: d.hide_ssid,
            hide_password: d.hide_password,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Png,
    Jpeg,
    Pdf,
}

impl From<Format> for ExportKind {
    fn from(f: Format) -> Self {
        match f {
            Format::Png => ExportKind::Raster(RasterFormat::Png),
            Format::Jpeg => ExportKind::Raster(RasterFormat::Jpeg),
            Format::Pdf => ExportKind::Pdf,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// 输出 WIFI: 载荷字符串
    Payload {
        #[command(flatten)]
        cred: CredentialArgs,
    },
    /// 在终端里显示二维码
    Qr {
        #[command(flatten)]
        cred: CredentialArgs,
        /// 静区模块数
        #[arg(long, default_value_t = 2)]
        margin: usize,
    },
    /// 只导出二维码图片
    Png {
        #[command(flatten)]
        cred: CredentialArgs,
        /// 目标边长（像素）
        #[arg(long)]
        size: Option<u32>,
        /// 静区模块数
        #[arg(long)]
        margin: Option<u32>,
        /// 输出 data URI 而不是写文件
        #[arg(long)]
        data_uri: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 生成并导出完整卡片
    Card {
        #[command(flatten)]
        cred: CredentialArgs,
        #[command(flatten)]
        display: DisplayArgs,
        #[arg(long, value_enum, default_value_t = Format::Png)]
        format: Format,
        /// 截图倍率（默认取配置）
        #[arg(long)]
        scale: Option<f32>,
        /// 不生成欢迎语
        #[arg(long)]
        no_welcome: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 生成卡片 PDF 并交给系统打印
    Print {
        #[command(flatten)]
        cred: CredentialArgs,
        #[command(flatten)]
        display: DisplayArgs,
        /// 打印命令
        #[arg(long, default_value = "lp")]
        printer: String,
    },
    /// 列出附近的网络
    Scan {
        /// 使用模拟数据
        #[arg(long)]
        mock: bool,
        /// 先触发一次重新扫描
        #[arg(long)]
        rescan: bool,
    },
    /// 查看本次会话生成过的卡片
    History {
        #[arg(long)]
        clear: bool,
    },
}

// ════════════════════════════════════════════════════════════════
// 入口
// ════════════════════════════════════════════════════════════════

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("guestpass=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("guestpass=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(p) => Config::load_from(p),
        None => Ok(Config::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "配置加载失败，使用默认配置");
            Config::default()
        })),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cfg = load_config(cli.config.as_ref())?;

    match cli.cmd {
        Cmd::Payload { cred } => {
            println!("{}", payload::encode(&cred.credential()));
        }
        Cmd::Qr { cred, margin } => {
            let credential = cred.credential();
            credential.validate()?;
            let matrix = qr::generate(&payload::encode(&credential), cred.ec.unwrap_or(cfg.error_correction))?;
            println!("{}", matrix.to_terminal(margin));
        }
        Cmd::Png { cred, size, margin, data_uri, out } => {
            let credential = cred.credential();
            credential.validate()?;
            let mut opts = cfg.raster_options()?;
            opts.target_px = size.unwrap_or(opts.target_px);
            opts.quiet_zone = margin.unwrap_or(opts.quiet_zone);
            let matrix = qr::generate(&payload::encode(&credential), cred.ec.unwrap_or(cfg.error_correction))?;
            let artifact = raster::rasterize(&matrix, &opts)?;
            if data_uri {
                println!("{}", artifact.to_data_uri()?);
            } else {
                let dir = out.unwrap_or_else(|| cfg.output_dir());
                let name = export::artifact_file_name(&credential.ssid, "qr.png");
                let path = export::save_artifact(&dir, &name, &artifact.to_png()?)?;
                println!("{}", path.display());
            }
        }
        Cmd::Card { cred, display, format, scale, no_welcome, out } => {
            let credential = cred.credential();
            credential.validate()?;
            let welcome = CommandWelcome::from_argv(&cfg.welcome_command).filter(|_| !no_welcome);
            let card = card::generate(
                credential.clone(),
                DisplayOptions::from(&display),
                cred.ec.unwrap_or(cfg.error_correction),
                &cfg.raster_options()?,
                welcome.as_ref(),
                Duration::from_secs(cfg.welcome_timeout_secs),
            )
            .await?;

            let mut settings = ExportSettings::from_config(&cfg)?;
            if let Some(s) = scale {
                settings.scale = s;
            }
            let session = CardSession::new(card, SoftwareRenderer, settings);
            let dir = out.unwrap_or_else(|| cfg.output_dir());

            match session.export_to(format.into(), &dir).await {
                Ok(path) => {
                    notify::exported(&path).await;
                    println!("{}", path.display());
                    let entry = HistoryEntry::new(&credential, vec![path]);
                    if let Err(e) = history::append(&Config::history_path(), entry, cfg.history_limit) {
                        tracing::warn!(error = %e, "写入历史失败");
                    }
                }
                Err(e) => {
                    notify::export_failed(&e).await;
                    let hint = notify::suggestion(&e);
                    return Err(e).context(hint);
                }
            }
        }
        Cmd::Print { cred, display, printer } => {
            let credential = cred.credential();
            credential.validate()?;
            let card = card::GuestCard::build(
                credential.clone(),
                DisplayOptions::from(&display),
                cred.ec.unwrap_or(cfg.error_correction),
                &cfg.raster_options()?,
            )?;
            let session = CardSession::new(card, SoftwareRenderer, ExportSettings::from_config(&cfg)?);

            let spool = std::env::temp_dir().join(format!("guestpass-print-{}", std::process::id()));
            let path = session.export_to(ExportKind::Pdf, &spool).await?;
            let mut lp = LpPrinter::new(printer);
            let result = print::print_with_title(&mut lp, &print::print_title(&credential.ssid), &path).await;
            let _ = std::fs::remove_dir_all(&spool);
            result?;
            notify::normal("已提交打印", &credential.ssid).await;
        }
        Cmd::Scan { mock, rescan } => {
            let aps = if mock || cfg.discovery == Discovery::Mock {
                MockSource::default().scan().await?
            } else {
                NmcliSource { rescan }.scan().await?
            };
            if aps.is_empty() {
                println!("没有发现附近的网络");
            }
            for ap in &aps {
                println!("{}", ap.display_line());
            }
        }
        Cmd::History { clear } => {
            let path = Config::history_path();
            if clear {
                history::clear(&path);
                println!("历史已清空");
                return Ok(());
            }
            let entries = history::read(&path);
            if entries.is_empty() {
                println!("暂无记录");
            }
            for e in entries {
                let files: Vec<String> = e.artifacts.iter().map(|p| p.display().to_string()).collect();
                println!(
                    "{}  {:<24} {:>6}{}  {}",
                    e.timestamp,
                    e.ssid,
                    e.security.to_string(),
                    if e.hidden { " (隐藏)" } else { "" },
                    files.join(", ")
                );
            }
        }
    }

    Ok(())
}
