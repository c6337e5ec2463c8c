// ==========================================
// OPME 对账报表 - 命令行入口
// ==========================================
// 用法: opme-report --surgical-map <文件> --materials <文件> [--mode auto|identifier|name]
// 输出: <前缀>_<YYYY-MM-DD>.xlsx（默认写到下载目录）
// ==========================================

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use opme_report::api::ReportApi;
use opme_report::config::{config_keys, ConfigManager};
use opme_report::{logging, JoinMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// 按材料表携带的关联键自动判定
    Auto,
    /// 按就诊号精确关联
    Identifier,
    /// 按患者姓名模糊关联
    Name,
}

impl ModeArg {
    fn join_mode(self) -> Option<JoinMode> {
        match self {
            ModeArg::Auto => None,
            ModeArg::Identifier => Some(JoinMode::ByIdentifier),
            ModeArg::Name => Some(JoinMode::ByFuzzyName),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "opme-report")]
#[command(about = "Reconcile a surgical map with an OPME materials sheet and export the combined report")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Surgical map sheet (.xlsx/.xls/.ods/.csv)
    #[arg(long, value_name = "FILE")]
    surgical_map: PathBuf,

    /// OPME materials sheet (.xlsx/.xls/.ods/.csv)
    #[arg(long, value_name = "FILE")]
    materials: PathBuf,

    /// Join mode; overrides the config file
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Pipeline config (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory (default: the user's download directory)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Attach materials only to exactly matching patients when one exists
    #[arg(long)]
    exact_first: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn output_dir(&self) -> Result<PathBuf> {
        match &self.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => match dirs::download_dir() {
                Some(dir) => Ok(dir),
                None => std::env::current_dir().context("无法确定当前工作目录"),
            },
        }
    }
}

fn load_config(args: &Args) -> Result<ConfigManager> {
    let manager = match &args.config {
        Some(path) => ConfigManager::load(path)
            .with_context(|| format!("配置加载失败: {}", path.display()))?,
        None => ConfigManager::new(),
    };

    if let Some(mode) = args.mode {
        let value = match mode.join_mode() {
            Some(mode) => mode.as_str().to_string(),
            None => "auto".to_string(),
        };
        manager.set_config_value(config_keys::JOIN_MODE, &value)?;
    }
    if args.exact_first {
        manager.set_config_value(config_keys::NAME_MATCH_POLICY, "exact_first")?;
    }
    Ok(manager)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.log_json {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("{} v{}", opme_report::APP_NAME, opme_report::VERSION);

    let output_dir = args.output_dir()?;
    if !output_dir.is_dir() {
        bail!("输出目录不存在: {}", output_dir.display());
    }

    let config = load_config(&args)?;
    let mut api = ReportApi::new(Arc::new(config));

    // 两张表并发读取，各自只有一次挂起
    let (surgical_grid, materials_grid) = futures::future::try_join(
        api.fetch_grid(&args.surgical_map),
        api.fetch_grid(&args.materials),
    )
    .await?;

    api.load_surgical_map(&file_name(&args.surgical_map), surgical_grid)?;
    api.load_materials(&file_name(&args.materials), materials_grid)?;

    let report = api.generate_report(None)?;
    let summary = report.summary.clone();
    let join_mode = report.join_mode;

    let path = api.export_report(&output_dir)?;

    println!("关联方式:       {}", join_mode);
    println!("病例数:         {}", summary.total_cases);
    println!("已关联材料:     {}", summary.total_materials);
    println!("汇总合计:       {:.2}", summary.total_aggregate);
    println!("无材料病例:     {}", summary.cases_without_materials);
    println!("未关联材料:     {}", summary.unmatched_materials);
    if summary.multiply_matched_materials > 0 {
        println!("重复关联材料:   {}", summary.multiply_matched_materials);
    }
    println!("导出文件:       {}", path.display());

    Ok(())
}
