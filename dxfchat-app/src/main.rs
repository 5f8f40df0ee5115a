use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use dxfchat_config::{AppConfig, ConfigError};
use dxfchat_engine::sample;
use dxfchat_io::{DocumentLoader, DocumentSaver, DxfFacade};

#[derive(Debug, Parser)]
#[command(name = "dxfchat", version, about = "通过对话编辑 DXF 图纸")]
struct Cli {
    /// 配置文件路径，缺省时读取 `DXFCHAT_CONFIG` 或 `./config/default.toml`
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 启动 HTTP 服务（默认）
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// 生成示例平面图
    Sample {
        #[arg(long, short, default_value = "sample_floorplan.dxf")]
        output: PathBuf,
    },
    /// 将 DXF 渲染为 SVG 预览
    Render {
        input: PathBuf,
        /// 缺省为输入文件同名的 `.svg`
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (mut config, config_error) = match AppConfig::resolve(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    init_logging(&config);
    if let Some(err) = config_error {
        match &err {
            ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                warn!(path = %path.display(), error = %err, "加载配置失败，使用内建默认值");
            }
            ConfigError::Context { .. } => {
                warn!(error = %err, "加载配置失败，使用内建默认值");
            }
        }
    }

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            dxfchat_server::serve(config).await?;
        }
        Command::Sample { output } => write_sample(&output)?,
        Command::Render { input, output } => {
            let output = output.unwrap_or_else(|| input.with_extension("svg"));
            render_file(&input, &output, &config)?;
        }
    }
    Ok(())
}

fn write_sample(output: &Path) -> anyhow::Result<()> {
    let document = sample::floorplan();
    DxfFacade::new()
        .save(&document, output)
        .with_context(|| format!("写入示例图纸 {} 失败", output.display()))?;
    info!(path = %output.display(), entities = document.entity_count(), "示例图纸已生成");
    println!("{}", output.display());
    Ok(())
}

fn render_file(input: &Path, output: &Path, config: &AppConfig) -> anyhow::Result<()> {
    let document = DxfFacade::new()
        .load(input)
        .with_context(|| format!("读取 {} 失败", input.display()))?;
    let svg = dxfchat_render::render_svg(&document, &config.render.preview);
    std::fs::write(output, svg).with_context(|| format!("写入 {} 失败", output.display()))?;
    info!(input = %input.display(), output = %output.display(), "SVG 预览已生成");
    println!("{}", output.display());
    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
