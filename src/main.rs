use clap::Parser;

use zai_relay::config::RelayConfig;
use zai_relay::server;

/// OpenAI 兼容的 Z.AI 中继服务
#[derive(Debug, Parser)]
#[command(name = "zai-relay", version, about)]
struct Cli {
    /// 监听端口（覆盖 PORT 环境变量）
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = RelayConfig::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }

    log::info!("[Relay] 上游: {}", config.upstream_url);
    log::info!("[Relay] 默认上游模型: {}", config.default_upstream_model_id);
    log::info!("[Relay] 默认流式响应: {}", config.default_stream);
    log::info!("[Relay] 思考功能: {}", config.enable_thinking);
    log::info!("[Relay] 思考内容策略: {}", config.think_mode.as_str());

    server::serve(config).await
}
