use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use fhevm_sdk::{
    CreateInstanceParams, FhevmInstance, ProviderInput,
    config::{self, ConfigError, FhevmConfig, load_config},
    network::{
        HttpTransportFactory, TransportFactory, TransportPool, resolve_network,
        try_fetch_hardhat_node_relayer_metadata,
    },
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "fhevm", version, about = "FHEVM 实例创建与公钥缓存工具")]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 fhevm.toml 或 config/fhevm.toml）"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 查询链 id 并判断走 mock 还是 relayer 路径
    Resolve(TargetArgs),
    /// 探测目标节点是否为带 FHEVM 插件的 Hardhat 节点
    Probe(TargetArgs),
    /// 执行完整的实例创建流程
    Provision(TargetArgs),
    /// 公钥缓存相关命令
    #[command(subcommand)]
    Cache(CacheCmd),
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug)]
struct TargetArgs {
    #[arg(long, help = "节点 RPC 地址（缺省使用配置中的 network.rpc_url）")]
    rpc_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum CacheCmd {
    /// 按 ACL 地址读取缓存的公钥与公共参数
    Get {
        #[arg(help = "ACL 合约地址")]
        acl_address: String,
    },
}

#[derive(Args, Debug)]
struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    force: bool,
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone())?;
    init_tracing(&config.logging)?;

    match cli.command {
        Command::Resolve(args) => {
            let provider = target(&config, args)?;
            let transports = transports(&config);
            let resolved = resolve_network(
                &provider,
                Some(&config.network.mock_chains),
                transports.as_ref(),
            )
            .await?;
            print_json(&json!({
                "chainId": resolved.chain_id(),
                "kind": resolved.kind(),
                "rpcUrl": resolved.rpc_url(),
            }))?;
        }
        Command::Probe(args) => {
            let provider = target(&config, args)?;
            let url = provider
                .url()
                .ok_or_else(|| anyhow!("probe 需要 RPC 地址"))?
                .to_string();
            let transport = transports(&config).connect(&url)?;
            let metadata = try_fetch_hardhat_node_relayer_metadata(transport.as_ref()).await;
            if metadata.is_none() {
                info!(target: "fhevm::cli", url = %url, "目标不是 FHEVM Hardhat 节点");
            }
            print_json(&metadata)?;
        }
        Command::Provision(args) => {
            let provider = target(&config, args)?;
            provision(&config, provider).await?;
        }
        Command::Cache(CacheCmd::Get { acl_address }) => {
            let storage = config.build_storage();
            let cached = storage.get(&acl_address).await?;
            print_json(&cached)?;
        }
        Command::Init(args) => {
            init_configs(args)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

fn init_tracing(config: &config::LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .init();
    } else {
        fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn load_configuration(path: Option<PathBuf>) -> Result<FhevmConfig, ConfigError> {
    load_config(path)
}

fn target(config: &FhevmConfig, args: TargetArgs) -> Result<ProviderInput> {
    args.rpc_url
        .or_else(|| config.network.rpc_url.clone())
        .map(ProviderInput::from)
        .ok_or_else(|| anyhow!("缺少 RPC 地址：请传入 --rpc-url 或配置 network.rpc_url"))
}

fn transports(config: &FhevmConfig) -> Arc<dyn TransportFactory> {
    Arc::new(TransportPool::new(HttpTransportFactory::new(
        config.rpc_timeout(),
    )))
}

async fn provision(config: &FhevmConfig, provider: ProviderInput) -> Result<()> {
    let client = config.build_client();
    let token = CancellationToken::new();

    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "fhevm::cli", "收到中断信号，取消实例创建");
            interrupt.cancel();
        }
    });

    let mut params = CreateInstanceParams::new(provider)
        .with_token(token)
        .with_mock_chains(config.network.mock_chains.clone())
        .on_status(|status| info!(target: "fhevm::cli", status = %status, "创建进度"));
    if let Some(options) = config.init_options() {
        params = params.with_init_options(options);
    }

    let instance = client.create_instance(params).await?;
    match &instance {
        FhevmInstance::Mock(mock) => print_json(&json!({
            "kind": instance.kind(),
            "rpcUrl": mock.rpc_url(),
            "config": mock.config(),
        }))?,
        FhevmInstance::Relayer(_) => print_json(&json!({
            "kind": instance.kind(),
            "publicKeyId": instance.public_key().map(|key| key.public_key_id),
        }))?,
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_configs(args: InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    fs::create_dir_all(&output_dir)?;

    let templates: [(&str, &str); 1] = [(
        "fhevm.toml",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/fhevm.toml")),
    )];

    for (filename, contents) in templates {
        let target_path = output_dir.join(filename);
        if target_path.exists() && !args.force {
            println!(
                "跳过 {}（文件已存在，如需覆盖请加 --force）",
                target_path.display()
            );
            continue;
        }

        fs::write(&target_path, contents)?;
        println!("已写入 {}", target_path.display());
    }

    Ok(())
}
