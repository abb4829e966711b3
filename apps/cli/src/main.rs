use std::io::Write;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures_util::StreamExt;

use chatrelay_core_sdk::{
    chat::{ChatReply, ChatService},
    config::RelayConfig,
    fallback, server, telemetry,
};

/**
 * \brief CLI 程序入口。
 */
#[derive(Parser, Debug)]
#[command(name = "chatrelay", version, about = "Streaming chat relay with model failover")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 启动 HTTP 服务。
     */
    Serve {
        /** \brief 覆盖 CHATRELAY_ADDR */
        #[arg(long)]
        addr: Option<String>,
    },

    /**
     * \brief 发送一条消息并流式显示回复（模型全部失败时显示兜底回复）。
     */
    Chat {
        #[arg(long, value_enum, default_value_t = Profile::Product)]
        profile: Profile,
        #[arg(long)]
        message: String,
    },

    /**
     * \brief 打印某条消息对应的兜底回复。
     */
    Fallback {
        #[arg(long)]
        message: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Profile {
    Assistant,
    Product,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { addr } => {
            let mut config = RelayConfig::from_env().context("load configuration failed")?;
            if let Some(addr) = addr {
                config.addr = addr;
            }
            server::run(&config).await?;
        }
        Commands::Chat { profile, message } => {
            let config = RelayConfig::from_env().context("load configuration failed")?;
            let profile = match profile {
                Profile::Assistant => config.assistant.clone(),
                Profile::Product => config.product.clone(),
            };
            let service = ChatService::from_profile(profile, config.retry, config.replay_delay)
                .context("build provider failed")?;

            let reply = service
                .open_stream(&message, &[])
                .await
                .context("chat request failed")?;

            let mut stdout = std::io::stdout();
            match reply {
                ChatReply::Live { model, mut stream } => {
                    eprintln!("[model: {}]", model);
                    while let Some(delta) = stream
                        .as_mut()
                        .next()
                        .await
                        .transpose()
                        .context("stream error")?
                    {
                        print!("{}", delta);
                        stdout.flush().ok();
                    }
                }
                ChatReply::Fallback { text, last_error } => {
                    if let Some(err) = last_error {
                        eprintln!("[fallback: {}]", err);
                    }
                    print!("{}", text);
                }
            }
            println!();
        }
        Commands::Fallback { message } => {
            println!("{}", fallback::respond(&message));
        }
    }

    Ok(())
}
