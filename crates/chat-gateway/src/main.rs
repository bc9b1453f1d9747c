//! Demo bot entry point
//!
//! Run with:
//! ```bash
//! CHAT_TOKEN=... cargo run -p chat-gateway --bin chat-bot
//! ```
//!
//! Configuration is loaded from environment variables.

use chat_common::{try_init_tracing_with_config, ClientConfig, Environment, TracingConfig};
use chat_core::Message;
use chat_gateway::{CommandContext, GatewayConfig, GatewaySession, Module, RegistrationCollector};
use tracing::{error, info};

/// `ping` command and a message logger
struct Basics;

impl Module for Basics {
    fn name(&self) -> &'static str {
        "Basics"
    }

    fn register(&self, collector: &mut RegistrationCollector) {
        collector
            .command_fn("ping", |ctx: CommandContext| async move {
                let invoker = ctx.invoker().map_or("someone", |user| user.display_name());
                info!(invoker = %invoker, channel_id = ?ctx.channel_id(), "pong");
                Ok(())
            })
            .event_typed("MESSAGE_CREATE", |message: Message| async move {
                info!(
                    channel_id = %message.channel_id,
                    author = %message.author.tag(),
                    "Message received"
                );
                Ok(())
            });
    }
}

#[tokio::main]
async fn main() {
    // Tracing first so configuration errors are reported
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(Environment::from_env())) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Bot exited with error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env()?;
    config.validate()?;

    info!(
        app = %config.app.name,
        env = ?config.app.env,
        gateway = %config.gateway.url,
        "Configuration loaded"
    );

    let mut collector = match &config.commands.prefix {
        Some(prefix) => RegistrationCollector::new().with_prefix(prefix.clone()),
        None => RegistrationCollector::new(),
    };
    collector.module(&Basics);
    let registration = collector.finish();

    let session = GatewaySession::new(GatewayConfig::from(&config), registration.registry);
    session.start(config.auth.token.clone(), config.auth.intents).await?;

    tokio::select! {
        result = session.closed() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received");
            session.stop().await;
        }
    }

    Ok(())
}
