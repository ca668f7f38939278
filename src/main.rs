//! Kawa 命令行入口
//!
//! 用法: kawa [--plan-only] [--config <path>] <message...>
//! 对内置演示工作区执行一次请求，并以 JSON 打印完整响应。

use std::path::PathBuf;

use anyhow::{bail, Context};
use kawa_agent::agent::create_demo_orchestrator;
use kawa_agent::ChatRequest;

struct CliArgs {
    plan_only: bool,
    config: Option<PathBuf>,
    message: String,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut plan_only = false;
    let mut config = None;
    let mut words = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--plan-only" => plan_only = true,
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            _ => words.push(arg),
        }
    }
    let message = words.join(" ");
    if message.trim().is_empty() {
        bail!("usage: kawa [--plan-only] [--config <path>] <message...>");
    }
    Ok(CliArgs {
        plan_only,
        config,
        message,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kawa_agent::observability::init("info");

    let args = parse_args(std::env::args().skip(1))?;
    let (_cfg, orchestrator) =
        create_demo_orchestrator(args.config).context("Failed to create orchestrator")?;

    let mut request = ChatRequest::new(args.message);
    if args.plan_only {
        request = request.plan_only();
    }
    let response = orchestrator.handle(&request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
