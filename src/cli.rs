// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 命令行接口
//!
//! - `generate`：运行完整流水线，可按资源类型与网站 id 筛选
//! - `credentials list | add | remove`：管理凭据文件
//! - `cleanup`：删除不再被引用的资源
//! - `validate`：只校验网站目录与凭据文件

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::settings::Settings;
use crate::domain::models::asset::AssetType;
use crate::domain::models::credential::{AuthMethod, CredentialRecord, PasswordCredentials};
use crate::engines::chromium_engine::ChromiumEngine;
use crate::engines::traits::BrowserEngine;
use crate::infrastructure::catalog::load_catalog;
use crate::infrastructure::credential_file::{load_credentials, save_credentials};
use crate::infrastructure::storage::create_storage_repository;
use crate::workers::pipeline::{cleanup_assets, Pipeline, PipelineOptions};

#[derive(Debug, Parser)]
#[command(name = "siteshot", version, about = "Generate screenshots, logos and favicons for a website catalog")]
pub struct Cli {
    /// 额外的配置文件
    #[arg(long, short, global = true, env = "SITESHOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate assets for the catalog
    Generate {
        /// Only generate these asset types (comma separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<AssetType>,
        /// Only process these website ids (comma separated)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },
    /// Manage stored credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialsCommand,
    },
    /// Delete stored assets no website references
    Cleanup,
    /// Validate the website catalog and credential file
    Validate,
}

#[derive(Debug, Subcommand)]
pub enum CredentialsCommand {
    /// List stored credentials without secrets
    List,
    /// Add or replace the credential for a website
    Add {
        website_id: String,
        #[arg(long, value_enum, default_value_t = MethodArg::Email)]
        method: MethodArg,
        #[arg(long)]
        username: Option<String>,
        #[arg(long, env = "SITESHOT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// OAuth provider name, e.g. google or github
        #[arg(long)]
        provider: Option<String>,
        /// Additional field as key=value, repeatable
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Remove the credential for a website
    Remove { website_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Email,
    Oauth,
    Sso,
    Manual,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

/// 根据命令行参数构造凭据记录（尚未校验）
pub fn credential_from_args(
    website_id: String,
    method: MethodArg,
    username: Option<String>,
    password: Option<String>,
    provider: Option<String>,
    fields: Vec<(String, String)>,
) -> CredentialRecord {
    let fields: BTreeMap<String, String> = fields.into_iter().collect();
    let method = match method {
        MethodArg::Email => AuthMethod::Email(PasswordCredentials {
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
        }),
        MethodArg::Oauth => AuthMethod::OAuth {
            provider: provider.unwrap_or_default(),
            fallback: match (username, password) {
                (None, None) => None,
                (username, password) => Some(PasswordCredentials {
                    username: username.unwrap_or_default(),
                    password: password.unwrap_or_default(),
                }),
            },
        },
        MethodArg::Sso => AuthMethod::Sso { fields },
        MethodArg::Manual => AuthMethod::Manual { fields },
    };
    CredentialRecord::new(website_id, method)
}

/// 执行子命令
pub async fn execute(command: Command, settings: Settings) -> anyhow::Result<()> {
    match command {
        Command::Generate { only, ids } => generate(settings, PipelineOptions { only, ids }).await,
        Command::Credentials { action } => credentials(&settings, action).await,
        Command::Cleanup => {
            let storage = create_storage_repository(&settings.storage)?;
            let deleted = cleanup_assets(&settings, storage).await?;
            for key in &deleted {
                println!("deleted {}", key);
            }
            println!("{} asset file(s) removed", deleted.len());
            Ok(())
        }
        Command::Validate => {
            let websites = load_catalog(&settings.paths.websites_file).await?;
            let credentials = load_credentials(&settings.paths.credentials_file).await?;
            println!(
                "{} website(s) and {} credential(s) are valid",
                websites.len(),
                credentials.len()
            );
            Ok(())
        }
    }
}

async fn generate(settings: Settings, options: PipelineOptions) -> anyhow::Result<()> {
    let storage = create_storage_repository(&settings.storage)?;
    // 浏览器无法启动时整个运行没有意义
    let engine = Arc::new(
        ChromiumEngine::launch(&settings.browser)
            .await
            .context("Failed to launch browser engine")?,
    );
    info!(engine = engine.name(), "Browser engine ready");

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    let signal_task = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Cancellation requested, finishing in-flight items");
                signal_token.cancel();
            }
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    });

    let pipeline =
        Pipeline::new(settings, engine.clone(), storage).with_cancellation(cancel.clone());
    let result = pipeline.run(&options).await;

    signal_task.abort();
    if let Err(e) = engine.shutdown().await {
        warn!("Failed to shut down browser engine: {}", e);
    }

    let report = result?;
    for (asset_type, outcome) in [
        (AssetType::Screenshot, &report.outcomes.screenshot),
        (AssetType::Logo, &report.outcomes.logo),
        (AssetType::Favicon, &report.outcomes.favicon),
    ] {
        let Some(outcome) = outcome else { continue };
        println!(
            "{:<10} {}/{} succeeded",
            asset_type, outcome.successful, outcome.total
        );
        for failure in &outcome.failures {
            println!("  {:<24} {}", failure.website_id, failure.error);
        }
    }
    if cancel.is_cancelled() {
        println!("run was cancelled; unstarted websites are reported as failures");
    }
    Ok(())
}

async fn credentials(settings: &Settings, action: CredentialsCommand) -> anyhow::Result<()> {
    let path = &settings.paths.credentials_file;
    let store = load_credentials(path).await?;

    match action {
        CredentialsCommand::List => {
            for summary in store.list() {
                println!(
                    "{:<24} {:<8} password={}",
                    summary.website_id,
                    summary.method,
                    if summary.has_password { "yes" } else { "no" }
                );
            }
        }
        CredentialsCommand::Add {
            website_id,
            method,
            username,
            password,
            provider,
            fields,
        } => {
            let record =
                credential_from_args(website_id, method, username, password, provider, fields);
            let website_id = record.website_id.clone();
            store.put(record)?;
            save_credentials(path, &store).await?;
            println!("stored credential for {}", website_id);
        }
        CredentialsCommand::Remove { website_id } => {
            if store.remove(&website_id) {
                save_credentials(path, &store).await?;
                println!("removed credential for {}", website_id);
            } else {
                anyhow::bail!("no credential stored for {}", website_id);
            }
        }
    }
    Ok(())
}
